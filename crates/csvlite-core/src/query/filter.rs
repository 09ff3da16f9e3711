/// Expression evaluation
///
/// A `Filter` is the evaluation context of an expression: the records bound
/// by the enclosing queries (innermost last) plus the shared environment of
/// the statement (functions, scope chain, inline tables).
use super::aggregate;
use super::ast::{
    ArithmeticOperator, Expression, Literal, LogicalOperator, OrderByClause, UnaryOperator,
};
use super::executor::{self, ExecutionContext};
use super::function::check_arg_count;
use super::header::Header;
use super::record::Record;
use super::scope::{FunctionBody, Scope};
use super::view::{stable_sort_by_less, View};
use crate::error::{Error, Result};
use crate::ternary::Ternary;
use crate::value::{
    compare, compare_row_values, equal, greater_or_equal, is, less_or_equal, like,
    ComparisonOperator, DatetimeOptions, Primary, SortValues,
};
use std::sync::Arc;

/// A table produced by a WITH clause.
#[derive(Debug, Clone)]
pub struct InlineTable {
    pub name: String,
    pub view: View,
}

/// State shared by every filter of one statement.
#[derive(Debug, Clone)]
pub struct Environment {
    pub context: Arc<ExecutionContext>,
    pub scope: Scope,
    inline_tables: Vec<Arc<InlineTable>>,
    recursive: Option<Arc<InlineTable>>,
}

/// One record in scope for field references.
#[derive(Debug, Clone, Copy)]
pub struct RecordBinding<'a> {
    pub header: &'a Header,
    pub record: &'a Record,
    pub is_grouped: bool,
}

#[derive(Debug, Clone)]
pub struct Filter<'a> {
    records: Vec<RecordBinding<'a>>,
    env: Arc<Environment>,
}

impl Filter<'static> {
    /// A filter with no bound records.
    pub fn new(context: Arc<ExecutionContext>, scope: Scope) -> Self {
        Filter {
            records: Vec::new(),
            env: Arc::new(Environment {
                context,
                scope,
                inline_tables: Vec::new(),
                recursive: None,
            }),
        }
    }
}

impl<'a> Filter<'a> {
    pub fn context(&self) -> &ExecutionContext {
        &self.env.context
    }

    pub fn scope(&self) -> &Scope {
        &self.env.scope
    }

    pub fn datetime(&self) -> &DatetimeOptions {
        &self.env.context.datetime
    }

    pub fn has_bindings(&self) -> bool {
        !self.records.is_empty()
    }

    /// Binds one more record, innermost.
    pub fn with_binding<'b>(&self, header: &'b Header, record: &'b Record, is_grouped: bool) -> Filter<'b>
    where
        'a: 'b,
    {
        let mut records: Vec<RecordBinding<'b>> = self.records.clone();
        records.push(RecordBinding {
            header,
            record,
            is_grouped,
        });
        Filter {
            records,
            env: self.env.clone(),
        }
    }

    /// Replaces the innermost binding with an ungrouped record.
    fn with_innermost<'b>(&self, header: &'b Header, record: &'b Record) -> Filter<'b>
    where
        'a: 'b,
    {
        let keep = self.records.len().saturating_sub(1);
        let mut records: Vec<RecordBinding<'b>> = self.records[..keep].to_vec();
        records.push(RecordBinding {
            header,
            record,
            is_grouped: false,
        });
        Filter {
            records,
            env: self.env.clone(),
        }
    }

    /// The same environment without any bound record.
    pub fn detached(&self) -> Filter<'static> {
        Filter {
            records: Vec::new(),
            env: self.env.clone(),
        }
    }

    /// Makes an inline table visible to queries evaluated with the returned filter.
    pub fn with_inline_table(&self, table: InlineTable) -> Filter<'a> {
        let mut env = (*self.env).clone();
        env.inline_tables.push(Arc::new(table));
        Filter {
            records: self.records.clone(),
            env: Arc::new(env),
        }
    }

    /// Binds the rows of the previous iteration of a recursive inline table.
    pub fn with_recursive(&self, table: InlineTable) -> Filter<'a> {
        let mut env = (*self.env).clone();
        env.recursive = Some(Arc::new(table));
        Filter {
            records: self.records.clone(),
            env: Arc::new(env),
        }
    }

    /// Finds an inline table, checking the recursive binding first.
    pub fn inline_table(&self, name: &str) -> Option<&InlineTable> {
        if let Some(t) = &self.env.recursive {
            if t.name.eq_ignore_ascii_case(name) {
                return Some(t.as_ref());
            }
        }
        self.env
            .inline_tables
            .iter()
            .rev()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.as_ref())
    }

    fn innermost(&self) -> Option<&RecordBinding<'a>> {
        self.records.last()
    }

    /// Evaluates an expression against the bound records.
    pub fn evaluate(&self, expr: &Expression) -> Result<Primary> {
        if let Some(value) = self.computed_value(expr) {
            return Ok(value);
        }

        match expr {
            Expression::Literal(lit) => Ok(lit.to_primary()),
            Expression::Column { table, name } => self.field(table.as_deref(), name),
            Expression::AllColumns | Expression::TableColumns(_) => {
                Err(Error::UnpermittedWildcard(expr.to_string()))
            }
            Expression::Parentheses(inner) => self.evaluate(inner),
            Expression::Arithmetic { left, op, right } => {
                let lhs = self.evaluate(left)?;
                if lhs.is_null() {
                    return Ok(Primary::Null);
                }
                let rhs = self.evaluate(right)?;
                Ok(arithmetic(&lhs, *op, &rhs))
            }
            Expression::UnaryArithmetic { op, operand } => {
                let value = self.evaluate(operand)?;
                Ok(unary_arithmetic(*op, &value))
            }
            Expression::Concat(items) => {
                let mut buf = String::new();
                for item in items {
                    match self.evaluate(item)?.to_text() {
                        Some(s) => buf.push_str(&s),
                        None => return Ok(Primary::Null),
                    }
                }
                Ok(Primary::String(buf))
            }
            Expression::Comparison { left, op, right } => self.comparison(left, *op, right),
            Expression::Is {
                expr,
                value,
                negated,
            } => {
                let lhs = self.evaluate(expr)?;
                let rhs = self.evaluate(value)?;
                Ok(negate(is(&lhs, &rhs), *negated).into())
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => self.between(expr, low, high, *negated),
            Expression::Like {
                expr,
                pattern,
                negated,
            } => {
                let lhs = self.evaluate(expr)?;
                let pattern = self.evaluate(pattern)?;
                Ok(negate(like(&lhs, &pattern), *negated).into())
            }
            Expression::In {
                expr,
                values,
                negated,
            } => {
                let t = self.any(expr, ComparisonOperator::Equal, values)?;
                Ok(negate(t, *negated).into())
            }
            Expression::Any { expr, op, values } => Ok(self.any(expr, *op, values)?.into()),
            Expression::All { expr, op, values } => Ok(self.all(expr, *op, values)?.into()),
            Expression::Exists(query) => {
                let view = executor::select(query, self)?;
                Ok(Ternary::from_bool(!view.records.is_empty()).into())
            }
            Expression::Subquery(query) => {
                let view = executor::select(query, self)?;
                if view.header.len() > 1 {
                    return Err(Error::SubqueryTooManyFields(query.to_string()));
                }
                match view.records.len() {
                    0 => Ok(Primary::Null),
                    1 => Ok(view.records[0].value(0).clone()),
                    _ => Err(Error::SubqueryTooManyRecords(query.to_string())),
                }
            }
            Expression::RowValue(_) | Expression::ValueList(_) => {
                Err(Error::RowValueLengthMismatch {
                    expression: expr.to_string(),
                    expected: 1,
                })
            }
            Expression::Function { name, args } => self.function(expr, name, args),
            Expression::Aggregate {
                name,
                distinct,
                args,
            } => self.aggregate(expr, name, *distinct, args),
            Expression::ListAggregate {
                name,
                distinct,
                args,
                order_by,
            } => self.list_aggregate(expr, name, *distinct, args, order_by.as_ref()),
            Expression::Analytic { name, .. } => {
                Err(Error::UnpermittedStatementFunction(name.clone()))
            }
            Expression::Case {
                operand,
                branches,
                else_result,
            } => {
                let operand = match operand {
                    Some(o) => Some(self.evaluate(o)?),
                    None => None,
                };
                for (when, then) in branches {
                    let cond = self.evaluate(when)?;
                    let t = match &operand {
                        Some(v) => equal(v, &cond, self.datetime()),
                        None => cond.ternary(),
                    };
                    if t.is_true() {
                        return self.evaluate(then);
                    }
                }
                match else_result {
                    Some(e) => self.evaluate(e),
                    None => Ok(Primary::Null),
                }
            }
            Expression::Logic { left, op, right } => {
                let lhs = self.evaluate(left)?.ternary();
                let t = match op {
                    LogicalOperator::And => {
                        if lhs == Ternary::False {
                            return Ok(Ternary::False.into());
                        }
                        lhs.and(self.evaluate(right)?.ternary())
                    }
                    LogicalOperator::Or => {
                        if lhs == Ternary::True {
                            return Ok(Ternary::True.into());
                        }
                        lhs.or(self.evaluate(right)?.ternary())
                    }
                };
                Ok(t.into())
            }
            Expression::Not(inner) => Ok(self.evaluate(inner)?.ternary().not().into()),
            Expression::Variable(name) => self.scope().get_variable(name),
            Expression::VariableSubstitution { name, value } => {
                let value = self.evaluate(value)?;
                self.scope().set_variable(name, value.clone())?;
                Ok(value)
            }
        }
    }

    /// Value of an expression already materialized as a computed column of
    /// the innermost record.
    fn computed_value(&self, expr: &Expression) -> Option<Primary> {
        match expr {
            Expression::Literal(_)
            | Expression::Column { .. }
            | Expression::AllColumns
            | Expression::TableColumns(_)
            | Expression::Variable(_) => None,
            _ => {
                let binding = self.innermost()?;
                if binding.header.fields.iter().all(|f| f.is_from_table) {
                    return None;
                }
                binding
                    .header
                    .find_computed(&expr.to_string())
                    .map(|idx| binding.record.value(idx).clone())
            }
        }
    }

    /// Resolves a field, innermost binding first.
    fn field(&self, table: Option<&str>, name: &str) -> Result<Primary> {
        for binding in self.records.iter().rev() {
            if let Some(idx) = binding.header.find(table, name)? {
                let field = &binding.header.fields[idx];
                if binding.is_grouped && field.is_from_table && !field.is_group_key {
                    return Err(Error::FieldNotGroupKey(qualified(table, name)));
                }
                return Ok(binding.record.value(idx).clone());
            }
        }
        Err(Error::FieldNotExist(qualified(table, name)))
    }

    fn comparison(&self, left: &Expression, op: ComparisonOperator, right: &Expression) -> Result<Primary> {
        if let Expression::RowValue(_) = left {
            let lhs = self.row_value(left)?;
            let rhs = self.row_value(right)?;
            let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
                return Ok(Ternary::Unknown.into());
            };
            if lhs.len() != rhs.len() {
                return Err(Error::RowValueLengthMismatch {
                    expression: right.to_string(),
                    expected: lhs.len(),
                });
            }
            return Ok(compare_row_values(&lhs, &rhs, op, self.datetime()).into());
        }

        let lhs = self.evaluate(left)?;
        let rhs = self.evaluate(right)?;
        Ok(compare(&lhs, &rhs, op, self.datetime()).into())
    }

    fn between(&self, expr: &Expression, low: &Expression, high: &Expression, negated: bool) -> Result<Primary> {
        let Some(lhs) = self.row_value(expr)? else {
            return Ok(Ternary::Unknown.into());
        };

        let t = if lhs.len() == 1 {
            if lhs[0].is_null() {
                return Ok(Ternary::Unknown.into());
            }
            let low = self.evaluate(low)?;
            let low_result = greater_or_equal(&lhs[0], &low, self.datetime());
            if low_result == Ternary::False {
                Ternary::False
            } else {
                let high = self.evaluate(high)?;
                low_result.and(less_or_equal(&lhs[0], &high, self.datetime()))
            }
        } else {
            let low_result = self.compare_rows(&lhs, ComparisonOperator::GreaterOrEqual, low)?;
            if low_result == Ternary::False {
                Ternary::False
            } else {
                low_result.and(self.compare_rows(&lhs, ComparisonOperator::LessOrEqual, high)?)
            }
        };
        Ok(negate(t, negated).into())
    }

    fn compare_rows(&self, lhs: &[Primary], op: ComparisonOperator, right: &Expression) -> Result<Ternary> {
        let Some(rhs) = self.row_value(right)? else {
            return Ok(Ternary::Unknown);
        };
        if rhs.len() != lhs.len() {
            return Err(Error::RowValueLengthMismatch {
                expression: right.to_string(),
                expected: lhs.len(),
            });
        }
        Ok(compare_row_values(lhs, &rhs, op, self.datetime()))
    }

    /// Evaluates a row value; `None` for a row subquery returning no record.
    fn row_value(&self, expr: &Expression) -> Result<Option<Vec<Primary>>> {
        match expr {
            Expression::RowValue(items) => Ok(Some(
                items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Expression::Subquery(query) => {
                let view = executor::select(query, self)?;
                match view.records.len() {
                    0 => Ok(None),
                    1 => Ok(Some(view.records[0].values())),
                    _ => Err(Error::SubqueryTooManyRecords(query.to_string())),
                }
            }
            other => Ok(Some(vec![self.evaluate(other)?])),
        }
    }

    /// Evaluates the right side of IN, ANY and ALL as rows of `width` values.
    fn row_value_list(&self, values: &Expression, width: usize) -> Result<Vec<Vec<Primary>>> {
        match values {
            Expression::ValueList(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    let row = match item {
                        Expression::RowValue(_) | Expression::Subquery(_) if width > 1 => {
                            self.row_value(item)?.unwrap_or_else(|| vec![Primary::Null; width])
                        }
                        _ => vec![self.evaluate(item)?],
                    };
                    if row.len() != width {
                        return Err(Error::RowValueLengthMismatch {
                            expression: item.to_string(),
                            expected: width,
                        });
                    }
                    rows.push(row);
                }
                Ok(rows)
            }
            Expression::Subquery(query) => {
                let view = executor::select(query, self)?;
                if view.header.len() != width {
                    if width == 1 {
                        return Err(Error::SubqueryTooManyFields(query.to_string()));
                    }
                    return Err(Error::RowValueLengthMismatch {
                        expression: values.to_string(),
                        expected: width,
                    });
                }
                Ok(view.records.iter().map(Record::values).collect())
            }
            other => Ok(vec![vec![self.evaluate(other)?]]),
        }
    }

    fn quantified(
        &self,
        expr: &Expression,
        op: ComparisonOperator,
        values: &Expression,
    ) -> Result<Option<Vec<Ternary>>> {
        let Some(lhs) = self.row_value(expr)? else {
            return Ok(None);
        };
        let rows = self.row_value_list(values, lhs.len())?;
        let options = self.datetime();
        Ok(Some(
            rows.iter()
                .map(|row| {
                    if lhs.len() == 1 {
                        compare(&lhs[0], &row[0], op, options)
                    } else {
                        compare_row_values(&lhs, row, op, options)
                    }
                })
                .collect(),
        ))
    }

    fn any(&self, expr: &Expression, op: ComparisonOperator, values: &Expression) -> Result<Ternary> {
        Ok(self
            .quantified(expr, op, values)?
            .map(Ternary::any)
            .unwrap_or(Ternary::Unknown))
    }

    fn all(&self, expr: &Expression, op: ComparisonOperator, values: &Expression) -> Result<Ternary> {
        Ok(self
            .quantified(expr, op, values)?
            .map(Ternary::all)
            .unwrap_or(Ternary::Unknown))
    }

    fn evaluate_args(&self, args: &[Expression]) -> Result<Vec<Primary>> {
        args.iter().map(|a| self.evaluate(a)).collect()
    }

    fn function(&self, expr: &Expression, name: &str, args: &[Expression]) -> Result<Primary> {
        if let Some(f) = self.context().registry.scalar(name) {
            let values = self.evaluate_args(args)?;
            return f(name, &values, self.datetime());
        }

        let Some(udf) = self.scope().get_function(name)? else {
            return Err(Error::FunctionNotExist(name.to_string()));
        };
        match &udf.body {
            FunctionBody::Aggregate(_) => self.aggregate(expr, name, false, args),
            FunctionBody::Scalar(body) => {
                udf.check_args(args.len())?;
                let values = self.evaluate_args(args)?;
                body(&values)
            }
        }
    }

    /// Innermost binding, which must be a grouped record.
    fn grouped_binding(&self, name: &str) -> Result<RecordBinding<'a>> {
        let binding = self
            .innermost()
            .copied()
            .ok_or_else(|| Error::UnpermittedStatementFunction(name.to_string()))?;
        if !binding.is_grouped {
            return Err(Error::NotGroupingRecords(name.to_string()));
        }
        Ok(binding)
    }

    fn aggregate(&self, expr: &Expression, name: &str, distinct: bool, args: &[Expression]) -> Result<Primary> {
        let builtin = self.context().registry.aggregate(name);
        let udf = match builtin {
            Some(_) => None,
            None => match self.scope().get_function(name)? {
                Some(f) if f.is_aggregate() => Some(f),
                _ => return Err(Error::FunctionNotExist(name.to_string())),
            },
        };

        match &udf {
            Some(f) => {
                if args.is_empty() {
                    return Err(Error::FunctionArgumentCount {
                        function: name.to_string(),
                        expected: format!("at least {} argument", 1),
                    });
                }
                f.check_args(args.len() - 1)?;
            }
            None => check_arg_count(name, args.len(), 1, Some(1))?,
        }

        let binding = self.grouped_binding(name)?;
        let list_expr = &args[0];
        let is_count = name.eq_ignore_ascii_case("COUNT");

        match list_expr {
            Expression::AllColumns if is_count => return Ok(Primary::Integer(group_len(binding.record) as i64)),
            Expression::AllColumns | Expression::TableColumns(_) => {
                return Err(Error::UnpermittedWildcard(expr.to_string()))
            }
            Expression::Literal(lit) if is_count && *lit != Literal::Null => {
                return Ok(Primary::Integer(group_len(binding.record) as i64))
            }
            _ => {}
        }
        if list_expr.contains_aggregate() {
            return Err(Error::NestedAggregateFunctions(expr.to_string()));
        }

        let rows = member_rows(binding.record);
        let mut values = self.values_over(binding.header, &rows, list_expr)?;
        if distinct {
            values = aggregate::distinct(values, self.datetime());
        }

        match (builtin, udf) {
            (Some(f), _) => Ok(f(&values, self.datetime())),
            (None, Some(f)) => {
                let extra = self.evaluate_args(&args[1..])?;
                match &f.body {
                    FunctionBody::Aggregate(body) => body(&values, &extra),
                    FunctionBody::Scalar(_) => Err(Error::FunctionNotExist(name.to_string())),
                }
            }
            (None, None) => Err(Error::FunctionNotExist(name.to_string())),
        }
    }

    fn list_aggregate(
        &self,
        expr: &Expression,
        name: &str,
        distinct: bool,
        args: &[Expression],
        order_by: Option<&OrderByClause>,
    ) -> Result<Primary> {
        check_arg_count(name, args.len(), 1, Some(2))?;
        let separator = match args.get(1) {
            Some(sep) => self.evaluate(sep)?.to_text().ok_or_else(|| Error::FunctionInvalidArgument {
                function: name.to_string(),
                position: "second".to_string(),
                message: "a string".to_string(),
            })?,
            None if name.eq_ignore_ascii_case("GROUP_CONCAT") => ",".to_string(),
            None => String::new(),
        };

        let binding = self.grouped_binding(name)?;
        if args[0].contains_aggregate() {
            return Err(Error::NestedAggregateFunctions(expr.to_string()));
        }

        let mut rows = member_rows(binding.record);
        if let Some(clause) = order_by {
            let directions: Vec<_> = clause.items.iter().map(|i| i.sort_direction()).collect();
            let nulls: Vec<_> = clause.items.iter().map(|i| i.null_position()).collect();
            let mut keyed = Vec::with_capacity(rows.len());
            for row in rows {
                let keys = {
                    let f = self.with_innermost(binding.header, &row);
                    clause
                        .items
                        .iter()
                        .map(|i| f.evaluate(&i.expr))
                        .collect::<Result<Vec<_>>>()?
                };
                let keys = SortValues::new(&keys, self.datetime());
                keyed.push((keys, row));
            }
            rows = stable_sort_by_less(keyed, &|a: &(SortValues, Record), b: &(SortValues, Record)| {
                a.0.less(&b.0, &directions, &nulls)
            })
            .into_iter()
            .map(|(_, row)| row)
            .collect();
        }

        let mut values = self.values_over(binding.header, &rows, &args[0])?;
        if distinct {
            values = aggregate::distinct(values, self.datetime());
        }
        Ok(aggregate::list_agg(&values, &separator))
    }

    /// Evaluates `expr` once per member row of a group.
    fn values_over(&self, header: &Header, rows: &[Record], expr: &Expression) -> Result<Vec<Primary>> {
        rows.iter()
            .map(|row| self.with_innermost(header, row).evaluate(expr))
            .collect()
    }
}

/// Number of member rows of a grouped record.
pub(crate) fn group_len(record: &Record) -> usize {
    record.cell(0).map(|c| c.len()).unwrap_or(0)
}

/// Splits a grouped record into one plain record per member row.
pub(crate) fn member_rows(record: &Record) -> Vec<Record> {
    (0..group_len(record))
        .map(|j| {
            Record::new(
                record
                    .cells()
                    .iter()
                    .map(|c| c.values().get(j).cloned().unwrap_or(Primary::Null))
                    .collect(),
            )
        })
        .collect()
}

fn qualified(table: Option<&str>, name: &str) -> String {
    match table {
        Some(t) => format!("{}.{}", t, name),
        None => name.to_string(),
    }
}

fn negate(t: Ternary, negated: bool) -> Ternary {
    if negated {
        t.not()
    } else {
        t
    }
}

fn ieee_remainder(x: f64, y: f64) -> f64 {
    x - (x / y).round_ties_even() * y
}

/// Integer arithmetic when both sides are integers and the operator is not
/// division, float arithmetic otherwise.
pub fn arithmetic(lhs: &Primary, op: ArithmeticOperator, rhs: &Primary) -> Primary {
    if lhs.is_null() || rhs.is_null() {
        return Primary::Null;
    }

    if op != ArithmeticOperator::Divide {
        if let (Some(a), Some(b)) = (lhs.to_integer(), rhs.to_integer()) {
            return match op {
                ArithmeticOperator::Add => Primary::Integer(a.wrapping_add(b)),
                ArithmeticOperator::Subtract => Primary::Integer(a.wrapping_sub(b)),
                ArithmeticOperator::Multiply => Primary::Integer(a.wrapping_mul(b)),
                ArithmeticOperator::Modulo if b == 0 => Primary::Null,
                ArithmeticOperator::Modulo => Primary::Integer(a.wrapping_rem(b)),
                ArithmeticOperator::Divide => Primary::Null,
            };
        }
    }

    let (Some(a), Some(b)) = (lhs.to_float(), rhs.to_float()) else {
        return Primary::Null;
    };
    let result = match op {
        ArithmeticOperator::Add => a + b,
        ArithmeticOperator::Subtract => a - b,
        ArithmeticOperator::Multiply => a * b,
        ArithmeticOperator::Divide => a / b,
        ArithmeticOperator::Modulo => ieee_remainder(a, b),
    };
    Primary::from_float(result)
}

fn unary_arithmetic(op: UnaryOperator, value: &Primary) -> Primary {
    if let Some(i) = value.to_integer() {
        return match op {
            UnaryOperator::Plus => Primary::Integer(i),
            UnaryOperator::Minus => Primary::Integer(i.wrapping_neg()),
        };
    }
    match value.to_float() {
        Some(f) => match op {
            UnaryOperator::Plus => Primary::Float(f),
            UnaryOperator::Minus => Primary::Float(-f),
        },
        None => Primary::Null,
    }
}
