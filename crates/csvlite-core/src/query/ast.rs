/// Abstract Syntax Tree (AST) node types for SELECT statements
///
/// Every node implements `Display`. The printed form is canonical: it names
/// computed columns and lets later clauses find values already computed by
/// earlier ones.
use crate::ternary::Ternary;
use crate::value::{ComparisonOperator, NullPosition, Primary, SortDirection};
use std::fmt;

/// A statement accepted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
}

/// A complete SELECT query
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub with: Option<WithClause>,
    pub body: SelectBody,
    pub order_by: Option<OrderByClause>,
    pub offset: Option<Expression>,
    pub limit: Option<LimitClause>,
}

/// WITH [RECURSIVE] name [(columns)] AS (query), ...
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub tables: Vec<InlineTableDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineTableDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub query: SelectQuery,
}

/// The part of a query before ORDER BY
#[derive(Debug, Clone, PartialEq)]
pub enum SelectBody {
    Entity(Box<SelectEntity>),
    SetOperation {
        left: Box<SelectBody>,
        operator: SetOperator,
        all: bool,
        right: Box<SelectBody>,
    },
    /// A parenthesized query used as a set operand
    Query(Box<SelectQuery>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Except,
    Intersect,
}

/// SELECT ... FROM ... WHERE ... GROUP BY ... HAVING ...
#[derive(Debug, Clone, PartialEq)]
pub struct SelectEntity {
    pub distinct: bool,
    pub fields: Vec<Field>,
    pub from: Vec<Table>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
}

/// An item of the SELECT list
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expression,
    pub alias: Option<String>,
}

/// A FROM item
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub object: TableObject,
    pub alias: Option<String>,
    /// Column names given after the alias of a VALUES list
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableObject {
    Identifier(String),
    Dual,
    Stdin,
    Subquery(Box<SelectQuery>),
    Values(Vec<Vec<Expression>>),
    Join(Box<Join>),
}

/// JOIN clause
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: Table,
    pub right: Table,
    pub join_type: JoinType,
    pub natural: bool,
    pub condition: Option<JoinCondition>,
}

/// Types of joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    On(Expression),
    Using(Vec<String>),
}

/// ORDER BY clause for sorting
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub items: Vec<OrderItem>,
}

/// A key in ORDER BY
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expression,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullPosition>,
}

impl OrderItem {
    pub fn sort_direction(&self) -> SortDirection {
        self.direction.unwrap_or_default()
    }

    pub fn null_position(&self) -> NullPosition {
        self.nulls
            .unwrap_or_else(|| self.sort_direction().default_null_position())
    }
}

/// LIMIT n [PERCENT] [WITH TIES]
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub value: Expression,
    pub percent: bool,
    pub with_ties: bool,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Column {
        table: Option<String>,
        name: String,
    },
    /// `*`
    AllColumns,
    /// `table.*`
    TableColumns(String),
    Parentheses(Box<Expression>),
    Arithmetic {
        left: Box<Expression>,
        op: ArithmeticOperator,
        right: Box<Expression>,
    },
    UnaryArithmetic {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    /// a || b || ...
    Concat(Vec<Expression>),
    Comparison {
        left: Box<Expression>,
        op: ComparisonOperator,
        right: Box<Expression>,
    },
    Is {
        expr: Box<Expression>,
        value: Box<Expression>,
        negated: bool,
    },
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    Like {
        expr: Box<Expression>,
        pattern: Box<Expression>,
        negated: bool,
    },
    /// `values` is a ValueList or a Subquery
    In {
        expr: Box<Expression>,
        values: Box<Expression>,
        negated: bool,
    },
    Any {
        expr: Box<Expression>,
        op: ComparisonOperator,
        values: Box<Expression>,
    },
    All {
        expr: Box<Expression>,
        op: ComparisonOperator,
        values: Box<Expression>,
    },
    Exists(Box<SelectQuery>),
    Subquery(Box<SelectQuery>),
    /// (a, b, ...)
    RowValue(Vec<Expression>),
    /// The parenthesized list after IN, ANY or ALL
    ValueList(Vec<Expression>),
    Function {
        name: String,
        args: Vec<Expression>,
    },
    Aggregate {
        name: String,
        distinct: bool,
        args: Vec<Expression>,
    },
    /// LISTAGG and GROUP_CONCAT; `args[1]` is the separator
    ListAggregate {
        name: String,
        distinct: bool,
        args: Vec<Expression>,
        order_by: Option<OrderByClause>,
    },
    Analytic {
        name: String,
        distinct: bool,
        args: Vec<Expression>,
        partition_by: Vec<Expression>,
        order_by: Option<OrderByClause>,
    },
    Case {
        operand: Option<Box<Expression>>,
        branches: Vec<(Expression, Expression)>,
        else_result: Option<Box<Expression>>,
    },
    Logic {
        left: Box<Expression>,
        op: LogicalOperator,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    Variable(String),
    VariableSubstitution {
        name: String,
        value: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Literal values in queries
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Ternary(Ternary),
    Null,
}

impl Literal {
    pub fn to_primary(&self) -> Primary {
        match self {
            Literal::Integer(i) => Primary::Integer(*i),
            Literal::Float(f) => Primary::Float(*f),
            Literal::String(s) => Primary::String(s.clone()),
            Literal::Ternary(t) => Primary::Ternary(*t),
            Literal::Null => Primary::Null,
        }
    }
}

impl Expression {
    /// Shorthand for an unqualified column reference.
    pub fn column<S: Into<String>>(name: S) -> Self {
        Expression::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Direct children, not descending into subqueries.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_)
            | Expression::Column { .. }
            | Expression::AllColumns
            | Expression::TableColumns(_)
            | Expression::Exists(_)
            | Expression::Subquery(_)
            | Expression::Variable(_) => Vec::new(),
            Expression::Parentheses(e) | Expression::Not(e) => vec![e],
            Expression::UnaryArithmetic { operand, .. } => vec![operand],
            Expression::VariableSubstitution { value, .. } => vec![value],
            Expression::Arithmetic { left, right, .. }
            | Expression::Comparison { left, right, .. }
            | Expression::Logic { left, right, .. } => vec![left, right],
            Expression::Is { expr, value, .. } => vec![expr, value],
            Expression::Between { expr, low, high, .. } => vec![expr, low, high],
            Expression::Like { expr, pattern, .. } => vec![expr, pattern],
            Expression::In { expr, values, .. }
            | Expression::Any { expr, values, .. }
            | Expression::All { expr, values, .. } => vec![expr, values],
            Expression::Concat(items)
            | Expression::RowValue(items)
            | Expression::ValueList(items)
            | Expression::Function { args: items, .. }
            | Expression::Aggregate { args: items, .. } => items.iter().collect(),
            Expression::ListAggregate { args, order_by, .. } => {
                let mut out: Vec<&Expression> = args.iter().collect();
                if let Some(ob) = order_by {
                    out.extend(ob.items.iter().map(|i| &i.expr));
                }
                out
            }
            Expression::Analytic {
                args,
                partition_by,
                order_by,
                ..
            } => {
                let mut out: Vec<&Expression> = args.iter().chain(partition_by).collect();
                if let Some(ob) = order_by {
                    out.extend(ob.items.iter().map(|i| &i.expr));
                }
                out
            }
            Expression::Case {
                operand,
                branches,
                else_result,
            } => {
                let mut out: Vec<&Expression> = Vec::new();
                if let Some(o) = operand {
                    out.push(o);
                }
                for (when, then) in branches {
                    out.push(when);
                    out.push(then);
                }
                if let Some(e) = else_result {
                    out.push(e);
                }
                out
            }
        }
    }

    /// True if an aggregate call appears outside any subquery.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate { .. } | Expression::ListAggregate { .. } => true,
            _ => self.children().into_iter().any(Expression::contains_aggregate),
        }
    }

    /// True if a variable substitution appears anywhere, including subqueries
    /// of WHERE-like positions that are evaluated per row.
    pub fn contains_substitution(&self) -> bool {
        match self {
            Expression::VariableSubstitution { .. } => true,
            _ => self
                .children()
                .into_iter()
                .any(Expression::contains_substitution),
        }
    }

    /// Collects analytic calls outside any subquery, outermost first.
    pub fn collect_analytic<'e>(&'e self, out: &mut Vec<&'e Expression>) {
        if let Expression::Analytic { .. } = self {
            out.push(self);
        }
        for child in self.children() {
            child.collect_analytic(out);
        }
    }
}

// Display implementations for canonical text and error messages

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(q) => write!(f, "{}", q),
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref with) = self.with {
            write!(f, "{} ", with)?;
        }
        write!(f, "{}", self.body)?;
        if let Some(ref order_by) = self.order_by {
            write!(f, " {}", order_by)?;
        }
        if let Some(ref offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        if let Some(ref limit) = self.limit {
            write!(f, " {}", limit)?;
        }
        Ok(())
    }
}

impl fmt::Display for WithClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WITH ")?;
        if self.recursive {
            write!(f, "RECURSIVE ")?;
        }
        write_list(f, &self.tables)
    }
}

impl fmt::Display for InlineTableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.columns.is_empty() {
            write!(f, " (")?;
            write_list(f, &self.columns)?;
            write!(f, ")")?;
        }
        write!(f, " AS ({})", self.query)
    }
}

impl fmt::Display for SelectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectBody::Entity(e) => write!(f, "{}", e),
            SelectBody::SetOperation {
                left,
                operator,
                all,
                right,
            } => {
                write!(f, "{} {}", left, operator)?;
                if *all {
                    write!(f, " ALL")?;
                }
                write!(f, " {}", right)
            }
            SelectBody::Query(q) => write!(f, "({})", q),
        }
    }
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOperator::Union => write!(f, "UNION"),
            SetOperator::Except => write!(f, "EXCEPT"),
            SetOperator::Intersect => write!(f, "INTERSECT"),
        }
    }
}

impl fmt::Display for SelectEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write_list(f, &self.fields)?;
        if !self.from.is_empty() {
            write!(f, " FROM ")?;
            write_list(f, &self.from)?;
        }
        if let Some(ref w) = self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(ref h) = self.having {
            write!(f, " HAVING {}", h)?;
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(ref alias) = self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.object)?;
        if let Some(ref alias) = self.alias {
            write!(f, " AS {}", alias)?;
        }
        if !self.columns.is_empty() {
            write!(f, " (")?;
            write_list(f, &self.columns)?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for TableObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableObject::Identifier(name) => write!(f, "{}", name),
            TableObject::Dual => write!(f, "DUAL"),
            TableObject::Stdin => write!(f, "STDIN"),
            TableObject::Subquery(q) => write!(f, "({})", q),
            TableObject::Values(rows) => {
                write!(f, "(VALUES ")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(")?;
                    write_list(f, row)?;
                    write!(f, ")")?;
                }
                write!(f, ")")
            }
            TableObject::Join(join) => write!(f, "{}", join),
        }
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.left)?;
        if self.natural {
            write!(f, "NATURAL ")?;
        }
        write!(f, "{} JOIN {}", self.join_type, self.right)?;
        match &self.condition {
            Some(JoinCondition::On(e)) => write!(f, " ON {}", e),
            Some(JoinCondition::Using(cols)) => {
                write!(f, " USING (")?;
                write_list(f, cols)?;
                write!(f, ")")
            }
            None => Ok(()),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Cross => write!(f, "CROSS"),
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
            JoinType::Full => write!(f, "FULL"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{}", lit),
            Expression::Column { table, name } => match table {
                Some(t) => write!(f, "{}.{}", t, name),
                None => write!(f, "{}", name),
            },
            Expression::AllColumns => write!(f, "*"),
            Expression::TableColumns(t) => write!(f, "{}.*", t),
            Expression::Parentheses(e) => write!(f, "({})", e),
            Expression::Arithmetic { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expression::UnaryArithmetic { op, operand } => write!(f, "{}{}", op, operand),
            Expression::Concat(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Expression::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expression::Is {
                expr,
                value,
                negated,
            } => {
                write!(f, "{} IS ", expr)?;
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "{}", value)
            }
            Expression::Between {
                expr,
                low,
                high,
                negated,
            } => {
                write!(f, "{} ", expr)?;
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "BETWEEN {} AND {}", low, high)
            }
            Expression::Like {
                expr,
                pattern,
                negated,
            } => {
                write!(f, "{} ", expr)?;
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "LIKE {}", pattern)
            }
            Expression::In {
                expr,
                values,
                negated,
            } => {
                write!(f, "{} ", expr)?;
                if *negated {
                    write!(f, "NOT ")?;
                }
                write!(f, "IN {}", values)
            }
            Expression::Any { expr, op, values } => write!(f, "{} {} ANY {}", expr, op, values),
            Expression::All { expr, op, values } => write!(f, "{} {} ALL {}", expr, op, values),
            Expression::Exists(q) => write!(f, "EXISTS ({})", q),
            Expression::Subquery(q) => write!(f, "({})", q),
            Expression::RowValue(items) | Expression::ValueList(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Expression::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Aggregate {
                name,
                distinct,
                args,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::ListAggregate {
                name,
                distinct,
                args,
                order_by,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, args)?;
                write!(f, ")")?;
                if let Some(ob) = order_by {
                    write!(f, " WITHIN GROUP ({})", ob)?;
                }
                Ok(())
            }
            Expression::Analytic {
                name,
                distinct,
                args,
                partition_by,
                order_by,
            } => {
                write!(f, "{}(", name)?;
                if *distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, args)?;
                write!(f, ") OVER (")?;
                if !partition_by.is_empty() {
                    write!(f, "PARTITION BY ")?;
                    write_list(f, partition_by)?;
                    if order_by.is_some() {
                        write!(f, " ")?;
                    }
                }
                if let Some(ob) = order_by {
                    write!(f, "{}", ob)?;
                }
                write!(f, ")")
            }
            Expression::Case {
                operand,
                branches,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(o) = operand {
                    write!(f, " {}", o)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(e) = else_result {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expression::Logic { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expression::Not(e) => write!(f, "NOT {}", e),
            Expression::Variable(name) => write!(f, "@{}", name),
            Expression::VariableSubstitution { name, value } => write!(f, "@{} := {}", name, value),
        }
    }
}

impl fmt::Display for ArithmeticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticOperator::Add => write!(f, "+"),
            ArithmeticOperator::Subtract => write!(f, "-"),
            ArithmeticOperator::Multiply => write!(f, "*"),
            ArithmeticOperator::Divide => write!(f, "/"),
            ArithmeticOperator::Modulo => write!(f, "%"),
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Minus => write!(f, "-"),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(fl) => write!(f, "{}", fl),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Ternary(t) => write!(f, "{}", t),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

impl fmt::Display for OrderByClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORDER BY ")?;
        write_list(f, &self.items)
    }
}

impl fmt::Display for OrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(direction) = self.direction {
            write!(f, " {}", direction)?;
        }
        if let Some(nulls) = self.nulls {
            write!(f, " {}", nulls)?;
        }
        Ok(())
    }
}

impl fmt::Display for LimitClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LIMIT {}", self.value)?;
        if self.percent {
            write!(f, " PERCENT")?;
        }
        if self.with_ties {
            write!(f, " WITH TIES")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_text() {
        let expr = Expression::Arithmetic {
            left: Box::new(Expression::Column {
                table: Some("t".to_string()),
                name: "a".to_string(),
            }),
            op: ArithmeticOperator::Add,
            right: Box::new(Expression::Literal(Literal::Integer(1))),
        };
        assert_eq!(expr.to_string(), "t.a + 1");

        let agg = Expression::Aggregate {
            name: "COUNT".to_string(),
            distinct: true,
            args: vec![Expression::column("x")],
        };
        assert_eq!(agg.to_string(), "COUNT(DISTINCT x)");

        let rank = Expression::Analytic {
            name: "RANK".to_string(),
            distinct: false,
            args: Vec::new(),
            partition_by: vec![Expression::column("g")],
            order_by: Some(OrderByClause {
                items: vec![OrderItem {
                    expr: Expression::column("v"),
                    direction: Some(SortDirection::Desc),
                    nulls: None,
                }],
            }),
        };
        assert_eq!(rank.to_string(), "RANK() OVER (PARTITION BY g ORDER BY v DESC)");
    }

    #[test]
    fn test_contains_aggregate_stops_at_subqueries() {
        let agg = Expression::Aggregate {
            name: "SUM".to_string(),
            distinct: false,
            args: vec![Expression::column("x")],
        };
        let nested = Expression::Arithmetic {
            left: Box::new(agg),
            op: ArithmeticOperator::Multiply,
            right: Box::new(Expression::Literal(Literal::Integer(2))),
        };
        assert!(nested.contains_aggregate());
        assert!(!Expression::column("x").contains_aggregate());
    }

    #[test]
    fn test_string_literal_escaping() {
        let lit = Literal::String("it's".to_string());
        assert_eq!(lit.to_string(), "'it''s'");
    }
}
