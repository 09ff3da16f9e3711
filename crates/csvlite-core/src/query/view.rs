/// Relational view pipeline
///
/// A `View` is the working table of one query. Each stage transforms it in
/// place, in the fixed order Load, Where, GroupBy, Having, Select, Distinct,
/// OrderBy, Offset, Limit and Fix. Stages take the filter of the enclosing
/// query so that correlated references and inline tables resolve.
use super::analytic;
use super::ast::{Expression, Field, LimitClause, Literal, OrderByClause, Table, TableObject};
use super::executor;
use super::filter::Filter;
use super::header::{Header, HeaderField};
use super::join;
use super::record::{Cell, Record};
use crate::error::{Error, Result};
use crate::value::{equivalent, serialize_keys, Primary, SortValues};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize)]
pub struct View {
    pub header: Header,
    pub records: Vec<Record>,
    #[serde(skip)]
    is_grouped: bool,
    #[serde(skip)]
    select_fields: Option<Vec<usize>>,
    #[serde(skip)]
    sort_values: Option<Vec<SortValues>>,
    #[serde(skip)]
    offset: usize,
}

impl View {
    pub fn new(header: Header, records: Vec<Record>) -> Self {
        View {
            header,
            records,
            ..Default::default()
        }
    }

    /// The one-row, one-column table used when a query has no FROM clause.
    pub fn dual() -> Self {
        View::new(Header::dual(), vec![Record::nulls(1)])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_grouped(&self) -> bool {
        self.is_grouped
    }

    /// Labels of the columns, as shown to users.
    pub fn labels(&self) -> Vec<String> {
        self.header.labels()
    }

    /// Representative values of every record.
    pub fn rows(&self) -> Vec<Vec<Primary>> {
        self.records.iter().map(Record::values).collect()
    }

    fn binding<'b>(&'b self, filter: &Filter<'b>, index: usize) -> Filter<'b> {
        filter.with_binding(&self.header, &self.records[index], self.is_grouped)
    }

    /// Evaluates `expr` once per record.
    fn evaluate_each(&self, expr: &Expression, filter: &Filter<'_>) -> Result<Vec<Primary>> {
        (0..self.records.len())
            .map(|i| self.binding(filter, i).evaluate(expr))
            .collect()
    }

    // Load

    /// Builds the working table of a FROM clause. Several items are cross joined
    /// left to right; no item at all reads from DUAL.
    pub fn load(tables: &[Table], filter: &Filter<'_>) -> Result<View> {
        let mut items = tables.iter();
        let Some(first) = items.next() else {
            return Ok(View::dual());
        };

        let mut view = View::load_table(first, filter)?;
        for table in items {
            let right = View::load_table(table, filter)?;
            view = join::cross_join(view, right);
        }
        debug!(stage = "load", records = view.len(), fields = view.header.len(), "view loaded");
        Ok(view)
    }

    pub(crate) fn load_table(table: &Table, filter: &Filter<'_>) -> Result<View> {
        let alias = table.alias.as_deref();
        match &table.object {
            TableObject::Identifier(name) => {
                let reference = alias.unwrap_or(name);
                if let Some(inline) = filter.inline_table(name) {
                    return Ok(View::new(
                        inline.view.header.as_table(reference, &[]),
                        inline.view.records.clone(),
                    ));
                }
                if let Some(view) = filter.scope().get_view(name)? {
                    return Ok(View::new(view.header.as_table(reference, &[]), view.records));
                }
                let (header, records) = filter.context().loader.load_table(name)?;
                let header = match alias {
                    Some(a) => header.as_table(a, &[]),
                    None => header,
                };
                Ok(View::new(header, records))
            }
            TableObject::Dual => Ok(View::dual()),
            TableObject::Stdin => {
                let (header, records) = filter.context().loader.load_external_input()?;
                let header = match alias {
                    Some(a) => header.as_table(a, &[]),
                    None => header,
                };
                Ok(View::new(header, records))
            }
            TableObject::Subquery(query) => {
                let view = executor::select(query, filter)?;
                let reference = alias.unwrap_or("");
                if !table.columns.is_empty() && table.columns.len() != view.header.len() {
                    return Err(Error::FieldLengthNotMatch(reference.to_string()));
                }
                Ok(View::new(view.header.as_table(reference, &table.columns), view.records))
            }
            TableObject::Values(rows) => View::load_values(rows, alias.unwrap_or(""), &table.columns, filter),
            TableObject::Join(j) => join::load_join(j, filter),
        }
    }

    fn load_values(rows: &[Vec<Expression>], reference: &str, columns: &[String], filter: &Filter<'_>) -> Result<View> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != width {
                return Err(Error::RowValueLengthMismatch {
                    expression: Expression::RowValue(row.clone()).to_string(),
                    expected: width,
                });
            }
            let values = row
                .iter()
                .map(|e| filter.evaluate(e))
                .collect::<Result<Vec<_>>>()?;
            records.push(Record::new(values));
        }

        if !columns.is_empty() && columns.len() != width {
            return Err(Error::FieldLengthNotMatch(reference.to_string()));
        }
        let names: Vec<String> = if columns.is_empty() {
            (1..=width).map(|i| format!("c{}", i)).collect()
        } else {
            columns.to_vec()
        };
        Ok(View::new(Header::new(reference, &names[..]), records))
    }

    // Where

    fn matching_indices(&self, condition: &Expression, filter: &Filter<'_>) -> Result<Vec<usize>> {
        let mut indices = Vec::new();
        for i in 0..self.records.len() {
            if self.binding(filter, i).evaluate(condition)?.ternary().is_true() {
                indices.push(i);
            }
        }
        Ok(indices)
    }

    fn extract(&mut self, indices: &[usize]) {
        let mut records = std::mem::take(&mut self.records);
        let mut kept = Vec::with_capacity(indices.len());
        for &i in indices.iter().rev() {
            kept.push(records.swap_remove(i));
        }
        kept.reverse();
        self.records = kept;
    }

    /// Keeps the records for which `condition` is TRUE.
    pub fn where_clause(&mut self, condition: &Expression, filter: &Filter<'_>) -> Result<()> {
        let indices = self.matching_indices(condition, filter)?;
        self.extract(&indices);
        debug!(stage = "where", records = self.len(), "filtered");
        Ok(())
    }

    // GroupBy

    /// Groups records by the values of `items`, in first-occurrence order.
    pub fn group_by(&mut self, items: &[Expression], filter: &Filter<'_>) -> Result<()> {
        let options = filter.datetime().clone();

        let mut keys: Vec<Vec<Primary>> = Vec::with_capacity(self.records.len());
        for i in 0..self.records.len() {
            let f = self.binding(filter, i);
            keys.push(items.iter().map(|item| f.evaluate(item)).collect::<Result<Vec<_>>>()?);
        }

        // Expressions other than plain columns become computed key columns.
        let mut key_columns = Vec::new();
        for (k, item) in items.iter().enumerate() {
            match item {
                Expression::Column { table, name } => {
                    if let Some(idx) = self.header.find(table.as_deref(), name)? {
                        self.header.fields[idx].is_group_key = true;
                    }
                }
                _ => {
                    let text = item.to_string();
                    if self.header.find_computed(&text).is_none() {
                        let idx = self.header.add_computed(text, None);
                        self.header.fields[idx].is_group_key = true;
                        key_columns.push(k);
                    }
                }
            }
        }
        for (record, key) in self.records.iter_mut().zip(&keys) {
            for &k in &key_columns {
                record.push(Cell::new(key[k].clone()));
            }
        }

        let mut groups: Vec<(Vec<Primary>, Vec<usize>)> = Vec::new();
        for (i, key) in keys.into_iter().enumerate() {
            let found = groups.iter_mut().find(|(group_key, _)| {
                group_key
                    .iter()
                    .zip(&key)
                    .all(|(a, b)| equivalent(a, b, &options).is_true())
            });
            match found {
                Some((_, members)) => members.push(i),
                None => groups.push((key, vec![i])),
            }
        }

        let records = std::mem::take(&mut self.records);
        self.records = groups
            .iter()
            .map(|(_, members)| group_record(&records, members, self.header.len()))
            .collect();
        self.is_grouped = true;
        debug!(stage = "group_by", groups = self.len(), "grouped");
        Ok(())
    }

    /// Treats the whole view as one group. An empty view becomes one empty group.
    fn group_all(&mut self) {
        let records = std::mem::take(&mut self.records);
        let members: Vec<usize> = (0..records.len()).collect();
        self.records = vec![group_record(&records, &members, self.header.len())];
        self.is_grouped = true;
        debug!(members = members.len(), "grouped the whole view implicitly");
    }

    // Having

    /// Keeps the groups for which `condition` is TRUE. An ungrouped view is
    /// grouped as a whole when the condition aggregates.
    pub fn having(&mut self, condition: &Expression, filter: &Filter<'_>) -> Result<()> {
        let indices = match self.matching_indices(condition, filter) {
            Err(e) if e.is_not_grouping() && !self.is_grouped => {
                self.group_all();
                self.matching_indices(condition, filter)?
            }
            other => other?,
        };
        self.extract(&indices);
        debug!(stage = "having", records = self.len(), "filtered groups");
        Ok(())
    }

    // Select

    /// Index of a column referenced by a field or sort key, if this view has it.
    fn column_index(&self, table: Option<&str>, name: &str) -> Result<Option<usize>> {
        let Some(idx) = self.header.find(table, name)? else {
            return Ok(None);
        };
        let field = &self.header.fields[idx];
        if self.is_grouped && field.is_from_table && !field.is_group_key && !self.records.is_empty() {
            let label = match table {
                Some(t) => format!("{}.{}", t, name),
                None => name.to_string(),
            };
            return Err(Error::FieldNotGroupKey(label));
        }
        Ok(Some(idx))
    }

    /// Computes window functions in `exprs` that are not computed yet.
    fn run_analytic(&mut self, exprs: &[&Expression], filter: &Filter<'_>) -> Result<()> {
        let mut calls = Vec::new();
        for expr in exprs {
            expr.collect_analytic(&mut calls);
        }
        for call in calls {
            if self.header.find_computed(&call.to_string()).is_none() {
                analytic::evaluate(self, call, filter)?;
            }
        }
        Ok(())
    }

    /// Index of the computed column holding `expr`, evaluating it if needed.
    fn computed_column(&mut self, expr: &Expression, alias: Option<&str>, filter: &Filter<'_>) -> Result<usize> {
        let text = expr.to_string();
        let idx = match self.header.find_computed(&text) {
            Some(idx) => idx,
            None => {
                let values = self.evaluate_each(expr, filter)?;
                for (record, value) in self.records.iter_mut().zip(values) {
                    record.push(Cell::new(value));
                }
                self.header.add_computed(text, None)
            }
        };
        if let Some(a) = alias {
            add_alias(&mut self.header.fields[idx], a);
        }
        Ok(idx)
    }

    fn resolve_fields(&mut self, fields: &[Field], filter: &Filter<'_>) -> Result<Vec<usize>> {
        let exprs: Vec<&Expression> = fields.iter().map(|f| &f.expr).collect();
        self.run_analytic(&exprs, filter)?;

        let mut indices = Vec::new();
        for field in fields {
            match &field.expr {
                Expression::AllColumns => indices.extend(self.header.table_columns()),
                Expression::TableColumns(t) => indices.extend(self.header.columns_of(t)?),
                Expression::Column { table, name } => match self.column_index(table.as_deref(), name)? {
                    Some(idx) => {
                        if let Some(a) = &field.alias {
                            add_alias(&mut self.header.fields[idx], a);
                        }
                        indices.push(idx);
                    }
                    None => indices.push(self.computed_column(&field.expr, field.alias.as_deref(), filter)?),
                },
                expr => indices.push(self.computed_column(expr, field.alias.as_deref(), filter)?),
            }
        }
        Ok(indices)
    }

    /// Resolves the select list. Computed fields are appended as new columns;
    /// the projection itself is applied by [`View::fix`].
    pub fn select(&mut self, fields: &[Field], filter: &Filter<'_>) -> Result<()> {
        if !self.is_grouped && fields.iter().any(|f| f.expr.contains_aggregate()) {
            self.group_all();
        }

        let width = self.header.len();
        let indices = match self.resolve_fields(fields, filter) {
            Err(e) if e.is_not_grouping() && !self.is_grouped => {
                self.header.fields.truncate(width);
                for record in &mut self.records {
                    record.cells_mut().truncate(width);
                }
                self.group_all();
                self.resolve_fields(fields, filter)?
            }
            other => other?,
        };
        self.select_fields = Some(indices);
        debug!(stage = "select", records = self.len(), fields = fields.len(), "selected");
        Ok(())
    }

    // Distinct

    /// Projects to the selected fields and drops duplicate records.
    pub fn distinct(&mut self, filter: &Filter<'_>) -> Result<()> {
        let fields = self
            .select_fields
            .take()
            .unwrap_or_else(|| (0..self.header.len()).collect());
        self.header = self.header.project(&fields);

        let options = filter.datetime();
        let mut seen = HashSet::new();
        let records = std::mem::take(&mut self.records);
        self.records = records
            .into_iter()
            .map(|r| r.project(&fields))
            .filter(|r| seen.insert(serialize_keys(&r.values(), options)))
            .collect();
        self.select_fields = Some((0..fields.len()).collect());
        debug!(stage = "distinct", records = self.len(), "deduplicated");
        Ok(())
    }

    // OrderBy

    fn sort_key_index(&mut self, expr: &Expression, filter: &Filter<'_>) -> Result<usize> {
        match expr {
            Expression::Literal(Literal::Integer(n)) => {
                let position = usize::try_from(*n).ok().and_then(|n| n.checked_sub(1));
                let idx = match (&self.select_fields, position) {
                    (Some(fields), Some(p)) => fields.get(p).copied(),
                    (None, Some(p)) if p < self.header.len() => Some(p),
                    _ => None,
                };
                idx.ok_or_else(|| Error::FieldNotExist(n.to_string()))
            }
            Expression::Column { table, name } => match self.column_index(table.as_deref(), name)? {
                Some(idx) => Ok(idx),
                None => self.computed_column(expr, None, filter),
            },
            _ => {
                self.run_analytic(&[expr], filter)?;
                self.computed_column(expr, None, filter)
            }
        }
    }

    /// Stable multi-key sort.
    pub fn order_by(&mut self, clause: &OrderByClause, filter: &Filter<'_>) -> Result<()> {
        let mut indices = Vec::with_capacity(clause.items.len());
        for item in &clause.items {
            indices.push(self.sort_key_index(&item.expr, filter)?);
        }
        let directions: Vec<_> = clause.items.iter().map(|i| i.sort_direction()).collect();
        let nulls: Vec<_> = clause.items.iter().map(|i| i.null_position()).collect();

        let options = filter.datetime();
        let records = std::mem::take(&mut self.records);
        let keyed: Vec<(SortValues, Record)> = records
            .into_iter()
            .map(|r| {
                let keys: Vec<Primary> = indices.iter().map(|&i| r.value(i).clone()).collect();
                (SortValues::new(&keys, options), r)
            })
            .collect();

        let sorted = stable_sort_by_less(keyed, &|a: &(SortValues, Record), b: &(SortValues, Record)| {
            a.0.less(&b.0, &directions, &nulls)
        });
        let (sort_values, records): (Vec<_>, Vec<_>) = sorted.into_iter().unzip();
        self.records = records;
        self.sort_values = Some(sort_values);
        debug!(stage = "order_by", records = self.len(), keys = indices.len(), "sorted");
        Ok(())
    }

    // Offset and Limit

    /// Drops the first `n` records. Negative values count as zero.
    pub fn offset(&mut self, expr: &Expression, filter: &Filter<'_>) -> Result<()> {
        let n = filter
            .evaluate(expr)?
            .to_integer()
            .ok_or_else(|| Error::InvalidOffsetNumber(expr.to_string()))?;
        let n = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
        let cut = n.min(self.records.len());
        self.records.drain(..cut);
        if let Some(sv) = &mut self.sort_values {
            sv.drain(..cut.min(sv.len()));
        }
        self.offset = n;
        debug!(stage = "offset", offset = n, records = self.len(), "offset applied");
        Ok(())
    }

    /// Keeps the first records by count or percentage, extended to the last
    /// tie of the boundary record when WITH TIES is set.
    pub fn limit(&mut self, clause: &LimitClause, filter: &Filter<'_>) -> Result<()> {
        let value = filter.evaluate(&clause.value)?;
        let mut count = if clause.percent {
            let p = value
                .to_float()
                .ok_or_else(|| Error::InvalidLimitPercentage(clause.value.to_string()))?;
            let p = p.clamp(0.0, 100.0);
            (((self.records.len() + self.offset) as f64) * p / 100.0).ceil() as usize
        } else {
            let n = value
                .to_integer()
                .ok_or_else(|| Error::InvalidLimitNumber(clause.value.to_string()))?;
            usize::try_from(n.max(0)).unwrap_or(usize::MAX)
        };

        if clause.with_ties && count > 0 {
            if let Some(sv) = &self.sort_values {
                while count < sv.len() && sv[count].equivalent_to(&sv[count - 1]) {
                    count += 1;
                }
            }
        }

        if count < self.records.len() {
            self.records.truncate(count);
            if let Some(sv) = &mut self.sort_values {
                sv.truncate(count);
            }
        }
        debug!(stage = "limit", records = self.len(), "limit applied");
        Ok(())
    }

    // Fix

    /// Applies the pending projection, flattens grouped cells and resets all
    /// pipeline state. A fixed view is a flat table.
    pub fn fix(&mut self) {
        if let Some(fields) = self.select_fields.take() {
            self.header = self.header.project(&fields);
            for record in &mut self.records {
                *record = record.project(&fields);
            }
        }
        for record in &mut self.records {
            for cell in record.cells_mut() {
                cell.collapse();
            }
        }
        self.is_grouped = false;
        self.sort_values = None;
        self.offset = 0;
    }

    // Set operations

    fn check_combinable(&self, other: &View, expression: &str) -> Result<()> {
        if self.header.len() != other.header.len() {
            return Err(Error::CombinedSetFieldLength {
                expression: expression.to_string(),
                expected: self.header.len(),
            });
        }
        Ok(())
    }

    /// Appends the records of `other`; duplicates are removed unless `all`.
    pub fn union(&mut self, other: View, all: bool, expression: &str, filter: &Filter<'_>) -> Result<()> {
        self.check_combinable(&other, expression)?;
        self.records.extend(other.records);
        if !all {
            let options = filter.datetime();
            let mut seen = HashSet::new();
            self.records
                .retain(|r| seen.insert(serialize_keys(&r.values(), options)));
        }
        Ok(())
    }

    /// Keeps records not found in `other`.
    pub fn except(&mut self, other: View, all: bool, expression: &str, filter: &Filter<'_>) -> Result<()> {
        self.check_combinable(&other, expression)?;
        let options = filter.datetime();
        let mut counts = key_counts(&other, filter);
        let mut seen = HashSet::new();
        self.records.retain(|r| {
            let key = serialize_keys(&r.values(), options);
            if all {
                match counts.get_mut(&key) {
                    Some(c) if *c > 0 => {
                        *c -= 1;
                        false
                    }
                    _ => true,
                }
            } else {
                !counts.contains_key(&key) && seen.insert(key)
            }
        });
        Ok(())
    }

    /// Keeps records also found in `other`.
    pub fn intersect(&mut self, other: View, all: bool, expression: &str, filter: &Filter<'_>) -> Result<()> {
        self.check_combinable(&other, expression)?;
        let options = filter.datetime();
        let mut counts = key_counts(&other, filter);
        let mut seen = HashSet::new();
        self.records.retain(|r| {
            let key = serialize_keys(&r.values(), options);
            match counts.get_mut(&key) {
                Some(c) if all && *c > 0 => {
                    *c -= 1;
                    true
                }
                Some(_) if !all => seen.insert(key),
                _ => false,
            }
        });
        Ok(())
    }
}

fn key_counts(view: &View, filter: &Filter<'_>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for record in &view.records {
        *counts
            .entry(serialize_keys(&record.values(), filter.datetime()))
            .or_insert(0) += 1;
    }
    counts
}

fn add_alias(field: &mut HeaderField, alias: &str) {
    if !field.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
        field.aliases.push(alias.to_string());
    }
}

/// One grouped record holding, per column, the values of every member.
fn group_record(records: &[Record], members: &[usize], width: usize) -> Record {
    let cells = (0..width)
        .map(|j| Cell::grouped(members.iter().map(|&i| records[i].value(j).clone()).collect()))
        .collect();
    Record::from_cells(cells)
}

/// Stable merge sort driven by a strict "less than" that need not be a total order.
pub(crate) fn stable_sort_by_less<T, F>(items: Vec<T>, less: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> bool,
{
    if items.len() <= 1 {
        return items;
    }
    let mut right = items;
    let left: Vec<T> = right.drain(..right.len() / 2).collect();
    let left = stable_sort_by_less(left, less);
    let right = stable_sort_by_less(right, less);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    loop {
        let take_right = match (l.peek(), r.peek()) {
            (Some(a), Some(b)) => less(b, a),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        if take_right {
            merged.extend(r.next());
        } else {
            merged.extend(l.next());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::{OrderItem, Statement};
    use crate::query::executor::ExecutionContext;
    use crate::query::loader::InMemoryCatalog;
    use crate::query::parser::{parse, Parser};
    use crate::query::scope::Scope;
    use crate::value::{NullPosition, SortDirection};
    use std::sync::Arc;

    fn filter() -> Filter<'static> {
        let context = ExecutionContext::new(Arc::new(InMemoryCatalog::new()));
        Filter::new(Arc::new(context), Scope::new())
    }

    fn expr(sql: &str) -> Expression {
        Parser::new(sql).unwrap().parse_expression().unwrap()
    }

    fn view(columns: &[&str], rows: Vec<Vec<Primary>>) -> View {
        View::new(
            Header::new("t", columns),
            rows.into_iter().map(Record::new).collect(),
        )
    }

    fn fields(sql: &str) -> Vec<Field> {
        match parse(&format!("SELECT {}", sql)).unwrap() {
            Statement::Select(q) => match q.body {
                crate::query::ast::SelectBody::Entity(e) => e.fields,
                _ => unreachable!(),
            },
        }
    }

    fn order(column: &str, direction: SortDirection, nulls: Option<NullPosition>) -> OrderByClause {
        OrderByClause {
            items: vec![OrderItem {
                expr: Expression::column(column),
                direction: Some(direction),
                nulls,
            }],
        }
    }

    #[test]
    fn test_group_by_preserves_first_occurrence() {
        let f = filter();
        let mut v = view(
            &["col1", "v"],
            vec![
                vec![Primary::from("a"), Primary::Integer(1)],
                vec![Primary::from("b"), Primary::Integer(2)],
                vec![Primary::from("a"), Primary::Integer(3)],
            ],
        );
        v.group_by(&[expr("col1")], &f).unwrap();
        assert!(v.is_grouped());
        assert_eq!(v.len(), 2);
        assert_eq!(v.records[0].value(0), &Primary::from("a"));
        assert_eq!(
            v.records[0].cell(1).unwrap().values(),
            &[Primary::Integer(1), Primary::Integer(3)]
        );
        assert_eq!(v.records[1].cell(1).unwrap().values(), &[Primary::Integer(2)]);
        assert!(v.header.fields[0].is_group_key);
        assert!(!v.header.fields[1].is_group_key);
    }

    #[test]
    fn test_select_aggregate_groups_implicitly() {
        let f = filter();
        let mut v = view(&["n"], (1..=4).map(|i| vec![Primary::Integer(i)]).collect());
        v.select(&fields("COUNT(*), SUM(n) AS total"), &f).unwrap();
        v.fix();
        assert_eq!(v.rows(), vec![vec![Primary::Integer(4), Primary::Integer(10)]]);
        assert_eq!(v.labels(), vec!["COUNT(*)".to_string(), "total".to_string()]);
    }

    #[test]
    fn test_count_over_empty_view() {
        let f = filter();
        let mut v = view(&["n"], Vec::new());
        v.select(&fields("COUNT(*)"), &f).unwrap();
        v.fix();
        assert_eq!(v.rows(), vec![vec![Primary::Integer(0)]]);
    }

    #[test]
    fn test_having_recovers_implicit_group() {
        let f = filter();
        let mut v = view(&["n"], (1..=3).map(|i| vec![Primary::Integer(i)]).collect());
        v.having(&expr("COUNT(*) > 2"), &f).unwrap();
        assert!(v.is_grouped());
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn test_select_wildcard_and_non_group_key() {
        let f = filter();
        let mut v = view(&["a", "b"], vec![vec![Primary::Integer(1), Primary::Integer(2)]]);
        v.select(&fields("b, *"), &f).unwrap();
        v.fix();
        assert_eq!(v.labels(), vec!["b", "a", "b"]);

        let mut v = view(&["a", "b"], vec![vec![Primary::Integer(1), Primary::Integer(2)]]);
        v.group_by(&[expr("a")], &f).unwrap();
        assert!(matches!(v.select(&fields("b"), &f), Err(Error::FieldNotGroupKey(_))));
    }

    #[test]
    fn test_order_by_nulls_position() {
        let f = filter();
        let rows = vec![
            vec![Primary::Integer(2)],
            vec![Primary::Null],
            vec![Primary::Integer(1)],
        ];

        let mut v = view(&["c"], rows.clone());
        v.order_by(&order("c", SortDirection::Asc, Some(NullPosition::Last)), &f).unwrap();
        assert_eq!(v.rows(), vec![vec![Primary::Integer(1)], vec![Primary::Integer(2)], vec![Primary::Null]]);

        let mut v = view(&["c"], rows.clone());
        v.order_by(&order("c", SortDirection::Desc, Some(NullPosition::First)), &f).unwrap();
        assert_eq!(v.rows(), vec![vec![Primary::Null], vec![Primary::Integer(2)], vec![Primary::Integer(1)]]);

        let mut v = view(&["c"], rows);
        v.order_by(&order("c", SortDirection::Asc, None), &f).unwrap();
        assert_eq!(v.records[0].value(0), &Primary::Null);
    }

    #[test]
    fn test_order_by_is_stable() {
        let f = filter();
        let mut v = view(
            &["k", "id"],
            vec![
                vec![Primary::Integer(1), Primary::from("x")],
                vec![Primary::Integer(0), Primary::from("y")],
                vec![Primary::Integer(1), Primary::from("z")],
                vec![Primary::Integer(0), Primary::from("w")],
            ],
        );
        v.order_by(&order("k", SortDirection::Asc, None), &f).unwrap();
        let ids: Vec<Primary> = v.records.iter().map(|r| r.value(1).clone()).collect();
        assert_eq!(
            ids,
            vec![Primary::from("y"), Primary::from("w"), Primary::from("x"), Primary::from("z")]
        );
    }

    #[test]
    fn test_limit_with_ties() {
        let f = filter();
        let mut v = view(&["c"], [1, 1, 1, 2, 3].iter().map(|&i| vec![Primary::Integer(i)]).collect());
        v.order_by(&order("c", SortDirection::Asc, None), &f).unwrap();
        let clause = LimitClause {
            value: expr("2"),
            percent: false,
            with_ties: true,
        };
        v.limit(&clause, &f).unwrap();
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn test_offset_and_percent_limit() {
        let f = filter();
        let mut v = view(&["c"], (1..=10).map(|i| vec![Primary::Integer(i)]).collect());
        v.offset(&expr("2"), &f).unwrap();
        assert_eq!(v.records[0].value(0), &Primary::Integer(3));
        let clause = LimitClause {
            value: expr("25"),
            percent: true,
            with_ties: false,
        };
        v.limit(&clause, &f).unwrap();
        assert_eq!(v.len(), 3);

        let mut v = view(&["c"], vec![vec![Primary::Integer(1)]]);
        v.offset(&expr("-5"), &f).unwrap();
        assert_eq!(v.len(), 1);
        v.offset(&expr("9"), &f).unwrap();
        assert!(v.is_empty());
        assert!(matches!(v.offset(&expr("'x'"), &f), Err(Error::InvalidOffsetNumber(_))));
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let f = filter();
        let mut v = view(
            &["a", "b"],
            vec![
                vec![Primary::from("x"), Primary::Integer(1)],
                vec![Primary::from(" X "), Primary::Integer(2)],
                vec![Primary::from("y"), Primary::Integer(3)],
            ],
        );
        v.select(&fields("a"), &f).unwrap();
        v.distinct(&f).unwrap();
        v.fix();
        assert_eq!(v.rows(), vec![vec![Primary::from("x")], vec![Primary::from("y")]]);
    }

    #[test]
    fn test_set_operations() {
        let f = filter();
        let ints = |xs: &[i64]| view(&["c"], xs.iter().map(|&i| vec![Primary::Integer(i)]).collect());

        let mut v = ints(&[1, 2, 2]);
        v.union(ints(&[2, 3]), false, "", &f).unwrap();
        assert_eq!(v.len(), 3);

        let mut v = ints(&[1, 2, 2, 3]);
        v.except(ints(&[2]), true, "", &f).unwrap();
        assert_eq!(v.rows(), vec![vec![Primary::Integer(1)], vec![Primary::Integer(2)], vec![Primary::Integer(3)]]);

        let mut v = ints(&[1, 2, 2, 3]);
        v.intersect(ints(&[2, 3, 3]), false, "", &f).unwrap();
        assert_eq!(v.rows(), vec![vec![Primary::Integer(2)], vec![Primary::Integer(3)]]);

        let mut v = ints(&[1]);
        let wide = view(&["a", "b"], Vec::new());
        assert!(matches!(
            v.union(wide, true, "x", &f),
            Err(Error::CombinedSetFieldLength { expected: 1, .. })
        ));
    }

    #[test]
    fn test_stable_sort_with_incomparable_keys() {
        let items = vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')];
        let sorted = stable_sort_by_less(items, &|a: &(i32, char), b: &(i32, char)| a.0 < b.0);
        assert_eq!(sorted, vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    }
}
