/// Query executor
///
/// Runs SELECT queries through the view pipeline and owns the immutable
/// per-engine execution context.
use super::ast::{
    InlineTableDefinition, SelectBody, SelectEntity, SelectQuery, SetOperator, Table, TableObject, WithClause,
};
use super::filter::{Filter, InlineTable};
use super::function::FunctionRegistry;
use super::loader::TableLoader;
use super::record::Record;
use super::view::View;
use crate::error::{Error, Result};
use crate::value::{serialize_keys, DatetimeOptions};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Everything a statement needs that does not change while it runs.
#[derive(Debug)]
pub struct ExecutionContext {
    pub registry: FunctionRegistry,
    pub loader: Arc<dyn TableLoader>,
    pub datetime: DatetimeOptions,
    /// Upper bound on parallel join chunks
    pub cpu: usize,
}

impl ExecutionContext {
    /// Creates a context with the built-in functions and default settings.
    pub fn new(loader: Arc<dyn TableLoader>) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            loader,
            datetime: DatetimeOptions::default(),
            cpu: default_cpu(),
        }
    }

    pub fn with_datetime(mut self, datetime: DatetimeOptions) -> Self {
        self.datetime = datetime;
        self
    }

    pub fn with_cpu(mut self, cpu: usize) -> Self {
        self.cpu = cpu.max(1);
        self
    }
}

/// Available parallelism minus one when more than two are available, at least 1.
pub fn default_cpu() -> usize {
    let available = std::thread::available_parallelism().map_or(1, |n| n.get());
    if available > 2 {
        available - 1
    } else {
        1
    }
}

/// Runs a complete query and returns its fixed view.
pub fn select(query: &SelectQuery, filter: &Filter<'_>) -> Result<View> {
    let filter = match &query.with {
        Some(with) => with_clause(with, filter)?,
        None => filter.clone(),
    };

    let mut view = select_body(&query.body, &filter)?;
    if let Some(order_by) = &query.order_by {
        view.order_by(order_by, &filter)?;
    }
    if let Some(offset) = &query.offset {
        view.offset(offset, &filter)?;
    }
    if let Some(limit) = &query.limit {
        view.limit(limit, &filter)?;
    }
    view.fix();
    Ok(view)
}

fn select_body(body: &SelectBody, filter: &Filter<'_>) -> Result<View> {
    match body {
        SelectBody::Entity(entity) => select_entity(entity, filter),
        SelectBody::Query(query) => select(query, filter),
        SelectBody::SetOperation {
            left,
            operator,
            all,
            right,
        } => {
            let mut lhs = select_body(left, filter)?;
            lhs.fix();
            let mut rhs = select_body(right, filter)?;
            rhs.fix();

            let expression = right.to_string();
            match operator {
                SetOperator::Union => lhs.union(rhs, *all, &expression, filter)?,
                SetOperator::Except => lhs.except(rhs, *all, &expression, filter)?,
                SetOperator::Intersect => lhs.intersect(rhs, *all, &expression, filter)?,
            }
            debug!(operator = %operator, all = *all, records = lhs.len(), "set operation");
            Ok(lhs)
        }
    }
}

/// Load, Where, GroupBy, Having, Select and Distinct. The view is left
/// unfixed so ORDER BY can still reach columns outside the select list.
fn select_entity(entity: &SelectEntity, filter: &Filter<'_>) -> Result<View> {
    let mut view = View::load(&entity.from, filter)?;
    if let Some(condition) = &entity.where_clause {
        view.where_clause(condition, filter)?;
    }
    if !entity.group_by.is_empty() {
        view.group_by(&entity.group_by, filter)?;
    }
    if let Some(condition) = &entity.having {
        view.having(condition, filter)?;
    }
    view.select(&entity.fields, filter)?;
    if entity.distinct {
        view.distinct(filter)?;
    }
    Ok(view)
}

fn with_clause<'a>(with: &WithClause, filter: &Filter<'a>) -> Result<Filter<'a>> {
    let mut current = filter.clone();
    for definition in &with.tables {
        let view = match &definition.query.body {
            SelectBody::SetOperation {
                left,
                operator: SetOperator::Union,
                all,
                right,
            } if with.recursive && reads_table(right, &definition.name) => {
                recursive_table(definition, left, right, *all, &current)?
            }
            _ => {
                let view = select(&definition.query, &current)?;
                inline_view(definition, view)?
            }
        };
        debug!(table = %definition.name, records = view.len(), "inline table ready");
        current = current.with_inline_table(InlineTable {
            name: definition.name.clone(),
            view,
        });
    }
    Ok(current)
}

/// True if a FROM clause of `body` names `table`.
fn reads_table(body: &SelectBody, table: &str) -> bool {
    fn in_table(t: &Table, table: &str) -> bool {
        match &t.object {
            TableObject::Identifier(name) => name.eq_ignore_ascii_case(table),
            TableObject::Subquery(q) => reads_table(&q.body, table),
            TableObject::Join(j) => in_table(&j.left, table) || in_table(&j.right, table),
            _ => false,
        }
    }
    match body {
        SelectBody::Entity(e) => e.from.iter().any(|t| in_table(t, table)),
        SelectBody::Query(q) => reads_table(&q.body, table),
        SelectBody::SetOperation { left, right, .. } => reads_table(left, table) || reads_table(right, table),
    }
}

/// Relabels a query result as the inline table it defines.
fn inline_view(definition: &InlineTableDefinition, view: View) -> Result<View> {
    if !definition.columns.is_empty() && definition.columns.len() != view.header.len() {
        return Err(Error::InlineTableFieldLength {
            name: definition.name.clone(),
            expected: definition.columns.len(),
        });
    }
    let header = view.header.as_table(&definition.name, &definition.columns);
    Ok(View::new(header, view.records))
}

/// Evaluates `anchor UNION [ALL] step` iteratively. Each step sees only the
/// rows produced by the previous iteration; iteration ends when a step
/// produces nothing new.
fn recursive_table(
    definition: &InlineTableDefinition,
    anchor: &SelectBody,
    step: &SelectBody,
    all: bool,
    filter: &Filter<'_>,
) -> Result<View> {
    let mut first = select_body(anchor, filter)?;
    first.fix();
    let result = inline_view(definition, first)?;
    let header = result.header;
    let width = header.len();

    let options = filter.datetime();
    let mut seen = HashSet::new();
    let mut fresh = |records: Vec<Record>| -> Vec<Record> {
        if all {
            return records;
        }
        records
            .into_iter()
            .filter(|r| seen.insert(serialize_keys(&r.values(), options)))
            .collect()
    };

    let mut working = fresh(result.records);
    let mut records = working.clone();
    let mut iteration = 0;
    while !working.is_empty() {
        iteration += 1;
        let previous = InlineTable {
            name: definition.name.clone(),
            view: View::new(header.clone(), std::mem::take(&mut working)),
        };
        let mut next = select_body(step, &filter.with_recursive(previous))?;
        next.fix();
        if next.header.len() != width {
            return Err(Error::CombinedSetFieldLength {
                expression: step.to_string(),
                expected: width,
            });
        }
        working = fresh(next.records);
        debug!(table = %definition.name, iteration, records = working.len(), "recursive iteration");
        records.extend(working.iter().cloned());
    }

    Ok(View::new(header, records))
}

/// Runs the query of a declared cursor and stores its result in the scope.
pub fn open_cursor(name: &str, filter: &Filter<'_>) -> Result<()> {
    let query = filter.scope().cursor_query(name)?;
    let view = select(&query, filter)?;
    debug!(cursor = name, records = view.len(), "cursor opened");
    filter.scope().set_cursor_view(name, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::Statement;
    use crate::query::loader::InMemoryCatalog;
    use crate::query::parser::parse;
    use crate::query::scope::{FetchPosition, Scope};
    use crate::value::Primary;

    fn filter() -> Filter<'static> {
        let catalog = InMemoryCatalog::new();
        catalog
            .insert(
                "emp",
                &["id", "dept", "salary"],
                vec![
                    vec![Primary::Integer(1), Primary::from("a"), Primary::Integer(100)],
                    vec![Primary::Integer(2), Primary::from("b"), Primary::Integer(200)],
                    vec![Primary::Integer(3), Primary::from("a"), Primary::Integer(300)],
                ],
            )
            .unwrap();
        let context = ExecutionContext::new(Arc::new(catalog)).with_cpu(2);
        Filter::new(Arc::new(context), Scope::new())
    }

    fn query(sql: &str) -> SelectQuery {
        match parse(sql).unwrap() {
            Statement::Select(q) => q,
        }
    }

    fn run(sql: &str) -> Result<View> {
        select(&query(sql), &filter())
    }

    fn ints(rows: &[&[i64]]) -> Vec<Vec<Primary>> {
        rows.iter()
            .map(|r| r.iter().map(|&i| Primary::Integer(i)).collect())
            .collect()
    }

    #[test]
    fn test_pipeline_order() {
        let view = run("SELECT dept, SUM(salary) AS total FROM emp GROUP BY dept ORDER BY total DESC").unwrap();
        assert_eq!(view.labels(), vec!["dept", "total"]);
        assert_eq!(
            view.rows(),
            vec![
                vec![Primary::from("a"), Primary::Integer(400)],
                vec![Primary::from("b"), Primary::Integer(200)],
            ]
        );
    }

    #[test]
    fn test_order_by_column_outside_select_list() {
        let view = run("SELECT id FROM emp ORDER BY salary DESC LIMIT 2").unwrap();
        assert_eq!(view.rows(), ints(&[&[3], &[2]]));
    }

    #[test]
    fn test_set_operations() {
        let view = run("SELECT dept FROM emp UNION SELECT 'c'").unwrap();
        assert_eq!(view.len(), 3);
        let view = run("SELECT id FROM emp EXCEPT SELECT 2").unwrap();
        assert_eq!(view.rows(), ints(&[&[1], &[3]]));
        let err = run("SELECT id FROM emp UNION SELECT 1, 2").unwrap_err();
        assert!(matches!(err, Error::CombinedSetFieldLength { expected: 1, .. }));
    }

    #[test]
    fn test_inline_tables() {
        let view = run("WITH t (n) AS (SELECT id FROM emp WHERE id > 1) SELECT n FROM t").unwrap();
        assert_eq!(view.rows(), ints(&[&[2], &[3]]));
        let err = run("WITH t (a, b) AS (SELECT id FROM emp) SELECT * FROM t").unwrap_err();
        assert!(matches!(err, Error::InlineTableFieldLength { expected: 2, .. }));
    }

    #[test]
    fn test_recursive_inline_table() {
        let view = run(
            "WITH RECURSIVE t (n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t WHERE n < 5) SELECT n FROM t",
        )
        .unwrap();
        assert_eq!(view.rows(), ints(&[&[1], &[2], &[3], &[4], &[5]]));

        // Without ALL a repeated row ends the recursion.
        let view = run("WITH RECURSIVE t (n) AS (SELECT 1 UNION SELECT 1 FROM t) SELECT n FROM t").unwrap();
        assert_eq!(view.rows(), ints(&[&[1]]));
    }

    #[test]
    fn test_cursor_lifecycle() {
        let f = filter();
        f.scope().declare_cursor("cur", query("SELECT id FROM emp")).unwrap();
        open_cursor("cur", &f).unwrap();
        assert!(matches!(open_cursor("cur", &f), Err(Error::CursorAlreadyOpen(_))));
        assert_eq!(f.scope().cursor_count("cur").unwrap(), 3);
        assert_eq!(
            f.scope().fetch_cursor("cur", FetchPosition::Last).unwrap(),
            Some(vec![Primary::Integer(3)])
        );
        f.scope().close_cursor("cur").unwrap();
        assert!(!f.scope().is_cursor_open("cur").unwrap());
    }
}
