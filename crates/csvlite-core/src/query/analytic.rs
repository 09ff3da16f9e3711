/// Analytic (window) functions
///
/// A window call is computed once for the whole view: records are stably
/// sorted by the call's ORDER BY, split into partitions by the PARTITION BY
/// tuple in first-occurrence order, and each partition yields one value per
/// member. The values land in a computed column named by the call's text.
use super::aggregate::{self, AggregateFn};
use super::ast::{Expression, Literal};
use super::filter::Filter;
use super::function::{check_arg_count, ordinal};
use super::header::Header;
use super::record::{Cell, Record};
use super::scope::{FunctionBody, UserDefinedFunction};
use super::view::{stable_sort_by_less, View};
use crate::error::{Error, Result};
use crate::value::{equivalent, Primary, SortValues};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The members of one partition, in window order.
pub struct Partition<'p> {
    header: &'p Header,
    records: Vec<&'p Record>,
    order_keys: Vec<SortValues>,
    is_grouped: bool,
}

impl<'p> Partition<'p> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when member `i` ties with the member before it. Without ORDER BY
    /// every member ties.
    pub fn is_peer(&self, i: usize) -> bool {
        i > 0 && self.order_keys[i].equivalent_to(&self.order_keys[i - 1])
    }

    /// Index of the last member tying with member `i`.
    fn last_peer(&self, i: usize) -> usize {
        let mut end = i;
        while end + 1 < self.len() && self.is_peer(end + 1) {
            end += 1;
        }
        end
    }

    /// Evaluates `expr` against every member.
    pub fn values(&self, expr: &Expression, filter: &Filter<'_>) -> Result<Vec<Primary>> {
        self.records
            .iter()
            .map(|r| filter.with_binding(self.header, r, self.is_grouped).evaluate(expr))
            .collect()
    }
}

/// A window routine producing one value per partition member.
pub trait AnalyticFunction: Send + Sync {
    /// Validates the arguments before any record is touched.
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()>;

    fn execute(&self, name: &str, partition: &Partition<'_>, args: &[Expression], filter: &Filter<'_>) -> Result<Vec<Primary>>;
}

/// Every built-in window routine, keyed by upper-case name.
pub fn builtin_functions() -> HashMap<&'static str, Box<dyn AnalyticFunction>> {
    let mut functions: HashMap<&'static str, Box<dyn AnalyticFunction>> = HashMap::new();
    functions.insert("ROW_NUMBER", Box::new(RowNumber));
    functions.insert("RANK", Box::new(Rank));
    functions.insert("DENSE_RANK", Box::new(DenseRank));
    functions.insert("CUME_DIST", Box::new(CumeDist));
    functions.insert("PERCENT_RANK", Box::new(PercentRank));
    functions.insert("NTILE", Box::new(Ntile));
    functions.insert("FIRST_VALUE", Box::new(FirstValue));
    functions.insert("LAST_VALUE", Box::new(LastValue));
    functions.insert("LAG", Box::new(Lag));
    functions.insert("LEAD", Box::new(Lead));
    functions
}

struct RowNumber;

impl AnalyticFunction for RowNumber {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 0, Some(0))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, _: &[Expression], _: &Filter<'_>) -> Result<Vec<Primary>> {
        Ok((1..=partition.len() as i64).map(Primary::Integer).collect())
    }
}

struct Rank;

impl AnalyticFunction for Rank {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 0, Some(0))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, _: &[Expression], _: &Filter<'_>) -> Result<Vec<Primary>> {
        let mut rank = 0;
        Ok((0..partition.len())
            .map(|i| {
                if !partition.is_peer(i) {
                    rank = i as i64 + 1;
                }
                Primary::Integer(rank)
            })
            .collect())
    }
}

struct DenseRank;

impl AnalyticFunction for DenseRank {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 0, Some(0))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, _: &[Expression], _: &Filter<'_>) -> Result<Vec<Primary>> {
        let mut rank = 0;
        Ok((0..partition.len())
            .map(|i| {
                if !partition.is_peer(i) {
                    rank += 1;
                }
                Primary::Integer(rank)
            })
            .collect())
    }
}

struct CumeDist;

impl AnalyticFunction for CumeDist {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 0, Some(0))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, _: &[Expression], _: &Filter<'_>) -> Result<Vec<Primary>> {
        let total = partition.len() as f64;
        Ok((0..partition.len())
            .map(|i| Primary::Float((partition.last_peer(i) + 1) as f64 / total))
            .collect())
    }
}

struct PercentRank;

impl AnalyticFunction for PercentRank {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 0, Some(0))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, _: &[Expression], _: &Filter<'_>) -> Result<Vec<Primary>> {
        let denominator = partition.len() as f64 - 1.0;
        let mut before = 0;
        Ok((0..partition.len())
            .map(|i| {
                if !partition.is_peer(i) {
                    before = i;
                }
                if denominator <= 0.0 {
                    Primary::Float(1.0)
                } else {
                    Primary::Float(before as f64 / denominator)
                }
            })
            .collect())
    }
}

struct Ntile;

impl AnalyticFunction for Ntile {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 1, Some(1))
    }

    fn execute(&self, name: &str, partition: &Partition<'_>, args: &[Expression], filter: &Filter<'_>) -> Result<Vec<Primary>> {
        let invalid = |message: &str| Error::FunctionInvalidArgument {
            function: name.to_string(),
            position: ordinal(0).to_string(),
            message: message.to_string(),
        };
        let tiles = filter
            .detached()
            .evaluate(&args[0])?
            .to_integer()
            .ok_or_else(|| invalid("an integer"))?;
        if tiles < 1 {
            return Err(invalid("greater than 0"));
        }

        let total = partition.len() as i64;
        let (mut per_tile, mut remainder) = (total / tiles, total % tiles);
        if per_tile < 1 {
            per_tile = 1;
            remainder = 0;
        }

        // The first `remainder` tiles take one extra member.
        let mut values = Vec::with_capacity(partition.len());
        let (mut tile, mut count) = (1, 0);
        for _ in 0..partition.len() {
            count += 1;
            if per_tile + 1 < count {
                tile += 1;
                count = 1;
            } else if per_tile + 1 == count {
                if remainder > 0 {
                    remainder -= 1;
                } else {
                    tile += 1;
                    count = 1;
                }
            }
            values.push(Primary::Integer(tile));
        }
        Ok(values)
    }
}

struct FirstValue;

impl AnalyticFunction for FirstValue {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 1, Some(1))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, args: &[Expression], filter: &Filter<'_>) -> Result<Vec<Primary>> {
        let values = partition.values(&args[0], filter)?;
        let first = values.first().cloned().unwrap_or_default();
        Ok(vec![first; values.len()])
    }
}

struct LastValue;

impl AnalyticFunction for LastValue {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 1, Some(1))
    }

    fn execute(&self, _: &str, partition: &Partition<'_>, args: &[Expression], filter: &Filter<'_>) -> Result<Vec<Primary>> {
        let values = partition.values(&args[0], filter)?;
        let last = values.last().cloned().unwrap_or_default();
        Ok(vec![last; values.len()])
    }
}

/// Offset and default of LAG and LEAD, evaluated without any bound record.
fn shift_arguments(name: &str, args: &[Expression], filter: &Filter<'_>) -> Result<(i64, Primary)> {
    let detached = filter.detached();
    let offset = match args.get(1) {
        Some(expr) => detached
            .evaluate(expr)?
            .to_integer()
            .ok_or_else(|| Error::FunctionInvalidArgument {
                function: name.to_string(),
                position: ordinal(1).to_string(),
                message: "an integer".to_string(),
            })?,
        None => 1,
    };
    let default = match args.get(2) {
        Some(expr) => detached.evaluate(expr)?,
        None => Primary::Null,
    };
    Ok((offset, default))
}

struct Lag;

impl AnalyticFunction for Lag {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 1, Some(3))
    }

    fn execute(&self, name: &str, partition: &Partition<'_>, args: &[Expression], filter: &Filter<'_>) -> Result<Vec<Primary>> {
        let (offset, default) = shift_arguments(name, args, filter)?;
        let values = partition.values(&args[0], filter)?;
        Ok((0..values.len() as i64)
            .map(|i| match i.checked_sub(offset) {
                Some(idx) if offset >= 0 && idx >= 0 => values[idx as usize].clone(),
                _ => default.clone(),
            })
            .collect())
    }
}

struct Lead;

impl AnalyticFunction for Lead {
    fn check_args(&self, name: &str, args: &[Expression]) -> Result<()> {
        check_arg_count(name, args.len(), 1, Some(3))
    }

    fn execute(&self, name: &str, partition: &Partition<'_>, args: &[Expression], filter: &Filter<'_>) -> Result<Vec<Primary>> {
        let (offset, default) = shift_arguments(name, args, filter)?;
        let values = partition.values(&args[0], filter)?;
        let len = values.len() as i64;
        Ok((0..len)
            .map(|i| match i.checked_add(offset) {
                Some(idx) if offset >= 0 && idx < len => values[idx as usize].clone(),
                _ => default.clone(),
            })
            .collect())
    }
}

/// Reducer of an aggregate used with OVER.
enum WindowReducer {
    Builtin(AggregateFn),
    UserDefined(Arc<UserDefinedFunction>, Vec<Primary>),
    List(String),
}

impl WindowReducer {
    fn reduce(&self, values: &[Primary], filter: &Filter<'_>) -> Result<Primary> {
        match self {
            WindowReducer::Builtin(f) => Ok(f(values, filter.datetime())),
            WindowReducer::UserDefined(udf, extra) => match &udf.body {
                FunctionBody::Aggregate(body) => body(values, extra),
                FunctionBody::Scalar(_) => Err(Error::FunctionNotExist(udf.name.clone())),
            },
            WindowReducer::List(separator) => Ok(aggregate::list_agg(values, separator)),
        }
    }
}

fn window_reducer(name: &str, args: &[Expression], filter: &Filter<'_>) -> Result<Option<WindowReducer>> {
    if let Some(f) = filter.context().registry.aggregate(name) {
        check_arg_count(name, args.len(), 1, Some(1))?;
        return Ok(Some(WindowReducer::Builtin(f)));
    }
    let upper = name.to_uppercase();
    if upper == "LISTAGG" || upper == "GROUP_CONCAT" {
        check_arg_count(name, args.len(), 1, Some(2))?;
        let separator = match args.get(1) {
            Some(expr) => filter.detached().evaluate(expr)?.to_text().unwrap_or_default(),
            None if upper == "GROUP_CONCAT" => ",".to_string(),
            None => String::new(),
        };
        return Ok(Some(WindowReducer::List(separator)));
    }
    match filter.scope().get_function(name)? {
        Some(udf) if udf.is_aggregate() => {
            check_arg_count(name, args.len(), 1, None)?;
            udf.check_args(args.len() - 1)?;
            let extra = args[1..]
                .iter()
                .map(|a| filter.detached().evaluate(a))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(WindowReducer::UserDefined(udf, extra)))
        }
        _ => Ok(None),
    }
}

/// Aggregate over the whole partition, or over a running frame up to the
/// last peer of each member when the window is ordered.
fn aggregate_over(
    partition: &Partition<'_>,
    expr: &Expression,
    reducer: &WindowReducer,
    name: &str,
    distinct: bool,
    ordered: bool,
    filter: &Filter<'_>,
) -> Result<Vec<Primary>> {
    let list_expr = match expr {
        Expression::AllColumns if name.eq_ignore_ascii_case("COUNT") => Expression::Literal(Literal::Integer(1)),
        Expression::AllColumns | Expression::TableColumns(_) => {
            return Err(Error::UnpermittedWildcard(name.to_string()))
        }
        other => other.clone(),
    };
    let values = partition.values(&list_expr, filter)?;
    let frame = |end: usize| -> Result<Primary> {
        let mut frame = values[..end].to_vec();
        if distinct {
            frame = aggregate::distinct(frame, filter.datetime());
        }
        reducer.reduce(&frame, filter)
    };

    if !ordered {
        let value = frame(values.len())?;
        return Ok(vec![value; values.len()]);
    }
    (0..values.len())
        .map(|i| frame(partition.last_peer(i) + 1))
        .collect()
}

/// Computes the window call `expr` over `view` and appends its column.
pub fn evaluate(view: &mut View, expr: &Expression, filter: &Filter<'_>) -> Result<()> {
    let Expression::Analytic {
        name,
        distinct,
        args,
        partition_by,
        order_by,
    } = expr
    else {
        return Err(Error::FunctionNotExist(expr.to_string()));
    };

    let routine = filter.context().registry.analytic(name);
    let reducer = match routine {
        Some(f) => {
            f.check_args(name, args)?;
            None
        }
        None => match window_reducer(name, args, filter)? {
            Some(r) => Some(r),
            None => return Err(Error::FunctionNotExist(name.to_string())),
        },
    };

    let options = filter.datetime().clone();
    let is_grouped = view.is_grouped();
    let bound = |view: &View, expr: &Expression| -> Result<Vec<Primary>> {
        view.records
            .iter()
            .map(|r| filter.with_binding(&view.header, r, is_grouped).evaluate(expr))
            .collect()
    };

    // Window ORDER BY keys, one tuple per record.
    let order_items = order_by.as_ref().map(|c| c.items.as_slice()).unwrap_or(&[]);
    let mut key_columns = Vec::with_capacity(order_items.len());
    for item in order_items {
        key_columns.push(bound(view, &item.expr)?);
    }
    let keys: Vec<SortValues> = (0..view.records.len())
        .map(|i| {
            let tuple: Vec<Primary> = key_columns.iter().map(|c| c[i].clone()).collect();
            SortValues::new(&tuple, &options)
        })
        .collect();

    if !order_items.is_empty() {
        let directions: Vec<_> = order_items.iter().map(|i| i.sort_direction()).collect();
        let nulls: Vec<_> = order_items.iter().map(|i| i.null_position()).collect();
        let records = std::mem::take(&mut view.records);
        let sorted = stable_sort_by_less(
            keys.into_iter().zip(records).collect(),
            &|a: &(SortValues, Record), b: &(SortValues, Record)| a.0.less(&b.0, &directions, &nulls),
        );
        let (keys, records): (Vec<_>, Vec<_>) = sorted.into_iter().unzip();
        view.records = records;
        return finish(view, expr, name, args, *distinct, partition_by, keys, routine, reducer, true, filter);
    }
    finish(view, expr, name, args, *distinct, partition_by, keys, routine, reducer, false, filter)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    view: &mut View,
    expr: &Expression,
    name: &str,
    args: &[Expression],
    distinct: bool,
    partition_by: &[Expression],
    keys: Vec<SortValues>,
    routine: Option<&dyn AnalyticFunction>,
    reducer: Option<WindowReducer>,
    ordered: bool,
    filter: &Filter<'_>,
) -> Result<()> {
    let options = filter.datetime();
    let is_grouped = view.is_grouped();

    let mut partition_keys = Vec::with_capacity(view.records.len());
    for record in &view.records {
        let f = filter.with_binding(&view.header, record, is_grouped);
        partition_keys.push(partition_by.iter().map(|e| f.evaluate(e)).collect::<Result<Vec<_>>>()?);
    }

    let mut partitions: Vec<(Vec<Primary>, Vec<usize>)> = Vec::new();
    for (i, key) in partition_keys.into_iter().enumerate() {
        let found = partitions.iter_mut().find(|(k, _)| {
            k.iter().zip(&key).all(|(a, b)| equivalent(a, b, options).is_true())
        });
        match found {
            Some((_, members)) => members.push(i),
            None => partitions.push((key, vec![i])),
        }
    }

    let mut results = vec![Primary::Null; view.records.len()];
    for (_, members) in &partitions {
        let partition = Partition {
            header: &view.header,
            records: members.iter().map(|&i| &view.records[i]).collect(),
            order_keys: members.iter().map(|&i| keys[i].clone()).collect(),
            is_grouped,
        };
        let values = match (routine, &reducer) {
            (Some(f), _) => f.execute(name, &partition, args, filter)?,
            (None, Some(r)) => aggregate_over(&partition, &args[0], r, name, distinct, ordered, filter)?,
            (None, None) => return Err(Error::FunctionNotExist(name.to_string())),
        };
        for (&i, value) in members.iter().zip(values) {
            results[i] = value;
        }
    }

    for (record, value) in view.records.iter_mut().zip(results) {
        record.push(Cell::new(value));
    }
    view.header.add_computed(expr.to_string(), None);
    debug!(function = name, partitions = partitions.len(), "window function computed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::executor::ExecutionContext;
    use crate::query::loader::InMemoryCatalog;
    use crate::query::parser::Parser;
    use crate::query::scope::Scope;

    fn filter() -> Filter<'static> {
        let context = ExecutionContext::new(Arc::new(InMemoryCatalog::new()));
        Filter::new(Arc::new(context), Scope::new())
    }

    fn expr(sql: &str) -> Expression {
        Parser::new(sql).unwrap().parse_expression().unwrap()
    }

    fn view() -> View {
        let rows = [("a", 1), ("a", 1), ("a", 2), ("b", 5), ("a", 3)];
        View::new(
            Header::new("t", &["g", "v"]),
            rows.iter()
                .map(|(g, v)| Record::new(vec![Primary::from(*g), Primary::Integer(*v)]))
                .collect(),
        )
    }

    /// Runs one window call and returns (g, v, result) per record, in view order.
    fn run(sql: &str) -> Vec<(Primary, Primary, Primary)> {
        let f = filter();
        let mut v = view();
        let e = expr(sql);
        evaluate(&mut v, &e, &f).unwrap();
        assert_eq!(v.header.fields.last().unwrap().column, e.to_string());
        v.records
            .iter()
            .map(|r| (r.value(0).clone(), r.value(1).clone(), r.value(2).clone()))
            .collect()
    }

    fn results(sql: &str) -> Vec<Primary> {
        run(sql).into_iter().map(|(_, _, r)| r).collect()
    }

    fn ints(xs: &[i64]) -> Vec<Primary> {
        xs.iter().map(|&i| Primary::Integer(i)).collect()
    }

    #[test]
    fn test_rank_and_dense_rank() {
        assert_eq!(results("RANK() OVER (PARTITION BY g ORDER BY v)"), ints(&[1, 1, 3, 4, 1]));
        assert_eq!(results("DENSE_RANK() OVER (PARTITION BY g ORDER BY v)"), ints(&[1, 1, 2, 3, 1]));
        assert_eq!(results("ROW_NUMBER() OVER (PARTITION BY g ORDER BY v)"), ints(&[1, 2, 3, 4, 1]));
    }

    #[test]
    fn test_unordered_window_ties_everything() {
        assert_eq!(results("RANK() OVER (PARTITION BY g)"), ints(&[1, 1, 1, 1, 1]));
        assert_eq!(results("COUNT(*) OVER (PARTITION BY g)"), ints(&[4, 4, 4, 1, 4]));
    }

    #[test]
    fn test_running_sum_includes_peers() {
        assert_eq!(
            results("SUM(v) OVER (ORDER BY v)"),
            vec![
                Primary::Integer(2),
                Primary::Integer(2),
                Primary::Integer(4),
                Primary::Integer(7),
                Primary::Integer(12)
            ]
        );
    }

    #[test]
    fn test_distribution_functions() {
        let cume = results("CUME_DIST() OVER (ORDER BY v)");
        assert_eq!(cume[0], Primary::Float(0.4));
        assert_eq!(cume[4], Primary::Float(1.0));
        let pr = results("PERCENT_RANK() OVER (ORDER BY v)");
        assert_eq!(pr[0], Primary::Float(0.0));
        assert_eq!(pr[2], Primary::Float(0.5));
        assert_eq!(pr[4], Primary::Float(1.0));
    }

    #[test]
    fn test_ntile_spreads_remainder_over_first_tiles() {
        assert_eq!(results("NTILE(2) OVER (ORDER BY v)"), ints(&[1, 1, 1, 2, 2]));
        assert_eq!(results("NTILE(10) OVER (ORDER BY v)"), ints(&[1, 2, 3, 4, 5]));

        let f = filter();
        let mut v = view();
        let err = evaluate(&mut v, &expr("NTILE(0) OVER ()"), &f).unwrap_err();
        assert!(matches!(err, Error::FunctionInvalidArgument { .. }));
    }

    #[test]
    fn test_lag_lead_and_edges() {
        assert_eq!(
            results("LAG(v) OVER (ORDER BY v)"),
            vec![Primary::Null, Primary::Integer(1), Primary::Integer(1), Primary::Integer(2), Primary::Integer(3)]
        );
        assert_eq!(
            results("LEAD(v, 2, 0) OVER (ORDER BY v)"),
            ints(&[2, 3, 5, 0, 0])
        );
        // Sorted descending the view reads b5, a3, a2, a1, a1.
        let first = run("FIRST_VALUE(v) OVER (PARTITION BY g ORDER BY v DESC)");
        assert_eq!(first[0].2, Primary::Integer(5));
        assert_eq!(first[1].2, Primary::Integer(3));
        let last = results("LAST_VALUE(v) OVER (PARTITION BY g ORDER BY v DESC)");
        assert_eq!(last[1], Primary::Integer(1));
    }

    #[test]
    fn test_argument_errors() {
        let f = filter();
        let mut v = view();
        assert!(matches!(
            evaluate(&mut v, &expr("RANK(v) OVER ()"), &f),
            Err(Error::FunctionArgumentCount { .. })
        ));
        assert!(matches!(
            evaluate(&mut v, &expr("SUM(*) OVER ()"), &f),
            Err(Error::UnpermittedWildcard(_))
        ));
        assert!(matches!(
            evaluate(&mut v, &expr("NOPE() OVER ()"), &f),
            Err(Error::FunctionNotExist(_))
        ));
    }
}
