/// Join engine
///
/// Joins split the driving side into contiguous chunks that are matched in
/// parallel and concatenated back in chunk order, so the output order never
/// depends on scheduling.
use super::ast::{Expression, Join, JoinCondition, JoinType, LogicalOperator};
use super::filter::Filter;
use super::header::{Header, HeaderField};
use super::record::{Cell, Record};
use super::view::View;
use crate::error::Result;
use crate::value::{ComparisonOperator, Primary};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// Driving-side records below which a join is not split further.
const MIN_RECORDS_PER_CHUNK: usize = 40;

#[derive(Default)]
struct ChunkOutput {
    records: Vec<Record>,
    /// Inner-side records matched by this chunk; only tracked for FULL joins
    matched: Vec<bool>,
}

/// Every left record paired with every right record.
pub fn cross_join(left: View, right: View) -> View {
    let header = Header::merge(&left.header, &right.header);
    let mut records = Vec::with_capacity(left.len() * right.len());
    for l in &left.records {
        for r in &right.records {
            records.push(Record::merge(l, r));
        }
    }
    View::new(header, records)
}

/// Loads both sides of a JOIN item and joins them.
pub(crate) fn load_join(join: &Join, filter: &Filter<'_>) -> Result<View> {
    let left = View::load_table(&join.left, filter)?;
    let right = View::load_table(&join.right, filter)?;

    let shared = if join.natural {
        Some(natural_columns(&left.header, &right.header))
    } else if let Some(JoinCondition::Using(columns)) = &join.condition {
        Some(using_columns(&left.header, &right.header, columns)?)
    } else {
        None
    };

    let left_width = left.header.len();
    let condition = match (&shared, &join.condition) {
        (Some(pairs), _) => equality_condition(&left.header, &right.header, pairs),
        (None, Some(JoinCondition::On(expr))) => Some(expr.clone()),
        _ => None,
    };

    let mut view = match join.join_type {
        JoinType::Cross if condition.is_none() => cross_join(left, right),
        JoinType::Cross | JoinType::Inner => inner_join(left, right, condition.as_ref(), filter)?,
        outer => outer_join(left, right, condition.as_ref(), outer, filter)?,
    };

    if let Some(pairs) = shared {
        let merged: Vec<(usize, usize)> = pairs.iter().map(|&(l, r)| (l, r + left_width)).collect();
        coalesce_columns(&mut view, &merged, join.join_type == JoinType::Right);
    }
    debug!(join = ?join.join_type, natural = join.natural, records = view.len(), "joined");
    Ok(view)
}

/// Records pairs satisfying `condition`.
pub fn inner_join(left: View, right: View, condition: Option<&Expression>, filter: &Filter<'_>) -> Result<View> {
    let header = Header::merge(&left.header, &right.header);
    let ranges = chunk_ranges(left.len(), chunk_count(filter, left.len(), condition));
    let matcher = Matcher {
        header: &header,
        condition,
        driving: &left.records,
        other: &right.records,
        driving_left: true,
        pad: None,
        track_other: false,
    };
    let output = run_chunks(&matcher, ranges, filter)?;
    Ok(View::new(header, output.records))
}

/// LEFT, RIGHT and FULL joins. Unmatched records of the preserved side are
/// padded with NULLs; for FULL joins the unmatched right records follow.
pub fn outer_join(
    left: View,
    right: View,
    condition: Option<&Expression>,
    join_type: JoinType,
    filter: &Filter<'_>,
) -> Result<View> {
    let header = Header::merge(&left.header, &right.header);
    let (left_width, right_width) = (left.header.len(), right.header.len());
    let driving_left = join_type != JoinType::Right;
    let (driving, other, pad) = if driving_left {
        (&left.records, &right.records, right_width)
    } else {
        (&right.records, &left.records, left_width)
    };

    let ranges = chunk_ranges(driving.len(), chunk_count(filter, driving.len(), condition));
    let matcher = Matcher {
        header: &header,
        condition,
        driving,
        other,
        driving_left,
        pad: Some(pad),
        track_other: join_type == JoinType::Full,
    };
    let mut output = run_chunks(&matcher, ranges, filter)?;

    if join_type == JoinType::Full {
        let padding = Record::nulls(left_width);
        for (r, matched) in right.records.iter().zip(&output.matched) {
            if !matched {
                output.records.push(Record::merge(&padding, r));
            }
        }
    }
    Ok(View::new(header, output.records))
}

fn chunk_count(filter: &Filter<'_>, len: usize, condition: Option<&Expression>) -> usize {
    // Substitutions assign variables row by row and must see rows in order.
    if condition.is_some_and(Expression::contains_substitution) {
        return 1;
    }
    filter
        .context()
        .cpu
        .min(len / MIN_RECORDS_PER_CHUNK)
        .max(1)
}

fn chunk_ranges(len: usize, chunks: usize) -> Vec<Range<usize>> {
    let size = len.div_ceil(chunks).max(1);
    (0..len).step_by(size).map(|start| start..(start + size).min(len)).collect()
}

struct Matcher<'m> {
    header: &'m Header,
    condition: Option<&'m Expression>,
    driving: &'m [Record],
    other: &'m [Record],
    driving_left: bool,
    pad: Option<usize>,
    track_other: bool,
}

impl Matcher<'_> {
    fn pair(&self, driving: &Record, other: &Record) -> Record {
        if self.driving_left {
            Record::merge(driving, other)
        } else {
            Record::merge(other, driving)
        }
    }

    fn matches(&self, record: &Record, filter: &Filter<'_>) -> Result<bool> {
        match self.condition {
            Some(c) => Ok(filter
                .with_binding(self.header, record, false)
                .evaluate(c)?
                .ternary()
                .is_true()),
            None => Ok(true),
        }
    }

    fn run(&self, range: Range<usize>, filter: &Filter<'_>) -> Result<ChunkOutput> {
        let mut output = ChunkOutput {
            records: Vec::new(),
            matched: if self.track_other {
                vec![false; self.other.len()]
            } else {
                Vec::new()
            },
        };

        for d in &self.driving[range] {
            let mut found = false;
            for (j, o) in self.other.iter().enumerate() {
                let merged = self.pair(d, o);
                if self.matches(&merged, filter)? {
                    found = true;
                    if self.track_other {
                        output.matched[j] = true;
                    }
                    output.records.push(merged);
                }
            }
            if let (false, Some(width)) = (found, self.pad) {
                output.records.push(self.pair(d, &Record::nulls(width)));
            }
        }
        Ok(output)
    }
}

/// Matches every range in parallel and concatenates the results in range
/// order. The first failing chunk stops the chunks that have not started.
fn run_chunks(matcher: &Matcher<'_>, ranges: Vec<Range<usize>>, filter: &Filter<'_>) -> Result<ChunkOutput> {
    let failed = AtomicBool::new(false);
    let outputs: Vec<Result<ChunkOutput>> = ranges
        .into_par_iter()
        .enumerate()
        .map(|(chunk, range)| {
            if failed.load(Ordering::Relaxed) {
                warn!(chunk, "join chunk skipped after a sibling failed");
                return Ok(ChunkOutput::default());
            }
            trace!(chunk, start = range.start, end = range.end, "matching join chunk");
            let result = matcher.run(range, filter);
            if result.is_err() {
                failed.store(true, Ordering::Relaxed);
            }
            result
        })
        .collect();

    let mut merged = ChunkOutput {
        records: Vec::new(),
        matched: vec![false; if matcher.track_other { matcher.other.len() } else { 0 }],
    };
    for output in outputs {
        let output = output?;
        merged.records.extend(output.records);
        for (m, o) in merged.matched.iter_mut().zip(output.matched) {
            *m |= o;
        }
    }
    Ok(merged)
}

/// Index pairs of the columns shared by name, in left order.
fn natural_columns(left: &Header, right: &Header) -> Vec<(usize, usize)> {
    left.table_columns()
        .into_iter()
        .filter_map(|l| {
            let name = &left.fields[l].column;
            right
                .table_columns()
                .into_iter()
                .find(|&r| right.fields[r].column.eq_ignore_ascii_case(name))
                .map(|r| (l, r))
        })
        .collect()
}

fn using_columns(left: &Header, right: &Header, columns: &[String]) -> Result<Vec<(usize, usize)>> {
    columns
        .iter()
        .map(|c| Ok((left.contains(None, c)?, right.contains(None, c)?)))
        .collect()
}

/// `l.c1 = r.c1 AND l.c2 = r.c2 ...` over the shared columns.
fn equality_condition(left: &Header, right: &Header, pairs: &[(usize, usize)]) -> Option<Expression> {
    let qualified = |field: &HeaderField| Expression::Column {
        table: Some(field.view.clone()),
        name: field.column.clone(),
    };
    pairs
        .iter()
        .map(|&(l, r)| Expression::Comparison {
            left: Box::new(qualified(&left.fields[l])),
            op: ComparisonOperator::Equal,
            right: Box::new(qualified(&right.fields[r])),
        })
        .reduce(|acc, e| Expression::Logic {
            left: Box::new(acc),
            op: LogicalOperator::And,
            right: Box::new(e),
        })
}

/// Puts one coalesced column per shared pair in front and hides the originals.
/// `pairs` index the merged header.
fn coalesce_columns(view: &mut View, pairs: &[(usize, usize)], prefer_right: bool) {
    let mut fields: Vec<HeaderField> = pairs
        .iter()
        .map(|&(l, _)| HeaderField {
            column: view.header.fields[l].column.clone(),
            is_from_table: true,
            is_join_column: true,
            ..Default::default()
        })
        .collect();
    for &(l, r) in pairs {
        view.header.fields[l].hidden = true;
        view.header.fields[r].hidden = true;
    }
    fields.append(&mut view.header.fields);
    view.header.fields = fields;

    for record in &mut view.records {
        let mut cells: Vec<Cell> = pairs
            .iter()
            .map(|&(l, r)| {
                let (first, second) = if prefer_right { (r, l) } else { (l, r) };
                let value = match record.value(first) {
                    Primary::Null => record.value(second).clone(),
                    v => v.clone(),
                };
                Cell::new(value)
            })
            .collect();
        cells.append(record.cells_mut());
        *record = Record::from_cells(cells);
    }
}
