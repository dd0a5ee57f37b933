//! Combination algebra over solution tables
//!
//! Tables are folded in declaration order. Consecutive tables flagged
//! `join_as_union` are first collapsed with their left neighbour into one
//! union; the resulting segments are then joined left to right:
//!
//! - no shared columns: cartesian product
//! - shared columns: hash equi-join, null keys never match
//! - an optional side turns either join into an outer join that keeps every
//!   row of the other side

use super::table::{Cell, SolutionTable};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Fold tables into one, following the combination rules above
///
/// The result carries no flags. An empty input yields an empty table.
pub fn combine_tables(tables: Vec<SolutionTable>) -> SolutionTable {
    let mut segments: Vec<SolutionTable> = Vec::with_capacity(tables.len());
    for table in tables {
        match segments.last_mut() {
            Some(previous) if table.join_as_union => {
                let is_optional = previous.is_optional || table.is_optional;
                let merged = union(previous, &table);
                *previous = merged.with_flags(is_optional, false);
            }
            _ => segments.push(table),
        }
    }

    let mut segments = segments.into_iter();
    let Some(mut accumulator) = segments.next() else {
        return SolutionTable::default();
    };
    for table in segments {
        debug!(
            left_rows = accumulator.len(),
            right_rows = table.len(),
            right_optional = table.is_optional,
            "combining solution tables"
        );
        let has_shared = table.columns().iter().any(|c| accumulator.has_column(c));
        accumulator = if has_shared {
            join(&accumulator, &table)
        } else {
            product(&accumulator, &table)
        };
    }
    accumulator.clear_flags();
    accumulator
}

/// Alternative solutions: column superset, rows concatenated, no dedup
pub fn union(left: &SolutionTable, right: &SolutionTable) -> SolutionTable {
    let mut result = SolutionTable::new(left.columns().iter().chain(right.columns()).cloned());
    append_aligned(&mut result, left);
    append_aligned(&mut result, right);
    result
}

/// Every row of `left` paired with every row of `right`
///
/// When the optional side is empty the other side is kept, padded with nulls.
pub fn product(left: &SolutionTable, right: &SolutionTable) -> SolutionTable {
    let mut result = SolutionTable::new(left.columns().iter().chain(right.columns()).cloned());

    if right.is_empty() && right.is_optional {
        append_aligned(&mut result, left);
        return result;
    }
    if left.is_empty() && left.is_optional {
        append_aligned(&mut result, right);
        return result;
    }

    for l in left.rows() {
        for r in right.rows() {
            let mut row = l.clone();
            row.extend(r.iter().cloned());
            result.push_row(row);
        }
    }
    result
}

/// Equi-join on the shared columns
///
/// `right.is_optional` keeps every left row (left outer join); otherwise
/// `left.is_optional` keeps every right row. Output columns are the left
/// columns followed by the right-only columns.
pub fn join(left: &SolutionTable, right: &SolutionTable) -> SolutionTable {
    let shared: Vec<(usize, usize)> = left
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(li, c)| right.column_index(c).map(|ri| (li, ri)))
        .collect();
    let right_only: Vec<usize> = (0..right.columns().len())
        .filter(|ri| !shared.iter().any(|(_, s)| s == ri))
        .collect();

    let mut result = SolutionTable::new(
        left.columns()
            .iter()
            .chain(right_only.iter().map(|&ri| &right.columns()[ri]))
            .cloned(),
    );

    // build side: right rows grouped by key, in right order
    let mut index: FxHashMap<Vec<&str>, Vec<usize>> = FxHashMap::default();
    for (position, row) in right.rows().iter().enumerate() {
        if let Some(key) = join_key(row, shared.iter().map(|(_, ri)| *ri)) {
            index.entry(key).or_default().push(position);
        }
    }

    let keep_left = right.is_optional;
    let keep_right = !keep_left && left.is_optional;
    let mut right_matched = vec![false; right.len()];

    for l in left.rows() {
        let matches = join_key(l, shared.iter().map(|(li, _)| *li))
            .and_then(|key| index.get(&key));
        match matches {
            Some(positions) => {
                for &position in positions {
                    right_matched[position] = true;
                    let r = &right.rows()[position];
                    let mut row = l.clone();
                    row.extend(right_only.iter().map(|&ri| r[ri].clone()));
                    result.push_row(row);
                }
            }
            None if keep_left => result.push_row(l.clone()),
            None => {}
        }
    }

    if keep_right {
        for (position, r) in right.rows().iter().enumerate() {
            if right_matched[position] {
                continue;
            }
            let mut row: Vec<Cell> = vec![None; left.columns().len()];
            for &(li, ri) in &shared {
                row[li] = r[ri].clone();
            }
            row.extend(right_only.iter().map(|&ri| r[ri].clone()));
            result.push_row(row);
        }
    }

    result
}

fn join_key(row: &[Cell], positions: impl Iterator<Item = usize>) -> Option<Vec<&str>> {
    positions.map(|i| row[i].as_deref()).collect()
}

fn append_aligned(target: &mut SolutionTable, source: &SolutionTable) {
    let mapping: Vec<Option<usize>> = target
        .columns()
        .iter()
        .map(|c| source.column_index(c))
        .collect();
    for row in source.rows() {
        target.push_row(
            mapping
                .iter()
                .map(|index| index.and_then(|i| row[i].clone()))
                .collect(),
        );
    }
}
