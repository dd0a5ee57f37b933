//! Pattern group evaluation
//!
//! Members are evaluated in declaration order into flagged tables, folded
//! with the combination algebra, extended by BINDs and finally filtered.

use super::algebra::combine_tables;
use super::executor::EvaluationContext;
use super::federation::evaluate_pattern;
use super::path::evaluate_path;
use super::pattern::{Filter, GroupMember, PatternGroup, Values};
use super::table::{Solution, SolutionTable};
use super::SparqlResult;
use crate::rdf::DataSource;
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

/// Evaluate a group into its filtered table
///
/// The returned table carries the group's `is_optional` flag; the caller
/// decides `join_as_union`.
pub(crate) fn evaluate_group<'a>(
    group: &'a PatternGroup,
    source: &'a DataSource,
    ctx: &'a mut EvaluationContext,
) -> BoxFuture<'a, SparqlResult<SolutionTable>> {
    async move {
        let mut tables = Vec::with_capacity(group.members.len());
        let mut previous_union = false;
        for member in group.members.iter().filter(|m| m.is_evaluable()) {
            let table = match member {
                GroupMember::Pattern(pattern) => {
                    evaluate_pattern(pattern, source, group.values_for(pattern), &ctx.config)
                        .await?
                }
                GroupMember::Path(path) => evaluate_path(path, source, &ctx.config).await?,
                GroupMember::Values(values) => values.to_table(),
            };
            tables.push(table.with_flags(member.is_optional(), previous_union));
            previous_union = member.union_with_next();
        }
        ctx.group_tables.insert(group.id(), tables.clone());

        let mut table = combine_tables(tables);
        debug!(group = %group.id(), rows = table.len(), "group members combined");

        for bind in &group.binds {
            let values: Vec<_> = table
                .solutions()
                .map(|s| {
                    ctx.evaluator
                        .evaluate(&bind.expression, &s)
                        .ok()
                        .map(|t| t.encode())
                })
                .collect();
            let column = table.add_column(bind.variable.as_str());
            for (row, value) in values.into_iter().enumerate() {
                table.set_cell(row, column, value);
            }
        }

        for values in group.members.iter().filter_map(|m| match m {
            GroupMember::Values(values) => Some(values),
            _ => None,
        }) {
            apply_values_filter(&mut table, values);
        }

        for filter in &group.filters {
            match filter {
                Filter::Expression(expression) => {
                    let evaluator = &ctx.evaluator;
                    table.retain_rows(|s| evaluator.evaluate_bool(expression, &s).unwrap_or(false));
                }
                Filter::Values(values) => apply_values_filter(&mut table, values),
                Filter::Exists { group: inner, negated } => {
                    let matches = evaluate_group(inner, source, ctx).await?;
                    let negated = *negated;
                    table.retain_rows(|s| has_compatible_row(&s, &matches) != negated);
                }
            }
        }

        debug!(group = %group.id(), rows = table.len(), "group filtered");
        table.clear_flags();
        table.is_optional = group.is_optional;
        Ok(table)
    }
    .boxed()
}

fn apply_values_filter(table: &mut SolutionTable, values: &Values) {
    table.retain_rows(|s| values.admits(&s));
}

/// Whether some row of `table` agrees with `solution` on their shared columns
///
/// Unbound cells on either side are compatible.
fn has_compatible_row(solution: &Solution<'_>, table: &SolutionTable) -> bool {
    let shared: Vec<&String> = table
        .columns()
        .iter()
        .filter(|c| solution.has_column(c))
        .collect();
    table.solutions().any(|candidate| {
        shared.iter().all(|column| {
            match (solution.get(column), candidate.get(column)) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        })
    })
}
