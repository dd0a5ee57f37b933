//! Solution modifiers
//!
//! Applied in this order: GROUP BY (with aggregates and HAVING), projection
//! expressions, ORDER BY, OFFSET, LIMIT, DISTINCT, projection.

use super::config::{EngineConfig, UnboundOrdering};
use super::expr::{order_encoded, BinaryOp, ExpressionEvaluator, Numeric};
use super::query::{AggregateFunction, Aggregator, GroupBy, OrderBy, ProjectionItem, Query};
use super::table::{Cell, SolutionTable};
use crate::rdf::Term;
use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;
use tracing::debug;

/// Run the whole modifier pipeline of a SELECT query
pub(crate) fn apply_modifiers(
    query: &Query,
    mut table: SolutionTable,
    evaluator: &ExpressionEvaluator,
    config: &EngineConfig,
) -> SolutionTable {
    let modifiers = &query.modifiers;

    let mut visible: Vec<String> = match &modifiers.group_by {
        Some(group_by) => {
            table = aggregate(&table, group_by, evaluator);
            group_by.columns()
        }
        None if query.projection.is_empty() => table.columns().to_vec(),
        None => Vec::new(),
    };

    for item in &query.projection {
        match item {
            ProjectionItem::Variable(name) if modifiers.group_by.is_none() => {
                visible.push(name.clone())
            }
            ProjectionItem::Variable(_) => {}
            ProjectionItem::Expression { expression, alias } => {
                let values: Vec<Cell> = table
                    .solutions()
                    .map(|s| evaluator.evaluate(expression, &s).ok().map(|t| t.encode()))
                    .collect();
                let column = table.add_column(alias.as_str());
                for (row, value) in values.into_iter().enumerate() {
                    table.set_cell(row, column, value);
                }
                visible.push(alias.clone());
            }
        }
    }

    order(&mut table, &modifiers.order_by, config.unbound_ordering);
    table.slice(modifiers.offset, modifiers.limit);

    let mut projected = table.project(&visible);
    if modifiers.distinct {
        projected.distinct();
    }
    debug!(rows = projected.len(), columns = projected.columns().len(), "modifiers applied");
    projected
}

/// Stable sort on the ORDER BY keys
///
/// Unbound cells sort per `unbound`; a descending key reverses the whole
/// comparison, unbound placement included.
pub(crate) fn order(table: &mut SolutionTable, keys: &[OrderBy], unbound: UnboundOrdering) {
    if keys.is_empty() {
        return;
    }
    let indices: Vec<(Option<usize>, bool)> = keys
        .iter()
        .map(|k| (table.column_index(&k.variable), k.descending))
        .collect();

    table.rows_mut().sort_by(|a, b| {
        for &(index, descending) in &indices {
            let Some(index) = index else { continue };
            let ordering = match (a[index].as_deref(), b[index].as_deref()) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) if unbound == UnboundOrdering::First => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) if unbound == UnboundOrdering::First => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(l), Some(r)) => order_encoded(l, r),
            };
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Running state of one aggregate over one group
#[derive(Debug, Clone)]
enum AggregatorState {
    Count(i64),
    Sum(Option<Numeric>),
    Avg { sum: Option<Numeric>, count: i64 },
    Min(Option<String>),
    Max(Option<String>),
    Sample(Option<String>),
    GroupConcat { separator: String, parts: Vec<String> },
}

impl AggregatorState {
    fn new(function: &AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => AggregatorState::Count(0),
            AggregateFunction::Sum => AggregatorState::Sum(Some(Numeric::Integer(0))),
            AggregateFunction::Avg => AggregatorState::Avg {
                sum: Some(Numeric::Integer(0)),
                count: 0,
            },
            AggregateFunction::Min => AggregatorState::Min(None),
            AggregateFunction::Max => AggregatorState::Max(None),
            AggregateFunction::Sample => AggregatorState::Sample(None),
            AggregateFunction::GroupConcat { separator } => AggregatorState::GroupConcat {
                separator: separator.clone(),
                parts: Vec::new(),
            },
        }
    }

    /// Feed one bound value (`COUNT(*)` feeds the row marker)
    fn update(&mut self, value: &str) {
        match self {
            AggregatorState::Count(c) => *c += 1,
            AggregatorState::Sum(sum) => *sum = add(*sum, value),
            AggregatorState::Avg { sum, count } => {
                *sum = add(*sum, value);
                *count += 1;
            }
            AggregatorState::Min(current) => {
                if current
                    .as_deref()
                    .map_or(true, |c| order_encoded(value, c) == Ordering::Less)
                {
                    *current = Some(value.to_string());
                }
            }
            AggregatorState::Max(current) => {
                if current
                    .as_deref()
                    .map_or(true, |c| order_encoded(value, c) == Ordering::Greater)
                {
                    *current = Some(value.to_string());
                }
            }
            AggregatorState::Sample(current) => {
                if current.is_none() {
                    *current = Some(value.to_string());
                }
            }
            AggregatorState::GroupConcat { parts, .. } => {
                parts.push(Term::decode(value).lexical().to_string())
            }
        }
    }

    fn result(&self) -> Cell {
        match self {
            AggregatorState::Count(c) => Some(Term::integer(*c).encode()),
            AggregatorState::Sum(sum) => sum.map(|n| n.into_term().encode()),
            AggregatorState::Avg { sum, count } => {
                if *count == 0 {
                    return Some(Term::integer(0).encode());
                }
                sum.and_then(|s| s.arithmetic(BinaryOp::Div, Numeric::Integer(*count)).ok())
                    .map(|n| n.into_term().encode())
            }
            AggregatorState::Min(value)
            | AggregatorState::Max(value)
            | AggregatorState::Sample(value) => value.clone(),
            AggregatorState::GroupConcat { separator, parts } => {
                Some(Term::plain(parts.join(separator)).encode())
            }
        }
    }
}

/// Numeric running sum; a non-numeric value poisons it to unbound
fn add(sum: Option<Numeric>, value: &str) -> Option<Numeric> {
    let value = Numeric::from_term(&Term::decode(value))?;
    sum?.arithmetic(BinaryOp::Add, value).ok()
}

/// Partition rows by the group keys and compute one row per group
fn aggregate(table: &SolutionTable, group_by: &GroupBy, evaluator: &ExpressionEvaluator) -> SolutionTable {
    let key_indices: Vec<Option<usize>> = group_by
        .variables
        .iter()
        .map(|v| table.column_index(v))
        .collect();

    let mut groups: IndexMap<Vec<Cell>, Vec<usize>> = IndexMap::new();
    for (position, row) in table.rows().iter().enumerate() {
        let key = key_indices
            .iter()
            .map(|index| index.and_then(|i| row[i].clone()))
            .collect();
        groups.entry(key).or_default().push(position);
    }
    // aggregating everything into one implicit group still yields one row
    if groups.is_empty() && group_by.variables.is_empty() {
        groups.insert(Vec::new(), Vec::new());
    }

    let mut result = SolutionTable::new(group_by.columns());
    for (key, positions) in groups {
        let mut row = key;
        for aggregator in &group_by.aggregators {
            row.push(aggregate_group(table, &positions, aggregator));
        }
        result.push_row(row);
    }

    if !group_by.having.is_empty() {
        result.retain_rows(|solution| {
            group_by
                .having
                .iter()
                .all(|condition| evaluator.evaluate_bool(condition, &solution).unwrap_or(false))
        });
    }
    result
}

fn aggregate_group(table: &SolutionTable, positions: &[usize], aggregator: &Aggregator) -> Cell {
    let mut state = AggregatorState::new(&aggregator.function);
    match &aggregator.variable {
        None => {
            // COUNT(*): DISTINCT compares whole rows
            let mut seen: IndexSet<&Vec<Cell>> = IndexSet::new();
            for &position in positions {
                let row = &table.rows()[position];
                if !aggregator.distinct || seen.insert(row) {
                    state.update("");
                }
            }
        }
        Some(variable) => {
            let Some(index) = table.column_index(variable) else {
                return state.result();
            };
            let mut seen: IndexSet<&str> = IndexSet::new();
            for &position in positions {
                let Some(value) = table.rows()[position][index].as_deref() else {
                    continue;
                };
                if !aggregator.distinct || seen.insert(value) {
                    state.update(value);
                }
            }
        }
    }
    state.result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparql::expr::Expression;

    fn cell(s: &str) -> Cell {
        Some(s.to_string())
    }

    fn int(i: i64) -> Cell {
        Some(Term::integer(i).encode())
    }

    fn owners() -> SolutionTable {
        SolutionTable::from_rows(
            ["?OWNER", "?DOG", "?AGE"],
            vec![
                vec![cell("topolino"), cell("pluto"), int(7)],
                vec![cell("paperino"), cell("fido"), int(3)],
                vec![cell("topolino"), cell("rex"), int(2)],
                vec![None, cell("balto"), None],
            ],
        )
    }

    #[test]
    fn test_order_mixed_kinds_column() {
        let rows = (0..400i64)
            .map(|i| {
                if i % 2 == 0 {
                    vec![int(i)]
                } else {
                    vec![cell(&(400 - i).to_string())]
                }
            })
            .collect();
        let mut table = SolutionTable::from_rows(["?V"], rows);
        let keys = vec![OrderBy {
            variable: "?V".to_string(),
            descending: false,
        }];
        order(&mut table, &keys, UnboundOrdering::First);

        // numbers first by value, then the plain literals by lexical form
        let first: Vec<_> = table.rows()[..3].iter().map(|r| r[0].clone()).collect();
        assert_eq!(first, vec![int(0), int(2), int(4)]);
        assert_eq!(table.rows()[199][0], int(398));
        assert_eq!(table.rows()[200][0], cell("1"));
        assert_eq!(table.rows()[399][0], cell("99"));
    }

    #[test]
    fn test_order_unbound_first_and_desc_mirror() {
        let keys = vec![OrderBy {
            variable: "?AGE".to_string(),
            descending: false,
        }];
        let mut table = owners();
        order(&mut table, &keys, UnboundOrdering::First);
        let ages: Vec<_> = table.rows().iter().map(|r| r[2].clone()).collect();
        assert_eq!(ages, vec![None, int(2), int(3), int(7)]);

        let keys = vec![OrderBy {
            variable: "?AGE".to_string(),
            descending: true,
        }];
        order(&mut table, &keys, UnboundOrdering::First);
        let ages: Vec<_> = table.rows().iter().map(|r| r[2].clone()).collect();
        assert_eq!(ages, vec![int(7), int(3), int(2), None]);
    }

    #[test]
    fn test_order_is_stable_on_ties() {
        let keys = vec![OrderBy {
            variable: "?OWNER".to_string(),
            descending: false,
        }];
        let mut table = owners();
        order(&mut table, &keys, UnboundOrdering::Last);
        let dogs: Vec<_> = table.rows().iter().map(|r| r[1].clone()).collect();
        assert_eq!(dogs, vec![cell("fido"), cell("pluto"), cell("rex"), cell("balto")]);
    }

    #[test]
    fn test_group_by_aggregates() {
        let group_by = GroupBy::new(&["owner"])
            .unwrap()
            .aggregate(Aggregator::count_all("dogs").unwrap())
            .aggregate(Aggregator::new(AggregateFunction::Sum, "age", "total").unwrap())
            .aggregate(Aggregator::new(AggregateFunction::Max, "age", "oldest").unwrap())
            .aggregate(
                Aggregator::new(
                    AggregateFunction::GroupConcat {
                        separator: ",".to_string(),
                    },
                    "dog",
                    "names",
                )
                .unwrap(),
            );
        let result = aggregate(&owners(), &group_by, &ExpressionEvaluator::new());

        assert_eq!(result.len(), 3);
        assert_eq!(
            result.rows()[0],
            vec![cell("topolino"), int(2), int(9), int(7), cell("pluto,rex")]
        );
        // the unbound-key group has no ages: SUM stays 0, MAX unbound
        assert_eq!(result.rows()[2], vec![None, int(1), int(0), None, cell("balto")]);
    }

    #[test]
    fn test_avg_and_having() {
        let group_by = GroupBy::new(&["owner"])
            .unwrap()
            .aggregate(Aggregator::new(AggregateFunction::Avg, "age", "avg").unwrap())
            .having(Expression::binary(
                Expression::variable("avg").unwrap(),
                BinaryOp::Gt,
                Expression::constant(Term::integer(3)),
            ));
        let result = aggregate(&owners(), &group_by, &ExpressionEvaluator::new());
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0], vec![cell("topolino"), Some(Term::decimal(4.5).encode())]);
    }

    #[test]
    fn test_implicit_group_over_empty_table() {
        let group_by = GroupBy::default().aggregate(Aggregator::count_all("n").unwrap());
        let empty = SolutionTable::new(["?X"]);
        let result = aggregate(&empty, &group_by, &ExpressionEvaluator::new());
        assert_eq!(result.rows(), &[vec![int(0)]]);
    }

    #[test]
    fn test_pipeline_order_limit_distinct_projection() {
        let query = Query::select()
            .project("owner")
            .unwrap()
            .project("missing")
            .unwrap()
            .order_by("owner", false)
            .unwrap()
            .offset(1)
            .limit(2)
            .distinct();
        let result = apply_modifiers(
            &query,
            owners(),
            &ExpressionEvaluator::new(),
            &EngineConfig::default(),
        );
        // sorted owners: None, paperino, topolino, topolino -> skip 1, take 2 -> distinct
        assert_eq!(result.columns(), &["?OWNER".to_string(), "?MISSING".to_string()]);
        assert_eq!(
            result.rows(),
            &[vec![cell("paperino"), None], vec![cell("topolino"), None]]
        );
    }

    #[test]
    fn test_projection_expression_feeds_order() {
        let query = Query::select()
            .project("dog")
            .unwrap()
            .project_expression(
                Expression::binary(
                    Expression::variable("age").unwrap(),
                    BinaryOp::Mul,
                    Expression::constant(Term::integer(7)),
                ),
                "human_age",
            )
            .unwrap()
            .order_by("human_age", true)
            .unwrap();
        let result = apply_modifiers(
            &query,
            owners(),
            &ExpressionEvaluator::new(),
            &EngineConfig::default(),
        );
        assert_eq!(result.columns(), &["?DOG".to_string(), "?HUMAN_AGE".to_string()]);
        assert_eq!(result.rows()[0], vec![cell("pluto"), int(49)]);
        // failed expression leaves the cell unbound, the row stays
        assert_eq!(result.rows()[3], vec![cell("balto"), None]);
    }
}
