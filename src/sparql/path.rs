//! Property path evaluation
//!
//! A path `start p1/(p2|^p3) end` is evaluated as a join chain over hidden
//! intermediate variables; only the start and end columns are kept.

use super::algebra::{combine_tables, union};
use super::config::EngineConfig;
use super::federation::evaluate_pattern;
use super::pattern::{Pattern, PropertyPath};
use super::table::SolutionTable;
use super::SparqlResult;
use crate::rdf::{DataSource, Term};

const HIDDEN_PREFIX: &str = "?__PATH";

pub(crate) async fn evaluate_path(
    path: &PropertyPath,
    source: &DataSource,
    config: &EngineConfig,
) -> SparqlResult<SolutionTable> {
    let exposed = path.variables();
    let steps = path.steps.len();
    let node = |index: usize| -> Term {
        if index == 0 {
            path.start.clone()
        } else if index == steps {
            path.end.clone()
        } else {
            Term::Variable(format!("{HIDDEN_PREFIX}{index}"))
        }
    };

    let mut chain = Vec::with_capacity(steps);
    for (index, step) in path.steps.iter().enumerate() {
        let (from, to) = (node(index), node(index + 1));
        let mut alternatives = SolutionTable::new(
            [&from, &to].into_iter().filter_map(Term::as_variable).map(str::to_string),
        );
        for property in &step.alternatives {
            let pattern = if property.inverse {
                Pattern::triple(to.clone(), property.predicate.clone(), from.clone())
            } else {
                Pattern::triple(from.clone(), property.predicate.clone(), to.clone())
            };
            let table = evaluate_pattern(&pattern, source, None, config).await?;
            alternatives = union(&alternatives, &table);
        }
        chain.push(alternatives);
    }

    let joined = combine_tables(chain);
    Ok(joined
        .project(&exposed)
        .with_flags(path.is_optional, false))
}
