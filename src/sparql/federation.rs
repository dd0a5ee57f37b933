//! Pattern evaluation across data sources
//!
//! Local sources are matched directly. A federation evaluates the pattern on
//! every member (recursively for nested federations) and unions the member
//! tables in declaration order. Remote endpoints receive the rendered pattern
//! and are subject to their error policy.

use super::algebra::union;
use super::config::{EngineConfig, ErrorBehavior};
use super::endpoint::SparqlEndpoint;
use super::matcher::{bind_tuples, lookup_for};
use super::pattern::{Pattern, Values};
use super::render::render_pattern_query;
use super::table::SolutionTable;
use super::SparqlResult;
use crate::rdf::DataSource;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use tracing::{debug, warn};

/// Evaluate one pattern against any data source
///
/// `values` is the VALUES block injected into remote queries.
pub(crate) fn evaluate_pattern<'a>(
    pattern: &'a Pattern,
    source: &'a DataSource,
    values: Option<&'a Values>,
    config: &'a EngineConfig,
) -> BoxFuture<'a, SparqlResult<SolutionTable>> {
    async move {
        match source {
            DataSource::Federation(federation) => {
                let members = federation.members();
                debug!(
                    federation = federation.name(),
                    members = members.len(),
                    "fanning pattern out"
                );
                let tables = if config.parallel_federation {
                    try_join_all(
                        members
                            .iter()
                            .map(|member| evaluate_pattern(pattern, member, values, config)),
                    )
                    .await?
                } else {
                    let mut tables = Vec::with_capacity(members.len());
                    for member in members {
                        tables.push(evaluate_pattern(pattern, member, values, config).await?);
                    }
                    tables
                };
                Ok(tables
                    .iter()
                    .fold(SolutionTable::new(pattern.variables()), |acc, t| {
                        union(&acc, t)
                    }))
            }
            DataSource::Endpoint(endpoint) => query_endpoint(pattern, endpoint, values).await,
            local => {
                let lookup = lookup_for(pattern);
                let tuples = local.select_quads(&lookup).await.unwrap_or_default();
                let table = bind_tuples(pattern, &tuples);
                debug!(source = %local.label(), rows = table.len(), "matched pattern");
                Ok(table)
            }
        }
    }
    .boxed()
}

async fn query_endpoint(
    pattern: &Pattern,
    endpoint: &SparqlEndpoint,
    values: Option<&Values>,
) -> SparqlResult<SolutionTable> {
    let query = render_pattern_query(pattern, values);
    match endpoint.query(&query).await {
        Ok(table) => {
            debug!(endpoint = endpoint.url(), rows = table.len(), "remote pattern answered");
            Ok(table)
        }
        Err(error) => match endpoint.options().error_behavior {
            ErrorBehavior::ThrowException => Err(error),
            ErrorBehavior::GiveEmptyResult => {
                warn!(endpoint = endpoint.url(), %error, "remote endpoint failed, contributing no rows");
                Ok(SolutionTable::new(pattern.variables()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Federation, Graph, MemoryStore, Quad, Term, Triple};

    fn iri(s: &str) -> Term {
        Term::resource(format!("http://example.org/{s}")).unwrap()
    }

    fn var(s: &str) -> Term {
        Term::variable(s).unwrap()
    }

    fn graph(rows: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for (s, o) in rows {
            graph
                .insert(Triple::new(iri(s), iri("dogOf"), iri(o)))
                .unwrap();
        }
        graph
    }

    #[tokio::test]
    async fn test_federation_unions_members_in_order() {
        let mut store = MemoryStore::new();
        store
            .insert(Quad::from_triple(
                iri("g"),
                Triple::new(iri("balto"), iri("dogOf"), iri("whoever")),
            ))
            .unwrap();
        let nested = Federation::new("nested").with_member(graph(&[("fido", "paperino")]));
        let federation = Federation::new("dogs")
            .with_member(graph(&[("pluto", "topolino")]))
            .with_member(nested)
            .with_member(store);
        let source = DataSource::from(federation);
        let pattern = Pattern::triple(var("y"), iri("dogOf"), var("x"));

        for parallel in [true, false] {
            let config = EngineConfig {
                parallel_federation: parallel,
                ..EngineConfig::default()
            };
            let table = evaluate_pattern(&pattern, &source, None, &config)
                .await
                .unwrap();
            let dogs: Vec<_> = (0..table.len())
                .map(|i| table.cell(i, "?Y").unwrap().to_string())
                .collect();
            assert_eq!(
                dogs,
                vec![
                    "http://example.org/pluto",
                    "http://example.org/fido",
                    "http://example.org/balto"
                ]
            );
        }
    }

    #[tokio::test]
    async fn test_empty_federation_keeps_columns() {
        let source = DataSource::from(Federation::new("empty"));
        let pattern = Pattern::triple(var("y"), iri("dogOf"), var("x"));
        let table = evaluate_pattern(&pattern, &source, None, &EngineConfig::default())
            .await
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), &["?Y".to_string(), "?X".to_string()]);
    }
}
