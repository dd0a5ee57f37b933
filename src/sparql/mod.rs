//! SPARQL evaluation engine
//!
//! Queries are object graphs built through [`Query`] and [`PatternGroup`]
//! builders and evaluated against a [`DataSource`]: a local graph or quad
//! store, a remote SPARQL endpoint, or a federation of any of these. Every
//! intermediate result is a [`SolutionTable`] of encoded terms, combined with
//! the relational algebra in [`algebra`].
//!
//! # Example
//!
//! ```rust
//! use samyama_sparql::rdf::{Graph, Term, Triple};
//! use samyama_sparql::sparql::{Pattern, PatternGroup, Query, SparqlEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dog_of = Term::resource("http://example.org/dogOf")?;
//! let mut graph = Graph::new();
//! graph.insert(Triple::new(
//!     Term::resource("http://example.org/pluto")?,
//!     dog_of.clone(),
//!     Term::resource("http://example.org/topolino")?,
//! ))?;
//!
//! let query = Query::select().add_group(
//!     PatternGroup::new().add_pattern(Pattern::triple(
//!         Term::variable("dog")?,
//!         dog_of,
//!         Term::variable("owner")?,
//!     )),
//! );
//! let results = SparqlEngine::new(graph).query(&query).await?;
//! assert_eq!(results.table().map(|t| t.len()), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod algebra;
mod config;
pub mod endpoint;
mod executor;
mod expr;
mod federation;
mod functions;
mod group;
mod matcher;
mod modifiers;
mod path;
mod pattern;
mod query;
pub mod render;
mod results;
mod table;

pub use config::{
    EndpointAuth, EndpointOptions, EngineConfig, ErrorBehavior, QueryMethod, UnboundOrdering,
};
pub use endpoint::{parse_results_xml, SparqlEndpoint};
pub use executor::SparqlExecutor;
pub use expr::{
    effective_boolean_value, BinaryOp, Expression, ExpressionError, ExpressionEvaluator,
    ExpressionResult, UnaryOp,
};
pub use functions::Function;
pub use pattern::{
    Bind, Filter, GroupMember, MemberId, PathProperty, PathStep, Pattern, PatternGroup,
    PropertyPath, Values,
};
pub use query::{
    AggregateFunction, Aggregator, GroupBy, Modifiers, OrderBy, ProjectionItem, Query, QueryForm,
    QueryMember,
};
pub use results::{ResultFormat, SparqlResults};
pub use table::{Cell, Solution, SolutionTable};

use crate::rdf::DataSource;
use thiserror::Error;

/// SPARQL errors
#[derive(Error, Debug)]
pub enum SparqlError {
    /// Remote endpoint failure (transport or non-success status)
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// Remote endpoint did not answer in time
    #[error("Endpoint timeout: {0}")]
    EndpointTimeout(String),

    /// Malformed SPARQL results document
    #[error("Results parse error: {0}")]
    ResultsParse(String),

    /// Result serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Execution error
    #[error("Execution error: {0}")]
    Execution(String),

    /// Invalid engine or endpoint configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SparqlResult<T> = Result<T, SparqlError>;

/// SPARQL query engine bound to one data source
#[derive(Debug, Clone)]
pub struct SparqlEngine {
    source: DataSource,
    executor: SparqlExecutor,
}

impl SparqlEngine {
    /// Create a new SPARQL engine with the default configuration
    pub fn new(source: impl Into<DataSource>) -> Self {
        Self {
            source: source.into(),
            executor: SparqlExecutor::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.executor = SparqlExecutor::new(config);
        self
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        self.executor.config()
    }

    /// Execute a query against the engine's source
    pub async fn query(&self, query: &Query) -> SparqlResult<SparqlResults> {
        self.executor.execute(query, &self.source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Graph, Term, Triple};

    fn engine() -> SparqlEngine {
        let mut graph = Graph::new();
        graph
            .insert(Triple::new(
                Term::resource("http://example.org/pluto").unwrap(),
                Term::resource("http://example.org/dogOf").unwrap(),
                Term::resource("http://example.org/topolino").unwrap(),
            ))
            .unwrap();
        SparqlEngine::new(graph)
    }

    fn group() -> PatternGroup {
        PatternGroup::new().add_pattern(Pattern::triple(
            Term::variable("s").unwrap(),
            Term::variable("p").unwrap(),
            Term::variable("o").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_engine_dispatches_forms() {
        let engine = engine();

        let select = engine.query(&Query::select().add_group(group())).await.unwrap();
        assert!(matches!(select, SparqlResults::Solutions(ref t) if t.len() == 1));

        let ask = engine.query(&Query::ask().add_group(group())).await.unwrap();
        assert_eq!(ask.as_bool(), Some(true));

        let template = Pattern::triple(
            Term::variable("o").unwrap(),
            Term::resource("http://example.org/owns").unwrap(),
            Term::variable("s").unwrap(),
        );
        let construct = engine
            .query(&Query::construct(vec![template]).add_group(group()))
            .await
            .unwrap();
        assert!(matches!(construct, SparqlResults::Graph(ref t) if t.len() == 1));
    }

    #[test]
    fn test_engine_config() {
        let engine = engine().with_config(EngineConfig {
            parallel_federation: false,
            ..EngineConfig::default()
        });
        assert!(!engine.config().parallel_federation);
        assert!(!engine.source().is_federation());
    }
}
