//! Samyama SPARQL
//!
//! A SPARQL 1.1 evaluation engine over in-memory RDF graphs, quad stores,
//! remote SPARQL endpoints and federations of them.
//!
//! # Architecture
//!
//! - [`rdf`]: terms, their canonical string encoding, triple and quad stores,
//!   and the [`DataSource`] a query runs against.
//! - [`sparql`]: the query object model, pattern matching, property paths,
//!   federation fan-out, the solution-table algebra, solution modifiers and
//!   result serialization.
//!
//! Queries are built programmatically; there is no SPARQL text parser. Remote
//! endpoints receive a canonical SPARQL rendering of each pattern.
//!
//! ## Example Usage
//!
//! ```rust
//! use samyama_sparql::{Graph, Pattern, PatternGroup, Query, SparqlEngine, Term, Triple};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = Graph::new();
//! graph.insert(Triple::new(
//!     Term::resource("http://example.org/pluto")?,
//!     Term::resource("http://example.org/dogOf")?,
//!     Term::resource("http://example.org/topolino")?,
//! ))?;
//!
//! let query = Query::ask().add_group(PatternGroup::new().add_pattern(Pattern::triple(
//!     Term::variable("dog")?,
//!     Term::resource("http://example.org/dogOf")?,
//!     Term::resource("http://example.org/topolino")?,
//! )));
//! let answer = SparqlEngine::new(graph).query(&query).await?;
//! assert_eq!(answer.as_bool(), Some(true));
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod rdf;
pub mod sparql;

// Re-export main types for convenience
pub use rdf::{
    DataSource, Federation, Graph, Lookup, MemoryStore, Quad, RdfStoreError, RdfStoreResult, Term,
    TermError, TermResult, Triple,
};

pub use sparql::{
    EndpointOptions, EngineConfig, Filter, Pattern, PatternGroup, PropertyPath, Query,
    ResultFormat, SolutionTable, SparqlEndpoint, SparqlEngine, SparqlError, SparqlExecutor,
    SparqlResult, SparqlResults, Values,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
