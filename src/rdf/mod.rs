//! RDF data model and data sources
//!
//! - Terms and their canonical string encoding
//! - Triples and quads
//! - Indexed in-memory graphs and quad stores
//! - Federations of sources, including remote SPARQL endpoints
//!
//! # Example
//!
//! ```rust
//! use samyama_sparql::rdf::{Graph, Lookup, Term, Triple};
//!
//! let mut graph = Graph::new();
//! let pluto = Term::resource("http://example.org/pluto").unwrap();
//! let dog_of = Term::resource("http://example.org/dogOf").unwrap();
//! let topolino = Term::resource("http://example.org/topolino").unwrap();
//! graph.insert(Triple::new(pluto.clone(), dog_of, topolino)).unwrap();
//!
//! let hits = graph.select(&Lookup { subject: Some(&pluto), ..Lookup::default() });
//! assert_eq!(hits.len(), 1);
//! ```

pub mod codec;
mod source;
mod store;
mod types;

pub use source::{DataSource, Federation};
pub use store::{
    Graph, Lookup, MemoryStore, RdfStoreError, RdfStoreResult, DEFAULT_GRAPH_CONTEXT,
};
pub use types::{
    is_language_tag, variable_name, Quad, Term, TermError, TermResult, Triple,
    BLANK_NODE_PREFIX,
};
