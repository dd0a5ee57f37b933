//! Data sources a query can be evaluated against

use super::store::{Graph, Lookup, MemoryStore};
use super::types::Quad;
use crate::sparql::endpoint::SparqlEndpoint;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A queryable source of triples or quads
///
/// Local variants answer lookups directly; the shared variants take a read
/// lock first. Federations and remote endpoints are not matched tuple by
/// tuple: the federation coordinator walks their members instead.
#[derive(Debug, Clone)]
pub enum DataSource {
    Graph(Arc<Graph>),
    Store(Arc<MemoryStore>),
    SharedGraph(Arc<RwLock<Graph>>),
    SharedStore(Arc<RwLock<MemoryStore>>),
    Federation(Arc<Federation>),
    Endpoint(Arc<SparqlEndpoint>),
}

impl DataSource {
    /// Tuples consistent with the bound positions of `lookup`
    ///
    /// Returns `None` for sources that cannot be matched locally.
    pub async fn select_quads(&self, lookup: &Lookup<'_>) -> Option<Vec<Quad>> {
        match self {
            DataSource::Graph(graph) => Some(graph.select_quads(lookup)),
            DataSource::Store(store) => Some(store.select(lookup)),
            DataSource::SharedGraph(graph) => Some(graph.read().await.select_quads(lookup)),
            DataSource::SharedStore(store) => Some(store.read().await.select(lookup)),
            DataSource::Federation(_) | DataSource::Endpoint(_) => None,
        }
    }

    /// Whether the source natively holds quads (several contexts)
    pub fn is_quad_capable(&self) -> bool {
        matches!(self, DataSource::Store(_) | DataSource::SharedStore(_))
    }

    pub fn is_federation(&self) -> bool {
        matches!(self, DataSource::Federation(_))
    }

    /// Ordered members of a federation; empty for any other source
    pub fn members(&self) -> &[DataSource] {
        match self {
            DataSource::Federation(federation) => federation.members(),
            _ => &[],
        }
    }

    /// Short label for log lines
    pub fn label(&self) -> String {
        match self {
            DataSource::Graph(g) => format!("graph <{}>", g.context().lexical()),
            DataSource::Store(_) => "store".to_string(),
            DataSource::SharedGraph(_) => "shared graph".to_string(),
            DataSource::SharedStore(_) => "shared store".to_string(),
            DataSource::Federation(f) => format!("federation {}", f.name()),
            DataSource::Endpoint(e) => format!("endpoint <{}>", e.url()),
        }
    }
}

impl From<Graph> for DataSource {
    fn from(graph: Graph) -> Self {
        DataSource::Graph(Arc::new(graph))
    }
}

impl From<MemoryStore> for DataSource {
    fn from(store: MemoryStore) -> Self {
        DataSource::Store(Arc::new(store))
    }
}

impl From<Arc<RwLock<Graph>>> for DataSource {
    fn from(graph: Arc<RwLock<Graph>>) -> Self {
        DataSource::SharedGraph(graph)
    }
}

impl From<Arc<RwLock<MemoryStore>>> for DataSource {
    fn from(store: Arc<RwLock<MemoryStore>>) -> Self {
        DataSource::SharedStore(store)
    }
}

impl From<Federation> for DataSource {
    fn from(federation: Federation) -> Self {
        DataSource::Federation(Arc::new(federation))
    }
}

impl From<SparqlEndpoint> for DataSource {
    fn from(endpoint: SparqlEndpoint) -> Self {
        DataSource::Endpoint(Arc::new(endpoint))
    }
}

/// Ordered collection of independent sources queried as alternatives
#[derive(Debug, Clone, Default)]
pub struct Federation {
    name: String,
    members: Vec<DataSource>,
}

impl Federation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Builder form of [`Federation::add_member`]
    pub fn with_member(mut self, member: impl Into<DataSource>) -> Self {
        self.add_member(member);
        self
    }

    pub fn add_member(&mut self, member: impl Into<DataSource>) {
        self.members.push(member.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[DataSource] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Term, Triple};

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        graph
            .insert(Triple::new(
                Term::resource("http://example.org/pluto").unwrap(),
                Term::resource("http://example.org/dogOf").unwrap(),
                Term::resource("http://example.org/topolino").unwrap(),
            ))
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn test_local_sources_answer_lookups() {
        let plain = DataSource::from(sample_graph());
        let shared = DataSource::from(Arc::new(RwLock::new(sample_graph())));

        for source in [plain, shared] {
            let hits = source.select_quads(&Lookup::default()).await.unwrap();
            assert_eq!(hits.len(), 1);
            assert!(!source.is_quad_capable());
        }
    }

    #[tokio::test]
    async fn test_federation_members_keep_order() {
        let inner = Federation::new("inner").with_member(sample_graph());
        let federation = Federation::new("outer")
            .with_member(MemoryStore::new())
            .with_member(inner);
        let source = DataSource::from(federation);

        assert!(source.is_federation());
        assert!(source.select_quads(&Lookup::default()).await.is_none());
        let members = source.members();
        assert_eq!(members.len(), 2);
        assert!(members[0].is_quad_capable());
        assert_eq!(members[1].members().len(), 1);
    }
}
