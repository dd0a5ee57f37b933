//! In-memory RDF graph and quad store
//!
//! Both keep insertion order: lookups return tuples in the order they were
//! added, which keeps query results deterministic.

use super::types::{Quad, Term, Triple};
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Context assigned to graphs created without an explicit one
pub const DEFAULT_GRAPH_CONTEXT: &str = "urn:samyama:default-graph";

/// RDF store errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RdfStoreError {
    /// Triple not found
    #[error("Triple not found")]
    TripleNotFound,

    /// Quad not found
    #[error("Quad not found")]
    QuadNotFound,

    /// Duplicate triple
    #[error("Duplicate triple")]
    DuplicateTriple,

    /// Duplicate quad
    #[error("Duplicate quad")]
    DuplicateQuad,

    /// A position holds a term it cannot hold (literal subject, variable, ...)
    #[error("Malformed statement: {0}")]
    Malformed(String),
}

pub type RdfStoreResult<T> = Result<T, RdfStoreError>;

type PositionIndex<T> = FxHashMap<String, IndexSet<T>>;

/// Bound positions of a lookup; `None` matches anything
#[derive(Debug, Clone, Copy, Default)]
pub struct Lookup<'a> {
    pub context: Option<&'a Term>,
    pub subject: Option<&'a Term>,
    pub predicate: Option<&'a Term>,
    pub object: Option<&'a Term>,
}

impl Lookup<'_> {
    fn matches_triple(&self, triple: &Triple) -> bool {
        self.subject.map_or(true, |s| s == &triple.subject)
            && self.predicate.map_or(true, |p| p == &triple.predicate)
            && self.object.map_or(true, |o| o == &triple.object)
    }

    fn matches_quad(&self, quad: &Quad) -> bool {
        self.context.map_or(true, |c| c == &quad.context)
            && self.subject.map_or(true, |s| s == &quad.subject)
            && self.predicate.map_or(true, |p| p == &quad.predicate)
            && self.object.map_or(true, |o| o == &quad.object)
    }
}

/// RDF graph: a set of triples under one context IRI
///
/// Indexed by subject, predicate and object; a lookup starts from the
/// smallest candidate set among the bound positions.
#[derive(Clone, Debug)]
pub struct Graph {
    context: Term,
    triples: IndexSet<Triple>,
    subject_index: PositionIndex<Triple>,
    predicate_index: PositionIndex<Triple>,
    object_index: PositionIndex<Triple>,
}

impl Graph {
    /// Create a new empty graph under the default context
    pub fn new() -> Self {
        Self::with_context_term(Term::Resource(DEFAULT_GRAPH_CONTEXT.to_string()))
    }

    /// Create a new empty graph under the given context IRI
    pub fn with_context(iri: &str) -> RdfStoreResult<Self> {
        let context = Term::resource(iri).map_err(|e| RdfStoreError::Malformed(e.to_string()))?;
        Ok(Self::with_context_term(context))
    }

    fn with_context_term(context: Term) -> Self {
        Self {
            context,
            triples: IndexSet::new(),
            subject_index: FxHashMap::default(),
            predicate_index: FxHashMap::default(),
            object_index: FxHashMap::default(),
        }
    }

    pub fn context(&self) -> &Term {
        &self.context
    }

    /// Insert a triple into the graph
    pub fn insert(&mut self, triple: Triple) -> RdfStoreResult<()> {
        if !triple.is_well_formed() {
            return Err(RdfStoreError::Malformed(triple.to_string()));
        }
        if self.triples.contains(&triple) {
            return Err(RdfStoreError::DuplicateTriple);
        }

        index_insert(&mut self.subject_index, triple.subject.encode(), &triple);
        index_insert(&mut self.predicate_index, triple.predicate.encode(), &triple);
        index_insert(&mut self.object_index, triple.object.encode(), &triple);
        self.triples.insert(triple);
        Ok(())
    }

    /// Remove a triple from the graph
    pub fn remove(&mut self, triple: &Triple) -> RdfStoreResult<()> {
        if !self.triples.shift_remove(triple) {
            return Err(RdfStoreError::TripleNotFound);
        }
        index_remove(&mut self.subject_index, &triple.subject.encode(), triple);
        index_remove(&mut self.predicate_index, &triple.predicate.encode(), triple);
        index_remove(&mut self.object_index, &triple.object.encode(), triple);
        Ok(())
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn clear(&mut self) {
        self.triples.clear();
        self.subject_index.clear();
        self.predicate_index.clear();
        self.object_index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Triples consistent with the bound positions of `lookup`
    ///
    /// A bound context different from this graph's context matches nothing.
    pub fn select(&self, lookup: &Lookup<'_>) -> Vec<Triple> {
        if lookup.context.is_some_and(|c| c != &self.context) {
            return Vec::new();
        }

        let candidates = [
            lookup.subject.map(|t| self.subject_index.get(&t.encode())),
            lookup.predicate.map(|t| self.predicate_index.get(&t.encode())),
            lookup.object.map(|t| self.object_index.get(&t.encode())),
        ];
        let mut narrowest: Option<&IndexSet<Triple>> = None;
        for candidate in candidates.into_iter().flatten() {
            match candidate {
                // a bound position with no index entry: no match at all
                None => return Vec::new(),
                Some(set) if narrowest.map_or(true, |n| set.len() < n.len()) => {
                    narrowest = Some(set)
                }
                Some(_) => {}
            }
        }

        let source = narrowest.unwrap_or(&self.triples);
        if narrowest.is_some() {
            // index buckets hold their own insertion order; restore the graph's
            let mut hits: Vec<(usize, &Triple)> = source
                .iter()
                .filter(|t| lookup.matches_triple(t))
                .filter_map(|t| self.triples.get_index_of(t).map(|i| (i, t)))
                .collect();
            hits.sort_unstable_by_key(|(i, _)| *i);
            hits.into_iter().map(|(_, t)| t.clone()).collect()
        } else {
            source
                .iter()
                .filter(|t| lookup.matches_triple(t))
                .cloned()
                .collect()
        }
    }

    /// Quads view of [`Graph::select`], carrying this graph's context
    pub fn select_quads(&self, lookup: &Lookup<'_>) -> Vec<Quad> {
        self.select(lookup)
            .into_iter()
            .map(|t| Quad::from_triple(self.context.clone(), t))
            .collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Triple> for Graph {
    /// Builds a default-context graph, skipping duplicates and malformed triples
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Graph::new();
        for triple in iter {
            let _ = graph.insert(triple);
        }
        graph
    }
}

/// Quad store: triples partitioned by context
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    quads: IndexSet<Quad>,
    context_index: PositionIndex<Quad>,
    subject_index: PositionIndex<Quad>,
    predicate_index: PositionIndex<Quad>,
    object_index: PositionIndex<Quad>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quad into the store
    pub fn insert(&mut self, quad: Quad) -> RdfStoreResult<()> {
        if !quad.is_well_formed() {
            return Err(RdfStoreError::Malformed(quad.to_string()));
        }
        if self.quads.contains(&quad) {
            return Err(RdfStoreError::DuplicateQuad);
        }
        index_insert(&mut self.context_index, quad.context.encode(), &quad);
        index_insert(&mut self.subject_index, quad.subject.encode(), &quad);
        index_insert(&mut self.predicate_index, quad.predicate.encode(), &quad);
        index_insert(&mut self.object_index, quad.object.encode(), &quad);
        self.quads.insert(quad);
        Ok(())
    }

    pub fn remove(&mut self, quad: &Quad) -> RdfStoreResult<()> {
        if !self.quads.shift_remove(quad) {
            return Err(RdfStoreError::QuadNotFound);
        }
        index_remove(&mut self.context_index, &quad.context.encode(), quad);
        index_remove(&mut self.subject_index, &quad.subject.encode(), quad);
        index_remove(&mut self.predicate_index, &quad.predicate.encode(), quad);
        index_remove(&mut self.object_index, &quad.object.encode(), quad);
        Ok(())
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        self.quads.contains(quad)
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn clear(&mut self) {
        self.quads.clear();
        self.context_index.clear();
        self.subject_index.clear();
        self.predicate_index.clear();
        self.object_index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }

    /// Distinct contexts in first-insertion order
    pub fn contexts(&self) -> Vec<Term> {
        self.quads
            .iter()
            .map(|q| q.context.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Extract the triples of one context as a graph
    pub fn extract_graph(&self, context: &Term) -> RdfStoreResult<Graph> {
        let iri = context.lexical();
        let mut graph = Graph::with_context(iri)?;
        for quad in self.select(&Lookup {
            context: Some(context),
            ..Lookup::default()
        }) {
            graph.insert(quad.as_triple())?;
        }
        Ok(graph)
    }

    /// Quads consistent with the bound positions of `lookup`
    pub fn select(&self, lookup: &Lookup<'_>) -> Vec<Quad> {
        let candidates = [
            lookup.context.map(|t| self.context_index.get(&t.encode())),
            lookup.subject.map(|t| self.subject_index.get(&t.encode())),
            lookup.predicate.map(|t| self.predicate_index.get(&t.encode())),
            lookup.object.map(|t| self.object_index.get(&t.encode())),
        ];
        let mut narrowest: Option<&IndexSet<Quad>> = None;
        for candidate in candidates.into_iter().flatten() {
            match candidate {
                None => return Vec::new(),
                Some(set) if narrowest.map_or(true, |n| set.len() < n.len()) => {
                    narrowest = Some(set)
                }
                Some(_) => {}
            }
        }

        match narrowest {
            Some(set) => {
                let mut hits: Vec<(usize, &Quad)> = set
                    .iter()
                    .filter(|q| lookup.matches_quad(q))
                    .filter_map(|q| self.quads.get_index_of(q).map(|i| (i, q)))
                    .collect();
                hits.sort_unstable_by_key(|(i, _)| *i);
                hits.into_iter().map(|(_, q)| q.clone()).collect()
            }
            None => self
                .quads
                .iter()
                .filter(|q| lookup.matches_quad(q))
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<Quad> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Quad>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        for quad in iter {
            let _ = store.insert(quad);
        }
        store
    }
}

fn index_insert<T: Clone + Eq + std::hash::Hash>(index: &mut PositionIndex<T>, key: String, item: &T) {
    index.entry(key).or_default().insert(item.clone());
}

fn index_remove<T: Eq + std::hash::Hash>(index: &mut PositionIndex<T>, key: &str, item: &T) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.shift_remove(item);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::resource(format!("http://example.org/{s}")).unwrap()
    }

    fn create_test_triple() -> Triple {
        Triple::new(iri("alice"), iri("name"), Term::plain("Alice"))
    }

    #[test]
    fn test_insert_and_contains() {
        let mut graph = Graph::new();
        let triple = create_test_triple();

        assert!(graph.insert(triple.clone()).is_ok());
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(&triple));
    }

    #[test]
    fn test_duplicate_insert() {
        let mut graph = Graph::new();
        let triple = create_test_triple();

        assert!(graph.insert(triple.clone()).is_ok());
        assert_eq!(graph.insert(triple), Err(RdfStoreError::DuplicateTriple));
    }

    #[test]
    fn test_malformed_insert() {
        let mut graph = Graph::new();
        let literal_subject = Triple::new(Term::plain("x"), iri("p"), iri("o"));
        assert!(matches!(
            graph.insert(literal_subject),
            Err(RdfStoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut graph = Graph::new();
        let triple = create_test_triple();

        graph.insert(triple.clone()).unwrap();
        graph.remove(&triple).unwrap();
        assert!(graph.is_empty());
        assert!(graph.select(&Lookup::default()).is_empty());
        assert_eq!(graph.remove(&triple), Err(RdfStoreError::TripleNotFound));
    }

    #[test]
    fn test_select_keeps_insertion_order() {
        let mut graph = Graph::new();
        for name in ["c", "a", "b"] {
            graph
                .insert(Triple::new(iri(name), iri("p"), iri("o")))
                .unwrap();
        }
        graph
            .insert(Triple::new(iri("a"), iri("q"), iri("o")))
            .unwrap();

        let p = iri("p");
        let hits = graph.select(&Lookup {
            predicate: Some(&p),
            ..Lookup::default()
        });
        let subjects: Vec<_> = hits.iter().map(|t| t.subject.lexical().to_string()).collect();
        assert_eq!(
            subjects,
            vec![
                "http://example.org/c",
                "http://example.org/a",
                "http://example.org/b"
            ]
        );

        let a = iri("a");
        let o = iri("o");
        let hits = graph.select(&Lookup {
            subject: Some(&a),
            object: Some(&o),
            ..Lookup::default()
        });
        assert_eq!(hits.len(), 2);

        let missing = iri("missing");
        assert!(graph
            .select(&Lookup {
                subject: Some(&missing),
                ..Lookup::default()
            })
            .is_empty());
    }

    #[test]
    fn test_graph_context_lookup() {
        let mut graph = Graph::with_context("http://example.org/g1").unwrap();
        graph.insert(create_test_triple()).unwrap();

        let g1 = iri("g1");
        let g2 = iri("g2");
        let quads = graph.select_quads(&Lookup {
            context: Some(&g1),
            ..Lookup::default()
        });
        assert_eq!(quads.len(), 1);
        assert_eq!(quads[0].context, g1);
        assert!(graph
            .select(&Lookup {
                context: Some(&g2),
                ..Lookup::default()
            })
            .is_empty());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        let triple = create_test_triple();
        store
            .insert(Quad::from_triple(iri("g1"), triple.clone()))
            .unwrap();
        store
            .insert(Quad::from_triple(iri("g2"), triple.clone()))
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.contexts(), vec![iri("g1"), iri("g2")]);

        let g2 = iri("g2");
        let hits = store.select(&Lookup {
            context: Some(&g2),
            ..Lookup::default()
        });
        assert_eq!(hits.len(), 1);

        let graph = store.extract_graph(&g2).unwrap();
        assert!(graph.contains(&triple));
        assert_eq!(graph.context(), &g2);
    }
}
