//! RDF type definitions
//!
//! Terms are a closed set of variants matched exhaustively wherever the kind of
//! a term changes behavior. Every table cell holds the canonical string
//! encoding of one of these terms (see [`super::codec`]).

use oxiri::Iri;
use oxrdf::{BlankNode as OxBlankNode, Literal as OxLiteral, NamedNode as OxNamedNode, Term as OxTerm};
use oxrdf::vocab::xsd;
use std::fmt;
use thiserror::Error;

/// Prefix marking a resource as a blank node
pub const BLANK_NODE_PREFIX: &str = "bnode:";

/// Term construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermError {
    /// Invalid IRI
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// Invalid language tag
    #[error("Invalid language tag: {0}")]
    InvalidLanguageTag(String),

    /// Invalid variable name
    #[error("Invalid variable name: {0}")]
    InvalidVariable(String),

    /// Variables have no concrete RDF value
    #[error("Variable {0} is not a concrete term")]
    NotConcrete(String),
}

pub type TermResult<T> = Result<T, TermError>;

/// RDF term or query variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// IRI, including blank nodes written as `bnode:<id>`
    Resource(String),
    /// Literal with an optional language tag (stored upper-cased)
    PlainLiteral {
        value: String,
        language: Option<String>,
    },
    /// Literal with a datatype IRI
    TypedLiteral { value: String, datatype: String },
    /// Query variable, always stored as `?NAME`
    Variable(String),
}

impl Term {
    /// Create a resource from an absolute IRI (or a `bnode:` identifier)
    pub fn resource(iri: impl Into<String>) -> TermResult<Self> {
        let iri = iri.into();
        if iri.starts_with(BLANK_NODE_PREFIX) && iri.len() > BLANK_NODE_PREFIX.len() {
            return Ok(Term::Resource(iri));
        }
        Iri::parse(iri.as_str()).map_err(|e| TermError::InvalidIri(format!("{iri}: {e}")))?;
        Ok(Term::Resource(iri))
    }

    /// Create a blank node resource with the given identifier
    pub fn blank(id: &str) -> Self {
        Term::Resource(format!("{BLANK_NODE_PREFIX}{}", id.trim_start_matches("_:")))
    }

    /// Create a blank node resource with a fresh identifier
    pub fn new_blank() -> Self {
        Term::blank(&uuid::Uuid::new_v4().simple().to_string())
    }

    /// Create a literal without language tag
    pub fn plain(value: impl Into<String>) -> Self {
        Term::PlainLiteral {
            value: value.into(),
            language: None,
        }
    }

    /// Create a language-tagged literal
    pub fn lang(value: impl Into<String>, language: &str) -> TermResult<Self> {
        if !is_language_tag(language) {
            return Err(TermError::InvalidLanguageTag(language.to_string()));
        }
        Ok(Term::PlainLiteral {
            value: value.into(),
            language: Some(language.to_uppercase()),
        })
    }

    /// Create a typed literal
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::TypedLiteral {
            value: value.into(),
            datatype: datatype.into(),
        }
    }

    pub fn integer(value: i64) -> Self {
        Term::typed(value.to_string(), xsd::INTEGER.as_str())
    }

    pub fn decimal(value: f64) -> Self {
        Term::typed(format_decimal(value), xsd::DECIMAL.as_str())
    }

    pub fn double(value: f64) -> Self {
        Term::typed(format_double(value), xsd::DOUBLE.as_str())
    }

    pub fn boolean(value: bool) -> Self {
        Term::typed(value.to_string(), xsd::BOOLEAN.as_str())
    }

    /// Create a variable; the name is normalised to `?NAME`
    pub fn variable(name: &str) -> TermResult<Self> {
        Ok(Term::Variable(variable_name(name)?))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Term::Resource(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Resource(iri) if iri.starts_with(BLANK_NODE_PREFIX))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::PlainLiteral { .. } | Term::TypedLiteral { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Variable name if this term is a variable
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Lexical form: IRI for resources, text for literals, name for variables
    pub fn lexical(&self) -> &str {
        match self {
            Term::Resource(iri) => iri,
            Term::PlainLiteral { value, .. } | Term::TypedLiteral { value, .. } => value,
            Term::Variable(name) => name,
        }
    }

    /// Language tag of a plain literal
    pub fn language(&self) -> Option<&str> {
        match self {
            Term::PlainLiteral { language, .. } => language.as_deref(),
            _ => None,
        }
    }

    /// Datatype IRI of a literal (`xsd:string` / `rdf:langString` for plain literals)
    pub fn datatype(&self) -> Option<&str> {
        match self {
            Term::TypedLiteral { datatype, .. } => Some(datatype),
            Term::PlainLiteral { language: Some(_), .. } => {
                Some(oxrdf::vocab::rdf::LANG_STRING.as_str())
            }
            Term::PlainLiteral { language: None, .. } => Some(xsd::STRING.as_str()),
            Term::Resource(_) | Term::Variable(_) => None,
        }
    }

    /// Convert to an oxrdf term
    pub fn to_oxrdf(&self) -> TermResult<OxTerm> {
        match self {
            Term::Resource(iri) => {
                if let Some(id) = iri.strip_prefix(BLANK_NODE_PREFIX) {
                    OxBlankNode::new(id)
                        .map(OxTerm::from)
                        .map_err(|e| TermError::InvalidIri(format!("{iri}: {e}")))
                } else {
                    OxNamedNode::new(iri.as_str())
                        .map(OxTerm::from)
                        .map_err(|e| TermError::InvalidIri(format!("{iri}: {e}")))
                }
            }
            Term::PlainLiteral {
                value,
                language: Some(language),
            } => OxLiteral::new_language_tagged_literal(value.as_str(), language.to_lowercase())
                .map(OxTerm::from)
                .map_err(|e| TermError::InvalidLanguageTag(e.to_string())),
            Term::PlainLiteral {
                value,
                language: None,
            } => Ok(OxLiteral::new_simple_literal(value.as_str()).into()),
            Term::TypedLiteral { value, datatype } => {
                let datatype = OxNamedNode::new(datatype.as_str())
                    .map_err(|e| TermError::InvalidIri(format!("{datatype}: {e}")))?;
                Ok(OxLiteral::new_typed_literal(value.as_str(), datatype).into())
            }
            Term::Variable(name) => Err(TermError::NotConcrete(name.clone())),
        }
    }
}

impl fmt::Display for Term {
    /// SPARQL surface syntax
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Resource(iri) => match iri.strip_prefix(BLANK_NODE_PREFIX) {
                Some(id) => write!(f, "_:{id}"),
                None => write!(f, "<{iri}>"),
            },
            Term::PlainLiteral { value, language } => {
                write!(f, "\"{}\"", escape_literal(value))?;
                if let Some(language) = language {
                    write!(f, "@{language}")?;
                }
                Ok(())
            }
            Term::TypedLiteral { value, datatype } => {
                write!(f, "\"{}\"^^<{datatype}>", escape_literal(value))
            }
            Term::Variable(name) => write!(f, "{name}"),
        }
    }
}

impl From<OxTerm> for Term {
    fn from(term: OxTerm) -> Self {
        match term {
            OxTerm::NamedNode(n) => Term::Resource(n.into_string()),
            OxTerm::BlankNode(b) => Term::blank(b.as_str()),
            OxTerm::Literal(l) => {
                let (value, datatype, language) = l.destruct();
                match (language, datatype) {
                    (Some(language), _) => Term::PlainLiteral {
                        value,
                        language: Some(language.to_uppercase()),
                    },
                    (None, Some(datatype)) if datatype != xsd::STRING => {
                        Term::TypedLiteral {
                            value,
                            datatype: datatype.into_string(),
                        }
                    }
                    (None, _) => Term::plain(value),
                }
            }
            #[allow(unreachable_patterns)]
            other => Term::plain(other.to_string()),
        }
    }
}

/// RDF triple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    /// Subject (resource)
    pub subject: Term,
    /// Predicate (non-blank resource)
    pub predicate: Term,
    /// Object (resource or literal)
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Whether every position holds a term valid for its slot
    pub fn is_well_formed(&self) -> bool {
        self.subject.is_resource()
            && self.predicate.is_resource()
            && !self.predicate.is_blank()
            && !self.object.is_variable()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// RDF quad (triple + context)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    /// Context (named graph)
    pub context: Term,
    /// Subject
    pub subject: Term,
    /// Predicate
    pub predicate: Term,
    /// Object
    pub object: Term,
}

impl Quad {
    pub fn new(context: Term, subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            context,
            subject,
            predicate,
            object,
        }
    }

    /// Attach a context to a triple
    pub fn from_triple(context: Term, triple: Triple) -> Self {
        Self {
            context,
            subject: triple.subject,
            predicate: triple.predicate,
            object: triple.object,
        }
    }

    /// Get the triple part (without context)
    pub fn as_triple(&self) -> Triple {
        Triple {
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            object: self.object.clone(),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.context.is_resource() && !self.context.is_blank() && self.as_triple().is_well_formed()
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} .",
            self.subject, self.predicate, self.object, self.context
        )
    }
}

/// Normalise a variable name to `?NAME`
pub fn variable_name(name: &str) -> TermResult<String> {
    let bare = name.trim().trim_start_matches(['?', '$']);
    if bare.is_empty() || !bare.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(TermError::InvalidVariable(name.to_string()));
    }
    Ok(format!("?{}", bare.to_uppercase()))
}

/// Whether `tag` is a syntactically valid BCP47-style language tag
pub fn is_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphabetic()));
    primary_ok && parts.all(|p| (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

pub(crate) fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub(crate) fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        format!("{value:E}")
    }
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}
