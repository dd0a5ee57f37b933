//! Canonical string encoding of terms
//!
//! Every table cell is an `Option<String>`: `None` is unbound, `Some` holds
//! the encoded term.
//!
//! - resource: the IRI text (`bnode:<id>` for blank nodes)
//! - plain literal: `text`, or `text@LANG` with the tag upper-cased
//! - typed literal: `text^^datatypeIRI`

use super::types::{Term, BLANK_NODE_PREFIX};
use oxiri::Iri;

const DATATYPE_SEPARATOR: &str = "^^";

impl Term {
    /// Canonical encoding of a concrete term (variables encode as their name)
    pub fn encode(&self) -> String {
        match self {
            Term::Resource(iri) => iri.clone(),
            Term::PlainLiteral {
                value,
                language: Some(language),
            } => format!("{value}@{language}"),
            Term::PlainLiteral {
                value,
                language: None,
            } => value.clone(),
            Term::TypedLiteral { value, datatype } => {
                format!("{value}{DATATYPE_SEPARATOR}{datatype}")
            }
            Term::Variable(name) => name.clone(),
        }
    }

    /// Decode a canonical encoding back into a term
    pub fn decode(encoded: &str) -> Term {
        if let Some((value, datatype)) = encoded.rsplit_once(DATATYPE_SEPARATOR) {
            if is_absolute_iri(datatype) {
                return Term::TypedLiteral {
                    value: value.to_string(),
                    datatype: datatype.to_string(),
                };
            }
        }
        if let Some((value, language)) = encoded.rsplit_once('@') {
            if is_encoded_language(language) {
                return Term::PlainLiteral {
                    value: value.to_string(),
                    language: Some(language.to_string()),
                };
            }
        }
        if encoded.starts_with(BLANK_NODE_PREFIX) || is_absolute_iri(encoded) {
            return Term::Resource(encoded.to_string());
        }
        Term::plain(encoded)
    }
}

/// Encode a possibly-unbound term
pub fn encode(term: Option<&Term>) -> Option<String> {
    term.map(Term::encode)
}

/// Decode a possibly-unbound cell
pub fn decode(encoded: Option<&str>) -> Option<Term> {
    encoded.map(Term::decode)
}

fn is_absolute_iri(value: &str) -> bool {
    !value.is_empty()
        && !value.chars().any(char::is_whitespace)
        && Iri::parse(value).is_ok()
}

/// Language tags are upper-cased by the encoder, which keeps them apart from
/// `user@host` fragments inside IRIs.
fn is_encoded_language(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts.next().is_some_and(|p| {
        (1..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_uppercase())
    });
    primary_ok
        && parts.all(|p| {
            (1..=8).contains(&p.len())
                && p.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::vocab::xsd;

    #[test]
    fn test_encode_forms() {
        let iri = Term::resource("http://example.org/topolino").unwrap();
        assert_eq!(iri.encode(), "http://example.org/topolino");

        let lang = Term::lang("Mickey Mouse", "en-US").unwrap();
        assert_eq!(lang.encode(), "Mickey Mouse@EN-US");

        let typed = Term::integer(25);
        assert_eq!(
            typed.encode(),
            "25^^http://www.w3.org/2001/XMLSchema#integer"
        );
        assert_eq!(Term::plain("hello").encode(), "hello");
    }

    #[test]
    fn test_round_trip() {
        let terms = vec![
            Term::resource("http://example.org/a").unwrap(),
            Term::resource("mailto:someone@example.org").unwrap(),
            Term::blank("b1"),
            Term::plain("Donald Duck"),
            Term::lang("Donald Duck", "en-us").unwrap(),
            Term::typed("2024-01-01T00:00:00Z", xsd::DATE_TIME.as_str()),
            Term::plain("50% off @ the shop"),
        ];
        for term in terms {
            assert_eq!(Term::decode(&term.encode()), term, "round trip of {term}");
        }
    }

    #[test]
    fn test_unbound_round_trip() {
        assert_eq!(encode(None), None);
        assert_eq!(decode(None), None);
        let term = Term::plain("x");
        assert_eq!(decode(encode(Some(&term)).as_deref()), Some(term));
    }
}
