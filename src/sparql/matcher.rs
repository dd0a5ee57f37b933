//! Matching one pattern against local tuples

use super::pattern::Pattern;
use super::table::{Cell, SolutionTable};
use crate::rdf::{Lookup, Quad, Term};

/// Lookup binding every constant position of `pattern`
pub(crate) fn lookup_for(pattern: &Pattern) -> Lookup<'_> {
    let bound = |term: &Term| -> bool { !term.is_variable() };
    Lookup {
        context: pattern.context.as_ref().filter(|t| bound(t)),
        subject: Some(&pattern.subject).filter(|t| bound(t)),
        predicate: Some(&pattern.predicate).filter(|t| bound(t)),
        object: Some(&pattern.object).filter(|t| bound(t)),
    }
}

/// Project matched tuples onto the pattern's variables
///
/// One column per distinct variable; a tuple binding a repeated variable to
/// two different values is dropped. No tuples still yields every column.
pub(crate) fn bind_tuples(pattern: &Pattern, tuples: &[Quad]) -> SolutionTable {
    let columns = pattern.variables();
    let mut table = SolutionTable::new(columns.iter().cloned());

    'tuples: for quad in tuples {
        let values = [
            pattern.context.as_ref().map(|c| (c, &quad.context)),
            Some((&pattern.subject, &quad.subject)),
            Some((&pattern.predicate, &quad.predicate)),
            Some((&pattern.object, &quad.object)),
        ];
        let mut row: Vec<Cell> = vec![None; columns.len()];
        for (position, value) in values.into_iter().flatten() {
            let Some(name) = position.as_variable() else {
                continue;
            };
            let Some(index) = columns.iter().position(|c| c == name) else {
                continue;
            };
            let encoded = value.encode();
            match &row[index] {
                Some(existing) if *existing != encoded => continue 'tuples,
                Some(_) => {}
                None => row[index] = Some(encoded),
            }
        }
        table.push_row(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Triple;

    fn iri(s: &str) -> Term {
        Term::resource(format!("http://example.org/{s}")).unwrap()
    }

    fn var(s: &str) -> Term {
        Term::variable(s).unwrap()
    }

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::from_triple(iri("g"), Triple::new(iri(s), iri(p), iri(o)))
    }

    #[test]
    fn test_lookup_binds_constants() {
        let pattern = Pattern::triple(var("s"), iri("p"), var("o"));
        let lookup = lookup_for(&pattern);
        assert!(lookup.context.is_none());
        assert!(lookup.subject.is_none());
        assert_eq!(lookup.predicate, Some(&iri("p")));
        assert!(lookup.object.is_none());
    }

    #[test]
    fn test_repeated_variable_collapses() {
        let pattern = Pattern::triple(var("x"), iri("knows"), var("x"));
        let tuples = vec![quad("a", "knows", "a"), quad("a", "knows", "b")];
        let table = bind_tuples(&pattern, &tuples);

        assert_eq!(table.columns(), &["?X".to_string()]);
        assert_eq!(table.rows(), &[vec![Some(iri("a").encode())]]);
    }

    #[test]
    fn test_quad_pattern_binds_context() {
        let pattern = Pattern::quad(var("g"), var("s"), iri("p"), iri("o"));
        let table = bind_tuples(&pattern, &[quad("a", "p", "o")]);
        assert_eq!(table.columns(), &["?G".to_string(), "?S".to_string()]);
        assert_eq!(table.cell(0, "?G"), Some("http://example.org/g"));
    }

    #[test]
    fn test_no_tuples_keeps_columns() {
        let pattern = Pattern::triple(var("s"), iri("p"), var("o"));
        let table = bind_tuples(&pattern, &[]);
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }
}
