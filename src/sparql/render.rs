//! Canonical SPARQL text sent to remote endpoints
//!
//! ```text
//! SELECT *
//! WHERE {
//!   {
//!     VALUES ?X { <a> UNDEF }
//!     ?Y <dogOf> ?X .
//!   }
//! }
//! ```

use super::pattern::{Pattern, Values};
use crate::rdf::Term;
use std::fmt::Write;

/// Render one pattern, with an optional injected VALUES block
pub fn render_pattern_query(pattern: &Pattern, values: Option<&Values>) -> String {
    let mut query = String::from("SELECT *\nWHERE {\n  {\n");
    if let Some(values) = values.filter(|v| v.is_evaluable()) {
        let _ = writeln!(query, "    {}", render_values(values));
    }
    let _ = writeln!(query, "    {pattern}");
    query.push_str("  }\n}\n");
    query
}

/// `VALUES ?X { ... }` or `VALUES (?X ?Y) { ( ... ) ... }` on one line
pub fn render_values(values: &Values) -> String {
    let variables = values.variables();
    let cell = |term: Option<&Term>| term.map_or_else(|| "UNDEF".to_string(), |t| t.to_string());

    if variables.len() == 1 {
        let entries: Vec<String> = (0..values.len())
            .map(|i| cell(values.row(i)[0]))
            .collect();
        format!("VALUES {} {{ {} }}", variables[0], entries.join(" "))
    } else {
        let rows: Vec<String> = (0..values.len())
            .map(|i| {
                let cells: Vec<String> = values.row(i).into_iter().map(cell).collect();
                format!("( {} )", cells.join(" "))
            })
            .collect();
        format!(
            "VALUES ({}) {{ {} }}",
            variables.join(" "),
            rows.join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::resource(format!("http://example.org/{s}")).unwrap()
    }

    fn var(s: &str) -> Term {
        Term::variable(s).unwrap()
    }

    #[test]
    fn test_render_plain_pattern() {
        let pattern = Pattern::triple(var("y"), iri("dogOf"), var("x"));
        assert_eq!(
            render_pattern_query(&pattern, None),
            "SELECT *\nWHERE {\n  {\n    ?Y <http://example.org/dogOf> ?X .\n  }\n}\n"
        );
    }

    #[test]
    fn test_render_with_values() {
        let pattern = Pattern::triple(var("y"), iri("dogOf"), var("x"));
        let values = Values::new()
            .bind("x", vec![Some(iri("topolino")), None])
            .unwrap();
        assert_eq!(
            render_pattern_query(&pattern, Some(&values)),
            "SELECT *\nWHERE {\n  {\n    VALUES ?X { <http://example.org/topolino> UNDEF }\n    \
             ?Y <http://example.org/dogOf> ?X .\n  }\n}\n"
        );
    }

    #[test]
    fn test_render_multi_variable_values() {
        let values = Values::new()
            .bind("x", vec![Some(iri("a"))])
            .unwrap()
            .bind("n", vec![Some(Term::lang("Pluto", "en").unwrap())])
            .unwrap();
        assert_eq!(
            render_values(&values),
            "VALUES (?X ?N) { ( <http://example.org/a> \"Pluto\"@EN ) }"
        );
    }

    #[test]
    fn test_render_quad_pattern() {
        let pattern = Pattern::quad(iri("g"), var("s"), iri("p"), var("o"));
        assert!(render_pattern_query(&pattern, None)
            .contains("    GRAPH <http://example.org/g> { ?S <http://example.org/p> ?O }\n"));
    }
}
