//! SPARQL query results

use super::table::SolutionTable;
use super::{SparqlError, SparqlResult};
use crate::rdf::Term;
use oxrdf::{Term as OxTerm, Variable};
use sparesults::{QueryResultsFormat, QueryResultsSerializer};

/// SPARQL result format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    /// SPARQL XML results
    Xml,
    /// SPARQL JSON results
    Json,
    /// CSV results
    Csv,
    /// TSV results
    Tsv,
    /// Graph results as N-Triples
    NTriples,
    /// Graph results as N-Quads
    NQuads,
}

impl ResultFormat {
    fn results_format(self) -> Option<QueryResultsFormat> {
        match self {
            ResultFormat::Xml => Some(QueryResultsFormat::Xml),
            ResultFormat::Json => Some(QueryResultsFormat::Json),
            ResultFormat::Csv => Some(QueryResultsFormat::Csv),
            ResultFormat::Tsv => Some(QueryResultsFormat::Tsv),
            ResultFormat::NTriples | ResultFormat::NQuads => None,
        }
    }
}

/// SPARQL query results
#[derive(Debug, Clone, PartialEq)]
pub enum SparqlResults {
    /// Solutions from a SELECT query
    Solutions(SolutionTable),

    /// Boolean result from an ASK query
    Boolean(bool),

    /// Triple or quad table from a CONSTRUCT/DESCRIBE query
    Graph(SolutionTable),
}

impl SparqlResults {
    /// Solution or graph table, if any
    pub fn table(&self) -> Option<&SolutionTable> {
        match self {
            SparqlResults::Solutions(table) | SparqlResults::Graph(table) => Some(table),
            SparqlResults::Boolean(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SparqlResults::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Serialize results to string
    ///
    /// Solutions and booleans use the SPARQL results formats; graph tables use
    /// N-Triples or N-Quads. Any other pairing is a serialization error.
    pub fn serialize(&self, format: ResultFormat) -> SparqlResult<String> {
        let bytes = match (self, format.results_format()) {
            (SparqlResults::Solutions(table), Some(results)) => serialize_solutions(table, results)?,
            (SparqlResults::Boolean(value), Some(results)) => QueryResultsSerializer::from_format(results)
                .serialize_boolean_to_writer(Vec::new(), *value)
                .map_err(|e| SparqlError::Serialization(e.to_string()))?,
            (SparqlResults::Graph(table), None) => {
                serialize_graph(table, format == ResultFormat::NQuads)?.into_bytes()
            }
            _ => {
                return Err(SparqlError::Serialization(format!(
                    "{format:?} is not available for this result kind"
                )))
            }
        };
        String::from_utf8(bytes).map_err(|e| SparqlError::Serialization(e.to_string()))
    }
}

fn serialize_solutions(table: &SolutionTable, format: QueryResultsFormat) -> SparqlResult<Vec<u8>> {
    let variables = table
        .columns()
        .iter()
        .map(|c| Variable::new(c.trim_start_matches('?')))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SparqlError::Serialization(e.to_string()))?;

    let mut writer = QueryResultsSerializer::from_format(format)
        .serialize_solutions_to_writer(Vec::new(), variables.clone())
        .map_err(|e| SparqlError::Serialization(e.to_string()))?;

    for row in table.rows() {
        let mut bindings = Vec::with_capacity(row.len());
        for (variable, cell) in variables.iter().zip(row) {
            if let Some(encoded) = cell {
                let term = Term::decode(encoded)
                    .to_oxrdf()
                    .map_err(|e| SparqlError::Serialization(e.to_string()))?;
                bindings.push((variable.clone(), term));
            }
        }
        writer
            .serialize(bindings.iter().map(|(v, t)| (v.as_ref(), t.as_ref())))
            .map_err(|e| SparqlError::Serialization(e.to_string()))?;
    }

    writer
        .finish()
        .map_err(|e| SparqlError::Serialization(e.to_string()))
}

/// One statement per row; rows with an unbound subject, predicate or object
/// are skipped, an unbound context writes a triple.
fn serialize_graph(table: &SolutionTable, quads: bool) -> SparqlResult<String> {
    let has_context = match table.columns().len() {
        3 => false,
        4 => true,
        n => {
            return Err(SparqlError::Serialization(format!(
                "graph table needs 3 or 4 columns, found {n}"
            )))
        }
    };
    let mut out = String::new();
    for row in table.rows() {
        let (context, spo) = if has_context {
            (row[0].as_deref(), &row[1..])
        } else {
            (None, &row[..])
        };
        let Some(terms) = spo
            .iter()
            .map(|cell| cell.as_deref().map(to_oxrdf))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        let terms = terms.into_iter().collect::<SparqlResult<Vec<OxTerm>>>()?;
        out.push_str(&format!("{} {} {}", terms[0], terms[1], terms[2]));
        if let (true, Some(context)) = (quads, context) {
            out.push_str(&format!(" {}", to_oxrdf(context)?));
        }
        out.push_str(" .\n");
    }
    Ok(out)
}

fn to_oxrdf(encoded: &str) -> SparqlResult<OxTerm> {
    Term::decode(encoded)
        .to_oxrdf()
        .map_err(|e| SparqlError::Serialization(e.to_string()))
}
