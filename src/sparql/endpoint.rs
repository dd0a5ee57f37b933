//! Remote SPARQL endpoint client
//!
//! Sends a query over GET or POST and reads back an
//! `application/sparql-results+xml` document into a solution table.

use super::config::{EndpointAuth, EndpointOptions, QueryMethod};
use super::table::SolutionTable;
use super::{SparqlError, SparqlResult};
use crate::rdf::{variable_name, Term};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Url};
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use tracing::debug;

pub const SPARQL_RESULTS_XML: &str = "application/sparql-results+xml";

/// Form/query-string encoding: everything but RFC 3986 unreserved characters
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Remote SPARQL endpoint
#[derive(Debug, Clone)]
pub struct SparqlEndpoint {
    url: Url,
    options: EndpointOptions,
    client: Client,
}

impl SparqlEndpoint {
    pub fn new(url: &str) -> SparqlResult<Self> {
        Self::with_options(url, EndpointOptions::default())
    }

    pub fn with_options(url: &str, options: EndpointOptions) -> SparqlResult<Self> {
        let url = Url::parse(url).map_err(|e| SparqlError::Config(format!("{url}: {e}")))?;
        let client = Client::builder()
            .build()
            .map_err(|e| SparqlError::Config(e.to_string()))?;
        Ok(Self {
            url,
            options,
            client,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn options(&self) -> &EndpointOptions {
        &self.options
    }

    /// Send `query` and parse the XML results
    ///
    /// Timeouts map to [`SparqlError::EndpointTimeout`]; transport failures and
    /// non-success statuses to [`SparqlError::Endpoint`].
    pub async fn query(&self, query: &str) -> SparqlResult<SolutionTable> {
        let parameters = self.parameters(query);
        debug!(endpoint = %self.url, method = ?self.options.query_method, "querying remote endpoint");

        let request = match self.options.query_method {
            QueryMethod::Get => self.client.get(self.get_url(parameters)),
            QueryMethod::Post => self
                .client
                .post(self.url.clone())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(parameters),
        };
        let mut request = request
            .header(ACCEPT, SPARQL_RESULTS_XML)
            .timeout(self.options.timeout());
        if let Some(user_agent) = &self.options.user_agent {
            request = request.header(USER_AGENT, user_agent.as_str());
        }
        request = match &self.options.authorization {
            Some(EndpointAuth::Basic { user, password }) => {
                request.basic_auth(user, Some(password))
            }
            Some(EndpointAuth::Bearer { token }) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SparqlError::Endpoint(format!(
                "{} answered {status}",
                self.url
            )));
        }
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        parse_results_xml(&body)
    }

    /// `query=...` plus graph parameters, percent-encoded
    fn parameters(&self, query: &str) -> String {
        let mut parameters = vec![format!("query={}", encode_component(query))];
        for uri in &self.options.default_graph_uris {
            parameters.push(format!("default-graph-uri={}", encode_component(uri)));
        }
        for uri in &self.options.named_graph_uris {
            parameters.push(format!("named-graph-uri={}", encode_component(uri)));
        }
        parameters.join("&")
    }

    /// Endpoint URL with `parameters` appended to any existing query string
    fn get_url(&self, parameters: String) -> Url {
        let mut url = self.url.clone();
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{parameters}"),
            _ => parameters,
        };
        url.set_query(Some(&query));
        url
    }

    fn transport_error(&self, error: reqwest::Error) -> SparqlError {
        if error.is_timeout() {
            SparqlError::EndpointTimeout(format!(
                "{} after {} ms",
                self.url, self.options.timeout_ms
            ))
        } else {
            SparqlError::Endpoint(format!("{}: {error}", self.url))
        }
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT).to_string()
}

/// Parse a SPARQL XML results document into a table
///
/// Variable names may carry a leading `?`. A boolean document yields a table
/// with no columns and one row for `true`, none for `false`.
pub fn parse_results_xml(body: &[u8]) -> SparqlResult<SolutionTable> {
    let text = std::str::from_utf8(body).map_err(|e| SparqlError::ResultsParse(e.to_string()))?;
    // oxrdf variables reject a leading '?'; only tag attributes are rewritten
    let names = Regex::new(r#"(<(?:variable|binding)\s+(?:[^>]*\s)?name=")\?"#)
        .map_err(|e| SparqlError::ResultsParse(e.to_string()))?;
    let text = names.replace_all(text, "$1");
    let parser = QueryResultsParser::from_format(QueryResultsFormat::Xml);
    let output = parser
        .for_reader(text.as_bytes())
        .map_err(|e| SparqlError::ResultsParse(e.to_string()))?;

    match output {
        ReaderQueryResultsParserOutput::Solutions(solutions) => {
            let variables: Vec<_> = solutions.variables().to_vec();
            let columns = variables
                .iter()
                .map(|v| variable_name(v.as_str()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| SparqlError::ResultsParse(e.to_string()))?;
            let mut table = SolutionTable::new(columns.iter().cloned());
            for solution in solutions {
                let solution = solution.map_err(|e| SparqlError::ResultsParse(e.to_string()))?;
                let row = variables
                    .iter()
                    .map(|v| solution.get(v).map(|t| Term::from(t.clone()).encode()))
                    .collect();
                table.push_row(row);
            }
            Ok(table)
        }
        ReaderQueryResultsParserOutput::Boolean(value) => {
            let mut table = SolutionTable::default();
            if value {
                table.push_row(Vec::new());
            }
            Ok(table)
        }
    }
}
