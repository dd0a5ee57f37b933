//! Engine and remote endpoint configuration

use super::{SparqlError, SparqlResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where unbound values sort under ascending ORDER BY (mirrored for descending)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UnboundOrdering {
    #[default]
    First,
    Last,
}

/// Evaluation settings shared by every query run on an engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub unbound_ordering: UnboundOrdering,
    /// Query federation members concurrently (results keep member order)
    pub parallel_federation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unbound_ordering: UnboundOrdering::First,
            parallel_federation: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> SparqlResult<Self> {
        serde_json::from_str(json).map_err(|e| SparqlError::Config(e.to_string()))
    }
}

/// HTTP method used to send a query to a remote endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum QueryMethod {
    /// `?query=<encoded>` on the URL
    #[default]
    Get,
    /// `query=<encoded>` form body
    Post,
}

/// What a failing remote endpoint does to the evaluation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ErrorBehavior {
    /// Abort the whole evaluation
    #[default]
    ThrowException,
    /// Contribute zero rows and keep going
    GiveEmptyResult,
}

/// Credentials sent to a remote endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EndpointAuth {
    Basic { user: String, password: String },
    Bearer { token: String },
}

/// Per-endpoint request options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointOptions {
    pub query_method: QueryMethod,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    pub error_behavior: ErrorBehavior,
    /// `default-graph-uri` parameters
    pub default_graph_uris: Vec<String>,
    /// `named-graph-uri` parameters
    pub named_graph_uris: Vec<String>,
    pub authorization: Option<EndpointAuth>,
    pub user_agent: Option<String>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            query_method: QueryMethod::Get,
            timeout_ms: 30_000,
            error_behavior: ErrorBehavior::ThrowException,
            default_graph_uris: Vec::new(),
            named_graph_uris: Vec::new(),
            authorization: None,
            user_agent: None,
        }
    }
}

impl EndpointOptions {
    pub fn from_json(json: &str) -> SparqlResult<Self> {
        serde_json::from_str(json).map_err(|e| SparqlError::Config(e.to_string()))
    }

    pub fn with_method(mut self, method: QueryMethod) -> Self {
        self.query_method = method;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_error_behavior(mut self, behavior: ErrorBehavior) -> Self {
        self.error_behavior = behavior;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
