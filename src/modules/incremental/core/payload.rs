//! Wire model of incremental delivery, shared by the server transports and the
//! consumer.
//!
//! A response is one [`InitialPayload`] followed by zero or more
//! [`SubsequentPayload`]s; the last payload of a sequence has `hasNext: false`.

use std::fmt;

use async_graphql::{ServerError, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionPayload {
    Initial(InitialPayload),
    Subsequent(SubsequentPayload),
}

impl ExecutionPayload {
    pub fn has_next(&self) -> bool {
        match self {
            ExecutionPayload::Initial(payload) => payload.has_next,
            ExecutionPayload::Subsequent(payload) => payload.has_next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialPayload {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,
    pub has_next: bool,
}

impl InitialPayload {
    pub fn from_response(response: async_graphql::Response, has_next: bool) -> Self {
        Self {
            data: response.data,
            errors: response.errors,
            has_next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsequentPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incremental: Vec<IncrementalResult>,
    pub has_next: bool,
}

impl SubsequentPayload {
    pub fn pending(result: IncrementalResult) -> Self {
        Self {
            incremental: vec![result],
            has_next: true,
        }
    }

    /// Closes a sequence whose last result was sent with `hasNext: true`.
    pub fn completed() -> Self {
        Self {
            incremental: Vec::new(),
            has_next: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncrementalResult {
    Defer(DeferResult),
    Stream(StreamResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferResult {
    pub data: Value,
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResult {
    pub items: Vec<Value>,
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}
