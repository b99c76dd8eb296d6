use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;

use crate::modules::consumer::core::chunk::{DecodeError, decode};
use crate::modules::consumer::core::result::{ExecutionResult, ResultCollector};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("response from {0} has no content-type")]
    MissingContentType(String),

    #[error("response from {0} carried no initial payload")]
    NoInitialPayload(String),
}

#[derive(Serialize)]
struct GraphQLBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a serde_json::Value>,
}

/// Posts GraphQL requests and rebuilds the final result from whatever framing
/// the server answers with.
#[derive(Clone)]
pub struct IncrementalClient {
    client: reqwest::Client,
    url: String,
    accept: String,
}

impl IncrementalClient {
    pub fn new(url: impl Into<String>, accept: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            accept: accept.into(),
        }
    }

    pub async fn execute(
        &self,
        query: &str,
        variables: Option<&serde_json::Value>,
    ) -> Result<ExecutionResult, ConsumerError> {
        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, &self.accept)
            .json(&GraphQLBody { query, variables })
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ConsumerError::MissingContentType(self.url.clone()))?;
        tracing::debug!(url.full = %self.url, %content_type, "receiving response");

        let mut frames = decode(&content_type, response.bytes_stream());
        let mut collector = ResultCollector::default();
        while let Some(frame) = frames.next().await {
            collector.accept(frame?);
        }

        collector
            .finish()
            .ok_or_else(|| ConsumerError::NoInitialPayload(self.url.clone()))
    }
}
