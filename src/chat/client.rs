//! HTTP client for the chat stream endpoint.
//!
//! POSTs `{ "text": ... }` and hands the incrementally delivered body to the
//! [`decode_stream`](super::decoder::decode_stream) adapter.

use serde::Serialize;
use tracing::debug;

use super::decoder::{EventStream, decode_stream};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

/// Request body accepted by the chat endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    text: &'a str,
}

/// Opens one event stream per prompt.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ChatError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The endpoint prompts are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit `text` and return the decoded event stream of the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Http`] if the request cannot be sent and
    /// [`ChatError::Status`] if the endpoint answers with a non-success status.
    pub async fn open(&self, text: &str) -> Result<EventStream> {
        debug!(endpoint = %self.endpoint, "opening chat stream");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { text })
            .send()
            .await
            .map_err(|e| ChatError::Http(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(decode_stream(response.bytes_stream())))
    }
}
