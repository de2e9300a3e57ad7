//! Launches expression runs without tying them to the chat turn.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::client::AvatarControlClient;
use crate::detached::spawn_detached;

/// Fires detached expression runs on a shared client.
#[derive(Debug, Clone)]
pub struct ExpressionTrigger {
    client: Arc<AvatarControlClient>,
}

impl ExpressionTrigger {
    pub fn new(client: Arc<AvatarControlClient>) -> Self {
        Self { client }
    }

    /// Start showing `expression` in the background.
    ///
    /// The run outlives the caller; its outcome only shows up in the logs.
    /// The handle is for callers that want to wait, such as tests and the
    /// one-shot CLI.
    pub fn fire(&self, expression: impl Into<String>) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let expression = expression.into();
        debug!(expression = %expression, "triggering avatar expression");
        spawn_detached("avatar expression", async move {
            client.run_expression(&expression).await.map(|_| ())
        })
    }
}
