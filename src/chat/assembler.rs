//! Text Assembler: grows the in-flight assistant message from text deltas.

use std::sync::Arc;

use tokio::sync::watch;

use super::message::ChatMessage;

/// Prefix used when a failure is surfaced inside the message.
pub const ERROR_PREFIX: &str = "Error: ";

/// Lifecycle of an assembled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Deltas are still being appended.
    Streaming,
    /// A `done` event (or source exhaustion) closed the message.
    Completed,
    /// A failure was annotated into the message.
    Failed,
    /// The caller stopped the turn; the partial text is kept.
    Cancelled,
}

/// Single writer for one assistant message.
///
/// Appends are applied in call order. After every append the partial content
/// is published to the optional live view so a renderer can show it
/// progressively. Once the message is terminated (completed or failed) no
/// further appends are accepted.
///
/// A failure annotation is kept apart from the streamed text, so the text can
/// still be rewritten for display after the message failed.
#[derive(Debug)]
pub struct TextAssembler {
    message: ChatMessage,
    state: AssemblyState,
    /// Length of the streamed part of `message.content`.
    streamed_len: usize,
    failure: Option<String>,
    live: Option<Arc<watch::Sender<String>>>,
}

impl TextAssembler {
    /// Start assembling into `message` (normally an empty placeholder).
    pub fn new(message: ChatMessage) -> Self {
        let streamed_len = message.content.len();
        Self {
            message,
            state: AssemblyState::Streaming,
            streamed_len,
            failure: None,
            live: None,
        }
    }

    /// Publish partial content to `live` after every change.
    pub fn with_live_view(mut self, live: Arc<watch::Sender<String>>) -> Self {
        live.send_replace(self.message.content.clone());
        self.live = Some(live);
        self
    }

    /// Append a text delta. Returns `false` (and ignores the delta) once terminated.
    pub fn append(&mut self, delta: &str) -> bool {
        if self.state != AssemblyState::Streaming {
            return false;
        }
        self.message.content.push_str(delta);
        self.streamed_len = self.message.content.len();
        self.publish();
        true
    }

    /// Close the message successfully.
    pub fn complete(&mut self) {
        if self.state == AssemblyState::Streaming {
            self.state = AssemblyState::Completed;
        }
    }

    /// Close the message with a failure the user should see.
    ///
    /// The reason is appended after any text already received.
    pub fn fail(&mut self, reason: &str) {
        if self.state != AssemblyState::Streaming {
            return;
        }
        self.failure = Some(reason.to_owned());
        self.annotate();
        self.state = AssemblyState::Failed;
        self.publish();
    }

    /// Stop accepting deltas, keeping the partial text as it is.
    pub fn cancel(&mut self) {
        if self.state == AssemblyState::Streaming {
            self.state = AssemblyState::Cancelled;
        }
    }

    /// Replace the streamed text with its display form (directive markers removed).
    ///
    /// Valid in every terminal state. A failure annotation is re-applied after
    /// the new text. Ignored while still streaming.
    pub fn finalize_display(&mut self, cleaned: String) {
        if self.state == AssemblyState::Streaming {
            return;
        }
        self.message.content = cleaned;
        self.streamed_len = self.message.content.len();
        self.annotate();
        self.publish();
    }

    /// Content assembled so far, including any failure annotation.
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Text received from the stream, without the failure annotation.
    pub fn streamed(&self) -> &str {
        &self.message.content[..self.streamed_len]
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Whether no further appends will be accepted.
    pub fn is_terminated(&self) -> bool {
        self.state != AssemblyState::Streaming
    }

    /// Give up ownership of the assembled message.
    pub fn into_message(self) -> ChatMessage {
        self.message
    }

    fn annotate(&mut self) {
        let Some(reason) = &self.failure else {
            return;
        };
        if !self.message.content.is_empty() {
            self.message.content.push_str("\n\n");
        }
        self.message.content.push_str(ERROR_PREFIX);
        self.message.content.push_str(reason);
    }

    fn publish(&self) {
        if let Some(live) = &self.live {
            live.send_replace(self.message.content.clone());
        }
    }
}
