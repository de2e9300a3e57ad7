//! Typed events carried by the chat stream.

use serde::Deserialize;

/// One decoded event from the chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text delta to append to the assistant message.
    Text(String),
    /// An encoded audio clip (base64) to enqueue for playback.
    Audio(String),
    /// Terminal: the turn completed successfully.
    Done,
    /// Terminal: the server reported a failure with a user-facing message.
    Error(String),
}

impl StreamEvent {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Why a frame payload could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload is not a JSON object with a string `type`.
    #[error("malformed frame payload: {0}")]
    Malformed(String),
    /// A `text` or `audio` frame arrived without its `content`.
    #[error("`{0}` frame is missing its content")]
    MissingContent(&'static str),
}

/// Wire shape of a frame payload: `{ "type": ..., "content": ... }`.
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
}

/// Decode one frame payload.
///
/// Returns `Ok(None)` for a well-formed frame of an unrecognised type; the
/// caller treats that as a no-op.
///
/// # Errors
///
/// Returns [`FrameError`] if the payload is not valid JSON of the expected
/// shape or a content-bearing frame lacks its content.
pub fn decode_frame(payload: &str) -> Result<Option<StreamEvent>, FrameError> {
    let frame: WireFrame =
        serde_json::from_str(payload).map_err(|e| FrameError::Malformed(e.to_string()))?;

    let event = match frame.kind.as_str() {
        "text" => StreamEvent::Text(frame.content.ok_or(FrameError::MissingContent("text"))?),
        "audio" => StreamEvent::Audio(frame.content.ok_or(FrameError::MissingContent("audio"))?),
        "done" => StreamEvent::Done,
        "error" => StreamEvent::Error(frame.content.unwrap_or_else(|| "unknown error".to_owned())),
        _ => return Ok(None),
    };
    Ok(Some(event))
}
