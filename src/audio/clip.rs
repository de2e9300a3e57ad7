//! Audio clips received from the chat stream.

/// Playback status of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStatus {
    /// Waiting in the queue.
    Pending,
    /// Currently handed to the sink.
    Playing,
    /// Played to the end, failed, or was cancelled.
    Finished,
}

/// An encoded audio payload and its position in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Arrival position, starting at 0 for the first clip of a scheduler.
    pub position: u64,
    /// Base64-encoded compressed audio.
    pub payload: String,
    /// Playback status.
    pub status: ClipStatus,
}

impl AudioClip {
    /// A pending clip at `position`.
    pub fn new(position: u64, payload: impl Into<String>) -> Self {
        Self {
            position,
            payload: payload.into(),
            status: ClipStatus::Pending,
        }
    }
}
