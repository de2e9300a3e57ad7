//! Audio Scheduler: serial playback of clips carried by the chat stream.
//!
//! Clips are queued in arrival order and played one at a time through an
//! [`AudioSink`]. The `speaker` feature adds [`playback::CpalSink`] for the
//! system output device; without it clips are decoded and discarded.

pub mod clip;
pub mod decode;
#[cfg(feature = "speaker")]
pub mod playback;
pub mod queue;
pub mod scheduler;

pub use clip::{AudioClip, ClipStatus};
pub use queue::{PlaybackQueue, SchedulerState};
pub use scheduler::{AudioScheduler, AudioSchedulerHandle, AudioSink, DiscardSink, SchedulerStatus};

use std::sync::Arc;

use crate::config::AudioConfig;

/// Pick the sink for `config`: the speaker when available, otherwise a
/// discarding sink.
pub fn default_sink(config: &AudioConfig) -> Arc<dyn AudioSink> {
    #[cfg(feature = "speaker")]
    {
        match playback::CpalSink::new(config) {
            Ok(sink) => return Arc::new(sink),
            Err(e) => tracing::warn!(error = %e, "speaker unavailable; audio will be discarded"),
        }
    }
    #[cfg(not(feature = "speaker"))]
    let _ = config;
    Arc::new(DiscardSink)
}
