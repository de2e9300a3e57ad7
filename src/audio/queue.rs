//! Synchronous playback queue state machine.
//!
//! `Idle → Playing → Idle`, repeated while clips remain. A clip is started
//! only when nothing is playing, the queue is non-empty and playback is
//! enabled. Disabling playback drops every pending clip and forgets the
//! current one, returning the machine to `Idle` at once.

use std::collections::VecDeque;

use super::clip::{AudioClip, ClipStatus};

/// Whether a clip is currently handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing is playing.
    Idle,
    /// One clip is playing.
    Playing,
}

/// FIFO of clips with a single playback slot.
#[derive(Debug)]
pub struct PlaybackQueue {
    pending: VecDeque<AudioClip>,
    current: Option<AudioClip>,
    enabled: bool,
    next_position: u64,
}

impl PlaybackQueue {
    /// Create an empty queue.
    pub fn new(enabled: bool) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            enabled,
            next_position: 0,
        }
    }

    /// Append a clip to the tail. Returns its position, or `None` when
    /// playback is disabled and the clip was discarded.
    pub fn enqueue(&mut self, payload: impl Into<String>) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        let position = self.next_position;
        self.next_position += 1;
        self.pending.push_back(AudioClip::new(position, payload));
        Some(position)
    }

    /// Dequeue the head if the machine may start a clip now.
    ///
    /// The returned clip is marked [`ClipStatus::Playing`] and occupies the
    /// playback slot until [`finish`](Self::finish).
    pub fn next_ready(&mut self) -> Option<AudioClip> {
        if self.current.is_some() || !self.enabled {
            return None;
        }
        let mut clip = self.pending.pop_front()?;
        clip.status = ClipStatus::Playing;
        self.current = Some(clip.clone());
        Some(clip)
    }

    /// Release the playback slot after the clip at `position` ended or failed.
    ///
    /// Returns the finished clip, or `None` if `position` is not the current one
    /// (for example because playback was disabled in the meantime).
    pub fn finish(&mut self, position: u64) -> Option<AudioClip> {
        match &self.current {
            Some(clip) if clip.position == position => {}
            _ => return None,
        }
        let mut clip = self.current.take()?;
        clip.status = ClipStatus::Finished;
        Some(clip)
    }

    /// Enable or disable playback.
    ///
    /// Disabling clears the queue and the playback slot. Returns the clip
    /// that was playing, so the caller can stop it.
    pub fn set_enabled(&mut self, enabled: bool) -> Option<AudioClip> {
        self.enabled = enabled;
        if enabled {
            return None;
        }
        self.pending.clear();
        self.current.take().map(|mut clip| {
            clip.status = ClipStatus::Finished;
            clip
        })
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        if self.current.is_some() {
            SchedulerState::Playing
        } else {
            SchedulerState::Idle
        }
    }

    /// Clip occupying the playback slot, if any.
    pub fn current(&self) -> Option<&AudioClip> {
        self.current.as_ref()
    }

    /// Number of clips waiting behind the current one.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether playback is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
