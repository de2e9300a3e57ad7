//! Stream Decoder: turns the chunked response body into [`StreamEvent`]s.
//!
//! [`StreamDecoder`] is the synchronous core (bytes in, events out) and
//! [`decode_stream`] adapts it to an async byte stream such as
//! `reqwest::Response::bytes_stream()`.
//!
//! Decoding rules:
//! - a malformed frame is logged and dropped, the stream continues;
//! - a frame of unknown type is a logged no-op;
//! - the first terminal event (`done` / `error`) ends decoding, anything
//!   after it is ignored;
//! - when the source is exhausted without a terminal event, a
//!   [`StreamEvent::Done`] is emitted so the turn always completes.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use super::events::{StreamEvent, decode_frame};
use super::frame::FrameSplitter;

/// Boxed stream of decoded chat events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Incremental decoder from body bytes to events.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    splitter: FrameSplitter,
    finished: bool,
}

impl StreamDecoder {
    /// Create a decoder for a fresh response body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the body, returning the events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        for payload in self.splitter.push(chunk) {
            self.accept(&payload, &mut events);
            if self.finished {
                break;
            }
        }
        events
    }

    /// Signal source exhaustion.
    ///
    /// Decodes any trailing unterminated frame, then emits [`StreamEvent::Done`]
    /// unless a terminal event was already seen.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        if let Some(payload) = self.splitter.flush() {
            self.accept(&payload, &mut events);
        }
        if !self.finished {
            debug!("chat stream ended without a terminal event");
            self.finished = true;
            events.push(StreamEvent::Done);
        }
        events
    }

    /// Stop decoding without emitting anything further.
    pub fn abort(&mut self) {
        self.finished = true;
    }

    /// Whether a terminal event has been emitted (or decoding was aborted).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn accept(&mut self, payload: &str, events: &mut Vec<StreamEvent>) {
        match decode_frame(payload) {
            Ok(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                events.push(event);
            }
            Ok(None) => debug!(payload, "ignoring chat frame of unknown type"),
            Err(e) => warn!(error = %e, "dropping malformed chat frame"),
        }
    }
}

/// Decode an async byte stream into a stream of [`StreamEvent`]s.
///
/// A read error mid-body becomes a terminal [`StreamEvent::Error`].
pub fn decode_stream<S, E>(byte_stream: S) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        DecodeState {
            byte_stream: Box::pin(byte_stream),
            decoder: StreamDecoder::new(),
            pending: VecDeque::new(),
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((event, state));
                }
                if state.decoder.is_finished() {
                    return None;
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        let events = state.decoder.push(&chunk);
                        state.pending.extend(events);
                    }
                    Some(Err(e)) => {
                        state.decoder.abort();
                        let err = StreamEvent::Error(format!("stream read error: {e}"));
                        return Some((err, state));
                    }
                    None => {
                        let events = state.decoder.finish();
                        state.pending.extend(events);
                    }
                }
            }
        },
    )
}

/// Internal state for [`decode_stream`].
struct DecodeState<S> {
    byte_stream: Pin<Box<S>>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
}
