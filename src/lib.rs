//! Eleonor: streaming assistant chat with serial audio playback and avatar
//! expression control.
//!
//! A prompt is posted to the chat endpoint and the reply arrives as a stream
//! of framed events:
//!
//! - **Text** deltas grow the assistant message as they arrive
//! - **Audio** clips are queued and played one at a time, in order
//! - **Done** / **Error** end the turn
//!
//! Once a reply is complete, inline `[expression:<name>]` markers are stripped
//! from it and the chosen expression is shown on the avatar through the local
//! control server, detached from the conversation so a broken integration can
//! never fail a turn.

pub mod audio;
pub mod avatar;
pub mod chat;
pub mod config;
pub mod detached;
pub mod eleonor_dirs;
pub mod error;

pub use chat::{ChatSession, TurnOutcome, TurnStatus};
pub use config::EleonorConfig;
pub use error::{ChatError, Result};
