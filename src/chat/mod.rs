//! Chat stream path: request, decode, assemble.
//!
//! [`client::ChatClient`] posts a prompt and exposes the response as a stream
//! of [`events::StreamEvent`]s produced by [`decoder`]. [`session::ChatSession`]
//! runs turns on top of it, feeding text to [`assembler::TextAssembler`] and
//! audio to the scheduler.

pub mod assembler;
pub mod client;
pub mod decoder;
pub mod events;
pub mod frame;
pub mod message;
pub mod session;

pub use assembler::{AssemblyState, TextAssembler};
pub use client::ChatClient;
pub use decoder::{EventStream, StreamDecoder, decode_stream};
pub use events::StreamEvent;
pub use message::{ChatMessage, Conversation, Role};
pub use session::{ChatSession, TurnOutcome, TurnStatus};
