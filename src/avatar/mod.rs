//! Avatar expression control.
//!
//! Finalized assistant text is scanned for `[expression:<name>]` markers by
//! [`directive`]. A chosen name is resolved through the closed
//! [`expressions`] map and run by the [`client`] against the local control
//! server, detached from the chat turn via [`trigger`].

pub mod client;
pub mod directive;
pub mod error;
pub mod expressions;
pub mod protocol;
pub mod token;
pub mod trigger;

pub use client::{AvatarControlClient, SessionReport, SessionState};
pub use directive::{DirectivePolicy, ExpressionDirective, Extraction, extract};
pub use error::{AvatarError, ErrorClass};
pub use token::{AuthToken, TokenStore};
pub use trigger::ExpressionTrigger;
