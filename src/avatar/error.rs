//! Errors raised by the avatar control client.

/// Coarse category used to pick the log level of a failed trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The connection could not be opened or broke.
    Transport,
    /// The server answered unexpectedly or rejected a request.
    Protocol,
    /// Local setup is incomplete or unusable (unknown expression, missing or
    /// unwritable token).
    Configuration,
}

/// Avatar control failure.
///
/// Every variant ends the control session; none of them touches the chat turn
/// that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    /// The directive names an expression outside the known map.
    #[error("unknown expression: {0}")]
    UnknownExpression(String),

    /// No usable authentication token on disk.
    #[error("missing authentication token: {0}")]
    MissingToken(String),

    /// The token file could not be written.
    #[error("token storage error: {0}")]
    Storage(String),

    /// WebSocket connect, send or receive failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server refused the authentication token.
    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// Unexpected or error response from the server.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No correlated response arrived in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl AvatarError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownExpression(_) | Self::MissingToken(_) | Self::Storage(_) => {
                ErrorClass::Configuration
            }
            Self::Transport(_) | Self::Timeout(_) => ErrorClass::Transport,
            Self::AuthenticationRejected(_) | Self::Protocol(_) => ErrorClass::Protocol,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AvatarError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
