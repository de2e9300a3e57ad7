//! Avatar Control Client.
//!
//! Each call opens a fresh WebSocket session to the local control server,
//! authenticates with the stored token, does its work and closes the session
//! again. Nothing is shared between calls, so concurrent triggers never see
//! each other's state.
//!
//! An expression run walks the session through
//! `Disconnected → Connecting → Authenticating → Activating → Holding →
//! Deactivating → Closed`. Every path that opened a connection ends in
//! `Closed`, including authentication rejection and transport failures.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::error::AvatarError;
use super::expressions;
use super::protocol::{self, Envelope, ExpressionState, message_type};
use super::token::{AuthToken, TokenStore};
use crate::config::AvatarConfig;

/// How long the user has to approve the plugin during token bootstrap.
pub const TOKEN_APPROVAL_TIMEOUT: Duration = Duration::from_secs(60);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of one control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Activating,
    Holding,
    Deactivating,
    Closed,
}

/// What a completed expression run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Directive name that was run.
    pub expression: String,
    /// Expression file that was activated and deactivated.
    pub expression_file: &'static str,
    /// States visited, in order.
    pub states: Vec<SessionState>,
}

/// Client for the local avatar control server.
#[derive(Debug, Clone)]
pub struct AvatarControlClient {
    config: AvatarConfig,
    tokens: TokenStore,
}

impl AvatarControlClient {
    /// Build a client; the token store follows `config.token_path()`.
    pub fn new(config: AvatarConfig) -> Self {
        let tokens = TokenStore::new(config.token_path());
        Self { config, tokens }
    }

    /// The token store this client reads from.
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// Show the expression `name` for the configured dwell time.
    ///
    /// The name is resolved and the token loaded before any connection is
    /// attempted; either failing means the server is never contacted.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::UnknownExpression`] or
    /// [`AvatarError::MissingToken`] without connecting, and transport,
    /// protocol or rejection errors after connecting (the session is closed
    /// in every case).
    pub async fn run_expression(&self, name: &str) -> Result<SessionReport, AvatarError> {
        let file = expressions::resolve(name)
            .ok_or_else(|| AvatarError::UnknownExpression(name.to_owned()))?;
        let token = self.tokens.load().await?;

        let mut session = self.connect().await?;
        let outcome = self.activation_cycle(&mut session, &token, file).await;
        let states = session.close().await;

        outcome?;
        info!(expression = name, file, "expression cycle complete");
        Ok(SessionReport {
            expression: name.to_owned(),
            expression_file: file,
            states,
        })
    }

    /// Ask the server for a new token and persist it.
    ///
    /// The server shows an approval prompt; this waits up to
    /// [`TOKEN_APPROVAL_TIMEOUT`] for the user to answer it.
    ///
    /// # Errors
    ///
    /// Returns transport or protocol errors, or [`AvatarError::Storage`] if
    /// the token cannot be saved.
    pub async fn request_token(&self) -> Result<AuthToken, AvatarError> {
        let mut session = self.connect().await?;
        let outcome = async {
            let request = protocol::authentication_token_request(
                &self.config.plugin_name,
                &self.config.plugin_developer,
            );
            let response = session
                .request_within(&request, TOKEN_APPROVAL_TIMEOUT)
                .await?;
            let data: protocol::AuthenticationTokenResponse =
                response.data_as(message_type::AUTHENTICATION_TOKEN_RESPONSE)?;
            Ok::<_, AvatarError>(AuthToken::new(data.authentication_token))
        }
        .await;
        session.close().await;

        let token = outcome?;
        self.tokens.save(&token).await?;
        Ok(token)
    }

    /// List the expressions of the currently loaded model.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::MissingToken`] without connecting, or transport,
    /// protocol or rejection errors after connecting.
    pub async fn list_expressions(&self) -> Result<Vec<ExpressionState>, AvatarError> {
        let token = self.tokens.load().await?;
        let mut session = self.connect().await?;
        let outcome = async {
            self.authenticate(&mut session, &token).await?;
            let response = session
                .request(&protocol::expression_state_request())
                .await?;
            let data: protocol::ExpressionStateResponse =
                response.data_as(message_type::EXPRESSION_STATE_RESPONSE)?;
            Ok::<_, AvatarError>(data.expressions)
        }
        .await;
        session.close().await;
        outcome
    }

    async fn connect(&self) -> Result<ControlSession, AvatarError> {
        let timeout = self.config.response_timeout();
        debug!(url = %self.config.url, "connecting to avatar control server");

        let (ws, _) = tokio::time::timeout(timeout, connect_async(self.config.url.as_str()))
            .await
            .map_err(|_| AvatarError::Timeout(format!("connection to {}", self.config.url)))??;

        let mut session = ControlSession {
            ws,
            timeout,
            states: vec![SessionState::Disconnected, SessionState::Connecting],
        };
        session.transition(SessionState::Authenticating);
        Ok(session)
    }

    async fn authenticate(
        &self,
        session: &mut ControlSession,
        token: &AuthToken,
    ) -> Result<(), AvatarError> {
        let request = protocol::authentication_request(
            &self.config.plugin_name,
            &self.config.plugin_developer,
            token.expose(),
        );
        let response: protocol::AuthenticationResponse = session
            .request(&request)
            .await?
            .data_as(message_type::AUTHENTICATION_RESPONSE)?;

        if !response.authenticated {
            let reason = if response.reason.is_empty() {
                "token not accepted".to_owned()
            } else {
                response.reason
            };
            return Err(AvatarError::AuthenticationRejected(reason));
        }
        debug!("authenticated with avatar control server");
        Ok(())
    }

    async fn activation_cycle(
        &self,
        session: &mut ControlSession,
        token: &AuthToken,
        file: &str,
    ) -> Result<(), AvatarError> {
        self.authenticate(session, token).await?;

        session.transition(SessionState::Activating);
        session
            .send(&protocol::expression_activation_request(file, true))
            .await?;

        session.transition(SessionState::Holding);
        tokio::time::sleep(self.config.dwell()).await;

        session.transition(SessionState::Deactivating);
        session
            .send(&protocol::expression_activation_request(file, false))
            .await
    }
}

/// One open connection and the states it has been through.
struct ControlSession {
    ws: WsStream,
    timeout: Duration,
    states: Vec<SessionState>,
}

impl ControlSession {
    fn transition(&mut self, next: SessionState) {
        let from = self.states.last().copied();
        debug!(?from, to = ?next, "avatar session state");
        self.states.push(next);
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), AvatarError> {
        let text = envelope.to_json()?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn request(&mut self, envelope: &Envelope) -> Result<Envelope, AvatarError> {
        self.request_within(envelope, self.timeout).await
    }

    /// Send `envelope` and wait for the response carrying its request id.
    async fn request_within(
        &mut self,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<Envelope, AvatarError> {
        self.send(envelope).await?;
        let request_id = envelope.request_id.as_str();

        let response = tokio::time::timeout(timeout, self.next_answer(request_id))
            .await
            .map_err(|_| AvatarError::Timeout(format!("response to {}", envelope.message_type)))??;
        response.into_result()
    }

    async fn next_answer(&mut self, request_id: &str) -> Result<Envelope, AvatarError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let envelope = Envelope::parse(&text)?;
                    if envelope.answers(request_id) {
                        return Ok(envelope);
                    }
                    debug!(
                        request_id = %envelope.request_id,
                        message_type = %envelope.message_type,
                        "ignoring uncorrelated envelope"
                    );
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(AvatarError::Transport(
                        "connection closed by server".to_owned(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Close the connection and return the visited states.
    async fn close(mut self) -> Vec<SessionState> {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "avatar session close handshake failed");
        }
        let drain = async { while let Some(Ok(_)) = self.ws.next().await {} };
        if tokio::time::timeout(self.timeout, drain).await.is_err() {
            warn!("avatar control server did not acknowledge close");
        }
        self.transition(SessionState::Closed);
        self.states
    }
}
