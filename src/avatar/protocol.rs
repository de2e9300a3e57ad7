//! Control protocol envelopes.
//!
//! Every message in either direction is a JSON envelope:
//!
//! ```json
//! { "apiName": "VTubeStudioPublicAPI", "apiVersion": "1.0",
//!   "requestID": "...", "messageType": "...", "data": { ... } }
//! ```
//!
//! Responses echo the `requestID` of the request they answer, which is how
//! the client correlates them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AvatarError;

/// Value of `apiName` on every envelope.
pub const API_NAME: &str = "VTubeStudioPublicAPI";
/// Value of `apiVersion` on every envelope.
pub const API_VERSION: &str = "1.0";

/// Request id used for authentication.
pub const AUTH_REQUEST_ID: &str = "eleonor-auth";
/// Request id used for token bootstrap.
pub const TOKEN_REQUEST_ID: &str = "eleonor-token";
/// Request id used for expression listing.
pub const STATE_REQUEST_ID: &str = "eleonor-expr-state";

/// Request id for activating or deactivating `file`.
pub fn expression_request_id(file: &str) -> String {
    format!("eleonor-expr-{file}")
}

/// Message types this client sends or understands.
pub mod message_type {
    pub const AUTHENTICATION_REQUEST: &str = "AuthenticationRequest";
    pub const AUTHENTICATION_RESPONSE: &str = "AuthenticationResponse";
    pub const AUTHENTICATION_TOKEN_REQUEST: &str = "AuthenticationTokenRequest";
    pub const AUTHENTICATION_TOKEN_RESPONSE: &str = "AuthenticationTokenResponse";
    pub const EXPRESSION_ACTIVATION_REQUEST: &str = "ExpressionActivationRequest";
    pub const EXPRESSION_STATE_REQUEST: &str = "ExpressionStateRequest";
    pub const EXPRESSION_STATE_RESPONSE: &str = "ExpressionStateResponse";
    pub const API_ERROR: &str = "APIError";
}

/// A protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub api_name: String,
    pub api_version: String,
    #[serde(rename = "requestID", default)]
    pub request_id: String,
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build a request envelope.
    pub fn request(request_id: impl Into<String>, message_type: &str, data: Value) -> Self {
        Self {
            api_name: API_NAME.to_owned(),
            api_version: API_VERSION.to_owned(),
            request_id: request_id.into(),
            message_type: message_type.to_owned(),
            data,
        }
    }

    /// Parse a received text frame.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::Protocol`] if the text is not an envelope.
    pub fn parse(text: &str) -> Result<Self, AvatarError> {
        serde_json::from_str(text)
            .map_err(|e| AvatarError::Protocol(format!("malformed envelope: {e}")))
    }

    /// Serialize to the JSON text sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::Protocol`] if serialization fails.
    pub fn to_json(&self) -> Result<String, AvatarError> {
        serde_json::to_string(self)
            .map_err(|e| AvatarError::Protocol(format!("cannot encode envelope: {e}")))
    }

    /// Whether this envelope answers the request with `request_id`.
    pub fn answers(&self, request_id: &str) -> bool {
        self.request_id == request_id
    }

    /// Turn an `APIError` envelope into an error, passing others through.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::Protocol`] carrying the server's error id and
    /// message.
    pub fn into_result(self) -> Result<Self, AvatarError> {
        if self.message_type != message_type::API_ERROR {
            return Ok(self);
        }
        let err: ApiErrorData = serde_json::from_value(self.data).unwrap_or_default();
        Err(AvatarError::Protocol(format!(
            "server error {}: {}",
            err.error_id, err.message
        )))
    }

    /// Decode `data` as `T`, checking the message type first.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::Protocol`] on a type mismatch or bad payload.
    pub fn data_as<T: serde::de::DeserializeOwned>(
        self,
        expected_type: &str,
    ) -> Result<T, AvatarError> {
        if self.message_type != expected_type {
            return Err(AvatarError::Protocol(format!(
                "expected {expected_type}, got {}",
                self.message_type
            )));
        }
        serde_json::from_value(self.data)
            .map_err(|e| AvatarError::Protocol(format!("bad {expected_type} payload: {e}")))
    }
}

/// Authenticate with a previously issued token.
pub fn authentication_request(plugin_name: &str, plugin_developer: &str, token: &str) -> Envelope {
    Envelope::request(
        AUTH_REQUEST_ID,
        message_type::AUTHENTICATION_REQUEST,
        serde_json::json!({
            "pluginName": plugin_name,
            "pluginDeveloper": plugin_developer,
            "authenticationToken": token,
        }),
    )
}

/// Ask the server to issue a token; the user approves it in the application.
pub fn authentication_token_request(plugin_name: &str, plugin_developer: &str) -> Envelope {
    Envelope::request(
        TOKEN_REQUEST_ID,
        message_type::AUTHENTICATION_TOKEN_REQUEST,
        serde_json::json!({
            "pluginName": plugin_name,
            "pluginDeveloper": plugin_developer,
        }),
    )
}

/// Turn the expression stored in `file` on or off.
pub fn expression_activation_request(file: &str, active: bool) -> Envelope {
    Envelope::request(
        expression_request_id(file),
        message_type::EXPRESSION_ACTIVATION_REQUEST,
        serde_json::json!({
            "expressionFile": file,
            "active": active,
        }),
    )
}

/// List the expressions of the loaded model.
pub fn expression_state_request() -> Envelope {
    Envelope::request(
        STATE_REQUEST_ID,
        message_type::EXPRESSION_STATE_REQUEST,
        serde_json::json!({ "details": false }),
    )
}

/// `data` of an `AuthenticationResponse`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub reason: String,
}

/// `data` of an `AuthenticationTokenResponse`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationTokenResponse {
    pub authentication_token: String,
}

/// One expression of the loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionState {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub active: bool,
}

/// `data` of an `ExpressionStateResponse`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpressionStateResponse {
    #[serde(default)]
    pub expressions: Vec<ExpressionState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorData {
    #[serde(rename = "errorID", default)]
    error_id: i64,
    #[serde(default)]
    message: String,
}
