//! # Portico Core
//!
//! `portico-core` provides the foundational types shared by every portico crate.
//! It defines the request and response descriptions that travel through the
//! gateway, the credentials and identity carried by a session, and the error
//! taxonomy returned to callers.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Errors returned by the gateway.
pub mod error;
pub use crate::error::{GatewayError, RefreshError};

/// Identity and credential types carried by a session.
pub mod state;
pub use crate::state::{Identity, TokenGrant};

/// Replayable request and buffered response descriptions.
pub mod request;
pub use crate::request::{ApiEnvelope, ApiRequest, ApiResponse};

/// Header helpers for bearer credentials.
pub mod utils;

pub use http::{Method, StatusCode};

/// Default server message that marks an expired or invalid access token.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

/// The server response that the gateway treats as "token expired, attempt refresh".
///
/// Only responses with exactly this status and this `message` field in their
/// JSON body trigger a refresh. Any other 401 (for example a permission
/// failure) is an ordinary error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailureSignature {
    /// HTTP status of the response.
    #[serde(with = "status_code")]
    pub status: StatusCode,
    /// Value of the `message` field in the JSON body.
    pub message: String,
}

impl Default for AuthFailureSignature {
    fn default() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: INVALID_TOKEN_MESSAGE.to_string(),
        }
    }
}

impl AuthFailureSignature {
    /// Create a signature for a custom server message on a 401 response.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Check whether a response carries this signature.
    pub fn matches(&self, response: &ApiResponse) -> bool {
        response.status() == self.status
            && response.error_message().as_deref() == Some(self.message.as_str())
    }

    /// Check whether an error returned by the gateway carries this signature.
    pub fn matches_error(&self, error: &GatewayError) -> bool {
        match error {
            GatewayError::Api {
                status, message, ..
            } => *status == self.status && message == &self.message,
            _ => false,
        }
    }
}

mod status_code {
    use http::StatusCode;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u16(status.as_u16())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<StatusCode, D::Error> {
        let code = u16::deserialize(d)?;
        StatusCode::from_u16(code).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::HeaderMap;

    fn response(status: StatusCode, body: &str) -> ApiResponse {
        ApiResponse::new(status, HeaderMap::new(), Bytes::from(body.to_string()))
    }

    #[test]
    fn test_default_signature_matches_invalid_token() {
        let sig = AuthFailureSignature::default();
        assert!(sig.matches(&response(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid token"}"#
        )));
    }

    #[test]
    fn test_signature_ignores_other_401_reasons() {
        let sig = AuthFailureSignature::default();
        assert!(!sig.matches(&response(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Permission denied"}"#
        )));
        assert!(!sig.matches(&response(StatusCode::UNAUTHORIZED, "not json")));
    }

    #[test]
    fn test_signature_ignores_other_statuses() {
        let sig = AuthFailureSignature::default();
        assert!(!sig.matches(&response(
            StatusCode::FORBIDDEN,
            r#"{"message":"Invalid token"}"#
        )));
    }

    #[test]
    fn test_signature_matches_error() {
        let sig = AuthFailureSignature::with_message("Token expired");
        let err = response(StatusCode::UNAUTHORIZED, r#"{"message":"Token expired"}"#).into_error();
        assert!(sig.matches_error(&err));
        assert!(!AuthFailureSignature::default().matches_error(&err));
    }
}
