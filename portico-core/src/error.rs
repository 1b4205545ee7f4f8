use http::StatusCode;

/// Errors that can occur while sending a request through the gateway.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Transport failure unrelated to authentication.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// Response status.
        status: StatusCode,
        /// The `message` field of the body, or the status reason when absent.
        message: String,
        /// The body as JSON, when it parsed.
        body: Option<serde_json::Value>,
    },
    /// The token refresh exchange failed and the session was cleared.
    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),
    /// Durable storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
    /// A body could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The request description could not be turned into an HTTP request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The client was configured with invalid values.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// The HTTP status attached to this error, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            GatewayError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Whether this error ended the session.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(self, GatewayError::Refresh(_))
    }
}

/// Reasons a refresh exchange can fail.
///
/// The same outcome is delivered to every request waiting on the exchange, so
/// this type is cheap to clone and carries no transport handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RefreshError {
    /// Durable storage holds no refresh token.
    #[error("no refresh token available")]
    MissingRefreshToken,
    /// The refresh call never produced a response.
    #[error("network failure: {0}")]
    Network(String),
    /// The refresh endpoint answered with an error status.
    #[error("refresh rejected ({status}): {message}")]
    Rejected {
        /// Response status code.
        status: u16,
        /// Server message or status reason.
        message: String,
    },
    /// The refresh endpoint answered with an unexpected body.
    #[error("malformed refresh response: {0}")]
    Malformed(String),
    /// The new credentials could not be persisted.
    #[error("storage failure: {0}")]
    Storage(String),
    /// The exchange stopped before producing an outcome.
    #[error("refresh aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for RefreshError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RefreshError::Rejected {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => RefreshError::Network(e.to_string()),
        }
    }
}
