//! # Portico
//!
//! An authenticated request gateway for REST API clients.
//!
//! Every outgoing request carries the session's access token. When the API
//! answers `401 {"message": "Invalid token"}`, the request is held while one
//! refresh exchange runs, then replayed with the new token. Concurrent failures
//! share that single exchange. A failed refresh clears the session.
//!
//! ## Features
//!
//! - `client` (default): [`client::ApiClient`] and the refresh machinery.
//! - `session`: [`session::SessionStore`] and the storage backends.
//! - `sqlite`: [`session::SqlStorage`] over a SQLite pool.
//! - `full`: everything above.
//!
//! ```no_run
//! # async fn run() -> Result<(), portico::GatewayError> {
//! use portico::client::{ApiClient, ClientConfig};
//!
//! let client = ApiClient::builder(ClientConfig::new("https://api.example.com")?).build()?;
//! let modules: serde_json::Value = client.get_json("/modules").await?;
//! # let _ = modules;
//! # Ok(())
//! # }
//! ```

pub use portico_core::{
    ApiEnvelope, ApiRequest, ApiResponse, AuthFailureSignature, GatewayError, Identity,
    RefreshError, TokenGrant,
};

/// Session state and durable token storage.
#[cfg(feature = "session")]
pub mod session {
    pub use portico_session::*;
}

/// The authenticated HTTP client.
#[cfg(feature = "client")]
pub mod client {
    pub use portico_client::*;
}
