//! # Portico Client
//!
//! `portico-client` is the authenticated HTTP gateway between an application
//! and its REST API. Every request goes out with the session's access token.
//! When the API answers that the token is no longer valid, the request is held
//! while a single refresh exchange runs, then replayed once with the new token.
//!
//! ## Key Components
//!
//! - **[`ApiClient`]**: Sends [`ApiRequest`](portico_core::ApiRequest)s and handles the refresh/replay cycle.
//! - **[`ApiClientBuilder`]**: Wires an [`ApiClient`] from a [`ClientConfig`], a session and a refresh exchange.
//! - **[`RefreshCoordinator`]**: Makes sure concurrent auth failures trigger one refresh, not many.
//! - **[`RefreshExchange`]**: The seam over the refresh endpoint, implemented by [`HttpRefreshExchange`].
//! - **[`Resource`]**: CRUD and lifecycle calls for one entity collection.

#![warn(missing_docs)]

mod client;
/// Client settings and environment loading.
pub mod config;
mod credentials;
/// Token refresh exchange and coordination.
pub mod refresh;
mod resource;

pub use client::{ApiClient, ApiClientBuilder};
pub use config::{ClientConfig, DEFAULT_REFRESH_PATH};
pub use credentials::attach_credentials;
pub use refresh::{HttpRefreshExchange, RefreshCoordinator, RefreshExchange};
pub use resource::Resource;

pub use portico_core::{ApiRequest, ApiResponse, GatewayError, RefreshError};
pub use portico_session::{Session, SessionStore, TokenStorage};
