//! # Portico Session
//!
//! The single source of truth for the credentials used by the gateway.
//!
//! [`SessionStore`] keeps the current [`Session`] in memory for lock-free reads
//! on every request and mirrors the credentials into a [`TokenStorage`] so they
//! survive a restart.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portico_core::{GatewayError, Identity, TokenGrant};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

mod memory;
pub use memory::MemoryStorage;

#[cfg(feature = "store-sqlx")]
pub mod sql_store;
#[cfg(feature = "store-sqlx")]
pub use sql_store::SqlStorage;

/// Keys written to durable storage.
pub mod keys {
    /// Current access token.
    pub const TOKEN: &str = "token";
    /// Current refresh token.
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Access token expiry, as Unix seconds.
    pub const TOKEN_EXPIRES_IN: &str = "token_expiresIn";

    /// Every key owned by the session.
    pub const ALL: [&str; 3] = [TOKEN, REFRESH_TOKEN, TOKEN_EXPIRES_IN];
}

/// The credentials and user of the current session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token attached to every request.
    pub access_token: Option<String>,
    /// Token exchanged for a new access token.
    pub refresh_token: Option<String>,
    /// The signed-in user.
    pub user: Option<Identity>,
    /// When the access token stops being valid, if the server said.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether an access token is present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Whether every field is cleared.
    pub fn is_empty(&self) -> bool {
        self == &Session::default()
    }

    /// Whether the access token is past its known expiry.
    ///
    /// A session without an expiry is never considered expired; the server
    /// decides through the refresh cycle.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

/// Durable key-value storage for credentials.
#[async_trait]
pub trait TokenStorage: Send + Sync + 'static {
    /// Read a key; `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;
    /// Write a key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;
    /// Delete a key. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), GatewayError>;
}

/// Shared, injectable session state.
///
/// Reads are synchronous snapshots. Writes happen only through
/// [`login`](Self::login), [`logout`](Self::logout) and
/// [`apply_refresh`](Self::apply_refresh).
pub struct SessionStore {
    current: ArcSwap<Session>,
    storage: Arc<dyn TokenStorage>,
}

impl SessionStore {
    /// Create an empty session backed by `storage`.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            current: ArcSwap::from_pointee(Session::default()),
            storage,
        }
    }

    /// Create an empty session backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    /// Snapshot of the current session.
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// The current access token.
    pub fn access_token(&self) -> Option<String> {
        self.current.load().access_token.clone()
    }

    /// The signed-in user.
    pub fn user(&self) -> Option<Identity> {
        self.current.load().user.clone()
    }

    /// The durable storage behind this session.
    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.storage
    }

    /// Start a session for `user` with the credentials of `grant`.
    ///
    /// Replaces every durable key, so a grant without a refresh token leaves
    /// none in storage.
    pub async fn login(&self, grant: TokenGrant, user: Identity) -> Result<(), GatewayError> {
        let expires_at = grant.expires_at(Utc::now());
        self.persist(&grant, expires_at).await?;
        if grant.refresh_token.is_none() {
            // A new login never inherits the refresh token of the previous one.
            self.storage.remove(keys::REFRESH_TOKEN).await?;
        }

        self.current.store(Arc::new(Session {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            user: Some(user),
            expires_at,
        }));
        debug!("Session started");
        Ok(())
    }

    /// Install the credentials returned by a refresh exchange.
    ///
    /// The user is kept. The refresh token is replaced only when the server
    /// issued a new one.
    pub async fn apply_refresh(&self, grant: &TokenGrant) -> Result<(), GatewayError> {
        let expires_at = grant.expires_at(Utc::now());
        self.current.rcu(|current| {
            let mut next = Session::clone(current);
            next.access_token = Some(grant.access_token.clone());
            if grant.refresh_token.is_some() {
                next.refresh_token = grant.refresh_token.clone();
            }
            next.expires_at = expires_at;
            next
        });
        self.persist(grant, expires_at).await
    }

    /// Clear the session and its durable keys.
    ///
    /// The in-memory session is cleared even when storage fails.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        self.current.store(Arc::new(Session::default()));
        for key in keys::ALL {
            self.storage.remove(key).await?;
        }
        debug!("Session cleared");
        Ok(())
    }

    /// Rebuild the in-memory session from durable storage.
    ///
    /// Returns whether an access token was found. The user is not persisted and
    /// stays unset until the next login.
    pub async fn restore(&self) -> Result<bool, GatewayError> {
        let access_token = self.storage.get(keys::TOKEN).await?;
        let refresh_token = self.storage.get(keys::REFRESH_TOKEN).await?;
        let expires_at = self
            .storage
            .get(keys::TOKEN_EXPIRES_IN)
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        let found = access_token.is_some();
        self.current.rcu(|current| Session {
            access_token: access_token.clone(),
            refresh_token: refresh_token.clone(),
            user: current.user.clone(),
            expires_at,
        });
        debug!(found, "Session restored from storage");
        Ok(found)
    }

    /// The refresh token held by durable storage.
    pub async fn stored_refresh_token(&self) -> Result<Option<String>, GatewayError> {
        self.storage.get(keys::REFRESH_TOKEN).await
    }

    async fn persist(
        &self,
        grant: &TokenGrant,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), GatewayError> {
        self.storage.set(keys::TOKEN, &grant.access_token).await?;
        if let Some(refresh_token) = &grant.refresh_token {
            self.storage.set(keys::REFRESH_TOKEN, refresh_token).await?;
        }
        match expires_at {
            Some(at) => {
                self.storage
                    .set(keys::TOKEN_EXPIRES_IN, &at.timestamp().to_string())
                    .await
            }
            None => self.storage.remove(keys::TOKEN_EXPIRES_IN).await,
        }
    }
}
