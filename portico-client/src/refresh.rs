//! Single-flight token refresh.
//!
//! When several requests fail with an expired token at the same time, only
//! one refresh exchange runs. Every request that hits the failure while the
//! exchange is in flight waits for the same outcome and is then replayed with
//! the new token, or rejected with the refresh error.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use portico_core::{ApiEnvelope, RefreshError, TokenGrant};
use portico_session::SessionStore;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Exchanges a refresh token for new credentials.
#[async_trait]
pub trait RefreshExchange: Send + Sync {
    /// Perform one refresh exchange.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(rename = "expiresIn", default)]
    expires_in: Option<i64>,
}

/// Refresh through `POST <refresh endpoint>` with the refresh token as bearer.
///
/// The endpoint answers `{ "success": true, "data": { "access_token",
/// "refresh_token"?, "expiresIn" } }`; any other shape is a failure.
#[derive(Debug, Clone)]
pub struct HttpRefreshExchange {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpRefreshExchange {
    /// Create an exchange posting to `endpoint`.
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// The refresh endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RefreshExchange for HttpRefreshExchange {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<RefreshData> =
            serde_json::from_slice(&body).map_err(|e| RefreshError::Malformed(e.to_string()))?;
        let data = envelope.into_data().map_err(RefreshError::Malformed)?;

        let grant = TokenGrant {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_in: data.expires_in,
        };
        if !grant.has_valid_expiry(Utc::now()) {
            return Err(RefreshError::Malformed(format!(
                "expiresIn out of range: {:?}",
                grant.expires_in
            )));
        }
        Ok(grant)
    }
}

type Outcome = Result<String, RefreshError>;

enum CycleState {
    Idle,
    Refreshing(watch::Receiver<Option<Outcome>>),
}

/// Serializes refresh exchanges and fans their outcome out to every waiter.
pub struct RefreshCoordinator {
    session: Arc<SessionStore>,
    exchange: Arc<dyn RefreshExchange>,
    state: Mutex<CycleState>,
}

impl RefreshCoordinator {
    /// Coordinate refreshes of `session` through `exchange`.
    pub fn new(session: Arc<SessionStore>, exchange: Arc<dyn RefreshExchange>) -> Self {
        Self {
            session,
            exchange,
            state: Mutex::new(CycleState::Idle),
        }
    }

    /// Whether a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            CycleState::Refreshing(_)
        )
    }

    /// Obtain a token to replay a request that failed with an expired token.
    ///
    /// `sent_with` is the token the failed request carried. If the session has
    /// moved on to another token since, that token is returned without a new
    /// exchange. Otherwise this joins the exchange in flight, or starts one.
    /// On failure the session has been cleared.
    pub async fn recover(self: &Arc<Self>, sent_with: Option<&str>) -> Outcome {
        let mut rx = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let in_flight = match &*state {
                CycleState::Refreshing(rx) => Some(rx.clone()),
                CycleState::Idle => None,
            };
            match in_flight {
                Some(rx) => {
                    debug!("Refresh in flight, queueing request");
                    rx
                }
                None => {
                    if let Some(current) = self.session.access_token() {
                        if sent_with != Some(current.as_str()) {
                            debug!("Request carried a stale token, replaying with current one");
                            return Ok(current);
                        }
                    }
                    let (tx, rx) = watch::channel(None);
                    *state = CycleState::Refreshing(rx.clone());
                    tokio::spawn(Arc::clone(self).run(tx));
                    rx
                }
            }
        };

        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return Err(RefreshError::Aborted(
                    "refresh task ended without an outcome".to_string(),
                ));
            }
        }
    }

    async fn run(self: Arc<Self>, tx: watch::Sender<Option<Outcome>>) {
        // A panicking exchange still has to release the waiters and return to Idle.
        let outcome = AssertUnwindSafe(self.exchange_once())
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(RefreshError::Aborted(
                    "refresh exchange panicked".to_string(),
                ))
            });

        match &outcome {
            Ok(_) => info!("Access token refreshed"),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                if let Err(e) = self.session.logout().await {
                    warn!(error = %e, "Failed to clear durable session storage");
                }
            }
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = CycleState::Idle;
        tx.send_replace(Some(outcome));
    }

    async fn exchange_once(&self) -> Outcome {
        let refresh_token = self
            .session
            .stored_refresh_token()
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?
            .ok_or(RefreshError::MissingRefreshToken)?;

        let grant = self.exchange.refresh(&refresh_token).await?;

        self.session
            .apply_refresh(&grant)
            .await
            .map_err(|e| RefreshError::Storage(e.to_string()))?;

        Ok(grant.access_token)
    }
}
