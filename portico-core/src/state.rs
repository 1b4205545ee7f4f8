use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The signed-in user as reported by the API.
///
/// The gateway treats this record as opaque; it is stored next to the
/// credentials so the rest of the application can read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-side identifier of the user.
    pub id: String,
    /// Login name, when the server sends one.
    pub username: Option<String>,
    /// Email address, when the server sends one.
    pub email: Option<String>,
    /// Any other fields of the user record.
    #[serde(default, flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Identity {
    /// Create an identity with only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            attributes: HashMap::new(),
        }
    }
}

/// Credentials issued by a login or refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Short-lived bearer token attached to requests.
    pub access_token: String,
    /// Longer-lived token exchanged for a new access token. `None` when the
    /// server did not rotate it.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// A grant carrying only an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Attach a lifetime in seconds.
    pub fn with_expires_in(mut self, expires_in: i64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Absolute expiry of the access token relative to `now`.
    ///
    /// `None` when no lifetime is set or when it does not fit a timestamp.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
    }

    /// Whether `expires_in` is absent or converts to a timestamp.
    pub fn has_valid_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_in.is_none() || self.expires_at(now).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keeps_unknown_fields() {
        let identity: Identity = serde_json::from_str(
            r#"{"id":"42","username":"ops","email":null,"profile":"admin","branch":7}"#,
        )
        .unwrap();
        assert_eq!(identity.id, "42");
        assert_eq!(identity.username.as_deref(), Some("ops"));
        assert_eq!(identity.attributes["profile"], "admin");
        assert_eq!(identity.attributes["branch"], 7);
    }

    #[test]
    fn test_grant_expiry() {
        let now = Utc::now();
        let grant = TokenGrant::bearer("T1").with_expires_in(3600);
        assert_eq!(grant.expires_at(now), Some(now + Duration::seconds(3600)));
        assert_eq!(TokenGrant::bearer("T1").expires_at(now), None);
        assert!(grant.has_valid_expiry(now));
    }

    #[test]
    fn test_out_of_range_expiry_is_rejected_without_panicking() {
        let now = Utc::now();
        for secs in [i64::MAX, i64::MIN, i64::MAX / 1000] {
            let grant = TokenGrant::bearer("T1").with_expires_in(secs);
            assert_eq!(grant.expires_at(now), None);
            assert!(!grant.has_valid_expiry(now));
        }
    }
}
