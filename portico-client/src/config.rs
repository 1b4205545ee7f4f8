use portico_core::{AuthFailureSignature, GatewayError};
use std::time::Duration;
use url::Url;

/// Path of the refresh endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Settings of an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of every request path.
    pub base_url: Url,
    /// Path of the token refresh endpoint.
    pub refresh_path: String,
    /// Transport timeout for every call, the refresh exchange included.
    pub timeout: Option<Duration>,
    /// `User-Agent` sent with every call.
    pub user_agent: String,
    /// Response that triggers a token refresh.
    pub auth_failure: AuthFailureSignature,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the base URL.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(GatewayError::Config(format!(
                "unsupported scheme '{}'",
                base_url.scheme()
            )));
        }
        Ok(Self {
            base_url,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            timeout: Some(Duration::from_secs(30)),
            user_agent: concat!("portico/", env!("CARGO_PKG_VERSION")).to_string(),
            auth_failure: AuthFailureSignature::default(),
        })
    }

    /// Read the configuration from the environment.
    ///
    /// - `PORTICO_BASE_URL` (required)
    /// - `PORTICO_REFRESH_PATH`
    /// - `PORTICO_TIMEOUT_SECS` (`0` disables the timeout)
    /// - `PORTICO_INVALID_TOKEN_MESSAGE`
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let base_url = lookup("PORTICO_BASE_URL")
            .ok_or_else(|| GatewayError::Config("PORTICO_BASE_URL is not set".to_string()))?;
        let mut config = Self::new(&base_url)?;

        if let Some(path) = lookup("PORTICO_REFRESH_PATH") {
            config.refresh_path = path;
        }
        if let Some(raw) = lookup("PORTICO_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                GatewayError::Config(format!("PORTICO_TIMEOUT_SECS is not a number: '{raw}'"))
            })?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(message) = lookup("PORTICO_INVALID_TOKEN_MESSAGE") {
            config.auth_failure = AuthFailureSignature::with_message(message);
        }
        Ok(config)
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)` URLs are used as-is when they share the base URL's
    /// origin and rejected otherwise, so credentials never leave the API host.
    /// Anything else is appended to the base URL path.
    pub fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        if let Ok(url) = Url::parse(path) {
            if matches!(url.scheme(), "http" | "https") {
                if url.origin() != self.base_url.origin() {
                    return Err(GatewayError::InvalidRequest(format!(
                        "'{path}' is outside the API origin {}",
                        self.base_url.origin().ascii_serialization()
                    )));
                }
                return Ok(url);
            }
        }
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid path '{path}': {e}")))
    }

    /// Full URL of the refresh endpoint.
    pub fn refresh_url(&self) -> Result<Url, GatewayError> {
        self.endpoint(&self.refresh_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ClientConfig::new("https://api.example.com/api/v1/").unwrap();
        assert_eq!(
            config.endpoint("/modules/3").unwrap().as_str(),
            "https://api.example.com/api/v1/modules/3"
        );
        assert_eq!(
            config.refresh_url().unwrap().as_str(),
            "https://api.example.com/api/v1/auth/refresh"
        );
    }

    #[test]
    fn test_endpoint_accepts_same_origin_absolute_urls() {
        let config = ClientConfig::new("https://api.example.com/api").unwrap();
        assert_eq!(
            config
                .endpoint("https://api.example.com/files/x")
                .unwrap()
                .as_str(),
            "https://api.example.com/files/x"
        );
    }

    #[test]
    fn test_endpoint_rejects_other_origins() {
        let config = ClientConfig::new("https://api.example.com").unwrap();
        for url in [
            "https://files.example.com/x",
            "http://api.example.com/x",
            "https://api.example.com:8443/x",
        ] {
            assert!(matches!(
                config.endpoint(url),
                Err(GatewayError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(
            ClientConfig::new("ftp://example.com"),
            Err(GatewayError::Config(_))
        ));
        assert!(ClientConfig::new("not a url").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORTICO_BASE_URL", "http://localhost:8080"),
            ("PORTICO_REFRESH_PATH", "/session/refresh"),
            ("PORTICO_TIMEOUT_SECS", "0"),
            ("PORTICO_INVALID_TOKEN_MESSAGE", "jwt expired"),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.refresh_path, "/session/refresh");
        assert_eq!(config.timeout, None);
        assert_eq!(config.auth_failure.message, "jwt expired");
    }

    #[test]
    fn test_from_lookup_requires_base_url() {
        let err = ClientConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("PORTICO_BASE_URL"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let err = ClientConfig::from_lookup(|k| match k {
            "PORTICO_BASE_URL" => Some("http://localhost".into()),
            "PORTICO_TIMEOUT_SECS" => Some("soon".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
