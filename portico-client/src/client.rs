use crate::config::ClientConfig;
use crate::credentials::attach_credentials;
use crate::refresh::{HttpRefreshExchange, RefreshCoordinator, RefreshExchange};
use crate::resource::Resource;
use portico_core::{utils, ApiRequest, ApiResponse, GatewayError};
use portico_session::SessionStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// The authenticated HTTP client every API call goes through.
///
/// Each request is stamped with the session's access token. A response
/// matching the configured auth-failure signature sends the request through
/// the [`RefreshCoordinator`] and replays it once with the new token. Every
/// other outcome is handed back unchanged.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new [`ApiClientBuilder`].
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// The session this client reads credentials from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The coordinator handling token refreshes.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// CRUD and lifecycle calls for the resource collection at `/{name}`.
    pub fn resource(&self, name: impl Into<String>) -> Resource {
        Resource::new(self.clone(), name)
    }

    /// Send a request and return the response on a 2xx status.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let sent_with = attach_credentials(&self.session, &mut request);
        let response = self.dispatch(&request).await?;

        if !self.config.auth_failure.matches(&response) {
            return response.error_for_status();
        }
        if request.is_retried() {
            debug!(path = request.path(), "Replayed request rejected again");
            return Err(response.into_error());
        }

        request.mark_retried();
        let token = self.coordinator.recover(sent_with.as_deref()).await?;

        if !utils::set_bearer_token(request.headers_mut(), &token) {
            return Err(response.into_error());
        }
        debug!(path = request.path(), "Replaying request with refreshed token");
        let replayed = self.dispatch(&request).await?;
        replayed.error_for_status()
    }

    /// `GET path`, decoding the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// `POST path` with a JSON body, decoding the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// `PUT path` with a JSON body, decoding the JSON response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// `DELETE path`, discarding the body.
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError> {
        let url = self.config.endpoint(request.path())?;
        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        ApiResponse::from_reqwest(response).await
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ClientConfig,
    session: Option<Arc<SessionStore>>,
    exchange: Option<Arc<dyn RefreshExchange>>,
    http: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    /// Start from `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
            exchange: None,
            http: None,
        }
    }

    /// Share an existing session. Defaults to a fresh in-memory session.
    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Replace the HTTP refresh exchange.
    pub fn refresh_exchange(mut self, exchange: Arc<dyn RefreshExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Use a preconfigured reqwest client. The configured timeout and user
    /// agent are then ignored.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient, GatewayError> {
        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = reqwest::Client::builder().user_agent(&self.config.user_agent);
                if let Some(timeout) = self.config.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        let exchange = match self.exchange {
            Some(exchange) => exchange,
            None => Arc::new(HttpRefreshExchange::new(
                http.clone(),
                self.config.refresh_url()?,
            )),
        };

        let session = self
            .session
            .unwrap_or_else(|| Arc::new(SessionStore::in_memory()));
        let coordinator = Arc::new(RefreshCoordinator::new(session.clone(), exchange));

        Ok(ApiClient {
            http,
            config: Arc::new(self.config),
            session,
            coordinator,
        })
    }
}
