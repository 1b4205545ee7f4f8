use crate::client::ApiClient;
use portico_core::{ApiRequest, GatewayError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// Lifecycle calls for one entity collection of the API.
///
/// Every collection follows the same routes:
///
/// | call         | route                          |
/// |--------------|--------------------------------|
/// | `list`       | `GET /{name}`                  |
/// | `get`        | `GET /{name}/{id}`             |
/// | `create`     | `POST /{name}`                 |
/// | `update`     | `PUT /{name}/{id}`             |
/// | `activate`   | `PUT /{name}/{id}/activate`    |
/// | `deactivate` | `PUT /{name}/{id}/deactivate`  |
/// | `delete`     | `DELETE /{name}/{id}`          |
/// | `audit`      | `GET /{name}/{id}/audit`       |
///
/// Payloads are whatever serde types the caller picks. All calls go through
/// [`ApiClient::send`], so they share its refresh handling.
#[derive(Clone)]
pub struct Resource {
    client: ApiClient,
    name: String,
}

impl Resource {
    pub(crate) fn new(client: ApiClient, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            client,
            name: name.trim_matches('/').to_string(),
        }
    }

    /// Collection name, without slashes.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self) -> String {
        format!("/{}", self.name)
    }

    /// The id is percent-encoded so it always stays one path segment.
    fn item(&self, id: impl Display) -> String {
        format!("/{}/{}", self.name, urlencoding::encode(&id.to_string()))
    }

    /// List the collection, passing `query` as query parameters.
    pub async fn list<T: DeserializeOwned>(
        &self,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let request = query
            .iter()
            .fold(ApiRequest::get(self.collection()), |req, (k, v)| {
                req.query(*k, *v)
            });
        self.client.send(request).await?.json()
    }

    /// Fetch one entity.
    pub async fn get<T: DeserializeOwned>(&self, id: impl Display) -> Result<T, GatewayError> {
        self.client.get_json(&self.item(id)).await
    }

    /// Create an entity.
    pub async fn create<B, T>(&self, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.client.post_json(&self.collection(), body).await
    }

    /// Replace an entity.
    pub async fn update<B, T>(&self, id: impl Display, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.client.put_json(&self.item(id), body).await
    }

    /// Mark an entity active.
    pub async fn activate<T: DeserializeOwned>(&self, id: impl Display) -> Result<T, GatewayError> {
        self.lifecycle(id, "activate").await
    }

    /// Mark an entity inactive.
    pub async fn deactivate<T: DeserializeOwned>(
        &self,
        id: impl Display,
    ) -> Result<T, GatewayError> {
        self.lifecycle(id, "deactivate").await
    }

    /// Delete an entity.
    pub async fn delete(&self, id: impl Display) -> Result<(), GatewayError> {
        self.client.delete(&self.item(id)).await
    }

    /// Fetch the audit trail of an entity.
    pub async fn audit<T: DeserializeOwned>(&self, id: impl Display) -> Result<T, GatewayError> {
        self.client
            .get_json(&format!("{}/audit", self.item(id)))
            .await
    }

    async fn lifecycle<T: DeserializeOwned>(
        &self,
        id: impl Display,
        action: &str,
    ) -> Result<T, GatewayError> {
        let path = format!("{}/{}", self.item(id), action);
        self.client.send(ApiRequest::put(path)).await?.json()
    }
}
