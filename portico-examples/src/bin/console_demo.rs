use portico::client::{ApiClient, ClientConfig};
use portico::session::{SessionStore, SqlStorage};
use portico::{GatewayError, Identity, TokenGrant};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// This example signs in with tokens from the environment (or picks up the
/// session a previous run left in SQLite) and lists one resource collection.
/// An expired access token is refreshed transparently.

struct Config {
    database_url: String,
    resource: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl Config {
    fn from_env() -> Self {
        Self {
            database_url: std::env::var("PORTICO_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://portico.db?mode=rwc".to_string()),
            resource: std::env::var("PORTICO_RESOURCE").unwrap_or_else(|_| "modules".to_string()),
            access_token: std::env::var("PORTICO_ACCESS_TOKEN").ok(),
            refresh_token: std::env::var("PORTICO_REFRESH_TOKEN").ok(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,portico=debug")),
        )
        .init();

    let config = Config::from_env();
    let client_config = ClientConfig::from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let storage = SqlStorage::new(pool);
    storage.migrate().await?;

    let session = Arc::new(SessionStore::new(Arc::new(storage)));
    if session.restore().await? {
        tracing::info!("Resumed stored session");
    } else if let Some(access_token) = config.access_token {
        let mut grant = TokenGrant::bearer(access_token);
        if let Some(refresh_token) = config.refresh_token {
            grant = grant.with_refresh_token(refresh_token);
        }
        session.login(grant, Identity::new("console")).await?;
        tracing::info!("Signed in with tokens from the environment");
    } else {
        tracing::warn!("No session found; requests go out unauthenticated");
    }

    let client = ApiClient::builder(client_config)
        .session(session.clone())
        .build()?;

    match client.resource(config.resource.as_str()).list::<Value>(&[]).await {
        Ok(items) => println!("{}", serde_json::to_string_pretty(&items)?),
        Err(GatewayError::Refresh(e)) => {
            tracing::warn!(error = %e, "Session ended, sign in again");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
