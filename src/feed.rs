//! Upstream alert feed abstraction and implementations.
//!
//! Defines the [`AlertFeed`] trait and concrete feeds:
//! - **[`AlertsInUaClient`]**: calls the alerts.in.ua `GET /v1/alerts/active.json`
//!   endpoint with a bearer token.
//! - **[`FileFeed`]**: reads the same JSON shape from a local file; used for
//!   offline runs and tests.
//!
//! # Feed Selection
//!
//! Use [`create_feed`] to instantiate the configured feed:
//!
//! ```rust,no_run
//! # use alert_codifier::config::FeedConfig;
//! # use alert_codifier::feed::create_feed;
//! let config = FeedConfig::default(); // provider = "alerts_in_ua"
//! let feed = create_feed(&config).unwrap();
//! assert_eq!(feed.name(), "alerts_in_ua");
//! ```
//!
//! # Error Mapping
//!
//! - HTTP 401 / 403 → [`FetchError::Unauthorized`]
//! - other non-2xx → [`FetchError::Status`]
//! - connection / timeout → [`FetchError::Transport`]
//! - malformed body → [`FetchError::Decode`]

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::FeedConfig;
use crate::models::Alert;

/// Failure to obtain the active alert list.
///
/// `Clone` so one failed refresh can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("alert feed rejected credentials (HTTP {0})")]
    Unauthorized(u16),
    #[error("alert feed returned HTTP {0}")]
    Status(u16),
    #[error("alert feed request failed: {0}")]
    Transport(String),
    #[error("alert feed response could not be decoded: {0}")]
    Decode(String),
    #[error("alert feed refresh aborted: {0}")]
    Aborted(String),
}

/// A source of currently active alerts.
#[async_trait]
pub trait AlertFeed: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Fetch the full list of active alerts.
    async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, FetchError>;
}

/// Body of `GET /v1/alerts/active.json`.
#[derive(Debug, Deserialize)]
struct ActiveAlertsResponse {
    #[serde(default)]
    alerts: Vec<Alert>,
}

/// Instantiate the feed named by `config.provider`.
pub fn create_feed(config: &FeedConfig) -> Result<std::sync::Arc<dyn AlertFeed>> {
    match config.provider.as_str() {
        "alerts_in_ua" => {
            let token = std::env::var(&config.token_env).unwrap_or_default();
            if token.trim().is_empty() {
                tracing::warn!(
                    env = %config.token_env,
                    "alert feed token is not set; upstream requests will be rejected"
                );
            }
            let client = AlertsInUaClient::new(
                &config.base_url,
                token.trim(),
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(std::sync::Arc::new(client))
        }
        "file" => match &config.path {
            Some(path) => Ok(std::sync::Arc::new(FileFeed::new(path.clone()))),
            None => bail!("feed.path is required when feed.provider = \"file\""),
        },
        other => bail!(
            "Unknown feed provider: '{}'. Must be alerts_in_ua or file.",
            other
        ),
    }
}

// ============ alerts.in.ua ============

/// HTTP client for the alerts.in.ua public API.
pub struct AlertsInUaClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl AlertsInUaClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("alert-codifier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/v1/alerts/active.json", base_url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl AlertFeed for AlertsInUaClient {
    fn name(&self) -> &str {
        "alerts_in_ua"
    }

    async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, FetchError> {
        let resp = self
            .http
            .get(&self.endpoint)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: ActiveAlertsResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::info!(alerts = body.alerts.len(), "alert feed request");
        Ok(body.alerts)
    }
}

// ============ File ============

/// Reads `{ "alerts": [...] }` from a file on every fetch.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl AlertFeed for FileFeed {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, FetchError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FetchError::Transport(format!("{}: {}", self.path.display(), e)))?;
        let body: ActiveAlertsResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(body.alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    async fn active(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Bearer secret" {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!({
            "alerts": [{
                "id": 1,
                "location_title": "Одеська область",
                "location_type": "oblast",
                "started_at": "2024-05-01T10:00:00.000Z",
                "alert_type": "air_raid",
                "location_oblast": "Одеська область",
                "location_uid": "18"
            }],
            "meta": { "last_updated_at": "2024/05/01 10:00:05 +0000" },
            "disclaimer": "test"
        })))
    }

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/v1/alerts/active.json", get(active))
            .route("/broken/v1/alerts/active.json", get(|| async { "not json" }))
            .route(
                "/down/v1/alerts/active.json",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base: &str, token: &str) -> AlertsInUaClient {
        AlertsInUaClient::new(base, token, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_active_alerts() {
        let base = spawn_upstream().await;
        let alerts = client(&base, "secret").fetch_active_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].location_title, "Одеська область");
    }

    #[tokio::test]
    async fn test_bad_token_is_unauthorized() {
        let base = spawn_upstream().await;
        let err = client(&base, "wrong").fetch_active_alerts().await.unwrap_err();
        assert_eq!(err, FetchError::Unauthorized(401));
    }

    #[tokio::test]
    async fn test_status_and_decode_errors() {
        let base = spawn_upstream().await;
        let err = client(&format!("{}/down", base), "secret")
            .fetch_active_alerts()
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Status(503));

        let err = client(&format!("{}/broken/", base), "secret")
            .fetch_active_alerts()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(&format!("http://{}", addr), "secret")
            .fetch_active_alerts()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn test_file_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        std::fs::write(
            &path,
            r#"{"alerts": [{"location_title": "м. Ізмаїл", "location_type": "city"}]}"#,
        )
        .unwrap();
        let alerts = FileFeed::new(path).fetch_active_alerts().await.unwrap();
        assert_eq!(alerts[0].location_type, "city");

        let missing = FileFeed::new(dir.path().join("nope.json"))
            .fetch_active_alerts()
            .await
            .unwrap_err();
        assert!(matches!(missing, FetchError::Transport(_)));
    }

    #[test]
    fn test_create_feed_validates_provider() {
        let mut config = FeedConfig::default();
        config.provider = "file".to_string();
        assert!(create_feed(&config).is_err());
        config.provider = "pigeon".to_string();
        assert!(create_feed(&config).is_err());
    }
}
