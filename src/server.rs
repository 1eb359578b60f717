//! HTTP API.
//!
//! Serves the cached alert feed, alert → code enrichment and the codifier
//! lookups as JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/v1/air-alert/cached-alerts` | Current alert snapshot |
//! | `GET`  | `/api/v1/air-alert/filter-by-location-type/{location_type}` | Alerts of one territorial organization |
//! | `GET`  | `/api/v1/air-alert/codifier` | Alerts with resolved `ua_code` |
//! | `GET`  | `/api/v1/codifier/search/by-name?q=` | Settlement name search |
//! | `GET`  | `/api/v1/codifier/search/by-code/{code}` | Exact code lookup |
//! | `GET`  | `/api/v1/codifier/location` | Paginated hierarchy browsing |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Authentication
//!
//! When an API token is configured, every `/api/v1` request must carry it as
//! `Authorization: Bearer <token>` or `X-API-Token: <token>`. `/health` is
//! always open.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "district not found: Бузький" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal_error` (500), `upstream_error` (502).

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};

use crate::alerts::{enrich, filter_by_location_type, AlertSummary, EnrichedAlert};
use crate::cache::AlertCache;
use crate::codifier::{is_code_query, BrowseError, CodifierIndex, LevelEntry, Provenance};
use crate::config::Config;
use crate::feed::{create_feed, FetchError};
use crate::models::{AlertSnapshot, Match, TerritorialOrganization};
use crate::resolver::AlertCodeResolver;

const DEFAULT_PER_PAGE: usize = 100;
const MAX_PER_PAGE: usize = 1000;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    cache: AlertCache,
    resolver: AlertCodeResolver,
    api_token: Option<Arc<str>>,
}

impl AppState {
    /// `api_token = None` leaves the API open.
    pub fn new(index: Arc<CodifierIndex>, cache: AlertCache, api_token: Option<String>) -> Self {
        Self {
            cache,
            resolver: AlertCodeResolver::new(index),
            api_token: api_token.map(Arc::from),
        }
    }

    fn index(&self) -> &CodifierIndex {
        self.resolver.index()
    }
}

/// Build the full router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/air-alert/cached-alerts", get(handle_cached_alerts))
        .route(
            "/air-alert/filter-by-location-type/{location_type}",
            get(handle_filter_by_location_type),
        )
        .route("/air-alert/codifier", get(handle_alerts_codifier))
        .route("/codifier/search/by-name", get(handle_search_by_name))
        .route("/codifier/search/by-code/{code}", get(handle_search_by_code))
        .route("/codifier/location", get(handle_location))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Load the codifier, connect the feed and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let index = Arc::new(CodifierIndex::load(&config.codifier.path)?);
    let feed = create_feed(&config.feed)?;
    let api_token = config.server.api_token();
    if api_token.is_none() {
        tracing::warn!("no API token configured; /api/v1 is open to any client");
    }

    let state = AppState::new(index, AlertCache::new(feed), api_token);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Codifier API listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal_error",
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: "invalid or missing API token".to_string(),
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error",
            message: err.to_string(),
        }
    }
}

impl From<BrowseError> for AppError {
    fn from(err: BrowseError) -> Self {
        not_found(err.to_string())
    }
}

// ============ Token guard ============

fn provided_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get("x-api-token")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    })
}

fn token_matches(provided: Option<&str>, expected: &str) -> bool {
    provided.is_some_and(|token| token.as_bytes().ct_eq(expected.as_bytes()).into())
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.api_token.as_deref() {
        if !token_matches(provided_token(request.headers()), expected) {
            tracing::debug!(path = %request.uri().path(), "rejected request without valid token");
            return Err(unauthorized());
        }
    }
    Ok(next.run(request).await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /air-alert ============

async fn handle_cached_alerts(
    State(state): State<AppState>,
) -> Result<Json<AlertSnapshot>, AppError> {
    let snapshot = state.cache.get_active_alerts().await?;
    Ok(Json(AlertSnapshot::clone(&snapshot)))
}

async fn handle_filter_by_location_type(
    State(state): State<AppState>,
    Path(location_type): Path<String>,
) -> Result<Json<Vec<AlertSummary>>, AppError> {
    let kind: TerritorialOrganization = location_type.parse().map_err(bad_request)?;
    let snapshot = state.cache.get_active_alerts().await?;
    Ok(Json(filter_by_location_type(&snapshot.alerts, kind)))
}

#[derive(Serialize)]
struct AlertsCodifierResponse {
    credit_for_location_data: Option<Provenance>,
    data: Vec<EnrichedAlert>,
}

async fn handle_alerts_codifier(
    State(state): State<AppState>,
) -> Result<Json<AlertsCodifierResponse>, AppError> {
    let snapshot = state.cache.get_active_alerts().await?;
    let resolver = state.resolver.clone();
    let data = tokio::task::spawn_blocking(move || enrich(&snapshot.alerts, &resolver))
        .await
        .map_err(|e| internal(format!("alert enrichment failed: {}", e)))?;

    Ok(Json(AlertsCodifierResponse {
        credit_for_location_data: state.index().provenance().cloned(),
        data,
    }))
}

// ============ /codifier ============

#[derive(Serialize)]
struct MatchResponse {
    chain: Vec<String>,
    code: String,
    category: &'static str,
    category_label: &'static str,
}

impl From<Match> for MatchResponse {
    fn from(m: Match) -> Self {
        Self {
            category: m.category.code(),
            category_label: m.category_label(),
            chain: m.chain,
            code: m.code,
        }
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn handle_search_by_name(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MatchResponse>>, AppError> {
    let q = params.q.unwrap_or_default();
    if q.trim().is_empty() {
        return Err(bad_request("q must not be empty"));
    }
    let matches = state.index().search(&q);
    Ok(Json(matches.into_iter().map(MatchResponse::from).collect()))
}

async fn handle_search_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<MatchResponse>, AppError> {
    if !is_code_query(&code) {
        return Err(bad_request(format!(
            "'{}' is not a codifier code (expected optional UA followed by 10-20 digits)",
            code
        )));
    }
    state
        .index()
        .search_by_code(&code)
        .map(|m| Json(m.into()))
        .ok_or_else(|| not_found(format!("code not found: {}", code.trim())))
}

#[derive(Deserialize)]
struct LocationParams {
    region: Option<String>,
    district: Option<String>,
    community: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
}

fn parse_count(name: &str, value: Option<&str>, default: usize) -> Result<usize, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            bad_request(format!("{} must be a positive integer, got '{}'", name, raw))
        }),
    }
}

#[derive(Serialize)]
struct LocationPage {
    items: Vec<LevelEntry>,
    page: usize,
    per_page: usize,
    total: usize,
}

async fn handle_location(
    State(state): State<AppState>,
    Query(params): Query<LocationParams>,
) -> Result<Json<LocationPage>, AppError> {
    let page = parse_count("page", params.page.as_deref(), 1)?;
    if page == 0 {
        return Err(bad_request("page starts at 1"));
    }
    let per_page = parse_count("per_page", params.per_page.as_deref(), DEFAULT_PER_PAGE)?;
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(bad_request(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }

    let entries = state.index().browse(
        params.region.as_deref(),
        params.district.as_deref(),
        params.community.as_deref(),
    )?;

    let total = entries.len();
    let items = entries
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    Ok(Json(LocationPage {
        items,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codifier::fixture;
    use crate::feed::AlertFeed;
    use crate::models::Alert;
    use async_trait::async_trait;
    use serde_json::Value;

    struct StaticFeed(Result<Vec<Alert>, FetchError>);

    #[async_trait]
    impl AlertFeed for StaticFeed {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch_active_alerts(&self) -> Result<Vec<Alert>, FetchError> {
            self.0.clone()
        }
    }

    fn alerts() -> Vec<Alert> {
        vec![
            Alert {
                location_title: "Одеська область".to_string(),
                location_type: "oblast".to_string(),
                alert_type: "air_raid".to_string(),
                location_oblast: Some("Одеська область".to_string()),
                ..Alert::default()
            },
            Alert {
                location_title: "м. Ізмаїл".to_string(),
                location_type: "city".to_string(),
                alert_type: "air_raid".to_string(),
                location_oblast: Some("Одеська область".to_string()),
                location_raion: Some("Ізмаїльський район".to_string()),
                location_hromada: Some("Ізмаїльська територіальна громада".to_string()),
                ..Alert::default()
            },
        ]
    }

    async fn spawn(feed: Result<Vec<Alert>, FetchError>, token: Option<&str>) -> String {
        let cache = AlertCache::new(Arc::new(StaticFeed(feed)));
        let state = AppState::new(Arc::new(fixture::index()), cache, token.map(String::from));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn get_json(url: &str) -> (StatusCode, Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let base = spawn(Ok(alerts()), Some("secret")).await;
        let (status, body) = get_json(&format!("{}/health", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_token_guard() {
        let base = spawn(Ok(alerts()), Some("secret")).await;
        let url = format!("{}/api/v1/codifier/location", base);
        let client = reqwest::Client::new();

        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "unauthorized");

        let resp = client.get(&url).bearer_auth("wrong").send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 401);

        let resp = client.get(&url).bearer_auth("secret").send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        let resp = client
            .get(&url)
            .header("X-API-Token", "secret")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_cached_alerts_and_filter() {
        let base = spawn(Ok(alerts()), None).await;

        let (status, body) = get_json(&format!("{}/api/v1/air-alert/cached-alerts", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alerts"].as_array().unwrap().len(), 2);
        assert!(body["fetched_at"].is_string());

        let (status, body) = get_json(&format!(
            "{}/api/v1/air-alert/filter-by-location-type/city",
            base
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["location_title"], "м. Ізмаїл");

        let (status, body) = get_json(&format!(
            "{}/api/v1/air-alert/filter-by-location-type/village",
            base
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_alerts_codifier_enriches_and_credits() {
        let base = spawn(Ok(alerts()), None).await;
        let (status, body) = get_json(&format!("{}/api/v1/air-alert/codifier", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credit_for_location_data"]["order"]["number"], "290");
        assert_eq!(body["data"][0]["ua_code"], "UA51000000000030770");
        assert_eq!(body["data"][1]["ua_code"], "UA51080050010072618");
        assert_eq!(body["data"][1]["location_type"], "city");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let base = spawn(Err(FetchError::Unauthorized(401)), None).await;
        let (status, body) = get_json(&format!("{}/api/v1/air-alert/cached-alerts", base)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "upstream_error");
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let base = spawn(Ok(vec![]), None).await;
        let (status, body) = get_json(&format!(
            "{}/api/v1/codifier/search/by-name?q=Татарбунари",
            base
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["code"], "UA51040250010015619");
        assert_eq!(body[0]["category"], "M");
        assert_eq!(body[0]["chain"][0], "Одеська");

        let (status, _) = get_json(&format!("{}/api/v1/codifier/search/by-name?q=", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_by_code() {
        let base = spawn(Ok(vec![]), None).await;
        let url = |code: &str| format!("{}/api/v1/codifier/search/by-code/{}", base, code);

        let (status, body) = get_json(&url("UA51080000000061776")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chain"], serde_json::json!(["Одеська", "Ізмаїльський"]));
        assert_eq!(body["category"], "P");

        let (status, body) = get_json(&url("80000000000093317")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "K");

        let (status, _) = get_json(&url("Київ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json(&url("UA99999999999999999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_location_browsing_and_pagination() {
        let base = spawn(Ok(vec![]), None).await;
        let url = |query: &str| format!("{}/api/v1/codifier/location?{}", base, query);

        let (status, body) = get_json(&url("")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        let (_, body) = get_json(&url("region=Одеська&per_page=2&page=2")).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["page"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["name"], "Ізмаїльський");

        let (_, body) = get_json(&url("region=Одеська&district=Одеський")).await;
        assert_eq!(body["total"], 2);

        let (status, body) = get_json(&url("region=Одеська&district=Бузький")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Бузький"));

        let (status, _) = get_json(&url("page=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get_json(&url("page=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].as_str().unwrap().contains("page"));

        let (status, body) = get_json(&url("per_page=-5")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches(Some("secret"), "secret"));
        assert!(!token_matches(Some("secreT"), "secret"));
        assert!(!token_matches(Some("secret2"), "secret"));
        assert!(!token_matches(Some(""), "secret"));
        assert!(!token_matches(None, "secret"));
    }

    #[tokio::test]
    async fn test_alerts_codifier_resolves_city_without_hromada() {
        let city = Alert {
            location_title: "м. Ізмаїл".to_string(),
            location_type: "city".to_string(),
            alert_type: "air_raid".to_string(),
            location_oblast: Some("Одеська область".to_string()),
            location_raion: Some("Ізмаїльський район".to_string()),
            ..Alert::default()
        };
        let base = spawn(Ok(vec![city; 40]), None).await;
        let (status, body) = get_json(&format!("{}/api/v1/air-alert/codifier", base)).await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 40);
        assert!(data.iter().all(|e| e["ua_code"] == "UA51080050010072618"));
    }
}
