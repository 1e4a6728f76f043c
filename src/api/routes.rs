use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::RuleCatalog;
use crate::domain::{RuleRequest, RuleResponse};
use crate::engine::RuleEngine;
use crate::observability::{MetricsRegistry, TimingGuard};

use super::response::{ErrorResponse, HealthResponse, ReloadResponse};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Shared application state.
pub struct AppState {
    pub engine: Arc<RuleEngine>,

    /// Cached rule configurations
    pub catalog: Arc<RuleCatalog>,

    pub metrics: Arc<MetricsRegistry>,

    /// Key callers must present in `X-API-KEY`
    pub api_key: String,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rules/consume", post(handle_consume))
        .route("/rules/health", get(handle_health))
        .route("/rules/config/reload/:type", post(handle_reload))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| key == expected)
}

/// Execute the rules configured for the request type.
///
/// Always answers 200 once authorized; lookup failures come back as an
/// invalid response.
async fn handle_consume(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RuleRequest>,
) -> axum::response::Response {
    if !authorized(&headers, &state.api_key) {
        warn!("Invalid or missing API key");
        return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::unauthorized())).into_response();
    }

    info!(type_of_request = %req.type_of_request, "Processing rule request");

    let config = match state.catalog.clone().resolve_async(&req.type_of_request).await {
        Ok(config) => config,
        Err(e) => {
            error!(type_of_request = %req.type_of_request, error = %e, "Failed to resolve rule configuration");
            state.metrics.record_config_lookup_failure();
            let response = RuleResponse::rejected(
                Uuid::new_v4().to_string(),
                req.type_of_request.clone(),
                format!("Processing failed: {}", e),
            );
            return (StatusCode::OK, Json(response)).into_response();
        }
    };

    let response = {
        let _timer = TimingGuard::new(&state.metrics);
        state.engine.execute(&req, &config).await
    };
    state.metrics.record_response(&response);

    info!(
        request_id = %response.request_id,
        valid = response.valid,
        "Rule execution completed"
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "UP".to_string(),
        service: "Business Rule Engine".to_string(),
        version: state.version.clone(),
        timestamp: Utc::now(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cached_configs: state.catalog.cached(),
    })
}

/// Reload one request type's configuration from its source.
async fn handle_reload(
    State(state): State<Arc<AppState>>,
    Path(type_of_request): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !authorized(&headers, &state.api_key) {
        warn!("Invalid or missing API key for config reload");
        return (StatusCode::UNAUTHORIZED, Json(ErrorResponse::unauthorized())).into_response();
    }

    match state.catalog.clone().reload_async(&type_of_request).await {
        Ok(_) => {
            state.metrics.record_config_reload(true);
            (StatusCode::OK, Json(ReloadResponse::reloaded(&type_of_request))).into_response()
        }
        Err(e) => {
            error!(type_of_request = %type_of_request, error = %e, "Failed to reload configuration");
            state.metrics.record_config_reload(false);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal_error(format!(
                    "Failed to reload configuration: {}",
                    e
                ))),
            )
                .into_response()
        }
    }
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP rulegate_uptime_seconds Application uptime in seconds
# TYPE rulegate_uptime_seconds counter
rulegate_uptime_seconds {}

# HELP rulegate_cached_configs Rule configurations currently cached
# TYPE rulegate_cached_configs gauge
rulegate_cached_configs {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.catalog.cached(),
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileRuleConfigSource;
    use crate::engine::StaticEnvironment;
    use crate::expression::{Evaluator, DEFAULT_TAG};
    use crate::external::MockHttpClient;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    const KEY: &str = "test-key";

    fn test_app_state() -> (TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("user-registration.json"),
            r##"{
  "type": "user-registration",
  "rules": [
    {
      "id": "v1",
      "validate": [
        { "path": "$.lastName", "required": true, "message": "Last name is required" }
      ]
    },
    {
      "id": "t1",
      "transform": [
        { "kind": "SPEL", "spel": "#payload['fullName'] = #payload['firstName'] + ' ' + #payload['lastName']" }
      ]
    }
  ]
}"##,
        )
        .unwrap();

        let evaluator = Arc::new(Evaluator::new(DEFAULT_TAG).unwrap());
        let engine = RuleEngine::new(evaluator, Arc::new(MockHttpClient::new()))
            .with_environment(Arc::new(StaticEnvironment::new()));
        let catalog = RuleCatalog::new(Arc::new(FileRuleConfigSource::new(dir.path())));

        let state = Arc::new(AppState {
            engine: Arc::new(engine),
            catalog: Arc::new(catalog),
            metrics: Arc::new(MetricsRegistry::new()),
            api_key: KEY.to_string(),
            start_time: Instant::now(),
            version: "0.1.0-test".to_string(),
        });

        (dir, state)
    }

    fn consume(body: Value, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/rules/consume")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, state) = test_app_state();
        let app = create_router(state);

        let request = Request::builder()
            .uri("/rules/health")
            .body(Body::empty())
            .unwrap();

        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "UP");
    }

    #[tokio::test]
    async fn test_consume_requires_api_key() {
        let (_dir, state) = test_app_state();

        for key in [None, Some("wrong")] {
            let app = create_router(state.clone());
            let request = consume(json!({"typeOfRequest": "user-registration"}), key);
            let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_consume_runs_rules() {
        let (_dir, state) = test_app_state();
        let app = create_router(state.clone());

        let request = consume(
            json!({
                "typeOfRequest": "user-registration",
                "payload": {"firstName": "John", "lastName": "Doe", "age": 25}
            }),
            Some(KEY),
        );
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["errors"], json!([]));
        assert_eq!(body["transformedPayload"]["fullName"], "John Doe");
        assert_eq!(body["trace"][0]["status"], "SUCCESS");
        assert_eq!(body["trace"][1]["status"], "TRANSFORMED");

        assert_eq!(
            state
                .metrics
                .executions_valid
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_consume_reports_validation_errors() {
        let (_dir, state) = test_app_state();
        let app = create_router(state);

        let request = consume(
            json!({
                "typeOfRequest": "user-registration",
                "payload": {"firstName": "John"}
            }),
            Some(KEY),
        );
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["errors"], json!(["Last name is required"]));
    }

    #[tokio::test]
    async fn test_consume_unknown_type_is_still_ok() {
        let (_dir, state) = test_app_state();
        let app = create_router(state);

        let request = consume(json!({"typeOfRequest": "unknown", "payload": {}}), Some(KEY));
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(
            body["errors"][0],
            "Processing failed: Rule configuration not found for type: unknown"
        );
        assert!(body["transformedPayload"].is_null());
    }

    #[tokio::test]
    async fn test_reload_endpoint() {
        let (dir, state) = test_app_state();
        state.catalog.resolve("user-registration").unwrap();

        fs::write(
            dir.path().join("user-registration.json"),
            r#"{"type": "user-registration", "rules": [{"id": "only"}]}"#,
        )
        .unwrap();

        let app = create_router(state.clone());
        let request = Request::builder()
            .method("POST")
            .uri("/rules/config/reload/user-registration")
            .header(API_KEY_HEADER, KEY)
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(
            body["message"],
            "Configuration reloaded successfully for type: user-registration"
        );
        assert_eq!(
            state.catalog.resolve("user-registration").unwrap().rules[0].id,
            "only"
        );
    }

    #[tokio::test]
    async fn test_reload_missing_type_fails() {
        let (_dir, state) = test_app_state();
        let app = create_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/rules/config/reload/nope")
            .header(API_KEY_HEADER, KEY)
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to reload configuration"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (_dir, state) = test_app_state();

        let app = create_router(state.clone());
        let request = consume(
            json!({"typeOfRequest": "user-registration", "payload": {"lastName": "Doe"}}),
            Some(KEY),
        );
        tower::ServiceExt::oneshot(app, request).await.unwrap();

        let app = create_router(state);
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains("rulegate_executions_total 1"));
        assert!(text.contains("rulegate_cached_configs 1"));
    }
}
