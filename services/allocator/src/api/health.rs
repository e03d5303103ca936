//! Probe endpoints for orchestrators and load balancers.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

const SERVICE_NAME: &str = "allocator";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// RFC 3339.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<Probe>,
}

#[derive(Debug, Serialize)]
pub struct Probe {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    fn new(status: &'static str, database: Option<Probe>) -> Self {
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339(),
            database,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
}

/// 200 whenever the process can answer.
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse::new("ok", None))
}

/// 503 while the database is unreachable. Without a database (in-memory
/// stores) the service is always ready.
async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let Some(db) = state.db() else {
        return (StatusCode::OK, Json(HealthResponse::new("ok", None)));
    };

    match db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse::new(
                "ok",
                Some(Probe {
                    reachable: true,
                    error: None,
                }),
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new(
                    "degraded",
                    Some(Probe {
                        reachable: false,
                        error: Some(e.to_string()),
                    }),
                )),
            )
        }
    }
}

async fn livez() -> StatusCode {
    StatusCode::OK
}
