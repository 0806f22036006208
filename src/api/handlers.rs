use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthComponents, HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: state.settings().api().project_name.clone(),
        version: state.settings().api().version.clone(),
    })
}

pub(crate) async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let (status, code, database) = match sqlx::query("SELECT 1").execute(state.db()).await {
        Ok(_) => ("healthy", StatusCode::OK, "healthy".to_string()),
        Err(err) => {
            tracing::warn!(error = %err, "Health check could not reach the database");
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {err}"))
        }
    };
    let essay_grading =
        if state.settings().grading().api_key.is_empty() { "unconfigured" } else { "configured" };

    (
        code,
        Json(HealthResponse {
            service: "verso-api",
            status,
            components: HealthComponents { database, essay_grading },
        }),
    )
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
