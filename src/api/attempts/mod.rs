mod handlers;

use axum::{routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:attempt_id", get(handlers::get_attempt))
        .route("/:attempt_id/responses", get(handlers::list_responses))
        .route("/:attempt_id/responses/:question_id", put(handlers::save_response))
        .route("/:attempt_id/submit", post(handlers::submit_attempt))
        .route("/:attempt_id/result", get(handlers::get_result))
}
