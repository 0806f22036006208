mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_exam).get(handlers::list_exams))
        .route("/:exam_id", get(handlers::get_exam))
        .route("/:exam_id/attempts", post(handlers::start_attempt))
        .route("/:exam_id/attempts/in-progress", get(handlers::get_in_progress_attempt))
}
