use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::session::backend::{BackendError, ExamBackend};
use crate::session::model::{Attempt, Exam, GradeResult};

/// [`ExamBackend`] over the Verso HTTP API.
#[derive(Debug, Clone)]
pub struct HttpExamBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpExamBackend {
    /// `base_url` includes the API prefix, e.g. `https://api.verso.study/api/v1`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await.unwrap_or_default()));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
    }
}

fn status_error(status: StatusCode, body: String) -> BackendError {
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    BackendError::Status { status: status.as_u16(), detail }
}

#[async_trait]
impl ExamBackend for HttpExamBackend {
    async fn resolve_exam(&self, exam_id: &str) -> Result<Option<Exam>, BackendError> {
        let request = self.client.get(self.url(&format!("/exams/{exam_id}")));
        match self.send::<Exam>(request).await {
            Ok(exam) => Ok(Some(exam)),
            Err(BackendError::Status { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn find_in_progress_attempt(
        &self,
        exam_id: &str,
    ) -> Result<Option<Attempt>, BackendError> {
        let request = self.client.get(self.url(&format!("/exams/{exam_id}/attempts/in-progress")));
        self.send(request).await
    }

    async fn create_attempt(&self, exam_id: &str) -> Result<Attempt, BackendError> {
        let request = self.client.post(self.url(&format!("/exams/{exam_id}/attempts")));
        self.send(request).await
    }

    async fn load_responses(
        &self,
        attempt_id: &str,
    ) -> Result<HashMap<String, String>, BackendError> {
        let request = self.client.get(self.url(&format!("/attempts/{attempt_id}/responses")));
        self.send(request).await
    }

    async fn save_response(
        &self,
        attempt_id: &str,
        question_id: &str,
        answer: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .put(self.url(&format!("/attempts/{attempt_id}/responses/{question_id}")))
            .json(&json!({ "answer": answer }));
        self.send::<Value>(request).await.map(|_| ())
    }

    async fn grade_and_submit(
        &self,
        attempt_id: &str,
        time_spent_seconds: i64,
    ) -> Result<GradeResult, BackendError> {
        let request = self
            .client
            .post(self.url(&format!("/attempts/{attempt_id}/submit")))
            .json(&json!({ "time_spent_seconds": time_spent_seconds }));
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/v1/")
    }

    fn stub_api() -> Router {
        let api = Router::new()
            .route(
                "/exams/:exam_id",
                get(|Path(exam_id): Path<String>, headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok())
                        != Some("Bearer student-token")
                    {
                        return Err((StatusCode::UNAUTHORIZED, Json(json!({"status": 401, "detail": "nope"}))));
                    }
                    if exam_id != "exam-1" {
                        return Err((StatusCode::NOT_FOUND, Json(json!({"status": 404, "detail": "Exam not found"}))));
                    }
                    Ok(Json(json!({
                        "id": "exam-1",
                        "title": "Cells",
                        "description": null,
                        "time_limit_minutes": 10,
                        "questions": [{
                            "id": "q1",
                            "question_type": "multiple_choice",
                            "question": "Powerhouse?",
                            "options": ["A) Mitochondria", "B) Ribosome"],
                            "points": 1,
                            "position": 0
                        }]
                    })))
                }),
            )
            .route("/exams/:exam_id/attempts/in-progress", get(|| async { Json(Value::Null) }))
            .route(
                "/attempts/:attempt_id/submit",
                post(|| async {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({"status": 503, "detail": "Grading is temporarily unavailable"})),
                    )
                }),
            );
        Router::new().nest("/api/v1", api)
    }

    #[tokio::test]
    async fn resolves_exam_and_maps_missing_to_none() {
        let base = serve(stub_api()).await;
        let backend = HttpExamBackend::new(base, "student-token").unwrap();

        let exam = backend.resolve_exam("exam-1").await.unwrap().unwrap();
        assert_eq!(exam.title, "Cells");
        assert_eq!(exam.questions.len(), 1);
        assert!(exam.is_timed());

        assert!(backend.resolve_exam("missing").await.unwrap().is_none());
        assert!(backend.find_in_progress_attempt("exam-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn surfaces_status_and_detail_on_failure() {
        let base = serve(stub_api()).await;
        let backend = HttpExamBackend::new(base.clone(), "student-token").unwrap();

        let err = backend.grade_and_submit("attempt-1", 30).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("Grading is temporarily unavailable"));

        let anonymous = HttpExamBackend::new(base, "wrong").unwrap();
        let err = anonymous.resolve_exam("exam-1").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
