use serde::Serialize;

pub(crate) mod attempt;
pub(crate) mod exam;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: &'static str,
    pub(crate) status: &'static str,
    pub(crate) components: HealthComponents,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthComponents {
    pub(crate) database: String,
    /// `configured` when an essay grading provider key is present.
    pub(crate) essay_grading: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
}
