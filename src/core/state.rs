use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::grading::EssayEvaluator;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    essays: Arc<dyn EssayEvaluator>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool, essays: Arc<dyn EssayEvaluator>) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, essays }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn essays(&self) -> &dyn EssayEvaluator {
        self.inner.essays.as_ref()
    }
}
