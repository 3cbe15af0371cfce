use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;

/// Shared per-process state. `PgPool` is reference-counted internally, so
/// the whole state clones cheaply per request.
#[derive(Clone)]
pub(crate) struct AppState {
    settings: Arc<Settings>,
    db: PgPool,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool) -> Self {
        Self { settings: Arc::new(settings), db }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.db
    }
}
