//! Application state shared across request handlers.

use std::sync::Arc;

use crate::db::Database;
use crate::engine::AllocationEngine;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: AllocationEngine,
    db: Option<Database>,
}

impl AppState {
    /// State for an engine with no database behind it (in-memory stores).
    pub fn new(engine: AllocationEngine) -> Self {
        Self {
            inner: Arc::new(AppStateInner { engine, db: None }),
        }
    }

    /// State for an engine backed by `db`; readiness probes check it.
    pub fn with_database(engine: AllocationEngine, db: Database) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine,
                db: Some(db),
            }),
        }
    }

    pub fn engine(&self) -> &AllocationEngine {
        &self.inner.engine
    }

    /// Get a reference to the database, if one is configured.
    pub fn db(&self) -> Option<&Database> {
        self.inner.db.as_ref()
    }
}
