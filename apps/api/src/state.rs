use std::sync::Arc;

use sqlx::SqlitePool;

use crate::extraction::gateway::FactExtractor;
use crate::reconcile::session::SessionStore;
use crate::templates::store::TemplateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Extraction gateway. `LlmFactExtractor` in production, a stub in tests.
    pub extractor: Arc<dyn FactExtractor>,
    pub templates: TemplateStore,
    /// Open editing sessions. Lost on restart; the facts they wrote are not.
    pub sessions: SessionStore,
}
