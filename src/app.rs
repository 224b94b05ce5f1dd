use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::authorizer::Authorizer;
use crate::db::page_repository::PageRepository;
use crate::storage::file_store::MirrorStore;
use crate::sync::throttle::SyncThrottle;

/// Shared state handed to every handler.
///
/// Handlers only reach the two stores through the sync engine.
#[derive(Clone)]
pub struct AppState {
    pub page_repo: Arc<dyn PageRepository>,
    pub mirror: Arc<dyn MirrorStore>,
    pub authorizer: Arc<dyn Authorizer>,
    pub sync_throttle: Arc<SyncThrottle>,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::api::pages::pages_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
