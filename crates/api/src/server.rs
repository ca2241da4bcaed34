use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use docrag_retrieval::QueryEngine;
use docrag_store::Store;
use tower_http::trace::TraceLayer;

use crate::{middleware::logging::logging_middleware, routes};

#[derive(Clone)]
pub struct AppState {
    pub query_engine: Arc<QueryEngine>,
    pub store: Arc<Store>,
    pub hybrid_search: bool,
    pub use_reranking: bool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/tools/perform_rag_query", post(routes::tool::perform_rag_query))
        .route("/api/pages", get(routes::dashboard::list_pages))
        .route("/api/chunks", get(routes::dashboard::list_chunks))
        .route("/api/stats", get(routes::dashboard::stats))
        .route("/health", get(health))
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<crate::types::HealthResponse> {
    axum::Json(crate::types::HealthResponse { status: "ok".to_string(), timestamp: chrono::Utc::now() })
}
