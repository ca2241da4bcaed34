use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::{error, instrument};

use crate::{
    server::AppState,
    types::{
        ChunkListQuery, ErrorResponse, ListResponse, PageListQuery, Pagination, PaginatedResponse,
        StatsDto, StatsResponse,
    },
};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(e.to_string())))
}

#[instrument(skip(state))]
pub async fn list_pages(
    State(state): State<AppState>,
    Query(params): Query<PageListQuery>,
) -> Result<Json<ListResponse<docrag_common::Page>>, ApiError> {
    let pages = state
        .store
        .list_pages(&params.sort, &params.order, params.search.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "page listing failed");
            internal_error(e)
        })?;

    Ok(Json(ListResponse { success: true, count: pages.len(), data: pages }))
}

#[instrument(skip(state))]
pub async fn list_chunks(
    State(state): State<AppState>,
    Query(params): Query<ChunkListQuery>,
) -> Result<Json<PaginatedResponse<docrag_store::ChunkSummary>>, ApiError> {
    let page = params.page.max(1);
    let size = params.size.clamp(1, 500);

    let (chunks, total) = state.store.list_chunks(page, size, params.search.as_deref()).await.map_err(|e| {
        error!(error = %e, "chunk listing failed");
        internal_error(e)
    })?;

    let total_pages = if size == 0 { 0 } else { (total + size - 1) / size };
    Ok(Json(PaginatedResponse {
        success: true,
        data: chunks,
        pagination: Pagination { page, size, total, pages: total_pages },
    }))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.stats().await.map_err(|e| {
        error!(error = %e, "stats query failed");
        internal_error(e)
    })?;

    Ok(Json(StatsResponse { success: true, data: StatsDto::from(stats) }))
}
