use axum::{extract::State, Json};
use tracing::{error, info, instrument};

use crate::{
    server::AppState,
    types::{ErrorResponse, QueryToolRequest, QueryToolResponse},
};

/// `perform_rag_query`: the single tool-call surface per SPEC_FULL §6.
///
/// Always answers HTTP 200 — failures are reported in the JSON body via
/// `success: false`, since the tool-call contract has no transport-level
/// error channel.
#[instrument(skip(state), fields(query_len = req.query.len(), match_count = req.match_count))]
pub async fn perform_rag_query(
    State(state): State<AppState>,
    Json(req): Json<QueryToolRequest>,
) -> Json<serde_json::Value> {
    if req.query.trim().is_empty() {
        return Json(serde_json::to_value(ErrorResponse::new("query must not be empty")).unwrap());
    }

    let top_k = req.match_count.max(1) as usize;
    match state.query_engine.query(&req.query, top_k).await {
        Ok(results) => {
            info!(result_count = results.len(), "query served");
            let response = QueryToolResponse {
                success: true,
                query: req.query,
                search_mode: if state.hybrid_search { "hybrid" } else { "vector" },
                reranking_applied: state.use_reranking,
                count: results.len(),
                results: results.into_iter().map(Into::into).collect(),
            };
            Json(serde_json::to_value(response).unwrap())
        }
        Err(e) => {
            error!(error = %e, "query failed");
            Json(serde_json::to_value(ErrorResponse::new(e.to_string())).unwrap())
        }
    }
}
