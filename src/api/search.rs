use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::validate_query;
use crate::error::{IndexError, RetrievalError};
use crate::models::{SearchRequest, SearchResponse};
use crate::state::AppState;

/// POST /api/search - Retrieval only: translate, vector recall, rerank.
/// Unlike /api/ask, failures are reported instead of becoming empty results.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = validate_query(&req.query)?;
    let dataset = state.resolve_dataset(req.dataset.as_deref());
    let top_k = state.resolve_top_k(req.top_k);

    let results = state
        .assistant
        .retriever()
        .retrieve(&dataset, &query, top_k)
        .await
        .map_err(|e| (status_for(&e), e.to_string()))?;

    Ok(Json(SearchResponse { query, results }))
}

fn status_for(err: &RetrievalError) -> StatusCode {
    match err {
        RetrievalError::IndexLoad(IndexError::NotFound(_)) => StatusCode::NOT_FOUND,
        RetrievalError::IndexLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RetrievalError::Translation(_)
        | RetrievalError::Embedding(_)
        | RetrievalError::Rerank(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapabilityError;

    #[test]
    fn test_status_mapping() {
        let missing = RetrievalError::IndexLoad(IndexError::NotFound("go".to_string()));
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);

        let rerank = RetrievalError::Rerank(CapabilityError::transient("rerank", "503"));
        assert_eq!(status_for(&rerank), StatusCode::BAD_GATEWAY);
    }
}
