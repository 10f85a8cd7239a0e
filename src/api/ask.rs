use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::validate_query;
use crate::conversation::Role;
use crate::models::{AskRequest, AskResponse};
use crate::state::AppState;

/// POST /api/ask - Answer a question from the dataset's Stack Overflow answers:
///   1. Translate the query into the index language
///   2. Vector recall, then cross-encoder rerank (original query)
///   3. Generate an answer grounded in the top results
///
/// Capability failures degrade inside the pipeline, so this only errors on
/// bad input or when the service is at capacity.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    let query = validate_query(&req.query)?;
    let dataset = state.resolve_dataset(req.dataset.as_deref());
    let top_k = state.resolve_top_k(req.top_k);

    let _permit = state
        .ask_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Ask service at capacity".to_string(),
            )
        })?;

    let context_id = req.context_id.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if let Some(context_id) = context_id {
        state.conversations.append(context_id, Role::User, query.as_str());
    }

    let response = state.assistant.ask(&dataset, &query, top_k).await;
    tracing::info!(
        "Answered question on '{dataset}' with {} results",
        response.results.len()
    );

    if let Some(context_id) = context_id {
        state
            .conversations
            .append(context_id, Role::Assistant, response.answer.as_str());
    }

    Ok(Json(response))
}
