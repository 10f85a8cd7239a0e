use axum::extract::{Path, State};
use axum::Json;

use crate::models::{ConversationResponse, TurnView};
use crate::state::AppState;

/// GET /api/conversations/{id} - Turns of one conversation, oldest first.
/// Unknown ids have no turns yet.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
) -> Json<ConversationResponse> {
    let turns = state
        .conversations
        .turns(&context_id)
        .iter()
        .map(TurnView::from)
        .collect();
    Json(ConversationResponse { context_id, turns })
}
