use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use opsdesk_agent::{ChatReply, ChatRequest};
use opsdesk_core::domain::conversation::{Conversation, ConversationId, ConversationSummary};
use opsdesk_core::domain::supplier::SupplierId;

use crate::api::{not_found, persistence, reject, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/consumer", post(consumer))
        .route("/supplier/{supplier_id}", post(supplier))
        .route("/history/{conversation_id}", get(history))
        .route("/conversations", get(conversations))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

async fn consumer(State(state): State<AppState>, Json(body): Json<ChatBody>) -> ApiResult<ChatReply> {
    let request = ChatRequest::consumer(body.conversation_id.map(ConversationId), body.message);
    let reply = state.chat.handle(request).await.map_err(reject)?;
    Ok(Json(reply))
}

async fn supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Json(body): Json<ChatBody>,
) -> ApiResult<ChatReply> {
    let supplier_id = SupplierId(supplier_id);
    if state.suppliers.find_by_id(&supplier_id).await.map_err(persistence)?.is_none() {
        return Err(not_found("supplier", supplier_id.0));
    }

    let request =
        ChatRequest::supplier(supplier_id, body.conversation_id.map(ConversationId), body.message);
    let reply = state.chat.handle(request).await.map_err(reject)?;
    Ok(Json(reply))
}

async fn history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Conversation> {
    let id = ConversationId(conversation_id);
    match state.conversations.find(&id).await.map_err(persistence)? {
        Some(conversation) => Ok(Json(conversation)),
        None => Err(not_found("conversation", id.0)),
    }
}

async fn conversations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<ConversationSummary>> {
    Ok(Json(state.conversations.list(query.limit).await.map_err(persistence)?))
}
