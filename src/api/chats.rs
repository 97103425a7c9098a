use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::chats::MarkReadResponse;
use crate::domain::conversation::ConversationSummary;
use crate::domain::message::MessageView;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

/// Lists the caller's conversations, most recently active first.
///
/// # Errors
/// Returns `AppError::Persistence` if the conversations cannot be loaded.
pub async fn list_chats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>> {
    let summaries = state.chat_service.list_conversations(user.id).await?;
    Ok(Json(summaries))
}

/// Returns the full history of one conversation.
///
/// # Errors
/// Returns `AppError::ConversationNotFound` if the conversation does not exist.
/// Returns `AppError::NotAuthorized` if the caller is not a participant.
pub async fn get_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>> {
    let messages = state.chat_service.conversation_messages(user.id, chat_id).await?;
    Ok(Json(messages))
}

/// Marks the other participant's messages as read.
///
/// # Errors
/// Returns `AppError::ConversationNotFound` if the conversation does not exist.
/// Returns `AppError::NotAuthorized` if the caller is not a participant.
pub async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>> {
    let marked_read = state.chat_service.mark_conversation_read(user.id, chat_id).await?;
    Ok(Json(MarkReadResponse { marked_read }))
}
