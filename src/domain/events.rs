use crate::domain::message::MessageView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames pushed from the server to a gateway connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    NewMessage { chat_id: Uuid, message: MessageView },
    ChatNotification { chat_id: Uuid, message: MessageView, from: String },
    Error { code: String, message: String },
    Pong,
}

/// Frames sent by a client over the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    JoinChat {
        chat_id: Uuid,
    },
    SendMessage {
        chat_id: Option<Uuid>,
        #[serde(default)]
        content: String,
        announcement_id: Option<Uuid>,
        receiver_id: Option<Uuid>,
    },
    MarkRead {
        chat_id: Uuid,
    },
    Ping,
}
