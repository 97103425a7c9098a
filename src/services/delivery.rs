use crate::domain::conversation::Conversation;
use crate::domain::events::ServerEvent;
use crate::domain::message::MessageView;
use crate::services::session_registry::{Channel, SessionRegistry};

/// How many live connections each leg of a delivery reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub room: usize,
    pub notification: usize,
}

/// Fans a persisted message out to the conversation room and to the recipient's personal channel.
#[derive(Clone, Debug)]
pub struct DeliveryRouter {
    registry: SessionRegistry,
}

impl DeliveryRouter {
    #[must_use]
    pub const fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Must only be called once `message` is durably stored.
    #[tracing::instrument(
        level = "debug",
        skip(self, conversation, message),
        fields(conversation_id = %conversation.id, seq = message.seq)
    )]
    pub fn deliver(&self, conversation: &Conversation, message: &MessageView) -> DeliveryReport {
        let room = self.registry.broadcast(
            Channel::Room(conversation.id),
            &ServerEvent::NewMessage { chat_id: conversation.id, message: message.clone() },
        );

        // The recipient is notified even when it has not joined the room.
        let notification = conversation.counterparty_of(message.sender.id).map_or(0, |recipient_id| {
            self.registry.broadcast(
                Channel::Personal(recipient_id),
                &ServerEvent::ChatNotification {
                    chat_id: conversation.id,
                    message: message.clone(),
                    from: message.sender.display_name.clone(),
                },
            )
        });

        DeliveryReport { room, notification }
    }
}
