use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageId, MessageTarget, PendingMessage, UserId};

/// Events pushed to connected clients over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is registered
    Ready { user_id: UserId },

    /// A new message was sent. `id` is absent while the message is still queued.
    MessageCreate {
        id: Option<MessageId>,
        sender_id: UserId,
        target: MessageTarget,
        content: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The sender retracted a message
    MessageRecall {
        id: MessageId,
        sender_id: UserId,
        target: MessageTarget,
    },

    /// A user reacted to a message for the first time
    ReactionAdd {
        message_id: MessageId,
        user_id: UserId,
        reaction_type: String,
    },

    /// A user replaced their reaction on a message
    ReactionUpdate {
        message_id: MessageId,
        user_id: UserId,
        reaction_type: String,
    },

    /// A user took their reaction back
    ReactionRemove {
        message_id: MessageId,
        user_id: UserId,
    },

    /// A user came online or went offline
    PresenceUpdate { user_id: UserId, online: bool },
}

impl GatewayEvent {
    pub fn created(message: &Message) -> Self {
        Self::MessageCreate {
            id: Some(message.id),
            sender_id: message.sender_id,
            target: message.target,
            content: message.content.clone(),
            timestamp: message.created_at,
        }
    }

    pub fn queued(message: &PendingMessage) -> Self {
        Self::MessageCreate {
            id: None,
            sender_id: message.sender_id,
            target: message.target,
            content: message.content.clone(),
            timestamp: message.created_at,
        }
    }

    pub fn recalled(message: &Message) -> Self {
        Self::MessageRecall {
            id: message.id,
            sender_id: message.sender_id,
            target: message.target,
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::MessageCreate { .. } => "message_create",
            Self::MessageRecall { .. } => "message_recall",
            Self::ReactionAdd { .. } => "reaction_add",
            Self::ReactionUpdate { .. } => "reaction_update",
            Self::ReactionRemove { .. } => "reaction_remove",
            Self::PresenceUpdate { .. } => "presence_update",
        }
    }
}
