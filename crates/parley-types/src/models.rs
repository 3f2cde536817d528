use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type GroupId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Private,
    Group,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Group => "GROUP",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a message is addressed. `chat_id` is the peer user for private chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageTarget {
    Private { chat_id: UserId },
    Group { group_id: GroupId },
}

impl MessageTarget {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Private { .. } => MessageType::Private,
            Self::Group { .. } => MessageType::Group,
        }
    }

    /// The peer user id or the group id, depending on the variant.
    pub fn target_id(&self) -> i64 {
        match self {
            Self::Private { chat_id } => *chat_id,
            Self::Group { group_id } => *group_id,
        }
    }
}

/// What a producer hands in before the server stamps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    #[serde(flatten)]
    pub target: MessageTarget,
    pub content: String,
}

/// A stamped message that has not been persisted yet, so it has no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub sender_id: UserId,
    #[serde(flatten)]
    pub target: MessageTarget,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn into_message(self, id: MessageId) -> Message {
        Message {
            id,
            sender_id: self.sender_id,
            target: self.target,
            content: self.content,
            created_at: self.created_at,
            is_recalled: false,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(flatten)]
    pub target: MessageTarget,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_recalled: bool,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        self.target.message_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub reaction_type: String,
    pub created_at: DateTime<Utc>,
}

/// How a group-or-private send ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    /// Written straight to the store; the message carries its id.
    Stored,
    /// Accepted by the batch queue; persisted on the next flush.
    Queued,
    /// The queue stayed saturated after a forced flush. Nothing was kept.
    Dropped,
}

/// Result of a reaction apply call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionOutcome {
    Added,
    Updated,
    Removed,
    Unchanged,
}

/// The other side of a chat-list row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ChatPeer {
    User(UserId),
    Group(GroupId),
}

impl ChatPeer {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Group(_) => "group",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::User(id) | Self::Group(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatListEntry {
    pub owner_id: UserId,
    pub peer: ChatPeer,
    pub last_message_preview: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_type_discriminator() {
        let msg = Message {
            id: 7,
            sender_id: 1,
            target: MessageTarget::Group { group_id: 42 },
            content: "hi".into(),
            created_at: DateTime::from_timestamp_millis(0).unwrap(),
            is_recalled: false,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["message_type"], "GROUP");
        assert_eq!(json["group_id"], 42);
        assert!(json.get("chat_id").is_none());

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn draft_parses_private_target() {
        let draft: MessageDraft =
            serde_json::from_str(r#"{"message_type":"PRIVATE","chat_id":5,"content":"yo"}"#).unwrap();
        assert_eq!(draft.target, MessageTarget::Private { chat_id: 5 });
        assert_eq!(draft.target.message_type(), MessageType::Private);
    }
}
