//! Database row types. These map directly to SQLite rows and are converted
//! into `parley-types` records at the crate boundary.
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};

use parley_types::models::{ChatListEntry, ChatPeer, Message, MessageTarget, Reaction};

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub message_type: String,
    pub chat_id: Option<i64>,
    pub group_id: Option<i64>,
    pub content: String,
    pub created_at: i64,
    pub is_recalled: bool,
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        let target = match (self.message_type.as_str(), self.chat_id, self.group_id) {
            ("PRIVATE", Some(chat_id), _) => MessageTarget::Private { chat_id },
            ("GROUP", _, Some(group_id)) => MessageTarget::Group { group_id },
            (kind, _, _) => bail!("Corrupt target on message {}: type {:?}", self.id, kind),
        };

        Ok(Message {
            id: self.id,
            sender_id: self.sender_id,
            target,
            content: self.content,
            created_at: from_millis(self.created_at)?,
            is_recalled: self.is_recalled,
        })
    }
}

pub struct ReactionRow {
    pub id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub reaction_type: String,
    pub created_at: i64,
}

impl ReactionRow {
    pub fn into_reaction(self) -> Result<Reaction> {
        Ok(Reaction {
            id: self.id,
            message_id: self.message_id,
            user_id: self.user_id,
            reaction_type: self.reaction_type,
            created_at: from_millis(self.created_at)?,
        })
    }
}

pub struct ChatListRow {
    pub owner_id: i64,
    pub peer_kind: String,
    pub peer_id: i64,
    pub last_message_preview: String,
    pub last_message_at: i64,
    pub unread_count: i64,
}

impl ChatListRow {
    pub fn into_entry(self) -> Result<ChatListEntry> {
        let peer = match self.peer_kind.as_str() {
            "user" => ChatPeer::User(self.peer_id),
            "group" => ChatPeer::Group(self.peer_id),
            other => bail!("Corrupt peer kind {:?} in chat list of {}", other, self.owner_id),
        };

        Ok(ChatListEntry {
            owner_id: self.owner_id,
            peer,
            last_message_preview: self.last_message_preview,
            last_message_at: from_millis(self.last_message_at)?,
            unread_count: u32::try_from(self.unread_count.max(0)).unwrap_or(u32::MAX),
        })
    }
}

pub fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("Timestamp out of range: {}", ms))
}
