//! Collaborator traits for durable state.
//!
//! The core never talks to a database directly. Implementations must be
//! thread-safe (`Send + Sync`) and are called from blocking contexts.

use chrono::{DateTime, Utc};
use thiserror::Error;

use parley_types::models::{
    ChatListEntry, ChatPeer, GroupId, Message, MessageId, MessageTarget, PendingMessage, Reaction,
    ReactionOutcome, UserId,
};

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A lock guarding the backend was poisoned by a panicking holder.
    #[error("storage lock poisoned: {0}")]
    Lock(String),
}

impl StoreError {
    pub fn backend(e: impl std::fmt::Display) -> Self {
        Self::Backend(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable message rows.
pub trait MessageStore: Send + Sync {
    /// Insert one message and assign its id.
    ///
    /// Returns `Ok(None)` when the insert affected zero rows.
    fn insert(&self, message: &PendingMessage) -> StoreResult<Option<Message>>;

    /// Insert a batch, one result per input in the same order.
    ///
    /// A failure for one message must not prevent the others from being
    /// written. The default inserts one at a time.
    fn insert_many(&self, messages: &[PendingMessage]) -> Vec<StoreResult<Option<Message>>> {
        messages.iter().map(|m| self.insert(m)).collect()
    }

    fn find_by_id(&self, id: MessageId) -> StoreResult<Option<Message>>;

    /// Flag the message recalled. Returns rows affected, so 0 means the row
    /// is missing or was already recalled.
    fn mark_recalled(&self, id: MessageId) -> StoreResult<usize>;

    /// Newest-first page of a conversation, strictly older than `before`
    /// when given.
    fn list_for_target(
        &self,
        viewer_id: UserId,
        target: MessageTarget,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<Message>>;
}

/// Reaction rows keyed by `(message_id, user_id)`.
pub trait ReactionStore: Send + Sync {
    fn find_reaction(&self, message_id: MessageId, user_id: UserId) -> StoreResult<Option<Reaction>>;

    /// Set the user's reaction on a message in one atomic step: insert when
    /// absent, overwrite the type in place (same id) when present.
    ///
    /// Concurrent calls for the same `(message_id, user_id)` must not fail;
    /// the last one to commit decides the stored type.
    fn upsert_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
        reaction_type: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ReactionOutcome>;

    /// Delete the user's reaction on a message. Returns rows affected.
    fn delete_reaction(&self, message_id: MessageId, user_id: UserId) -> StoreResult<usize>;

    fn reactions_for_messages(&self, message_ids: &[MessageId]) -> StoreResult<Vec<Reaction>>;
}

/// Group membership lookup.
pub trait GroupDirectory: Send + Sync {
    /// Every member of the group. Empty when the group is unknown.
    fn member_ids(&self, group_id: GroupId) -> StoreResult<Vec<UserId>>;
}

/// Per-user conversation previews and unread counters.
pub trait ChatListStore: Send + Sync {
    /// Upsert the row for `(owner_id, peer)` with the latest preview.
    /// `bump_unread` adds one to the unread counter.
    fn record_message(
        &self,
        owner_id: UserId,
        peer: ChatPeer,
        preview: &str,
        at: DateTime<Utc>,
        bump_unread: bool,
    ) -> StoreResult<()>;

    fn mark_read(&self, owner_id: UserId, peer: ChatPeer) -> StoreResult<()>;

    fn entries_for(&self, owner_id: UserId) -> StoreResult<Vec<ChatListEntry>>;
}
