//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use parley_types::events::GatewayEvent;
use parley_types::models::{
    ChatListEntry, ChatPeer, GroupId, Message, MessageId, MessageTarget, PendingMessage, Reaction,
    ReactionOutcome, UserId,
};

use crate::clock::Clock;
use crate::delivery::{BroadcastPort, DeliveryError};
use crate::store::{
    ChatListStore, GroupDirectory, MessageStore, ReactionStore, StoreError, StoreResult,
};

pub fn pending(sender_id: UserId, content: &str) -> PendingMessage {
    PendingMessage {
        sender_id,
        target: MessageTarget::Group { group_id: 1 },
        content: content.to_string(),
        created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
    }
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    messages: Vec<Message>,
    reactions: Vec<Reaction>,
    groups: HashMap<GroupId, Vec<UserId>>,
    chat_list: HashMap<(UserId, ChatPeer), ChatListEntry>,
    fail_on: HashSet<String>,
    affect_nothing_on: HashSet<String>,
}

/// Every store trait over one mutex-guarded struct.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts of messages with this content fail with a backend error.
    pub fn fail_on(&self, content: &str) {
        self.inner.lock().unwrap().fail_on.insert(content.to_string());
    }

    /// Inserts of messages with this content report zero affected rows.
    pub fn affect_nothing_on(&self, content: &str) {
        self.inner.lock().unwrap().affect_nothing_on.insert(content.to_string());
    }

    pub fn add_group(&self, group_id: GroupId, members: &[UserId]) {
        self.inner.lock().unwrap().groups.insert(group_id, members.to_vec());
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().unwrap().messages.clone()
    }

    pub fn chat_entry(&self, owner_id: UserId, peer: ChatPeer) -> Option<ChatListEntry> {
        self.inner.lock().unwrap().chat_list.get(&(owner_id, peer)).cloned()
    }
}

impl MessageStore for MemoryStore {
    fn insert(&self, message: &PendingMessage) -> StoreResult<Option<Message>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_on.contains(&message.content) {
            return Err(StoreError::Backend("injected failure".into()));
        }
        if inner.affect_nothing_on.contains(&message.content) {
            return Ok(None);
        }
        inner.next_id += 1;
        let stored = message.clone().into_message(inner.next_id);
        inner.messages.push(stored.clone());
        Ok(Some(stored))
    }

    fn find_by_id(&self, id: MessageId) -> StoreResult<Option<Message>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    fn mark_recalled(&self, id: MessageId) -> StoreResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        match inner.messages.iter_mut().find(|m| m.id == id && !m.is_recalled) {
            Some(m) => {
                m.is_recalled = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn list_for_target(
        &self,
        viewer_id: UserId,
        target: MessageTarget,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| match (target, m.target) {
                (MessageTarget::Group { group_id }, MessageTarget::Group { group_id: g }) => group_id == g,
                (MessageTarget::Private { chat_id }, MessageTarget::Private { chat_id: c }) => {
                    (m.sender_id == viewer_id && c == chat_id) || (m.sender_id == chat_id && c == viewer_id)
                }
                _ => false,
            })
            .filter(|m| before.is_none_or(|b| m.created_at < b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

impl ReactionStore for MemoryStore {
    fn find_reaction(&self, message_id: MessageId, user_id: UserId) -> StoreResult<Option<Reaction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reactions
            .iter()
            .find(|r| r.message_id == message_id && r.user_id == user_id)
            .cloned())
    }

    fn upsert_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
        reaction_type: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ReactionOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .reactions
            .iter_mut()
            .find(|r| r.message_id == message_id && r.user_id == user_id)
        {
            if existing.reaction_type == reaction_type {
                return Ok(ReactionOutcome::Unchanged);
            }
            existing.reaction_type = reaction_type.to_string();
            return Ok(ReactionOutcome::Updated);
        }

        inner.next_id += 1;
        let reaction = Reaction {
            id: inner.next_id,
            message_id,
            user_id,
            reaction_type: reaction_type.to_string(),
            created_at,
        };
        inner.reactions.push(reaction);
        Ok(ReactionOutcome::Added)
    }

    fn delete_reaction(&self, message_id: MessageId, user_id: UserId) -> StoreResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.reactions.len();
        inner
            .reactions
            .retain(|r| !(r.message_id == message_id && r.user_id == user_id));
        Ok(before - inner.reactions.len())
    }

    fn reactions_for_messages(&self, message_ids: &[MessageId]) -> StoreResult<Vec<Reaction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reactions
            .iter()
            .filter(|r| message_ids.contains(&r.message_id))
            .cloned()
            .collect())
    }
}

impl GroupDirectory for MemoryStore {
    fn member_ids(&self, group_id: GroupId) -> StoreResult<Vec<UserId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.groups.get(&group_id).cloned().unwrap_or_default())
    }
}

impl ChatListStore for MemoryStore {
    fn record_message(
        &self,
        owner_id: UserId,
        peer: ChatPeer,
        preview: &str,
        at: DateTime<Utc>,
        bump_unread: bool,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .chat_list
            .entry((owner_id, peer))
            .or_insert_with(|| ChatListEntry {
                owner_id,
                peer,
                last_message_preview: String::new(),
                last_message_at: at,
                unread_count: 0,
            });
        entry.last_message_preview = preview.to_string();
        entry.last_message_at = at;
        if bump_unread {
            entry.unread_count += 1;
        }
        Ok(())
    }

    fn mark_read(&self, owner_id: UserId, peer: ChatPeer) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.chat_list.get_mut(&(owner_id, peer)) {
            entry.unread_count = 0;
        }
        Ok(())
    }

    fn entries_for(&self, owner_id: UserId) -> StoreResult<Vec<ChatListEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chat_list
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at_millis(ms: i64) -> Self {
        Self {
            now: Mutex::new(DateTime::from_timestamp_millis(ms).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Records every delivery; selected users can be made to fail.
#[derive(Default)]
pub struct RecordingPort {
    delivered: Mutex<Vec<(UserId, GatewayEvent)>>,
    offline: Mutex<HashSet<UserId>>,
    closed: Mutex<HashSet<UserId>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, user_id: UserId) {
        self.offline.lock().unwrap().insert(user_id);
    }

    pub fn set_closed(&self, user_id: UserId) {
        self.closed.lock().unwrap().insert(user_id);
    }

    pub fn events(&self) -> Vec<(UserId, GatewayEvent)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<UserId> {
        self.events().into_iter().map(|(user, _)| user).collect()
    }
}

impl BroadcastPort for RecordingPort {
    fn deliver(&self, event: &GatewayEvent, recipient: UserId) -> Result<(), DeliveryError> {
        if self.offline.lock().unwrap().contains(&recipient) {
            return Err(DeliveryError::Offline(recipient));
        }
        if self.closed.lock().unwrap().contains(&recipient) {
            return Err(DeliveryError::Closed(recipient));
        }
        self.delivered.lock().unwrap().push((recipient, event.clone()));
        Ok(())
    }
}
