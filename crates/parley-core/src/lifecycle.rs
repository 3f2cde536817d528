use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use parley_types::events::GatewayEvent;
use parley_types::models::{
    ChatListEntry, ChatPeer, GroupId, Message, MessageDraft, MessageId, MessageTarget,
    PendingMessage, SendStatus, UserId,
};

use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::delivery::{BroadcastPort, broadcast_to_group, deliver_private};
use crate::error::{MessagingError, Result};
use crate::flush::FlushCoordinator;
use crate::store::{ChatListStore, GroupDirectory, MessageStore};

/// Upper bound on message payload size.
pub const MAX_CONTENT_BYTES: usize = 16 * 1024;

/// Chat-list previews are cut to this many characters.
const PREVIEW_CHARS: usize = 64;

const MAX_PAGE: u32 = 200;

/// Outcome of [`MessageService::send`].
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub status: SendStatus,
    /// The persisted message, once it has an id. `None` for queued or
    /// dropped group messages.
    pub message: Option<Message>,
    /// The stamped message as it was handed to storage.
    pub pending: PendingMessage,
}

/// Send and recall. A message is SENT when created and can move to RECALLED
/// once; there is no way back.
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    groups: Arc<dyn GroupDirectory>,
    chat_list: Arc<dyn ChatListStore>,
    port: Arc<dyn BroadcastPort>,
    pipeline: Arc<FlushCoordinator>,
    clock: Arc<dyn Clock>,
    recall_window: Duration,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        groups: Arc<dyn GroupDirectory>,
        chat_list: Arc<dyn ChatListStore>,
        port: Arc<dyn BroadcastPort>,
        pipeline: Arc<FlushCoordinator>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            groups,
            chat_list,
            port,
            pipeline,
            clock: Arc::new(SystemClock),
            recall_window: config.recall_window,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pipeline(&self) -> &Arc<FlushCoordinator> {
        &self.pipeline
    }

    /// Stamp a draft and route it. Private messages are written directly;
    /// group messages go through the batch queue.
    pub fn send(&self, sender_id: UserId, draft: MessageDraft) -> Result<SendReceipt> {
        validate_draft(sender_id, &draft)?;

        let pending = PendingMessage {
            sender_id,
            target: draft.target,
            content: draft.content,
            created_at: self.clock.now(),
        };

        match pending.target {
            MessageTarget::Private { chat_id } => self.send_private(pending, chat_id),
            MessageTarget::Group { group_id } => self.send_group(pending, group_id),
        }
    }

    fn send_private(&self, pending: PendingMessage, peer_id: UserId) -> Result<SendReceipt> {
        let message = self.store.insert(&pending)?.ok_or_else(|| {
            MessagingError::Validation("message insert affected no rows".into())
        })?;

        let participants = private_participants(message.sender_id, peer_id);
        deliver_private(self.port.as_ref(), &GatewayEvent::created(&message), &participants);

        let preview = preview(&message.content);
        self.touch_chat_list(message.sender_id, peer_id, ChatPeer::User(peer_id), &preview, message.created_at);
        if peer_id != message.sender_id {
            self.touch_chat_list(peer_id, message.sender_id, ChatPeer::User(message.sender_id), &preview, message.created_at);
        }

        Ok(SendReceipt {
            status: SendStatus::Stored,
            message: Some(message),
            pending,
        })
    }

    fn send_group(&self, pending: PendingMessage, group_id: GroupId) -> Result<SendReceipt> {
        let members = self.groups.member_ids(group_id)?;
        if members.is_empty() {
            return Err(MessagingError::NotFound { what: "group", id: group_id });
        }
        if !members.contains(&pending.sender_id) {
            return Err(MessagingError::Permission {
                user_id: pending.sender_id,
                action: "post to this group",
            });
        }

        let outcome = self.pipeline.submit(pending.clone());
        if !outcome.is_queued() {
            return Ok(SendReceipt {
                status: SendStatus::Dropped,
                message: None,
                pending,
            });
        }

        broadcast_to_group(self.port.as_ref(), &GatewayEvent::queued(&pending), group_id, &members);

        let preview = preview(&pending.content);
        for &member in &members {
            self.touch_chat_list(member, pending.sender_id, ChatPeer::Group(group_id), &preview, pending.created_at);
        }

        Ok(SendReceipt {
            status: SendStatus::Queued,
            message: None,
            pending,
        })
    }

    /// Chat-list rows are a downstream side effect; failing to update one
    /// does not undo the send.
    fn touch_chat_list(
        &self,
        owner_id: UserId,
        sender_id: UserId,
        peer: ChatPeer,
        preview: &str,
        at: DateTime<Utc>,
    ) {
        let bump_unread = owner_id != sender_id;
        if let Err(e) = self.chat_list.record_message(owner_id, peer, preview, at, bump_unread) {
            warn!(owner_id, peer = peer.id(), "Chat list update failed: {}", e);
        }
    }

    /// Retract a message. Only the sender may recall, only once, and only
    /// within the recall window (the boundary itself is still allowed).
    pub fn recall(&self, requester_id: UserId, message_id: MessageId) -> Result<Message> {
        let mut message = self
            .store
            .find_by_id(message_id)?
            .ok_or_else(|| MessagingError::message_not_found(message_id))?;

        if message.sender_id != requester_id {
            return Err(MessagingError::Permission {
                user_id: requester_id,
                action: "recall this message",
            });
        }

        if message.is_recalled {
            return Err(MessagingError::AlreadyRecalled(message_id));
        }

        // Negative elapsed (clock stepped back) counts as inside the window.
        let elapsed_ms = (self.clock.now() - message.created_at).num_milliseconds();
        let window_ms = self.recall_window.as_millis() as i64;
        if elapsed_ms > window_ms {
            return Err(MessagingError::WindowExpired {
                message_id,
                elapsed_ms,
                window_ms,
            });
        }

        // Zero rows means another request recalled it first.
        if self.store.mark_recalled(message_id)? == 0 {
            return Err(MessagingError::AlreadyRecalled(message_id));
        }
        message.is_recalled = true;

        info!(message_id, sender_id = requester_id, "Message recalled after {} ms", elapsed_ms);
        self.announce_recall(&message);

        Ok(message)
    }

    fn announce_recall(&self, message: &Message) {
        self.announce(message, &GatewayEvent::recalled(message));
    }

    /// Push an event about `message` to everyone in its conversation.
    /// Best-effort: lookup and delivery failures are only logged.
    pub fn announce(&self, message: &Message, event: &GatewayEvent) {
        match message.target {
            MessageTarget::Private { chat_id } => {
                deliver_private(
                    self.port.as_ref(),
                    event,
                    &private_participants(message.sender_id, chat_id),
                );
            }
            MessageTarget::Group { group_id } => match self.groups.member_ids(group_id) {
                Ok(members) => {
                    broadcast_to_group(self.port.as_ref(), event, group_id, &members);
                }
                Err(e) => warn!(group_id, event = event.kind(), "Could not load members to announce: {}", e),
            },
        }
    }

    /// Fetch one message as seen by `viewer_id`. Recalled content is blanked.
    pub fn get(&self, viewer_id: UserId, message_id: MessageId) -> Result<Message> {
        let message = self
            .store
            .find_by_id(message_id)?
            .ok_or_else(|| MessagingError::message_not_found(message_id))?;

        self.ensure_can_read(viewer_id, &message)?;
        Ok(redact(message))
    }

    /// Newest-first page of a conversation.
    pub fn history(
        &self,
        viewer_id: UserId,
        target: MessageTarget,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Message>> {
        if let MessageTarget::Group { group_id } = target {
            if !self.groups.member_ids(group_id)?.contains(&viewer_id) {
                return Err(MessagingError::Permission {
                    user_id: viewer_id,
                    action: "read this group",
                });
            }
        }

        let rows = self
            .store
            .list_for_target(viewer_id, target, before, limit.clamp(1, MAX_PAGE))?;
        Ok(rows.into_iter().map(redact).collect())
    }

    fn ensure_can_read(&self, viewer_id: UserId, message: &Message) -> Result<()> {
        let allowed = match message.target {
            MessageTarget::Private { chat_id } => viewer_id == message.sender_id || viewer_id == chat_id,
            MessageTarget::Group { group_id } => self.groups.member_ids(group_id)?.contains(&viewer_id),
        };

        if allowed {
            Ok(())
        } else {
            Err(MessagingError::Permission {
                user_id: viewer_id,
                action: "read this message",
            })
        }
    }

    pub fn chat_list(&self, owner_id: UserId) -> Result<Vec<ChatListEntry>> {
        Ok(self.chat_list.entries_for(owner_id)?)
    }

    pub fn mark_read(&self, owner_id: UserId, peer: ChatPeer) -> Result<()> {
        Ok(self.chat_list.mark_read(owner_id, peer)?)
    }
}

fn validate_draft(sender_id: UserId, draft: &MessageDraft) -> Result<()> {
    if sender_id <= 0 {
        return Err(MessagingError::Validation(format!("invalid sender id {}", sender_id)));
    }
    if draft.target.target_id() <= 0 {
        return Err(MessagingError::Validation(format!(
            "invalid {} target id {}",
            draft.target.message_type(),
            draft.target.target_id()
        )));
    }
    if draft.content.is_empty() {
        return Err(MessagingError::Validation("message content is empty".into()));
    }
    if draft.content.len() > MAX_CONTENT_BYTES {
        return Err(MessagingError::Validation(format!(
            "message content exceeds {} bytes",
            MAX_CONTENT_BYTES
        )));
    }
    Ok(())
}

fn private_participants(sender_id: UserId, peer_id: UserId) -> Vec<UserId> {
    if sender_id == peer_id {
        vec![sender_id]
    } else {
        vec![peer_id, sender_id]
    }
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

fn redact(mut message: Message) -> Message {
    if message.is_recalled {
        message.content.clear();
    }
    message
}
