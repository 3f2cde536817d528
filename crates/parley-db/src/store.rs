use chrono::{DateTime, Utc};

use parley_core::store::{
    ChatListStore, GroupDirectory, MessageStore, ReactionStore, StoreError, StoreResult,
};
use parley_types::models::{
    ChatListEntry, ChatPeer, GroupId, Message, MessageId, MessageTarget, PendingMessage, Reaction,
    ReactionOutcome, UserId,
};

use crate::Database;

fn backend(e: anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{:#}", e))
}

impl MessageStore for Database {
    fn insert(&self, message: &PendingMessage) -> StoreResult<Option<Message>> {
        self.insert_message(message).map_err(backend)
    }

    fn insert_many(&self, messages: &[PendingMessage]) -> Vec<StoreResult<Option<Message>>> {
        match self.insert_messages(messages) {
            Ok(results) => results.into_iter().map(|r| r.map_err(backend)).collect(),
            // The whole transaction failed: nothing from this batch was kept.
            Err(e) => {
                let reason = format!("{:#}", e);
                messages
                    .iter()
                    .map(|_| Err(StoreError::Backend(reason.clone())))
                    .collect()
            }
        }
    }

    fn find_by_id(&self, id: MessageId) -> StoreResult<Option<Message>> {
        self.get_message(id).map_err(backend)
    }

    fn mark_recalled(&self, id: MessageId) -> StoreResult<usize> {
        self.mark_message_recalled(id).map_err(backend)
    }

    fn list_for_target(
        &self,
        viewer_id: UserId,
        target: MessageTarget,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> StoreResult<Vec<Message>> {
        self.get_messages(viewer_id, target, before, limit).map_err(backend)
    }
}

impl ReactionStore for Database {
    fn find_reaction(&self, message_id: MessageId, user_id: UserId) -> StoreResult<Option<Reaction>> {
        self.get_reaction(message_id, user_id).map_err(backend)
    }

    fn upsert_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
        reaction_type: &str,
        created_at: DateTime<Utc>,
    ) -> StoreResult<ReactionOutcome> {
        Database::upsert_reaction(self, message_id, user_id, reaction_type, created_at).map_err(backend)
    }

    fn delete_reaction(&self, message_id: MessageId, user_id: UserId) -> StoreResult<usize> {
        Database::delete_reaction(self, message_id, user_id).map_err(backend)
    }

    fn reactions_for_messages(&self, message_ids: &[MessageId]) -> StoreResult<Vec<Reaction>> {
        self.get_reactions_for_messages(message_ids).map_err(backend)
    }
}

impl GroupDirectory for Database {
    fn member_ids(&self, group_id: GroupId) -> StoreResult<Vec<UserId>> {
        self.get_group_member_ids(group_id).map_err(backend)
    }
}

impl ChatListStore for Database {
    fn record_message(
        &self,
        owner_id: UserId,
        peer: ChatPeer,
        preview: &str,
        at: DateTime<Utc>,
        bump_unread: bool,
    ) -> StoreResult<()> {
        self.upsert_chat_entry(owner_id, peer, preview, at, bump_unread)
            .map_err(backend)
    }

    fn mark_read(&self, owner_id: UserId, peer: ChatPeer) -> StoreResult<()> {
        self.reset_unread(owner_id, peer).map_err(backend)
    }

    fn entries_for(&self, owner_id: UserId) -> StoreResult<Vec<ChatListEntry>> {
        self.get_chat_list(owner_id).map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use parley_core::{
        BatchQueue, FlushCoordinator, MessageService, PipelineConfig, ReactionRegistry,
    };
    use parley_core::delivery::{BroadcastPort, DeliveryError};
    use parley_types::events::GatewayEvent;
    use parley_types::models::{MessageDraft, SendStatus};

    use super::*;

    struct NullPort;

    impl BroadcastPort for NullPort {
        fn deliver(&self, _event: &GatewayEvent, recipient: UserId) -> Result<(), DeliveryError> {
            Err(DeliveryError::Offline(recipient))
        }
    }

    fn service(db: &Arc<Database>, config: &PipelineConfig) -> MessageService {
        let pipeline = Arc::new(FlushCoordinator::new(
            Arc::new(BatchQueue::new(config.queue_capacity)),
            db.clone(),
            config.flush_threshold,
        ));
        MessageService::new(db.clone(), db.clone(), db.clone(), Arc::new(NullPort), pipeline, config)
    }

    #[test]
    fn group_messages_reach_sqlite_on_threshold() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for user in [1, 2, 3] {
            db.add_group_member(10, user).unwrap();
        }

        let config = PipelineConfig {
            flush_threshold: 5,
            ..PipelineConfig::default()
        };
        let service = service(&db, &config);

        for i in 0..5 {
            let receipt = service
                .send(
                    1,
                    MessageDraft {
                        target: MessageTarget::Group { group_id: 10 },
                        content: format!("batch {i}"),
                    },
                )
                .unwrap();
            assert_eq!(receipt.status, SendStatus::Queued);
        }

        let page = db.get_messages(2, MessageTarget::Group { group_id: 10 }, None, 50).unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].content, "batch 4");
        assert_eq!(service.pipeline().stats().persisted, 5);
    }

    #[test]
    fn recall_and_react_against_sqlite() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = service(&db, &PipelineConfig::default());

        let sent = service
            .send(
                1,
                MessageDraft {
                    target: MessageTarget::Private { chat_id: 2 },
                    content: "hello".into(),
                },
            )
            .unwrap()
            .message
            .unwrap();

        let registry = ReactionRegistry::new(db.clone(), db.clone());
        assert_eq!(registry.apply(sent.id, 2, "add", "like").unwrap(), ReactionOutcome::Added);
        assert_eq!(registry.apply(sent.id, 2, "add", "love").unwrap(), ReactionOutcome::Updated);
        let rows = db.get_reactions_for_messages(&[sent.id]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reaction_type, "love");

        let recalled = service.recall(1, sent.id).unwrap();
        assert!(recalled.is_recalled);
        assert!(db.get_message(sent.id).unwrap().unwrap().is_recalled);

        assert_eq!(db.get_chat_list(2).unwrap()[0].unread_count, 1);
    }

    #[test]
    fn racing_adds_by_one_user_both_succeed() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let message = db
            .insert_message(&PendingMessage {
                sender_id: 1,
                target: MessageTarget::Group { group_id: 3 },
                content: "vote".into(),
                created_at: DateTime::from_timestamp_millis(1_000).unwrap(),
            })
            .unwrap()
            .unwrap();
        let registry = ReactionRegistry::new(db.clone(), db.clone());

        for user_id in 2..202 {
            let barrier = Barrier::new(2);
            let outcomes: Vec<ReactionOutcome> = std::thread::scope(|s| {
                let handles: Vec<_> = ["like", "love"]
                    .into_iter()
                    .map(|kind| {
                        let (registry, barrier) = (&registry, &barrier);
                        s.spawn(move || {
                            barrier.wait();
                            registry.apply(message.id, user_id, "add", kind)
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().unwrap().unwrap())
                    .collect()
            });

            assert!(outcomes.contains(&ReactionOutcome::Added), "user {user_id}: {outcomes:?}");
            assert!(outcomes.contains(&ReactionOutcome::Updated), "user {user_id}: {outcomes:?}");

            let stored = db.get_reaction(message.id, user_id).unwrap().unwrap();
            assert!(["like", "love"].contains(&stored.reaction_type.as_str()));
        }

        assert_eq!(db.get_reactions_for_messages(&[message.id]).unwrap().len(), 200);
    }
}
