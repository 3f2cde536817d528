use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use parley_types::events::GatewayEvent;
use parley_types::models::{MessageId, ReactionOutcome, UserId};

use crate::clock::{Clock, SystemClock};
use crate::error::{MessagingError, Result};
use crate::store::{MessageStore, ReactionStore};

const MAX_REACTION_TYPE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Add,
    Remove,
}

impl FromStr for ReactionAction {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            _ => Err(MessagingError::InvalidOperation(s.to_string())),
        }
    }
}

/// One active reaction per user per message. Adding again replaces the
/// type in place; removing something absent is a no-op.
pub struct ReactionRegistry {
    messages: Arc<dyn MessageStore>,
    reactions: Arc<dyn ReactionStore>,
    clock: Arc<dyn Clock>,
}

impl ReactionRegistry {
    pub fn new(messages: Arc<dyn MessageStore>, reactions: Arc<dyn ReactionStore>) -> Self {
        Self {
            messages,
            reactions,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn apply(
        &self,
        message_id: MessageId,
        user_id: UserId,
        action: &str,
        reaction_type: &str,
    ) -> Result<ReactionOutcome> {
        if self.messages.find_by_id(message_id)?.is_none() {
            return Err(MessagingError::message_not_found(message_id));
        }

        let outcome = match action.parse::<ReactionAction>()? {
            ReactionAction::Add => self.add(message_id, user_id, reaction_type)?,
            ReactionAction::Remove => self.remove(message_id, user_id)?,
        };

        debug!(message_id, user_id, ?outcome, "Reaction applied");
        Ok(outcome)
    }

    fn add(&self, message_id: MessageId, user_id: UserId, reaction_type: &str) -> Result<ReactionOutcome> {
        let reaction_type = reaction_type.trim();
        if reaction_type.is_empty() {
            return Err(MessagingError::Validation("reaction type is empty".into()));
        }
        if reaction_type.chars().count() > MAX_REACTION_TYPE_LEN {
            return Err(MessagingError::Validation(format!(
                "reaction type longer than {} characters",
                MAX_REACTION_TYPE_LEN
            )));
        }

        Ok(self
            .reactions
            .upsert_reaction(message_id, user_id, reaction_type, self.clock.now())?)
    }

    fn remove(&self, message_id: MessageId, user_id: UserId) -> Result<ReactionOutcome> {
        match self.reactions.delete_reaction(message_id, user_id)? {
            0 => Ok(ReactionOutcome::Unchanged),
            _ => Ok(ReactionOutcome::Removed),
        }
    }
}

/// Gateway event announcing an applied reaction, if anything changed.
pub fn reaction_event(
    outcome: ReactionOutcome,
    message_id: MessageId,
    user_id: UserId,
    reaction_type: &str,
) -> Option<GatewayEvent> {
    let reaction_type = reaction_type.trim().to_string();
    match outcome {
        ReactionOutcome::Added => Some(GatewayEvent::ReactionAdd {
            message_id,
            user_id,
            reaction_type,
        }),
        ReactionOutcome::Updated => Some(GatewayEvent::ReactionUpdate {
            message_id,
            user_id,
            reaction_type,
        }),
        ReactionOutcome::Removed => Some(GatewayEvent::ReactionRemove { message_id, user_id }),
        ReactionOutcome::Unchanged => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, pending};

    fn registry_with_message() -> (ReactionRegistry, Arc<MemoryStore>, MessageId) {
        let store = Arc::new(MemoryStore::new());
        let message = store.insert(&pending(1, "react to me")).unwrap().unwrap();
        let registry = ReactionRegistry::new(store.clone(), store.clone());
        (registry, store, message.id)
    }

    #[test]
    fn add_then_add_updates_in_place() {
        let (registry, store, id) = registry_with_message();

        assert_eq!(registry.apply(id, 5, "ADD", "like").unwrap(), ReactionOutcome::Added);
        let first = store.find_reaction(id, 5).unwrap().unwrap();

        assert_eq!(registry.apply(id, 5, "add", "love").unwrap(), ReactionOutcome::Updated);
        let rows = store.reactions_for_messages(&[id]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reaction_type, "love");
        assert_eq!(rows[0].id, first.id);
    }

    #[test]
    fn same_type_twice_is_unchanged() {
        let (registry, _store, id) = registry_with_message();
        registry.apply(id, 5, "add", "like").unwrap();
        assert_eq!(registry.apply(id, 5, "add", "like").unwrap(), ReactionOutcome::Unchanged);
    }

    #[test]
    fn remove_missing_reaction_is_noop() {
        let (registry, store, id) = registry_with_message();
        assert_eq!(registry.apply(id, 5, "remove", "").unwrap(), ReactionOutcome::Unchanged);
        assert!(store.reactions_for_messages(&[id]).unwrap().is_empty());
    }

    #[test]
    fn remove_existing_reaction() {
        let (registry, store, id) = registry_with_message();
        registry.apply(id, 5, "add", "like").unwrap();
        registry.apply(id, 6, "add", "wow").unwrap();

        assert_eq!(registry.apply(id, 5, "remove", "").unwrap(), ReactionOutcome::Removed);
        let rows = store.reactions_for_messages(&[id]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 6);
    }

    #[test]
    fn unknown_action_is_invalid() {
        let (registry, _store, id) = registry_with_message();
        let err = registry.apply(id, 5, "toggle", "like").unwrap_err();
        assert!(matches!(err, MessagingError::InvalidOperation(a) if a == "toggle"));
    }

    #[test]
    fn missing_message_is_not_found() {
        let (registry, _store, _id) = registry_with_message();
        let err = registry.apply(999, 5, "add", "like").unwrap_err();
        assert!(matches!(err, MessagingError::NotFound { id: 999, .. }));
    }

    #[test]
    fn empty_reaction_type_rejected_on_add() {
        let (registry, _store, id) = registry_with_message();
        let err = registry.apply(id, 5, "add", "  ").unwrap_err();
        assert!(matches!(err, MessagingError::Validation(_)));
    }

    #[test]
    fn events_follow_outcome() {
        assert!(matches!(
            reaction_event(ReactionOutcome::Updated, 1, 2, "love"),
            Some(GatewayEvent::ReactionUpdate { .. })
        ));
        assert!(reaction_event(ReactionOutcome::Unchanged, 1, 2, "love").is_none());
    }
}
