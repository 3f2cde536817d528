//! Parley core: the message batching pipeline, the send/recall lifecycle
//! and reaction upserts.
//!
//! ```text
//! send() --private--> MessageStore::insert ---------------> BroadcastPort
//!        --group----> FlushCoordinator::submit
//!                        BatchQueue (bounded, FIFO)
//!                          | threshold / timer / forced
//!                        flush() --insert_many--> MessageStore
//! ```
//!
//! Storage, group membership, chat-list previews and live delivery are
//! collaborator traits; see [`store`] and [`delivery`].

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod flush;
pub mod lifecycle;
pub mod queue;
pub mod reactions;
pub mod store;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use config::PipelineConfig;
pub use delivery::{BroadcastPort, DeliveryError, broadcast_to_group, deliver_private};
pub use error::{MessagingError, Result};
pub use flush::{EnqueueOutcome, FlushCoordinator, FlushStats};
pub use lifecycle::{MessageService, SendReceipt};
pub use queue::BatchQueue;
pub use reactions::{ReactionAction, ReactionRegistry, reaction_event};
pub use store::{ChatListStore, GroupDirectory, MessageStore, ReactionStore, StoreError};
pub use timer::FlushTimer;
