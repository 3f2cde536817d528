use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use parley_core::delivery::{BroadcastPort, DeliveryError};
use parley_types::events::GatewayEvent;
use parley_types::models::UserId;

type Session = (Uuid, mpsc::UnboundedSender<GatewayEvent>);

/// Registry of live gateway connections. A user may hold several sessions
/// (one per device); an event for the user goes to all of them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> sessions
    sessions: RwLock<HashMap<UserId, Vec<Session>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // The map only holds channel senders, so a poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, Vec<Session>>> {
        self.inner.sessions.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, Vec<Session>>> {
        self.inner.sessions.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Register a session. Returns (conn_id, receiver). Announces presence
    /// to everyone online when this is the user's first session.
    pub fn register(&self, user_id: UserId) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let first = {
            let mut sessions = self.write();
            let entry = sessions.entry(user_id).or_default();
            entry.push((conn_id, tx));
            entry.len() == 1
        };

        if first {
            self.broadcast(&GatewayEvent::PresenceUpdate { user_id, online: true });
        }
        (conn_id, rx)
    }

    /// Drop one session. Announces the user offline when it was the last.
    pub fn unregister(&self, user_id: UserId, conn_id: Uuid) {
        let went_offline = {
            let mut sessions = self.write();
            match sessions.get_mut(&user_id) {
                Some(list) => {
                    list.retain(|(id, _)| *id != conn_id);
                    if list.is_empty() {
                        sessions.remove(&user_id);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if went_offline {
            self.broadcast(&GatewayEvent::PresenceUpdate { user_id, online: false });
        }
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.read().contains_key(&user_id)
    }

    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.read().keys().copied().collect();
        users.sort_unstable();
        users
    }

    /// Send an event to every connected user.
    pub fn broadcast(&self, event: &GatewayEvent) {
        let sessions = self.read();
        for (_, tx) in sessions.values().flatten() {
            let _ = tx.send(event.clone());
        }
    }
}

impl BroadcastPort for Dispatcher {
    fn deliver(&self, event: &GatewayEvent, recipient: UserId) -> Result<(), DeliveryError> {
        let sessions = self.read();
        let Some(list) = sessions.get(&recipient) else {
            return Err(DeliveryError::Offline(recipient));
        };

        let sent = list
            .iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count();

        if sent == 0 {
            debug!(recipient, "All sessions closed for recipient");
            return Err(DeliveryError::Closed(recipient));
        }
        Ok(())
    }
}
