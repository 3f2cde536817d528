use thiserror::Error;
use tracing::{debug, warn};

use parley_types::events::GatewayEvent;
use parley_types::models::{GroupId, UserId};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("user {0} is not connected")]
    Offline(UserId),

    #[error("connection for user {0} is closed")]
    Closed(UserId),
}

/// Pushes events to live connections. Fire-and-forget: offline users are
/// not queued for later.
pub trait BroadcastPort: Send + Sync {
    fn deliver(&self, event: &GatewayEvent, recipient: UserId) -> Result<(), DeliveryError>;
}

/// Forward `event` to every member of a group.
///
/// Per-member failures are logged and swallowed. Returns the number of
/// members that received it.
pub fn broadcast_to_group(
    port: &dyn BroadcastPort,
    event: &GatewayEvent,
    group_id: GroupId,
    member_ids: &[UserId],
) -> usize {
    if member_ids.is_empty() {
        warn!(group_id, event = event.kind(), "Group has no members, nothing to broadcast");
        return 0;
    }

    let delivered = fan_out(port, event, member_ids);
    debug!(
        group_id,
        event = event.kind(),
        "Delivered to {}/{} members",
        delivered,
        member_ids.len()
    );
    delivered
}

/// Forward `event` to the participants of a private chat.
pub fn deliver_private(port: &dyn BroadcastPort, event: &GatewayEvent, recipients: &[UserId]) -> usize {
    fan_out(port, event, recipients)
}

fn fan_out(port: &dyn BroadcastPort, event: &GatewayEvent, recipients: &[UserId]) -> usize {
    let mut delivered = 0;
    for &recipient in recipients {
        match port.deliver(event, recipient) {
            Ok(()) => delivered += 1,
            Err(DeliveryError::Offline(_)) => {
                debug!(recipient, event = event.kind(), "Recipient offline, skipping");
            }
            Err(e) => {
                warn!(recipient, event = event.kind(), "Delivery failed: {}", e);
            }
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPort;

    fn event() -> GatewayEvent {
        GatewayEvent::PresenceUpdate {
            user_id: 1,
            online: true,
        }
    }

    #[test]
    fn failures_do_not_stop_fan_out() {
        let port = RecordingPort::new();
        port.set_offline(2);
        port.set_closed(3);

        let delivered = broadcast_to_group(&port, &event(), 10, &[1, 2, 3, 4]);
        assert_eq!(delivered, 2);
        assert_eq!(port.recipients(), vec![1, 4]);
    }

    #[test]
    fn empty_group_is_noop() {
        let port = RecordingPort::new();
        assert_eq!(broadcast_to_group(&port, &event(), 10, &[]), 0);
        assert!(port.recipients().is_empty());
    }
}
