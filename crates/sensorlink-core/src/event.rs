//! Notifications for the presentation layer

use serde::Serialize;
use tokio::sync::broadcast;

use crate::protocol::{ConnectionState, RelayState};
use crate::scheduler::AutoReadState;
use crate::sensor::Reading;

/// Something the display should refresh for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MasterEvent {
    /// A sensor value was read successfully
    ReadingUpdated(Reading),
    /// The tracked relay state changed
    RelayChanged(RelayState),
    ConnectionChanged(ConnectionState),
    AutoReadChanged(AutoReadState),
    /// The link failed mid-exchange; the owner should disconnect
    TransportFault(String),
}

pub(crate) const EVENT_BUFFER: usize = 64;

/// Sender half shared by every component that emits events
pub type EventSender = broadcast::Sender<MasterEvent>;

/// Create a fresh event channel
pub fn channel() -> EventSender {
    broadcast::channel(EVENT_BUFFER).0
}

pub(crate) fn emit(sender: &EventSender, event: MasterEvent) {
    tracing::trace!("event {:?}", event);
    // Nobody listening is not an error
    let _ = sender.send(event);
}
