//! Actuator relay control

use std::sync::{Arc, Mutex, MutexGuard};

use crate::event::{emit, EventSender, MasterEvent};
use crate::protocol::{Command, ProtocolError, RelayState, RequestExecutor};

/// Switches the actuator relay and tracks what the actuator last reported
pub struct RelayController {
    executor: Arc<RequestExecutor>,
    state: Arc<Mutex<RelayState>>,
    events: EventSender,
}

impl RelayController {
    pub fn new(
        executor: Arc<RequestExecutor>,
        state: Arc<Mutex<RelayState>>,
        events: EventSender,
    ) -> Self {
        Self {
            executor,
            state,
            events,
        }
    }

    fn state_guard(&self) -> MutexGuard<'_, RelayState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Relay state as last confirmed by the actuator
    pub fn state(&self) -> RelayState {
        *self.state_guard()
    }

    /// Ask the actuator to switch the relay.
    ///
    /// The tracked state follows the value the actuator answers with, which
    /// is not necessarily the state requested. Any failure leaves it alone.
    pub async fn set_relay(&self, requested: RelayState) -> Result<RelayState, ProtocolError> {
        let value = self.executor.execute(Command::Relay(requested)).await?;

        let reported = RelayState::from_value(value);
        if reported != requested {
            tracing::warn!("relay asked for {} but reported {}", requested, reported);
        }

        let changed = {
            let mut state = self.state_guard();
            let changed = *state != reported;
            *state = reported;
            changed
        };
        if changed {
            emit(&self.events, MasterEvent::RelayChanged(reported));
        }
        Ok(reported)
    }
}
