//! Sensor slave reads
//!
//! Ultrasonic distance and TCRT5000 presence, plus the last values that were
//! read without error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::event::{emit, EventSender, MasterEvent};
use crate::protocol::{Command, ProtocolError, RequestExecutor};

/// TCRT5000 proximity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Detected,
    NotDetected,
}

impl Presence {
    /// 0x01 means an object is in front of the sensor, anything else means none
    pub fn from_value(value: u8) -> Self {
        if value == 0x01 {
            Presence::Detected
        } else {
            Presence::NotDetected
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Detected => write!(f, "DETECTED"),
            Presence::NotDetected => write!(f, "NO OBJECT"),
        }
    }
}

/// A decoded sensor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reading {
    /// Ultrasonic distance in centimetres
    Distance(u8),
    Presence(Presence),
}

/// Last successfully read sensor values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readings {
    pub distance_cm: Option<u8>,
    pub presence: Option<Presence>,
}

impl Readings {
    fn apply(&mut self, reading: Reading) {
        match reading {
            Reading::Distance(cm) => self.distance_cm = Some(cm),
            Reading::Presence(p) => self.presence = Some(p),
        }
    }
}

/// Reads the sensor slave. Clones share the same readings and executor.
#[derive(Clone)]
pub struct SensorController {
    executor: Arc<RequestExecutor>,
    readings: Arc<Mutex<Readings>>,
    events: EventSender,
}

impl SensorController {
    pub fn new(
        executor: Arc<RequestExecutor>,
        readings: Arc<Mutex<Readings>>,
        events: EventSender,
    ) -> Self {
        Self {
            executor,
            readings,
            events,
        }
    }

    fn readings_guard(&self) -> MutexGuard<'_, Readings> {
        self.readings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Last successfully read values
    pub fn readings(&self) -> Readings {
        *self.readings_guard()
    }

    /// Query the ultrasonic sensor, returning centimetres
    pub async fn read_distance(&self) -> Result<u8, ProtocolError> {
        let value = self.executor.execute(Command::Ultrasonic).await?;
        self.publish(Reading::Distance(value));
        Ok(value)
    }

    /// Query the TCRT5000 proximity sensor
    pub async fn read_presence(&self) -> Result<Presence, ProtocolError> {
        let value = self.executor.execute(Command::Tcrt).await?;
        let presence = Presence::from_value(value);
        self.publish(Reading::Presence(presence));
        Ok(presence)
    }

    /// Release the link this controller reads through
    pub(crate) async fn close_link(&self) {
        self.executor.close().await;
    }

    fn publish(&self, reading: Reading) {
        self.readings_guard().apply(reading);
        emit(&self.events, MasterEvent::ReadingUpdated(reading));
    }
}
