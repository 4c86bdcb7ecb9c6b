//! # SensorLink Core Library
//!
//! Master-side protocol engine for a sensor slave (address 0x24) and an
//! actuator slave (address 0x66) sharing one serial link.
//!
//! This library provides:
//! - Request framing and 3-byte response decoding
//! - A request executor that keeps one exchange on the wire at a time
//! - Relay control with tracked actuator state
//! - Staggered auto-read of the ultrasonic and TCRT5000 sensors
//! - A timestamped communication log and display notifications
//!
//! ## Example
//!
//! ```rust,ignore
//! use sensorlink_core::prelude::*;
//!
//! let mut master = Master::new(MasterConfig::default())?;
//! master.connect("/dev/ttyUSB0").await?;
//!
//! let cm = master.read_distance().await?;
//! master.set_relay(RelayState::On).await?;
//! master.enable_auto_read()?;
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod comm_log;
pub mod config;
pub mod demo;
pub mod event;
pub mod master;
pub mod protocol;
pub mod relay;
pub mod scheduler;
pub mod sensor;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::comm_log::{CommunicationLog, LogEntry, LogLevel};
    pub use crate::config::{ConfigError, MasterConfig};
    pub use crate::demo::DemoTransport;
    pub use crate::event::MasterEvent;
    pub use crate::master::Master;
    pub use crate::protocol::{
        Command, ConnectionState, ProtocolError, RelayState, RequestExecutor, ResponseFrame,
        Transport,
    };
    pub use crate::scheduler::{AutoReadState, PollingScheduler};
    pub use crate::sensor::{Presence, Reading, Readings};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
