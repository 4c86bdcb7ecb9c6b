//! Master facade
//!
//! The single entry point a front end talks to: port enumeration,
//! connect/disconnect, manual reads, relay control, auto-read, the
//! communication log and display notifications.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::comm_log::CommunicationLog;
use crate::config::{ConfigError, MasterConfig};
use crate::event::{self, emit, EventSender, MasterEvent};
use crate::protocol::{
    list_ports, ConnectionState, ExecutorStats, ProtocolError, RelayState, Session, Transport,
};
use crate::relay::RelayController;
use crate::scheduler::{AutoReadState, PollingScheduler};
use crate::sensor::{Presence, Readings, SensorController};

/// Per-connection state, dropped on disconnect
struct ActiveSession {
    session: Session,
    sensors: SensorController,
    relay: RelayController,
}

/// Protocol master for the sensor and actuator slaves
pub struct Master {
    config: MasterConfig,
    log: CommunicationLog,
    events: EventSender,
    scheduler: PollingScheduler,
    /// Survives reconnects so the display keeps the last values
    readings: Arc<Mutex<Readings>>,
    relay_state: Arc<Mutex<RelayState>>,
    active: Option<ActiveSession>,
}

impl Master {
    /// Create a disconnected master
    pub fn new(config: MasterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let log = CommunicationLog::new(config.log_capacity);
        let events = event::channel();
        let scheduler = PollingScheduler::from_config(&config, log.clone(), events.clone());
        Ok(Self {
            config,
            log,
            events,
            scheduler,
            readings: Arc::new(Mutex::new(Readings::default())),
            relay_state: Arc::new(Mutex::new(RelayState::default())),
            active: None,
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Communication log shared with every component
    pub fn log(&self) -> &CommunicationLog {
        &self.log
    }

    /// Receive display notifications
    pub fn subscribe(&self) -> broadcast::Receiver<MasterEvent> {
        self.events.subscribe()
    }

    /// Names of the serial ports that can be passed to [`Master::connect`]
    pub fn enumerate_ports(&self) -> Vec<String> {
        let ports: Vec<String> = list_ports().into_iter().map(|p| p.name).collect();
        if ports.is_empty() {
            self.log.warn("No serial ports found");
        }
        ports
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.live().is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Port name of the open session
    pub fn port_name(&self) -> Option<&str> {
        self.live().map(|a| a.session.port_name())
    }

    /// Open `port_name` at the configured baud rate.
    ///
    /// Returns after the settle delay, once stale bytes have been discarded.
    pub async fn connect(&mut self, port_name: &str) -> Result<(), ProtocolError> {
        self.reap_link_failure();
        self.ensure_disconnected()?;
        match Session::connect(&self.config, port_name, self.log.clone()).await {
            Ok(session) => {
                self.install(session);
                Ok(())
            }
            Err(e) => {
                self.log_connect_failure(&e);
                Err(e)
            }
        }
    }

    /// Connect over an already open transport (demo mode, tests)
    pub async fn connect_with(
        &mut self,
        label: &str,
        transport: Box<dyn Transport>,
    ) -> Result<(), ProtocolError> {
        self.reap_link_failure();
        self.ensure_disconnected()?;
        match Session::with_transport(&self.config, label, transport, self.log.clone()).await {
            Ok(session) => {
                self.install(session);
                Ok(())
            }
            Err(e) => {
                self.log_connect_failure(&e);
                Err(e)
            }
        }
    }

    fn log_connect_failure(&self, err: &ProtocolError) {
        match err {
            ProtocolError::ConnectionFailed(_) => self.log.error(err.to_string()),
            other => self.log.error(format!("Connection failed: {}", other)),
        }
    }

    fn ensure_disconnected(&self) -> Result<(), ProtocolError> {
        if self.active.is_some() {
            self.log.error("Already connected");
            return Err(ProtocolError::AlreadyConnected);
        }
        Ok(())
    }

    fn install(&mut self, session: Session) {
        let executor = Arc::clone(session.executor());
        let sensors = SensorController::new(
            Arc::clone(&executor),
            Arc::clone(&self.readings),
            self.events.clone(),
        );
        let relay = RelayController::new(executor, Arc::clone(&self.relay_state), self.events.clone());
        self.log
            .info(format!("Connected to {}", session.port_name()));
        self.active = Some(ActiveSession {
            session,
            sensors,
            relay,
        });
        emit(
            &self.events,
            MasterEvent::ConnectionChanged(ConnectionState::Connected),
        );
    }

    /// Close the session. Auto-read is stopped before the port is released.
    /// Returns whether a session was open.
    pub async fn disconnect(&mut self) -> bool {
        if self.reap_link_failure() {
            return true;
        }
        let Some(active) = self.active.take() else {
            return false;
        };
        self.scheduler.disable().await;
        let ActiveSession { session, .. } = active;
        session.close().await;

        self.log.info("Disconnected");
        emit(
            &self.events,
            MasterEvent::ConnectionChanged(ConnectionState::Disconnected),
        );
        true
    }

    /// The open session, unless auto-read found its link dead
    fn live(&self) -> Option<&ActiveSession> {
        self.active
            .as_ref()
            .filter(|_| !self.scheduler.link_failed())
    }

    /// Drop a session whose link auto-read already closed after a failure.
    /// Returns whether one was dropped.
    fn reap_link_failure(&mut self) -> bool {
        if !self.scheduler.take_link_failure() {
            return false;
        }
        let Some(active) = self.active.take() else {
            return false;
        };
        tracing::info!(
            "dropping session on {} after link failure",
            active.session.port_name()
        );
        self.log.info("Disconnected");
        emit(
            &self.events,
            MasterEvent::ConnectionChanged(ConnectionState::Disconnected),
        );
        true
    }

    fn active(&mut self) -> Result<&ActiveSession, ProtocolError> {
        self.reap_link_failure();
        self.active.as_ref().ok_or_else(|| {
            self.log.error("Not connected");
            ProtocolError::NotConnected
        })
    }

    /// A failed link is not reused
    async fn check_fault<T>(&mut self, result: &Result<T, ProtocolError>) {
        if let Err(e) = result {
            if e.is_transport_fault() {
                emit(&self.events, MasterEvent::TransportFault(e.to_string()));
                self.disconnect().await;
            }
        }
    }

    /// Read the ultrasonic distance in centimetres
    pub async fn read_distance(&mut self) -> Result<u8, ProtocolError> {
        let sensors = self.active()?.sensors.clone();
        let result = sensors.read_distance().await;
        self.check_fault(&result).await;
        result
    }

    /// Read the TCRT5000 presence status
    pub async fn read_presence(&mut self) -> Result<Presence, ProtocolError> {
        let sensors = self.active()?.sensors.clone();
        let result = sensors.read_presence().await;
        self.check_fault(&result).await;
        result
    }

    /// Switch the actuator relay, returning the state it reports
    pub async fn set_relay(&mut self, state: RelayState) -> Result<RelayState, ProtocolError> {
        let result = self.active()?.relay.set_relay(state).await;
        self.check_fault(&result).await;
        result
    }

    /// Start auto-read. Rejected (and logged) while disconnected.
    pub fn enable_auto_read(&mut self) -> Result<(), ProtocolError> {
        self.reap_link_failure();
        let sensors = self.active.as_ref().map(|a| a.sensors.clone());
        self.scheduler.enable(sensors)
    }

    /// Stop auto-read. Returns whether it was running.
    pub async fn disable_auto_read(&mut self) -> bool {
        self.scheduler.disable().await
    }

    pub fn auto_read_state(&self) -> AutoReadState {
        self.scheduler.state()
    }

    /// Last successfully read sensor values
    pub fn readings(&self) -> Readings {
        *self
            .readings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Relay state as last confirmed by the actuator
    pub fn relay_state(&self) -> RelayState {
        *self
            .relay_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Traffic counters of the open session
    pub fn stats(&self) -> Option<ExecutorStats> {
        self.live().map(|a| a.session.stats())
    }
}
