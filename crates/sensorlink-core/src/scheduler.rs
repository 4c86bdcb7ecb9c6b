//! Auto-read scheduler
//!
//! Polls the sensor slave on a fixed period. Each cycle reads the ultrasonic
//! sensor at the tick and the TCRT sensor one stagger later, so the two
//! response windows never share the link.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::comm_log::CommunicationLog;
use crate::config::MasterConfig;
use crate::event::{emit, EventSender, MasterEvent};
use crate::protocol::ProtocolError;
use crate::sensor::SensorController;

/// Auto-read state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoReadState {
    #[default]
    Idle,
    Enabled,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives periodic sensor reads on a background task
pub struct PollingScheduler {
    period: Duration,
    stagger: Duration,
    log: CommunicationLog,
    events: EventSender,
    task: Option<PollTask>,
    /// Set by the task when it stopped on a dead link
    link_failed: Arc<AtomicBool>,
}

impl PollingScheduler {
    pub fn new(
        period: Duration,
        stagger: Duration,
        log: CommunicationLog,
        events: EventSender,
    ) -> Self {
        Self {
            period,
            stagger,
            log,
            events,
            task: None,
            link_failed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &MasterConfig, log: CommunicationLog, events: EventSender) -> Self {
        Self::new(config.auto_read_period(), config.tcrt_stagger(), log, events)
    }

    /// Current state. A task that stopped on its own (transport fault) reads as Idle.
    pub fn state(&self) -> AutoReadState {
        match &self.task {
            Some(task) if !task.handle.is_finished() => AutoReadState::Enabled,
            _ => AutoReadState::Idle,
        }
    }

    /// Whether auto-read stopped because the link failed. The link has
    /// already been closed when this reads true.
    pub fn link_failed(&self) -> bool {
        self.link_failed.load(Ordering::Acquire)
    }

    /// Read and reset the link failure flag
    pub fn take_link_failure(&self) -> bool {
        self.link_failed.swap(false, Ordering::AcqRel)
    }

    /// Start auto-read.
    ///
    /// `sensors` is `None` while disconnected, in which case the request is
    /// rejected and the scheduler stays idle. Must be called from within a
    /// Tokio runtime.
    pub fn enable(&mut self, sensors: Option<SensorController>) -> Result<(), ProtocolError> {
        let Some(sensors) = sensors else {
            self.log.error("Connect first before enabling auto read");
            return Err(ProtocolError::NotConnected);
        };

        if self.state() == AutoReadState::Enabled {
            return Ok(());
        }

        self.link_failed.store(false, Ordering::Release);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_polling(
            sensors,
            self.period,
            self.stagger,
            cancel.clone(),
            self.log.clone(),
            self.events.clone(),
            Arc::clone(&self.link_failed),
        ));
        self.task = Some(PollTask { cancel, handle });

        self.log.info(format!(
            "Auto read enabled ({}ms interval)",
            self.period.as_millis()
        ));
        emit(&self.events, MasterEvent::AutoReadChanged(AutoReadState::Enabled));
        Ok(())
    }

    /// Stop auto-read and wait for the task to wind down.
    ///
    /// A read already on the wire is allowed to finish; the delayed TCRT read
    /// of the current cycle is dropped if it has not started. Returns whether
    /// auto-read was running.
    pub async fn disable(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        let was_running = !task.handle.is_finished();

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            if e.is_panic() {
                tracing::error!("auto read task panicked: {}", e);
            }
        }

        if was_running {
            self.log.info("Auto read disabled");
            emit(&self.events, MasterEvent::AutoReadChanged(AutoReadState::Idle));
        }
        was_running
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel.cancel();
        }
    }
}

async fn run_polling(
    sensors: SensorController,
    period: Duration,
    stagger: Duration,
    cancel: CancellationToken,
    log: CommunicationLog,
    events: EventSender,
    link_failed: Arc<AtomicBool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let fault = loop {
        let tick = tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            tick = ticker.tick() => tick,
        };

        match sensors.read_distance().await {
            Err(e) if e.is_transport_fault() => break Some(e),
            _ => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            _ = sleep_until(tick + stagger) => {}
        }

        match sensors.read_presence().await {
            Err(e) if e.is_transport_fault() => break Some(e),
            _ => {}
        }
    };

    // Other failures were already logged by the executor and only cost one reading
    if let Some(err) = fault {
        sensors.close_link().await;
        link_failed.store(true, Ordering::Release);
        log.error("Auto read stopped: link failure");
        emit(&events, MasterEvent::TransportFault(err.to_string()));
        emit(&events, MasterEvent::AutoReadChanged(AutoReadState::Idle));
    }
    tracing::debug!("auto read task finished");
}
