//! Connection management
//!
//! A [`Session`] owns the open link for as long as the master is connected.
//! It is created by `connect` and consumed by `close`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ExecutorStats, ProtocolError, RequestExecutor, SerialTransport, Transport};
use crate::comm_log::CommunicationLog;
use crate::config::MasterConfig;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link open
    #[default]
    Disconnected,
    /// Link open and settled
    Connected,
}

/// An open link to the slaves
pub struct Session {
    /// Port name (or label for non-serial transports)
    port_name: String,
    /// Executor owning the transport
    executor: Arc<RequestExecutor>,
}

impl Session {
    /// Open `port_name` as a serial port and prepare it for requests
    pub async fn connect(
        config: &MasterConfig,
        port_name: &str,
        log: CommunicationLog,
    ) -> Result<Self, ProtocolError> {
        if port_name.trim().is_empty() {
            return Err(ProtocolError::ConnectionFailed(
                "no port selected".to_string(),
            ));
        }

        tracing::info!(
            "opening {} at {} baud (timeout {}ms)",
            port_name,
            config.baud_rate,
            config.response_timeout_ms
        );
        let transport =
            SerialTransport::open(port_name, config.baud_rate, config.response_timeout())?;
        Self::with_transport(config, port_name, Box::new(transport), log).await
    }

    /// Build a session on an already open transport.
    ///
    /// Waits the configured settle delay, then drops whatever the slaves sent
    /// while resetting.
    pub async fn with_transport(
        config: &MasterConfig,
        port_name: &str,
        mut transport: Box<dyn Transport>,
        log: CommunicationLog,
    ) -> Result<Self, ProtocolError> {
        tracing::debug!(
            "waiting {}ms for {} to settle",
            config.settle_delay_ms,
            port_name
        );
        tokio::time::sleep(config.settle_delay()).await;

        if let Err(e) = transport.discard_all() {
            transport.close();
            return Err(ProtocolError::ConnectionFailed(format!(
                "{}: failed to flush buffers: {}",
                port_name, e
            )));
        }

        Ok(Self {
            port_name: port_name.to_string(),
            executor: Arc::new(RequestExecutor::from_config(transport, log, config)),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Shared executor for this link
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub fn stats(&self) -> ExecutorStats {
        self.executor.stats()
    }

    /// Close the link. Any exchange still in flight completes first.
    pub async fn close(self) {
        self.executor.close().await;
        tracing::info!("closed {}", self.port_name);
    }
}
