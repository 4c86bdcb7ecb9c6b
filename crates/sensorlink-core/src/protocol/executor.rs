//! Request execution
//!
//! Runs one request/response exchange at a time against the shared link.

use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::{format_hex, Command, ProtocolError, ResponseFrame, Transport, RESPONSE_LEN};
use crate::comm_log::{CommunicationLog, LogLevel};
use crate::config::MasterConfig;

/// Cumulative traffic counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Request bytes written
    pub tx_bytes: u64,
    /// Response bytes read
    pub rx_bytes: u64,
    /// Requests attempted
    pub requests: u64,
    /// Requests that did not return a value
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    tx_bytes: AtomicU64,
    rx_bytes: AtomicU64,
    requests: AtomicU64,
    failures: AtomicU64,
}

/// Executes requests against a transport, one at a time.
///
/// The transport lock is held for the whole exchange, from discarding stale
/// input to decoding the response, so no second request can be written while
/// a slave may still be answering the first.
pub struct RequestExecutor {
    transport: Mutex<Box<dyn Transport>>,
    log: CommunicationLog,
    timeout: Duration,
    poll_interval: Duration,
    counters: Counters,
}

impl RequestExecutor {
    pub fn new(
        transport: Box<dyn Transport>,
        log: CommunicationLog,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport: Mutex::new(transport),
            log,
            timeout,
            poll_interval,
            counters: Counters::default(),
        }
    }

    /// Create an executor using the timing from `config`
    pub fn from_config(
        transport: Box<dyn Transport>,
        log: CommunicationLog,
        config: &MasterConfig,
    ) -> Self {
        Self::new(
            transport,
            log,
            config.response_timeout(),
            config.poll_interval(),
        )
    }

    /// Response timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snapshot of the traffic counters
    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            tx_bytes: self.counters.tx_bytes.load(Ordering::Relaxed),
            rx_bytes: self.counters.rx_bytes.load(Ordering::Relaxed),
            requests: self.counters.requests.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Execute `command`, matching the response against the address and
    /// function code the command expects.
    pub async fn execute(&self, command: Command) -> Result<u8, ProtocolError> {
        self.execute_expecting(
            command,
            command.expected_address(),
            command.expected_function(),
        )
        .await
    }

    /// Execute `command` and return the value byte of a response from
    /// `expected_address` / `expected_function`.
    ///
    /// Every outcome is written to the communication log exactly once.
    pub async fn execute_expecting(
        &self,
        command: Command,
        expected_address: u8,
        expected_function: u8,
    ) -> Result<u8, ProtocolError> {
        let mut transport = self.transport.lock().await;
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let result = self
            .exchange(
                &mut **transport,
                command,
                expected_address,
                expected_function,
            )
            .await;

        if result.is_err() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn exchange(
        &self,
        transport: &mut dyn Transport,
        command: Command,
        expected_address: u8,
        expected_function: u8,
    ) -> Result<u8, ProtocolError> {
        let request = command.encode();

        // Stale bytes from an earlier, timed-out exchange would shift this frame
        if let Err(e) = transport.discard_input() {
            return Err(self.io_failure(command, &request, "discard", e));
        }

        tracing::debug!("TX {:?}: {}", command, format_hex(&request));
        let written = match transport.write(&request) {
            Ok(n) => n,
            Err(e) => return Err(self.io_failure(command, &request, "write", e)),
        };
        self.counters
            .tx_bytes
            .fetch_add(written as u64, Ordering::Relaxed);

        let start = Instant::now();
        loop {
            let available = match transport.bytes_available() {
                Ok(n) => n,
                Err(e) => return Err(self.io_failure(command, &request, "poll", e)),
            };
            if available >= RESPONSE_LEN {
                break;
            }
            if start.elapsed() > self.timeout {
                self.log.record(
                    LogLevel::Error,
                    format!("Timeout: no response from {} to", command.slave_name()),
                    Some(&request),
                );
                return Err(ProtocolError::Timeout);
            }
            sleep(self.poll_interval).await;
        }

        let mut frame = [0u8; RESPONSE_LEN];
        if let Err(e) = read_exact(transport, &mut frame) {
            return Err(self.io_failure(command, &request, "read", e));
        }
        self.counters
            .rx_bytes
            .fetch_add(RESPONSE_LEN as u64, Ordering::Relaxed);
        tracing::debug!(
            "RX {:?}: {} after {}ms",
            command,
            format_hex(&frame),
            start.elapsed().as_millis()
        );

        match ResponseFrame::decode(frame) {
            ResponseFrame::Error { code } => {
                let err = code.into_error();
                self.log
                    .record(LogLevel::Error, format!("Error: {}", err), Some(&frame));
                Err(err)
            }
            ResponseFrame::Data {
                address,
                function,
                value,
            } if address == expected_address && function == expected_function => {
                self.log
                    .record(LogLevel::Info, command.describe_value(value), Some(&frame));
                Ok(value)
            }
            ResponseFrame::Data {
                address,
                function,
                value,
            } => {
                self.log
                    .record(LogLevel::Warning, "Invalid response:", Some(&frame));
                Err(ProtocolError::ProtocolMismatch {
                    address,
                    function,
                    value,
                })
            }
        }
    }

    fn io_failure(
        &self,
        command: Command,
        request: &[u8],
        stage: &str,
        e: io::Error,
    ) -> ProtocolError {
        self.log.record(
            LogLevel::Error,
            format!("I/O error during {} {}: {}", command.slave_name(), stage, e),
            Some(request),
        );
        ProtocolError::Io(e)
    }

    /// Close the transport. Waits for any in-flight exchange to finish first.
    pub async fn close(&self) {
        self.transport.lock().await.close();
    }
}

/// Read exactly `buf.len()` bytes, tolerating short reads
fn read_exact(transport: &mut dyn Transport, buf: &mut [u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < buf.len() {
        match transport.read(&mut buf[offset..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("link closed after {} of {} bytes", offset, buf.len()),
                ))
            }
            Ok(n) => offset += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
