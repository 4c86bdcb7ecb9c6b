//! Shared test doubles

#![allow(dead_code)]

use sensorlink_core::comm_log::CommunicationLog;
use sensorlink_core::event::EventSender;
use sensorlink_core::protocol::{RelayState, RequestExecutor, Transport};
use sensorlink_core::relay::RelayController;
use sensorlink_core::sensor::{Readings, SensorController};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const TIMEOUT: Duration = Duration::from_millis(500);
pub const POLL: Duration = Duration::from_millis(10);

/// Transport operation as observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DiscardInput,
    DiscardAll,
    Write(Vec<u8>),
    Read(usize),
    Close,
}

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    writes: Vec<(Instant, Vec<u8>)>,
    reads: Vec<Instant>,
    script: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    /// Reply bytes and the instant they become readable
    pending: VecDeque<(Instant, Vec<u8>)>,
    rx: VecDeque<u8>,
    response_delay: Duration,
    fail_writes: bool,
    fail_reads: bool,
}

/// Scriptable transport. Clones share state, so a test can keep one handle
/// while the executor owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// What a well-behaved pair of slaves answers
pub fn slave_reply(request: &[u8]) -> Option<Vec<u8>> {
    match request {
        [b'U'] => Some(vec![0x24, 0x01, 42]),
        [b'T'] => Some(vec![0x24, 0x02, 0x01]),
        [b'R', state] => Some(vec![0x66, 0x03, *state]),
        _ => None,
    }
}

impl MockTransport {
    /// Answers nothing
    pub fn silent() -> Self {
        Self::default()
    }

    /// One canned reply per write, in order; silent once the script runs out
    pub fn scripted(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let mock = Self::default();
        mock.lock().script = replies.into_iter().collect();
        mock
    }

    /// Behaves like the real sensor and actuator
    pub fn slaves() -> Self {
        Self::with_responder(slave_reply)
    }

    pub fn with_responder(
        responder: impl FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    ) -> Self {
        let mock = Self::default();
        mock.lock().responder = Some(Box::new(responder));
        mock
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Delay between a write and its reply becoming readable
    pub fn set_response_delay(&self, delay: Duration) {
        self.lock().response_delay = delay;
    }

    /// Put bytes in the receive buffer as if a slave had sent them unasked
    pub fn preload(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    pub fn fail_reads(&self) {
        self.lock().fail_reads = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<(Instant, Vec<u8>)> {
        self.lock().writes.clone()
    }

    pub fn reads(&self) -> Vec<Instant> {
        self.lock().reads.clone()
    }

    pub fn read_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Read(_)))
            .count()
    }

    pub fn boxed(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }
}

impl MockState {
    fn deliver_ready(&mut self) {
        let now = Instant::now();
        while let Some((ready_at, _)) = self.pending.front() {
            if *ready_at > now {
                break;
            }
            if let Some((_, bytes)) = self.pending.pop_front() {
                self.rx.extend(bytes);
            }
        }
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.calls.push(Call::Write(data.to_vec()));
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        let now = Instant::now();
        state.writes.push((now, data.to_vec()));

        let reply = match state.script.pop_front() {
            Some(reply) => Some(reply),
            None => state.responder.as_mut().and_then(|r| r(data)),
        };
        if let Some(reply) = reply {
            let ready_at = now + state.response_delay;
            state.pending.push_back((ready_at, reply));
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.calls.push(Call::Read(buf.len()));
        state.reads.push(Instant::now());
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        state.deliver_ready();
        let n = buf.len().min(state.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.rx.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut state = self.lock();
        state.deliver_ready();
        Ok(state.rx.len())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::DiscardInput);
        state.deliver_ready();
        state.rx.clear();
        Ok(())
    }

    fn discard_all(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::DiscardAll);
        state.deliver_ready();
        state.rx.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.lock().calls.push(Call::Close);
    }
}

pub fn executor(mock: &MockTransport, log: &CommunicationLog) -> Arc<RequestExecutor> {
    Arc::new(RequestExecutor::new(mock.boxed(), log.clone(), TIMEOUT, POLL))
}

pub fn sensors(executor: &Arc<RequestExecutor>, events: &EventSender) -> SensorController {
    SensorController::new(
        Arc::clone(executor),
        Arc::new(Mutex::new(Readings::default())),
        events.clone(),
    )
}

pub fn relay(executor: &Arc<RequestExecutor>, events: &EventSender) -> RelayController {
    RelayController::new(
        Arc::clone(executor),
        Arc::new(Mutex::new(RelayState::Off)),
        events.clone(),
    )
}

/// Route engine tracing to the test output; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sensorlink_core=debug")
        .with_test_writer()
        .try_init();
}
