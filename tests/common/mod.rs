//! In-memory broker for integration tests: scripted opens and confirms, records what it "received".

#![allow(dead_code)]

use filequeue::broker::{Confirm, Transport, TransportError};
use filequeue::{BrokerSettings, HealthCheckPolicy, RetryPolicy};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake does with one publish call.
#[derive(Clone, Copy, Debug)]
pub enum Scripted {
    Ack,
    Nack,
    Returned,
    Timeout,
    /// Socket dies before the broker sees the message.
    LinkDown,
    /// Broker stores the message but the ack is lost with the link.
    LostAck,
}

#[derive(Default)]
pub struct FakeState {
    pub opens: u32,
    pub closes: u32,
    /// Per-open outcome; `true` = success. Empty means success.
    pub open_plan: VecDeque<bool>,
    pub always_fail_open: bool,
    /// Per-publish outcome. Empty means `Ack`.
    pub publish_plan: VecDeque<Scripted>,
    /// Drop the link silently once this many messages were received.
    pub drop_link_after: Option<usize>,
    pub alive: bool,
    pub declared_queue: Option<String>,
    /// Messages the broker holds (including duplicates).
    pub received: Vec<serde_json::Value>,
    pub publish_calls: u32,
    pub publish_errors: u32,
    pub health_checks: u32,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn received_names(&self) -> Vec<String> {
        self.state()
            .received
            .iter()
            .map(|m| m["file_name"].as_str().unwrap().to_string())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn open(&mut self, queue: &str) -> Result<(), TransportError> {
        let mut s = self.state();
        s.opens += 1;
        s.alive = false;
        let ok = !s.always_fail_open && s.open_plan.pop_front().unwrap_or(true);
        if !ok {
            return Err(TransportError::Other("connection refused".to_string()));
        }
        s.declared_queue = Some(queue.to_string());
        s.alive = true;
        Ok(())
    }

    fn publish(
        &mut self,
        _queue: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Confirm, TransportError> {
        let mut s = self.state();
        s.publish_calls += 1;
        if !s.alive {
            s.publish_errors += 1;
            return Err(TransportError::Other("connection reset".to_string()));
        }
        let message: serde_json::Value = serde_json::from_slice(payload).unwrap();
        let outcome = match s.publish_plan.pop_front().unwrap_or(Scripted::Ack) {
            Scripted::Ack => {
                s.received.push(message);
                Ok(Confirm::Ack)
            }
            Scripted::Nack => Ok(Confirm::Nack),
            Scripted::Returned => Ok(Confirm::Returned),
            Scripted::Timeout => Err(TransportError::ConfirmTimeout(timeout)),
            Scripted::LinkDown => {
                s.alive = false;
                Err(TransportError::Other("connection reset".to_string()))
            }
            Scripted::LostAck => {
                s.received.push(message);
                s.alive = false;
                Err(TransportError::Other("connection reset".to_string()))
            }
        };
        if outcome.is_err() {
            s.publish_errors += 1;
        }
        if let Some(n) = s.drop_link_after
            && s.received.len() >= n
        {
            s.drop_link_after = None;
            s.alive = false;
        }
        outcome
    }

    fn is_alive(&mut self) -> bool {
        let mut s = self.state();
        s.health_checks += 1;
        s.alive
    }

    fn close(&mut self) {
        let mut s = self.state();
        s.closes += 1;
        s.alive = false;
    }
}

/// Broker settings with no backoff sleeps and no time-based health checks.
pub fn fast_settings() -> BrokerSettings {
    BrokerSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
        health_check: HealthCheckPolicy {
            every_messages: 0,
            interval: Duration::from_secs(3600),
        },
        confirm_timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) {
    std::fs::write(dir.join(name), contents).unwrap();
}

/// `test1.txt`, `test2.pdf`, `test3.jpg` in a fresh temp dir.
pub fn three_file_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "test1.txt", b"hello text");
    write_file(dir.path(), "test2.pdf", b"%PDF-1.4 fake");
    write_file(dir.path(), "test3.jpg", b"\xff\xd8\xff fake jpeg");
    dir
}
