//! Connection & confirm manager: owns the broker link, its reconnect policy, health checks, and
//! per-message publisher confirms.
//!
//! Publishing is synchronous: one message is in flight at a time and the call returns only after
//! the broker acked it, or after a reconnect-and-retry also failed. Delivery is at-least-once; a
//! retry after a lost ack can duplicate a message broker-side.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::state::{ConnectionEvent, ConnectionState, transition};
use super::transport::{Confirm, Transport, TransportError};
use crate::errors::{ConnectionError, PublishError};
use crate::pipeline::events::{NoopObserver, ScanObserver};
use crate::{BrokerSettings, FileRecord};

/// Correlates the one in-flight delivery with its forthcoming confirm.
/// Exists only while the manager waits on the transport.
#[derive(Clone, Debug)]
pub struct PendingConfirmation {
    /// Monotonic delivery number for this manager (retries get a new number).
    pub sequence: u64,
    /// 1 for the first delivery of a record, 2 for the retry after reconnect.
    pub attempt: u8,
    pub published_at: Instant,
}

/// Why a single delivery did not end in an ack.
#[derive(Debug)]
enum DeliveryFailure {
    Nack,
    Returned,
    Transport(TransportError),
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nack => write!(f, "nack"),
            Self::Returned => write!(f, "returned as unroutable"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl From<DeliveryFailure> for PublishError {
    fn from(failure: DeliveryFailure) -> Self {
        match failure {
            DeliveryFailure::Nack => PublishError::Nacked,
            DeliveryFailure::Returned => PublishError::Unroutable,
            DeliveryFailure::Transport(TransportError::ConfirmTimeout(d)) => {
                PublishError::ConfirmTimeout(d)
            }
            DeliveryFailure::Transport(e) => PublishError::Transport(e),
        }
    }
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    settings: BrokerSettings,
    state: ConnectionState,
    observer: Arc<dyn ScanObserver>,
    pending: Option<PendingConfirmation>,
    sequence: u64,
    messages_since_check: u64,
    last_health_check: Instant,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, settings: BrokerSettings) -> Self {
        Self {
            transport,
            settings,
            state: ConnectionState::Disconnected,
            observer: Arc::new(NoopObserver),
            pending: None,
            sequence: 0,
            messages_since_check: 0,
            last_health_check: Instant::now(),
        }
    }

    /// Receive connection state transitions.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub(crate) fn set_observer(&mut self, observer: Arc<dyn ScanObserver>) {
        self.observer = observer;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// The in-flight delivery, if any. Always `None` between calls.
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Establish connection + channel, declare the queue, enable confirms.
    /// Retries within the attempt budget; an error here is fatal for a run.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            _ => self.reconnect(),
        }
    }

    /// Publish one record persistent and block until the broker confirms it.
    ///
    /// Nack, unroutable return, confirm timeout, or I/O failure mark the link lost; the manager
    /// reconnects and retries the same payload once. Errors are per-message, never fatal.
    pub fn publish(&mut self, record: &FileRecord) -> Result<(), PublishError> {
        if self.state.is_closed() {
            return Err(ConnectionError::Closed.into());
        }
        let payload = record.to_json().map_err(|source| PublishError::Encode {
            path: record.path().to_path_buf(),
            source,
        })?;

        // At most one attempt budget before the first delivery: a due health check repairs the
        // link itself, otherwise a link left down by an earlier message is reconnected here.
        self.messages_since_check += 1;
        if !self.maybe_health_check()? && !self.state.is_connected() {
            self.reconnect()?;
        }

        let failure = match self.deliver(&payload, 1) {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };
        warn!(
            "Delivery of {} not confirmed ({}); reconnecting and retrying once",
            record.path().display(),
            failure
        );
        self.mark_link_lost();
        self.reconnect()?;

        match self.deliver(&payload, 2) {
            Ok(()) => {
                debug!("Retry confirmed for {}", record.path().display());
                Ok(())
            }
            Err(failure) => {
                self.mark_link_lost();
                Err(failure.into())
            }
        }
    }

    /// Run a health check if enough messages or wall time passed since the last one.
    /// Returns whether a check ran; a failed repair is returned as the error.
    pub fn maybe_health_check(&mut self) -> Result<bool, ConnectionError> {
        let policy = self.settings.health_check;
        let by_count = policy.every_messages > 0 && self.messages_since_check >= policy.every_messages;
        let by_time = self.last_health_check.elapsed() >= policy.interval;
        if by_count || by_time {
            self.check_and_repair()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Verify the link is alive; repair it if not. Returns whether the manager ends up connected.
    pub fn health_check(&mut self) -> bool {
        match self.check_and_repair() {
            Ok(()) => true,
            Err(e) => {
                warn!("Reconnect after failed health check did not succeed: {}", e);
                false
            }
        }
    }

    fn check_and_repair(&mut self) -> Result<(), ConnectionError> {
        self.last_health_check = Instant::now();
        self.messages_since_check = 0;
        if self.state.is_closed() {
            return Err(ConnectionError::Closed);
        }
        if self.state.is_connected() && self.transport.is_alive() {
            debug!("Broker health check ok");
            return Ok(());
        }
        warn!("Broker connection health check failed; reconnecting");
        self.mark_link_lost();
        self.reconnect()
    }

    /// Release the connection and channel. Idempotent.
    pub fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.transport.close();
        self.pending = None;
        if let Err(e) = self.apply(ConnectionEvent::Close) {
            debug!("close: {}", e);
        }
        info!("Broker connection closed");
    }

    fn apply(&mut self, event: ConnectionEvent) -> Result<(), ConnectionError> {
        let next = transition(self.state, event)?;
        if next != self.state {
            debug!("Connection state {:?} -> {:?} ({:?})", self.state, next, event);
            self.observer.on_connection_state(self.state, next);
        }
        self.state = next;
        Ok(())
    }

    fn mark_link_lost(&mut self) {
        if self.state.is_connected()
            && let Err(e) = self.apply(ConnectionEvent::LinkLost)
        {
            debug!("mark_link_lost: {}", e);
        }
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Closed => return Err(ConnectionError::Closed),
            ConnectionState::Connected => self.apply(ConnectionEvent::LinkLost)?,
            ConnectionState::Disconnected => self.apply(ConnectionEvent::Connect)?,
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
        }
        self.establish()
    }

    /// Attempt loop for `Connecting`/`Reconnecting`. Ends in `Connected` or `Disconnected`.
    fn establish(&mut self) -> Result<(), ConnectionError> {
        let policy = self.settings.retry;
        let attempts = policy.max_attempts.max(1);
        let endpoint = self.settings.endpoint();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            info!(
                "Connecting to broker at {} (attempt {}/{})",
                endpoint, attempt, attempts
            );
            match self.transport.open(&self.settings.queue) {
                Ok(()) => {
                    self.apply(ConnectionEvent::Established)?;
                    self.last_health_check = Instant::now();
                    self.messages_since_check = 0;
                    info!(
                        "Connected to broker; queue '{}' is durable, publisher confirms on",
                        self.settings.queue
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        thread::sleep(policy.delay_after(attempt));
                    }
                }
            }
        }

        error!(
            "Giving up on broker at {} after {} attempts",
            endpoint, attempts
        );
        self.transport.close();
        self.apply(ConnectionEvent::AttemptsExhausted)?;
        Err(ConnectionError::Exhausted {
            endpoint,
            attempts,
            last_error,
        })
    }

    fn deliver(&mut self, payload: &[u8], attempt: u8) -> Result<(), DeliveryFailure> {
        self.sequence += 1;
        self.pending = Some(PendingConfirmation {
            sequence: self.sequence,
            attempt,
            published_at: Instant::now(),
        });
        let outcome = self.transport.publish(
            &self.settings.queue,
            payload,
            self.settings.confirm_timeout,
        );
        if let Some(pending) = self.pending.take() {
            debug!(
                "Delivery #{} (attempt {}) resolved in {:?}",
                pending.sequence,
                pending.attempt,
                pending.published_at.elapsed()
            );
        }
        match outcome {
            Ok(Confirm::Ack) => Ok(()),
            Ok(Confirm::Nack) => Err(DeliveryFailure::Nack),
            Ok(Confirm::Returned) => Err(DeliveryFailure::Returned),
            Err(e) => Err(DeliveryFailure::Transport(e)),
        }
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.close();
    }
}
