//! Transport seam between the connection manager and a concrete broker client.
//!
//! The manager owns retry, health, and confirm policy; a transport only knows how to open a
//! confirm-mode channel, push one message and wait for its confirm, and report liveness.

use std::time::Duration;

use thiserror::Error;

/// Broker verdict on one published message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirm {
    /// Accepted and persisted.
    Ack,
    /// Rejected by the broker.
    Nack,
    /// Acked but handed back as unroutable (mandatory flag).
    Returned,
}

/// Low-level broker failure. The manager turns these into reconnects or publish failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("amqp: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("no confirm within {0:?}")]
    ConfirmTimeout(Duration),

    #[error("transport not open")]
    NotOpen,

    #[error("{0}")]
    Other(String),
}

/// A broker client that can be driven synchronously, one message at a time.
pub trait Transport {
    /// Open connection and channel, declare `queue` durable, and enable publisher confirms.
    /// Any previous connection is discarded first.
    fn open(&mut self, queue: &str) -> Result<(), TransportError>;

    /// Publish `payload` persistent to `queue` via the default exchange and block until the broker
    /// confirms it or `timeout` elapses.
    fn publish(
        &mut self,
        queue: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Confirm, TransportError>;

    /// Cheap liveness check; must not block on the network for long.
    fn is_alive(&mut self) -> bool;

    /// Release connection and channel. Safe to call when already closed.
    fn close(&mut self);
}
