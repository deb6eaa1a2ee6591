//! Broker side of the pipeline: connection lifecycle, transport seam, confirm manager.

pub mod amqp;
pub mod manager;
pub mod state;
pub mod transport;

pub use amqp::AmqpTransport;
pub use manager::{ConnectionManager, PendingConfirmation};
pub use state::{ConnectionEvent, ConnectionState, transition};
pub use transport::{Confirm, Transport, TransportError};
