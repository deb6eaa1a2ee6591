//! Connection lifecycle as an explicit state plus a pure transition function.

use crate::errors::ConnectionError;

/// Lifecycle of the single broker connection owned by the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Link was lost (I/O failure, nack, confirm timeout, failed health check); repairing.
    Reconnecting,
    /// Terminal.
    Closed,
}

/// Inputs that move the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Start a fresh connect from `Disconnected`.
    Connect,
    /// Connection, channel, queue declare, and confirm mode all succeeded.
    Established,
    /// The live link failed or a health check missed.
    LinkLost,
    /// Every attempt in the retry budget failed.
    AttemptsExhausted,
    /// Explicit close. Accepted from any state.
    Close,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

/// Next state for `event` in `from`, or an error when the pair is not a legal move.
pub fn transition(
    from: ConnectionState,
    event: ConnectionEvent,
) -> Result<ConnectionState, ConnectionError> {
    use ConnectionEvent as E;
    use ConnectionState as S;

    let next = match (from, event) {
        (_, E::Close) => S::Closed,
        (S::Disconnected, E::Connect) => S::Connecting,
        (S::Disconnected | S::Connecting | S::Reconnecting, E::Established) => S::Connected,
        (S::Connected, E::LinkLost) => S::Reconnecting,
        (S::Connecting | S::Reconnecting, E::AttemptsExhausted) => S::Disconnected,
        _ => return Err(ConnectionError::InvalidTransition { from, event }),
    };
    Ok(next)
}
