use std::fmt;

/// Lifecycle of a [`ServerConnection`](super::ServerConnection).
///
/// `Uninitialized -> Connecting -> Ready -> Closing -> Closed`, with
/// `Connecting -> Closed` when initialization fails. `Closed` may be
/// initialized again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Ready,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}
