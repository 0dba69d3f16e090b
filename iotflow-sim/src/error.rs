use std::fmt;
use std::net::SocketAddr;

use crate::net::SocketId;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the simulation runtime
#[derive(Debug)]
pub enum Error {
    /// A listener is already bound to this address
    AddrInUse(SocketAddr),

    /// No listener is bound to the target address
    ConnectionRefused(SocketAddr),

    /// Operation on a closed or unknown socket
    Closed(SocketId),

    /// Injected send failure (used to model transient transport errors)
    SendFailed(SocketId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AddrInUse(addr) => write!(f, "address already in use: {addr}"),
            Error::ConnectionRefused(addr) => write!(f, "connection refused: {addr}"),
            Error::Closed(id) => write!(f, "socket {id} is closed"),
            Error::SendFailed(id) => write!(f, "send failed on socket {id}"),
        }
    }
}

impl std::error::Error for Error {}
