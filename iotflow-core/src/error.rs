use std::fmt;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for core operations
#[derive(Debug)]
pub enum Error {
    /// Malformed traffic class or generator description
    Config(String),

    /// Bind/listen/send failures from the transport layer
    Transport(String),

    /// Unrecognized control payload on a connection
    Protocol(String),

    /// Operation invoked in the wrong application state
    State(String),

    /// Other errors
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Transport(msg) => write!(f, "Transport error: {msg}"),
            Error::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            Error::State(msg) => write!(f, "State error: {msg}"),
            Error::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<iotflow_sim::Error> for Error {
    fn from(err: iotflow_sim::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
