//! Application roles
//!
//! Three endpoint behaviors built on the scheduler: a passive server that
//! streams to every accepted client, a camera that streams only after a
//! start trigger, and a client that requests and counts a stream.

use std::fmt;

pub mod camera;
pub mod client;
pub mod passive;

pub use camera::Camera;
pub use client::StreamClient;
pub use passive::PassiveApp;

/// Server application lifecycle. One-way: started applications stop, stopped
/// applications never restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    NotStarted,
    Started,
    Stopped,
}

impl AppState {
    /// Canonical state name, as it appears in logs and traces.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::NotStarted => "NOT_STARTED",
            AppState::Started => "STARTED",
            AppState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_names() {
        assert_eq!(AppState::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(AppState::Started.to_string(), "STARTED");
        assert_eq!(AppState::Stopped.to_string(), "STOPPED");
        assert_eq!(AppState::Started.as_str(), "STARTED");
    }
}
