//! Iotflow Simulation Runtime
//!
//! This crate provides the single-threaded discrete-event runtime the traffic
//! engine runs on: a virtual clock, a cancellable event queue, an in-memory
//! connection-oriented socket table, and the trace sink used for packet-level
//! observability. There is no real I/O anywhere; every wait is a scheduled
//! future callback and every "network" operation is a table update plus a
//! queued delivery notice.

pub mod error;
pub mod event;
pub mod net;
pub mod time;
pub mod trace;

pub use error::{Error, Result};
pub use event::{EventId, EventQueue};
pub use net::{NetNotice, Payload, SimNet, SocketId};
pub use time::SimTime;
pub use trace::{Direction, MemorySink, NullSink, TraceEvent, TraceSink};
