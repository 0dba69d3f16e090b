//! Iotflow Core Library
//!
//! This crate models synthetic traffic sources for simulated IoT devices: a
//! camera that streams packet classes to its viewers inside a discrete-event
//! simulation. It provides the random generators behind each traffic class,
//! the per-connection packet scheduler, the passive (stream-on-accept) and
//! reactive (stream-on-request) server applications, the sink client, and
//! the JSON profile loader.

pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod scenario;
pub mod scheduler;

// Re-export runtime types from iotflow-sim
pub use iotflow_sim::{
    Direction, EventId, EventQueue, MemorySink, NetNotice, NullSink, Payload, SimNet, SimTime,
    SocketId, TraceEvent, TraceSink,
};

pub use error::{Error, Result};
