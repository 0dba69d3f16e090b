//! Packet-level trace sink
//!
//! The traffic engine reports every transmitted and received packet through a
//! `TraceSink`. Downstream consumers (CSV export, in-test assertions) own the
//! interpretation; the engine only ever calls `record`.

use std::fmt;
use std::net::SocketAddr;

use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => write!(f, "Tx"),
            Direction::Rx => write!(f, "Rx"),
        }
    }
}

/// One traced packet event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceEvent {
    pub dir: Direction,
    pub bytes: u32,
    /// Traffic class the packet belongs to; 0 for received packets, which
    /// carry no class correlation.
    pub class_id: u16,
    pub peer: SocketAddr,
    pub at: SimTime,
}

pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Keeps every event in memory; the sink used by tests and the CLI summary.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Vec<TraceEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Transmitted events for one traffic class, in record order.
    pub fn tx_for_class(&self, class_id: u16) -> Vec<&TraceEvent> {
        self.events
            .iter()
            .filter(|e| e.dir == Direction::Tx && e.class_id == class_id)
            .collect()
    }

    pub fn tx_count(&self) -> usize {
        self.events.iter().filter(|e| e.dir == Direction::Tx).count()
    }

    pub fn rx_count(&self) -> usize {
        self.events.iter().filter(|e| e.dir == Direction::Rx).count()
    }
}

impl TraceSink for MemorySink {
    fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_class() {
        let peer: SocketAddr = "10.0.0.2:9000".parse().unwrap();
        let mut sink = MemorySink::new();
        sink.record(TraceEvent {
            dir: Direction::Tx,
            bytes: 100,
            class_id: 1,
            peer,
            at: SimTime::ZERO,
        });
        sink.record(TraceEvent {
            dir: Direction::Tx,
            bytes: 200,
            class_id: 2,
            peer,
            at: SimTime::ZERO,
        });
        sink.record(TraceEvent {
            dir: Direction::Rx,
            bytes: 100,
            class_id: 0,
            peer,
            at: SimTime::ZERO,
        });

        assert_eq!(sink.tx_count(), 2);
        assert_eq!(sink.rx_count(), 1);
        assert_eq!(sink.tx_for_class(1).len(), 1);
        assert_eq!(sink.tx_for_class(1)[0].bytes, 100);
    }
}
