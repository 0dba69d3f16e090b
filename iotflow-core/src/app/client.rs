//! Stream sink client
//!
//! Connects to a streaming server, sends the start trigger, and counts what
//! comes back. Pure consumer; it never schedules traffic of its own.

use std::net::SocketAddr;

use iotflow_sim::{
    Direction, EventQueue, Payload, SimNet, SocketId, TraceEvent, TraceSink,
};

use crate::app::camera::STREAM_TRIGGER;
use crate::error::Result;

pub struct StreamClient {
    local: SocketAddr,
    remote: SocketAddr,
    socket: Option<SocketId>,
    received: u64,
    bytes_received: u64,
}

impl StreamClient {
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        Self { local, remote, socket: None, received: 0, bytes_received: 0 }
    }

    /// Connect and immediately request the stream. Harmless against a
    /// passive server, which streams on accept and ignores the trigger.
    pub fn start(&mut self, net: &mut SimNet) -> Result<()> {
        let socket = net.connect(self.local, self.remote)?;
        net.send(socket, Payload::Bytes(STREAM_TRIGGER.to_vec()))?;
        self.socket = Some(socket);
        tracing::info!(local = %self.local, remote = %self.remote, %socket, "stream requested");
        Ok(())
    }

    pub fn on_data<E>(
        &mut self,
        queue: &EventQueue<E>,
        sink: &mut dyn TraceSink,
        payload: &Payload,
        from: SocketAddr,
    ) {
        self.received += 1;
        self.bytes_received += payload.len() as u64;
        tracing::debug!(bytes = payload.len(), %from, total = self.received, "stream packet received");
        sink.record(TraceEvent {
            dir: Direction::Rx,
            bytes: payload.len() as u32,
            class_id: 0,
            peer: from,
            at: queue.now(),
        });
    }

    pub fn on_closed(&mut self, socket: SocketId) {
        if self.socket == Some(socket) {
            self.socket = None;
            tracing::info!(%socket, "server closed the stream");
        }
    }

    pub fn stop(&mut self, net: &mut SimNet) {
        if let Some(socket) = self.socket.take() {
            net.close(socket);
            tracing::info!(%socket, "client disconnected");
        }
    }

    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    /// Packets received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Total payload bytes received so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use iotflow_sim::{MemorySink, NetNotice};

    fn addr(host: &str, port: u16) -> SocketAddr {
        format!("{host}:{port}").parse().unwrap()
    }

    #[test]
    fn test_start_sends_trigger() {
        let mut net = SimNet::new();
        net.listen(addr("10.0.0.1", 5000)).unwrap();
        let mut client = StreamClient::new(addr("10.0.0.2", 4000), addr("10.0.0.1", 5000));
        client.start(&mut net).unwrap();
        assert!(client.socket().is_some());

        let notices = net.take_notices();
        assert!(matches!(notices[0], NetNotice::Accepted { .. }));
        match &notices[1] {
            NetNotice::Data { payload, .. } => {
                assert_eq!(payload, &Payload::Bytes(STREAM_TRIGGER.to_vec()));
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn test_connect_refused_without_listener() {
        let mut net = SimNet::new();
        let mut client = StreamClient::new(addr("10.0.0.2", 4000), addr("10.0.0.1", 5000));
        assert!(client.start(&mut net).is_err());
        assert!(client.socket().is_none());
    }

    #[test]
    fn test_counts_received_packets() {
        let queue: EventQueue<()> = EventQueue::new();
        let mut sink = MemorySink::new();
        let mut client = StreamClient::new(addr("10.0.0.2", 4000), addr("10.0.0.1", 5000));

        client.on_data(&queue, &mut sink, &Payload::Opaque(1448), addr("10.0.0.1", 5000));
        client.on_data(&queue, &mut sink, &Payload::Opaque(52), addr("10.0.0.1", 5000));
        assert_eq!(client.received(), 2);
        assert_eq!(client.bytes_received(), 1500);
        assert_eq!(sink.rx_count(), 2);
    }

    #[test]
    fn test_stop_closes_connection() {
        let mut net = SimNet::new();
        net.listen(addr("10.0.0.1", 5000)).unwrap();
        let mut client = StreamClient::new(addr("10.0.0.2", 4000), addr("10.0.0.1", 5000));
        client.start(&mut net).unwrap();
        let socket = client.socket().unwrap();

        client.stop(&mut net);
        assert!(client.socket().is_none());
        assert!(!net.is_open(socket));
    }
}
