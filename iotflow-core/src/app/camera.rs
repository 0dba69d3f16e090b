//! Trigger-driven streaming server
//!
//! Accepts connections but holds the stream back until the client sends the
//! `GET_STREAM` control message. Anything else received on a connection is
//! logged and ignored; the client can still trigger later. Traffic classes
//! can be edited at runtime and take effect for subsequent triggers.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use iotflow_sim::{
    Direction, EventQueue, Payload, SimNet, SocketId, TraceEvent, TraceSink,
};

use crate::app::AppState;
use crate::error::{Error, Result};
use crate::model::TrafficClass;
use crate::scheduler::{ConnectionScheduler, SendFire};

/// Control message a client sends to start the stream.
pub const STREAM_TRIGGER: &[u8] = b"GET_STREAM";

pub struct Camera {
    local: SocketAddr,
    state: AppState,
    classes: Vec<Arc<TrafficClass>>,
    scheduler: ConnectionScheduler,
    clients: HashSet<SocketId>,
}

impl Camera {
    pub fn new(local: SocketAddr) -> Self {
        Self {
            local,
            state: AppState::NotStarted,
            classes: Vec::new(),
            scheduler: ConnectionScheduler::new(),
            clients: HashSet::new(),
        }
    }

    pub fn with_seed(local: SocketAddr, seed: u64) -> Self {
        Self {
            local,
            state: AppState::NotStarted,
            classes: Vec::new(),
            scheduler: ConnectionScheduler::with_seed(seed),
            clients: HashSet::new(),
        }
    }

    /// Append a traffic class. Applies to triggers received from now on;
    /// already-running streams are untouched.
    pub fn add_class(&mut self, class: Arc<TrafficClass>) {
        self.classes.push(class);
    }

    /// Remove a previously added class by identity. Returns whether a class
    /// was removed.
    pub fn remove_class(&mut self, class: &Arc<TrafficClass>) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| !Arc::ptr_eq(c, class));
        before != self.classes.len()
    }

    pub fn clear_classes(&mut self) {
        self.classes.clear();
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Bind the listener and wait for triggers.
    pub fn start(&mut self, net: &mut SimNet) -> Result<()> {
        if self.state != AppState::NotStarted {
            return Err(Error::State(format!(
                "cannot start camera in state {}",
                self.state
            )));
        }
        net.listen(self.local)?;
        self.state = AppState::Started;
        tracing::info!(addr = %self.local, "camera listening");
        Ok(())
    }

    /// A client connected. Nothing streams yet; the camera waits for the
    /// trigger on this connection.
    pub fn on_accepted(&mut self, socket: SocketId, peer: SocketAddr) {
        if self.state != AppState::Started {
            tracing::warn!(%socket, %peer, state = %self.state, "accept while not started, ignoring");
            return;
        }
        self.clients.insert(socket);
        tracing::info!(%socket, %peer, "client connected, awaiting trigger");
    }

    /// Incoming data: the trigger starts the stream for that connection,
    /// anything else is ignored.
    pub fn on_data<E: From<SendFire>>(
        &mut self,
        queue: &mut EventQueue<E>,
        net: &SimNet,
        sink: &mut dyn TraceSink,
        socket: SocketId,
        payload: &Payload,
        from: SocketAddr,
    ) {
        sink.record(TraceEvent {
            dir: Direction::Rx,
            bytes: payload.len() as u32,
            class_id: 0,
            peer: from,
            at: queue.now(),
        });
        match payload {
            Payload::Bytes(bytes) if bytes.as_slice() == STREAM_TRIGGER => {
                tracing::info!(%socket, %from, classes = self.classes.len(), "stream trigger received");
                self.scheduler.start_classes(queue, net, socket, &self.classes);
            }
            _ => {
                tracing::warn!(%socket, bytes = payload.len(), %from, "unrecognized message, ignoring");
            }
        }
    }

    pub fn on_closed<E>(&mut self, queue: &mut EventQueue<E>, socket: SocketId) {
        if self.clients.remove(&socket) {
            tracing::info!(%socket, "client disconnected");
        }
        self.scheduler.cancel_connection(queue, socket);
    }

    pub fn on_send_fire<E: From<SendFire>>(
        &mut self,
        queue: &mut EventQueue<E>,
        net: &mut SimNet,
        sink: &mut dyn TraceSink,
        fire: SendFire,
    ) {
        self.scheduler.on_send_fire(queue, net, sink, self.state, fire);
    }

    pub fn stop<E>(&mut self, queue: &mut EventQueue<E>, net: &mut SimNet) {
        if self.state != AppState::Started {
            return;
        }
        self.state = AppState::Stopped;
        self.scheduler.cancel_all(queue);
        for socket in self.clients.drain() {
            net.close(socket);
        }
        net.unlisten(self.local);
        tracing::info!(addr = %self.local, "camera stopped");
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use iotflow_sim::{MemorySink, NetNotice, SimTime};

    fn addr(port: u16) -> SocketAddr {
        format!("192.168.1.20:{port}").parse().unwrap()
    }

    fn class(id: u16, size: f64, dt: f64) -> Arc<TrafficClass> {
        Arc::new(TrafficClass::basic(id, size, size, size, 0.0, dt, dt, dt, 0.0).unwrap())
    }

    struct Fixture {
        net: SimNet,
        queue: EventQueue<SendFire>,
        sink: MemorySink,
        cam: Camera,
        socket: SocketId,
        client_addr: SocketAddr,
    }

    fn fixture() -> Fixture {
        let mut net = SimNet::new();
        let mut cam = Camera::with_seed(addr(5000), 11);
        cam.add_class(class(1, 100.0, 1.0));
        cam.start(&mut net).unwrap();

        let client_addr = addr(4000);
        net.connect(client_addr, cam.local_addr()).unwrap();
        let socket = match net.take_notices().remove(0) {
            NetNotice::Accepted { socket, .. } => socket,
            other => panic!("expected Accepted, got {other:?}"),
        };
        cam.on_accepted(socket, client_addr);

        Fixture { net, queue: EventQueue::new(), sink: MemorySink::new(), cam, socket, client_addr }
    }

    fn run(f: &mut Fixture, until: f64) {
        let limit = SimTime::from_secs_f64(until);
        while let Some((_, _, fire)) = f.queue.pop_due(limit) {
            f.cam.on_send_fire(&mut f.queue, &mut f.net, &mut f.sink, fire);
        }
        f.queue.advance_to(limit);
    }

    #[test]
    fn test_no_stream_before_trigger() {
        let mut f = fixture();
        assert_eq!(f.cam.client_count(), 1);
        run(&mut f, 10.0);
        assert_eq!(f.sink.tx_count(), 0);
    }

    #[test]
    fn test_trigger_starts_stream() {
        let mut f = fixture();
        let payload = Payload::Bytes(STREAM_TRIGGER.to_vec());
        let (socket, from) = (f.socket, f.client_addr);
        f.cam.on_data(&mut f.queue, &f.net, &mut f.sink, socket, &payload, from);
        assert_eq!(f.queue.pending_len(), 1);

        run(&mut f, 3.5);
        assert_eq!(f.sink.tx_for_class(1).len(), 3);
    }

    #[test]
    fn test_garbage_message_ignored_but_trigger_still_works() {
        let mut f = fixture();
        let (socket, from) = (f.socket, f.client_addr);

        let garbage = Payload::Bytes(b"GARBAGE".to_vec());
        f.cam.on_data(&mut f.queue, &f.net, &mut f.sink, socket, &garbage, from);
        assert_eq!(f.queue.pending_len(), 0);
        assert_eq!(f.sink.rx_count(), 1);

        let trigger = Payload::Bytes(STREAM_TRIGGER.to_vec());
        f.cam.on_data(&mut f.queue, &f.net, &mut f.sink, socket, &trigger, from);
        assert_eq!(f.queue.pending_len(), 1);
    }

    #[test]
    fn test_trigger_with_trailing_bytes_is_not_a_trigger() {
        let mut f = fixture();
        let (socket, from) = (f.socket, f.client_addr);
        let almost = Payload::Bytes(b"GET_STREAMX".to_vec());
        f.cam.on_data(&mut f.queue, &f.net, &mut f.sink, socket, &almost, from);
        assert_eq!(f.queue.pending_len(), 0);
    }

    #[test]
    fn test_class_edits_apply_to_next_trigger() {
        let mut f = fixture();
        let extra = class(2, 40.0, 0.5);
        f.cam.add_class(Arc::clone(&extra));
        assert_eq!(f.cam.class_count(), 2);

        let (socket, from) = (f.socket, f.client_addr);
        let trigger = Payload::Bytes(STREAM_TRIGGER.to_vec());
        f.cam.on_data(&mut f.queue, &f.net, &mut f.sink, socket, &trigger, from);
        assert_eq!(f.queue.pending_len(), 2);

        assert!(f.cam.remove_class(&extra));
        assert!(!f.cam.remove_class(&extra));
        f.cam.clear_classes();
        assert_eq!(f.cam.class_count(), 0);
        // running stream unaffected by the edits
        run(&mut f, 2.25);
        assert_eq!(f.sink.tx_for_class(1).len(), 2);
        assert_eq!(f.sink.tx_for_class(2).len(), 4);
    }

    #[test]
    fn test_stop_tears_down_clients_and_events() {
        let mut f = fixture();
        let (socket, from) = (f.socket, f.client_addr);
        let trigger = Payload::Bytes(STREAM_TRIGGER.to_vec());
        f.cam.on_data(&mut f.queue, &f.net, &mut f.sink, socket, &trigger, from);

        f.cam.stop(&mut f.queue, &mut f.net);
        assert_eq!(f.cam.state(), AppState::Stopped);
        assert_eq!(f.queue.pending_len(), 0);
        assert!(!f.net.is_open(socket));
    }
}
