//! Eager streaming server
//!
//! Binds a listener on start and begins streaming its full traffic profile
//! to every client the moment the connection is accepted. No handshake, no
//! trigger message; connecting is asking for the stream.

use std::collections::HashSet;
use std::net::SocketAddr;

use iotflow_sim::{
    Direction, EventQueue, Payload, SimNet, SocketId, TraceEvent, TraceSink,
};

use crate::app::AppState;
use crate::error::{Error, Result};
use crate::model::TrafficProfile;
use crate::scheduler::{ConnectionScheduler, SendFire};

pub struct PassiveApp {
    local: SocketAddr,
    state: AppState,
    profile: TrafficProfile,
    scheduler: ConnectionScheduler,
    clients: HashSet<SocketId>,
}

impl PassiveApp {
    pub fn new(local: SocketAddr, profile: TrafficProfile) -> Self {
        Self {
            local,
            state: AppState::NotStarted,
            profile,
            scheduler: ConnectionScheduler::new(),
            clients: HashSet::new(),
        }
    }

    /// Deterministic variant for reproducible runs.
    pub fn with_seed(local: SocketAddr, profile: TrafficProfile, seed: u64) -> Self {
        Self {
            local,
            state: AppState::NotStarted,
            profile,
            scheduler: ConnectionScheduler::with_seed(seed),
            clients: HashSet::new(),
        }
    }

    /// Bind the listener and start accepting. Starting twice, or after a
    /// stop, is an error.
    pub fn start(&mut self, net: &mut SimNet) -> Result<()> {
        if self.state != AppState::NotStarted {
            return Err(Error::State(format!(
                "cannot start passive app in state {}",
                self.state
            )));
        }
        net.listen(self.local)?;
        self.state = AppState::Started;
        tracing::info!(addr = %self.local, "passive app listening");
        Ok(())
    }

    /// A client connected: begin streaming every class in the profile to it.
    pub fn on_accepted<E: From<SendFire>>(
        &mut self,
        queue: &mut EventQueue<E>,
        net: &SimNet,
        socket: SocketId,
        peer: SocketAddr,
    ) {
        if self.state != AppState::Started {
            tracing::warn!(%socket, %peer, state = %self.state, "accept while not started, ignoring");
            return;
        }
        self.clients.insert(socket);
        tracing::info!(%socket, %peer, classes = self.profile.len(), "client accepted, streaming");
        self.scheduler.start_classes(queue, net, socket, self.profile.classes());
    }

    /// Incoming data is traced and otherwise discarded.
    pub fn on_data<E>(
        &mut self,
        queue: &EventQueue<E>,
        sink: &mut dyn TraceSink,
        socket: SocketId,
        payload: &Payload,
        from: SocketAddr,
    ) {
        tracing::debug!(%socket, bytes = payload.len(), %from, "data received, ignoring");
        sink.record(TraceEvent {
            dir: Direction::Rx,
            bytes: payload.len() as u32,
            class_id: 0,
            peer: from,
            at: queue.now(),
        });
    }

    /// A client went away: drop its record and cancel its send events.
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

    /// Stop streaming, close every client connection, and drop the listener.
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
        tracing::info!(addr = %self.local, "passive app stopped");
    }

    /// Replace the traffic profile. Outstanding send events for the old
    /// profile are cancelled and existing connections go quiet; only
    /// connections accepted from now on stream the new classes. This is a
    /// configuration-time operation, not meant to be called under load.
    pub fn set_traffic_profile<E>(&mut self, queue: &mut EventQueue<E>, profile: TrafficProfile) {
        self.scheduler.cancel_all(queue);
        self.profile = profile;
        tracing::info!(classes = self.profile.len(), "traffic profile replaced");
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
