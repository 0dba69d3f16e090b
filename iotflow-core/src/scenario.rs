//! Scenario driver
//!
//! Owns the clock, the socket table, one server application, and any number
//! of stream clients, and runs the event loop: pop the next due event,
//! dispatch it, then drain and route delivery notices until the network is
//! quiet. Single-threaded and deterministic; two runs with the same seeds
//! and timeline produce identical traces.

use std::net::SocketAddr;

use iotflow_sim::{EventQueue, NetNotice, SimNet, SimTime, SocketId, TraceSink};

use crate::app::{AppState, Camera, PassiveApp, StreamClient};
use crate::error::Result;
use crate::scheduler::SendFire;

/// Everything the driver's queue can dispatch.
#[derive(Debug)]
pub enum SimEvent {
    /// A scheduled packet send.
    Send(SendFire),
    /// A client connects and requests the stream.
    ClientConnect { idx: usize },
    /// A client disconnects.
    ClientStop { idx: usize },
    /// The server application stops.
    ServerStop,
}

impl From<SendFire> for SimEvent {
    fn from(fire: SendFire) -> Self {
        SimEvent::Send(fire)
    }
}

/// The server role under test.
pub enum ServerApp {
    Passive(PassiveApp),
    Camera(Camera),
}

impl ServerApp {
    fn start(&mut self, net: &mut SimNet) -> Result<()> {
        match self {
            ServerApp::Passive(app) => app.start(net),
            ServerApp::Camera(cam) => cam.start(net),
        }
    }

    fn on_accepted(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        net: &SimNet,
        socket: SocketId,
        peer: SocketAddr,
    ) {
        match self {
            ServerApp::Passive(app) => app.on_accepted(queue, net, socket, peer),
            ServerApp::Camera(cam) => cam.on_accepted(socket, peer),
        }
    }

    fn on_data(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        net: &SimNet,
        sink: &mut dyn TraceSink,
        socket: SocketId,
        payload: &iotflow_sim::Payload,
        from: SocketAddr,
    ) {
        match self {
            ServerApp::Passive(app) => app.on_data(queue, sink, socket, payload, from),
            ServerApp::Camera(cam) => cam.on_data(queue, net, sink, socket, payload, from),
        }
    }

    fn on_closed(&mut self, queue: &mut EventQueue<SimEvent>, socket: SocketId) {
        match self {
            ServerApp::Passive(app) => app.on_closed(queue, socket),
            ServerApp::Camera(cam) => cam.on_closed(queue, socket),
        }
    }

    fn on_send_fire(
        &mut self,
        queue: &mut EventQueue<SimEvent>,
        net: &mut SimNet,
        sink: &mut dyn TraceSink,
        fire: SendFire,
    ) {
        match self {
            ServerApp::Passive(app) => app.on_send_fire(queue, net, sink, fire),
            ServerApp::Camera(cam) => cam.on_send_fire(queue, net, sink, fire),
        }
    }

    fn stop(&mut self, queue: &mut EventQueue<SimEvent>, net: &mut SimNet) {
        match self {
            ServerApp::Passive(app) => app.stop(queue, net),
            ServerApp::Camera(cam) => cam.stop(queue, net),
        }
    }

    pub fn state(&self) -> AppState {
        match self {
            ServerApp::Passive(app) => app.state(),
            ServerApp::Camera(cam) => cam.state(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        match self {
            ServerApp::Passive(app) => app.local_addr(),
            ServerApp::Camera(cam) => cam.local_addr(),
        }
    }
}

pub struct Scenario<S: TraceSink> {
    queue: EventQueue<SimEvent>,
    net: SimNet,
    server: ServerApp,
    clients: Vec<StreamClient>,
    sink: S,
}

impl<S: TraceSink> Scenario<S> {
    pub fn new(server: ServerApp, sink: S) -> Self {
        Self {
            queue: EventQueue::new(),
            net: SimNet::new(),
            server,
            clients: Vec::new(),
            sink,
        }
    }

    /// Start the server application immediately (binds its listener).
    pub fn start_server(&mut self) -> Result<()> {
        self.server.start(&mut self.net)
    }

    /// Register a client that connects (and requests the stream) at `at`.
    /// Returns the client's index.
    pub fn add_client(&mut self, local: SocketAddr, at: SimTime) -> usize {
        let idx = self.clients.len();
        self.clients.push(StreamClient::new(local, self.server.local_addr()));
        self.queue.schedule_at(at, SimEvent::ClientConnect { idx });
        idx
    }

    pub fn stop_client_at(&mut self, idx: usize, at: SimTime) {
        self.queue.schedule_at(at, SimEvent::ClientStop { idx });
    }

    pub fn stop_server_at(&mut self, at: SimTime) {
        self.queue.schedule_at(at, SimEvent::ServerStop);
    }

    /// Run the event loop until the clock reaches `until` or the queue
    /// empties, whichever comes first.
    pub fn run_until(&mut self, until: SimTime) {
        self.drain_net();
        while let Some((_, _, event)) = self.queue.pop_due(until) {
            self.dispatch(event);
            self.drain_net();
        }
        self.queue.advance_to(until);
    }

    fn dispatch(&mut self, event: SimEvent) {
        match event {
            SimEvent::Send(fire) => {
                self.server.on_send_fire(&mut self.queue, &mut self.net, &mut self.sink, fire);
            }
            SimEvent::ClientConnect { idx } => {
                if let Err(e) = self.clients[idx].start(&mut self.net) {
                    tracing::warn!(client = idx, error = %e, "client failed to connect");
                }
            }
            SimEvent::ClientStop { idx } => {
                self.clients[idx].stop(&mut self.net);
            }
            SimEvent::ServerStop => {
                self.server.stop(&mut self.queue, &mut self.net);
            }
        }
    }

    /// Route queued delivery notices until the network is quiet. Routing can
    /// itself queue more notices (a trigger answered by a close, say), hence
    /// the loop.
    fn drain_net(&mut self) {
        loop {
            let notices = self.net.take_notices();
            if notices.is_empty() {
                break;
            }
            for notice in notices {
                match notice {
                    NetNotice::Accepted { socket, peer } => {
                        self.server.on_accepted(&mut self.queue, &self.net, socket, peer);
                    }
                    NetNotice::Data { socket, payload, from } => {
                        match self.client_index(socket) {
                            Some(idx) => self.clients[idx].on_data(
                                &self.queue,
                                &mut self.sink,
                                &payload,
                                from,
                            ),
                            None => self.server.on_data(
                                &mut self.queue,
                                &self.net,
                                &mut self.sink,
                                socket,
                                &payload,
                                from,
                            ),
                        }
                    }
                    NetNotice::Closed { socket } => match self.client_index(socket) {
                        Some(idx) => self.clients[idx].on_closed(socket),
                        None => self.server.on_closed(&mut self.queue, socket),
                    },
                }
            }
        }
    }

    fn client_index(&self, socket: SocketId) -> Option<usize> {
        self.clients.iter().position(|c| c.socket() == Some(socket))
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn server(&self) -> &ServerApp {
        &self.server
    }

    pub fn client(&self, idx: usize) -> &StreamClient {
        &self.clients[idx]
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
