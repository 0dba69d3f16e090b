//! Per-connection packet scheduler
//!
//! For every accepted connection this keeps one live send event per started
//! traffic class, perpetually rescheduled: fire, send, draw a new
//! inter-packet time, schedule the next fire. The per-connection records own
//! their event handles, so dropping a record (connection closed, application
//! stopped, profile replaced) cancels everything it scheduled; no timer
//! callback can fire into state that is gone.
//!
//! A transport send failure is transient by design assumption: it is logged
//! and the class keeps rescheduling. A fire on a connection that is no
//! longer tracked is the expected close/fire race and is dropped silently.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use iotflow_sim::{
    Direction, EventId, EventQueue, Payload, SimNet, SimTime, SocketId, TraceEvent, TraceSink,
};

use crate::app::AppState;
use crate::model::TrafficClass;

/// Payload of a scheduled send event. The scenario's event enum must embed
/// this via `From`.
#[derive(Debug, Clone)]
pub struct SendFire {
    pub socket: SocketId,
    /// Index of the class's slot in its connection record.
    pub slot: usize,
    pub class: Arc<TrafficClass>,
}

struct Slot {
    event: EventId,
}

/// Arena of per-connection scheduling state, keyed by the stable socket id.
pub struct ConnectionScheduler {
    rng: SmallRng,
    connections: HashMap<SocketId, Vec<Slot>>,
}

impl ConnectionScheduler {
    pub fn new() -> Self {
        Self { rng: SmallRng::from_os_rng(), connections: HashMap::new() }
    }

    /// Deterministic scheduler for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: SmallRng::seed_from_u64(seed), connections: HashMap::new() }
    }

    /// Start every class in `classes` on `conn`: draw an initial
    /// inter-packet time per class and schedule the first fire. Calling
    /// again for the same connection adds further independent streams.
    /// Starting on a closed or unknown socket is a logged no-op.
    pub fn start_classes<E: From<SendFire>>(
        &mut self,
        queue: &mut EventQueue<E>,
        net: &SimNet,
        conn: SocketId,
        classes: &[Arc<TrafficClass>],
    ) {
        if !net.is_open(conn) {
            tracing::warn!(socket = %conn, "start requested on a closed connection, ignoring");
            return;
        }
        let slots = self.connections.entry(conn).or_default();
        for class in classes {
            let delay = SimTime::from_secs_f64(class.inter_packet_time(&mut self.rng));
            let slot = slots.len();
            let fire = SendFire { socket: conn, slot, class: Arc::clone(class) };
            let event = queue.schedule_in(delay, fire.into());
            slots.push(Slot { event });
            tracing::debug!(
                socket = %conn,
                class_id = class.id(),
                delay_s = delay.as_secs_f64(),
                "traffic class scheduled"
            );
        }
    }

    /// Handle a fired send event: send one packet of a freshly drawn size,
    /// trace it, and schedule the next fire. Stops silently when the
    /// connection is gone or the application is not started.
    pub fn on_send_fire<E: From<SendFire>>(
        &mut self,
        queue: &mut EventQueue<E>,
        net: &mut SimNet,
        sink: &mut dyn TraceSink,
        state: AppState,
        fire: SendFire,
    ) {
        let Some(slots) = self.connections.get_mut(&fire.socket) else {
            // close/fire race: the connection record is already gone
            tracing::debug!(socket = %fire.socket, "send fired after connection teardown");
            return;
        };
        if state != AppState::Started {
            tracing::debug!(%state, "send fired while application not started, dropping");
            return;
        }
        let Some(peer) = net.peer_addr(fire.socket) else {
            tracing::debug!(socket = %fire.socket, "send fired on closed socket, dropping");
            return;
        };

        let size = fire.class.payload_size(&mut self.rng);
        match net.send(fire.socket, Payload::Opaque(size)) {
            Ok(sent) => {
                sink.record(TraceEvent {
                    dir: Direction::Tx,
                    bytes: sent as u32,
                    class_id: fire.class.id(),
                    peer,
                    at: queue.now(),
                });
                tracing::debug!(
                    bytes = sent,
                    class_id = fire.class.id(),
                    %peer,
                    "packet sent"
                );
            }
            Err(e) => {
                // transient transport failure: keep the stream alive
                tracing::error!(socket = %fire.socket, error = %e, "failed to send packet");
            }
        }

        let delay = SimTime::from_secs_f64(fire.class.inter_packet_time(&mut self.rng));
        let socket = fire.socket;
        let slot = fire.slot;
        let next = queue.schedule_in(delay, fire.into());
        match slots.get_mut(slot) {
            Some(entry) => entry.event = next,
            None => {
                // record was rebuilt under us; never leak the handle
                queue.cancel(next);
                tracing::warn!(%socket, slot, "stale send slot, cancelling reschedule");
            }
        }
    }

    /// Cancel every outstanding event for `conn` and drop its record. Safe
    /// no-op when the connection is unknown or has nothing scheduled.
    pub fn cancel_connection<E>(&mut self, queue: &mut EventQueue<E>, conn: SocketId) {
        if let Some(slots) = self.connections.remove(&conn) {
            for slot in &slots {
                queue.cancel(slot.event);
            }
            tracing::debug!(socket = %conn, cancelled = slots.len(), "connection events cancelled");
        }
    }

    /// Cancel every outstanding event for every connection. The
    /// application-stop path.
    pub fn cancel_all<E>(&mut self, queue: &mut EventQueue<E>) {
        for (_, slots) in self.connections.drain() {
            for slot in &slots {
                queue.cancel(slot.event);
            }
        }
    }

    pub fn is_tracking(&self, conn: SocketId) -> bool {
        self.connections.contains_key(&conn)
    }

    /// Number of event slots held for `conn` (one per started class stream).
    pub fn slots_for(&self, conn: SocketId) -> usize {
        self.connections.get(&conn).map(Vec::len).unwrap_or(0)
    }
}

impl Default for ConnectionScheduler {
    fn default() -> Self {
        Self::new()
    }
}
