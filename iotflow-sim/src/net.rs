//! In-memory connection-oriented socket table
//!
//! Models the transport the traffic engine needs: listen, connect (with an
//! accept notice delivered to the listening side), send, close, peer lookup.
//! Payloads are either literal bytes (control messages) or an opaque length
//! (streamed traffic is size-only). Deliveries are queued as notices and
//! drained by the scenario driver after each event dispatch, which keeps the
//! whole network synchronous and deterministic.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::net::SocketAddr;

use crate::error::{Error, Result};

/// Stable identifier for one endpoint of a connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What travels over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Literal bytes, for control messages like the stream trigger.
    Bytes(Vec<u8>),
    /// Opaque payload of the given size; streamed packets carry no content.
    Opaque(u32),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(b) => b.len(),
            Payload::Opaque(n) => *n as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Notice queued by the socket table for the scenario driver to route.
#[derive(Debug, Clone)]
pub enum NetNotice {
    /// A listener accepted a connection; `socket` is the accepted (server
    /// side) endpoint.
    Accepted { socket: SocketId, peer: SocketAddr },
    /// Data arrived on `socket`.
    Data { socket: SocketId, payload: Payload, from: SocketAddr },
    /// The peer closed the connection.
    Closed { socket: SocketId },
}

struct SocketState {
    peer: SocketId,
    local: SocketAddr,
    remote: SocketAddr,
    open: bool,
}

/// The socket table.
#[derive(Default)]
pub struct SimNet {
    sockets: HashMap<SocketId, SocketState>,
    listeners: HashSet<SocketAddr>,
    notices: VecDeque<NetNotice>,
    failing: HashSet<SocketId>,
    next_id: u64,
}

impl SimNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener. Fails if the address is already listening.
    pub fn listen(&mut self, addr: SocketAddr) -> Result<()> {
        if !self.listeners.insert(addr) {
            return Err(Error::AddrInUse(addr));
        }
        tracing::debug!(%addr, "listener bound");
        Ok(())
    }

    /// Drop a listener; established connections are unaffected.
    pub fn unlisten(&mut self, addr: SocketAddr) {
        self.listeners.remove(&addr);
    }

    /// Establish a connection from `local` to a listening `remote`. Returns
    /// the client-side socket; the accepted server-side socket is announced
    /// through an `Accepted` notice.
    pub fn connect(&mut self, local: SocketAddr, remote: SocketAddr) -> Result<SocketId> {
        if !self.listeners.contains(&remote) {
            return Err(Error::ConnectionRefused(remote));
        }

        let client = self.alloc_id();
        let server = self.alloc_id();
        self.sockets.insert(
            client,
            SocketState { peer: server, local, remote, open: true },
        );
        self.sockets.insert(
            server,
            SocketState { peer: client, local: remote, remote: local, open: true },
        );
        self.notices.push_back(NetNotice::Accepted { socket: server, peer: local });
        tracing::debug!(%client, %server, %local, %remote, "connection established");
        Ok(client)
    }

    /// Send a payload; queues a `Data` notice for the peer. Returns the
    /// number of bytes "sent".
    pub fn send(&mut self, id: SocketId, payload: Payload) -> Result<usize> {
        if self.failing.contains(&id) {
            return Err(Error::SendFailed(id));
        }
        let (peer, local) = match self.sockets.get(&id) {
            Some(state) if state.open => (state.peer, state.local),
            _ => return Err(Error::Closed(id)),
        };
        let len = payload.len();
        self.notices.push_back(NetNotice::Data { socket: peer, payload, from: local });
        Ok(len)
    }

    /// Close a connection. Both endpoints are torn down and the peer gets a
    /// `Closed` notice. Closing an already-closed socket is a no-op.
    pub fn close(&mut self, id: SocketId) {
        let peer = match self.sockets.get_mut(&id) {
            Some(state) if state.open => {
                state.open = false;
                state.peer
            }
            _ => return,
        };
        if let Some(peer_state) = self.sockets.get_mut(&peer) {
            if peer_state.open {
                peer_state.open = false;
                self.notices.push_back(NetNotice::Closed { socket: peer });
            }
        }
        tracing::debug!(%id, %peer, "connection closed");
    }

    pub fn is_open(&self, id: SocketId) -> bool {
        self.sockets.get(&id).map(|s| s.open).unwrap_or(false)
    }

    pub fn peer_addr(&self, id: SocketId) -> Option<SocketAddr> {
        self.sockets.get(&id).filter(|s| s.open).map(|s| s.remote)
    }

    pub fn local_addr(&self, id: SocketId) -> Option<SocketAddr> {
        self.sockets.get(&id).filter(|s| s.open).map(|s| s.local)
    }

    /// Make `send` on this socket fail until disabled. Models transient
    /// transport errors.
    pub fn fail_sends_on(&mut self, id: SocketId, enable: bool) {
        if enable {
            self.failing.insert(id);
        } else {
            self.failing.remove(&id);
        }
    }

    /// Drain queued delivery notices.
    pub fn take_notices(&mut self) -> Vec<NetNotice> {
        self.notices.drain(..).collect()
    }

    pub fn open_socket_count(&self) -> usize {
        self.sockets.values().filter(|s| s.open).count()
    }

    fn alloc_id(&mut self) -> SocketId {
        let id = SocketId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("10.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn test_connect_requires_listener() {
        let mut net = SimNet::new();
        assert!(matches!(
            net.connect(addr(1000), addr(8800)),
            Err(Error::ConnectionRefused(_))
        ));

        net.listen(addr(8800)).unwrap();
        let client = net.connect(addr(1000), addr(8800)).unwrap();
        assert!(net.is_open(client));
    }

    #[test]
    fn test_double_listen_rejected() {
        let mut net = SimNet::new();
        net.listen(addr(8800)).unwrap();
        assert!(matches!(net.listen(addr(8800)), Err(Error::AddrInUse(_))));
    }

    #[test]
    fn test_accept_notice_carries_peer() {
        let mut net = SimNet::new();
        net.listen(addr(8800)).unwrap();
        net.connect(addr(1000), addr(8800)).unwrap();

        let notices = net.take_notices();
        assert_eq!(notices.len(), 1);
        match &notices[0] {
            NetNotice::Accepted { socket, peer } => {
                assert_eq!(*peer, addr(1000));
                assert_eq!(net.peer_addr(*socket), Some(addr(1000)));
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn test_send_delivers_to_peer() {
        let mut net = SimNet::new();
        net.listen(addr(8800)).unwrap();
        let client = net.connect(addr(1000), addr(8800)).unwrap();
        net.take_notices();

        let sent = net.send(client, Payload::Opaque(1448)).unwrap();
        assert_eq!(sent, 1448);

        let notices = net.take_notices();
        match &notices[0] {
            NetNotice::Data { payload, from, .. } => {
                assert_eq!(payload.len(), 1448);
                assert_eq!(*from, addr(1000));
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn test_close_notifies_peer_and_kills_both_ends() {
        let mut net = SimNet::new();
        net.listen(addr(8800)).unwrap();
        let client = net.connect(addr(1000), addr(8800)).unwrap();
        let server = match net.take_notices().remove(0) {
            NetNotice::Accepted { socket, .. } => socket,
            other => panic!("expected Accepted, got {other:?}"),
        };

        net.close(client);
        assert!(!net.is_open(client));
        assert!(!net.is_open(server));
        assert!(matches!(net.send(server, Payload::Opaque(10)), Err(Error::Closed(_))));

        let notices = net.take_notices();
        assert!(matches!(notices[0], NetNotice::Closed { socket } if socket == server));
    }

    #[test]
    fn test_injected_send_failure() {
        let mut net = SimNet::new();
        net.listen(addr(8800)).unwrap();
        let client = net.connect(addr(1000), addr(8800)).unwrap();
        net.take_notices();

        net.fail_sends_on(client, true);
        assert!(matches!(net.send(client, Payload::Opaque(1)), Err(Error::SendFailed(_))));
        net.fail_sends_on(client, false);
        assert!(net.send(client, Payload::Opaque(1)).is_ok());
    }
}
