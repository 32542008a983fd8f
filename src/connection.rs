//! Connection object (C5): one per opened endpoint.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use crate::message::Message;
use crate::socket_factory::RawSocket;
use crate::types::{ConnId, Kind};

/// Server-side collection of known clients.
///
/// TCP servers hold the ids of their accepted client connections; UDP
/// servers hold peer addresses, each mapped to the pseudo-connection id
/// spawned for it: the datagram socket itself stays owned by the server
/// connection (invariant 5 of the spec).
pub enum Roster {
    None,
    TcpClients(Vec<ConnId>),
    UdpPeers(HashMap<SocketAddr, ConnId>),
}

impl Roster {
    pub fn len(&self) -> usize {
        match self {
            Roster::None => 0,
            Roster::TcpClients(v) => v.len(),
            Roster::UdpPeers(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Connection {
    pub id: ConnId,
    pub kind: Kind,
    /// `None` for a [`Kind::UdpPeer`] pseudo-connection, which performs all
    /// I/O through its parent server's socket instead.
    pub socket: Option<RawSocket>,
    pub local: SocketAddr,
    /// Peer of a client connection, or the accepted/observed peer of a
    /// server-spawned client (TCP accepted socket, UDP pseudo-peer).
    pub remote: SocketAddr,
    pub inbound: VecDeque<Message>,
    pub outbound: VecDeque<Message>,
    pub message_length: usize,
    pub queue_capacity: usize,
    pub roster: Roster,
    /// Set on a connection spawned by a server: that server's id.
    pub accepted_by: Option<ConnId>,
}

impl Connection {
    pub fn new(
        id: ConnId,
        kind: Kind,
        socket: Option<RawSocket>,
        local: SocketAddr,
        remote: SocketAddr,
        message_length: usize,
        queue_capacity: usize,
    ) -> Self {
        let roster = match kind {
            Kind::TcpServer => Roster::TcpClients(Vec::new()),
            Kind::UdpServer => Roster::UdpPeers(HashMap::new()),
            Kind::TcpClient | Kind::UdpClient | Kind::UdpPeer => Roster::None,
        };
        Self {
            id,
            kind,
            socket,
            local,
            remote,
            inbound: VecDeque::with_capacity(queue_capacity),
            outbound: VecDeque::with_capacity(queue_capacity),
            message_length,
            queue_capacity,
            roster,
            accepted_by: None,
        }
    }

    pub fn is_server(&self) -> bool {
        self.kind.role() == crate::types::Role::Server
    }

    pub fn inbound_full(&self) -> bool {
        self.inbound.len() >= self.queue_capacity
    }

    pub fn outbound_full(&self) -> bool {
        self.outbound.len() >= self.queue_capacity
    }

    /// Enqueues without blocking; returns `false` (queue full) on overflow.
    /// Callers still treat this as success per the spec's drop policy.
    pub fn push_outbound(&mut self, message: Message) -> bool {
        if self.outbound_full() {
            return false;
        }
        self.outbound.push_back(message);
        true
    }

    pub fn push_inbound(&mut self, message: Message) -> bool {
        if self.inbound_full() {
            return false;
        }
        self.inbound.push_back(message);
        true
    }

    /// Diagnostic byte counters, carried over from the source's
    /// `Socket::recv_q`/`send_q` fields.
    pub fn queued_bytes(&self) -> (usize, usize) {
        let inbound: usize = self.inbound.iter().map(|m| m.payload.len()).sum();
        let outbound: usize = self.outbound.iter().map(|m| m.payload.len()).sum();
        (inbound, outbound)
    }
}
