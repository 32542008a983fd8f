//! Transport dispatch (C4): the four role x transport `receive`/`send`
//! behaviors, plus the shared `close`. Replaces the source's per-connection
//! function-pointer table with plain matches on [`Kind`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};

use log::{debug, warn};

use crate::connection::{Connection, Roster};
use crate::message::{Message, Remote};
use crate::pollset::Pollset;
use crate::registry::Registry;
use crate::socket_factory::RawSocket;
use crate::types::{ConnId, Kind};

const TARGET: &str = "ipconn/dispatch";

/// Drives one readiness event for `id`: acquires, checks back-pressure,
/// calls the kind-specific receive, releases. Never holds `id`'s lock
/// while touching another connection; `close_connection` is run only
/// after this function's own guard has been dropped.
pub fn receive(id: ConnId, registry: &Registry, pollset: &Pollset) {
    let Some(handle) = registry.acquire(id) else {
        return;
    };
    let mut should_close = false;
    {
        let mut conn = handle.lock();
        if !conn.inbound_full() {
            match conn.kind {
                Kind::TcpClient => should_close = receive_tcp_client(&mut conn, id, pollset),
                Kind::UdpClient => receive_udp_client(&mut conn, id, pollset),
                Kind::TcpServer => receive_tcp_server(&mut conn, id, registry, pollset),
                Kind::UdpServer => receive_udp_server(&mut conn, id, registry),
                Kind::UdpPeer => {}
            }
        }
        // mio delivers readiness edge-triggered: a connection that stopped
        // draining early (inbound full) would otherwise starve, since the
        // fd itself won't transition to "newly ready" again on its own.
        // Re-arm even when the queue was already full on entry, so a
        // drain by the caller is followed by a fresh readiness check.
        if !should_close {
            if let Some(socket) = conn.socket.as_mut() {
                let _ = pollset.add(id, socket);
            }
        }
    }
    if should_close {
        close_connection(id, registry, pollset);
    }
}

/// Returns `true` if the connection should be closed (remote FIN or a
/// genuine recv error). The caller closes it once this function's borrow
/// of `conn` has ended, so no other connection's lock is held here.
fn receive_tcp_client(conn: &mut Connection, id: ConnId, pollset: &Pollset) -> bool {
    if !pollset.is_readable(id) {
        return false;
    }
    let message_length = conn.message_length;
    loop {
        if conn.inbound.len() >= conn.queue_capacity {
            return false;
        }
        let mut buf = vec![0u8; message_length];
        let result = match conn.socket.as_mut() {
            Some(RawSocket::TcpStream(stream)) => stream.read(&mut buf),
            _ => return false,
        };
        match result {
            Ok(0) => {
                debug!(target: TARGET, "peer closed tcp client {id}");
                return true;
            }
            Ok(_n) => {
                let remote = conn.remote;
                conn.push_inbound(Message::new(buf, Remote::Addr(remote)));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
            Err(e) => {
                warn!(target: TARGET, "recv failed on {id}: {e}");
                return true;
            }
        }
    }
}

fn receive_udp_client(conn: &mut Connection, id: ConnId, pollset: &Pollset) {
    if !pollset.is_readable(id) {
        return;
    }
    let message_length = conn.message_length;
    loop {
        if conn.inbound.len() >= conn.queue_capacity {
            break;
        }
        let mut buf = vec![0u8; message_length];
        let result = match conn.socket.as_mut() {
            Some(RawSocket::Udp(sock)) => sock.recv_from(&mut buf),
            _ => return,
        };
        match result {
            Ok((_n, src)) => {
                if src == conn.remote {
                    conn.push_inbound(Message::new(buf, Remote::Addr(src)));
                } else {
                    debug!(target: TARGET, "udp client {id} dropped datagram from unexpected {src}");
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(target: TARGET, "recv failed on {id}: {e}");
                break;
            }
        }
    }
}

fn receive_tcp_server(conn: &mut Connection, id: ConnId, registry: &Registry, pollset: &Pollset) {
    if !pollset.is_readable(id) {
        return;
    }
    let message_length = conn.message_length;
    let queue_capacity = conn.queue_capacity;
    loop {
        if conn.inbound.len() >= conn.queue_capacity {
            break;
        }
        let result = match conn.socket.as_mut() {
            Some(RawSocket::TcpListener(listener)) => listener.accept(),
            _ => return,
        };
        match result {
            Ok((stream, peer)) => {
                let local = stream.local_addr().unwrap_or(conn.local);
                let client_id = registry.next_id();
                let mut client = Connection::new(
                    client_id,
                    Kind::TcpClient,
                    Some(RawSocket::TcpStream(stream)),
                    local,
                    peer,
                    message_length,
                    queue_capacity,
                );
                client.accepted_by = Some(id);
                if let Some(socket) = client.socket.as_mut() {
                    if let Err(e) = pollset.add(client_id, socket) {
                        warn!(target: TARGET, "failed to register accepted client {client_id}: {e}");
                        continue;
                    }
                }
                registry.insert(client_id, client);
                if let Roster::TcpClients(ids) = &mut conn.roster {
                    ids.push(client_id);
                }
                conn.push_inbound(Message::new(Vec::new(), Remote::Client(client_id)));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(target: TARGET, "accept failed on {id}: {e}");
                break;
            }
        }
    }
}

fn receive_udp_server(conn: &mut Connection, id: ConnId, registry: &Registry) {
    let message_length = conn.message_length;
    loop {
        if conn.inbound.len() >= conn.queue_capacity {
            break;
        }
        let mut buf = vec![0u8; message_length];
        let result = match conn.socket.as_mut() {
            Some(RawSocket::Udp(sock)) => sock.recv_from(&mut buf),
            _ => return,
        };
        match result {
            Ok((_n, src)) => {
                let known = match &conn.roster {
                    Roster::UdpPeers(m) => m.contains_key(&src),
                    _ => false,
                };
                if !known {
                    let peer_id = registry.next_id();
                    let mut peer_conn = Connection::new(
                        peer_id,
                        Kind::UdpPeer,
                        None,
                        conn.local,
                        src,
                        message_length,
                        conn.queue_capacity,
                    );
                    peer_conn.accepted_by = Some(id);
                    registry.insert(peer_id, peer_conn);
                    if let Roster::UdpPeers(m) = &mut conn.roster {
                        m.insert(src, peer_id);
                    }
                    conn.push_inbound(Message::new(Vec::new(), Remote::Client(peer_id)));
                }
                let peer_id = match &conn.roster {
                    Roster::UdpPeers(m) => m.get(&src).copied(),
                    _ => None,
                };
                if let Some(peer_id) = peer_id {
                    if let Some(handle) = registry.acquire(peer_id) {
                        handle.lock().push_inbound(Message::new(buf, Remote::Addr(src)));
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(target: TARGET, "recvfrom failed on {id}: {e}");
                break;
            }
        }
    }
}

/// Pending fan-out work handed back by the locked stage of `send_one`, so
/// the actual per-client sends happen after the server's own lock is
/// dropped (a TCP server's roster entries are independent connections
/// with their own locks).
enum Fanout {
    None,
    Tcp(Message, Vec<ConnId>),
}

/// Drains and sends at most one outbound message for `id`. Removes the
/// connection on a genuine (non-transient) send error, the sole removal
/// trigger the write pump exercises, per the spec. Never holds `id`'s
/// lock while touching another connection.
pub fn send_one(id: ConnId, registry: &Registry, pollset: &Pollset) {
    let Some(handle) = registry.acquire(id) else {
        return;
    };
    let mut fatal = false;
    let mut fanout = Fanout::None;
    {
        let mut conn = handle.lock();
        match conn.kind {
            Kind::TcpClient | Kind::UdpClient => fatal = send_unicast(&mut conn),
            Kind::UdpServer => send_fanout_udp(&mut conn),
            Kind::TcpServer => fanout = prepare_tcp_fanout(&mut conn),
            Kind::UdpPeer => {}
        }
    }
    if let Fanout::Tcp(message, ids) = fanout {
        for cid in ids {
            if let Some(client_handle) = registry.acquire(cid) {
                let mut client = client_handle.lock();
                if let Some(RawSocket::TcpStream(s)) = client.socket.as_mut() {
                    if let Err(e) = s.write(&message.payload) {
                        warn!(target: TARGET, "fan-out send to {cid} failed: {e}");
                    }
                }
            }
        }
    }
    if fatal {
        close_connection(id, registry, pollset);
    }
}

fn send_unicast(conn: &mut Connection) -> bool {
    let Some(message) = conn.outbound.pop_front() else {
        return false;
    };
    let remote = conn.remote;
    let result = match conn.socket.as_mut() {
        Some(RawSocket::TcpStream(s)) => s.write(&message.payload).map(|_| ()),
        Some(RawSocket::Udp(s)) => s.send_to(&message.payload, remote).map(|_| ()),
        _ => return false,
    };
    match result {
        Ok(()) => false,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            // Transient: requeue and retry on the next tick rather than
            // tearing the connection down (an explicit deviation the spec
            // allows implementers to make, §9 Open Questions).
            conn.outbound.push_front(message);
            false
        }
        Err(e) => {
            warn!(target: TARGET, "send failed on {}: {e}", conn.id);
            true
        }
    }
}

/// UDP fan-out never needs another connection's lock: a pseudo-peer owns
/// no socket of its own, so every datagram goes out through the server's
/// own (already locked) socket.
fn send_fanout_udp(conn: &mut Connection) {
    let Some(message) = conn.outbound.pop_front() else {
        return;
    };
    let Roster::UdpPeers(map) = &conn.roster else {
        return;
    };
    let peers: Vec<SocketAddr> = map.keys().copied().collect();
    if let Some(RawSocket::Udp(sock)) = conn.socket.as_mut() {
        for addr in peers {
            if let Err(e) = sock.send_to(&message.payload, addr) {
                warn!(target: TARGET, "fan-out send to {addr} failed: {e}");
            }
        }
    }
}

/// Pops one outbound message and snapshots the roster ids; the actual
/// per-client sends happen in the caller, after this server's lock is
/// released.
fn prepare_tcp_fanout(conn: &mut Connection) -> Fanout {
    let Some(message) = conn.outbound.pop_front() else {
        return Fanout::None;
    };
    match &conn.roster {
        Roster::TcpClients(ids) => Fanout::Tcp(message, ids.clone()),
        _ => Fanout::None,
    }
}

/// Shuts down and removes `id`; detaches it from any parent roster and, for
/// a UDP server whose socket is shared with its pseudo-peer children,
/// drops those children too (their "socket" was never more than a
/// reference into the server's). Acquires and locks `id` itself, and
/// locks its parent only after that lock has been released, so no two
/// connections are ever locked at once.
pub fn close_connection(id: ConnId, registry: &Registry, pollset: &Pollset) {
    let Some(handle) = registry.acquire(id) else {
        return;
    };
    let (is_udp_server, parent_id) = {
        let mut conn = handle.lock();
        if let Some(socket) = conn.socket.as_mut() {
            let _ = pollset.remove(id, socket);
            if let RawSocket::TcpStream(s) = socket {
                let _ = s.shutdown(Shutdown::Both);
            }
        }
        conn.socket = None;
        (conn.kind == Kind::UdpServer, conn.accepted_by.take())
    };

    if is_udp_server {
        // Re-lock briefly just to read the roster; cheap, and still never
        // overlaps with another connection's lock.
        let peer_ids: Vec<ConnId> = {
            let conn = handle.lock();
            match &conn.roster {
                Roster::UdpPeers(map) => map.values().copied().collect(),
                _ => Vec::new(),
            }
        };
        for peer_id in peer_ids {
            registry.remove(peer_id);
        }
    }

    registry.remove(id);

    if let Some(parent_id) = parent_id {
        if let Some(parent) = registry.acquire(parent_id) {
            let mut parent_conn = parent.lock();
            match &mut parent_conn.roster {
                Roster::TcpClients(ids) => ids.retain(|&cid| cid != id),
                Roster::UdpPeers(map) => map.retain(|_, &mut cid| cid != id),
                Roster::None => {}
            }
        }
    }

    debug!(target: TARGET, "closed connection {id}");
}
