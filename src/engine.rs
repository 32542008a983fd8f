//! Public API (C9): the surface a caller actually drives, namely `open`,
//! `close`, `read`, `write`, and the small set of accessors. Errors are
//! local: every method returns a neutral sentinel and logs, rather than
//! propagating a `Result` across the call boundary (§7 of the design).

use std::sync::{Arc, Mutex};

use log::{error, warn};

use crate::address;
use crate::connection::Connection;
use crate::constants::{EngineConfig, INVALID_ID};
use crate::dispatch;
use crate::message::{Message, Remote};
use crate::pollset::Pollset;
use crate::pumps::Pumps;
use crate::registry::Registry;
use crate::socket_factory;
use crate::types::{ConnId, Kind, OpenRequest, Role, Transport};

const TARGET: &str = "ipconn/engine";

/// Owns the registry, pollset and pumps for one connection engine.
/// Pumps are spawned lazily on the first successful `open` and joined once
/// the registry empties again, so an idle `Engine` holds no threads.
pub struct Engine {
    registry: Arc<Registry>,
    pollset: Arc<Pollset>,
    cfg: EngineConfig,
    pumps: Mutex<Option<Pumps>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(cfg: EngineConfig) -> Self {
        let pollset = Pollset::new().expect("failed to create pollset");
        Self {
            registry: Arc::new(Registry::new()),
            pollset: Arc::new(pollset),
            cfg,
            pumps: Mutex::new(None),
        }
    }

    /// Resolves, creates, registers and pollset-arms a new connection for
    /// the given `(transport, role)` pair. `host` is the bind address for a
    /// server (`None` binds the wildcard) or the remote address for a
    /// client. Returns [`INVALID_ID`] on any failure; the specific reason
    /// is logged.
    pub fn open(&self, transport: Transport, role: Role, host: Option<&str>, port: u16) -> ConnId {
        self.open_request(OpenRequest { transport, role, host, port })
    }

    fn open_request(&self, req: OpenRequest<'_>) -> ConnId {
        let legacy = crate::pollset::IS_LEGACY;
        let resolved = match address::resolve(req.host, req.port, req.role, legacy, self.cfg.min_port) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(target: TARGET, "open failed: {e}");
                return INVALID_ID;
            }
        };
        let created = match socket_factory::create(req.transport, req.role, resolved, &self.cfg, legacy) {
            Ok(created) => created,
            Err(e) => {
                error!(target: TARGET, "open failed: {e}");
                return INVALID_ID;
            }
        };

        let kind = Kind::new(req.transport, req.role);
        let id = self.registry.next_id();
        let mut socket = created.socket;
        if let Err(e) = self.pollset.add(id, &mut socket) {
            error!(target: TARGET, "failed to arm pollset for new connection: {e}");
            return INVALID_ID;
        }
        let connection = Connection::new(
            id,
            kind,
            Some(socket),
            created.local,
            created.remote.unwrap_or(created.local),
            self.cfg.max_message_length,
            self.cfg.queue_capacity,
        );
        self.registry.insert(id, connection);
        self.ensure_pumps();
        id
    }

    fn ensure_pumps(&self) {
        let mut pumps = self.pumps.lock().unwrap_or_else(|p| p.into_inner());
        if pumps.is_none() {
            *pumps = Some(Pumps::spawn(
                self.registry.clone(),
                self.pollset.clone(),
                self.cfg.poll_timeout,
                self.cfg.write_tick,
            ));
        }
    }

    /// Idempotent with respect to an unknown id. When this drains the
    /// registry to zero, both pumps are stopped and joined.
    pub fn close(&self, id: ConnId) {
        dispatch::close_connection(id, &self.registry, &self.pollset);
        if self.registry.size() == 0 {
            let pumps = self.pumps.lock().unwrap_or_else(|p| p.into_inner()).take();
            if let Some(pumps) = pumps {
                pumps.shutdown(self.cfg.pump_join_timeout);
            }
        }
    }

    /// `"<host>/<port>"` for the connection's remote (client) or bound
    /// local (server) address; `None` for an unknown id.
    pub fn get_address(&self, id: ConnId) -> Option<String> {
        let handle = self.registry.acquire(id)?;
        let conn = handle.lock();
        let addr = if conn.is_server() { conn.local } else { conn.remote };
        Some(format!("{}/{}", addr.ip(), addr.port()))
    }

    pub fn is_server(&self, id: ConnId) -> bool {
        self.registry
            .acquire(id)
            .map(|h| h.lock().is_server())
            .unwrap_or(false)
    }

    /// 1 for a plain client connection, the live roster size for a server,
    /// 0 for an unknown id.
    pub fn get_clients_number(&self, id: ConnId) -> usize {
        let Some(handle) = self.registry.acquire(id) else {
            return 0;
        };
        let conn = handle.lock();
        if conn.is_server() {
            conn.roster.len()
        } else {
            1
        }
    }

    pub fn get_actives_number(&self) -> usize {
        self.registry.size()
    }

    /// Clamps to [`crate::constants::MAX_MESSAGE_LENGTH`] and returns the
    /// effective value; future reads/sends on `id` use it.
    pub fn set_message_length(&self, id: ConnId, n: usize) -> usize {
        let effective = n.min(crate::constants::MAX_MESSAGE_LENGTH);
        if let Some(handle) = self.registry.acquire(id) {
            handle.lock().message_length = effective;
        } else {
            warn!(target: TARGET, "setMessageLength on unknown id {id}");
        }
        effective
    }

    /// Dequeues one inbound message for a client connection, non-blocking.
    /// Returns `None` for a server id or an empty/unknown connection.
    pub fn read(&self, id: ConnId) -> Option<Vec<u8>> {
        let handle = self.registry.acquire(id)?;
        let mut conn = handle.lock();
        if conn.is_server() {
            return None;
        }
        conn.inbound.pop_front().map(|m| m.payload)
    }

    /// Enqueues `payload` non-blocking. Per the source's documented drop
    /// policy, a full queue is logged but still reports success.
    pub fn write(&self, id: ConnId, payload: &[u8]) -> bool {
        let Some(handle) = self.registry.acquire(id) else {
            return false;
        };
        let mut conn = handle.lock();
        let message_length = conn.message_length;
        let mut framed = vec![0u8; message_length];
        let n = payload.len().min(message_length);
        framed[..n].copy_from_slice(&payload[..n]);
        let remote = conn.remote;
        if !conn.push_outbound(Message::new(framed, Remote::Addr(remote))) {
            warn!(target: TARGET, "outbound queue full for {id}, dropping is not supported: accepting anyway");
        }
        true
    }

    /// Dequeues one accepted-client (TCP) or pseudo-peer (UDP) id from a
    /// server's inbound notification queue, in FIFO order.
    pub fn get_client(&self, id: ConnId) -> ConnId {
        let Some(handle) = self.registry.acquire(id) else {
            return INVALID_ID;
        };
        let mut conn = handle.lock();
        match conn.inbound.pop_front() {
            Some(Message { remote: Remote::Client(client_id), .. }) => client_id,
            Some(_) | None => INVALID_ID,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let pumps = self.pumps.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(pumps) = pumps {
            pumps.shutdown(self.cfg.pump_join_timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_port_returns_invalid_id() {
        let engine = Engine::new();
        let id = engine.open(Transport::Tcp, Role::Client, Some("127.0.0.1"), 80);
        assert_eq!(id, INVALID_ID);
        assert_eq!(engine.get_actives_number(), 0);
    }

    #[test]
    fn message_length_clamps() {
        let engine = Engine::new();
        assert_eq!(engine.set_message_length(INVALID_ID, 9000), crate::constants::MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn unknown_id_is_neutral() {
        let engine = Engine::new();
        assert_eq!(engine.get_address(999), None);
        assert!(!engine.is_server(999));
        assert_eq!(engine.get_clients_number(999), 0);
        assert_eq!(engine.read(999), None);
        assert!(!engine.write(999, b"x"));
        assert_eq!(engine.get_client(999), INVALID_ID);
    }
}
