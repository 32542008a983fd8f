//! The fixed-width record passed through inbound/outbound queues.

use std::net::SocketAddr;

use crate::ConnId;

/// Identifies the source or destination peer of a [`Message`].
///
/// UDP connections tag messages with the peer's socket address; TCP
/// servers tag them with the accepted client's connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remote {
    Addr(SocketAddr),
    Client(ConnId),
}

/// A fixed-width payload plus its peer identifier.
///
/// `payload` always holds exactly the connection's `message_length` bytes
/// at the time the message was enqueued; trailing bytes beyond the
/// logical content are zero-filled, not "undefined" as in the source,
/// since we allocate with `vec![0; len]` rather than reusing a scratch
/// buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Vec<u8>,
    pub remote: Remote,
}

impl Message {
    pub fn new(payload: Vec<u8>, remote: Remote) -> Self {
        Self { payload, remote }
    }
}
