//! Small shared vocabulary types.

use std::fmt;

/// Stable numeric identifier, unique for the lifetime of an [`Engine`](crate::Engine).
///
/// The public API surfaces ids as `i64` to match the source's signed wide
/// integer contract (`invalidId = -1`); internally a valid id is always
/// non-negative and fits a `u64`.
pub type ConnId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Server,
    Client,
}

/// The closed set of role x transport variants a connection can be.
///
/// Replaces the source's per-connection function-pointer table
/// (`receive`/`send`/`close`) with a plain enum dispatched on in
/// `crate::dispatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    TcpServer,
    TcpClient,
    UdpServer,
    UdpClient,
    /// A pseudo-connection a `UdpServer` spawns the first time it observes
    /// a new peer address, so that peer can be read from its own id (per
    /// the spec's `read` being "client connections only"). It owns no
    /// socket of its own: `Connection::socket` is `None` and all I/O is
    /// actually performed against the parent server's shared socket.
    UdpPeer,
}

impl Kind {
    pub fn new(transport: Transport, role: Role) -> Self {
        match (transport, role) {
            (Transport::Tcp, Role::Server) => Kind::TcpServer,
            (Transport::Tcp, Role::Client) => Kind::TcpClient,
            (Transport::Udp, Role::Server) => Kind::UdpServer,
            (Transport::Udp, Role::Client) => Kind::UdpClient,
        }
    }

    pub fn transport(self) -> Transport {
        match self {
            Kind::TcpServer | Kind::TcpClient => Transport::Tcp,
            Kind::UdpServer | Kind::UdpClient | Kind::UdpPeer => Transport::Udp,
        }
    }

    pub fn role(self) -> Role {
        match self {
            Kind::TcpServer | Kind::UdpServer => Role::Server,
            Kind::TcpClient | Kind::UdpClient | Kind::UdpPeer => Role::Client,
        }
    }
}

/// Open request, as accepted by `Engine::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenRequest<'a> {
    pub transport: Transport,
    pub role: Role,
    pub host: Option<&'a str>,
    pub port: u16,
}
