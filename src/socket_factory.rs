//! Socket factory (C2): creates a socket and applies the role x transport
//! option matrix from the spec, always leaving it non-blocking and
//! `SO_REUSEADDR`.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::io::AsRawFd;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::address::{AddressKind, ResolvedAddr};
use crate::constants::EngineConfig;
use crate::error::{Error, Result};
use crate::types::{Role, Transport};

/// The concrete, already-configured socket handed back to the connection
/// layer. Both pollset backends operate on the raw fd underneath, so one
/// representation serves either.
pub enum RawSocket {
    TcpListener(mio::net::TcpListener),
    TcpStream(mio::net::TcpStream),
    Udp(mio::net::UdpSocket),
}

impl RawSocket {
    #[cfg(not(feature = "legacy-select"))]
    pub fn as_source_mut(&mut self) -> &mut dyn mio::event::Source {
        match self {
            RawSocket::TcpListener(s) => s,
            RawSocket::TcpStream(s) => s,
            RawSocket::Udp(s) => s,
        }
    }
}

impl std::os::unix::io::AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> std::os::unix::io::RawFd {
        match self {
            RawSocket::TcpListener(s) => s.as_raw_fd(),
            RawSocket::TcpStream(s) => s.as_raw_fd(),
            RawSocket::Udp(s) => s.as_raw_fd(),
        }
    }
}

pub struct Created {
    pub socket: RawSocket,
    pub local: SocketAddr,
    pub remote: Option<SocketAddr>,
}

fn wrap_socket_io<T>(res: io::Result<T>) -> Result<T> {
    res.map_err(Error::Socket)
}

fn new_raw(domain: Domain, typ: Type) -> Result<Socket> {
    let proto = if typ == Type::STREAM {
        Protocol::TCP
    } else {
        Protocol::UDP
    };
    wrap_socket_io(Socket::new(domain, typ, Some(proto)))
}

fn unspecified_like(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
        SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
    }
}

fn is_in_progress(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EINPROGRESS)
}

pub fn create(
    transport: Transport,
    role: Role,
    resolved: ResolvedAddr,
    cfg: &EngineConfig,
    legacy: bool,
) -> Result<Created> {
    match (transport, role) {
        (Transport::Tcp, Role::Server) => create_tcp_server(resolved, cfg),
        (Transport::Tcp, Role::Client) => create_tcp_client(resolved),
        (Transport::Udp, Role::Server) => create_udp_server(resolved, legacy),
        (Transport::Udp, Role::Client) => create_udp_client(resolved),
    }
}

fn create_tcp_server(resolved: ResolvedAddr, cfg: &EngineConfig) -> Result<Created> {
    let domain = Domain::for_address(resolved.addr);
    let socket = new_raw(domain, Type::STREAM)?;
    wrap_socket_io(socket.set_reuse_address(true))?;
    if domain == Domain::IPV6 {
        wrap_socket_io(socket.set_only_v6(false))?;
    }
    wrap_socket_io(socket.set_nonblocking(true))?;
    wrap_socket_io(socket.bind(&SockAddr::from(resolved.addr)))?;
    wrap_socket_io(socket.listen(cfg.tcp_listen_backlog))?;

    let local = wrap_socket_io(socket.local_addr())?
        .as_socket()
        .ok_or_else(|| Error::Socket(io::Error::new(io::ErrorKind::Other, "non-ip local addr")))?;

    let std_listener: std::net::TcpListener = socket.into();
    let listener = mio::net::TcpListener::from_std(std_listener);

    Ok(Created {
        socket: RawSocket::TcpListener(listener),
        local,
        remote: None,
    })
}

fn create_tcp_client(resolved: ResolvedAddr) -> Result<Created> {
    let domain = Domain::for_address(resolved.addr);
    let socket = new_raw(domain, Type::STREAM)?;
    wrap_socket_io(socket.set_reuse_address(true))?;
    wrap_socket_io(socket.set_nonblocking(true))?;

    match socket.connect(&SockAddr::from(resolved.addr)) {
        Ok(()) => {}
        Err(e) if is_in_progress(&e) => {}
        Err(e) => return Err(Error::Socket(e)),
    }

    let local = wrap_socket_io(socket.local_addr())?
        .as_socket()
        .unwrap_or(resolved.addr);

    let std_stream: std::net::TcpStream = socket.into();
    let stream = mio::net::TcpStream::from_std(std_stream);

    Ok(Created {
        socket: RawSocket::TcpStream(stream),
        local,
        remote: Some(resolved.addr),
    })
}

fn create_udp_server(resolved: ResolvedAddr, legacy: bool) -> Result<Created> {
    let domain = Domain::for_address(resolved.addr);
    let socket = new_raw(domain, Type::DGRAM)?;
    wrap_socket_io(socket.set_reuse_address(true))?;
    if domain == Domain::IPV6 {
        wrap_socket_io(socket.set_only_v6(false))?;
    }
    wrap_socket_io(socket.set_nonblocking(true))?;
    wrap_socket_io(socket.bind(&SockAddr::from(resolved.addr)))?;

    if legacy {
        wrap_socket_io(socket.set_broadcast(true))?;
    }

    if resolved.kind == AddressKind::Multicast {
        match resolved.addr {
            SocketAddr::V4(v4) => {
                wrap_socket_io(socket.join_multicast_v4(v4.ip(), &Ipv4Addr::UNSPECIFIED))?;
                wrap_socket_io(socket.set_multicast_ttl_v4(255))?;
            }
            SocketAddr::V6(v6) => {
                wrap_socket_io(socket.join_multicast_v6(v6.ip(), 0))?;
                wrap_socket_io(socket.set_multicast_loop_v6(true))?;
            }
        }
    }

    let local = wrap_socket_io(socket.local_addr())?
        .as_socket()
        .ok_or_else(|| Error::Socket(io::Error::new(io::ErrorKind::Other, "non-ip local addr")))?;

    let std_socket: std::net::UdpSocket = socket.into();
    let udp = mio::net::UdpSocket::from_std(std_socket);

    Ok(Created {
        socket: RawSocket::Udp(udp),
        local,
        remote: None,
    })
}

fn create_udp_client(resolved: ResolvedAddr) -> Result<Created> {
    let domain = Domain::for_address(resolved.addr);
    let socket = new_raw(domain, Type::DGRAM)?;
    wrap_socket_io(socket.set_reuse_address(true))?;
    wrap_socket_io(socket.set_nonblocking(true))?;
    wrap_socket_io(socket.bind(&SockAddr::from(unspecified_like(resolved.addr))))?;

    if resolved.kind == AddressKind::Multicast {
        match resolved.addr {
            SocketAddr::V4(v4) => {
                wrap_socket_io(socket.join_multicast_v4(v4.ip(), &Ipv4Addr::UNSPECIFIED))?;
            }
            SocketAddr::V6(v6) => {
                wrap_socket_io(socket.join_multicast_v6(v6.ip(), 0))?;
            }
        }
    }

    let local = wrap_socket_io(socket.local_addr())?
        .as_socket()
        .ok_or_else(|| Error::Socket(io::Error::new(io::ErrorKind::Other, "non-ip local addr")))?;

    let std_socket: std::net::UdpSocket = socket.into();
    let udp = mio::net::UdpSocket::from_std(std_socket);

    Ok(Created {
        socket: RawSocket::Udp(udp),
        local,
        remote: Some(resolved.addr),
    })
}
