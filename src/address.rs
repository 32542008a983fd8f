//! Address resolution (C1): turns `(host, port)` into a [`ResolvedAddr`],
//! classifying unicast/multicast/broadcast literals along the way.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::types::Role;

/// Classification of a resolved address, used by the socket factory to
/// decide whether multicast-join / broadcast options are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Unicast,
    Multicast,
    Broadcast,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedAddr {
    pub addr: SocketAddr,
    pub kind: AddressKind,
}

fn classify(ip: IpAddr) -> AddressKind {
    match ip {
        IpAddr::V4(v4) => {
            if v4 == Ipv4Addr::BROADCAST {
                AddressKind::Broadcast
            } else if v4.octets()[0] & 0xF0 == 0xE0 {
                // 224.0.0.0/4
                AddressKind::Multicast
            } else {
                AddressKind::Unicast
            }
        }
        IpAddr::V6(v6) => {
            if (v6.segments()[0] & 0xFF00) == 0xFF00 {
                // FF00::/8
                AddressKind::Multicast
            } else {
                AddressKind::Unicast
            }
        }
    }
}

/// Resolves `host`/`port` for the given role.
///
/// `host == None` is only valid for a server, and yields the IPv6 wildcard
/// address (dual-stack, serving IPv4 clients too) unless `legacy` forces
/// IPv4. A client with `host == None` is an `ErrAddressInvalid`.
pub fn resolve(
    host: Option<&str>,
    port: u16,
    role: Role,
    legacy: bool,
    min_port: u16,
) -> Result<ResolvedAddr> {
    if port < min_port {
        return Err(Error::PortReserved { port, min: min_port });
    }

    let ip = match host {
        None => {
            if role != Role::Server {
                return Err(Error::AddressInvalid { host: None });
            }
            if legacy {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            } else {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            }
        }
        Some(h) => h.parse::<IpAddr>().map_err(|_| Error::AddressInvalid {
            host: Some(h.to_string()),
        })?,
    };

    if legacy && ip.is_ipv6() {
        return Err(Error::AddressInvalid {
            host: host.map(str::to_string),
        });
    }

    let kind = classify(ip);
    Ok(ResolvedAddr {
        addr: SocketAddr::new(ip, port),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reserved_ports() {
        let err = resolve(Some("127.0.0.1"), 80, Role::Client, false, 49152);
        assert!(matches!(err, Err(Error::PortReserved { .. })));
    }

    #[test]
    fn server_without_host_binds_wildcard() {
        let resolved = resolve(None, 50000, Role::Server, false, 49152).unwrap();
        assert!(resolved.addr.ip().is_unspecified());
        assert_eq!(resolved.kind, AddressKind::Unicast);
    }

    #[test]
    fn server_with_explicit_host_binds_it() {
        let resolved = resolve(Some("127.0.0.1"), 50000, Role::Server, false, 49152).unwrap();
        assert_eq!(resolved.addr.ip(), Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn client_without_host_is_invalid() {
        let err = resolve(None, 50000, Role::Client, false, 49152);
        assert!(matches!(err, Err(Error::AddressInvalid { .. })));
    }

    #[test]
    fn classifies_multicast_and_broadcast() {
        let m = resolve(Some("239.1.2.3"), 50000, Role::Client, false, 49152).unwrap();
        assert_eq!(m.kind, AddressKind::Multicast);

        let b = resolve(Some("255.255.255.255"), 50000, Role::Client, false, 49152).unwrap();
        assert_eq!(b.kind, AddressKind::Broadcast);

        let v6m = resolve(Some("ff02::1"), 50000, Role::Client, false, 49152).unwrap();
        assert_eq!(v6m.kind, AddressKind::Multicast);
    }

    #[test]
    fn legacy_mode_rejects_ipv6() {
        let err = resolve(Some("::1"), 50000, Role::Client, true, 49152);
        assert!(matches!(err, Err(Error::AddressInvalid { .. })));
    }
}
