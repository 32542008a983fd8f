//! Pollset (C3): one uniform façade over two back-end strategies, picked
//! at build time via the `legacy-select` feature, never at runtime.
//!
//! The modern backend wraps `mio::Poll` (epoll/kqueue/IOCP); the legacy
//! backend rebuilds a `select(2)` fd-set on every wait and is restricted
//! to IPv4, matching §4.1/§4.3 of the spec.

use std::io;
use std::time::Duration;

use crate::socket_factory::RawSocket;
use crate::types::ConnId;

#[cfg(not(feature = "legacy-select"))]
mod modern;
#[cfg(feature = "legacy-select")]
mod legacy;

#[cfg(not(feature = "legacy-select"))]
use modern::Pollset as Backend;
#[cfg(feature = "legacy-select")]
use legacy::Pollset as Backend;

/// Whether this build was compiled with the legacy `select`-based backend.
pub const IS_LEGACY: bool = cfg!(feature = "legacy-select");

pub struct Pollset(Backend);

impl Pollset {
    pub fn new() -> io::Result<Self> {
        Ok(Self(Backend::new()?))
    }

    /// Idempotent; arms `socket` for readability under `id`.
    #[cfg(not(feature = "legacy-select"))]
    pub fn add(&self, id: ConnId, socket: &mut RawSocket) -> io::Result<()> {
        self.0.add(id, socket.as_source_mut())
    }

    #[cfg(feature = "legacy-select")]
    pub fn add(&self, id: ConnId, socket: &mut RawSocket) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;
        self.0.add(id, socket.as_raw_fd())
    }

    #[cfg(not(feature = "legacy-select"))]
    pub fn remove(&self, id: ConnId, socket: &mut RawSocket) -> io::Result<()> {
        let _ = id;
        self.0.remove(socket.as_source_mut())
    }

    #[cfg(feature = "legacy-select")]
    pub fn remove(&self, id: ConnId, socket: &mut RawSocket) -> io::Result<()> {
        let _ = socket;
        self.0.remove(id)
    }

    /// Blocks up to `timeout`; returns the number of ready sockets.
    pub fn wait(&self, timeout: Duration) -> io::Result<usize> {
        self.0.wait(timeout)
    }

    /// Valid only between the return of `wait` and the next call to `wait`.
    pub fn is_readable(&self, id: ConnId) -> bool {
        self.0.is_readable(id)
    }
}
