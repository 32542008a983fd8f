//! Error taxonomy.
//!
//! These are internal kinds, not a public exception channel: the API
//! surface in [`crate::engine`] absorbs every one of them into a return
//! sentinel (`None`, `false`, [`crate::INVALID_ID`]) and logs the detail
//! via the `log` facade, matching the source's "errors are local" policy.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("address could not be resolved: {host:?}")]
    AddressInvalid { host: Option<String> },

    #[error("port {port} is below the dynamic range (>= {min})")]
    PortReserved { port: u16, min: u16 },

    #[error("socket syscall failed: {0}")]
    Socket(#[source] io::Error),

    #[error("send to {remote:?} failed: {source}")]
    Send {
        remote: Option<SocketAddr>,
        #[source]
        source: io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("remote peer closed the connection")]
    RemoteClosed,

    #[error("unknown connection id")]
    UnknownId,

    #[error("outbound queue is full, message dropped")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, Error>;
