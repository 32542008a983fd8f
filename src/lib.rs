//! A thread-based, non-async TCP/UDP connection engine: two background
//! pumps drive readiness-based I/O over a process-wide connection
//! registry, exposed through a small blocking-free API (`open`, `close`,
//! `read`, `write`, ...).

mod address;
mod connection;
mod constants;
mod dispatch;
mod engine;
mod error;
mod message;
mod pollset;
mod pumps;
mod registry;
mod socket_factory;
mod types;

pub use constants::{
    EngineConfig, INVALID_ID, MAX_MESSAGE_LENGTH, MIN_PORT, POLL_TIMEOUT_MS, PUMP_JOIN_TIMEOUT_MS,
    QUEUE_CAPACITY, TCP_LISTEN_BACKLOG, WRITE_TICK_MS,
};
pub use engine::Engine;
pub use types::{ConnId, Role, Transport};
