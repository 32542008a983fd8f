//! Engine-wide constants and the overridable [`EngineConfig`].

use std::time::Duration;

/// Largest payload a single message may carry.
pub const MAX_MESSAGE_LENGTH: usize = 512;

/// Capacity of each connection's inbound and outbound queue.
pub const QUEUE_CAPACITY: usize = 10;

/// How long the read pump blocks in a single pollset wait.
pub const POLL_TIMEOUT_MS: u64 = 5000;

/// Pacing interval of the write pump between drain passes.
pub const WRITE_TICK_MS: u64 = 1000;

/// Timeout allotted to join a pump thread during shutdown.
pub const PUMP_JOIN_TIMEOUT_MS: u64 = 5000;

/// Backlog passed to `listen(2)` for TCP servers.
pub const TCP_LISTEN_BACKLOG: i32 = 20;

/// Smallest port callers may request; anything below is reserved.
pub const MIN_PORT: u16 = 49152;

/// Sentinel returned wherever a connection id is expected but none exists.
pub const INVALID_ID: i64 = -1;

/// Tunable knobs for an [`Engine`](crate::Engine).
///
/// Defaults reproduce the constants above exactly; overriding them is an
/// explicit per-engine choice, never a global one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_message_length: usize,
    pub queue_capacity: usize,
    pub poll_timeout: Duration,
    pub write_tick: Duration,
    pub pump_join_timeout: Duration,
    pub tcp_listen_backlog: i32,
    pub min_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_length: MAX_MESSAGE_LENGTH,
            queue_capacity: QUEUE_CAPACITY,
            poll_timeout: Duration::from_millis(POLL_TIMEOUT_MS),
            write_tick: Duration::from_millis(WRITE_TICK_MS),
            pump_join_timeout: Duration::from_millis(PUMP_JOIN_TIMEOUT_MS),
            tcp_listen_backlog: TCP_LISTEN_BACKLOG,
            min_port: MIN_PORT,
        }
    }
}
