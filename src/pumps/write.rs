use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::dispatch;
use crate::pollset::Pollset;
use crate::registry::Registry;

/// For each connection, drains one outbound message and calls `send`; paces
/// itself with a fixed sleep rather than blocking on work availability.
pub fn spawn(
    registry: Arc<Registry>,
    pollset: Arc<Pollset>,
    stop: Arc<AtomicBool>,
    write_tick: Duration,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("ipconn-write-pump".into())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                registry.for_each_id(|id| dispatch::send_one(id, &registry, &pollset));
                std::thread::sleep(write_tick);
            }
        })
        .expect("failed to spawn write pump thread")
}
