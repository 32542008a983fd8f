use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::warn;

use crate::dispatch;
use crate::pollset::Pollset;
use crate::registry::Registry;

const TARGET: &str = "ipconn/pumps/read";

/// Waits on the pollset, then for each ready connection invokes `receive`.
/// `forEachId` here visits every registered connection, not just the ones
/// the wait reported ready; `receive` itself re-checks `is_readable`, so a
/// quiet connection is a cheap no-op rather than a correctness issue.
pub fn spawn(
    registry: Arc<Registry>,
    pollset: Arc<Pollset>,
    stop: Arc<AtomicBool>,
    poll_timeout: Duration,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("ipconn-read-pump".into())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match pollset.wait(poll_timeout) {
                    Ok(0) => continue,
                    Ok(_) => registry.for_each_id(|id| dispatch::receive(id, &registry, &pollset)),
                    Err(e) => warn!(target: TARGET, "pollset wait failed: {e}"),
                }
            }
        })
        .expect("failed to spawn read pump thread")
}
