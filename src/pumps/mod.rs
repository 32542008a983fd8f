//! Read and write pumps (C7/C8): the two background workers an [`Engine`](crate::Engine)
//! lazily spawns on its first `open` and joins once the registry drains.

mod read;
mod write;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::warn;

use crate::pollset::Pollset;
use crate::registry::Registry;

const TARGET: &str = "ipconn/pumps";

pub struct PumpHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    name: &'static str,
}

impl PumpHandle {
    fn spawn(name: &'static str, stop: Arc<AtomicBool>, join: JoinHandle<()>) -> Self {
        Self {
            stop,
            join: Some(join),
            name,
        }
    }

    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Waits up to `timeout` for the worker to finish; logs and abandons it
    /// if it doesn't, per the spec's pump-join-timeout behavior.
    fn join_within(&mut self, timeout: Duration) {
        let Some(handle) = self.join.take() else {
            return;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(target: TARGET, "{} pump did not stop within {:?}, abandoning", self.name, timeout);
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        if let Err(e) = handle.join() {
            warn!(target: TARGET, "{} pump panicked: {e:?}", self.name);
        }
    }
}

/// Both pumps an engine keeps alive between its first `open` and the
/// registry becoming empty again.
pub struct Pumps {
    read: PumpHandle,
    write: PumpHandle,
}

impl Pumps {
    pub fn spawn(
        registry: Arc<Registry>,
        pollset: Arc<Pollset>,
        poll_timeout: Duration,
        write_tick: Duration,
    ) -> Self {
        let read_stop = Arc::new(AtomicBool::new(false));
        let write_stop = Arc::new(AtomicBool::new(false));
        let read_handle = read::spawn(registry.clone(), pollset.clone(), read_stop.clone(), poll_timeout);
        let write_handle = write::spawn(registry, pollset, write_stop.clone(), write_tick);
        Self {
            read: PumpHandle::spawn("read", read_stop, read_handle),
            write: PumpHandle::spawn("write", write_stop, write_handle),
        }
    }

    /// Signals both workers and joins them within `timeout`, each.
    pub fn shutdown(mut self, timeout: Duration) {
        self.read.signal_stop();
        self.write.signal_stop();
        self.read.join_within(timeout);
        self.write.join_within(timeout);
    }
}
