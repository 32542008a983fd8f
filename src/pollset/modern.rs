//! Modern pollset backend: one `mio::Poll` (epoll/kqueue/IOCP) per engine.

use std::collections::HashSet;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

use crate::types::ConnId;

struct Inner {
    poll: Poll,
    events: Events,
    ready: HashSet<ConnId>,
}

/// Readiness multiplexer. `wait`/`is_readable` follow the contract in the
/// spec: `is_readable` is only meaningful for the window between a `wait`
/// call and the next one.
pub struct Pollset {
    inner: Mutex<Inner>,
}

impl Pollset {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: Mutex::new(Inner {
                poll: Poll::new()?,
                events: Events::with_capacity(256),
                ready: HashSet::new(),
            }),
        })
    }

    /// Idempotent: registering a token twice is treated as reregistration.
    pub fn add(&self, id: ConnId, source: &mut dyn Source) -> io::Result<()> {
        let inner = self.inner.lock().unwrap();
        let registry = inner.poll.registry();
        match registry.register(source, Token(id as usize), Interest::READABLE) {
            Ok(()) => Ok(()),
            Err(_) => registry.reregister(source, Token(id as usize), Interest::READABLE),
        }
    }

    pub fn remove(&self, source: &mut dyn Source) -> io::Result<()> {
        self.inner.lock().unwrap().poll.registry().deregister(source)
    }

    pub fn wait(&self, timeout: Duration) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let Inner { poll, events, .. } = &mut *inner;
        poll.poll(events, Some(timeout))?;
        let ready_tokens: Vec<ConnId> = inner
            .events
            .iter()
            .filter(|e| e.is_readable())
            .map(|e| e.token().0 as ConnId)
            .collect();
        inner.ready.clear();
        inner.ready.extend(ready_tokens);
        Ok(inner.ready.len())
    }

    pub fn is_readable(&self, id: ConnId) -> bool {
        self.inner.lock().unwrap().ready.contains(&id)
    }
}
