//! Legacy pollset backend: a single `select(2)` snapshot rebuilt on every
//! `wait`, restricted to the IPv4-only legacy build mode.

use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Mutex;
use std::time::Duration;

use crate::types::ConnId;

struct Inner {
    fds: HashMap<ConnId, RawFd>,
    ready: HashSet<ConnId>,
}

pub struct Pollset {
    inner: Mutex<Inner>,
}

impl Pollset {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: Mutex::new(Inner {
                fds: HashMap::new(),
                ready: HashSet::new(),
            }),
        })
    }

    pub fn add(&self, id: ConnId, fd: RawFd) -> io::Result<()> {
        self.inner.lock().unwrap().fds.insert(id, fd);
        Ok(())
    }

    pub fn remove(&self, id: ConnId) -> io::Result<()> {
        self.inner.lock().unwrap().fds.remove(&id);
        Ok(())
    }

    /// Blocks up to `timeout`; a connection added mid-block is only seen
    /// starting with the following call, same as the source's fd-set
    /// snapshot taken fresh on every invocation.
    pub fn wait(&self, timeout: Duration) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.ready.clear();

        if inner.fds.is_empty() {
            drop(inner);
            std::thread::sleep(timeout);
            return Ok(0);
        }

        let mut read_set: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe { libc::FD_ZERO(&mut read_set) };
        let mut max_fd: RawFd = 0;
        for &fd in inner.fds.values() {
            unsafe { libc::FD_SET(fd, &mut read_set) };
            max_fd = max_fd.max(fd);
        }

        let mut tv = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        let n = unsafe {
            libc::select(
                max_fd + 1,
                &mut read_set,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut tv,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        for (&id, &fd) in inner.fds.iter() {
            if unsafe { libc::FD_ISSET(fd, &read_set) } {
                inner.ready.insert(id);
            }
        }

        Ok(inner.ready.len())
    }

    pub fn is_readable(&self, id: ConnId) -> bool {
        self.inner.lock().unwrap().ready.contains(&id)
    }
}
