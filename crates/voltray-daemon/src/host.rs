//! Tokio-backed readiness host
//!
//! Each watched descriptor is registered with the runtime's reactor through
//! [`AsyncFd`]. The descriptors stay owned by the mixer; dropping a watch
//! only deregisters it.

use futures_util::future::select_all;
use std::io;
use std::os::fd::RawFd;
use tokio::io::unix::AsyncFd;
use voltray_hal::{ReadinessHost, WatchId};

struct Watch {
    id: WatchId,
    fd: AsyncFd<RawFd>,
}

impl Watch {
    async fn wait(&self) -> (WatchId, io::Result<()>) {
        match self.fd.readable().await {
            Ok(mut guard) => {
                // Cleared before the mixer is drained so a change landing
                // during the drain raises a fresh wakeup.
                guard.clear_ready();
                (self.id, Ok(()))
            }
            Err(e) => (self.id, Err(e)),
        }
    }
}

#[derive(Default)]
pub struct TokioHost {
    watches: Vec<Watch>,
    next_id: u64,
}

impl TokioHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn unwatch(&mut self, id: WatchId) {
        self.watches.retain(|w| w.id != id);
    }

    /// Wait until one of the watched descriptors is readable
    ///
    /// Never resolves while nothing is watched.
    pub async fn next_ready(&self) -> (WatchId, io::Result<()>) {
        if self.watches.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.watches.iter().map(|w| Box::pin(w.wait()));
        let (ready, _, _) = select_all(waits).await;
        ready
    }
}

impl ReadinessHost for TokioHost {
    fn watch_readable(&mut self, fd: RawFd) -> io::Result<WatchId> {
        let fd = AsyncFd::new(fd)?;
        self.next_id += 1;
        let id = WatchId(self.next_id);
        self.watches.push(Watch { id, fd });
        Ok(id)
    }
}
