//! Absolute deadlines which can be moved while an operation is pending.
//!
//! This mirrors the read/write deadlines of traditional sockets: a deadline applies to the
//! operation currently in flight as well as to every later one, until it is moved or cleared.
//! Once the deadline passes, a pending operation fails with an [`io::Error`] of kind
//! [`TimedOut`](io::ErrorKind::TimedOut).

use std::{future::Future, io};

use tokio::{
    sync::watch,
    time::{Instant, sleep_until},
};

/// Message carried by deadline expiry errors.
pub const IO_TIMEOUT: &str = "i/o timeout";

pub fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, IO_TIMEOUT)
}

#[derive(Debug)]
pub struct Deadline {
    tx: watch::Sender<Option<Instant>>,
}

impl Deadline {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn get(&self) -> Option<Instant> {
        *self.tx.borrow()
    }

    /// Moves the deadline.
    ///
    /// A pending [`run`](Self::run) observes the new value immediately.
    pub fn set(&self, deadline: Option<Instant>) {
        self.tx.send_replace(deadline);
    }

    /// Drives `fut` to completion unless the deadline passes first.
    ///
    /// A future that is already ready wins over an expired deadline.
    pub async fn run<F, T>(&self, fut: F) -> io::Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        let mut rx = self.tx.subscribe();
        tokio::pin!(fut);
        loop {
            let deadline = *rx.borrow_and_update();
            let expired = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                biased;
                res = &mut fut => return res,
                () = expired => return Err(timed_out()),
                // The sender lives in `self`, so this never reports a closed channel
                _ = rx.changed() => continue,
            }
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new()
    }
}
