use std::{io, sync::atomic::AtomicBool, time::Duration};

use metrics::{counter, gauge};
use scopeguard::defer;
use thiserror::Error;

use crate::conn::Conn;

mod copy;
#[cfg(test)]
mod mock;

pub use copy::{CopyTimeouts, Direction, DirectionResult, copy_one_direction};

/// How long a stopping direction waits for its peer to notice the shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("empty copy buffer")]
    EmptyBuffer,
    #[error("read error: {0}")]
    Read(#[source] io::Error),
    #[error("write error: {0}")]
    Write(#[source] io::Error),
}

impl CopyError {
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Read(e) | Self::Write(e) => Some(e),
            Self::ShortWrite { .. } | Self::EmptyBuffer => None,
        }
    }
}

#[derive(Debug)]
pub struct BidiCopyResult {
    pub a_to_b: DirectionResult,
    pub b_to_a: DirectionResult,
}

impl BidiCopyResult {
    /// Bytes copied from A to B and from B to A.
    pub fn amounts(&self) -> (u64, u64) {
        (self.a_to_b.bytes, self.b_to_a.bytes)
    }

    pub fn into_results(self) -> (Result<(), CopyError>, Result<(), CopyError>) {
        (self.a_to_b.io_result, self.b_to_a.io_result)
    }
}

/// Copies between two connections in both directions.
#[derive(Debug, Clone, Copy)]
pub struct BidiCopy {
    timeouts: CopyTimeouts,
}

impl BidiCopy {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            timeouts: CopyTimeouts {
                write: write_timeout,
                drain: DRAIN_TIMEOUT,
            },
        }
    }

    pub fn drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.timeouts.drain = drain_timeout;
        self
    }

    /// Reads `a` into `buf_a` and writes it to `b` while reading `b` into `buf_b` and writing it
    /// to `a`.
    ///
    /// Returns once both directions have terminated. When one direction ends, the other is given
    /// the drain timeout to flush what it has in flight before it stops too.
    ///
    /// Both directions are polled from the calling task, so the whole session runs on one worker
    /// thread at a time.
    pub async fn run<A, B>(
        &self,
        a: &A,
        b: &B,
        buf_a: &mut [u8],
        buf_b: &mut [u8],
    ) -> BidiCopyResult
    where
        A: Conn,
        B: Conn,
    {
        counter!("netx.bidi_copies").increment(1);
        gauge!("netx.current_bidi_copies").increment(1.);
        defer!(gauge!("netx.current_bidi_copies").decrement(1.));

        let stop = AtomicBool::new(false);
        let (a_to_b, b_to_a) = tokio::join!(
            copy_one_direction(Direction::AToB, b, a, buf_a, self.timeouts, &stop),
            copy_one_direction(Direction::BToA, a, b, buf_b, self.timeouts, &stop),
        );

        counter!("netx.bytes_a_to_b").increment(a_to_b.bytes);
        counter!("netx.bytes_b_to_a").increment(b_to_a.bytes);
        BidiCopyResult { a_to_b, b_to_a }
    }
}

/// [`BidiCopy`] with the default drain timeout.
pub async fn bidi_copy<A, B>(
    a: &A,
    b: &B,
    buf_a: &mut [u8],
    buf_b: &mut [u8],
    write_timeout: Duration,
) -> BidiCopyResult
where
    A: Conn,
    B: Conn,
{
    BidiCopy::new(write_timeout).run(a, b, buf_a, buf_b).await
}
