use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::conn::{Conn, is_timeout};

use super::CopyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    AToB,
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AToB => write!(f, "A -> B"),
            Self::BToA => write!(f, "B -> A"),
        }
    }
}

#[derive(Debug)]
pub struct DirectionResult {
    /// Bytes accepted by the destination, including any short write.
    ///
    /// A write that fails after partial progress is not counted.
    pub bytes: u64,
    pub end: Instant,
    pub io_result: Result<(), CopyError>,
}

/// Parameters shared by both directions of one duplex session.
#[derive(Debug, Clone, Copy)]
pub struct CopyTimeouts {
    pub write: Duration,
    pub drain: Duration,
}

/// A deadline `timeout` from now, or none when it lies beyond what `Instant` can represent.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Copies from `src` to `dst` until end-of-stream, a fatal error, or the shutdown of the opposite
/// direction.
///
/// On return `stop` is set and the read side of `dst` has a drain deadline, so the copier reading
/// `dst` in the opposite direction wakes up and winds down.
pub async fn copy_one_direction<D, S>(
    direction: Direction,
    dst: &D,
    src: &S,
    buf: &mut [u8],
    timeouts: CopyTimeouts,
    stop: &AtomicBool,
) -> DirectionResult
where
    D: Conn,
    S: Conn,
{
    let mut bytes = 0;
    let io_result = copy_until_stopped(dst, src, buf, timeouts, stop, &mut bytes).await;

    stop.store(true, Ordering::Release);
    dst.set_read_deadline(deadline_after(timeouts.drain));

    match &io_result {
        Ok(()) => debug!(%direction, bytes, "Direction finished"),
        Err(e) => debug!(%direction, bytes, ?e, "Direction failed"),
    }
    DirectionResult {
        bytes,
        end: Instant::now(),
        io_result,
    }
}

async fn copy_until_stopped<D, S>(
    dst: &D,
    src: &S,
    buf: &mut [u8],
    timeouts: CopyTimeouts,
    stop: &AtomicBool,
    bytes: &mut u64,
) -> Result<(), CopyError>
where
    D: Conn,
    S: Conn,
{
    if buf.is_empty() {
        return Err(CopyError::EmptyBuffer);
    }
    loop {
        let stopping = stop.load(Ordering::Acquire);
        if stopping {
            src.set_read_deadline(deadline_after(timeouts.drain));
        }

        let n = match src.read(buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if is_timeout(&e) => {
                // The opposite direction may have stopped while this read was pending
                if stopping || stop.load(Ordering::Acquire) {
                    return Ok(());
                }
                trace!(?e, "Read timed out outside of shutdown; retrying");
                tokio::task::yield_now().await;
                continue;
            }
            Err(e) => return Err(CopyError::Read(e)),
        };

        dst.set_write_deadline(deadline_after(timeouts.write));
        let written = dst.write(&buf[..n]).await.map_err(CopyError::Write)?;
        *bytes += written.min(n) as u64;
        if written != n {
            metrics::counter!("netx.short_writes").increment(1);
            return Err(CopyError::ShortWrite {
                written,
                expected: n,
            });
        }
    }
}
