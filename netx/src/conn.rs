use std::{future::Future, io, sync::Arc};

use tokio::time::Instant;

/// A bidirectional byte stream with socket-style deadlines.
///
/// Both `read` and `write` take `&self`: one task may read a connection while another task writes
/// it.
pub trait Conn: Send + Sync {
    /// Reads into `buf`.
    ///
    /// `Ok(0)` on a non-empty `buf` means end-of-stream.
    fn read(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Writes from `buf`, returning how many bytes were accepted.
    fn write(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Sets the deadline for pending and future reads; `None` clears it.
    fn set_read_deadline(&self, deadline: Option<Instant>);

    /// Sets the deadline for pending and future writes; `None` clears it.
    fn set_write_deadline(&self, deadline: Option<Instant>);
}

/// Whether `e` was raised by an expired deadline.
pub fn is_timeout(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
}

impl<C> Conn for &C
where
    C: Conn,
{
    fn read(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
        (**self).read(buf)
    }

    fn write(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
        (**self).write(buf)
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) {
        (**self).set_read_deadline(deadline)
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) {
        (**self).set_write_deadline(deadline)
    }
}

impl<C> Conn for Arc<C>
where
    C: Conn,
{
    fn read(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
        self.as_ref().read(buf)
    }

    fn write(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
        self.as_ref().write(buf)
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.as_ref().set_read_deadline(deadline)
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.as_ref().set_write_deadline(deadline)
    }
}
