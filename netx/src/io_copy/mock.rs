//! In-memory connection for exercising the copy loops under paused time.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{sync::mpsc, time::Instant};

use crate::{conn::Conn, deadline::Deadline};

enum Incoming {
    Data(Vec<u8>),
    Error(io::ErrorKind),
}

/// Feeds the read side of a [`MockConn`]; dropping it is end-of-stream.
pub struct MockSender {
    tx: mpsc::UnboundedSender<Incoming>,
}

impl MockSender {
    pub fn data(&self, data: &[u8]) {
        let _ = self.tx.send(Incoming::Data(data.to_vec()));
    }

    pub fn error(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Incoming::Error(kind));
    }
}

struct ReadSide {
    rx: mpsc::UnboundedReceiver<Incoming>,
    pending: VecDeque<u8>,
}

pub struct MockConn {
    read_side: tokio::sync::Mutex<ReadSide>,
    written: Mutex<Vec<u8>>,
    max_write: Option<usize>,
    write_delay: Option<Duration>,
    read_deadline: Deadline,
    write_deadline: Deadline,
    read_deadlines: Mutex<Vec<Option<Instant>>>,
    write_deadlines: Mutex<Vec<Option<Instant>>>,
    reads: AtomicUsize,
}

impl MockConn {
    pub fn new() -> (MockSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            read_side: tokio::sync::Mutex::new(ReadSide {
                rx,
                pending: VecDeque::new(),
            }),
            written: Mutex::new(Vec::new()),
            max_write: None,
            write_delay: None,
            read_deadline: Deadline::new(),
            write_deadline: Deadline::new(),
            read_deadlines: Mutex::new(Vec::new()),
            write_deadlines: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        };
        (MockSender { tx }, conn)
    }

    /// Accepts at most `n` bytes per write.
    pub fn max_write(mut self, n: usize) -> Self {
        self.max_write = Some(n);
        self
    }

    /// Every write takes `delay` before it is accepted.
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn read_deadlines(&self) -> Vec<Option<Instant>> {
        self.read_deadlines.lock().unwrap().clone()
    }

    pub fn write_deadlines(&self) -> Vec<Option<Instant>> {
        self.write_deadlines.lock().unwrap().clone()
    }
}

impl Conn for MockConn {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.read_deadline
            .run(async {
                let mut read_side = self.read_side.lock().await;
                if read_side.pending.is_empty() {
                    match read_side.rx.recv().await {
                        Some(Incoming::Data(data)) => read_side.pending.extend(data),
                        Some(Incoming::Error(kind)) => return Err(kind.into()),
                        None => return Ok(0),
                    }
                }
                let n = buf.len().min(read_side.pending.len());
                for (dst, src) in buf.iter_mut().zip(read_side.pending.drain(..n)) {
                    *dst = src;
                }
                Ok(n)
            })
            .await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_deadline
            .run(async {
                if let Some(delay) = self.write_delay {
                    tokio::time::sleep(delay).await;
                }
                let n = self.max_write.map_or(buf.len(), |max| max.min(buf.len()));
                self.written.lock().unwrap().extend_from_slice(&buf[..n]);
                Ok(n)
            })
            .await
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.read_deadlines.lock().unwrap().push(deadline);
        self.read_deadline.set(deadline);
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.write_deadlines.lock().unwrap().push(deadline);
        self.write_deadline.set(deadline);
    }
}
