use std::{io, net::SocketAddr};

use tokio::{net::TcpStream, time::Instant};

use crate::{conn::Conn, deadline::Deadline};

/// A TCP stream with independent read and write deadlines.
#[derive(Debug)]
pub struct TcpConn {
    stream: TcpStream,
    read_deadline: Deadline,
    write_deadline: Deadline,
}

impl TcpConn {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_deadline: Deadline::new(),
            write_deadline: Deadline::new(),
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl From<TcpStream> for TcpConn {
    fn from(stream: TcpStream) -> Self {
        Self::new(stream)
    }
}

impl Conn for TcpConn {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_deadline
            .run(async {
                loop {
                    self.stream.readable().await?;
                    match self.stream.try_read(buf) {
                        Ok(n) => return Ok(n),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
            })
            .await
    }

    /// Writes all of `buf` unless an error or the write deadline intervenes.
    ///
    /// On error the bytes already handed to the socket are not reported; the peer may have
    /// received a prefix of `buf`.
    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_deadline
            .run(async {
                let mut written = 0;
                while written < buf.len() {
                    self.stream.writable().await?;
                    match self.stream.try_write(&buf[written..]) {
                        Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                        Ok(n) => written += n,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
                Ok(written)
            })
            .await
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) {
        self.read_deadline.set(deadline);
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) {
        self.write_deadline.set(deadline);
    }
}
