use std::{io, net::SocketAddr};

use tokio::{net::UdpSocket, time::Instant};

use crate::{conn::Conn, deadline::Deadline};

/// A connected UDP socket; every read or write moves one datagram.
///
/// A datagram larger than the read buffer is truncated. Empty datagrams are skipped on read, so
/// `Ok(0)` is only returned for an empty buffer.
#[derive(Debug)]
pub struct UdpConn {
    socket: UdpSocket,
    read_deadline: Deadline,
    write_deadline: Deadline,
}

impl UdpConn {
    /// `socket` must already be connected to its peer.
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            read_deadline: Deadline::new(),
            write_deadline: Deadline::new(),
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn into_inner(self) -> UdpSocket {
        self.socket
    }
}

impl Conn for UdpConn {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.read_deadline
            .run(async {
                loop {
                    self.socket.readable().await?;
                    match self.socket.try_recv(buf) {
                        Ok(0) => continue,
                        Ok(n) => return Ok(n),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
            })
            .await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_deadline
            .run(async {
                loop {
                    self.socket.writable().await?;
                    match self.socket.try_send(buf) {
                        Ok(n) => return Ok(n),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
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
