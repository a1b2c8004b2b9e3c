use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::net::{TcpStream, UdpSocket};
use tracing::error;

use crate::{
    addr::{Network, any_addr},
    resolve::{Resolve, SystemResolver},
    tcp::TcpConn,
    udp::UdpConn,
};

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Establishes connections.
///
/// Swapping the connection strategy means handing a different `Dial` to whatever builds
/// connections.
pub trait Dial: Send + Sync {
    fn dial(
        &self,
        network: Network,
        addr: &str,
    ) -> impl Future<Output = Result<TcpConn, DialError>> + Send;

    /// Binds `local`, or an ephemeral port of the right family, and connects it to `remote`.
    fn dial_udp(
        &self,
        network: Network,
        local: Option<SocketAddr>,
        remote: SocketAddr,
    ) -> impl Future<Output = Result<UdpConn, DialError>> + Send;
}

pub trait DialExt: Dial {
    fn dial_timeout(
        &self,
        network: Network,
        addr: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<TcpConn, DialError>> + Send {
        async move {
            match tokio::time::timeout(timeout, self.dial(network, addr)).await {
                Ok(res) => res,
                Err(_) => Err(DialError::Timeout {
                    addr: addr.into(),
                    timeout,
                }),
            }
        }
    }

    /// [`dial_timeout`](Self::dial_timeout) with [`DEFAULT_DIAL_TIMEOUT`].
    fn dial_default(
        &self,
        network: Network,
        addr: &str,
    ) -> impl Future<Output = Result<TcpConn, DialError>> + Send {
        self.dial_timeout(network, addr, DEFAULT_DIAL_TIMEOUT)
    }
}
impl<T: Dial> DialExt for T {}

#[derive(Debug, Error)]
pub enum DialError {
    #[error("Network `{network}` is not supported here")]
    UnsupportedNetwork { network: Network },
    #[error("Failed to resolve address: {source}, {addr}")]
    Resolve {
        #[source]
        source: io::Error,
        addr: Arc<str>,
    },
    #[error("Failed to bind local address: {source}, {addr}")]
    Bind {
        #[source]
        source: io::Error,
        addr: SocketAddr,
    },
    #[error("Failed to connect to address: {source}, {addr}")]
    Connect {
        #[source]
        source: io::Error,
        addr: SocketAddr,
    },
    #[error("Timed out after {timeout:?} dialing {addr}")]
    Timeout { addr: Arc<str>, timeout: Duration },
}

/// Dials with the operating system's sockets after resolving through `R`.
#[derive(Debug, Clone, Default)]
pub struct SystemDialer<R = SystemResolver> {
    resolver: R,
}

impl<R> SystemDialer<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

impl<R> Dial for SystemDialer<R>
where
    R: Resolve,
{
    async fn dial(&self, network: Network, addr: &str) -> Result<TcpConn, DialError> {
        if !network.is_tcp() {
            return Err(DialError::UnsupportedNetwork { network });
        }
        let sock_addr = self
            .resolver
            .resolve(network, addr)
            .await
            .map_err(|source| DialError::Resolve {
                source,
                addr: addr.into(),
            })?;
        let stream = TcpStream::connect(sock_addr)
            .await
            .inspect_err(|e| error!(?e, ?sock_addr, "Failed to connect to address"))
            .map_err(|source| DialError::Connect {
                source,
                addr: sock_addr,
            })?;
        Ok(TcpConn::new(stream))
    }

    async fn dial_udp(
        &self,
        network: Network,
        local: Option<SocketAddr>,
        remote: SocketAddr,
    ) -> Result<UdpConn, DialError> {
        if !network.is_udp() || !network.accepts(&remote) {
            return Err(DialError::UnsupportedNetwork { network });
        }
        let local = local.unwrap_or_else(|| any_addr(&remote.ip()));
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| DialError::Bind {
                source,
                addr: local,
            })?;
        socket
            .connect(remote)
            .await
            .map_err(|source| DialError::Connect {
                source,
                addr: remote,
            })?;
        Ok(UdpConn::new(socket))
    }
}
