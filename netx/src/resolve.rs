use std::{future::Future, io, net::SocketAddr};

use tokio::net::lookup_host;
use tracing::error;

use crate::addr::Network;

/// Turns a `host:port` string into a socket address for a network.
pub trait Resolve: Send + Sync {
    fn resolve(
        &self,
        network: Network,
        addr: &str,
    ) -> impl Future<Output = io::Result<SocketAddr>> + Send;
}

pub trait ResolveExt: Resolve {
    fn resolve_tcp(
        &self,
        network: Network,
        addr: &str,
    ) -> impl Future<Output = io::Result<SocketAddr>> + Send {
        async move {
            if !network.is_tcp() {
                return Err(unsupported_network(network));
            }
            self.resolve(network, addr).await
        }
    }

    fn resolve_udp(
        &self,
        network: Network,
        addr: &str,
    ) -> impl Future<Output = io::Result<SocketAddr>> + Send {
        async move {
            if !network.is_udp() {
                return Err(unsupported_network(network));
            }
            self.resolve(network, addr).await
        }
    }
}
impl<T: Resolve> ResolveExt for T {}

fn unsupported_network(network: Network) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("Unsupported network `{network}`"),
    )
}

/// Resolves through the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    async fn resolve(&self, network: Network, addr: &str) -> io::Result<SocketAddr> {
        if let Ok(sock_addr) = addr.parse::<SocketAddr>() {
            if !network.accepts(&sock_addr) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Address {sock_addr} does not belong to network `{network}`"),
                ));
            }
            return Ok(sock_addr);
        }
        lookup_host(addr)
            .await
            .and_then(|mut res| {
                res.find(|a| network.accepts(a))
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "No address"))
            })
            .inspect_err(|e| error!(?e, %network, addr, "Failed to resolve address"))
    }
}

/// Resolves with a caller-provided function.
#[derive(Debug, Clone)]
pub struct FnResolve<F>(pub F);

impl<F> Resolve for FnResolve<F>
where
    F: Fn(Network, &str) -> io::Result<SocketAddr> + Send + Sync,
{
    async fn resolve(&self, network: Network, addr: &str) -> io::Result<SocketAddr> {
        (self.0)(network, addr)
    }
}
