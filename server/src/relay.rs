use std::{fmt, io, net::SocketAddr, num::NonZeroUsize, sync::Arc, time::Duration};

use bytesize::ByteSize;
use metrics::counter;
use netx::{
    CopyError,
    addr::Network,
    dial::{Dial, DialError, DialExt, SystemDialer},
    io_copy::BidiCopy,
    tcp::TcpConn,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    time::Instant,
};
use tracing::{error, info, instrument, trace};

const DEFAULT_BUFFER_SIZE: NonZeroUsize = NonZeroUsize::new(32 * 1024).unwrap();
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayServerBuilder {
    pub listen_addr: String,
    pub upstream: String,
    #[serde(default = "default_network")]
    pub network: Network,
    /// Per-direction copy buffer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: NonZeroUsize,
    #[serde(default = "default_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub dial_timeout_secs: u64,
}

fn default_network() -> Network {
    Network::Tcp
}

fn default_buffer_size() -> NonZeroUsize {
    DEFAULT_BUFFER_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RelayServerBuilder {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub async fn build(self) -> Result<RelayServer<SystemDialer>, ServeError> {
        self.build_with(SystemDialer::default()).await
    }

    pub async fn build_with<D>(self, dialer: D) -> Result<RelayServer<D>, ServeError> {
        if !self.network.is_tcp() {
            return Err(ServeError::UnsupportedNetwork(self.network));
        }
        let relay = Relay {
            upstream: self.upstream.as_str().into(),
            network: self.network,
            buffer_size: self.buffer_size,
            write_timeout: self.write_timeout(),
            dial_timeout: self.dial_timeout(),
            dialer,
        };
        RelayServer::bind(self.listen_addr, relay).await
    }
}

/// Accepts downstream connections and relays each one to the same upstream.
#[derive(Debug)]
pub struct RelayServer<D> {
    listener: TcpListener,
    relay: Arc<Relay<D>>,
}

impl<D> RelayServer<D> {
    pub async fn bind(
        listen_addr: impl ToSocketAddrs,
        relay: Relay<D>,
    ) -> Result<Self, ServeError> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .inspect_err(|e| error!(?e, "Failed to bind to listen address"))
            .map_err(ServeError::Bind)?;
        Ok(Self {
            listener,
            relay: Arc::new(relay),
        })
    }

    pub fn listener(&self) -> &TcpListener {
        &self.listener
    }
}

impl<D> RelayServer<D>
where
    D: Dial + 'static,
{
    #[instrument(skip(self))]
    pub async fn serve(self) -> Result<(), ServeError> {
        let addr = self.listener.local_addr().map_err(ServeError::LocalAddr)?;
        info!(?addr, upstream = %self.relay.upstream, "Listening");
        loop {
            trace!("Waiting for connection");
            let (stream, _) = self
                .listener
                .accept()
                .await
                .map_err(|e| ServeError::Accept { source: e, addr })?;
            let relay = Arc::clone(&self.relay);
            tokio::spawn(async move {
                if let Err(e) = relay.relay(stream).await {
                    error!(?e, "Relay failed");
                }
            });
        }
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Relaying over `{0}` is not supported")]
    UnsupportedNetwork(Network),
    #[error("Failed to bind to listen address")]
    Bind(#[source] io::Error),
    #[error("Failed to get local address")]
    LocalAddr(#[source] io::Error),
    #[error("Failed to accept connection")]
    Accept {
        #[source]
        source: io::Error,
        addr: SocketAddr,
    },
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to get downstream address")]
    DownstreamAddr(#[source] io::Error),
    #[error("Failed to dial upstream")]
    Dial(#[from] DialError),
}

#[derive(Debug)]
pub struct Relay<D> {
    pub upstream: Arc<str>,
    pub network: Network,
    pub buffer_size: NonZeroUsize,
    pub write_timeout: Duration,
    pub dial_timeout: Duration,
    pub dialer: D,
}

impl<D> Relay<D>
where
    D: Dial,
{
    #[instrument(skip(self, downstream))]
    pub async fn relay(&self, downstream: TcpStream) -> Result<RelayMetrics, RelayError> {
        let start = Instant::now();
        counter!("relay.sessions").increment(1);
        let downstream_addr = downstream
            .peer_addr()
            .map_err(RelayError::DownstreamAddr)?;
        let downstream = TcpConn::new(downstream);

        let upstream = self
            .dialer
            .dial_timeout(self.network, &self.upstream, self.dial_timeout)
            .await
            .inspect_err(|e| {
                counter!("relay.dial_failures").increment(1);
                error!(?e, upstream = %self.upstream, "Failed to dial upstream")
            })?;
        let upstream_sock_addr = upstream.peer_addr().ok();

        let mut buf_down = vec![0; self.buffer_size.get()];
        let mut buf_up = vec![0; self.buffer_size.get()];
        let res = BidiCopy::new(self.write_timeout)
            .run(&downstream, &upstream, &mut buf_down, &mut buf_up)
            .await;

        let (bytes_uplink, bytes_downlink) = res.amounts();
        let metrics = RelayMetrics {
            start,
            end: Instant::now(),
            bytes_uplink,
            bytes_downlink,
            upstream_addr: Arc::clone(&self.upstream),
            upstream_sock_addr,
            downstream_addr,
        };
        let (uplink, downlink) = res.into_results();
        match (&uplink, &downlink) {
            (Ok(()), Ok(())) => info!(%metrics, "Relay finished"),
            _ => info!(?uplink, ?downlink, %metrics, "Relay finished with error"),
        }
        log_short_write(&uplink);
        log_short_write(&downlink);
        Ok(metrics)
    }
}

fn log_short_write(res: &Result<(), CopyError>) {
    if let Err(CopyError::ShortWrite { written, expected }) = res {
        error!(written, expected, "Destination accepted a partial write");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMetrics {
    pub start: Instant,
    pub end: Instant,
    pub bytes_uplink: u64,
    pub bytes_downlink: u64,
    pub upstream_addr: Arc<str>,
    pub upstream_sock_addr: Option<SocketAddr>,
    pub downstream_addr: SocketAddr,
}

impl fmt::Display for RelayMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = (self.end - self.start).as_secs_f64();
        let uplink_speed = self.bytes_uplink as f64 / duration;
        let downlink_speed = self.bytes_downlink as f64 / duration;
        let upstream = match self.upstream_sock_addr {
            Some(addr) if addr.to_string() != *self.upstream_addr => {
                format!("{}, {}", self.upstream_addr, addr)
            }
            _ => self.upstream_addr.to_string(),
        };
        write!(
            f,
            "up: {{ {}, {}/s }}, down: {{ {}, {}/s }}, duration: {:.1} s, upstream: {{ {} }}, downstream: {}",
            ByteSize::b(self.bytes_uplink),
            ByteSize::b(uplink_speed as u64),
            ByteSize::b(self.bytes_downlink),
            ByteSize::b(downlink_speed as u64),
            duration,
            upstream,
            self.downstream_addr
        )
    }
}
