#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, num::NonZeroUsize, time::Duration};

    use netx::{addr::Network, dial::SystemDialer, resolve::FnResolve};
    use server::relay::{Relay, RelayServer, RelayServerBuilder};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use crate::random_payload;

    /// Greets every connection, then echoes back what it reads.
    async fn spawn_greet_echo(greeting: &'static [u8]) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    stream.write_all(greeting).await.unwrap();
                    let (mut r, mut w) = stream.split();
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
            }
        });
        addr
    }

    async fn exchange(relay_addr: SocketAddr, greeting: &[u8]) {
        let mut stream = TcpStream::connect(relay_addr).await.unwrap();
        let mut buf = vec![0; greeting.len()];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, greeting);

        let payload = random_payload(256 * 1024);
        let mut echoed = vec![0; payload.len()];
        let (mut r, mut w) = stream.split();
        tokio::try_join!(w.write_all(&payload), r.read_exact(&mut echoed)).unwrap();
        assert!(echoed == payload);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn relay_from_config() {
        let greeting = b"hello from upstream";
        let upstream = spawn_greet_echo(greeting).await;
        let builder = RelayServerBuilder {
            listen_addr: "127.0.0.1:0".into(),
            upstream: upstream.to_string(),
            network: Network::Tcp4,
            buffer_size: NonZeroUsize::new(1024).unwrap(),
            write_timeout_secs: 5,
            dial_timeout_secs: 5,
        };
        let server = builder.build().await.unwrap();
        let relay_addr = server.listener().local_addr().unwrap();
        tokio::spawn(server.serve());

        // Concurrent sessions share nothing but the listener
        let mut join_set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            join_set.spawn(exchange(relay_addr, greeting));
        }
        while let Some(res) = join_set.join_next().await {
            res.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn relay_with_custom_resolver() {
        let greeting = b"resolved";
        let upstream = spawn_greet_echo(greeting).await;
        let resolver = FnResolve(
            move |_network: Network, name: &str| -> std::io::Result<SocketAddr> {
                match name {
                    "upstream.internal:80" => Ok(upstream),
                    _ => Err(std::io::ErrorKind::NotFound.into()),
                }
            },
        );
        let relay = Relay {
            upstream: "upstream.internal:80".into(),
            network: Network::Tcp,
            buffer_size: NonZeroUsize::new(4096).unwrap(),
            write_timeout: Duration::from_secs(5),
            dial_timeout: Duration::from_secs(5),
            dialer: SystemDialer::new(resolver),
        };
        let server = RelayServer::bind("127.0.0.1:0", relay).await.unwrap();
        let relay_addr = server.listener().local_addr().unwrap();
        tokio::spawn(server.serve());

        exchange(relay_addr, greeting).await;
    }
}
