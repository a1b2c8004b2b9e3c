use std::net::SocketAddr;

use axum::{Router, extract::State, routing::get};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;

/// Installs the global Prometheus recorder and returns the routes exposing it.
pub fn monitor_router() -> Result<Router, BuildError> {
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    async fn metrics(metrics_handle: State<PrometheusHandle>) -> String {
        metrics_handle.render()
    }
    let router = Router::new()
        .route("/", get(metrics))
        .with_state(metrics_handle)
        .route("/health", get(|| async { Ok::<_, ()>(()) }));
    Ok(router)
}

pub async fn serve_monitor(addr: SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(?addr, "Monitor listening");
    axum::serve(listener, router).await
}
