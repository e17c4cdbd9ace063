use anyhow::Result;
use axum::extract::State;
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode};
use axum::routing::get;
use axum::Router;
use futures::prelude::*;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use model_operator::config::Config;

/// Spawn the HTTP server for healthchecks & Prometheus metrics scraping.
pub fn spawn_http_server(config: &Config, metrics: PrometheusHandle, mut shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<Result<()>>> {
    let app = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/metrics", get(prometheus_scrape))
        .with_state(metrics);
    let server = axum::Server::try_bind(&([0, 0, 0, 0], config.http_port).into())?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            let _res = shutdown.recv().await;
        });
    tracing::info!("http server is listening at 0.0.0.0:{}", config.http_port);
    Ok(tokio::spawn(server.map_err(anyhow::Error::from)))
}

/// Handle Prometheus metrics scraping.
async fn prometheus_scrape(State(state): State<PrometheusHandle>) -> (StatusCode, HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("content-type"), HeaderValue::from_static("text/plain; version=0.0.4"));
    (StatusCode::OK, headers, state.render())
}
