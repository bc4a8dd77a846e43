// Prometheus metrics HTTP exporter.
use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server,
};
use prometheus::{Encoder, TextEncoder};
use tracing::{info, warn};

/// Starts the Prometheus exporter, serving `/metrics` in the standard text
/// format. Runs until the server errors; callers typically spawn this as a
/// background task alongside the main API server.
pub async fn start_metrics_exporter(addr: SocketAddr) -> Result<()> {
    let make_svc =
        make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metrics_handler)) });

    let server = Server::bind(&addr).serve(make_svc);

    info!("metrics exporter listening on http://{}/metrics", addr);

    server.await.context("metrics exporter server failed")?;

    Ok(())
}

async fn metrics_handler(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let metric_families = prometheus::gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => Ok(Response::builder()
            .status(200)
            .header(CONTENT_TYPE, encoder.format_type())
            .body(Body::from(buffer))
            .unwrap()),
        Err(e) => {
            warn!("failed to encode metrics: {}", e);
            Ok(Response::builder()
                .status(500)
                .body(Body::from(format!("error encoding metrics: {e}")))
                .unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_handler_reports_registered_counters() {
        crate::DISPATCH_METRICS.offers_created.inc();

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = metrics_handler(req).await.unwrap();
        assert_eq!(response.status(), 200);

        let body_bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(body.contains("dispatch_offers_created_total"));
    }
}
