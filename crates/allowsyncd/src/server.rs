// Server-mode HTTP adapter
//
// - `GET /ip?ip=<address>`: 200 applied or skipped, 400 `Invalid ip: <value>`,
//   500 with the reconciliation error text. A repeated `ip` uses the first one.
// - `GET /healthz`: 200 `OK`
//
// All decisions live in `ReportGate`; this module only maps its results to
// status codes.

use std::sync::Arc;

use allowsync_core::{Error, ReportGate, ReportOutcome};
use axum::Router;
use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Build the router
pub fn router(gate: Arc<ReportGate>) -> Router {
    Router::new()
        .route("/ip", get(report_ip))
        .route("/healthz", get(health))
        .layer(Extension(gate))
}

/// Serve until `shutdown` is cancelled, letting in-flight requests finish
pub async fn serve(
    listener: TcpListener,
    gate: Arc<ReportGate>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(gate))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;

    debug!("HTTP server stopped");
    Ok(())
}

async fn report_ip(
    Extension(gate): Extension<Arc<ReportGate>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let raw = params
        .into_iter()
        .find_map(|(key, value)| (key == "ip").then_some(value))
        .unwrap_or_default();
    info!("ip: {}", raw);

    match gate.report(&raw).await {
        Ok(ReportOutcome::Skipped { .. }) => StatusCode::OK.into_response(),
        Ok(ReportOutcome::Reconciled { address, outcome }) => {
            info!("Allow-list now tracks {} ({:?})", address, outcome);
            StatusCode::OK.into_response()
        }
        Err(Error::InvalidInput(message)) => (StatusCode::BAD_REQUEST, message).into_response(),
        Err(e) => {
            error!("err: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}
