//! Pieces shared by both HTTP services.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal;

/// `200 {"message":"OK"}`.
pub fn ok() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "message": "OK" }))).into_response()
}

pub async fn index() -> Response {
    ok()
}

/// Logs one `incoming_request` line per request once the response is ready.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".into());
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let version = req.version();
    let agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(req).await;
    info!(
        "incoming_request remote_addr={} url={} proto={:?} method={} user_agent={:?} status={}",
        remote,
        path,
        version,
        method,
        agent,
        response.status().as_u16()
    );
    response
}

/// Binds `addr` and serves `app` until Ctrl-C. Only the bind is fatal.
pub async fn serve(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Unable to bind {}: {}", addr, e))?;
    info!("Starting webserver on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
