//! Registry-facing service.
//!
//! Every webhook is acknowledged with `200` once authenticated, whether or
//! not it decodes: the registry re-queues undelivered notifications forever.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{middleware, Router};
use log::{debug, error};

use crate::auth::{require_bearer, AuthToken};
use crate::relay::RelayClient;
use crate::web;
use crate::webhook::WebhookBatch;

#[derive(Clone)]
pub struct ListenerState {
    relay: RelayClient,
}

pub fn router(token: AuthToken, relay: RelayClient) -> Router {
    Router::new()
        .route("/", get(web::index).post(handle_webhook))
        .route("/distribution", post(handle_webhook))
        .layer(middleware::from_fn_with_state(token, require_bearer))
        .layer(middleware::from_fn(web::log_requests))
        .with_state(ListenerState { relay })
}

async fn handle_webhook(
    State(state): State<ListenerState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!("Error reading body: {}", e);
            return web::ok();
        }
    };

    let batch = match WebhookBatch::decode(&body) {
        Ok(batch) => batch,
        Err(e) => {
            error!("Unable to decode webhook: {}", e);
            return web::ok();
        }
    };

    let images = batch.images();
    if images.is_empty() {
        debug!("Webhook with {} events carried no pushes", batch.events.len());
    } else {
        state.relay.spawn(images);
    }
    web::ok()
}
