//! Update-request service.
//!
//! Requests are answered immediately; the run itself happens in a detached
//! task. At most `max_concurrent_runs` runs execute at once, the rest wait
//! for a permit.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use log::{debug, error, info};
use tokio::sync::Semaphore;

use crate::auth::{require_bearer, AuthToken};
use crate::error::DecodeError;
use crate::orchestrator::Orchestrator;
use crate::types::ImageReference;
use crate::web;
use crate::webhook::dedup_images;

#[derive(Clone)]
pub struct ExecutorState {
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
}

pub fn router(
    token: AuthToken,
    orchestrator: Arc<Orchestrator>,
    max_concurrent_runs: usize,
) -> Router {
    let state = ExecutorState {
        orchestrator,
        permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
    };
    Router::new()
        .route("/", get(web::index).post(handle_run))
        .route("/run", post(handle_run))
        .route("/stats", get(handle_stats))
        .layer(middleware::from_fn_with_state(token, require_bearer))
        .layer(middleware::from_fn(web::log_requests))
        .with_state(state)
}

/// Decodes a JSON array of references. An empty body is an empty request.
pub fn parse_images(body: &[u8]) -> Result<Vec<ImageReference>, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let raw: Vec<String> = serde_json::from_slice(body)?;
    Ok(dedup_images(
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(ImageReference::new),
    ))
}

async fn handle_run(
    State(state): State<ExecutorState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!("Unable to read update request: {}", e);
            return web::ok();
        }
    };
    let images = match parse_images(&body) {
        Ok(images) => images,
        Err(e) => {
            error!("Unable to decode update request: {}", e);
            return web::ok();
        }
    };

    if images.is_empty() {
        debug!("Empty update request");
        return web::ok();
    }
    dispatch(state, images);
    web::ok()
}

fn dispatch(state: ExecutorState, images: Vec<ImageReference>) {
    tokio::spawn(async move {
        let Ok(_permit) = state.permits.acquire_owned().await else {
            return;
        };
        info!("Starting update run for {} images", images.len());
        state.orchestrator.run(&images).await;
    });
}

async fn handle_stats(State(state): State<ExecutorState>) -> Response {
    Json(state.orchestrator.stats().snapshot()).into_response()
}
