//! Error taxonomy.
//!
//! None of these are fatal to the process; each one ends the smallest
//! unit of work it belongs to (a request, an image, a container or a
//! deployment) and is logged with enough context to correlate.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Rejection raised by the auth gate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("malformed authorization header")]
    Malformed,
    #[error("invalid token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// An inbound body that could not be decoded. Logged, never surfaced.
#[derive(Debug, Error)]
#[error("unable to decode body: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("unable to send request to executor: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("executor responded {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error)]
#[error("unable to list containers for {image}: {source}")]
pub struct DiscoveryError {
    pub image: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// A managed container whose compose labels cannot form a deployment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("container {container} is missing label {label}")]
    MissingLabel { container: String, label: &'static str },
    #[error("container {container} has an empty value for label {label}")]
    EmptyLabel { container: String, label: &'static str },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("unable to load environment from {path}: {source}")]
    Environment {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("unable to read definition {path}: {source}")]
    ReadDefinition {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid definition {path}: {reason}")]
    InvalidDefinition { path: PathBuf, reason: String },
    #[error("pull failed: {0}")]
    Pull(String),
    #[error("reconcile failed: {0}")]
    Reconcile(String),
}
