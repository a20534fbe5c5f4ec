//! Bearer-token gate shared by both services.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use log::debug;

use crate::error::AuthError;

/// Pre-shared secret a service expects on every inbound request.
#[derive(Clone)]
pub struct AuthToken(Arc<str>);

impl AuthToken {
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(Arc::from(token.as_ref().trim()))
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::Malformed)?;

        let supplied = bearer_token(value);
        if supplied.is_empty() {
            return Err(AuthError::Malformed);
        }
        if !tokens_match(&self.0, supplied) {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(**redacted**)")
    }
}

/// Extracts the token from an `Authorization` value.
///
/// Returns an empty string unless the value is the case-sensitive
/// `Bearer` scheme followed by whitespace and a token.
pub fn bearer_token(value: &str) -> &str {
    let Some(rest) = value.trim().strip_prefix("Bearer") else {
        return "";
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return "";
    }
    rest.trim()
}

// Runs over every byte of equal-length inputs.
fn tokens_match(expected: &str, supplied: &str) -> bool {
    let (expected, supplied) = (expected.as_bytes(), supplied.as_bytes());
    if expected.is_empty() || expected.len() != supplied.len() {
        return false;
    }
    expected
        .iter()
        .zip(supplied)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Axum middleware rejecting requests without the expected bearer token.
pub async fn require_bearer(
    State(token): State<AuthToken>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(e) = token.check(req.headers()) {
        debug!("Rejected request to {}: {}", req.uri().path(), e);
        return Err(e);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn bearer_token_cases() {
        let cases = [
            ("", ""),
            ("   ", ""),
            ("Bearer", ""),
            ("Bearer   ", ""),
            ("Basic token", ""),
            ("BEARER token", ""),
            ("Bearertoken", ""),
            ("Bearer \n", ""),
            ("Bearer  \n", ""),
            ("   Bearer    token   ", "token"),
            ("   Bearer   token   ", "token"),
            ("Bearer token", "token"),
        ];
        for (header, expected) in cases {
            assert_eq!(bearer_token(header), expected, "header {:?}", header);
        }
    }

    #[test]
    fn empty_configured_token_never_matches() {
        assert!(!tokens_match("", ""));
        assert!(!tokens_match("right", "righ"));
        assert!(!tokens_match("right", "wrong"));
        assert!(tokens_match("right", "right"));
    }

    fn app(expected: &str) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                AuthToken::new(expected),
                require_bearer,
            ))
    }

    async fn status_for(expected: &str, header: Option<&str>) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        app(expected)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn mismatched_token_is_unauthorized() {
        assert_eq!(
            status_for("token", Some("Bearer BLAH")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn matching_token_passes() {
        assert_eq!(status_for("BLAH", Some("Bearer BLAH")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        assert_eq!(status_for("BLAH", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for("BLAH", Some("Basic BLAH")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for("BLAH", Some("Bearer ")).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
