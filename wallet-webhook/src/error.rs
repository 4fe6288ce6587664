//! Error types surfaced by the webhook engine.
//!
//! Only authentication failures, malformed batches and subscription failures
//! are ever observable outside the engine. Unroutable events, payloads that do
//! not decode and events dropped on enqueue timeout are discarded silently.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::web::handlers::IngressResponse;

/// Errors raised while constructing a webhook.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("invalid subscription url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors returned verbatim from the remote subscription API.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("subscription request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("subscription request rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid admin url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("no subscription client configured")]
    NotConfigured,
}

/// Rejections produced by the ingress handler before anything is enqueued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressError {
    #[error("delivery token mismatch")]
    Unauthorized,

    #[error("request body is not a JSON array of events")]
    MalformedBatch,
}

impl IngressError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngressError::Unauthorized => StatusCode::UNAUTHORIZED,
            IngressError::MalformedBatch => StatusCode::BAD_REQUEST,
        }
    }

    /// Short stable label used in responses and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            IngressError::Unauthorized => "unauthorized",
            IngressError::MalformedBatch => "malformed",
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(IngressResponse {
                status: self.as_label(),
            }),
        )
            .into_response()
    }
}
