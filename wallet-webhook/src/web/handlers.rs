//! Webhook endpoint handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::IngressError;
use crate::queue::RawEvent;
use crate::web::auth::verify_token;
use crate::Webhook;

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Event Ingress
// =============================================================================

/// Ingress response body.
#[derive(Debug, Serialize)]
pub struct IngressResponse {
    pub status: &'static str,
}

/// Event delivery endpoint.
///
/// This endpoint:
/// 1. Verifies the delivery token header (if configured)
/// 2. Decodes the body as a JSON array of events
/// 3. Enqueues each event, dropping any that do not fit in time
/// 4. Returns 200 OK
///
/// The caller is never told which events were dropped.
pub async fn receive_events(
    State(webhook): State<Webhook>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngressResponse>, IngressError> {
    let stats = webhook.stats_handle();

    if !verify_token(&headers, webhook.options()) {
        stats.record_unauthorized();
        return Err(IngressError::Unauthorized);
    }

    let events = RawEvent::decode_batch(&body).map_err(|e| {
        warn!(error = %e, body_length = body.len(), "webhook_batch_malformed");
        stats.record_malformed();
        IngressError::MalformedBatch
    })?;

    info!(events = events.len(), "webhook_batch_received");
    stats.record_received(events.len());

    // Cancelled when this future is dropped, i.e. when the client goes away.
    let request = webhook.root().child_token();
    let _guard = request.clone().drop_guard();

    let outcome = webhook.enqueue_batch(events, &request).await;

    info!(
        enqueued = outcome.enqueued,
        dropped = outcome.dropped,
        aborted = outcome.aborted,
        "webhook_batch_processed"
    );

    Ok(Json(IngressResponse {
        status: if outcome.aborted { "aborted" } else { "accepted" },
    }))
}

/// Router serving the ingress on `POST path`, ready to merge into a host app.
pub fn router(webhook: Webhook, path: &str) -> Router {
    Router::new()
        .route(path, post(receive_events))
        .with_state(webhook)
}
