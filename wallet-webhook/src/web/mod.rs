//! HTTP ingress for wallet webhook deliveries.
//!
//! The ingress is a plain axum handler meant to be mounted on a server the
//! host owns. Per delivery it:
//! - Verifies the shared token header (if configured)
//! - Decodes the body as a JSON array of events, all or nothing
//! - Enqueues each event, waiting a bounded time for queue space
//!
//! Events that do not fit in time are dropped without telling the caller.

pub mod auth;
pub mod handlers;
pub mod ingress;

pub use auth::verify_token;
pub use handlers::{health, receive_events, router, HealthResponse, IngressResponse};
pub use ingress::{admit_batch, BatchOutcome};
