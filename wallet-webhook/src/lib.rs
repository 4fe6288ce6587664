//! Wallet webhook - in-process event ingress and typed dispatch.
//!
//! The wallet service pushes batches of events to a URL registered through its
//! admin API. This crate provides the receiving end:
//! - an axum handler to mount on the host's server
//! - a bounded queue absorbing bursts, with a short per-event wait before dropping
//! - a fixed pool of workers routing each event to a handler registered for
//!   its concrete payload type
//!
//! ## Architecture
//!
//! ```text
//! Wallet service → POST → Ingress (auth + decode) → EventQueue → Workers → Handler<T>
//! ```
//!
//! Delivery is best effort and at most once. Events with no handler, payloads
//! that do not decode and events that find the queue full are discarded
//! without surfacing an error.
//!
//! ```no_run
//! use serde::Deserialize;
//! use wallet_webhook::{register_handler, Options, Webhook};
//!
//! #[derive(Deserialize)]
//! struct Ping {
//!     seq: u64,
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let webhook = Webhook::new("https://app.example.com/webhook", Options::new())?;
//! register_handler(&webhook, |ping: &Ping| println!("ping {}", ping.seq));
//!
//! let app = webhook.router("/webhook");
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod registry;
pub mod stats;
pub mod subscription;
pub mod web;
pub mod webhook;

// Re-export commonly used types
pub use config::{Config, Options};
pub use error::{IngressError, SubscriptionError, WebhookError};
pub use queue::{EventQueue, RawEvent};
pub use registry::{event_type_name, HandlerDescriptor, HandlerRegistry};
pub use stats::StatsSnapshot;
pub use subscription::{HttpSubscriptionClient, SubscribeRequest, SubscriptionClient};
pub use web::BatchOutcome;
pub use webhook::{register_handler, Webhook};
