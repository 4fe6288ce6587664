//! Configuration for the webhook engine.
//!
//! [`Options`] is the construction-time configuration of a [`crate::Webhook`].
//! [`Config`] is read from environment variables by the host binary and turned
//! into [`Options`].

use std::env;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::WebhookError;

/// Default capacity of the event queue.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Default number of dispatch workers.
pub const DEFAULT_PROCESSORS: usize = 1;

/// Default time an ingress request waits for queue space per event.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Construction-time options of a webhook.
///
/// Immutable once handed to [`crate::Webhook::new`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Header the remote service sends the shared token in. Empty disables the check.
    pub token_header: String,

    /// Expected value of `token_header`.
    pub token_value: String,

    /// Capacity of the event queue.
    pub buffer_size: usize,

    /// Number of dispatch workers.
    pub processors: usize,

    /// How long ingress waits for queue space before dropping an event.
    pub enqueue_timeout: Duration,

    /// Root cancellation scope. Cancelling it stops the workers for good.
    pub root: CancellationToken,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token_header: String::new(),
            token_value: String::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            processors: DEFAULT_PROCESSORS,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            root: CancellationToken::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `header` to carry `value` on every delivery.
    pub fn with_token(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.token_header = header.into();
        self.token_value = value.into();
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_processors(mut self, processors: usize) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Tie the webhook's lifetime to an externally owned cancellation token.
    pub fn with_root(mut self, root: CancellationToken) -> Self {
        self.root = root;
        self
    }

    /// Whether deliveries must carry the shared token.
    pub fn auth_enabled(&self) -> bool {
        !self.token_header.is_empty()
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), WebhookError> {
        if self.buffer_size == 0 {
            return Err(WebhookError::InvalidOptions(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.buffer_size > Semaphore::MAX_PERMITS {
            return Err(WebhookError::InvalidOptions(format!(
                "buffer_size must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.processors == 0 {
            return Err(WebhookError::InvalidOptions(
                "processors must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Host process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path the ingress handler is mounted on
    pub webhook_path: String,

    /// Public URL the wallet service should deliver events to
    pub webhook_url: String,

    /// Base URL of the wallet admin API
    pub wallet_admin_url: String,

    /// Optional bearer token for the wallet admin API
    pub wallet_admin_token: Option<String>,

    /// Header carrying the shared delivery token
    pub token_header: String,

    /// Expected value of the delivery token
    pub token_value: String,

    /// Event queue capacity
    pub buffer_size: usize,

    /// Number of dispatch workers
    pub processors: usize,

    /// Per-event enqueue wait in milliseconds
    pub enqueue_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 8080),

            webhook_path: env::var("WEBHOOK_PATH").unwrap_or_else(|_| "/webhook".to_string()),

            webhook_url: env::var("WEBHOOK_URL")
                .unwrap_or_else(|_| "http://localhost:8080/webhook".to_string()),

            wallet_admin_url: env::var("WALLET_ADMIN_URL")
                .unwrap_or_else(|_| "http://localhost:3003".to_string()),

            wallet_admin_token: env::var("WALLET_ADMIN_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            token_header: env::var("WEBHOOK_TOKEN_HEADER").unwrap_or_default(),

            token_value: env::var("WEBHOOK_TOKEN_VALUE").unwrap_or_default(),

            buffer_size: parse_or("WEBHOOK_BUFFER_SIZE", DEFAULT_BUFFER_SIZE),

            processors: parse_or("WEBHOOK_PROCESSORS", DEFAULT_PROCESSORS),

            enqueue_timeout_ms: parse_or(
                "WEBHOOK_ENQUEUE_TIMEOUT_MS",
                DEFAULT_ENQUEUE_TIMEOUT.as_millis() as u64,
            ),
        }
    }

    /// Build engine options bound to the given root token.
    pub fn options(&self, root: CancellationToken) -> Options {
        Options::new()
            .with_token(self.token_header.clone(), self.token_value.clone())
            .with_buffer_size(self.buffer_size)
            .with_processors(self.processors)
            .with_enqueue_timeout(Duration::from_millis(self.enqueue_timeout_ms))
            .with_root(root)
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
