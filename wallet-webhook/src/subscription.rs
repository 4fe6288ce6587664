//! Remote webhook subscription management.
//!
//! The wallet service pushes events only to URLs registered through its admin
//! API. Subscribing and unsubscribing are single requests; failures are handed
//! back to the caller unchanged and never retried.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SubscriptionError;

/// Admin API path for registering a webhook.
pub const SUBSCRIBE_PATH: &str = "v1/admin/webhooks/subscribe";

/// Admin API path for removing a webhook.
pub const UNSUBSCRIBE_PATH: &str = "v1/admin/webhooks/unsubscribe";

/// Registration sent to the wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// URL events are delivered to
    pub url: String,
    /// Header the service should send the token in
    pub token_header: String,
    /// Token value the service should send
    pub token_value: String,
}

/// Removal request sent to the wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub url: String,
}

/// Remote subscribe/unsubscribe operations.
#[async_trait]
pub trait SubscriptionClient: Send + Sync {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<(), SubscriptionError>;

    async fn unsubscribe(&self, url: &str) -> Result<(), SubscriptionError>;
}

/// [`SubscriptionClient`] talking to the wallet admin API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSubscriptionClient {
    client: Client,
    base_url: Url,
    admin_token: Option<String>,
}

impl HttpSubscriptionClient {
    /// Create a client for the admin API rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, SubscriptionError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            admin_token: None,
        })
    }

    /// Send `token` as a bearer token on every admin request.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, TLS roots).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SubscriptionError> {
        Ok(self.base_url.join(path)?)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), SubscriptionError> {
        let endpoint = self.endpoint(path)?;

        let mut request = self.client.post(endpoint.clone()).json(body);
        if let Some(token) = &self.admin_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(
                    endpoint = %endpoint,
                    error = %e,
                    "subscription_error_body_unreadable"
                );
                String::new()
            }
        };
        warn!(
            endpoint = %endpoint,
            status_code = status.as_u16(),
            "subscription_request_rejected"
        );
        Err(SubscriptionError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SubscriptionClient for HttpSubscriptionClient {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<(), SubscriptionError> {
        self.post(SUBSCRIBE_PATH, request).await?;
        info!(url = %request.url, "webhook_subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, url: &str) -> Result<(), SubscriptionError> {
        self.post(
            UNSUBSCRIBE_PATH,
            &UnsubscribeRequest {
                url: url.to_string(),
            },
        )
        .await?;
        info!(url = %url, "webhook_unsubscribed");
        Ok(())
    }
}
