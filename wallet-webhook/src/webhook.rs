//! The webhook: queue, registry, workers and subscription wiring in one place.
//!
//! ```text
//! Created ──subscribe()──► Subscribed ──unsubscribe()──► Unsubscribed
//!    │                         │                             │
//!    └─────────────── root token cancelled ─────────────────►└──► Stopped
//! ```
//!
//! Workers start as soon as the webhook is built, whether or not it is
//! subscribed. Subscription state lives on the wallet service only; the
//! webhook does not track it. Stopped is terminal.

use std::sync::Arc;

use axum::Router;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::config::Options;
use crate::dispatch::DispatchWorkerPool;
use crate::error::{SubscriptionError, WebhookError};
use crate::queue::{EventQueue, RawEvent};
use crate::registry::HandlerRegistry;
use crate::stats::{DeliveryStats, StatsSnapshot};
use crate::subscription::{SubscribeRequest, SubscriptionClient};
use crate::web::{self, BatchOutcome};

/// An in-process webhook endpoint with typed event dispatch.
///
/// Cloning is cheap; clones share the same queue, registry and workers.
#[derive(Clone)]
pub struct Webhook {
    inner: Arc<WebhookInner>,
}

struct WebhookInner {
    subscription_url: Url,
    options: Options,
    queue: EventQueue,
    registry: Arc<HandlerRegistry>,
    stats: Arc<DeliveryStats>,
    subscriptions: Option<Arc<dyn SubscriptionClient>>,
    workers: DispatchWorkerPool,
}

impl Webhook {
    /// Build a webhook without a subscription client and start its workers.
    ///
    /// `subscription_url` is the public URL the wallet service delivers to.
    /// Must be called from within a tokio runtime.
    pub fn new(subscription_url: &str, options: Options) -> Result<Self, WebhookError> {
        Self::build(subscription_url, options, None)
    }

    /// Build a webhook that can manage its own subscription through `client`.
    pub fn with_client(
        subscription_url: &str,
        options: Options,
        client: Arc<dyn SubscriptionClient>,
    ) -> Result<Self, WebhookError> {
        Self::build(subscription_url, options, Some(client))
    }

    fn build(
        subscription_url: &str,
        options: Options,
        subscriptions: Option<Arc<dyn SubscriptionClient>>,
    ) -> Result<Self, WebhookError> {
        options.validate()?;
        let subscription_url =
            Url::parse(subscription_url).map_err(|source| WebhookError::InvalidUrl {
                url: subscription_url.to_string(),
                source,
            })?;

        let queue = EventQueue::new(options.buffer_size);
        let registry = Arc::new(HandlerRegistry::new());
        let stats = Arc::new(DeliveryStats::new());
        let workers = DispatchWorkerPool::spawn(
            options.processors,
            queue.clone(),
            Arc::clone(&registry),
            Arc::clone(&stats),
            options.root.clone(),
        );

        info!(
            url = %subscription_url,
            buffer_size = options.buffer_size,
            processors = options.processors,
            auth_enabled = options.auth_enabled(),
            "webhook_created"
        );

        Ok(Self {
            inner: Arc::new(WebhookInner {
                subscription_url,
                options,
                queue,
                registry,
                stats,
                subscriptions,
                workers,
            }),
        })
    }

    /// Register `handler` for events whose type is the short name of `T`.
    pub fn register<T, F>(&self, handler: F) -> String
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.registry.register::<T, F>(handler)
    }

    /// Register `handler` for events of an explicit type.
    pub fn register_as<T, F>(&self, event_type: impl Into<String>, handler: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.registry.register_as::<T, F>(event_type, handler)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn subscription_url(&self) -> &Url {
        &self.inner.subscription_url
    }

    pub fn queue(&self) -> &EventQueue {
        &self.inner.queue
    }

    /// Root cancellation token governing the workers.
    pub fn root(&self) -> &CancellationToken {
        &self.inner.options.root
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub(crate) fn stats_handle(&self) -> &DeliveryStats {
        &self.inner.stats
    }

    /// Enqueue a decoded batch, bounded per event by the enqueue timeout.
    ///
    /// `request` scopes this batch only; cancelling it stops admission of the
    /// rest of the batch without affecting other batches or the workers.
    pub async fn enqueue_batch(
        &self,
        events: Vec<RawEvent>,
        request: &CancellationToken,
    ) -> BatchOutcome {
        web::admit_batch(
            &self.inner.queue,
            events,
            request,
            self.root(),
            self.inner.options.enqueue_timeout,
            &self.inner.stats,
        )
        .await
    }

    /// Router serving the ingress handler on `POST path`.
    pub fn router(&self, path: &str) -> Router {
        web::router(self.clone(), path)
    }

    /// Register this webhook's URL and token with the wallet service.
    pub async fn subscribe(&self) -> Result<(), SubscriptionError> {
        let client = self.subscription_client()?;
        client
            .subscribe(&SubscribeRequest {
                url: self.inner.subscription_url.to_string(),
                token_header: self.inner.options.token_header.clone(),
                token_value: self.inner.options.token_value.clone(),
            })
            .await
    }

    /// Remove this webhook's URL from the wallet service.
    pub async fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        let client = self.subscription_client()?;
        client
            .unsubscribe(self.inner.subscription_url.as_str())
            .await
    }

    fn subscription_client(&self) -> Result<&Arc<dyn SubscriptionClient>, SubscriptionError> {
        self.inner
            .subscriptions
            .as_ref()
            .ok_or(SubscriptionError::NotConfigured)
    }

    /// Whether the root token has been cancelled.
    pub fn is_stopped(&self) -> bool {
        self.root().is_cancelled()
    }

    /// Number of workers still running.
    pub fn running_workers(&self) -> usize {
        self.inner.workers.running()
    }

    /// Cancel the root token and wait for every worker to exit.
    ///
    /// Events still queued are discarded with the webhook. There is no restart.
    pub async fn shutdown(&self) {
        self.root().cancel();
        self.inner.workers.join().await;
        info!(pending = self.inner.queue.len(), "webhook_stopped");
    }
}

/// Register a typed handler on `webhook`.
///
/// The event type is derived from `T`'s name, so `register_handler(&hook,
/// |p: &Ping| ...)` handles events with `"type": "Ping"`.
pub fn register_handler<T, F>(webhook: &Webhook, handler: F) -> String
where
    T: DeserializeOwned + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    webhook.register::<T, F>(handler)
}
