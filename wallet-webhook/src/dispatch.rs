//! Dispatch worker pool.
//!
//! A fixed number of workers drain the event queue until the root
//! cancellation token fires. For each event a worker:
//! 1. Looks up the handler registered for the event type
//! 2. Decodes the payload into the handler's type
//! 3. Runs the handler and waits for it before taking the next event
//!
//! Unroutable events and payloads that do not decode are discarded.
//! Handlers run on the blocking pool so a slow handler stalls only its worker.
//! A handler that panics takes its worker down with it; the others keep going.

use std::sync::{Arc, Mutex};

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::queue::{EventQueue, RawEvent};
use crate::registry::HandlerRegistry;
use crate::stats::DeliveryStats;

/// What happened to a single dequeued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran to completion
    Dispatched,
    /// No handler registered for the event type
    Unroutable,
    /// Payload did not decode into the handler's type
    DecodeFailed,
}

/// Handles of the running workers.
pub struct DispatchWorkerPool {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchWorkerPool {
    /// Start `processors` workers. Must be called from within a tokio runtime.
    pub fn spawn(
        processors: usize,
        queue: EventQueue,
        registry: Arc<HandlerRegistry>,
        stats: Arc<DeliveryStats>,
        root: CancellationToken,
    ) -> Self {
        let handles = (0..processors)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    queue.clone(),
                    Arc::clone(&registry),
                    Arc::clone(&stats),
                    root.clone(),
                ))
            })
            .collect();

        info!(processors = processors, "dispatch_workers_started");

        Self {
            handles: Mutex::new(handles),
        }
    }

    /// Wait for every worker to exit.
    ///
    /// Workers only exit once the root token is cancelled (or their handler
    /// panicked), so cancel first. Calling this again is a no-op.
    pub async fn join(&self) {
        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "dispatch_worker_join_failed");
            }
        }
    }

    /// Number of workers that have not exited yet.
    pub fn running(&self) -> usize {
        match self.handles.lock() {
            Ok(handles) => handles.iter().filter(|h| !h.is_finished()).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|h| !h.is_finished())
                .count(),
        }
    }
}

/// Worker loop: runs until the root token is cancelled.
async fn run_worker(
    worker: usize,
    queue: EventQueue,
    registry: Arc<HandlerRegistry>,
    stats: Arc<DeliveryStats>,
    root: CancellationToken,
) {
    debug!(worker = worker, "dispatch_worker_ready");

    loop {
        let event = tokio::select! {
            biased;
            _ = root.cancelled() => {
                debug!(worker = worker, "dispatch_worker_stopping");
                break;
            }
            event = queue.dequeue() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if let Err(e) = dispatch(event, &registry, &stats).await {
            error!(worker = worker, error = %e, "dispatch_handler_panicked");
            break;
        }
    }

    debug!(worker = worker, "dispatch_worker_exited");
}

/// Route one event to its handler and wait for the handler to finish.
///
/// Returns `Err` only when the handler panicked.
pub async fn dispatch(
    event: RawEvent,
    registry: &HandlerRegistry,
    stats: &DeliveryStats,
) -> Result<DispatchOutcome, JoinError> {
    let Some(handler) = registry.lookup(&event.event_type) else {
        debug!(event_type = %event.event_type, "dispatch_unroutable");
        stats.record_unroutable();
        return Ok(DispatchOutcome::Unroutable);
    };

    let event_type = event.event_type;
    let content = event.content;
    let decoded = tokio::task::spawn_blocking(move || handler.invoke(&content)).await?;

    match decoded {
        Ok(()) => {
            stats.record_dispatched();
            Ok(DispatchOutcome::Dispatched)
        }
        Err(e) => {
            debug!(event_type = %event_type, error = %e, "dispatch_decode_failed");
            stats.record_decode_failed();
            Ok(DispatchOutcome::DecodeFailed)
        }
    }
}
