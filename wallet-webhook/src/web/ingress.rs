//! Batch admission: moves decoded events onto the queue.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::queue::{EnqueueError, EventQueue, RawEvent};
use crate::stats::DeliveryStats;

/// Result of admitting one delivery's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Events placed on the queue
    pub enqueued: usize,
    /// Events dropped because the queue stayed full
    pub dropped: usize,
    /// Whether the loop stopped early on cancellation
    pub aborted: bool,
}

/// Enqueue `events` one at a time, in order.
///
/// Each event races four outcomes:
/// - the queue accepts it: move on
/// - `request` is cancelled: stop, leaving the rest of the batch unadmitted
/// - `root` is cancelled: stop the same way
/// - `timeout` elapses: drop this event and move on
///
/// Events already enqueued stay enqueued when the loop stops early.
pub async fn admit_batch(
    queue: &EventQueue,
    events: Vec<RawEvent>,
    request: &CancellationToken,
    root: &CancellationToken,
    timeout: Duration,
    stats: &DeliveryStats,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for event in events {
        let event_type = event.event_type.clone();

        let result = tokio::select! {
            biased;
            _ = request.cancelled() => None,
            _ = root.cancelled() => None,
            result = queue.enqueue(event, timeout) => Some(result),
        };

        match result {
            Some(Ok(())) => {
                stats.record_enqueued();
                outcome.enqueued += 1;
            }
            Some(Err(EnqueueError::Timeout(waited))) => {
                debug!(
                    event_type = %event_type,
                    waited_ms = waited.as_millis() as u64,
                    "ingress_event_dropped"
                );
                stats.record_dropped_timeout();
                outcome.dropped += 1;
            }
            Some(Err(EnqueueError::Closed)) | None => {
                debug!(
                    enqueued = outcome.enqueued,
                    dropped = outcome.dropped,
                    "ingress_batch_aborted"
                );
                outcome.aborted = true;
                break;
            }
        }
    }

    outcome
}
