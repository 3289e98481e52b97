//! Queue-drain synchronization for the driver thread.
//!
//! A naive "wait for the current head event" only proves that events
//! queued *before* the call were processed, not ones queued afterwards,
//! including tasks that re-post themselves. The waiter instead posts
//! marker units of work and re-checks the pending head until the queue is
//! actually empty, bounded by the configured idle timeout.

use crate::errors::AutomationError;
use crate::registry::Registry;
use crate::settings::SharedSettings;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Pause between drain iterations; polling, never spinning
const IDLE_POLL_DELAY: Duration = Duration::from_millis(10);

/// Blocks the driver until every known queue is drained
pub struct IdleWaiter {
    registry: Arc<Registry>,
    settings: SharedSettings,
}

impl IdleWaiter {
    pub fn new(registry: Arc<Registry>, settings: SharedSettings) -> Self {
        Self { registry, settings }
    }

    /// Block until all known queues are drained and no synthetic marker is
    /// in flight, or the idle timeout elapses, whichever comes first.
    ///
    /// Iterating all known queues may re-examine a queue that has since
    /// gone idle or lost its windows; that is a documented characteristic
    /// of the known-queue list, not an error.
    ///
    /// Must be called from the driver thread: calling it from a GUI event
    /// thread would wait on that thread's own queue and is a programming
    /// error that fails immediately.
    #[instrument(level = "debug", skip(self))]
    pub fn wait_for_idle(&self) -> Result<(), AutomationError> {
        let queues = self.registry.known_queues();
        for queue in &queues {
            if queue.is_dispatch_thread() {
                return Err(AutomationError::ActionFailed(format!(
                    "wait_for_idle called from the dispatch thread of queue {}",
                    queue.id()
                )));
            }
        }

        let timeout = self.settings.idle_timeout();
        for queue in &queues {
            let start = Instant::now();
            loop {
                let remaining = timeout.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    warn!(
                        queue_id = queue.id(),
                        ?timeout,
                        "queue still busy at idle timeout boundary"
                    );
                    break;
                }
                // The rendezvous proves every event ahead of the marker was
                // dispatched; the pending check catches work queued behind it.
                if !queue.marker_rendezvous(remaining)? {
                    warn!(
                        queue_id = queue.id(),
                        ?timeout,
                        "marker rendezvous exceeded idle timeout"
                    );
                    break;
                }
                if !queue.has_pending() {
                    break;
                }
                thread::sleep(IDLE_POLL_DELAY);
            }
            debug!(
                queue_id = queue.id(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "queue drain finished"
            );
        }
        Ok(())
    }
}
