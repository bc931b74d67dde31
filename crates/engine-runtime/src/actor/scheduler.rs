use crate::{
    error::QueueError,
    queue::{BatchQueue, HealthcheckOutcome},
};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic trigger for [`BatchQueue::healthcheck`].
///
/// Ticks until a healthcheck clears or aborts the queue, or until cancelled.
pub struct TickScheduler {
    queue: Arc<BatchQueue>,
    first_delay: Duration,
    interval: Duration,
    cancel: CancellationToken,
}

impl TickScheduler {
    pub fn new(queue: Arc<BatchQueue>, cancel: CancellationToken) -> Self {
        let interval = queue.config().healthcheck_interval();
        TickScheduler {
            queue,
            first_delay: interval,
            interval,
            cancel,
        }
    }

    /// Delay before the first tick, the interval by default.
    pub fn with_first_delay(mut self, delay: Duration) -> Self {
        self.first_delay = delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the final outcome, or `None` when cancelled first.
    pub async fn run(self) -> Result<Option<HealthcheckOutcome>, QueueError> {
        let mut delay = self.first_delay;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Tick scheduler cancelled");
                    return Ok(None);
                }
                _ = time::sleep(delay) => {}
            }
            delay = self.interval;

            let outcome = self.queue.healthcheck().await?;
            debug!(?outcome, "Healthcheck tick");

            if matches!(outcome, HealthcheckOutcome::Cleared | HealthcheckOutcome::Aborted) {
                info!(?outcome, "Tick scheduler finished");
                return Ok(Some(outcome));
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<Option<HealthcheckOutcome>, QueueError>> {
        tokio::spawn(self.run())
    }
}
