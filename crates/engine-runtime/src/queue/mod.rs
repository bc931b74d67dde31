use crate::{
    error::QueueError,
    queue::{config::QueueConfig, dispatch::Dispatch},
};
use engine_core::{
    event_bus::EventBus,
    state::{StateStore, get_json, keys, put_json},
    tally::{Tally, TallyState, TallyStatus},
};
use engine_processing::{
    executor::TaskExecutor,
    importer::ImportOutcome,
    session::{load_session, store_session},
};
use model::{
    events::{ProcessCompleted, QueueEntryDeleted, QueueSaved},
    records::{batch::ImportBatch, row::Row},
    session::ImportSession,
};
use serde::Serialize;
use std::{collections::HashSet, sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod config;
pub mod dispatch;

/// Result of one healthcheck tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthcheckOutcome {
    /// A worker is active; nothing to do.
    NoOp,
    /// The queue is empty and the schedule was cleared.
    Cleared,
    /// Progress was seen and processing was dispatched again.
    Resumed,
    /// No progress since the previous tick; the queue was aborted.
    Aborted,
}

/// Result of one `handle` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Another worker holds the process lock.
    Busy,
    /// The queue was drained and completed.
    Completed,
    /// The time limit ran out and processing was re-dispatched.
    Yielded,
    /// Processing stopped because the run was dismissed.
    Cancelled,
}

enum Drain {
    Empty,
    OutOfTime,
    Cancelled,
}

/// Snapshot of the persisted queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub batches: usize,
    pub rows: usize,
    pub running: bool,
    pub scheduled: bool,
    pub tally: TallyState,
}

/// Persists rows in batches and drives the task executor over them, either
/// inline or from a resumable background loop.
pub struct BatchQueue {
    state: Arc<dyn StateStore>,
    executor: TaskExecutor,
    events: EventBus,
    dispatcher: Arc<dyn Dispatch>,
    config: QueueConfig,
    pending: Mutex<Vec<Row>>,
    cancel: CancellationToken,
}

impl BatchQueue {
    pub fn new(
        state: Arc<dyn StateStore>,
        executor: TaskExecutor,
        events: EventBus,
        dispatcher: Arc<dyn Dispatch>,
        config: QueueConfig,
    ) -> Self {
        BatchQueue {
            state,
            executor,
            events,
            dispatcher,
            config,
            pending: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Begins a new run: previous counters, report and check token are
    /// discarded and the session is stored for every row that follows.
    pub async fn start(&self, session: &ImportSession) -> Result<(), QueueError> {
        self.tally().await?.reset().await?;
        self.state.delete(keys::CHECK_TOKEN).await?;
        self.pending.lock().await.clear();
        store_session(self.state.as_ref(), session).await?;
        Ok(())
    }

    /// Buffers `row` for the background worker, or imports it right away when
    /// the run is not in background mode.
    pub async fn push(&self, row: Row) -> Result<Option<ImportOutcome>, QueueError> {
        let session = load_session(self.state.as_ref()).await?;
        if session.is_background() {
            self.pending.lock().await.push(row);
            return Ok(None);
        }

        let mut tally = self.tally().await?;
        Ok(Some(self.executor.run(&row, &mut tally).await?))
    }

    /// Persists the buffered rows in batches of at most `batch_size` rows
    /// and returns their ids in processing order. Batches left behind by
    /// earlier runs are removed first.
    pub async fn save(&self) -> Result<Vec<String>, QueueError> {
        let mut rows = std::mem::take(&mut *self.pending.lock().await);
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let total = rows.len();
        let saved_at = chrono::Utc::now();
        let mut batches = Vec::new();
        let mut sequence = 0u64;
        while !rows.is_empty() {
            let rest = rows.split_off(rows.len().min(self.config.batch_size()));
            let mut batch = ImportBatch::numbered(sequence, std::mem::replace(&mut rows, rest));
            batch.created_at = saved_at;
            batches.push(batch);
            sequence += 1;
        }

        let fresh: HashSet<String> = batches.iter().map(|b| keys::batch_key(&b.id)).collect();
        for stale in self.state.keys_with_prefix(keys::BATCH_PREFIX).await? {
            if !fresh.contains(&stale)
                && let Some(stale_id) = keys::batch_id_from_key(&stale)
            {
                warn!(batch_id = %stale_id, "Removing batch left by an earlier run");
                self.delete(stale_id).await?;
            }
        }

        for batch in &batches {
            put_json(self.state.as_ref(), &keys::batch_key(&batch.id), batch, None).await?;
            debug!(batch_id = %batch.id, sequence = batch.sequence, rows = batch.len(), bytes = batch.size_bytes(), "Batch saved");
            self.events
                .publish(QueueSaved {
                    batch_id: batch.id.clone(),
                    row_count: batch.len() as u64,
                    timestamp: chrono::Utc::now(),
                })
                .await;
        }
        self.tally().await?.set_length(total as u64).await?;

        info!(batches = batches.len(), rows = total, "Queue saved");
        Ok(batches.into_iter().map(|b| b.id).collect())
    }

    /// Loads the oldest batch. The first claim of a run also stores its
    /// fingerprint as the check token.
    pub async fn next_batch(&self) -> Result<Option<ImportBatch>, QueueError> {
        let Some(batch) = self.peek_batch().await? else {
            return Ok(None);
        };

        if self.state.get(keys::CHECK_TOKEN).await?.is_none() {
            debug!(batch_id = %batch.id, "Claiming batch");
            self.store_token(&batch.fingerprint()).await?;
        }
        Ok(Some(batch))
    }

    /// Processes persisted rows until the queue is empty or the time limit
    /// is reached, then completes the run or re-dispatches itself.
    pub async fn handle(&self) -> Result<HandleOutcome, QueueError> {
        if self.is_running().await? {
            debug!("Worker already active");
            return Ok(HandleOutcome::Busy);
        }

        self.hold_lock().await?;
        let drained = self.drain().await;
        self.state.delete(keys::PROCESS_LOCK).await?;

        match drained? {
            Drain::Empty => {
                self.complete().await?;
                Ok(HandleOutcome::Completed)
            }
            Drain::OutOfTime => {
                self.dispatch().await?;
                Ok(HandleOutcome::Yielded)
            }
            Drain::Cancelled => {
                info!("Processing cancelled");
                Ok(HandleOutcome::Cancelled)
            }
        }
    }

    async fn drain(&self) -> Result<Drain, QueueError> {
        let started = Instant::now();
        let mut tally = self.tally().await?;
        let mut handled = 0u64;

        while let Some(mut batch) = self.next_batch().await? {
            if batch.is_empty() {
                self.delete(&batch.id).await?;
                continue;
            }

            info!(batch_id = %batch.id, rows = batch.len(), "Processing batch");
            let key = keys::batch_key(&batch.id);

            while !batch.is_empty() {
                if self.cancel.is_cancelled() {
                    return Ok(Drain::Cancelled);
                }
                if handled > 0 && started.elapsed() >= self.config.time_limit() {
                    info!(batch_id = %batch.id, handled, remaining = batch.len(), "Time limit reached");
                    return Ok(Drain::OutOfTime);
                }

                let row = batch.rows.remove(0);
                self.executor.run(&row, &mut tally).await?;
                handled += 1;

                // Remaining rows go back under the same key so the fingerprint moves.
                if batch.is_empty() {
                    self.delete(&batch.id).await?;
                } else {
                    put_json(self.state.as_ref(), &key, &batch, None).await?;
                }

                // A dismissal during the row raced the counter write; drop it again.
                if self.cancel.is_cancelled() {
                    tally.reset().await?;
                    return Ok(Drain::Cancelled);
                }
                self.hold_lock().await?;
            }
        }

        Ok(Drain::Empty)
    }

    /// Resumes stalled background work, or aborts it when the previous tick
    /// saw the same batch fingerprint.
    pub async fn healthcheck(&self) -> Result<HealthcheckOutcome, QueueError> {
        if self.is_running().await? {
            debug!("Healthcheck skipped, worker active");
            return Ok(HealthcheckOutcome::NoOp);
        }

        let Some(batch) = self.peek_batch().await? else {
            self.state.delete(keys::HEALTHCHECK_CRON).await?;
            info!("Queue empty, healthcheck unscheduled");
            return Ok(HealthcheckOutcome::Cleared);
        };

        let fingerprint = batch.fingerprint();
        let token: Option<String> = get_json(self.state.as_ref(), keys::CHECK_TOKEN).await?;

        if token.as_deref() == Some(fingerprint.as_str()) {
            warn!(batch_id = %batch.id, rows = batch.len(), "No progress since the last healthcheck");
            self.abort().await?;
            return Ok(HealthcheckOutcome::Aborted);
        }

        self.store_token(&fingerprint).await?;
        info!(batch_id = %batch.id, rows = batch.len(), "Resuming import");
        self.dispatch().await?;
        Ok(HealthcheckOutcome::Resumed)
    }

    /// Gives up on the remaining rows of the run.
    pub async fn abort(&self) -> Result<(), QueueError> {
        let mut tally = self.tally().await?;
        tally.add(TallyStatus::Error, 1).await?;
        self.state.delete(keys::CHECK_TOKEN).await?;

        let row = tally.state().processed();
        tally
            .terminate(format!("Import terminated: processing stalled at row {row}."))
            .await?;

        for key in self.state.keys_with_prefix(keys::BATCH_PREFIX).await? {
            if let Some(batch_id) = keys::batch_id_from_key(&key) {
                self.delete(batch_id).await?;
            }
        }

        warn!(row, "Import aborted");
        self.complete().await
    }

    /// Finishes the run once the persisted queue is empty.
    pub async fn complete(&self) -> Result<(), QueueError> {
        let mut tally = self.tally().await?;
        tally.finish().await?;
        self.state.delete(keys::HEALTHCHECK_CRON).await?;
        self.state.delete(keys::CHECK_TOKEN).await?;

        let aborted = tally.state().terminated.is_some();
        info!(aborted, rows_imported = tally.progress(), "Import complete");
        self.events
            .publish(ProcessCompleted {
                aborted,
                rows_imported: tally.progress(),
                timestamp: chrono::Utc::now(),
            })
            .await;
        Ok(())
    }

    /// Removes one persisted batch; listeners hear about it first.
    pub async fn delete(&self, batch_id: &str) -> Result<bool, QueueError> {
        self.events
            .publish(QueueEntryDeleted {
                batch_id: batch_id.to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await;
        Ok(self.state.delete(&keys::batch_key(batch_id)).await?)
    }

    /// Schedules healthchecks and hands processing to the dispatcher.
    pub async fn dispatch(&self) -> Result<(), QueueError> {
        put_json(
            self.state.as_ref(),
            keys::HEALTHCHECK_CRON,
            &chrono::Utc::now(),
            None,
        )
        .await?;
        self.dispatcher.dispatch().await?;
        Ok(())
    }

    /// Operator dismissal: clears counters and report and stops an
    /// in-process worker after its current row.
    pub async fn dismiss(&self) -> Result<(), QueueError> {
        self.tally().await?.reset().await?;
        self.cancel.cancel();
        info!("Import dismissed");
        Ok(())
    }

    pub async fn report(&self) -> Result<String, QueueError> {
        Ok(self.tally().await?.report().await?)
    }

    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let batches = self.load_batches().await?;
        Ok(QueueStatus {
            batches: batches.len(),
            rows: batches.iter().map(ImportBatch::len).sum(),
            running: self.is_running().await?,
            scheduled: self.is_scheduled().await?,
            tally: self.tally().await?.state().clone(),
        })
    }

    pub async fn is_running(&self) -> Result<bool, QueueError> {
        Ok(self.state.get(keys::PROCESS_LOCK).await?.is_some())
    }

    pub async fn is_scheduled(&self) -> Result<bool, QueueError> {
        Ok(self.state.get(keys::HEALTHCHECK_CRON).await?.is_some())
    }

    async fn tally(&self) -> Result<Tally, QueueError> {
        Ok(Tally::load(self.state.clone()).await?)
    }

    async fn hold_lock(&self) -> Result<(), QueueError> {
        put_json(
            self.state.as_ref(),
            keys::PROCESS_LOCK,
            &chrono::Utc::now(),
            Some(self.config.lock_ttl()),
        )
        .await?;
        Ok(())
    }

    async fn store_token(&self, fingerprint: &str) -> Result<(), QueueError> {
        put_json(
            self.state.as_ref(),
            keys::CHECK_TOKEN,
            &fingerprint,
            Some(self.config.token_ttl()),
        )
        .await?;
        Ok(())
    }

    async fn load_batches(&self) -> Result<Vec<ImportBatch>, QueueError> {
        let mut batches = Vec::new();
        for key in self.state.keys_with_prefix(keys::BATCH_PREFIX).await? {
            if let Some(batch) = get_json::<ImportBatch>(self.state.as_ref(), &key).await? {
                batches.push(batch);
            }
        }
        Ok(batches)
    }

    async fn peek_batch(&self) -> Result<Option<ImportBatch>, QueueError> {
        Ok(self
            .load_batches()
            .await?
            .into_iter()
            .min_by_key(|batch| (batch.created_at, batch.sequence)))
    }
}
