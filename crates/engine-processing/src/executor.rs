use crate::{
    error::ImportError,
    importer::{ImportOptions, ImportOutcome, RecordImporter},
    session::load_session,
};
use engine_core::{state::StateStore, tally::Tally};
use model::records::row::Row;
use std::{sync::Arc, time::Instant};
use tracing::debug;

/// Runs the importer for a single row under the stored session settings.
///
/// A returned outcome always means the row is finished; rows are never
/// retried, failures show up in the tally and the outcome's feedback.
pub struct TaskExecutor {
    state: Arc<dyn StateStore>,
    importer: RecordImporter,
}

impl TaskExecutor {
    pub fn new(state: Arc<dyn StateStore>, importer: RecordImporter) -> Self {
        TaskExecutor { state, importer }
    }

    pub async fn run(&self, row: &Row, tally: &mut Tally) -> Result<ImportOutcome, ImportError> {
        let started = Instant::now();
        let session = load_session(self.state.as_ref()).await?;

        // Blank cells may only clear values on queued rows.
        let options = ImportOptions {
            allow_blank_overwrite: session.is_background() && session.blank_overwrite(),
        };

        let outcome = self.importer.import(row, &session, tally, options).await?;

        debug!(
            action = %outcome.action,
            record_id = ?outcome.record_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Row handled"
        );
        Ok(outcome)
    }
}
