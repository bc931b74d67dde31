use crate::{
    error::StateStoreError,
    state::{StateStore, get_json, keys, put_json},
};
use model::records::action::RecordAction;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, info};

/// Outcome bucket a processed row is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TallyStatus {
    Insert,
    Update,
    Skip,
    Error,
}

impl TallyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TallyStatus::Insert => "insert",
            TallyStatus::Update => "update",
            TallyStatus::Skip => "skip",
            TallyStatus::Error => "error",
        }
    }
}

impl From<RecordAction> for TallyStatus {
    fn from(action: RecordAction) -> Self {
        match action {
            RecordAction::Insert => TallyStatus::Insert,
            RecordAction::Update => TallyStatus::Update,
            RecordAction::Skip => TallyStatus::Skip,
        }
    }
}

impl fmt::Display for TallyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted counters of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyState {
    pub insert: u64,
    pub update: u64,
    pub skip: u64,
    pub error: u64,
    pub last_status: Option<TallyStatus>,
    /// Rows written, i.e. `insert + update`.
    pub progress: u64,
    /// Expected total number of rows.
    pub length: Option<u64>,
    /// Set once the queue has finished, even if `progress` never reached `length`.
    pub complete: bool,
    /// Explanation appended to the report when the run was cut short.
    pub terminated: Option<String>,
}

impl TallyState {
    pub fn count(&self, status: TallyStatus) -> u64 {
        match status {
            TallyStatus::Insert => self.insert,
            TallyStatus::Update => self.update,
            TallyStatus::Skip => self.skip,
            TallyStatus::Error => self.error,
        }
    }

    /// Rows that reached any bucket.
    pub fn processed(&self) -> u64 {
        self.insert + self.update + self.skip + self.error
    }

    fn is_empty(&self) -> bool {
        *self == TallyState::default()
    }
}

/// Running count of row outcomes for the current session.
///
/// Every mutation is written through to the state store so a worker in a
/// later process picks up where the previous one stopped.
pub struct Tally {
    store: Arc<dyn StateStore>,
    state: TallyState,
}

impl Tally {
    /// Loads the persisted counters, starting empty if there are none.
    pub async fn load(store: Arc<dyn StateStore>) -> Result<Self, StateStoreError> {
        let state = get_json(store.as_ref(), keys::TALLY)
            .await?
            .unwrap_or_default();
        Ok(Tally { store, state })
    }

    pub fn state(&self) -> &TallyState {
        &self.state
    }

    pub fn count(&self, status: TallyStatus) -> u64 {
        self.state.count(status)
    }

    pub fn progress(&self) -> u64 {
        self.state.progress
    }

    pub fn length(&self) -> Option<u64> {
        self.state.length
    }

    pub fn last_status(&self) -> Option<TallyStatus> {
        self.state.last_status
    }

    pub async fn add(&mut self, status: TallyStatus, n: u64) -> Result<(), StateStoreError> {
        let bucket = match status {
            TallyStatus::Insert => &mut self.state.insert,
            TallyStatus::Update => &mut self.state.update,
            TallyStatus::Skip => &mut self.state.skip,
            TallyStatus::Error => &mut self.state.error,
        };
        *bucket += n;
        self.state.last_status = Some(status);
        self.state.progress = self.state.insert + self.state.update;

        debug!(status = %status, n, progress = self.state.progress, "Tally updated");
        self.persist().await
    }

    /// Records the expected number of rows for this run.
    pub async fn set_length(&mut self, n: u64) -> Result<(), StateStoreError> {
        self.state.length = Some(n);
        self.persist().await
    }

    /// `true` once a length is set and progress has reached it.
    pub fn is_complete(&self) -> bool {
        self.state.length == Some(self.state.progress)
    }

    /// Marks the run as finished so the next [`Tally::report`] freezes it.
    pub async fn finish(&mut self) -> Result<(), StateStoreError> {
        self.state.complete = true;
        self.persist().await
    }

    /// Marks the run as cut short; `message` is appended to the report.
    pub async fn terminate(&mut self, message: impl Into<String>) -> Result<(), StateStoreError> {
        self.state.terminated = Some(message.into());
        self.persist().await
    }

    /// Renders the user-facing summary.
    ///
    /// Once the run is complete the text is frozen into its own slot and the
    /// live counters are cleared; later calls serve the frozen text until
    /// [`Tally::reset`].
    pub async fn report(&mut self) -> Result<String, StateStoreError> {
        if self.state.is_empty()
            && let Some(frozen) = get_json::<String>(self.store.as_ref(), keys::FROZEN_REPORT).await?
        {
            return Ok(frozen);
        }

        let text = render(&self.state);

        if self.is_complete() || self.state.complete {
            info!(report = %text, "Freezing import report");
            put_json(self.store.as_ref(), keys::FROZEN_REPORT, &text, None).await?;
            self.state = TallyState::default();
            self.store.delete(keys::TALLY).await?;
        }

        Ok(text)
    }

    /// Clears live counters and any frozen report.
    pub async fn reset(&mut self) -> Result<(), StateStoreError> {
        self.state = TallyState::default();
        self.store.delete(keys::TALLY).await?;
        self.store.delete(keys::FROZEN_REPORT).await?;
        Ok(())
    }

    async fn persist(&self) -> Result<(), StateStoreError> {
        put_json(self.store.as_ref(), keys::TALLY, &self.state, None).await
    }
}

fn plural(n: u64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn render(state: &TallyState) -> String {
    let mut parts = Vec::new();

    if state.insert > 0 {
        parts.push(format!(
            "{} added",
            plural(state.insert, "new record", "new records")
        ));
    }
    if state.update > 0 {
        parts.push(format!(
            "{} updated",
            plural(state.update, "existing record", "existing records")
        ));
    }
    if state.skip > 0 {
        parts.push(format!(
            "{} skipped",
            plural(state.skip, "duplicate record", "duplicate records")
        ));
    }
    if state.error > 0 {
        parts.push(format!(
            "{} not be imported",
            plural(state.error, "record could", "records could")
        ));
    }

    let total = match state.length {
        Some(length) => format!(
            "{} of {} imported.",
            state.progress,
            plural(length, "record", "records")
        ),
        None => format!("{} imported.", plural(state.progress, "record", "records")),
    };

    let mut text = if parts.is_empty() {
        total
    } else {
        format!("{}. {total}", parts.join(", "))
    };

    if let Some(terminated) = &state.terminated {
        text.push(' ');
        text.push_str(terminated);
    }

    text
}
