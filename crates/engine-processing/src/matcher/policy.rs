use model::session::{DuplicateMode, ImportSession};
use serde::{Deserialize, Serialize};

/// Inputs of the duplicate decision for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPolicy {
    mode: DuplicateMode,
    match_field: String,
}

impl MatchPolicy {
    pub fn new(mode: DuplicateMode, match_field: impl Into<String>) -> Self {
        MatchPolicy {
            mode,
            match_field: match_field.into(),
        }
    }

    /// Bulk import: the run's own settings apply to every row.
    pub fn from_session(session: &ImportSession) -> Self {
        MatchPolicy::new(session.mode(), session.match_field())
    }

    /// Form submission: stored preferences apply, adjusted for the submitter.
    ///
    /// Multi-step submissions always skip duplicates. Otherwise privileged
    /// submitters bypass duplicate handling altogether.
    pub fn interactive(prefs: &FormPreferences, submitter: &Submitter) -> Self {
        let mode = if submitter.multi_step {
            DuplicateMode::Skip
        } else if submitter.privileged {
            DuplicateMode::Add
        } else {
            prefs.duplicate_preference
        };
        MatchPolicy::new(mode, prefs.unique_field.clone())
    }

    pub fn mode(&self) -> DuplicateMode {
        self.mode
    }

    pub fn match_field(&self) -> &str {
        &self.match_field
    }
}

/// Stored duplicate settings of an interactive form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPreferences {
    #[serde(default)]
    pub duplicate_preference: DuplicateMode,
    #[serde(default)]
    pub unique_field: String,
}

/// Who is submitting a form and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Submitter {
    pub privileged: bool,
    pub multi_step: bool,
}
