use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to a single incoming row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Insert,
    Update,
    Skip,
}

impl RecordAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordAction::Insert => "insert",
            RecordAction::Update => "update",
            RecordAction::Skip => "skip",
        }
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
