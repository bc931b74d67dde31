use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Duplicate-handling policy for an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    /// Every row becomes a new record.
    #[default]
    Add,
    /// Rows matching an existing record update it.
    Update,
    /// Rows matching an existing record are dropped.
    Skip,
}

impl DuplicateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateMode::Add => "add",
            DuplicateMode::Update => "update",
            DuplicateMode::Skip => "skip",
        }
    }
}

impl FromStr for DuplicateMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" | "insert" => Ok(DuplicateMode::Add),
            "update" | "overwrite" => Ok(DuplicateMode::Update),
            "skip" => Ok(DuplicateMode::Skip),
            other => Err(ModelError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for DuplicateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of one import run. Written once when the run starts and read
/// by every row that follows, including rows handled by a background worker
/// in a later process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSession {
    column_names: Vec<String>,
    mode: DuplicateMode,
    match_field: String,
    blank_overwrite: bool,
    background: bool,
}

impl ImportSession {
    pub fn new(column_names: Vec<String>, mode: DuplicateMode, match_field: impl Into<String>) -> Self {
        ImportSession {
            column_names,
            mode,
            match_field: match_field.into(),
            blank_overwrite: false,
            background: false,
        }
    }

    /// Let blank cells clear stored values when a background import updates a record.
    pub fn with_blank_overwrite(mut self, enabled: bool) -> Self {
        self.blank_overwrite = enabled;
        self
    }

    /// Queue rows for the background worker instead of importing them inline.
    pub fn with_background(mut self, enabled: bool) -> Self {
        self.background = enabled;
        self
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn mode(&self) -> DuplicateMode {
        self.mode
    }

    pub fn match_field(&self) -> &str {
        &self.match_field
    }

    pub fn blank_overwrite(&self) -> bool {
        self.blank_overwrite
    }

    pub fn is_background(&self) -> bool {
        self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!("Update".parse::<DuplicateMode>().unwrap(), DuplicateMode::Update);
        assert_eq!("skip".parse::<DuplicateMode>().unwrap(), DuplicateMode::Skip);
        assert!("merge".parse::<DuplicateMode>().is_err());
    }

    #[test]
    fn session_round_trips_through_json() {
        let session = ImportSession::new(
            vec!["id".into(), "email".into()],
            DuplicateMode::Skip,
            "email",
        )
        .with_background(true);

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"mode\":\"skip\""));
        let back: ImportSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
        assert!(!back.blank_overwrite());
    }
}
