use crate::error::CliError;
use engine_runtime::queue::config::QueueConfig;
use model::schema::{FieldDef, RecordSchema};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = ".intake";
const CONFIG_FILE: &str = "config.json";

/// Settings read from `~/.intake/config.json` or `--config`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the state and records databases live.
    pub data_dir: Option<PathBuf>,
    pub queue: QueueConfig,
    /// Importable fields; empty means every column is free text.
    pub fields: Vec<FieldDef>,
}

impl AppConfig {
    /// Reads `path`, or the default location if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match app_dir() {
                Some(dir) if dir.join(CONFIG_FILE).exists() => dir.join(CONFIG_FILE),
                _ => return Ok(AppConfig::default()),
            },
        };

        debug!(path = %path.display(), "Loading configuration");
        Self::parse(&std::fs::read_to_string(&path)?)
    }

    pub fn parse(source: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn data_dir(&self) -> Result<PathBuf, CliError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => app_dir()
                .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into())),
        }
    }

    pub fn schema(&self) -> RecordSchema {
        RecordSchema::new(self.fields.clone())
    }
}

fn app_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR))
}
