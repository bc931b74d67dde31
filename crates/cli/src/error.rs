use engine_runtime::error::QueueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse the configuration file: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("The input file has no header row")]
    MissingHeader,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Import queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
