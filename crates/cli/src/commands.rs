use clap::Subcommand;
use model::session::DuplicateMode;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Import rows from a CSV file whose first line names the columns
    Import {
        #[arg(long, help = "CSV file to import")]
        file: PathBuf,

        #[arg(long, default_value = "add", help = "Duplicate handling: add, update or skip")]
        mode: DuplicateMode,

        #[arg(long, default_value = "id", help = "Field checked for existing records")]
        match_field: String,

        #[arg(
            long,
            help = "Let empty cells clear stored values when a queued row updates a record"
        )]
        blank_overwrite: bool,

        #[arg(long, help = "Queue the rows and process them with the background worker")]
        background: bool,

        #[arg(
            long,
            help = "Queue the rows and exit; a later `work` or `healthcheck` processes them"
        )]
        detach: bool,

        #[arg(long, default_value_t = ',', help = "Field delimiter")]
        delimiter: char,
    },
    /// Run one healthcheck tick, resuming or aborting queued work
    Healthcheck,
    /// Process queued rows, ticking healthchecks until the queue is done
    Work,
    Status {
        #[arg(
            long,
            help = "If set, prints the queue status as JSON instead of a table"
        )]
        json: bool,
    },
    /// Clear the progress report and stop any in-process worker
    Dismiss,
}
