//! Well-known state store keys.

/// Settings of the current import run.
pub const SESSION: &str = "import_session";

/// Prefix shared by every persisted batch; the batch id follows it.
pub const BATCH_PREFIX: &str = "import_batch_";

/// Fingerprint of the batch seen by the last healthcheck.
pub const CHECK_TOKEN: &str = "import_check";

/// Held while a worker is processing batches.
pub const PROCESS_LOCK: &str = "import_process_lock";

/// Present while a periodic healthcheck is wanted.
pub const HEALTHCHECK_CRON: &str = "import_healthcheck_cron";

/// Live counters of the current run.
pub const TALLY: &str = "import_tally";

/// Report text frozen when a run completes.
pub const FROZEN_REPORT: &str = "import_report";

pub fn batch_key(batch_id: &str) -> String {
    format!("{BATCH_PREFIX}{batch_id}")
}

pub fn batch_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(BATCH_PREFIX)
}
