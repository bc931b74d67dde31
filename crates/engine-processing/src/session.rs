use crate::error::ImportError;
use engine_core::state::{StateStore, get_json, keys, put_json};
use model::session::ImportSession;
use tracing::info;

/// Persists the settings of a new run.
pub async fn store_session(
    state: &dyn StateStore,
    session: &ImportSession,
) -> Result<(), ImportError> {
    put_json(state, keys::SESSION, session, None).await?;
    info!(
        mode = %session.mode(),
        match_field = session.match_field(),
        columns = session.column_names().len(),
        background = session.is_background(),
        "Import session started"
    );
    Ok(())
}

pub async fn load_session(state: &dyn StateStore) -> Result<ImportSession, ImportError> {
    get_json(state, keys::SESSION)
        .await?
        .ok_or(ImportError::MissingSession)
}
