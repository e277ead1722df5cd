//! Session storage. Loads/creates the grammers session file so the MTProto
//! authorization key survives process restarts.

use std::path::Path;

use grammers_session::storages::SqliteSession;

use crate::domain::DomainError;

/// Opens a persistent session store at `path`, creating parent directories
/// and the file itself if they don't exist yet.
pub async fn open_file_session(path: impl AsRef<Path>) -> Result<SqliteSession, DomainError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Configuration(format!("create session directory: {e}")))?;
    }
    SqliteSession::open(path)
        .await
        .map_err(|e| DomainError::Configuration(format!("open session file: {e}")))
}
