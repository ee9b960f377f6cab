use std::path::PathBuf;
use tracker_core::{AppConfig, TrackerError, TrackerResult};
use tracker_persistence::{SqliteStore, StoreOptions};

/// Everything a handler needs: the store and the acting user.
pub struct CliContext {
    pub store: SqliteStore,
    pub user: String,
}

impl CliContext {
    /// `--database` / `TRACKER_DATABASE` wins over the config file, which
    /// wins over `tracker.db` in the working directory.
    pub fn open(database: Option<PathBuf>, user: Option<String>) -> TrackerResult<Self> {
        let config = AppConfig::load();
        let path = database.unwrap_or_else(|| config.effective_database_path());

        let user = user
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                TrackerError::Validation(
                    "No acting user: pass --user or set TRACKER_USER".to_string(),
                )
            })?;

        tracing::debug!("Using database {} as {}", path.display(), user);
        Ok(Self {
            store: SqliteStore::with_options(path, StoreOptions::from_config(&config)),
            user,
        })
    }

    pub fn actor(&self) -> &str {
        &self.user
    }
}
