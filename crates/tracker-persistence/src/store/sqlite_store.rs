use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracker_core::{AppConfig, TrackerError, TrackerResult};

const SCHEMA: &str = include_str!("../schema.sql");

/// Tunables for the store, usually taken from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub max_hierarchy_depth: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl StoreOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.effective_max_connections(),
            busy_timeout: Duration::from_millis(config.effective_busy_timeout_ms()),
            max_hierarchy_depth: config.effective_max_hierarchy_depth(),
        }
    }
}

/// SQLite-backed tracker store. Every mutation runs as one transaction on
/// this pool; nothing is cached between transactions.
pub struct SqliteStore {
    path: PathBuf,
    options: StoreOptions,
    pool: tokio::sync::OnceCell<Pool<Sqlite>>,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_options(path, StoreOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: StoreOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            pool: tokio::sync::OnceCell::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_options(
            config.effective_database_path(),
            StoreOptions::from_config(config),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub(crate) async fn pool(&self) -> TrackerResult<&Pool<Sqlite>> {
        self.pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::from_str(&format!(
                    "sqlite://{}?mode=rwc",
                    self.path.display()
                ))
                .map_err(db_err)?
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(self.options.busy_timeout);

                let pool = SqlitePoolOptions::new()
                    .max_connections(self.options.max_connections)
                    .connect_with(options)
                    .await
                    .map_err(db_err)?;

                sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(db_err)?;

                tracing::info!("Opened tracker database at {}", self.path.display());
                Ok(pool)
            })
            .await
    }

    /// Open a write transaction. Dropping it without `commit` rolls back.
    pub(crate) async fn begin(&self) -> TrackerResult<Transaction<'static, Sqlite>> {
        self.pool().await?.begin().await.map_err(db_err)
    }

    pub(crate) async fn acquire(&self) -> TrackerResult<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool().await?.acquire().await.map_err(db_err)
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

/// Translate storage failures into the tracker taxonomy. Uniqueness
/// violations surface as `Conflict`, foreign-key and check violations as
/// `InvalidState`.
pub(crate) fn db_err(e: sqlx::Error) -> TrackerError {
    match e {
        sqlx::Error::RowNotFound => TrackerError::NotFound("row not found".to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            TrackerError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            TrackerError::InvalidState(format!("reference violation: {}", db.message()))
        }
        sqlx::Error::Database(ref db) if db.is_check_violation() => {
            TrackerError::InvalidState(format!("constraint violation: {}", db.message()))
        }
        other => TrackerError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_pool_creates_database_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tracker.db");
        let store = SqliteStore::new(&db_path);

        assert!(!db_path.exists());
        store.pool().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tracker.db");

        let first = SqliteStore::new(&db_path);
        first.pool().await.unwrap();
        first.close().await;

        let second = SqliteStore::new(&db_path);
        let pool = second.pool().await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["backlogs", "board_members", "boards", "sprints", "tickets"]
        );
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("tracker.db"));
        let pool = store.pool().await.unwrap();

        let insert = "INSERT INTO boards (id, name, prefix, color, created_at, updated_at)
                      VALUES (?, 'B', 'DUP', '#000000', '', '')";
        sqlx::query(insert).bind("a").execute(pool).await.unwrap();
        let err = sqlx::query(insert)
            .bind("b")
            .execute(pool)
            .await
            .map_err(db_err)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Conflict(_)));
    }
}
