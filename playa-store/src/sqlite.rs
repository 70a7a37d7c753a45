//! SQLite state store.

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use playa_client::{StateStore, StoreError};
use playa_types::{
    ContentPackage, DeviceId, EventId, InstalledPackage, SyncSession, SyncSnapshot, UnlockState,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// SQLite-backed state store.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open a store at `path`, creating the database file if needed.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        debug!(path = %path.display(), "Opened state store");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // One connection: each new in-memory connection is a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS unlock_state (
                event_id TEXT PRIMARY KEY,
                is_unlocked INTEGER NOT NULL,
                unlocked_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_session (
                device_id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                last_full_sync_at INTEGER,
                last_incremental_sync_at INTEGER,
                storage_used_bytes INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS installed_packages (
                device_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                package_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                package TEXT NOT NULL,
                PRIMARY KEY (device_id, position)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_installed_package ON installed_packages(device_id, package_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_unlock(&self, event_id: &EventId) -> Result<Option<UnlockState>, StorageError> {
        let row = sqlx::query_as::<_, UnlockRow>(
            "SELECT is_unlocked, unlocked_at FROM unlock_state WHERE event_id = ?1",
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UnlockState::try_from).transpose()
    }

    async fn save_unlock(
        &self,
        event_id: &EventId,
        state: &UnlockState,
    ) -> Result<UnlockState, StorageError> {
        let mut tx = self.pool.begin().await?;

        // An unlocked row is final; other writers only read it back
        let written = sqlx::query(
            r#"
            INSERT INTO unlock_state (event_id, is_unlocked, unlocked_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(event_id) DO UPDATE SET
                is_unlocked = excluded.is_unlocked,
                unlocked_at = excluded.unlocked_at
            WHERE unlock_state.is_unlocked = 0
            "#,
        )
        .bind(event_id.as_str())
        .bind(state.is_unlocked)
        .bind(state.unlocked_at.map(|t| t.timestamp_millis()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let row = sqlx::query_as::<_, UnlockRow>(
            "SELECT is_unlocked, unlocked_at FROM unlock_state WHERE event_id = ?1",
        )
        .bind(event_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let stored = UnlockState::try_from(row)?;
        debug!(
            event = %event_id.as_str(),
            unlocked = stored.is_unlocked,
            written = written > 0,
            "Saved unlock state"
        );
        Ok(stored)
    }

    async fn load_snapshot(&self, device_id: &DeviceId) -> Result<Option<SyncSnapshot>, StorageError> {
        let Some(row) = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT device_id, event_id, last_full_sync_at, last_incremental_sync_at,
                   storage_used_bytes, error_message
            FROM sync_session
            WHERE device_id = ?1
            "#,
        )
        .bind(device_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let packages = sqlx::query_as::<_, InstalledRow>(
            r#"
            SELECT content_hash, package
            FROM installed_packages
            WHERE device_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(device_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let installed = packages
            .into_iter()
            .map(InstalledPackage::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(SyncSnapshot {
            session: row.try_into()?,
            installed,
        }))
    }

    async fn save_snapshot(&self, snapshot: &SyncSnapshot) -> Result<(), StorageError> {
        let session = &snapshot.session;
        let device = session.device_id.as_str();

        // Session and installed set change together or not at all
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sync_session (
                device_id, event_id, last_full_sync_at, last_incremental_sync_at,
                storage_used_bytes, error_message
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(device_id) DO UPDATE SET
                event_id = excluded.event_id,
                last_full_sync_at = excluded.last_full_sync_at,
                last_incremental_sync_at = excluded.last_incremental_sync_at,
                storage_used_bytes = excluded.storage_used_bytes,
                error_message = excluded.error_message
            "#,
        )
        .bind(device)
        .bind(session.event_id.as_str())
        .bind(session.last_full_sync_at.map(|t| t.timestamp_millis()))
        .bind(session.last_incremental_sync_at.map(|t| t.timestamp_millis()))
        .bind(session.storage_used_bytes as i64)
        .bind(session.error_message.as_deref())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM installed_packages WHERE device_id = ?1")
            .bind(device)
            .execute(&mut *tx)
            .await?;

        for (position, installed) in snapshot.installed.iter().enumerate() {
            let package = serde_json::to_string(&installed.package)?;
            sqlx::query(
                r#"
                INSERT INTO installed_packages
                    (device_id, position, package_id, version, content_hash, package)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(device)
            .bind(position as i64)
            .bind(&installed.package.id)
            .bind(installed.package.version)
            .bind(&installed.content_hash)
            .bind(package)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            device = %device,
            installed = snapshot.installed.len(),
            used = session.storage_used_bytes,
            "Saved sync snapshot"
        );
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load_unlock_state(&self, event_id: &EventId) -> Result<Option<UnlockState>, StoreError> {
        Ok(self.load_unlock(event_id).await?)
    }

    async fn commit_unlock_state(
        &self,
        event_id: &EventId,
        state: &UnlockState,
    ) -> Result<UnlockState, StoreError> {
        Ok(self.save_unlock(event_id, state).await?)
    }

    async fn load_sync_snapshot(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<SyncSnapshot>, StoreError> {
        Ok(self.load_snapshot(device_id).await?)
    }

    async fn commit_sync_snapshot(&self, snapshot: &SyncSnapshot) -> Result<(), StoreError> {
        Ok(self.save_snapshot(snapshot).await?)
    }
}

fn from_millis(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StorageError> {
    ms.map(|ms| DateTime::from_timestamp_millis(ms).ok_or(StorageError::InvalidTimestamp(ms)))
        .transpose()
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct UnlockRow {
    is_unlocked: bool,
    unlocked_at: Option<i64>,
}

impl TryFrom<UnlockRow> for UnlockState {
    type Error = StorageError;

    fn try_from(row: UnlockRow) -> Result<Self, Self::Error> {
        Ok(UnlockState {
            is_unlocked: row.is_unlocked,
            unlocked_at: from_millis(row.unlocked_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    device_id: String,
    event_id: String,
    last_full_sync_at: Option<i64>,
    last_incremental_sync_at: Option<i64>,
    storage_used_bytes: i64,
    error_message: Option<String>,
}

impl TryFrom<SessionRow> for SyncSession {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let storage_used_bytes = u64::try_from(row.storage_used_bytes).map_err(|_| {
            StorageError::InvalidRow(format!("negative storage_used_bytes: {}", row.storage_used_bytes))
        })?;
        Ok(SyncSession {
            device_id: DeviceId::new(row.device_id),
            event_id: EventId::new(row.event_id),
            last_full_sync_at: from_millis(row.last_full_sync_at)?,
            last_incremental_sync_at: from_millis(row.last_incremental_sync_at)?,
            storage_used_bytes,
            error_message: row.error_message,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InstalledRow {
    content_hash: String,
    package: String,
}

impl TryFrom<InstalledRow> for InstalledPackage {
    type Error = StorageError;

    fn try_from(row: InstalledRow) -> Result<Self, Self::Error> {
        let package: ContentPackage = serde_json::from_str(&row.package)?;
        Ok(InstalledPackage {
            package,
            content_hash: row.content_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use playa_types::ContentType;
    use tempfile::TempDir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 28, hour, 0, 0).unwrap()
    }

    fn installed(id: &str, priority: i32, size: u64) -> InstalledPackage {
        InstalledPackage {
            package: ContentPackage::new(id, priority, size).with_content_type(ContentType::Map),
            content_hash: format!("{id:0>64}"),
        }
    }

    fn snapshot() -> SyncSnapshot {
        let mut snapshot = SyncSnapshot::empty(DeviceId::new("dev-1"), EventId::new("ab26"));
        snapshot.installed = vec![installed("a", 1, 400), installed("b", 2, 300)];
        snapshot.session.storage_used_bytes = 700;
        snapshot.session.last_full_sync_at = Some(at(9));
        snapshot
    }

    #[tokio::test]
    async fn unlock_state_missing_then_saved() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        let event = EventId::new("ab26");
        assert_eq!(store.load_unlock_state(&event).await.unwrap(), None);

        let state = UnlockState::unlocked(at(12));
        store.commit_unlock_state(&event, &state).await.unwrap();
        assert_eq!(store.load_unlock_state(&event).await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn unlocked_row_keeps_first_timestamp() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        let event = EventId::new("ab26");
        let first = UnlockState::unlocked(at(10));

        assert_eq!(store.commit_unlock_state(&event, &first).await.unwrap(), first);
        assert_eq!(
            store
                .commit_unlock_state(&event, &UnlockState::unlocked(at(11)))
                .await
                .unwrap(),
            first
        );
        assert_eq!(
            store
                .commit_unlock_state(&event, &UnlockState::default())
                .await
                .unwrap(),
            first
        );
        assert_eq!(store.load_unlock_state(&event).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn two_connections_share_first_unlock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.db");
        let first = SqliteStateStore::new(&path).await.unwrap();
        let second = SqliteStateStore::new(&path).await.unwrap();
        let event = EventId::new("ab26");

        first
            .commit_unlock_state(&event, &UnlockState::unlocked(at(10)))
            .await
            .unwrap();
        let stored = second
            .commit_unlock_state(&event, &UnlockState::unlocked(at(11)))
            .await
            .unwrap();

        assert_eq!(stored, UnlockState::unlocked(at(10)));
        assert_eq!(
            first.load_unlock_state(&event).await.unwrap(),
            Some(UnlockState::unlocked(at(10)))
        );
    }

    #[tokio::test]
    async fn unlock_state_is_per_event() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        store
            .commit_unlock_state(&EventId::new("ab26"), &UnlockState::unlocked(at(1)))
            .await
            .unwrap();
        assert_eq!(
            store.load_unlock_state(&EventId::new("ab27")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_order() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        let snapshot = snapshot();
        store.commit_sync_snapshot(&snapshot).await.unwrap();

        let loaded = store
            .load_sync_snapshot(&DeviceId::new("dev-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn snapshot_commit_replaces_installed_set() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        let mut snapshot = snapshot();
        store.commit_sync_snapshot(&snapshot).await.unwrap();

        snapshot.installed.remove(0);
        snapshot.session.storage_used_bytes = 300;
        snapshot.session.error_message = Some("1 package(s) failed: c".into());
        store.commit_sync_snapshot(&snapshot).await.unwrap();

        let loaded = store
            .load_sync_snapshot(&DeviceId::new("dev-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.installed.len(), 1);
        assert_eq!(loaded.installed[0].package.id, "b");
        assert_eq!(loaded.session.error_message.as_deref(), Some("1 package(s) failed: c"));
    }

    #[tokio::test]
    async fn unknown_device_has_no_snapshot() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        assert!(store
            .load_sync_snapshot(&DeviceId::new("nobody"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn corrupt_package_json_is_serialization_error() {
        let store = SqliteStateStore::in_memory().await.unwrap();
        store.commit_sync_snapshot(&snapshot()).await.unwrap();
        sqlx::query("UPDATE installed_packages SET package = '{' WHERE package_id = 'a'")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store
            .load_sync_snapshot(&DeviceId::new("dev-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = SqliteStateStore::new(&path).await.unwrap();
            store.commit_sync_snapshot(&snapshot()).await.unwrap();
            store
                .commit_unlock_state(&EventId::new("ab26"), &UnlockState::unlocked(at(3)))
                .await
                .unwrap();
            store.pool.close().await;
        }

        let store = SqliteStateStore::new(&path).await.unwrap();
        assert_eq!(
            store.load_sync_snapshot(&DeviceId::new("dev-1")).await.unwrap(),
            Some(snapshot())
        );
        assert_eq!(
            store
                .load_unlock_state(&EventId::new("ab26"))
                .await
                .unwrap()
                .and_then(|s| s.unlocked_at),
            Some(at(3))
        );
    }
}
