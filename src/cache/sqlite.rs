// SQLite backing for the plugin cache

use super::{CachedPlugin, PluginDatabase, PluginIndex, PluginRecord, attach_repository};
use crate::constants::{DATABASE_FILE, SUMDB_SQLITE};
use crate::error::{Error, Result};
use crate::repository::NamedRepository;
use async_trait::async_trait;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Row = (
    String,
    String,
    String,
    String,
    String,
    f64,
    String,
    String,
    String,
    Option<String>,
);

#[derive(Clone)]
struct Connection {
    pool: SqlitePool,
    path: PathBuf,
}

/// Plugin cache stored in `bucket.db` at the context root.
///
/// Every upsert runs in a transaction so the remote identifier stays unique
/// across rows. The write lock is held from the transaction until the index
/// is updated, so the index and the table always agree on the winner.
pub struct SqliteDatabase {
    connection: RwLock<Option<Connection>>,
    writes: Mutex<()>,
    plugins: PluginIndex,
}

impl Default for SqliteDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteDatabase {
    pub fn new() -> Self {
        Self {
            connection: RwLock::new(None),
            writes: Mutex::new(()),
            plugins: PluginIndex::new(),
        }
    }

    fn connection(&self) -> Result<Connection> {
        let guard = self
            .connection
            .read()
            .map_err(|_| Error::persistence("sqlite connection lock poisoned"))?;
        guard.clone().ok_or(Error::CacheClosed)
    }

    fn set_connection(&self, connection: Option<Connection>) -> Result<()> {
        let mut guard = self
            .connection
            .write()
            .map_err(|_| Error::persistence("sqlite connection lock poisoned"))?;
        *guard = connection;
        Ok(())
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plugins (
                identifier TEXT PRIMARY KEY,
                remote_identifier TEXT NOT NULL,
                filename TEXT NOT NULL,
                name TEXT NOT NULL,
                repository TEXT NOT NULL,
                confidence REAL NOT NULL,
                authors TEXT NOT NULL,
                description TEXT NOT NULL,
                website TEXT NOT NULL,
                metadata TEXT
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS plugins_remote_id ON plugins (remote_identifier)")
            .execute(&mut *tx)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS plugins_filename ON plugins (filename)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Replace the row of this local identifier and drop any other row
    /// claiming the same remote identifier.
    async fn upsert(tx: &mut Transaction<'_, Sqlite>, record: &PluginRecord) -> Result<()> {
        sqlx::query("DELETE FROM plugins WHERE remote_identifier = ? AND identifier != ?")
            .bind(&record.remote_identifier)
            .bind(&record.local_identifier)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO plugins
                (identifier, remote_identifier, filename, name, repository,
                 confidence, authors, description, website, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.local_identifier)
        .bind(&record.remote_identifier)
        .bind(&record.file)
        .bind(&record.name)
        .bind(&record.repository)
        .bind(record.confidence)
        .bind(record.joined_authors())
        .bind(&record.description)
        .bind(&record.website)
        .bind(serde_json::to_string(&record.metadata)?)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

fn into_record(row: Row) -> Result<PluginRecord> {
    let (
        local_identifier,
        remote_identifier,
        file,
        name,
        repository,
        confidence,
        authors,
        description,
        website,
        metadata,
    ) = row;

    let metadata = match metadata {
        Some(raw) => serde_json::from_str(&raw)?,
        None => serde_json::Value::Null,
    };

    Ok(PluginRecord {
        repository,
        file,
        local_identifier,
        remote_identifier,
        name,
        authors: PluginRecord::parse_authors(&authors),
        description,
        website,
        confidence,
        metadata,
    })
}

#[async_trait]
impl PluginDatabase for SqliteDatabase {
    fn kind(&self) -> &'static str {
        SUMDB_SQLITE
    }

    async fn initialize(&self, root: &Path) -> Result<()> {
        if self.connection().is_ok() {
            return Ok(());
        }

        let path = root.join(DATABASE_FILE);
        debug!("Initializing database {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        if let Err(e) = Self::create_tables(&pool).await {
            pool.close().await;
            return Err(e);
        }

        self.set_connection(Some(Connection { pool, path }))
    }

    async fn load(&self, repositories: &[Arc<NamedRepository>]) -> Result<()> {
        let connection = self.connection()?;

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT identifier, remote_identifier, filename, name, repository,
                   confidence, authors, description, website, metadata
            FROM plugins
            "#,
        )
        .fetch_all(&connection.pool)
        .await?;

        let total = rows.len();
        let mut loaded = 0;
        for row in rows {
            if let Some(plugin) = attach_repository(into_record(row)?, repositories) {
                self.plugins.put(plugin)?;
                loaded += 1;
            }
        }

        info!("Loaded {} of {} cached plugins from {}", loaded, total, DATABASE_FILE);
        Ok(())
    }

    async fn save_plugin(&self, plugin: Arc<CachedPlugin>) -> Result<()> {
        let _writing = self.writes.lock().await;
        let connection = self.connection()?;

        let mut tx = connection.pool.begin().await?;
        Self::upsert(&mut tx, plugin.record()).await?;
        tx.commit().await?;

        self.plugins.put(plugin)
    }

    async fn save_all(&self) -> Result<()> {
        let _writing = self.writes.lock().await;
        let connection = self.connection()?;
        let plugins = self.plugins.values()?;

        let mut tx = connection.pool.begin().await?;
        for plugin in &plugins {
            Self::upsert(&mut tx, plugin.record()).await?;
        }
        tx.commit().await?;

        debug!("Saved {} plugins to {}", plugins.len(), DATABASE_FILE);
        Ok(())
    }

    async fn size(&self) -> Result<u64> {
        let connection = self.connection()?;
        Ok(fs::metadata(&connection.path)?.len())
    }

    async fn clean(&self) -> Result<()> {
        let _writing = self.writes.lock().await;
        let connection = self.connection()?;

        sqlx::query("DELETE FROM plugins")
            .execute(&connection.pool)
            .await?;

        self.plugins.reset()
    }

    async fn close(&self) -> Result<()> {
        let connection = self.connection.write().ok().and_then(|mut g| g.take());
        if let Some(connection) = connection {
            connection.pool.close().await;
        }

        self.plugins.close();
        Ok(())
    }

    fn plugins(&self) -> &PluginIndex {
        &self.plugins
    }
}
