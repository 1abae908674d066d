// Cache module: accepted matches and their durable storage

pub mod sqlite;
pub mod sumfile;

use crate::bimap::SymmetricBiMap;
use crate::constants::{SUMDB_FILE, SUMDB_SQLITE};
use crate::error::{Error, Result};
use crate::plugin::{LocalPlugin, Plugin, PluginMetadata};
use crate::repository::{NamedRepository, RemotePlugin, find_repository};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

pub use sqlite::SqliteDatabase;
pub use sumfile::SumfileDatabase;

/// Serializable part of an accepted match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginRecord {
    /// Configured name of the repository the match came from
    pub repository: String,
    /// Archive file name of the local plugin
    pub file: String,
    pub local_identifier: String,
    pub remote_identifier: String,
    pub name: String,
    #[serde(serialize_with = "join_authors", deserialize_with = "split_authors")]
    pub authors: Vec<String>,
    pub description: String,
    pub website: String,
    pub confidence: f64,
    /// Repository specific snapshot of the remote plugin
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PluginRecord {
    pub fn from_match(
        local: &dyn LocalPlugin,
        remote: &dyn RemotePlugin,
        repository: &NamedRepository,
        confidence: f64,
    ) -> Self {
        Self {
            repository: repository.name().to_string(),
            file: local.file_name(),
            local_identifier: local.identifier().to_string(),
            remote_identifier: remote.identifier().to_string(),
            name: remote.name().to_string(),
            authors: remote.authors().to_vec(),
            description: remote.description().to_string(),
            website: remote.website().to_string(),
            confidence,
            metadata: remote.snapshot(),
        }
    }

    pub fn joined_authors(&self) -> String {
        self.authors.join(",")
    }

    pub fn parse_authors(joined: &str) -> Vec<String> {
        joined
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

fn join_authors<S: Serializer>(authors: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&authors.join(","))
}

fn split_authors<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    let joined = String::deserialize(deserializer)?;
    Ok(PluginRecord::parse_authors(&joined))
}

/// An accepted pairing between a local plugin and a remote plugin.
///
/// Display fields come from the record; the remote plugin itself is
/// restored or fetched on first use.
pub struct CachedPlugin {
    record: PluginRecord,
    repository: Arc<NamedRepository>,
    remote: OnceCell<Arc<dyn RemotePlugin>>,
}

impl CachedPlugin {
    pub fn new(record: PluginRecord, repository: Arc<NamedRepository>) -> Self {
        Self {
            record,
            repository,
            remote: OnceCell::new(),
        }
    }

    /// A match whose remote plugin is already at hand
    pub fn with_remote(
        record: PluginRecord,
        repository: Arc<NamedRepository>,
        remote: Arc<dyn RemotePlugin>,
    ) -> Self {
        Self {
            record,
            repository,
            remote: OnceCell::from(remote),
        }
    }

    pub fn record(&self) -> &PluginRecord {
        &self.record
    }

    pub fn repository(&self) -> &Arc<NamedRepository> {
        &self.repository
    }

    pub fn local_identifier(&self) -> &str {
        &self.record.local_identifier
    }

    pub fn remote_identifier(&self) -> &str {
        &self.record.remote_identifier
    }

    pub fn file(&self) -> &str {
        &self.record.file
    }

    pub fn confidence(&self) -> f64 {
        self.record.confidence
    }

    /// The remote plugin if it was already restored or fetched
    pub fn loaded_remote(&self) -> Option<Arc<dyn RemotePlugin>> {
        self.remote.get().cloned()
    }

    /// The remote plugin, rebuilt from the cached snapshot when the
    /// repository can, fetched by identifier otherwise.
    pub async fn remote(&self, cancel: &CancellationToken) -> Result<Arc<dyn RemotePlugin>> {
        let remote = self
            .remote
            .get_or_try_init(|| async {
                let identifier = self.remote_identifier();
                if let Some(remote) = self.repository.restore(identifier, &self.record.metadata) {
                    debug!("Restored {} from cached snapshot", identifier);
                    return Ok(remote);
                }

                debug!("Fetching {} from {}", identifier, self.repository.name());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::Cancelled),
                    remote = self.repository.get(identifier, cancel) => {
                        remote.map_err(|source| Error::Repository {
                            repository: self.repository.name().to_string(),
                            source,
                        })
                    }
                }
            })
            .await?;

        Ok(remote.clone())
    }
}

impl Plugin for CachedPlugin {
    fn name(&self) -> &str {
        &self.record.name
    }

    fn identifier(&self) -> &str {
        &self.record.remote_identifier
    }

    fn metadata(&self) -> Option<&dyn PluginMetadata> {
        Some(self)
    }
}

impl PluginMetadata for CachedPlugin {
    fn authors(&self) -> &[String] {
        &self.record.authors
    }

    fn description(&self) -> &str {
        &self.record.description
    }

    fn website(&self) -> &str {
        &self.record.website
    }
}

type PluginMap = SymmetricBiMap<String, Arc<CachedPlugin>>;

fn plugin_map() -> PluginMap {
    SymmetricBiMap::new(|plugin: &Arc<CachedPlugin>| {
        (
            plugin.local_identifier().to_string(),
            plugin.remote_identifier().to_string(),
        )
    })
}

/// In-memory index of accepted matches, keyed by local and remote identifier.
///
/// Closing the index makes every later access fail with `CacheClosed`.
pub struct PluginIndex {
    plugins: RwLock<Option<PluginMap>>,
}

impl Default for PluginIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginIndex {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Some(plugin_map())),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&PluginMap) -> T) -> Result<T> {
        let guard = self
            .plugins
            .read()
            .map_err(|_| Error::persistence("plugin index lock poisoned"))?;
        guard.as_ref().map(f).ok_or(Error::CacheClosed)
    }

    fn write<T>(&self, f: impl FnOnce(&mut PluginMap) -> T) -> Result<T> {
        let mut guard = self
            .plugins
            .write()
            .map_err(|_| Error::persistence("plugin index lock poisoned"))?;
        guard.as_mut().map(f).ok_or(Error::CacheClosed)
    }

    /// Look a match up by local or remote identifier
    pub fn get(&self, key: &str) -> Result<Option<Arc<CachedPlugin>>> {
        self.read(|map| map.get_any(&key.to_string()).cloned())
    }

    pub fn put(&self, plugin: Arc<CachedPlugin>) -> Result<()> {
        self.write(|map| map.put(plugin))
    }

    pub fn delete(&self, key: &str) -> Result<Option<Arc<CachedPlugin>>> {
        self.write(|map| map.delete(&key.to_string()))
    }

    /// All matches, ordered by local identifier
    pub fn values(&self) -> Result<Vec<Arc<CachedPlugin>>> {
        let mut values = self.read(|map| map.values().cloned().collect::<Vec<_>>())?;
        values.sort_by(|a, b| a.local_identifier().cmp(b.local_identifier()));
        Ok(values)
    }

    pub fn len(&self) -> Result<usize> {
        self.read(|map| map.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.read(|map| map.is_empty())
    }

    pub fn reset(&self) -> Result<()> {
        self.write(|map| map.clear())
    }

    pub fn close(&self) {
        if let Ok(mut guard) = self.plugins.write() {
            *guard = None;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.plugins.read().map(|g| g.is_none()).unwrap_or(true)
    }
}

/// Pair a stored record with its configured repository; records naming a
/// repository that is no longer configured are dropped.
pub fn attach_repository(
    record: PluginRecord,
    repositories: &[Arc<NamedRepository>],
) -> Option<Arc<CachedPlugin>> {
    match find_repository(repositories, &record.repository) {
        Some(repository) => Some(Arc::new(CachedPlugin::new(record, repository.clone()))),
        None => {
            warn!(
                "Repository {} not found for plugin record {}, skipping",
                record.repository, record.local_identifier
            );
            None
        }
    }
}

/// Durable storage for accepted matches
#[async_trait]
pub trait PluginDatabase: Send + Sync {
    /// Backing name as used in configuration
    fn kind(&self) -> &'static str;

    /// Prepare storage under the context root; idempotent
    async fn initialize(&self, root: &Path) -> Result<()>;

    /// Populate the index from durable storage
    async fn load(&self, repositories: &[Arc<NamedRepository>]) -> Result<()>;

    /// Upsert one match in the index and durably
    async fn save_plugin(&self, plugin: Arc<CachedPlugin>) -> Result<()>;

    /// Write the whole index to durable storage at once
    async fn save_all(&self) -> Result<()>;

    /// Size of the durable storage in bytes
    async fn size(&self) -> Result<u64>;

    /// Discard durable storage and empty the index
    async fn clean(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn plugins(&self) -> &PluginIndex;
}

/// Create an uninitialized database for a configured backing name
pub fn open_database(kind: &str) -> Result<Arc<dyn PluginDatabase>> {
    match kind {
        SUMDB_SQLITE => Ok(Arc::new(SqliteDatabase::new())),
        SUMDB_FILE => Ok(Arc::new(SumfileDatabase::new())),
        other => Err(Error::Config(format!(
            "unknown sumdb \"{}\", expected \"{}\" or \"{}\"",
            other, SUMDB_SQLITE, SUMDB_FILE
        ))),
    }
}
