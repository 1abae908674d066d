// Flat-file backing for the plugin cache

use super::{CachedPlugin, PluginDatabase, PluginIndex, PluginRecord, attach_repository};
use crate::constants::{SUMDB_FILE, SUMFILE_FILE, SUMFILE_HEADER};
use crate::error::{Error, Result};
use crate::repository::NamedRepository;
use async_trait::async_trait;
use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Plugin cache stored as `bucket.sum`: a header line, a blank line and a
/// pretty-printed JSON list of records.
///
/// The whole file is rewritten on every save while holding the file lock.
pub struct SumfileDatabase {
    name: String,
    file: Mutex<Option<PathBuf>>,
    plugins: PluginIndex,
}

impl Default for SumfileDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl SumfileDatabase {
    pub fn new() -> Self {
        Self::named(SUMFILE_FILE)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: Mutex::new(None),
            plugins: PluginIndex::new(),
        }
    }

    fn error(&self, err: impl std::fmt::Display) -> Error {
        Error::Persistence(format!("sumfile: {} ({})", err, self.name))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<PathBuf>>> {
        self.file.lock().map_err(|_| self.error("file lock poisoned"))
    }

    fn render(records: &[PluginRecord]) -> Result<String> {
        let body = serde_json::to_string_pretty(records)?;
        Ok(format!("{}\n\n{}\n", SUMFILE_HEADER, body))
    }

    fn parse(&self, data: &str) -> Result<Vec<PluginRecord>> {
        let body = data.strip_prefix(SUMFILE_HEADER).unwrap_or(data);
        serde_json::from_str(body).map_err(|e| self.error(e))
    }

    /// Rewrite the file from the current index. The caller holds the lock.
    fn write_index(&self, path: &Path) -> Result<usize> {
        let records: Vec<PluginRecord> = self
            .plugins
            .values()?
            .iter()
            .map(|p| p.record().clone())
            .collect();

        fs::write(path, Self::render(&records)?).map_err(|e| self.error(e))?;
        Ok(records.len())
    }
}

#[async_trait]
impl PluginDatabase for SumfileDatabase {
    fn kind(&self) -> &'static str {
        SUMDB_FILE
    }

    async fn initialize(&self, root: &Path) -> Result<()> {
        let mut file = self.lock()?;
        let path = root.join(&self.name);

        if !path.exists() {
            debug!("Creating {}", path.display());
            fs::write(&path, Self::render(&[])?).map_err(|e| self.error(e))?;
        }

        *file = Some(path);
        Ok(())
    }

    async fn load(&self, repositories: &[Arc<NamedRepository>]) -> Result<()> {
        let file = self.lock()?;
        let path = file.as_ref().ok_or(Error::CacheClosed)?;

        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist, nothing to load", path.display());
                return Ok(());
            }
            Err(e) => return Err(self.error(e)),
        };

        let records = self.parse(&data)?;
        let total = records.len();
        let mut loaded = 0;
        for record in records {
            if let Some(plugin) = attach_repository(record, repositories) {
                self.plugins.put(plugin)?;
                loaded += 1;
            }
        }

        info!("Loaded {} of {} cached plugins from {}", loaded, total, self.name);
        Ok(())
    }

    async fn save_plugin(&self, plugin: Arc<CachedPlugin>) -> Result<()> {
        let file = self.lock()?;
        let path = file.as_ref().ok_or(Error::CacheClosed)?;

        self.plugins.put(plugin)?;
        self.write_index(path)?;
        Ok(())
    }

    async fn save_all(&self) -> Result<()> {
        let file = self.lock()?;
        let path = file.as_ref().ok_or(Error::CacheClosed)?;

        let count = self.write_index(path)?;
        debug!("Saved {} plugins to {}", count, self.name);
        Ok(())
    }

    async fn size(&self) -> Result<u64> {
        let file = self.lock()?;
        let path = file.as_ref().ok_or(Error::CacheClosed)?;

        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(self.error(e)),
        }
    }

    async fn clean(&self) -> Result<()> {
        let file = self.lock()?;
        let path = file.as_ref().ok_or(Error::CacheClosed)?;

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.error(e)),
        }

        self.plugins.reset()
    }

    async fn close(&self) -> Result<()> {
        let mut file = self.lock()?;
        *file = None;
        self.plugins.close();
        Ok(())
    }

    fn plugins(&self) -> &PluginIndex {
        &self.plugins
    }
}
