// Plugin module for local plugin capabilities

use crate::repository::hash::{self, HashAlgorithm};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity shared by local and remote plugins
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn identifier(&self) -> &str;

    /// Metadata capability, when the plugin exposes authors and friends
    fn metadata(&self) -> Option<&dyn PluginMetadata> {
        None
    }
}

pub trait PluginMetadata: Send + Sync {
    fn authors(&self) -> &[String];
    fn description(&self) -> &str;
    fn website(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub required: bool,
}

/// A plugin installed in a server's plugins folder
pub trait LocalPlugin: Plugin {
    fn version(&self) -> Option<&str>;

    /// Archive this plugin was loaded from
    fn path(&self) -> &Path;

    /// Dependency capability, when the loader knows about dependencies
    fn dependencies(&self) -> Option<&[Dependency]> {
        None
    }

    fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Content hash of the backing archive (`sha256:<hex>`)
    fn digest(&self) -> anyhow::Result<String> {
        hash::hash_file(self.path(), HashAlgorithm::Sha256)
    }
}

/// Plain metadata values, shared by loaders and cached matches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub authors: Vec<String>,
    pub description: String,
    pub website: String,
}

impl PluginMetadata for Metadata {
    fn authors(&self) -> &[String] {
        &self.authors
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn website(&self) -> &str {
        &self.website
    }
}

/// A local plugin described by whatever its loader could extract
#[derive(Debug, Clone)]
pub struct FilePlugin {
    pub name: String,
    pub identifier: String,
    pub version: Option<String>,
    pub path: PathBuf,
    pub meta: Option<Metadata>,
    pub dependencies: Option<Vec<Dependency>>,
}

impl FilePlugin {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            identifier: name.clone(),
            name,
            version: None,
            path: path.into(),
            meta: None,
            dependencies: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_metadata(mut self, meta: Metadata) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

impl Plugin for FilePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn metadata(&self) -> Option<&dyn PluginMetadata> {
        self.meta.as_ref().map(|m| m as &dyn PluginMetadata)
    }
}

impl LocalPlugin for FilePlugin {
    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn dependencies(&self) -> Option<&[Dependency]> {
        self.dependencies.as_deref()
    }
}

/// Turns one archive into a local plugin
pub trait PluginLoader: Send + Sync {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn LocalPlugin>>;
}

/// Loader that only looks at the file name: `EssentialsX.jar` becomes
/// a plugin named and identified as `EssentialsX`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileNameLoader;

impl PluginLoader for FileNameLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn LocalPlugin>> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Invalid plugin filename: {}", path.display()))?;

        Ok(Arc::new(FilePlugin::new(stem, path)))
    }
}
