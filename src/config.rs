// Config module for bucketrc.yml loading, merging and context selection

use crate::constants::{
    CASE_MISMATCH_WEIGHT, CONFIG_FILE, CONFIG_HOME_DIR, SIMILARITY_THRESHOLD, SUMDB_SQLITE,
};
use crate::error::{Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Contents of a `bucketrc.yml` file.
///
/// Every field is optional so a context-local file can override just the
/// parts it cares about; see [`Config::collapse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub active_contexts: Vec<String>,
    pub contexts: Vec<ContextConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multithread: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sumdb: Option<String>,
    pub repositories: Vec<RepositoryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_weight: Option<f64>,
}

/// A named server directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,
    pub url: String,
}

/// A repository instance: which provider builds it and with what options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub provider: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl RepositoryConfig {
    /// Configured name, or the provider name when none was given
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.provider)
    }
}

impl ContextConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Filesystem root of this context.
    ///
    /// Accepts plain paths and `file://` URLs; any other scheme is rejected.
    pub fn root(&self) -> Result<PathBuf> {
        match self.url.split_once("://") {
            None => Ok(PathBuf::from(&self.url)),
            Some(("file", path)) => {
                let decoded = urlencoding::decode(path).map_err(|e| {
                    Error::Config(format!("context {}: bad url {}: {}", self.name, self.url, e))
                })?;
                Ok(PathBuf::from(decoded.into_owned()))
            }
            Some((scheme, _)) => Err(Error::Config(format!(
                "context {}: unsupported url scheme \"{}\"",
                self.name, scheme
            ))),
        }
    }
}

impl Config {
    pub fn from_yaml(data: &str) -> Result<Self> {
        serde_yaml::from_str(data).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read a config file; a missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };

        debug!("Loaded config from {}", path.display());
        Self::from_yaml(&data)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Merge the file at `base` with `~/.bucket/bucketrc.yml`.
    ///
    /// Unreadable files are logged and skipped.
    pub fn load_system(base: &Path) -> Self {
        let mut paths = vec![base.to_path_buf()];
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home).join(CONFIG_HOME_DIR).join(CONFIG_FILE));
        }

        let mut config = Config::default();
        for path in paths {
            match Self::load(&path) {
                Ok(Some(parsed)) => config.collapse(&parsed),
                Ok(None) => {}
                Err(e) => warn!("Found config file but failed to parse it: {}", e),
            }
        }
        config
    }

    /// Merge `other` into `self`: list fields append, scalars are only
    /// taken from `other` when unset here.
    pub fn collapse(&mut self, other: &Config) {
        self.active_contexts
            .extend(other.active_contexts.iter().cloned());
        self.contexts.extend(other.contexts.iter().cloned());
        self.repositories.extend(other.repositories.iter().cloned());

        if self.platform.is_none() {
            self.platform = other.platform.clone();
        }
        if self.multithread.is_none() {
            self.multithread = other.multithread;
        }
        if self.sumdb.is_none() {
            self.sumdb = other.sumdb.clone();
        }
        if self.threshold.is_none() {
            self.threshold = other.threshold;
        }
        if self.case_weight.is_none() {
            self.case_weight = other.case_weight;
        }
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn multithread(&self) -> bool {
        self.multithread.unwrap_or(true)
    }

    pub fn sumdb(&self) -> &str {
        self.sumdb.as_deref().unwrap_or(SUMDB_SQLITE)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(SIMILARITY_THRESHOLD)
    }

    pub fn case_weight(&self) -> f64 {
        self.case_weight.unwrap_or(CASE_MISMATCH_WEIGHT)
    }

    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn context(&self, name: &str) -> Option<&ContextConfig> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Apply a command-line context selection and return the active contexts.
    ///
    /// `"."` keeps the configured `active-contexts` when there are any.
    /// Otherwise the selection is split on commas: known context names are
    /// activated, anything else becomes an ad-hoc context `<cliN>` whose URL
    /// is the given value.
    pub fn select_contexts(&mut self, selection: &str) -> Result<Vec<ContextConfig>> {
        if selection != "." || self.active_contexts.is_empty() {
            let mut active = Vec::new();
            let mut adhoc = 0;

            for value in selection.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                if self.context(value).is_some() {
                    active.push(value.to_string());
                } else {
                    let name = format!("<cli{}>", adhoc);
                    adhoc += 1;
                    self.contexts.push(ContextConfig::new(&name, value));
                    active.push(name);
                }
            }

            self.active_contexts = active;
        }

        self.active_contexts
            .iter()
            .map(|name| {
                self.context(name)
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("unknown context: {}", name)))
            })
            .collect()
    }
}
