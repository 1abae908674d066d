// Repository module: the contract every remote plugin catalog implements

use crate::config::RepositoryConfig;
use crate::error::{Error, Result};
use crate::platform::Compatibility;
use crate::plugin::{LocalPlugin, Plugin, PluginMetadata};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod hash;
pub mod http;

pub use http::HttpFile;

/// One page of search results
#[derive(Default)]
pub struct SearchPage {
    pub candidates: Vec<Arc<dyn RemotePlugin>>,
    /// Total number of matches the repository reported, across all pages
    pub total: usize,
}

/// Outcome of asking a repository which of its projects a local plugin is
#[derive(Default)]
pub struct Resolution {
    pub best_guess: Option<Arc<dyn RemotePlugin>>,
    pub candidates: Vec<Arc<dyn RemotePlugin>>,
}

/// Trait for remote plugin repositories (catalogs with search and lookup)
///
/// Every network call takes the context's cancellation token; the caller
/// also races each call against the token, so implementations that ignore
/// it still cannot hang a cancelled context.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Provider name (e.g., "modrinth", "spigotmc")
    fn provider(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        max: usize,
        cancel: &CancellationToken,
    ) -> anyhow::Result<SearchPage>;

    async fn get(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Arc<dyn RemotePlugin>>;

    /// Propose candidates for a local plugin
    async fn resolve(
        &self,
        plugin: &dyn LocalPlugin,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Resolution>;

    /// Rebuild a remote plugin from a cached snapshot without a network call.
    ///
    /// `None` means the snapshot is not enough and `get` must be used.
    fn restore(
        &self,
        _identifier: &str,
        _snapshot: &serde_json::Value,
    ) -> Option<Arc<dyn RemotePlugin>> {
        None
    }
}

/// A project hosted on a repository
#[async_trait]
pub trait RemotePlugin: Plugin + PluginMetadata {
    /// Provider name of the repository this project belongs to
    fn repository(&self) -> &str;

    /// Whether any platform in `platform` can run this project
    fn compatible(&self, platform: &Compatibility) -> bool;

    /// Repository specific fields worth caching next to a match
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// All versions, newest first
    async fn versions(&self, cancel: &CancellationToken)
    -> anyhow::Result<Vec<Arc<dyn RemoteVersion>>>;

    async fn latest_version(
        &self,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Arc<dyn RemoteVersion>> {
        self.versions(cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No versions found for plugin '{}'", self.name()))
    }

    async fn version(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Arc<dyn RemoteVersion>> {
        self.versions(cancel)
            .await?
            .into_iter()
            .find(|v| v.name() == name || v.identifier() == name)
            .ok_or_else(|| {
                anyhow::anyhow!("Version '{}' not found for plugin '{}'", name, self.name())
            })
    }

    async fn latest_compatible(
        &self,
        platform: &Compatibility,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Arc<dyn RemoteVersion>> {
        self.versions(cancel)
            .await?
            .into_iter()
            .find(|v| v.compatible(platform))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No version of '{}' is compatible with platform '{}'",
                    self.name(),
                    platform.platform()
                )
            })
    }
}

/// One release of a remote project
pub trait RemoteVersion: Send + Sync {
    fn name(&self) -> &str;

    fn identifier(&self) -> &str;

    /// The project this version belongs to
    fn project(&self) -> Arc<dyn RemotePlugin>;

    fn files(&self) -> Vec<Arc<dyn RemoteFile>>;

    /// A version may support fewer platforms than its project as a whole
    fn compatible(&self, platform: &Compatibility) -> bool;
}

/// A downloadable artifact of a version
#[async_trait]
pub trait RemoteFile: Send + Sync {
    fn name(&self) -> &str;

    fn optional(&self) -> bool {
        false
    }

    async fn download(&self, cancel: &CancellationToken) -> anyhow::Result<Vec<u8>>;

    /// Check the last download against the digest declared by the repository
    fn verify(&self) -> anyhow::Result<()>;
}

/// A repository instance as configured in a context
pub struct NamedRepository {
    name: String,
    provider: String,
    repository: Arc<dyn Repository>,
}

impl NamedRepository {
    pub fn new(name: impl Into<String>, repository: Arc<dyn Repository>) -> Self {
        Self {
            name: name.into(),
            provider: repository.provider().to_string(),
            repository,
        }
    }

    /// Configured name, or the provider name when none was configured
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }
}

impl Deref for NamedRepository {
    type Target = dyn Repository;

    fn deref(&self) -> &Self::Target {
        self.repository.as_ref()
    }
}

/// Look a repository up by configured name first, then by provider
pub fn find_repository<'a>(
    repositories: &'a [Arc<NamedRepository>],
    name: &str,
) -> Option<&'a Arc<NamedRepository>> {
    repositories
        .iter()
        .find(|r| r.name() == name)
        .or_else(|| repositories.iter().find(|r| r.provider() == name))
}

pub type RepositoryOptions = BTreeMap<String, String>;

/// Builds a repository client from its configured options
pub type RepositoryConstructor = Arc<
    dyn Fn(&RepositoryOptions, CancellationToken) -> anyhow::Result<Arc<dyn Repository>>
        + Send
        + Sync,
>;

/// Registry of repository providers, keyed by provider name
#[derive(Default, Clone)]
pub struct RepositoryRegistry {
    constructors: HashMap<String, RepositoryConstructor>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, provider: impl Into<String>, constructor: F)
    where
        F: Fn(&RepositoryOptions, CancellationToken) -> anyhow::Result<Arc<dyn Repository>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(provider.into(), Arc::new(constructor));
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.constructors.keys().map(|s| s.as_str()).collect();
        providers.sort_unstable();
        providers
    }

    /// Instantiate a configured repository
    pub fn build(
        &self,
        config: &RepositoryConfig,
        cancel: CancellationToken,
    ) -> Result<NamedRepository> {
        let constructor = self
            .constructors
            .get(&config.provider)
            .ok_or_else(|| Error::UnknownRepository(config.provider.clone()))?;

        let repository = constructor(&config.options, cancel).map_err(|source| {
            Error::Repository {
                repository: config.display_name().to_string(),
                source,
            }
        })?;

        Ok(NamedRepository::new(config.display_name(), repository))
    }
}
