// Resolution engine: match local plugins to remote plugins

use crate::cache::{CachedPlugin, PluginDatabase, PluginRecord};
use crate::constants::SIMILARITY_THRESHOLD;
use crate::error::{Error, MultiError, Result};
use crate::platform::Compatibility;
use crate::plugin::{LocalPlugin, Plugin};
use crate::repository::{NamedRepository, RemotePlugin};
use crate::similarity::Similarity;
use crate::task::parallelize;
use log::{debug, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one context needs to resolve its plugins
pub struct Resolver {
    repositories: Vec<Arc<NamedRepository>>,
    compatibility: Compatibility,
    database: Arc<dyn PluginDatabase>,
    similarity: Similarity,
    threshold: f64,
    cancel: CancellationToken,
}

impl Resolver {
    pub fn new(
        repositories: Vec<Arc<NamedRepository>>,
        compatibility: Compatibility,
        database: Arc<dyn PluginDatabase>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repositories,
            compatibility,
            database,
            similarity: Similarity::default(),
            threshold: SIMILARITY_THRESHOLD,
            cancel,
        }
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    /// Minimum score a candidate needs to be accepted
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the remote plugin a local plugin corresponds to.
    ///
    /// Cached matches are returned without touching the network. Otherwise
    /// repositories are tried in order and the first accepted candidate is
    /// written through the cache. When every repository rejects the plugin
    /// the error lists each repository's reason.
    pub async fn resolve(&self, plugin: &dyn LocalPlugin) -> Result<Arc<CachedPlugin>> {
        if let Some(cached) = self.database.plugins().get(plugin.identifier())? {
            debug!(
                "Cache hit for {}: {} ({:.2})",
                plugin.identifier(),
                cached.remote_identifier(),
                cached.confidence()
            );
            return Ok(cached);
        }

        if self.repositories.is_empty() {
            return Err(Error::Config("no repositories configured".to_string()));
        }

        let mut errors = MultiError::new();

        for repository in &self.repositories {
            match self.resolve_in(repository, plugin).await {
                Ok((remote, confidence)) => {
                    info!(
                        "Resolved {} to {} on {} (confidence {:.2})",
                        plugin.name(),
                        remote.identifier(),
                        repository.name(),
                        confidence
                    );

                    let record = PluginRecord::from_match(plugin, remote.as_ref(), repository, confidence);
                    let cached = Arc::new(CachedPlugin::with_remote(record, repository.clone(), remote));
                    self.database.save_plugin(cached.clone()).await?;

                    return Ok(cached);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    debug!("{} rejected by {}: {}", plugin.name(), repository.name(), e);
                    errors.push(e);
                }
            }
        }

        Err(Error::Multiple(errors))
    }

    /// Query one repository and pick its best compatible candidate
    async fn resolve_in(
        &self,
        repository: &NamedRepository,
        plugin: &dyn LocalPlugin,
    ) -> Result<(Arc<dyn RemotePlugin>, f64)> {
        let resolution = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            resolution = repository.resolve(plugin, &self.cancel) => resolution,
        };

        let resolution = resolution.map_err(|source| Error::Repository {
            repository: repository.name().to_string(),
            source,
        })?;

        let mut candidates = resolution.candidates;
        if candidates.is_empty() {
            candidates.extend(resolution.best_guess);
        }

        if candidates.is_empty() {
            return Err(Error::NoCandidates {
                plugin: plugin.name().to_string(),
                repository: repository.name().to_string(),
            });
        }

        let mut best: Option<(&Arc<dyn RemotePlugin>, f64)> = None;
        for candidate in &candidates {
            if !candidate.compatible(&self.compatibility) {
                continue;
            }

            let score = self.similarity.comparison_index(plugin, candidate.as_ref());
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((candidate, score));
            }

            if score >= 1.0 {
                break;
            }
        }

        let Some((remote, score)) = best else {
            return Err(Error::Incompatible {
                count: candidates.len(),
                plugin: plugin.name().to_string(),
                platform: self.compatibility.platform().to_string(),
            });
        };

        if score < self.threshold {
            return Err(Error::BelowThreshold {
                count: candidates.len(),
                plugin: plugin.name().to_string(),
                closest: score,
            });
        }

        Ok((remote.clone(), score))
    }

    /// Resolve many plugins, concurrently when `multithread` is set.
    ///
    /// Results come back in input order; one failing plugin does not stop
    /// the others.
    pub async fn resolve_all(
        self: &Arc<Self>,
        plugins: &[Arc<dyn LocalPlugin>],
        multithread: bool,
    ) -> Vec<Result<Arc<CachedPlugin>>> {
        let jobs = plugins
            .iter()
            .map(|plugin| {
                let resolver = self.clone();
                let plugin = plugin.clone();
                async move { resolver.resolve(plugin.as_ref()).await }
            })
            .collect();

        parallelize(multithread, jobs).await
    }
}
