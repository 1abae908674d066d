// Context module: one server directory with its platform, repositories and cache

use crate::app::App;
use crate::cache::{CachedPlugin, PluginDatabase, open_database};
use crate::config::{Config, ContextConfig};
use crate::constants::CONFIG_FILE;
use crate::error::{Error, Result};
use crate::install;
use crate::platform::{Compatibility, Platform};
use crate::plugin::LocalPlugin;
use crate::repository::NamedRepository;
use crate::resolve::Resolver;
use crate::similarity::Similarity;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// An opened server directory
pub struct Context {
    name: String,
    root: PathBuf,
    config: Config,
    platform: Arc<dyn Platform>,
    compatibility: Compatibility,
    repositories: Vec<Arc<NamedRepository>>,
    database: Arc<dyn PluginDatabase>,
    resolver: Arc<Resolver>,
    cancel: CancellationToken,
}

impl Context {
    /// Open a context: merge its local `bucketrc.yml` onto the app config,
    /// then build its repositories, pick its platform and initialize its
    /// cache. The three steps run concurrently unless multithreading is off.
    pub async fn open(app: &Arc<App>, entry: ContextConfig) -> Result<Arc<Context>> {
        let root = entry.root()?;
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "context {}: {} is not a directory",
                entry.name,
                root.display()
            )));
        }

        let mut config = match Config::load(&root.join(CONFIG_FILE)) {
            Ok(local) => local.unwrap_or_default(),
            Err(e) => {
                warn!("Found config file while opening context but failed to parse it: {}", e);
                Config::default()
            }
        };
        config.collapse(app.config());

        let cancel = app.cancel().child_token();
        let database = open_database(config.sumdb())?;

        // the global and the local file are the same one when bucket runs
        // from inside the server directory
        let mut seen = HashSet::new();
        let repository_configs: Vec<_> = config
            .repositories
            .iter()
            .filter(|rc| seen.insert(rc.display_name().to_string()))
            .collect();

        let load_repositories = async {
            repository_configs
                .iter()
                .map(|rc| {
                    app.repositories()
                        .build(rc, cancel.clone())
                        .map(Arc::new)
                })
                .collect::<Result<Vec<_>>>()
        };

        // detectors open every server jar, so they run on the blocking pool
        let load_platform = {
            let app = app.clone();
            let root = root.clone();
            let configured = config.platform().map(str::to_string);
            let context = entry.name.clone();

            async move {
                let task = format!("detect [{}]", context);
                tokio::task::spawn_blocking(move || match configured {
                    Some(name) => app.platforms().build(&name, &root),
                    None => app.platforms().detect(&root).ok_or_else(|| {
                        Error::Config(format!(
                            "context {}: no known platform detected in {}",
                            context,
                            root.display()
                        ))
                    }),
                })
                .await
                .map_err(|e| Error::Task {
                    task,
                    source: e.into(),
                })?
            }
        };

        let initialize_database = database.initialize(&root);

        let opened = if config.multithread() {
            tokio::try_join!(load_repositories, load_platform, initialize_database)
        } else {
            async {
                let repositories = load_repositories.await?;
                let platform = load_platform.await?;
                initialize_database.await?;
                Ok::<_, Error>((repositories, platform, ()))
            }
            .await
        };

        let (repositories, platform, ()) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                if let Err(close) = database.close().await {
                    debug!("Closing cache of {} after failed open: {}", entry.name, close);
                }
                return Err(e);
            }
        };

        let compatibility = app.platforms().compatibility(platform.name());
        let resolver = Resolver::new(
            repositories.clone(),
            compatibility.clone(),
            database.clone(),
            cancel.clone(),
        )
        .with_similarity(Similarity::new(config.case_weight()))
        .with_threshold(config.threshold());

        info!(
            "Opened context {} ({}, {} repositories, {} cache)",
            entry.name,
            platform.name(),
            repositories.len(),
            database.kind()
        );

        Ok(Arc::new(Context {
            name: entry.name,
            root,
            config,
            platform,
            compatibility,
            repositories,
            database,
            resolver: Arc::new(resolver),
            cancel,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local configuration collapsed onto the global one
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Platform names this context's plugins may target
    pub fn compatibility(&self) -> &Compatibility {
        &self.compatibility
    }

    pub fn repositories(&self) -> &[Arc<NamedRepository>] {
        &self.repositories
    }

    pub fn database(&self) -> &Arc<dyn PluginDatabase> {
        &self.database
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn multithread(&self) -> bool {
        self.config.multithread()
    }

    /// Load the plugin cache from durable storage
    pub async fn load_cache(&self) -> Result<()> {
        self.database.load(&self.repositories).await
    }

    pub async fn resolve_plugin(&self, plugin: &dyn LocalPlugin) -> Result<Arc<CachedPlugin>> {
        self.resolver.resolve(plugin).await
    }

    /// Resolve several plugins; results keep input order
    pub async fn resolve_plugins(
        &self,
        plugins: &[Arc<dyn LocalPlugin>],
    ) -> Vec<Result<Arc<CachedPlugin>>> {
        self.resolver.resolve_all(plugins, self.multithread()).await
    }

    /// Install the latest compatible version of a matched plugin.
    /// Library entry point for frontends that install; the bundled commands only resolve.
    pub async fn install_latest(&self, plugin: &CachedPlugin) -> Result<Vec<PathBuf>> {
        install::install_latest(
            plugin,
            &self.compatibility,
            &self.platform.plugins_folder(),
            &self.cancel,
        )
        .await
    }

    /// Flush the cache and release its handles
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        let saved = self.database.save_all().await;
        self.database.close().await?;
        debug!("Closed context {}", self.name);
        saved
    }
}
