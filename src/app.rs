// Application scope: registries, global configuration and the root cancellation token

use crate::config::Config;
use crate::error::Result;
use crate::platform::PlatformRegistry;
use crate::platforms;
use crate::repository::RepositoryRegistry;
use crate::workspace::Workspace;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything shared by the contexts of one invocation.
///
/// Registries live here instead of in process-wide statics so separate
/// `App`s (one per test, for instance) never see each other's platforms or
/// repository providers.
pub struct App {
    platforms: PlatformRegistry,
    repositories: RepositoryRegistry,
    config: Config,
    cancel: CancellationToken,
}

impl App {
    /// An app with empty registries
    pub fn new(config: Config) -> Self {
        Self {
            platforms: PlatformRegistry::new(),
            repositories: RepositoryRegistry::new(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// An app knowing the built-in server platforms
    pub fn with_builtin_platforms(config: Config) -> Self {
        let mut app = Self::new(config);
        platforms::register_builtin(&mut app.platforms);
        app
    }

    pub fn platforms(&self) -> &PlatformRegistry {
        &self.platforms
    }

    pub fn platforms_mut(&mut self) -> &mut PlatformRegistry {
        &mut self.platforms
    }

    pub fn repositories(&self) -> &RepositoryRegistry {
        &self.repositories
    }

    pub fn repositories_mut(&mut self) -> &mut RepositoryRegistry {
        &mut self.repositories
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Cancelling this token cancels every context opened from this app
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Open the contexts picked by a command-line selection
    /// (see [`Config::select_contexts`]).
    pub async fn open_workspace(self: &Arc<Self>, selection: &str) -> Result<Workspace> {
        let mut config = self.config.clone();
        let contexts = config.select_contexts(selection)?;
        Workspace::open(self, contexts).await
    }
}
