// Built-in platform types for Minecraft servers and proxies

use crate::constants::PLUGINS_DIR;
use crate::platform::{Platform, PlatformRegistry, PlatformType, PluginListing, detect_jar_path};
use crate::plugin::{FileNameLoader, LocalPlugin, PluginLoader};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directories scanned for server jars, relative to the server root
const JAR_DIRS: &[&str] = &["", "cache"];

pub const SPIGOT: &str = "spigot";
pub const PAPER: &str = "paper";
pub const PURPUR: &str = "purpur";
pub const BUNGEECORD: &str = "bungeecord";

/// A platform whose plugins are jar archives in a single folder
pub struct JarPlatform {
    platform: Arc<PlatformType>,
    root: PathBuf,
    folder: String,
    loader: Arc<dyn PluginLoader>,
}

impl JarPlatform {
    pub fn new(platform: Arc<PlatformType>, root: &Path) -> Self {
        Self {
            platform,
            root: root.to_path_buf(),
            folder: PLUGINS_DIR.to_string(),
            loader: Arc::new(FileNameLoader),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn PluginLoader>) -> Self {
        self.loader = loader;
        self
    }
}

impl Platform for JarPlatform {
    fn platform_type(&self) -> &Arc<PlatformType> {
        &self.platform
    }

    fn plugins_folder(&self) -> PathBuf {
        self.root.join(&self.folder)
    }

    fn list_plugins(&self) -> anyhow::Result<PluginListing> {
        let folder = self.plugins_folder();
        let mut listing = PluginListing::default();

        if !folder.exists() {
            debug!("Plugins folder does not exist: {}", folder.display());
            return Ok(listing);
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&folder)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jar") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            match self.loader.load(&path) {
                Ok(plugin) => listing.plugins.push(plugin),
                Err(e) => listing.errors.push((path, e)),
            }
        }

        Ok(listing)
    }

    fn load_plugin(&self, file_name: &str) -> anyhow::Result<Arc<dyn LocalPlugin>> {
        let path = self.plugins_folder().join(file_name);
        if !path.is_file() {
            anyhow::bail!("Plugin file not found: {}", path.display());
        }

        self.loader.load(&path)
    }
}

fn jar_platform(platform: Arc<PlatformType>, root: &Path) -> Arc<dyn Platform> {
    Arc::new(JarPlatform::new(platform, root))
}

fn marker_detector(marker: &'static str) -> impl Fn(&Path) -> anyhow::Result<bool> + Send + Sync {
    move |root: &Path| detect_jar_path(root, JAR_DIRS, |path| path.contains(marker))
}

pub fn spigot() -> PlatformType {
    PlatformType::new(SPIGOT)
        .with_detector(marker_detector("org/spigotmc"))
        .with_builder(jar_platform)
}

pub fn paper() -> PlatformType {
    PlatformType::new(PAPER)
        .compatible_with(&[SPIGOT])
        .with_detector(marker_detector("paperclip"))
        .with_builder(jar_platform)
}

/// Purpur ships the same paperclip launcher as paper, so it is never
/// detected and has to be configured explicitly.
pub fn purpur() -> PlatformType {
    PlatformType::new(PURPUR)
        .compatible_with(&[PAPER])
        .with_builder(jar_platform)
}

pub fn bungeecord() -> PlatformType {
    PlatformType::new(BUNGEECORD)
        .with_detector(marker_detector("net/md_5/bungee"))
        .with_builder(jar_platform)
}

pub fn register_builtin(registry: &mut PlatformRegistry) {
    registry.register(spigot(), 5);
    registry.register(paper(), 10);
    registry.register(purpur(), 20);
    registry.register(bungeecord(), 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Plugin;

    fn registry() -> PlatformRegistry {
        let mut registry = PlatformRegistry::new();
        register_builtin(&mut registry);
        registry
    }

    #[test]
    fn test_builtin_compatibility() {
        let registry = registry();

        let purpur = registry.compatibility(PURPUR);
        assert!(purpur.contains(PAPER));
        assert!(purpur.contains(SPIGOT));

        let bungee = registry.compatibility(BUNGEECORD);
        assert!(!bungee.contains(SPIGOT));
    }

    #[test]
    fn test_list_plugins_only_jars() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join(PLUGINS_DIR);
        fs::create_dir(&plugins).unwrap();
        fs::write(plugins.join("Vault.jar"), b"jar").unwrap();
        fs::write(plugins.join("EssentialsX.jar"), b"jar").unwrap();
        fs::write(plugins.join("config.yml"), b"yml").unwrap();
        fs::create_dir(plugins.join("Vault")).unwrap();

        let platform = registry().build(SPIGOT, dir.path()).unwrap();
        let listing = platform.list_plugins().unwrap();

        let names: Vec<&str> = listing.plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["EssentialsX", "Vault"]);
        assert!(listing.errors.is_empty());
    }

    #[test]
    fn test_list_plugins_missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let platform = registry().build(PAPER, dir.path()).unwrap();
        assert!(platform.list_plugins().unwrap().plugins.is_empty());
    }

    #[test]
    fn test_load_plugin_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let plugins = dir.path().join(PLUGINS_DIR);
        fs::create_dir(&plugins).unwrap();
        fs::write(plugins.join("LuckPerms.jar"), b"jar").unwrap();

        let platform = registry().build(PAPER, dir.path()).unwrap();
        assert_eq!(platform.load_plugin("LuckPerms.jar").unwrap().name(), "LuckPerms");
        assert!(platform.load_plugin("Missing.jar").is_err());
    }
}
