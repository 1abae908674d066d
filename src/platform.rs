// Platform module: server platform types, detection and compatibility

use crate::error::{Error, Result};
use crate::plugin::LocalPlugin;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Looks at a server root and tells whether it runs this platform
pub type DetectFn = Arc<dyn Fn(&Path) -> anyhow::Result<bool> + Send + Sync>;

/// Binds a platform type to a server root
pub type BuildFn = Arc<dyn Fn(Arc<PlatformType>, &Path) -> Arc<dyn Platform> + Send + Sync>;

/// Installs the platform itself into a server root
pub type InstallFn = Arc<dyn Fn(&Path) -> anyhow::Result<()> + Send + Sync>;

/// Static description of a server platform
#[derive(Clone)]
pub struct PlatformType {
    pub name: String,
    /// Platforms whose plugins also run on this one
    pub compatible: Vec<String>,
    pub install: Option<InstallFn>,
    pub detect: Option<DetectFn>,
    pub build: Option<BuildFn>,
}

impl PlatformType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compatible: Vec::new(),
            install: None,
            detect: None,
            build: None,
        }
    }

    pub fn compatible_with(mut self, platforms: &[&str]) -> Self {
        self.compatible = platforms.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_detector<F>(mut self, detect: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.detect = Some(Arc::new(detect));
        self
    }

    pub fn with_builder<F>(mut self, build: F) -> Self
    where
        F: Fn(Arc<PlatformType>, &Path) -> Arc<dyn Platform> + Send + Sync + 'static,
    {
        self.build = Some(Arc::new(build));
        self
    }

    pub fn with_installer<F>(mut self, install: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.install = Some(Arc::new(install));
        self
    }

    pub fn install(&self, root: &Path) -> anyhow::Result<()> {
        match &self.install {
            Some(install) => install(root),
            None => anyhow::bail!("platform \"{}\" has no installer", self.name),
        }
    }
}

impl fmt::Debug for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformType")
            .field("name", &self.name)
            .field("compatible", &self.compatible)
            .field("detect", &self.detect.is_some())
            .field("build", &self.build.is_some())
            .finish()
    }
}

/// Local plugins found in a plugins folder, plus the files that failed to load
#[derive(Default)]
pub struct PluginListing {
    pub plugins: Vec<Arc<dyn LocalPlugin>>,
    pub errors: Vec<(PathBuf, anyhow::Error)>,
}

/// A platform bound to one server root
pub trait Platform: Send + Sync {
    fn platform_type(&self) -> &Arc<PlatformType>;

    fn plugins_folder(&self) -> PathBuf;

    /// Load every plugin archive; a file that fails to load does not fail the listing
    fn list_plugins(&self) -> anyhow::Result<PluginListing>;

    fn load_plugin(&self, file_name: &str) -> anyhow::Result<Arc<dyn LocalPlugin>>;

    fn name(&self) -> &str {
        &self.platform_type().name
    }
}

/// The set of platform names a context can run plugins for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    platform: String,
    names: BTreeSet<String>,
}

impl Compatibility {
    pub fn new(platform: impl Into<String>, names: impl IntoIterator<Item = String>) -> Self {
        let platform = platform.into();
        let mut names: BTreeSet<String> = names.into_iter().collect();
        names.insert(platform.clone());
        Self { platform, names }
    }

    /// Closure of a platform with no compatibility edges
    pub fn only(platform: impl Into<String>) -> Self {
        Self::new(platform, [])
    }

    /// Name of the platform the closure was computed for
    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// True when any of `supported` is in the closure
    pub fn any<S: AsRef<str>>(&self, supported: &[S]) -> bool {
        supported.iter().any(|s| self.contains(s.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }
}

struct PrioritizedPlatform {
    platform: Arc<PlatformType>,
    priority: i32,
}

/// Registry of known platform types
#[derive(Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, PrioritizedPlatform>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform: PlatformType, priority: i32) {
        self.platforms.insert(
            platform.name.clone(),
            PrioritizedPlatform {
                platform: Arc::new(platform),
                priority,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PlatformType>> {
        self.platforms.get(name).map(|p| &p.platform)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.platforms.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Platform types by descending priority, ties broken by name
    fn by_priority(&self) -> Vec<&PrioritizedPlatform> {
        let mut platforms: Vec<&PrioritizedPlatform> = self.platforms.values().collect();
        platforms.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.platform.name.cmp(&b.platform.name))
        });
        platforms
    }

    /// Bind a registered platform type to a server root
    pub fn build(&self, name: &str, root: &Path) -> Result<Arc<dyn Platform>> {
        let platform = self
            .get(name)
            .ok_or_else(|| Error::UnknownPlatform(name.to_string()))?;

        instantiate(platform, root)
    }

    /// Best-effort detection of the platform a server root runs.
    ///
    /// Detectors run from the highest priority down; a failing detector is
    /// logged and skipped.
    pub fn detect(&self, root: &Path) -> Option<Arc<dyn Platform>> {
        for entry in self.by_priority() {
            let Some(detect) = &entry.platform.detect else {
                continue;
            };

            match detect(root) {
                Ok(true) => match instantiate(&entry.platform, root) {
                    Ok(platform) => {
                        info!("Detected platform {} in {}", entry.platform.name, root.display());
                        return Some(platform);
                    }
                    Err(e) => warn!("Platform {} detected but not usable: {}", entry.platform.name, e),
                },
                Ok(false) => {
                    debug!("Platform {} not detected in {}", entry.platform.name, root.display())
                }
                Err(e) => warn!("Error during {} platform check: {:#}", entry.platform.name, e),
            }
        }

        None
    }

    /// Every platform name reachable from `name` through compatibility
    /// edges, `name` included. Unknown names along the way are kept as
    /// leaves.
    pub fn compatibility(&self, name: &str) -> Compatibility {
        let mut visited = BTreeSet::new();
        let mut stack = vec![name.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(entry) = self.platforms.get(&current) {
                for next in &entry.platform.compatible {
                    if !visited.contains(next) {
                        stack.push(next.clone());
                    }
                }
            }
        }

        Compatibility::new(name, visited)
    }
}

fn instantiate(platform: &Arc<PlatformType>, root: &Path) -> Result<Arc<dyn Platform>> {
    let build = platform.build.as_ref().ok_or_else(|| {
        Error::Config(format!("platform \"{}\" cannot be instantiated", platform.name))
    })?;

    Ok(build(platform.clone(), root))
}

/// Scan every `.jar` directly inside `dirs` (relative to `root`) and report
/// whether any contains an entry path accepted by `filter`.
///
/// Missing directories are skipped; archives that are not valid zips are
/// skipped with a debug log.
pub fn detect_jar_path<F>(root: &Path, dirs: &[&str], filter: F) -> anyhow::Result<bool>
where
    F: Fn(&str) -> bool,
{
    for dir in dirs {
        let dir = root.join(dir);
        if !dir.is_dir() {
            continue;
        }

        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("jar") {
                continue;
            }

            let file = fs::File::open(&path)?;
            let archive = match zip::ZipArchive::new(file) {
                Ok(archive) => archive,
                Err(e) => {
                    debug!("Failed to open JAR archive {:?}: {}", path, e);
                    continue;
                }
            };

            if archive.file_names().any(&filter) {
                debug!("Platform marker found in {:?}", path);
                return Ok(true);
            }
        }
    }

    Ok(false)
}
