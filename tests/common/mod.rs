#![allow(dead_code)]

use async_trait::async_trait;
use bucket::App;
use bucket::config::Config;
use bucket::platform::Compatibility;
use bucket::plugin::{LocalPlugin, Plugin, PluginMetadata};
use bucket::repository::{RemotePlugin, RemoteVersion, Repository, Resolution, SearchPage};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

pub struct Project {
    name: String,
    identifier: String,
    platforms: Vec<String>,
}

impl Project {
    fn new(name: &str, platforms: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            identifier: name.to_lowercase(),
            platforms,
        }
    }
}

impl Plugin for Project {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl PluginMetadata for Project {
    fn authors(&self) -> &[String] {
        &[]
    }

    fn description(&self) -> &str {
        ""
    }

    fn website(&self) -> &str {
        ""
    }
}

#[async_trait]
impl RemotePlugin for Project {
    fn repository(&self) -> &str {
        "catalog"
    }

    fn compatible(&self, platform: &Compatibility) -> bool {
        platform.any(&self.platforms)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name, "platforms": self.platforms })
    }

    async fn versions(
        &self,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Arc<dyn RemoteVersion>>> {
        Ok(Vec::new())
    }
}

/// Calls seen by every catalog built from one registration
#[derive(Clone, Default)]
pub struct Calls {
    pub resolve: Arc<AtomicUsize>,
    pub get: Arc<AtomicUsize>,
}

impl Calls {
    pub fn resolves(&self) -> usize {
        self.resolve.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }
}

/// In-memory repository. Every project runs on the platforms listed in the
/// `platforms` option (default `spigot`); `resolve` proposes all of them.
pub struct Catalog {
    projects: Vec<Arc<Project>>,
    calls: Calls,
}

#[async_trait]
impl Repository for Catalog {
    fn provider(&self) -> &str {
        "catalog"
    }

    async fn search(
        &self,
        query: &str,
        max: usize,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<SearchPage> {
        let matching: Vec<Arc<dyn RemotePlugin>> = self
            .projects
            .iter()
            .filter(|p| p.identifier.contains(&query.to_lowercase()))
            .map(|p| p.clone() as Arc<dyn RemotePlugin>)
            .collect();

        Ok(SearchPage {
            total: matching.len(),
            candidates: matching.into_iter().take(max).collect(),
        })
    }

    async fn get(
        &self,
        identifier: &str,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Arc<dyn RemotePlugin>> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.projects
            .iter()
            .find(|p| p.identifier == identifier)
            .map(|p| p.clone() as Arc<dyn RemotePlugin>)
            .ok_or_else(|| anyhow::anyhow!("Resource not found: {}", identifier))
    }

    async fn resolve(
        &self,
        _plugin: &dyn LocalPlugin,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Resolution> {
        self.calls.resolve.fetch_add(1, Ordering::SeqCst);
        Ok(Resolution {
            best_guess: None,
            candidates: self
                .projects
                .iter()
                .map(|p| p.clone() as Arc<dyn RemotePlugin>)
                .collect(),
        })
    }

    fn restore(
        &self,
        _identifier: &str,
        snapshot: &serde_json::Value,
    ) -> Option<Arc<dyn RemotePlugin>> {
        let name = snapshot.get("name")?.as_str()?;
        let platforms = snapshot
            .get("platforms")?
            .as_array()?
            .iter()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect();
        Some(Arc::new(Project::new(name, platforms)))
    }
}

/// An app with the built-in platforms and the `catalog` provider
pub fn app_with_catalog(config: Config) -> (App, Calls) {
    let calls = Calls::default();
    let mut app = App::with_builtin_platforms(config);

    let seen = calls.clone();
    app.repositories_mut().register("catalog", move |options, _cancel| {
        let platforms: Vec<String> = options
            .get("platforms")
            .map(String::as_str)
            .unwrap_or("spigot")
            .split(',')
            .map(str::to_string)
            .collect();
        let projects = options
            .get("projects")
            .map(String::as_str)
            .unwrap_or_default()
            .split(',')
            .filter(|p| !p.is_empty())
            .map(|p| Arc::new(Project::new(p, platforms.clone())))
            .collect();

        Ok(Arc::new(Catalog {
            projects,
            calls: seen.clone(),
        }) as Arc<dyn Repository>)
    });

    (app, calls)
}

/// Write a context-local `bucketrc.yml`
pub fn write_config(root: &Path, yaml: &str) {
    fs::write(root.join("bucketrc.yml"), yaml).unwrap();
}

/// Create empty plugin jars in `<root>/plugins`
pub fn install_plugins(root: &Path, names: &[&str]) {
    let plugins = root.join("plugins");
    fs::create_dir_all(&plugins).unwrap();
    for name in names {
        fs::write(plugins.join(format!("{}.jar", name)), b"").unwrap();
    }
}

/// Create a server jar containing the given entries
pub fn server_jar(path: &Path, entries: &[&str]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for entry in entries {
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);
        zip.start_file(*entry, options).unwrap();
        zip.write_all(b"class").unwrap();
    }
    zip.finish().unwrap();
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}
