// Install module: download the files of a resolved plugin into the plugins folder

use crate::cache::CachedPlugin;
use crate::error::{Error, Result};
use crate::platform::Compatibility;
use crate::plugin::Plugin;
use crate::repository::RemoteVersion;
use anyhow::Context as _;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Install the newest version of a matched plugin that runs on `platform`.
///
/// Returns the paths written.
pub async fn install_latest(
    plugin: &CachedPlugin,
    platform: &Compatibility,
    folder: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    let remote = plugin.remote(cancel).await?;
    let version = remote
        .latest_compatible(platform, cancel)
        .await
        .map_err(|source| Error::Repository {
            repository: plugin.repository().name().to_string(),
            source,
        })?;

    install_version(version.as_ref(), folder, cancel)
        .await
        .map_err(|source| Error::Install {
            plugin: plugin.local_identifier().to_string(),
            source,
        })
}

/// Download and verify every required file of `version`.
///
/// A file is only written once its digest checks out.
pub async fn install_version(
    version: &dyn RemoteVersion,
    folder: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(folder)
        .with_context(|| format!("Failed to create {}", folder.display()))?;

    let mut installed = Vec::new();
    for file in version.files() {
        if file.optional() {
            debug!("Skipping optional file {}", file.name());
            continue;
        }

        let file_name = Path::new(file.name())
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", file.name()))?;

        let data = file.download(cancel).await?;
        file.verify()
            .with_context(|| format!("Integrity check failed for {}", file.name()))?;

        let path = folder.join(file_name);
        fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        installed.push(path);
    }

    info!(
        "Installed {} {} ({} files)",
        version.project().name(),
        version.name(),
        installed.len()
    );
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{record, repositories};
    use crate::plugin::PluginMetadata;
    use crate::repository::{RemoteFile, RemotePlugin};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct MemoryFile {
        name: String,
        data: Vec<u8>,
        optional: bool,
        intact: bool,
    }

    #[async_trait]
    impl RemoteFile for MemoryFile {
        fn name(&self) -> &str {
            &self.name
        }

        fn optional(&self) -> bool {
            self.optional
        }

        async fn download(&self, _cancel: &CancellationToken) -> anyhow::Result<Vec<u8>> {
            Ok(self.data.clone())
        }

        fn verify(&self) -> anyhow::Result<()> {
            if self.intact {
                Ok(())
            } else {
                anyhow::bail!("Hash mismatch")
            }
        }
    }

    struct Release {
        name: String,
        platforms: Vec<String>,
        files: Vec<Arc<dyn RemoteFile>>,
        project: Mutex<Option<Arc<dyn RemotePlugin>>>,
    }

    impl RemoteVersion for Release {
        fn name(&self) -> &str {
            &self.name
        }

        fn identifier(&self) -> &str {
            &self.name
        }

        fn project(&self) -> Arc<dyn RemotePlugin> {
            self.project.lock().unwrap().clone().unwrap()
        }

        fn files(&self) -> Vec<Arc<dyn RemoteFile>> {
            self.files.clone()
        }

        fn compatible(&self, platform: &Compatibility) -> bool {
            platform.any(&self.platforms)
        }
    }

    struct Vault {
        releases: Vec<Arc<Release>>,
    }

    impl Plugin for Vault {
        fn name(&self) -> &str {
            "Vault"
        }

        fn identifier(&self) -> &str {
            "vault"
        }
    }

    impl PluginMetadata for Vault {
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
    impl RemotePlugin for Vault {
        fn repository(&self) -> &str {
            "offline"
        }

        fn compatible(&self, platform: &Compatibility) -> bool {
            self.releases.iter().any(|r| r.compatible(platform))
        }

        async fn versions(
            &self,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<Vec<Arc<dyn RemoteVersion>>> {
            Ok(self
                .releases
                .iter()
                .map(|r| r.clone() as Arc<dyn RemoteVersion>)
                .collect())
        }
    }

    fn file(name: &str, optional: bool, intact: bool) -> Arc<dyn RemoteFile> {
        Arc::new(MemoryFile {
            name: name.to_string(),
            data: name.as_bytes().to_vec(),
            optional,
            intact,
        })
    }

    fn release(name: &str, platforms: &[&str], files: Vec<Arc<dyn RemoteFile>>) -> Arc<Release> {
        Arc::new(Release {
            name: name.to_string(),
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
            files,
            project: Mutex::new(None),
        })
    }

    /// Newest release first: 2.0 only runs on velocity
    fn matched(intact: bool) -> CachedPlugin {
        let releases = vec![
            release("2.0", &["velocity"], vec![file("Vault-2.0.jar", false, true)]),
            release(
                "1.7",
                &["spigot"],
                vec![
                    file("Vault-1.7.jar", false, intact),
                    file("Vault-1.7-sources.jar", true, true),
                ],
            ),
        ];
        let project: Arc<dyn RemotePlugin> = Arc::new(Vault {
            releases: releases.clone(),
        });
        for r in &releases {
            *r.project.lock().unwrap() = Some(project.clone());
        }

        CachedPlugin::with_remote(record("Vault", "vault"), repositories()[0].clone(), project)
    }

    fn paper() -> Compatibility {
        Compatibility::new("paper", vec!["spigot".to_string()])
    }

    #[tokio::test]
    async fn test_installs_latest_compatible_required_files() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("plugins");

        let installed = install_latest(&matched(true), &paper(), &folder, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(installed, vec![folder.join("Vault-1.7.jar")]);
        assert_eq!(fs::read(&installed[0]).unwrap(), b"Vault-1.7.jar");
        assert!(!folder.join("Vault-1.7-sources.jar").exists());
        assert!(!folder.join("Vault-2.0.jar").exists());
    }

    #[tokio::test]
    async fn test_failed_verification_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("plugins");

        let err = install_latest(&matched(false), &paper(), &folder, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Install { ref plugin, .. } if plugin == "Vault"));
        assert!(!folder.join("Vault-1.7.jar").exists());
    }

    #[tokio::test]
    async fn test_no_compatible_version_is_repository_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = install_latest(
            &matched(true),
            &Compatibility::only("bungeecord"),
            dir.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Repository { .. }));
    }
}
