mod common;

use bucket::config::Config;
use bucket::constants::{DATABASE_FILE, SUMFILE_FILE};
use bucket::platform::{Platform, PlatformType};
use bucket::platforms::JarPlatform;
use bucket::plugin::{FilePlugin, LocalPlugin, Metadata, Plugin, PluginLoader};
use bucket::{Error, tasks};
use common::{app_with_catalog, install_plugins, path_str, server_jar, write_config};
use std::path::Path;
use std::sync::{Arc, Mutex};

const CATALOG: &str = r#"
platform: paper
sumdb: file
repositories:
  - provider: catalog
    options:
      projects: WorldEdit,Vault,LuckPerms,Essentials
"#;

#[tokio::test]
async fn test_resolve_task_caches_matches() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), CATALOG);
    install_plugins(dir.path(), &["WorldEdit", "Vault", "LuckPerms", "zz"]);

    let (app, calls) = app_with_catalog(Config::default());
    let app = Arc::new(app);
    let workspace = app.open_workspace(path_str(dir.path())).await.unwrap();

    // "zz" matches nothing; that is reported but does not fail the task
    workspace.run_task(&tasks::resolve()).await.unwrap();
    assert_eq!(calls.resolves(), 4);

    let context = &workspace.contexts()[0];
    let index = context.database().plugins();
    assert_eq!(index.len().unwrap(), 3);
    let vault = index.get("vault").unwrap().unwrap();
    assert_eq!(vault.local_identifier(), "Vault");
    assert_eq!(vault.confidence(), 1.0);
    assert!(index.get("zz").unwrap().is_none());

    // cached plugins skip the repository on the next run
    workspace.run_task(&tasks::resolve()).await.unwrap();
    assert_eq!(calls.resolves(), 5);

    workspace.close().await.unwrap();
    let stored = std::fs::read_to_string(dir.path().join(SUMFILE_FILE)).unwrap();
    assert!(stored.contains("\"remote-identifier\": \"worldedit\""));
}

#[tokio::test]
async fn test_cache_survives_reopen_and_restores_remote() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &CATALOG.replace("sumdb: file", "sumdb: sqlite"));
    install_plugins(dir.path(), &["WorldEdit", "Vault"]);

    let (app, _) = app_with_catalog(Config::default());
    let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();
    workspace.run_task(&tasks::resolve()).await.unwrap();
    workspace.close().await.unwrap();
    assert!(dir.path().join(DATABASE_FILE).exists());

    let (app, calls) = app_with_catalog(Config::default());
    let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();
    workspace.run_task(&tasks::resolve()).await.unwrap();
    assert_eq!(calls.resolves(), 0);

    let context = &workspace.contexts()[0];
    let cached = context.database().plugins().get("WorldEdit").unwrap().unwrap();
    let remote = cached.remote(context.cancel()).await.unwrap();
    assert_eq!(remote.name(), "WorldEdit");
    assert_eq!(calls.gets(), 0);

    workspace.close().await.unwrap();
}

#[tokio::test]
async fn test_clean_task_empties_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), CATALOG);
    install_plugins(dir.path(), &["Vault"]);

    let (app, _) = app_with_catalog(Config::default());
    let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();
    workspace.run_task(&tasks::resolve()).await.unwrap();

    workspace.run_task(&tasks::clean(true)).await.unwrap();
    let context = &workspace.contexts()[0];
    assert!(context.database().plugins().is_empty().unwrap());
    assert!(!dir.path().join("plugins").exists());
    workspace.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_and_serial_resolution_agree() {
    let names: Vec<String> = (0..20).map(|i| format!("Plugin{:02}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let yaml = format!(
        "platform: spigot\nsumdb: file\nrepositories:\n  - provider: catalog\n    options:\n      projects: {}\n",
        names.join(",")
    );

    let mut snapshots = Vec::new();
    for multithread in [true, false] {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), &format!("multithread: {}\n{}", multithread, yaml));
        install_plugins(dir.path(), &name_refs);

        let (app, _) = app_with_catalog(Config::default());
        let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();
        let context = &workspace.contexts()[0];
        assert_eq!(context.multithread(), multithread);

        workspace.run_task(&tasks::resolve()).await.unwrap();
        let mut records: Vec<(String, String, String)> = context
            .database()
            .plugins()
            .values()
            .unwrap()
            .iter()
            .map(|p| {
                (
                    p.local_identifier().to_string(),
                    p.remote_identifier().to_string(),
                    format!("{:.4}", p.confidence()),
                )
            })
            .collect();
        records.sort();
        snapshots.push(records);
        workspace.close().await.unwrap();
    }

    assert_eq!(snapshots[0].len(), 20);
    assert_eq!(snapshots[0], snapshots[1]);
}

#[tokio::test]
async fn test_platform_detected_from_server_jar() {
    let dir = tempfile::tempdir().unwrap();
    server_jar(
        &dir.path().join("paper-1.21.jar"),
        &["io/papermc/paperclip/Paperclip.class"],
    );

    let (app, _) = app_with_catalog(Config::default());
    let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();

    let context = &workspace.contexts()[0];
    assert_eq!(context.platform().name(), "paper");
    assert!(context.compatibility().contains("spigot"));
    workspace.close().await.unwrap();
}

#[tokio::test]
async fn test_undetectable_server_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    server_jar(&dir.path().join("server.jar"), &["net/minecraft/Main.class"]);

    let (app, _) = app_with_catalog(Config::default());
    let result = Arc::new(app).open_workspace(path_str(dir.path())).await;
    assert!(matches!(result, Err(Error::Multiple(ref m)) if m.len() == 1));
}

/// Loader attaching authors, so author similarity takes part in scoring
struct AuthoredLoader;

impl PluginLoader for AuthoredLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Arc<dyn LocalPlugin>> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        Ok(Arc::new(FilePlugin::new(stem, path).with_metadata(Metadata {
            authors: vec!["md_5".into()],
            ..Default::default()
        })))
    }
}

#[tokio::test]
async fn test_custom_platform_inherits_compatibility() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        "platform: folia\nsumdb: file\nrepositories:\n  - provider: catalog\n    options:\n      projects: Vault\n",
    );
    install_plugins(dir.path(), &["Vault"]);

    let (mut app, _) = app_with_catalog(Config::default());
    app.platforms_mut().register(
        PlatformType::new("folia")
            .compatible_with(&["paper"])
            .with_builder(|platform, root| {
                Arc::new(JarPlatform::new(platform, root).with_loader(Arc::new(AuthoredLoader)))
                    as Arc<dyn Platform>
            }),
        15,
    );

    let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();
    let context = &workspace.contexts()[0];
    assert!(context.compatibility().contains("spigot"));

    let listing = context.platform().list_plugins().unwrap();
    assert!(listing.plugins[0].metadata().is_some());

    workspace.run_task(&tasks::resolve()).await.unwrap();
    assert!(context.database().plugins().get("vault").unwrap().is_some());
    workspace.close().await.unwrap();
}

#[tokio::test]
async fn test_open_aggregates_context_failures() {
    let good = tempfile::tempdir().unwrap();
    write_config(good.path(), CATALOG);

    let unknown_platform = tempfile::tempdir().unwrap();
    write_config(unknown_platform.path(), "platform: forge\nsumdb: file\n");

    let missing = good.path().join("does-not-exist");
    let selection = format!(
        "{},{},{}",
        path_str(good.path()),
        path_str(&missing),
        path_str(unknown_platform.path())
    );

    let (app, _) = app_with_catalog(Config::default());
    match Arc::new(app).open_workspace(&selection).await {
        Err(Error::Multiple(errors)) => assert_eq!(errors.len(), 2),
        Err(other) => panic!("expected an aggregate error, got {}", other),
        Ok(_) => panic!("expected opening to fail"),
    }
}

#[tokio::test]
async fn test_unknown_repository_provider_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        "platform: paper\nsumdb: file\nrepositories:\n  - provider: hangar\n",
    );

    let (app, _) = app_with_catalog(Config::default());
    let result = Arc::new(app).open_workspace(path_str(dir.path())).await;
    let err = result.err().unwrap();
    assert!(err.to_string().contains("unknown repository: hangar"));
}

#[tokio::test]
async fn test_run_with_context_attempts_every_context() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    for dir in [&first, &second] {
        write_config(dir.path(), CATALOG);
    }

    let config = Config {
        multithread: Some(false),
        ..Default::default()
    };
    let (app, _) = app_with_catalog(config);
    let selection = format!("{},{}", path_str(first.path()), path_str(second.path()));
    let workspace = Arc::new(app).open_workspace(&selection).await.unwrap();
    assert_eq!(workspace.contexts().len(), 2);

    let seen = Mutex::new(Vec::new());
    let result = workspace
        .run_with_context("probe", |context| {
            let seen = &seen;
            Box::pin(async move {
                seen.lock().unwrap().push(context.name().to_string());
                if context.name() == "<cli0>" {
                    Err(Error::Cancelled)
                } else {
                    Ok(())
                }
            })
        })
        .await;

    assert_eq!(*seen.lock().unwrap(), vec!["<cli0>", "<cli1>"]);
    match result {
        Err(Error::Multiple(errors)) => assert_eq!(errors.len(), 1),
        _ => panic!("expected one failing context"),
    }
    workspace.close().await.unwrap();
}

#[tokio::test]
async fn test_serial_open_detects_platform() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "multithread: false\nsumdb: file\n");
    server_jar(&dir.path().join("spigot.jar"), &["org/spigotmc/Main.class"]);

    let (app, _) = app_with_catalog(Config::default());
    let workspace = Arc::new(app).open_workspace(path_str(dir.path())).await.unwrap();

    let context = &workspace.contexts()[0];
    assert!(!context.multithread());
    assert_eq!(context.platform().name(), "spigot");
    workspace.close().await.unwrap();
}
