// Built-in tasks run by the command line against every open context

use crate::context::Context;
use crate::error::MultiError;
use crate::plugin::Plugin;
use crate::task::Task;
use crate::ui;
use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Populate the in-memory index from durable storage
pub fn load_cache() -> Arc<Task<Context>> {
    Arc::new(
        Task::new("load-cache", |context: Arc<Context>| async move {
            context.load_cache().await?;
            Ok(())
        })
        .with_priority(-10),
    )
}

/// Flush the whole index to durable storage
pub fn save_cache() -> Arc<Task<Context>> {
    Arc::new(Task::new(
        "save-cache",
        |context: Arc<Context>| async move {
            context.database().save_all().await?;
            Ok(())
        },
    ))
}

/// Match every installed plugin against the configured repositories.
///
/// Plugins that cannot be matched are reported one by one and do not fail
/// the task; cache and cancellation failures do, once every plugin has had
/// its turn.
pub fn resolve() -> Task<Context> {
    Task::new("resolve", |context: Arc<Context>| async move {
        let listing = context.platform().list_plugins()?;
        for (path, err) in &listing.errors {
            warn!("Unable to load plugin {}: {:#}", path.display(), err);
        }

        if listing.plugins.is_empty() {
            ui::dim("No plugins installed");
            return Ok(());
        }

        let pb = ui::spinner(&format!("Resolving {} plugins", listing.plugins.len()));
        let results = context.resolve_plugins(&listing.plugins).await;
        ui::clear_bar(&pb);

        let mut resolved = 0;
        let mut fatal = MultiError::new();
        for (plugin, result) in listing.plugins.iter().zip(results) {
            match result {
                Ok(cached) => {
                    resolved += 1;
                    ui::resolved(
                        plugin.name(),
                        cached.remote_identifier(),
                        cached.repository().name(),
                        cached.confidence(),
                    );
                }
                Err(e) if e.is_fatal() => {
                    ui::unresolved(plugin.name(), &e);
                    fatal.push(e);
                }
                Err(e) => {
                    debug!("Unable to resolve {}: {}", plugin.name(), e);
                    ui::unresolved(plugin.name(), &e);
                }
            }
        }

        info!(
            "Resolved {} of {} plugins in {}",
            resolved,
            listing.plugins.len(),
            context.name()
        );
        fatal.into_result()?;
        Ok(())
    })
    .depends_on(load_cache())
    .followed_by(save_cache())
}

/// Print the cached matches
pub fn list() -> Task<Context> {
    Task::new("list", |context: Arc<Context>| async move {
        let plugins = context.database().plugins().values()?;
        if plugins.is_empty() {
            ui::dim("No cached plugins");
            return Ok(());
        }

        for plugin in &plugins {
            let record = plugin.record();
            ui::cached_entry(
                &record.local_identifier,
                &record.name,
                &record.repository,
                &record.remote_identifier,
                record.confidence,
            );
        }
        Ok(())
    })
    .depends_on(load_cache())
}

/// Discard the plugin cache; with `all`, the plugins folder as well
pub fn clean(all: bool) -> Task<Context> {
    Task::new("clean", move |context: Arc<Context>| async move {
        let size = context.database().size().await?;
        ui::action(&format!("deleting plugin cache ({} KB)", size / 1024));
        context.database().clean().await?;

        if all {
            let folder = context.platform().plugins_folder();
            if folder.exists() {
                let size = folder_size(&folder)?;
                ui::action(&format!(
                    "deleting plugins folder ({:.2} MB)",
                    size as f64 / 1024.0 / 1024.0
                ));
                fs::remove_dir_all(&folder)?;
            }
        }
        Ok(())
    })
}

fn folder_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        total += if meta.is_dir() {
            folder_size(&entry.path())?
        } else {
            meta.len()
        };
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_size_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), vec![0u8; 100]).unwrap();
        fs::create_dir(dir.path().join("Vault")).unwrap();
        fs::write(dir.path().join("Vault").join("config.yml"), vec![0u8; 28]).unwrap();

        assert_eq!(folder_size(dir.path()).unwrap(), 128);
    }
}
