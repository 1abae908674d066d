// Workspace module: the set of contexts one invocation operates on

use crate::app::App;
use crate::config::ContextConfig;
use crate::context::Context;
use crate::error::{Error, MultiError, Result};
use crate::task::{Task, parallelize};
use crate::ui;
use futures::future::BoxFuture;
use log::{debug, error, info};
use std::sync::Arc;

/// Every context opened for one invocation
pub struct Workspace {
    contexts: Vec<Arc<Context>>,
}

impl Workspace {
    /// Open every context, concurrently when the app config allows it.
    ///
    /// All contexts are attempted. If any fails, the ones that did open are
    /// closed again and every failure is reported together.
    pub async fn open(app: &Arc<App>, entries: Vec<ContextConfig>) -> Result<Workspace> {
        if entries.is_empty() {
            return Err(Error::Config("no contexts selected".to_string()));
        }

        let jobs: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let app = app.clone();
                async move {
                    let name = entry.name.clone();
                    Context::open(&app, entry)
                        .await
                        .map_err(|e| Error::Task {
                            task: format!("open [{}]", name),
                            source: e.into(),
                        })
                }
            })
            .collect();

        let mut contexts = Vec::new();
        let mut errors = MultiError::new();
        for result in parallelize(app.config().multithread(), jobs).await {
            match result {
                Ok(context) => contexts.push(context),
                Err(e) => {
                    error!("{}", e);
                    errors.push(e);
                }
            }
        }

        if !errors.is_empty() {
            let workspace = Workspace { contexts };
            if let Err(e) = workspace.close().await {
                debug!("Closing partially opened workspace: {}", e);
            }
            return Err(Error::Multiple(errors));
        }

        info!("Opened {} contexts", contexts.len());
        Ok(Workspace { contexts })
    }

    pub fn contexts(&self) -> &[Arc<Context>] {
        &self.contexts
    }

    pub fn context(&self, name: &str) -> Option<&Arc<Context>> {
        self.contexts.iter().find(|c| c.name() == name)
    }

    /// Run `task` on each context in turn.
    ///
    /// A failing context does not stop the others; all failures come back
    /// as one error.
    pub async fn run_task(&self, task: &Task<Context>) -> Result<()> {
        self.run_with_context(task.name(), |context| {
            Box::pin(async move { task.run(&context).await })
        })
        .await
    }

    /// Run an arbitrary action on each context, printing the
    /// `:<name> [<context>]` header before it and a `FAILED` line after a
    /// failure.
    pub async fn run_with_context<'a, F>(&self, name: &str, action: F) -> Result<()>
    where
        F: Fn(Arc<Context>) -> BoxFuture<'a, Result<()>>,
    {
        let mut errors = MultiError::new();
        for context in &self.contexts {
            ui::task_header(name, context.name());

            if let Err(e) = action(context.clone()).await {
                ui::task_failed(name, context.name(), &e);
                errors.push(e);
            }
        }
        errors.into_result()
    }

    /// Flush and close every context
    pub async fn close(&self) -> Result<()> {
        let mut errors = MultiError::new();
        for context in &self.contexts {
            if let Err(e) = context.close().await {
                error!("Failed to close context {}: {}", context.name(), e);
                errors.push(e);
            }
        }
        errors.into_result()
    }
}
