// Task module: dependency-ordered actions and the parallel execution primitive

use crate::error::{Error, Result};
use futures::future::{BoxFuture, join_all};
use log::debug;
use std::future::Future;
use std::sync::Arc;

/// An action run against a context of type `C`
pub type Action<C> = Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A named action with tasks that must run before it and tasks that run
/// after it. Both lists run in ascending priority order.
pub struct Task<C> {
    name: String,
    priority: i32,
    action: Action<C>,
    depends_on: Vec<Arc<Task<C>>>,
    followers: Vec<Arc<Task<C>>>,
}

impl<C: Send + Sync + 'static> Task<C> {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority: 0,
            action: Arc::new(move |context: Arc<C>| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(action(context))
            }),
            depends_on: Vec::new(),
            followers: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, task: Arc<Task<C>>) -> Self {
        self.depends_on.push(task);
        self
    }

    pub fn followed_by(mut self, task: Arc<Task<C>>) -> Self {
        self.followers.push(task);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Run dependencies, then this task, then its followers.
    ///
    /// The first failure aborts the chain; the error names the task that
    /// failed.
    pub fn run<'a>(&'a self, context: &'a Arc<C>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for task in by_priority(&self.depends_on) {
                task.run(context).await?;
            }

            debug!("Running task {}", self.name);
            (self.action)(context.clone())
                .await
                .map_err(|source| Error::Task {
                    task: self.name.clone(),
                    source,
                })?;

            for task in by_priority(&self.followers) {
                task.run(context).await?;
            }

            Ok(())
        })
    }
}

fn by_priority<C>(tasks: &[Arc<Task<C>>]) -> Vec<&Arc<Task<C>>> {
    let mut sorted: Vec<&Arc<Task<C>>> = tasks.iter().collect();
    sorted.sort_by_key(|t| t.priority);
    sorted
}

/// Run every job, on spawned tokio tasks when `multithread` is set or one
/// after another otherwise. All jobs are attempted; results keep input order.
pub async fn parallelize<T, F>(multithread: bool, jobs: Vec<F>) -> Vec<Result<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    if multithread {
        let handles: Vec<_> = jobs.into_iter().map(tokio::spawn).collect();
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(Error::Task {
                        task: "worker".to_string(),
                        source: e.into(),
                    })
                })
            })
            .collect()
    } else {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            results.push(job.await);
        }
        results
    }
}
