//! Per-branch "current task" context.
//!
//! A [`TaskContext`] is passed explicitly into each concurrent branch of
//! work. Tasks added through it default to the context's current task as
//! their parent, and [`TaskContext::run`] hands the wrapped work a child
//! context scoped to the new task, so sibling branches never observe each
//! other's current task.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::store::TaskStore;
use crate::task::{NewTask, TaskId, TaskUpdate};

/// Store handle, current task and cancellation token of one branch of work.
///
/// ```rust,ignore
/// tally.run(|ctx| async move {
///     let fetched = ctx
///         .run(NewTask::new("fetch").total(3), |ctx| async move {
///             for _ in 0..3 {
///                 fetch_one().await?;
///                 ctx.advance();
///             }
///             Ok::<_, FetchError>(())
///         })
///         .await;
/// }).await;
/// ```
#[derive(Clone, Debug)]
pub struct TaskContext {
    store: TaskStore,
    current: Option<TaskId>,
    cancel: CancellationToken,
}

impl TaskContext {
    /// A root context: tasks added through it are top-level.
    pub fn new(store: TaskStore) -> Self {
        Self::with_cancel(store, CancellationToken::new())
    }

    /// A root context cancelled together with `cancel`.
    pub(crate) fn with_cancel(store: TaskStore, cancel: CancellationToken) -> Self {
        Self {
            store,
            current: None,
            cancel,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    /// Cancelled when the enclosing [`Tally::run`](crate::Tally::run) ends or
    /// its future is dropped. Work that outlives its branch, such as spawned
    /// tasks, should stop once this fires.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A context whose current task is `id`. Its cancellation token is a
    /// child of this one.
    pub fn child(&self, id: TaskId) -> TaskContext {
        Self {
            store: self.store.clone(),
            current: Some(id),
            cancel: self.cancel.child_token(),
        }
    }

    /// Adds a task, parented to the current task unless `task` names a
    /// parent.
    pub fn add_task(&self, mut task: NewTask) -> TaskId {
        if task.parent.is_none() {
            task.parent = self.current;
        }
        self.store.add_task(task)
    }

    /// Advances the current task by one.
    pub fn advance(&self) {
        self.advance_by(1);
    }

    pub fn advance_by(&self, amount: u64) {
        if let Some(id) = self.current {
            self.store.advance_task(id, amount);
        }
    }

    pub fn update(&self, update: TaskUpdate) {
        if let Some(id) = self.current {
            self.store.update_task(id, update);
        }
    }

    /// Queues a log line above the task tree.
    pub fn log(&self, line: impl Into<String>) {
        self.store.push_log(line);
    }

    /// Runs `work` as a new task.
    ///
    /// The task completes when `work` returns `Ok` and fails when it returns
    /// `Err`; the result is passed through unchanged. If the returned future
    /// is dropped before `work` finishes, the task is failed as well.
    pub async fn run<F, Fut, T, E>(&self, task: NewTask, work: F) -> Result<T, E>
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let id = self.add_task(task);
        let mut guard = FailOnDrop {
            store: &self.store,
            id,
            armed: true,
        };
        let result = work(self.child(id)).await;
        guard.armed = false;
        match &result {
            Ok(_) => self.store.complete_task(id),
            Err(_) => self.store.fail_task(id),
        }
        result
    }
}

/// Fails the task when work is dropped mid-flight (cancelled).
struct FailOnDrop<'a> {
    store: &'a TaskStore,
    id: TaskId,
    armed: bool,
}

impl Drop for FailOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(task = %self.id, "task dropped before finishing");
            self.store.fail_task(self.id);
        }
    }
}
