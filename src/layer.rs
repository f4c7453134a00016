use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::{LookupSpan, SpanRef};

use crate::store::TaskStore;
use crate::task::{NewTask, TaskId, TaskUpdate};

/// Target prefix of this crate's own diagnostics, which are never rendered.
const OWN_TARGET: &str = "task_tally";

/// A `tracing` [`Layer`] that feeds a [`TaskStore`].
///
/// Events become log lines above the task tree. With
/// [`spans_as_tasks`](TaskLayer::spans_as_tasks) every span also becomes a
/// task nested under its parent span's task: the `message` field (or the
/// span name) is the description, and `total` / `completed` fields drive
/// progress, including later `span.record(..)` calls. Closing the span
/// completes the task.
///
/// ```rust,ignore
/// let store = TaskStore::new();
/// tracing_subscriber::registry()
///     .with(TaskLayer::new(store.clone()).spans_as_tasks(true))
///     .init();
///
/// let span = tracing::info_span!("download", total = 3, completed = tracing::field::Empty);
/// span.record("completed", 1);
/// ```
#[derive(Debug, Clone)]
pub struct TaskLayer {
    store: TaskStore,
    spans: bool,
}

impl TaskLayer {
    pub fn new(store: TaskStore) -> Self {
        Self { store, spans: false }
    }

    pub fn spans_as_tasks(mut self, yes: bool) -> Self {
        self.spans = yes;
        self
    }

    fn task_id<S>(&self, span: &SpanRef<'_, S>) -> Option<TaskId>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        span.extensions().get::<TaskIdExt>().map(|ext| ext.0)
    }
}

impl<S> Layer<S> for TaskLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !self.spans {
            return;
        }
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Fields::default();
        attrs.record(&mut fields);

        let description = fields.message.unwrap_or_else(|| attrs.metadata().name().to_string());
        let mut task = NewTask::new(description);
        if let Some(total) = fields.total {
            task = task.total(total);
        }
        if let Some(parent) = span.parent().and_then(|p| self.task_id(&p)) {
            task = task.parent(parent);
        }
        let task_id = self.store.add_task(task);
        if let Some(completed) = fields.completed {
            self.store.update_task(task_id, TaskUpdate::default().completed(completed));
        }
        span.extensions_mut().insert(TaskIdExt(task_id));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(task_id) = ctx.span(id).and_then(|span| self.task_id(&span)) else {
            return;
        };
        let mut fields = Fields::default();
        values.record(&mut fields);

        let mut update = TaskUpdate::default();
        if let Some(message) = fields.message {
            update = update.description(message);
        }
        if let Some(total) = fields.total {
            update = update.total(total);
        }
        if let Some(completed) = fields.completed {
            update = update.completed(completed);
        }
        self.store.update_task(task_id, update);
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(OWN_TARGET) {
            return;
        }
        let mut fields = Fields::default();
        event.record(&mut fields);

        let mut line = format!("{:>5}", meta.level());
        if let Some(message) = &fields.message {
            line.push(' ');
            line.push_str(message);
        }
        if !fields.rest.is_empty() {
            line.push(' ');
            line.push_str(&fields.rest);
        }
        self.store.push_log(line);
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(task_id) = ctx.span(&id).and_then(|span| self.task_id(&span)) {
            self.store.complete_task(task_id);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TaskIdExt(TaskId);

/// Span and event fields this layer understands; everything else is kept as
/// `name=value` text.
#[derive(Debug, Default)]
struct Fields {
    message: Option<String>,
    total: Option<u64>,
    completed: Option<u64>,
    rest: String,
}

impl Fields {
    fn push_rest(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        self.rest.push_str(&format!("{}={:?}", field.name(), value));
    }
}

impl Visit for Fields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "total" => self.total = Some(value),
            "completed" => self.completed = Some(value),
            _ => self.push_rest(field, &value),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match u64::try_from(value) {
            Ok(value) => self.record_u64(field, value),
            Err(_) => self.push_rest(field, &value),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            _ => self.push_rest(field, &value),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            _ => self.push_rest(field, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskStatus, TaskUnits};
    use tracing_subscriber::layer::SubscriberExt;

    fn with_layer(layer: TaskLayer, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn events_become_log_lines() {
        let store = TaskStore::new();
        with_layer(TaskLayer::new(store.clone()), || {
            tracing::info!(target: "app", attempt = 2, "retrying");
            tracing::warn!(target: "app", "slow");
        });
        let logs = store.snapshot().logs;
        assert_eq!(logs, vec![" INFO retrying attempt=2", " WARN slow"]);
    }

    #[test]
    fn multi_line_messages_become_one_log_per_line() {
        let store = TaskStore::new();
        with_layer(TaskLayer::new(store.clone()), || {
            tracing::error!(target: "app", "error: boom\ncaused by: disk");
        });
        let logs = store.snapshot().logs;
        assert_eq!(logs, vec!["ERROR error: boom", "caused by: disk"]);
    }

    #[test]
    fn own_diagnostics_are_skipped() {
        let store = TaskStore::new();
        with_layer(TaskLayer::new(store.clone()), || {
            tracing::warn!(target: "task_tally::runner", "terminal write failed");
        });
        assert!(!store.has_pending_logs());
    }

    #[test]
    fn spans_are_ignored_unless_enabled() {
        let store = TaskStore::new();
        with_layer(TaskLayer::new(store.clone()), || {
            let _span = tracing::info_span!("work").entered();
        });
        assert!(store.list_tasks().is_empty());
    }

    #[test]
    fn spans_map_to_nested_tasks() {
        let store = TaskStore::new();
        with_layer(TaskLayer::new(store.clone()).spans_as_tasks(true), || {
            let outer = tracing::info_span!("suite");
            let inner = tracing::info_span!(
                parent: &outer,
                "case",
                message = "login works",
                total = 4,
                completed = tracing::field::Empty,
            );
            inner.record("completed", 3);

            let tasks = store.list_tasks();
            assert_eq!(tasks.len(), 2);
            assert_eq!(tasks[0].description, "suite");
            assert_eq!(tasks[1].description, "login works");
            assert_eq!(tasks[1].parent, Some(tasks[0].id));
            assert_eq!(tasks[1].units, TaskUnits::Determinate { completed: 3, total: 4 });
            drop(inner);
            assert_eq!(store.get_task(tasks[1].id).unwrap().status, TaskStatus::Done);
        });
    }
}
