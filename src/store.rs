//! The concurrent task store.
//!
//! Every operation locks the whole store once, so the task map, the tree
//! order and the pending log lines are always observed together. Mutations
//! raise a dirty flag that the render loop polls and clears each tick.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::color::{DefaultTheme, Theme};
use crate::config::BarStyle;
use crate::error::ConfigError;
use crate::task::{NewTask, RenderRow, TaskId, TaskRegistry, TaskSnapshot, TaskStatus, TaskUpdate};
use crate::text::single_line;

/// Handle to a shared task store. Clones refer to the same store.
///
/// ```rust,ignore
/// let store = TaskStore::new();
/// let build = store.add_task(NewTask::new("build").total(3));
/// let test = store.add_task(NewTask::new("unit tests").parent(build));
/// store.advance(build);
/// store.complete_task(test);
/// ```
#[derive(Clone)]
pub struct TaskStore {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    dirty: AtomicBool,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    style: Arc<BarStyle>,
    theme: Arc<dyn Theme>,
}

#[derive(Default)]
struct State {
    registry: TaskRegistry,
    logs: VecDeque<String>,
}

/// A task as the render pipeline sees it.
#[derive(Clone)]
pub struct FrameEntry {
    pub depth: usize,
    pub task: TaskSnapshot,
    pub theme: Arc<dyn Theme>,
}

/// Consistent view of the store for one frame.
pub struct StoreSnapshot {
    pub taken_at: Instant,
    /// Depth-first order.
    pub entries: Vec<FrameEntry>,
    /// Log lines queued since the previous snapshot.
    pub logs: Vec<String>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TaskStore")
            .field("registry", &state.registry)
            .field("pending_logs", &state.logs.len())
            .field("dirty", &self.shared.dirty.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures the clock, default style and default theme of a store.
pub struct StoreBuilder {
    clock: Arc<dyn Clock>,
    style: BarStyle,
    theme: Arc<dyn Theme>,
}

impl StoreBuilder {
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Style of root tasks, inherited by their descendants.
    pub fn style(mut self, style: BarStyle) -> Self {
        self.style = style;
        self
    }

    pub fn theme(mut self, theme: Arc<dyn Theme>) -> Self {
        self.theme = theme;
        self
    }

    pub fn build(self) -> Result<TaskStore, ConfigError> {
        let style = self.style.validate()?;
        Ok(TaskStore::from_parts(self.clock, style, self.theme))
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self::from_parts(Arc::new(SystemClock), BarStyle::default(), Arc::new(DefaultTheme))
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder {
            clock: Arc::new(SystemClock),
            style: BarStyle::default(),
            theme: Arc::new(DefaultTheme),
        }
    }

    fn from_parts(clock: Arc<dyn Clock>, style: BarStyle, theme: Arc<dyn Theme>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                dirty: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                clock,
                style: Arc::new(style),
                theme,
            }),
        }
    }

    pub fn now(&self) -> Instant {
        self.shared.clock.now()
    }

    /// Registers a task and returns its id. An unknown `parent` makes the
    /// task a root.
    pub fn add_task(&self, task: NewTask) -> TaskId {
        let id = TaskId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let now = self.now();
        {
            let mut state = self.shared.state.lock();
            state
                .registry
                .insert(id, task, now, &self.shared.style, &self.shared.theme);
        }
        tracing::trace!(task = %id, "task added");
        self.mark_dirty();
        id
    }

    /// Applies `update`; unknown ids are ignored.
    pub fn update_task(&self, id: TaskId, update: TaskUpdate) {
        let applied = self.shared.state.lock().registry.update(id, update);
        if applied {
            self.mark_dirty();
        }
    }

    /// Adds `amount` to a determinate task (clamped at its total) or moves a
    /// spinner forward. Unknown ids are ignored.
    pub fn advance_task(&self, id: TaskId, amount: u64) {
        let applied = self.shared.state.lock().registry.advance(id, amount);
        if applied {
            self.mark_dirty();
        }
    }

    pub fn advance(&self, id: TaskId) {
        self.advance_task(id, 1);
    }

    pub fn complete_task(&self, id: TaskId) {
        self.finish(id, TaskStatus::Done);
    }

    pub fn fail_task(&self, id: TaskId) {
        self.finish(id, TaskStatus::Failed);
    }

    fn finish(&self, id: TaskId, status: TaskStatus) {
        let now = self.now();
        let applied = self.shared.state.lock().registry.finish(id, status, now);
        if applied {
            tracing::trace!(task = %id, ?status, "task finished");
            self.mark_dirty();
        }
    }

    pub fn get_task(&self, id: TaskId) -> Option<TaskSnapshot> {
        let state = self.shared.state.lock();
        state.registry.get(id).map(|e| e.snapshot.clone())
    }

    /// All tasks, in render order.
    pub fn list_tasks(&self) -> Vec<TaskSnapshot> {
        let state = self.shared.state.lock();
        state.registry.iter().map(|(_, e)| e.snapshot.clone()).collect()
    }

    pub fn render_rows(&self) -> Vec<RenderRow> {
        self.shared.state.lock().registry.render_order()
    }

    /// Whether finishing `id` would remove it, taking ancestors into account.
    pub fn is_transient(&self, id: TaskId) -> bool {
        self.shared.state.lock().registry.is_transient(id)
    }

    /// Queues a line to print above the tasks. Multi-line text is queued
    /// one terminal row per line, with other control characters blanked.
    pub fn push_log(&self, line: impl Into<String>) {
        let line = line.into();
        {
            let mut state = self.shared.state.lock();
            let before = state.logs.len();
            state.logs.extend(line.lines().map(|l| single_line(l).into_owned()));
            if state.logs.len() == before {
                state.logs.push_back(String::new());
            }
        }
        self.mark_dirty();
    }

    pub fn has_pending_logs(&self) -> bool {
        !self.shared.state.lock().logs.is_empty()
    }

    /// A running indeterminate task animates even without state changes.
    pub fn has_running_spinner(&self) -> bool {
        self.shared.state.lock().registry.has_running_spinner()
    }

    pub fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
    }

    /// Returns whether anything changed since the last call, and clears it.
    pub fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }

    /// Copies the tasks in render order and drains the pending log lines.
    pub fn snapshot(&self) -> StoreSnapshot {
        let taken_at = self.now();
        let mut state = self.shared.state.lock();
        let entries = state
            .registry
            .iter()
            .map(|(row, e)| FrameEntry {
                depth: row.depth,
                task: e.snapshot.clone(),
                theme: e.theme.clone(),
            })
            .collect();
        let logs = state.logs.drain(..).collect();
        StoreSnapshot {
            taken_at,
            entries,
            logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StyleOverride;
    use crate::task::TaskUnits;
    use crate::widgets::SpinnerFrames;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn descriptions(store: &TaskStore) -> Vec<String> {
        store.list_tasks().into_iter().map(|t| t.description).collect()
    }

    #[test]
    fn ids_increase() {
        let store = TaskStore::new();
        let a = store.add_task(NewTask::new("a"));
        let b = store.add_task(NewTask::new("b"));
        assert!(b > a);
    }

    #[test]
    fn total_picks_units_kind() {
        let store = TaskStore::new();
        let spin = store.add_task(NewTask::new("s"));
        let zero = store.add_task(NewTask::new("z").total(0));
        let bar = store.add_task(NewTask::new("b").total(5));
        let units = |id| store.get_task(id).map(|t| t.units);
        assert_eq!(units(spin), Some(TaskUnits::Indeterminate { spinner_frame: 0 }));
        assert_eq!(units(zero), Some(TaskUnits::Indeterminate { spinner_frame: 0 }));
        assert_eq!(units(bar), Some(TaskUnits::Determinate { completed: 0, total: 5 }));
    }

    #[test]
    fn stale_ids_are_ignored() {
        let store = TaskStore::new();
        let id = store.add_task(NewTask::new("t").transient(true));
        store.complete_task(id);
        store.take_dirty();

        store.advance(id);
        store.update_task(id, TaskUpdate::default().description("x"));
        store.fail_task(id);
        assert!(store.get_task(id).is_none());
        assert!(!store.take_dirty());
    }

    #[test]
    fn completion_snaps_to_total() {
        let store = TaskStore::new();
        let id = store.add_task(NewTask::new("t").total(9));
        store.advance_task(id, 4);
        store.complete_task(id);
        let task = store.get_task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.units, TaskUnits::Determinate { completed: 9, total: 9 });
    }

    #[test]
    fn transient_tasks_leave_on_finish() {
        let store = TaskStore::new();
        let keep = store.add_task(NewTask::new("keep"));
        let done = store.add_task(NewTask::new("done").transient(true));
        let failed = store.add_task(NewTask::new("failed").transient(true));
        store.complete_task(done);
        store.fail_task(failed);
        store.complete_task(keep);
        assert_eq!(descriptions(&store), vec!["keep"]);
    }

    #[test]
    fn transient_ancestor_wins() {
        let store = TaskStore::new();
        let parent = store.add_task(NewTask::new("parent").transient(true));
        let child = store.add_task(NewTask::new("child").parent(parent).transient(false));
        let grandchild = store.add_task(NewTask::new("grandchild").parent(child));
        assert!(store.is_transient(grandchild));

        store.complete_task(grandchild);
        assert_eq!(descriptions(&store), vec!["parent", "child"]);

        store.update_task(child, TaskUpdate::default().transient(false));
        store.fail_task(child);
        assert_eq!(descriptions(&store), vec!["parent"]);
    }

    #[test]
    fn finishing_transient_parent_drops_running_children() {
        let store = TaskStore::new();
        let parent = store.add_task(NewTask::new("parent").transient(true));
        store.add_task(NewTask::new("child").parent(parent));
        store.add_task(NewTask::new("other"));
        store.complete_task(parent);
        assert_eq!(descriptions(&store), vec!["other"]);
        assert!(store.render_rows().iter().all(|r| r.depth == 0));
    }

    #[test]
    fn children_inherit_parent_style() {
        let store = TaskStore::new();
        let parent = store.add_task(
            NewTask::new("parent").style(StyleOverride::default().bar_chars('=', ' ')),
        );
        let plain = store.add_task(NewTask::new("plain").parent(parent));
        let spun = store.add_task(
            NewTask::new("spun")
                .parent(parent)
                .style(StyleOverride::default().spinner(SpinnerFrames::line())),
        );

        let parent_style = store.get_task(parent).unwrap().style;
        let plain_style = store.get_task(plain).unwrap().style;
        let spun_style = store.get_task(spun).unwrap().style;

        assert_eq!(*plain_style, *parent_style);
        assert_eq!(
            *spun_style,
            parent_style.merged(&StyleOverride::default().spinner(SpinnerFrames::line()))
        );
        // siblings do not leak into each other
        assert_eq!(plain_style.spinner, SpinnerFrames::dots());
        assert_eq!(spun_style.bar.filled, '=');
    }

    #[test]
    fn snapshot_drains_logs_once() {
        let store = TaskStore::new();
        store.push_log("hello");
        assert!(store.has_pending_logs());
        assert_eq!(store.snapshot().logs, vec!["hello".to_string()]);
        assert!(store.snapshot().logs.is_empty());
    }

    #[test]
    fn multi_line_logs_are_queued_per_row() {
        let store = TaskStore::new();
        store.push_log("error: boom\ncaused by: disk\r\n");
        store.push_log("key\tvalue");
        store.push_log("");
        assert_eq!(
            store.snapshot().logs,
            vec!["error: boom", "caused by: disk", "key value", ""]
        );
    }

    #[test]
    fn dirty_flag_is_poll_and_clear() {
        let store = TaskStore::new();
        assert!(!store.take_dirty());
        store.add_task(NewTask::new("t"));
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }

    #[test]
    fn timestamps_follow_clock() {
        let clock = ManualClock::new();
        let store = TaskStore::builder().clock(clock.clone()).build().unwrap();
        let id = store.add_task(NewTask::new("t"));
        clock.advance(Duration::from_secs(4));
        store.complete_task(id);
        clock.advance(Duration::from_secs(10));
        let task = store.get_task(id).unwrap();
        assert_eq!(task.elapsed(store.now()), Duration::from_secs(4));
    }

    #[test]
    fn builder_rejects_invalid_style() {
        let mut style = BarStyle::default();
        style.bar.width = 0;
        let err = TaskStore::builder().style(style).build().err();
        assert_eq!(err, Some(ConfigError::ZeroWidth { field: "bar width" }));
    }

    #[test]
    fn concurrent_producers_keep_order_consistent() {
        let store = TaskStore::new();
        let root = store.add_task(NewTask::new("root"));
        std::thread::scope(|s| {
            for worker in 0..8 {
                let store = store.clone();
                s.spawn(move || {
                    let mine = store.add_task(NewTask::new(format!("w{worker}")).parent(root));
                    for i in 0..20 {
                        let leaf = store.add_task(
                            NewTask::new(format!("w{worker}-{i}")).parent(mine).total(3),
                        );
                        store.advance_task(leaf, 5);
                        store.complete_task(leaf);
                    }
                });
            }
        });
        let rows = store.render_rows();
        assert_eq!(rows.len(), 1 + 8 + 8 * 20);
        let tasks = store.list_tasks();
        for (row, task) in rows.iter().zip(&tasks) {
            assert_eq!(row.id, task.id);
            if let Some(parent) = task.parent {
                let parent_pos = rows.iter().position(|r| r.id == parent).unwrap();
                assert_eq!(rows[parent_pos].depth + 1, row.depth);
            }
        }
    }
}
