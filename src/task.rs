use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::color::Theme;
use crate::config::{BarStyle, StyleOverride};

/// Identity of a task, unique for the lifetime of one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw, monotonically increasing value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Running,
    Done,
    Failed,
}

/// Progress of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskUnits {
    /// Countable work with a known total; `completed <= total` always holds.
    Determinate { completed: u64, total: u64 },
    /// Work of unknown length, animated by an advancing counter.
    Indeterminate { spinner_frame: u64 },
}

impl TaskUnits {
    /// Determinate for a positive total, indeterminate otherwise.
    pub fn from_total(total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => TaskUnits::Determinate {
                completed: 0,
                total,
            },
            _ => TaskUnits::Indeterminate { spinner_frame: 0 },
        }
    }

    fn advance(&mut self, amount: u64) {
        match self {
            TaskUnits::Determinate { completed, total } => {
                *completed = completed.saturating_add(amount).min(*total);
            }
            TaskUnits::Indeterminate { spinner_frame } => {
                *spinner_frame = spinner_frame.wrapping_add(amount);
            }
        }
    }

    fn retotal(&mut self, new_total: u64, completed: Option<u64>) {
        *self = match (*self, new_total) {
            (_, 0) => TaskUnits::Indeterminate { spinner_frame: 0 },
            (TaskUnits::Determinate { completed: old, .. }, total) => TaskUnits::Determinate {
                completed: completed.unwrap_or(old).min(total),
                total,
            },
            (TaskUnits::Indeterminate { .. }, total) => TaskUnits::Determinate {
                completed: completed.unwrap_or(0).min(total),
                total,
            },
        };
    }

    fn set_completed(&mut self, value: u64) {
        if let TaskUnits::Determinate { completed, total } = self {
            *completed = value.min(*total);
        }
    }

    fn fill(&mut self) {
        if let TaskUnits::Determinate { completed, total } = self {
            *completed = *total;
        }
    }
}

/// One task at a point in time.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub parent: Option<TaskId>,
    pub description: String,
    pub status: TaskStatus,
    /// The task's own flag. A transient ancestor makes the task behave as
    /// transient regardless.
    pub transient: bool,
    pub units: TaskUnits,
    /// Resolved once at creation.
    pub style: Arc<BarStyle>,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
}

impl TaskSnapshot {
    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.completed_at
            .unwrap_or(now)
            .saturating_duration_since(self.started_at)
    }

    /// `elapsed × remaining / completed` for a running determinate task that
    /// has made some progress and has some left.
    pub fn eta(&self, now: Instant) -> Option<Duration> {
        let TaskUnits::Determinate { completed, total } = self.units else {
            return None;
        };
        let remaining = total - completed;
        if !self.is_running() || completed == 0 || remaining == 0 {
            return None;
        }
        let nanos = self.elapsed(now).as_nanos() * u128::from(remaining) / u128::from(completed);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

/// Parameters of a task to add.
///
/// ```rust,ignore
/// let id = store.add_task(NewTask::new("download").total(512).transient(true));
/// ```
#[derive(Clone, Default)]
pub struct NewTask {
    pub(crate) description: String,
    pub(crate) total: Option<u64>,
    pub(crate) transient: bool,
    pub(crate) parent: Option<TaskId>,
    pub(crate) style: Option<StyleOverride>,
    pub(crate) theme: Option<Arc<dyn Theme>>,
}

impl NewTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// A positive total makes the task determinate.
    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn transient(mut self, yes: bool) -> Self {
        self.transient = yes;
        self
    }

    pub fn parent(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn style(mut self, style: StyleOverride) -> Self {
        self.style = Some(style);
        self
    }

    pub fn theme(mut self, theme: Arc<dyn Theme>) -> Self {
        self.theme = Some(theme);
        self
    }
}

impl std::fmt::Debug for NewTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewTask")
            .field("description", &self.description)
            .field("total", &self.total)
            .field("transient", &self.transient)
            .field("parent", &self.parent)
            .field("style", &self.style)
            .field("theme", &self.theme.is_some())
            .finish()
    }
}

/// Changes to apply to a task; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    pub transient: Option<bool>,
}

impl TaskUpdate {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn completed(mut self, completed: u64) -> Self {
        self.completed = Some(completed);
        self
    }

    /// `0` turns the task indeterminate.
    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn transient(mut self, yes: bool) -> Self {
        self.transient = Some(yes);
        self
    }
}

/// Position of a task in the depth-first render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRow {
    pub id: TaskId,
    pub depth: usize,
}

pub(crate) struct TaskEntry {
    pub(crate) snapshot: TaskSnapshot,
    pub(crate) theme: Arc<dyn Theme>,
    depth: usize,
    /// Neighbours in the depth-first render order.
    prev: Option<TaskId>,
    next: Option<TaskId>,
    /// Neighbours among the children of the same parent (or among roots).
    prev_sibling: Option<TaskId>,
    next_sibling: Option<TaskId>,
    last_child: Option<TaskId>,
}

/// Task tree owned by the store. Not synchronized by itself.
///
/// The depth-first render order is an intrusive doubly linked list through
/// the entries, kept up to date on every change: inserting costs the height
/// of the parent's subtree, removing costs the size of the removed subtree.
/// Nothing is proportional to the number of siblings or of tasks.
#[derive(Default)]
pub(crate) struct TaskRegistry {
    tasks: IndexMap<TaskId, TaskEntry>,
    head: Option<TaskId>,
    tail: Option<TaskId>,
    last_root: Option<TaskId>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TaskRegistry {{")?;
        for (row, entry) in self.iter() {
            writeln!(f, "  {}{:?}", "  ".repeat(row.depth), entry.snapshot)?;
        }
        writeln!(f, "}}")
    }
}

impl TaskRegistry {
    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskEntry> {
        self.tasks.get(&id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Registers a task under `parent` (or as a root if `parent` is unknown),
    /// resolving style and theme against the parent's.
    pub(crate) fn insert(
        &mut self,
        id: TaskId,
        task: NewTask,
        now: Instant,
        default_style: &Arc<BarStyle>,
        default_theme: &Arc<dyn Theme>,
    ) {
        let parent = task.parent.filter(|p| self.tasks.contains_key(p));
        let (base_style, base_theme, depth) = match parent.and_then(|p| self.tasks.get(&p)) {
            Some(p) => (p.snapshot.style.clone(), p.theme.clone(), p.depth + 1),
            None => (default_style.clone(), default_theme.clone(), 0),
        };
        let style = match &task.style {
            Some(o) => Arc::new(base_style.merged(o)),
            None => base_style,
        };

        // New children go after the parent's last descendant, new roots at
        // the very end.
        let (anchor, prev_sibling) = match parent {
            Some(p) => (Some(self.last_descendant(p)), self.last_child_of(p)),
            None => (self.tail, self.last_root),
        };
        let next = anchor.and_then(|a| self.tasks.get(&a)).and_then(|a| a.next);

        let snapshot = TaskSnapshot {
            id,
            parent,
            description: task.description,
            status: TaskStatus::Running,
            transient: task.transient,
            units: TaskUnits::from_total(task.total),
            style,
            started_at: now,
            completed_at: None,
        };
        self.tasks.insert(
            id,
            TaskEntry {
                snapshot,
                theme: task.theme.unwrap_or(base_theme),
                depth,
                prev: anchor,
                next,
                prev_sibling,
                next_sibling: None,
                last_child: None,
            },
        );

        self.set_next(anchor, Some(id));
        self.set_prev(next, Some(id));
        if let Some(entry) = prev_sibling.and_then(|s| self.tasks.get_mut(&s)) {
            entry.next_sibling = Some(id);
        }
        match parent.and_then(|p| self.tasks.get_mut(&p)) {
            Some(p) => p.last_child = Some(id),
            None => self.last_root = Some(id),
        }
    }

    pub(crate) fn update(&mut self, id: TaskId, update: TaskUpdate) -> bool {
        let Some(entry) = self.tasks.get_mut(&id) else {
            return false;
        };
        let task = &mut entry.snapshot;
        if let Some(description) = update.description {
            task.description = description;
        }
        match (update.total, update.completed) {
            (Some(total), completed) => task.units.retotal(total, completed),
            (None, Some(completed)) => task.units.set_completed(completed),
            (None, None) => {}
        }
        if let Some(transient) = update.transient {
            task.transient = transient;
        }
        true
    }

    pub(crate) fn advance(&mut self, id: TaskId, amount: u64) -> bool {
        match self.tasks.get_mut(&id) {
            Some(entry) => {
                entry.snapshot.units.advance(amount);
                true
            }
            None => false,
        }
    }

    /// Moves a running task to `status`. Transient tasks, and tasks under a
    /// transient ancestor, leave the registry with their whole subtree.
    pub(crate) fn finish(&mut self, id: TaskId, status: TaskStatus, now: Instant) -> bool {
        let Some(entry) = self.tasks.get_mut(&id) else {
            return false;
        };
        let task = &mut entry.snapshot;
        if !task.is_running() {
            return false;
        }
        task.status = status;
        task.completed_at = Some(now);
        if status == TaskStatus::Done {
            task.units.fill();
        }
        if self.is_transient(id) {
            self.remove(id);
        }
        true
    }

    /// Own flag or any ancestor's flag.
    pub(crate) fn is_transient(&self, id: TaskId) -> bool {
        let mut cursor = self.tasks.get(&id);
        while let Some(entry) = cursor {
            if entry.snapshot.transient {
                return true;
            }
            cursor = entry.snapshot.parent.and_then(|p| self.tasks.get(&p));
        }
        false
    }

    /// Removes a task and all of its descendants, which sit right behind it
    /// in the render order.
    pub(crate) fn remove(&mut self, id: TaskId) {
        let Some(entry) = self.tasks.get(&id) else {
            return;
        };
        let (parent, prev, prev_sibling, next_sibling) =
            (entry.snapshot.parent, entry.prev, entry.prev_sibling, entry.next_sibling);
        let last = self.last_descendant(id);
        let after = self.tasks.get(&last).and_then(|e| e.next);

        self.set_next(prev, after);
        self.set_prev(after, prev);
        if let Some(s) = prev_sibling.and_then(|s| self.tasks.get_mut(&s)) {
            s.next_sibling = next_sibling;
        }
        if let Some(s) = next_sibling.and_then(|s| self.tasks.get_mut(&s)) {
            s.prev_sibling = prev_sibling;
        }
        match parent.and_then(|p| self.tasks.get_mut(&p)) {
            Some(p) if p.last_child == Some(id) => p.last_child = prev_sibling,
            Some(_) => {}
            None if self.last_root == Some(id) => self.last_root = prev_sibling,
            None => {}
        }

        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let removed = self.tasks.swap_remove(&current);
            if current == last {
                break;
            }
            cursor = removed.and_then(|e| e.next);
        }
    }

    /// Depth-first listing: each task is followed by its descendants, and
    /// children appear in insertion order.
    pub(crate) fn render_order(&self) -> Vec<RenderRow> {
        self.iter().map(|(row, _)| row).collect()
    }

    /// Entries in render order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (RenderRow, &TaskEntry)> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let id = cursor?;
            let entry = self.tasks.get(&id)?;
            cursor = entry.next;
            Some((RenderRow { id, depth: entry.depth }, entry))
        })
    }

    pub(crate) fn has_running_spinner(&self) -> bool {
        self.tasks.values().any(|e| {
            e.snapshot.is_running() && matches!(e.snapshot.units, TaskUnits::Indeterminate { .. })
        })
    }

    fn last_child_of(&self, id: TaskId) -> Option<TaskId> {
        self.tasks.get(&id).and_then(|e| e.last_child)
    }

    /// Follows last children down to the end of `id`'s subtree.
    fn last_descendant(&self, id: TaskId) -> TaskId {
        let mut last = id;
        while let Some(child) = self.last_child_of(last) {
            last = child;
        }
        last
    }

    fn set_next(&mut self, at: Option<TaskId>, next: Option<TaskId>) {
        match at.and_then(|a| self.tasks.get_mut(&a)) {
            Some(entry) => entry.next = next,
            None => self.head = next,
        }
    }

    fn set_prev(&mut self, at: Option<TaskId>, prev: Option<TaskId>) {
        match at.and_then(|a| self.tasks.get_mut(&a)) {
            Some(entry) => entry.prev = prev,
            None => self.tail = prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PlainTheme;
    use pretty_assertions::assert_eq;

    struct Fixture {
        registry: TaskRegistry,
        next: u64,
        now: Instant,
        style: Arc<BarStyle>,
        theme: Arc<dyn Theme>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: TaskRegistry::default(),
                next: 0,
                now: Instant::now(),
                style: Arc::new(BarStyle::default()),
                theme: Arc::new(PlainTheme),
            }
        }

        fn add(&mut self, task: NewTask) -> TaskId {
            self.next += 1;
            let id = TaskId::new(self.next);
            self.registry.insert(id, task, self.now, &self.style, &self.theme);
            id
        }

        fn order(&self) -> Vec<(u64, usize)> {
            self.registry
                .render_order()
                .iter()
                .map(|r| (r.id.get(), r.depth))
                .collect()
        }
    }

    #[test]
    fn child_lands_after_parent_subtree() {
        let mut f = Fixture::new();
        let a = f.add(NewTask::new("a"));
        let b = f.add(NewTask::new("b"));
        let a1 = f.add(NewTask::new("a1").parent(a));
        f.add(NewTask::new("a1x").parent(a1));
        f.add(NewTask::new("a2").parent(a));
        f.add(NewTask::new("b1").parent(b));
        assert_eq!(
            f.order(),
            vec![(1, 0), (3, 1), (4, 2), (5, 1), (2, 0), (6, 1)]
        );
    }

    #[test]
    fn unknown_parent_becomes_root() {
        let mut f = Fixture::new();
        let id = f.add(NewTask::new("orphan").parent(TaskId::new(99)));
        assert_eq!(f.registry.get(id).unwrap().snapshot.parent, None);
        assert_eq!(f.order(), vec![(1, 0)]);
    }

    #[test]
    fn removal_takes_the_subtree() {
        let mut f = Fixture::new();
        let a = f.add(NewTask::new("a"));
        let a1 = f.add(NewTask::new("a1").parent(a));
        f.add(NewTask::new("a1x").parent(a1));
        f.add(NewTask::new("b"));
        f.registry.remove(a1);
        assert_eq!(f.order(), vec![(1, 0), (4, 0)]);
        assert_eq!(f.registry.len(), 2);
    }

    #[test]
    fn children_after_removed_siblings_keep_their_place() {
        let mut f = Fixture::new();
        let a = f.add(NewTask::new("a"));
        let a1 = f.add(NewTask::new("a1").parent(a));
        let a2 = f.add(NewTask::new("a2").parent(a));
        let a3 = f.add(NewTask::new("a3").parent(a));
        f.add(NewTask::new("b"));
        f.registry.remove(a2);
        f.registry.remove(a3);
        f.add(NewTask::new("a4").parent(a));
        f.add(NewTask::new("a1x").parent(a1));
        assert_eq!(f.order(), vec![(1, 0), (2, 1), (7, 2), (6, 1), (5, 0)]);
    }

    #[test]
    fn removing_the_last_root_moves_the_tail() {
        let mut f = Fixture::new();
        f.add(NewTask::new("a"));
        let b = f.add(NewTask::new("b"));
        f.add(NewTask::new("b1").parent(b));
        f.registry.remove(b);
        f.add(NewTask::new("c"));
        assert_eq!(f.order(), vec![(1, 0), (4, 0)]);

        let mut f = Fixture::new();
        let only = f.add(NewTask::new("only"));
        f.registry.remove(only);
        assert!(f.order().is_empty());
        f.add(NewTask::new("again"));
        assert_eq!(f.order(), vec![(2, 0)]);
    }

    /// Depth-first listing computed from parent links alone.
    fn walk(
        live: &[(u64, Option<u64>)],
        parent: Option<u64>,
        depth: usize,
        out: &mut Vec<(u64, usize)>,
    ) {
        for &(id, p) in live {
            if p == parent {
                out.push((id, depth));
                walk(live, Some(id), depth + 1, out);
            }
        }
    }

    proptest::proptest! {
        #[test]
        fn linked_order_matches_a_fresh_walk(
            ops in proptest::collection::vec((proptest::bool::weighted(0.7), 0usize..64), 1..64),
        ) {
            let mut f = Fixture::new();
            let mut live: Vec<(u64, Option<u64>)> = Vec::new();
            for (add, pick) in ops {
                match (add, live.is_empty()) {
                    (true, _) | (false, true) => {
                        let parent = (pick % (live.len() + 1)).checked_sub(1).map(|i| live[i].0);
                        let mut task = NewTask::new("t");
                        if let Some(p) = parent {
                            task = task.parent(TaskId::new(p));
                        }
                        let id = f.add(task);
                        live.push((id.get(), parent));
                    }
                    (false, false) => {
                        let root = live[pick % live.len()].0;
                        f.registry.remove(TaskId::new(root));
                        let mut gone = vec![root];
                        while let Some(i) = live.iter().position(|(id, p)| {
                            gone.contains(id) || p.is_some_and(|p| gone.contains(&p))
                        }) {
                            let (id, _) = live.remove(i);
                            if !gone.contains(&id) {
                                gone.push(id);
                            }
                        }
                    }
                }
                let mut expected = Vec::new();
                walk(&live, None, 0, &mut expected);
                proptest::prop_assert_eq!(f.order(), expected);
                proptest::prop_assert_eq!(f.registry.len(), live.len());
            }
        }
    }

    #[test]
    fn retotal_switches_kinds() {
        let mut units = TaskUnits::from_total(Some(10));
        units.advance(4);
        units.retotal(3, None);
        assert_eq!(units, TaskUnits::Determinate { completed: 3, total: 3 });
        units.retotal(0, None);
        assert_eq!(units, TaskUnits::Indeterminate { spinner_frame: 0 });
        units.advance(2);
        units.retotal(8, Some(5));
        assert_eq!(units, TaskUnits::Determinate { completed: 5, total: 8 });
    }

    #[test]
    fn completed_only_ignored_for_spinners() {
        let mut units = TaskUnits::from_total(None);
        units.set_completed(7);
        assert_eq!(units, TaskUnits::Indeterminate { spinner_frame: 0 });
    }

    #[test]
    fn finishing_twice_keeps_first_outcome() {
        let mut f = Fixture::new();
        let id = f.add(NewTask::new("t").total(2));
        assert!(f.registry.finish(id, TaskStatus::Failed, f.now));
        assert!(!f.registry.finish(id, TaskStatus::Done, f.now));
        let task = &f.registry.get(id).unwrap().snapshot;
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.units, TaskUnits::Determinate { completed: 0, total: 2 });
    }

    #[test]
    fn eta_scales_elapsed_by_remaining() {
        let mut f = Fixture::new();
        let id = f.add(NewTask::new("t").total(4));
        f.registry.advance(id, 1);
        let task = &f.registry.get(id).unwrap().snapshot;
        let later = f.now + Duration::from_secs(10);
        assert_eq!(task.eta(later), Some(Duration::from_secs(30)));
        assert_eq!(task.eta(f.now + Duration::ZERO).map(|d| d.is_zero()), Some(true));
    }

    #[test]
    fn no_eta_without_progress() {
        let mut f = Fixture::new();
        let id = f.add(NewTask::new("t").total(4));
        let task = &f.registry.get(id).unwrap().snapshot;
        assert_eq!(task.eta(f.now + Duration::from_secs(5)), None);
    }

    proptest::proptest! {
        #[test]
        fn advances_never_exceed_total(
            total in 1u64..1_000,
            steps in proptest::collection::vec(0u64..u64::MAX, 0..32),
        ) {
            let mut units = TaskUnits::from_total(Some(total));
            for step in steps {
                units.advance(step);
                let TaskUnits::Determinate { completed, total: t } = units else {
                    unreachable!("determinate units stay determinate");
                };
                proptest::prop_assert!(completed <= t);
            }
        }
    }
}
