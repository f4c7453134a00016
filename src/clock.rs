use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Time source for task timestamps, elapsed time and ETA.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// ```
/// # use std::time::Duration;
/// # use task_tally::{ManualClock, NewTask, TaskStore};
/// let clock = ManualClock::new();
/// let store = TaskStore::builder().clock(clock.clone()).build()?;
/// let id = store.add_task(NewTask::new("upload"));
/// clock.advance(Duration::from_secs(3));
/// let task = store.get_task(id).unwrap();
/// assert_eq!(task.elapsed(store.now()), Duration::from_secs(3));
/// # Ok::<(), task_tally::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Formats a duration as `m:ss`, or `h:mm:ss` past the hour.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match h {
        0 => format!("{m}:{s:02}"),
        _ => format!("{h}:{m:02}:{s:02}"),
    }
}
