use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::cursor::Hide;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::color::Theme;
use crate::config::{BarStyle, RendererConfig};
use crate::context::TaskContext;
use crate::error::{ConfigError, Error};
use crate::frame::{self, FrameOptions};
use crate::store::{StoreBuilder, TaskStore};
use crate::terminal::{CTRL_C, InputSource, StderrTerminal, Terminal, ansi};
use crate::writer::{Frame, NonTtyWriter, TtyWriter, Writer};

/// How long the input watcher blocks before checking whether to stop.
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Called from the input watcher thread when Ctrl-C arrives in raw mode.
pub type InterruptHook = Arc<dyn Fn() + Send + Sync>;

/// Where the render loop stands with the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Cursor hidden, raw input possibly captured.
    ActiveTty,
    ActiveNonTty,
}

/// Draws the store on a fixed cadence and owns the terminal session.
///
/// The loop polls the store's dirty flag every `interval` and draws when
/// something changed, a spinner is running or log lines are queued. When
/// the cancellation token fires it draws one last settled frame and
/// restores the terminal. Dropping the loop mid-flight restores the
/// terminal as well.
///
/// ```rust,ignore
/// let store = TaskStore::new();
/// let cancel = CancellationToken::new();
/// let handle = tokio::spawn(
///     RenderLoop::new(store.clone(), RendererConfig::default(), StderrTerminal::new())
///         .run(cancel.clone()),
/// );
/// // ... mutate the store ...
/// cancel.cancel();
/// handle.await??;
/// ```
pub struct RenderLoop {
    store: TaskStore,
    config: RendererConfig,
    terminal: Box<dyn Terminal>,
    on_interrupt: InterruptHook,
    state: SessionState,
    writer: Option<Writer>,
    raw_before: Option<bool>,
    watcher: Option<InputWatcher>,
    tick: u64,
    torn_down: bool,
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl RenderLoop {
    pub fn new(store: TaskStore, config: RendererConfig, terminal: impl Terminal) -> Self {
        Self::boxed(store, config, Box::new(terminal))
    }

    fn boxed(store: TaskStore, config: RendererConfig, terminal: Box<dyn Terminal>) -> Self {
        Self {
            store,
            config,
            terminal,
            on_interrupt: Arc::new(interrupt_self),
            state: SessionState::Idle,
            writer: None,
            raw_before: None,
            watcher: None,
            tick: 0,
            torn_down: false,
        }
    }

    /// Replaces the default Ctrl-C action (SIGINT to this process).
    pub fn on_interrupt(mut self, hook: InterruptHook) -> Self {
        self.on_interrupt = hook;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs until `cancel` fires, then tears the session down.
    ///
    /// A failed write stops drawing at once; teardown still restores the
    /// cursor and raw mode, and the write error is returned.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), Error> {
        let mut result = self.enter();
        if result.is_ok() {
            result = self.tick_until(&cancel).await;
        }
        if let Err(e) = &result {
            tracing::warn!(error = %e, "terminal write failed, stopping render loop");
        }
        let teardown = self.teardown(result.is_ok());
        result.and(teardown).map_err(Error::from)
    }

    async fn tick_until(&mut self, cancel: &CancellationToken) -> io::Result<()> {
        loop {
            let dirty = self.store.take_dirty();
            if dirty || self.store.has_running_spinner() || self.store.has_pending_logs() {
                self.draw(false)?;
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    fn enter(&mut self) -> io::Result<()> {
        let interactive = self.terminal.is_interactive();
        let colors = self.config.color.enabled(interactive);
        if !interactive {
            self.state = SessionState::ActiveNonTty;
            self.writer = Some(Writer::Plain(NonTtyWriter::new(self.config.step)));
            tracing::debug!(tty = false, "render session started");
            return Ok(());
        }

        self.state = SessionState::ActiveTty;
        self.terminal.write_str(&ansi(Hide))?;
        self.terminal.flush()?;
        let raw = self.config.raw_input && self.capture_input()?;
        self.writer = Some(Writer::Tty(
            TtyWriter::new(self.config.log_history, colors).raw_newlines(raw),
        ));
        tracing::debug!(tty = true, raw, "render session started");
        Ok(())
    }

    /// Switches to raw mode and starts the watcher. Returns whether raw mode
    /// is now on.
    fn capture_input(&mut self) -> io::Result<bool> {
        self.raw_before = Some(self.terminal.raw_mode());
        self.terminal.set_raw_mode(true)?;
        if let Some(input) = self.terminal.input() {
            self.watcher = Some(InputWatcher::spawn(input, self.on_interrupt.clone())?);
        }
        Ok(true)
    }

    fn draw(&mut self, settled: bool) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let interactive = self.state == SessionState::ActiveTty;
        let snapshot = self.store.snapshot();
        let opts = FrameOptions {
            now: snapshot.taken_at,
            layout: self.config.layout,
            tick: if settled { 0 } else { self.tick },
            target: self.config.target_width(self.terminal.columns()),
            colors: self.config.color.enabled(interactive),
        };
        let lines = frame::render(&snapshot.entries, opts);
        tracing::trace!(lines = lines.len(), logs = snapshot.logs.len(), settled, "frame");
        let frame = Frame {
            logs: &snapshot.logs,
            entries: &snapshot.entries,
            lines: &lines,
        };
        writer.write(self.terminal.as_mut(), &frame)?;
        self.tick = self.tick.wrapping_add(1);
        Ok(())
    }

    /// Runs once: the final frame (unless drawing already failed), then
    /// cursor, raw mode and watcher restoration. Every step is attempted
    /// even if an earlier one failed; the first error is returned.
    fn teardown(&mut self, draw_final: bool) -> io::Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let mut result = Ok(());
        if draw_final && self.state != SessionState::Idle {
            result = self.draw(true);
        }
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(writer) = self.writer.as_mut() {
            result = result.and(writer.finish(self.terminal.as_mut()));
        }
        if let Some(previous) = self.raw_before.take() {
            result = result.and(self.terminal.set_raw_mode(previous));
        }
        self.writer = None;
        self.state = SessionState::Idle;
        tracing::debug!("render session ended");
        result
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let Err(e) = self.teardown(true) {
            tracing::warn!(error = %e, "terminal teardown failed");
        }
    }
}

/// Reads raw input on a dedicated thread until stopped.
struct InputWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputWatcher {
    fn spawn(mut input: Box<dyn InputSource>, on_interrupt: InterruptHook) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();
        let handle = std::thread::Builder::new()
            .name("task-tally-input".into())
            .spawn(move || {
                while !stopped.load(Ordering::Acquire) {
                    match input.poll_byte(INPUT_POLL) {
                        Ok(Some(CTRL_C)) => on_interrupt(),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!(error = %e, "input watcher stopped");
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("input watcher panicked");
        }
    }
}

/// Sends SIGINT to the current process.
fn interrupt_self() {
    #[cfg(unix)]
    // SAFETY: kill(2) with our own pid and a valid signal number has no
    // memory-safety preconditions.
    unsafe {
        libc::kill(libc::getpid(), libc::SIGINT);
    }
    #[cfg(not(unix))]
    std::process::exit(130);
}

/// Tracked-run entry point: owns the store, the render loop and the
/// terminal for the duration of one piece of work.
///
/// ```rust,ignore
/// let tally = Tally::new(RendererConfig::default().raw_input(true))?;
/// let report = tally
///     .run(|ctx| async move {
///         ctx.run(NewTask::new("index").total(3), |ctx| async move {
///             for _ in 0..3 {
///                 ctx.advance();
///             }
///             Ok::<_, std::io::Error>(())
///         })
///         .await
///     })
///     .await?;
/// ```
pub struct Tally {
    config: RendererConfig,
    terminal: Box<dyn Terminal>,
    builder: StoreBuilder,
    store: Option<TaskStore>,
    on_interrupt: Option<InterruptHook>,
}

impl std::fmt::Debug for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tally")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Tally {
    /// Validates `config` and draws to stderr by default.
    pub fn new(config: RendererConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config: config.validate()?,
            terminal: Box::new(StderrTerminal::new()),
            builder: TaskStore::builder(),
            store: None,
            on_interrupt: None,
        })
    }

    pub fn terminal(mut self, terminal: impl Terminal) -> Self {
        self.terminal = Box::new(terminal);
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.builder = self.builder.clock(clock);
        self
    }

    pub fn theme(mut self, theme: Arc<dyn Theme>) -> Self {
        self.builder = self.builder.theme(theme);
        self
    }

    /// Style of root tasks. Checked when the run starts.
    pub fn style(mut self, style: BarStyle) -> Self {
        self.builder = self.builder.style(style);
        self
    }

    /// Draws an existing store instead of creating one, for instance a store
    /// already fed by a `tracing` layer. Clock, theme and style settings are
    /// then ignored.
    pub fn store(mut self, store: TaskStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_interrupt(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_interrupt = Some(Arc::new(hook));
        self
    }

    /// Runs `work` with a root [`TaskContext`] while the render loop draws.
    ///
    /// The loop is torn down exactly once: after `work` finishes, or when
    /// the returned future is dropped. The context's cancellation token is
    /// cancelled at the same point.
    pub async fn run<F, Fut, T>(self, work: F) -> Result<T, Error>
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let store = match self.store {
            Some(store) => store,
            None => self.builder.build()?,
        };

        let mut render = RenderLoop::boxed(store.clone(), self.config, self.terminal);
        if let Some(hook) = self.on_interrupt {
            render = render.on_interrupt(hook);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(render.run(cancel.clone()));
        let guard = cancel.clone().drop_guard();

        let output = work(TaskContext::with_cancel(store, cancel.child_token())).await;

        drop(guard);
        match handle.await {
            // A write failure was already logged by the loop; the work's
            // output still stands.
            Ok(_) => {}
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => tracing::warn!(error = %e, "render loop did not finish"),
        }
        Ok(output)
    }
}
