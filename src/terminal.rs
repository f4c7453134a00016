//! Terminal I/O behind a trait, so the render loop can draw to stderr or to
//! memory.

use std::collections::VecDeque;
use std::io::{self, BufWriter, Stderr, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::Command;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::tty::IsTty;
use parking_lot::Mutex;

/// Byte produced by Ctrl-C in raw mode.
pub const CTRL_C: u8 = 0x03;

/// Where frames are drawn.
pub trait Terminal: Send + 'static {
    /// Whether cursor control is available. Decides between full repaints
    /// and append-only output.
    fn is_interactive(&self) -> bool;

    fn rows(&self) -> Option<usize>;

    fn columns(&self) -> Option<usize>;

    fn write_str(&mut self, s: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    fn raw_mode(&self) -> bool;

    fn set_raw_mode(&mut self, enabled: bool) -> io::Result<()>;

    /// Source of raw input bytes while raw mode is on.
    fn input(&mut self) -> Option<Box<dyn InputSource>> {
        None
    }
}

/// Blocking byte source read by the input watcher thread.
pub trait InputSource: Send + 'static {
    /// Waits up to `timeout` for the next byte.
    fn poll_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;
}

/// Renders a crossterm command to its escape sequence.
pub(crate) fn ansi(command: impl Command) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = command.write_ansi(&mut out);
    out
}

/// The process's stderr, measured and switched into raw mode with crossterm.
pub struct StderrTerminal {
    out: BufWriter<Stderr>,
    tty: bool,
}

impl StderrTerminal {
    pub fn new() -> Self {
        let err = io::stderr();
        Self {
            tty: err.is_tty(),
            out: BufWriter::new(err),
        }
    }
}

impl Default for StderrTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StderrTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StderrTerminal").field("tty", &self.tty).finish()
    }
}

impl Terminal for StderrTerminal {
    fn is_interactive(&self) -> bool {
        self.tty
    }

    fn rows(&self) -> Option<usize> {
        self.tty
            .then(crossterm::terminal::size)
            .and_then(Result::ok)
            .map(|(_, rows)| usize::from(rows))
            .filter(|&r| r > 0)
    }

    fn columns(&self) -> Option<usize> {
        self.tty
            .then(crossterm::terminal::size)
            .and_then(Result::ok)
            .map(|(cols, _)| usize::from(cols))
            .filter(|&c| c > 0)
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn raw_mode(&self) -> bool {
        crossterm::terminal::is_raw_mode_enabled().unwrap_or(false)
    }

    fn set_raw_mode(&mut self, enabled: bool) -> io::Result<()> {
        match enabled {
            true => crossterm::terminal::enable_raw_mode(),
            false => crossterm::terminal::disable_raw_mode(),
        }
    }

    fn input(&mut self) -> Option<Box<dyn InputSource>> {
        Some(Box::new(KeyInput))
    }
}

/// Key events from crossterm, reduced to the bytes a raw terminal would send.
struct KeyInput;

impl InputSource for KeyInput {
    fn poll_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        let byte = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(CTRL_C),
            KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
            KeyCode::Enter => Some(b'\r'),
            _ => None,
        };
        Ok(byte)
    }
}

/// An in-memory terminal. Clones share the same buffer and settings.
///
/// ```rust,ignore
/// let term = MemoryTerminal::interactive(80, 24);
/// let tally = Tally::new(RendererConfig::default())?.terminal(term.clone());
/// tally.run(|ctx| async move { /* ... */ }).await;
/// assert!(term.output().ends_with("\x1b[?25h"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTerminal {
    shared: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    output: String,
    interactive: bool,
    rows: Option<usize>,
    columns: Option<usize>,
    raw: bool,
    raw_changes: Vec<bool>,
    input: VecDeque<u8>,
    writes_left: Option<usize>,
}

impl MemoryTerminal {
    /// A non-interactive terminal of unknown size.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interactive(columns: usize, rows: usize) -> Self {
        let term = Self::default();
        {
            let mut state = term.shared.lock();
            state.interactive = true;
            state.columns = Some(columns);
            state.rows = Some(rows);
        }
        term
    }

    pub fn with_columns(self, columns: usize) -> Self {
        self.shared.lock().columns = Some(columns);
        self
    }

    /// Starts in raw mode, as if something else had enabled it.
    pub fn with_raw_mode(self, raw: bool) -> Self {
        self.shared.lock().raw = raw;
        self
    }

    /// Accepts `count` more writes, then fails every write after that.
    pub fn fail_after(self, count: usize) -> Self {
        self.shared.lock().writes_left = Some(count);
        self
    }

    /// Everything written so far.
    pub fn output(&self) -> String {
        self.shared.lock().output.clone()
    }

    /// Takes everything written so far.
    pub fn take_output(&self) -> String {
        std::mem::take(&mut self.shared.lock().output)
    }

    /// Every raw-mode switch, in order.
    pub fn raw_mode_changes(&self) -> Vec<bool> {
        self.shared.lock().raw_changes.clone()
    }

    /// Queues bytes for the input watcher.
    pub fn send_input(&self, bytes: &[u8]) {
        self.shared.lock().input.extend(bytes);
    }
}

impl Terminal for MemoryTerminal {
    fn is_interactive(&self) -> bool {
        self.shared.lock().interactive
    }

    fn rows(&self) -> Option<usize> {
        self.shared.lock().rows
    }

    fn columns(&self) -> Option<usize> {
        self.shared.lock().columns
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let mut state = self.shared.lock();
        if let Some(left) = state.writes_left.as_mut() {
            if *left == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"));
            }
            *left -= 1;
        }
        state.output.push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn raw_mode(&self) -> bool {
        self.shared.lock().raw
    }

    fn set_raw_mode(&mut self, enabled: bool) -> io::Result<()> {
        let mut state = self.shared.lock();
        state.raw = enabled;
        state.raw_changes.push(enabled);
        Ok(())
    }

    fn input(&mut self) -> Option<Box<dyn InputSource>> {
        Some(Box::new(MemoryInput {
            shared: self.shared.clone(),
        }))
    }
}

struct MemoryInput {
    shared: Arc<Mutex<MemoryState>>,
}

impl InputSource for MemoryInput {
    fn poll_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        if let Some(byte) = self.shared.lock().input.pop_front() {
            return Ok(Some(byte));
        }
        std::thread::sleep(timeout.min(Duration::from_millis(5)));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::cursor::{Hide, MoveUp, Show};
    use crossterm::terminal::{Clear, ClearType};

    #[test]
    fn commands_render_to_escape_sequences() {
        assert_eq!(ansi(Hide), "\x1b[?25l");
        assert_eq!(ansi(Show), "\x1b[?25h");
        assert_eq!(ansi(MoveUp(2)), "\x1b[2A");
        assert_eq!(ansi(Clear(ClearType::CurrentLine)), "\x1b[2K");
    }

    #[test]
    fn memory_terminal_fails_after_budget() {
        let mut term = MemoryTerminal::new().fail_after(1);
        term.write_str("a").unwrap();
        assert!(term.write_str("b").is_err());
        assert_eq!(term.output(), "a");
    }

    #[test]
    fn memory_input_drains_queue() {
        let mut term = MemoryTerminal::interactive(80, 24);
        term.send_input(&[b'x', CTRL_C]);
        let mut input = term.input().unwrap();
        assert_eq!(input.poll_byte(Duration::ZERO).unwrap(), Some(b'x'));
        assert_eq!(input.poll_byte(Duration::ZERO).unwrap(), Some(CTRL_C));
        assert_eq!(input.poll_byte(Duration::ZERO).unwrap(), None);
    }
}
