//! Output strategies: full repaints on an interactive terminal, signature
//! diffed appends everywhere else.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;

use crossterm::cursor::{MoveUp, Show};
use crossterm::terminal::{Clear, ClearType};

use crate::color::{DefaultTheme, Role, Theme, Transform};
use crate::frame::FrameLine;
use crate::layout::Wrap;
use crate::store::FrameEntry;
use crate::task::{TaskId, TaskStatus, TaskUnits};
use crate::terminal::{Terminal, ansi};
use crate::text::{fit, visible_width};

/// Everything one write needs.
pub struct Frame<'a> {
    /// Log lines queued since the previous frame.
    pub logs: &'a [String],
    pub entries: &'a [FrameEntry],
    pub lines: &'a [FrameLine],
}

pub(crate) enum Writer {
    Tty(TtyWriter),
    Plain(NonTtyWriter),
}

impl Writer {
    pub(crate) fn write(&mut self, term: &mut dyn Terminal, frame: &Frame<'_>) -> io::Result<()> {
        match self {
            Writer::Tty(w) => w.write(term, frame),
            Writer::Plain(w) => w.write(term, frame),
        }
    }

    /// Leaves the terminal ready for whatever prints next.
    pub(crate) fn finish(&mut self, term: &mut dyn Terminal) -> io::Result<()> {
        match self {
            Writer::Tty(w) => w.finish(term),
            Writer::Plain(_) => Ok(()),
        }
    }
}

/// Repaints the whole frame in place, clearing exactly the lines it drew
/// last time.
pub struct TtyWriter {
    drawn: usize,
    log_history: usize,
    history: VecDeque<String>,
    newline: &'static str,
    hidden_style: Option<Transform>,
}

impl TtyWriter {
    /// `log_history` of zero prints log lines once above the frame; any other
    /// value keeps that many recent lines and repaints them on top.
    pub fn new(log_history: usize, colors: bool) -> Self {
        Self {
            drawn: 0,
            log_history,
            history: VecDeque::with_capacity(log_history),
            newline: "\n",
            hidden_style: colors.then(|| DefaultTheme.transform(Role::Hidden, 0)).flatten(),
        }
    }

    /// Line separator to use while the terminal is in raw mode, where a bare
    /// `\n` does not return the carriage.
    pub fn raw_newlines(mut self, raw: bool) -> Self {
        self.newline = if raw { "\r\n" } else { "\n" };
        self
    }

    fn clear(&self, out: &mut String) {
        if self.drawn == 0 {
            return;
        }
        let erase = ansi(Clear(ClearType::CurrentLine));
        out.push_str(&erase);
        for _ in 1..self.drawn {
            out.push_str(&ansi(MoveUp(1)));
            out.push_str(&erase);
        }
        out.push('\r');
    }

    pub fn write(&mut self, term: &mut dyn Terminal, frame: &Frame<'_>) -> io::Result<()> {
        let mut out = String::new();
        self.clear(&mut out);

        let marker: String;
        let history: Vec<String>;
        let mut lines: Vec<&str> = Vec::new();
        if self.log_history == 0 {
            for log in frame.logs {
                out.push_str(log);
                out.push_str(self.newline);
            }
        } else {
            for log in frame.logs {
                if self.history.len() == self.log_history {
                    self.history.pop_front();
                }
                self.history.push_back(log.clone());
            }
            // Retained lines must stay one row each or the next clear misses them.
            let columns = term.columns();
            history = self
                .history
                .iter()
                .map(|line| match columns {
                    Some(cols) if visible_width(line) > cols => fit(line, cols, Wrap::Truncate),
                    _ => line.clone(),
                })
                .collect();
            lines.extend(history.iter().map(String::as_str));
        }
        lines.extend(frame.lines.iter().map(|l| l.text.as_str()));

        if let Some(rows) = term.rows()
            && lines.len() > rows
        {
            let keep = rows.saturating_sub(1);
            let hidden = lines.len() - keep;
            let text = format!("{hidden} lines hidden");
            marker = match self.hidden_style {
                Some(style) => style(&text),
                None => text,
            };
            let tail = lines.split_off(lines.len() - keep);
            lines = std::iter::once(marker.as_str()).chain(tail).collect();
        }

        let body = lines.join(self.newline);
        self.drawn = match lines.is_empty() {
            true => 0,
            false => body.matches('\n').count() + 1,
        };
        out.push_str(&body);
        term.write_str(&out)?;
        term.flush()
    }

    pub fn finish(&mut self, term: &mut dyn Terminal) -> io::Result<()> {
        let mut out = String::new();
        if self.drawn > 0 {
            out.push_str(self.newline);
        }
        out.push_str(&ansi(Show));
        self.drawn = 0;
        term.write_str(&out)?;
        term.flush()
    }
}

/// What a task line looked like when it was last printed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Signature {
    Determinate {
        status: TaskStatus,
        description: String,
        total: u64,
        bucket: u64,
    },
    Indeterminate {
        status: TaskStatus,
        description: String,
    },
}

impl Signature {
    fn of(entry: &FrameEntry, step: u64) -> Self {
        let task = &entry.task;
        match task.units {
            TaskUnits::Determinate { completed, total } => Signature::Determinate {
                status: task.status,
                description: task.description.clone(),
                total,
                bucket: completed / step.max(1),
            },
            TaskUnits::Indeterminate { .. } => Signature::Indeterminate {
                status: task.status,
                description: task.description.clone(),
            },
        }
    }
}

/// Appends only: log lines once, task lines whenever their signature moves.
pub struct NonTtyWriter {
    step: u64,
    printed: HashMap<TaskId, Signature>,
}

impl NonTtyWriter {
    /// `step` coarse-grains determinate progress: a task is reprinted only
    /// when `completed / step` changes.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            printed: HashMap::new(),
        }
    }

    pub fn write(&mut self, term: &mut dyn Terminal, frame: &Frame<'_>) -> io::Result<()> {
        let mut out = String::new();
        for log in frame.logs {
            out.push_str(log);
            out.push('\n');
        }

        let mut present = HashSet::with_capacity(frame.entries.len());
        let mut changed = HashSet::new();
        for entry in frame.entries {
            let id = entry.task.id;
            present.insert(id);
            let signature = Signature::of(entry, self.step);
            if self.printed.get(&id) != Some(&signature) {
                self.printed.insert(id, signature);
                changed.insert(id);
            }
        }
        self.printed.retain(|id, _| present.contains(id));

        for line in frame.lines.iter().filter(|l| changed.contains(&l.task)) {
            out.push_str(line.text.trim_end());
            out.push('\n');
        }

        if out.is_empty() {
            return Ok(());
        }
        term.write_str(&out)?;
        term.flush()
    }
}
