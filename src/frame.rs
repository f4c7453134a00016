//! Build stage: turns the store's depth-first entries into logical rows of
//! cells, and the full Build → Fit → Color pipeline on top of it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::format_duration;
use crate::color::{PlainTheme, Role, Theme, paint};
use crate::config::{BarLayout, BarStyle};
use crate::fit::{FittedLine, fit_line};
use crate::layout::{CellSpec, Track, Wrap};
use crate::store::FrameEntry;
use crate::task::{TaskId, TaskSnapshot, TaskStatus, TaskUnits};
use crate::text::{Span, single_line};
use crate::tree::{TreeNode, topology};
use crate::widgets::{ProgressBar, TreeIndent};

/// Columns between two visible cells.
pub const GAP: usize = 1;

/// What a cell draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(Vec<Span>),
    /// Drawn at whatever width the layout grants.
    Bar(ProgressBar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub spec: CellSpec,
    pub content: Content,
}

impl Cell {
    pub fn new(spec: CellSpec, content: Content) -> Self {
        Self { spec, content }
    }

    /// A single-span text cell sized to its content.
    fn text(mut spec: CellSpec, text: impl Into<String>, role: Role) -> Self {
        let span = Span::new(text, role);
        spec.intrinsic = span.width();
        Self::new(spec, Content::Text(vec![span]))
    }
}

/// The four ways a task is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Connector, description, bar, `completed/total`, ETA or elapsed.
    Bar,
    /// Connector and description, then a continuation line holding the bar,
    /// units and ETA or elapsed.
    TwoLineBar,
    /// Connector, spinner glyph, description, elapsed.
    Spinner,
    /// Connector, description, `done`/`failed` marker, elapsed.
    Finished,
}

impl RowShape {
    pub fn of(task: &TaskSnapshot, layout: BarLayout) -> Self {
        match (task.units, task.status) {
            (_, TaskStatus::Failed) => RowShape::Finished,
            (TaskUnits::Determinate { .. }, _) => match layout {
                BarLayout::SingleLine => RowShape::Bar,
                BarLayout::TwoLine => RowShape::TwoLineBar,
            },
            (TaskUnits::Indeterminate { .. }, TaskStatus::Running) => RowShape::Spinner,
            (TaskUnits::Indeterminate { .. }, TaskStatus::Done) => RowShape::Finished,
        }
    }
}

/// One terminal line before fitting.
#[derive(Clone)]
pub struct Row {
    pub task: TaskId,
    pub depth: usize,
    pub theme: Arc<dyn Theme>,
    pub cells: Vec<Cell>,
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("task", &self.task)
            .field("depth", &self.depth)
            .field("cells", &self.cells)
            .finish_non_exhaustive()
    }
}

/// A materialized line, tagged with the task it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLine {
    pub task: TaskId,
    pub text: String,
}

/// Inputs of one pass of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct FrameOptions {
    pub now: Instant,
    pub layout: BarLayout,
    /// Added to each spinner's own counter. Zero draws the settled frame.
    pub tick: u64,
    pub target: Option<usize>,
    pub colors: bool,
}

/// Builds the rows of every entry, in order.
pub fn build(entries: &[FrameEntry], now: Instant, layout: BarLayout, tick: u64) -> Vec<Row> {
    let depths: Vec<usize> = entries.iter().map(|e| e.depth).collect();
    let nodes = topology(&depths);
    let mut rows = Vec::with_capacity(entries.len());
    for (entry, node) in entries.iter().zip(&nodes) {
        let shape = RowShape::of(&entry.task, layout);
        let row = |cells| Row {
            task: entry.task.id,
            depth: entry.depth,
            theme: entry.theme.clone(),
            cells,
        };
        match shape {
            RowShape::TwoLineBar => {
                let (first, second) = two_line_cells(&entry.task, node, now);
                rows.push(row(first));
                rows.push(row(second));
            }
            _ => rows.push(row(cells(shape, &entry.task, node, now, tick))),
        }
    }
    rows
}

/// Runs Build → Fit → Color over `entries`.
pub fn render(entries: &[FrameEntry], opts: FrameOptions) -> Vec<FrameLine> {
    build(entries, opts.now, opts.layout, opts.tick)
        .into_iter()
        .map(|row| {
            let fitted: FittedLine = fit_line(row.depth, &row.cells, opts.target, GAP);
            let text = match opts.colors {
                true => paint(&fitted, row.theme.as_ref()),
                false => paint(&fitted, &PlainTheme),
            };
            FrameLine { task: row.task, text }
        })
        .collect()
}

fn cells(shape: RowShape, task: &TaskSnapshot, node: &TreeNode, now: Instant, tick: u64) -> Vec<Cell> {
    let style = &task.style;
    let mut cells = vec![connector(TreeIndent::of(node).as_str())];
    match shape {
        RowShape::Bar | RowShape::TwoLineBar => {
            cells.push(description(&task.description));
            cells.extend(bar_cells(task, style, now));
        }
        RowShape::Spinner => {
            let counter = match task.units {
                TaskUnits::Indeterminate { spinner_frame } => spinner_frame.wrapping_add(tick),
                TaskUnits::Determinate { .. } => tick,
            };
            let glyph = style.spinner.frame(counter);
            cells.push(Cell::text(CellSpec::auto(0).min(1).priority(6), glyph, Role::Spinner));
            cells.push(description(&task.description));
            cells.push(elapsed(task.elapsed(now)));
        }
        RowShape::Finished => {
            let (marker, role) = match task.status {
                TaskStatus::Failed => (style.markers.failed.as_str(), Role::Failed),
                _ => (style.markers.done.as_str(), Role::Done),
            };
            cells.push(description(&task.description));
            cells.push(Cell::text(CellSpec::auto(0).priority(3), marker, role));
            cells.push(elapsed(task.elapsed(now)));
        }
    }
    cells
}

fn two_line_cells(task: &TaskSnapshot, node: &TreeNode, now: Instant) -> (Vec<Cell>, Vec<Cell>) {
    let first = vec![connector(TreeIndent::of(node).as_str()), description(&task.description)];
    let mut second = vec![connector(TreeIndent::continuation(node).as_str())];
    second.extend(bar_cells(task, &task.style, now));
    (first, second)
}

fn bar_cells(task: &TaskSnapshot, style: &BarStyle, now: Instant) -> Vec<Cell> {
    let (completed, total) = match task.units {
        TaskUnits::Determinate { completed, total } => (completed, total),
        TaskUnits::Indeterminate { .. } => (0, 0),
    };
    let chars = &style.bar;
    let bar = CellSpec::auto(chars.width)
        .min(chars.min_width.min(chars.width))
        .max(chars.width)
        .track(Track::Fraction(1))
        .priority(5)
        .adaptive();
    let timing = match task.is_running() {
        true => eta(task.eta(now), &style.eta_placeholder),
        false => elapsed(task.elapsed(now)),
    };
    vec![
        Cell::new(bar, Content::Bar(ProgressBar::with_chars(completed, total, chars))),
        Cell::text(CellSpec::auto(0).priority(2), format!("{completed}/{total}"), Role::Units),
        timing,
    ]
}

fn connector(prefix: &str) -> Cell {
    Cell::text(CellSpec::auto(0).priority(1), prefix, Role::Connector)
}

fn description(text: &str) -> Cell {
    Cell::text(
        CellSpec::auto(0).min(1).wrap(Wrap::Ellipsis).priority(4),
        single_line(text),
        Role::Description,
    )
}

fn eta(eta: Option<Duration>, placeholder: &str) -> Cell {
    let text = match eta {
        Some(d) => format!("eta {}", format_duration(d)),
        None => placeholder.to_string(),
    };
    Cell::text(CellSpec::auto(0).priority(0), text, Role::Eta)
}

fn elapsed(d: Duration) -> Cell {
    Cell::text(CellSpec::auto(0).priority(0), format_duration(d), Role::Elapsed)
}
