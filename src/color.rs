//! Final pipeline stage: turns fitted, role-tagged spans into strings.

use owo_colors::OwoColorize;

use crate::fit::FittedLine;

/// The part a piece of text plays in a rendered row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Connector,
    Spinner,
    Description,
    BarFilled,
    BarEmpty,
    Units,
    Eta,
    Elapsed,
    Done,
    Failed,
    /// Space between cells and padding with no other owner.
    Gap,
    /// The "N lines hidden" marker of a clipped frame.
    Hidden,
}

/// A text transform applied to one span.
pub type Transform = fn(&str) -> String;

/// Resolves how each role is painted at a given tree depth.
///
/// Themes are bound to a task when it is created and are inherited by its
/// children unless the child brings its own.
///
/// ```rust,ignore
/// struct Loud;
/// impl Theme for Loud {
///     fn transform(&self, role: Role, _depth: usize) -> Option<Transform> {
///         match role {
///             Role::Description => Some(|s| s.to_uppercase()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Theme: Send + Sync + 'static {
    fn transform(&self, role: Role, depth: usize) -> Option<Transform>;

    /// Used for every role [`Theme::transform`] leaves unstyled.
    fn fallback(&self) -> Transform {
        |s| s.to_owned()
    }
}

/// Leaves every span untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTheme;

impl Theme for PlainTheme {
    fn transform(&self, _role: Role, _depth: usize) -> Option<Transform> {
        None
    }
}

/// ANSI colors: cyan spinners, green bars and `done`, red `failed`, dimmed
/// tree lines and timings, bold top-level descriptions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTheme;

impl Theme for DefaultTheme {
    fn transform(&self, role: Role, depth: usize) -> Option<Transform> {
        let t: Transform = match role {
            Role::Spinner => |s| s.cyan().to_string(),
            Role::BarFilled => |s| s.green().to_string(),
            Role::BarEmpty | Role::Connector | Role::Hidden => |s| s.dimmed().to_string(),
            Role::Eta | Role::Elapsed => |s| s.dimmed().to_string(),
            Role::Units => |s| s.yellow().to_string(),
            Role::Done => |s| s.green().to_string(),
            Role::Failed => |s| s.red().bold().to_string(),
            Role::Description if depth == 0 => |s| s.bold().to_string(),
            Role::Description | Role::Gap => return None,
        };
        Some(t)
    }
}

/// Applies `theme` to every span of `line`, skipping whitespace-only spans.
pub fn paint(line: &FittedLine, theme: &dyn Theme) -> String {
    let fallback = theme.fallback();
    let mut out = String::new();
    for span in &line.spans {
        if span.text.trim().is_empty() {
            out.push_str(&span.text);
            continue;
        }
        let transform = theme.transform(span.role, line.depth).unwrap_or(fallback);
        out.push_str(&transform(&span.text));
    }
    out
}
