use crate::color::Role;
use crate::config::BarChars;
use crate::text::Span;

/// A progress bar that draws itself at whatever width the layout grants.
///
/// ```rust,ignore
/// let bar = ProgressBar::new(45, 100, '█', '░');
/// // render(20) => █████████░░░░░░░░░░░
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBar {
    done: u64,
    total: u64,
    filled: char,
    empty: char,
}

impl ProgressBar {
    pub fn new(done: u64, total: u64, filled: char, empty: char) -> Self {
        Self {
            done,
            total,
            filled,
            empty,
        }
    }

    pub fn with_chars(done: u64, total: u64, chars: &BarChars) -> Self {
        Self::new(done, total, chars.filled, chars.empty)
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// Filled and empty spans together exactly `width` columns wide.
    pub fn render(&self, width: usize) -> Vec<Span> {
        let filled = match self.done >= self.total && self.total > 0 {
            true => width,
            false => ((self.ratio() * width as f64) as usize).min(width),
        };
        let mut spans = Vec::with_capacity(2);
        if filled > 0 {
            spans.push(Span::new(
                std::iter::repeat_n(self.filled, filled).collect::<String>(),
                Role::BarFilled,
            ));
        }
        if width > filled {
            spans.push(Span::new(
                std::iter::repeat_n(self.empty, width - filled).collect::<String>(),
                Role::BarEmpty,
            ));
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(spans: &[Span]) -> String {
        spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn fills_proportionally() {
        let bar = ProgressBar::new(45, 100, '#', '.');
        assert_eq!(text(&bar.render(20)), "#########...........");
    }

    #[test]
    fn complete_bar_is_full_at_any_width() {
        let bar = ProgressBar::new(3, 3, '#', '.');
        assert_eq!(text(&bar.render(7)), "#######");
    }

    #[test]
    fn zero_width_renders_nothing() {
        assert!(ProgressBar::new(1, 2, '#', '.').render(0).is_empty());
    }

    #[test]
    fn roles_split_filled_and_empty() {
        let spans = ProgressBar::new(1, 2, '#', '.').render(4);
        let roles: Vec<_> = spans.iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![Role::BarFilled, Role::BarEmpty]);
    }
}
