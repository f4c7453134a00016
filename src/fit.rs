//! Shrink/Fit stage: resolves a row's column widths and cuts every cell to
//! exactly its width.

use crate::color::Role;
use crate::frame::{Cell, Content};
use crate::layout::{self, CellSpec, Wrap};
use crate::text::{Span, fit_spans};

/// A row after fitting: role-tagged spans whose widths add up to the
/// resolved row width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedLine {
    pub depth: usize,
    pub spans: Vec<Span>,
}

impl FittedLine {
    pub fn width(&self) -> usize {
        self.spans.iter().map(Span::width).sum()
    }

    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Fits `cells` to `target` columns, `gap` columns apart.
///
/// When even the cell minimums exceed the target the row is hard-clipped, so
/// a fitted line never runs past the target.
pub fn fit_line(depth: usize, cells: &[Cell], target: Option<usize>, gap: usize) -> FittedLine {
    let specs: Vec<CellSpec> = cells.iter().map(|c| c.spec.clone()).collect();
    let widths = layout::resolve(&specs, target, gap);

    let mut spans = Vec::new();
    let mut first = true;
    for (cell, &width) in cells.iter().zip(&widths) {
        if width == 0 {
            continue;
        }
        if !first && gap > 0 {
            spans.push(Span::new(" ".repeat(gap), Role::Gap));
        }
        first = false;
        match &cell.content {
            Content::Text(text) => spans.extend(fit_spans(text, width, cell.spec.wrap)),
            Content::Bar(bar) => spans.extend(bar.render(width)),
        }
    }

    if let Some(target) = target {
        let width: usize = spans.iter().map(Span::width).sum();
        if width > target {
            spans = fit_spans(&spans, target, Wrap::Truncate);
        }
    }
    FittedLine { depth, spans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Track;
    use crate::widgets::ProgressBar;
    use pretty_assertions::assert_eq;

    fn text(s: &str, role: Role) -> Content {
        Content::Text(vec![Span::new(s, role)])
    }

    fn row() -> Vec<Cell> {
        vec![
            Cell::new(CellSpec::auto(3).priority(1), text("├──", Role::Connector)),
            Cell::new(
                CellSpec::auto(8).min(1).wrap(Wrap::Ellipsis).priority(4),
                text("download", Role::Description),
            ),
            Cell::new(
                CellSpec::auto(10).min(2).max(10).track(Track::Fraction(1)).priority(5).adaptive(),
                Content::Bar(ProgressBar::new(1, 2, '#', '.')),
            ),
            Cell::new(CellSpec::auto(3).priority(2), text("1/2", Role::Units)),
        ]
    }

    #[test]
    fn unconstrained_row_keeps_content_width() {
        let line = fit_line(1, &row(), None, 1);
        assert_eq!(line.plain(), "├── download #####..... 1/2");
    }

    #[test]
    fn constrained_row_is_exactly_target_wide() {
        for target in 4..=27 {
            let line = fit_line(1, &row(), Some(target), 1);
            assert_eq!(line.width(), target, "target {target}: {:?}", line.plain());
        }
        // the bar stops growing at its max width
        assert_eq!(fit_line(1, &row(), Some(60), 1).width(), 27);
    }

    #[test]
    fn collapsed_cells_take_their_gap_along() {
        let line = fit_line(1, &row(), Some(11), 1);
        assert_eq!(line.plain(), "download #.");
        assert!(line.spans.iter().all(|s| s.role != Role::Connector));
    }

    #[test]
    fn description_gets_an_ellipsis_when_cut() {
        let line = fit_line(1, &row(), Some(8), 1);
        assert_eq!(line.plain(), "down… #.");
    }

    #[test]
    fn minimums_wider_than_target_are_clipped() {
        let line = fit_line(1, &row(), Some(2), 1);
        assert_eq!(line.width(), 2);
    }
}
