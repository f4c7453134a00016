//! Column width resolution for one row of cells.
//!
//! Cells start from their track's base width, Fraction cells share any
//! leftover space, and an overflowing row collapses in two passes: first the
//! truncatable text cells give way in priority order, then every cell above
//! its minimum shrinks proportionally. Cells are separated by a gap that
//! disappears along with any cell collapsed to zero width.

pub use crate::text::Wrap;

/// Sizing policy of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    /// Size to content.
    Auto,
    /// Always this wide (within min/max).
    Fixed(usize),
    /// Share of leftover space proportional to the weight.
    Fraction(u32),
}

/// Layout inputs of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSpec {
    pub intrinsic: usize,
    pub min: usize,
    pub max: Option<usize>,
    pub track: Track,
    pub wrap: Wrap,
    /// Lower values give up width first.
    pub priority: u8,
    /// Content drawn at whatever width is granted (a bar), rather than text
    /// that would be truncated.
    pub adaptive: bool,
}

impl CellSpec {
    pub fn auto(intrinsic: usize) -> Self {
        Self {
            intrinsic,
            min: 0,
            max: None,
            track: Track::Auto,
            wrap: Wrap::Truncate,
            priority: 0,
            adaptive: false,
        }
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn track(mut self, track: Track) -> Self {
        self.track = track;
        self
    }

    pub fn wrap(mut self, wrap: Wrap) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn adaptive(mut self) -> Self {
        self.adaptive = true;
        self
    }

    fn clamp(&self, w: usize) -> usize {
        let w = w.max(self.min);
        match self.max {
            Some(max) => w.min(max.max(self.min)),
            None => w,
        }
    }

    fn base_width(&self, constrained: bool) -> usize {
        match self.track {
            Track::Auto => self.clamp(self.intrinsic),
            Track::Fixed(w) => self.clamp(w),
            Track::Fraction(_) if constrained => self.min,
            Track::Fraction(_) => self.clamp(self.intrinsic),
        }
    }

    fn truncatable(&self) -> bool {
        !self.adaptive && !matches!(self.track, Track::Fixed(_))
    }

    fn weight(&self) -> Option<u32> {
        match self.track {
            Track::Fraction(w) if w > 0 => Some(w),
            _ => None,
        }
    }
}

/// Total columns used by `widths` with `gap` between visible cells.
pub fn row_width(widths: &[usize], gap: usize) -> usize {
    let visible = widths.iter().filter(|&&w| w > 0).count();
    widths.iter().sum::<usize>() + gap * visible.saturating_sub(1)
}

/// Resolves the width of every cell. Without a target, cells keep their
/// content width and nothing collapses.
pub fn resolve(cells: &[CellSpec], target: Option<usize>, gap: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = cells.iter().map(|c| c.base_width(target.is_some())).collect();
    let Some(target) = target else {
        return widths;
    };

    distribute(cells, &mut widths, target, gap);
    if row_width(&widths, gap) > target {
        collapse(cells, &mut widths, target, gap);
    }
    widths
}

/// Hands leftover space to Fraction cells by weight. Each share is rounded
/// up and taken out of a running pool, so the shares add up exactly.
fn distribute(cells: &[CellSpec], widths: &mut [usize], target: usize, gap: usize) {
    let appearing = cells
        .iter()
        .zip(widths.iter())
        .filter(|(c, w)| c.weight().is_some() && **w == 0)
        .count();
    let used = row_width(widths, gap) + gap * appearing;
    let mut pool = target.saturating_sub(used);
    let mut weights: u64 = cells.iter().filter_map(CellSpec::weight).map(u64::from).sum();

    for (cell, width) in cells.iter().zip(widths.iter_mut()) {
        if pool == 0 || weights == 0 {
            break;
        }
        let Some(weight) = cell.weight() else {
            continue;
        };
        let weight = u64::from(weight);
        let share = (pool as u64 * weight).div_ceil(weights) as usize;
        let room = cell.max.map_or(usize::MAX, |m| m.saturating_sub(*width));
        let share = share.min(pool).min(room);
        *width += share;
        pool -= share;
        weights -= weight;
    }
}

fn collapse(cells: &[CellSpec], widths: &mut [usize], target: usize, gap: usize) {
    // Pass 1: truncatable cells, lowest priority first, down to their minimum.
    let mut order: Vec<usize> = (0..cells.len()).filter(|&i| cells[i].truncatable()).collect();
    order.sort_by_key(|&i| cells[i].priority);
    for i in order {
        let total = row_width(widths, gap);
        if total <= target {
            break;
        }
        let room = widths[i].saturating_sub(cells[i].min);
        widths[i] -= room.min(total - target);
    }

    // Pass 2: everything above its minimum, proportionally to current width.
    loop {
        let total = row_width(widths, gap);
        if total <= target {
            break;
        }
        let deficit = total - target;
        let reducible: Vec<usize> = (0..cells.len()).filter(|&i| widths[i] > cells[i].min).collect();
        if reducible.is_empty() {
            break;
        }
        let pool: usize = reducible.iter().map(|&i| widths[i]).sum();
        for i in reducible {
            let total = row_width(widths, gap);
            if total <= target {
                break;
            }
            let room = widths[i] - cells[i].min;
            let share = (deficit * widths[i]).div_ceil(pool).clamp(1, room);
            widths[i] -= share.min(total - target);
        }
    }

    // A cell collapsed to zero also frees its gap, which can leave the row
    // short of the target; give those columns back.
    let total = row_width(widths, gap);
    if total < target {
        let visible = |i: &usize| widths[*i] > 0;
        let receiver = (0..cells.len())
            .filter(visible)
            .find(|&i| cells[i].weight().is_some())
            .or_else(|| (0..cells.len()).filter(visible).last());
        if let Some(i) = receiver {
            widths[i] += target - total;
        }
    }
}
