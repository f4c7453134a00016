//! Renderer and progress-bar configuration.
//!
//! Both [`RendererConfig`] and [`BarStyle`] are validated before a store or
//! render loop uses them. Per-task [`StyleOverride`]s cannot hold invalid
//! values to begin with, so merging never fails.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::ConfigError;
use crate::widgets::SpinnerFrames;

/// How determinate tasks are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarLayout {
    /// Description and bar share one row.
    #[default]
    SingleLine,
    /// Description on the first row, bar, units and timing on the second.
    TwoLine,
}

/// Whether themes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Colors on interactive terminals only.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub(crate) fn enabled(self, interactive: bool) -> bool {
        match self {
            ColorMode::Auto => interactive,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Render loop settings.
///
/// ```rust,ignore
/// let config = RendererConfig::default()
///     .interval(Duration::from_millis(50))
///     .layout(BarLayout::TwoLine)
///     .validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    pub interval: Duration,
    /// Non-interactive output repeats a determinate task only when
    /// `completed / step` changes.
    pub step: u64,
    /// Log lines kept and repainted above the tasks. `0` prints each log line
    /// once and lets it scroll away.
    pub log_history: usize,
    /// Upper bound for the width of a task row.
    pub max_width: Option<usize>,
    pub layout: BarLayout,
    /// Capture raw keyboard input on interactive terminals so Ctrl-C still
    /// interrupts the process while the cursor is hidden.
    pub raw_input: bool,
    pub color: ColorMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            step: 1,
            log_history: 0,
            max_width: None,
            layout: BarLayout::SingleLine,
            raw_input: false,
            color: ColorMode::Auto,
        }
    }
}

impl RendererConfig {
    /// Set the repaint interval.
    pub fn interval(mut self, d: Duration) -> Self {
        self.interval = d;
        self
    }

    pub fn step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    pub fn log_history(mut self, lines: usize) -> Self {
        self.log_history = lines;
        self
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn layout(mut self, layout: BarLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn raw_input(mut self, yes: bool) -> Self {
        self.raw_input = yes;
        self
    }

    pub fn color(mut self, mode: ColorMode) -> Self {
        self.color = mode;
        self
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.step == 0 {
            return Err(ConfigError::ZeroStep);
        }
        if self.max_width == Some(0) {
            return Err(ConfigError::ZeroWidth { field: "max_width" });
        }
        Ok(self)
    }

    /// Row width for a terminal reporting `columns`.
    pub(crate) fn target_width(&self, columns: Option<usize>) -> Option<usize> {
        match (columns, self.max_width) {
            (Some(c), Some(m)) => Some(c.min(m)),
            (c, m) => c.or(m),
        }
    }
}

/// Characters and sizing of the progress bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarChars {
    /// Widest the bar grows.
    pub width: usize,
    /// Narrowest the bar shrinks before other columns give way.
    pub min_width: usize,
    pub filled: char,
    pub empty: char,
}

impl Default for BarChars {
    fn default() -> Self {
        Self {
            width: 30,
            min_width: 10,
            filled: '█',
            empty: '░',
        }
    }
}

/// Labels of finished tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub done: String,
    pub failed: String,
}

/// Resolved per-task progress style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarStyle {
    pub bar: BarChars,
    pub spinner: SpinnerFrames,
    pub markers: Markers,
    /// Shown where an ETA cannot be computed yet.
    pub eta_placeholder: String,
}

impl Default for BarStyle {
    fn default() -> Self {
        Self {
            bar: BarChars::default(),
            spinner: SpinnerFrames::dots(),
            markers: Markers {
                done: "done".into(),
                failed: "failed".into(),
            },
            eta_placeholder: "--:--".into(),
        }
    }
}

impl BarStyle {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.bar.width == 0 {
            return Err(ConfigError::ZeroWidth { field: "bar width" });
        }
        if self.bar.min_width > self.bar.width {
            return Err(ConfigError::MinExceedsWidth {
                min: self.bar.min_width,
                width: self.bar.width,
            });
        }
        Ok(self)
    }

    /// Applies `o` on top of this style. Nested groups merge field by field;
    /// the spinner frame list is replaced as a whole.
    pub fn merged(&self, o: &StyleOverride) -> BarStyle {
        let width = o.bar.width.map_or(self.bar.width, NonZeroUsize::get);
        let min_width = o.bar.min_width.unwrap_or(self.bar.min_width).min(width);
        BarStyle {
            bar: BarChars {
                width,
                min_width,
                filled: o.bar.filled.unwrap_or(self.bar.filled),
                empty: o.bar.empty.unwrap_or(self.bar.empty),
            },
            spinner: o.spinner.clone().unwrap_or_else(|| self.spinner.clone()),
            markers: Markers {
                done: o.markers.done.clone().unwrap_or_else(|| self.markers.done.clone()),
                failed: o
                    .markers
                    .failed
                    .clone()
                    .unwrap_or_else(|| self.markers.failed.clone()),
            },
            eta_placeholder: o
                .eta_placeholder
                .clone()
                .unwrap_or_else(|| self.eta_placeholder.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarCharsOverride {
    pub width: Option<NonZeroUsize>,
    pub min_width: Option<usize>,
    pub filled: Option<char>,
    pub empty: Option<char>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkersOverride {
    pub done: Option<String>,
    pub failed: Option<String>,
}

/// Partial [`BarStyle`] applied to one task and, through inheritance, to
/// its descendants.
///
/// ```rust,ignore
/// let slow = StyleOverride::default()
///     .bar_chars('=', ' ')
///     .spinner(SpinnerFrames::line());
/// ctx.add_task(NewTask::new("fetch").total(10).style(slow));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOverride {
    pub bar: BarCharsOverride,
    pub spinner: Option<SpinnerFrames>,
    pub markers: MarkersOverride,
    pub eta_placeholder: Option<String>,
}

impl StyleOverride {
    pub fn bar_width(mut self, width: NonZeroUsize) -> Self {
        self.bar.width = Some(width);
        self
    }

    pub fn bar_min_width(mut self, width: usize) -> Self {
        self.bar.min_width = Some(width);
        self
    }

    pub fn bar_chars(mut self, filled: char, empty: char) -> Self {
        self.bar.filled = Some(filled);
        self.bar.empty = Some(empty);
        self
    }

    pub fn spinner(mut self, frames: SpinnerFrames) -> Self {
        self.spinner = Some(frames);
        self
    }

    pub fn done_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.done = Some(marker.into());
        self
    }

    pub fn failed_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.failed = Some(marker.into());
        self
    }

    pub fn eta_placeholder(mut self, text: impl Into<String>) -> Self {
        self.eta_placeholder = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_validate() {
        assert!(RendererConfig::default().validate().is_ok());
        assert!(BarStyle::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero = RendererConfig::default().interval(Duration::ZERO).validate();
        assert_eq!(zero, Err(ConfigError::ZeroInterval));

        let step = RendererConfig::default().step(0).validate();
        assert_eq!(step, Err(ConfigError::ZeroStep));

        let width = RendererConfig::default().max_width(0).validate();
        assert_eq!(width, Err(ConfigError::ZeroWidth { field: "max_width" }));

        let mut style = BarStyle::default();
        style.bar.min_width = 40;
        assert_eq!(
            style.validate(),
            Err(ConfigError::MinExceedsWidth { min: 40, width: 30 })
        );
    }

    #[test]
    fn zero_bar_width_is_rejected() {
        let style = BarStyle {
            bar: BarChars {
                width: 0,
                min_width: 0,
                ..BarChars::default()
            },
            ..BarStyle::default()
        };
        assert_eq!(BarStyle::default().bar, BarChars::default());
        assert_eq!(
            style.validate(),
            Err(ConfigError::ZeroWidth { field: "bar width" })
        );
    }

    #[test]
    fn target_width_takes_narrower_bound() {
        let config = RendererConfig::default().max_width(60);
        assert_eq!(config.target_width(Some(100)), Some(60));
        assert_eq!(config.target_width(Some(40)), Some(40));
        assert_eq!(config.target_width(None), Some(60));
        assert_eq!(RendererConfig::default().target_width(None), None);
    }

    #[test]
    fn merge_is_field_wise_and_replaces_frames() {
        let base = BarStyle::default();
        let o = StyleOverride::default()
            .bar_chars('#', '.')
            .failed_marker("boom")
            .spinner(SpinnerFrames::line());
        let merged = base.merged(&o);

        assert_eq!(merged.bar.filled, '#');
        assert_eq!(merged.bar.width, base.bar.width);
        assert_eq!(merged.markers.done, "done");
        assert_eq!(merged.markers.failed, "boom");
        assert_eq!(merged.spinner, SpinnerFrames::line());
    }

    #[test]
    fn narrow_override_clamps_inherited_min_width() {
        let o = StyleOverride::default().bar_width(NonZeroUsize::new(4).unwrap());
        let merged = BarStyle::default().merged(&o);
        assert_eq!((merged.bar.width, merged.bar.min_width), (4, 4));
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn empty_override_is_identity() {
        let base = BarStyle::default();
        assert_eq!(base.merged(&StyleOverride::default()), base);
    }
}
