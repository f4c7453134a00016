use std::sync::Arc;

use crate::error::ConfigError;

/// A non-empty sequence of spinner animation frames.
///
/// Indeterminate tasks carry an advancing counter; the glyph shown is the
/// counter modulo the number of frames.
///
/// ```rust,ignore
/// let frames = SpinnerFrames::dots(); // ⠋ ⠙ ⠹ ...
/// assert_eq!(frames.frame(11), "⠙");
///
/// // Other presets:
/// let s = SpinnerFrames::line();  // | / - \
/// let s = SpinnerFrames::arrow(); // ← ↖ ↑ ↗ → ↘ ↓ ↙
///
/// // Custom frames:
/// let s = SpinnerFrames::new(["🌑", "🌒", "🌓", "🌔", "🌕"])?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinnerFrames(Arc<[String]>);

impl SpinnerFrames {
    /// Braille dot spinner (the most common choice).
    pub fn dots() -> Self {
        Self::preset(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    /// Classic line spinner.
    pub fn line() -> Self {
        Self::preset(&["|", "/", "-", "\\"])
    }

    /// Arrow spinner.
    pub fn arrow() -> Self {
        Self::preset(&["←", "↖", "↑", "↗", "→", "↘", "↓", "↙"])
    }

    /// Custom frames. Fails on an empty sequence.
    pub fn new<I, S>(frames: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frames: Arc<[String]> = frames.into_iter().map(Into::into).collect();
        match frames.is_empty() {
            true => Err(ConfigError::EmptySpinnerFrames),
            false => Ok(Self(frames)),
        }
    }

    fn preset(frames: &[&str]) -> Self {
        Self(frames.iter().map(|f| f.to_string()).collect())
    }

    /// Frame for an animation counter, wrapping around.
    pub fn frame(&self, counter: u64) -> &str {
        let index = (counter % self.0.len() as u64) as usize;
        &self.0[index]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for SpinnerFrames {
    fn default() -> Self {
        Self::dots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_wrap_around() {
        let s = SpinnerFrames::line();
        assert_eq!(s.frame(0), "|");
        assert_eq!(s.frame(5), "/");
        assert_eq!(s.frame(u64::MAX), "\\");
    }

    #[test]
    fn empty_frames_are_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(SpinnerFrames::new(empty), Err(ConfigError::EmptySpinnerFrames));
        assert_eq!(SpinnerFrames::new(["a", "b"]).map(|s| s.len()), Ok(2));
    }
}
