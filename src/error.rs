/// Rejected configuration values.
///
/// Raised while a [`crate::RendererConfig`], [`crate::BarStyle`] or
/// [`crate::StyleOverride`] is resolved, before any task store exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("render interval must be greater than zero")]
    ZeroInterval,
    #[error("non-interactive update step must be at least 1")]
    ZeroStep,
    #[error("{field} must be at least 1 column wide")]
    ZeroWidth { field: &'static str },
    #[error("bar minimum width {min} exceeds bar width {width}")]
    MinExceedsWidth { min: usize, width: usize },
    #[error("spinner needs at least one frame")]
    EmptySpinnerFrames,
}

/// Errors surfaced by the crate's public entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
