#![doc = include_str!("../README.md")]

pub(crate) mod clock;
pub(crate) mod color;
pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod error;
pub mod fit;
pub mod frame;
#[cfg(feature = "layer")]
pub(crate) mod layer;
pub mod layout;
pub(crate) mod runner;
pub(crate) mod store;
pub(crate) mod task;
pub(crate) mod terminal;
pub mod text;
pub mod tree;
pub mod widgets;
pub(crate) mod writer;


/// Re-exports of all public types and traits.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::color::{DefaultTheme, PlainTheme, Role, Theme, Transform, paint};
    pub use crate::config::{
        BarChars, BarCharsOverride, BarLayout, BarStyle, ColorMode, Markers, MarkersOverride,
        RendererConfig, StyleOverride,
    };
    pub use crate::context::TaskContext;
    pub use crate::error::{ConfigError, Error};
    #[cfg(feature = "layer")]
    pub use crate::layer::TaskLayer;
    pub use crate::runner::{InterruptHook, RenderLoop, SessionState, Tally};
    pub use crate::store::{FrameEntry, StoreBuilder, StoreSnapshot, TaskStore};
    pub use crate::task::{
        NewTask, RenderRow, TaskId, TaskSnapshot, TaskStatus, TaskUnits, TaskUpdate,
    };
    pub use crate::terminal::{InputSource, MemoryTerminal, StderrTerminal, Terminal};
    pub use crate::widgets::SpinnerFrames;
}

pub use crate::prelude::*;
