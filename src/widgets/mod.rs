//! Building blocks of a task row.
//!
//! # Progress bar
//!
//! [`ProgressBar`] renders at the width the layout engine grants it:
//!
//! ```rust,ignore
//! let bar = ProgressBar::new(45, 100, '█', '░');
//! bar.render(30); // => ██████████████░░░░░░░░░░░░░░░░
//! ```
//!
//! # Spinner
//!
//! [`SpinnerFrames`] maps an indeterminate task's animation counter to a
//! glyph:
//!
//! ```rust,ignore
//! let frames = SpinnerFrames::dots(); // ⠋ ⠙ ⠹ ...
//! frames.frame(task_counter + render_tick);
//! ```
//!
//! # Tree indent
//!
//! [`TreeIndent`] produces box-drawing prefixes from a
//! [`crate::tree::TreeNode`]:
//!
//! ```text
//! root task
//! ├── child 1
//! │   ├── grandchild a
//! │   └── grandchild b
//! └── child 2
//! ```

mod progress_bar;
mod spinner;
mod tree_indent;

pub use progress_bar::*;
pub use spinner::*;
pub use tree_indent::*;
