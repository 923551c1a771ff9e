//! Terminal user interface built on [ratatui](https://github.com/ratatui-org/ratatui).
//!
//! The UI is organized into three layers:
//!
//! - **[`app`]**: which snapshot is on screen, keyboard event loop, pane focus
//! - **[`panes`]**: stateless render functions for each visible pane (memory,
//!   regions, terminal, status bar)
//! - **[`theme`]**: centralized color palette used by all panes
//!
//! Construct an [`App`] from a finished [`RunReport`] and call [`App::run`].
//!
//! [`RunReport`]: crate::exercise::driver::RunReport
//! [`App::run`]: app::App::run

pub mod app;
pub mod panes;
pub mod theme;

pub use app::App;
