//! TUI pane rendering modules
//!
//! # Pane Modules
//!
//! - [`memory`]: hex dump of the frame, colored by region, changes highlighted
//! - [`regions`]: named cells with their decoded values
//! - [`terminal`]: what the exercise printed so far
//! - [`status`]: status bar with phase, step counter and keybindings
//!
//! Each pane exports a `render_*` function that draws from a snapshot and
//! keeps no state apart from the scroll offset it is handed.

pub mod memory;
pub mod regions;
pub mod status;
pub mod terminal;

pub use memory::render_memory_pane;
pub use regions::render_regions_pane;
pub use status::{render_status_bar, StatusRenderData};
pub use terminal::render_terminal_pane;
