//! Ratatui front-end: the setlist list, the two-pane reorder editor, the
//! perform view and the song manager.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
