//! Ratatui front-end: a library screen listing songs and an editor screen for
//! one song. `App` owns the state, `terminal` drives the event loop.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
