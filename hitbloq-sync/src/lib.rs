mod app;
pub mod background;
pub mod cache;
pub mod commands;
pub mod error;
pub mod events;
pub mod logging;
pub mod panel;
pub mod state;

pub use app::{render_panel, App, RunOptions};
pub use error::{DispatchError, FetchFailure};
pub use panel::Panel;

// Always expose testing module (integration tests need it)
pub mod testing;
