// Settings and local state shared by the hitbloq-sync binary and library
mod error;
mod settings;
mod viewed_events;

pub use error::ConfigError;
pub use settings::Settings;
pub use viewed_events::ViewedEventsStore;

use std::path::PathBuf;

pub(crate) const APP_DIR: &str = "hitbloq-sync";

/// Per-user configuration directory, `<config dir>/hitbloq-sync`
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| ConfigError::Configuration("Could not find config directory".to_string()))
}

/// Per-user cache directory, `<cache dir>/hitbloq-sync`
pub fn cache_dir() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| ConfigError::Configuration("Could not find cache directory".to_string()))
}
