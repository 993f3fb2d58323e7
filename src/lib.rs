pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use app::state::{AppState, Mode};
pub use config::cli::LocalStorage;
pub use config::toml_config::SentinelConfig;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::models::ModelSet;
pub use core::scheduler::{CommandCenter, PlaybackReport};
pub use utils::error::{Result, SentinelError};
