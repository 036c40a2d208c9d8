pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod types;

pub use config::{StreamConfig, ViewParams};
pub use error::ConfigError;
pub use types::{GridWindow, TileId};
