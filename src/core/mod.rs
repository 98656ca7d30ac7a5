pub mod config;
pub mod error;
pub mod types;
pub mod weighted;

pub use config::{AmbientConfig, ContentFilters, SpawnScope};
pub use error::{Result, SpawnError};
