//! Ambient Spawns - periodic, view-aware enemy encounters around a roaming player

pub mod content;
pub mod core;
pub mod definition;
pub mod den;
pub mod host;
pub mod scheduler;
pub mod spawn;

pub use crate::core::{AmbientConfig, Result, SpawnError, SpawnScope};
pub use crate::definition::{DefinitionCatalog, SpawnDefinition, Tag};
pub use crate::host::{ContentLoader, HostCatalog, SpawnHost};
pub use crate::scheduler::{AmbientScheduler, SchedulerState, SchedulerStats};
