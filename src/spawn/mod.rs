//! Composition resolution, point allocation and spawn pacing

pub mod allocator;
pub mod queue;
pub mod resolver;

pub use allocator::{PlacedSpawn, SpawnPointAllocator};
pub use queue::SpawnDelayQueue;
pub use resolver::{game_stage, Composition, CompositionSource, SpawnCompositionResolver};
