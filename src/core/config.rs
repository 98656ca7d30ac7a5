//! Scheduler configuration with documented constants
//!
//! Tunables the player can change at runtime live in [`AmbientConfig`].
//! Fixed pacing constants are collected here too.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::core::error::{Result, SpawnError};
use crate::core::types::{Allegiance, CollectionId, FactoryId};
use crate::definition::TagWeights;

/// Shortest interval between two spawn checks (seconds)
pub const MIN_DURATION: u32 = 10;

/// Combat actions newer than this (seconds) suppress new spawns
pub const COMBAT_GRACE_SECONDS: f32 = 5.0;

/// Extra wait when two consecutive spawns share a point (seconds)
pub const STACKED_SPAWN_DELAY: f32 = 3.0;

/// Delay between spawns of a native fallback composition (seconds)
pub const NATIVE_SPAWN_DELAY: f32 = 0.2;

/// Multiplier applied to the host's actor-cost cap
pub const SPAWN_CAP_MULTIPLIER: f32 = 3.0;

/// Den radius multiplier applied on admission
pub const DEN_RADIUS_SCALE: f32 = 1.5;

/// How widely spawn definitions are drawn for a den.
///
/// Ordered: each level is a superset of the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpawnScope {
    /// Only the den's own native spawns
    Den,
    /// Native spawns of every den in the map
    #[default]
    Level,
    /// Plus custom spawns authored for the map's content pack
    Pack,
    /// Plus custom spawns from every content pack
    Global,
}

impl SpawnScope {
    /// Whether this scope needs content packs beyond the current map's
    pub fn needs_pack_loading(&self) -> bool {
        *self >= SpawnScope::Pack
    }
}

/// Content filters: maps, dens and factories the scheduler must leave alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilters {
    /// Maps with no ambient spawns at all (boss arenas, hubs)
    pub blocked_maps: Vec<String>,
    /// Dens with these allegiances are never admitted
    pub denied_allegiances: Vec<Allegiance>,
    /// Dens whose native collection is listed here are never admitted
    pub denied_collections: Vec<CollectionId>,
    /// Dens in these difficulty regions are never admitted
    pub denied_regions: Vec<String>,
    /// Factories that keep their own allegiance after spawning
    pub allegiance_exempt: Vec<FactoryId>,
    /// Groups of interchangeable factories for mega-mix substitution
    pub equivalence_pools: Vec<Vec<FactoryId>>,
}

impl ContentFilters {
    pub fn is_map_blocked(&self, map_name: &str) -> bool {
        self.blocked_maps
            .iter()
            .any(|m| m.eq_ignore_ascii_case(map_name))
    }

    pub fn is_allegiance_exempt(&self, factory: &FactoryId) -> bool {
        self.allegiance_exempt.contains(factory)
    }
}

/// Runtime configuration of the ambient scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// Average seconds between spawn checks
    pub frequency: u32,

    /// Jitter applied to `frequency` (seconds, ±)
    ///
    /// Derived as `frequency / 3` whenever frequency is changed at runtime.
    pub random_range: u32,

    /// Dens closer than this (planar units) are ignored
    pub min_distance: f32,

    /// Dens further than this (planar units) are ignored
    pub max_distance: f32,

    /// Whether new encounters may start while the player is fighting
    pub allow_in_combat: bool,

    /// Multiply the host's actor-cost cap so extra enemies fit
    pub increase_spawn_cap: bool,

    /// Chance (0-100) of drawing from custom spawns when a den has any
    pub custom_spawn_percentage: u32,

    /// Relative weight of each severity tag when picking a definition
    pub tag_weights: TagWeights,

    /// Breadth of definitions eligible at a den
    pub scope: SpawnScope,

    /// Swap factories for equivalents from other content packs
    pub mega_mix: bool,

    /// Alert the den's other patrol members when we spawn there
    pub provoke_dens: bool,

    /// Spawned actors start out targeting the player
    pub target_player_on_spawn: bool,

    /// Seconds without input after which the player counts as idle
    pub idle_threshold: f32,

    pub filters: ContentFilters,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            frequency: 100,
            random_range: 33,
            min_distance: 10.0,
            max_distance: 10_000.0,
            allow_in_combat: false,
            increase_spawn_cap: true,
            custom_spawn_percentage: 30,
            tag_weights: TagWeights::default(),
            scope: SpawnScope::Level,
            mega_mix: false,
            provoke_dens: true,
            target_player_on_spawn: true,
            idle_threshold: 300.0,
            filters: ContentFilters::default(),
        }
    }
}

impl AmbientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AmbientConfig = toml::from_str(content).map_err(|e| SpawnError::TomlError {
            path: "<inline>".to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AmbientConfig = toml::from_str(&content).map_err(|e| SpawnError::TomlError {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        info!(path = %path.display(), "Loaded ambient spawn config");
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.frequency < MIN_DURATION {
            return Err(SpawnError::InvalidConfig(format!(
                "frequency ({}) should be >= {}",
                self.frequency, MIN_DURATION
            )));
        }
        if self.min_distance < 0.0 || self.min_distance > self.max_distance {
            return Err(SpawnError::InvalidConfig(format!(
                "distance range [{}, {}] is empty or negative",
                self.min_distance, self.max_distance
            )));
        }
        if self.custom_spawn_percentage > 100 {
            return Err(SpawnError::InvalidConfig(format!(
                "custom_spawn_percentage ({}) should be <= 100",
                self.custom_spawn_percentage
            )));
        }
        if self.idle_threshold <= 0.0 {
            return Err(SpawnError::InvalidConfig(
                "idle_threshold must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Change the average interval; the jitter follows at a third of it.
    pub fn set_frequency(&mut self, frequency: u32) {
        self.frequency = frequency.max(MIN_DURATION);
        self.random_range = self.frequency / 3;
    }

    /// Change the spawn scope.
    ///
    /// Returns true when the change crosses into or out of pack-wide
    /// scopes, which only takes effect after the next main-menu visit.
    pub fn set_scope(&mut self, scope: SpawnScope) -> bool {
        let needs_reload = self.scope.needs_pack_loading() != scope.needs_pack_loading();
        if needs_reload {
            warn!(
                from = ?self.scope,
                to = ?scope,
                "Spawn scope change needs content packs reloaded; takes effect after returning to the main menu"
            );
        }
        self.scope = scope;
        needs_reload
    }

    /// Whether content packs must be bulk-loaded at the main menu
    pub fn needs_pack_loading(&self) -> bool {
        self.mega_mix || self.scope.needs_pack_loading()
    }
}
