//! Turning a chosen den into an ordered list of placed spawns

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, trace};

use super::allocator::{PlacedSpawn, SpawnPointAllocator};
use crate::content::SubstitutionIndex;
use crate::core::config::{AmbientConfig, NATIVE_SPAWN_DELAY};
use crate::core::types::DenId;
use crate::core::weighted;
use crate::definition::{PointPin, ResolveContext, SpawnTask};
use crate::den::registry::{DefinitionIdx, DenRegistry, DenSpawnInfo};
use crate::den::{view_weight, SpawnPoint};
use crate::host::{PlayerState, SpawnHost};

/// Fewest and most units of a native fallback composition
const NATIVE_FALLBACK_COUNT: (u32, u32) = (2, 5);

/// Which definition set a composition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionSource {
    Custom,
    Level,
    FovExempt,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub den: DenId,
    pub source: CompositionSource,
    /// Name of the resolved definition; `None` for native fallbacks
    pub definition: Option<String>,
    pub spawns: Vec<PlacedSpawn>,
}

/// Difficulty stage for a den: the den's own, else the player's, else 1
pub fn game_stage<H: SpawnHost + ?Sized>(host: &H, player: Option<&PlayerState>, den: DenId) -> u32 {
    host.den_game_stage(den)
        .filter(|&s| s > 0)
        .or_else(|| player.and_then(|p| p.game_stage).filter(|&s| s > 0))
        .unwrap_or(1)
}

pub struct SpawnCompositionResolver<'a> {
    config: &'a AmbientConfig,
    registry: &'a DenRegistry,
    substitution: Option<&'a SubstitutionIndex>,
}

impl<'a> SpawnCompositionResolver<'a> {
    pub fn new(
        config: &'a AmbientConfig,
        registry: &'a DenRegistry,
        substitution: Option<&'a SubstitutionIndex>,
    ) -> Self {
        Self {
            config,
            registry,
            substitution,
        }
    }

    /// Expand the den into a composition, or `None` if nothing can spawn
    pub fn resolve<H: SpawnHost + ?Sized>(
        &self,
        host: &mut H,
        player: &PlayerState,
        den: DenId,
        rng: &mut ChaCha8Rng,
    ) -> Option<Composition> {
        let info = self.registry.info(den)?;
        let stage = game_stage(&*host, Some(player), den);

        let usable: Vec<&SpawnPoint> = info
            .den
            .points
            .iter()
            .filter(|p| {
                p.location
                    .map_or(false, |loc| view_weight(player, loc, p.is_blank()) > 0.0)
            })
            .collect();

        let mut composition = None;
        if !usable.is_empty() {
            let (source, pool) = if !info.custom.is_empty()
                && rng.gen_range(0..100) < self.config.custom_spawn_percentage
            {
                (CompositionSource::Custom, &info.custom)
            } else {
                (CompositionSource::Level, &info.level)
            };
            composition = self.resolve_from(host, info, pool, source, usable.clone(), stage, rng);
        } else if info.fov_exempt_available() {
            let blank: Vec<&SpawnPoint> = info
                .den
                .blank_points()
                .filter(|p| p.location.is_some())
                .collect();
            composition =
                self.resolve_from(host, info, &info.fov_exempt, CompositionSource::FovExempt, blank, stage, rng);
        }

        composition.or_else(|| self.native_fallback(host, info, usable, stage, rng))
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_from<H: SpawnHost + ?Sized>(
        &self,
        host: &mut H,
        info: &DenSpawnInfo,
        pool: &[DefinitionIdx],
        source: CompositionSource,
        points: Vec<&SpawnPoint>,
        stage: u32,
        rng: &mut ChaCha8Rng,
    ) -> Option<Composition> {
        let weights: Vec<f32> = pool
            .iter()
            .map(|&i| {
                self.registry
                    .definition(i)
                    .map_or(0.0, |d| self.config.tag_weights.weight(d.tag))
            })
            .collect();
        let chosen = weighted::pick_index(&weights, rng)?;
        let definition = self.registry.definition(pool[chosen])?;

        let tasks = {
            let mut ctx = ResolveContext {
                host: &mut *host,
                rng: &mut *rng,
                den: info.id(),
                game_stage: stage,
                substitution: self.substitution,
            };
            definition.resolve(&mut ctx)
        };

        let mut allocator = SpawnPointAllocator::new(points);
        let spawns = allocator.allocate_all(&tasks, rng);
        debug!(
            den = info.id().0,
            definition = %definition.name,
            source = ?source,
            tasks = tasks.len(),
            placed = spawns.len(),
            "Resolved composition"
        );
        if spawns.is_empty() {
            return None;
        }
        Some(Composition {
            den: info.id(),
            source,
            definition: Some(definition.name.clone()),
            spawns,
        })
    }

    /// Last resort: a few of the den's own population, stopping after a
    /// champion
    fn native_fallback<H: SpawnHost + ?Sized>(
        &self,
        host: &mut H,
        info: &DenSpawnInfo,
        points: Vec<&SpawnPoint>,
        stage: u32,
        rng: &mut ChaCha8Rng,
    ) -> Option<Composition> {
        // Only collections that passed native conversion (no critical or
        // non-pawn factories) may be drawn from
        let collection = info
            .native
            .and_then(|idx| self.registry.definition(idx))
            .and_then(|def| def.collection())?;
        if points.is_empty() {
            return None;
        }

        let mut allocator = SpawnPointAllocator::new(points);
        let count = rng.gen_range(NATIVE_FALLBACK_COUNT.0..=NATIVE_FALLBACK_COUNT.1);
        let mut spawns = Vec::new();
        for _ in 0..count {
            let Some(factory) = host.pick_factory(collection, info.id(), stage, 1) else {
                continue;
            };
            let champion = host.factory(&factory).map_or(false, |f| f.champion);
            let task = SpawnTask {
                factory,
                pin: PointPin::Any,
                delay: NATIVE_SPAWN_DELAY,
            };
            if let Some(placed) = allocator.allocate(&task, rng) {
                spawns.push(placed);
            }
            if champion {
                trace!(den = info.id().0, "Champion drawn, ending native fallback");
                break;
            }
        }

        debug!(den = info.id().0, placed = spawns.len(), "Native fallback composition");
        if spawns.is_empty() {
            return None;
        }
        Some(Composition {
            den: info.id(),
            source: CompositionSource::Native,
            definition: None,
            spawns,
        })
    }
}
