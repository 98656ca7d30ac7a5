//! The ambient scheduler: a tick-driven state machine
//!
//! While idle it waits `next_interval` seconds between checks. A check that
//! passes the suppression rules picks a den, resolves a composition and
//! starts draining it; each spawn is followed by its own delay. Everything
//! tied to the current map lives in a session that is dropped on map exit.

pub mod suppression;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::content::{ContentPoolManager, SubstitutionIndex};
use crate::core::config::{AmbientConfig, SpawnScope, MIN_DURATION, SPAWN_CAP_MULTIPLIER};
use crate::core::error::Result;
use crate::core::types::{ActorHandle, DenId};
use crate::definition::{DefinitionCatalog, Tag};
use crate::den::{DenRegistry, DenSelector, DenSpawnInfo};
use crate::host::{ContentLoader, SpawnHost, SpawnRequest};
use crate::spawn::{game_stage, Composition, PlacedSpawn, SpawnCompositionResolver, SpawnDelayQueue};

pub use suppression::{suppression_reason, Suppression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Waiting for the next check
    Idle,
    /// Draining a composition
    Spawning,
}

/// Running counters, mostly for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub sessions: u32,
    pub checks: u32,
    pub suppressed: u32,
    pub compositions: u32,
    pub spawned: u32,
    pub failed_spawns: u32,
}

/// State that only means something on the current map
#[derive(Debug)]
struct MapSession {
    map_name: String,
    registry: DenRegistry,
    queue: Option<SpawnDelayQueue>,
    last_check: f32,
    next_interval: u32,
}

pub struct AmbientScheduler {
    config: AmbientConfig,
    rng: ChaCha8Rng,
    content: ContentPoolManager,
    catalog: DefinitionCatalog,
    substitution: SubstitutionIndex,
    session: Option<MapSession>,
    /// Host actor-cost cap before we raised it
    original_cost_cap: Option<f32>,
    last_composition: Option<Composition>,
    stats: SchedulerStats,
}

impl AmbientScheduler {
    pub fn new(config: AmbientConfig, catalog: DefinitionCatalog) -> Self {
        Self::with_seed(config, catalog, rand::random())
    }

    /// Create with a specific RNG seed for deterministic behavior
    pub fn with_seed(config: AmbientConfig, catalog: DefinitionCatalog, seed: u64) -> Self {
        let mut content = ContentPoolManager::new();
        for pack in catalog.packs() {
            if let Err(e) = content.register(pack.clone()) {
                warn!(error = %e, "Skipping content pack");
            }
        }
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            content,
            catalog,
            substitution: SubstitutionIndex::default(),
            session: None,
            original_cost_cap: None,
            last_composition: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn config(&self) -> &AmbientConfig {
        &self.config
    }

    pub fn content(&self) -> &ContentPoolManager {
        &self.content
    }

    pub fn catalog(&self) -> &DefinitionCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn substitution(&self) -> &SubstitutionIndex {
        &self.substitution
    }

    pub fn registry(&self) -> Option<&DenRegistry> {
        self.session.as_ref().map(|s| &s.registry)
    }

    pub fn map_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.map_name.as_str())
    }

    pub fn last_composition(&self) -> Option<&Composition> {
        self.last_composition.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        match self.session.as_ref().and_then(|s| s.queue.as_ref()) {
            Some(_) => SchedulerState::Spawning,
            None => SchedulerState::Idle,
        }
    }

    /// Spawns still queued in the current composition
    pub fn pending(&self) -> usize {
        self.session
            .as_ref()
            .and_then(|s| s.queue.as_ref())
            .map_or(0, SpawnDelayQueue::len)
    }

    /// Seconds between the last check and the next one
    pub fn next_interval(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.next_interval)
    }

    /// Next idle interval: `frequency ± random_range`, at least
    /// [`MIN_DURATION`]
    pub fn new_duration(&mut self) -> u32 {
        let range = self.config.random_range as i64;
        let offset = if range > 0 {
            self.rng.gen_range(-range..=range)
        } else {
            0
        };
        (self.config.frequency as i64 + offset).max(MIN_DURATION as i64) as u32
    }

    // === Host callbacks ===

    /// Per-frame update
    pub fn tick<H: SpawnHost + ?Sized>(&mut self, host: &mut H) {
        let now = host.world_time();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.queue.is_some() {
            self.drain(host, now);
        } else if now - session.last_check >= session.next_interval as f32 {
            self.check(host, now);
        }
    }

    /// The host is about to tear the map down. Drops the in-flight
    /// composition and every handle into the old map.
    pub fn on_map_leaving(&mut self) {
        if let Some(session) = self.session.take() {
            info!(
                map = %session.map_name,
                pending = session.queue.as_ref().map_or(0, SpawnDelayQueue::len),
                "Leaving map, ambient session closed"
            );
        }
    }

    /// A map finished loading: set up the session for it
    pub fn on_map_loaded<H: SpawnHost + ?Sized>(&mut self, host: &mut H) {
        self.session = None;
        let map_name = host.map_name();

        if self.config.filters.is_map_blocked(&map_name) {
            info!(map = %map_name, "Map is blocked, no ambient spawns");
            if let Some(original) = self.original_cost_cap.take() {
                host.set_actor_cost_cap(original);
                debug!(cap = original, "Restored actor cost cap");
            }
            return;
        }

        if self.config.increase_spawn_cap && self.original_cost_cap.is_none() {
            if let Some(cap) = host.actor_cost_cap() {
                self.original_cost_cap = Some(cap);
                host.set_actor_cost_cap(cap * SPAWN_CAP_MULTIPLIER);
                debug!(from = cap, to = cap * SPAWN_CAP_MULTIPLIER, "Raised actor cost cap");
            }
        }

        self.substitution = if self.config.mega_mix {
            self.content
                .build_substitution_index(&*host, &self.config.filters.equivalence_pools)
        } else {
            SubstitutionIndex::default()
        };

        let registry = DenRegistry::build(host, &self.catalog, &self.config, &self.substitution);
        let next_interval = self.new_duration();
        info!(
            map = %map_name,
            dens = registry.len(),
            next_check = next_interval,
            "Ambient session started"
        );
        self.session = Some(MapSession {
            map_name,
            registry,
            queue: None,
            last_check: host.world_time(),
            next_interval,
        });
        self.stats.sessions += 1;
    }

    /// Back at the main menu: the only point where content packs are
    /// loaded or released.
    pub fn on_main_menu<L: ContentLoader + ?Sized>(&mut self, loader: &mut L) {
        self.on_map_leaving();
        if self.config.needs_pack_loading() {
            info!(scope = ?self.config.scope, mega_mix = self.config.mega_mix, "Loading all content packs");
            self.content.load_all(loader);
        } else {
            self.content.unload_all(loader);
        }
    }

    // === Configuration ===

    /// Change the average check interval. A pending interval longer than
    /// the new average is cut down to it.
    pub fn set_frequency(&mut self, frequency: u32) {
        self.config.set_frequency(frequency);
        if let Some(session) = &mut self.session {
            session.next_interval = session.next_interval.min(self.config.frequency);
        }
    }

    /// Returns true when the change only applies after the next main menu
    pub fn set_scope(&mut self, scope: SpawnScope) -> bool {
        self.config.set_scope(scope)
    }

    /// Returns true when the change only applies after the next main menu
    pub fn set_mega_mix(&mut self, enabled: bool) -> bool {
        let before = self.config.needs_pack_loading();
        self.config.mega_mix = enabled;
        let changed = before != self.config.needs_pack_loading();
        if changed {
            warn!(mega_mix = enabled, "Mega-mix change takes effect after returning to the main menu");
        }
        changed
    }

    pub fn set_tag_weight(&mut self, tag: Tag, weight: u32) {
        self.config.tag_weights.set(tag, weight);
    }

    pub fn set_custom_spawn_percentage(&mut self, percentage: u32) {
        self.config.custom_spawn_percentage = percentage.min(100);
    }

    pub fn set_allow_in_combat(&mut self, allow: bool) {
        self.config.allow_in_combat = allow;
    }

    pub fn set_distance_range(&mut self, min: f32, max: f32) -> Result<()> {
        let mut config = self.config.clone();
        config.min_distance = min;
        config.max_distance = max;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Swap the whole config. Scope and mega-mix changes still wait for
    /// the main menu.
    pub fn set_config(&mut self, config: AmbientConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    // === Internals ===

    fn check<H: SpawnHost + ?Sized>(&mut self, host: &mut H, now: f32) {
        self.stats.checks += 1;
        let player = host.player();

        if let Some(reason) = suppression_reason(&self.config, player.as_ref()) {
            self.stats.suppressed += 1;
            debug!(reason = ?reason, "Spawn check suppressed");
            if let Some(session) = &mut self.session {
                session.last_check = now;
            }
            return;
        }
        let Some(player) = player else {
            return;
        };

        let next_interval = self.new_duration();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.last_check = now;
        session.next_interval = next_interval;

        let selector = DenSelector::from_config(&self.config);
        let Some(den) = selector.select(&player, &session.registry, &mut self.rng) else {
            debug!(next_check = next_interval, "No den eligible");
            return;
        };

        let substitution = self.config.mega_mix.then_some(&self.substitution);
        let resolver = SpawnCompositionResolver::new(&self.config, &session.registry, substitution);
        let Some(composition) = resolver.resolve(host, &player, den, &mut self.rng) else {
            debug!(den = den.0, "Den produced no composition");
            return;
        };

        info!(
            den = den.0,
            source = ?composition.source,
            definition = composition.definition.as_deref().unwrap_or("native"),
            spawns = composition.spawns.len(),
            "Starting ambient encounter"
        );
        self.stats.compositions += 1;
        session.queue = Some(SpawnDelayQueue::new(den, composition.spawns.clone(), now));
        self.last_composition = Some(composition);

        self.drain(host, now);
    }

    fn drain<H: SpawnHost + ?Sized>(&mut self, host: &mut H, now: f32) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(queue) = session.queue.as_mut() else {
            return;
        };
        if !queue.is_due(now) {
            return;
        }

        let den = queue.den();
        let next = queue.pop(now);
        if queue.is_empty() {
            session.queue = None;
            debug!(den = den.0, "Encounter finished");
        }

        let Some(placed) = next else {
            return;
        };
        let Some(info) = session.registry.info(den) else {
            return;
        };
        match execute_spawn(host, &self.config, info, &placed) {
            Some(actor) => {
                trace!(factory = %placed.factory, point = placed.point.0, actor = ?actor.0, "Spawned");
                self.stats.spawned += 1;
            }
            None => {
                debug!(factory = %placed.factory, point = placed.point.0, "Spawn failed, task dropped");
                self.stats.failed_spawns += 1;
            }
        }
    }
}

/// Instantiate one placed spawn and run the post-spawn setup
fn execute_spawn<H: SpawnHost + ?Sized>(
    host: &mut H,
    config: &AmbientConfig,
    info: &DenSpawnInfo,
    placed: &PlacedSpawn,
) -> Option<ActorHandle> {
    let den: DenId = info.id();
    let point = info.den.point(placed.point)?;
    let location = point.location?;
    let player = host.player();

    let request = SpawnRequest {
        factory: placed.factory.clone(),
        den,
        point: point.id,
        location,
        rotation: point.rotation,
        game_stage: game_stage(&*host, player.as_ref(), den),
        rarity: 1,
    };
    let actor = host.spawn(&request)?;
    host.play_spawn_animation(point.id, actor);

    if !config.filters.is_allegiance_exempt(&placed.factory) {
        if let Some(allegiance) = &info.den.allegiance {
            host.set_allegiance(actor, allegiance);
        }
    }

    if config.target_player_on_spawn && player.is_some() {
        // Initial targeting from far away shouldn't start combat music
        let threat = host.music_threat(actor);
        if threat.is_some() {
            host.set_music_threat(actor, 0.0);
        }
        host.target_player(actor);
        if let Some(threat) = threat {
            host.set_music_threat(actor, threat);
        }
    }

    if config.provoke_dens {
        host.provoke_den(den);
    }
    Some(actor)
}
