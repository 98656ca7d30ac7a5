//! In-memory host for tests and the demo binary
//!
//! Holds a flat catalog, a list of dens and one player. Every mutation the
//! scheduler performs is appended to an event log so callers can inspect
//! exactly what happened.

use ahash::{AHashMap, AHashSet};
use glam::Vec3;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use super::{
    CollectionInfo, ContentLoader, FactoryInfo, HostCatalog, ObjectRef, PlayerState, SpawnHost,
    SpawnRequest,
};
use crate::core::types::{ActorHandle, Allegiance, CollectionId, DenId, FactoryId, PointId};
use crate::den::Den;
use crate::definition::flatten_collection;

/// Music threat newly spawned actors start with
pub const DEFAULT_MUSIC_THREAT: f32 = 0.5;

/// Something the scheduler asked the host to do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    Spawned {
        time: f32,
        actor: ActorHandle,
        factory: FactoryId,
        den: DenId,
        point: PointId,
    },
    Animated {
        point: PointId,
        actor: ActorHandle,
    },
    AllegianceSet {
        actor: ActorHandle,
        allegiance: Allegiance,
    },
    MusicThreatSet {
        actor: ActorHandle,
        threat: f32,
    },
    Targeted {
        actor: ActorHandle,
    },
    Provoked {
        den: DenId,
    },
}

/// An actor spawned through [`SpawnHost::spawn`]
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedActor {
    pub handle: ActorHandle,
    pub factory: FactoryId,
    pub den: DenId,
    pub point: PointId,
    pub location: Vec3,
    pub game_stage: u32,
    pub allegiance: Option<Allegiance>,
    pub music_threat: f32,
    pub targeting_player: bool,
}

#[derive(Debug, Clone, Default)]
struct Package {
    factories: Vec<FactoryInfo>,
    collections: Vec<CollectionInfo>,
}

#[derive(Debug, Clone)]
pub struct MemoryHost {
    map_name: String,
    time: f32,
    factories: AHashMap<FactoryId, FactoryInfo>,
    collections: AHashMap<CollectionId, CollectionInfo>,
    packages: AHashMap<String, Package>,
    package_loads: usize,
    pinned: AHashSet<ObjectRef>,
    dens: Vec<Den>,
    den_stages: AHashMap<DenId, u32>,
    player: Option<PlayerState>,
    actors: Vec<SpawnedActor>,
    events: Vec<HostEvent>,
    fail_spawns: bool,
    cost_cap: Option<f32>,
    rng: ChaCha8Rng,
}

impl MemoryHost {
    pub fn new(map_name: impl Into<String>) -> Self {
        Self::with_seed(map_name, 0)
    }

    pub fn with_seed(map_name: impl Into<String>, seed: u64) -> Self {
        Self {
            map_name: map_name.into(),
            time: 0.0,
            factories: AHashMap::new(),
            collections: AHashMap::new(),
            packages: AHashMap::new(),
            package_loads: 0,
            pinned: AHashSet::new(),
            dens: Vec::new(),
            den_stages: AHashMap::new(),
            player: None,
            actors: Vec::new(),
            events: Vec::new(),
            fail_spawns: false,
            cost_cap: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn add_factory(&mut self, info: FactoryInfo) {
        self.factories.insert(info.id.clone(), info);
    }

    pub fn add_collection(&mut self, info: CollectionInfo) {
        self.collections.insert(info.id.clone(), info);
    }

    /// Register a package whose contents join the catalog when loaded
    pub fn add_package(
        &mut self,
        name: impl Into<String>,
        factories: Vec<FactoryInfo>,
        collections: Vec<CollectionInfo>,
    ) {
        self.packages.insert(
            name.into(),
            Package {
                factories,
                collections,
            },
        );
    }

    pub fn add_den(&mut self, den: Den) {
        self.dens.push(den);
    }

    pub fn den(&self, id: DenId) -> Option<&Den> {
        self.dens.iter().find(|d| d.id == id)
    }

    pub fn set_den_stage(&mut self, den: DenId, stage: u32) {
        self.den_stages.insert(den, stage);
    }

    /// Switch maps: dens are torn down, the catalog stays
    pub fn travel(&mut self, map_name: impl Into<String>) {
        self.map_name = map_name.into();
        self.dens.clear();
        self.den_stages.clear();
    }

    pub fn set_player(&mut self, player: Option<PlayerState>) {
        self.player = player;
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        self.player.as_mut()
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
        if let Some(player) = &mut self.player {
            player.since_input += dt;
            if let Some(since) = &mut player.since_combat {
                *since += dt;
            }
        }
    }

    /// Make every following `spawn` call fail
    pub fn set_fail_spawns(&mut self, fail: bool) {
        self.fail_spawns = fail;
    }

    pub fn set_cost_cap(&mut self, cap: Option<f32>) {
        self.cost_cap = cap;
    }

    pub fn actors(&self) -> &[SpawnedActor] {
        &self.actors
    }

    pub fn actor(&self, handle: ActorHandle) -> Option<&SpawnedActor> {
        self.actors.iter().find(|a| a.handle == handle)
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn package_load_count(&self) -> usize {
        self.package_loads
    }

    pub fn is_pinned(&self, object: &ObjectRef) -> bool {
        self.pinned.contains(object)
    }

    fn actor_mut(&mut self, handle: ActorHandle) -> Option<&mut SpawnedActor> {
        self.actors.iter_mut().find(|a| a.handle == handle)
    }
}

impl HostCatalog for MemoryHost {
    fn factory(&self, id: &FactoryId) -> Option<FactoryInfo> {
        self.factories.get(id).cloned()
    }

    fn collection(&self, id: &CollectionId) -> Option<CollectionInfo> {
        self.collections.get(id).cloned()
    }
}

impl ContentLoader for MemoryHost {
    fn load_package(&mut self, package: &str) -> bool {
        let Some(contents) = self.packages.get(package).cloned() else {
            return false;
        };
        for factory in contents.factories {
            self.add_factory(factory);
        }
        for collection in contents.collections {
            self.add_collection(collection);
        }
        self.package_loads += 1;
        true
    }

    fn pinnable_objects(&self) -> Vec<ObjectRef> {
        let mut objects: Vec<ObjectRef> = self
            .factories
            .keys()
            .cloned()
            .map(ObjectRef::Factory)
            .chain(self.collections.keys().cloned().map(ObjectRef::Collection))
            .collect();
        objects.sort();
        objects
    }

    fn set_pinned(&mut self, object: &ObjectRef, pinned: bool) {
        if pinned {
            self.pinned.insert(object.clone());
        } else {
            self.pinned.remove(object);
        }
    }
}

impl SpawnHost for MemoryHost {
    fn map_name(&self) -> String {
        self.map_name.clone()
    }

    fn world_time(&self) -> f32 {
        self.time
    }

    fn dens(&self) -> Vec<Den> {
        self.dens.clone()
    }

    fn set_den_radius(&mut self, den: DenId, radius: f32) {
        if let Some(d) = self.dens.iter_mut().find(|d| d.id == den) {
            d.radius = radius;
        }
    }

    fn den_game_stage(&self, den: DenId) -> Option<u32> {
        self.den_stages.get(&den).copied()
    }

    fn pick_factory(
        &mut self,
        collection: &CollectionId,
        _den: DenId,
        _game_stage: u32,
        _rarity: u32,
    ) -> Option<FactoryId> {
        let factories = flatten_collection(&*self, collection);
        factories.choose(&mut self.rng).map(|f| f.id.clone())
    }

    fn player(&self) -> Option<PlayerState> {
        self.player
    }

    fn spawn(&mut self, request: &SpawnRequest) -> Option<ActorHandle> {
        if self.fail_spawns || !self.factories.contains_key(&request.factory) {
            return None;
        }
        let handle = ActorHandle::new();
        self.actors.push(SpawnedActor {
            handle,
            factory: request.factory.clone(),
            den: request.den,
            point: request.point,
            location: request.location,
            game_stage: request.game_stage,
            allegiance: None,
            music_threat: DEFAULT_MUSIC_THREAT,
            targeting_player: false,
        });
        self.events.push(HostEvent::Spawned {
            time: self.time,
            actor: handle,
            factory: request.factory.clone(),
            den: request.den,
            point: request.point,
        });
        Some(handle)
    }

    fn play_spawn_animation(&mut self, point: PointId, actor: ActorHandle) {
        self.events.push(HostEvent::Animated { point, actor });
    }

    fn set_allegiance(&mut self, actor: ActorHandle, allegiance: &Allegiance) {
        if let Some(a) = self.actor_mut(actor) {
            a.allegiance = Some(allegiance.clone());
        }
        self.events.push(HostEvent::AllegianceSet {
            actor,
            allegiance: allegiance.clone(),
        });
    }

    fn music_threat(&self, actor: ActorHandle) -> Option<f32> {
        self.actor(actor).map(|a| a.music_threat)
    }

    fn set_music_threat(&mut self, actor: ActorHandle, threat: f32) {
        if let Some(a) = self.actor_mut(actor) {
            a.music_threat = threat;
        }
        self.events.push(HostEvent::MusicThreatSet { actor, threat });
    }

    fn target_player(&mut self, actor: ActorHandle) {
        if let Some(a) = self.actor_mut(actor) {
            a.targeting_player = true;
        }
        self.events.push(HostEvent::Targeted { actor });
    }

    fn provoke_den(&mut self, den: DenId) {
        self.events.push(HostEvent::Provoked { den });
    }

    fn actor_cost_cap(&self) -> Option<f32> {
        self.cost_cap
    }

    fn set_actor_cost_cap(&mut self, cap: f32) {
        self.cost_cap = Some(cap);
    }
}
