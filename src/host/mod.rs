//! Capability interface to the host simulation
//!
//! The scheduler never owns engine objects. It asks the host for snapshots
//! (dens, player state, catalog entries) and hands back requests keyed by
//! handles. Anything engine-specific lives behind these traits.

pub mod memory;

use glam::Vec3;

use crate::core::types::{
    ActorHandle, Allegiance, BodyTag, CollectionId, DenId, FactoryId, PointId, Rotation, TemplateId,
};
use crate::den::Den;

/// Catalog entry for a concrete spawn factory
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryInfo {
    pub id: FactoryId,
    /// Entity template this factory spawns; `None` when it spawns something
    /// other than a pawn (props, nested populations)
    pub template: Option<TemplateId>,
    /// Animation body class of the template, if it has one
    pub body: Option<BodyTag>,
    pub champion: bool,
    pub badass: bool,
    /// Scripted actors that must never be duplicated
    pub critical: bool,
}

impl FactoryInfo {
    pub fn pawn(id: impl Into<FactoryId>, template: impl Into<TemplateId>, body: Option<BodyTag>) -> Self {
        Self {
            id: id.into(),
            template: Some(template.into()),
            body,
            champion: false,
            badass: false,
            critical: false,
        }
    }
}

/// One entry of a template collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionEntry {
    Factory(FactoryId),
    /// A nested collection, flattened recursively
    Collection(CollectionId),
}

/// Catalog entry for a template collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub entries: Vec<CollectionEntry>,
    /// Named one-off characters
    pub unique: bool,
}

/// Objects the engine may reclaim unless pinned
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectRef {
    Factory(FactoryId),
    Collection(CollectionId),
}

/// Snapshot of the local player, present only while they control a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub position: Vec3,
    pub view: Rotation,
    /// Pause menu unavailable: cutscenes, dialogs, vendor screens
    pub menu_blocked: bool,
    /// Seconds since the pawn's last combat action, if any
    pub since_combat: Option<f32>,
    /// Seconds since the last player input
    pub since_input: f32,
    pub game_stage: Option<u32>,
}

/// Everything the host needs to instantiate one actor
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub factory: FactoryId,
    pub den: DenId,
    pub point: PointId,
    pub location: Vec3,
    pub rotation: Rotation,
    pub game_stage: u32,
    pub rarity: u32,
}

/// Lookup into the currently loaded entity catalog
pub trait HostCatalog {
    fn factory(&self, id: &FactoryId) -> Option<FactoryInfo>;
    fn collection(&self, id: &CollectionId) -> Option<CollectionInfo>;
}

/// Host asset loader used for content packs
pub trait ContentLoader: HostCatalog {
    /// Load one package; false when the package cannot be found
    fn load_package(&mut self, package: &str) -> bool;
    /// Templates and factories currently loaded
    fn pinnable_objects(&self) -> Vec<ObjectRef>;
    /// Exclude (or re-include) an object from engine reclamation
    fn set_pinned(&mut self, object: &ObjectRef, pinned: bool);
}

/// The running simulation
pub trait SpawnHost: HostCatalog {
    fn map_name(&self) -> String;
    /// World time in seconds (pauses with the game)
    fn world_time(&self) -> f32;
    fn dens(&self) -> Vec<Den>;
    fn set_den_radius(&mut self, den: DenId, radius: f32);
    fn den_game_stage(&self, den: DenId) -> Option<u32>;
    /// Host-weighted factory pick from a collection for a difficulty stage
    fn pick_factory(
        &mut self,
        collection: &CollectionId,
        den: DenId,
        game_stage: u32,
        rarity: u32,
    ) -> Option<FactoryId>;

    fn player(&self) -> Option<PlayerState>;

    fn spawn(&mut self, request: &SpawnRequest) -> Option<ActorHandle>;
    fn play_spawn_animation(&mut self, point: PointId, actor: ActorHandle);
    fn set_allegiance(&mut self, actor: ActorHandle, allegiance: &Allegiance);
    fn music_threat(&self, actor: ActorHandle) -> Option<f32>;
    fn set_music_threat(&mut self, actor: ActorHandle, threat: f32);
    fn target_player(&mut self, actor: ActorHandle);
    fn provoke_den(&mut self, den: DenId);

    fn actor_cost_cap(&self) -> Option<f32>;
    fn set_actor_cost_cap(&mut self, cap: f32);
}
