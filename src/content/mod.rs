//! Content packs and the pool manager that loads them
//!
//! Packs are loaded in bulk at the main menu when the spawn scope or
//! mega-mix needs enemies from other maps. Loaded templates and factories
//! are pinned so the engine does not reclaim them on map change.

pub mod substitution;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::types::{FactoryId, PackId};
use crate::host::{ContentLoader, HostCatalog, ObjectRef};

pub use substitution::{Substitute, SubstitutionIndex};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    #[error("Unknown content pack: {0}")]
    UnknownPack(PackId),

    #[error("Content pack registered twice: {0}")]
    DuplicatePack(PackId),
}

/// A group of content (base game or an expansion)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPack {
    pub id: PackId,
    /// Maps belonging to this pack
    #[serde(default)]
    pub maps: Vec<String>,
    /// Packages holding the pack's combat content
    #[serde(default)]
    pub packages: Vec<String>,
}

impl ContentPack {
    pub fn new(id: impl Into<PackId>, maps: Vec<String>, packages: Vec<String>) -> Self {
        Self {
            id: id.into(),
            maps,
            packages,
        }
    }

    pub fn contains_map(&self, map_name: &str) -> bool {
        self.maps.iter().any(|m| m.eq_ignore_ascii_case(map_name))
    }
}

/// Loads packs once each and tracks what it pinned
#[derive(Debug, Default)]
pub struct ContentPoolManager {
    packs: AHashMap<PackId, ContentPack>,
    /// Registration order, for deterministic bulk loads
    order: Vec<PackId>,
    loaded: AHashSet<PackId>,
    pinned: AHashSet<ObjectRef>,
    /// Packages actually requested from the host loader
    package_loads: usize,
}

impl ContentPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pack: ContentPack) -> Result<(), ContentError> {
        if self.packs.contains_key(&pack.id) {
            return Err(ContentError::DuplicatePack(pack.id));
        }
        self.order.push(pack.id.clone());
        self.packs.insert(pack.id.clone(), pack);
        Ok(())
    }

    pub fn pack(&self, id: &PackId) -> Option<&ContentPack> {
        self.packs.get(id)
    }

    pub fn packs(&self) -> impl Iterator<Item = &ContentPack> {
        self.order.iter().filter_map(|id| self.packs.get(id))
    }

    /// The pack a map belongs to
    pub fn pack_for_map(&self, map_name: &str) -> Option<&ContentPack> {
        self.packs().find(|p| p.contains_map(map_name))
    }

    pub fn is_loaded(&self, id: &PackId) -> bool {
        self.loaded.contains(id)
    }

    pub fn pinned_count(&self) -> usize {
        self.pinned.len()
    }

    pub fn package_loads(&self) -> usize {
        self.package_loads
    }

    /// Load every package of a pack and pin its templates and factories.
    ///
    /// No-op when the pack is already loaded. Missing packages are skipped.
    pub fn load<L: ContentLoader + ?Sized>(&mut self, id: &PackId, loader: &mut L) -> Result<(), ContentError> {
        let pack = self
            .packs
            .get(id)
            .ok_or_else(|| ContentError::UnknownPack(id.clone()))?;
        if self.loaded.contains(id) {
            debug!(pack = %id, "Content pack already loaded");
            return Ok(());
        }

        for package in &pack.packages {
            self.package_loads += 1;
            if !loader.load_package(package) {
                warn!(pack = %id, package = %package, "Package could not be loaded, skipping");
                continue;
            }
            for object in loader.pinnable_objects() {
                if self.pinned.insert(object.clone()) {
                    loader.set_pinned(&object, true);
                }
            }
        }

        info!(pack = %id, pinned = self.pinned.len(), "Loaded content pack");
        self.loaded.insert(id.clone());
        Ok(())
    }

    /// Load every registered pack
    pub fn load_all<L: ContentLoader + ?Sized>(&mut self, loader: &mut L) {
        let ids = self.order.clone();
        for id in ids {
            // Registered ids always resolve
            if let Err(e) = self.load(&id, loader) {
                warn!(error = %e, "Content pack load failed");
            }
        }
    }

    /// Unpin everything and forget what was loaded
    pub fn unload_all<L: ContentLoader + ?Sized>(&mut self, loader: &mut L) {
        for object in self.pinned.drain() {
            loader.set_pinned(&object, false);
        }
        if !self.loaded.is_empty() {
            info!(packs = self.loaded.len(), "Unloaded content packs");
        }
        self.loaded.clear();
    }

    /// Resolve equivalence pools against whatever is loaded now
    pub fn build_substitution_index<C: HostCatalog + ?Sized>(
        &self,
        catalog: &C,
        pools: &[Vec<FactoryId>],
    ) -> SubstitutionIndex {
        SubstitutionIndex::build(catalog, pools)
    }
}
