//! Per-map cache of which spawn definitions are legal at which den
//!
//! Built once on map load. Definitions are loaded against the map's catalog
//! into an arena owned by the registry; each den refers to them by index.

use ahash::AHashMap;
use tracing::{debug, info, trace};

use super::Den;
use crate::content::SubstitutionIndex;
use crate::core::config::{AmbientConfig, ContentFilters, SpawnScope, DEN_RADIUS_SCALE};
use crate::core::types::{CollectionId, DenId, PointId};
use crate::definition::{DefinitionCatalog, SpawnDefinition};
use crate::host::SpawnHost;

/// Index of a loaded definition inside a [`DenRegistry`]
pub type DefinitionIdx = usize;

/// What one den may spawn during this map session
#[derive(Debug, Clone)]
pub struct DenSpawnInfo {
    pub den: Den,
    /// Definition built from the den's own native collection; `None` when
    /// that collection can't be used for ambient spawns
    pub native: Option<DefinitionIdx>,
    /// Native definitions (per scope) that fit this den's points
    pub level: Vec<DefinitionIdx>,
    /// Authored definitions that fit this den's points
    pub custom: Vec<DefinitionIdx>,
    /// Compatible definitions allowed to spawn in view from blank points
    pub fov_exempt: Vec<DefinitionIdx>,
    pub blank_points: Vec<PointId>,
}

impl DenSpawnInfo {
    pub fn id(&self) -> DenId {
        self.den.id
    }

    pub fn fov_exempt_available(&self) -> bool {
        !self.blank_points.is_empty() && !self.fov_exempt.is_empty()
    }
}

/// Admission filter for dens
pub fn admits(den: &Den, filters: &ContentFilters) -> bool {
    if den.location.is_none() || den.points.is_empty() || den.critical {
        return false;
    }
    match &den.allegiance {
        Some(allegiance) if !filters.denied_allegiances.contains(allegiance) => {}
        _ => return false,
    }
    if let Some(region) = &den.region {
        if filters.denied_regions.iter().any(|r| r == region) {
            return false;
        }
    }
    if let Some(native) = &den.native {
        if filters.denied_collections.contains(native) {
            return false;
        }
    }
    true
}

#[derive(Debug, Clone, Default)]
pub struct DenRegistry {
    definitions: Vec<SpawnDefinition>,
    dens: Vec<DenSpawnInfo>,
}

impl DenRegistry {
    /// Enumerate admitted dens and bind every eligible definition.
    ///
    /// Admitted dens get their radius widened through the host.
    pub fn build<H: SpawnHost + ?Sized>(
        host: &mut H,
        catalog: &DefinitionCatalog,
        config: &AmbientConfig,
        index: &SubstitutionIndex,
    ) -> Self {
        let map_name = host.map_name();
        let mut admitted: Vec<Den> = host
            .dens()
            .into_iter()
            .filter(|den| {
                let ok = admits(den, &config.filters);
                if !ok {
                    trace!(den = den.id.0, "Den not admitted");
                }
                ok
            })
            .collect();

        for den in &mut admitted {
            den.radius *= DEN_RADIUS_SCALE;
            host.set_den_radius(den.id, den.radius);
        }

        let mut definitions = Vec::new();

        // Natives, one per distinct collection
        let mut natives: AHashMap<CollectionId, DefinitionIdx> = AHashMap::new();
        let mut native_order = Vec::new();
        for den in &admitted {
            let Some(collection) = &den.native else {
                continue;
            };
            if natives.contains_key(collection) {
                continue;
            }
            if let Some(def) = SpawnDefinition::from_native(&*host, collection, index) {
                natives.insert(collection.clone(), definitions.len());
                native_order.push(definitions.len());
                definitions.push(def);
            } else {
                debug!(collection = %collection, "Native collection unusable for ambient spawns");
            }
        }

        let customs = Self::load_customs(&*host, &map_name, catalog, config.scope, index, &mut definitions);

        let dens: Vec<DenSpawnInfo> = admitted
            .into_iter()
            .map(|den| {
                let native = den.native.as_ref().and_then(|c| natives.get(c).copied());
                let level: Vec<DefinitionIdx> = match config.scope {
                    SpawnScope::Den => native.into_iter().collect::<Vec<_>>(),
                    _ => native_order.clone(),
                }
                .into_iter()
                .filter(|&i| definitions[i].supports(&den))
                .collect();
                let custom: Vec<DefinitionIdx> = customs
                    .iter()
                    .copied()
                    .filter(|&i| definitions[i].supports(&den))
                    .collect();
                let fov_exempt = level
                    .iter()
                    .chain(custom.iter())
                    .copied()
                    .filter(|&i| definitions[i].ignore_fov)
                    .collect();
                let blank_points = den.blank_points().map(|p| p.id).collect();
                DenSpawnInfo {
                    den,
                    native,
                    level,
                    custom,
                    fov_exempt,
                    blank_points,
                }
            })
            .collect();

        info!(
            map = %map_name,
            dens = dens.len(),
            definitions = definitions.len(),
            scope = ?config.scope,
            "Built den registry"
        );
        Self { definitions, dens }
    }

    fn load_customs<H: SpawnHost + ?Sized>(
        host: &H,
        map_name: &str,
        catalog: &DefinitionCatalog,
        scope: SpawnScope,
        index: &SubstitutionIndex,
        definitions: &mut Vec<SpawnDefinition>,
    ) -> Vec<DefinitionIdx> {
        let candidates: Vec<&SpawnDefinition> = match scope {
            SpawnScope::Den | SpawnScope::Level => Vec::new(),
            SpawnScope::Pack => match catalog.pack_for_map(map_name) {
                Some(pack) => catalog.definitions_for(&pack.id).iter().collect(),
                None => {
                    debug!(map = %map_name, "Map belongs to no content pack");
                    Vec::new()
                }
            },
            SpawnScope::Global => catalog.all_definitions().collect(),
        };

        let mut loaded = Vec::new();
        for def in candidates {
            let mut def = def.clone();
            if def.load(map_name, host, index) {
                loaded.push(definitions.len());
                definitions.push(def);
            } else {
                trace!(definition = %def.name, "Custom spawn not available in this map");
            }
        }
        loaded
    }

    pub fn dens(&self) -> &[DenSpawnInfo] {
        &self.dens
    }

    pub fn info(&self, den: DenId) -> Option<&DenSpawnInfo> {
        self.dens.iter().find(|d| d.den.id == den)
    }

    pub fn definition(&self, idx: DefinitionIdx) -> Option<&SpawnDefinition> {
        self.definitions.get(idx)
    }

    pub fn definitions(&self) -> &[SpawnDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.dens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dens.is_empty()
    }
}
