//! Spawn-definition catalogs loaded from TOML pack files
//!
//! One file describes one content pack:
//!
//! ```toml
//! [pack]
//! id = "base"
//! maps = ["Fyrestone_P", "Dam_P"]
//! packages = ["Fyrestone_Combat"]
//!
//! [[spawn]]
//! name = "Helios attacks"
//! tag = "medium"
//! collection = "PopDef_LoaderMix_Regular"
//! count_range = [8, 14]
//! spawn_point = "PopPointDef_OrbitalDrop"
//!
//! [[spawn]]
//! name = "Nomad commander"
//! tag = "badass"
//! repeats = [1, 3]
//!
//! [[spawn.multi]]
//! name = "Big nomad"
//! factory = "PopDef_Nomad_Taskmaster:Factory_0"
//!
//! [[spawn.multi]]
//! name = "Minions"
//! collection = "PopDef_MarauderGrunt"
//! ```
//!
//! Nested `pool` and `multi` children use the same keys as top-level
//! spawns.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use super::{DefinitionError, LeafSource, PointPin, SpawnDefinition, Tag};
use crate::content::{ContentError, ContentPack};
use crate::core::error::{Result, SpawnError};
use crate::core::types::{CollectionId, FactoryId, PackId};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    pack: ContentPack,
    #[serde(default)]
    spawn: Vec<SpawnEntry>,
}

/// Authored form of one definition node
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SpawnEntry {
    name: String,
    #[serde(default)]
    tag: Tag,
    delay: Option<f32>,
    /// Point definition name, or `"none"` for blank points only
    spawn_point: Option<String>,
    #[serde(default)]
    ignore_fov: bool,
    #[serde(default)]
    map_allow: Vec<String>,
    #[serde(default)]
    map_deny: Vec<String>,

    factory: Option<FactoryId>,
    collection: Option<CollectionId>,
    counts: Option<Vec<u32>>,
    /// Inclusive `[min, max]`
    count_range: Option<[u32; 2]>,
    count_weights: Option<Vec<u32>>,

    pool: Option<Vec<SpawnEntry>>,
    pool_weights: Option<Vec<u32>>,
    picks: Option<usize>,

    multi: Option<Vec<SpawnEntry>>,
    repeats: Option<Vec<u32>>,
}

impl SpawnEntry {
    fn into_definition(self) -> std::result::Result<SpawnDefinition, DefinitionError> {
        let kinds = [
            self.factory.is_some(),
            self.collection.is_some(),
            self.pool.is_some(),
            self.multi.is_some(),
        ];
        if kinds.iter().filter(|k| **k).count() != 1 {
            return Err(DefinitionError::AmbiguousKind { name: self.name });
        }

        let name = self.name;
        let mut def = if let Some(children) = self.pool {
            let children = children
                .into_iter()
                .map(SpawnEntry::into_definition)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            SpawnDefinition::pool(&name, self.tag, children, self.pool_weights, self.picks.unwrap_or(1))?
        } else if let Some(children) = self.multi {
            let repeats = match self.repeats {
                Some(r) if r.len() != children.len() => {
                    return Err(DefinitionError::RepeatMismatch {
                        name,
                        children: children.len(),
                        repeats: r.len(),
                    })
                }
                Some(r) => r,
                None => vec![1; children.len()],
            };
            let entries = children
                .into_iter()
                .zip(repeats)
                .map(|(child, repeat)| child.into_definition().map(|c| (c, repeat)))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            SpawnDefinition::multi(&name, self.tag, entries)?
        } else {
            let source = match (self.factory, self.collection) {
                (Some(factory), _) => LeafSource::Factory(factory),
                (_, Some(collection)) => LeafSource::Collection(collection),
                (None, None) => return Err(DefinitionError::AmbiguousKind { name }),
            };
            let counts = match (self.counts, self.count_range) {
                (Some(_), Some(_)) => return Err(DefinitionError::ConflictingCounts { name }),
                (Some(counts), None) => counts,
                (None, Some([min, max])) => (min.min(max)..=max.max(min)).collect(),
                (None, None) => vec![1],
            };
            let def = SpawnDefinition::leaf(&name, self.tag, source, counts, self.count_weights)?;
            match self.spawn_point {
                Some(point) => def.with_pin(PointPin::parse(&point)),
                None => def,
            }
        };

        if let Some(delay) = self.delay {
            def = def.with_delay(delay);
        }
        if self.ignore_fov {
            def = def.ignoring_fov();
        }
        Ok(def.with_map_allow(self.map_allow).with_map_deny(self.map_deny))
    }
}

/// A content pack and the custom definitions authored for it
#[derive(Debug, Clone)]
pub struct PackDefinitions {
    pub pack: ContentPack,
    pub definitions: Vec<SpawnDefinition>,
}

/// Custom spawn definitions grouped by content pack
#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    packs: Vec<PackDefinitions>,
}

impl DefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single pack file
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.add_toml_str(content, "<inline>")?;
        Ok(catalog)
    }

    /// Parse a pack file and add it to the catalog
    pub fn add_toml_str(&mut self, content: &str, origin: &str) -> Result<&PackDefinitions> {
        let file: CatalogFile = toml::from_str(content).map_err(|e| SpawnError::TomlError {
            path: origin.to_string(),
            source: e,
        })?;
        let definitions = file
            .spawn
            .into_iter()
            .map(SpawnEntry::into_definition)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(pack = %file.pack.id, definitions = definitions.len(), "Parsed spawn catalog");
        self.add_pack(file.pack, definitions)
    }

    pub fn add_pack(
        &mut self,
        pack: ContentPack,
        definitions: Vec<SpawnDefinition>,
    ) -> Result<&PackDefinitions> {
        if self.packs.iter().any(|p| p.pack.id == pack.id) {
            return Err(ContentError::DuplicatePack(pack.id).into());
        }
        self.packs.push(PackDefinitions { pack, definitions });
        let idx = self.packs.len() - 1;
        Ok(&self.packs[idx])
    }

    pub fn load_file(&mut self, path: &Path) -> Result<&PackDefinitions> {
        let content = std::fs::read_to_string(path)?;
        self.add_toml_str(&content, &path.display().to_string())
    }

    /// Load every `.toml` pack file in a directory (sorted by file name)
    pub fn load_directory(path: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.extension().map_or(false, |ext| ext == "toml") {
                files.push(entry_path);
            }
        }
        files.sort();

        let mut catalog = Self::new();
        for file in &files {
            catalog.load_file(file)?;
        }
        info!(path = %path.display(), packs = catalog.packs.len(), "Loaded spawn catalogs");
        Ok(catalog)
    }

    pub fn packs(&self) -> impl Iterator<Item = &ContentPack> {
        self.packs.iter().map(|p| &p.pack)
    }

    pub fn pack_for_map(&self, map_name: &str) -> Option<&ContentPack> {
        self.packs().find(|p| p.contains_map(map_name))
    }

    pub fn definitions_for(&self, pack: &PackId) -> &[SpawnDefinition] {
        self.packs
            .iter()
            .find(|p| &p.pack.id == pack)
            .map_or(&[], |p| p.definitions.as_slice())
    }

    pub fn all_definitions(&self) -> impl Iterator<Item = &SpawnDefinition> {
        self.packs.iter().flat_map(|p| p.definitions.iter())
    }

    pub fn len(&self) -> usize {
        self.packs.iter().map(|p| p.definitions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
