//! Leaf definitions and template-collection flattening

use ahash::AHashSet;
use tracing::trace;

use super::{jittered_delay, DefinitionError, PointPin, ResolveContext, SpawnDefinition, SpawnKind, SpawnTask, Tag};
use crate::content::SubstitutionIndex;
use crate::core::types::{BodyTag, CollectionId, FactoryId};
use crate::core::weighted;
use crate::den::Den;
use crate::host::{CollectionEntry, FactoryInfo, HostCatalog, SpawnHost};

/// Where a leaf's factories come from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LeafSource {
    /// Always this factory
    Factory(FactoryId),
    /// A host-weighted pick from the collection per unit
    Collection(CollectionId),
}

/// Catalog binding made by `load` for the current map
#[derive(Debug, Clone, Default, PartialEq)]
struct LeafBinding {
    factories: Vec<FactoryId>,
    body: Option<BodyTag>,
    /// Indices into the substitution index relevant to this leaf
    substitution_pools: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct LeafSpawn {
    pub source: LeafSource,
    pub pin: PointPin,
    counts: Vec<u32>,
    count_weights: Vec<u32>,
    binding: Option<LeafBinding>,
}

impl LeafSpawn {
    pub(crate) fn new(
        name: &str,
        source: LeafSource,
        counts: Vec<u32>,
        count_weights: Option<Vec<u32>>,
    ) -> Result<Self, DefinitionError> {
        if counts.is_empty() {
            return Err(DefinitionError::EmptyCounts { name: name.into() });
        }
        let count_weights = match count_weights {
            Some(w) if w.len() != counts.len() => {
                return Err(DefinitionError::CountWeightMismatch {
                    name: name.into(),
                    counts: counts.len(),
                    weights: w.len(),
                })
            }
            Some(w) => w,
            None => vec![1; counts.len()],
        };
        Ok(Self {
            source,
            pin: PointPin::Any,
            counts,
            count_weights,
            binding: None,
        })
    }

    pub(crate) fn single(source: LeafSource) -> Self {
        Self {
            source,
            pin: PointPin::Any,
            counts: vec![1],
            count_weights: vec![1],
            binding: None,
        }
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn is_loaded(&self) -> bool {
        self.binding.is_some()
    }

    /// Concrete factories bound by the last successful `load`
    pub fn factories(&self) -> &[FactoryId] {
        self.binding.as_ref().map_or(&[], |b| b.factories.as_slice())
    }

    pub fn body(&self) -> Option<&BodyTag> {
        self.binding.as_ref().and_then(|b| b.body.as_ref())
    }

    /// Draw a unit count from the weighted count distribution
    pub fn draw_count<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let min = self.counts.iter().copied().min().unwrap_or(0);
        let max = self.counts.iter().copied().max().unwrap_or(0);
        if min == max {
            return min;
        }
        let weights: Vec<f32> = self.count_weights.iter().map(|&w| w as f32).collect();
        weighted::pick(&self.counts, &weights, rng)
            .copied()
            .unwrap_or(min)
    }

    pub(crate) fn load<C: HostCatalog + ?Sized>(&mut self, catalog: &C, index: &SubstitutionIndex) -> bool {
        self.binding = None;
        let factories: Vec<FactoryInfo> = match &self.source {
            LeafSource::Factory(id) => match catalog.factory(id) {
                Some(info) => vec![info],
                None => {
                    trace!(factory = %id, "Factory not in this map");
                    return false;
                }
            },
            LeafSource::Collection(id) => {
                if catalog.collection(id).is_none() {
                    trace!(collection = %id, "Collection not in this map");
                    return false;
                }
                flatten_collection(catalog, id)
            }
        };
        let Some(first) = factories.first() else {
            return false;
        };

        let body = first.body.clone();
        let templates: Vec<_> = factories.iter().filter_map(|f| f.template.clone()).collect();
        self.binding = Some(LeafBinding {
            body,
            substitution_pools: index.pools_for_templates(&templates),
            factories: factories.into_iter().map(|f| f.id).collect(),
        });
        true
    }

    pub(crate) fn supports(&self, den: &Den) -> bool {
        let Some(binding) = &self.binding else {
            return false;
        };
        match &self.pin {
            PointPin::Blank => den.has_blank_points(),
            PointPin::Named(_) => den.points.iter().any(|p| p.matches(&self.pin)),
            PointPin::Any => match &binding.body {
                Some(body) => den.points.iter().any(|p| p.animates(body)),
                None => false,
            },
        }
    }

    pub(crate) fn resolve<H: SpawnHost + ?Sized>(
        &self,
        base_delay: f32,
        ctx: &mut ResolveContext<'_, H>,
    ) -> Vec<SpawnTask> {
        let count = self.draw_count(&mut *ctx.rng);
        let mut tasks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let delay = jittered_delay(base_delay, &mut *ctx.rng);
            let chosen = match &self.source {
                LeafSource::Factory(id) => Some(id.clone()),
                LeafSource::Collection(id) => ctx.host.pick_factory(id, ctx.den, ctx.game_stage, 1),
            };
            let Some(mut factory) = chosen else {
                continue;
            };

            if let (Some(index), Some(binding)) = (ctx.substitution, &self.binding) {
                factory = index.substitute(factory, &binding.substitution_pools, &*ctx.host, &mut *ctx.rng);
            }

            tasks.push(SpawnTask {
                factory,
                pin: self.pin.clone(),
                delay,
            });
        }
        tasks
    }
}

/// Every concrete factory reachable from a collection, in declaration
/// order, each once. Nested collections are visited once each, so shared
/// or cyclic sub-collections are safe.
pub fn flatten_collection<C: HostCatalog + ?Sized>(catalog: &C, root: &CollectionId) -> Vec<FactoryInfo> {
    let mut visited: AHashSet<CollectionId> = AHashSet::new();
    let mut seen_factories: AHashSet<FactoryId> = AHashSet::new();
    let mut factories = Vec::new();
    let mut stack = vec![CollectionEntry::Collection(root.clone())];

    while let Some(entry) = stack.pop() {
        match entry {
            CollectionEntry::Factory(id) => {
                if seen_factories.insert(id.clone()) {
                    if let Some(info) = catalog.factory(&id) {
                        factories.push(info);
                    }
                }
            }
            CollectionEntry::Collection(id) => {
                if !visited.insert(id.clone()) {
                    continue;
                }
                if let Some(collection) = catalog.collection(&id) {
                    // Reverse so entries pop in declaration order
                    stack.extend(collection.entries.into_iter().rev());
                }
            }
        }
    }
    factories
}

impl SpawnDefinition {
    /// Build a definition from a den's native collection.
    ///
    /// Returns `None` for collections that are empty or contain anything
    /// critical or non-pawn.
    pub fn from_native<C: HostCatalog + ?Sized>(
        catalog: &C,
        collection: &CollectionId,
        index: &SubstitutionIndex,
    ) -> Option<SpawnDefinition> {
        let info = catalog.collection(collection)?;
        if info.entries.is_empty() {
            return None;
        }
        let factories = flatten_collection(catalog, collection);
        if factories.is_empty() {
            return None;
        }
        if factories.iter().any(|f| f.critical || f.template.is_none()) {
            return None;
        }

        let champions = factories.iter().filter(|f| f.champion).count();
        let badasses = factories.iter().filter(|f| !f.champion && f.badass).count();
        let half = factories.len() as f32 / 2.0;

        let tag = if info.unique {
            Tag::Miniboss
        } else if champions as f32 > half {
            Tag::UltimateBadass
        } else if badasses as f32 > half {
            Tag::Badass
        } else {
            Tag::Chump
        };

        let counts = match tag {
            Tag::Chump => (3..=6).collect(),
            Tag::Badass => (2..=3).collect(),
            _ => vec![1],
        };

        let mut leaf = LeafSpawn::new(
            collection.as_str(),
            LeafSource::Collection(collection.clone()),
            counts,
            None,
        )
        .ok()?;
        if !leaf.load(catalog, index) {
            return None;
        }
        if leaf.body().is_none() {
            leaf.pin = PointPin::Blank;
        }

        Some(SpawnDefinition {
            name: collection.to_string(),
            tag,
            delay: super::DEFAULT_SPAWN_DELAY,
            ignore_fov: false,
            map_allow: Vec::new(),
            map_deny: Vec::new(),
            kind: SpawnKind::Leaf(leaf),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DenId;
    use crate::host::memory::MemoryHost;
    use crate::host::CollectionInfo;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pawn(id: &str, body: Option<&str>) -> FactoryInfo {
        FactoryInfo::pawn(id, format!("AI_{}", id), body.map(BodyTag::from))
    }

    fn collection(id: &str, entries: Vec<CollectionEntry>) -> CollectionInfo {
        CollectionInfo {
            id: CollectionId::from(id),
            entries,
            unique: false,
        }
    }

    #[test]
    fn test_count_draw_is_roughly_even() {
        let leaf = LeafSpawn::new("Pair", LeafSource::Factory("F".into()), vec![2, 3], Some(vec![1, 1]))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let mut twos = 0;
        let trials = 1000;
        for _ in 0..trials {
            match leaf.draw_count(&mut rng) {
                2 => twos += 1,
                3 => {}
                other => panic!("unexpected count {}", other),
            }
        }
        assert!((400..=600).contains(&twos), "twos = {}", twos);
    }

    #[test]
    fn test_fixed_count_skips_draw() {
        let leaf = LeafSpawn::new("One", LeafSource::Factory("F".into()), vec![4, 4], None).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(leaf.draw_count(&mut rng), 4);
    }

    #[test]
    fn test_flatten_handles_nesting_and_cycles() {
        let mut host = MemoryHost::new("Test_P");
        host.add_factory(pawn("F1", Some("Bandit")));
        host.add_factory(pawn("F2", Some("Bandit")));
        host.add_factory(pawn("F3", Some("Midget")));
        host.add_collection(collection(
            "Root",
            vec![
                CollectionEntry::Factory("F1".into()),
                CollectionEntry::Collection("Inner".into()),
                CollectionEntry::Collection("Inner".into()),
                CollectionEntry::Factory("F1".into()),
            ],
        ));
        host.add_collection(collection(
            "Inner",
            vec![
                CollectionEntry::Factory("F2".into()),
                CollectionEntry::Collection("Root".into()),
                CollectionEntry::Factory("F3".into()),
            ],
        ));

        let ids: Vec<String> = flatten_collection(&host, &"Root".into())
            .into_iter()
            .map(|f| f.id.0)
            .collect();
        assert_eq!(ids, vec!["F1", "F2", "F3"]);
    }

    #[test]
    fn test_native_tagging() {
        let mut host = MemoryHost::new("Test_P");
        let mut champ = pawn("Champ", Some("Bandit"));
        champ.champion = true;
        host.add_factory(champ);
        let mut badass = pawn("Badass", Some("Bandit"));
        badass.badass = true;
        host.add_factory(badass);
        host.add_factory(pawn("Grunt", Some("Bandit")));
        host.add_factory(pawn("Ghost", None));

        let index = SubstitutionIndex::default();

        host.add_collection(collection("Grunts", vec![CollectionEntry::Factory("Grunt".into())]));
        let def = SpawnDefinition::from_native(&host, &"Grunts".into(), &index).unwrap();
        assert_eq!(def.tag, Tag::Chump);
        match &def.kind {
            SpawnKind::Leaf(leaf) => {
                assert_eq!(leaf.counts(), &[3, 4, 5, 6]);
                assert_eq!(leaf.pin, PointPin::Any);
            }
            _ => panic!("native definitions are leaves"),
        }

        host.add_collection(collection("Champs", vec![CollectionEntry::Factory("Champ".into())]));
        let def = SpawnDefinition::from_native(&host, &"Champs".into(), &index).unwrap();
        assert_eq!(def.tag, Tag::UltimateBadass);

        host.add_collection(collection(
            "Badasses",
            vec![
                CollectionEntry::Factory("Badass".into()),
                CollectionEntry::Factory("Badass".into()),
            ],
        ));
        let def = SpawnDefinition::from_native(&host, &"Badasses".into(), &index).unwrap();
        assert_eq!(def.tag, Tag::Badass);

        let mut unique = collection("Unique", vec![CollectionEntry::Factory("Grunt".into())]);
        unique.unique = true;
        host.add_collection(unique);
        let def = SpawnDefinition::from_native(&host, &"Unique".into(), &index).unwrap();
        assert_eq!(def.tag, Tag::Miniboss);

        host.add_collection(collection("Ghosts", vec![CollectionEntry::Factory("Ghost".into())]));
        let def = SpawnDefinition::from_native(&host, &"Ghosts".into(), &index).unwrap();
        match &def.kind {
            SpawnKind::Leaf(leaf) => assert_eq!(leaf.pin, PointPin::Blank),
            _ => panic!("native definitions are leaves"),
        }
    }

    #[test]
    fn test_native_rejects_critical_and_empty() {
        let mut host = MemoryHost::new("Test_P");
        let mut critical = pawn("Boss", Some("Bandit"));
        critical.critical = true;
        host.add_factory(critical);
        host.add_collection(collection("Scripted", vec![CollectionEntry::Factory("Boss".into())]));
        host.add_collection(collection("Empty", vec![]));

        let index = SubstitutionIndex::default();
        assert!(SpawnDefinition::from_native(&host, &"Scripted".into(), &index).is_none());
        assert!(SpawnDefinition::from_native(&host, &"Empty".into(), &index).is_none());
        assert!(SpawnDefinition::from_native(&host, &"Missing".into(), &index).is_none());
    }

    #[test]
    fn test_collection_leaf_uses_host_pick() {
        let mut host = MemoryHost::new("Test_P");
        host.add_factory(pawn("F1", Some("Bandit")));
        host.add_collection(collection("Mix", vec![CollectionEntry::Factory("F1".into())]));

        let def = SpawnDefinition::leaf("Mix", Tag::Chump, LeafSource::Collection("Mix".into()), vec![3], None)
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut ctx = ResolveContext {
            host: &mut host,
            rng: &mut rng,
            den: DenId(1),
            game_stage: 1,
            substitution: None,
        };
        let tasks = def.resolve(&mut ctx);
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.factory.as_str() == "F1"));
    }

    #[test]
    fn test_unloaded_leaf_supports_nothing() {
        let leaf = LeafSpawn::single(LeafSource::Factory("F".into()));
        let den = Den::new(DenId(1), glam::Vec3::ZERO);
        assert!(!leaf.supports(&den));
        assert!(!leaf.is_loaded());
    }
}
