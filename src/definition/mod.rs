//! Spawn definitions: what an encounter is made of
//!
//! A definition is a small tree. Leaves spawn a random number of one
//! factory (or of a template collection), pools draw a few children with
//! replacement, and multis spawn every child a fixed number of times.
//!
//! Each map load binds the tree to the loaded catalog with
//! [`SpawnDefinition::load`]. Anything that fails to bind is left out of
//! its parent's draws until the next map load.

pub mod catalog;
pub mod leaf;
pub mod tag;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::content::SubstitutionIndex;
use crate::core::types::{CollectionId, DenId, FactoryId};
use crate::core::weighted;
use crate::den::Den;
use crate::host::{HostCatalog, SpawnHost};

pub use catalog::DefinitionCatalog;
pub use leaf::{flatten_collection, LeafSource, LeafSpawn};
pub use tag::{Tag, TagWeights};

/// Default delay between consecutive spawns of a definition (seconds)
pub const DEFAULT_SPAWN_DELAY: f32 = 0.5;

/// Authoring mistakes caught when a definition is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("{name}: {counts} spawn counts but {weights} count weights")]
    CountWeightMismatch {
        name: String,
        counts: usize,
        weights: usize,
    },

    #[error("{name}: no spawn counts given")]
    EmptyCounts { name: String },

    #[error("{name}: give either counts or count_range, not both")]
    ConflictingCounts { name: String },

    #[error("{name}: {children} children but {weights} weights")]
    ChildWeightMismatch {
        name: String,
        children: usize,
        weights: usize,
    },

    #[error("{name}: {children} children but {repeats} repeat counts")]
    RepeatMismatch {
        name: String,
        children: usize,
        repeats: usize,
    },

    #[error("{name}: has no children")]
    NoChildren { name: String },

    #[error("{name}: pool draws zero picks")]
    ZeroPicks { name: String },

    #[error("{name}: needs exactly one of factory, collection, pool or multi")]
    AmbiguousKind { name: String },
}

/// Which spawn points a leaf may use
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PointPin {
    /// Any point that can animate the leaf's body class
    #[default]
    Any,
    /// Only blank points (no point definition)
    Blank,
    /// Only points with this point definition
    Named(String),
}

impl PointPin {
    /// Parse the authored form: `"none"` means blank points
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("none") {
            PointPin::Blank
        } else {
            PointPin::Named(value.to_string())
        }
    }
}

/// One resolved unit of an encounter, not yet placed on a point
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnTask {
    pub factory: FactoryId,
    pub pin: PointPin,
    /// Seconds to wait after this spawn before the next one
    pub delay: f32,
}

/// Everything a resolution step may consult
pub struct ResolveContext<'a, H: SpawnHost + ?Sized> {
    pub host: &'a mut H,
    pub rng: &'a mut ChaCha8Rng,
    pub den: DenId,
    pub game_stage: u32,
    /// Present only while mega-mix substitution is enabled
    pub substitution: Option<&'a SubstitutionIndex>,
}

#[derive(Debug, Clone)]
pub enum SpawnKind {
    Leaf(LeafSpawn),
    Pool(PoolSpawn),
    Multi(MultiSpawn),
}

#[derive(Debug, Clone)]
pub struct SpawnDefinition {
    pub name: String,
    pub tag: Tag,
    /// Baseline delay between spawns of each leaf
    pub delay: f32,
    /// Skips the field-of-view check on blank points (cloaked spawns)
    pub ignore_fov: bool,
    /// Lower-cased maps this definition is limited to (empty = all)
    pub map_allow: Vec<String>,
    /// Lower-cased maps this definition never loads in
    pub map_deny: Vec<String>,
    pub kind: SpawnKind,
}

impl SpawnDefinition {
    fn with_kind(name: impl Into<String>, tag: Tag, kind: SpawnKind) -> Self {
        Self {
            name: name.into(),
            tag,
            delay: DEFAULT_SPAWN_DELAY,
            ignore_fov: false,
            map_allow: Vec::new(),
            map_deny: Vec::new(),
            kind,
        }
    }

    /// A leaf spawning between `min(counts)` and `max(counts)` units.
    ///
    /// `count_weights` defaults to uniform and must match `counts` in length.
    pub fn leaf(
        name: impl Into<String>,
        tag: Tag,
        source: LeafSource,
        counts: Vec<u32>,
        count_weights: Option<Vec<u32>>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let leaf = LeafSpawn::new(&name, source, counts, count_weights)?;
        Ok(Self::with_kind(name, tag, SpawnKind::Leaf(leaf)))
    }

    /// A leaf spawning exactly one unit of a factory
    pub fn single(name: impl Into<String>, tag: Tag, factory: impl Into<FactoryId>) -> Self {
        let name = name.into();
        let leaf = LeafSpawn::single(LeafSource::Factory(factory.into()));
        Self::with_kind(name, tag, SpawnKind::Leaf(leaf))
    }

    /// A pool drawing `picks` children with replacement.
    ///
    /// Without explicit weights each child is weighted by its tag.
    pub fn pool(
        name: impl Into<String>,
        tag: Tag,
        children: Vec<SpawnDefinition>,
        weights: Option<Vec<u32>>,
        picks: usize,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        if children.is_empty() {
            return Err(DefinitionError::NoChildren { name });
        }
        if picks == 0 {
            return Err(DefinitionError::ZeroPicks { name });
        }
        let weights = match weights {
            Some(w) if w.len() != children.len() => {
                return Err(DefinitionError::ChildWeightMismatch {
                    name,
                    children: children.len(),
                    weights: w.len(),
                })
            }
            Some(w) => w,
            None => {
                let defaults = TagWeights::default();
                children.iter().map(|c| defaults.get(c.tag)).collect()
            }
        };
        let active = (0..children.len()).collect();
        let pool = PoolSpawn {
            children,
            weights,
            picks,
            active,
        };
        Ok(Self::with_kind(name, tag, SpawnKind::Pool(pool)))
    }

    /// A multi spawning every child `repeat` times
    pub fn multi(
        name: impl Into<String>,
        tag: Tag,
        entries: Vec<(SpawnDefinition, u32)>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        if entries.is_empty() {
            return Err(DefinitionError::NoChildren { name });
        }
        Ok(Self::with_kind(name, tag, SpawnKind::Multi(MultiSpawn { entries })))
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    /// Pin a leaf to a kind of spawn point. No effect on pools and multis,
    /// whose leaves carry their own pins.
    pub fn with_pin(mut self, pin: PointPin) -> Self {
        if let SpawnKind::Leaf(leaf) = &mut self.kind {
            leaf.pin = pin;
        }
        self
    }

    pub fn ignoring_fov(mut self) -> Self {
        self.ignore_fov = true;
        self
    }

    pub fn with_map_allow(mut self, maps: Vec<String>) -> Self {
        self.map_allow = maps.into_iter().map(|m| m.to_lowercase()).collect();
        self
    }

    pub fn with_map_deny(mut self, maps: Vec<String>) -> Self {
        self.map_deny = maps.into_iter().map(|m| m.to_lowercase()).collect();
        self
    }

    /// Allow/deny filtering on the lower-cased map name
    pub fn allowed_in(&self, map_lower: &str) -> bool {
        if !self.map_allow.is_empty() && !self.map_allow.iter().any(|m| m == map_lower) {
            return false;
        }
        !self.map_deny.iter().any(|m| m == map_lower)
    }

    /// Bind to the loaded catalog for this map. Returns whether the
    /// definition is usable here.
    pub fn load<C: HostCatalog + ?Sized>(
        &mut self,
        map_name: &str,
        catalog: &C,
        index: &SubstitutionIndex,
    ) -> bool {
        let map_lower = map_name.to_lowercase();
        if !self.allowed_in(&map_lower) {
            return false;
        }
        match &mut self.kind {
            SpawnKind::Leaf(leaf) => leaf.load(catalog, index),
            SpawnKind::Pool(pool) => pool.load(map_name, catalog, index),
            SpawnKind::Multi(multi) => multi.load(map_name, catalog, index),
        }
    }

    /// Can this definition be spawned at the den's points
    pub fn supports(&self, den: &Den) -> bool {
        match &self.kind {
            SpawnKind::Leaf(leaf) => leaf.supports(den),
            SpawnKind::Pool(pool) => pool.active_children().any(|c| c.supports(den)),
            SpawnKind::Multi(multi) => multi.entries.iter().all(|(c, _)| c.supports(den)),
        }
    }

    /// Expand into concrete spawn tasks
    pub fn resolve<H: SpawnHost + ?Sized>(&self, ctx: &mut ResolveContext<'_, H>) -> Vec<SpawnTask> {
        match &self.kind {
            SpawnKind::Leaf(leaf) => leaf.resolve(self.delay, ctx),
            SpawnKind::Pool(pool) => pool.resolve(ctx),
            SpawnKind::Multi(multi) => multi.resolve(ctx),
        }
    }

    /// The native collection a leaf draws from, if any
    pub fn collection(&self) -> Option<&CollectionId> {
        match &self.kind {
            SpawnKind::Leaf(LeafSpawn {
                source: LeafSource::Collection(id),
                ..
            }) => Some(id),
            _ => None,
        }
    }
}

/// Weighted children drawn with replacement
#[derive(Debug, Clone)]
pub struct PoolSpawn {
    children: Vec<SpawnDefinition>,
    weights: Vec<u32>,
    picks: usize,
    /// Children that loaded for the current map
    active: Vec<usize>,
}

impl PoolSpawn {
    pub fn children(&self) -> &[SpawnDefinition] {
        &self.children
    }

    pub fn picks(&self) -> usize {
        self.picks
    }

    pub fn active_children(&self) -> impl Iterator<Item = &SpawnDefinition> {
        self.active.iter().map(|&i| &self.children[i])
    }

    fn load<C: HostCatalog + ?Sized>(
        &mut self,
        map_name: &str,
        catalog: &C,
        index: &SubstitutionIndex,
    ) -> bool {
        self.active.clear();
        for (i, child) in self.children.iter_mut().enumerate() {
            if child.load(map_name, catalog, index) {
                self.active.push(i);
            }
        }
        !self.active.is_empty()
    }

    fn resolve<H: SpawnHost + ?Sized>(&self, ctx: &mut ResolveContext<'_, H>) -> Vec<SpawnTask> {
        let weights: Vec<f32> = self.active.iter().map(|&i| self.weights[i] as f32).collect();
        let picks = weighted::pick_indices_with_replacement(&weights, self.picks, &mut *ctx.rng);
        let mut tasks = Vec::new();
        for pick in picks {
            let child = &self.children[self.active[pick]];
            tasks.extend(child.resolve(ctx));
        }
        tasks
    }
}

/// Every child, a fixed number of times
#[derive(Debug, Clone)]
pub struct MultiSpawn {
    entries: Vec<(SpawnDefinition, u32)>,
}

impl MultiSpawn {
    pub fn entries(&self) -> &[(SpawnDefinition, u32)] {
        &self.entries
    }

    fn load<C: HostCatalog + ?Sized>(
        &mut self,
        map_name: &str,
        catalog: &C,
        index: &SubstitutionIndex,
    ) -> bool {
        self.entries
            .iter_mut()
            .all(|(child, _)| child.load(map_name, catalog, index))
    }

    fn resolve<H: SpawnHost + ?Sized>(&self, ctx: &mut ResolveContext<'_, H>) -> Vec<SpawnTask> {
        let mut tasks = Vec::new();
        for (child, repeat) in &self.entries {
            for _ in 0..*repeat {
                tasks.extend(child.resolve(ctx));
            }
        }
        tasks
    }
}

/// Jittered delay: `base ± base/3` at centisecond resolution, never negative
pub fn jittered_delay<R: Rng + ?Sized>(base: f32, rng: &mut R) -> f32 {
    let range = (100.0 * base / 3.0) as i32;
    let offset = if range > 0 {
        rng.gen_range(-range..=range)
    } else {
        0
    };
    (base + offset as f32 / 100.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::den::{PointDef, SpawnPoint};
    use crate::host::memory::MemoryHost;
    use crate::core::types::{BodyTag, PointId};
    use glam::Vec3;
    use rand::SeedableRng;

    fn resolve_with(def: &SpawnDefinition, host: &mut MemoryHost, seed: u64) -> Vec<SpawnTask> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ctx = ResolveContext {
            host,
            rng: &mut rng,
            den: DenId(1),
            game_stage: 10,
            substitution: None,
        };
        def.resolve(&mut ctx)
    }

    #[test]
    fn test_leaf_count_weight_mismatch_is_rejected() {
        let result = SpawnDefinition::leaf(
            "Bad",
            Tag::Chump,
            LeafSource::Factory("F".into()),
            vec![1, 2, 3],
            Some(vec![1, 1]),
        );
        assert_eq!(
            result.unwrap_err(),
            DefinitionError::CountWeightMismatch {
                name: "Bad".into(),
                counts: 3,
                weights: 2
            }
        );
    }

    #[test]
    fn test_pool_weight_mismatch_is_rejected() {
        let children = vec![
            SpawnDefinition::single("A", Tag::Chump, "FA"),
            SpawnDefinition::single("B", Tag::Chump, "FB"),
        ];
        let result = SpawnDefinition::pool("P", Tag::Chump, children, Some(vec![1]), 1);
        assert!(matches!(result, Err(DefinitionError::ChildWeightMismatch { .. })));
    }

    #[test]
    fn test_pool_defaults_to_tag_weights() {
        let children = vec![
            SpawnDefinition::single("A", Tag::Chump, "FA"),
            SpawnDefinition::single("B", Tag::Boss, "FB"),
        ];
        let def = SpawnDefinition::pool("P", Tag::Chump, children, None, 1).unwrap();
        match &def.kind {
            SpawnKind::Pool(pool) => assert_eq!(pool.weights, vec![30, 3]),
            _ => panic!("expected pool"),
        }
    }

    #[test]
    fn test_pool_resolves_exactly_k_children() {
        let mut host = MemoryHost::new("Test_P");
        let empty = SpawnDefinition::leaf(
            "Nobody",
            Tag::Chump,
            LeafSource::Factory("FA".into()),
            vec![0],
            None,
        )
        .unwrap();
        let pair = SpawnDefinition::leaf("Pair", Tag::Chump, LeafSource::Factory("FB".into()), vec![2], None)
            .unwrap();
        let def = SpawnDefinition::pool("P", Tag::Chump, vec![empty, pair], Some(vec![1, 1]), 4)
            .unwrap();

        let mut sizes = Vec::new();
        for seed in 0..100 {
            let tasks = resolve_with(&def, &mut host, seed);
            assert!(tasks.iter().all(|t| t.factory.as_str() == "FB"));

            // The pool draws its k children before resolving any of them,
            // so replaying the draw on the same seed gives the exact picks
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let picks = crate::core::weighted::pick_indices_with_replacement(&[1.0, 1.0], 4, &mut rng);
            assert_eq!(picks.len(), 4);
            let pairs = picks.iter().filter(|&&i| i == 1).count();
            assert_eq!(tasks.len(), 2 * pairs, "seed {}", seed);
            sizes.push(tasks.len());
        }
        // Empty picks still use up a draw, so short results occur
        assert!(sizes.iter().any(|&n| n < 8));
        assert!(sizes.iter().any(|&n| n > 0));

        let twos = SpawnDefinition::leaf("Two", Tag::Chump, LeafSource::Factory("FC".into()), vec![2], None)
            .unwrap();
        let def = SpawnDefinition::pool("P2", Tag::Chump, vec![twos], None, 3).unwrap();
        assert_eq!(resolve_with(&def, &mut host, 7).len(), 6);
    }

    #[test]
    fn test_multi_resolves_every_child() {
        let mut host = MemoryHost::new("Test_P");
        let def = SpawnDefinition::multi(
            "Commander",
            Tag::Badass,
            vec![
                (SpawnDefinition::single("Boss", Tag::Badass, "FBoss"), 1),
                (SpawnDefinition::single("Minion", Tag::Chump, "FMinion"), 3),
            ],
        )
        .unwrap();

        for seed in 0..20 {
            let tasks = resolve_with(&def, &mut host, seed);
            assert_eq!(tasks.len(), 4);
            assert_eq!(tasks[0].factory.as_str(), "FBoss");
            assert!(tasks[1..].iter().all(|t| t.factory.as_str() == "FMinion"));
        }
    }

    #[test]
    fn test_jittered_delay_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..1000 {
            let d = jittered_delay(0.5, &mut rng);
            assert!((0.34..=0.67).contains(&d), "delay {}", d);
        }
        assert_eq!(jittered_delay(0.0, &mut rng), 0.0);
    }

    #[test]
    fn test_map_allow_and_deny() {
        let def = SpawnDefinition::single("A", Tag::Chump, "FA")
            .with_map_allow(vec!["Dam_P".into()])
            .with_map_deny(vec!["Frost_P".into()]);
        assert!(def.allowed_in("dam_p"));
        assert!(!def.allowed_in("frost_p"));
        assert!(!def.allowed_in("fyrestone_p"));

        let mut host = MemoryHost::new("Frost_P");
        host.add_factory(crate::host::FactoryInfo::pawn("FA", "AI_A", None));
        let mut def = def;
        assert!(!def.load("Frost_P", &host, &SubstitutionIndex::default()));
    }

    #[test]
    fn test_pool_supports_any_multi_supports_all() {
        let mut host = MemoryHost::new("Test_P");
        host.add_factory(crate::host::FactoryInfo::pawn("FLoader", "AI_Loader", Some(BodyTag::from("Loader"))));
        host.add_factory(crate::host::FactoryInfo::pawn("FSkag", "AI_Skag", Some(BodyTag::from("Skag"))));

        let mut den = Den::new(DenId(1), Vec3::ZERO);
        den.points.push(SpawnPoint::new(
            PointId(1),
            Vec3::ZERO,
            Some(PointDef::new("Drop", vec![BodyTag::from("Loader")])),
        ));

        let loader = SpawnDefinition::single("Loader", Tag::Chump, "FLoader");
        let skag = SpawnDefinition::single("Skag", Tag::Chump, "FSkag");
        let index = SubstitutionIndex::default();

        let mut pool =
            SpawnDefinition::pool("Either", Tag::Chump, vec![loader.clone(), skag.clone()], None, 1)
                .unwrap();
        assert!(pool.load("Test_P", &host, &index));
        assert!(pool.supports(&den));

        let mut multi =
            SpawnDefinition::multi("Both", Tag::Chump, vec![(loader, 1), (skag, 1)]).unwrap();
        assert!(multi.load("Test_P", &host, &index));
        assert!(!multi.supports(&den));
    }

    #[test]
    fn test_pool_excludes_children_that_fail_to_load() {
        let mut host = MemoryHost::new("Test_P");
        host.add_factory(crate::host::FactoryInfo::pawn("FHere", "AI_Here", None));
        let here = SpawnDefinition::single("Here", Tag::Chump, "FHere");
        let missing = SpawnDefinition::single("Missing", Tag::Chump, "FMissing");
        let mut pool =
            SpawnDefinition::pool("P", Tag::Chump, vec![missing, here], Some(vec![100, 1]), 5).unwrap();
        assert!(pool.load("Test_P", &host, &SubstitutionIndex::default()));

        let tasks = resolve_with(&pool, &mut host, 3);
        assert_eq!(tasks.len(), 5);
        assert!(tasks.iter().all(|t| t.factory.as_str() == "FHere"));
    }

    #[test]
    fn test_pin_parse() {
        assert_eq!(PointPin::parse("None"), PointPin::Blank);
        assert_eq!(
            PointPin::parse("PopPointDef_OrbitalDrop"),
            PointPin::Named("PopPointDef_OrbitalDrop".into())
        );
    }
}
