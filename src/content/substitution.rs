//! Mega-mix substitution index
//!
//! Pools of factories from different content packs that spawn
//! interchangeable enemies (same body class). At resolution time a chosen
//! factory whose template appears in a pool can be swapped for any member.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use crate::core::types::{BodyTag, FactoryId, TemplateId};
use crate::host::HostCatalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitute {
    pub template: TemplateId,
    pub factory: FactoryId,
}

#[derive(Debug, Clone, Default)]
pub struct SubstitutionIndex {
    pools: Vec<Vec<Substitute>>,
}

impl SubstitutionIndex {
    /// Resolve configured equivalence pools against the loaded catalog.
    ///
    /// Entries that don't resolve, spawn no pawn template, or disagree with
    /// the pool's first body class are dropped. Pools left with fewer than
    /// two members are dropped.
    pub fn build<C: HostCatalog + ?Sized>(catalog: &C, pools: &[Vec<FactoryId>]) -> Self {
        let mut resolved = Vec::new();
        for pool in pools {
            let mut members = Vec::new();
            let mut pool_body: Option<Option<BodyTag>> = None;
            for factory_id in pool {
                let Some(info) = catalog.factory(factory_id) else {
                    trace!(factory = %factory_id, "Mega-mix factory not loaded");
                    continue;
                };
                let Some(template) = info.template else {
                    trace!(factory = %factory_id, "Mega-mix factory spawns no pawn template");
                    continue;
                };
                match &pool_body {
                    None => pool_body = Some(info.body.clone()),
                    Some(body) if *body != info.body => {
                        trace!(factory = %factory_id, "Mega-mix factory body class differs from pool");
                        continue;
                    }
                    Some(_) => {}
                }
                members.push(Substitute {
                    template,
                    factory: info.id,
                });
            }
            if members.len() > 1 {
                resolved.push(members);
            }
        }
        debug!(pools = resolved.len(), "Built mega-mix substitution index");
        Self { pools: resolved }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn pool(&self, index: usize) -> Option<&[Substitute]> {
        self.pools.get(index).map(Vec::as_slice)
    }

    /// Pools containing any of the given templates
    pub fn pools_for_templates(&self, templates: &[TemplateId]) -> Vec<usize> {
        self.pools
            .iter()
            .enumerate()
            .filter(|(_, pool)| pool.iter().any(|s| templates.contains(&s.template)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Swap the factory through each relevant pool that contains its
    /// template. Unknown factories come back unchanged.
    pub fn substitute<C: HostCatalog + ?Sized, R: Rng + ?Sized>(
        &self,
        factory: FactoryId,
        relevant: &[usize],
        catalog: &C,
        rng: &mut R,
    ) -> FactoryId {
        let mut current = factory;
        for &index in relevant {
            let Some(pool) = self.pools.get(index) else {
                continue;
            };
            let Some(template) = catalog.factory(&current).and_then(|f| f.template) else {
                break;
            };
            if pool.iter().any(|s| s.template == template) {
                if let Some(pick) = pool.choose(rng) {
                    trace!(from = %current, to = %pick.factory, "Mega-mix substitution");
                    current = pick.factory.clone();
                }
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::host::FactoryInfo;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn host() -> MemoryHost {
        let mut host = MemoryHost::new("Test_P");
        host.add_factory(FactoryInfo::pawn("Base_Bruiser", "AI_Bruiser", Some(BodyTag::from("Bruiser"))));
        host.add_factory(FactoryInfo::pawn("Dlc_Bruiser", "AI_BikerBruiser", Some(BodyTag::from("Bruiser"))));
        host.add_factory(FactoryInfo::pawn("Odd_Midget", "AI_Midget", Some(BodyTag::from("Midget"))));
        let mut prop = FactoryInfo::pawn("Barrel", "unused", None);
        prop.template = None;
        host.add_factory(prop);
        host
    }

    #[test]
    fn test_build_filters_members() {
        let host = host();
        let pools = vec![
            vec![
                FactoryId::from("Base_Bruiser"),
                FactoryId::from("Missing"),
                FactoryId::from("Odd_Midget"),
                FactoryId::from("Barrel"),
                FactoryId::from("Dlc_Bruiser"),
            ],
            // Only one resolvable member
            vec![FactoryId::from("Odd_Midget"), FactoryId::from("Missing")],
        ];
        let index = SubstitutionIndex::build(&host, &pools);
        assert_eq!(index.len(), 1);
        let members: Vec<&str> = index.pool(0).unwrap().iter().map(|s| s.factory.as_str()).collect();
        assert_eq!(members, vec!["Base_Bruiser", "Dlc_Bruiser"]);
    }

    #[test]
    fn test_substitute_stays_in_pool() {
        let host = host();
        let pools = vec![vec![FactoryId::from("Base_Bruiser"), FactoryId::from("Dlc_Bruiser")]];
        let index = SubstitutionIndex::build(&host, &pools);
        let relevant = index.pools_for_templates(&[TemplateId::from("AI_Bruiser")]);
        assert_eq!(relevant, vec![0]);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut saw_dlc = false;
        for _ in 0..50 {
            let out = index.substitute(FactoryId::from("Base_Bruiser"), &relevant, &host, &mut rng);
            assert!(out.as_str() == "Base_Bruiser" || out.as_str() == "Dlc_Bruiser");
            saw_dlc |= out.as_str() == "Dlc_Bruiser";
        }
        assert!(saw_dlc);

        let untouched = index.substitute(FactoryId::from("Odd_Midget"), &relevant, &host, &mut rng);
        assert_eq!(untouched.as_str(), "Odd_Midget");
    }
}
