//! Assigning spawn tasks to concrete points
//!
//! Within one composition a point is only reused once every point that
//! could take the task has been used.

use ahash::AHashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::trace;

use crate::core::types::{FactoryId, PointId};
use crate::definition::SpawnTask;
use crate::den::SpawnPoint;

/// A spawn task bound to a point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedSpawn {
    pub factory: FactoryId,
    pub point: PointId,
    /// Seconds to wait after this spawn before the next one
    pub delay: f32,
}

pub struct SpawnPointAllocator<'a> {
    points: Vec<&'a SpawnPoint>,
    used: AHashSet<PointId>,
}

impl<'a> SpawnPointAllocator<'a> {
    /// `points` are the points usable right now
    pub fn new(points: Vec<&'a SpawnPoint>) -> Self {
        Self {
            points,
            used: AHashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Place one task, or `None` when no usable point satisfies its pin
    pub fn allocate<R: Rng + ?Sized>(&mut self, task: &SpawnTask, rng: &mut R) -> Option<PlacedSpawn> {
        let candidates: Vec<&SpawnPoint> = self
            .points
            .iter()
            .copied()
            .filter(|p| p.matches(&task.pin))
            .collect();
        if candidates.is_empty() {
            trace!(factory = %task.factory, pin = ?task.pin, "No point matches task, skipping");
            return None;
        }

        let mut free: Vec<&SpawnPoint> = candidates
            .iter()
            .copied()
            .filter(|p| !self.used.contains(&p.id))
            .collect();
        if free.is_empty() {
            for point in &candidates {
                self.used.remove(&point.id);
            }
            free = candidates;
        }

        let point = free.choose(rng)?;
        self.used.insert(point.id);
        Some(PlacedSpawn {
            factory: task.factory.clone(),
            point: point.id,
            delay: task.delay,
        })
    }

    /// Place every task in order, dropping those that can't be placed
    pub fn allocate_all<R: Rng + ?Sized>(&mut self, tasks: &[SpawnTask], rng: &mut R) -> Vec<PlacedSpawn> {
        tasks.iter().filter_map(|t| self.allocate(t, rng)).collect()
    }
}
