//! Paced draining of a placed composition

use std::collections::VecDeque;

use crate::core::config::STACKED_SPAWN_DELAY;
use crate::core::types::DenId;
use super::allocator::PlacedSpawn;

/// The in-flight composition of one den
#[derive(Debug, Clone)]
pub struct SpawnDelayQueue {
    den: DenId,
    pending: VecDeque<PlacedSpawn>,
    last_pop: f32,
    /// Wait after the last popped spawn; zero until the first pop
    current_delay: f32,
}

impl SpawnDelayQueue {
    /// The first spawn is due as soon as the queue is polled
    pub fn new(den: DenId, spawns: Vec<PlacedSpawn>, now: f32) -> Self {
        Self {
            den,
            pending: spawns.into(),
            last_pop: now,
            current_delay: 0.0,
        }
    }

    pub fn den(&self) -> DenId {
        self.den
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn current_delay(&self) -> f32 {
        self.current_delay
    }

    pub fn is_due(&self, now: f32) -> bool {
        now - self.last_pop >= self.current_delay
    }

    /// Take the next spawn and start its wait.
    ///
    /// The wait is the spawn's own delay, stretched by
    /// [`STACKED_SPAWN_DELAY`] when the following spawn uses the same point.
    pub fn pop(&mut self, now: f32) -> Option<PlacedSpawn> {
        let spawn = self.pending.pop_front()?;
        let stacked = self
            .pending
            .front()
            .map_or(false, |next| next.point == spawn.point);
        self.current_delay = if stacked {
            spawn.delay + STACKED_SPAWN_DELAY
        } else {
            spawn.delay
        };
        self.last_pop = now;
        Some(spawn)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
