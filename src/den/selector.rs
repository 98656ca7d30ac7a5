//! Distance and view-angle gating of dens and points

use glam::{Vec2, Vec3};
use rand::Rng;
use tracing::{debug, trace};

use super::registry::DenRegistry;
use crate::core::config::AmbientConfig;
use crate::core::types::{planar_distance, DenId};
use crate::core::weighted;
use crate::host::PlayerState;

/// Weight of a location that would spawn in plain view with no animation
pub const FOV_BLOCKED: f32 = -1.0;

/// Weight of a location straight behind the player
pub const MIN_VIEW_WEIGHT: f32 = 0.2;

/// Weight of a location straight ahead of the player
pub const MAX_VIEW_WEIGHT: f32 = 1.2;

/// Horizontal view weight of a location.
///
/// With `requires_fov`, anything in front of the player (dot >= 0) is
/// [`FOV_BLOCKED`]. Otherwise `dot + 1` clamped to
/// `[MIN_VIEW_WEIGHT, MAX_VIEW_WEIGHT]`.
pub fn view_weight(player: &PlayerState, location: Vec3, requires_fov: bool) -> f32 {
    let forward = player.view.forward_2d();
    let direction: Vec2 = (location.truncate() - player.position.truncate()).normalize_or_zero();
    let dot = forward.dot(direction);

    if requires_fov && dot >= 0.0 {
        return FOV_BLOCKED;
    }
    (dot + 1.0).clamp(MIN_VIEW_WEIGHT, MAX_VIEW_WEIGHT)
}

/// Picks the den for the next encounter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenSelector {
    pub min_distance: f32,
    pub max_distance: f32,
}

impl DenSelector {
    pub fn new(min_distance: f32, max_distance: f32) -> Self {
        Self {
            min_distance,
            max_distance,
        }
    }

    pub fn from_config(config: &AmbientConfig) -> Self {
        Self::new(config.min_distance, config.max_distance)
    }

    /// Every den in range with its view weight, FOV-blocked ones included
    pub fn candidates(&self, player: &PlayerState, registry: &DenRegistry) -> Vec<(DenId, f32)> {
        registry
            .dens()
            .iter()
            .filter_map(|info| {
                let location = info.den.location?;
                let distance = planar_distance(player.position, location);
                if distance < self.min_distance || distance > self.max_distance {
                    return None;
                }
                let weight = view_weight(player, location, info.den.requires_fov_check());
                trace!(den = info.den.id.0, distance, weight, "Den candidate");
                Some((info.den.id, weight))
            })
            .collect()
    }

    /// Draw one den proportionally to view weight
    pub fn select<R: Rng + ?Sized>(
        &self,
        player: &PlayerState,
        registry: &DenRegistry,
        rng: &mut R,
    ) -> Option<DenId> {
        let candidates = self.candidates(player, registry);
        let weights: Vec<f32> = candidates.iter().map(|(_, w)| *w).collect();
        let chosen = weighted::pick_index(&weights, rng).map(|i| candidates[i].0);
        debug!(candidates = candidates.len(), chosen = ?chosen.map(|d| d.0), "Den selection");
        chosen
    }
}
