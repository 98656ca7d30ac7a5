//! Player-state checks that hold back new encounters

use serde::Serialize;

use crate::core::config::{AmbientConfig, COMBAT_GRACE_SECONDS};
use crate::host::PlayerState;

/// Why a spawn check was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Suppression {
    /// No controllable body (dead, in a vehicle transition, loading)
    NoPawn,
    /// Cutscene, dialog or vendor screen
    MenuBlocked,
    InCombat,
    /// Player left the game running unattended
    Idle,
}

pub fn suppression_reason(config: &AmbientConfig, player: Option<&PlayerState>) -> Option<Suppression> {
    let Some(player) = player else {
        return Some(Suppression::NoPawn);
    };
    if player.menu_blocked {
        return Some(Suppression::MenuBlocked);
    }
    if !config.allow_in_combat {
        if let Some(since) = player.since_combat {
            if since <= COMBAT_GRACE_SECONDS {
                return Some(Suppression::InCombat);
            }
        }
    }
    if player.since_input > config.idle_threshold {
        return Some(Suppression::Idle);
    }
    None
}
