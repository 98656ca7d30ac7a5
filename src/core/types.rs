//! Core type definitions used throughout the codebase
//!
//! Everything the host owns (dens, points, factories, spawned actors) is
//! referred to by handle. The scheduler never holds the host's objects.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle to a den in the current map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DenId(pub u32);

/// Handle to a spawn point in the current map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub u32);

/// Handle to an actor the host spawned for us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorHandle(pub Uuid);

impl ActorHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorHandle {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Catalog id of a concrete spawn factory
    FactoryId
);
string_id!(
    /// Catalog id of a template collection (a weighted set of factories)
    CollectionId
);
string_id!(
    /// Catalog id of an entity template (the balance data a factory spawns)
    TemplateId
);
string_id!(
    /// Animation body class of an entity template
    BodyTag
);
string_id!(
    /// Team/allegiance tag of a den or actor
    Allegiance
);
string_id!(
    /// Identifier of a content pack
    PackId
);

/// Engine rotation in 16-bit angle units (65536 per turn)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: i32,
    pub yaw: i32,
    pub roll: i32,
}

impl Rotation {
    /// Angle units per half turn
    pub const HALF_TURN: f32 = 32768.0;

    pub fn from_yaw(yaw: i32) -> Self {
        Self { pitch: 0, yaw, roll: 0 }
    }

    /// Horizontal unit vector this rotation faces along
    pub fn forward_2d(&self) -> Vec2 {
        let radians = self.yaw as f32 * std::f32::consts::PI / Self::HALF_TURN;
        Vec2::new(radians.cos(), radians.sin())
    }
}

/// Distance in the horizontal plane only
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    a.truncate().distance(b.truncate())
}
