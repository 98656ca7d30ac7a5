//! Dens and their spawn points
//!
//! A den is a world location that anchors encounters. Its spawn points are
//! where individual actors materialize; a point may carry a point definition
//! naming the spawn-in animations (by body class) it can play.

pub mod registry;
pub mod selector;

use glam::Vec3;

use crate::core::types::{Allegiance, BodyTag, CollectionId, DenId, PointId, Rotation};
use crate::definition::PointPin;

pub use registry::{DenRegistry, DenSpawnInfo};
pub use selector::{view_weight, DenSelector, FOV_BLOCKED};

/// Animation support of a spawn point
#[derive(Debug, Clone, PartialEq)]
pub struct PointDef {
    pub name: String,
    /// Body classes this point has a spawn-in animation for
    pub bodies: Vec<BodyTag>,
}

impl PointDef {
    pub fn new(name: impl Into<String>, bodies: Vec<BodyTag>) -> Self {
        Self {
            name: name.into(),
            bodies,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPoint {
    pub id: PointId,
    pub location: Option<Vec3>,
    pub rotation: Rotation,
    /// `None` for blank points: anything can spawn, but with no animation
    pub def: Option<PointDef>,
}

impl SpawnPoint {
    pub fn new(id: PointId, location: Vec3, def: Option<PointDef>) -> Self {
        Self {
            id,
            location: Some(location),
            rotation: Rotation::default(),
            def,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.def.is_none()
    }

    /// Can this point play a spawn-in animation for the body class
    pub fn animates(&self, body: &BodyTag) -> bool {
        self.def
            .as_ref()
            .map_or(false, |def| def.bodies.iter().any(|b| b == body))
    }

    /// Does the point satisfy a definition's point pin
    pub fn matches(&self, pin: &PointPin) -> bool {
        match pin {
            PointPin::Any => true,
            PointPin::Blank => self.is_blank(),
            PointPin::Named(name) => self.def.as_ref().map_or(false, |def| &def.name == name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Den {
    pub id: DenId,
    pub location: Option<Vec3>,
    pub points: Vec<SpawnPoint>,
    pub allegiance: Option<Allegiance>,
    /// Difficulty region the den's game stage comes from
    pub region: Option<String>,
    /// The population the den spawns natively
    pub native: Option<CollectionId>,
    pub radius: f32,
    /// Scripted dens that must not be touched
    pub critical: bool,
}

impl Den {
    pub fn new(id: DenId, location: Vec3) -> Self {
        Self {
            id,
            location: Some(location),
            points: Vec::new(),
            allegiance: None,
            region: None,
            native: None,
            radius: 500.0,
            critical: false,
        }
    }

    /// A den whose every point is blank has nothing to hide a spawn behind
    pub fn requires_fov_check(&self) -> bool {
        self.points.iter().all(SpawnPoint::is_blank)
    }

    pub fn blank_points(&self) -> impl Iterator<Item = &SpawnPoint> {
        self.points.iter().filter(|p| p.is_blank())
    }

    pub fn has_blank_points(&self) -> bool {
        self.points.iter().any(SpawnPoint::is_blank)
    }

    pub fn point(&self, id: PointId) -> Option<&SpawnPoint> {
        self.points.iter().find(|p| p.id == id)
    }
}
