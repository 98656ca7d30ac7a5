//! Severity tags and their selection weights

use serde::{Deserialize, Serialize};

/// Coarse strength classification of an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    #[default]
    Chump,
    Medium,
    Badass,
    UltimateBadass,
    Miniboss,
    Boss,
}

impl Tag {
    pub const ALL: [Tag; 6] = [
        Tag::Chump,
        Tag::Medium,
        Tag::Badass,
        Tag::UltimateBadass,
        Tag::Miniboss,
        Tag::Boss,
    ];
}

/// Relative chance of picking a definition by its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagWeights {
    pub chump: u32,
    pub medium: u32,
    pub badass: u32,
    pub ultimate_badass: u32,
    pub miniboss: u32,
    pub boss: u32,
}

impl Default for TagWeights {
    fn default() -> Self {
        Self {
            chump: 30,
            medium: 30,
            badass: 20,
            ultimate_badass: 10,
            miniboss: 10,
            boss: 3,
        }
    }
}

impl TagWeights {
    pub fn get(&self, tag: Tag) -> u32 {
        match tag {
            Tag::Chump => self.chump,
            Tag::Medium => self.medium,
            Tag::Badass => self.badass,
            Tag::UltimateBadass => self.ultimate_badass,
            Tag::Miniboss => self.miniboss,
            Tag::Boss => self.boss,
        }
    }

    pub fn set(&mut self, tag: Tag, weight: u32) {
        let slot = match tag {
            Tag::Chump => &mut self.chump,
            Tag::Medium => &mut self.medium,
            Tag::Badass => &mut self.badass,
            Tag::UltimateBadass => &mut self.ultimate_badass,
            Tag::Miniboss => &mut self.miniboss,
            Tag::Boss => &mut self.boss,
        };
        *slot = weight;
    }

    pub fn weight(&self, tag: Tag) -> f32 {
        self.get(tag) as f32
    }
}
