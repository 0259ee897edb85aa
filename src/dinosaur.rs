//! Dinosaur progression: experience, levels and hunger.
//!
//! Walking feeds the pet experience at one point per step. Every level is
//! 100 experience wide; level N covers `[(N-1)*100, N*100)`. Feeding raises
//! hunger (satiety) up to a cap of 100.

use serde::{Deserialize, Serialize};

/// Experience needed to advance one level.
pub const EXPERIENCE_PER_LEVEL: u64 = 100;

/// Satiety ceiling.
pub const MAX_HUNGER: u32 = 100;

/// Nutrition granted by a plant when none is specified.
pub const DEFAULT_NUTRITION: u32 = 20;

/// Experience earned for a number of steps.
pub fn experience_for_steps(steps: u64) -> u64 {
    steps
}

/// Level reached with `experience` points (levels start at 1).
pub fn level_for_experience(experience: u64) -> u32 {
    (experience / EXPERIENCE_PER_LEVEL + 1).min(u32::MAX as u64) as u32
}

/// Outcome of granting experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperienceGain {
    pub gained: u64,
    pub previous_level: u32,
    pub new_level: u32,
}

impl ExperienceGain {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.previous_level
    }
}

/// A user's pet dinosaur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dinosaur {
    pub name: String,
    pub level: u32,
    pub experience: u64,
    /// Satiety in 0..=100.
    pub hunger: u32,
}

impl Dinosaur {
    /// A freshly hatched dinosaur.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 1,
            experience: 0,
            hunger: MAX_HUNGER,
        }
    }

    /// Experience at which the next level starts.
    pub fn next_level_experience(&self) -> u64 {
        self.level as u64 * EXPERIENCE_PER_LEVEL
    }

    /// Progress through the current level, 0.0 to 100.0.
    pub fn level_progress_percent(&self) -> f64 {
        let level_start = self.next_level_experience() - EXPERIENCE_PER_LEVEL;
        let into_level = self.experience as f64 - level_start as f64;
        (into_level / EXPERIENCE_PER_LEVEL as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Add experience and recompute the level.
    pub fn gain_experience(&mut self, experience: u64) -> ExperienceGain {
        let previous_level = self.level;
        self.experience = self.experience.saturating_add(experience);
        self.level = level_for_experience(self.experience);
        ExperienceGain {
            gained: experience,
            previous_level,
            new_level: self.level,
        }
    }

    /// Feed the dinosaur a plant. Returns the new hunger value.
    pub fn feed(&mut self, nutrition: u32) -> u32 {
        self.hunger = self.hunger.saturating_add(nutrition).min(MAX_HUNGER);
        self.hunger
    }
}
