//! # Weight Configuration
//!
//! Relative importance of profession, experience and skills for the scoring
//! worker. The dashboard edits integer percents that must total exactly 100;
//! the wire carries fractions that must total 1.0 within a small tolerance.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{defaults, WEIGHT_PERCENT_TOTAL, WEIGHT_SUM_TOLERANCE};
use crate::error::{ProcessingError, ProcessingResult};

/// Integer percent weights as entered in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightConfig {
    pub profession: u32,
    pub experience: u32,
    pub skills: u32,
}

impl WeightConfig {
    pub fn new(profession: u32, experience: u32, skills: u32) -> Self {
        Self {
            profession,
            experience,
            skills,
        }
    }

    /// Sum of the three weights, saturating at `u32::MAX`
    pub fn total(&self) -> u32 {
        self.profession
            .saturating_add(self.experience)
            .saturating_add(self.skills)
    }

    /// Each weight at most 100 and the three summing to exactly 100
    pub fn validate(&self) -> ProcessingResult<()> {
        for (name, value) in [
            ("profession", self.profession),
            ("experience", self.experience),
            ("skills", self.skills),
        ] {
            if value > WEIGHT_PERCENT_TOTAL {
                return Err(ProcessingError::InvalidWeights(format!(
                    "{name} weight {value} exceeds {WEIGHT_PERCENT_TOTAL}"
                )));
            }
        }

        let total = self.total();
        if total != WEIGHT_PERCENT_TOTAL {
            return Err(ProcessingError::InvalidWeights(format!(
                "weights must sum to exactly {WEIGHT_PERCENT_TOTAL}%, got {total}%"
            )));
        }

        Ok(())
    }

    /// Validated conversion to wire fractions
    pub fn to_fractions(&self) -> ProcessingResult<WeightFractions> {
        self.validate()?;
        let scale = f64::from(WEIGHT_PERCENT_TOTAL);
        Ok(WeightFractions {
            profession: f64::from(self.profession) / scale,
            experience: f64::from(self.experience) / scale,
            skills: f64::from(self.skills) / scale,
        })
    }
}

impl From<WeightPreset> for WeightConfig {
    fn from(preset: WeightPreset) -> Self {
        preset.weights()
    }
}

impl fmt::Display for WeightConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "profession {}% / experience {}% / skills {}%",
            self.profession, self.experience, self.skills
        )
    }
}

/// Named weight presets offered by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightPreset {
    Standard,
    ExperienceFocused,
    SkillsFocused,
    ProfessionFocused,
}

impl WeightPreset {
    pub const ALL: [WeightPreset; 4] = [
        Self::Standard,
        Self::ExperienceFocused,
        Self::SkillsFocused,
        Self::ProfessionFocused,
    ];

    pub fn weights(&self) -> WeightConfig {
        match self {
            Self::Standard => WeightConfig::new(33, 33, 34),
            Self::ExperienceFocused => WeightConfig::new(20, 60, 20),
            Self::SkillsFocused => WeightConfig::new(20, 20, 60),
            Self::ProfessionFocused => WeightConfig::new(60, 20, 20),
        }
    }
}

/// Fractional weights carried on the wire (`weights` object of the worker call)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightFractions {
    pub profession: f64,
    pub experience: f64,
    pub skills: f64,
}

impl Default for WeightFractions {
    fn default() -> Self {
        Self {
            profession: defaults::PROFESSION_WEIGHT,
            experience: defaults::EXPERIENCE_WEIGHT,
            skills: defaults::SKILLS_WEIGHT,
        }
    }
}

impl WeightFractions {
    pub fn total(&self) -> f64 {
        self.profession + self.experience + self.skills
    }

    /// Each fraction in [0, 1] and the sum within tolerance of 1.0
    pub fn validate(&self) -> ProcessingResult<()> {
        for (name, value) in [
            ("profession", self.profession),
            ("experience", self.experience),
            ("skills", self.skills),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ProcessingError::InvalidWeights(format!(
                    "{name} weight {value} is outside [0, 1]"
                )));
            }
        }

        let total = self.total();
        if (total - 1.0).abs() >= WEIGHT_SUM_TOLERANCE {
            return Err(ProcessingError::InvalidWeights(format!(
                "weights must sum to 1.0, got {total:.3}"
            )));
        }

        Ok(())
    }
}
