// Generation configuration: the tunable knobs shared by all generators.
//
// Every field has a default, so a JSON config file only needs to name the
// values it changes. `load` reads and validates in one step; the engine also
// validates before generating, so a config built in code is checked too.

use crate::error::{ConfigError, LoadError};
use crate::scoring::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chance that a random-generator step emits a rest.
    pub rest_probability: f64,
    /// Chance that a drawn pitch is lifted an octave.
    pub octave_jump_chance: f64,
    /// Chance that the next pitch is drawn from the scale neighbours of the
    /// previous sounding pitch rather than the whole scale set.
    pub step_preference: f64,
    /// Candidates built by the scored generator.
    pub candidate_count: usize,
    /// Context length of the Markov transition tables.
    pub ngram_order: usize,
    pub scoring: ScoringWeights,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            rest_probability: 0.15,
            octave_jump_chance: 0.03,
            step_preference: 0.6,
            candidate_count: 10,
            ngram_order: 2,
            scoring: ScoringWeights::default(),
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("rest_probability", self.rest_probability),
            ("octave_jump_chance", self.octave_jump_chance),
            ("step_preference", self.step_preference),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::BadProbability { name, value });
            }
        }
        if self.candidate_count == 0 {
            return Err(ConfigError::ZeroCandidates);
        }
        if self.ngram_order == 0 {
            return Err(ConfigError::ZeroNgramOrder);
        }
        Ok(())
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read_to_string(path)?;
        let config: GenerationConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }
}
