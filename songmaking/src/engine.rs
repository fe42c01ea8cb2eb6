// The generation engine: the single external call of the crate.
//
// `MelodyEngine` owns a validated `GenerationConfig` and the Markov model
// trained for it (training happens once, at construction). Each
// `generate` call:
//   1. validates the context, structure spec, and pitch constraint
//   2. drops an inactive structure spec so it behaves exactly like none
//   3. dispatches on `Method` to one of the three generators, wrapped in the
//      constraint loop when a pitch constraint is given
//   4. scores the result (when it has sounding notes)
//
// The engine holds no mutable state, so one engine can serve any number of
// concurrent callers.

use crate::config::GenerationConfig;
use crate::constraint::{ConstraintInfo, PitchConstraint, generate_with_constraint};
use crate::context::HarmonicContext;
use crate::error::{ConfigError, GenerateError};
use crate::generator::{MelodyGenerator, Method};
use crate::markov::{MarkovGenerator, MarkovModel};
use crate::melody::Candidate;
use crate::random::RandomGenerator;
use crate::scored::ScoredGenerator;
use crate::scoring::{Score, score};
use crate::structure::StructureSpec;
use serde::{Deserialize, Serialize};

/// Everything one generation call needs besides the engine's config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub context: HarmonicContext,
    pub method: Method,
    pub seed: u64,
    #[serde(default)]
    pub structure: Option<StructureSpec>,
    #[serde(default)]
    pub constraint: Option<PitchConstraint>,
}

impl GenerationRequest {
    pub fn new(context: HarmonicContext, method: Method, seed: u64) -> Self {
        GenerationRequest {
            context,
            method,
            seed,
            structure: None,
            constraint: None,
        }
    }

    pub fn with_structure(mut self, structure: StructureSpec) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_constraint(mut self, constraint: PitchConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// The structure spec, if it asks for anything.
    pub fn active_structure(&self) -> Option<&StructureSpec> {
        self.structure.as_ref().filter(|s| s.is_active())
    }
}

/// Result of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub method: Method,
    pub seed: u64,
    pub candidate: Candidate,
    /// Absent when the melody has no sounding notes.
    pub score: Option<Score>,
    pub constraint: Option<ConstraintInfo>,
}

pub struct MelodyEngine {
    config: GenerationConfig,
    model: MarkovModel,
}

impl MelodyEngine {
    /// Validate `config` and train the Markov model for its n-gram order.
    pub fn new(config: &GenerationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let model = MarkovModel::train(config.ngram_order)?;
        log::debug!(
            "engine: trained order-{} model ({} pitch contexts, {} duration contexts)",
            model.order(),
            model.pitch_table().contexts(),
            model.duration_table().contexts(),
        );
        Ok(MelodyEngine {
            config: config.clone(),
            model,
        })
    }

    /// Use a previously trained model instead of training one.
    pub fn with_model(config: &GenerationConfig, model: MarkovModel) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(MelodyEngine {
            config: config.clone(),
            model,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn model(&self) -> &MarkovModel {
        &self.model
    }

    fn generator(&self, method: Method) -> Box<dyn MelodyGenerator + '_> {
        match method {
            Method::Random => Box::new(RandomGenerator::new(&self.config)),
            Method::Scored => Box::new(ScoredGenerator::new(&self.config)),
            Method::Markov => Box::new(MarkovGenerator::new(&self.model)),
        }
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerateError> {
        request.context.validate()?;
        if let Some(structure) = &request.structure {
            structure.validate()?;
        }
        if let Some(constraint) = &request.constraint {
            constraint.validate()?;
        }
        let structure = request.active_structure();
        let generator = self.generator(request.method);

        let (candidate, constraint) = match &request.constraint {
            Some(constraint) => {
                let (candidate, info) = generate_with_constraint(
                    generator.as_ref(),
                    &request.context,
                    request.seed,
                    structure,
                    constraint,
                )?;
                (candidate, Some(info))
            }
            None => (
                generator.generate(&request.context, request.seed, structure)?,
                None,
            ),
        };

        let score = (!candidate.melody.sounding_pitches().is_empty())
            .then(|| score(&candidate.melody, &request.context, structure, &self.config.scoring));
        log::debug!(
            "engine: {} seed {} -> {} events, score {:?}",
            generator.method(),
            request.seed,
            candidate.melody.len(),
            score.as_ref().map(|s| s.total),
        );

        Ok(GenerationOutput {
            method: request.method,
            seed: request.seed,
            candidate,
            score,
            constraint,
        })
    }
}

/// One-shot generation with a fresh engine.
pub fn generate(
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, GenerateError> {
    MelodyEngine::new(config)?.generate(request)
}
