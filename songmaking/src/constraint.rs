// Constraint loop: retry a generator until the mean pitch hits a target.
//
// A `ConstraintSession` moves between two states, RETRYING and DONE. Attempt
// `k` runs the wrapped generator with seed `base_seed + k`, so the attempt
// count for a given seed is reproducible. An attempt succeeds when its mean
// sounding pitch lies within `tolerance` of the target; an attempt with no
// sounding notes fails. When the budget runs out the last candidate is
// returned anyway, marked `success: false`, and a warning is logged.

use crate::context::HarmonicContext;
use crate::error::{ConfigError, GenerateError};
use crate::generator::MelodyGenerator;
use crate::melody::{Candidate, Melody};
use crate::stats::mean_pitch;
use crate::structure::StructureSpec;
use serde::{Deserialize, Serialize};

/// Target for the mean sounding pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchConstraint {
    pub target_mean: f64,
    pub tolerance: f64,
    pub max_attempts: usize,
}

impl PitchConstraint {
    pub fn new(target_mean: f64, tolerance: f64, max_attempts: usize) -> Self {
        PitchConstraint {
            target_mean,
            tolerance,
            max_attempts,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ConfigError::BadTolerance(self.tolerance));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Outcome of a constraint loop, reported alongside the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintInfo {
    pub target_mean: f64,
    pub tolerance: f64,
    pub max_attempts: usize,
    pub attempts_used: usize,
    pub success: bool,
    /// Mean sounding pitch of the returned candidate.
    pub achieved_mean: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Retrying,
    Done { success: bool },
}

/// Transient state of one constraint loop.
#[derive(Debug, Clone)]
pub struct ConstraintSession {
    base_seed: u64,
    constraint: PitchConstraint,
    attempts_used: usize,
    achieved_mean: Option<f64>,
    state: LoopState,
}

impl ConstraintSession {
    pub fn new(base_seed: u64, constraint: PitchConstraint) -> Self {
        ConstraintSession {
            base_seed,
            constraint,
            attempts_used: 0,
            achieved_mean: None,
            state: LoopState::Retrying,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Seed for the next attempt.
    pub fn next_seed(&self) -> u64 {
        self.base_seed.wrapping_add(self.attempts_used as u64)
    }

    /// Judge one attempt's melody and advance the state.
    pub fn record(&mut self, melody: &Melody) -> LoopState {
        let mean = mean_pitch(melody);
        self.attempts_used += 1;
        self.achieved_mean = mean;
        let target = self.constraint.target_mean;
        let hit = mean.is_some_and(|m| (m - target).abs() <= self.constraint.tolerance);
        log::debug!(
            "constraint: attempt {}/{} (seed {}) mean {:?}, target {} +/- {}",
            self.attempts_used,
            self.constraint.max_attempts,
            self.base_seed.wrapping_add(self.attempts_used as u64 - 1),
            mean,
            self.constraint.target_mean,
            self.constraint.tolerance,
        );

        self.state = if hit {
            LoopState::Done { success: true }
        } else if self.attempts_used >= self.constraint.max_attempts {
            log::warn!(
                "constraint: target {} +/- {} not met after {} attempts; keeping last (mean {:?})",
                self.constraint.target_mean,
                self.constraint.tolerance,
                self.attempts_used,
                mean,
            );
            LoopState::Done { success: false }
        } else {
            LoopState::Retrying
        };
        self.state
    }

    pub fn info(&self) -> ConstraintInfo {
        ConstraintInfo {
            target_mean: self.constraint.target_mean,
            tolerance: self.constraint.tolerance,
            max_attempts: self.constraint.max_attempts,
            attempts_used: self.attempts_used,
            success: matches!(self.state, LoopState::Done { success: true }),
            achieved_mean: self.achieved_mean,
        }
    }
}

/// Run `generator` under `constraint` starting from `base_seed`.
pub fn generate_with_constraint(
    generator: &dyn MelodyGenerator,
    context: &HarmonicContext,
    base_seed: u64,
    structure: Option<&StructureSpec>,
    constraint: &PitchConstraint,
) -> Result<(Candidate, ConstraintInfo), GenerateError> {
    constraint.validate()?;
    let mut session = ConstraintSession::new(base_seed, constraint.clone());
    loop {
        let candidate = generator.generate(context, session.next_seed(), structure)?;
        if let LoopState::Done { .. } = session.record(&candidate.melody) {
            return Ok((candidate, session.info()));
        }
    }
}
