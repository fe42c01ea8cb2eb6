// Generate-and-score generator.
//
// Builds `candidate_count` melodies with the random generator on seeds
// `seed, seed + 1, ...`, discards any that break the scale or duration
// invariants, scores the rest, and keeps the best. Ties keep the earliest
// candidate, so the batch order alone decides the outcome.

use crate::config::GenerationConfig;
use crate::context::HarmonicContext;
use crate::error::GenerateError;
use crate::generator::{MelodyGenerator, Method};
use crate::grid::is_vocabulary_duration;
use crate::melody::{Candidate, Melody};
use crate::random::RandomGenerator;
use crate::scale::ScaleSet;
use crate::scoring::score;
use crate::structure::StructureSpec;

pub struct ScoredGenerator<'a> {
    config: &'a GenerationConfig,
}

impl<'a> ScoredGenerator<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        ScoredGenerator { config }
    }
}

/// Why a candidate cannot be emitted, if it cannot.
fn invariant_violation(melody: &Melody, scale: &ScaleSet) -> Option<String> {
    if let Some(p) = melody
        .sounding_pitches()
        .into_iter()
        .find(|&p| !scale.contains(p))
    {
        return Some(format!("pitch {p} is outside the scale set"));
    }
    if let Some(d) = melody
        .durations()
        .into_iter()
        .find(|&d| !is_vocabulary_duration(d))
    {
        return Some(format!("duration {d} is not a vocabulary value"));
    }
    None
}

impl MelodyGenerator for ScoredGenerator<'_> {
    fn method(&self) -> Method {
        Method::Scored
    }

    fn generate(
        &self,
        context: &HarmonicContext,
        seed: u64,
        structure: Option<&StructureSpec>,
    ) -> Result<Candidate, GenerateError> {
        let structure = structure.filter(|s| s.is_active());
        let random = RandomGenerator::new(self.config);
        let scale = context.scale_set();

        let mut best: Option<(f64, Candidate)> = None;
        let mut rejected = 0;
        for i in 0..self.config.candidate_count {
            let candidate_seed = seed.wrapping_add(i as u64);
            let candidate = random.generate(context, candidate_seed, structure)?;
            if let Some(reason) = invariant_violation(&candidate.melody, &scale) {
                log::warn!("scored: rejected candidate {i} (seed {candidate_seed}): {reason}");
                rejected += 1;
                continue;
            }
            let s = score(&candidate.melody, context, structure, &self.config.scoring);
            log::debug!("scored: candidate {i} (seed {candidate_seed}) scored {:.4}", s.total);
            if best.as_ref().is_none_or(|(top, _)| s.total > *top) {
                best = Some((s.total, candidate));
            }
        }

        match best {
            Some((_, mut candidate)) => {
                candidate.diagnostics.rejected_candidates = rejected;
                Ok(candidate)
            }
            None => Err(GenerateError::NoAcceptableCandidate { rejected }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(candidates: usize) -> GenerationConfig {
        GenerationConfig {
            candidate_count: candidates,
            ..Default::default()
        }
    }

    #[test]
    fn test_picks_highest_scoring_candidate() {
        let cfg = config(8);
        let ctx = HarmonicContext::c_major(2);
        let best = ScoredGenerator::new(&cfg).generate(&ctx, 100, None).unwrap();
        let best_score = score(&best.melody, &ctx, None, &cfg.scoring).total;

        let random = RandomGenerator::new(&cfg);
        for i in 0..8 {
            let c = random.generate(&ctx, 100 + i, None).unwrap();
            let s = score(&c.melody, &ctx, None, &cfg.scoring).total;
            assert!(s <= best_score);
        }
    }

    #[test]
    fn test_single_candidate_equals_random() {
        let cfg = config(1);
        let ctx = HarmonicContext::c_major(2);
        let scored = ScoredGenerator::new(&cfg).generate(&ctx, 7, None).unwrap();
        let random = RandomGenerator::new(&cfg).generate(&ctx, 7, None).unwrap();
        assert_eq!(scored.melody, random.melody);
        assert_eq!(scored.diagnostics.rejected_candidates, 0);
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        // Only rests: every candidate scores the same, so seed+0 must win.
        let cfg = GenerationConfig {
            rest_probability: 1.0,
            candidate_count: 5,
            ..Default::default()
        };
        let ctx = HarmonicContext::c_major(1);
        let scored = ScoredGenerator::new(&cfg).generate(&ctx, 30, None).unwrap();
        let first = RandomGenerator::new(&cfg).generate(&ctx, 30, None).unwrap();
        assert_eq!(scored.melody, first.melody);
    }

    #[test]
    fn test_invariant_violation() {
        let scale = HarmonicContext::c_major(1).scale_set();
        let ok = Melody::from_parts(&[60, 0, 64], &[1.0, 1.0, 2.0]);
        assert!(invariant_violation(&ok, &scale).is_none());
        let sharp = Melody::from_parts(&[61], &[4.0]);
        assert!(invariant_violation(&sharp, &scale).is_some());
        let odd = Melody::from_parts(&[60], &[0.375]);
        assert!(invariant_violation(&odd, &scale).is_some());
    }

    #[test]
    fn test_deterministic() {
        let cfg = config(6);
        let ctx = HarmonicContext::c_major(2);
        let generator = ScoredGenerator::new(&cfg);
        assert_eq!(
            generator.generate(&ctx, 3, None).unwrap(),
            generator.generate(&ctx, 3, None).unwrap()
        );
    }
}
