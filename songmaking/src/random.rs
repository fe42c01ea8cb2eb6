// Constrained-random generator.
//
// Walks the bar budget from beat 0. Each step draws a duration that fits the
// remaining beats (weighted by the rhythm profile, if any), then either a
// rest or a scale pitch near the previous sounding pitch. Elapsed time is
// snapped after every step. The raw melody is then handed to the structure
// engine when a spec is active.
//
// The draw order per step is fixed (duration, rest check, pitch, range
// check), and structure post-processing continues on the same stream, so
// output with no structure spec is identical to output before structure
// support existed.

use crate::config::GenerationConfig;
use crate::context::HarmonicContext;
use crate::error::GenerateError;
use crate::generator::{MelodyGenerator, Method};
use crate::grid::{BEAT_EPSILON, choose_duration, snap_to_grid};
use crate::melody::{Candidate, Melody, NoteEvent};
use crate::scale::{ensure_in_range, pick_scale_pitch};
use crate::structure::{StructureSpec, apply_structure};
use songmaking_prng::SeededRng;

pub struct RandomGenerator<'a> {
    config: &'a GenerationConfig,
}

impl<'a> RandomGenerator<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        RandomGenerator { config }
    }

    /// The raw walk, before any structure post-processing.
    fn walk(
        &self,
        context: &HarmonicContext,
        structure: Option<&StructureSpec>,
        rng: &mut SeededRng,
    ) -> Candidate {
        let scale = context.scale_set();
        let total = context.total_beats();
        let weights = structure.and_then(|s| s.rhythm_weights());

        let mut events = Vec::new();
        let mut elapsed = 0.0;
        let mut previous: Option<u8> = None;
        let mut scale_corrections = 0;
        let mut octave_jumps = 0;

        while elapsed < total - BEAT_EPSILON {
            let duration = choose_duration(total - elapsed, rng, weights.as_ref());
            if duration <= BEAT_EPSILON {
                break;
            }
            if rng.random_bool(self.config.rest_probability) {
                events.push(NoteEvent::rest(duration));
            } else {
                let pick = pick_scale_pitch(
                    previous,
                    &scale,
                    self.config.octave_jump_chance,
                    self.config.step_preference,
                    rng,
                );
                let (pitch, redrawn) = ensure_in_range(pick.pitch as i16, &scale, rng);
                if redrawn {
                    scale_corrections += 1;
                } else if pick.octave_jump {
                    octave_jumps += 1;
                }
                previous = Some(pitch);
                events.push(NoteEvent::note(pitch, duration));
            }
            elapsed = snap_to_grid(elapsed + duration);
        }

        Candidate::new(Melody::new(events), scale_corrections, octave_jumps)
    }
}

impl MelodyGenerator for RandomGenerator<'_> {
    fn method(&self) -> Method {
        Method::Random
    }

    fn generate(
        &self,
        context: &HarmonicContext,
        seed: u64,
        structure: Option<&StructureSpec>,
    ) -> Result<Candidate, GenerateError> {
        let structure = structure.filter(|s| s.is_active());
        let mut rng = SeededRng::new(seed);
        let raw = self.walk(context, structure, &mut rng);
        Ok(match structure {
            Some(spec) => apply_structure(raw, spec, context, &mut rng),
            None => raw,
        })
    }
}
