// Structure engine: motif repetition, bounded variation, and structural
// diagnostics.
//
// A `StructureSpec` asks for form on top of the raw generator output:
// - `repeat_unit_beats`: the leading segment of that length becomes a motif
//   and the rest of the piece is rebuilt from copies of it, the last copy
//   clipped so the bar budget is filled exactly
// - `allow_motif_variation` / `variation_probability`: each appended copy may
//   be transposed, get one neighbour-note change, or be inverted
// - `rhythm_profile`: target duration shares. Targeting happens at duration
//   selection time (grid.rs); this module only measures the result.
//
// Variations never leave the scale set: shifted pitches that land between
// scale tones continue in the direction of the shift to the next scale
// member, inverted pitches quantize to the nearest one. Every moved pitch is
// counted as a scale correction.
//
// A spec whose fields are all at their defaults is inactive and the engine
// treats it exactly like no spec at all.

use crate::context::HarmonicContext;
use crate::error::ConfigError;
use crate::grid::{
    BEAT_EPSILON, DURATION_VOCABULARY, GRID_RESOLUTION, decompose_span, is_vocabulary_duration,
    snap_to_grid, vocabulary_index,
};
use crate::melody::{Candidate, DurationShare, Melody, NoteEvent, duration_counts};
use crate::scale::ScaleSet;
use serde::{Deserialize, Serialize};
use songmaking_prng::SeededRng;

/// Target share per duration value. Weights are relative and need not sum
/// to 1. Serialized as a list of `[beats, weight]` pairs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RhythmProfile {
    entries: Vec<(f64, f64)>,
}

impl RhythmProfile {
    pub fn new(entries: Vec<(f64, f64)>) -> Self {
        RhythmProfile { entries }
    }

    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    /// Selection weights in vocabulary order. Durations outside the
    /// vocabulary cannot be drawn and are ignored here.
    pub fn vocabulary_weights(&self) -> [f64; 6] {
        let mut weights = [0.0; DURATION_VOCABULARY.len()];
        for &(beats, weight) in &self.entries {
            if let Some(i) = vocabulary_index(beats) {
                weights[i] += weight.max(0.0);
            }
        }
        weights
    }

    /// Weights normalized to proportions.
    pub fn target_shares(&self) -> Vec<DurationShare> {
        let total: f64 = self.entries.iter().map(|&(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        self.entries
            .iter()
            .map(|&(beats, w)| DurationShare {
                beats,
                proportion: w.max(0.0) / total,
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let total: f64 = self.entries.iter().map(|&(_, w)| w).sum();
        let well_formed = self
            .entries
            .iter()
            .all(|&(beats, w)| beats > 0.0 && w.is_finite() && w >= 0.0);
        if !well_formed || total <= 0.0 {
            return Err(ConfigError::BadRhythmProfile);
        }
        Ok(())
    }
}

/// Optional form constraints layered on a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructureSpec {
    pub repeat_unit_beats: Option<f64>,
    pub rhythm_profile: Option<RhythmProfile>,
    pub allow_motif_variation: bool,
    pub variation_probability: f64,
}

impl Default for StructureSpec {
    fn default() -> Self {
        StructureSpec {
            repeat_unit_beats: None,
            rhythm_profile: None,
            allow_motif_variation: false,
            variation_probability: 0.3,
        }
    }
}

impl StructureSpec {
    /// Repetition of a `unit`-beat motif, optionally varied.
    pub fn repeating(unit: f64, allow_variation: bool, variation_probability: f64) -> Self {
        StructureSpec {
            repeat_unit_beats: Some(unit),
            allow_motif_variation: allow_variation,
            variation_probability,
            ..StructureSpec::default()
        }
    }

    /// Whether any field asks for something. Inactive specs change nothing.
    pub fn is_active(&self) -> bool {
        self.repeat_unit_beats.is_some()
            || self.rhythm_profile.is_some()
            || self.allow_motif_variation
    }

    /// Duration weights for `choose_duration`, if a profile is set.
    pub fn rhythm_weights(&self) -> Option<[f64; 6]> {
        self.rhythm_profile.as_ref().map(|p| p.vocabulary_weights())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(unit) = self.repeat_unit_beats {
            if !unit.is_finite() || snap_to_grid(unit) < GRID_RESOLUTION {
                return Err(ConfigError::BadRepeatUnit(unit));
            }
        }
        if !(0.0..=1.0).contains(&self.variation_probability) {
            return Err(ConfigError::BadVariationProbability(
                self.variation_probability,
            ));
        }
        if let Some(profile) = &self.rhythm_profile {
            profile.validate()?;
        }
        Ok(())
    }
}

/// The three motif variation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variation {
    /// Every pitch shifted by ±1 or ±2 semitones.
    Transpose,
    /// One pitch shifted by ±1 semitone.
    Neighbor,
    /// Intervals mirrored around the unit's first pitch.
    Inversion,
}

impl Variation {
    pub const ALL: [Variation; 3] = [
        Variation::Transpose,
        Variation::Neighbor,
        Variation::Inversion,
    ];
}

/// Post-process a raw candidate according to `spec`.
///
/// Applies motif repetition when a repeat unit shorter than the piece is
/// set, then records the structural diagnostics.
pub fn apply_structure(
    candidate: Candidate,
    spec: &StructureSpec,
    context: &HarmonicContext,
    rng: &mut SeededRng,
) -> Candidate {
    let Candidate {
        melody,
        diagnostics,
    } = candidate;

    let (melody, extra_corrections) = match spec.repeat_unit_beats {
        Some(unit) => {
            let scale = context.scale_set();
            let total = context.total_beats();
            let outcome = apply_motif_repetition(&melody, spec, unit, total, &scale, rng);
            (outcome.melody, outcome.scale_corrections)
        }
        None => (melody, 0),
    };

    let mut rebuilt = Candidate::new(
        melody,
        diagnostics.scale_corrections + extra_corrections,
        diagnostics.octave_jumps,
    );
    rebuilt.diagnostics.rejected_candidates = diagnostics.rejected_candidates;
    rebuilt.diagnostics.repeat_count = spec
        .repeat_unit_beats
        .map(|unit| count_repeats(&rebuilt.melody, unit))
        .unwrap_or(0);
    rebuilt.diagnostics.actual_duration_distribution =
        Some(compute_duration_distribution(&rebuilt.melody));
    rebuilt
}

/// Result of motif repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionOutcome {
    pub melody: Melody,
    /// Copies that received a variation operator.
    pub variations: usize,
    pub scale_corrections: usize,
}

/// Rebuild `melody` from copies of its leading `unit_beats` segment until
/// `total_beats` is filled. The first unit is kept verbatim; each appended
/// copy is varied with probability `spec.variation_probability` when
/// `spec.allow_motif_variation` is set.
pub fn apply_motif_repetition(
    melody: &Melody,
    spec: &StructureSpec,
    unit_beats: f64,
    total_beats: f64,
    scale: &ScaleSet,
    rng: &mut SeededRng,
) -> RepetitionOutcome {
    let unit_beats = snap_to_grid(unit_beats);
    let unchanged = RepetitionOutcome {
        melody: melody.clone(),
        variations: 0,
        scale_corrections: 0,
    };
    if unit_beats < GRID_RESOLUTION || unit_beats >= total_beats - BEAT_EPSILON {
        return unchanged;
    }
    let unit = clip_events(&melody.events, unit_beats);
    if unit.is_empty() {
        return unchanged;
    }

    let mut events = unit.clone();
    let mut filled = unit_beats;
    let mut variations = 0;
    let mut scale_corrections = 0;
    while filled < total_beats - BEAT_EPSILON {
        let mut copy = unit.clone();
        if spec.allow_motif_variation && rng.random_bool(spec.variation_probability) {
            let op = Variation::ALL[rng.range_usize(0, Variation::ALL.len())];
            scale_corrections += vary_motif(&mut copy, op, scale, rng);
            variations += 1;
        }
        let room = snap_to_grid(total_beats - filled);
        if room < unit_beats - BEAT_EPSILON {
            copy = clip_events(&copy, room);
        }
        filled = snap_to_grid(filled + room.min(unit_beats));
        events.extend(copy);
    }

    RepetitionOutcome {
        melody: Melody::new(events),
        variations,
        scale_corrections,
    }
}

/// The events of `events` that start before `span`, with the crossing event
/// cut at `span`. A cut that leaves the vocabulary is split into vocabulary
/// pieces: the note keeps the first, rests fill the rest.
fn clip_events(events: &[NoteEvent], span: f64) -> Vec<NoteEvent> {
    let mut out = Vec::new();
    let mut onset = 0.0;
    for &event in events {
        if onset >= span - BEAT_EPSILON {
            break;
        }
        let end = snap_to_grid(onset + event.duration);
        if end <= span + BEAT_EPSILON {
            out.push(event);
            onset = end;
            continue;
        }
        let left = snap_to_grid(span - onset);
        if is_vocabulary_duration(left) {
            out.push(NoteEvent { duration: left, ..event });
        } else {
            let pieces = decompose_span(left);
            for (i, &piece) in pieces.iter().enumerate() {
                if i == 0 {
                    out.push(NoteEvent { duration: piece, ..event });
                } else {
                    out.push(NoteEvent::rest(piece));
                }
            }
        }
        break;
    }
    out
}

/// Apply one variation operator in place. Returns the number of pitches that
/// had to be moved back into the scale set or range.
pub fn vary_motif(
    unit: &mut [NoteEvent],
    op: Variation,
    scale: &ScaleSet,
    rng: &mut SeededRng,
) -> usize {
    let mut corrections = 0;
    match op {
        Variation::Transpose => {
            let shift = *rng.choose(&[-2i16, -1, 1, 2]).unwrap_or(&1);
            for event in unit.iter_mut().filter(|e| !e.is_rest()) {
                let (pitch, moved) = settle(event.pitch as i16 + shift, Some(shift > 0), scale);
                event.pitch = pitch;
                corrections += moved as usize;
            }
        }
        Variation::Neighbor => {
            let sounding: Vec<usize> = (0..unit.len()).filter(|&i| !unit[i].is_rest()).collect();
            if let Some(&idx) = rng.choose(&sounding) {
                let pitch = unit[idx].pitch as i16;
                let mut shift: i16 = if rng.random_bool(0.5) { 1 } else { -1 };
                // At the edge of the set the step turns back inward.
                if scale.next_in_direction(pitch + shift, shift > 0).is_none() {
                    shift = -shift;
                }
                let (pitch, moved) = settle(pitch + shift, Some(shift > 0), scale);
                unit[idx].pitch = pitch;
                corrections += moved as usize;
            }
        }
        Variation::Inversion => {
            let Some(axis) = unit.iter().find(|e| !e.is_rest()).map(|e| e.pitch as i16) else {
                return 0;
            };
            for event in unit.iter_mut().filter(|e| !e.is_rest()) {
                let (pitch, moved) = settle(2 * axis - event.pitch as i16, None, scale);
                event.pitch = pitch;
                corrections += moved as usize;
            }
        }
    }
    corrections
}

/// Clamp `target` into range and move it onto the scale set. With a
/// direction, off-scale pitches continue that way; otherwise they take the
/// nearest member. Returns the pitch and whether it differs from `target`.
fn settle(target: i16, direction: Option<bool>, scale: &ScaleSet) -> (u8, bool) {
    let clamped = target.clamp(scale.low() as i16, scale.high() as i16);
    if scale.contains(clamped as u8) {
        return (clamped as u8, clamped != target);
    }
    let pitch = direction
        .and_then(|upward| scale.next_in_direction(clamped, upward))
        .unwrap_or_else(|| scale.quantize(clamped));
    (pitch, true)
}

/// Proportion of events per duration value, longest duration first.
pub fn compute_duration_distribution(melody: &Melody) -> Vec<DurationShare> {
    let n = melody.len();
    if n == 0 {
        return Vec::new();
    }
    duration_counts(melody)
        .into_iter()
        .map(|c| DurationShare {
            beats: c.beats,
            proportion: c.count as f64 / n as f64,
        })
        .collect()
}

/// Number of complete `unit_beats` windows whose start and end both fall on
/// event boundaries.
pub fn count_repeats(melody: &Melody, unit_beats: f64) -> usize {
    let unit_beats = snap_to_grid(unit_beats);
    if unit_beats < GRID_RESOLUTION {
        return 0;
    }
    let mut boundaries: Vec<f64> = melody.timed_events().iter().map(|&(t, _)| t).collect();
    boundaries.push(melody.total_beats());
    let is_boundary = |t: f64| boundaries.iter().any(|&b| (b - t).abs() < BEAT_EPSILON);

    let total = melody.total_beats();
    let mut count = 0;
    let mut start = 0.0;
    while start + unit_beats <= total + BEAT_EPSILON {
        let end = snap_to_grid(start + unit_beats);
        if is_boundary(start) && is_boundary(end) {
            count += 1;
        }
        start = end;
    }
    count
}
