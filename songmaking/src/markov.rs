// N-gram Markov generator.
//
// `MarkovModel::train` builds two transition tables from a fixed synthetic
// corpus of melodic fragments (scale runs, arpeggios, neighbour figures, and
// seeded random walks, all in a major-scale frame):
// - pitch: the last `order` pitch classes (relative to the tonic) -> next
//   pitch class
// - duration: the last `order` duration values -> next duration value
//
// Each table is a flat arena: a `BTreeMap` from an integer context key to a
// row index, and one contiguous `Vec<u32>` of counts with a fixed row width.
// This keeps the trained model a plain serde value, saved and loaded as JSON.
//
// Generation samples the next pitch class from the row for the current
// context, places it in the octave nearest the previous pitch, and quantizes
// to the scale set; every quantized draw counts as a scale correction. Contexts
// with no observations, and the first `order` notes, fall back to a uniform
// draw from the scale set. Durations follow the rhythm profile when one is
// set, else the learned duration row, else a uniform draw.

use crate::context::HarmonicContext;
use crate::error::{ConfigError, GenerateError, LoadError};
use crate::generator::{MelodyGenerator, Method};
use crate::grid::{
    BEAT_EPSILON, DURATION_VOCABULARY, choose_duration, snap_to_grid, vocabulary_index,
};
use crate::melody::{Candidate, Melody, NoteEvent};
use crate::scale::ScaleSet;
use crate::structure::{StructureSpec, apply_structure};
use serde::{Deserialize, Serialize};
use songmaking_prng::SeededRng;
use std::collections::BTreeMap;
use std::path::Path;

/// Seed for the random-walk fragments of the training corpus.
const TRAINING_SEED: u64 = 0x5eed_3a2c_0f00_d001;

/// Row width of the pitch table: one column per pitch class.
const PITCH_CLASSES: usize = 12;

/// Degree-to-semitone map used for the training corpus.
const MAJOR_FRAME: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Counts of next symbols per context, stored as a flat arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTable {
    width: usize,
    index: BTreeMap<u64, usize>,
    counts: Vec<u32>,
}

impl TransitionTable {
    pub fn new(width: usize) -> Self {
        TransitionTable {
            width,
            index: BTreeMap::new(),
            counts: Vec::new(),
        }
    }

    /// Integer key of a context. Symbols are offset by one so contexts of
    /// different lengths never share a key.
    pub fn key(&self, context: &[usize]) -> u64 {
        let base = self.width as u64 + 1;
        context
            .iter()
            .fold(0u64, |acc, &s| acc.wrapping_mul(base).wrapping_add(s as u64 + 1))
    }

    pub fn observe(&mut self, context: &[usize], next: usize) {
        let key = self.key(context);
        let row = match self.index.get(&key) {
            Some(&row) => row,
            None => {
                let row = self.index.len();
                self.index.insert(key, row);
                self.counts.extend(std::iter::repeat_n(0, self.width));
                row
            }
        };
        self.counts[row * self.width + next] += 1;
    }

    /// Observed next-symbol counts for `context`, if it was ever seen.
    pub fn row(&self, context: &[usize]) -> Option<&[u32]> {
        let &row = self.index.get(&self.key(context))?;
        self.counts.get(row * self.width..(row + 1) * self.width)
    }

    /// Number of distinct contexts observed.
    pub fn contexts(&self) -> usize {
        self.index.len()
    }

    /// Rows of `width` counts, one per indexed context.
    fn is_consistent(&self, width: usize) -> bool {
        self.width == width && self.counts.len() == self.index.len() * self.width
    }
}

/// A trained pitch-class and duration n-gram model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovModel {
    order: usize,
    pitch: TransitionTable,
    duration: TransitionTable,
}

/// One training fragment: scale degrees (may leave 0..7) and durations.
struct Fragment {
    degrees: Vec<i32>,
    durations: Vec<f64>,
}

fn training_corpus() -> Vec<Fragment> {
    let mut corpus = Vec::new();
    for start in 0..7i32 {
        // Five-note scale runs.
        corpus.push(Fragment {
            degrees: (0..5).map(|i| start + i).collect(),
            durations: vec![0.5, 0.5, 0.5, 0.5, 1.0],
        });
        corpus.push(Fragment {
            degrees: (0..5).map(|i| start - i).collect(),
            durations: vec![0.5, 0.5, 0.5, 0.5, 1.0],
        });
        // Arpeggios up to the octave and back.
        corpus.push(Fragment {
            degrees: vec![start, start + 2, start + 4, start + 7],
            durations: vec![1.0, 1.0, 1.0, 2.0],
        });
        corpus.push(Fragment {
            degrees: vec![start + 7, start + 4, start + 2, start],
            durations: vec![1.0, 1.0, 1.0, 2.0],
        });
        // Upper and lower neighbour figures.
        corpus.push(Fragment {
            degrees: vec![start, start + 1, start, start + 1, start],
            durations: vec![1.0, 0.5, 0.5, 1.0, 2.0],
        });
        corpus.push(Fragment {
            degrees: vec![start, start - 1, start, start - 1, start],
            durations: vec![1.0, 0.25, 0.25, 0.5, 2.0],
        });
    }

    let mut rng = SeededRng::new(TRAINING_SEED);
    const STEPS: [i32; 6] = [-2, -1, -1, 1, 1, 2];
    const WALK_DURATIONS: [f64; 5] = [0.25, 0.5, 1.0, 1.0, 2.0];
    for _ in 0..24 {
        let mut degree = rng.range_usize(0, 7) as i32;
        let mut degrees = Vec::with_capacity(8);
        let mut durations = Vec::with_capacity(8);
        for _ in 0..8 {
            degrees.push(degree);
            durations.push(WALK_DURATIONS[rng.range_usize(0, WALK_DURATIONS.len())]);
            degree += STEPS[rng.range_usize(0, STEPS.len())];
        }
        corpus.push(Fragment { degrees, durations });
    }
    corpus
}

fn degree_to_class(degree: i32) -> usize {
    let octave_len = MAJOR_FRAME.len() as i32;
    MAJOR_FRAME[degree.rem_euclid(octave_len) as usize] as usize
}

impl MarkovModel {
    /// Train on the built-in corpus with context length `order`.
    pub fn train(order: usize) -> Result<Self, ConfigError> {
        if order == 0 {
            return Err(ConfigError::ZeroNgramOrder);
        }
        let mut pitch = TransitionTable::new(PITCH_CLASSES);
        let mut duration = TransitionTable::new(DURATION_VOCABULARY.len());
        for fragment in training_corpus() {
            let classes: Vec<usize> =
                fragment.degrees.iter().map(|&d| degree_to_class(d)).collect();
            let lengths: Vec<usize> = fragment
                .durations
                .iter()
                .filter_map(|&d| vocabulary_index(d))
                .collect();
            for i in order..classes.len() {
                pitch.observe(&classes[i - order..i], classes[i]);
            }
            for i in order..lengths.len() {
                duration.observe(&lengths[i - order..i], lengths[i]);
            }
        }
        Ok(MarkovModel {
            order,
            pitch,
            duration,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn pitch_table(&self) -> &TransitionTable {
        &self.pitch
    }

    pub fn duration_table(&self) -> &TransitionTable {
        &self.duration
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read_to_string(path)?;
        let model: MarkovModel = serde_json::from_str(&data)?;
        if model.order == 0 {
            return Err(ConfigError::ZeroNgramOrder.into());
        }
        if !model.pitch.is_consistent(PITCH_CLASSES)
            || !model.duration.is_consistent(DURATION_VOCABULARY.len())
        {
            return Err(ConfigError::InconsistentModel.into());
        }
        Ok(model)
    }
}

/// The pitch of class `class` nearest to `anchor`; ties go lower.
fn nearest_with_class(class: u8, anchor: u8) -> i16 {
    let anchor = anchor as i16;
    let below = anchor - (anchor - class as i16).rem_euclid(12);
    let above = below + 12;
    if anchor - below <= above - anchor {
        below
    } else {
        above
    }
}

fn counts_to_weights(row: &[u32]) -> Vec<f64> {
    row.iter().map(|&c| c as f64).collect()
}

pub struct MarkovGenerator<'a> {
    model: &'a MarkovModel,
}

impl<'a> MarkovGenerator<'a> {
    pub fn new(model: &'a MarkovModel) -> Self {
        MarkovGenerator { model }
    }

    fn next_pitch(
        &self,
        history: &[usize],
        previous: Option<u8>,
        context: &HarmonicContext,
        scale: &ScaleSet,
        rng: &mut SeededRng,
    ) -> (u8, bool) {
        let order = self.model.order;
        let sampled = if history.len() >= order {
            self.model
                .pitch
                .row(&history[history.len() - order..])
                .and_then(|row| rng.weighted_index(&counts_to_weights(row)))
        } else {
            None
        };
        let Some(relative) = sampled else {
            let pitch = rng.choose(scale.pitches()).copied().unwrap_or(scale.low());
            return (pitch, false);
        };

        let class = ((relative as u8) + context.tonic) % 12;
        let anchor = previous.unwrap_or(((scale.low() as u16 + scale.high() as u16) / 2) as u8);
        let target = nearest_with_class(class, anchor);
        let pitch = scale.quantize(target);
        (pitch, true)
    }

    fn next_duration(
        &self,
        remaining: f64,
        lengths: &[usize],
        profile: Option<&[f64; 6]>,
        rng: &mut SeededRng,
    ) -> f64 {
        if profile.is_some() {
            return choose_duration(remaining, rng, profile);
        }
        let order = self.model.order;
        let learned = (lengths.len() >= order)
            .then(|| self.model.duration.row(&lengths[lengths.len() - order..]))
            .flatten()
            .map(|row| {
                let mut weights = [0.0; 6];
                for (w, &c) in weights.iter_mut().zip(row) {
                    *w = c as f64;
                }
                weights
            });
        choose_duration(remaining, rng, learned.as_ref())
    }
}

impl MelodyGenerator for MarkovGenerator<'_> {
    fn method(&self) -> Method {
        Method::Markov
    }

    fn generate(
        &self,
        context: &HarmonicContext,
        seed: u64,
        structure: Option<&StructureSpec>,
    ) -> Result<Candidate, GenerateError> {
        let structure = structure.filter(|s| s.is_active());
        let mut rng = SeededRng::new(seed);
        let scale = context.scale_set();
        let total = context.total_beats();
        let profile = structure.and_then(|s| s.rhythm_weights());

        let mut events = Vec::new();
        let mut elapsed = 0.0;
        let mut history: Vec<usize> = Vec::new();
        let mut lengths: Vec<usize> = Vec::new();
        let mut previous: Option<u8> = None;
        let mut scale_corrections = 0;

        while elapsed < total - BEAT_EPSILON {
            let (pitch, corrected) =
                self.next_pitch(&history, previous, context, &scale, &mut rng);
            scale_corrections += corrected as usize;
            let remaining = total - elapsed;
            let duration = self.next_duration(remaining, &lengths, profile.as_ref(), &mut rng);
            if duration <= BEAT_EPSILON {
                break;
            }
            events.push(NoteEvent::note(pitch, duration));
            history.push(((pitch % 12 + 12 - context.tonic) % 12) as usize);
            if let Some(i) = vocabulary_index(duration) {
                lengths.push(i);
            }
            previous = Some(pitch);
            elapsed = snap_to_grid(elapsed + duration);
        }

        let raw = Candidate::new(Melody::new(events), scale_corrections, 0);
        Ok(match structure {
            Some(spec) => apply_structure(raw, spec, context, &mut rng),
            None => raw,
        })
    }
}
