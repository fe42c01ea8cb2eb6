// Harmonic context: the fixed tonal and rhythmic frame of one melody.
//
// Key, scale, chord plan, tempo, meter, pitch bounds, subdivision, and length
// in bars. Generators only ever borrow a context; nothing downstream mutates
// it. `validate` is the fail-fast gate run by the engine before any random
// draw, so generators may assume a well-formed context (in particular a
// non-empty scale set).
//
// `HarmonicContext::choose` reproduces the original tool's random harmonic
// frame: a seed deterministically picks every parameter.

use crate::error::ConfigError;
use crate::scale::{ScaleKind, ScaleSet, parse_note_name, pitch_class_name};
use serde::{Deserialize, Serialize};
use songmaking_prng::SeededRng;

/// Slowest tempo whose microseconds per quarter note fit the 24-bit SMF
/// tempo field.
pub const MIN_TEMPO_BPM: u16 = 4;

/// Time signature. `beat_unit` is the denominator (4 = quarter note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meter {
    pub beats_per_bar: u8,
    pub beat_unit: u8,
}

impl Meter {
    pub const COMMON: Meter = Meter {
        beats_per_bar: 4,
        beat_unit: 4,
    };

    /// Bar length in quarter-note beats, the unit every duration uses.
    pub fn quarter_beats_per_bar(self) -> f64 {
        self.beats_per_bar as f64 * 4.0 / self.beat_unit as f64
    }
}

/// The tonal and rhythmic frame a melody is generated within.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicContext {
    /// Tonic pitch class (0 = C).
    pub tonic: u8,
    /// Semitone offsets from the tonic, strictly increasing, all below 12.
    pub scale_intervals: Vec<u8>,
    /// Scale-degree labels of the chord plan (e.g. "I", "vi", "IV", "V").
    pub chord_plan: Vec<String>,
    pub tempo_bpm: u16,
    pub meter: Meter,
    /// Inclusive MIDI pitch bounds. 0 is reserved for rests.
    pub low: u8,
    pub high: u8,
    /// Smallest rhythmic subdivision in beats. Descriptive only: generation
    /// always uses the fixed duration vocabulary and the 1/8-beat grid.
    pub subdivision: f64,
    pub bars: u32,
}

impl HarmonicContext {
    /// C major in 4/4 at 120 BPM over C3..C6, with a I-vi-IV-V plan.
    pub fn c_major(bars: u32) -> Self {
        HarmonicContext {
            tonic: 0,
            scale_intervals: ScaleKind::Ionian.intervals().to_vec(),
            chord_plan: ["I", "vi", "IV", "V"].map(String::from).to_vec(),
            tempo_bpm: 120,
            meter: Meter::COMMON,
            low: 48,
            high: 84,
            subdivision: 0.125,
            bars,
        }
    }

    /// Total length of the piece in quarter-note beats.
    pub fn total_beats(&self) -> f64 {
        self.meter.quarter_beats_per_bar() * self.bars as f64
    }

    pub fn tonic_name(&self) -> &'static str {
        pitch_class_name(self.tonic)
    }

    /// All in-scale pitches within the bounds.
    pub fn scale_set(&self) -> ScaleSet {
        ScaleSet::build(self.tonic, &self.scale_intervals, self.low, self.high)
    }

    /// Reject contexts no generator can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tonic > 11 {
            return Err(ConfigError::BadTonic(self.tonic));
        }
        if self.scale_intervals.is_empty() {
            return Err(ConfigError::EmptyScale);
        }
        let increasing = self.scale_intervals.windows(2).all(|w| w[0] < w[1]);
        let within_octave = self.scale_intervals.iter().all(|&iv| iv < 12);
        if !increasing || !within_octave {
            return Err(ConfigError::BadScaleIntervals(self.scale_intervals.clone()));
        }
        if self.low == 0 || self.low >= self.high || self.high > 127 {
            return Err(ConfigError::BadPitchBounds {
                low: self.low,
                high: self.high,
            });
        }
        if self.tempo_bpm < MIN_TEMPO_BPM {
            return Err(ConfigError::TempoTooSlow {
                bpm: self.tempo_bpm,
                min: MIN_TEMPO_BPM,
            });
        }
        let Meter {
            beats_per_bar,
            beat_unit,
        } = self.meter;
        // Units finer than a thirty-second would put bar lines off the grid.
        if beats_per_bar == 0 || !beat_unit.is_power_of_two() || beat_unit > 32 {
            return Err(ConfigError::BadMeter {
                numerator: beats_per_bar,
                denominator: beat_unit,
            });
        }
        if self.bars == 0 {
            return Err(ConfigError::ZeroBars);
        }
        if !(self.subdivision.is_finite() && self.subdivision > 0.0) {
            return Err(ConfigError::BadSubdivision(self.subdivision));
        }
        if self.scale_set().is_empty() {
            return Err(ConfigError::EmptyScaleSet {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    /// Draw a complete random harmonic frame from `seed`.
    pub fn choose(seed: u64, options: &HarmonyOptions) -> Result<Self, ConfigError> {
        if options.min_bpm < MIN_TEMPO_BPM || options.min_bpm > options.max_bpm {
            return Err(ConfigError::BadTempoRange {
                min: options.min_bpm,
                max: options.max_bpm,
            });
        }
        let mut rng = SeededRng::new(seed);

        const NATURALS: [&str; 7] = ["C", "D", "E", "F", "G", "A", "B"];
        const ACCIDENTALS: [&str; 3] = ["", "b", "#"];
        let letter = NATURALS[rng.range_usize(0, NATURALS.len())];
        let accidental = ACCIDENTALS[rng.range_usize(0, ACCIDENTALS.len())];
        let tonic = parse_note_name(&format!("{letter}{accidental}"))?;

        let scale = ScaleKind::ALL[rng.range_usize(0, ScaleKind::ALL.len())];

        const NUMERALS: [&str; 7] = ["I", "ii", "iii", "IV", "V", "vi", "vii°"];
        let plan_len = rng.range_usize_inclusive(4, 8);
        let chord_plan = (0..plan_len)
            .map(|_| NUMERALS[rng.range_usize(0, NUMERALS.len())].to_string())
            .collect();

        let tempo_bpm =
            rng.range_usize_inclusive(options.min_bpm as usize, options.max_bpm as usize) as u16;

        const METERS: [(u8, u8); 5] = [(3, 4), (4, 4), (5, 4), (6, 8), (7, 8)];
        let (beats_per_bar, beat_unit) = METERS[rng.range_usize(0, METERS.len())];

        let octave = rng.range_usize_inclusive(3, 5) as u8;
        let span = rng.range_usize_inclusive(14, 24) as u8;
        let low = (octave + 1) * 12;

        const SUBDIVISIONS: [f64; 4] = [0.0625, 0.125, 0.25, 0.5];
        let subdivision = SUBDIVISIONS[rng.range_usize(0, SUBDIVISIONS.len())];

        const BAR_COUNTS: [u32; 4] = [4, 8, 12, 16];
        let drawn_bars = BAR_COUNTS[rng.range_usize(0, BAR_COUNTS.len())];

        let context = HarmonicContext {
            tonic,
            scale_intervals: scale.intervals().to_vec(),
            chord_plan,
            tempo_bpm,
            meter: Meter {
                beats_per_bar,
                beat_unit,
            },
            low,
            high: low + span,
            subdivision,
            bars: options.bars.unwrap_or(drawn_bars),
        };
        context.validate()?;
        Ok(context)
    }
}

/// Knobs for `HarmonicContext::choose`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyOptions {
    pub min_bpm: u16,
    pub max_bpm: u16,
    /// Fixed length in bars; drawn from {4, 8, 12, 16} when absent.
    pub bars: Option<u32>,
}

impl Default for HarmonyOptions {
    fn default() -> Self {
        HarmonyOptions {
            min_bpm: 80,
            max_bpm: 140,
            bars: None,
        }
    }
}
