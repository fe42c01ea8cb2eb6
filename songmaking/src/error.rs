// Error types for the melody generator.
//
// Configuration problems are caught before any randomness is drawn and
// surface as `ConfigError`. Generation itself only fails when the scored
// generator rejects every candidate it built; everything else self-corrects
// (resampling, quantization) or degrades (the constraint loop returns its last
// attempt with `success: false`).

use thiserror::Error;

/// A harmonic context, structure spec, generation config, or pitch
/// constraint that cannot be generated against.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("scale must have at least one interval")]
    EmptyScale,
    #[error("scale intervals must be strictly increasing and below 12, got {0:?}")]
    BadScaleIntervals(Vec<u8>),
    #[error("tonic pitch class must be 0-11, got {0}")]
    BadTonic(u8),
    #[error("pitch bounds must satisfy 1 <= low < high <= 127, got [{low}, {high}]")]
    BadPitchBounds { low: u8, high: u8 },
    #[error("tempo must be at least {min} BPM to fit a MIDI tempo event, got {bpm}")]
    TempoTooSlow { bpm: u16, min: u16 },
    #[error("tempo range {min}..={max} BPM is empty or below the slowest usable tempo")]
    BadTempoRange { min: u16, max: u16 },
    #[error("meter {numerator}/{denominator} is not a usable time signature")]
    BadMeter { numerator: u8, denominator: u8 },
    #[error("piece must be at least one bar long")]
    ZeroBars,
    #[error("subdivision must be a positive number of beats, got {0}")]
    BadSubdivision(f64),
    #[error("no scale pitch lies within [{low}, {high}]")]
    EmptyScaleSet { low: u8, high: u8 },
    #[error("repeat unit must be a positive number of beats, got {0}")]
    BadRepeatUnit(f64),
    #[error("variation probability must be within [0, 1], got {0}")]
    BadVariationProbability(f64),
    #[error("rhythm profile weights must be non-negative with a positive total")]
    BadRhythmProfile,
    #[error("{name} must be within [0, 1], got {value}")]
    BadProbability { name: &'static str, value: f64 },
    #[error("candidate count must be at least 1")]
    ZeroCandidates,
    #[error("n-gram order must be at least 1")]
    ZeroNgramOrder,
    #[error("trained model tables have the wrong width or do not match their context index")]
    InconsistentModel,
    #[error("pitch tolerance must be non-negative, got {0}")]
    BadTolerance(f64),
    #[error("pitch constraint needs at least one attempt")]
    ZeroAttempts,
    #[error("unknown generation method '{0}' (expected random, scored, or markov)")]
    UnknownMethod(String),
    #[error("unknown scale '{0}'")]
    UnknownScale(String),
    #[error("unknown note name '{0}'")]
    UnknownNoteName(String),
}

/// Failure of a single generation request.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("all {rejected} scored candidates violated scale or duration invariants")]
    NoAcceptableCandidate { rejected: usize },
}

/// Reading or writing a JSON file: a generation config or a trained
/// transition model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
    #[error("file contents are invalid: {0}")]
    Invalid(#[from] ConfigError),
}
