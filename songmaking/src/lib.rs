// Songmaking: a constrained algorithmic melody generator.
//
// Produces a single monophonic line of (pitch, duration) events inside a
// harmonic frame (key, scale, meter, tempo, pitch bounds, length in bars),
// using one of three generators behind a common trait, optional structural
// post-processing, and an optional retry loop that steers the mean pitch
// toward a target.
//
// Architecture:
// - context.rs: Harmonic context (the frame) and its random chooser
// - scale.rs: Named scales, note names, scale pitch sets, pitch drawing
// - grid.rs: Duration vocabulary, beat-grid snapping, duration drawing
// - melody.rs: Note events, melodies, candidates, and their diagnostics
// - generator.rs: The `MelodyGenerator` trait and `Method` selector
// - random.rs / scored.rs / markov.rs: The three generators
// - structure.rs: Motif repetition, variation, structural diagnostics
// - scoring.rs: Multi-metric melody scoring
// - constraint.rs: Mean-pitch retry loop with deterministic re-seeding
// - stats.rs: Pitch statistics over sounding notes
// - config.rs: Generation config (JSON-loadable)
// - engine.rs: `MelodyEngine` and the one-shot `generate` call
// - metadata.rs: JSON metadata record for an exported melody
// - midi.rs: Standard MIDI File output
// - error.rs: Error types
//
// Every generation call is deterministic given its seed: all randomness
// comes from a `SeededRng` created inside the call.

pub mod config;
pub mod constraint;
pub mod context;
pub mod engine;
pub mod error;
pub mod generator;
pub mod grid;
pub mod markov;
pub mod melody;
pub mod metadata;
pub mod midi;
pub mod random;
pub mod scale;
pub mod scored;
pub mod scoring;
pub mod stats;
pub mod structure;

pub use config::GenerationConfig;
pub use constraint::{ConstraintInfo, PitchConstraint};
pub use context::{HarmonicContext, HarmonyOptions, Meter};
pub use engine::{GenerationOutput, GenerationRequest, MelodyEngine, generate};
pub use error::{ConfigError, GenerateError, LoadError};
pub use generator::{MelodyGenerator, Method};
pub use melody::{Candidate, Diagnostics, Melody, NoteEvent};
pub use structure::{RhythmProfile, StructureSpec};
