// Metadata record written next to each exported melody.
//
// Collects the method, seed, harmonic frame, structure parameters, pitch
// constraint outcome, pitch statistics, diagnostics, and score breakdown of
// one generation call into a single camelCase JSON document. Pitch
// statistics are computed over sounding notes only and are `null` when a
// melody is all rests; `noteCount` always includes rests.

use crate::constraint::ConstraintInfo;
use crate::context::HarmonicContext;
use crate::engine::{GenerationOutput, GenerationRequest};
use crate::generator::Method;
use crate::melody::{DurationCount, DurationShare};
use crate::scoring::Score;
use crate::stats::PitchStats;
use crate::structure::RhythmProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarmonyRecord {
    pub tonic: String,
    pub scale_intervals: Vec<u8>,
    pub chord_plan: Vec<String>,
    pub tempo_bpm: u16,
    pub meter: String,
    pub pitch_low: u8,
    pub pitch_high: u8,
    pub subdivision: f64,
    pub bars: u32,
    pub total_beats: f64,
}

impl HarmonyRecord {
    fn of(context: &HarmonicContext) -> Self {
        HarmonyRecord {
            tonic: context.tonic_name().to_string(),
            scale_intervals: context.scale_intervals.clone(),
            chord_plan: context.chord_plan.clone(),
            tempo_bpm: context.tempo_bpm,
            meter: format!(
                "{}/{}",
                context.meter.beats_per_bar, context.meter.beat_unit
            ),
            pitch_low: context.low,
            pitch_high: context.high,
            subdivision: context.subdivision,
            bars: context.bars,
            total_beats: context.total_beats(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureRecord {
    pub enabled: bool,
    pub repeat_unit_beats: Option<f64>,
    pub rhythm_profile: Option<RhythmProfile>,
    pub allow_motif_variation: bool,
    pub variation_probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyStats {
    /// Events including rests.
    pub note_count: usize,
    pub avg_pitch: Option<f64>,
    pub pitch_min: Option<u8>,
    pub pitch_max: Option<u8>,
    pub pitch_std: Option<f64>,
    pub pitch_range: Option<u8>,
    pub mean_interval: Option<f64>,
    pub total_beats: f64,
    pub duration_distribution: Vec<DurationCount>,
    pub actual_duration_distribution: Option<Vec<DurationShare>>,
    pub repeat_count: usize,
    pub scale_out_rejections: usize,
    pub octave_up_events: usize,
    pub rejected_candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MelodyMetadata {
    pub method: Method,
    pub seed: u64,
    pub harmony: HarmonyRecord,
    pub structure: StructureRecord,
    pub constraint: Option<ConstraintInfo>,
    pub stats: MelodyStats,
    pub score: Option<Score>,
}

impl MelodyMetadata {
    pub fn new(request: &GenerationRequest, output: &GenerationOutput) -> Self {
        let structure = match request.active_structure() {
            Some(spec) => StructureRecord {
                enabled: true,
                repeat_unit_beats: spec.repeat_unit_beats,
                rhythm_profile: spec.rhythm_profile.clone(),
                allow_motif_variation: spec.allow_motif_variation,
                variation_probability: Some(spec.variation_probability),
            },
            None => StructureRecord {
                enabled: false,
                repeat_unit_beats: None,
                rhythm_profile: None,
                allow_motif_variation: false,
                variation_probability: None,
            },
        };

        let pitch = PitchStats::of(&output.candidate.melody);
        let diagnostics = &output.candidate.diagnostics;
        let stats = MelodyStats {
            note_count: pitch.note_count,
            avg_pitch: pitch.mean,
            pitch_min: pitch.min,
            pitch_max: pitch.max,
            pitch_std: pitch.std,
            pitch_range: pitch.range,
            mean_interval: pitch.mean_interval,
            total_beats: diagnostics.total_beats,
            duration_distribution: diagnostics.duration_counts.clone(),
            actual_duration_distribution: diagnostics.actual_duration_distribution.clone(),
            repeat_count: diagnostics.repeat_count,
            scale_out_rejections: diagnostics.scale_corrections,
            octave_up_events: diagnostics.octave_jumps,
            rejected_candidates: diagnostics.rejected_candidates,
        };

        MelodyMetadata {
            method: output.method,
            seed: output.seed,
            harmony: HarmonyRecord::of(&request.context),
            structure,
            constraint: output.constraint.clone(),
            stats,
            score: output.score.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::constraint::PitchConstraint;
    use crate::engine::MelodyEngine;
    use crate::melody::{Candidate, Melody};
    use crate::structure::StructureSpec;

    #[test]
    fn test_all_rest_melody_has_null_pitch_stats() {
        let request = GenerationRequest::new(HarmonicContext::c_major(1), Method::Random, 0);
        let output = GenerationOutput {
            method: Method::Random,
            seed: 0,
            candidate: Candidate::new(Melody::from_parts(&[0, 0], &[2.0, 2.0]), 0, 0),
            score: None,
            constraint: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&MelodyMetadata::new(&request, &output).to_json().unwrap())
                .unwrap();
        let stats = &json["stats"];
        assert_eq!(stats["noteCount"], 2);
        assert!(stats["avgPitch"].is_null());
        assert!(stats["pitchMin"].is_null());
        assert!(stats["pitchMax"].is_null());
        assert!(stats["pitchStd"].is_null());
        assert!(json["score"].is_null());
    }

    #[test]
    fn test_record_carries_structure_and_constraint() {
        let engine = MelodyEngine::new(&GenerationConfig::default()).unwrap();
        let request = GenerationRequest::new(HarmonicContext::c_major(2), Method::Random, 42)
            .with_structure(StructureSpec::repeating(4.0, true, 0.5))
            .with_constraint(PitchConstraint::new(64.0, 4.0, 20));
        let output = engine.generate(&request).unwrap();
        let meta = MelodyMetadata::new(&request, &output);
        assert!(meta.structure.enabled);
        assert_eq!(meta.structure.repeat_unit_beats, Some(4.0));
        assert_eq!(meta.harmony.meter, "4/4");
        assert_eq!(meta.harmony.tonic, "C");

        let json: serde_json::Value = serde_json::from_str(&meta.to_json().unwrap()).unwrap();
        assert_eq!(json["method"], "random");
        assert!(json["constraint"]["attemptsUsed"].as_u64().unwrap() >= 1);
        assert!(json["structure"]["allowMotifVariation"].as_bool().unwrap());
        assert!(json["stats"]["repeatCount"].is_u64());
        assert!(json["stats"]["scaleOutRejections"].is_u64());
    }

    #[test]
    fn test_default_structure_reported_disabled() {
        let request = GenerationRequest::new(HarmonicContext::c_major(1), Method::Random, 3)
            .with_structure(StructureSpec::default());
        let output = crate::engine::generate(&request, &GenerationConfig::default()).unwrap();
        let meta = MelodyMetadata::new(&request, &output);
        assert!(!meta.structure.enabled);
        assert!(meta.stats.actual_duration_distribution.is_none());
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("melody.json");
        let request = GenerationRequest::new(HarmonicContext::c_major(1), Method::Markov, 8);
        let output = crate::engine::generate(&request, &GenerationConfig::default()).unwrap();
        MelodyMetadata::new(&request, &output).write(&path).unwrap();
        let back: MelodyMetadata =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.seed, 8);
        assert_eq!(back.method, Method::Markov);
    }
}
