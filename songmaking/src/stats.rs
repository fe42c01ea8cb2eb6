// Pitch statistics over the sounding notes of a melody.
//
// Rests count toward `note_count` but are excluded from every pitch
// aggregate. A melody with no sounding notes has `None` for all of them.
// Used by the constraint loop (mean pitch) and the metadata record.

use crate::melody::Melody;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchStats {
    /// All events, rests included.
    pub note_count: usize,
    pub sounding_count: usize,
    pub mean: Option<f64>,
    pub min: Option<u8>,
    pub max: Option<u8>,
    /// Population standard deviation.
    pub std: Option<f64>,
    pub range: Option<u8>,
    /// Mean absolute interval between consecutive sounding pitches.
    pub mean_interval: Option<f64>,
}

impl PitchStats {
    pub fn of(melody: &Melody) -> Self {
        let pitches = melody.sounding_pitches();
        let min = pitches.iter().copied().min();
        let max = pitches.iter().copied().max();
        let mean = mean_of(&pitches);
        let std = mean.map(|m| {
            let var = pitches
                .iter()
                .map(|&p| (p as f64 - m).powi(2))
                .sum::<f64>()
                / pitches.len() as f64;
            var.sqrt()
        });
        let mean_interval = if pitches.len() >= 2 {
            let total: u32 = pitches
                .windows(2)
                .map(|w| w[0].abs_diff(w[1]) as u32)
                .sum();
            Some(total as f64 / (pitches.len() - 1) as f64)
        } else {
            None
        };

        PitchStats {
            note_count: melody.len(),
            sounding_count: pitches.len(),
            mean,
            min,
            max,
            std,
            range: min.zip(max).map(|(lo, hi)| hi - lo),
            mean_interval,
        }
    }
}

fn mean_of(pitches: &[u8]) -> Option<f64> {
    if pitches.is_empty() {
        return None;
    }
    let sum: u32 = pitches.iter().map(|&p| p as u32).sum();
    Some(sum as f64 / pitches.len() as f64)
}

/// Mean of the sounding pitches, `None` if there are none.
pub fn mean_pitch(melody: &Melody) -> Option<f64> {
    mean_of(&melody.sounding_pitches())
}

/// Whether the mean sounding pitch lies within `tolerance` of `target`.
/// A melody without sounding notes never meets a target.
pub fn meets_pitch_target(melody: &Melody, target: f64, tolerance: f64) -> bool {
    mean_pitch(melody).is_some_and(|m| (m - target).abs() <= tolerance)
}
