// Scoring engine: multi-metric evaluation of a melody in [0, 1].
//
// Base metrics, always computed over the sounding pitches:
//   smoothness             share of intervals no wider than `max_smooth_leap`
//   variety                pitch-class spread and interval-size spread
//   interval distribution  1 - total variation distance from an ideal mix of
//                          unisons, steps, skips, leaps, and wide leaps
//
// Structural metrics, computed only when the structure spec asks for them:
//   self-similarity        positional match between adjacent repeat-unit
//                          windows
//   rhythm alignment       1 - total variation distance between the realized
//                          duration shares and the rhythm profile
//
// The total is the weighted mean of the active metrics, so weights are
// renormalized whenever a structural metric joins in.
//
// Consumed by the scored generator to rank candidates, and by the engine to
// report a score for every method.

use crate::context::HarmonicContext;
use crate::grid::{BEAT_EPSILON, same_beats, snap_to_grid};
use crate::melody::{DurationShare, Melody, NoteEvent};
use crate::structure::{RhythmProfile, StructureSpec, compute_duration_distribution};
use serde::{Deserialize, Serialize};

/// Relative weight of each metric. Tunable parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub smoothness: f64,
    pub variety: f64,
    pub interval_distribution: f64,
    pub self_similarity: f64,
    pub rhythm_alignment: f64,
    /// Widest interval (in semitones) still counted as smooth.
    pub max_smooth_leap: u8,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            smoothness: 0.35,
            variety: 0.35,
            interval_distribution: 0.30,
            self_similarity: 0.15,
            rhythm_alignment: 0.15,
            max_smooth_leap: 7,
        }
    }
}

/// Target shares of the interval classes unison, step (1-2), skip (3-4),
/// leap (5-7), and wide leap (>7).
pub const IDEAL_INTERVAL_MIX: [f64; 5] = [0.10, 0.50, 0.25, 0.10, 0.05];

/// Per-metric values behind a total score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub smoothness: f64,
    pub variety: f64,
    pub interval_distribution: f64,
    pub self_similarity: Option<f64>,
    pub rhythm_alignment: Option<f64>,
}

/// A total in [0, 1] with the breakdown that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub total: f64,
    pub breakdown: ScoreBreakdown,
}

/// Score a melody within its context.
pub fn score(
    melody: &Melody,
    context: &HarmonicContext,
    structure: Option<&StructureSpec>,
    weights: &ScoringWeights,
) -> Score {
    let pitches = melody.sounding_pitches();
    let intervals = intervals(&pitches);

    let breakdown = ScoreBreakdown {
        smoothness: smoothness(&intervals, weights.max_smooth_leap),
        variety: variety(&pitches, &intervals),
        interval_distribution: interval_distribution(&intervals),
        self_similarity: structure
            .and_then(|s| s.repeat_unit_beats)
            .map(|unit| self_similarity(melody, unit, context.total_beats())),
        rhythm_alignment: structure
            .and_then(|s| s.rhythm_profile.as_ref())
            .map(|profile| rhythm_alignment(melody, profile)),
    };

    let mut terms = vec![
        (weights.smoothness, breakdown.smoothness),
        (weights.variety, breakdown.variety),
        (weights.interval_distribution, breakdown.interval_distribution),
    ];
    if let Some(v) = breakdown.self_similarity {
        terms.push((weights.self_similarity, v));
    }
    if let Some(v) = breakdown.rhythm_alignment {
        terms.push((weights.rhythm_alignment, v));
    }
    let weight_sum: f64 = terms.iter().map(|&(w, _)| w).sum();
    let total = if weight_sum > 0.0 {
        terms.iter().map(|&(w, v)| w * v).sum::<f64>() / weight_sum
    } else {
        0.0
    };

    Score {
        total: total.clamp(0.0, 1.0),
        breakdown,
    }
}

fn intervals(pitches: &[u8]) -> Vec<i16> {
    pitches
        .windows(2)
        .map(|w| w[1] as i16 - w[0] as i16)
        .collect()
}

fn smoothness(intervals: &[i16], max_leap: u8) -> f64 {
    if intervals.is_empty() {
        return 1.0;
    }
    let wide = intervals
        .iter()
        .filter(|iv| iv.unsigned_abs() > max_leap as u16)
        .count();
    1.0 - wide as f64 / intervals.len() as f64
}

fn variety(pitches: &[u8], intervals: &[i16]) -> f64 {
    let mut classes = [false; 12];
    for &p in pitches {
        classes[(p % 12) as usize] = true;
    }
    let unique_classes = classes.iter().filter(|&&seen| seen).count();
    let pitch_variety = (unique_classes as f64 / 7.0).min(1.0);

    let interval_variety = if intervals.is_empty() {
        0.0
    } else {
        let mut sizes: Vec<u16> = intervals.iter().map(|iv| iv.unsigned_abs()).collect();
        sizes.sort_unstable();
        sizes.dedup();
        let possible = intervals.len().min(12);
        (sizes.len() as f64 / possible as f64).min(1.0)
    };

    (pitch_variety + interval_variety) / 2.0
}

fn interval_class(iv: i16) -> usize {
    match iv.unsigned_abs() {
        0 => 0,
        1..=2 => 1,
        3..=4 => 2,
        5..=7 => 3,
        _ => 4,
    }
}

fn interval_distribution(intervals: &[i16]) -> f64 {
    if intervals.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 5];
    for &iv in intervals {
        counts[interval_class(iv)] += 1;
    }
    let n = intervals.len() as f64;
    let distance: f64 = counts
        .iter()
        .zip(IDEAL_INTERVAL_MIX)
        .map(|(&c, ideal)| (c as f64 / n - ideal).abs())
        .sum::<f64>()
        / 2.0;
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Mean positional match between adjacent `unit_beats` windows of the first
/// `total_beats` beats. 0.0 when fewer than two complete windows fit.
pub fn self_similarity(melody: &Melody, unit_beats: f64, total_beats: f64) -> f64 {
    let unit_beats = snap_to_grid(unit_beats);
    if unit_beats <= BEAT_EPSILON {
        return 0.0;
    }
    let window_count = ((total_beats + BEAT_EPSILON) / unit_beats).floor() as usize;
    if window_count < 2 {
        return 0.0;
    }

    let mut windows: Vec<Vec<NoteEvent>> = vec![Vec::new(); window_count];
    for (onset, event) in melody.timed_events() {
        let idx = ((onset + BEAT_EPSILON) / unit_beats).floor() as usize;
        if let Some(window) = windows.get_mut(idx) {
            window.push(event);
        }
    }

    let pair_scores: Vec<f64> = windows
        .windows(2)
        .map(|pair| window_match(&pair[0], &pair[1]))
        .collect();
    pair_scores.iter().sum::<f64>() / pair_scores.len() as f64
}

fn window_match(a: &[NoteEvent], b: &[NoteEvent]) -> f64 {
    let positions = a.len().max(b.len());
    if positions == 0 {
        return 1.0;
    }
    let matching = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.pitch == y.pitch && same_beats(x.duration, y.duration))
        .count();
    matching as f64 / positions as f64
}

/// `1 - TVD` between the realized duration shares and the profile's target
/// shares.
pub fn rhythm_alignment(melody: &Melody, profile: &RhythmProfile) -> f64 {
    let actual = compute_duration_distribution(melody);
    let target = profile.target_shares();

    let mut keys: Vec<f64> = Vec::new();
    for share in actual.iter().chain(&target) {
        if !keys.iter().any(|&k| same_beats(k, share.beats)) {
            keys.push(share.beats);
        }
    }
    let share_of = |dist: &[DurationShare], beats: f64| -> f64 {
        dist.iter()
            .filter(|s| same_beats(s.beats, beats))
            .map(|s| s.proportion)
            .sum()
    };
    let distance: f64 = keys
        .iter()
        .map(|&k| (share_of(&actual, k) - share_of(&target, k)).abs())
        .sum::<f64>()
        / 2.0;
    (1.0 - distance).clamp(0.0, 1.0)
}
