// Rhythmic grid: the discrete duration vocabulary and beat-grid snapping.
//
// Durations are measured in quarter-note beats and drawn from a fixed
// vocabulary (whole through thirty-second). Every onset lies on a 1/32-note
// grid (0.125 beats); `snap_to_grid` is applied after each accumulation so
// long sequences never drift. All vocabulary values and grid positions are
// dyadic fractions, so they are exact in `f64`.
//
// `choose_duration` is where rhythm targeting happens: a rhythm profile (or
// the Markov generator's learned duration row) is passed as weights and the
// draw is renormalized over the values that still fit in the bar budget.

use songmaking_prng::SeededRng;

/// Allowed note lengths in beats, longest first.
pub const DURATION_VOCABULARY: [f64; 6] = [4.0, 2.0, 1.0, 0.5, 0.25, 0.125];

/// Onset grid spacing in beats (a thirty-second note).
pub const GRID_RESOLUTION: f64 = 0.125;

/// Tolerance for comparing beat quantities.
pub const BEAT_EPSILON: f64 = 1e-6;

/// Round a beat position to the nearest multiple of `GRID_RESOLUTION`.
pub fn snap_to_grid(beats: f64) -> f64 {
    snap_to_resolution(beats, GRID_RESOLUTION)
}

/// Round a beat position to the nearest multiple of `resolution`.
pub fn snap_to_resolution(beats: f64, resolution: f64) -> f64 {
    (beats / resolution).round() * resolution
}

/// Whether two beat quantities are the same grid value.
pub fn same_beats(a: f64, b: f64) -> bool {
    (a - b).abs() < BEAT_EPSILON
}

/// Index of `beats` in `DURATION_VOCABULARY`, if it is a vocabulary value.
pub fn vocabulary_index(beats: f64) -> Option<usize> {
    DURATION_VOCABULARY.iter().position(|&d| same_beats(d, beats))
}

pub fn is_vocabulary_duration(beats: f64) -> bool {
    vocabulary_index(beats).is_some()
}

/// Choose a note length that fits in `remaining` beats.
///
/// With `weights` (one per vocabulary entry, in vocabulary order) the draw is
/// proportional to the weights of the fitting values; if none of them has a
/// positive weight the draw falls back to uniform. When no vocabulary value
/// fits at all, the remainder itself is returned (snapped, unless snapping
/// would overshoot the budget).
pub fn choose_duration(remaining: f64, rng: &mut SeededRng, weights: Option<&[f64; 6]>) -> f64 {
    let fitting: Vec<usize> = (0..DURATION_VOCABULARY.len())
        .filter(|&i| DURATION_VOCABULARY[i] <= remaining + BEAT_EPSILON)
        .collect();
    if fitting.is_empty() {
        let snapped = snap_to_grid(remaining);
        return if snapped > BEAT_EPSILON && snapped <= remaining + BEAT_EPSILON {
            snapped
        } else {
            remaining
        };
    }

    if let Some(weights) = weights {
        let row: Vec<f64> = fitting.iter().map(|&i| weights[i]).collect();
        if let Some(pick) = rng.weighted_index(&row) {
            return DURATION_VOCABULARY[fitting[pick]];
        }
    }
    let pick = rng.range_usize(0, fitting.len());
    DURATION_VOCABULARY[fitting[pick]]
}

/// Split a span into vocabulary values, longest first.
///
/// Used when a clipped note would otherwise leave the vocabulary. A span that
/// is not a multiple of the grid ends with its snapped leftover.
pub fn decompose_span(span: f64) -> Vec<f64> {
    let mut pieces = Vec::new();
    let mut left = snap_to_grid(span);
    while left > BEAT_EPSILON {
        match DURATION_VOCABULARY
            .iter()
            .copied()
            .find(|&d| d <= left + BEAT_EPSILON)
        {
            Some(d) => {
                pieces.push(d);
                left = snap_to_grid(left - d);
            }
            None => {
                pieces.push(left);
                break;
            }
        }
    }
    pieces
}
