// Scales, note names, and in-scale pitch selection.
//
// A melody is confined to the "scale set": every MIDI pitch inside the
// harmonic context's bounds whose pitch class (relative to the tonic) is one
// of the scale intervals. This module builds that set and provides the pitch
// half of the grid-and-scale utilities:
// - `ScaleSet::build` enumerates every octave transposition within bounds
// - `pick_scale_pitch` draws the next pitch, with stepwise preference and a
//   rare, headroom-limited octave jump
// - `ensure_in_range` redraws pitches that escaped the bounds
// - `ScaleSet::quantize` / `ScaleSet::next_in_direction` snap arbitrary
//   pitches back into the set (used by the Markov generator and by motif
//   variation in structure.rs)
//
// The named scale library mirrors the modes offered by the random harmonic
// frame in context.rs.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use songmaking_prng::SeededRng;
use std::fmt;
use std::str::FromStr;

/// Named interval patterns available to the random harmonic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKind {
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    HarmonicMinor,
    MelodicMinor,
    PentatonicMajor,
    PentatonicMinor,
}

impl ScaleKind {
    pub const ALL: [ScaleKind; 10] = [
        ScaleKind::Ionian,
        ScaleKind::Dorian,
        ScaleKind::Phrygian,
        ScaleKind::Lydian,
        ScaleKind::Mixolydian,
        ScaleKind::Aeolian,
        ScaleKind::HarmonicMinor,
        ScaleKind::MelodicMinor,
        ScaleKind::PentatonicMajor,
        ScaleKind::PentatonicMinor,
    ];

    /// Semitone offsets from the tonic, strictly increasing.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleKind::Ionian => &[0, 2, 4, 5, 7, 9, 11],
            ScaleKind::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleKind::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleKind::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleKind::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleKind::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            ScaleKind::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleKind::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            ScaleKind::PentatonicMajor => &[0, 2, 4, 7, 9],
            ScaleKind::PentatonicMinor => &[0, 3, 5, 7, 10],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScaleKind::Ionian => "ionian",
            ScaleKind::Dorian => "dorian",
            ScaleKind::Phrygian => "phrygian",
            ScaleKind::Lydian => "lydian",
            ScaleKind::Mixolydian => "mixolydian",
            ScaleKind::Aeolian => "aeolian",
            ScaleKind::HarmonicMinor => "harmonic_minor",
            ScaleKind::MelodicMinor => "melodic_minor",
            ScaleKind::PentatonicMajor => "pentatonic_major",
            ScaleKind::PentatonicMinor => "pentatonic_minor",
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScaleKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        let lowered = match lowered.as_str() {
            "major" => "ionian",
            "minor" | "natural_minor" => "aeolian",
            other => other,
        };
        ScaleKind::ALL
            .into_iter()
            .find(|k| k.name() == lowered)
            .ok_or_else(|| ConfigError::UnknownScale(s.to_string()))
    }
}

/// Parse a note name such as `C`, `F#`, or `Bb` into a pitch class.
///
/// Enharmonic spellings resolve by pitch class: `Fb` is E, `E#` is F, `Cb`
/// is B and `B#` is C.
pub fn parse_note_name(name: &str) -> Result<u8, ConfigError> {
    let mut chars = name.trim().chars();
    let letter = chars
        .next()
        .ok_or_else(|| ConfigError::UnknownNoteName(name.to_string()))?;
    let natural: i8 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(ConfigError::UnknownNoteName(name.to_string())),
    };
    let accidental: i8 = match chars.as_str() {
        "" => 0,
        "#" => 1,
        "b" => -1,
        _ => return Err(ConfigError::UnknownNoteName(name.to_string())),
    };
    Ok((natural + accidental).rem_euclid(12) as u8)
}

/// Sharp-spelled name of a pitch class.
pub fn pitch_class_name(pc: u8) -> &'static str {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    NAMES[(pc % 12) as usize]
}

/// Every in-scale MIDI pitch within inclusive bounds, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleSet {
    pitches: Vec<u8>,
    low: u8,
    high: u8,
}

impl ScaleSet {
    /// Enumerate all octave transpositions of the scale inside `[low, high]`.
    pub fn build(tonic_pc: u8, intervals: &[u8], low: u8, high: u8) -> Self {
        let mut in_scale = [false; 12];
        for &iv in intervals {
            in_scale[(iv % 12) as usize] = true;
        }
        let pitches = (low..=high)
            .filter(|&p| in_scale[((p + 12 - tonic_pc % 12) % 12) as usize])
            .collect();
        ScaleSet {
            pitches,
            low,
            high,
        }
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }

    pub fn low(&self) -> u8 {
        self.low
    }

    pub fn high(&self) -> u8 {
        self.high
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.pitches.binary_search(&pitch).is_ok()
    }

    /// Nearest member of the set. Equidistant candidates resolve downward.
    /// An empty set leaves the pitch clamped into bounds.
    pub fn quantize(&self, pitch: i16) -> u8 {
        let mut best: Option<(u16, u8)> = None;
        for &p in &self.pitches {
            let dist = (p as i16 - pitch).unsigned_abs();
            if best.is_none_or(|(d, _)| dist < d) {
                best = Some((dist, p));
            }
        }
        match best {
            Some((_, p)) => p,
            None => pitch.clamp(self.low as i16, self.high as i16) as u8,
        }
    }

    /// The first member at or beyond `pitch` in the given direction.
    pub fn next_in_direction(&self, pitch: i16, upward: bool) -> Option<u8> {
        if upward {
            self.pitches.iter().copied().find(|&p| p as i16 >= pitch)
        } else {
            self.pitches.iter().rev().copied().find(|&p| p as i16 <= pitch)
        }
    }

    /// Scale members within two scale steps of `pitch` (excluding itself).
    fn neighbors(&self, pitch: u8) -> Vec<u8> {
        let Ok(idx) = self.pitches.binary_search(&pitch) else {
            return Vec::new();
        };
        [-2isize, -1, 1, 2]
            .iter()
            .filter_map(|&off| {
                let j = idx as isize + off;
                (j >= 0).then(|| self.pitches.get(j as usize).copied()).flatten()
            })
            .collect()
    }
}

/// Result of one pitch draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchPick {
    pub pitch: u8,
    /// The drawn pitch was lifted by an octave.
    pub octave_jump: bool,
}

/// Semitones kept free below the upper bound when lifting a pitch an octave.
pub const OCTAVE_JUMP_HEADROOM: u8 = 2;

/// Draw the next melody pitch from the scale set.
///
/// With probability `step_preference` the draw is limited to the scale
/// neighbours of `previous`; otherwise it is uniform over the whole set. The
/// chosen pitch is then lifted an octave with probability
/// `octave_jump_chance`, but only when the result stays at least
/// `OCTAVE_JUMP_HEADROOM` semitones under the upper bound.
pub fn pick_scale_pitch(
    previous: Option<u8>,
    scale: &ScaleSet,
    octave_jump_chance: f64,
    step_preference: f64,
    rng: &mut SeededRng,
) -> PitchPick {
    let neighbors = previous.map(|p| scale.neighbors(p)).unwrap_or_default();
    let drawn = if !neighbors.is_empty() && rng.random_bool(step_preference) {
        rng.choose(&neighbors).copied()
    } else {
        rng.choose(scale.pitches()).copied()
    };
    let pitch = drawn.unwrap_or(scale.low);

    let lifted = pitch as u16 + 12;
    let ceiling = scale.high.saturating_sub(OCTAVE_JUMP_HEADROOM) as u16;
    if rng.random_bool(octave_jump_chance) && lifted <= ceiling {
        PitchPick {
            pitch: lifted as u8,
            octave_jump: true,
        }
    } else {
        PitchPick {
            pitch,
            octave_jump: false,
        }
    }
}

/// Keep `pitch` inside the set's bounds, redrawing from the set if it left.
/// Returns the pitch and whether a redraw happened.
pub fn ensure_in_range(pitch: i16, scale: &ScaleSet, rng: &mut SeededRng) -> (u8, bool) {
    if (scale.low as i16..=scale.high as i16).contains(&pitch) {
        return (pitch as u8, false);
    }
    let redrawn = rng
        .choose(scale.pitches())
        .copied()
        .unwrap_or_else(|| pitch.clamp(scale.low as i16, scale.high as i16) as u8);
    (redrawn, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major(low: u8, high: u8) -> ScaleSet {
        ScaleSet::build(0, ScaleKind::Ionian.intervals(), low, high)
    }

    #[test]
    fn test_build_covers_every_octave() {
        let set = c_major(48, 72);
        // C3..C5 inclusive: 7 per octave * 2 + top C
        assert_eq!(set.pitches().len(), 15);
        assert_eq!(set.pitches().first(), Some(&48));
        assert_eq!(set.pitches().last(), Some(&72));
        assert!(set.contains(64)); // E4
        assert!(!set.contains(61)); // C#4
    }

    #[test]
    fn test_build_respects_tonic() {
        // D dorian has the same pitch classes as C major.
        let d_dorian = ScaleSet::build(2, ScaleKind::Dorian.intervals(), 60, 72);
        assert_eq!(d_dorian.pitches(), c_major(60, 72).pitches());
    }

    #[test]
    fn test_parse_note_names() {
        assert_eq!(parse_note_name("C").unwrap(), 0);
        assert_eq!(parse_note_name("F#").unwrap(), 6);
        assert_eq!(parse_note_name("Bb").unwrap(), 10);
        assert_eq!(parse_note_name("Fb").unwrap(), 4);
        assert_eq!(parse_note_name("E#").unwrap(), 5);
        assert_eq!(parse_note_name("Cb").unwrap(), 11);
        assert_eq!(parse_note_name("B#").unwrap(), 0);
        assert!(parse_note_name("H").is_err());
        assert!(parse_note_name("C##").is_err());
    }

    #[test]
    fn test_scale_kind_round_trips_names() {
        for kind in ScaleKind::ALL {
            assert_eq!(kind.name().parse::<ScaleKind>().unwrap(), kind);
        }
        assert_eq!("major".parse::<ScaleKind>().unwrap(), ScaleKind::Ionian);
        assert!("bebop".parse::<ScaleKind>().is_err());
    }

    #[test]
    fn test_quantize_prefers_lower_on_tie() {
        let set = c_major(48, 84);
        assert_eq!(set.quantize(60), 60);
        assert_eq!(set.quantize(61), 60); // C# between C and D
        assert_eq!(set.quantize(66), 65); // F# between F and G
        assert_eq!(set.quantize(30), 48);
        assert_eq!(set.quantize(100), 84);
    }

    #[test]
    fn test_next_in_direction() {
        let set = c_major(48, 84);
        assert_eq!(set.next_in_direction(61, true), Some(62));
        assert_eq!(set.next_in_direction(61, false), Some(60));
        assert_eq!(set.next_in_direction(85, true), None);
    }

    #[test]
    fn test_pick_stays_in_scale_and_range() {
        let set = c_major(48, 84);
        let mut rng = SeededRng::new(5);
        let mut prev = None;
        for _ in 0..2000 {
            let pick = pick_scale_pitch(prev, &set, 0.05, 0.6, &mut rng);
            assert!(set.contains(pick.pitch), "{} not in scale", pick.pitch);
            if pick.octave_jump {
                assert!(pick.pitch <= 84 - OCTAVE_JUMP_HEADROOM);
            }
            prev = Some(pick.pitch);
        }
    }

    #[test]
    fn test_octave_jump_respects_headroom() {
        // Range of barely more than an octave: a lift is only possible from
        // the lowest few pitches.
        let set = c_major(60, 74);
        let mut rng = SeededRng::new(17);
        let mut jumps = 0;
        for _ in 0..2000 {
            let pick = pick_scale_pitch(None, &set, 1.0, 0.0, &mut rng);
            if pick.octave_jump {
                jumps += 1;
                assert!(pick.pitch <= 72);
            }
        }
        assert!(jumps > 0);
    }

    #[test]
    fn test_ensure_in_range_redraws() {
        let set = c_major(60, 72);
        let mut rng = SeededRng::new(1);
        assert_eq!(ensure_in_range(64, &set, &mut rng), (64, false));
        let (p, redrawn) = ensure_in_range(90, &set, &mut rng);
        assert!(redrawn);
        assert!(set.contains(p));
    }
}
