// Melody representation: the monophonic event sequence every generator emits.
//
// A melody is an ordered list of (pitch, duration) events. Pitch 0 is the
// rest sentinel; durations are in quarter-note beats. Onsets are implicit
// (running sum of durations), so the sequence is the source of truth and
// everything else (MIDI, statistics, structure windows) is derived from it.
//
// A `Candidate` pairs a melody with the `Diagnostics` gathered while it was
// built: duration usage, scale corrections, octave jumps, and, when a
// structure spec was active, the realized repeat count and rhythm
// distribution.

use crate::grid::{BEAT_EPSILON, same_beats, snap_to_grid};
use crate::scale::pitch_class_name;
use serde::{Deserialize, Serialize};

/// Pitch value that marks a rest.
pub const REST: u8 = 0;

/// One note or rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch, or `REST`.
    pub pitch: u8,
    /// Length in quarter-note beats.
    pub duration: f64,
}

impl NoteEvent {
    pub fn note(pitch: u8, duration: f64) -> Self {
        NoteEvent { pitch, duration }
    }

    pub fn rest(duration: f64) -> Self {
        NoteEvent {
            pitch: REST,
            duration,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.pitch == REST
    }
}

/// A monophonic event sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Melody {
    pub events: Vec<NoteEvent>,
}

impl Melody {
    pub fn new(events: Vec<NoteEvent>) -> Self {
        Melody { events }
    }

    /// Build from parallel pitch and duration lists (extra items are dropped).
    pub fn from_parts(pitches: &[u8], durations: &[f64]) -> Self {
        Melody {
            events: pitches
                .iter()
                .zip(durations)
                .map(|(&pitch, &duration)| NoteEvent { pitch, duration })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn pitches(&self) -> Vec<u8> {
        self.events.iter().map(|e| e.pitch).collect()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.duration).collect()
    }

    /// Pitches of non-rest events, in order.
    pub fn sounding_pitches(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter(|e| !e.is_rest())
            .map(|e| e.pitch)
            .collect()
    }

    /// Sum of all durations, snapped to the grid.
    pub fn total_beats(&self) -> f64 {
        snap_to_grid(self.events.iter().map(|e| e.duration).sum())
    }

    /// `(onset, event)` pairs, onsets snapped to the grid.
    pub fn timed_events(&self) -> Vec<(f64, NoteEvent)> {
        let mut onset = 0.0;
        self.events
            .iter()
            .map(|&e| {
                let at = onset;
                onset = snap_to_grid(onset + e.duration);
                (at, e)
            })
            .collect()
    }

    /// Compact text rendering, e.g. `C4:1 D4:0.5 .:0.5 |`, with bar lines.
    pub fn summary(&self, beats_per_bar: f64) -> String {
        let mut out = String::new();
        let mut next_bar = beats_per_bar;
        for (onset, event) in self.timed_events() {
            if onset + BEAT_EPSILON >= next_bar {
                out.push_str("| ");
                next_bar += beats_per_bar;
            }
            if event.is_rest() {
                out.push('.');
            } else {
                let octave = event.pitch as i16 / 12 - 1;
                out.push_str(&format!("{}{}", pitch_class_name(event.pitch % 12), octave));
            }
            out.push_str(&format!(":{} ", event.duration));
        }
        out.trim_end().to_string()
    }
}

/// How often one duration value occurs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationCount {
    pub beats: f64,
    pub count: usize,
}

/// Share of events with one duration value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationShare {
    pub beats: f64,
    pub proportion: f64,
}

/// Per-duration event counts, longest duration first.
pub fn duration_counts(melody: &Melody) -> Vec<DurationCount> {
    let mut counts: Vec<DurationCount> = Vec::new();
    for event in &melody.events {
        match counts.iter_mut().find(|c| same_beats(c.beats, event.duration)) {
            Some(entry) => entry.count += 1,
            None => counts.push(DurationCount {
                beats: event.duration,
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.beats.total_cmp(&a.beats));
    counts
}

/// What happened while a candidate was built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub duration_counts: Vec<DurationCount>,
    /// Pitches redrawn or quantized back into the scale set or range.
    pub scale_corrections: usize,
    pub octave_jumps: usize,
    pub total_beats: f64,
    /// Complete, boundary-aligned repeat-unit windows (0 without repetition).
    pub repeat_count: usize,
    /// Realized rhythm distribution, present when a structure spec was active.
    pub actual_duration_distribution: Option<Vec<DurationShare>>,
    /// Candidates the scored generator discarded for breaking invariants.
    pub rejected_candidates: usize,
}

/// One generated melody with its diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub melody: Melody,
    pub diagnostics: Diagnostics,
}

impl Candidate {
    /// Wrap a finished melody, recomputing its duration tallies.
    pub fn new(melody: Melody, scale_corrections: usize, octave_jumps: usize) -> Self {
        let diagnostics = Diagnostics {
            duration_counts: duration_counts(&melody),
            scale_corrections,
            octave_jumps,
            total_beats: melody.total_beats(),
            ..Diagnostics::default()
        };
        Candidate {
            melody,
            diagnostics,
        }
    }
}
