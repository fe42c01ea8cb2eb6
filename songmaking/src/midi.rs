// MIDI output for generated melodies.
//
// Renders a melody as a single-track Standard MIDI File: tempo and time
// signature meta events, one program change, then note on/off pairs on
// channel 0. Rests emit nothing and only advance time. Beats map to ticks at
// 480 per quarter note, so every grid position is an exact tick.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 0.

use crate::context::{HarmonicContext, MIN_TEMPO_BPM};
use crate::melody::Melody;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Acoustic grand piano.
const PROGRAM: u8 = 0;

const VELOCITY: u8 = 80;

fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_QUARTER as f64).round() as u32
}

/// Convert a melody to an in-memory SMF.
pub fn melody_to_smf(melody: &Melody, context: &HarmonicContext) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    let channel = u4::new(0);
    let mut track: Track<'static> = Vec::new();

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Melody")),
    });
    // Validated contexts never go below the floor; the clamp keeps the value in 24 bits.
    let tempo_microseconds = 60_000_000 / context.tempo_bpm.max(MIN_TEMPO_BPM) as u32;
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    // Denominator is stored as a power of two; 24 clocks per click, 8 32nds per quarter.
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
            context.meter.beats_per_bar,
            context.meter.beat_unit.max(1).trailing_zeros() as u8,
            24,
            8,
        )),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(PROGRAM),
            },
        },
    });

    let mut last_event_tick: u32 = 0;
    for (onset, event) in melody.timed_events() {
        if event.is_rest() {
            continue;
        }
        let start = beats_to_ticks(onset);
        let end = beats_to_ticks(onset + event.duration);
        track.push(TrackEvent {
            delta: u28::new(start.saturating_sub(last_event_tick)),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(event.pitch),
                    vel: u7::new(VELOCITY),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(end.saturating_sub(start)),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(event.pitch),
                    vel: u7::new(0),
                },
            },
        });
        last_event_tick = end;
    }

    // Trailing rests still count toward the piece length.
    let total = beats_to_ticks(melody.total_beats());
    track.push(TrackEvent {
        delta: u28::new(total.saturating_sub(last_event_tick)),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);
    smf
}

/// Encode a melody as SMF bytes.
pub fn melody_to_smf_bytes(
    melody: &Melody,
    context: &HarmonicContext,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let smf = melody_to_smf(melody, context);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    Ok(buf)
}

/// Convert a melody to MIDI and write to a file.
pub fn write_midi(
    melody: &Melody,
    context: &HarmonicContext,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let buf = melody_to_smf_bytes(melody, context)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_ons(smf: &Smf) -> Vec<(u32, u8)> {
        let mut tick = 0;
        let mut out = Vec::new();
        for event in &smf.tracks[0] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, .. },
                ..
            } = &event.kind
            {
                out.push((tick, key.as_int()));
            }
        }
        out
    }

    #[test]
    fn test_rests_only_advance_time() {
        let melody = Melody::from_parts(&[60, 0, 64], &[1.0, 0.5, 2.5]);
        let smf = melody_to_smf(&melody, &HarmonicContext::c_major(1));
        assert_eq!(smf.tracks.len(), 1);
        assert_eq!(note_ons(&smf), vec![(0, 60), (720, 64)]);
    }

    #[test]
    fn test_trailing_rest_extends_track() {
        let melody = Melody::from_parts(&[60, 0], &[1.0, 3.0]);
        let smf = melody_to_smf(&melody, &HarmonicContext::c_major(1));
        let length: u32 = smf.tracks[0].iter().map(|e| e.delta.as_int()).sum();
        assert_eq!(length, 4 * 480);
    }

    #[test]
    fn test_slowest_valid_tempo_is_exact() {
        let mut ctx = HarmonicContext::c_major(1);
        ctx.tempo_bpm = MIN_TEMPO_BPM;
        ctx.validate().unwrap();
        let smf = melody_to_smf(&Melody::from_parts(&[60], &[4.0]), &ctx);
        let tempo = smf.tracks[0].iter().find_map(|e| match &e.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        });
        assert_eq!(tempo, Some(15_000_000));
    }

    #[test]
    fn test_bytes_parse_back() {
        let melody = Melody::from_parts(&[60, 62, 64, 65], &[1.0; 4]);
        let bytes = melody_to_smf_bytes(&melody, &HarmonicContext::c_major(1)).unwrap();
        let parsed = Smf::parse(&bytes).unwrap();
        assert_eq!(parsed.header.format, Format::SingleTrack);
        assert_eq!(note_ons(&parsed).len(), 4);
    }

    #[test]
    fn test_write_midi_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("melody.mid");
        let melody = Melody::from_parts(&[67], &[4.0]);
        write_midi(&melody, &HarmonicContext::c_major(1), &path).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..4], b"MThd");
    }
}
