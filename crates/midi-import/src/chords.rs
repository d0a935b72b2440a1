//! Chord building: merge near-simultaneous notes into chords.
//!
//! Every candidate is compared with the first note of its group (the
//! anchor), never with the latest member, so a run of notes each a few
//! ticks after the previous one cannot drift into a single chord.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::drumset::DrumMap;
use crate::note::{Chord, ChordMap, Note};

/// Build the chord map for one track.
///
/// `notes` may arrive in any order; they are stably sorted by onset so
/// notes sharing an onset keep import order. On drum tracks, notes merge
/// only when the drum map puts them in the same voice. Unmapped drum
/// pitches are diagnosed and fall back to voice 0 with pitched merging.
pub fn build_chords(
    notes: &[Note],
    drums: Option<&DrumMap>,
    jitter: u64,
    diags: &mut Diagnostics,
) -> ChordMap {
    let mut notes = notes.to_vec();
    notes.sort_by_key(|n| n.onset);

    let voices: Vec<Option<u8>> = notes
        .iter()
        .map(|n| {
            let drums = drums?;
            let voice = drums.voice(n.pitch);
            if voice.is_none() {
                diags.report(
                    DiagnosticKind::UnmappedDrumPitch,
                    n.onset,
                    format!("drum pitch {} not in drum map", n.pitch),
                );
            }
            voice
        })
        .collect();

    let mut used = vec![false; notes.len()];
    let mut chords = ChordMap::new();

    for i in 0..notes.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let anchor = notes[i];
        let anchor_voice = voices[i];
        let mut chord = Chord {
            voice: anchor_voice.unwrap_or(0),
            ..Chord::single(anchor)
        };

        for j in (i + 1)..notes.len() {
            let cand = notes[j];
            if cand.onset - anchor.onset > jitter {
                break;
            }
            if used[j] {
                continue;
            }

            let mergeable = match anchor_voice {
                Some(voice) => voices[j] == Some(voice),
                None => voices[j].is_none() && cand.offset().abs_diff(anchor.offset()) <= jitter,
            };
            if !mergeable {
                continue;
            }

            used[j] = true;
            if chord.has_pitch(cand.pitch) {
                diags.report(
                    DiagnosticKind::DuplicateNote,
                    cand.onset,
                    format!("duplicate pitch {} in chord at {}", cand.pitch, anchor.onset),
                );
                continue;
            }

            chord.notes.push(Note {
                onset: anchor.onset,
                len: anchor.len,
                ..cand
            });
        }

        chords.insert(chord);
    }

    tracing::trace!(notes = notes.len(), chords = chords.len(), "built chords");
    chords
}
