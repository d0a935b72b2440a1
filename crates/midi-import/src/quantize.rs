//! Per-measure adaptive quantization and overlap cleanup.
//!
//! Each measure picks its own raster from the shortest chord starting in
//! it, so a bar of eighths snaps coarser than a bar with thirty-seconds.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::note::{Chord, ChordMap, Note};
use crate::timesig::TimeSigMap;

/// Grid rungs as (numerator, denominator) multiples of a quarter note.
pub const LADDER: [(u64, u64); 8] = [
    (1, 16),
    (1, 8),
    (1, 4),
    (1, 2),
    (1, 1),
    (2, 1),
    (4, 1),
    (8, 1),
];

fn rung_ticks(rung: (u64, u64), division: u64) -> u64 {
    (division * rung.0 / rung.1).max(1)
}

/// Smallest rung that still holds `min_duration`, clamped to the ladder.
pub fn grid_division(min_duration: u64, division: u64) -> u64 {
    LADDER
        .iter()
        .map(|&r| rung_ticks(r, division))
        .find(|&ticks| ticks >= min_duration)
        .unwrap_or_else(|| rung_ticks(LADDER[LADDER.len() - 1], division))
}

/// Raster for a measure whose shortest chord lasts `min_duration`.
pub fn measure_raster(min_duration: u64, division: u64) -> u64 {
    let div = grid_division(min_duration, division);
    if div == rung_ticks(LADDER[0], division) {
        div
    } else {
        quantize_len(min_duration, (div / 2).max(1))
    }
}

/// Nearest multiple of `raster`, at least one raster.
pub fn quantize_len(len: u64, raster: u64) -> u64 {
    (((len + raster / 2) / raster) * raster).max(raster)
}

/// Nearest grid point.
pub fn quantize_onset(onset: u64, raster: u64) -> u64 {
    ((onset + raster / 2) / raster) * raster
}

/// Quantize one track's chords measure by measure, then truncate
/// same-pitch overlaps.
///
/// The shortest duration of a measure is capped at a quarter, so a bar of
/// long values still snaps to at most a quarter-note grid. Measures are
/// walked until one ends past the last chord onset.
pub fn quantize_track(chords: ChordMap, sigmap: &TimeSigMap, diags: &mut Diagnostics) -> ChordMap {
    let division = sigmap.division();
    let last_onset = chords.iter().map(|c| c.onset).max().unwrap_or(0);

    let mut quantized: Vec<Chord> = Vec::with_capacity(chords.len());
    let mut bar = 0;
    loop {
        let start = sigmap.bar2tick(bar);
        let end = sigmap.bar2tick(bar + 1);

        let in_measure: Vec<&Chord> = chords.range(start, end).collect();
        let min_duration = in_measure
            .iter()
            .map(|c| c.duration)
            .min()
            .map(|m| m.min(division));

        if let Some(min_duration) = min_duration {
            let raster = measure_raster(min_duration, division);
            tracing::trace!(bar, start, min_duration, raster, "quantizing measure");

            for chord in in_measure {
                let mut chord = chord.clone();
                chord.retime(
                    quantize_onset(chord.onset, raster),
                    quantize_len(chord.duration, raster),
                );
                quantized.push(chord);
            }
        }

        if end > last_onset || end <= start {
            break;
        }
        bar += 1;
    }

    quantized.sort_by_key(|c| c.onset);
    resolve_overlaps(quantized, diags)
}

/// Truncate each note at the first later chord holding its pitch that
/// starts before the note ends.
///
/// Only the colliding notes are shortened. A chord whose notes end up with
/// different lengths is split into one chord per length at the same onset.
/// A note left with no length is dropped with a diagnostic.
fn resolve_overlaps(chords: Vec<Chord>, diags: &mut Diagnostics) -> ChordMap {
    let mut out = ChordMap::new();

    for (i, chord) in chords.iter().enumerate() {
        let later = &chords[i + 1..];
        // (length, notes) in order of first appearance
        let mut groups: Vec<(u64, Vec<Note>)> = Vec::new();

        for note in &chord.notes {
            let collision = later
                .iter()
                .take_while(|l| l.onset < chord.offset())
                .find(|l| l.has_pitch(note.pitch));

            let len = match collision {
                Some(l) => {
                    diags.report(
                        DiagnosticKind::OverlappingNotes,
                        chord.onset,
                        format!(
                            "overlapping pitch {}: {}+{} and {}+{}",
                            note.pitch, chord.onset, chord.duration, l.onset, l.duration
                        ),
                    );
                    l.onset - chord.onset
                }
                None => chord.duration,
            };

            if len == 0 {
                diags.report(
                    DiagnosticKind::DroppedChord,
                    chord.onset,
                    format!("pitch {} collapsed to zero length", note.pitch),
                );
                continue;
            }

            let note = Note { len, ..*note };
            match groups.iter_mut().find(|(l, _)| *l == len) {
                Some((_, notes)) => notes.push(note),
                None => groups.push((len, vec![note])),
            }
        }

        for (duration, notes) in groups {
            out.insert(Chord {
                voice: chord.voice,
                onset: chord.onset,
                duration,
                notes,
            });
        }
    }

    out
}
