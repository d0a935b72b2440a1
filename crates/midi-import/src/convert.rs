//! Conversion driver: runs the stages in order over ingested tracks and
//! feeds the results to a score sink.

use crate::chords::build_chords;
use crate::config::ImportConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::drumset::DrumMap;
use crate::hands::separate_hands;
use crate::ingest::Ingested;
use crate::meta::{interpret, MetaDelta};
use crate::note::{Note, Track};
use crate::quantize::quantize_track;
use crate::reconstruct::{reconstruct_track, ReconstructContext, ReconstructStats};
use crate::score::{plan_parts, Measures, ScoreSink, StaffId};
use serde::{Deserialize, Serialize};

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Tracks written, after hand separation
    pub tracks: usize,
    pub staves: usize,
    pub measures: usize,
    /// End of the material, before rounding up to the barline
    pub last_tick: u64,
    /// Notated chord segments written, across all staves
    pub chords: usize,
    pub rests: usize,
    pub ties: usize,
}

/// Chord building and quantization for one track.
fn prepare_track(
    track: &mut Track,
    drums: &DrumMap,
    ingested: &Ingested,
    config: &ImportConfig,
    diags: &mut Diagnostics,
) {
    let notes: Vec<Note> = track.chords.notes().copied().collect();
    let drums = track.is_drum.then_some(drums);

    let chords = build_chords(&notes, drums, config.chord_jitter as u64, diags);
    track.chords = quantize_track(chords, &ingested.sigmap, diags);
    track.update_stats();
}

/// Run every stage after ingestion.
pub fn convert(
    ingested: &Ingested,
    config: &ImportConfig,
    sink: &mut dyn ScoreSink,
    diags: &mut Diagnostics,
) -> ImportReport {
    let drums = DrumMap::from_config(config.drums.as_deref());

    let selected: Vec<Track> = ingested
        .tracks
        .iter()
        .filter(|t| t.options.do_import)
        .cloned()
        .collect();
    let mut tracks = separate_hands(selected, config.hand_split_interval);

    for (i, track) in tracks.iter_mut().enumerate() {
        diags.set_track(Some(i));
        prepare_track(track, &drums, ingested, config, diags);
    }
    diags.set_track(None);

    let last_tick = tracks
        .iter()
        .map(|t| t.chords.end_tick())
        .fold(ingested.last_tick, u64::max);
    let measures = Measures(ingested.sigmap.measures_until(last_tick));
    sink.add_measures(measures.spans());

    tracing::info!(
        tracks = tracks.len(),
        measures = measures.len(),
        last_tick,
        "assembling score"
    );

    // staff for each track, and the first staff of its part
    let mut staff_of: Vec<(StaffId, StaffId)> = vec![(0, 0); tracks.len()];
    let mut all_staves = Vec::new();
    for plan in plan_parts(&tracks) {
        let staves = sink.add_part(&plan);
        for (&(_, track), &staff) in plan.staves.iter().zip(&staves) {
            staff_of[track] = (staff, staves[0]);
        }
        all_staves.extend(staves);
    }

    let end_tick = measures.end_tick();
    for &staff in &all_staves {
        for (tick, sig) in ingested.sigmap.iter() {
            if tick == 0 || tick < end_tick {
                sink.add_time_signature(staff, tick, sig);
            }
        }
    }

    for meta in &ingested.global {
        match interpret(&meta.event) {
            MetaDelta::Tempo(bps) => sink.set_tempo(meta.tick, bps),
            MetaDelta::Text(kind, text) => sink.add_text(kind, &text),
            MetaDelta::MetaTag(key, value) => sink.set_meta_tag(key, &value),
            _ => {}
        }
    }

    let ctx = ReconstructContext {
        measures: &measures,
        end_tick,
        division: ingested.division,
        use_dots: config.use_dots,
    };

    let mut totals = ReconstructStats::default();
    for (i, track) in tracks.iter().enumerate() {
        let (staff, first_staff) = staff_of[i];
        diags.set_track(Some(i));

        if !track.is_drum {
            for (tick, key) in track.keys.changes() {
                sink.add_key_signature(staff, tick, key);
            }
        }

        for meta in &track.meta {
            if let MetaDelta::Lyric(text) = interpret(&meta.event) {
                sink.add_lyric(first_staff, meta.tick, &text);
            }
        }

        let stats = reconstruct_track(track, staff, Some(&drums), &ctx, sink, diags);
        totals.chords += stats.chords;
        totals.rests += stats.rests;
        totals.ties += stats.ties;
    }
    diags.set_track(None);

    ImportReport {
        diagnostics: Vec::new(),
        tracks: tracks.len(),
        staves: all_staves.len(),
        measures: measures.len(),
        last_tick,
        chords: totals.chords,
        rests: totals.rests,
        ties: totals.ties,
    }
}
