//! Event ingestion: resolution normalization, channel separation, note
//! pairing and meta routing.

use crate::config::ImportConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::event::{raw_events, EventKind, MetaEvent, RawEvent};
use crate::meta::{interpret, KeyMap, MetaAt, MetaDelta};
use crate::note::{ChordMap, Note, Track};
use crate::timesig::{TimeSig, TimeSigMap};
use crate::{Error, Result};
use midly::{Smf, Timing};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything the later stages need from the file.
#[derive(Debug, Clone)]
pub struct Ingested {
    /// Internal ticks per quarter
    pub division: u64,
    /// The file's ticks per quarter
    pub source_ppq: u16,
    /// Note-bearing tracks after channel separation
    pub tracks: Vec<Track>,
    /// Score-level meta events (tempo, title texts, copyright)
    pub global: Vec<MetaAt>,
    /// Key signatures from tracks without notes
    pub global_keys: KeyMap,
    pub sigmap: TimeSigMap,
    /// Latest note end, internal resolution
    pub last_tick: u64,
}

/// Summary of one note-bearing track, for choosing per-track options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub index: usize,
    pub name: Option<String>,
    pub channel: u8,
    pub program: u8,
    pub is_drum: bool,
    pub note_count: usize,
    pub pitch_min: u8,
    pub pitch_max: u8,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        TrackSummary {
            index: track.index,
            name: track.name.clone(),
            channel: track.channel,
            program: track.program,
            is_drum: track.is_drum,
            note_count: track.note_count(),
            pitch_min: track.stats.min,
            pitch_max: track.stats.max,
        }
    }
}

/// Parse Standard MIDI File bytes.
pub fn parse(bytes: &[u8]) -> Result<Smf<'_>> {
    Smf::parse(bytes).map_err(|e| Error::BadFormat(e.to_string()))
}

/// Summarize the note-bearing tracks of a file.
pub fn list_tracks(bytes: &[u8]) -> Result<Vec<TrackSummary>> {
    let smf = parse(bytes)?;
    let mut diags = Diagnostics::new();
    let ingested = ingest(&smf, &ImportConfig::default(), &mut diags);
    Ok(ingested.tracks.iter().map(TrackSummary::from).collect())
}

/// Round a source tick to internal resolution.
pub fn normalize_tick(tick: u64, ppq: u64, division: u64) -> u64 {
    (tick * division + ppq / 2) / ppq
}

/// Source track split by channel, still at source resolution.
struct ChannelTrack {
    channel: u8,
    program: Option<u8>,
    /// (onset, len, pitch, velocity)
    notes: Vec<(u64, u64, u8, u8)>,
    meta: Vec<(u64, MetaEvent)>,
}

impl ChannelTrack {
    fn new(channel: u8) -> Self {
        ChannelTrack {
            channel,
            program: None,
            notes: Vec::new(),
            meta: Vec::new(),
        }
    }
}

/// Pair note-ons with note-offs per channel. Channels appear in order of
/// their first note-on; meta events go to the first channel.
fn separate_channels(raw: &[RawEvent], diags: &mut Diagnostics) -> Vec<ChannelTrack> {
    let mut order: Vec<u8> = Vec::new();
    for ev in raw {
        if let EventKind::NoteOn { channel, .. } = ev.kind {
            if !order.contains(&channel) {
                order.push(channel);
            }
        }
    }

    let mut out: Vec<ChannelTrack> = order.iter().map(|&ch| ChannelTrack::new(ch)).collect();
    if out.is_empty() {
        let mut meta_only = ChannelTrack::new(0);
        meta_only.meta = raw
            .iter()
            .filter_map(|ev| match &ev.kind {
                EventKind::Meta(m) => Some((ev.tick, m.clone())),
                _ => None,
            })
            .collect();
        return vec![meta_only];
    }

    let slot = |channel: u8| order.iter().position(|&c| c == channel);

    // (channel, pitch) -> stack of (onset, velocity)
    let mut pending: BTreeMap<(u8, u8), Vec<(u64, u8)>> = BTreeMap::new();
    let mut last_tick = 0;

    for ev in raw {
        last_tick = last_tick.max(ev.tick);
        match &ev.kind {
            EventKind::NoteOn {
                channel,
                pitch,
                velocity,
            } => {
                pending
                    .entry((*channel, *pitch))
                    .or_default()
                    .push((ev.tick, *velocity));
            }
            EventKind::NoteOff { channel, pitch } => {
                let started = pending
                    .get_mut(&(*channel, *pitch))
                    .and_then(|stack| stack.pop());
                match (started, slot(*channel)) {
                    (Some((onset, velocity)), Some(i)) => {
                        out[i].notes.push((onset, ev.tick - onset, *pitch, velocity));
                    }
                    _ => diags.report(
                        DiagnosticKind::UnpairedNoteOff,
                        ev.tick,
                        format!("note-off without note-on: channel {channel} pitch {pitch}"),
                    ),
                }
            }
            EventKind::Program { channel, program } => {
                if let Some(i) = slot(*channel) {
                    out[i].program.get_or_insert(*program);
                }
            }
            EventKind::Meta(m) => out[0].meta.push((ev.tick, m.clone())),
        }
    }

    // Close any unclosed notes at the track's final tick
    for ((channel, pitch), stack) in pending {
        for (onset, velocity) in stack {
            diags.report(
                DiagnosticKind::UnterminatedNote,
                onset,
                format!("note never released: channel {channel} pitch {pitch}"),
            );
            if let Some(i) = slot(channel) {
                out[i].notes.push((onset, last_tick - onset, pitch, velocity));
            }
        }
    }

    for ct in &mut out {
        ct.notes.sort_by_key(|n| n.0);
    }

    out
}

/// Ingest a parsed file.
pub fn ingest(smf: &Smf<'_>, config: &ImportConfig, diags: &mut Diagnostics) -> Ingested {
    let division = config.division.max(1) as u64;

    let source_ppq = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int().max(1),
        Timing::Timecode(fps, subframe) => {
            diags.report(
                DiagnosticKind::TimecodeTiming,
                0,
                format!(
                    "timecode timing ({} fps, {subframe} subframes) read as 480 ticks per quarter",
                    fps.as_f32()
                ),
            );
            480
        }
    };
    let ppq = source_ppq as u64;
    let norm = |tick: u64| normalize_tick(tick, ppq, division);

    let mut tracks: Vec<Track> = Vec::new();
    let mut global = Vec::new();
    let mut global_keys = KeyMap::new();
    let mut sigmap = TimeSigMap::new(division);
    let mut last_tick = 0;

    for (source_index, events) in smf.tracks.iter().enumerate() {
        let raw = raw_events(source_index, events);

        for ct in separate_channels(&raw, diags) {
            let has_notes = !ct.notes.is_empty();
            let mut track = Track::new(tracks.len(), ct.channel);
            diags.set_track(has_notes.then_some(track.index));

            track.program = ct.program.unwrap_or(0);
            track.options = config.options_for_track(track.index);

            for (tick, event) in ct.meta {
                let tick = norm(tick);

                if let MetaEvent::TimeSignature {
                    numerator,
                    denominator_pow,
                } = event
                {
                    let denominator = 1u8.checked_shl(denominator_pow as u32).unwrap_or(0);
                    if !sigmap.add(tick, TimeSig::new(numerator, denominator)) {
                        diags.report(
                            DiagnosticKind::IllegalTimeSignature,
                            tick,
                            format!("illegal time signature {numerator}/2^{denominator_pow}"),
                        );
                    }
                    continue;
                }

                match interpret(&event) {
                    MetaDelta::TrackName(name) => {
                        if has_notes && track.name.is_none() && !name.is_empty() {
                            track.name = Some(name);
                        }
                    }
                    MetaDelta::KeySignature(key) => {
                        if has_notes {
                            track.keys.insert(tick, key);
                        } else {
                            global_keys.insert(tick, key);
                        }
                    }
                    MetaDelta::IllegalKey(key) => diags.report(
                        DiagnosticKind::IllegalKeySignature,
                        tick,
                        format!("illegal key signature {key}"),
                    ),
                    MetaDelta::Unknown(ty) => diags.report(
                        DiagnosticKind::UnknownMeta,
                        tick,
                        format!("unknown meta type 0x{ty:02x}"),
                    ),
                    MetaDelta::Lyric(_) => {
                        if has_notes {
                            track.meta.push(MetaAt { tick, event });
                        } else {
                            tracing::debug!(tick, "dropping text on track without notes");
                        }
                    }
                    MetaDelta::Tempo(_) | MetaDelta::Text(..) | MetaDelta::MetaTag(..) => {
                        global.push(MetaAt { tick, event });
                    }
                    MetaDelta::TimeSignature => {}
                }
            }

            if !has_notes {
                continue;
            }

            let notes = ct.notes.iter().map(|&(onset, len, pitch, velocity)| {
                Note::new(pitch, velocity, norm(onset), norm(len))
            });
            track.chords = ChordMap::from_notes(notes);
            track.update_stats();
            last_tick = last_tick.max(track.chords.end_tick());

            tracing::debug!(
                track = track.index,
                source = source_index,
                channel = track.channel,
                notes = track.note_count(),
                "ingested track"
            );
            tracks.push(track);
        }
    }
    diags.set_track(None);

    seed_keys(&mut tracks, &global_keys);
    global.sort_by_key(|m| m.tick);

    Ingested {
        division,
        source_ppq,
        tracks,
        global,
        global_keys,
        sigmap,
        last_tick,
    }
}

/// Give keyless pitched tracks the conductor track's keys, or C major.
fn seed_keys(tracks: &mut [Track], global_keys: &KeyMap) {
    for track in tracks.iter_mut().filter(|t| !t.is_drum && t.keys.is_empty()) {
        if global_keys.is_empty() {
            track.keys.insert(0, 0);
        } else {
            track.keys = global_keys.clone();
        }
    }
}
