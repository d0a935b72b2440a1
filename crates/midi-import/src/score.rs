//! Score assembly boundary.
//!
//! The converter never builds measures or staves itself. It hands a
//! [`ScoreSink`] the measure layout and part plan, then feeds it chords,
//! rests, ties and signature changes. [`Score`] is the in-memory sink used
//! by the CLI and the tests.

use crate::drumset::StemDirection;
use crate::duration::NotatedDuration;
use crate::meta::TextKind;
use crate::note::Track;
use crate::timesig::{MeasureSpan, TimeSig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolves a tick to the measure holding it.
pub trait MeasureIndex {
    fn measure_at(&self, tick: u64) -> Option<MeasureSpan>;
}

/// A planned list of measures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measures(pub Vec<MeasureSpan>);

impl Measures {
    pub fn spans(&self) -> &[MeasureSpan] {
        &self.0
    }

    pub fn end_tick(&self) -> u64 {
        self.0.last().map_or(0, |m| m.end)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl MeasureIndex for Measures {
    fn measure_at(&self, tick: u64) -> Option<MeasureSpan> {
        let i = self.0.partition_point(|m| m.end <= tick);
        self.0.get(i).filter(|m| m.contains(tick)).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    Treble,
    Bass,
    Percussion,
}

/// Staves for one imported track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartPlan {
    pub name: Option<String>,
    pub program: u8,
    pub is_drum: bool,
    /// (clef, index of the track feeding this staff)
    pub staves: Vec<(Clef, usize)>,
    /// Brace across the staves (piano)
    pub braced: bool,
}

/// Lay out parts for the tracks in processing order.
///
/// A pitched program-0 track directly followed by another track on the
/// same channel (a separated pair) becomes one braced treble+bass part.
pub fn plan_parts(tracks: &[Track]) -> Vec<PartPlan> {
    let mut plans = Vec::new();
    let mut i = 0;

    while i < tracks.len() {
        let track = &tracks[i];
        let mut plan = PartPlan {
            name: track.name.clone(),
            program: track.program,
            is_drum: track.is_drum,
            staves: Vec::new(),
            braced: false,
        };

        let paired = !track.is_drum
            && track.program == 0
            && tracks
                .get(i + 1)
                .is_some_and(|next| !next.is_drum && next.channel == track.channel);

        if track.is_drum {
            plan.staves.push((Clef::Percussion, i));
            i += 1;
        } else if paired {
            plan.staves.push((Clef::Treble, i));
            plan.staves.push((Clef::Bass, i + 1));
            plan.braced = true;
            i += 2;
        } else {
            let clef = if track.stats.mean < 58.0 {
                Clef::Bass
            } else {
                Clef::Treble
            };
            plan.staves.push((clef, i));
            i += 1;
        }

        plans.push(plan);
    }

    plans
}

pub type StaffId = usize;

/// Position of a note in a staff's note arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId {
    pub staff: StaffId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotatedNote {
    pub pitch: u8,
    pub velocity: u8,
    pub stem: StemDirection,
}

/// A chord segment ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotatedChord {
    pub tick: u64,
    pub voice: u8,
    pub duration: NotatedDuration,
    pub ticks: u64,
    pub notes: Vec<NotatedNote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotatedRest {
    pub tick: u64,
    pub voice: u8,
    pub duration: NotatedDuration,
    pub ticks: u64,
}

/// The external score structure, as seen from the converter.
pub trait ScoreSink {
    fn add_measures(&mut self, measures: &[MeasureSpan]);
    /// Create a part; returns its staves in plan order.
    fn add_part(&mut self, plan: &PartPlan) -> Vec<StaffId>;
    fn add_time_signature(&mut self, staff: StaffId, tick: u64, sig: TimeSig);
    fn add_key_signature(&mut self, staff: StaffId, tick: u64, key: i8);
    /// Insert a chord; returns its notes' ids in order.
    fn add_chord(&mut self, staff: StaffId, chord: NotatedChord) -> Vec<NoteId>;
    fn add_rest(&mut self, staff: StaffId, rest: NotatedRest);
    fn add_tie(&mut self, start: NoteId, end: NoteId);
    fn set_tempo(&mut self, tick: u64, beats_per_second: f64);
    fn add_lyric(&mut self, staff: StaffId, tick: u64, text: &str);
    fn add_text(&mut self, kind: TextKind, text: &str);
    fn set_meta_tag(&mut self, key: &str, value: &str);
}

/// A note in the assembled score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreNote {
    pub pitch: u8,
    pub velocity: u8,
    pub tick: u64,
    pub ticks: u64,
    pub voice: u8,
    pub stem: StemDirection,
    pub tie_back: Option<NoteId>,
    pub tie_forward: Option<NoteId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Chord {
        tick: u64,
        voice: u8,
        duration: NotatedDuration,
        ticks: u64,
        /// Indices into the staff's notes
        notes: Vec<usize>,
    },
    Rest {
        tick: u64,
        voice: u8,
        duration: NotatedDuration,
        ticks: u64,
    },
}

impl Element {
    pub fn tick(&self) -> u64 {
        match self {
            Element::Chord { tick, .. } | Element::Rest { tick, .. } => *tick,
        }
    }

    pub fn ticks(&self) -> u64 {
        match self {
            Element::Chord { ticks, .. } | Element::Rest { ticks, .. } => *ticks,
        }
    }

    pub fn voice(&self) -> u8 {
        match self {
            Element::Chord { voice, .. } | Element::Rest { voice, .. } => *voice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub part: usize,
    pub clef: Clef,
    pub elements: Vec<Element>,
    pub notes: Vec<ScoreNote>,
    pub key_signatures: Vec<(u64, i8)>,
    pub time_signatures: Vec<(u64, TimeSig)>,
    pub lyrics: Vec<(u64, String)>,
}

impl Staff {
    pub fn chords(&self) -> impl Iterator<Item = &Element> {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Chord { .. }))
    }

    pub fn rests(&self) -> impl Iterator<Item = &Element> {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Rest { .. }))
    }

    /// Elements of one voice in tick order.
    pub fn voice(&self, voice: u8) -> Vec<&Element> {
        let mut out: Vec<&Element> = self.elements.iter().filter(|e| e.voice() == voice).collect();
        out.sort_by_key(|e| e.tick());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: Option<String>,
    pub program: u8,
    pub is_drum: bool,
    pub braced: bool,
    pub staves: Vec<StaffId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tie {
    pub start: NoteId,
    pub end: NoteId,
}

/// In-memory score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub measures: Vec<MeasureSpan>,
    pub parts: Vec<Part>,
    pub staves: Vec<Staff>,
    pub ties: Vec<Tie>,
    /// (tick, beats per second)
    pub tempo: Vec<(u64, f64)>,
    pub texts: Vec<(TextKind, String)>,
    pub meta_tags: BTreeMap<String, String>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&self, id: NoteId) -> Option<&ScoreNote> {
        self.staves.get(id.staff)?.notes.get(id.index)
    }

    /// Follow forward ties from `start`.
    pub fn tie_chain(&self, start: NoteId) -> Vec<NoteId> {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(next) = self.note(current).and_then(|n| n.tie_forward) {
            chain.push(next);
            current = next;
        }
        chain
    }

    /// True when the score holds no musical content at all.
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
            && self.parts.is_empty()
            && self.staves.is_empty()
            && self.tempo.is_empty()
            && self.texts.is_empty()
            && self.meta_tags.is_empty()
    }
}

impl ScoreSink for Score {
    fn add_measures(&mut self, measures: &[MeasureSpan]) {
        self.measures.extend_from_slice(measures);
    }

    fn add_part(&mut self, plan: &PartPlan) -> Vec<StaffId> {
        let part = self.parts.len();
        let staves: Vec<StaffId> = plan
            .staves
            .iter()
            .map(|&(clef, _)| {
                self.staves.push(Staff {
                    part,
                    clef,
                    elements: Vec::new(),
                    notes: Vec::new(),
                    key_signatures: Vec::new(),
                    time_signatures: Vec::new(),
                    lyrics: Vec::new(),
                });
                self.staves.len() - 1
            })
            .collect();

        self.parts.push(Part {
            name: plan.name.clone(),
            program: plan.program,
            is_drum: plan.is_drum,
            braced: plan.braced,
            staves: staves.clone(),
        });
        staves
    }

    fn add_time_signature(&mut self, staff: StaffId, tick: u64, sig: TimeSig) {
        if let Some(s) = self.staves.get_mut(staff) {
            s.time_signatures.push((tick, sig));
        }
    }

    fn add_key_signature(&mut self, staff: StaffId, tick: u64, key: i8) {
        if let Some(s) = self.staves.get_mut(staff) {
            s.key_signatures.push((tick, key));
        }
    }

    fn add_chord(&mut self, staff: StaffId, chord: NotatedChord) -> Vec<NoteId> {
        let Some(s) = self.staves.get_mut(staff) else {
            return Vec::new();
        };

        let first = s.notes.len();
        s.notes.extend(chord.notes.iter().map(|n| ScoreNote {
            pitch: n.pitch,
            velocity: n.velocity,
            tick: chord.tick,
            ticks: chord.ticks,
            voice: chord.voice,
            stem: n.stem,
            tie_back: None,
            tie_forward: None,
        }));
        let indices: Vec<usize> = (first..s.notes.len()).collect();

        s.elements.push(Element::Chord {
            tick: chord.tick,
            voice: chord.voice,
            duration: chord.duration,
            ticks: chord.ticks,
            notes: indices.clone(),
        });

        indices
            .into_iter()
            .map(|index| NoteId { staff, index })
            .collect()
    }

    fn add_rest(&mut self, staff: StaffId, rest: NotatedRest) {
        if let Some(s) = self.staves.get_mut(staff) {
            s.elements.push(Element::Rest {
                tick: rest.tick,
                voice: rest.voice,
                duration: rest.duration,
                ticks: rest.ticks,
            });
        }
    }

    fn add_tie(&mut self, start: NoteId, end: NoteId) {
        if self.note(start).is_none() || self.note(end).is_none() {
            return;
        }

        self.staves[start.staff].notes[start.index].tie_forward = Some(end);
        self.staves[end.staff].notes[end.index].tie_back = Some(start);
        self.ties.push(Tie { start, end });
    }

    fn set_tempo(&mut self, tick: u64, beats_per_second: f64) {
        self.tempo.retain(|&(t, _)| t != tick);
        self.tempo.push((tick, beats_per_second));
        self.tempo.sort_by_key(|&(t, _)| t);
    }

    fn add_lyric(&mut self, staff: StaffId, tick: u64, text: &str) {
        if let Some(s) = self.staves.get_mut(staff) {
            s.lyrics.push((tick, text.to_string()));
        }
    }

    fn add_text(&mut self, kind: TextKind, text: &str) {
        self.texts.push((kind, text.to_string()));
    }

    fn set_meta_tag(&mut self, key: &str, value: &str) {
        self.meta_tags.insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::DurationType;
    use crate::note::{ChordMap, Note, PitchStats};
    use crate::timesig::TimeSigMap;

    fn track(channel: u8, program: u8, mean: f64) -> Track {
        let mut t = Track::new(0, channel);
        t.program = program;
        t.stats = PitchStats {
            min: 0,
            max: 127,
            mean,
        };
        t.chords = ChordMap::from_notes([Note::new(60, 100, 0, 480)]);
        t
    }

    #[test]
    fn test_measure_index_lookup() {
        let measures = Measures(TimeSigMap::new(480).measures_until(4000));
        assert_eq!(measures.len(), 3);
        assert_eq!(measures.measure_at(0).map(|m| m.index), Some(0));
        assert_eq!(measures.measure_at(1919).map(|m| m.index), Some(0));
        assert_eq!(measures.measure_at(1920).map(|m| m.index), Some(1));
        assert_eq!(measures.measure_at(5760), None);
        assert_eq!(measures.end_tick(), 5760);
    }

    #[test]
    fn test_plan_parts_clefs() {
        let tracks = vec![track(0, 40, 70.0), track(1, 32, 40.0), track(9, 0, 40.0)];
        let plans = plan_parts(&tracks);

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].staves, vec![(Clef::Treble, 0)]);
        assert_eq!(plans[1].staves, vec![(Clef::Bass, 1)]);
        assert_eq!(plans[2].staves, vec![(Clef::Percussion, 2)]);
        assert!(plans[2].is_drum);
    }

    #[test]
    fn test_plan_parts_piano_pair() {
        let tracks = vec![track(0, 0, 72.0), track(0, 0, 45.0), track(1, 0, 60.0)];
        let plans = plan_parts(&tracks);

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].staves, vec![(Clef::Treble, 0), (Clef::Bass, 1)]);
        assert!(plans[0].braced);
        assert_eq!(plans[1].staves, vec![(Clef::Treble, 2)]);
    }

    #[test]
    fn test_ties_link_both_ways() {
        let mut score = Score::new();
        let staves = score.add_part(&PartPlan {
            name: None,
            program: 0,
            is_drum: false,
            staves: vec![(Clef::Treble, 0)],
            braced: false,
        });
        let note = NotatedNote {
            pitch: 60,
            velocity: 90,
            stem: StemDirection::Auto,
        };
        let chord = |tick| NotatedChord {
            tick,
            voice: 0,
            duration: NotatedDuration::plain(DurationType::Quarter),
            ticks: 480,
            notes: vec![note],
        };

        let a = score.add_chord(staves[0], chord(0));
        let b = score.add_chord(staves[0], chord(480));
        score.add_tie(a[0], b[0]);

        assert_eq!(score.note(a[0]).unwrap().tie_forward, Some(b[0]));
        assert_eq!(score.note(b[0]).unwrap().tie_back, Some(a[0]));
        assert_eq!(score.tie_chain(a[0]), vec![a[0], b[0]]);
        assert_eq!(score.ties.len(), 1);

        // dangling ids are ignored
        score.add_tie(a[0], NoteId { staff: 5, index: 0 });
        assert_eq!(score.ties.len(), 1);
    }
}
