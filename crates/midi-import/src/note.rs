use crate::config::TrackOptions;
use crate::meta::{KeyMap, MetaAt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single sounding note at internal resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub onset: u64,
    pub len: u64,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, onset: u64, len: u64) -> Self {
        Note {
            pitch,
            velocity,
            onset,
            len,
        }
    }

    pub fn offset(&self) -> u64 {
        self.onset + self.len
    }
}

/// Notes sharing onset and duration in one voice.
///
/// Notes keep import order, not pitch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub voice: u8,
    pub onset: u64,
    pub duration: u64,
    pub notes: Vec<Note>,
}

impl Chord {
    /// A chord holding one note.
    pub fn single(note: Note) -> Self {
        Chord {
            voice: 0,
            onset: note.onset,
            duration: note.len,
            notes: vec![note],
        }
    }

    pub fn offset(&self) -> u64 {
        self.onset + self.duration
    }

    pub fn lowest_pitch(&self) -> u8 {
        self.notes.iter().map(|n| n.pitch).min().unwrap_or(0)
    }

    pub fn highest_pitch(&self) -> u8 {
        self.notes.iter().map(|n| n.pitch).max().unwrap_or(0)
    }

    pub fn has_pitch(&self, pitch: u8) -> bool {
        self.notes.iter().any(|n| n.pitch == pitch)
    }

    /// Move to a new onset/duration, keeping the notes in step.
    pub fn retime(&mut self, onset: u64, duration: u64) {
        self.onset = onset;
        self.duration = duration;
        for note in &mut self.notes {
            note.onset = onset;
            note.len = duration;
        }
    }
}

/// Onset-ordered multimap of chords. Chords at the same tick keep
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordMap {
    by_tick: BTreeMap<u64, Vec<Chord>>,
}

impl ChordMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// One single-note chord per note.
    pub fn from_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        notes.into_iter().map(Chord::single).collect()
    }

    /// Insert keyed by the chord's onset.
    pub fn insert(&mut self, chord: Chord) {
        self.by_tick.entry(chord.onset).or_default().push(chord);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chord> {
        self.by_tick.values().flatten()
    }

    /// Chords with onset in `[start, end)`.
    pub fn range(&self, start: u64, end: u64) -> impl Iterator<Item = &Chord> {
        self.by_tick.range(start..end).flat_map(|(_, v)| v.iter())
    }

    pub fn len(&self) -> usize {
        self.by_tick.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tick.is_empty()
    }

    /// Every note, in onset then insertion order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.iter().flat_map(|c| c.notes.iter())
    }

    pub fn into_chords(self) -> impl Iterator<Item = Chord> {
        self.by_tick.into_values().flatten()
    }

    /// Latest chord end.
    pub fn end_tick(&self) -> u64 {
        self.iter().map(Chord::offset).max().unwrap_or(0)
    }

    /// Number of voices in use (highest voice + 1).
    pub fn voice_count(&self) -> u8 {
        self.iter().map(|c| c.voice + 1).max().unwrap_or(0)
    }
}

impl FromIterator<Chord> for ChordMap {
    fn from_iter<I: IntoIterator<Item = Chord>>(iter: I) -> Self {
        let mut map = ChordMap::new();
        for chord in iter {
            map.insert(chord);
        }
        map
    }
}

/// Pitch range and mean over a track's notes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PitchStats {
    pub min: u8,
    pub max: u8,
    pub mean: f64,
}

impl PitchStats {
    pub fn from_notes<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Self {
        let mut count = 0usize;
        let mut sum = 0u64;
        let mut min = u8::MAX;
        let mut max = 0u8;

        for note in notes {
            count += 1;
            sum += note.pitch as u64;
            min = min.min(note.pitch);
            max = max.max(note.pitch);
        }

        if count == 0 {
            return Self::default();
        }

        Self {
            min,
            max,
            mean: sum as f64 / count as f64,
        }
    }
}

/// One imported track after channel separation.
///
/// Carries its own import options, key map and meta events so later
/// stages never have to line it up with another list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Index among note-bearing tracks, in file order
    pub index: usize,
    pub name: Option<String>,
    pub channel: u8,
    pub program: u8,
    pub is_drum: bool,
    pub options: TrackOptions,
    pub chords: ChordMap,
    pub keys: KeyMap,
    /// Track-local meta events (lyrics, text, key signatures)
    pub meta: Vec<MetaAt>,
    pub stats: PitchStats,
    /// Voices in use after chord building
    pub voices: u8,
}

impl Track {
    pub fn new(index: usize, channel: u8) -> Self {
        Track {
            index,
            name: None,
            channel,
            program: 0,
            is_drum: channel == 9,
            options: TrackOptions::default(),
            chords: ChordMap::new(),
            keys: KeyMap::new(),
            meta: Vec::new(),
            stats: PitchStats::default(),
            voices: 1,
        }
    }

    /// Recompute pitch stats and voice count from the chords.
    pub fn update_stats(&mut self) {
        self.stats = PitchStats::from_notes(self.chords.notes());
        self.voices = self.chords.voice_count().max(1);
    }

    pub fn note_count(&self) -> usize {
        self.chords.notes().count()
    }
}
