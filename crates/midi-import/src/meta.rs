//! Meta event interpretation and the key signature map.
//!
//! `interpret` is pure: it maps one meta event to the change it asks for.
//! Applying that change is left to the converter and the score sink.

use crate::event::MetaEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A meta event at an internal-resolution tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaAt {
    pub tick: u64,
    pub event: MetaEvent,
}

/// Free-text score fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Title,
    Subtitle,
    Composer,
    Translator,
    Poet,
}

/// What a meta event changes.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaDelta {
    /// Lyric (or plain text) attached to the track's first staff
    Lyric(String),
    TrackName(String),
    /// Beats per second
    Tempo(f64),
    KeySignature(i8),
    /// Key outside -7..=7; skipped
    IllegalKey(i8),
    Text(TextKind, String),
    MetaTag(&'static str, String),
    /// Already folded into the time signature map at ingestion
    TimeSignature,
    /// Meta type byte with no meaning here
    Unknown(u8),
}

pub fn interpret(event: &MetaEvent) -> MetaDelta {
    match event {
        MetaEvent::Text(s) | MetaEvent::Lyric(s) => MetaDelta::Lyric(s.clone()),
        MetaEvent::TrackName(s) => MetaDelta::TrackName(s.clone()),
        MetaEvent::Tempo(usec) => MetaDelta::Tempo(1_000_000.0 / (*usec).max(1) as f64),
        MetaEvent::KeySignature { accidentals, .. } => {
            if (-7..=7).contains(accidentals) {
                MetaDelta::KeySignature(*accidentals)
            } else {
                MetaDelta::IllegalKey(*accidentals)
            }
        }
        MetaEvent::TimeSignature { .. } => MetaDelta::TimeSignature,
        MetaEvent::Copyright(s) => MetaDelta::MetaTag("copyright", s.clone()),
        MetaEvent::Title(s) => MetaDelta::Text(TextKind::Title, s.clone()),
        MetaEvent::Subtitle(s) => MetaDelta::Text(TextKind::Subtitle, s.clone()),
        MetaEvent::Composer(s) => MetaDelta::Text(TextKind::Composer, s.clone()),
        MetaEvent::Translator(s) => MetaDelta::Text(TextKind::Translator, s.clone()),
        MetaEvent::Poet(s) => MetaDelta::Text(TextKind::Poet, s.clone()),
        MetaEvent::Other(ty) => MetaDelta::Unknown(*ty),
    }
}

/// Ordered `tick -> accidentals` map (negative = flats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    entries: BTreeMap<u64, i8>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tick: u64, key: i8) {
        self.entries.insert(tick, key);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn key_at(&self, tick: u64) -> Option<i8> {
        self.entries.range(..=tick).next_back().map(|(_, &k)| k)
    }

    /// Entries where the key differs from the one before.
    pub fn changes(&self) -> Vec<(u64, i8)> {
        let mut out: Vec<(u64, i8)> = Vec::new();
        for (&tick, &key) in &self.entries {
            if out.last().map_or(true, |&(_, prev)| prev != key) {
                out.push((tick, key));
            }
        }
        out
    }
}
