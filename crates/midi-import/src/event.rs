//! Raw track events, decoupled from the midly borrow of the file bytes.

use midly::{MetaMessage, MidiMessage, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

/// A tick-tagged event at the file's own resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Source track in the file
    pub track: usize,
    /// Absolute tick, source resolution
    pub tick: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    Program { channel: u8, program: u8 },
    Meta(MetaEvent),
}

impl EventKind {
    pub fn channel(&self) -> Option<u8> {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::Program { channel, .. } => Some(*channel),
            Self::Meta(_) => None,
        }
    }
}

/// Meta events the import cares about. Text payloads are decoded lossily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "meta", content = "value", rename_all = "snake_case")]
pub enum MetaEvent {
    Text(String),
    Lyric(String),
    TrackName(String),
    Copyright(String),
    /// Microseconds per quarter note
    Tempo(u32),
    KeySignature { accidentals: i8, minor: bool },
    /// Denominator as a power of two, as stored in the file
    TimeSignature { numerator: u8, denominator_pow: u8 },
    Title(String),
    Subtitle(String),
    Composer(String),
    Translator(String),
    Poet(String),
    /// Anything else, by meta type byte
    Other(u8),
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()
}

impl MetaEvent {
    /// Convert a midly meta message. End-of-track yields None.
    ///
    /// Types 0x08..=0x0C carry title, subtitle, composer, translator and
    /// poet text as written by notation editors; midly knows the first two
    /// as program and device name.
    pub fn from_midly(message: &MetaMessage<'_>) -> Option<Self> {
        let event = match *message {
            MetaMessage::Text(b) => Self::Text(text(b)),
            MetaMessage::Lyric(b) => Self::Lyric(text(b)),
            MetaMessage::TrackName(b) => Self::TrackName(text(b)),
            MetaMessage::Copyright(b) => Self::Copyright(text(b)),
            MetaMessage::Tempo(t) => Self::Tempo(t.as_int()),
            MetaMessage::KeySignature(accidentals, minor) => {
                Self::KeySignature { accidentals, minor }
            }
            MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => Self::TimeSignature {
                numerator,
                denominator_pow,
            },
            MetaMessage::ProgramName(b) => Self::Title(text(b)),
            MetaMessage::DeviceName(b) => Self::Subtitle(text(b)),
            MetaMessage::Unknown(0x0A, b) => Self::Composer(text(b)),
            MetaMessage::Unknown(0x0B, b) => Self::Translator(text(b)),
            MetaMessage::Unknown(0x0C, b) => Self::Poet(text(b)),
            MetaMessage::Unknown(ty, _) => Self::Other(ty),
            MetaMessage::TrackNumber(_) => Self::Other(0x00),
            MetaMessage::InstrumentName(_) => Self::Other(0x04),
            MetaMessage::Marker(_) => Self::Other(0x06),
            MetaMessage::CuePoint(_) => Self::Other(0x07),
            MetaMessage::MidiChannel(_) => Self::Other(0x20),
            MetaMessage::MidiPort(_) => Self::Other(0x21),
            MetaMessage::SmpteOffset(_) => Self::Other(0x54),
            MetaMessage::SequencerSpecific(_) => Self::Other(0x7F),
            MetaMessage::EndOfTrack => return None,
        };
        Some(event)
    }
}

/// Flatten one midly track into absolute-tick raw events.
pub fn raw_events(track_index: usize, events: &[TrackEvent<'_>]) -> Vec<RawEvent> {
    let mut out = Vec::with_capacity(events.len());
    let mut tick: u64 = 0;

    for event in events {
        tick += event.delta.as_int() as u64;

        let kind = match event.kind {
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    // vel=0 NoteOn is NoteOff
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => EventKind::NoteOn {
                        channel,
                        pitch: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        EventKind::NoteOff {
                            channel,
                            pitch: key.as_int(),
                        }
                    }
                    MidiMessage::ProgramChange { program } => EventKind::Program {
                        channel,
                        program: program.as_int(),
                    },
                    _ => continue,
                }
            }
            TrackEventKind::Meta(ref meta) => match MetaEvent::from_midly(meta) {
                Some(m) => EventKind::Meta(m),
                None => continue,
            },
            _ => continue,
        };

        out.push(RawEvent {
            track: track_index,
            tick,
            kind,
        });
    }

    out
}
