//! Percussion pitch map: which pitches are valid, which voice they go to,
//! and which way their stems point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemDirection {
    #[default]
    Auto,
    Up,
    Down,
}

/// One mapped percussion pitch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumEntry {
    pub pitch: u8,
    #[serde(default)]
    pub voice: u8,
    #[serde(default)]
    pub stem: StemDirection,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrumMap {
    entries: BTreeMap<u8, DrumEntry>,
}

impl DrumMap {
    pub fn new(entries: impl IntoIterator<Item = DrumEntry>) -> Self {
        DrumMap {
            entries: entries.into_iter().map(|e| (e.pitch, e)).collect(),
        }
    }

    /// General MIDI percussion (35..=81). Kicks and pedal hi-hat sit in
    /// voice 1 with stems down, everything else in voice 0 with stems up.
    pub fn general_midi() -> Self {
        Self::new((35..=81).map(|pitch| {
            let low = matches!(pitch, 35 | 36 | 44);
            DrumEntry {
                pitch,
                voice: if low { 1 } else { 0 },
                stem: if low {
                    StemDirection::Down
                } else {
                    StemDirection::Up
                },
                name: gm_drum_name(pitch).map(str::to_string),
            }
        }))
    }

    /// Custom entries from config, or General MIDI.
    pub fn from_config(entries: Option<&[DrumEntry]>) -> Self {
        match entries {
            Some(entries) => Self::new(entries.iter().cloned()),
            None => Self::general_midi(),
        }
    }

    pub fn is_valid(&self, pitch: u8) -> bool {
        self.entries.contains_key(&pitch)
    }

    pub fn get(&self, pitch: u8) -> Option<&DrumEntry> {
        self.entries.get(&pitch)
    }

    /// Voice for a mapped pitch.
    pub fn voice(&self, pitch: u8) -> Option<u8> {
        self.entries.get(&pitch).map(|e| e.voice)
    }

    pub fn stem(&self, pitch: u8) -> StemDirection {
        self.entries
            .get(&pitch)
            .map(|e| e.stem)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DrumMap {
    fn default() -> Self {
        Self::general_midi()
    }
}

/// Human-readable name for a GM percussion key.
pub fn gm_drum_name(pitch: u8) -> Option<&'static str> {
    let name = match pitch {
        35 => "Acoustic Bass Drum",
        36 => "Bass Drum 1",
        37 => "Side Stick",
        38 => "Acoustic Snare",
        39 => "Hand Clap",
        40 => "Electric Snare",
        41 => "Low Floor Tom",
        42 => "Closed Hi-Hat",
        43 => "High Floor Tom",
        44 => "Pedal Hi-Hat",
        45 => "Low Tom",
        46 => "Open Hi-Hat",
        47 => "Low-Mid Tom",
        48 => "Hi-Mid Tom",
        49 => "Crash Cymbal 1",
        50 => "High Tom",
        51 => "Ride Cymbal 1",
        52 => "Chinese Cymbal",
        53 => "Ride Bell",
        54 => "Tambourine",
        55 => "Splash Cymbal",
        56 => "Cowbell",
        57 => "Crash Cymbal 2",
        58 => "Vibraslap",
        59 => "Ride Cymbal 2",
        60 => "Hi Bongo",
        61 => "Low Bongo",
        62 => "Mute Hi Conga",
        63 => "Open Hi Conga",
        64 => "Low Conga",
        65 => "High Timbale",
        66 => "Low Timbale",
        67 => "High Agogo",
        68 => "Low Agogo",
        69 => "Cabasa",
        70 => "Maracas",
        71 => "Short Whistle",
        72 => "Long Whistle",
        73 => "Short Guiro",
        74 => "Long Guiro",
        75 => "Claves",
        76 => "Hi Wood Block",
        77 => "Low Wood Block",
        78 => "Mute Cuica",
        79 => "Open Cuica",
        80 => "Mute Triangle",
        81 => "Open Triangle",
        _ => return None,
    };
    Some(name)
}
