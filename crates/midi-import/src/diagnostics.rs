//! Import diagnostics.
//!
//! Everything past a successful parse is best-effort: anomalies in the
//! event data are recorded here, the offending note/rest/meta event is
//! dropped or defaulted, and the conversion keeps going.

use serde::{Deserialize, Serialize};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Percussion pitch with no drum map entry; imported on the default voice
    UnmappedDrumPitch,
    /// Same pitch twice within one chord merge group; the later one is dropped
    DuplicateNote,
    /// Two notes of equal pitch overlapped after quantization; the earlier was shortened
    OverlappingNotes,
    /// Chord whose duration collapsed to zero
    DroppedChord,
    /// A length that no sequence of legal note values can express
    UndecomposableDuration,
    IllegalKeySignature,
    IllegalTimeSignature,
    UnknownMeta,
    /// Note-off without a sounding note
    UnpairedNoteOff,
    /// Note still sounding at end of track
    UnterminatedNote,
    /// Material past the last measure of the score
    BeyondLastMeasure,
    /// SMPTE timing, treated as 480 ticks per quarter
    TimecodeTiming,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnmappedDrumPitch => "unmapped_drum_pitch",
            Self::DuplicateNote => "duplicate_note",
            Self::OverlappingNotes => "overlapping_notes",
            Self::DroppedChord => "dropped_chord",
            Self::UndecomposableDuration => "undecomposable_duration",
            Self::IllegalKeySignature => "illegal_key_signature",
            Self::IllegalTimeSignature => "illegal_time_signature",
            Self::UnknownMeta => "unknown_meta",
            Self::UnpairedNoteOff => "unpaired_note_off",
            Self::UnterminatedNote => "unterminated_note",
            Self::BeyondLastMeasure => "beyond_last_measure",
            Self::TimecodeTiming => "timecode_timing",
        }
    }

    /// Default severity: anything that changed or lost data is a warning.
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            Self::UnknownMeta | Self::UnpairedNoteOff | Self::OverlappingNotes => {
                DiagnosticLevel::Info
            }
            _ => DiagnosticLevel::Warning,
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    /// Data was dropped or altered
    Warning,
    /// Harmless, kept for completeness
    Info,
}

/// A single recoverable anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub level: DiagnosticLevel,
    pub message: String,
    /// Internal-resolution tick, when the anomaly has a position
    pub tick: Option<u64>,
    /// Index into the imported track list
    pub track: Option<usize>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            level: kind.level(),
            message: message.into(),
            tick: None,
            track: None,
        }
    }

    pub fn at_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    pub fn on_track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }
}

/// Collector threaded through the pipeline stages.
///
/// Recording a diagnostic also emits it as a `tracing` event, so callers
/// that only watch the log see the same information as callers that
/// inspect the returned list.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    /// Track index attached to diagnostics that don't name one
    current_track: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope subsequent diagnostics to a track (None clears it).
    pub fn set_track(&mut self, track: Option<usize>) {
        self.current_track = track;
    }

    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.track.is_none() {
            diagnostic.track = self.current_track;
        }

        match diagnostic.level {
            DiagnosticLevel::Warning => tracing::warn!(
                kind = %diagnostic.kind,
                tick = ?diagnostic.tick,
                track = ?diagnostic.track,
                "{}",
                diagnostic.message
            ),
            DiagnosticLevel::Info => tracing::debug!(
                kind = %diagnostic.kind,
                tick = ?diagnostic.tick,
                track = ?diagnostic.track,
                "{}",
                diagnostic.message
            ),
        }

        self.items.push(diagnostic);
    }

    /// Record a diagnostic at a tick.
    pub fn report(&mut self, kind: DiagnosticKind, tick: u64, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, message).at_tick(tick));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
