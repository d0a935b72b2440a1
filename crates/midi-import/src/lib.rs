//! MIDI to notation import.
//!
//! Turns a Standard MIDI File into measures of chords, rests and tied
//! notes with key and time signatures, ready for engraving.
//!
//! Stages, in order:
//! 1. ingestion: resolution normalization, channel separation, note pairing
//! 2. hand separation for tracks that ask for it
//! 3. chord building
//! 4. per-measure quantization with overlap cleanup
//! 5. duration reconstruction (ties at barlines, rest filling)
//! 6. score assembly through a [`ScoreSink`]
//!
//! # Example
//!
//! ```no_run
//! use midi_import::{import_midi, ImportConfig, Score};
//!
//! let config = ImportConfig::default();
//! let mut score = Score::new();
//! let report = import_midi("song.mid", &config, &mut score)?;
//!
//! println!("{} measures, {} diagnostics", report.measures, report.diagnostics.len());
//! # Ok::<(), midi_import::Error>(())
//! ```

pub mod chords;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod drumset;
pub mod duration;
pub mod event;
pub mod hands;
pub mod ingest;
pub mod meta;
pub mod note;
pub mod quantize;
pub mod reconstruct;
pub mod score;
pub mod timesig;

pub use config::{ConfigError, ConfigSources, ImportConfig, TrackOptions};
pub use convert::ImportReport;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLevel, Diagnostics};
pub use drumset::{DrumEntry, DrumMap, StemDirection};
pub use duration::{to_duration_list, DurationType, NotatedDuration};
pub use ingest::{list_tracks, TrackSummary};
pub use meta::TextKind;
pub use note::{Chord, ChordMap, Note, Track};
pub use score::{
    Clef, Element, MeasureIndex, Measures, NoteId, PartPlan, Score, ScoreNote, ScoreSink, StaffId,
};
pub use timesig::{MeasureSpan, TimeSig, TimeSigMap};

use std::path::{Path, PathBuf};

/// Fatal import errors. Anything past a successful parse is reported as a
/// [`Diagnostic`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no file name given")]
    FileNotFound,

    #[error("cannot open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("not a valid MIDI file: {0}")]
    BadFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Import a MIDI file into `sink`.
///
/// On error the sink is left untouched.
pub fn import_midi(
    path: impl AsRef<Path>,
    config: &ImportConfig,
    sink: &mut dyn ScoreSink,
) -> Result<ImportReport> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::FileNotFound);
    }

    let bytes = std::fs::read(path).map_err(|e| Error::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "importing MIDI file");
    import_bytes(&bytes, config, sink)
}

/// Import MIDI bytes into `sink`.
pub fn import_bytes(
    bytes: &[u8],
    config: &ImportConfig,
    sink: &mut dyn ScoreSink,
) -> Result<ImportReport> {
    let smf = ingest::parse(bytes)?;

    let mut diags = Diagnostics::new();
    let ingested = ingest::ingest(&smf, config, &mut diags);
    let mut report = convert::convert(&ingested, config, sink, &mut diags);

    report.diagnostics = diags.into_vec();
    tracing::info!(
        tracks = report.tracks,
        measures = report.measures,
        diagnostics = report.diagnostics.len(),
        "import finished"
    );
    Ok(report)
}
