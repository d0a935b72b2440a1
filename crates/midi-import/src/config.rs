//! Import configuration: defaults, TOML discovery, environment overlay.
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/midi-import/config.toml` (user)
//! 2. `./midi-import.toml` (local override, replaced by an explicit path)
//! 3. Environment variables (`MIDI_IMPORT_*`)
//!
//! ```toml
//! division = 480
//! chord_jitter = 3
//! hand_split_interval = 12
//! use_dots = false
//!
//! [default_track]
//! do_import = true
//! do_lh_rh_separation = false
//!
//! [[tracks]]
//! do_lh_rh_separation = true
//!
//! [[drums]]
//! pitch = 36
//! voice = 1
//! stem = "down"
//! ```

use crate::drumset::DrumEntry;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Per-track switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackOptions {
    /// Import this track at all
    pub do_import: bool,
    /// Split into left/right hand tracks before chord building
    pub do_lh_rh_separation: bool,
}

impl Default for TrackOptions {
    fn default() -> Self {
        TrackOptions {
            do_import: true,
            do_lh_rh_separation: false,
        }
    }
}

/// Complete import configuration.
///
/// The numeric defaults are tuned heuristics; changing them changes how
/// existing files import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Internal ticks per quarter note
    pub division: u32,
    /// Onset/offset tolerance when merging notes into chords
    pub chord_jitter: u32,
    /// Pitch span above which a cluster splits by register (semitones)
    pub hand_split_interval: u8,
    /// Allow dotted values when decomposing durations
    pub use_dots: bool,
    /// Options for tracks not listed in `tracks`
    pub default_track: TrackOptions,
    /// Options by note-bearing track index, in file order
    pub tracks: Vec<TrackOptions>,
    /// Custom drum map; `None` uses General MIDI
    pub drums: Option<Vec<DrumEntry>>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            division: default_division(),
            chord_jitter: 3,
            hand_split_interval: 12,
            use_dots: false,
            default_track: TrackOptions::default(),
            tracks: Vec::new(),
            drums: None,
        }
    }
}

fn default_division() -> u32 {
    480
}

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

impl ImportConfig {
    /// Load from the standard locations plus environment.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with an explicit file replacing `./midi-import.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in discover_config_files_with_override(config_path) {
            let table = read_table(&path)?;
            merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = from_table(merged, sources.files.last().map(PathBuf::as_path))?;
        apply_env_overrides(&mut config, &mut sources);

        tracing::debug!(
            files = ?sources.files,
            env = ?sources.env_overrides,
            "loaded import config"
        );

        Ok((config, sources))
    }

    /// Options for the note-bearing track at `index`.
    pub fn options_for_track(&self, index: usize) -> TrackOptions {
        self.tracks.get(index).copied().unwrap_or(self.default_track)
    }

    /// Set options for one track, padding earlier tracks with defaults.
    pub fn set_track_options(&mut self, index: usize, options: TrackOptions) {
        if self.tracks.len() <= index {
            self.tracks.resize(index + 1, self.default_track);
        }
        self.tracks[index] = options;
    }
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("midi-import/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("midi-import.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load a single config file, without discovery or environment.
pub fn load_from_file(path: &Path) -> Result<ImportConfig, ConfigError> {
    let table = read_table(path)?;
    from_table(table, Some(path))
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn from_table(table: toml::Table, path: Option<&Path>) -> Result<ImportConfig, ConfigError> {
    ImportConfig::deserialize(toml::Value::Table(table)).map_err(|e| ConfigError::Parse {
        path: path.map(Path::to_path_buf).unwrap_or_default(),
        message: e.to_string(),
    })
}

/// Overlay `top` onto `base`; nested tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, top: toml::Table) {
    for (key, value) in top {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(t)) => merge_tables(b, t),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `MIDI_IMPORT_*` environment variables.
pub fn apply_env_overrides(config: &mut ImportConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("MIDI_IMPORT_DIVISION") {
        if let Ok(division) = v.parse::<u32>() {
            if division > 0 {
                config.division = division;
                sources.env_overrides.push("MIDI_IMPORT_DIVISION".to_string());
            }
        }
    }

    if let Ok(v) = env::var("MIDI_IMPORT_CHORD_JITTER") {
        if let Ok(jitter) = v.parse() {
            config.chord_jitter = jitter;
            sources.env_overrides.push("MIDI_IMPORT_CHORD_JITTER".to_string());
        }
    }

    if let Ok(v) = env::var("MIDI_IMPORT_HAND_SPLIT_INTERVAL") {
        if let Ok(interval) = v.parse() {
            config.hand_split_interval = interval;
            sources
                .env_overrides
                .push("MIDI_IMPORT_HAND_SPLIT_INTERVAL".to_string());
        }
    }

    if let Ok(v) = env::var("MIDI_IMPORT_USE_DOTS") {
        let parsed = match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        };
        if let Some(use_dots) = parsed {
            config.use_dots = use_dots;
            sources.env_overrides.push("MIDI_IMPORT_USE_DOTS".to_string());
        }
    }
}
