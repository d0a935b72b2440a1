//! CLI command implementations

use anyhow::{Context, Result};
use midi_import::{
    import_midi, list_tracks, DiagnosticLevel, Element, ImportConfig, ImportReport, Score,
    TrackOptions,
};
use std::path::{Path, PathBuf};

pub struct ImportArgs {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub separate_hands: Vec<usize>,
    pub skip: Vec<usize>,
    pub json: bool,
}

/// Load config, then apply per-track flags from the command line.
fn build_config(args: &ImportArgs) -> Result<ImportConfig> {
    let mut config =
        ImportConfig::load_from(args.config.as_deref()).context("Failed to load config")?;

    for &track in &args.separate_hands {
        let mut options = config.options_for_track(track);
        options.do_lh_rh_separation = true;
        config.set_track_options(track, options);
    }
    for &track in &args.skip {
        let options = TrackOptions {
            do_import: false,
            ..config.options_for_track(track)
        };
        config.set_track_options(track, options);
    }

    Ok(config)
}

/// Import a file and print a summary (or JSON)
pub fn import(args: ImportArgs) -> Result<()> {
    let config = build_config(&args)?;

    let mut score = Score::new();
    let report = import_midi(&args.file, &config, &mut score)
        .with_context(|| format!("Failed to import {}", args.file.display()))?;

    if args.json {
        let output = serde_json::json!({
            "report": report,
            "score": score,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_summary(&args.file, &score, &report);
    Ok(())
}

fn print_summary(file: &Path, score: &Score, report: &ImportReport) {
    println!(
        "{}: {} tracks, {} staves, {} measures",
        file.display(),
        report.tracks,
        report.staves,
        report.measures
    );
    println!(
        "  {} chords, {} rests, {} ties",
        report.chords, report.rests, report.ties
    );

    for (i, part) in score.parts.iter().enumerate() {
        let name = part.name.as_deref().unwrap_or("(unnamed)");
        let kind = if part.is_drum {
            "drums".to_string()
        } else {
            format!("program {}", part.program)
        };
        println!("  part {i}: {name} [{kind}]{}", if part.braced { " braced" } else { "" });

        for &staff_id in &part.staves {
            let staff = &score.staves[staff_id];
            let chords = staff.chords().count();
            let rests = staff.rests().count();
            let tied = staff
                .notes
                .iter()
                .filter(|n| n.tie_forward.is_some())
                .count();
            let voices = staff
                .elements
                .iter()
                .filter(|e| matches!(e, Element::Chord { .. }))
                .map(Element::voice)
                .max()
                .map_or(0, |v| v + 1);
            println!(
                "    staff {staff_id} ({:?}): {chords} chords, {rests} rests, {tied} ties, {voices} voices",
                staff.clef
            );
        }
    }

    if report.diagnostics.is_empty() {
        return;
    }

    let warnings = report
        .diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warning)
        .count();
    println!(
        "{} diagnostics ({} warnings):",
        report.diagnostics.len(),
        warnings
    );
    for d in &report.diagnostics {
        let track = d.track.map(|t| format!(" track {t}")).unwrap_or_default();
        let tick = d.tick.map(|t| format!(" @{t}")).unwrap_or_default();
        println!("  [{}]{track}{tick} {}", d.kind.as_str(), d.message);
    }
}

/// List note-bearing tracks with the index used by `--separate-hands` and `--skip`
pub fn tracks(file: &Path) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let summaries = list_tracks(&bytes).context("Failed to parse MIDI file")?;

    if summaries.is_empty() {
        println!("No note-bearing tracks");
        return Ok(());
    }

    for t in summaries {
        let name = t.name.as_deref().unwrap_or("(unnamed)");
        let program = if t.is_drum {
            "drums".to_string()
        } else {
            format!("program {}", t.program)
        };
        println!(
            "{:>3}  ch {:>2}  {:<12} {:>5} notes  {}-{}  {}",
            t.index,
            t.channel + 1,
            program,
            t.note_count,
            t.pitch_min,
            t.pitch_max,
            name
        );
    }

    Ok(())
}
