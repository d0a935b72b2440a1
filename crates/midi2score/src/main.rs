//! midi2score - import Standard MIDI Files as notation
//!
//! Subcommands:
//! - `midi2score import <file>` - Quantize and notate, print a summary
//! - `midi2score tracks <file>` - List note-bearing tracks

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "midi2score")]
#[command(about = "Import MIDI files as quantized notation")]
#[command(version)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a MIDI file and summarize the result
    Import {
        /// MIDI file to import
        file: PathBuf,

        /// Config file (replaces ./midi-import.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Split this track into left and right hand (repeatable)
        #[arg(long = "separate-hands", value_name = "TRACK")]
        separate_hands: Vec<usize>,

        /// Do not import this track (repeatable)
        #[arg(long, value_name = "TRACK")]
        skip: Vec<usize>,

        /// Print the whole score and report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the note-bearing tracks of a MIDI file
    Tracks {
        /// MIDI file to inspect
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Import {
            file,
            config,
            separate_hands,
            skip,
            json,
        } => {
            commands::import(commands::ImportArgs {
                file,
                config,
                separate_hands,
                skip,
                json,
            })?;
        }
        Commands::Tracks { file } => {
            commands::tracks(&file)?;
        }
    }

    Ok(())
}
