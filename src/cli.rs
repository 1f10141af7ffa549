use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::consonance::ConsonanceScoring;
use crate::stats::{AggregationMode, Centering, EdgePolicy};

#[derive(Parser, Debug)]
#[command(name = "sonority", about = "Perceptual trait curves and consonance scores from audio")]
pub struct Cli {
    /// Config file (defaults to sonority.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Trait, pitch and volume curves for each input file
    Traits(TraitsArgs),
    /// Per-frame consonance across two or more voices
    Consonance(ConsonanceArgs),
    /// Print a saved .traits.json result
    Show {
        /// Result file written by `traits`
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct TraitsArgs {
    /// Input audio files (WAV, MP3, FLAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Window length in seconds
    #[arg(long)]
    pub window_secs: Option<f64>,

    /// Step between strided windows in seconds
    #[arg(long)]
    pub step_secs: Option<f64>,

    /// Strided windows or one window per frame
    #[arg(long, value_enum)]
    pub mode: Option<AggregationMode>,

    /// Handling of the last strided window
    #[arg(long, value_enum)]
    pub edge: Option<EdgePolicy>,

    /// Window placement in dense mode
    #[arg(long, value_enum)]
    pub centering: Option<Centering>,

    /// Directory holding rf_model_<trait>.json and scaler.json
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Derive traits directly from the features instead of models
    #[arg(long)]
    pub heuristic: bool,

    /// Include per-frame timestamps in the output
    #[arg(long)]
    pub time: bool,

    /// Do not write <input>.traits.json next to each input
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Args, Debug)]
pub struct ConsonanceArgs {
    /// One audio file per voice
    #[arg(required = true, num_args = 2..)]
    pub voices: Vec<PathBuf>,

    /// Pair scoring rule
    #[arg(long, value_enum)]
    pub scoring: Option<ConsonanceScoring>,
}
