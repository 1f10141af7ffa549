mod audio;
mod cli;
mod config;
mod consonance;
mod error;
mod model;
mod pipeline;
mod stats;
mod timeline;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use cli::{Cli, Command, ConsonanceArgs, TraitsArgs};
use config::Config;
use model::loader::{find_models_dir, load_models};
use model::{StandardizationSource, Trait, TraitPredictor};
use pipeline::{TraitSettings, TraitSource};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Traits(args) => run_traits(args, &config),
        Command::Consonance(args) => run_consonance(args, &config),
        Command::Show { file } => {
            let report = pipeline::read_report(&file)?;
            log::info!("{}: {} frames", file.display(), report.n_frames());
            for t in Trait::ALL {
                let curve = report.trait_curve(t);
                if !curve.is_empty() {
                    log::debug!("{} mean {:.3}", t, curve.iter().sum::<f64>() / curve.len() as f64);
                }
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn run_traits(args: TraitsArgs, config: &Config) -> Result<()> {
    // CLI flags win over the config file
    let analysis = &config.analysis;
    let settings = TraitSettings {
        mode: args.mode.unwrap_or(analysis.mode),
        window_secs: args.window_secs.unwrap_or(analysis.window_secs),
        step_secs: args.step_secs.unwrap_or(analysis.step_secs),
        edge: args.edge.unwrap_or(analysis.edge),
        centering: args.centering.unwrap_or(analysis.centering),
        yin: analysis.yin(),
        include_time: args.time,
    };
    // Reject bad window parameters before touching any audio.
    settings.aggregation_for(consonance::ANALYSIS_SAMPLE_RATE)?;

    // Models are loaded before any input is decoded so a missing artifact
    // aborts the whole batch up front.
    let predictor = if args.heuristic {
        log::info!("Heuristic traits; no models loaded");
        None
    } else {
        let dir = args
            .models_dir
            .clone()
            .or_else(|| config.models.dir.clone())
            .unwrap_or_else(find_models_dir);
        let set = load_models(&dir).context("Cannot start without trait models")?;
        log::info!("Loaded {} trait models from {}", set.models.len(), set.dir.display());
        Some(TraitPredictor::from_set(set))
    };
    let source = match &predictor {
        Some(p) => TraitSource::Models(p),
        None => TraitSource::Heuristic,
    };

    log::info!(
        "Analyzing {} file(s): {:?} windows of {}s",
        args.inputs.len(),
        settings.mode,
        settings.window_secs
    );

    let pb = ProgressBar::new(args.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let results: Vec<_> = args
        .inputs
        .par_iter()
        .map(|path| {
            let result = pipeline::analyze_file(path, &source, &settings);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    let mut failures = 0;
    let mut warned_fallback = false;
    for (path, result) in args.inputs.iter().zip(results) {
        let analysis = match result {
            Ok(analysis) => analysis,
            Err(err) => {
                log::error!("{:#}", err);
                failures += 1;
                continue;
            }
        };
        if analysis.standardization == Some(StandardizationSource::FittedPerCall) && !warned_fallback {
            log::warn!("Trait values were standardized per file and are not comparable across files");
            warned_fallback = true;
        }

        println!("{}", serde_json::to_string(&analysis.report)?);
        if !args.no_save {
            let saved = pipeline::persist_report(&analysis.report, path)?;
            log::info!("Saved {} ({} frames)", saved.display(), analysis.report.n_frames());
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, args.inputs.len());
    }
    Ok(())
}

fn run_consonance(args: ConsonanceArgs, config: &Config) -> Result<()> {
    let scoring = args.scoring.unwrap_or(config.consonance.scoring);
    log::info!("Scoring {} voices ({:?})", args.voices.len(), scoring);

    let scores = pipeline::consonance_for_files(&args.voices, &config.analysis.yin(), scoring)?;
    let defined = scores.iter().filter(|s| s.is_some()).count();
    log::info!("{} frames, {} with two or more voices", scores.len(), defined);

    println!("{}", serde_json::to_string(&scores)?);
    Ok(())
}
