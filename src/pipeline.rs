use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::audio::analysis::{extract_features, frame_rms};
use crate::audio::decode::{decode_audio, Waveform};
use crate::audio::pitch::{track_pitch, PitchTrack, YinConfig};
use crate::audio::resample::resample_to;
use crate::audio::spectral::HOP_LEN;
use crate::consonance::{score_frames, ConsonanceScoring, ANALYSIS_SAMPLE_RATE};
use crate::error::AnalysisError;
use crate::model::heuristic::heuristic_traits;
use crate::model::{StandardizationSource, Trait, TraitPredictor};
use crate::stats::{aggregate, Aggregation, AggregationMode, Centering, EdgePolicy};
use crate::timeline::{common_length, to_frames, truncate};

/// Frame-aligned output of the trait pipeline for one waveform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitReport {
    pub pitch: Vec<f64>,
    pub volume: Vec<f64>,
    pub brightness: Vec<f64>,
    pub clarity: Vec<f64>,
    pub sharpness: Vec<f64>,
    pub smoothness: Vec<f64>,
    pub thickness: Vec<f64>,
    /// Seconds at the center of each frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Vec<f64>>,
}

impl TraitReport {
    pub fn n_frames(&self) -> usize {
        self.pitch.len()
    }

    pub fn trait_curve(&self, t: Trait) -> &[f64] {
        match t {
            Trait::Brightness => &self.brightness,
            Trait::Clarity => &self.clarity,
            Trait::Sharpness => &self.sharpness,
            Trait::Smoothness => &self.smoothness,
            Trait::Thickness => &self.thickness,
        }
    }
}

/// How trait curves are produced.
pub enum TraitSource<'a> {
    Models(&'a TraitPredictor),
    Heuristic,
}

#[derive(Clone, Debug)]
pub struct TraitSettings {
    pub mode: AggregationMode,
    pub window_secs: f64,
    pub step_secs: f64,
    pub edge: EdgePolicy,
    pub centering: Centering,
    pub yin: YinConfig,
    pub include_time: bool,
}

impl Default for TraitSettings {
    fn default() -> Self {
        Self {
            mode: AggregationMode::Strided,
            window_secs: 1.0,
            step_secs: 0.1,
            edge: EdgePolicy::Short,
            centering: Centering::Center,
            yin: YinConfig::default(),
            include_time: false,
        }
    }
}

impl TraitSettings {
    pub fn aggregation_for(&self, sample_rate: u32) -> Result<Aggregation, AnalysisError> {
        Aggregation::from_seconds(
            self.mode,
            sample_rate as f64 / HOP_LEN as f64,
            self.window_secs,
            self.step_secs,
            self.edge,
            self.centering,
        )
    }
}

pub struct TraitAnalysis {
    pub report: TraitReport,
    /// `None` in heuristic mode.
    pub standardization: Option<StandardizationSource>,
}

pub fn analyze_waveform(
    wave: &Waveform,
    source: &TraitSource<'_>,
    settings: &TraitSettings,
) -> Result<TraitAnalysis, AnalysisError> {
    let features = extract_features(wave)?;
    let n_frames = features.n_frames();

    let pitch = track_pitch(&wave.samples, wave.sample_rate, &settings.yin).to_hz_series();
    let volume = frame_rms(&wave.samples);

    let (curves, standardization): (BTreeMap<Trait, Vec<f64>>, _) = match source {
        TraitSource::Models(predictor) => {
            let aggregation = settings.aggregation_for(wave.sample_rate)?;
            let stats = aggregate(&features, aggregation)?;
            log::debug!("{}: {} windows over {} frames", aggregation, stats.len(), n_frames);
            let predictions = predictor.predict_windows(&stats)?;
            let curves = predictions
                .traits
                .into_iter()
                .map(|(t, values)| (t, to_frames(&stats, &values, n_frames)))
                .collect();
            (curves, Some(predictions.source))
        }
        TraitSource::Heuristic => (heuristic_traits(&features), None),
    };

    let len = common_length(&[n_frames, pitch.len(), volume.len()]);
    let curve = |t: Trait| {
        curves
            .get(&t)
            .map(|values| truncate(values, len))
            .unwrap_or_else(|| vec![0.0; len])
    };
    let time = settings.include_time.then(|| {
        (0..len)
            .map(|i| (i * HOP_LEN) as f64 / wave.sample_rate as f64)
            .collect()
    });

    Ok(TraitAnalysis {
        report: TraitReport {
            pitch: truncate(&pitch, len),
            volume: truncate(&volume, len),
            brightness: curve(Trait::Brightness),
            clarity: curve(Trait::Clarity),
            sharpness: curve(Trait::Sharpness),
            smoothness: curve(Trait::Smoothness),
            thickness: curve(Trait::Thickness),
            time,
        },
        standardization,
    })
}

pub fn analyze_file(
    path: &Path,
    source: &TraitSource<'_>,
    settings: &TraitSettings,
) -> Result<TraitAnalysis> {
    let wave = decode_audio(path)?;
    log::debug!("Analyzing {} ({:.2}s)", path.display(), wave.duration());
    analyze_waveform(&wave, source, settings)
        .with_context(|| format!("Failed to analyze {}", path.display()))
}

/// `song.wav` -> `song.traits.json`
pub fn sidecar_path(input: &Path) -> PathBuf {
    input.with_extension("traits.json")
}

pub fn persist_report(report: &TraitReport, input: &Path) -> Result<PathBuf> {
    let path = sidecar_path(input);
    let json = serde_json::to_string(report).context("Failed to serialize trait report")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn read_report(path: &Path) -> Result<TraitReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid trait report: {}", path.display()))
}

/// Pitch-track every voice at the common analysis rate.
pub fn voice_tracks(voices: &[Waveform], yin: &YinConfig) -> Result<Vec<PitchTrack>> {
    voices
        .par_iter()
        .map(|wave| {
            let wave = resample_to(wave, ANALYSIS_SAMPLE_RATE)?;
            Ok(track_pitch(&wave.samples, wave.sample_rate, yin))
        })
        .collect()
}

pub fn consonance_for_waveforms(
    voices: &[Waveform],
    yin: &YinConfig,
    scoring: ConsonanceScoring,
) -> Result<Vec<Option<f64>>> {
    if voices.len() < 2 {
        anyhow::bail!("consonance needs at least two voices, got {}", voices.len());
    }
    let tracks = voice_tracks(voices, yin)?;
    for (i, track) in tracks.iter().enumerate() {
        log::debug!("Voice {}: {}/{} frames voiced", i, track.voiced_count(), track.len());
    }
    Ok(score_frames(&tracks, scoring))
}

pub fn consonance_for_files(
    paths: &[PathBuf],
    yin: &YinConfig,
    scoring: ConsonanceScoring,
) -> Result<Vec<Option<f64>>> {
    let voices = paths
        .iter()
        .map(|p| decode_audio(p))
        .collect::<Result<Vec<_>>>()?;
    consonance_for_waveforms(&voices, yin, scoring)
}
