use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::spectral::{center_pad, frame_starts, FRAME_LEN, HOP_LEN};

/// C2, the lowest fundamental the tracker searches for.
pub const FMIN_HZ: f64 = 65.406_391_325_149_66;
/// C7, the highest.
pub const FMAX_HZ: f64 = 2093.004_522_404_789;

/// YIN pitch tracker parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YinConfig {
    pub fmin: f64,
    pub fmax: f64,
    /// Absolute threshold on the cumulative-mean-normalized difference.
    pub threshold: f64,
    /// Frames quieter than this RMS are unvoiced.
    pub silence_rms: f64,
}

impl Default for YinConfig {
    fn default() -> Self {
        Self {
            fmin: FMIN_HZ,
            fmax: FMAX_HZ,
            threshold: 0.1,
            silence_rms: 1e-3,
        }
    }
}

/// Fundamental frequency per frame; `None` where the frame is unvoiced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PitchTrack {
    pub frames: Vec<Option<f64>>,
}

impl PitchTrack {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, t: usize) -> Option<f64> {
        self.frames.get(t).copied().flatten()
    }

    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    /// Hz per frame with unvoiced frames reported as 0.0.
    pub fn to_hz_series(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.unwrap_or(0.0)).collect()
    }
}

/// Track pitch with the same centered framing as the feature extractor.
///
/// The frame grows past [`FRAME_LEN`] when the sample rate is high enough that
/// the longest period `fmin` allows would not fit. Hop and centering stay the
/// same, so frame `t` is still centered on sample `t * HOP_LEN`.
pub fn track_pitch(samples: &[f32], sample_rate: u32, config: &YinConfig) -> PitchTrack {
    if sample_rate == 0 {
        return PitchTrack::default();
    }
    let frame_len = yin_frame_len(sample_rate as f64, config.fmin);
    if frame_len > FRAME_LEN {
        log::debug!("YIN frame widened to {} samples at {} Hz", frame_len, sample_rate);
    }
    let padded = center_pad(samples, frame_len);
    let starts = frame_starts(padded.len(), frame_len, HOP_LEN);
    let frames = starts
        .par_iter()
        .map(|&start| yin_frame(&padded[start..start + frame_len], sample_rate as f64, config))
        .collect();
    PitchTrack { frames }
}

/// Smallest even frame whose second half holds every lag up to `sr / fmin`.
fn yin_frame_len(sr: f64, fmin: f64) -> usize {
    let longest = (sr / fmin).ceil();
    if !longest.is_finite() || longest <= 0.0 {
        return FRAME_LEN;
    }
    FRAME_LEN.max(2 * (longest as usize + 1))
}

fn yin_frame(frame: &[f64], sr: f64, config: &YinConfig) -> Option<f64> {
    let rms = (frame.iter().map(|s| s * s).sum::<f64>() / frame.len() as f64).sqrt();
    if rms < config.silence_rms {
        return None;
    }

    let integration = frame.len() / 2;
    let min_tau = ((sr / config.fmax).floor() as usize).max(2);
    let wanted_tau = (sr / config.fmin).ceil() as usize;
    let max_tau = wanted_tau.min(frame.len() - integration - 1);
    if max_tau < wanted_tau {
        log::warn!("YIN lag range clipped to {} of {} samples", max_tau, wanted_tau);
    }
    if min_tau >= max_tau {
        return None;
    }

    let diff: Vec<f64> = (0..=max_tau)
        .map(|tau| {
            frame[..integration]
                .iter()
                .zip(&frame[tau..tau + integration])
                .map(|(a, b)| (a - b) * (a - b))
                .sum()
        })
        .collect();

    let mut cmnd = vec![1.0f64; max_tau + 1];
    let mut running = 0.0;
    for tau in 1..=max_tau {
        running += diff[tau];
        cmnd[tau] = if running > 0.0 {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }

    let mut tau = min_tau;
    while tau <= max_tau {
        if cmnd[tau] < config.threshold {
            while tau + 1 <= max_tau && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            // Still falling at the last lag: the real trough lies below fmin.
            if tau == max_tau {
                return None;
            }
            let refined = parabolic_peak(&cmnd, tau);
            return Some(sr / refined);
        }
        tau += 1;
    }
    None
}

fn parabolic_peak(values: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return i as f64;
    }
    let (a, b, c) = (values[i - 1], values[i], values[i + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        return i as f64;
    }
    i as f64 + 0.5 * (a - c) / denom
}
