use crate::error::AnalysisError;

use super::decode::Waveform;
use super::features::{column, FrameFeatureMatrix, FEATURE_WIDTH, N_MFCC};
use super::spectral::{
    apply_filterbank, center_pad, chroma_filterbank, dct_ortho, frame_starts, mel_filterbank,
    power_to_db, stft_magnitude, Spectrogram, FRAME_LEN, HOP_LEN,
};

const N_MELS: usize = 128;
const TOP_DB: f64 = 80.0;
const ROLLOFF_PERCENT: f64 = 0.85;
const HF_CUTOFF_HZ: f64 = 4000.0;
const DELTA_WIDTH: usize = 4;
const ZERO_THRESHOLD: f64 = 1e-10;

/// One independently computed sub-feature, stored column-major.
struct SubFeature {
    name: &'static str,
    columns: Vec<Vec<f64>>,
}

impl SubFeature {
    fn scalar(name: &'static str, values: Vec<f64>) -> Self {
        Self {
            name,
            columns: vec![values],
        }
    }

    fn from_rows(name: &'static str, rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let columns = (0..width)
            .map(|c| rows.iter().map(|row| row[c]).collect())
            .collect();
        Self { name, columns }
    }

    fn n_frames(&self) -> usize {
        self.columns.iter().map(Vec::len).min().unwrap_or(0)
    }
}

/// Base sub-feature columns cut to a common length.
struct Trimmed {
    columns: Vec<Vec<f64>>,
    n_frames: usize,
    sub_feature_frames: Vec<(&'static str, usize)>,
}

/// Cut every sub-feature to the shortest one and lay their columns side by side.
fn trim_and_stack(base: impl IntoIterator<Item = SubFeature>) -> Trimmed {
    let base: Vec<SubFeature> = base.into_iter().collect();
    let n_frames = base.iter().map(SubFeature::n_frames).min().unwrap_or(0);
    let sub_feature_frames: Vec<(&'static str, usize)> =
        base.iter().map(|f| (f.name, f.n_frames())).collect();
    if sub_feature_frames.iter().any(|&(_, n)| n != n_frames) {
        log::debug!("Trimming sub-features to {} frames: {:?}", n_frames, sub_feature_frames);
    }

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_WIDTH);
    for feature in base {
        for mut col in feature.columns {
            col.truncate(n_frames);
            columns.push(col);
        }
    }
    Trimmed {
        columns,
        n_frames,
        sub_feature_frames,
    }
}

/// Extract the full framewise feature matrix at the fixed hop length.
pub fn extract_features(wave: &Waveform) -> Result<FrameFeatureMatrix, AnalysisError> {
    if wave.samples.is_empty() {
        return Err(AnalysisError::InvalidInput("empty waveform".into()));
    }
    if wave.sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("sample rate is zero".into()));
    }

    let sr = wave.sample_rate;
    log::debug!("Extracting framewise features: {} samples at {} Hz", wave.samples.len(), sr);

    let spec = stft_magnitude(&wave.samples, sr, FRAME_LEN, HOP_LEN);
    let power = spec.power();
    let mel_bank = mel_filterbank(sr, FRAME_LEN, N_MELS);
    let mel_power: Vec<Vec<f64>> = power.iter().map(|p| apply_filterbank(p, &mel_bank)).collect();
    let log_mel = power_to_db(&mel_power, TOP_DB);

    let mfcc: Vec<Vec<f64>> = log_mel.iter().map(|frame| dct_ortho(frame, N_MFCC)).collect();
    let delta_mfcc = regression_delta(&mfcc, DELTA_WIDTH);

    let chroma_bank = chroma_filterbank(sr, FRAME_LEN);
    let chroma: Vec<Vec<f64>> = power
        .iter()
        .map(|p| max_normalize(apply_filterbank(p, &chroma_bank)))
        .collect();

    let freqs = spec.bin_frequencies();
    let centroid: Vec<f64> = spec.frames.iter().map(|m| spectral_centroid(m, &freqs)).collect();
    let bandwidth: Vec<f64> = spec
        .frames
        .iter()
        .zip(&centroid)
        .map(|(m, &c)| spectral_bandwidth(m, &freqs, c))
        .collect();

    let base = [
        SubFeature::from_rows("mfcc", &mfcc),
        SubFeature::from_rows("delta_mfcc", &delta_mfcc),
        SubFeature::scalar("zcr", frame_zcr(&wave.samples)),
        SubFeature::scalar("rms", frame_rms(&wave.samples)),
        SubFeature::scalar("centroid", centroid),
        SubFeature::scalar("bandwidth", bandwidth),
        SubFeature::scalar(
            "rolloff",
            spec.frames.iter().map(|m| spectral_rolloff(m, &freqs)).collect(),
        ),
        SubFeature::scalar("flatness", power.iter().map(|p| spectral_flatness(p)).collect()),
        SubFeature::from_rows("chroma", &chroma),
        SubFeature::scalar("onset_strength", onset_strength(&log_mel)),
    ];

    let trimmed = trim_and_stack(base);
    let n_frames = trimmed.n_frames;
    let mut columns = trimmed.columns;

    // Derived dynamics come from the trimmed base columns.
    let rms = &columns[column::RMS];
    let bw = &columns[column::BANDWIDTH];
    let delta_rms = gradient(rms);
    let delta_bandwidth = gradient(bw);
    let delta2_rms = gradient(&delta_rms);
    let delta2_bandwidth = gradient(&delta_bandwidth);
    let mut flux = spectral_flux(&spec);
    flux.truncate(n_frames);
    let delta2_flux = gradient(&flux);
    let mut hf = high_frequency_energy(&spec, HF_CUTOFF_HZ);
    hf.truncate(n_frames);

    columns.extend([
        delta_rms,
        delta_bandwidth,
        delta2_rms,
        delta2_bandwidth,
        flux,
        delta2_flux,
        hf,
    ]);
    debug_assert_eq!(columns.len(), FEATURE_WIDTH);

    let mut matrix = FrameFeatureMatrix::from_columns(&columns);
    matrix.sub_feature_frames = trimmed.sub_feature_frames;
    log::debug!("Feature matrix: {} frames x {} features", matrix.n_frames(), matrix.width());
    Ok(matrix)
}

/// Framewise RMS energy, same centered framing as the spectral features.
pub fn frame_rms(samples: &[f32]) -> Vec<f64> {
    let padded = center_pad(samples, FRAME_LEN);
    frame_starts(padded.len(), FRAME_LEN, HOP_LEN)
        .into_iter()
        .map(|start| {
            let frame = &padded[start..start + FRAME_LEN];
            (frame.iter().map(|s| s * s).sum::<f64>() / FRAME_LEN as f64).sqrt()
        })
        .collect()
}

/// Fraction of sign changes per frame; near-zero samples count as positive.
pub fn frame_zcr(samples: &[f32]) -> Vec<f64> {
    let padded = center_pad(samples, FRAME_LEN);
    let positive = |x: f64| x.abs() <= ZERO_THRESHOLD || x > 0.0;
    frame_starts(padded.len(), FRAME_LEN, HOP_LEN)
        .into_iter()
        .map(|start| {
            let frame = &padded[start..start + FRAME_LEN];
            let crossings = frame
                .windows(2)
                .filter(|w| positive(w[0]) != positive(w[1]))
                .count();
            crossings as f64 / FRAME_LEN as f64
        })
        .collect()
}

fn spectral_centroid(mags: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = mags.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    mags.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

fn spectral_bandwidth(mags: &[f64], freqs: &[f64], centroid: f64) -> f64 {
    let total: f64 = mags.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    mags.iter()
        .zip(freqs)
        .map(|(m, f)| (m / total) * (f - centroid).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn spectral_rolloff(mags: &[f64], freqs: &[f64]) -> f64 {
    let threshold = ROLLOFF_PERCENT * mags.iter().sum::<f64>();
    let mut cumulative = 0.0;
    for (m, &f) in mags.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= threshold {
            return f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

fn spectral_flatness(power: &[f64]) -> f64 {
    if power.is_empty() {
        return 0.0;
    }
    let n = power.len() as f64;
    let clamped = power.iter().map(|&p| p.max(1e-10));
    let log_mean = clamped.clone().map(f64::ln).sum::<f64>() / n;
    let mean = clamped.sum::<f64>() / n;
    log_mean.exp() / mean
}

/// L2 norm of the frame-to-frame magnitude change, 0 for the first frame.
fn spectral_flux(spec: &Spectrogram) -> Vec<f64> {
    let mut flux = Vec::with_capacity(spec.frames.len());
    if spec.frames.is_empty() {
        return flux;
    }
    flux.push(0.0);
    for pair in spec.frames.windows(2) {
        let sq: f64 = pair[1].iter().zip(&pair[0]).map(|(c, p)| (c - p).powi(2)).sum();
        flux.push(sq.sqrt());
    }
    flux
}

fn high_frequency_energy(spec: &Spectrogram, cutoff_hz: f64) -> Vec<f64> {
    let first = spec
        .bin_frequencies()
        .iter()
        .position(|&f| f >= cutoff_hz)
        .unwrap_or(spec.n_bins());
    spec.frames.iter().map(|m| m[first..].iter().sum()).collect()
}

/// Mean positive log-mel rise between consecutive frames, 0 for the first frame.
fn onset_strength(log_mel: &[Vec<f64>]) -> Vec<f64> {
    let mut onset = Vec::with_capacity(log_mel.len());
    if log_mel.is_empty() {
        return onset;
    }
    onset.push(0.0);
    for pair in log_mel.windows(2) {
        let bands = pair[1].len().max(1) as f64;
        let rise: f64 = pair[1].iter().zip(&pair[0]).map(|(c, p)| (c - p).max(0.0)).sum();
        onset.push(rise / bands);
    }
    onset
}

fn max_normalize(mut values: Vec<f64>) -> Vec<f64> {
    let peak = values.iter().copied().fold(0.0f64, f64::max);
    if peak > 0.0 {
        values.iter_mut().for_each(|v| *v /= peak);
    }
    values
}

/// Regression delta over ±`width` frames with edge replication.
pub fn regression_delta(frames: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    let n = frames.len();
    if n == 0 {
        return Vec::new();
    }
    let dims = frames[0].len();
    let denom: f64 = 2.0 * (1..=width).map(|k| (k * k) as f64).sum::<f64>();
    (0..n)
        .map(|t| {
            (0..dims)
                .map(|d| {
                    let mut acc = 0.0;
                    for k in 1..=width {
                        let ahead = frames[(t + k).min(n - 1)][d];
                        let behind = frames[t.saturating_sub(k)][d];
                        acc += k as f64 * (ahead - behind);
                    }
                    if denom > 0.0 {
                        acc / denom
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Central differences inside, one-sided at the ends.
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    values[1] - values[0]
                } else if i == n - 1 {
                    values[n - 1] - values[n - 2]
                } else {
                    (values[i + 1] - values[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}
