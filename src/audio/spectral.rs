//! Short-time spectral building blocks shared by every spectral sub-feature.
//!
//! All framing goes through [`center_pad`] + [`frame_starts`] so that every
//! sub-feature uses the same frame-edge convention: frame `t` is centered on
//! sample `t * hop`, with zeros outside the signal.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

pub const FRAME_LEN: usize = 2048;
pub const HOP_LEN: usize = 512;

/// Magnitude spectrogram, one row of `n_fft / 2 + 1` bins per frame.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f64>>,
    pub sample_rate: u32,
    pub n_fft: usize,
}

impl Spectrogram {
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn bin_frequencies(&self) -> Vec<f64> {
        fft_frequencies(self.sample_rate, self.n_fft)
    }

    /// Squared magnitudes, frame by frame.
    pub fn power(&self) -> Vec<Vec<f64>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|m| m * m).collect())
            .collect()
    }
}

pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Zero-pad `frame_len / 2` samples on both sides.
pub fn center_pad(samples: &[f32], frame_len: usize) -> Vec<f64> {
    let pad = frame_len / 2;
    let mut padded = vec![0.0f64; samples.len() + 2 * pad];
    for (dst, &s) in padded[pad..].iter_mut().zip(samples) {
        *dst = s as f64;
    }
    padded
}

/// Start offsets of every full frame in an already padded signal.
pub fn frame_starts(padded_len: usize, frame_len: usize, hop: usize) -> Vec<usize> {
    if padded_len < frame_len || hop == 0 {
        return Vec::new();
    }
    (0..=(padded_len - frame_len) / hop).map(|i| i * hop).collect()
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos()))
        .collect()
}

pub fn stft_magnitude(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Spectrogram {
    let padded = center_pad(samples, n_fft);
    let starts = frame_starts(padded.len(), n_fft, hop);
    let window = hann_window(n_fft);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let n_bins = n_fft / 2 + 1;

    let frames: Vec<Vec<f64>> = starts
        .par_iter()
        .map(|&start| {
            let mut buffer: Vec<Complex<f64>> = padded[start..start + n_fft]
                .iter()
                .zip(&window)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer[..n_bins].iter().map(|c| c.norm()).collect()
        })
        .collect();

    Spectrogram {
        frames,
        sample_rate,
        n_fft,
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    // Slaney scale: linear below 1 kHz, logarithmic above.
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f64.ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f64.ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_sp * mel
    }
}

/// Slaney-normalised triangular mel filterbank, `n_mels` rows of `n_fft / 2 + 1` weights.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let mel_hz: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, center, hi) = (mel_hz[m], mel_hz[m + 1], mel_hz[m + 2]);
            let enorm = 2.0 / (hi - lo);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - lo) / (center - lo);
                    let upper = (hi - f) / (hi - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Chroma filterbank mapping `n_fft / 2 + 1` bins onto 12 pitch classes, C first.
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize) -> Vec<Vec<f64>> {
    const N_CHROMA: usize = 12;
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;

    let n_chroma = N_CHROMA as f64;
    let n_bins = n_fft / 2 + 1;
    let a0 = 440.0 / 16.0;

    let mut frqbins: Vec<f64> = Vec::with_capacity(n_bins);
    frqbins.push(0.0);
    for k in 1..n_bins {
        let f = k as f64 * sample_rate as f64 / n_fft as f64;
        frqbins.push(n_chroma * (f / a0).log2());
    }
    // No sensible octave for DC: place it 1.5 octaves below bin 1.
    frqbins[0] = frqbins.get(1).copied().unwrap_or(0.0) - 1.5 * n_chroma;

    let widths: Vec<f64> = (0..n_bins)
        .map(|i| {
            if i + 1 < n_bins {
                (frqbins[i + 1] - frqbins[i]).max(1.0)
            } else {
                1.0
            }
        })
        .collect();

    let half = (n_chroma / 2.0).round();
    let mut wts = vec![vec![0.0f64; n_bins]; N_CHROMA];
    for (c, row) in wts.iter_mut().enumerate() {
        for (k, w) in row.iter_mut().enumerate() {
            let d = (frqbins[k] - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            *w = (-0.5 * (2.0 * d / widths[k]).powi(2)).exp();
        }
    }

    for k in 0..n_bins {
        let norm = wts.iter().map(|row| row[k] * row[k]).sum::<f64>().sqrt();
        let octave = frqbins[k] / n_chroma;
        let weight = (-0.5 * ((octave - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in wts.iter_mut() {
            let normed = if norm > 0.0 { row[k] / norm } else { 0.0 };
            row[k] = normed * weight;
        }
    }

    // Rows were built starting at A; rotate so row 0 is C.
    wts.rotate_left(3);
    wts
}

/// Apply a filterbank to one spectrum frame.
pub fn apply_filterbank(spectrum: &[f64], bank: &[Vec<f64>]) -> Vec<f64> {
    bank.iter()
        .map(|row| row.iter().zip(spectrum).map(|(w, s)| w * s).sum())
        .collect()
}

/// Power to decibels with an absolute floor of 1e-10 and a dynamic range
/// clamp of `top_db` below the global peak.
pub fn power_to_db(power: &[Vec<f64>], top_db: f64) -> Vec<Vec<f64>> {
    let mut db: Vec<Vec<f64>> = power
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(1e-10).log10()).collect())
        .collect();
    let peak = db
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() {
        let floor = peak - top_db;
        for v in db.iter_mut().flat_map(|frame| frame.iter_mut()) {
            *v = v.max(floor);
        }
    }
    db
}

/// Orthonormal DCT-II, truncated to the first `n_out` coefficients.
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_out];
    }
    let nf = n as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * nf)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / nf).sqrt() } else { (2.0 / nf).sqrt() };
            sum * scale
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, secs: f32) -> Vec<f32> {
        let n = (sr as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn centered_framing_yields_one_plus_n_over_hop() {
        for n in [0usize, 1, 511, 512, 513, 10_000] {
            let padded = center_pad(&vec![0.0; n], FRAME_LEN);
            assert_eq!(frame_starts(padded.len(), FRAME_LEN, HOP_LEN).len(), 1 + n / HOP_LEN);
        }
    }

    #[test]
    fn stft_peaks_at_tone_frequency() {
        let spec = stft_magnitude(&sine(1000.0, 22050, 0.5), 22050, FRAME_LEN, HOP_LEN);
        let mid = &spec.frames[spec.frames.len() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        let freq = spec.bin_frequencies()[peak];
        assert!((freq - 1000.0).abs() < 22050.0 / FRAME_LEN as f64);
    }

    #[test]
    fn mel_scale_roundtrips() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn mel_filters_are_nonnegative_and_nonempty() {
        let bank = mel_filterbank(22050, FRAME_LEN, 128);
        assert_eq!(bank.len(), 128);
        for row in &bank {
            assert_eq!(row.len(), FRAME_LEN / 2 + 1);
            assert!(row.iter().all(|&w| w >= 0.0));
        }
        assert!(bank[64].iter().any(|&w| w > 0.0));
    }

    #[test]
    fn chroma_maps_a440_to_pitch_class_a() {
        let sr = 22050;
        let bank = chroma_filterbank(sr, FRAME_LEN);
        let spec = stft_magnitude(&sine(440.0, sr, 0.5), sr, FRAME_LEN, HOP_LEN);
        let power = spec.power();
        let chroma = apply_filterbank(&power[power.len() / 2], &bank);
        let best = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(c, _)| c)
            .unwrap();
        assert_eq!(best, 9);
    }

    #[test]
    fn dct_of_constant_has_only_dc() {
        let out = dct_ortho(&[2.0; 8], 4);
        assert!((out[0] - 2.0 * 8f64.sqrt()).abs() < 1e-9);
        assert!(out[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn db_is_clamped_below_peak() {
        let db = power_to_db(&[vec![1.0, 1e-12]], 80.0);
        assert!((db[0][0] - 0.0).abs() < 1e-12);
        assert!((db[0][1] + 80.0).abs() < 1e-12);
    }
}
