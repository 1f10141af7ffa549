//! Frame-by-frame harmonic agreement between simultaneous voices.

use serde::{Deserialize, Serialize};

use crate::audio::pitch::PitchTrack;

/// Every voice is resampled to this rate before pitch tracking.
pub const ANALYSIS_SAMPLE_RATE: u32 = 44100;

/// Unison, octave, fifth, fourth, major third, minor third, minor sixth.
pub const IDEAL_RATIOS: [f64; 7] = [1.0, 2.0, 1.5, 1.333, 1.25, 1.2, 1.6];

/// How a pair's distance from the nearest ideal ratio becomes a score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConsonanceScoring {
    /// `1 / (1 + dist)`
    #[default]
    Ratio,
    /// `1 / (1 + dist * mean_hz / (1 + |a - b|))`: widely spaced pitches
    /// lose the bonus, close ones gain it.
    Weighted,
}

pub fn ratio_distance(a: f64, b: f64) -> f64 {
    let ratio = a.max(b) / a.min(b);
    IDEAL_RATIOS
        .iter()
        .map(|ideal| (ratio - ideal).abs())
        .fold(f64::INFINITY, f64::min)
}

/// Score one pair of positive frequencies in Hz.
pub fn pair_score(a: f64, b: f64, scoring: ConsonanceScoring) -> f64 {
    let dist = ratio_distance(a, b);
    match scoring {
        ConsonanceScoring::Ratio => 1.0 / (1.0 + dist),
        ConsonanceScoring::Weighted => {
            let avg = (a + b) / 2.0;
            let diff = (a - b).abs();
            1.0 / (1.0 + dist * avg / (1.0 + diff))
        }
    }
}

/// Mean pair score over all voiced pairs, or `None` with fewer than two
/// voiced pitches.
pub fn frame_score(pitches: &[f64], scoring: ConsonanceScoring) -> Option<f64> {
    if pitches.len() < 2 {
        return None;
    }
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for (i, &a) in pitches.iter().enumerate() {
        for &b in &pitches[i + 1..] {
            sum += pair_score(a, b, scoring);
            pairs += 1;
        }
    }
    Some(sum / pairs as f64)
}

/// Score every frame shared by all tracks.
pub fn score_frames(tracks: &[PitchTrack], scoring: ConsonanceScoring) -> Vec<Option<f64>> {
    let n = tracks.iter().map(PitchTrack::len).min().unwrap_or(0);
    let mut voiced = Vec::with_capacity(tracks.len());
    (0..n)
        .map(|t| {
            voiced.clear();
            voiced.extend(
                tracks
                    .iter()
                    .filter_map(|track| track.get(t))
                    .filter(|hz| *hz > 0.0 && hz.is_finite()),
            );
            frame_score(&voiced, scoring)
        })
        .collect()
}
