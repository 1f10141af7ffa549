//! Frame-rate trait curves computed straight from the feature matrix, for
//! use without trained models.

use std::collections::BTreeMap;

use super::Trait;
use crate::audio::features::{column, FrameFeatureMatrix};

pub fn heuristic_traits(features: &FrameFeatureMatrix) -> BTreeMap<Trait, Vec<f64>> {
    let rms = features.column(column::RMS);
    let zcr = features.column(column::ZCR);
    let centroid = features.column(column::CENTROID);
    let bandwidth = features.column(column::BANDWIDTH);
    let rolloff = features.column(column::ROLLOFF);
    let flatness = features.column(column::FLATNESS);
    let hf = features.column(column::HF_ENERGY);

    let (n_rms, n_zcr, n_centroid) = (safe_norm(&rms), safe_norm(&zcr), safe_norm(&centroid));
    let (n_bandwidth, n_rolloff) = (safe_norm(&bandwidth), safe_norm(&rolloff));
    let (n_flatness, n_hf) = (safe_norm(&flatness), safe_norm(&hf));

    let mfcc_spread: Vec<f64> = (0..features.n_frames())
        .map(|t| std_dev(&features.row(t)[column::MFCC]))
        .collect();
    let n_spread = safe_norm(&mfcc_spread);

    let n = features.n_frames();
    let clarity = (0..n)
        .map(|t| 0.4 * n_rms[t] + 0.3 * n_centroid[t] - 0.2 * n_zcr[t] - 0.1 * n_flatness[t])
        .collect();
    let sharpness = (0..n)
        .map(|t| 0.4 * n_centroid[t] + 0.3 * n_rolloff[t] + 0.2 * n_hf[t] - 0.1 * n_flatness[t])
        .collect();
    let smoothness = (0..n)
        .map(|t| {
            let motion: f64 = features.row(t)[column::DYNAMICS].iter().map(|v| v.abs()).sum();
            1.0 - motion
        })
        .collect();
    let thickness = (0..n)
        .map(|t| 0.4 * n_rms[t] + 0.3 * n_bandwidth[t] + 0.2 * n_spread[t] + 0.1 * (1.0 - n_flatness[t]))
        .collect();

    BTreeMap::from([
        (Trait::Brightness, centroid),
        (Trait::Clarity, clarity),
        (Trait::Sharpness, sharpness),
        (Trait::Smoothness, smoothness),
        (Trait::Thickness, thickness),
    ])
}

/// Scale by the maximum, or all zeros when the maximum is not positive.
fn safe_norm(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        values.iter().map(|v| v / max).collect()
    } else {
        vec![0.0; values.len()]
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::FEATURE_WIDTH;

    fn matrix(rows: usize, fill: impl Fn(usize, usize) -> f64) -> FrameFeatureMatrix {
        let rows: Vec<Vec<f64>> = (0..rows)
            .map(|t| (0..FEATURE_WIDTH).map(|c| fill(t, c)).collect())
            .collect();
        FrameFeatureMatrix::from_rows(&rows)
    }

    #[test]
    fn brightness_is_the_centroid_column() {
        let m = matrix(3, |t, c| if c == column::CENTROID { 1000.0 * (t + 1) as f64 } else { 0.0 });
        let traits = heuristic_traits(&m);
        assert_eq!(traits[&Trait::Brightness], vec![1000.0, 2000.0, 3000.0]);
        assert_eq!(traits[&Trait::Sharpness][2], 0.4);
    }

    #[test]
    fn smoothness_penalises_dynamics_only() {
        let m = matrix(2, |t, c| {
            if column::DYNAMICS.contains(&c) && t == 1 {
                0.1
            } else if c == column::HF_ENERGY {
                5.0
            } else {
                0.0
            }
        });
        let smooth = &heuristic_traits(&m)[&Trait::Smoothness];
        assert_eq!(smooth[0], 1.0);
        assert!((smooth[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn silent_features_do_not_divide_by_zero() {
        let traits = heuristic_traits(&matrix(4, |_, _| 0.0));
        assert_eq!(traits.len(), 5);
        assert!(traits.values().flatten().all(|v| v.is_finite()));
        assert_eq!(traits[&Trait::Thickness], vec![0.1; 4]);
    }
}
