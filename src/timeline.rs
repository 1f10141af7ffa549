//! Mapping window-rate values back onto the frame index.

use crate::stats::WindowStats;

/// Linearly interpolate window-rate `values` (at frame positions `centers`)
/// onto frames `0..n_frames`, holding the first/last value beyond the ends.
///
/// `centers` must be increasing. One window gives a constant series; no
/// windows gives zeros.
pub fn upsample_to_frames(centers: &[f64], values: &[f64], n_frames: usize) -> Vec<f64> {
    let n = centers.len().min(values.len());
    match n {
        0 => return vec![0.0; n_frames],
        1 => return vec![values[0]; n_frames],
        _ => {}
    }
    let (xs, ys) = (&centers[..n], &values[..n]);

    let mut out = Vec::with_capacity(n_frames);
    let mut seg = 0;
    for frame in 0..n_frames {
        let x = frame as f64;
        if x <= xs[0] {
            out.push(ys[0]);
            continue;
        }
        if x >= xs[n - 1] {
            out.push(ys[n - 1]);
            continue;
        }
        while seg + 1 < n - 1 && xs[seg + 1] < x {
            seg += 1;
        }
        let (x0, x1) = (xs[seg], xs[seg + 1]);
        let (y0, y1) = (ys[seg], ys[seg + 1]);
        let span = x1 - x0;
        out.push(if span > 0.0 { y0 + (y1 - y0) * (x - x0) / span } else { y1 });
    }
    out
}

/// Bring one window-rate series to frame rate, passing dense results through.
pub fn to_frames(stats: &WindowStats, values: &[f64], n_frames: usize) -> Vec<f64> {
    if stats.dense {
        let mut out: Vec<f64> = values.iter().copied().take(n_frames).collect();
        if let Some(&last) = out.last() {
            out.resize(n_frames, last);
        }
        out
    } else {
        upsample_to_frames(&stats.centers, values, n_frames)
    }
}

/// The length every jointly reported stream is cut to.
pub fn common_length(lengths: &[usize]) -> usize {
    lengths.iter().copied().min().unwrap_or(0)
}

pub fn truncate<T: Clone>(series: &[T], len: usize) -> Vec<T> {
    series[..len.min(series.len())].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_take_first_and_last_window_exactly() {
        let centers = [21.5, 30.5, 39.5, 44.0];
        let values = [0.25, -1.0, 3.0, 7.125];
        let out = upsample_to_frames(&centers, &values, 50);
        assert_eq!(out.len(), 50);
        assert_eq!(out[0], 0.25);
        assert_eq!(out[49], 7.125);
        assert_eq!(out[21], 0.25);
        assert_eq!(out[45], 7.125);
    }

    #[test]
    fn interpolates_between_centers() {
        let out = upsample_to_frames(&[1.0, 3.0], &[0.0, 10.0], 5);
        assert_eq!(out, vec![0.0, 0.0, 5.0, 10.0, 10.0]);
        let half = upsample_to_frames(&[0.5, 2.5], &[0.0, 4.0], 3);
        assert_eq!(half, vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn single_window_is_constant() {
        assert_eq!(upsample_to_frames(&[12.0], &[0.7], 4), vec![0.7; 4]);
        assert_eq!(upsample_to_frames(&[], &[], 3), vec![0.0; 3]);
    }

    #[test]
    fn dense_results_pass_through() {
        let stats = WindowStats {
            vectors: vec![vec![0.0]; 4],
            centers: vec![0.0, 1.0, 2.0, 3.0],
            dense: true,
        };
        assert_eq!(to_frames(&stats, &[1.0, 2.0, 3.0, 4.0], 3), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn streams_are_cut_to_the_shortest() {
        let len = common_length(&[120, 118, 121]);
        assert_eq!(len, 118);
        assert_eq!(truncate(&[1, 2, 3], 2), vec![1, 2]);
        assert_eq!(truncate(&[1, 2], 5), vec![1, 2]);
        assert_eq!(common_length(&[]), 0);
    }
}
