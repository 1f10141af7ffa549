//! Sliding-window moment statistics over a [`FrameFeatureMatrix`].

pub mod moments;

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::audio::features::FrameFeatureMatrix;
use crate::error::AnalysisError;

use moments::moments;

/// What to do with the final strided window when it would overrun the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// Discard the incomplete window.
    Drop,
    /// Right-pad with zero-valued frames up to the full window length.
    Pad,
    /// Keep the truncated window as-is.
    Short,
}

/// Where the dense window sits relative to its frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Centering {
    /// Roughly symmetric; the extra frame goes right when the window is even.
    Center,
    /// Window ends at the current frame.
    Causal,
    /// Window starts at the current frame.
    Trailing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    Strided,
    Dense,
}

impl FromStr for EdgePolicy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "pad" => Ok(Self::Pad),
            "short" => Ok(Self::Short),
            other => Err(AnalysisError::InvalidPolicy {
                kind: "edge policy",
                value: other.to_string(),
                expected: "drop, pad or short",
            }),
        }
    }
}

impl FromStr for Centering {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(Self::Center),
            "causal" => Ok(Self::Causal),
            "trailing" => Ok(Self::Trailing),
            other => Err(AnalysisError::InvalidPolicy {
                kind: "centering mode",
                value: other.to_string(),
                expected: "center, causal or trailing",
            }),
        }
    }
}

impl Centering {
    /// Frames taken before and after the current one for a window of `w` frames.
    pub fn extent(self, w: usize) -> (usize, usize) {
        let w = w.max(1);
        match self {
            Centering::Center if w % 2 == 0 => (w / 2 - 1, w / 2),
            Centering::Center => (w / 2, w / 2),
            Centering::Causal => (w - 1, 0),
            Centering::Trailing => (0, w - 1),
        }
    }
}

/// A fully specified aggregation strategy, in frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    Strided { window: usize, step: usize, edge: EdgePolicy },
    Dense { window: usize, centering: Centering },
}

impl Aggregation {
    /// Convert window/step durations to frame counts at `frames_per_sec`.
    pub fn from_seconds(
        mode: AggregationMode,
        frames_per_sec: f64,
        window_secs: f64,
        step_secs: f64,
        edge: EdgePolicy,
        centering: Centering,
    ) -> Result<Self, AnalysisError> {
        if !(window_secs > 0.0) || !(step_secs > 0.0) || !(frames_per_sec > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "window ({}s) and step ({}s) must be positive",
                window_secs, step_secs
            )));
        }
        let to_frames = |secs: f64| ((frames_per_sec * secs).round() as usize).max(1);
        Ok(match mode {
            AggregationMode::Strided => Aggregation::Strided {
                window: to_frames(window_secs),
                step: to_frames(step_secs),
                edge,
            },
            AggregationMode::Dense => Aggregation::Dense {
                window: to_frames(window_secs),
                centering,
            },
        })
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Strided { window, step, edge } => {
                write!(f, "strided(window={}, step={}, edge={:?})", window, step, edge)
            }
            Aggregation::Dense { window, centering } => {
                write!(f, "dense(window={}, centering={:?})", window, centering)
            }
        }
    }
}

/// One 4×D statistic vector per window plus the frame position it stands for.
#[derive(Clone, Debug, Default)]
pub struct WindowStats {
    /// `[means | variances | skewnesses | kurtoses]`, each `width` long.
    pub vectors: Vec<Vec<f64>>,
    /// Window center in frames (fractional for strided windows).
    pub centers: Vec<f64>,
    /// True when there is exactly one vector per input frame.
    pub dense: bool,
}

impl WindowStats {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.first().map_or(0, Vec::len)
    }
}

pub fn aggregate(
    features: &FrameFeatureMatrix,
    aggregation: Aggregation,
) -> Result<WindowStats, AnalysisError> {
    match aggregation {
        Aggregation::Strided { window, step, edge } => strided(features, window, step, edge),
        Aggregation::Dense { window, centering } => dense(features, window, centering),
    }
}

fn strided(
    features: &FrameFeatureMatrix,
    window: usize,
    step: usize,
    edge: EdgePolicy,
) -> Result<WindowStats, AnalysisError> {
    if window == 0 || step == 0 {
        return Err(AnalysisError::InvalidInput(format!(
            "window ({}) and step ({}) must be at least one frame",
            window, step
        )));
    }

    let total = features.n_frames();
    let mut stats = WindowStats::default();
    let mut start = 0;
    while start < total {
        let end = start + window;
        let (rows, pad) = if end <= total {
            (start..end, 0)
        } else {
            match edge {
                EdgePolicy::Drop => break,
                EdgePolicy::Pad => (start..total, end - total),
                EdgePolicy::Short => (start..total, 0),
            }
        };
        let len = rows.len() + pad;
        let block: Vec<&[f64]> = features.rows(rows).collect();
        stats.vectors.push(stat_vector(&block, pad, features.width()));
        stats.centers.push(start as f64 + len as f64 / 2.0);
        start += step;
    }

    log::debug!(
        "Strided aggregation: {} windows over {} frames (window={}, step={}, edge={:?})",
        stats.len(),
        total,
        window,
        step,
        edge
    );
    Ok(stats)
}

fn dense(
    features: &FrameFeatureMatrix,
    window: usize,
    centering: Centering,
) -> Result<WindowStats, AnalysisError> {
    if window == 0 {
        return Err(AnalysisError::InvalidInput("window must be at least one frame".into()));
    }

    let total = features.n_frames();
    let (left, right) = centering.extent(window);
    // Indices outside the matrix replicate the first/last frame.
    let vectors: Vec<Vec<f64>> = (0..total)
        .into_par_iter()
        .map(|t| {
            let block: Vec<&[f64]> = (0..=left + right)
                .map(|k| {
                    let idx = (t + k).saturating_sub(left).min(total - 1);
                    features.row(idx)
                })
                .collect();
            stat_vector(&block, 0, features.width())
        })
        .collect();

    log::debug!(
        "Dense aggregation: {} windows (window={}, centering={:?})",
        vectors.len(),
        window,
        centering
    );
    Ok(WindowStats {
        vectors,
        centers: (0..total).map(|t| t as f64).collect(),
        dense: true,
    })
}

/// Moments of every column of `rows` followed by `zero_rows` zero frames.
fn stat_vector(rows: &[&[f64]], zero_rows: usize, width: usize) -> Vec<f64> {
    let mut out = vec![0.0; 4 * width];
    let mut column = Vec::with_capacity(rows.len() + zero_rows);
    for c in 0..width {
        column.clear();
        column.extend(rows.iter().map(|r| r[c]));
        column.extend(std::iter::repeat(0.0).take(zero_rows));
        let m = moments(&column);
        out[c] = m.mean;
        out[width + c] = m.variance;
        out[2 * width + c] = m.skewness;
        out[3 * width + c] = m.kurtosis;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, width: usize) -> FrameFeatureMatrix {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|t| (0..width).map(|c| (t * (c + 1)) as f64).collect())
            .collect();
        FrameFeatureMatrix::from_rows(&rows)
    }

    #[test]
    fn strided_short_keeps_truncated_tail() {
        let m = ramp(10, 2);
        let stats = aggregate(&m, Aggregation::Strided { window: 4, step: 3, edge: EdgePolicy::Short }).unwrap();
        // starts 0, 3, 6, 9; only the window at 9 overruns
        assert_eq!(stats.len(), 4);
        assert_eq!(stats.centers, vec![2.0, 5.0, 8.0, 9.5]);
        // last window is the single frame 9
        assert_eq!(stats.vectors[3][0], 9.0);
        assert_eq!(stats.vectors[3][2], 0.0);
    }

    #[test]
    fn strided_drop_discards_incomplete_windows() {
        let m = ramp(10, 1);
        let stats = aggregate(&m, Aggregation::Strided { window: 4, step: 3, edge: EdgePolicy::Drop }).unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.centers, vec![2.0, 5.0, 8.0]);
    }

    #[test]
    fn strided_pad_fills_with_zero_frames() {
        let m = ramp(10, 1);
        let stats = aggregate(&m, Aggregation::Strided { window: 4, step: 3, edge: EdgePolicy::Pad }).unwrap();
        assert_eq!(stats.len(), 4);
        // window at 9: [9, 0, 0, 0]
        assert_eq!(stats.centers[3], 11.0);
        assert!((stats.vectors[3][0] - 2.25).abs() < 1e-12);
    }

    #[test]
    fn constant_window_has_zero_higher_moments() {
        let rows = vec![vec![0.3, -7.0, 1e6]; 12];
        let m = FrameFeatureMatrix::from_rows(&rows);
        for aggregation in [
            Aggregation::Strided { window: 5, step: 2, edge: EdgePolicy::Short },
            Aggregation::Dense { window: 5, centering: Centering::Center },
        ] {
            let stats = aggregate(&m, aggregation).unwrap();
            for v in &stats.vectors {
                assert_eq!(&v[..3], &[0.3, -7.0, 1e6]);
                assert!(v[3..].iter().all(|&x| x == 0.0), "{:?}", v);
            }
        }
    }

    #[test]
    fn dense_emits_one_vector_per_frame() {
        let m = ramp(7, 3);
        for centering in [Centering::Center, Centering::Causal, Centering::Trailing] {
            let stats = aggregate(&m, Aggregation::Dense { window: 4, centering }).unwrap();
            assert!(stats.dense);
            assert_eq!(stats.len(), 7);
            assert_eq!(stats.dim(), 12);
            assert_eq!(stats.centers, (0..7).map(|t| t as f64).collect::<Vec<_>>());
        }
    }

    #[test]
    fn dense_edges_replicate_boundary_frames() {
        let m = ramp(5, 1);
        let causal = aggregate(&m, Aggregation::Dense { window: 3, centering: Centering::Causal }).unwrap();
        // frame 0 sees [0, 0, 0]
        assert_eq!(causal.vectors[0][0], 0.0);
        assert_eq!(causal.vectors[0][1], 0.0);
        // frame 1 sees [0, 0, 1]
        assert!((causal.vectors[1][0] - 1.0 / 3.0).abs() < 1e-12);
        let trailing = aggregate(&m, Aggregation::Dense { window: 3, centering: Centering::Trailing }).unwrap();
        // frame 4 sees [4, 4, 4]
        assert_eq!(trailing.vectors[4][0], 4.0);
        assert_eq!(trailing.vectors[4][1], 0.0);
    }

    #[test]
    fn center_extent_puts_extra_frame_right() {
        assert_eq!(Centering::Center.extent(4), (1, 2));
        assert_eq!(Centering::Center.extent(5), (2, 2));
        assert_eq!(Centering::Causal.extent(4), (3, 0));
        assert_eq!(Centering::Trailing.extent(4), (0, 3));
    }

    #[test]
    fn zero_window_or_step_is_rejected() {
        let m = ramp(4, 1);
        assert!(aggregate(&m, Aggregation::Strided { window: 0, step: 1, edge: EdgePolicy::Short }).is_err());
        assert!(aggregate(&m, Aggregation::Strided { window: 2, step: 0, edge: EdgePolicy::Short }).is_err());
        assert!(aggregate(&m, Aggregation::Dense { window: 0, centering: Centering::Center }).is_err());
    }

    #[test]
    fn policy_names_parse_or_fail_loudly() {
        assert_eq!("pad".parse::<EdgePolicy>().unwrap(), EdgePolicy::Pad);
        assert_eq!("causal".parse::<Centering>().unwrap(), Centering::Causal);
        let err = "wrap".parse::<EdgePolicy>().unwrap_err();
        assert!(err.to_string().contains("edge policy 'wrap'"));
        assert!("middle".parse::<Centering>().is_err());
    }

    #[test]
    fn seconds_convert_to_frames() {
        let fps = 44100.0 / 512.0;
        let agg = Aggregation::from_seconds(
            AggregationMode::Strided,
            fps,
            1.0,
            0.1,
            EdgePolicy::Short,
            Centering::Center,
        )
        .unwrap();
        assert_eq!(agg, Aggregation::Strided { window: 86, step: 9, edge: EdgePolicy::Short });
        assert!(Aggregation::from_seconds(AggregationMode::Dense, fps, 0.0, 0.1, EdgePolicy::Short, Centering::Center).is_err());
    }
}
