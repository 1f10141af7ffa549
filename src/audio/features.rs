use std::ops::Range;

pub const N_MFCC: usize = 13;
pub const N_CHROMA: usize = 12;

/// Column layout of [`FrameFeatureMatrix`].
#[allow(dead_code)]
pub mod column {
    use super::{Range, N_CHROMA, N_MFCC};

    pub const MFCC: Range<usize> = 0..N_MFCC;
    pub const DELTA_MFCC: Range<usize> = N_MFCC..2 * N_MFCC;
    pub const ZCR: usize = 2 * N_MFCC;
    pub const RMS: usize = ZCR + 1;
    pub const CENTROID: usize = ZCR + 2;
    pub const BANDWIDTH: usize = ZCR + 3;
    pub const ROLLOFF: usize = ZCR + 4;
    pub const FLATNESS: usize = ZCR + 5;
    pub const CHROMA: Range<usize> = FLATNESS + 1..FLATNESS + 1 + N_CHROMA;
    pub const ONSET: usize = FLATNESS + 1 + N_CHROMA;
    pub const DELTA_RMS: usize = ONSET + 1;
    pub const DELTA_BANDWIDTH: usize = ONSET + 2;
    pub const DELTA2_RMS: usize = ONSET + 3;
    pub const DELTA2_BANDWIDTH: usize = ONSET + 4;
    pub const SPECTRAL_FLUX: usize = ONSET + 5;
    pub const DELTA2_FLUX: usize = ONSET + 6;
    pub const HF_ENERGY: usize = ONSET + 7;

    /// The frame-to-frame dynamics columns, in stacking order.
    pub const DYNAMICS: Range<usize> = DELTA_RMS..HF_ENERGY;
}

pub const FEATURE_WIDTH: usize = column::HF_ENERGY + 1;

/// T×D framewise features, row-major. `T` is the common minimum frame count
/// of all independently computed sub-features.
#[derive(Clone, Debug)]
pub struct FrameFeatureMatrix {
    data: Vec<f64>,
    n_frames: usize,
    width: usize,
    /// Frame count each sub-feature produced before trimming.
    pub sub_feature_frames: Vec<(&'static str, usize)>,
}

impl FrameFeatureMatrix {
    /// Stack equally long columns into a matrix.
    pub fn from_columns(columns: &[Vec<f64>]) -> Self {
        let width = columns.len();
        let n_frames = columns.iter().map(Vec::len).min().unwrap_or(0);
        let mut data = Vec::with_capacity(n_frames * width);
        for t in 0..n_frames {
            data.extend(columns.iter().map(|col| col[t]));
        }
        Self {
            data,
            n_frames,
            width,
            sub_feature_frames: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self {
            data,
            n_frames: rows.len(),
            width,
            sub_feature_frames: Vec::new(),
        }
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, t: usize) -> &[f64] {
        &self.data[t * self.width..(t + 1) * self.width]
    }

    pub fn rows(&self, range: Range<usize>) -> impl Iterator<Item = &[f64]> {
        range.map(move |t| self.row(t))
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.n_frames).map(|t| self.data[t * self.width + c]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_fifty_two_wide() {
        assert_eq!(FEATURE_WIDTH, 52);
        assert_eq!(column::ZCR, 26);
        assert_eq!(column::RMS, 27);
        assert_eq!(column::CHROMA, 32..44);
        assert_eq!(column::ONSET, 44);
        assert_eq!(column::HF_ENERGY, 51);
        assert_eq!(column::DYNAMICS.len(), 6);
    }

    #[test]
    fn columns_and_rows_agree() {
        let m = FrameFeatureMatrix::from_columns(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0, 7.0]]);
        assert_eq!(m.n_frames(), 3);
        assert_eq!(m.width(), 2);
        assert_eq!(m.row(1), &[2.0, 5.0]);
        assert_eq!(m.column(1), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn from_rows_matches_row_major_layout() {
        let m = FrameFeatureMatrix::from_rows(&[vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
        assert_eq!(m.n_frames(), 3);
        assert_eq!(m.column(0), vec![1.0, 2.0, 3.0]);
        assert_eq!(m.rows(1..3).collect::<Vec<_>>(), vec![&[2.0, 5.0][..], &[3.0, 6.0][..]]);
    }
}
