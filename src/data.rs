//! Input dataset contract (§3, §6): the centered, unit-norm sample matrix
//! plus file intervals and precomputed norms, as delivered by the (external)
//! loader.
//!
//! Owns the sample matrix, file boundaries and pre-normalization norms as
//! a single validated, contiguous `ndarray::Array2<f64>`.

use ndarray::{Array1, Array2, ArrayView1};

use crate::{ClusteringError, Result};

/// One concatenated recording's position inside the flattened `Dataset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInterval {
    pub num_tf: usize,
    pub offset_tf: usize,
}

impl FileInterval {
    /// Inclusive absolute timepoint range `[tfmin, tfmax]` for this file.
    pub fn range(&self) -> (usize, usize) {
        (self.offset_tf, self.offset_tf + self.num_tf - 1)
    }

    pub fn contains(&self, tf: usize) -> bool {
        let (lo, hi) = self.range();
        tf >= lo && tf <= hi
    }
}

/// The core's input: a matrix of already centered, unit-norm maps, the
/// file boundaries they were concatenated from, and their pre-normalization
/// norms (used by GEV and by smoothing's sigma-squared term).
#[derive(Debug, Clone)]
pub struct Dataset {
    /// `T x R`: one row per timepoint, already centered/unit-norm.
    data: Array2<f64>,
    /// Whether rows are scalar (`R = E`) or 3-vector (`R = 3E`) samples.
    scalar: bool,
    num_electrodes: usize,
    sampling_frequency: f64,
    files: Vec<FileInterval>,
    /// `||D[t]||` prior to normalization, one per timepoint.
    norms: Array1<f64>,
}

impl Dataset {
    pub fn new(
        data: Array2<f64>,
        scalar: bool,
        num_electrodes: usize,
        sampling_frequency: f64,
        files: Vec<FileInterval>,
        norms: Array1<f64>,
    ) -> Result<Self> {
        let t = data.nrows();
        let r = data.ncols();

        if norms.len() != t {
            return Err(ClusteringError::DimensionMismatch {
                expected: format!("{t} norms"),
                actual: format!("{} norms", norms.len()),
            });
        }

        let expected_r = if scalar {
            num_electrodes
        } else {
            3 * num_electrodes
        };
        if r != expected_r {
            return Err(ClusteringError::DimensionMismatch {
                expected: format!("{expected_r} rows"),
                actual: format!("{r} rows"),
            });
        }

        let covered: usize = files.iter().map(|f| f.num_tf).sum();
        if covered != t {
            return Err(ClusteringError::DimensionMismatch {
                expected: format!("{t} timeframes covered by files"),
                actual: format!("{covered} timeframes covered by files"),
            });
        }

        Ok(Self {
            data,
            scalar,
            num_electrodes,
            sampling_frequency,
            files,
            norms,
        })
    }

    pub fn num_time_frames(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_rows(&self) -> usize {
        self.data.ncols()
    }

    pub fn num_electrodes(&self) -> usize {
        self.num_electrodes
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    pub fn files(&self) -> &[FileInterval] {
        &self.files
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn sample(&self, tf: usize) -> ArrayView1<f64> {
        self.data.row(tf)
    }

    pub fn norm(&self, tf: usize) -> f64 {
        self.norms[tf]
    }

    /// Index of the file that owns absolute timepoint `tf`.
    pub fn file_of(&self, tf: usize) -> usize {
        self.files
            .iter()
            .position(|f| f.contains(tf))
            .expect("tf out of range of all files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_mismatched_row_width() {
        let data = array![[1.0_f64, 0.0, 0.0]];
        let norms = array![1.0_f64];
        let files = vec![FileInterval { num_tf: 1, offset_tf: 0 }];
        let err = Dataset::new(data, true, 2, 250.0, files, norms).unwrap_err();
        assert!(matches!(err, ClusteringError::DimensionMismatch { .. }));
    }

    #[test]
    fn file_of_finds_owning_interval() {
        let data = Array2::<f64>::zeros((5, 2));
        let norms = Array1::<f64>::ones(5);
        let files = vec![
            FileInterval { num_tf: 2, offset_tf: 0 },
            FileInterval { num_tf: 3, offset_tf: 2 },
        ];
        let ds = Dataset::new(data, true, 2, 250.0, files, norms).unwrap();
        assert_eq!(ds.file_of(0), 0);
        assert_eq!(ds.file_of(2), 1);
        assert_eq!(ds.file_of(4), 1);
    }
}
