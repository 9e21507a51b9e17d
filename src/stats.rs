//! Within/between/all distance statistics feeding the criteria bank (§4.5).
//!
//! Six accumulators over all defined samples at a given K, with optional
//! downsampling to keep pairwise terms bounded. Two accumulation modes
//! accumulator modes mirror a privatized-per-thread pass (used inside an
//! already-parallel region) versus a plain sequential one.

use ndarray::Array2;
use rayon::prelude::*;

use crate::data::Dataset;
use crate::labeling::{Labeling, UNDEFINED};
use crate::map::{project, proj_to_sq_dist, PolarityRequest};

/// Sample budget for pairwise (`O(n^2)`) statistics.
const PAIRWISE_BUDGET: usize = 4000;

/// A recorded pairwise distance plus the timepoints it came from, so
/// downstream criteria that need to reconstruct per-pair cluster labels
/// (Point-Biserial) can do so without rescanning the labeling.
#[derive(Debug, Clone, Copy)]
pub struct PairRecord {
    pub tf_a: usize,
    pub tf_b: usize,
    pub sq_dist: f64,
}

/// The six distance statistics for one value of K, each a flat vector of
/// per-sample or per-pair values; criteria consume medians or raw vectors
/// as needed.
#[derive(Debug, Clone, Default)]
pub struct DistanceStats {
    pub w_centroid: Vec<f64>,
    pub w_centroid_sq: Vec<f64>,
    pub b_centroid_sq: Vec<f64>,
    pub w_pooled: Vec<PairRecord>,
    pub b_pooled: Vec<PairRecord>,
    pub a_pooled: Vec<PairRecord>,
    pub w_pooled_sq: Vec<f64>,
}

impl DistanceStats {
    pub fn median(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = sorted.len();
        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
        }
    }

    pub fn median_w_centroid(&self) -> f64 {
        Self::median(&self.w_centroid)
    }

    pub fn median_w_centroid_sq(&self) -> f64 {
        Self::median(&self.w_centroid_sq)
    }

    pub fn median_b_centroid_sq(&self) -> f64 {
        Self::median(&self.b_centroid_sq)
    }

    pub fn median_w_pooled(&self) -> f64 {
        Self::median(&self.w_pooled.iter().map(|p| p.sq_dist.sqrt()).collect::<Vec<_>>())
    }

    pub fn median_b_pooled(&self) -> f64 {
        Self::median(&self.b_pooled.iter().map(|p| p.sq_dist.sqrt()).collect::<Vec<_>>())
    }

    pub fn median_a_pooled(&self) -> f64 {
        Self::median(&self.a_pooled.iter().map(|p| p.sq_dist.sqrt()).collect::<Vec<_>>())
    }

    pub fn median_w_pooled_sq(&self) -> f64 {
        Self::median(&self.w_pooled_sq)
    }
}

/// Downsampling stride so pairwise terms stay within [`PAIRWISE_BUDGET`].
pub fn pairwise_stride(defined_count: usize) -> usize {
    if defined_count <= PAIRWISE_BUDGET {
        1
    } else {
        (defined_count + PAIRWISE_BUDGET - 1) / PAIRWISE_BUDGET
    }
}

/// Compute all six statistics at the given templates/labeling.
pub fn compute_distance_stats(
    dataset: &Dataset,
    templates: &Array2<f64>,
    labeling: &Labeling,
    polarity: PolarityRequest,
    parallel: bool,
) -> DistanceStats {
    let defined: Vec<usize> = (0..dataset.num_time_frames())
        .filter(|&tf| labeling.is_defined(tf))
        .collect();

    let centroid_terms = |tf: usize| -> (f64, f64, f64) {
        let label = labeling.label(tf) as usize;
        let own_proj = project(templates.row(label), dataset.sample(tf), polarity);
        let w = proj_to_sq_dist(own_proj).max(0.0).sqrt();
        let w_sq = w * w;

        let k = labeling.max_label() as usize + 1;
        let mut b_sq_sum = 0.0;
        let mut b_count = 0usize;
        for other in 0..k {
            if other == label {
                continue;
            }
            let p = project(templates.row(other), dataset.sample(tf), polarity);
            b_sq_sum += proj_to_sq_dist(p).max(0.0);
            b_count += 1;
        }
        let b_sq = if b_count > 0 { b_sq_sum / b_count as f64 } else { 0.0 };
        (w, w_sq, b_sq)
    };

    let centroid_results: Vec<(f64, f64, f64)> = if parallel {
        defined.par_iter().map(|&tf| centroid_terms(tf)).collect()
    } else {
        defined.iter().map(|&tf| centroid_terms(tf)).collect()
    };

    let mut stats = DistanceStats::default();
    for (w, w_sq, b_sq) in centroid_results {
        stats.w_centroid.push(w);
        stats.w_centroid_sq.push(w_sq);
        stats.b_centroid_sq.push(b_sq);
    }

    let stride = pairwise_stride(defined.len());
    let sampled: Vec<usize> = defined.iter().copied().step_by(stride).collect();

    for (idx_a, &a) in sampled.iter().enumerate() {
        for &b in &sampled[(idx_a + 1)..] {
            let la = labeling.label(a);
            let lb = labeling.label(b);
            if la == UNDEFINED || lb == UNDEFINED {
                continue;
            }
            let p = project(dataset.sample(a), dataset.sample(b), PolarityRequest::Evaluate);
            let sq = proj_to_sq_dist(p).max(0.0);
            let record = PairRecord { tf_a: a, tf_b: b, sq_dist: sq };
            stats.a_pooled.push(record);
            if la == lb {
                stats.w_pooled.push(record);
                stats.w_pooled_sq.push(sq);
            } else {
                stats.b_pooled.push(record);
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::{array, Array1};

    fn tiny_dataset() -> Dataset {
        let data = array![[1.0_f64, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let norms = Array1::<f64>::ones(4);
        let files = vec![FileInterval { num_tf: 4, offset_tf: 0 }];
        Dataset::new(data, true, 2, 250.0, files, norms).unwrap()
    }

    #[test]
    fn separates_within_and_between_pairs() {
        let dataset = tiny_dataset();
        let templates = array![[1.0_f64, 0.0], [0.0, 1.0]];
        let mut labeling = Labeling::new(4);
        labeling.set_label(0, 0);
        labeling.set_label(1, 1);
        labeling.set_label(2, 0);
        labeling.set_label(3, 1);

        let stats = compute_distance_stats(&dataset, &templates, &labeling, PolarityRequest::Direct, false);
        assert_eq!(stats.w_pooled.len(), 2);
        assert_eq!(stats.b_pooled.len(), 4);
        assert!(stats.median_w_pooled() < stats.median_b_pooled());
    }

    #[test]
    fn pairwise_stride_respects_budget() {
        assert_eq!(pairwise_stride(100), 1);
        assert_eq!(pairwise_stride(8001), 3);
    }
}
