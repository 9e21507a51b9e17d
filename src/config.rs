//! Run configuration and the injected progress-reporter interface.
//!
//! Chained setters on a `*Builder` type, consumed by a validating
//! `.build()`.

use crate::map::CentroidKind;
use crate::postprocess::reorder::Ordering;
use crate::{ClusteringError, Result};

/// Which of the two clustering drivers to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    KMeans { n_trials: usize },
    TAahc,
}

/// Polarity handling requested by the caller for the whole segmentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolarity {
    Direct,
    Evaluate,
}

/// A side-channel for progress reporting, replacing the upstream engine's
/// process-wide gauge. The core never holds global mutable state; callers
/// that don't care about progress use [`NullReporter`].
pub trait ProgressReporter: Send + Sync {
    fn next(&self) {}
    fn set_value(&self, _pct: f64) {}
    fn blink(&self) {}
    fn end_blink(&self) {}
}

/// A reporter that does nothing. The default for [`SegmentationConfig`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {}

/// Validated run parameters for the core entry point, `segment()`.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    pub k_min: usize,
    pub k_max: usize,
    pub method: Method,
    pub polarity: RunPolarity,
    pub centroid: CentroidKind,
    pub limit_corr: f64,
    pub do_sequentialize: bool,
    pub do_merge: bool,
    pub merge_thresh: f64,
    pub do_smooth: bool,
    pub smooth_window: usize,
    pub smooth_lambda: f64,
    pub do_reject: bool,
    pub reject_size: usize,
    pub ordering: Ordering,
    /// Lower bound on the meta-criterion's chosen K (§4.7 step 6). `1` by
    /// default; the ESI-friendly profile raises it to `4`.
    pub k_meta_floor: usize,
}

impl SegmentationConfig {
    pub fn builder(k_min: usize, k_max: usize) -> SegmentationConfigBuilder {
        SegmentationConfigBuilder::new(k_min, k_max)
    }
}

/// Builder for [`SegmentationConfig`].
pub struct SegmentationConfigBuilder {
    k_min: usize,
    k_max: usize,
    method: Method,
    polarity: RunPolarity,
    centroid: CentroidKind,
    limit_corr: f64,
    do_sequentialize: bool,
    do_merge: bool,
    merge_thresh: f64,
    do_smooth: bool,
    smooth_window: usize,
    smooth_lambda: f64,
    do_reject: bool,
    reject_size: usize,
    ordering: Ordering,
    k_meta_floor: usize,
}

impl SegmentationConfigBuilder {
    pub fn new(k_min: usize, k_max: usize) -> Self {
        Self {
            k_min,
            k_max,
            method: Method::KMeans { n_trials: 20 },
            polarity: RunPolarity::Direct,
            centroid: CentroidKind::Mean,
            limit_corr: 0.0,
            do_sequentialize: true,
            do_merge: false,
            merge_thresh: 0.95,
            do_smooth: true,
            smooth_window: 3,
            smooth_lambda: 5.0,
            do_reject: true,
            reject_size: 3,
            ordering: Ordering::Temporal,
            k_meta_floor: 1,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn polarity(mut self, polarity: RunPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn centroid(mut self, centroid: CentroidKind) -> Self {
        self.centroid = centroid;
        self
    }

    pub fn limit_corr(mut self, limit_corr: f64) -> Self {
        self.limit_corr = limit_corr;
        self
    }

    pub fn sequentialize(mut self, enabled: bool) -> Self {
        self.do_sequentialize = enabled;
        self
    }

    pub fn merge(mut self, enabled: bool, thresh: f64) -> Self {
        self.do_merge = enabled;
        self.merge_thresh = thresh;
        self
    }

    pub fn smooth(mut self, enabled: bool, window: usize, lambda: f64) -> Self {
        self.do_smooth = enabled;
        self.smooth_window = window;
        self.smooth_lambda = lambda;
        self
    }

    pub fn reject(mut self, enabled: bool, size: usize) -> Self {
        self.do_reject = enabled;
        self.reject_size = size;
        self
    }

    pub fn ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Lower bound the meta-criterion's chosen K can never fall below (§4.7
    /// step 6). Defaults to `1` (no floor). Raise it to `4` for the
    /// ESI-friendly profile, where cortical source maps are expected to
    /// resolve into more than a handful of microstates and a low-K argmax
    /// is more likely to be noise than signal.
    pub fn k_meta_floor(mut self, floor: usize) -> Self {
        self.k_meta_floor = floor;
        self
    }

    pub fn build(self) -> Result<SegmentationConfig> {
        if self.k_min == 0 || self.k_max == 0 {
            return Err(ClusteringError::InvalidConfig(
                "K_min and K_max must be at least 1".into(),
            ));
        }
        if self.k_min > self.k_max {
            return Err(ClusteringError::InvalidConfig(
                "K_min must be <= K_max".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.limit_corr) {
            return Err(ClusteringError::InvalidConfig(
                "limit_corr must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.merge_thresh) {
            return Err(ClusteringError::InvalidConfig(
                "merge_thresh must be in [0, 1]".into(),
            ));
        }

        Ok(SegmentationConfig {
            k_min: self.k_min,
            k_max: self.k_max,
            method: self.method,
            polarity: self.polarity,
            centroid: self.centroid,
            limit_corr: self.limit_corr,
            do_sequentialize: self.do_sequentialize,
            do_merge: self.do_merge,
            merge_thresh: self.merge_thresh,
            do_smooth: self.do_smooth,
            smooth_window: self.smooth_window,
            smooth_lambda: self.smooth_lambda,
            do_reject: self.do_reject,
            reject_size: self.reject_size,
            ordering: self.ordering,
            k_meta_floor: self.k_meta_floor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_k_range() {
        let err = SegmentationConfig::builder(5, 2).build().unwrap_err();
        assert!(matches!(err, ClusteringError::InvalidConfig(_)));
    }

    #[test]
    fn builds_with_defaults() {
        let cfg = SegmentationConfig::builder(1, 8).build().unwrap();
        assert_eq!(cfg.k_meta_floor, 1);
        assert!(cfg.do_sequentialize);
    }
}
