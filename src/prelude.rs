//! Convenient re-exports for common segmentation operations.

pub use crate::{ClusteringError, Result};

pub use crate::config::{
    Method, NullReporter, ProgressReporter, RunPolarity, SegmentationConfig,
    SegmentationConfigBuilder,
};
pub use crate::data::{Dataset, FileInterval};
pub use crate::labeling::{Label, Labeling, UNDEFINED};
pub use crate::map::{centroid, project, CentroidKind, Polarity, PolarityRequest};

pub use crate::kmeans::{segment_kmeans, KMeansConfig, KMeansConfigBuilder, KMeansResult};
pub use crate::taahc::{segment_taahc, TaahcState};

pub use crate::criteria::{criterion_names, evaluate_criterion, Criterion};
pub use crate::meta::{compute_meta_criterion, MetaCriterionResult};

pub use crate::postprocess::{
    merge_correlated_templates, reject_low_correlation, reject_short_segments,
    reorder_templates, sequentialize_segments, smoothing_labeling, Ordering,
};

pub use crate::orchestration::{segment, SegmentationCandidate, SegmentationResult};

pub use crate::io::{
    read_criteria_file, read_seg_file, read_templates_file, templates_file_name,
    write_criteria_file, write_seg_file, write_templates_file, SegRow,
};

// Common types
pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
