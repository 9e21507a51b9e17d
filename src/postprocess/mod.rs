//! Segment post-processing pipeline (§4.8-§4.13): merge, smooth, reject,
//! sequentialize, and reorder operate on a `(templates, labeling)` pair in
//! place, each returning the resulting cluster count.

pub mod merge;
pub mod reject_low_correlation;
pub mod reject_short_segments;
pub mod reorder;
pub mod sequentialize;
pub mod smoothing;

pub use merge::merge_correlated_templates;
pub use reject_low_correlation::reject_low_correlation;
pub use reject_short_segments::reject_short_segments;
pub use reorder::{reorder_templates, Ordering};
pub use sequentialize::sequentialize_segments;
pub use smoothing::smoothing_labeling;
