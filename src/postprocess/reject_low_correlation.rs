//! Reject low correlation (§4.10).
//!
//! A single pass setting any under-threshold timepoint to UNDEFINED,
//! followed by a pack.

use ndarray::Array2;

use crate::data::Dataset;
use crate::labeling::Labeling;
use crate::map::project;

/// Undefine every timepoint whose projection onto its assigned template
/// (at its stored polarity) falls below `threshold`. Returns the packed
/// cluster count.
pub fn reject_low_correlation(
    dataset: &Dataset,
    templates: &mut Array2<f64>,
    labeling: &mut Labeling,
    threshold: f64,
) -> usize {
    for tf in 0..dataset.num_time_frames() {
        if labeling.is_undefined(tf) {
            continue;
        }
        let label = labeling.label(tf) as usize;
        let proj = project(templates.row(label), dataset.sample(tf), labeling.polarity(tf).into());
        if proj < threshold {
            labeling.reset_at(tf);
        }
    }
    labeling.pack(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::{array, Array1};

    #[test]
    fn undefines_poorly_correlated_samples() {
        let data = array![[1.0_f64, 0.0], [0.1, 0.995]];
        let norms = Array1::<f64>::ones(2);
        let files = vec![FileInterval { num_tf: 2, offset_tf: 0 }];
        let dataset = Dataset::new(data, true, 2, 250.0, files, norms).unwrap();

        let mut templates = array![[1.0_f64, 0.0]];
        let mut labeling = Labeling::new(2);
        labeling.set_label(0, 0);
        labeling.set_label(1, 0);

        reject_low_correlation(&dataset, &mut templates, &mut labeling, 0.5);
        assert!(labeling.is_defined(0));
        assert!(labeling.is_undefined(1));
    }
}
