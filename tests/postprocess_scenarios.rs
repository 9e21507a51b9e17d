//! Scenarios exercising the post-processing stages directly: short-segment
//! rejection absorbing an isolated blip, and merging near-identical
//! templates.

use eeg_microstates::prelude::*;
use ndarray::{array, Array1, Array2};

fn dataset_of(data: Array2<f64>) -> Dataset {
    let t = data.nrows();
    let r = data.ncols();
    let norms = Array1::<f64>::ones(t);
    let files = vec![FileInterval { num_tf: t, offset_tf: 0 }];
    Dataset::new(data, true, r, 250.0, files, norms).unwrap()
}

#[test]
fn short_segment_rejection_absorbs_isolated_run() {
    // Runs [100xA, 2xB, 398xA] over T=500, A=(1,0), B close enough to A's
    // orthogonal complement that it's still a "real" but brief detour.
    let total = 500;
    let mut data = Array2::<f64>::zeros((total, 2));
    for tf in 0..total {
        if tf >= 100 && tf < 102 {
            data.row_mut(tf).assign(&array![0.0_f64, 1.0]);
        } else {
            data.row_mut(tf).assign(&array![1.0_f64, 0.0]);
        }
    }
    let dataset = dataset_of(data);

    let mut templates = array![[1.0_f64, 0.0], [0.0, 1.0]];
    let mut labeling = Labeling::new(total);
    for tf in 0..total {
        let label = if tf >= 100 && tf < 102 { 1 } else { 0 };
        labeling.set_label(tf, label);
    }

    reject_short_segments(&dataset, &mut templates, &mut labeling, 3, 0.0, PolarityRequest::Direct);

    for tf in 0..total {
        assert!(labeling.is_defined(tf), "tf {tf} left undefined");
        assert_eq!(labeling.label(tf), 0, "tf {tf} not absorbed into the surrounding A run");
    }
}

#[test]
fn merge_collapses_near_identical_templates() {
    let t0 = array![1.0_f64, 0.05, 0.0];
    let t1 = array![0.98_f64, 0.1989, 0.0];
    let t2 = array![0.0_f64, 0.0, 1.0];

    let data = array![
        [1.0_f64, 0.0, 0.0],
        [0.98, 0.1989, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 1.0],
    ];

    let mut templates = Array2::<f64>::zeros((3, 3));
    templates.row_mut(0).assign(&t0);
    templates.row_mut(1).assign(&t1);
    templates.row_mut(2).assign(&t2);

    let mut labeling = Labeling::new(4);
    labeling.set_label(0, 0);
    labeling.set_label(1, 1);
    labeling.set_label(2, 2);
    labeling.set_label(3, 2);

    let new_count = merge_correlated_templates(&data, &mut templates, &mut labeling, 0.95, CentroidKind::Mean);

    assert_eq!(new_count, 2);
    assert_eq!(templates.nrows(), 2);
    assert_eq!(labeling.label(0), labeling.label(1));
    assert_ne!(labeling.label(0), labeling.label(2));
}
