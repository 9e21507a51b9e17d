//! T-AAHC checkpoint reuse: descending to a higher K first, then to a lower
//! K from the same state, must give the same answer as descending straight
//! to the lower K from a fresh `init`.

use eeg_microstates::prelude::*;
use eeg_microstates::taahc::TaahcState;
use ndarray::{Array1, Array2};

fn ring_dataset(num_tf: usize, num_electrodes: usize, num_templates: usize) -> Dataset {
    let mut data = Array2::<f64>::zeros((num_tf, num_electrodes));
    for tf in 0..num_tf {
        let template = tf % num_templates;
        let angle = (template as f64) * std::f64::consts::PI / num_templates as f64;
        for e in 0..num_electrodes {
            let phase = (e as f64) * 2.0 * std::f64::consts::PI / num_electrodes as f64;
            data[[tf, e]] = (angle + phase).cos();
        }
    }
    let norms = Array1::from_shape_fn(num_tf, |tf| data.row(tf).dot(&data.row(tf)).sqrt());
    for tf in 0..num_tf {
        let n = norms[tf];
        if n > 0.0 {
            let mut row = data.row_mut(tf);
            row /= n;
        }
    }
    let files = vec![FileInterval { num_tf, offset_tf: 0 }];
    Dataset::new(data, true, num_electrodes, 250.0, files, norms).unwrap()
}

#[test]
fn descending_from_a_cached_checkpoint_matches_a_fresh_descent() {
    let dataset = ring_dataset(120, 16, 5);

    let mut cached_state = TaahcState::init(&dataset, 10, PolarityRequest::Direct).unwrap();
    let _ = cached_state
        .descend(&dataset, 10, PolarityRequest::Direct, CentroidKind::Mean)
        .unwrap();
    let (cached_templates, cached_labeling, cached_gev) = cached_state
        .descend(&dataset, 5, PolarityRequest::Direct, CentroidKind::Mean)
        .unwrap();

    let mut fresh_state = TaahcState::init(&dataset, 10, PolarityRequest::Direct).unwrap();
    let (fresh_templates, fresh_labeling, fresh_gev) = fresh_state
        .descend(&dataset, 5, PolarityRequest::Direct, CentroidKind::Mean)
        .unwrap();

    assert_eq!(cached_templates, fresh_templates);
    for tf in 0..dataset.num_time_frames() {
        assert_eq!(cached_labeling.label(tf), fresh_labeling.label(tf));
    }
    assert!((cached_gev - fresh_gev).abs() < 1e-9);
}
