//! Sequentialize segments (§4.12).
//!
//! For each cluster, scan every file for maximal runs of that cluster;
//! every run after the first (across all files, in file order) is promoted
//! to a new cluster id. Templates are recomputed afterwards.

use ndarray::Array2;

use crate::data::Dataset;
use crate::labeling::Labeling;
use crate::map::{centroid, CentroidKind, Polarity};

/// Split non-contiguous occurrences of the same cluster into distinct
/// cluster ids, recomputing templates over the expanded labeling. Returns
/// the new cluster count (not packed -- callers needing a dense range
/// should pack separately, though no gaps are ever introduced here).
pub fn sequentialize_segments(
    dataset: &Dataset,
    templates: &mut Array2<f64>,
    labeling: &mut Labeling,
    centroid_kind: CentroidKind,
) -> usize {
    let original_nc = labeling.max_label() as i64 + 1;
    if original_nc <= 0 {
        return 0;
    }
    let mut next_cluster = original_nc as i32;

    for cluster in 0..original_nc as i32 {
        let mut run_started = false;
        let mut first_run_seen = false;
        let mut current_new_label = cluster;

        for file in dataset.files() {
            let (lo, hi) = file.range();
            run_started = false;
            for tf in lo..=hi {
                if labeling.label(tf) == cluster {
                    if !run_started {
                        run_started = true;
                        if first_run_seen {
                            current_new_label = next_cluster;
                            next_cluster += 1;
                        } else {
                            first_run_seen = true;
                            current_new_label = cluster;
                        }
                    }
                    labeling.set_label(tf, current_new_label);
                } else {
                    run_started = false;
                }
            }
        }
    }

    let new_nc = next_cluster as usize;
    let mut expanded = Array2::<f64>::zeros((new_nc, templates.ncols()));
    // `templates` is expected to already be sized to the live cluster count,
    // but every row here is recomputed from scratch below regardless -- this
    // copy only seeds rows the centroid pass leaves untouched (an empty
    // cluster), so bound it rather than assume the incoming size.
    let carry_over = templates.nrows().min(new_nc);
    expanded
        .slice_mut(ndarray::s![..carry_over, ..])
        .assign(&templates.slice(ndarray::s![..carry_over, ..]));

    for cluster in 0..new_nc {
        let members: Vec<(usize, Polarity)> = (0..dataset.num_time_frames())
            .filter(|&tf| labeling.label(tf) as usize == cluster)
            .map(|tf| (tf, labeling.polarity(tf)))
            .collect();
        if let Some(c) = centroid(dataset.data().view(), &members, centroid_kind) {
            expanded.row_mut(cluster).assign(&c);
        }
    }

    *templates = expanded;
    new_nc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::{array, Array1};

    #[test]
    fn splits_non_contiguous_occurrences() {
        let data = array![
            [1.0_f64, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 0.0],
        ];
        let norms = Array1::<f64>::ones(5);
        let files = vec![FileInterval { num_tf: 5, offset_tf: 0 }];
        let dataset = Dataset::new(data, true, 2, 250.0, files, norms).unwrap();

        let mut templates = array![[1.0_f64, 0.0], [0.0, 1.0]];
        let mut labeling = Labeling::new(5);
        labeling.set_label(0, 0);
        labeling.set_label(1, 0);
        labeling.set_label(2, 1);
        labeling.set_label(3, 0);
        labeling.set_label(4, 0);

        let new_nc = sequentialize_segments(&dataset, &mut templates, &mut labeling, CentroidKind::Mean);
        assert_eq!(new_nc, 3);
        assert_eq!(labeling.label(0), 0);
        assert_eq!(labeling.label(3), 2);
    }
}
