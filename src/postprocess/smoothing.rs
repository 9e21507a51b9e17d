//! Besag-style temporal smoothing (§4.9).
//!
//! Per file interval, iterate a neighbor-histogram-weighted relabeling up
//! to 20 times, stopping early on convergence, GEV oscillation, or GEV
//! reaching zero.

use ndarray::Array2;
use tracing::debug;

use crate::data::Dataset;
use crate::kmeans::compute_gev;
use crate::labeling::{Labeling, UNDEFINED};
use crate::map::{centroid, project, resolve_polarity, CentroidKind, Polarity, PolarityRequest};

const MAX_PASSES: usize = 20;
const GEV_CONVERGENCE: f64 = 1e-6;

fn signed_square(x: f64) -> f64 {
    x.abs() * x
}

/// Smooth `labeling` in place over every file interval in `dataset`.
/// `window` is the one-sided neighbor radius `W`; `lambda` weights the
/// neighbor-agreement term; `limit_corr` is the correlation floor below
/// which a timepoint reverts to UNDEFINED.
pub fn smoothing_labeling(
    dataset: &Dataset,
    templates: &mut Array2<f64>,
    labeling: &mut Labeling,
    window: usize,
    lambda: f64,
    limit_corr: f64,
    polarity: PolarityRequest,
    centroid_kind: CentroidKind,
) {
    let nc = labeling.max_label() as i64 + 1;
    if nc <= 0 {
        return;
    }
    let nc = nc as usize;

    let mut prev_gev = compute_gev(dataset, templates.view(), labeling, 0, dataset.num_time_frames() - 1);
    if prev_gev.abs() < f64::EPSILON {
        return;
    }

    for pass in 0..MAX_PASSES {
        let sigma2_mu: f64 = (0..dataset.num_time_frames())
            .filter(|&tf| labeling.is_defined(tf))
            .map(|tf| {
                let l = labeling.label(tf) as usize;
                let p = project(templates.row(l), dataset.sample(tf), labeling.polarity(tf).into());
                dataset.norm(tf).powi(2) * (1.0 - p * p)
            })
            .sum::<f64>()
            / dataset.num_time_frames().max(1) as f64;

        let e = dataset.num_electrodes() as f64;
        let mut new_labels = vec![(UNDEFINED, Polarity::Direct); dataset.num_time_frames()];

        for file in dataset.files() {
            let (lo, hi) = file.range();
            for tf in lo..=hi {
                let mut histo = vec![0usize; nc + 1]; // last slot: UNDEFINED
                let win_lo = tf.saturating_sub(window).max(lo);
                let win_hi = (tf + window).min(hi);
                for n in win_lo..=win_hi {
                    if n == tf {
                        continue;
                    }
                    let l = labeling.label(n);
                    if l == UNDEFINED {
                        histo[nc] += 1;
                    } else {
                        histo[l as usize] += 1;
                    }
                }
                let neighbor_total: usize = histo.iter().sum();

                if labeling.is_undefined(tf) && neighbor_total > 0 && histo[nc] * 2 > neighbor_total {
                    new_labels[tf] = (UNDEFINED, Polarity::Direct);
                    continue;
                }

                let sample = dataset.sample(tf);
                let mut best_k = None;
                let mut best_cost = f64::INFINITY;
                for k in 0..nc {
                    let proj = project(templates.row(k), sample, polarity);
                    if proj < limit_corr {
                        continue;
                    }
                    let norm_sq = dataset.norm(tf).powi(2);
                    let cost = (norm_sq * (1.0 - signed_square(proj)))
                        / (2.0 * sigma2_mu.max(f64::EPSILON) * (e - 1.0).max(1.0))
                        - lambda * histo[k] as f64;
                    if cost < best_cost {
                        best_cost = cost;
                        best_k = Some(k);
                    }
                }

                new_labels[tf] = match best_k {
                    Some(k) => (k as i32, resolve_polarity(templates.row(k), sample, polarity)),
                    None => (UNDEFINED, Polarity::Direct),
                };
            }
        }

        for (tf, (label, pol)) in new_labels.into_iter().enumerate() {
            labeling.set_label_with_polarity(tf, label, pol);
        }

        recompute_all(dataset, labeling, templates, nc, centroid_kind);
        let gev = compute_gev(dataset, templates.view(), labeling, 0, dataset.num_time_frames() - 1);

        let relative = ((gev - prev_gev) / prev_gev.abs().max(f64::EPSILON)).abs();
        debug!(pass, gev, prev_gev, "smoothing pass");

        if relative < GEV_CONVERGENCE || gev < prev_gev || gev.abs() < f64::EPSILON {
            break;
        }
        prev_gev = gev;
    }
}

fn recompute_all(
    dataset: &Dataset,
    labeling: &Labeling,
    templates: &mut Array2<f64>,
    nc: usize,
    kind: CentroidKind,
) {
    for cluster in 0..nc {
        let members: Vec<(usize, Polarity)> = (0..dataset.num_time_frames())
            .filter(|&tf| labeling.label(tf) as usize == cluster)
            .map(|tf| (tf, labeling.polarity(tf)))
            .collect();
        if let Some(c) = centroid(dataset.data().view(), &members, kind) {
            templates.row_mut(cluster).assign(&c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::{array, Array1};

    #[test]
    fn isolated_flip_gets_smoothed_into_its_neighbors() {
        let mut rows = Vec::new();
        for _ in 0..5 {
            rows.push([1.0_f64, 0.0]);
        }
        rows[2] = [0.0, 1.0];
        let data = Array2::from_shape_vec((5, 2), rows.into_iter().flatten().collect()).unwrap();
        let norms = Array1::<f64>::ones(5);
        let files = vec![FileInterval { num_tf: 5, offset_tf: 0 }];
        let dataset = Dataset::new(data, true, 2, 250.0, files, norms).unwrap();

        let mut templates = array![[1.0_f64, 0.0], [0.0, 1.0]];
        let mut labeling = Labeling::new(5);
        for tf in 0..5 {
            labeling.set_label(tf, if tf == 2 { 1 } else { 0 });
        }

        smoothing_labeling(
            &dataset,
            &mut templates,
            &mut labeling,
            1,
            5.0,
            0.0,
            PolarityRequest::Direct,
            CentroidKind::Mean,
        );
        assert_eq!(labeling.label(2), 0);
    }
}
