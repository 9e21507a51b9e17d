//! Merge correlated templates (§4.8).
//!
//! Repeatedly merges the most-correlated pair until the best remaining
//! projection drops below `threshold` or only one cluster is left.

use ndarray::Array2;

use crate::labeling::{Labeling, UNDEFINED};
use crate::map::{centroid, is_opposite, project, CentroidKind, Polarity, PolarityRequest};

/// Merge templates whose absolute correlation exceeds `threshold`, in place.
/// Returns the packed cluster count.
pub fn merge_correlated_templates(
    data: &Array2<f64>,
    templates: &mut Array2<f64>,
    labeling: &mut Labeling,
    threshold: f64,
    centroid_kind: CentroidKind,
) -> usize {
    loop {
        let nc = labeling.max_label() as i64 + 1;
        if nc <= 1 {
            break;
        }
        let nc = nc as usize;

        let mut best = (0usize, 0usize, f64::NEG_INFINITY);
        for i in 0..nc {
            for j in (i + 1)..nc {
                let p = project(templates.row(i), templates.row(j), PolarityRequest::Evaluate);
                if p > best.2 {
                    best = (i, j, p);
                }
            }
        }
        let (i, j, proj) = best;
        if proj < threshold {
            break;
        }

        // Approximate merged template from a cumulated, renormalized sum.
        let sign = if is_opposite(templates.row(i), templates.row(j)) { -1.0 } else { 1.0 };
        let mut merged = templates.row(i).to_owned();
        merged.scaled_add(sign, &templates.row(j));
        crate::map::normalize(&mut merged);

        for tf in 0..labeling.len() {
            let l = labeling.label(tf);
            if l == UNDEFINED {
                continue;
            }
            let l = l as usize;
            if l == i || l == j {
                let pol = if is_opposite(merged.view(), data.row(tf)) {
                    Polarity::Invert
                } else {
                    Polarity::Direct
                };
                labeling.set_label_with_polarity(tf, i as i32, pol);
            } else if l > j {
                labeling.set_label(tf, l as i32 - 1);
            }
        }

        for row in j..(nc - 1) {
            let next = templates.row(row + 1).to_owned();
            templates.row_mut(row).assign(&next);
        }
        templates.row_mut(i).assign(&merged);

        recompute_all(data, labeling, templates, nc - 1, centroid_kind);
    }

    labeling.pack(templates)
}

fn recompute_all(
    data: &Array2<f64>,
    labeling: &Labeling,
    templates: &mut Array2<f64>,
    nc: usize,
    kind: CentroidKind,
) {
    for cluster in 0..nc {
        let members: Vec<(usize, Polarity)> = (0..labeling.len())
            .filter(|&tf| labeling.label(tf) as usize == cluster)
            .map(|tf| (tf, labeling.polarity(tf)))
            .collect();
        if let Some(c) = centroid(data.view(), &members, kind) {
            templates.row_mut(cluster).assign(&c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn merges_near_identical_templates() {
        let data = array![[1.0_f64, 0.0], [0.99, (1.0 - 0.99_f64.powi(2)).sqrt()], [0.0, 1.0]];
        let mut templates = array![[1.0_f64, 0.0], [0.99, (1.0 - 0.99_f64.powi(2)).sqrt()], [0.0, 1.0]];
        let mut labeling = Labeling::new(3);
        labeling.set_label(0, 0);
        labeling.set_label(1, 1);
        labeling.set_label(2, 2);

        let k = merge_correlated_templates(&data, &mut templates, &mut labeling, 0.9, CentroidKind::Mean);
        assert_eq!(k, 2);
        assert_eq!(labeling.label(0), labeling.label(1));
    }
}
