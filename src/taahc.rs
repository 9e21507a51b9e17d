//! T-AAHC driver (§4.4): atomize-then-agglomerate hierarchical clustering
//! with a checkpoint so repeated descents from the same K_max are cheap.
//!
//! Atomizes every timepoint into its own cluster, merges the most
//! correlated pairs down to `k_max`, then descends by dissolving the
//! least valuable cluster at each step and redistributing its members.

use ndarray::Array2;
use tracing::instrument;

use crate::data::Dataset;
use crate::kmeans::compute_gev;
use crate::labeling::{Labeling, UNDEFINED};
use crate::map::{centroid, project, CentroidKind, Polarity, PolarityRequest};
use crate::{ClusteringError, Result};

const MEMBER_CORR_FLOOR: f64 = 0.5;

/// Reusable state across repeated descents sharing the same `k_max`: the
/// all-pairs merge down to `k_max` clusters runs once and is cached here.
#[derive(Clone)]
pub struct TaahcState {
    k_max: usize,
    templates: Array2<f64>,
    labeling: Labeling,
    saved_templates: Option<Array2<f64>>,
    saved_labeling: Option<Labeling>,
}

impl TaahcState {
    /// Build the atomized starting point (every timepoint its own cluster)
    /// and merge pairwise down to `k_max` clusters.
    #[instrument(skip(dataset), fields(k_max))]
    pub fn init(dataset: &Dataset, k_max: usize, polarity: PolarityRequest) -> Result<Self> {
        let t = dataset.num_time_frames();
        if k_max == 0 || k_max > t {
            return Err(ClusteringError::InvalidK(format!(
                "k_max must be in [1, {t}], got {k_max}"
            )));
        }

        let mut templates = dataset.data().clone();
        let mut labeling = Labeling::new(t);
        for tf in 0..t {
            labeling.set_label(tf, tf as i32);
        }

        let mut nc = t;
        while nc > k_max {
            // All-pairs triangular correlation table; consume the largest
            // remaining entry each round (`SegmentTAAHC_Init`).
            let mut best = (0usize, 0usize, f64::NEG_INFINITY);
            for i in 0..nc {
                for j in (i + 1)..nc {
                    let p = project(templates.row(i), templates.row(j), polarity);
                    if p > best.2 {
                        best = (i, j, p);
                    }
                }
            }
            let (i, j, _) = best;

            // Merge j into i: relabel, shift everything above j down one.
            for l in labeling.labels_mut().iter_mut() {
                if *l as usize == j {
                    *l = i as i32;
                } else if *l as usize > j {
                    *l -= 1;
                }
            }
            for row in j..(nc - 1) {
                let next = templates.row(row + 1).to_owned();
                templates.row_mut(row).assign(&next);
            }

            nc -= 1;
            recompute_one_centroid(dataset, &labeling, &mut templates, i, CentroidKind::Mean)?;
        }

        Ok(Self {
            k_max,
            templates,
            labeling,
            saved_templates: None,
            saved_labeling: None,
        })
    }

    /// Descend from the cached `k_max` state to `n_clusters`, killing the
    /// least-valuable cluster at each step and redistributing its members.
    /// Reuses the checkpoint saved on a previous call when `n_clusters`
    /// requires merging further than the cache point already reached.
    #[instrument(skip(self, dataset), fields(n_clusters))]
    pub fn descend(
        &mut self,
        dataset: &Dataset,
        n_clusters: usize,
        polarity: PolarityRequest,
        centroid_kind: CentroidKind,
    ) -> Result<(Array2<f64>, Labeling, f64)> {
        if n_clusters == 0 || n_clusters > self.k_max {
            return Err(ClusteringError::InvalidK(format!(
                "n_clusters must be in [1, {}], got {n_clusters}",
                self.k_max
            )));
        }

        let (mut templates, mut labeling) = match (&self.saved_templates, &self.saved_labeling) {
            (Some(t), Some(l)) => (t.clone(), l.clone()),
            _ => (self.templates.clone(), self.labeling.clone()),
        };

        let mut nc = labeling.max_label() as usize + 1;
        let mut checkpoint_taken = self.saved_templates.is_some();

        while nc > n_clusters {
            let victim = least_valuable_cluster(dataset, &templates, &labeling, nc, polarity);

            // Redistribute the victim's members to their next-best surviving
            // cluster, subject to a correlation floor; unmatched members
            // fall back to UNDEFINED and are re-picked up by the centroid
            // refit (an empty assignment is legal mid-descent).
            for tf in 0..dataset.num_time_frames() {
                if labeling.label(tf) as usize != victim {
                    continue;
                }
                labeling.reset_at(tf);
                let sample = dataset.sample(tf);
                let mut best_k = None;
                let mut best_proj = MEMBER_CORR_FLOOR;
                for k in 0..nc {
                    if k == victim {
                        continue;
                    }
                    let p = project(templates.row(k), sample, polarity);
                    if p > best_proj {
                        best_proj = p;
                        best_k = Some(k);
                    }
                }
                if let Some(k) = best_k {
                    let pol = crate::map::resolve_polarity(templates.row(k), sample, polarity);
                    labeling.set_label_with_polarity(tf, k as i32, pol);
                }
            }

            // Shift every cluster above `victim` down by one.
            for l in labeling.labels_mut().iter_mut() {
                if *l != UNDEFINED && *l as usize > victim {
                    *l -= 1;
                }
            }
            for row in victim..(nc - 1) {
                let next = templates.row(row + 1).to_owned();
                templates.row_mut(row).assign(&next);
            }
            nc -= 1;

            recompute_all_centroids(dataset, &labeling, &mut templates, nc, centroid_kind)?;

            if !checkpoint_taken && nc <= self.k_max {
                self.saved_templates = Some(templates.clone());
                self.saved_labeling = Some(labeling.clone());
                checkpoint_taken = true;
            }
        }

        recompute_all_centroids(dataset, &labeling, &mut templates, nc, centroid_kind)?;
        let packed = labeling.pack(&mut templates);
        debug_assert_eq!(packed, n_clusters);

        let gev = compute_gev(dataset, templates.view(), &labeling, 0, dataset.num_time_frames() - 1);
        Ok((templates, labeling, gev))
    }
}

/// The cluster whose members contribute the least total correlation to
/// their own template -- the next one to be dissolved.
fn least_valuable_cluster(
    dataset: &Dataset,
    templates: &Array2<f64>,
    labeling: &Labeling,
    nc: usize,
    polarity: PolarityRequest,
) -> usize {
    let mut sums = vec![0.0_f64; nc];
    for tf in 0..dataset.num_time_frames() {
        let l = labeling.label(tf);
        if l == UNDEFINED {
            continue;
        }
        let k = l as usize;
        sums[k] += project(templates.row(k), dataset.sample(tf), polarity);
    }
    sums.iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(k, _)| k)
        .unwrap_or(0)
}

fn recompute_one_centroid(
    dataset: &Dataset,
    labeling: &Labeling,
    templates: &mut Array2<f64>,
    cluster: usize,
    kind: CentroidKind,
) -> Result<()> {
    let members: Vec<(usize, Polarity)> = (0..dataset.num_time_frames())
        .filter(|&tf| labeling.label(tf) as usize == cluster)
        .map(|tf| (tf, labeling.polarity(tf)))
        .collect();
    let c = centroid(dataset.data().view(), &members, kind).ok_or(ClusteringError::EmptyCluster {
        trial: 0,
        cluster,
    })?;
    templates.row_mut(cluster).assign(&c);
    Ok(())
}

fn recompute_all_centroids(
    dataset: &Dataset,
    labeling: &Labeling,
    templates: &mut Array2<f64>,
    nc: usize,
    kind: CentroidKind,
) -> Result<()> {
    for cluster in 0..nc {
        let members: Vec<(usize, Polarity)> = (0..dataset.num_time_frames())
            .filter(|&tf| labeling.label(tf) as usize == cluster)
            .map(|tf| (tf, labeling.polarity(tf)))
            .collect();
        if let Some(c) = centroid(dataset.data().view(), &members, kind) {
            templates.row_mut(cluster).assign(&c);
        }
        // An empty cluster mid-descent is transient; it will be dissolved
        // by the next `least_valuable_cluster` pick since its row stays
        // whatever it was (never selected as a target for redistribution).
    }
    Ok(())
}

/// `SegmentTAAHC`: full driver producing one `(templates, labeling, gev)`
/// result for `n_clusters`, caching the atomize/merge init for the caller's
/// convenience.
pub fn segment_taahc(
    dataset: &Dataset,
    n_clusters: usize,
    k_max: usize,
    polarity: PolarityRequest,
    centroid_kind: CentroidKind,
) -> Result<(Array2<f64>, Labeling, f64)> {
    let mut state = TaahcState::init(dataset, k_max, polarity)?;
    state.descend(dataset, n_clusters, polarity, centroid_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::{array, Array1, Array2};

    fn four_point_dataset() -> Dataset {
        let data = array![
            [1.0_f64, 0.0],
            [0.95, 0.05_f64.sqrt() * 0.05_f64.sqrt()],
            [0.0, 1.0],
            [0.05, 0.95],
        ];
        let mut normed = Array2::<f64>::zeros((4, 2));
        for i in 0..4 {
            let row = data.row(i);
            let norm = row.dot(&row).sqrt();
            normed.row_mut(i).assign(&(row.to_owned() / norm));
        }
        let norms = Array1::<f64>::ones(4);
        let files = vec![FileInterval { num_tf: 4, offset_tf: 0 }];
        Dataset::new(normed, true, 2, 250.0, files, norms).unwrap()
    }

    #[test]
    fn descends_to_two_clusters() {
        let dataset = four_point_dataset();
        let (templates, labeling, gev) =
            segment_taahc(&dataset, 2, 4, PolarityRequest::Direct, CentroidKind::Mean).unwrap();
        assert_eq!(templates.nrows(), 2);
        assert_eq!(labeling.max_label(), 1);
        assert!(gev > 0.0);
    }
}
