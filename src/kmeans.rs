//! K-means driver (§4.3).
//!
//! Multi-start Lloyd's algorithm with random-map seeding, a GEV
//! convergence check, and best-of-N_trials selection.

use ndarray::{Array1, Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::data::Dataset;
use crate::labeling::{Labeling, UNDEFINED};
use crate::map::{centroid, project, resolve_polarity, CentroidKind, Polarity, PolarityRequest};
use crate::{ClusteringError, Result};

const KMEANS_MAX_ITER: usize = 100;
const LABELING_CONVERGENCE: f64 = 1e-6;

/// Builder for [`KMeansConfig`].
pub struct KMeansConfigBuilder {
    n_clusters: usize,
    n_trials: usize,
    polarity: PolarityRequest,
    centroid: CentroidKind,
    parallel: bool,
    random_seed: Option<u64>,
}

impl KMeansConfigBuilder {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            n_trials: 20,
            polarity: PolarityRequest::Direct,
            centroid: CentroidKind::Mean,
            parallel: true,
            random_seed: None,
        }
    }

    pub fn n_trials(mut self, n: usize) -> Self {
        self.n_trials = n.max(1);
        self
    }

    pub fn polarity(mut self, polarity: PolarityRequest) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn centroid(mut self, centroid: CentroidKind) -> Self {
        self.centroid = centroid;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn build(self) -> KMeansConfig {
        KMeansConfig {
            n_clusters: self.n_clusters,
            n_trials: self.n_trials,
            polarity: self.polarity,
            centroid: self.centroid,
            parallel: self.parallel,
            random_seed: self.random_seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub n_trials: usize,
    pub polarity: PolarityRequest,
    pub centroid: CentroidKind,
    pub parallel: bool,
    pub random_seed: Option<u64>,
}

impl KMeansConfig {
    pub fn builder(n_clusters: usize) -> KMeansConfigBuilder {
        KMeansConfigBuilder::new(n_clusters)
    }
}

/// Outcome of the winning trial.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub templates: Array2<f64>,
    pub labeling: Labeling,
    pub gev: f64,
    /// Final cluster count after `pack` (<= `n_clusters` requested).
    pub k: usize,
}

/// Pick `n_clusters` distinct random timepoints as the initial templates
/// (`GetRandomMaps`).
fn random_maps(
    dataset: &Dataset,
    n_clusters: usize,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let t = dataset.num_time_frames();
    let mut picked = Vec::with_capacity(n_clusters);
    while picked.len() < n_clusters {
        let candidate = rng.gen_range(0..t);
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }

    let mut maps = Array2::<f64>::zeros((n_clusters, dataset.num_rows()));
    for (k, &tf) in picked.iter().enumerate() {
        maps.row_mut(k).assign(&dataset.sample(tf));
    }
    maps
}

/// Assign every timepoint to its best-projecting template
/// (`CentroidsToLabeling` with no correlation threshold).
fn assign_labels(
    dataset: &Dataset,
    templates: ArrayView2<f64>,
    polarity: PolarityRequest,
    parallel: bool,
) -> Labeling {
    let t = dataset.num_time_frames();
    let k = templates.nrows();

    let assign_one = |tf: usize| -> (i32, Polarity) {
        let sample = dataset.sample(tf);
        let mut best_k = 0usize;
        let mut best_proj = f64::NEG_INFINITY;
        for kk in 0..k {
            let p = project(templates.row(kk), sample, polarity);
            if p > best_proj {
                best_proj = p;
                best_k = kk;
            }
        }
        let pol = resolve_polarity(templates.row(best_k), sample, polarity);
        (best_k as i32, pol)
    };

    let results: Vec<(i32, Polarity)> = if parallel {
        (0..t).into_par_iter().map(assign_one).collect()
    } else {
        (0..t).map(assign_one).collect()
    };

    let mut labeling = Labeling::new(t);
    for (tf, (label, pol)) in results.into_iter().enumerate() {
        labeling.set_label_with_polarity(tf, label, pol);
    }
    labeling
}

/// Recompute every cluster's template from the current labeling
/// (`LabelingToCentroids`). Returns `None` if any cluster is empty (the
/// caller treats that as a failed trial, §7).
fn update_centroids(
    dataset: &Dataset,
    labeling: &Labeling,
    n_clusters: usize,
    kind: CentroidKind,
) -> Option<Array2<f64>> {
    let mut members: Vec<Vec<(usize, Polarity)>> = vec![Vec::new(); n_clusters];
    for tf in 0..dataset.num_time_frames() {
        let l = labeling.label(tf);
        if l != UNDEFINED {
            members[l as usize].push((tf, labeling.polarity(tf)));
        }
    }

    let mut templates = Array2::<f64>::zeros((n_clusters, dataset.num_rows()));
    for (k, members_k) in members.iter().enumerate() {
        let c = centroid(dataset.data().view(), members_k, kind)?;
        templates.row_mut(k).assign(&c);
    }
    Some(templates)
}

/// Global explained variance over `[tfmin, tfmax]`:
/// `1 - sigma^2_mu / sum ||D[t]||^2`.
pub fn compute_gev(
    dataset: &Dataset,
    templates: ArrayView2<f64>,
    labeling: &Labeling,
    tfmin: usize,
    tfmax: usize,
) -> f64 {
    let mut sigma2 = 0.0;
    let mut total = 0.0;
    for tf in tfmin..=tfmax {
        let norm_sq = dataset.norm(tf).powi(2);
        total += norm_sq;
        if labeling.is_defined(tf) {
            let proj = project(
                templates.row(labeling.label(tf) as usize),
                dataset.sample(tf),
                labeling.polarity(tf).into(),
            );
            sigma2 += norm_sq * (1.0 - proj * proj);
        }
    }
    if total <= f64::EPSILON {
        return 1.0;
    }
    1.0 - sigma2 / total
}

/// A single K-means trial. Returns `Err(EmptyCluster)` if any cluster
/// collapses to zero members at any point.
fn segment_kmeans_once(
    dataset: &Dataset,
    config: &KMeansConfig,
    trial: usize,
    rng: &mut impl Rng,
) -> Result<(Array2<f64>, Labeling, f64)> {
    let n_clusters = config.n_clusters;
    let tfmin = 0;
    let tfmax = dataset.num_time_frames() - 1;

    let mut templates = random_maps(dataset, n_clusters, rng);
    let mut labeling = assign_labels(dataset, templates.view(), config.polarity, config.parallel);

    let mut gev = 0.0;
    for _ in 0..KMEANS_MAX_ITER {
        // Labels -> Maps. Always plain Mean inside the loop for speed, per spec.
        templates = update_centroids(dataset, &labeling, n_clusters, CentroidKind::Mean)
            .ok_or(ClusteringError::EmptyCluster { trial, cluster: 0 })?;

        // Maps -> Labels.
        labeling = assign_labels(dataset, templates.view(), config.polarity, config.parallel);

        let gev_before = gev;
        gev = compute_gev(dataset, templates.view(), &labeling, tfmin, tfmax);

        let relative_diff = if gev_before.abs() > f64::EPSILON {
            ((gev - gev_before) / gev_before).abs()
        } else {
            gev.abs()
        };

        if relative_diff < LABELING_CONVERGENCE || gev < gev_before {
            break;
        }
    }

    if config.centroid != CentroidKind::Mean {
        templates = update_centroids(dataset, &labeling, n_clusters, config.centroid)
            .ok_or(ClusteringError::EmptyCluster { trial, cluster: 0 })?;
        labeling = assign_labels(dataset, templates.view(), config.polarity, config.parallel);
        gev = compute_gev(dataset, templates.view(), &labeling, tfmin, tfmax);
    }

    Ok((templates, labeling, gev))
}

/// `SegmentKMeans`: best-of-`n_trials` multi-start K-means, packed.
#[instrument(skip(dataset, config), fields(k = config.n_clusters, n_trials = config.n_trials))]
pub fn segment_kmeans(dataset: &Dataset, config: &KMeansConfig) -> Result<KMeansResult> {
    let mut rng = match config.random_seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    };

    let mut best_gev = f64::NEG_INFINITY;
    let mut best: Option<(Array2<f64>, Labeling)> = None;

    let retry_ceiling = 10 * config.n_trials;
    let mut attempts = 0usize;
    let mut trial = 0usize;

    while trial < config.n_trials {
        // K=1 has one deterministic solution; only the first trial does work.
        if config.n_clusters == 1 && trial >= 1 {
            trial += 1;
            continue;
        }

        if attempts >= retry_ceiling {
            warn!(attempts, "kmeans retry ceiling reached, giving up on remaining trials");
            break;
        }
        attempts += 1;

        match segment_kmeans_once(dataset, config, trial, &mut rng) {
            Ok((templates, labeling, gev)) => {
                debug!(trial, gev, "kmeans trial converged");
                if gev > best_gev {
                    best_gev = gev;
                    best = Some((templates, labeling));
                }
                trial += 1;
            }
            Err(_) => {
                // Empty cluster: retry this trial in place without
                // consuming the trial counter, per §7/§10.2.
                continue;
            }
        }
    }

    let (mut templates, mut labeling) = best.ok_or(ClusteringError::EmptyCluster {
        trial: config.n_trials,
        cluster: 0,
    })?;

    let k = labeling.pack(&mut templates);

    Ok(KMeansResult {
        templates,
        labeling,
        gev: best_gev,
        k,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::Array1;

    fn two_blob_dataset() -> Dataset {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let r = 8;
        let t = 200;
        let mut u = Array1::<f64>::zeros(r);
        u[0] = 1.0;
        let mut v = Array1::<f64>::zeros(r);
        v[1] = 1.0;

        let mut data = Array2::<f64>::zeros((t, r));
        for i in 0..t {
            let base = if i < t / 2 { &u } else { &v };
            let mut row = base.clone();
            for x in row.iter_mut() {
                *x += rng.gen_range(-0.02..0.02);
            }
            let norm = row.dot(&row).sqrt();
            row.mapv_inplace(|x| x / norm);
            data.row_mut(i).assign(&row);
        }

        let norms = Array1::<f64>::ones(t);
        let files = vec![FileInterval { num_tf: t, offset_tf: 0 }];
        Dataset::new(data, true, r, 250.0, files, norms).unwrap()
    }

    #[test]
    fn finds_two_well_separated_clusters() {
        let dataset = two_blob_dataset();
        let config = KMeansConfig::builder(2).n_trials(5).random_seed(7).build();
        let result = segment_kmeans(&dataset, &config).unwrap();
        assert_eq!(result.k, 2);
        assert!(result.gev > 0.9);
    }

    #[test]
    fn k_equal_to_samples_gives_full_gev() {
        let dataset = two_blob_dataset();
        let config = KMeansConfig::builder(dataset.num_time_frames())
            .n_trials(1)
            .random_seed(1)
            .build();
        let result = segment_kmeans(&dataset, &config).unwrap();
        assert!((result.gev - 1.0).abs() < 1e-6);
    }
}
