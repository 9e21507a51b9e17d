//! The core entry point (§6): `segment()` wires a clusterer through the
//! post-processing pipeline, the distance-statistics/criteria bank, and the
//! meta-criterion, for every K in `[K_min, K_max]`, then returns the chosen
//! K's artifacts.

use ndarray::Array2;
use tracing::{info, instrument, warn};

use crate::config::{Method, ProgressReporter, RunPolarity, SegmentationConfig};
use crate::criteria::bank::CriterionInput;
use crate::criteria::Criterion;
use crate::data::Dataset;
use crate::kmeans::{compute_gev, segment_kmeans, KMeansConfig};
use crate::labeling::Labeling;
use crate::map::PolarityRequest;
use crate::meta::compute_meta_criterion;
use crate::postprocess::{
    merge_correlated_templates, reject_low_correlation, reject_short_segments,
    reorder_templates, sequentialize_segments, smoothing_labeling, Ordering,
};
use crate::stats::compute_distance_stats;
use crate::taahc::TaahcState;
use crate::Result;

/// One K's full artifact set, post every enabled pipeline stage.
#[derive(Debug, Clone)]
pub struct SegmentationCandidate {
    pub k: usize,
    pub templates: Array2<f64>,
    pub labeling: Labeling,
    pub gev: f64,
}

/// The overall run's result: every candidate considered and the chosen one.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub candidates: Vec<SegmentationCandidate>,
    pub chosen_k: usize,
}

fn to_polarity_request(p: RunPolarity) -> PolarityRequest {
    match p {
        RunPolarity::Direct => PolarityRequest::Direct,
        RunPolarity::Evaluate => PolarityRequest::Evaluate,
    }
}

fn run_postprocess_pipeline(
    dataset: &Dataset,
    templates: &mut Array2<f64>,
    labeling: &mut Labeling,
    config: &SegmentationConfig,
) {
    let polarity = to_polarity_request(config.polarity);

    if config.limit_corr > 0.0 {
        reject_low_correlation(dataset, templates, labeling, config.limit_corr);
    }

    if config.do_merge {
        merge_correlated_templates(dataset.data(), templates, labeling, config.merge_thresh, config.centroid);
    }

    if config.do_smooth {
        smoothing_labeling(
            dataset,
            templates,
            labeling,
            config.smooth_window,
            config.smooth_lambda,
            config.limit_corr,
            polarity,
            config.centroid,
        );
    }

    if config.do_reject {
        reject_short_segments(dataset, templates, labeling, config.reject_size, config.limit_corr, polarity);
    }

    if config.do_sequentialize {
        sequentialize_segments(dataset, templates, labeling, config.centroid);
    }

    reorder_templates(dataset, templates, labeling, config.ordering, None, None);
}

fn default_rank_criteria() -> &'static [Criterion] {
    use Criterion::*;
    &[
        CalinskiHarabasz,
        CIndex,
        DaviesBouldin,
        Dunn,
        DunnRobust,
        McClain,
        PointBiserial,
        Ratkowski,
        Silhouette,
        TraceW,
        Ccc,
    ]
}

fn default_max_criteria() -> &'static [Criterion] {
    use Criterion::*;
    &[Gamma, GPlus, Tau, Hartigan, KrzanowskiLai, KrzanowskiLaiCartool, CrossValidation, FreyVanGroenewoud]
}

fn build_criterion_input(
    dataset: &Dataset,
    templates: &Array2<f64>,
    labeling: &Labeling,
    k: usize,
    polarity: PolarityRequest,
) -> CriterionInput {
    let stats = compute_distance_stats(dataset, templates, labeling, polarity, true);

    let mut cluster_w_centroid = vec![0.0_f64; k];
    let mut cluster_sizes = vec![0usize; k];
    let mut cluster_sums = vec![0.0_f64; k];
    for tf in 0..dataset.num_time_frames() {
        let l = labeling.label(tf);
        if l == crate::labeling::UNDEFINED {
            continue;
        }
        let l = l as usize;
        let proj = crate::map::project(templates.row(l), dataset.sample(tf), labeling.polarity(tf).into());
        let w = crate::map::proj_to_sq_dist(proj).max(0.0).sqrt();
        cluster_sums[l] += w;
        cluster_sizes[l] += 1;
    }
    for c in 0..k {
        cluster_w_centroid[c] = if cluster_sizes[c] > 0 {
            cluster_sums[c] / cluster_sizes[c] as f64
        } else {
            0.0
        };
    }

    CriterionInput {
        k,
        n_defined: (0..dataset.num_time_frames()).filter(|&tf| labeling.is_defined(tf)).count(),
        r: dataset.num_rows(),
        templates: templates.clone(),
        stats,
        cluster_w_centroid,
        cluster_sizes,
    }
}

/// Run the full segmentation search over `[config.k_min, config.k_max]` and
/// pick the winning K via the meta-criterion, falling back to the GEV-best
/// candidate if fewer than three criteria survive (§7 "no acceptable
/// criterion").
#[instrument(skip(dataset, config, reporter), fields(k_min = config.k_min, k_max = config.k_max))]
pub fn segment(
    dataset: &Dataset,
    config: &SegmentationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<SegmentationResult> {
    let polarity = to_polarity_request(config.polarity);

    let mut taahc_state = if matches!(config.method, Method::TAahc) {
        Some(TaahcState::init(dataset, config.k_max, polarity)?)
    } else {
        None
    };

    let mut candidates = Vec::new();
    let mut inputs = Vec::new();

    for k in config.k_min..=config.k_max {
        reporter.next();

        let (mut templates, mut labeling, _gev) = match config.method {
            Method::KMeans { n_trials } => {
                let kmeans_config = KMeansConfig::builder(k)
                    .n_trials(n_trials)
                    .polarity(polarity)
                    .centroid(config.centroid)
                    .build();
                let result = segment_kmeans(dataset, &kmeans_config)?;
                (result.templates, result.labeling, result.gev)
            }
            Method::TAahc => {
                taahc_state.as_mut().unwrap().descend(dataset, k, polarity, config.centroid)?
            }
        };

        run_postprocess_pipeline(dataset, &mut templates, &mut labeling, config);

        let final_k = labeling.max_label() as usize + 1;
        let gev = compute_gev(dataset, templates.view(), &labeling, 0, dataset.num_time_frames() - 1);

        inputs.push(build_criterion_input(dataset, &templates, &labeling, final_k, polarity));
        candidates.push(SegmentationCandidate { k: final_k, templates, labeling, gev });
    }

    let meta = compute_meta_criterion(&inputs, default_rank_criteria(), default_max_criteria(), config.k_meta_floor);

    let chosen_k = match meta {
        Some(result) => {
            info!(chosen_k = result.chosen_k, "meta-criterion selected K");
            result.chosen_k
        }
        None => {
            warn!("meta-criterion unavailable, falling back to best observed GEV");
            candidates
                .iter()
                .max_by(|a, b| a.gev.partial_cmp(&b.gev).unwrap())
                .map(|c| c.k)
                .unwrap_or(config.k_min)
        }
    };

    Ok(SegmentationResult { candidates, chosen_k })
}
