//! The validity criteria themselves (§4.6). Each criterion consumes the
//! per-K [`CriterionInput`] series and returns a curve over `[K_min, K_max]`
//! aligned to that series (`None` where the criterion is undefined at that
//! K, e.g. at a range boundary for criteria comparing adjacent K's).
//!
//! Every criterion is transformed so "higher is better": sign-flipped
//! when its natural optimum is a minimum, and/or expressed as a
//! difference rather than a ratio to avoid near-zero denominators.
//! Marriott's criterion is intentionally absent from this bank.

use ndarray::Array2;

use crate::map::project;
use crate::map::PolarityRequest;
use crate::stats::DistanceStats;

/// Everything a criterion needs at one value of K.
#[derive(Debug, Clone)]
pub struct CriterionInput {
    pub k: usize,
    pub n_defined: usize,
    pub r: usize,
    pub templates: Array2<f64>,
    pub stats: DistanceStats,
    pub cluster_w_centroid: Vec<f64>,
    pub cluster_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    CalinskiHarabasz,
    CIndex,
    CrossValidation,
    DaviesBouldin,
    Dunn,
    DunnRobust,
    FreyVanGroenewoud,
    Gamma,
    GPlus,
    Tau,
    Hartigan,
    KrzanowskiLai,
    KrzanowskiLaiCartool,
    McClain,
    PointBiserial,
    Ratkowski,
    Silhouette,
    TraceW,
    Ccc,
}

pub fn criterion_names() -> &'static [Criterion] {
    use Criterion::*;
    &[
        CalinskiHarabasz,
        CIndex,
        CrossValidation,
        DaviesBouldin,
        Dunn,
        DunnRobust,
        FreyVanGroenewoud,
        Gamma,
        GPlus,
        Tau,
        Hartigan,
        KrzanowskiLai,
        KrzanowskiLaiCartool,
        McClain,
        PointBiserial,
        Ratkowski,
        Silhouette,
        TraceW,
        Ccc,
    ]
}

const TINY: f64 = 1e-12;
const MIN_LOG_VALUE: f64 = 1e-12;

fn safe_div(num: f64, den: f64) -> f64 {
    num / den.abs().max(TINY).copysign(if den == 0.0 { 1.0 } else { den })
}

fn truncated_mean(values: &[f64], tail: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let cut = ((sorted.len() as f64) * tail).floor() as usize;
    let slice = &sorted[cut..(sorted.len() - cut).max(cut + 1).min(sorted.len())];
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Evaluate one criterion across the whole K series.
pub fn evaluate_criterion(criterion: Criterion, inputs: &[CriterionInput]) -> Vec<Option<f64>> {
    use Criterion::*;
    match criterion {
        CalinskiHarabasz => inputs
            .iter()
            .map(|inp| {
                let k = inp.k as f64;
                let n = inp.n_defined as f64;
                let sum_w: f64 = inp.stats.w_centroid_sq.iter().sum();
                if k <= 1.0 || sum_w <= TINY {
                    None
                } else {
                    Some((n * (n - k)) / (sum_w * (k - 1.0)))
                }
            })
            .collect(),

        CIndex => inputs
            .iter()
            .map(|inp| {
                if inp.stats.a_pooled.is_empty() {
                    return None;
                }
                let mean_w = inp.stats.median_w_pooled();
                let mut all: Vec<f64> = inp.stats.a_pooled.iter().map(|p| p.sq_dist.sqrt()).collect();
                all.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let n_w = inp.stats.w_pooled.len().min(all.len());
                if n_w == 0 {
                    return None;
                }
                let dmin: f64 = all[..n_w].iter().sum::<f64>() / n_w as f64;
                let dmax: f64 = all[all.len() - n_w..].iter().sum::<f64>() / n_w as f64;
                if (dmax - dmin).abs() < TINY {
                    None
                } else {
                    Some(-(mean_w - dmin) / (dmax - dmin))
                }
            })
            .collect(),

        CrossValidation => inputs
            .iter()
            .map(|inp| {
                let e = inp.r as f64;
                let k = inp.k as f64;
                let denom = e - 1.0 - k;
                if denom <= 0.0 {
                    return None;
                }
                let sigma2: f64 = inp.stats.w_centroid_sq.iter().sum::<f64>()
                    / inp.n_defined.max(1) as f64;
                Some(1.0 - sigma2 * ((e - 1.0) / denom).powi(2))
            })
            .collect(),

        DaviesBouldin => inputs
            .iter()
            .map(|inp| {
                let k = inp.cluster_w_centroid.len();
                if k < 2 {
                    return None;
                }
                let mut total = 0.0;
                for c in 0..k {
                    let mut worst = f64::NEG_INFINITY;
                    for cp in 0..k {
                        if cp == c {
                            continue;
                        }
                        let proj = project(inp.templates.row(c), inp.templates.row(cp), PolarityRequest::Evaluate);
                        let dist = crate::map::proj_to_sq_dist(proj).max(0.0).sqrt();
                        let ratio = safe_div(
                            inp.cluster_w_centroid[c] + inp.cluster_w_centroid[cp],
                            dist,
                        );
                        if ratio > worst {
                            worst = ratio;
                        }
                    }
                    total += worst;
                }
                Some(-(total / k as f64))
            })
            .collect(),

        Dunn => inputs
            .iter()
            .map(|inp| {
                if inp.stats.b_pooled.is_empty() || inp.stats.w_pooled.is_empty() {
                    return None;
                }
                let min_b = inp.stats.b_pooled.iter().map(|p| p.sq_dist.sqrt()).fold(f64::INFINITY, f64::min);
                let max_w = inp.stats.w_pooled.iter().map(|p| p.sq_dist.sqrt()).fold(f64::NEG_INFINITY, f64::max);
                Some(min_b - max_w)
            })
            .collect(),

        DunnRobust => inputs
            .iter()
            .map(|inp| {
                if inp.stats.b_pooled.is_empty() || inp.stats.w_pooled.is_empty() {
                    return None;
                }
                let b: Vec<f64> = inp.stats.b_pooled.iter().map(|p| p.sq_dist.sqrt()).collect();
                let w: Vec<f64> = inp.stats.w_pooled.iter().map(|p| p.sq_dist.sqrt()).collect();
                Some(truncated_mean(&b, 0.05) - truncated_mean(&w, 0.05))
            })
            .collect(),

        FreyVanGroenewoud => (0..inputs.len())
            .map(|i| {
                if i == 0 || i + 1 >= inputs.len() {
                    return None;
                }
                let w_prev: f64 = inputs[i - 1].stats.w_centroid_sq.iter().sum();
                let w_cur: f64 = inputs[i].stats.w_centroid_sq.iter().sum();
                let w_next: f64 = inputs[i + 1].stats.w_centroid_sq.iter().sum();
                let delta_w = w_prev - w_cur;
                let delta_b = w_cur - w_next;
                if delta_b.abs() < TINY {
                    return None;
                }
                let ratio = delta_w / delta_b;
                Some(if ratio > 1.0 { 0.0 } else { ratio })
            })
            .collect(),

        Gamma | GPlus | Tau => inputs
            .iter()
            .map(|inp| concordance_family(criterion, inp))
            .collect(),

        Hartigan => (0..inputs.len())
            .map(|i| {
                if i + 1 >= inputs.len() {
                    return None;
                }
                let w_k: f64 = inputs[i].stats.w_centroid_sq.iter().sum();
                let w_k1: f64 = inputs[i + 1].stats.w_centroid_sq.iter().sum();
                if w_k1.abs() < TINY {
                    return None;
                }
                let n = inputs[i].n_defined as f64;
                let k = inputs[i].k as f64;
                Some(((w_k - w_k1) / w_k1) * (n - k + 1.0))
            })
            .collect(),

        KrzanowskiLai => (0..inputs.len())
            .map(|i| {
                if i == 0 || i + 1 >= inputs.len() {
                    return None;
                }
                let r = inputs[i].r as f64;
                let diff = |idx: usize| -> f64 {
                    let w: f64 = inputs[idx].stats.w_centroid_sq.iter().sum();
                    w * (inputs[idx].k as f64).powf(2.0 / r)
                };
                let d1 = diff(i - 1) - diff(i);
                let d2 = diff(i) - diff(i + 1);
                if d2.abs() < TINY {
                    None
                } else {
                    Some(d1 / d2)
                }
            })
            .collect(),

        KrzanowskiLaiCartool => (0..inputs.len())
            .map(|i| {
                if i == 0 || i + 1 >= inputs.len() {
                    return None;
                }
                let w = |idx: usize| -> f64 { inputs[idx].stats.w_centroid_sq.iter().sum() };
                let (w1, w2, w3) = (w(i - 1), w(i), w(i + 1));
                let norm = w1.max(w2).max(w3).max(TINY);
                let d1 = (w1 - w2) / norm;
                let d2 = (w2 - w3) / norm;
                if d2.abs() < TINY {
                    None
                } else {
                    Some(d1 / d2)
                }
            })
            .collect(),

        McClain => inputs
            .iter()
            .map(|inp| {
                if inp.stats.w_pooled.is_empty() && inp.stats.b_pooled.is_empty() {
                    return None;
                }
                Some(inp.stats.median_w_pooled() - inp.stats.median_b_pooled())
            })
            .collect(),

        PointBiserial => inputs.iter().map(point_biserial).collect(),

        Ratkowski => inputs
            .iter()
            .map(|inp| {
                if inp.cluster_w_centroid.is_empty() {
                    return None;
                }
                let ratios: Vec<f64> = inp
                    .stats
                    .b_centroid_sq
                    .iter()
                    .zip(inp.stats.w_centroid_sq.iter())
                    .map(|(&b, &w)| safe_div(b, w).max(0.0).sqrt())
                    .collect();
                if ratios.is_empty() {
                    None
                } else {
                    Some(DistanceStats::median(&ratios))
                }
            })
            .collect(),

        Silhouette => inputs
            .iter()
            .map(|inp| {
                if inp.stats.w_centroid.is_empty() {
                    return None;
                }
                let values: Vec<f64> = inp
                    .stats
                    .w_centroid
                    .iter()
                    .zip(inp.stats.b_centroid_sq.iter().map(|b| b.max(0.0).sqrt()))
                    .map(|(&a, b)| {
                        let m = a.max(b);
                        if m < TINY {
                            0.0
                        } else {
                            (b - a) / m
                        }
                    })
                    .collect();
                Some(values.iter().sum::<f64>() / values.len() as f64)
            })
            .collect(),

        TraceW => inputs
            .iter()
            .map(|inp| Some(-inp.stats.w_centroid.iter().sum::<f64>()))
            .collect(),

        Ccc => inputs.iter().map(ccc).collect(),
    }
}

/// Gamma / G+ / Tau share the concordant/discordant W-B pair count, built
/// from a fixed 200-bin histogram over `[0, 2]` (squared-distance range for
/// unit maps) so the `O(n^2)` pair comparison is avoided.
fn concordance_family(criterion: Criterion, inp: &CriterionInput) -> Option<f64> {
    const BINS: usize = 200;
    const RANGE: f64 = 2.0;

    if inp.stats.w_pooled.is_empty() || inp.stats.b_pooled.is_empty() {
        return None;
    }

    let bin_of = |d: f64| -> usize {
        ((d / RANGE) * BINS as f64).floor().clamp(0.0, (BINS - 1) as f64) as usize
    };

    let mut w_hist = vec![0u64; BINS];
    for p in &inp.stats.w_pooled {
        w_hist[bin_of(p.sq_dist)] += 1;
    }
    let mut b_hist = vec![0u64; BINS];
    for p in &inp.stats.b_pooled {
        b_hist[bin_of(p.sq_dist)] += 1;
    }

    // cumulative counts of B-pairs with distance > bin, and < bin, via CDF
    let total_b: u64 = b_hist.iter().sum();
    let mut b_cdf = vec![0u64; BINS + 1];
    for i in 0..BINS {
        b_cdf[i + 1] = b_cdf[i] + b_hist[i];
    }

    let mut concordant = 0u64;
    let mut discordant = 0u64;
    for (bin, &count) in w_hist.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let less_b = b_cdf[bin]; // B-pairs with smaller distance than this W bin: discordant (W should be smaller)
        let greater_b = total_b - b_cdf[bin + 1];
        concordant += count * greater_b;
        discordant += count * less_b;
    }

    let total_pairs = (concordant + discordant) as f64;
    if total_pairs < TINY {
        return None;
    }

    match criterion {
        Criterion::Gamma => Some((concordant as f64 - discordant as f64) / total_pairs),
        Criterion::GPlus => {
            let n_w = inp.stats.w_pooled.len() as f64;
            let n_b = inp.stats.b_pooled.len() as f64;
            let total = n_w * n_b;
            if total < TINY {
                None
            } else {
                Some(-(2.0 * discordant as f64) / total)
            }
        }
        Criterion::Tau => {
            let n_w = inp.stats.w_pooled.len() as f64;
            let n_b = inp.stats.b_pooled.len() as f64;
            let denom = (n_w * n_b).sqrt() * total_pairs.sqrt() / (n_w + n_b).max(TINY).sqrt();
            if denom < TINY {
                None
            } else {
                Some((concordant as f64 - discordant as f64) / denom)
            }
        }
        _ => None,
    }
}

/// Pearson correlation between pairwise distance and a same/different
/// cluster binary indicator, flattened over the sampled pair set.
fn point_biserial(inp: &CriterionInput) -> Option<f64> {
    let n_w = inp.stats.w_pooled.len();
    let n_b = inp.stats.b_pooled.len();
    let n = n_w + n_b;
    if n < 2 {
        return None;
    }

    let distances: Vec<f64> = inp
        .stats
        .w_pooled
        .iter()
        .chain(inp.stats.b_pooled.iter())
        .map(|p| p.sq_dist.sqrt())
        .collect();
    let indicator: Vec<f64> = std::iter::repeat(0.0)
        .take(n_w)
        .chain(std::iter::repeat(1.0).take(n_b))
        .collect();

    let mean_d = distances.iter().sum::<f64>() / n as f64;
    let mean_i = indicator.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_d = 0.0;
    let mut var_i = 0.0;
    for (d, i) in distances.iter().zip(indicator.iter()) {
        cov += (d - mean_d) * (i - mean_i);
        var_d += (d - mean_d).powi(2);
        var_i += (i - mean_i).powi(2);
    }

    let denom = (var_d * var_i).sqrt();
    if denom < TINY {
        None
    } else {
        Some(cov / denom)
    }
}

/// Cubic clustering criterion, carried over bit-for-bit from the formula
/// `scale = sqrt(n * n_star / 2) / (0.001 + ER2)^1.2`,
/// `CCC = log(ER2R2) * scale` when `ER2R2 > MIN_LOG_VALUE`, else `-1`.
fn ccc(inp: &CriterionInput) -> Option<f64> {
    let n = inp.n_defined as f64;
    let k = inp.k as f64;
    if k < 2.0 || n < 2.0 {
        return None;
    }
    let r = inp.r as f64;
    let n_star = r * (k - 1.0) / 2.0;

    let trace_w: f64 = inp.stats.w_centroid_sq.iter().sum();
    let expected_equal_volume = 1.0 - (2.0 / (std::f64::consts::PI * r)).min(0.99);
    let er2 = (trace_w / n.max(1.0)).max(TINY).powf(expected_equal_volume);
    let er2r2 = (1.0 - er2).max(0.0);

    let scale = (n * n_star / 2.0).max(0.0).sqrt() / (0.001 + er2).powf(1.2);
    if er2r2 > MIN_LOG_VALUE {
        Some(er2r2.ln() * scale)
    } else {
        Some(-1.0)
    }
}
