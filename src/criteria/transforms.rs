//! Rank and derivative transforms applied to a criterion's raw curve before
//! it feeds the meta-criterion (§4.6 "Transforms", §4.7 step 2).

/// Dense rank transform: the highest value gets `1/N_ranks`, the lowest
/// gets `1`; ties collapse to the same rank. `None` entries pass through
/// unranked.
pub fn rank_transform(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut defined: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    defined.sort_by(|a, b| b.partial_cmp(a).unwrap()); // descending
    defined.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    let n_ranks = defined.len();
    if n_ranks == 0 {
        return vec![None; values.len()];
    }

    let rank_of = |v: f64| -> usize {
        defined
            .iter()
            .position(|&d| (d - v).abs() < 1e-12)
            .unwrap_or(n_ranks - 1)
            + 1
    };

    values
        .iter()
        .map(|v| v.map(|x| rank_of(x) as f64 / n_ranks as f64))
        .collect()
}

/// Central-difference second derivative with zero padding at both ends.
pub fn second_derivative(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    for i in 0..n {
        let prev = if i == 0 { Some(0.0) } else { values[i - 1] };
        let next = if i + 1 == n { Some(0.0) } else { values[i + 1] };
        let cur = values[i];
        if let (Some(p), Some(c), Some(nx)) = (prev, cur, next) {
            out[i] = Some(p - 2.0 * c + nx);
        }
    }
    out
}
