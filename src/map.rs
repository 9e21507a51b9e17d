//! Map algebra primitives (§4.1): projection, opposite-direction test,
//! correlation<->squared-distance conversion, and centroid computation.
//!
//! A small, composable surface: projection, opposite-direction test, and
//! centroid computation compose freely with any polarity convention.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Sign alignment of a sample with its assigned template. Always a stored
/// value, never [`PolarityRequest::Evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Direct,
    Invert,
}

impl Polarity {
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Direct => 1.0,
            Polarity::Invert => -1.0,
        }
    }
}

/// A polarity *request*. `Evaluate` is never stored; every setter on the
/// labeling store rejects it, and only [`resolve_polarity`] resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarityRequest {
    Direct,
    Invert,
    Evaluate,
}

impl From<Polarity> for PolarityRequest {
    fn from(p: Polarity) -> Self {
        match p {
            Polarity::Direct => PolarityRequest::Direct,
            Polarity::Invert => PolarityRequest::Invert,
        }
    }
}

/// How a cluster's representative map is recomputed from its labeled samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentroidKind {
    Mean,
    Median,
}

/// Signed correlation of two unit maps under a polarity request.
///
/// `Direct` is the scalar product, `Invert` its negation, `Evaluate` the
/// absolute value (sign-ignorant).
pub fn project(m1: ArrayView1<f64>, m2: ArrayView1<f64>, pol: PolarityRequest) -> f64 {
    let dot: f64 = m1.iter().zip(m2.iter()).map(|(a, b)| a * b).sum();
    match pol {
        PolarityRequest::Direct => dot,
        PolarityRequest::Invert => -dot,
        PolarityRequest::Evaluate => dot.abs(),
    }
}

/// True iff the two maps point in opposite directions (`m1 . m2 < 0`).
pub fn is_opposite(m1: ArrayView1<f64>, m2: ArrayView1<f64>) -> bool {
    project(m1, m2, PolarityRequest::Direct) < 0.0
}

/// Squared distance between two unit maps derived from their projection:
/// `d^2 = 2 (1 - project)`.
pub fn proj_to_sq_dist(proj: f64) -> f64 {
    2.0 * (1.0 - proj)
}

/// Resolve a polarity request against a template/sample pair into a stored
/// [`Polarity`]. `Evaluate` becomes `Invert` iff the two are opposite
/// directions.
pub fn resolve_polarity(
    template: ArrayView1<f64>,
    sample: ArrayView1<f64>,
    request: PolarityRequest,
) -> Polarity {
    match request {
        PolarityRequest::Invert => Polarity::Invert,
        PolarityRequest::Direct => Polarity::Direct,
        PolarityRequest::Evaluate => {
            if is_opposite(template, sample) {
                Polarity::Invert
            } else {
                Polarity::Direct
            }
        }
    }
}

/// Normalize `v` to unit norm in place. Returns `false` (leaving `v`
/// untouched) if its norm is too close to zero to normalize meaningfully --
/// the caller is expected to treat that as a null/empty centroid (§7).
pub fn normalize(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(v).sqrt();
    if norm > f64::EPSILON {
        v.mapv_inplace(|x| x / norm);
        true
    } else {
        false
    }
}

/// Compute the centroid of a labeled subset of samples.
///
/// `members` is the list of row indices in `data` that belong to the
/// cluster, each paired with its stored polarity (sign convention: `Direct`
/// contributes `+row`, `Invert` contributes `-row`). Returns `None` for an
/// empty cluster or one whose accumulated sum is too close to zero to
/// normalize (a "null" centroid, handled by the caller per §7).
pub fn centroid(
    data: ArrayView2<f64>,
    members: &[(usize, Polarity)],
    kind: CentroidKind,
) -> Option<Array1<f64>> {
    if members.is_empty() {
        return None;
    }

    let r = data.ncols();
    let mut out = match kind {
        CentroidKind::Mean => {
            let mut sum = Array1::<f64>::zeros(r);
            for &(row, pol) in members {
                let sign = pol.sign();
                sum.scaled_add(sign, &data.row(row));
            }
            sum
        }
        CentroidKind::Median => {
            let mut columns = Array1::<f64>::zeros(r);
            let mut buf = Vec::with_capacity(members.len());
            for col in 0..r {
                buf.clear();
                for &(row, pol) in members {
                    buf.push(pol.sign() * data[[row, col]]);
                }
                buf.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let n = buf.len();
                columns[col] = if n % 2 == 1 {
                    buf[n / 2]
                } else {
                    0.5 * (buf[n / 2 - 1] + buf[n / 2])
                };
            }
            columns
        }
    };

    if normalize(&mut out) {
        Some(out)
    } else {
        None
    }
}
