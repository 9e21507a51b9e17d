//! End-to-end scenarios run through the public `segment()` entry point:
//! two orthogonal Gaussian blobs, and the same data with half the samples
//! sign-flipped under EVALUATE polarity.

use eeg_microstates::prelude::*;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Box-Muller standard normal sample.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(1e-12..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn normalize_rows(data: &mut Array2<f64>) -> Array1<f64> {
    let t = data.nrows();
    let norms = Array1::from_shape_fn(t, |tf| data.row(tf).dot(&data.row(tf)).sqrt());
    for tf in 0..t {
        let n = norms[tf];
        if n > 0.0 {
            let mut row = data.row_mut(tf);
            row /= n;
        }
    }
    norms
}

/// Two orthogonal unit vectors in R^32, `u` and `v`, plus T=2000 noisy
/// samples drawn half-and-half around them.
fn two_orthogonal_blobs(seed: u64) -> (Array2<f64>, usize) {
    let r = 32;
    let t = 2000;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut u = Array1::<f64>::zeros(r);
    u[0] = 1.0;
    let mut v = Array1::<f64>::zeros(r);
    v[1] = 1.0;

    let mut data = Array2::<f64>::zeros((t, r));
    for tf in 0..t {
        let base = if tf < t / 2 { &u } else { &v };
        for e in 0..r {
            data[[tf, e]] = base[e] + 0.05 * gaussian(&mut rng);
        }
    }

    (data, t)
}

fn build_dataset(data: Array2<f64>) -> Dataset {
    let t = data.nrows();
    let r = data.ncols();
    let mut data = data;
    let norms = normalize_rows(&mut data);
    let files = vec![FileInterval { num_tf: t, offset_tf: 0 }];
    Dataset::new(data, true, r, 250.0, files, norms).unwrap()
}

#[test]
fn two_orthogonal_blobs_recover_k_equals_two() {
    let (data, t) = two_orthogonal_blobs(1);
    let dataset = build_dataset(data);

    let config = SegmentationConfig::builder(1, 5)
        .method(Method::KMeans { n_trials: 20 })
        .polarity(RunPolarity::Direct)
        .build()
        .unwrap();

    let result = segment(&dataset, &config, &NullReporter).unwrap();
    assert_eq!(result.chosen_k, 2);

    let chosen = result
        .candidates
        .iter()
        .find(|c| c.k == 2)
        .expect("K=2 candidate present");

    let first_half_label = chosen.labeling.label(0);
    let second_half_label = chosen.labeling.label(t - 1);
    assert_ne!(first_half_label, second_half_label);

    let mut matches = 0;
    for tf in 0..t {
        let expected = if tf < t / 2 { first_half_label } else { second_half_label };
        if chosen.labeling.label(tf) == expected {
            matches += 1;
        }
    }
    assert!(
        matches as f64 / t as f64 >= 0.98,
        "expected >=98% agreement with the generator, got {}/{}",
        matches,
        t
    );
}

#[test]
fn polarity_flip_is_absorbed_under_evaluate() {
    let (mut data, t) = two_orthogonal_blobs(2);
    for tf in 0..t {
        if tf % 2 == 0 {
            let mut row = data.row_mut(tf);
            row *= -1.0;
        }
    }
    let dataset = build_dataset(data);

    let config = SegmentationConfig::builder(1, 5)
        .method(Method::KMeans { n_trials: 20 })
        .polarity(RunPolarity::Evaluate)
        .build()
        .unwrap();

    let result = segment(&dataset, &config, &NullReporter).unwrap();
    assert_eq!(result.chosen_k, 2);

    let chosen = result.candidates.iter().find(|c| c.k == 2).unwrap();
    let first_half_label = chosen.labeling.label(0);
    let second_half_label = chosen.labeling.label(t - 1);

    let mut matches = 0;
    for tf in 0..t {
        let expected = if tf < t / 2 { first_half_label } else { second_half_label };
        if chosen.labeling.label(tf) == expected {
            matches += 1;
        }
    }
    assert!(
        matches as f64 / t as f64 >= 0.98,
        "expected >=98% agreement with the generator, got {}/{}",
        matches,
        t
    );

    // Whichever sign the winning template converged to, every flipped sample
    // must carry the opposite stored polarity from every unflipped sample
    // within the same cluster -- the flip mask is recoverable even though
    // the absolute Direct/Invert label depends on the template's own sign.
    let even_polarity = chosen.labeling.polarity(0);
    let odd_polarity = chosen.labeling.polarity(1);
    assert_ne!(even_polarity, odd_polarity);
    for tf in 0..t {
        let expected = if tf % 2 == 0 { even_polarity } else { odd_polarity };
        assert_eq!(chosen.labeling.polarity(tf), expected, "mismatch at tf={tf}");
    }
}
