//! Reject short segments (§4.11).
//!
//! Marks every run shorter than `min_length` in a single bitmap pass,
//! then redistributes each contiguous marked chunk via `distribute_chunk`,
//! only after the whole bitmap is complete.

use ndarray::Array2;

use crate::data::Dataset;
use crate::labeling::{Labeling, UNDEFINED};
use crate::map::{project, resolve_polarity, Polarity, PolarityRequest};

/// Redistribute one contiguous to-delete chunk `[a, b]` (inclusive, absolute
/// timepoints) inside file range `[lo, hi]`, given the labels immediately
/// outside the chunk on each side (`None` if the chunk abuts that edge).
fn distribute_chunk(
    dataset: &Dataset,
    templates: &Array2<f64>,
    new_labels: &mut [(i32, Polarity)],
    a: usize,
    b: usize,
    left: Option<i32>,
    right: Option<i32>,
    limit_corr: f64,
    polarity: PolarityRequest,
) {
    let assign = |tf: usize, label: i32, out: &mut [(i32, Polarity)], base: usize| {
        if label == UNDEFINED {
            out[tf - base] = (UNDEFINED, Polarity::Direct);
            return;
        }
        let sample = dataset.sample(tf);
        let proj = project(templates.row(label as usize), sample, polarity);
        if proj >= limit_corr {
            let pol = resolve_polarity(templates.row(label as usize), sample, polarity);
            out[tf - base] = (label, pol);
        } else {
            out[tf - base] = (UNDEFINED, Polarity::Direct);
        }
    };

    let base = a;

    match (left, right) {
        (None, None) => {
            for tf in a..=b {
                assign(tf, UNDEFINED, new_labels, base);
            }
        }
        (Some(l), None) => {
            for tf in a..=b {
                assign(tf, l, new_labels, base);
            }
        }
        (None, Some(r)) => {
            for tf in a..=b {
                assign(tf, r, new_labels, base);
            }
        }
        (Some(l), Some(r)) => {
            let mut lo_cursor = a;
            let mut hi_cursor = b;
            while lo_cursor <= hi_cursor {
                let sample_lo = dataset.sample(lo_cursor);
                let proj_l = project(templates.row(l as usize), sample_lo, polarity);
                let proj_r = project(templates.row(r as usize), sample_lo, polarity);
                if proj_l >= proj_r {
                    assign(lo_cursor, l, new_labels, base);
                    if lo_cursor == hi_cursor {
                        break;
                    }
                    lo_cursor += 1;
                } else {
                    break;
                }
            }
            while hi_cursor >= lo_cursor && hi_cursor > 0 {
                let sample_hi = dataset.sample(hi_cursor);
                let proj_l = project(templates.row(l as usize), sample_hi, polarity);
                let proj_r = project(templates.row(r as usize), sample_hi, polarity);
                if proj_r > proj_l {
                    assign(hi_cursor, r, new_labels, base);
                    if hi_cursor == lo_cursor {
                        break;
                    }
                    hi_cursor -= 1;
                } else {
                    break;
                }
            }
            if lo_cursor <= hi_cursor {
                let mid = lo_cursor + (hi_cursor - lo_cursor) / 2;
                for tf in lo_cursor..=mid {
                    assign(tf, l, new_labels, base);
                }
                for tf in (mid + 1)..=hi_cursor {
                    assign(tf, r, new_labels, base);
                }
            }
        }
    }
}

/// Undefine (then redistribute) every run of a constant label whose length
/// is `<= min_length`, one file interval at a time. Returns the packed
/// cluster count.
pub fn reject_short_segments(
    dataset: &Dataset,
    templates: &mut Array2<f64>,
    labeling: &mut Labeling,
    min_length: usize,
    limit_corr: f64,
    polarity: PolarityRequest,
) -> usize {
    for file in dataset.files() {
        let (lo, hi) = file.range();

        // Pass 1: mark every short run.
        let mut to_delete = vec![false; hi - lo + 1];
        let mut run_start = lo;
        let mut tf = lo;
        while tf <= hi {
            let label = labeling.label(tf);
            let mut run_end = tf;
            while run_end + 1 <= hi && labeling.label(run_end + 1) == label {
                run_end += 1;
            }
            if label != UNDEFINED && (run_end - tf + 1) <= min_length {
                for t in tf..=run_end {
                    to_delete[t - lo] = true;
                }
            }
            run_start = tf;
            tf = run_end + 1;
            let _ = run_start;
        }

        // Pass 2: redistribute each contiguous marked chunk.
        let mut snapshot: Vec<(i32, Polarity)> = (lo..=hi).map(|t| (labeling.label(t), labeling.polarity(t))).collect();
        let mut t = lo;
        while t <= hi {
            if !to_delete[t - lo] {
                t += 1;
                continue;
            }
            let a = t;
            let mut b = t;
            while b + 1 <= hi && to_delete[b + 1 - lo] {
                b += 1;
            }

            let left = if a > lo { Some(labeling.label(a - 1)) } else { None };
            let right = if b < hi { Some(labeling.label(b + 1)) } else { None };
            let left = left.filter(|&l| l != UNDEFINED);
            let right = right.filter(|&l| l != UNDEFINED);

            distribute_chunk(
                dataset,
                templates,
                &mut snapshot[(a - lo)..=(b - lo)],
                a,
                b,
                left,
                right,
                limit_corr,
                polarity,
            );

            t = b + 1;
        }

        for (offset, (label, pol)) in snapshot.into_iter().enumerate() {
            labeling.set_label_with_polarity(lo + offset, label, pol);
        }
    }

    labeling.pack(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FileInterval;
    use ndarray::{array, Array1};

    #[test]
    fn absorbs_single_timepoint_blip() {
        let mut rows = vec![[1.0_f64, 0.0]; 6];
        rows[3] = [0.0, 1.0];
        let data = Array2::from_shape_vec((6, 2), rows.into_iter().flatten().collect()).unwrap();
        let norms = Array1::<f64>::ones(6);
        let files = vec![FileInterval { num_tf: 6, offset_tf: 0 }];
        let dataset = Dataset::new(data, true, 2, 250.0, files, norms).unwrap();

        let mut templates = array![[1.0_f64, 0.0], [0.0, 1.0]];
        let mut labeling = Labeling::new(6);
        for tf in 0..6 {
            labeling.set_label(tf, if tf == 3 { 1 } else { 0 });
        }

        reject_short_segments(&dataset, &mut templates, &mut labeling, 1, 0.0, PolarityRequest::Direct);
        assert_eq!(labeling.label(3), 0);
    }
}
