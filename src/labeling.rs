//! The labeling store (§4.2): a parallel pair of arrays, a template index
//! per timepoint (or UNDEFINED) and a polarity flag per timepoint.
//!
//! There is no aliasing between the label array and the template matrix
//! it is packed or reordered alongside: the two are always passed as
//! separate `&mut` borrows rather than shared through a pointer.

use std::io::{Read, Write};

use ndarray::{s, Array1, Array2, ArrayView2};
use rayon::prelude::*;

use crate::io::seg_file::{read_seg_file, write_seg_file, SegRow};
use crate::map::{is_opposite, Polarity, PolarityRequest};
use crate::Result;

/// Cluster index for a timepoint, or [`UNDEFINED`].
pub type Label = i32;

/// Sentinel meaning "no cluster assigned yet".
pub const UNDEFINED: Label = -1;

/// Parallel `Labels`/`Polarity` arrays of length `T`.
#[derive(Debug, Clone)]
pub struct Labeling {
    labels: Array1<Label>,
    polarity: Array1<Polarity>,
}

impl Labeling {
    pub fn new(num_data: usize) -> Self {
        Self {
            labels: Array1::from_elem(num_data, UNDEFINED),
            polarity: Array1::from_elem(num_data, Polarity::Direct),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, tf: usize) -> Label {
        self.labels[tf]
    }

    pub fn polarity(&self, tf: usize) -> Polarity {
        self.polarity[tf]
    }

    pub fn is_defined(&self, tf: usize) -> bool {
        self.labels[tf] != UNDEFINED
    }

    pub fn is_undefined(&self, tf: usize) -> bool {
        !self.is_defined(tf)
    }

    pub fn labels(&self) -> &Array1<Label> {
        &self.labels
    }

    /// Mutable access to the raw label array, for bulk index shifts during
    /// agglomerative merges.
    pub(crate) fn labels_mut(&mut self) -> &mut Array1<Label> {
        &mut self.labels
    }

    /// Reset every timepoint: labels to UNDEFINED, polarity to DIRECT.
    pub fn reset(&mut self) {
        self.labels.fill(UNDEFINED);
        self.polarity.fill(Polarity::Direct);
    }

    /// Reset a single timepoint.
    pub fn reset_at(&mut self, tf: usize) {
        self.labels[tf] = UNDEFINED;
        self.polarity[tf] = Polarity::Direct;
    }

    /// Reset an inclusive range of timepoints.
    pub fn reset_range(&mut self, tfmin: usize, tfmax: usize) {
        for tf in tfmin..=tfmax {
            self.reset_at(tf);
        }
    }

    /// Store a label, leaving polarity untouched. Callers must follow up
    /// with [`Labeling::update_polarities`] if polarity needs refreshing.
    pub fn set_label(&mut self, tf: usize, label: Label) {
        self.labels[tf] = label;
    }

    /// Store a label together with a stored polarity. `Evaluate` is not a
    /// valid input here -- callers pass only `Direct`/`Invert` (as a
    /// [`Polarity`], which cannot express `Evaluate` by construction).
    pub fn set_label_with_polarity(&mut self, tf: usize, label: Label, polarity: Polarity) {
        self.labels[tf] = label;
        self.polarity[tf] = polarity;
    }

    pub fn set_polarity(&mut self, tf: usize, polarity: Polarity) {
        self.polarity[tf] = polarity;
    }

    /// Recompute stored polarity for every timepoint in `[tfmin, tfmax]`
    /// from the current templates. Resolves any `Evaluate` request into
    /// `Direct`/`Invert`; `UndefinedLabel` always yields `Direct`.
    pub fn update_polarities(
        &mut self,
        data: ArrayView2<f64>,
        tfmin: usize,
        tfmax: usize,
        templates: ArrayView2<f64>,
        request: PolarityRequest,
    ) {
        let labels = self.labels.view();
        let new_pol: Vec<Polarity> = (tfmin..=tfmax)
            .into_par_iter()
            .map(|tf| {
                let label = labels[tf];
                if label == UNDEFINED || request != PolarityRequest::Evaluate {
                    Polarity::Direct
                } else if is_opposite(templates.row(label as usize), data.row(tf)) {
                    Polarity::Invert
                } else {
                    Polarity::Direct
                }
            })
            .collect();

        for (offset, pol) in new_pol.into_iter().enumerate() {
            self.polarity[tfmin + offset] = pol;
        }
    }

    /// Number of distinct defined labels, early-exiting once `max_clusters`
    /// distinct labels have been seen.
    pub fn count_labels(&self, max_clusters: usize) -> usize {
        let mut seen = vec![false; max_clusters];
        let mut count = 0;
        for &l in self.labels.iter() {
            if l < 0 {
                continue;
            }
            let l = l as usize;
            if l < max_clusters && !seen[l] {
                seen[l] = true;
                count += 1;
                if count == max_clusters {
                    break;
                }
            }
        }
        count
    }

    /// Largest defined label, or [`UNDEFINED`] if nothing is defined.
    pub fn max_label(&self) -> Label {
        self.labels.iter().copied().filter(|&l| l != UNDEFINED).max().unwrap_or(UNDEFINED)
    }

    pub fn cluster_size(&self, cluster: Label) -> usize {
        self.labels.iter().filter(|&&l| l == cluster).count()
    }

    pub fn cluster_size_range(&self, lo: Label, hi: Label, step: usize) -> usize {
        self.labels
            .iter()
            .step_by(step.max(1))
            .filter(|&&l| l >= lo && l <= hi)
            .count()
    }

    /// Remove empty clusters, shifting both labels and the corresponding
    /// template rows down, and truncate `templates` to the resulting live
    /// cluster count. Returns that count.
    pub fn pack(&mut self, templates: &mut Array2<f64>) -> usize {
        let mut maxlabel = self.max_label();
        if maxlabel == UNDEFINED {
            *templates = Array2::<f64>::zeros((0, templates.ncols()));
            return 0;
        }

        let mut nc: Label = 0;
        while nc <= maxlabel {
            let exists = self.labels.iter().any(|&l| l == nc);
            if exists {
                nc += 1;
                continue;
            }

            for l in self.labels.iter_mut() {
                if *l > nc {
                    *l -= 1;
                }
            }

            for row in (nc as usize)..(maxlabel as usize) {
                let next = templates.row(row + 1).to_owned();
                templates.row_mut(row).assign(&next);
            }

            maxlabel -= 1;
            // do not advance nc: everything above has shifted down into it
        }

        let final_k = (maxlabel + 1) as usize;
        if templates.nrows() != final_k {
            *templates = templates.slice(s![..final_k, ..]).to_owned();
        }
        final_k
    }

    /// Apply a permutation `ordering[new] = old` to both label ids and
    /// template rows, atomically (from the caller's point of view: both
    /// mutations are applied before returning).
    pub fn reorder(&mut self, templates: &mut Array2<f64>, ordering: &[usize]) {
        let nclusters = ordering.len();
        let mut scanback = vec![0usize; nclusters];
        for (new_idx, &old_idx) in ordering.iter().enumerate() {
            scanback[old_idx] = new_idx;
        }

        for l in self.labels.iter_mut() {
            if *l != UNDEFINED {
                *l = scanback[*l as usize] as Label;
            }
        }

        let old_templates = templates.clone();
        for (new_idx, &old_idx) in ordering.iter().enumerate() {
            templates.row_mut(new_idx).assign(&old_templates.row(old_idx));
        }
    }

    /// Rebuild a labeling from a persisted `.seg` file, per §6's column
    /// mapping: `Segment` 0 -> UNDEFINED else `k - 1`, `Polarity` < 0 ->
    /// INVERT else DIRECT.
    pub fn read_file<R: Read>(reader: R) -> Result<Self> {
        let rows = read_seg_file(reader)?;
        let mut labeling = Self::new(rows.len());
        for (tf, row) in rows.iter().enumerate() {
            labeling.set_label_with_polarity(tf, row.segment, row.polarity);
        }
        Ok(labeling)
    }

    /// Persist this labeling as a `.seg` file. `gfp`/`gev`/`corr` are
    /// parallel per-timepoint arrays supplied by the caller (the labeling
    /// store itself holds neither).
    pub fn write_file<W: Write>(&self, writer: W, gfp: &[f64], gev: &[f64], corr: &[f64]) -> Result<()> {
        let rows: Vec<SegRow> = (0..self.len())
            .map(|tf| SegRow {
                gfp: gfp.get(tf).copied().unwrap_or(0.0),
                polarity: self.polarity(tf),
                segment: self.label(tf),
                gev: gev.get(tf).copied().unwrap_or(0.0),
                corr: corr.get(tf).copied().unwrap_or(0.0),
            })
            .collect();
        write_seg_file(writer, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn reset_clears_to_undefined_direct() {
        let mut l = Labeling::new(3);
        l.set_label_with_polarity(0, 1, Polarity::Invert);
        l.reset();
        assert_eq!(l.label(0), UNDEFINED);
        assert_eq!(l.polarity(0), Polarity::Direct);
    }

    #[test]
    fn pack_compacts_empty_clusters() {
        let mut l = Labeling::new(4);
        l.set_label(0, 0);
        l.set_label(1, 2);
        l.set_label(2, 2);
        l.set_label(3, 2);
        let mut templates = array![[1.0_f64], [2.0], [3.0]];
        let k = l.pack(&mut templates);
        assert_eq!(k, 2);
        assert_eq!(l.label(0), 0);
        assert_eq!(l.label(1), 1);
        assert_eq!(templates.nrows(), 2); // pack truncates storage to the live cluster count
        assert_eq!(templates.row(1)[0], 3.0);
    }

    #[test]
    fn reorder_is_invertible() {
        let mut l = Labeling::new(2);
        l.set_label(0, 0);
        l.set_label(1, 1);
        let mut templates = array![[1.0_f64], [2.0]];
        let ordering = vec![1, 0];
        l.reorder(&mut templates, &ordering);
        assert_eq!(l.label(0), 1);
        assert_eq!(l.label(1), 0);
        assert_eq!(templates.row(0)[0], 2.0);

        // reorder by the inverse permutation restores the original state
        l.reorder(&mut templates, &ordering);
        assert_eq!(l.label(0), 0);
        assert_eq!(l.label(1), 1);
        assert_eq!(templates.row(0)[0], 1.0);
    }

    #[test]
    fn count_labels_early_exits() {
        let mut l = Labeling::new(5);
        l.set_label(0, 0);
        l.set_label(1, 1);
        l.set_label(2, 2);
        assert_eq!(l.count_labels(2), 2);
    }
}
