//! The `.seg` file (§6): one row per timepoint, columns
//! `GFP, Polarity, Segment, GEV, Corr`. Legacy files carry `Dis` instead of
//! `Polarity`; both are accepted on read.
//!
//! `Segment` 0 means UNDEFINED, value k means cluster `k - 1`;
//! `Polarity` -1 means INVERT, else DIRECT.

use std::io::{BufRead, BufReader, Read, Write};

use crate::labeling::{Labeling, UNDEFINED};
use crate::map::Polarity;
use crate::{ClusteringError, Result};

/// One decoded row of a `.seg` file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegRow {
    pub gfp: f64,
    pub polarity: Polarity,
    /// 0-based cluster label, or [`UNDEFINED`].
    pub segment: i32,
    pub gev: f64,
    pub corr: f64,
}

fn parse_header(line: &str) -> Vec<String> {
    line.split_whitespace().map(|s| s.to_ascii_lowercase()).collect()
}

/// Parse a `.seg` file body. Accepts either a `Polarity` (`-1`/`+1`) or a
/// legacy `Dis` column in the same position; both are interpreted into
/// [`Polarity`] the same way (`< 0` -> `Invert`).
pub fn read_seg_file<R: Read>(reader: R) -> Result<Vec<SegRow>> {
    let mut lines = BufReader::new(reader).lines();
    let header_line = lines
        .next()
        .ok_or(ClusteringError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty .seg file",
        )))??;
    let columns = parse_header(&header_line);

    let polarity_col = columns
        .iter()
        .position(|c| c == "polarity" || c == "dis")
        .ok_or(ClusteringError::InvalidConfig("missing Polarity/Dis column".into()))?;
    let gfp_col = columns.iter().position(|c| c == "gfp").unwrap_or(0);
    let segment_col = columns
        .iter()
        .position(|c| c == "segment")
        .ok_or(ClusteringError::InvalidConfig("missing Segment column".into()))?;
    let gev_col = columns.iter().position(|c| c == "gev");
    let corr_col = columns.iter().position(|c| c == "corr");

    let mut rows = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();

        let gfp: f64 = fields.get(gfp_col).and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let polarity_raw: f64 = fields
            .get(polarity_col)
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let segment_raw: i64 = fields
            .get(segment_col)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let gev: f64 = gev_col.and_then(|c| fields.get(c)).and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let corr: f64 = corr_col.and_then(|c| fields.get(c)).and_then(|s| s.parse().ok()).unwrap_or(0.0);

        rows.push(SegRow {
            gfp,
            polarity: if polarity_raw < 0.0 { Polarity::Invert } else { Polarity::Direct },
            segment: if segment_raw == 0 { UNDEFINED } else { (segment_raw - 1) as i32 },
            gev,
            corr,
        });
    }

    Ok(rows)
}

/// Build a [`Labeling`] directly from a parsed `.seg` file.
pub fn labeling_from_seg_rows(rows: &[SegRow]) -> Labeling {
    let mut labeling = Labeling::new(rows.len());
    for (tf, row) in rows.iter().enumerate() {
        labeling.set_label_with_polarity(tf, row.segment, row.polarity);
    }
    labeling
}

/// Write a `.seg` file in the canonical `GFP, Polarity, Segment, GEV, Corr`
/// column order (never the legacy `Dis` variant).
pub fn write_seg_file<W: Write>(mut writer: W, rows: &[SegRow]) -> Result<()> {
    writeln!(writer, "GFP Polarity Segment GEV Corr")?;
    for row in rows {
        let polarity_val = match row.polarity {
            Polarity::Direct => 1,
            Polarity::Invert => -1,
        };
        let segment_val = if row.segment == UNDEFINED { 0 } else { row.segment + 1 };
        writeln!(
            writer,
            "{:.6} {} {} {:.6} {:.6}",
            row.gfp, polarity_val, segment_val, row.gev, row.corr
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_canonical_columns() {
        let rows = vec![
            SegRow { gfp: 1.0, polarity: Polarity::Direct, segment: 0, gev: 0.5, corr: 0.9 },
            SegRow { gfp: 1.2, polarity: Polarity::Invert, segment: UNDEFINED, gev: 0.0, corr: 0.0 },
        ];
        let mut buf = Vec::new();
        write_seg_file(&mut buf, &rows).unwrap();
        let parsed = read_seg_file(buf.as_slice()).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn accepts_legacy_dis_column() {
        let text = "GFP Dis Segment\n1.0 -1 2\n";
        let parsed = read_seg_file(text.as_bytes()).unwrap();
        assert_eq!(parsed[0].polarity, Polarity::Invert);
        assert_eq!(parsed[0].segment, 1);
    }
}
