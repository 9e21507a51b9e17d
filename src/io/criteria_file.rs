//! The criteria error marker file (`.error.data.mrk`, §6): a plain marker
//! file whose first marker's `From` value (1-based) is the chosen K.

use std::io::{BufRead, BufReader, Read, Write};

use crate::{ClusteringError, Result};

/// Write the marker file for a chosen K.
pub fn write_criteria_file<W: Write>(mut writer: W, chosen_k: usize) -> Result<()> {
    writeln!(writer, "TL02")?;
    writeln!(writer, "{}\t{}\t\"K = {}\"", chosen_k, chosen_k, chosen_k)?;
    Ok(())
}

/// Read back the chosen K from the first marker's `From` field.
pub fn read_criteria_file<R: Read>(reader: R) -> Result<usize> {
    let mut lines = BufReader::new(reader).lines();
    lines.next().ok_or_else(missing_marker)??; // skip the format header
    let marker_line = lines.next().ok_or_else(missing_marker)??;
    let from_field = marker_line
        .split_whitespace()
        .next()
        .ok_or_else(missing_marker)?;
    from_field
        .parse::<usize>()
        .map_err(|_| ClusteringError::InvalidConfig("malformed criteria marker file".into()))
}

fn missing_marker() -> ClusteringError {
    ClusteringError::InvalidConfig("criteria marker file has no markers".into())
}
