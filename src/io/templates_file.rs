//! The templates file (§6): a flat row-major `K x R` matrix, with the
//! chosen K (zero-padded to width 2) embedded in the filename.

use std::io::{Read, Write};

use ndarray::Array2;

use crate::{ClusteringError, Result};

/// Build the canonical templates filename for a given base name and K.
pub fn templates_file_name(base: &str, k: usize) -> String {
    format!("{base}_K{k:02}.ep")
}

/// Write `templates` as a flat row-major binary blob of little-endian
/// `f64`s.
pub fn write_templates_file<W: Write>(mut writer: W, templates: &Array2<f64>) -> Result<()> {
    for value in templates.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Read a flat row-major `K x R` matrix back from its binary form.
pub fn read_templates_file<R: Read>(mut reader: R, k: usize, r: usize) -> Result<Array2<f64>> {
    let mut buf = vec![0u8; k * r * 8];
    reader.read_exact(&mut buf)?;
    let values: Vec<f64> = buf
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    Array2::from_shape_vec((k, r), values)
        .map_err(|e| ClusteringError::DimensionMismatch { expected: format!("{k}x{r}"), actual: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn filename_pads_k_to_width_two() {
        assert_eq!(templates_file_name("run", 4), "run_K04.ep");
        assert_eq!(templates_file_name("run", 12), "run_K12.ep");
    }

    #[test]
    fn round_trips_matrix() {
        let templates = array![[1.0_f64, 2.0], [3.0, 4.0]];
        let mut buf = Vec::new();
        write_templates_file(&mut buf, &templates).unwrap();
        let read_back = read_templates_file(buf.as_slice(), 2, 2).unwrap();
        assert_eq!(read_back, templates);
    }
}
