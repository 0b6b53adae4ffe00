// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::error::{FmmError, Result};

/// Supported file formats for field I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// NumPy .npy format.
    Npy,
    /// MATLAB .mat format (Level 5).
    Mat,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some(ext) => Err(FmmError::UnsupportedFileFormat(ext.to_string())),
        None => Err(FmmError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

fn shape_error(path: &Path, expected: &[usize], got: Vec<usize>) -> FmmError {
    FmmError::ShapeMismatch {
        field: path.display().to_string(),
        expected: expected.to_vec(),
        got,
    }
}

/// Read a row-major f64 field from a .npy file. f32 data is promoted and
/// Fortran-ordered files are re-laid out.
pub fn read_npy_field(path: &Path, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let arr: ArrayD<f64> = match ndarray_npy::read_npy(path) {
        Ok(a) => a,
        Err(_) => {
            let arr32: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| FmmError::UnsupportedDtype(format!("{}", e)))?;
            arr32.mapv(f64::from)
        }
    };

    if arr.shape() != expected_shape {
        return Err(shape_error(path, expected_shape, arr.shape().to_vec()));
    }
    Ok(arr.as_standard_layout().to_owned().into_raw_vec())
}

/// Read variable `var_name` from a Level 5 .mat file as a row-major field.
///
/// MAT data is column-major. The stored dimensions may match
/// `expected_shape` or be its reverse; both are accepted.
pub fn read_mat_field(path: &Path, var_name: &str, expected_shape: &[usize]) -> Result<Vec<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| FmmError::Other(format!("MAT parse error: {}", e)))?;

    let array = mat
        .find_by_name(var_name)
        .ok_or_else(|| FmmError::MatVariableNotFound {
            expected: var_name.to_string(),
            available: mat.arrays().iter().map(|a| a.name().to_string()).collect(),
        })?;

    let data: Vec<f64> = match array.data() {
        matfile::NumericData::Double { real, .. } => real.clone(),
        matfile::NumericData::Single { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
        _ => {
            return Err(FmmError::UnsupportedDtype(format!(
                "MAT variable '{}' is not double or single",
                var_name
            )))
        }
    };

    // MATLAB pads 1-D data to 2-D; drop singleton axes before comparing.
    let mat_shape: Vec<usize> = array.size().to_vec();
    let squeezed: Vec<usize> = mat_shape.iter().copied().filter(|&d| d != 1).collect();
    let wanted: Vec<usize> = expected_shape.iter().copied().filter(|&d| d != 1).collect();
    let reversed: Vec<usize> = wanted.iter().rev().copied().collect();
    let same = squeezed == wanted;
    if !same && squeezed != reversed {
        return Err(shape_error(path, expected_shape, mat_shape));
    }

    if same && wanted.len() > 1 {
        let arr = ArrayD::from_shape_vec(IxDyn(&wanted).f(), data)
            .map_err(|e| FmmError::Other(format!("shape error: {}", e)))?;
        Ok(arr.as_standard_layout().to_owned().into_raw_vec())
    } else {
        // Column-major over the reversed shape is row-major over ours.
        Ok(data)
    }
}

/// Load a field, inferring the format from the extension. `.mat` files are
/// searched for `var_name`.
pub fn load_field(path: &Path, var_name: &str, expected_shape: &[usize]) -> Result<Vec<f64>> {
    match infer_format(path)? {
        FileFormat::Npy => read_npy_field(path, expected_shape),
        FileFormat::Mat => read_mat_field(path, var_name, expected_shape),
    }
}

/// Load an exclusion mask. Points with a negative value are excluded.
pub fn load_mask(path: &Path, expected_shape: &[usize]) -> Result<Vec<bool>> {
    let values = load_field(path, "mask", expected_shape)?;
    Ok(values.iter().map(|&v| v < 0.0).collect())
}

/// Write a row-major field to a .npy file.
pub fn write_npy_field(path: &Path, shape: &[usize], data: &[f64]) -> Result<()> {
    let arr = ArrayD::from_shape_vec(IxDyn(shape), data.to_vec())
        .map_err(|e| FmmError::Other(format!("shape error: {}", e)))?;
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| FmmError::Other(format!("npy write error: {}", e)))
}

/// Write a row-major field to a Level 5 .mat file as variable `var_name`.
///
/// The `matfile` crate only reads, so the file is produced by a small
/// uncompressed writer: one real double array per file.
pub fn write_mat_field(path: &Path, var_name: &str, shape: &[usize], data: &[f64]) -> Result<()> {
    let arr = ArrayD::from_shape_vec(IxDyn(shape), data.to_vec())
        .map_err(|e| FmmError::Other(format!("shape error: {}", e)))?;
    let column_major: Vec<f64> = arr.t().as_standard_layout().to_owned().into_raw_vec();
    let dims: Vec<usize> = if shape.len() == 1 {
        vec![shape[0], 1]
    } else {
        shape.to_vec()
    };
    MatWriter::create(path)?.write_double_array(var_name, &dims, &column_major)
}

/// Save a field, inferring the format from the extension.
pub fn save_field(path: &Path, var_name: &str, shape: &[usize], data: &[f64]) -> Result<()> {
    match infer_format(path)? {
        FileFormat::Npy => write_npy_field(path, shape, data),
        FileFormat::Mat => write_mat_field(path, var_name, shape, data),
    }
}

// Level 5 data types and array classes.
const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_DOUBLE_CLASS: u32 = 6;

/// Padded size of a sub-element carrying `len` payload bytes.
fn element_size(len: usize) -> usize {
    8 + len.div_ceil(8) * 8
}

struct MatWriter<W: Write> {
    out: W,
}

impl MatWriter<std::io::BufWriter<std::fs::File>> {
    fn create(path: &Path) -> Result<Self> {
        let file = std::fs::File::create(path)?;
        let mut writer = MatWriter {
            out: std::io::BufWriter::new(file),
        };
        writer.header()?;
        Ok(writer)
    }
}

impl<W: Write> MatWriter<W> {
    /// 116 bytes of text, 8 bytes of subsystem offset, version, endian tag.
    fn header(&mut self) -> Result<()> {
        let mut text = [b' '; 116];
        let desc = b"MATLAB 5.0 MAT-file, created by eikonal-fmm";
        text[..desc.len()].copy_from_slice(desc);
        self.out.write_all(&text)?;
        self.out.write_all(&[0u8; 8])?;
        self.out.write_all(&0x0100u16.to_le_bytes())?;
        self.out.write_all(b"IM")?;
        Ok(())
    }

    fn tag(&mut self, data_type: u32, len: usize) -> Result<()> {
        self.out.write_all(&data_type.to_le_bytes())?;
        self.out.write_all(&(len as u32).to_le_bytes())?;
        Ok(())
    }

    fn element(&mut self, data_type: u32, payload: &[u8]) -> Result<()> {
        self.tag(data_type, payload.len())?;
        self.out.write_all(payload)?;
        let pad = element_size(payload.len()) - 8 - payload.len();
        self.out.write_all(&[0u8; 8][..pad])?;
        Ok(())
    }

    fn write_double_array(mut self, name: &str, dims: &[usize], data: &[f64]) -> Result<()> {
        let flags: Vec<u8> = [MX_DOUBLE_CLASS, 0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let dims: Vec<u8> = dims
            .iter()
            .flat_map(|&d| (d as i32).to_le_bytes())
            .collect();
        let real: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();

        let body = element_size(flags.len())
            + element_size(dims.len())
            + element_size(name.len())
            + element_size(real.len());
        self.tag(MI_MATRIX, body)?;
        self.element(MI_UINT32, &flags)?;
        self.element(MI_INT32, &dims)?;
        self.element(MI_INT8, name.as_bytes())?;
        self.element(MI_DOUBLE, &real)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.5 - 1.0).collect()
    }

    #[test]
    fn npy_roundtrip() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_roundtrip.npy");
        let data = ramp(12);
        save_field(&tmp, "distance", &[3, 4], &data).unwrap();
        let loaded = load_field(&tmp, "distance", &[3, 4]).unwrap();
        assert_eq!(loaded, data);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn npy_shape_mismatch() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_shape_mismatch.npy");
        save_field(&tmp, "distance", &[3, 4], &ramp(12)).unwrap();
        let result = load_field(&tmp, "distance", &[4, 3]);
        assert!(matches!(result, Err(FmmError::ShapeMismatch { .. })));
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn npy_f32_and_fortran_order() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_f32_fortran.npy");
        let arr = ndarray::Array2::<f32>::from_shape_fn((2, 3).f(), |(i, j)| (i * 3 + j) as f32);
        ndarray_npy::write_npy(&tmp, &arr).unwrap();
        let loaded = read_npy_field(&tmp, &[2, 3]).unwrap();
        assert_eq!(loaded, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_roundtrip_2d() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_roundtrip_2d.mat");
        let data = ramp(12);
        save_field(&tmp, "distance", &[3, 4], &data).unwrap();

        let file = std::fs::File::open(&tmp).unwrap();
        let mut reader = std::io::BufReader::new(file);
        let mat = matfile::MatFile::parse(&mut reader).unwrap();
        let arr = mat.find_by_name("distance").unwrap();
        assert_eq!(arr.size().to_vec(), vec![3, 4]);

        let loaded = load_field(&tmp, "distance", &[3, 4]).unwrap();
        assert_eq!(loaded, data);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_roundtrip_1d_and_3d() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_roundtrip_1d.mat");
        let data = ramp(5);
        save_field(&tmp, "x", &[5], &data).unwrap();
        assert_eq!(load_field(&tmp, "x", &[5]).unwrap(), data);
        std::fs::remove_file(&tmp).ok();

        let tmp = std::env::temp_dir().join("eikonal_fmm_roundtrip_3d.mat");
        let data = ramp(24);
        save_field(&tmp, "x", &[2, 3, 4], &data).unwrap();
        assert_eq!(load_field(&tmp, "x", &[2, 3, 4]).unwrap(), data);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_missing_variable() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_missing_var.mat");
        save_field(&tmp, "speed", &[2, 2], &[1.0; 4]).unwrap();
        let result = load_field(&tmp, "phi", &[2, 2]);
        match result {
            Err(FmmError::MatVariableNotFound { available, .. }) => {
                assert_eq!(available, vec!["speed".to_string()]);
            }
            other => panic!("expected MatVariableNotFound, got {:?}", other.map(|v| v.len())),
        }
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mask_negative_means_excluded() {
        let tmp = std::env::temp_dir().join("eikonal_fmm_mask.npy");
        save_field(&tmp, "mask", &[4], &[1.0, -1.0, 0.0, -0.5]).unwrap();
        let mask = load_mask(&tmp, &[4]).unwrap();
        assert_eq!(mask, vec![false, true, false, true]);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn element_sizes_are_padded() {
        assert_eq!(element_size(0), 8);
        assert_eq!(element_size(5), 16);
        assert_eq!(element_size(8), 16);
        assert_eq!(element_size(12), 24);
    }

    #[test]
    fn unsupported_format() {
        assert!(matches!(
            infer_format(Path::new("phi.xyz")),
            Err(FmmError::UnsupportedFileFormat(_))
        ));
        assert!(matches!(
            infer_format(Path::new("phi")),
            Err(FmmError::UnsupportedFileFormat(_))
        ));
    }
}
