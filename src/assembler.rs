// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use ndarray::{ArrayD, IxDyn};

use crate::config::{DistanceSign, FmmConfig, GhostFill};
use crate::core::{GridBox, GridGeometry, IndexMap};
use crate::error::{FmmError, Result};
use crate::scheduler::{Extraction, SolveStats};
use crate::update_kernels::PointStatus;

/// Marching state handed over for assembly.
pub(crate) struct RawSolution {
    pub values: Vec<f64>,
    pub status: Vec<PointStatus>,
    pub side: Vec<bool>,
    pub extensions: Vec<Vec<f64>>,
    pub stats: SolveStats,
    pub extraction_log: Option<Vec<Extraction>>,
}

/// Result of a solve: distance, extension fields and bookkeeping, laid out
/// row-major over the whole ghost-extended grid.
#[derive(Debug, Clone)]
pub struct FmmOutput<const N: usize> {
    geometry: GridGeometry<N>,
    distance: Vec<f64>,
    extensions: Vec<Vec<f64>>,
    known: Vec<bool>,
    stats: SolveStats,
    extraction_log: Option<Vec<Extraction>>,
}

impl<const N: usize> FmmOutput<N> {
    pub(crate) fn assemble(
        geometry: &GridGeometry<N>,
        config: &FmmConfig,
        region: &GridBox<N>,
        raw: RawSolution,
    ) -> Self {
        let known: Vec<bool> = raw
            .status
            .iter()
            .map(|&s| s == PointStatus::Known)
            .collect();
        let mut distance = raw.values;
        let mut extensions = raw.extensions;

        for (i, d) in distance.iter_mut().enumerate() {
            if !known[i] {
                *d = config.unreached_distance;
            } else if config.sign == DistanceSign::Signed && !raw.side[i] {
                *d = -*d;
            }
        }
        for ext in extensions.iter_mut() {
            for (v, &k) in ext.iter_mut().zip(&known) {
                if !k {
                    *v = config.unreached_extension;
                }
            }
        }

        if *region != geometry.full_box() {
            fill_ghosts(geometry, region, config.ghost_fill, &known, &mut distance);
            for ext in extensions.iter_mut() {
                fill_ghosts(geometry, region, config.ghost_fill, &known, ext);
            }
        }

        FmmOutput {
            geometry: geometry.clone(),
            distance,
            extensions,
            known,
            stats: raw.stats,
            extraction_log: raw.extraction_log,
        }
    }

    /// Grid the output is laid out on.
    pub fn geometry(&self) -> &GridGeometry<N> {
        &self.geometry
    }

    /// Distance (or arrival time) at every point.
    pub fn distance(&self) -> &[f64] {
        &self.distance
    }

    /// Extended field `k`, in the order the sources were given.
    pub fn extension_field(&self, k: usize) -> Option<&[f64]> {
        self.extensions.get(k).map(Vec::as_slice)
    }

    /// Number of extended fields.
    pub fn num_extension_fields(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the point at `index` received a final value from marching.
    /// Ghost points filled by extrapolation are not known.
    pub fn is_known(&self, index: usize) -> bool {
        self.known.get(index).copied().unwrap_or(false)
    }

    /// Solve counters.
    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    /// Finalized points in extraction order, if recording was enabled.
    pub fn extraction_log(&self) -> Option<&[Extraction]> {
        self.extraction_log.as_deref()
    }

    /// Copy the distance into a caller-owned buffer.
    ///
    /// # Errors
    /// Returns [`FmmError::ShapeMismatch`] if `out` has the wrong length.
    pub fn copy_distance_into(&self, out: &mut [f64]) -> Result<()> {
        self.geometry.check_len("output distance", out.len())?;
        out.copy_from_slice(&self.distance);
        Ok(())
    }

    /// Copy extended field `k` into a caller-owned buffer.
    ///
    /// # Errors
    /// Returns [`FmmError::IndexOutOfRange`] if there is no field `k`, or
    /// [`FmmError::ShapeMismatch`] if `out` has the wrong length.
    pub fn copy_extension_into(&self, k: usize, out: &mut [f64]) -> Result<()> {
        let field = self.field(k)?;
        self.geometry
            .check_len(&format!("output extension {}", k), out.len())?;
        out.copy_from_slice(field);
        Ok(())
    }

    /// Distance as an n-dimensional array shaped like the grid.
    pub fn distance_array(&self) -> Result<ArrayD<f64>> {
        self.to_array(self.distance.clone())
    }

    /// Extended field `k` as an n-dimensional array shaped like the grid.
    pub fn extension_array(&self, k: usize) -> Result<ArrayD<f64>> {
        self.to_array(self.field(k)?.to_vec())
    }

    /// Consume the output and return the distance buffer.
    pub fn into_distance(self) -> Vec<f64> {
        self.distance
    }

    fn field(&self, k: usize) -> Result<&[f64]> {
        self.extension_field(k).ok_or(FmmError::IndexOutOfRange {
            index: k,
            len: self.extensions.len(),
        })
    }

    fn to_array(&self, data: Vec<f64>) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(&self.geometry.shape()), data)
            .map_err(|e| FmmError::Other(e.to_string()))
    }
}

/// Overwrite every point outside `region` according to `fill`.
///
/// Interior values are read from the nearest region point (per-axis clamp).
/// Linear extrapolation adds, for each axis the ghost point lies beyond, the
/// outward slope between that point and its inward neighbor.
fn fill_ghosts<const N: usize>(
    grid: &GridGeometry<N>,
    region: &GridBox<N>,
    fill: GhostFill,
    known: &[bool],
    field: &mut [f64],
) {
    let strides = grid.strides();
    for g in 0..field.len() {
        if region.contains(grid, g) {
            continue;
        }
        if fill == GhostFill::Zero {
            field[g] = 0.0;
            continue;
        }

        let mut offsets = [0usize; N];
        let mut nearest = 0;
        for d in 0..N {
            offsets[d] = grid.axis_offset(g, d);
            nearest += offsets[d].clamp(region.lo[d], region.hi[d] - 1) * strides[d];
        }
        field[g] = match fill {
            GhostFill::Linear if known[nearest] => {
                linear_ghost(grid, region, known, field, nearest, &offsets)
                    .unwrap_or(field[nearest])
            }
            _ => field[nearest],
        };
    }
}

fn linear_ghost<const N: usize>(
    grid: &GridGeometry<N>,
    region: &GridBox<N>,
    known: &[bool],
    field: &[f64],
    nearest: usize,
    offsets: &[usize; N],
) -> Option<f64> {
    let base = field[nearest];
    let mut value = base;
    for d in 0..N {
        let (steps, inward) = if offsets[d] < region.lo[d] {
            (region.lo[d] - offsets[d], true)
        } else if offsets[d] >= region.hi[d] {
            (offsets[d] + 1 - region.hi[d], false)
        } else {
            continue;
        };
        let next = grid.step(nearest, d, inward, region)?;
        if !known[next] {
            return None;
        }
        value += steps as f64 * (base - field[next]);
    }
    Some(value)
}
