// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{FmmError, Result};

/// Bidirectional mapping between grid coordinates and linear storage offsets.
///
/// Coordinates are signed integer indices in the ghost-extended index range.
/// Storage is row-major with the last axis fastest.
pub trait IndexMap<const N: usize> {
    /// Number of storage points along each axis, ghost margin included.
    fn shape(&self) -> [usize; N];

    /// Row-major strides for index computation.
    fn strides(&self) -> [usize; N];

    /// Grid spacing along each axis.
    fn spacing(&self) -> [f64; N];

    /// Total number of storage points.
    fn num_points(&self) -> usize;

    /// Convert a coordinate to a linear index.
    fn to_linear(&self, coord: [i64; N]) -> Result<usize>;

    /// Convert a linear index to a coordinate.
    fn to_coord(&self, index: usize) -> Result<[i64; N]>;

    /// Face-adjacent coordinates, axis by axis, minus side first, clipped to the grid.
    fn neighbors(&self, coord: [i64; N]) -> Result<Vec<[i64; N]>>;

    /// Zero-based storage offset of `index` along `axis`.
    fn axis_offset(&self, index: usize, axis: usize) -> usize;

    /// Linear index one step along `axis` (`forward` selects the plus side),
    /// or `None` if that step leaves `region`.
    fn step(&self, index: usize, axis: usize, forward: bool, region: &GridBox<N>)
        -> Option<usize>;
}

/// Half-open box of storage offsets, `lo[d] <= offset < hi[d]` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBox<const N: usize> {
    /// Inclusive lower offset per axis.
    pub lo: [usize; N],
    /// Exclusive upper offset per axis.
    pub hi: [usize; N],
}

impl<const N: usize> GridBox<N> {
    /// Whether the point at `index` lies inside the box.
    pub fn contains<G: IndexMap<N>>(&self, grid: &G, index: usize) -> bool {
        (0..N).all(|d| {
            let o = grid.axis_offset(index, d);
            o >= self.lo[d] && o < self.hi[d]
        })
    }

    /// Number of points inside the box.
    pub fn len(&self) -> usize {
        (0..N).map(|d| self.hi[d] - self.lo[d]).product()
    }

    /// Whether the box holds no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Geometry of a Cartesian grid with a fixed-width ghost margin.
///
/// The interior spans `lower[d]..=upper[d]` on each axis and the ghost margin
/// adds `ghost_width` points on both sides. The physical position of
/// coordinate `c` is `c * spacing`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry<const N: usize> {
    lower: [i64; N],
    upper: [i64; N],
    ghost_width: usize,
    spacing: [f64; N],
    shape: [usize; N],
    strides: [usize; N],
}

impl<const N: usize> GridGeometry<N> {
    /// Create a grid geometry.
    ///
    /// # Errors
    /// Returns an error if `N` is not 1, 2 or 3, if `lower > upper` on any
    /// axis, or if any spacing is not positive and finite.
    pub fn new(
        lower: [i64; N],
        upper: [i64; N],
        ghost_width: usize,
        spacing: [f64; N],
    ) -> Result<Self> {
        if !(1..=3).contains(&N) {
            return Err(FmmError::UnsupportedDimension(N));
        }
        for axis in 0..N {
            if lower[axis] > upper[axis] {
                return Err(FmmError::InvalidExtents {
                    axis,
                    lower: lower[axis],
                    upper: upper[axis],
                });
            }
            let value = spacing[axis];
            if !value.is_finite() || value <= 0.0 {
                return Err(FmmError::InvalidSpacing { axis, value });
            }
        }

        let mut shape = [0usize; N];
        for d in 0..N {
            shape[d] = (upper[d] - lower[d]) as usize + 1 + 2 * ghost_width;
        }

        let mut strides = [0usize; N];
        strides[N - 1] = 1;
        for d in (0..N - 1).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }

        Ok(GridGeometry {
            lower,
            upper,
            ghost_width,
            spacing,
            shape,
            strides,
        })
    }

    /// Grid with indices `0..shape[d]` on each axis and no ghost margin.
    ///
    /// # Errors
    /// Same conditions as [`GridGeometry::new`]; a zero-length axis is
    /// reported as invalid extents.
    pub fn from_shape(shape: [usize; N], spacing: [f64; N]) -> Result<Self> {
        let lower = [0i64; N];
        let mut upper = [0i64; N];
        for d in 0..N {
            upper[d] = shape[d] as i64 - 1;
        }
        Self::new(lower, upper, 0, spacing)
    }

    /// Lower interior index per axis.
    pub fn lower(&self) -> [i64; N] {
        self.lower
    }

    /// Upper interior index per axis.
    pub fn upper(&self) -> [i64; N] {
        self.upper
    }

    /// Width of the ghost margin.
    pub fn ghost_width(&self) -> usize {
        self.ghost_width
    }

    /// Whether a coordinate lies in the ghost-extended grid.
    pub fn contains(&self, coord: [i64; N]) -> bool {
        let g = self.ghost_width as i64;
        (0..N).all(|d| coord[d] >= self.lower[d] - g && coord[d] <= self.upper[d] + g)
    }

    /// Box covering the interior points only.
    pub fn interior_box(&self) -> GridBox<N> {
        let mut hi = [0usize; N];
        for d in 0..N {
            hi[d] = self.shape[d] - self.ghost_width;
        }
        GridBox {
            lo: [self.ghost_width; N],
            hi,
        }
    }

    /// Box covering the whole ghost-extended grid.
    pub fn full_box(&self) -> GridBox<N> {
        GridBox {
            lo: [0; N],
            hi: self.shape,
        }
    }

    /// Physical position of a grid point.
    pub fn position(&self, index: usize) -> [f64; N] {
        let mut x = [0.0; N];
        for d in 0..N {
            let c = self.axis_offset(index, d) as i64 + self.lower[d] - self.ghost_width as i64;
            x[d] = c as f64 * self.spacing[d];
        }
        x
    }

    /// Check that a field slice has one value per storage point.
    pub(crate) fn check_len(&self, field: &str, len: usize) -> Result<()> {
        if len != self.num_points() {
            return Err(FmmError::shape_mismatch(field, &self.shape, len));
        }
        Ok(())
    }
}

#[allow(clippy::needless_range_loop)]
impl<const N: usize> IndexMap<N> for GridGeometry<N> {
    fn shape(&self) -> [usize; N] {
        self.shape
    }

    fn strides(&self) -> [usize; N] {
        self.strides
    }

    fn spacing(&self) -> [f64; N] {
        self.spacing
    }

    fn num_points(&self) -> usize {
        self.shape.iter().product()
    }

    fn to_linear(&self, coord: [i64; N]) -> Result<usize> {
        if !self.contains(coord) {
            return Err(FmmError::OutOfRange {
                coord: coord.to_vec(),
            });
        }
        let g = self.ghost_width as i64;
        let mut flat = 0;
        for d in 0..N {
            flat += (coord[d] - self.lower[d] + g) as usize * self.strides[d];
        }
        Ok(flat)
    }

    fn to_coord(&self, index: usize) -> Result<[i64; N]> {
        let len = self.num_points();
        if index >= len {
            return Err(FmmError::IndexOutOfRange { index, len });
        }
        let g = self.ghost_width as i64;
        let mut coord = [0i64; N];
        let mut remainder = index;
        for d in 0..N {
            coord[d] = (remainder / self.strides[d]) as i64 + self.lower[d] - g;
            remainder %= self.strides[d];
        }
        Ok(coord)
    }

    fn neighbors(&self, coord: [i64; N]) -> Result<Vec<[i64; N]>> {
        if !self.contains(coord) {
            return Err(FmmError::OutOfRange {
                coord: coord.to_vec(),
            });
        }
        let mut out = Vec::with_capacity(2 * N);
        for d in 0..N {
            for delta in [-1i64, 1] {
                let mut nb = coord;
                nb[d] += delta;
                if self.contains(nb) {
                    out.push(nb);
                }
            }
        }
        Ok(out)
    }

    #[inline]
    fn axis_offset(&self, index: usize, axis: usize) -> usize {
        (index / self.strides[axis]) % self.shape[axis]
    }

    #[inline]
    fn step(
        &self,
        index: usize,
        axis: usize,
        forward: bool,
        region: &GridBox<N>,
    ) -> Option<usize> {
        let o = self.axis_offset(index, axis);
        if forward {
            (o + 1 < region.hi[axis]).then(|| index + self.strides[axis])
        } else {
            (o > region.lo[axis]).then(|| index - self.strides[axis])
        }
    }
}
