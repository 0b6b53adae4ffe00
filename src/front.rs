// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use rayon::prelude::*;

use crate::config::StencilOrder;
use crate::core::{GridBox, IndexMap};

/// A grid point adjacent to the zero level set, with its sub-cell distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontPoint {
    /// Linear index.
    pub index: usize,
    /// Unsigned distance to the interface.
    pub distance: f64,
}

/// Everything the front scan reads.
pub struct FrontInputs<'a, const N: usize, G: IndexMap<N>> {
    /// Grid geometry.
    pub grid: &'a G,
    /// Region the solve is confined to.
    pub region: &'a GridBox<N>,
    /// Level set function.
    pub phi: &'a [f64],
    /// Excluded points.
    pub mask: Option<&'a [bool]>,
    /// Stencil order, which selects the interpolation.
    pub order: StencilOrder,
}

impl<const N: usize, G: IndexMap<N>> FrontInputs<'_, N, G> {
    #[inline]
    fn masked(&self, index: usize) -> bool {
        self.mask.is_some_and(|m| m[index])
    }

    /// Unmasked in-region neighbor one step along `axis`.
    #[inline]
    fn neighbor(&self, index: usize, axis: usize, forward: bool) -> Option<usize> {
        self.grid
            .step(index, axis, forward, self.region)
            .filter(|&nb| !self.masked(nb))
    }

    fn second_difference(&self, index: usize, axis: usize) -> Option<f64> {
        let m = self.neighbor(index, axis, false)?;
        let p = self.neighbor(index, axis, true)?;
        Some(self.phi[m] - 2.0 * self.phi[index] + self.phi[p])
    }

    /// Fraction of the way from `from` to `to` at which phi vanishes.
    fn crossing_fraction(&self, from: usize, to: usize, axis: usize) -> f64 {
        let a = self.phi[from];
        let b = self.phi[to];
        let linear = a / (a - b);
        if self.order == StencilOrder::First {
            return linear;
        }

        let curvature = match (
            self.second_difference(from, axis),
            self.second_difference(to, axis),
        ) {
            (Some(c1), Some(c2)) if c1 * c2 > 0.0 => {
                if c1.abs() < c2.abs() {
                    c1
                } else {
                    c2
                }
            }
            _ => return linear,
        };

        // phi(s) = a + (b - a - c/2) s + (c/2) s^2 on s in [0, 1]
        let qa = 0.5 * curvature;
        let qb = b - a - 0.5 * curvature;
        let disc = qb * qb - 4.0 * qa * a;
        if disc < 0.0 {
            return linear;
        }
        let q = -0.5 * (qb + disc.sqrt().copysign(qb));
        let mut best = f64::INFINITY;
        for root in [q / qa, a / q] {
            if (0.0..=1.0).contains(&root) && root < best {
                best = root;
            }
        }
        if best.is_finite() {
            best
        } else {
            linear
        }
    }

    /// Norm of the centered (one-sided at region edges) gradient of phi.
    fn gradient_norm(&self, index: usize) -> f64 {
        let spacing = self.grid.spacing();
        let mut sum = 0.0;
        for (axis, &h) in spacing.iter().enumerate() {
            let m = self.neighbor(index, axis, false);
            let p = self.neighbor(index, axis, true);
            let g = match (m, p) {
                (Some(m), Some(p)) => (self.phi[p] - self.phi[m]) / (2.0 * h),
                (None, Some(p)) => (self.phi[p] - self.phi[index]) / h,
                (Some(m), None) => (self.phi[index] - self.phi[m]) / h,
                (None, None) => 0.0,
            };
            sum += g * g;
        }
        sum.sqrt()
    }

    /// Sub-cell distance if `index` touches the interface.
    fn estimate(&self, index: usize) -> Option<f64> {
        if !self.region.contains(self.grid, index) || self.masked(index) {
            return None;
        }
        let a = self.phi[index];
        if a == 0.0 {
            return Some(0.0);
        }

        let spacing = self.grid.spacing();
        let mut nearest = f64::INFINITY;
        for (axis, &h) in spacing.iter().enumerate() {
            for forward in [false, true] {
                let Some(nb) = self.neighbor(index, axis, forward) else {
                    continue;
                };
                let b = self.phi[nb];
                if b == 0.0 || (a > 0.0) != (b > 0.0) {
                    nearest = nearest.min(self.crossing_fraction(index, nb, axis) * h);
                }
            }
        }
        if !nearest.is_finite() {
            return None;
        }

        match self.order {
            StencilOrder::First => Some(nearest),
            StencilOrder::Second => {
                let g = self.gradient_norm(index);
                if g > 0.0 {
                    Some(nearest.min(a.abs() / g))
                } else {
                    Some(nearest)
                }
            }
        }
    }
}

/// Find every unmasked point in the region that lies on or next to a sign
/// change of phi, in increasing index order.
///
/// A point where phi is exactly zero has distance zero. Otherwise the
/// distance is the nearest interpolated crossing along the grid axes; with
/// second order the crossing uses the quadratic through both points when the
/// second differences agree in sign, and the result is capped by
/// `|phi| / |grad phi|`.
pub fn locate_front<const N: usize, G: IndexMap<N> + Sync>(
    inputs: &FrontInputs<'_, N, G>,
) -> Vec<FrontPoint> {
    (0..inputs.phi.len())
        .into_par_iter()
        .filter_map(|index| {
            inputs
                .estimate(index)
                .map(|distance| FrontPoint { index, distance })
        })
        .collect()
}
