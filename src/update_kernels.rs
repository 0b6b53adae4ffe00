// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::StencilOrder;
use crate::core::{GridBox, IndexMap};
use crate::error::{FmmError, Result};

/// Lifecycle state of a grid point during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointStatus {
    /// No tentative value yet.
    Unknown,
    /// Tentative value, queued.
    Trial,
    /// Final value.
    Known,
}

/// Largest number of axis terms a stencil can hold.
pub const MAX_AXES: usize = 3;

/// Contribution of one axis to the local quadratic, `weight * (T - center)^2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTerm {
    /// Axis index.
    pub axis: usize,
    /// Coefficient of the squared difference.
    pub weight: f64,
    /// Value the difference is taken against.
    pub center: f64,
    /// Known upwind neighbor.
    pub near: usize,
    /// Value at `near`.
    pub near_value: f64,
    /// Second upwind neighbor, present when the term is second order.
    pub far: Option<usize>,
}

impl AxisTerm {
    /// Whether this term uses the second-order difference.
    pub fn is_second_order(&self) -> bool {
        self.far.is_some()
    }

    /// Upwind value of an auxiliary field, combined with the same difference
    /// formula as the distance.
    #[inline]
    fn field_center(&self, field: &[f64]) -> f64 {
        match self.far {
            Some(far) => (4.0 * field[self.near] - field[far]) / 3.0,
            None => field[self.near],
        }
    }
}

/// How the local update was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Larger root of the quadratic built from the first `n` terms (sorted by center).
    Quadratic(usize),
    /// First-order update from the single known neighbor of term `i`, taken
    /// when no subset of two or more terms has an admissible root.
    SingleAxis(usize),
}

/// Result of evaluating the stencil at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilUpdate {
    /// Tentative value.
    pub value: f64,
    terms: [AxisTerm; MAX_AXES],
    num_terms: usize,
    /// Which terms produced `value`.
    pub kind: UpdateKind,
    /// Number of term subsets rejected before `value` was found.
    pub fallbacks: u32,
}

impl StencilUpdate {
    /// Axis terms, sorted by center.
    pub fn terms(&self) -> &[AxisTerm] {
        &self.terms[..self.num_terms]
    }

    /// Value of an auxiliary field at the evaluated point satisfying the
    /// discrete `grad T . grad F = 0` with the terms that produced `value`.
    pub fn extend(&self, field: &[f64]) -> f64 {
        let used = match self.kind {
            UpdateKind::SingleAxis(i) => return field[self.terms[i].near],
            UpdateKind::Quadratic(n) => &self.terms[..n],
        };

        let mut num = 0.0;
        let mut den = 0.0;
        let mut mean = 0.0;
        for term in used {
            let g = term.field_center(field);
            let w = term.weight * (self.value - term.center);
            num += w * g;
            den += w;
            mean += g;
        }
        if den > 0.0 {
            num / den
        } else {
            mean / used.len() as f64
        }
    }
}

/// Read-only state shared by every stencil evaluation in a solve.
pub struct StencilInputs<'a, const N: usize, G: IndexMap<N>> {
    /// Grid geometry.
    pub grid: &'a G,
    /// Region the solve is confined to.
    pub region: &'a GridBox<N>,
    /// Current values.
    pub values: &'a [f64],
    /// Current statuses.
    pub status: &'a [PointStatus],
    /// Side of the front each point is on (`true` for the non-negative side).
    pub side: &'a [bool],
    /// Stencil order.
    pub order: StencilOrder,
}

/// Solve `sum_i w_i (T - c_i)^2 = rhs` for the larger root.
///
/// Returns `None` if the discriminant is negative or the root is smaller
/// than the largest center (not upwind-consistent).
pub fn solve_quadratic(terms: &[AxisTerm], rhs: f64) -> Option<f64> {
    let mut a = 0.0;
    let mut b = 0.0;
    let mut c = -rhs;
    let mut max_center = f64::NEG_INFINITY;
    for t in terms {
        a += t.weight;
        b += 2.0 * t.weight * t.center;
        c += t.weight * t.center * t.center;
        max_center = max_center.max(t.center);
    }
    if a <= 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let root = (b + disc.sqrt()) / (2.0 * a);
    (root >= max_center).then_some(root)
}

const EMPTY_TERM: AxisTerm = AxisTerm {
    axis: 0,
    weight: 0.0,
    center: 0.0,
    near: 0,
    near_value: 0.0,
    far: None,
};

/// Evaluate the upwind stencil at `index` with slowness `1/speed`.
///
/// Per axis the smaller known neighbor is used (minus side on ties). With
/// second order, the next point in the same direction upgrades the term when
/// it is known and its value, negated if it lies across the front, does not
/// exceed the nearer one.
///
/// The quadratic is tried with all terms, then with the largest-center term
/// dropped, down to two terms. A lone term always has an admissible root.
/// If every subset fails, the first-order single-neighbor update is used.
///
/// # Errors
/// Returns [`FmmError::DegenerateStencil`] if no neighbor is known.
pub fn evaluate<const N: usize, G: IndexMap<N>>(
    inputs: &StencilInputs<'_, N, G>,
    index: usize,
    slowness: f64,
) -> Result<StencilUpdate> {
    let spacing = inputs.grid.spacing();
    let mut terms = [EMPTY_TERM; MAX_AXES];
    let mut num_terms = 0;

    for axis in 0..N {
        let mut best: Option<(usize, bool)> = None;
        for forward in [false, true] {
            let Some(nb) = inputs.grid.step(index, axis, forward, inputs.region) else {
                continue;
            };
            if inputs.status[nb] != PointStatus::Known {
                continue;
            }
            if best.map_or(true, |(b, _)| inputs.values[nb] < inputs.values[b]) {
                best = Some((nb, forward));
            }
        }
        let Some((near, forward)) = best else {
            continue;
        };

        let h = spacing[axis];
        let v1 = inputs.values[near];
        let mut term = AxisTerm {
            axis,
            weight: 1.0 / (h * h),
            center: v1,
            near,
            near_value: v1,
            far: None,
        };

        if inputs.order == StencilOrder::Second {
            let far = inputs
                .grid
                .step(near, axis, forward, inputs.region)
                .filter(|&far| inputs.status[far] == PointStatus::Known);
            if let Some(far) = far {
                let v2 = if inputs.side[far] == inputs.side[index] {
                    inputs.values[far]
                } else {
                    -inputs.values[far]
                };
                if v2 <= v1 {
                    term.weight = 9.0 / (4.0 * h * h);
                    term.center = (4.0 * v1 - v2) / 3.0;
                    term.far = Some(far);
                }
            }
        }

        terms[num_terms] = term;
        num_terms += 1;
    }

    if num_terms == 0 {
        return Err(FmmError::DegenerateStencil { index });
    }

    terms[..num_terms].sort_by(|a, b| {
        a.center
            .partial_cmp(&b.center)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let rhs = slowness * slowness;
    let mut fallbacks = 0;
    let smallest_subset = if num_terms == 1 { 1 } else { 2 };
    for used in (smallest_subset..=num_terms).rev() {
        if let Some(value) = solve_quadratic(&terms[..used], rhs) {
            return Ok(StencilUpdate {
                value,
                terms,
                num_terms,
                kind: UpdateKind::Quadratic(used),
                fallbacks,
            });
        }
        fallbacks += 1;
    }

    let mut pick = 0;
    let mut value = f64::INFINITY;
    for (i, t) in terms[..num_terms].iter().enumerate() {
        let candidate = t.near_value + spacing[t.axis] * slowness;
        if candidate < value {
            value = candidate;
            pick = i;
        }
    }
    Ok(StencilUpdate {
        value,
        terms,
        num_terms,
        kind: UpdateKind::SingleAxis(pick),
        fallbacks,
    })
}
