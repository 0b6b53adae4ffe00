// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::str::FromStr;

use crate::error::{FmmError, Result};

/// Accuracy of the one-sided finite differences used by the stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilOrder {
    /// First-order upwind differences.
    #[default]
    First,
    /// Second-order upwind differences where the second neighbor is known.
    Second,
}

impl TryFrom<u8> for StencilOrder {
    type Error = FmmError;

    fn try_from(order: u8) -> Result<Self> {
        match order {
            1 => Ok(StencilOrder::First),
            2 => Ok(StencilOrder::Second),
            other => Err(FmmError::UnsupportedOrder(other)),
        }
    }
}

impl From<StencilOrder> for u8 {
    fn from(order: StencilOrder) -> u8 {
        match order {
            StencilOrder::First => 1,
            StencilOrder::Second => 2,
        }
    }
}

/// How points in the ghost margin are populated when they are not marched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GhostFill {
    /// Ghost points are set to zero.
    Zero,
    /// Ghost points copy the nearest interior point.
    Nearest,
    /// Linear extrapolation from the two nearest interior points along the
    /// outward axis.
    #[default]
    Linear,
}

impl FromStr for GhostFill {
    type Err = FmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" => Ok(GhostFill::Zero),
            "nearest" => Ok(GhostFill::Nearest),
            "linear" => Ok(GhostFill::Linear),
            other => Err(FmmError::InvalidGhostFill(other.to_string())),
        }
    }
}

/// Sign convention of the output distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceSign {
    /// Distances are non-negative everywhere.
    #[default]
    Unsigned,
    /// Reached distances take the sign of the input field.
    Signed,
}

/// Solver options.
///
/// ### Default Values
/// - `order`: [`StencilOrder::First`]
/// - `max_distance`: `None` (march until the queue is empty)
/// - `unreached_distance`: `f64::INFINITY`
/// - `unreached_extension`: `0.0`
/// - `sign`: [`DistanceSign::Unsigned`]
/// - `ghost_fill`: [`GhostFill::Linear`]
/// - `march_ghost_cells`: `false`
/// - `record_extractions`: `false`
#[derive(Debug, Clone, PartialEq)]
pub struct FmmConfig {
    /// Stencil order.
    pub order: StencilOrder,
    /// Stop once the smallest tentative distance exceeds this value.
    pub max_distance: Option<f64>,
    /// Distance assigned to points that are never finalized.
    pub unreached_distance: f64,
    /// Extension value assigned to points that are never finalized.
    pub unreached_extension: f64,
    /// Output sign convention.
    pub sign: DistanceSign,
    /// Ghost margin convention, used when ghost cells are not marched.
    pub ghost_fill: GhostFill,
    /// March over the ghost margin as if it were interior.
    pub march_ghost_cells: bool,
    /// Keep the sequence of finalized points in the output.
    pub record_extractions: bool,
}

impl Default for FmmConfig {
    fn default() -> Self {
        FmmConfig {
            order: StencilOrder::First,
            max_distance: None,
            unreached_distance: f64::INFINITY,
            unreached_extension: 0.0,
            sign: DistanceSign::Unsigned,
            ghost_fill: GhostFill::Linear,
            march_ghost_cells: false,
            record_extractions: false,
        }
    }
}

impl FmmConfig {
    /// Check the option values.
    ///
    /// # Errors
    /// Returns an error if `max_distance` is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if let Some(d) = self.max_distance {
            if !d.is_finite() || d < 0.0 {
                return Err(FmmError::InvalidMaxDistance(d));
            }
        }
        Ok(())
    }
}
