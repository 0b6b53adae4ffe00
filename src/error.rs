// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Broad classification of [`FmmError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed grid, shape, order, or file parameters, detected before marching.
    Configuration,
    /// A bookkeeping defect detected during a solve. The solve is aborted.
    InternalInvariant,
    /// Failure reading or writing files.
    Io,
}

/// Errors that can occur during solver setup, marching, or I/O.
#[derive(Debug)]
pub enum FmmError {
    /// Lower index exceeds upper index on an axis.
    InvalidExtents {
        /// The axis index.
        axis: usize,
        /// Lower index on that axis.
        lower: i64,
        /// Upper index on that axis.
        upper: i64,
    },
    /// Grid spacing is not positive and finite.
    InvalidSpacing {
        /// The axis index.
        axis: usize,
        /// The spacing provided.
        value: f64,
    },
    /// Only 1, 2 and 3 dimensional grids are supported.
    UnsupportedDimension(usize),
    /// Stencil order other than 1 or 2.
    UnsupportedOrder(u8),
    /// A field slice does not have one value per grid point.
    ShapeMismatch {
        /// Which field was malformed.
        field: String,
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Speed value is not positive and finite.
    InvalidSpeed {
        /// The flat index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Stopping distance is negative or not finite.
    InvalidMaxDistance(f64),
    /// Coordinate lies outside the ghost-extended grid.
    OutOfRange {
        /// The offending coordinate.
        coord: Vec<i64>,
    },
    /// Linear index is not smaller than the number of grid points.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of grid points.
        len: usize,
    },
    /// A point was evaluated with no known neighbor.
    DegenerateStencil {
        /// Linear index of the point.
        index: usize,
    },
    /// Priority queue operation on a point that is not queued.
    NotFound {
        /// Linear index of the point.
        point: usize,
    },
    /// Point inserted into the priority queue twice.
    DuplicateEntry {
        /// Linear index of the point.
        point: usize,
    },
    /// Unknown ghost fill name.
    InvalidGhostFill(String),
    /// Unsupported data type in file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl FmmError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FmmError::DegenerateStencil { .. }
            | FmmError::NotFound { .. }
            | FmmError::DuplicateEntry { .. } => ErrorKind::InternalInvariant,
            FmmError::IoError(_) | FmmError::Other(_) => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        }
    }

    pub(crate) fn shape_mismatch(field: &str, expected: &[usize], got: usize) -> Self {
        FmmError::ShapeMismatch {
            field: field.to_string(),
            expected: expected.to_vec(),
            got: vec![got],
        }
    }
}

impl fmt::Display for FmmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FmmError::InvalidExtents { axis, lower, upper } => {
                write!(
                    f,
                    "invalid extents: axis {} has lower {} > upper {}",
                    axis, lower, upper
                )
            }
            FmmError::InvalidSpacing { axis, value } => {
                write!(
                    f,
                    "invalid grid spacing on axis {}: {} (must be positive and finite)",
                    axis, value
                )
            }
            FmmError::UnsupportedDimension(n) => {
                write!(f, "unsupported dimension: {} (must be 1, 2 or 3)", n)
            }
            FmmError::UnsupportedOrder(order) => {
                write!(f, "unsupported stencil order: {} (must be 1 or 2)", order)
            }
            FmmError::ShapeMismatch {
                field,
                expected,
                got,
            } => {
                write!(
                    f,
                    "shape mismatch for {}: expected {:?}, got {:?}",
                    field, expected, got
                )
            }
            FmmError::InvalidSpeed { index, value } => {
                write!(
                    f,
                    "invalid speed at index {}: {} (must be positive and finite)",
                    index, value
                )
            }
            FmmError::InvalidMaxDistance(d) => {
                write!(
                    f,
                    "invalid maximum distance: {} (must be non-negative and finite)",
                    d
                )
            }
            FmmError::OutOfRange { coord } => {
                write!(f, "coordinate {:?} is outside the grid", coord)
            }
            FmmError::IndexOutOfRange { index, len } => {
                write!(f, "linear index {} out of range for {} points", index, len)
            }
            FmmError::DegenerateStencil { index } => {
                write!(f, "degenerate stencil: point {} has no known neighbor", index)
            }
            FmmError::NotFound { point } => {
                write!(f, "point {} is not in the priority queue", point)
            }
            FmmError::DuplicateEntry { point } => {
                write!(f, "point {} is already in the priority queue", point)
            }
            FmmError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            FmmError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            FmmError::MatVariableNotFound {
                expected,
                available,
            } => {
                write!(
                    f,
                    "MAT variable '{}' not found; available variables: {:?}",
                    expected, available
                )
            }
            FmmError::IoError(e) => write!(f, "I/O error: {}", e),
            FmmError::InvalidGhostFill(name) => write!(
                f,
                "unknown ghost fill '{}': expected zero, nearest or linear",
                name
            ),
            FmmError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FmmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FmmError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FmmError {
    fn from(e: std::io::Error) -> Self {
        FmmError::IoError(e)
    }
}

/// Convenience type alias for Results with FmmError.
pub type Result<T> = std::result::Result<T, FmmError>;
