// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! A Fast Marching Method solver for level set reinitialization and
//! velocity extension.
//!
//! Given a level set function `phi` sampled on a 1D, 2D or 3D Cartesian grid
//! with a ghost margin, the solver computes the distance from every grid
//! point to the zero level set by solving |∇d| = 1 outward from the
//! interface in order of increasing distance. Auxiliary fields known near
//! the interface can be carried along so that ∇d · ∇F = 0, and a general
//! arrival-time problem |∇T| = 1/speed can be marched from known values.
//!
//! First- and second-order upwind stencils are available. Results are
//! deterministic: the march is sequential with ties broken by grid index,
//! and only the per-point front scan runs in parallel.

#![warn(missing_docs)]

/// Result assembly: unreached values, ghost fill, output buffers.
pub mod assembler;
/// Solver options.
pub mod config;
/// Grid geometry and index mapping.
pub mod core;
/// Error types for the library.
pub mod error;
/// Interface detection and sub-cell initial distances.
pub mod front;
/// Indexed binary min-heap with decrease-key.
pub mod heap;
/// File I/O for loading fields and saving results.
pub mod io;
/// The marching loop and public solver.
pub mod scheduler;
/// Upwind stencil evaluation.
pub mod update_kernels;

pub use crate::assembler::FmmOutput;
pub use crate::config::{DistanceSign, FmmConfig, GhostFill, StencilOrder};
pub use crate::core::{GridBox, GridGeometry, IndexMap};
pub use crate::error::{ErrorKind, FmmError, Result};
pub use crate::scheduler::{Extraction, FmmSolver, SolveStats};
