// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use tracing::{debug, trace, warn};

use crate::assembler::{FmmOutput, RawSolution};
use crate::config::{DistanceSign, FmmConfig, GhostFill, StencilOrder};
use crate::core::{GridBox, GridGeometry, IndexMap};
use crate::error::{FmmError, Result};
use crate::front::{locate_front, FrontInputs, FrontPoint};
use crate::heap::IndexedMinHeap;
use crate::update_kernels::{evaluate, PointStatus, StencilInputs, StencilUpdate};

/// Counters gathered during a solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveStats {
    /// Points frozen before marching started.
    pub front_points: usize,
    /// Points with a final value, front included.
    pub known_points: usize,
    /// Unmasked points in the marching region that never became known.
    pub unreached_points: usize,
    /// Points excluded by the mask.
    pub masked_points: usize,
    /// Stencil evaluations that had to drop axes or fall back to a single neighbor.
    pub quadratic_fallbacks: u64,
    /// Successful decrease-key operations.
    pub decrease_keys: u64,
    /// Marching stopped at the maximum distance with points still queued.
    pub stopped_early: bool,
}

/// One finalized point, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    /// Linear index.
    pub index: usize,
    /// Final distance.
    pub distance: f64,
}

/// A Fast Marching Method solver on a Cartesian grid.
///
/// The solver holds only geometry and options; every entry point allocates
/// its own working state, so one solver can serve concurrent solves.
///
/// ```no_run
/// use eikonal_fmm::{FmmSolver, GridGeometry};
///
/// let grid = GridGeometry::<2>::new([-50, -50], [50, 50], 0, [0.02, 0.02])?;
/// let phi: Vec<f64> = (0..101 * 101)
///     .map(|i| {
///         let (x, y) = ((i / 101) as f64 * 0.02 - 1.0, (i % 101) as f64 * 0.02 - 1.0);
///         (x * x + y * y).sqrt() - 0.5
///     })
///     .collect();
/// let out = FmmSolver::new(grid).with_order(2)?.compute_distance(&phi)?;
/// assert!(out.distance().iter().all(|d| *d >= 0.0));
/// # Ok::<(), eikonal_fmm::FmmError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FmmSolver<const N: usize> {
    geometry: GridGeometry<N>,
    config: FmmConfig,
    mask: Option<Vec<bool>>,
    num_threads: Option<usize>,
}

impl<const N: usize> FmmSolver<N> {
    /// Create a solver with default options.
    pub fn new(geometry: GridGeometry<N>) -> Self {
        FmmSolver {
            geometry,
            config: FmmConfig::default(),
            mask: None,
            num_threads: None,
        }
    }

    /// Replace all options at once (builder method).
    ///
    /// # Errors
    /// Returns an error if the options fail [`FmmConfig::validate`].
    pub fn with_config(mut self, config: FmmConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Set the stencil order, 1 or 2 (builder method).
    ///
    /// # Errors
    /// Returns [`FmmError::UnsupportedOrder`] for any other value.
    pub fn with_order(mut self, order: u8) -> Result<Self> {
        self.config.order = StencilOrder::try_from(order)?;
        Ok(self)
    }

    /// Exclude points from the solve (builder method). `true` marks an
    /// excluded point.
    ///
    /// # Errors
    /// Returns [`FmmError::ShapeMismatch`] if the mask length is wrong.
    pub fn with_mask(mut self, mask: Vec<bool>) -> Result<Self> {
        self.geometry.check_len("mask", mask.len())?;
        self.mask = Some(mask);
        Ok(self)
    }

    /// Stop marching once the smallest tentative distance exceeds `distance`
    /// (builder method).
    ///
    /// # Errors
    /// Returns [`FmmError::InvalidMaxDistance`] if `distance` is negative or not finite.
    pub fn with_max_distance(mut self, distance: f64) -> Result<Self> {
        let config = FmmConfig {
            max_distance: Some(distance),
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Values written to points that never become known (builder method).
    pub fn with_unreached_values(mut self, distance: f64, extension: f64) -> Self {
        self.config.unreached_distance = distance;
        self.config.unreached_extension = extension;
        self
    }

    /// Set the output sign convention (builder method).
    pub fn with_sign(mut self, sign: DistanceSign) -> Self {
        self.config.sign = sign;
        self
    }

    /// Set how the ghost margin is filled (builder method).
    pub fn with_ghost_fill(mut self, fill: GhostFill) -> Self {
        self.config.ghost_fill = fill;
        self
    }

    /// March over the ghost margin as if it were interior (builder method).
    pub fn with_ghost_marching(mut self, enabled: bool) -> Self {
        self.config.march_ghost_cells = enabled;
        self
    }

    /// Keep the sequence of finalized points in the output (builder method).
    pub fn with_extraction_log(mut self, enabled: bool) -> Self {
        self.config.record_extractions = enabled;
        self
    }

    /// Number of threads for the front scan (builder method).
    /// If not specified, rayon's global pool is used.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Get a reference to the grid geometry.
    pub fn geometry(&self) -> &GridGeometry<N> {
        &self.geometry
    }

    /// Get a reference to the options.
    pub fn config(&self) -> &FmmConfig {
        &self.config
    }

    /// Distance to the zero level set of `phi`.
    ///
    /// # Errors
    /// Returns an error if `phi` has the wrong length, or if an internal
    /// invariant is violated during marching.
    pub fn compute_distance(&self, phi: &[f64]) -> Result<FmmOutput<N>> {
        self.compute_extension_fields(phi, &[])
    }

    /// Distance to the zero level set of `phi`, plus each source field
    /// extended off the interface so that its gradient is orthogonal to the
    /// distance gradient.
    ///
    /// # Errors
    /// Returns an error if `phi` or any source has the wrong length, or if an
    /// internal invariant is violated during marching.
    pub fn compute_extension_fields(
        &self,
        phi: &[f64],
        sources: &[&[f64]],
    ) -> Result<FmmOutput<N>> {
        self.geometry.check_len("phi", phi.len())?;
        for (k, source) in sources.iter().enumerate() {
            self.geometry
                .check_len(&format!("source field {}", k), source.len())?;
        }

        let region = self.region();
        debug!(
            points = self.geometry.num_points(),
            order = ?self.config.order,
            fields = sources.len(),
            "starting fast marching"
        );

        let front = self.scan_front(phi, &region)?;
        if front.is_empty() {
            warn!("phi has no zero crossing; no point can be reached");
        }

        let side = phi.iter().map(|&p| p >= 0.0).collect();
        let mut march = March::new(self, region, side, Slowness::Unit, sources.len());
        march.seed(&front, sources)?;
        march.run(self.config.max_distance)?;
        Ok(march.finish(self))
    }

    /// First-arrival times for a front moving at `speed`.
    ///
    /// Points where `boundary >= 0` are frozen at that value; negative
    /// entries are solved for.
    ///
    /// # Errors
    /// Returns an error if a field has the wrong length, if any speed is not
    /// positive and finite, or if an internal invariant is violated.
    pub fn solve_eikonal(&self, boundary: &[f64], speed: &[f64]) -> Result<FmmOutput<N>> {
        self.geometry.check_len("boundary", boundary.len())?;
        self.geometry.check_len("speed", speed.len())?;
        if let Some((index, &value)) = speed
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(FmmError::InvalidSpeed { index, value });
        }

        let region = self.region();
        debug!(
            points = self.geometry.num_points(),
            order = ?self.config.order,
            "starting eikonal march"
        );

        let front: Vec<FrontPoint> = boundary
            .iter()
            .enumerate()
            .filter(|&(i, &b)| b >= 0.0 && region.contains(&self.geometry, i) && !self.masked(i))
            .map(|(index, &distance)| FrontPoint { index, distance })
            .collect();
        if front.is_empty() {
            warn!("boundary has no known value; no point can be reached");
        }

        let side = vec![true; boundary.len()];
        let mut march = March::new(self, region, side, Slowness::Speed(speed), 0);
        march.seed(&front, &[])?;
        march.run(self.config.max_distance)?;
        Ok(march.finish(self))
    }

    fn region(&self) -> GridBox<N> {
        if self.config.march_ghost_cells {
            self.geometry.full_box()
        } else {
            self.geometry.interior_box()
        }
    }

    fn masked(&self, index: usize) -> bool {
        self.mask.as_ref().is_some_and(|m| m[index])
    }

    fn scan_front(&self, phi: &[f64], region: &GridBox<N>) -> Result<Vec<FrontPoint>> {
        let inputs = FrontInputs {
            grid: &self.geometry,
            region,
            phi,
            mask: self.mask.as_deref(),
            order: self.config.order,
        };
        let front = match self.num_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| FmmError::Other(e.to_string()))?;
                pool.install(|| locate_front(&inputs))
            }
            None => locate_front(&inputs),
        };
        debug!(front_points = front.len(), "front located");
        Ok(front)
    }
}

#[derive(Clone, Copy)]
enum Slowness<'a> {
    Unit,
    Speed(&'a [f64]),
}

impl Slowness<'_> {
    #[inline]
    fn at(&self, index: usize) -> f64 {
        match self {
            Slowness::Unit => 1.0,
            Slowness::Speed(speed) => 1.0 / speed[index],
        }
    }
}

/// Working state of one solve.
struct March<'a, const N: usize> {
    grid: &'a GridGeometry<N>,
    region: GridBox<N>,
    mask: Option<&'a [bool]>,
    order: StencilOrder,
    slowness: Slowness<'a>,
    values: Vec<f64>,
    status: Vec<PointStatus>,
    side: Vec<bool>,
    heap: IndexedMinHeap,
    extensions: Vec<Vec<f64>>,
    /// Key of the most recent extraction; tentative values never go below it.
    level: f64,
    stats: SolveStats,
    log: Option<Vec<Extraction>>,
}

impl<'a, const N: usize> March<'a, N> {
    fn new(
        solver: &'a FmmSolver<N>,
        region: GridBox<N>,
        side: Vec<bool>,
        slowness: Slowness<'a>,
        num_fields: usize,
    ) -> Self {
        let n = solver.geometry.num_points();
        March {
            grid: &solver.geometry,
            region,
            mask: solver.mask.as_deref(),
            order: solver.config.order,
            slowness,
            values: vec![f64::INFINITY; n],
            status: vec![PointStatus::Unknown; n],
            side,
            heap: IndexedMinHeap::with_capacity(n),
            extensions: vec![vec![0.0; n]; num_fields],
            level: f64::NEG_INFINITY,
            stats: SolveStats::default(),
            log: solver.config.record_extractions.then(Vec::new),
        }
    }

    #[inline]
    fn masked(&self, index: usize) -> bool {
        self.mask.is_some_and(|m| m[index])
    }

    /// Freeze the front, then relax its neighbors in increasing index order.
    fn seed(&mut self, front: &[FrontPoint], sources: &[&[f64]]) -> Result<()> {
        for f in front {
            self.values[f.index] = f.distance;
            self.status[f.index] = PointStatus::Known;
            for (ext, source) in self.extensions.iter_mut().zip(sources) {
                ext[f.index] = source[f.index];
            }
        }
        self.stats.front_points = front.len();
        for f in front {
            self.relax_neighbors(f.index)?;
        }
        Ok(())
    }

    fn run(&mut self, max_distance: Option<f64>) -> Result<()> {
        while let Some((_, key)) = self.heap.peek_min() {
            if max_distance.is_some_and(|m| key > m) {
                self.stats.stopped_early = true;
                break;
            }
            let Some((point, distance)) = self.heap.extract_min() else {
                break;
            };
            debug_assert!(
                distance >= self.level,
                "extraction order violated at {}: {} after {}",
                point,
                distance,
                self.level
            );
            self.level = distance;
            self.status[point] = PointStatus::Known;
            if let Some(log) = &mut self.log {
                log.push(Extraction {
                    index: point,
                    distance,
                });
            }
            self.relax_neighbors(point)?;
        }
        Ok(())
    }

    fn relax_neighbors(&mut self, point: usize) -> Result<()> {
        for axis in 0..N {
            for forward in [false, true] {
                let Some(q) = self.grid.step(point, axis, forward, &self.region) else {
                    continue;
                };
                if self.status[q] == PointStatus::Known || self.masked(q) {
                    continue;
                }
                self.relax(q)?;
            }
        }
        Ok(())
    }

    fn relax(&mut self, q: usize) -> Result<()> {
        let update = {
            let inputs = StencilInputs {
                grid: self.grid,
                region: &self.region,
                values: &self.values,
                status: &self.status,
                side: &self.side,
                order: self.order,
            };
            evaluate(&inputs, q, self.slowness.at(q))?
        };
        if update.fallbacks > 0 {
            self.stats.quadratic_fallbacks += 1;
            trace!(
                index = q,
                rejected = update.fallbacks,
                kind = ?update.kind,
                "stencil fell back to fewer axes"
            );
        }

        let value = update.value.max(self.level);
        match self.status[q] {
            PointStatus::Unknown => {
                self.accept(q, value, &update);
                self.status[q] = PointStatus::Trial;
                self.heap.insert(q, value)?;
            }
            PointStatus::Trial if value < self.values[q] => {
                self.accept(q, value, &update);
                self.heap.decrease_key(q, value)?;
                self.stats.decrease_keys += 1;
            }
            _ => {}
        }
        Ok(())
    }

    fn accept(&mut self, q: usize, value: f64, update: &StencilUpdate) {
        self.values[q] = value;
        for ext in self.extensions.iter_mut() {
            let extended = update.extend(ext);
            ext[q] = extended;
        }
    }

    fn finish(mut self, solver: &FmmSolver<N>) -> FmmOutput<N> {
        let mut known = 0;
        let mut unreached = 0;
        let mut masked = 0;
        for (i, status) in self.status.iter().enumerate() {
            if self.masked(i) {
                masked += 1;
            } else if *status == PointStatus::Known {
                known += 1;
            } else if self.region.contains(self.grid, i) {
                unreached += 1;
            }
        }
        self.stats.known_points = known;
        self.stats.unreached_points = unreached;
        self.stats.masked_points = masked;
        debug!(
            known = known,
            unreached = unreached,
            fallbacks = self.stats.quadratic_fallbacks,
            stopped_early = self.stats.stopped_early,
            "fast marching finished"
        );

        FmmOutput::assemble(
            &solver.geometry,
            &solver.config,
            &self.region,
            RawSolution {
                values: self.values,
                status: self.status,
                side: self.side,
                extensions: self.extensions,
                stats: self.stats,
                extraction_log: self.log,
            },
        )
    }
}
