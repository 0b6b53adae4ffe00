// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use approx::assert_relative_eq;

use eikonal_fmm::config::{DistanceSign, GhostFill};
use eikonal_fmm::core::{GridGeometry, IndexMap};
use eikonal_fmm::error::{ErrorKind, FmmError};
use eikonal_fmm::scheduler::FmmSolver;

/// 101x101 grid over [-1, 1]^2 with dx = 0.02.
fn square_grid() -> GridGeometry<2> {
    GridGeometry::<2>::new([-50, -50], [50, 50], 0, [0.02, 0.02]).unwrap()
}

fn radius<const N: usize>(grid: &GridGeometry<N>, i: usize) -> f64 {
    grid.position(i).iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn circle_phi(grid: &GridGeometry<2>) -> Vec<f64> {
    (0..grid.num_points())
        .map(|i| radius(grid, i) - 0.5)
        .collect()
}

/// Test 1: Circle, first order.
/// phi = |x| - 0.5 is already a distance, so the exact answer is |phi|.
/// The L-inf error over the whole grid must stay below 5 dx.
#[test]
fn circle_first_order_error() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let out = FmmSolver::new(grid).compute_distance(&phi).unwrap();

    let max_err = out
        .distance()
        .iter()
        .zip(&phi)
        .map(|(d, p)| (d - p.abs()).abs())
        .fold(0.0_f64, f64::max);
    assert!(max_err < 5.0 * 0.02, "max error {} exceeds 5dx", max_err);
}

/// Test 2: Circle, second order.
/// Error below 5 dx^2 everywhere at least 0.15 from the centre, where the
/// exact distance has a kink and no stencil can be second order.
#[test]
fn circle_second_order_error() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let out = FmmSolver::new(grid.clone())
        .with_order(2)
        .unwrap()
        .compute_distance(&phi)
        .unwrap();

    let mut max_err = 0.0_f64;
    for (i, (d, p)) in out.distance().iter().zip(&phi).enumerate() {
        if radius(&grid, i) >= 0.15 {
            max_err = max_err.max((d - p.abs()).abs());
        }
    }
    assert!(max_err < 5.0 * 0.02 * 0.02, "max error {} exceeds 5dx^2", max_err);
}

/// Test 2b: Circle, second order, whole grid.
/// The largest error sits at the kink in the centre and is bounded by
/// 20 dx^2; beyond 0.15 from the centre the 5 dx^2 bound holds.
#[test]
fn circle_second_order_error_at_centre() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let out = FmmSolver::new(grid.clone())
        .with_order(2)
        .unwrap()
        .compute_distance(&phi)
        .unwrap();

    let (worst, max_err) = out
        .distance()
        .iter()
        .zip(&phi)
        .map(|(d, p)| (d - p.abs()).abs())
        .enumerate()
        .fold((0, 0.0_f64), |best, (i, e)| if e > best.1 { (i, e) } else { best });
    let dx2 = 0.02 * 0.02;
    assert!(max_err < 20.0 * dx2, "max error {} exceeds 20dx^2", max_err);
    assert!(max_err > 5.0 * dx2, "centre error {} unexpectedly small", max_err);
    assert!(
        radius(&grid, worst) < 0.15,
        "largest error at r = {}, away from the centre",
        radius(&grid, worst)
    );
}

/// Test 3: A level set that is not a distance function.
/// phi = |x|^2 - 0.25 has the same zero set as the circle; the result must
/// still approximate the distance to it.
#[test]
fn non_distance_level_set() {
    let grid = square_grid();
    let phi: Vec<f64> = (0..grid.num_points())
        .map(|i| radius(&grid, i).powi(2) - 0.25)
        .collect();

    let check = |order: u8, bound: f64, lo: f64, hi: f64| {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .compute_distance(&phi)
            .unwrap();
        let mut max_err = 0.0_f64;
        for (i, d) in out.distance().iter().enumerate() {
            let r = radius(&grid, i);
            if r >= lo && r <= hi {
                max_err = max_err.max((d - (r - 0.5).abs()).abs());
            }
        }
        assert!(
            max_err < bound,
            "order {}: max error {} exceeds {}",
            order,
            max_err,
            bound
        );
    };
    check(1, 5.0 * 0.02, 0.0, f64::INFINITY);
    check(2, 5.0 * 0.02 * 0.02, 0.15, 0.9);
}

/// Test 4: Sign and zero set.
/// Every reached distance is non-negative, and points where phi is exactly
/// zero get distance zero.
#[test]
fn distance_nonnegative_and_zero_on_interface() {
    let grid = GridGeometry::<2>::new([-10, -10], [10, 10], 0, [0.25, 0.25]).unwrap();
    // Tilted line through grid points where x == 2y.
    let phi: Vec<f64> = (0..grid.num_points())
        .map(|i| {
            let x = grid.position(i);
            (x[0] - 2.0 * x[1]) / 5.0_f64.sqrt()
        })
        .collect();
    for order in [1, 2] {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .compute_distance(&phi)
            .unwrap();
        let mut zeros = 0;
        for (d, p) in out.distance().iter().zip(&phi) {
            assert!(*d >= 0.0, "negative distance {}", d);
            if *p == 0.0 {
                assert_eq!(*d, 0.0);
                zeros += 1;
            }
        }
        assert!(zeros > 0);
    }
}

/// Test 5: Extraction order is non-decreasing on a full-size problem.
#[test]
fn extraction_order_is_monotone() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    for order in [1, 2] {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .with_extraction_log(true)
            .compute_distance(&phi)
            .unwrap();
        let log = out.extraction_log().unwrap();
        assert!(!log.is_empty());
        for w in log.windows(2) {
            assert!(
                w[0].distance <= w[1].distance,
                "order {}: {} extracted after {}",
                order,
                w[1].distance,
                w[0].distance
            );
        }
    }
}

/// Test 6: A constant field extends to the same constant everywhere reached.
#[test]
fn constant_extension_is_preserved() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let source = vec![3.7; grid.num_points()];
    for order in [1, 2] {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .compute_extension_fields(&phi, &[&source])
            .unwrap();
        assert_eq!(out.num_extension_fields(), 1);
        for (i, v) in out.extension_field(0).unwrap().iter().enumerate() {
            assert!(out.is_known(i));
            assert_relative_eq!(*v, 3.7, epsilon = 1e-12);
        }
    }
}

/// Test 7: An angular field is carried along normals.
/// For the circle, the extension of theta = atan2(y, x) from the interface
/// is theta itself away from the centre and the branch cut.
#[test]
fn angular_extension_follows_normals() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let theta: Vec<f64> = (0..grid.num_points())
        .map(|i| {
            let x = grid.position(i);
            x[1].atan2(x[0])
        })
        .collect();
    let out = FmmSolver::new(grid.clone())
        .compute_extension_fields(&phi, &[&theta])
        .unwrap();
    let ext = out.extension_field(0).unwrap();
    let mut max_err = 0.0_f64;
    for i in 0..grid.num_points() {
        let x = grid.position(i);
        let r = radius(&grid, i);
        // Stay clear of the centre and of the cut along the negative x axis.
        if (0.3..=0.8).contains(&r) && x[0] > 0.0 {
            max_err = max_err.max((ext[i] - theta[i]).abs());
        }
    }
    assert!(max_err < 0.1, "max angular error {}", max_err);
}

/// Test 8: Repeated solves are bit-identical.
#[test]
fn repeated_runs_are_identical() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let source: Vec<f64> = (0..grid.num_points()).map(|i| (i % 7) as f64).collect();
    let solver = FmmSolver::new(grid).with_order(2).unwrap();
    let a = solver.compute_extension_fields(&phi, &[&source]).unwrap();
    let b = solver.compute_extension_fields(&phi, &[&source]).unwrap();
    let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(a.distance()), bits(b.distance()));
    assert_eq!(
        bits(a.extension_field(0).unwrap()),
        bits(b.extension_field(0).unwrap())
    );
}

/// Test 9: Masked points are never marched and block propagation.
#[test]
fn mask_blocks_propagation() {
    let grid = GridGeometry::<2>::from_shape([5, 20], [0.1, 0.1]).unwrap();
    // Interface between columns 2 and 3; wall of masked points at column 10.
    let phi: Vec<f64> = (0..100).map(|i| ((i % 20) as f64 - 2.5) * 0.1).collect();
    let mask: Vec<bool> = (0..100).map(|i| i % 20 == 10).collect();
    let out = FmmSolver::new(grid)
        .with_mask(mask)
        .unwrap()
        .compute_distance(&phi)
        .unwrap();
    for i in 0..100 {
        let col = i % 20;
        if col < 10 {
            assert!(out.is_known(i));
            assert_relative_eq!(out.distance()[i], phi[i].abs(), epsilon = 1e-12);
        } else {
            assert!(!out.is_known(i));
            assert!(out.distance()[i].is_infinite());
        }
    }
    assert_eq!(out.stats().masked_points, 5);
    assert_eq!(out.stats().unreached_points, 45);
}

/// Test 10: 1D, sign change halfway between points 4 and 5.
/// Distances are dx/2 + k dx, strictly increasing away from the interface.
#[test]
fn one_dimensional_midpoint_crossing() {
    let dx = 0.1;
    let grid = GridGeometry::<1>::new([0], [9], 0, [dx]).unwrap();
    let phi: Vec<f64> = (0..10).map(|i| (i as f64 - 4.5) * dx).collect();
    for order in [1, 2] {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .compute_distance(&phi)
            .unwrap();
        let d = out.distance();
        for k in 0..5 {
            assert_relative_eq!(d[4 - k], dx / 2.0 + k as f64 * dx, epsilon = 1e-12);
            assert_relative_eq!(d[5 + k], dx / 2.0 + k as f64 * dx, epsilon = 1e-12);
        }
        for i in 0..4 {
            assert!(d[i] > d[i + 1]);
        }
        for i in 5..9 {
            assert!(d[i] < d[i + 1]);
        }
    }
}

/// Test 11: 1D, phi exactly zero at point 4.
#[test]
fn one_dimensional_zero_point() {
    let dx = 0.1;
    let grid = GridGeometry::<1>::new([0], [9], 0, [dx]).unwrap();
    let phi: Vec<f64> = (0..10).map(|i| (i as f64 - 4.0) * dx).collect();
    for order in [1, 2] {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .compute_distance(&phi)
            .unwrap();
        for (i, d) in out.distance().iter().enumerate() {
            assert_relative_eq!(*d, (i as f64 - 4.0).abs() * dx, epsilon = 1e-12);
        }
        assert_eq!(out.distance()[4], 0.0);
    }
}

/// Test 12: Second-order regression on a small anisotropic grid.
/// Pins the distances and the number of stencils that had to fall back to
/// fewer axes, so changes to the order-2 acceptance rules are caught.
#[test]
fn second_order_fallback_regression() {
    let (h0, h1) = (0.125, 0.5);
    let grid = GridGeometry::<2>::from_shape([9, 9], [h0, h1]).unwrap();
    let phi: Vec<f64> = (0..81)
        .map(|i| {
            let dx = (i / 9) as f64 * h0 - 0.53;
            let dy = (i % 9) as f64 * h1 - 0.82;
            (dx * dx + dy * dy).sqrt() - 0.7
        })
        .collect();
    let out = FmmSolver::new(grid)
        .with_order(2)
        .unwrap()
        .compute_distance(&phi)
        .unwrap();

    assert_eq!(out.stats().quadratic_fallbacks, 3);
    let pinned = [
        (0, 0.31806074148271835),
        (8, 2.514481109023178),
        (40, 0.48041691137846265),
        (44, 2.480303041026884),
        (72, 0.2803771194121334),
        (76, 0.5641917551632705),
        (80, 2.510293353274443),
    ];
    for (i, expected) in pinned {
        assert_relative_eq!(out.distance()[i], expected, epsilon = 1e-9);
    }
}

/// Test 13: 3D sphere sanity check on a 41^3 grid over [-1, 1]^3.
#[test]
fn sphere_3d() {
    let h = 0.05;
    let grid = GridGeometry::<3>::new([-20; 3], [20; 3], 0, [h; 3]).unwrap();
    let phi: Vec<f64> = (0..grid.num_points())
        .map(|i| radius(&grid, i) - 0.5)
        .collect();

    let max_err = |order: u8, min_r: f64| -> f64 {
        let out = FmmSolver::new(grid.clone())
            .with_order(order)
            .unwrap()
            .compute_distance(&phi)
            .unwrap();
        assert_eq!(out.stats().unreached_points, 0);
        let mut max_err = 0.0_f64;
        for (i, (d, p)) in out.distance().iter().zip(&phi).enumerate() {
            if radius(&grid, i) >= min_r {
                max_err = max_err.max((d - p.abs()).abs());
            }
        }
        max_err
    };

    let err1 = max_err(1, 0.0);
    assert!(err1 < 2.0 * h, "first order 3D error {}", err1);
    let err2 = max_err(2, 0.25);
    assert!(err2 < 5.0 * h * h, "second order 3D error {}", err2);
}

/// Test 14: Marching stops at the maximum distance.
#[test]
fn max_distance_limits_band() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let band = 0.1;
    let out = FmmSolver::new(grid)
        .with_max_distance(band)
        .unwrap()
        .compute_distance(&phi)
        .unwrap();
    assert!(out.stats().stopped_early);
    for (i, p) in phi.iter().enumerate() {
        if out.is_known(i) {
            assert!(out.distance()[i] <= band + 1e-12);
        } else {
            assert!(out.distance()[i].is_infinite());
            assert!(p.abs() > band - 0.02);
        }
        if p.abs() < band - 0.02 {
            assert!(out.is_known(i), "point at |phi| = {} not reached", p.abs());
        }
    }
}

/// Test 15: Arrival times from a point source at speed 2.
/// Analytical solution: T(x) = |x - xs| / 2.
#[test]
fn eikonal_point_source() {
    let h = 0.05;
    let grid = GridGeometry::<2>::new([-20, -20], [20, 20], 0, [h, h]).unwrap();
    let mut boundary = vec![-1.0; grid.num_points()];
    boundary[grid.to_linear([0, 0]).unwrap()] = 0.0;
    let speed = vec![2.0; grid.num_points()];
    let out = FmmSolver::new(grid.clone())
        .solve_eikonal(&boundary, &speed)
        .unwrap();

    let max_err = (0..grid.num_points())
        .map(|i| (out.distance()[i] - radius(&grid, i) / 2.0).abs())
        .fold(0.0_f64, f64::max);
    assert!(max_err < h, "point source error {}", max_err);
    assert_eq!(out.stats().front_points, 1);
}

/// Test 16: Signed output is negative inside the circle.
#[test]
fn signed_distance_inside_circle() {
    let grid = square_grid();
    let phi = circle_phi(&grid);
    let out = FmmSolver::new(grid)
        .with_sign(DistanceSign::Signed)
        .compute_distance(&phi)
        .unwrap();
    for (d, p) in out.distance().iter().zip(&phi) {
        if *p < 0.0 {
            assert!(*d < 0.0);
        } else {
            assert!(*d >= 0.0);
        }
        assert!((d - p).abs() < 0.1);
    }
}

/// Test 17: Linear ghost fill reproduces a planar distance.
#[test]
fn ghost_margin_linear_fill() {
    let grid = GridGeometry::<2>::new([-5, -5], [5, 5], 2, [0.1, 0.1]).unwrap();
    let phi: Vec<f64> = (0..grid.num_points())
        .map(|i| grid.position(i)[0] - 0.25)
        .collect();
    let out = FmmSolver::new(grid.clone())
        .with_ghost_fill(GhostFill::Linear)
        .compute_distance(&phi)
        .unwrap();
    let interior = grid.interior_box();
    let mut ghosts = 0;
    for (i, p) in phi.iter().enumerate() {
        assert_relative_eq!(out.distance()[i], p.abs(), epsilon = 1e-9);
        if !interior.contains(&grid, i) {
            assert!(!out.is_known(i));
            ghosts += 1;
        }
    }
    assert_eq!(ghosts, 15 * 15 - 11 * 11);
}

/// Test 18: Malformed inputs are configuration errors.
#[test]
fn configuration_errors() {
    let err = GridGeometry::<2>::new([0, 4], [3, 3], 0, [1.0, 1.0]).unwrap_err();
    assert!(matches!(err, FmmError::InvalidExtents { axis: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let err = GridGeometry::<1>::new([0], [3], 0, [-1.0]).unwrap_err();
    assert!(matches!(err, FmmError::InvalidSpacing { .. }));

    let grid = GridGeometry::<1>::new([0], [3], 0, [1.0]).unwrap();
    assert!(matches!(
        FmmSolver::new(grid.clone()).with_order(3),
        Err(FmmError::UnsupportedOrder(3))
    ));
    assert!(matches!(
        FmmSolver::new(grid.clone()).with_max_distance(-0.5),
        Err(FmmError::InvalidMaxDistance(_))
    ));

    let phi = [-1.5, -0.5, 0.5, 1.5];
    let short = [0.0; 3];
    let sources: [&[f64]; 2] = [&phi, &short];
    let err = FmmSolver::new(grid)
        .compute_extension_fields(&phi, &sources)
        .unwrap_err();
    match err {
        FmmError::ShapeMismatch { field, expected, got } => {
            assert_eq!(field, "source field 1");
            assert_eq!(expected, vec![4]);
            assert_eq!(got, vec![3]);
        }
        other => panic!("expected ShapeMismatch, got {}", other),
    }
}
