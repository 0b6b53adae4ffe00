// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eikonal_fmm::config::{DistanceSign, GhostFill};
use eikonal_fmm::core::{GridGeometry, IndexMap};
use eikonal_fmm::io;
use eikonal_fmm::scheduler::FmmSolver;

#[derive(Parser)]
#[command(
    name = "eikonal-fmm",
    about = "Fast Marching Method distance, extension and arrival-time solver"
)]
struct Cli {
    /// Dimensionality (1, 2 or 3)
    #[arg(short = 'd', long)]
    dim: usize,

    /// Lower interior index per axis, comma-separated (e.g., -50,-50)
    #[arg(long, allow_hyphen_values = true)]
    lower: String,

    /// Upper interior index per axis, comma-separated (e.g., 50,50)
    #[arg(long, allow_hyphen_values = true)]
    upper: String,

    /// Ghost margin width
    #[arg(long, default_value = "0")]
    ghost: usize,

    /// Grid spacing: one value, or one per axis comma-separated
    #[arg(long, default_value = "1.0")]
    spacing: String,

    /// Level set: "circle:<c0>,..,<r>", "plane:<n0>,..,<offset>", or "file:<path>"
    #[arg(long)]
    phi: Option<String>,

    /// Stencil order (1 or 2)
    #[arg(long, default_value = "1")]
    order: u8,

    /// Exclusion mask file; negative entries are excluded
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Field to extend off the interface: "constant:<v>" or "file:<path>" (repeatable)
    #[arg(long, num_args = 1)]
    extend: Vec<String>,

    /// Speed field, switching to arrival-time mode: "uniform:<v>" or "file:<path>"
    #[arg(long)]
    speed: Option<String>,

    /// Known arrival times for arrival-time mode: "point:<x0>,.." or "file:<path>"
    #[arg(long)]
    boundary: Option<String>,

    /// Stop marching beyond this distance
    #[arg(long)]
    max_distance: Option<f64>,

    /// Give distances the sign of phi
    #[arg(long)]
    signed: bool,

    /// Ghost margin fill: zero, nearest or linear
    #[arg(long, default_value = "linear")]
    ghost_fill: String,

    /// Number of Rayon worker threads for the front scan
    #[arg(long)]
    threads: Option<usize>,

    /// Output file path (.npy or .mat)
    #[arg(short = 'o', long, default_value = "distance.npy")]
    output: PathBuf,

    /// File name prefix for extended fields, written next to the output
    #[arg(long, default_value = "extension_")]
    ext_prefix: String,
}

fn parse_list<T: std::str::FromStr>(s: &str, what: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid {}: expected comma-separated numbers", what))
}

fn parse_axes<T: std::str::FromStr + Copy + Default, const N: usize>(
    s: &str,
    what: &str,
) -> Result<[T; N]>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let parts: Vec<T> = parse_list(s, what)?;
    let mut out = [T::default(); N];
    match parts.len() {
        1 => out = [parts[0]; N],
        n if n == N => out.copy_from_slice(&parts),
        n => bail!("{} has {} components but --dim is {}", what, n, N),
    }
    Ok(out)
}

fn build_phi<const N: usize>(spec: &str, grid: &GridGeometry<N>) -> Result<Vec<f64>> {
    if let Some(params) = spec.strip_prefix("circle:") {
        let p: Vec<f64> = parse_list(params, "circle")?;
        if p.len() != N + 1 {
            bail!("circle expects {} centre components and a radius", N);
        }
        let r = p[N];
        return Ok((0..grid.num_points())
            .map(|i| {
                let x = grid.position(i);
                (0..N).map(|d| (x[d] - p[d]).powi(2)).sum::<f64>().sqrt() - r
            })
            .collect());
    }

    if let Some(params) = spec.strip_prefix("plane:") {
        let p: Vec<f64> = parse_list(params, "plane")?;
        if p.len() != N + 1 {
            bail!("plane expects {} normal components and an offset", N);
        }
        let norm = p[..N].iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            bail!("plane normal must be non-zero");
        }
        return Ok((0..grid.num_points())
            .map(|i| {
                let x = grid.position(i);
                ((0..N).map(|d| p[d] * x[d]).sum::<f64>() - p[N]) / norm
            })
            .collect());
    }

    if let Some(path) = spec.strip_prefix("file:") {
        return io::load_field(Path::new(path), "phi", &grid.shape())
            .map_err(|e| anyhow::anyhow!("{}", e));
    }

    bail!(
        "unknown --phi mode: '{}'. Expected 'circle:<c0>,..,<r>', \
         'plane:<n0>,..,<offset>', or 'file:<path>'",
        spec
    );
}

fn build_source<const N: usize>(spec: &str, grid: &GridGeometry<N>) -> Result<Vec<f64>> {
    if let Some(v) = spec.strip_prefix("constant:") {
        let v: f64 = v.parse().context("invalid constant extension value")?;
        return Ok(vec![v; grid.num_points()]);
    }
    if let Some(path) = spec.strip_prefix("file:") {
        return io::load_field(Path::new(path), "source", &grid.shape())
            .map_err(|e| anyhow::anyhow!("{}", e));
    }
    bail!(
        "unknown --extend mode: '{}'. Expected 'constant:<v>' or 'file:<path>'",
        spec
    );
}

fn build_speed<const N: usize>(spec: &str, grid: &GridGeometry<N>) -> Result<Vec<f64>> {
    if let Some(v) = spec.strip_prefix("uniform:") {
        let v: f64 = v.parse().context("invalid uniform speed value")?;
        if !v.is_finite() || v <= 0.0 {
            bail!("uniform speed must be positive and finite, got {}", v);
        }
        return Ok(vec![v; grid.num_points()]);
    }
    if let Some(path) = spec.strip_prefix("file:") {
        return io::load_field(Path::new(path), "speed", &grid.shape())
            .map_err(|e| anyhow::anyhow!("{}", e));
    }
    bail!(
        "unknown --speed mode: '{}'. Expected 'uniform:<v>' or 'file:<path>'",
        spec
    );
}

fn build_boundary<const N: usize>(spec: &str, grid: &GridGeometry<N>) -> Result<Vec<f64>> {
    if let Some(params) = spec.strip_prefix("point:") {
        let x: [f64; N] = parse_axes(params, "boundary point")?;
        let spacing = grid.spacing();
        let mut coord = [0i64; N];
        for d in 0..N {
            coord[d] = (x[d] / spacing[d]).round() as i64;
        }
        let index = grid
            .to_linear(coord)
            .map_err(|e| anyhow::anyhow!("boundary point: {}", e))?;
        let mut boundary = vec![-1.0; grid.num_points()];
        boundary[index] = 0.0;
        return Ok(boundary);
    }
    if let Some(path) = spec.strip_prefix("file:") {
        return io::load_field(Path::new(path), "boundary", &grid.shape())
            .map_err(|e| anyhow::anyhow!("{}", e));
    }
    bail!(
        "unknown --boundary mode: '{}'. Expected 'point:<x0>,..' or 'file:<path>'",
        spec
    );
}

fn extension_path(output: &Path, prefix: &str, k: usize) -> PathBuf {
    let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("npy");
    output.with_file_name(format!("{}{}.{}", prefix, k, ext))
}

fn run<const N: usize>(cli: &Cli) -> Result<()> {
    let lower: [i64; N] = parse_axes(&cli.lower, "--lower")?;
    let upper: [i64; N] = parse_axes(&cli.upper, "--upper")?;
    let spacing: [f64; N] = parse_axes(&cli.spacing, "--spacing")?;
    let grid = GridGeometry::<N>::new(lower, upper, cli.ghost, spacing)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let shape = grid.shape();
    info!(
        lower = ?grid.lower(),
        upper = ?grid.upper(),
        ghost = grid.ghost_width(),
        points = grid.num_points(),
        "grid"
    );

    let ghost_fill: GhostFill = cli
        .ghost_fill
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let mut solver = FmmSolver::new(grid.clone())
        .with_order(cli.order)
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_ghost_fill(ghost_fill);
    if cli.signed {
        solver = solver.with_sign(DistanceSign::Signed);
    }
    if let Some(d) = cli.max_distance {
        solver = solver
            .with_max_distance(d)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    if let Some(threads) = cli.threads {
        solver = solver.with_threads(threads);
    }
    if let Some(path) = &cli.mask {
        let mask = io::load_mask(path, &shape).map_err(|e| anyhow::anyhow!("{}", e))?;
        solver = solver
            .with_mask(mask)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    let output = if let Some(speed) = &cli.speed {
        let Some(boundary) = &cli.boundary else {
            bail!("--speed requires --boundary");
        };
        if !cli.extend.is_empty() {
            bail!("--extend is not available with --speed");
        }
        let speed = build_speed(speed, &grid)?;
        let boundary = build_boundary(boundary, &grid)?;
        solver
            .solve_eikonal(&boundary, &speed)
            .map_err(|e| anyhow::anyhow!("{}", e))?
    } else {
        let Some(phi) = &cli.phi else {
            bail!("--phi is required unless --speed is given");
        };
        let phi = build_phi(phi, &grid)?;
        let sources = cli
            .extend
            .iter()
            .map(|s| build_source(s, &grid))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&[f64]> = sources.iter().map(Vec::as_slice).collect();
        solver
            .compute_extension_fields(&phi, &refs)
            .map_err(|e| anyhow::anyhow!("{}", e))?
    };

    let stats = output.stats();
    info!(
        front = stats.front_points,
        known = stats.known_points,
        unreached = stats.unreached_points,
        fallbacks = stats.quadratic_fallbacks,
        "solve complete"
    );

    io::save_field(&cli.output, "distance", &shape, output.distance())
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    for k in 0..output.num_extension_fields() {
        let path = extension_path(&cli.output, &cli.ext_prefix, k);
        let field = output
            .extension_field(k)
            .context("missing extension field")?;
        io::save_field(&path, &format!("extension_{}", k), &shape, field)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        info!(path = %path.display(), "wrote extension field {}", k);
    }
    info!(path = %cli.output.display(), "wrote distance");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.dim {
        1 => run::<1>(&cli),
        2 => run::<2>(&cli),
        3 => run::<3>(&cli),
        other => bail!("--dim must be 1, 2 or 3, got {}", other),
    }
}
