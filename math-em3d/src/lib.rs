//! Geometric multigrid solver for the 3D diffusive Maxwell equations
//!
//! This crate solves the frequency- or Laplace-domain electric field
//! equation on a rectilinear staggered (Yee) grid with perfectly conducting
//! outer boundaries. Electric fields live on cell edges; the discrete
//! curl-curl operator plus the conductivity mass term is applied matrix-free.
//!
//! # Features
//!
//! - **Rectilinear grids**: arbitrary, strictly increasing node coordinates
//! - **Anisotropic models**: per-axis conductivity, optional relative permeability
//! - **Multigrid**: V-, W- and F-cycles, full coarsening or semicoarsening
//! - **Smoothers**: point and line block Gauss-Seidel, alternating schedules
//! - **Krylov methods**: BiCGSTAB, CGS and GMRES, optionally MG-preconditioned
//! - **Diagnostics**: non-fatal warnings returned with every solution
//!
//! # Example
//!
//! ```
//! use em3d::{Field, Grid, Model, SolverConfig, solve};
//! use num_complex::Complex64;
//!
//! let grid = Grid::uniform([8, 8, 8], [100.0; 3], [-400.0; 3]).unwrap();
//! let model = Model::homogeneous(&grid, 1.0, 10.0);
//! let mut source = Field::zeros(&grid);
//! source.fx[[4, 4, 4]] = Complex64::new(0.0, 1.0);
//!
//! let solution = solve(&grid, &model, &source, None, &SolverConfig::default()).unwrap();
//! assert!(solution.converged());
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod grid;
pub mod krylov;
pub mod model;
pub mod multigrid;
pub mod operator;
pub mod solver;

pub use config::{KrylovMethod, SolverConfig, SolverMode};
pub use diagnostics::Diagnostic;
pub use error::{DivergenceKind, Result, SolverError};
pub use field::Field;
pub use grid::{Axis, Grid};
pub use model::{CellCoefficients, MU_0, Model};
pub use multigrid::{
    Coarsening, ConvergenceState, ConvergenceStatus, CycleType, Hierarchy, Multigrid, Relaxation,
};
pub use operator::DiscreteOperator;
pub use solver::{Solution, solve};

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
