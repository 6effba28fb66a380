//! Top-level solve for the diffusive Maxwell equations
//!
//! Takes a grid, a model and a source field and returns the electric field
//! together with its convergence record and the warnings raised on the
//! way.
//!
//! # Modes
//!
//! - **MgOnly**: multigrid iterations until the tolerance is met
//! - **KrylovOnly**: BiCGSTAB, CGS or GMRES without preconditioning
//! - **MgPreconditioned**: the Krylov method right-preconditioned by multigrid

use crate::config::{SolverConfig, SolverMode};
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::field::Field;
use crate::grid::Grid;
use crate::krylov::solve_krylov;
use crate::model::{CellCoefficients, Model};
use crate::multigrid::{ConvergenceState, Multigrid};
use crate::operator::DiscreteOperator;
use std::time::{Duration, Instant};

/// Result of [`solve`].
#[derive(Debug, Clone)]
pub struct Solution {
    /// Electric field; zero on PEC boundary edges
    pub field: Field,
    pub state: ConvergenceState,
    /// Warnings about the grid and hierarchy
    pub diagnostics: Vec<Diagnostic>,
    pub mode: SolverMode,
    /// Wall time including setup
    pub elapsed: Duration,
}

impl Solution {
    pub fn converged(&self) -> bool {
        self.state.converged()
    }
}

/// Solve `A E = source` on `grid` for `model`.
///
/// # Arguments
/// * `grid` - Rectilinear grid
/// * `model` - Conductivities, optional relative permeability and frequency
/// * `source` - Right-hand side on the edges of `grid`
/// * `initial_guess` - Starting field (zero when `None`)
/// * `config` - Mode, cycle and tolerance settings
///
/// # Errors
/// Configuration errors are raised before any work is done. MG divergence
/// and stagnation return [`crate::SolverError::Divergence`], which carries
/// the best field found.
pub fn solve(
    grid: &Grid,
    model: &Model,
    source: &Field,
    initial_guess: Option<&Field>,
    config: &SolverConfig,
) -> Result<Solution> {
    let start = Instant::now();
    config.validate()?;
    source.check_grid(grid, "source")?;
    if let Some(guess) = initial_guess {
        guess.check_grid(grid, "initial guess")?;
    }
    let coeffs = CellCoefficients::new(grid, model)?;
    let [nx, ny, nz] = grid.cells();
    log::info!(
        "Solving {:?}: {}x{}x{} cells, frequency {} Hz",
        config.mode,
        nx,
        ny,
        nz,
        model.frequency()
    );

    let (field, state, diagnostics) = match config.mode {
        SolverMode::MgOnly => {
            let mut mg = Multigrid::new(grid, &coeffs, config)?;
            let diagnostics = mg.diagnostics().to_vec();
            log::debug!("MG setup: {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
            let (field, state) = mg.solve(source, initial_guess)?;
            (field, state, diagnostics)
        }
        SolverMode::KrylovOnly => {
            let op = DiscreteOperator::new(grid, &coeffs)?;
            let (field, state) = solve_krylov(&op, None, source, initial_guess, config)?;
            (field, state, Vec::new())
        }
        SolverMode::MgPreconditioned => {
            let mg = Multigrid::new(grid, &coeffs, config)?;
            let diagnostics = mg.diagnostics().to_vec();
            let op = mg.operator().clone();
            log::debug!("MG setup: {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
            let (field, state) = solve_krylov(&op, Some(mg), source, initial_guess, config)?;
            (field, state, diagnostics)
        }
    };

    let elapsed = start.elapsed();
    log::info!(
        "Finished in {:.1}ms: {:?} after {} iterations, relative residual {:.3e}",
        elapsed.as_secs_f64() * 1000.0,
        state.status,
        state.iterations,
        state.relative_residual()
    );
    Ok(Solution {
        field,
        state,
        diagnostics,
        mode: config.mode,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KrylovMethod;
    use num_complex::Complex64;

    fn problem() -> (Grid, Model, Field) {
        let grid = Grid::uniform([8, 8, 8], [100.0; 3], [-400.0; 3]).unwrap();
        let model = Model::homogeneous(&grid, 1.0, 10.0);
        let mut source = Field::zeros(&grid);
        source.fx[[4, 4, 4]] = Complex64::new(0.0, 1.0);
        (grid, model, source)
    }

    #[test]
    fn test_solve_mg_only() {
        let (grid, model, source) = problem();
        let solution = solve(&grid, &model, &source, None, &SolverConfig::default()).unwrap();
        assert!(solution.converged());
        assert_eq!(solution.mode, SolverMode::MgOnly);
        assert!(solution.diagnostics.is_empty());
        assert!(solution.state.relative_residual() < 1e-6);
    }

    #[test]
    fn test_solve_krylov_modes() {
        let (grid, model, source) = problem();
        for mode in [SolverMode::KrylovOnly, SolverMode::MgPreconditioned] {
            let config = SolverConfig {
                mode,
                krylov: KrylovMethod::Gmres { restart: 30 },
                max_iterations: 300,
                ..Default::default()
            };
            let solution = solve(&grid, &model, &source, None, &config).unwrap();
            assert!(solution.converged(), "{:?}", mode);
            assert!(solution.state.relative_residual() < 1e-5, "{:?}", mode);
        }
    }

    #[test]
    fn test_rejects_mismatched_source() {
        let (grid, model, _) = problem();
        let other = Grid::uniform([4, 8, 8], [100.0; 3], [0.0; 3]).unwrap();
        let err = solve(&grid, &model, &Field::zeros(&other), None, &SolverConfig::default())
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
