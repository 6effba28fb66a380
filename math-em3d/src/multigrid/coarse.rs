//! Coarsest-level solve
//!
//! The coarsest operator is assembled densely over its free edges and
//! factored once with a complex-symmetric Cholesky. When the coarsest grid
//! is too large for a dense factorization the solve falls back to a fixed
//! number of smoothing sweeps, and a diagnostic is recorded.

use super::smoother::{Relaxation, SmootherWorkspace, smooth};
use crate::diagnostics::Diagnostic;
use crate::error::{Result, SolverError};
use crate::field::Field;
use crate::operator::DiscreteOperator;
use num_complex::Complex64;
use solvers::CholeskyFactorization;

/// Default largest number of unknowns factored directly.
pub const DEFAULT_COARSE_DIRECT_LIMIT: usize = 1500;

#[derive(Debug, Clone)]
enum Strategy {
    Direct(CholeskyFactorization<Complex64>),
    Smoothing,
}

/// Solver for the coarsest level of a hierarchy.
#[derive(Debug, Clone)]
pub struct CoarseSolver {
    strategy: Strategy,
}

impl CoarseSolver {
    /// Factor `op` if it has at most `direct_limit` unknowns.
    ///
    /// Returns a diagnostic when falling back to smoothing.
    pub fn build(
        op: &DiscreteOperator,
        direct_limit: usize,
    ) -> Result<(Self, Option<Diagnostic>)> {
        let unknowns = op.n_free();
        if unknowns > direct_limit {
            let diagnostic = Diagnostic::CoarseSolveFallback {
                unknowns,
                limit: direct_limit,
            };
            diagnostic.log();
            let solver = Self {
                strategy: Strategy::Smoothing,
            };
            return Ok((solver, Some(diagnostic)));
        }

        let matrix = op.assemble_dense();
        let factorization = CholeskyFactorization::factor(&matrix).map_err(|err| {
            SolverError::SingularSystem(format!(
                "coarsest grid {:?} with {} unknowns: {}",
                op.cells(),
                unknowns,
                err
            ))
        })?;
        log::debug!(
            "Factored coarsest operator: {:?} cells, {} unknowns",
            op.cells(),
            unknowns
        );
        let solver = Self {
            strategy: Strategy::Direct(factorization),
        };
        Ok((solver, None))
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.strategy, Strategy::Direct(_))
    }

    /// Solve (or approximately solve) `A x = rhs` on the coarsest level.
    ///
    /// `free` is scratch for the direct solve, reused across calls.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &self,
        op: &DiscreteOperator,
        x: &mut Field,
        rhs: &Field,
        sweeps: usize,
        relaxation: Relaxation,
        ws: &mut SmootherWorkspace,
        free: &mut Vec<Complex64>,
    ) -> Result<()> {
        match &self.strategy {
            Strategy::Direct(factorization) => {
                rhs.gather_free_into(free);
                factorization
                    .solve_in_place(free)
                    .map_err(|err| SolverError::Numerical(err.to_string()))?;
                x.assign_free(free.iter());
                Ok(())
            }
            Strategy::Smoothing => smooth(op, x, rhs, sweeps.max(1), relaxation, ws),
        }
    }
}
