//! Krylov solves over the free edges
//!
//! The edge operator is exposed to the generic solvers in `solvers` as a
//! [`LinearOperator`] on the vector of free edges in canonical order. With
//! a [`Multigrid`] the Krylov method is right-preconditioned by a period of
//! MG iterations; an error raised inside the preconditioner is carried back
//! through the solver unchanged.

use crate::config::{KrylovMethod, SolverConfig};
use crate::error::{Result, SolverError};
use crate::field::Field;
use crate::multigrid::{ConvergenceState, ConvergenceStatus, Multigrid};
use crate::operator::DiscreteOperator;
use ndarray::Array1;
use num_complex::Complex64;
use solvers::{
    BiCgstabConfig, CgsConfig, GmresConfig, IdentityPreconditioner, LinearOperator,
    Preconditioner, PreconditionerError, bicgstab_preconditioned, cgs_preconditioned,
    gmres_preconditioned,
};
use std::sync::Mutex;

/// [`DiscreteOperator`] restricted to its free edges.
pub struct FreeEdgeOperator<'a> {
    op: &'a DiscreteOperator,
}

impl<'a> FreeEdgeOperator<'a> {
    pub fn new(op: &'a DiscreteOperator) -> Self {
        Self { op }
    }
}

impl LinearOperator<Complex64> for FreeEdgeOperator<'_> {
    fn num_rows(&self) -> usize {
        self.op.n_free()
    }

    fn num_cols(&self) -> usize {
        self.op.n_free()
    }

    fn apply(&self, x: &Array1<Complex64>) -> Array1<Complex64> {
        let field = Field::scatter_free(self.op.cells(), x.iter());
        self.op.apply(&field).to_free_vector()
    }

    // Complex symmetric
    fn apply_transpose(&self, x: &Array1<Complex64>) -> Array1<Complex64> {
        self.apply(x)
    }
}

/// Multigrid as a preconditioner on free-edge vectors.
///
/// The MG state (schedule position, level buffers) is mutated on every
/// application, so it sits behind a mutex.
pub struct MultigridPreconditioner {
    mg: Mutex<Multigrid>,
    cells: [usize; 3],
}

impl MultigridPreconditioner {
    pub fn new(mg: Multigrid) -> Self {
        let cells = mg.cells();
        Self {
            mg: Mutex::new(mg),
            cells,
        }
    }

    /// Hand back the multigrid solver.
    pub fn into_inner(self) -> Multigrid {
        self.mg
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn precondition(&self, r: &Array1<Complex64>) -> Result<Array1<Complex64>> {
        let rhs = Field::scatter_free(self.cells, r.iter());
        let mut mg = self
            .mg
            .lock()
            .map_err(|_| SolverError::Numerical("multigrid preconditioner lock poisoned".into()))?;
        Ok(mg.precondition(&rhs)?.to_free_vector())
    }
}

impl Preconditioner<Complex64> for MultigridPreconditioner {
    fn apply(&self, r: &Array1<Complex64>) -> std::result::Result<Array1<Complex64>, PreconditionerError> {
        self.precondition(r).map_err(PreconditionerError::new)
    }
}

struct KrylovOutcome {
    x: Array1<Complex64>,
    iterations: usize,
    converged: bool,
    /// Relative residuals, initial one first
    history: Vec<f64>,
}

fn run_method<P: Preconditioner<Complex64>>(
    method: KrylovMethod,
    operator: &FreeEdgeOperator<'_>,
    precond: &P,
    b: &Array1<Complex64>,
    x0: Option<&Array1<Complex64>>,
    config: &SolverConfig,
) -> std::result::Result<KrylovOutcome, PreconditionerError> {
    let outcome = match method {
        KrylovMethod::BiCgstab => {
            let settings = BiCgstabConfig {
                max_iterations: config.max_iterations,
                tolerance: config.tolerance,
                print_interval: config.log_interval,
            };
            let s = bicgstab_preconditioned(operator, precond, b, x0, &settings)?;
            KrylovOutcome {
                x: s.x,
                iterations: s.iterations,
                converged: s.converged,
                history: s.history,
            }
        }
        KrylovMethod::Cgs => {
            let settings = CgsConfig {
                max_iterations: config.max_iterations,
                tolerance: config.tolerance,
                print_interval: config.log_interval,
            };
            let s = cgs_preconditioned(operator, precond, b, x0, &settings)?;
            KrylovOutcome {
                x: s.x,
                iterations: s.iterations,
                converged: s.converged,
                history: s.history,
            }
        }
        KrylovMethod::Gmres { restart } => {
            // max_iterations counts inner steps; GMRES counts restarts
            let settings = GmresConfig {
                max_iterations: config.max_iterations.div_ceil(restart),
                restart,
                tolerance: config.tolerance,
                print_interval: config.log_interval,
            };
            let s = gmres_preconditioned(operator, precond, b, x0, &settings)?;
            KrylovOutcome {
                x: s.x,
                iterations: s.iterations,
                converged: s.converged,
                history: s.history,
            }
        }
    };
    Ok(outcome)
}

/// Recover the error raised inside the preconditioner.
fn unwrap_preconditioner_error(err: PreconditionerError) -> SolverError {
    match err.into_inner().downcast::<SolverError>() {
        Ok(inner) => *inner,
        Err(other) => SolverError::Numerical(other.to_string()),
    }
}

/// Solve `A x = rhs` with the configured Krylov method, preconditioned by
/// `multigrid` when given.
///
/// Not reaching the tolerance within `max_iterations` is reported through
/// the returned state, not as an error.
pub fn solve_krylov(
    op: &DiscreteOperator,
    multigrid: Option<Multigrid>,
    rhs: &Field,
    initial: Option<&Field>,
    config: &SolverConfig,
) -> Result<(Field, ConvergenceState)> {
    let cells = op.cells();
    rhs.check_cells(cells, "right-hand side")?;
    if let Some(guess) = initial {
        guess.check_cells(cells, "initial guess")?;
    }
    if let Some(mg) = &multigrid {
        if mg.cells() != cells {
            return Err(SolverError::Configuration(format!(
                "multigrid is built on {:?} cells, operator has {:?}",
                mg.cells(),
                cells
            )));
        }
    }
    let mut rhs = rhs.clone();
    rhs.ensure_pec();
    let reference = rhs.norm();
    let mut state = ConvergenceState::new(config.tolerance, reference);
    if reference == 0.0 {
        log::info!("Source is zero; returning the zero field");
        state.initial_norm = 0.0;
        state.history.push(0.0);
        state.status = ConvergenceStatus::Converged;
        return Ok((Field::zeros_with_cells(cells), state));
    }

    let b = rhs.to_free_vector();
    let x0 = initial.map(Field::to_free_vector);
    let initial_norm = match initial {
        Some(guess) => op.residual(guess, &rhs).norm(),
        None => reference,
    };
    if !initial_norm.is_finite() {
        return Err(SolverError::Numerical("initial residual is not finite".into()));
    }
    state.initial_norm = initial_norm;

    let operator = FreeEdgeOperator::new(op);
    let preconditioned = multigrid.is_some();
    log::info!(
        "{:?}{} on {} unknowns",
        config.krylov,
        if preconditioned { " + MG" } else { "" },
        operator.num_rows()
    );
    let outcome = match multigrid {
        Some(mg) => {
            let precond = MultigridPreconditioner::new(mg);
            run_method(config.krylov, &operator, &precond, &b, x0.as_ref(), config)
        }
        None => run_method(
            config.krylov,
            &operator,
            &IdentityPreconditioner,
            &b,
            x0.as_ref(),
            config,
        ),
    }
    .map_err(unwrap_preconditioner_error)?;

    let field = Field::from_free_vector(cells, &outcome.x)?;
    if !field.is_finite() {
        return Err(SolverError::Numerical(format!(
            "non-finite values after {} Krylov iterations",
            outcome.iterations
        )));
    }
    let final_norm = op.residual(&field, &rhs).norm();
    state.iterations = outcome.iterations;
    state.history = outcome
        .history
        .iter()
        .map(|relative| relative * reference)
        .collect();
    // Recurrence residuals drift from the true ones; both ends are exact
    if let Some(first) = state.history.first_mut() {
        *first = initial_norm;
    } else {
        state.history.push(initial_norm);
    }
    if state.history.len() > 1 {
        if let Some(last) = state.history.last_mut() {
            *last = final_norm;
        }
    }
    state.status = if outcome.converged {
        ConvergenceStatus::Converged
    } else {
        ConvergenceStatus::MaxIterations
    };
    if outcome.converged {
        log::info!(
            "Krylov converged in {} iterations, relative residual {:.3e}",
            state.iterations,
            state.relative_residual()
        );
    } else {
        log::warn!(
            "Krylov stopped after {} iterations, relative residual {:.3e}",
            state.iterations,
            state.relative_residual()
        );
    }
    Ok((field, state))
}
