//! Error types for the multigrid Maxwell solver.
//!
//! Configuration problems are reported before any work starts, numerical
//! breakdowns abort the solve, a singular coarse system is reported while the
//! hierarchy is built, and divergence hands back the best field found so far.

use crate::field::Field;
use crate::multigrid::ConvergenceState;
use std::fmt;
use thiserror::Error;

/// How an MG iteration failed to make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceKind {
    /// Residual grew beyond the configured factor of its initial value
    Diverged,
    /// Residual stopped decreasing between consecutive iterations
    Stagnated,
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceKind::Diverged => write!(f, "diverged"),
            DivergenceKind::Stagnated => write!(f, "stagnated"),
        }
    }
}

/// Errors that can occur while setting up or running a solve.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Invalid grid, model, field shape or solver setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Singular local system or non-finite values during the solve.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// The coarsest-level operator could not be factored.
    #[error("singular coarse system: {0}")]
    SingularSystem(String),

    /// The iteration diverged or stagnated.
    #[error(
        "multigrid {kind} after {} iterations (relative residual {:.3e})",
        .state.iterations,
        .state.relative_residual()
    )]
    Divergence {
        /// Diverged or stagnated
        kind: DivergenceKind,
        /// Convergence history up to the failure
        state: Box<ConvergenceState>,
        /// Field with the smallest residual seen
        field: Box<Field>,
    },
}

/// A specialized `Result` type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;

impl SolverError {
    /// Returns `true` for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SolverError::Configuration(_))
    }

    /// Returns `true` for numerical breakdowns.
    pub fn is_numerical(&self) -> bool {
        matches!(self, SolverError::Numerical(_))
    }

    /// Returns `true` when the coarse factorization failed.
    pub fn is_singular_system(&self) -> bool {
        matches!(self, SolverError::SingularSystem(_))
    }

    /// Returns `true` for divergence and stagnation.
    pub fn is_divergence(&self) -> bool {
        matches!(self, SolverError::Divergence { .. })
    }

    /// Best field reached before a divergence, if any.
    pub fn partial_field(&self) -> Option<&Field> {
        match self {
            SolverError::Divergence { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multigrid::ConvergenceStatus;

    #[test]
    fn test_error_display() {
        let err = SolverError::Configuration("grid x must have at least 2 cells".into());
        assert_eq!(
            err.to_string(),
            "configuration error: grid x must have at least 2 cells"
        );
        assert!(err.is_configuration());
        assert!(!err.is_numerical());
        assert!(err.partial_field().is_none());
    }

    #[test]
    fn test_divergence_display_and_field() {
        let state = ConvergenceState {
            iterations: 4,
            tolerance: 1e-6,
            reference_norm: 2.0,
            initial_norm: 2.0,
            history: vec![2.0, 1.0, 30.0],
            status: ConvergenceStatus::Diverged,
        };
        let err = SolverError::Divergence {
            kind: DivergenceKind::Diverged,
            state: Box::new(state),
            field: Box::new(Field::zeros_with_cells([2, 2, 2])),
        };
        let text = err.to_string();
        assert!(text.contains("diverged"));
        assert!(text.contains("after 4 iterations"));
        assert!(err.is_divergence());
        assert_eq!(err.partial_field().map(|f| f.cells()), Some([2, 2, 2]));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(SolverError::SingularSystem("pivot 3".into()).is_singular_system());
        assert!(SolverError::Numerical("NaN".into()).is_numerical());
        assert_eq!(DivergenceKind::Stagnated.to_string(), "stagnated");
    }
}
