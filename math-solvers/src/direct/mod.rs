//! Direct solvers for linear systems
//!
//! This module provides direct (non-iterative) solvers for complex symmetric
//! systems:
//! - [`CholeskyFactorization`]: dense LDLᵀ, factor once and solve many
//! - [`BandedCholesky`]: banded LDLᵀ for line systems

mod cholesky;

pub use cholesky::{BandedCholesky, CholeskyError, CholeskyFactorization, cholesky_solve};
