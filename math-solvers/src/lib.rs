//! Linear solvers for matrix-free electromagnetic operators
//!
//! This crate provides the Krylov solvers and direct factorizations used by
//! the multigrid Maxwell solver, written against small traits so the same
//! code runs on dense test matrices and on matrix-free stencils.
//!
//! # Features
//!
//! - **Iterative Solvers**: BiCGSTAB, CGS, GMRES, each with right preconditioning
//! - **Fallible Preconditioners**: a preconditioner may fail (e.g. a multigrid
//!   cycle hitting a numerical breakdown) and the error is handed back
//! - **Direct Solvers**: dense and banded complex-symmetric LDLᵀ (Cholesky)
//! - **Generic Scalar Types**: Works with Complex64, Complex32, f64, f32
//!
//! # Example
//!
//! ```
//! use math_geoem_solvers::{BiCgstabConfig, bicgstab};
//! use ndarray::array;
//!
//! let a = array![[4.0_f64, 1.0], [1.0, 3.0]];
//! let b = array![1.0_f64, 2.0];
//! let solution = bicgstab(&a, &b, &BiCgstabConfig::default());
//! assert!(solution.converged);
//! ```

pub mod blas_helpers;
pub mod direct;
pub mod iterative;
pub mod traits;

// Re-export main types
pub use traits::{
    ComplexField, IdentityPreconditioner, LinearOperator, Preconditioner, PreconditionerError,
};

// Re-export iterative solvers
pub use iterative::{
    BiCgstabConfig, BiCgstabSolution, CgsConfig, CgsSolution, GmresConfig, GmresSolution,
    bicgstab, bicgstab_preconditioned, cgs, cgs_preconditioned, gmres, gmres_preconditioned,
};

// Re-export direct solvers
pub use direct::{BandedCholesky, CholeskyError, CholeskyFactorization, cholesky_solve};
