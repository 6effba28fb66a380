//! Iterative solvers for linear systems
//!
//! This module provides Krylov subspace methods for large matrix-free systems:
//! - [`gmres`]: GMRES(m) with restart - robust for general non-symmetric systems
//! - [`bicgstab`]: BiCGSTAB - short recurrences, the usual choice with multigrid
//! - [`cgs`]: CGS - faster but less stable than BiCGSTAB
//!
//! Every method has a `*_preconditioned` variant taking a fallible right
//! preconditioner and an optional initial guess.

mod bicgstab;
mod cgs;
mod gmres;

pub use bicgstab::{BiCgstabConfig, BiCgstabSolution, bicgstab, bicgstab_preconditioned};
pub use cgs::{CgsConfig, CgsSolution, cgs, cgs_preconditioned};
pub use gmres::{GmresConfig, GmresSolution, gmres, gmres_preconditioned};
