//! BiCGSTAB (Bi-Conjugate Gradient Stabilized) solver
//!
//! BiCGSTAB is a Krylov subspace method for non-symmetric systems.
//! The preconditioned variant applies M on the right, so the stopping rule
//! always measures the true residual ||b - A x|| / ||b||.

use crate::blas_helpers::{axpy, inner_product, vector_norm};
use crate::traits::{
    ComplexField, IdentityPreconditioner, LinearOperator, Preconditioner, PreconditionerError,
};
use ndarray::Array1;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

/// BiCGSTAB solver configuration
#[derive(Debug, Clone)]
pub struct BiCgstabConfig<R> {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relative tolerance for convergence
    pub tolerance: R,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl Default for BiCgstabConfig<f64> {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            print_interval: 0,
        }
    }
}

/// BiCGSTAB solver result
#[derive(Debug)]
pub struct BiCgstabSolution<T: ComplexField> {
    /// Solution vector
    pub x: Array1<T>,
    /// Number of iterations
    pub iterations: usize,
    /// Final relative residual
    pub residual: T::Real,
    /// Whether convergence was achieved
    pub converged: bool,
    /// Relative residual before the first iteration and after each one
    pub history: Vec<T::Real>,
}

/// Solve Ax = b using the BiCGSTAB method
pub fn bicgstab<T, A>(
    operator: &A,
    b: &Array1<T>,
    config: &BiCgstabConfig<T::Real>,
) -> BiCgstabSolution<T>
where
    T: ComplexField,
    A: LinearOperator<T>,
{
    match bicgstab_preconditioned(operator, &IdentityPreconditioner, b, None, config) {
        Ok(solution) => solution,
        Err(_) => unreachable!("the identity preconditioner never fails"),
    }
}

/// Solve Ax = b using right-preconditioned BiCGSTAB, A M y = b, x = M y
///
/// A failing preconditioner aborts the iteration and its error is returned.
pub fn bicgstab_preconditioned<T, A, P>(
    operator: &A,
    precond: &P,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &BiCgstabConfig<T::Real>,
) -> Result<BiCgstabSolution<T>, PreconditionerError>
where
    T: ComplexField,
    A: LinearOperator<T>,
    P: Preconditioner<T>,
{
    let n = b.len();
    let mut x = match x0 {
        Some(guess) => guess.clone(),
        None => Array1::from_elem(n, T::zero()),
    };

    let b_norm = vector_norm(b);
    let tol_threshold = T::Real::from_f64(1e-15).unwrap_or_else(T::Real::zero);
    if b_norm <= tol_threshold {
        return Ok(BiCgstabSolution {
            x: Array1::from_elem(n, T::zero()),
            iterations: 0,
            residual: T::Real::zero(),
            converged: true,
            history: vec![T::Real::zero()],
        });
    }
    let breakdown = T::Real::from_f64(1e-30).unwrap_or_else(T::Real::zero);

    // Initial residual
    let mut r = match x0 {
        Some(_) => b - &operator.apply(&x),
        None => b.clone(),
    };
    let initial = vector_norm(&r) / b_norm;
    if initial < config.tolerance {
        return Ok(BiCgstabSolution {
            x,
            iterations: 0,
            residual: initial,
            converged: true,
            history: vec![initial],
        });
    }
    let mut history = vec![initial];
    let r0 = r.clone(); // Shadow residual

    let mut rho = T::one();
    let mut alpha = T::one();
    let mut omega = T::one();

    let mut p = Array1::from_elem(n, T::zero());
    let mut v = Array1::from_elem(n, T::zero());

    for iter in 0..config.max_iterations {
        let rho_new = inner_product(&r0, &r);
        if rho_new.norm() < breakdown {
            return Ok(BiCgstabSolution {
                residual: vector_norm(&r) / b_norm,
                x,
                iterations: iter,
                converged: false,
                history,
            });
        }

        let beta = (rho_new / rho) * (alpha / omega);
        rho = rho_new;

        // p = r + beta * (p - omega * v)
        axpy(-omega, &v, &mut p);
        p.mapv_inplace(|pi| pi * beta);
        p += &r;

        // v = A * M * p
        let p_hat = precond.apply(&p)?;
        v = operator.apply(&p_hat);

        let r0v = inner_product(&r0, &v);
        if r0v.norm() < breakdown {
            return Ok(BiCgstabSolution {
                residual: vector_norm(&r) / b_norm,
                x,
                iterations: iter,
                converged: false,
                history,
            });
        }
        alpha = rho / r0v;

        // s = r - alpha * v
        let mut s = r.clone();
        axpy(-alpha, &v, &mut s);

        let s_norm = vector_norm(&s) / b_norm;
        if s_norm < config.tolerance {
            axpy(alpha, &p_hat, &mut x);
            history.push(s_norm);
            return Ok(BiCgstabSolution {
                x,
                iterations: iter + 1,
                residual: s_norm,
                converged: true,
                history,
            });
        }

        // t = A * M * s
        let s_hat = precond.apply(&s)?;
        let t = operator.apply(&s_hat);

        let tt = inner_product(&t, &t);
        if tt.norm() < breakdown {
            return Ok(BiCgstabSolution {
                residual: vector_norm(&r) / b_norm,
                x,
                iterations: iter,
                converged: false,
                history,
            });
        }
        omega = inner_product(&t, &s) / tt;

        // x = x + alpha * p_hat + omega * s_hat
        axpy(alpha, &p_hat, &mut x);
        axpy(omega, &s_hat, &mut x);

        // r = s - omega * t
        axpy(-omega, &t, &mut s);
        r = s;

        let rel_residual = vector_norm(&r) / b_norm;
        history.push(rel_residual);

        if config.print_interval > 0 && (iter + 1) % config.print_interval == 0 {
            log::info!(
                "BiCGSTAB iteration {}: relative residual = {:.6e}",
                iter + 1,
                rel_residual.to_f64().unwrap_or(0.0)
            );
        }

        if rel_residual < config.tolerance {
            return Ok(BiCgstabSolution {
                x,
                iterations: iter + 1,
                residual: rel_residual,
                converged: true,
                history,
            });
        }

        // Stagnation
        if omega.norm() < breakdown {
            return Ok(BiCgstabSolution {
                x,
                iterations: iter + 1,
                residual: rel_residual,
                converged: false,
                history,
            });
        }
    }

    let rel_residual = vector_norm(&r) / b_norm;
    Ok(BiCgstabSolution {
        x,
        iterations: config.max_iterations,
        residual: rel_residual,
        converged: false,
        history,
    })
}
