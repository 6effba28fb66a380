//! CGS (Conjugate Gradient Squared) solver
//!
//! CGS is a Krylov subspace method for non-symmetric systems.
//! It can converge faster than BiCG but may be less stable.

use crate::blas_helpers::{axpy, inner_product, vector_norm};
use crate::traits::{
    ComplexField, IdentityPreconditioner, LinearOperator, Preconditioner, PreconditionerError,
};
use ndarray::Array1;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

/// CGS solver configuration
#[derive(Debug, Clone)]
pub struct CgsConfig<R> {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relative tolerance for convergence
    pub tolerance: R,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl Default for CgsConfig<f64> {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            print_interval: 0,
        }
    }
}

/// CGS solver result
#[derive(Debug)]
pub struct CgsSolution<T: ComplexField> {
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

/// Solve Ax = b using the CGS method
pub fn cgs<T, A>(operator: &A, b: &Array1<T>, config: &CgsConfig<T::Real>) -> CgsSolution<T>
where
    T: ComplexField,
    A: LinearOperator<T>,
{
    match cgs_preconditioned(operator, &IdentityPreconditioner, b, None, config) {
        Ok(solution) => solution,
        Err(_) => unreachable!("the identity preconditioner never fails"),
    }
}

/// Solve Ax = b using right-preconditioned CGS
pub fn cgs_preconditioned<T, A, P>(
    operator: &A,
    precond: &P,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &CgsConfig<T::Real>,
) -> Result<CgsSolution<T>, PreconditionerError>
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
        return Ok(CgsSolution {
            x: Array1::from_elem(n, T::zero()),
            iterations: 0,
            residual: T::Real::zero(),
            converged: true,
            history: vec![T::Real::zero()],
        });
    }
    let breakdown = T::Real::from_f64(1e-30).unwrap_or_else(T::Real::zero);

    let mut r = match x0 {
        Some(_) => b - &operator.apply(&x),
        None => b.clone(),
    };
    let initial = vector_norm(&r) / b_norm;
    if initial < config.tolerance {
        return Ok(CgsSolution {
            x,
            iterations: 0,
            residual: initial,
            converged: true,
            history: vec![initial],
        });
    }
    let mut history = vec![initial];
    let r0 = r.clone(); // Shadow residual

    let mut rho = inner_product(&r0, &r);
    let mut p = r.clone();
    let mut u = r.clone();

    for iter in 0..config.max_iterations {
        // v = A * M * p
        let p_hat = precond.apply(&p)?;
        let v = operator.apply(&p_hat);

        let sigma = inner_product(&r0, &v);
        if sigma.norm() < breakdown {
            return Ok(CgsSolution {
                residual: vector_norm(&r) / b_norm,
                x,
                iterations: iter,
                converged: false,
                history,
            });
        }

        let alpha = rho / sigma;

        // q = u - alpha * v
        let mut q = u.clone();
        axpy(-alpha, &v, &mut q);

        // x = x + alpha * M (u + q), r = r - alpha * A M (u + q)
        let uq_hat = precond.apply(&(&u + &q))?;
        let w = operator.apply(&uq_hat);
        axpy(alpha, &uq_hat, &mut x);
        axpy(-alpha, &w, &mut r);

        let rel_residual = vector_norm(&r) / b_norm;
        history.push(rel_residual);

        if config.print_interval > 0 && (iter + 1) % config.print_interval == 0 {
            log::info!(
                "CGS iteration {}: relative residual = {:.6e}",
                iter + 1,
                rel_residual.to_f64().unwrap_or(0.0)
            );
        }

        if rel_residual < config.tolerance {
            return Ok(CgsSolution {
                x,
                iterations: iter + 1,
                residual: rel_residual,
                converged: true,
                history,
            });
        }

        let rho_new = inner_product(&r0, &r);
        if rho.norm() < breakdown {
            return Ok(CgsSolution {
                x,
                iterations: iter + 1,
                residual: rel_residual,
                converged: false,
                history,
            });
        }

        let beta = rho_new / rho;
        rho = rho_new;

        // u = r + beta * q
        u.assign(&r);
        axpy(beta, &q, &mut u);

        // p = u + beta * (q + beta * p)
        p.mapv_inplace(|pi| pi * beta);
        p += &q;
        p.mapv_inplace(|pi| pi * beta);
        p += &u;
    }

    let rel_residual = vector_norm(&r) / b_norm;
    Ok(CgsSolution {
        x,
        iterations: config.max_iterations,
        residual: rel_residual,
        converged: false,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use num_complex::Complex64;

    #[test]
    fn test_cgs_simple() {
        let a = array![
            [Complex64::new(4.0, 0.0), Complex64::new(1.0, 0.0)],
            [Complex64::new(1.0, 0.0), Complex64::new(3.0, 0.0)],
        ];
        let b = array![Complex64::new(1.0, 0.0), Complex64::new(2.0, 0.0)];

        let config = CgsConfig {
            max_iterations: 100,
            tolerance: 1e-10,
            print_interval: 0,
        };

        let solution = cgs(&a, &b, &config);

        assert!(solution.converged, "CGS should converge");

        let ax = a.apply(&solution.x);
        let error: f64 = (&ax - &b).iter().map(|e| e.norm_sqr()).sum::<f64>().sqrt();
        assert!(error < 1e-8, "Solution should satisfy Ax = b");
    }

    #[test]
    fn test_cgs_preconditioned_with_guess() {
        let n = 8;
        let a = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                Complex64::new(3.0, 1.0)
            } else if i.abs_diff(j) == 1 {
                Complex64::new(-1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        });
        let b = Array1::from_shape_fn(n, |i| Complex64::new(i as f64, 1.0));
        let guess = Array1::from_elem(n, Complex64::new(0.1, 0.0));

        let config = CgsConfig {
            max_iterations: 200,
            tolerance: 1e-10,
            print_interval: 0,
        };
        let solution =
            cgs_preconditioned(&a, &IdentityPreconditioner, &b, Some(&guess), &config).unwrap();
        assert!(solution.converged);
        assert_eq!(solution.history.len(), solution.iterations + 1);
        assert_eq!(solution.history.last().copied(), Some(solution.residual));
        assert!(solution.history[0] > solution.residual);

        let ax = a.apply(&solution.x);
        let error: f64 = (&ax - &b).iter().map(|e| e.norm_sqr()).sum::<f64>().sqrt();
        assert!(error < 1e-8);
    }
}
