//! GMRES (Generalized Minimal Residual) solver
//!
//! Implementation of the restarted GMRES algorithm based on Saad & Schultz (1986).
//!
//! GMRES minimizes the residual in a Krylov subspace and has smooth,
//! monotonic convergence behavior. Preconditioning is applied on the right
//! (A M y = b, x = M y), so the Arnoldi residual estimate is the true
//! residual of the unpreconditioned system.

use crate::blas_helpers::{axpy, inner_product, vector_norm};
use crate::traits::{
    ComplexField, IdentityPreconditioner, LinearOperator, Preconditioner, PreconditionerError,
};
use ndarray::{Array1, Array2};
use num_traits::{Float, FromPrimitive, One, ToPrimitive, Zero};

/// GMRES solver configuration
#[derive(Debug, Clone)]
pub struct GmresConfig<R> {
    /// Maximum number of outer iterations (restarts)
    pub max_iterations: usize,
    /// Restart parameter (number of inner iterations before restart)
    pub restart: usize,
    /// Relative tolerance for convergence
    pub tolerance: R,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl Default for GmresConfig<f64> {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            restart: 30,
            tolerance: 1e-6,
            print_interval: 0,
        }
    }
}

impl<R: Float + FromPrimitive> GmresConfig<R> {
    /// Create config with specific restart parameter
    pub fn with_restart(restart: usize) -> Self
    where
        Self: Default,
    {
        Self {
            restart,
            ..Default::default()
        }
    }
}

/// GMRES solver result
#[derive(Debug)]
pub struct GmresSolution<T: ComplexField> {
    /// Solution vector
    pub x: Array1<T>,
    /// Total number of matrix-vector products
    pub iterations: usize,
    /// Number of restarts performed
    pub restarts: usize,
    /// Final relative residual
    pub residual: T::Real,
    /// Whether convergence was achieved
    pub converged: bool,
    /// Relative residual before the first iteration and after each inner
    /// iteration; entries at a restart hold the recomputed true residual
    pub history: Vec<T::Real>,
}

/// Solve Ax = b using the restarted GMRES method
pub fn gmres<T, A>(operator: &A, b: &Array1<T>, config: &GmresConfig<T::Real>) -> GmresSolution<T>
where
    T: ComplexField,
    A: LinearOperator<T>,
{
    match gmres_preconditioned(operator, &IdentityPreconditioner, b, None, config) {
        Ok(solution) => solution,
        Err(_) => unreachable!("the identity preconditioner never fails"),
    }
}

/// Solve Ax = b using right-preconditioned GMRES with an optional initial guess
///
/// # Arguments
/// * `operator` - Linear operator representing A
/// * `precond` - Preconditioner M ≈ A⁻¹; an error aborts the solve
/// * `b` - Right-hand side vector
/// * `x0` - Initial guess (zero when `None`)
/// * `config` - Solver configuration
pub fn gmres_preconditioned<T, A, P>(
    operator: &A,
    precond: &P,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &GmresConfig<T::Real>,
) -> Result<GmresSolution<T>, PreconditionerError>
where
    T: ComplexField,
    A: LinearOperator<T>,
    P: Preconditioner<T>,
{
    let n = b.len();
    let m = config.restart.max(1);

    let mut x = match x0 {
        Some(guess) => guess.clone(),
        None => Array1::from_elem(n, T::zero()),
    };

    let b_norm = vector_norm(b);
    let tol_threshold = T::Real::from_f64(1e-15).unwrap_or_else(T::Real::zero);
    if b_norm <= tol_threshold {
        return Ok(GmresSolution {
            x: Array1::from_elem(n, T::zero()),
            iterations: 0,
            restarts: 0,
            residual: T::Real::zero(),
            converged: true,
            history: vec![T::Real::zero()],
        });
    }
    let breakdown_tol = T::Real::from_f64(1e-14).unwrap_or_else(T::Real::zero) * b_norm;

    let mut total_iterations = 0;
    let mut restarts = 0;
    let mut history: Vec<T::Real> = Vec::new();

    for _outer in 0..config.max_iterations {
        // r = b - A x
        let r: Array1<T> = b - &operator.apply(&x);
        let beta = vector_norm(&r);

        let rel_residual = beta / b_norm;
        match history.last_mut() {
            Some(last) => *last = rel_residual,
            None => history.push(rel_residual),
        }
        if rel_residual < config.tolerance {
            return Ok(GmresSolution {
                x,
                iterations: total_iterations,
                restarts,
                residual: rel_residual,
                converged: true,
                history,
            });
        }

        // Krylov basis V of the preconditioned operator A M
        let mut v: Vec<Array1<T>> = Vec::with_capacity(m + 1);
        v.push(r.mapv(|ri| ri * T::from_real(T::Real::one() / beta)));

        // Upper Hessenberg matrix H and Givens rotation coefficients
        let mut h: Array2<T> = Array2::from_elem((m + 1, m), T::zero());
        let mut cs: Vec<T> = Vec::with_capacity(m);
        let mut sn: Vec<T> = Vec::with_capacity(m);

        // Right-hand side of least squares problem
        let mut g: Array1<T> = Array1::from_elem(m + 1, T::zero());
        g[0] = T::from_real(beta);

        let mut k_used = m;
        let mut converged = false;
        let mut last_residual = rel_residual;

        for j in 0..m {
            total_iterations += 1;

            // w = A * M * v_j
            let z = precond.apply(&v[j])?;
            let mut w = operator.apply(&z);

            // Modified Gram-Schmidt orthogonalization
            for i in 0..=j {
                h[[i, j]] = inner_product(&v[i], &w);
                let h_ij = h[[i, j]];
                axpy(-h_ij, &v[i], &mut w);
            }

            let w_norm = vector_norm(&w);
            h[[j + 1, j]] = T::from_real(w_norm);
            let happy_breakdown = w_norm < breakdown_tol;
            if !happy_breakdown {
                v.push(w.mapv(|wi| wi * T::from_real(T::Real::one() / w_norm)));
            }

            // Apply previous Givens rotations to new column of H
            for i in 0..j {
                let temp = cs[i].conj() * h[[i, j]] + sn[i].conj() * h[[i + 1, j]];
                h[[i + 1, j]] = T::zero() - sn[i] * h[[i, j]] + cs[i] * h[[i + 1, j]];
                h[[i, j]] = temp;
            }

            let (c, s) = givens_rotation(h[[j, j]], h[[j + 1, j]]);
            cs.push(c);
            sn.push(s);

            h[[j, j]] = c.conj() * h[[j, j]] + s.conj() * h[[j + 1, j]];
            h[[j + 1, j]] = T::zero();

            let temp = c.conj() * g[j] + s.conj() * g[j + 1];
            g[j + 1] = T::zero() - s * g[j] + c * g[j + 1];
            g[j] = temp;

            last_residual = g[j + 1].norm() / b_norm;
            history.push(last_residual);

            if config.print_interval > 0 && total_iterations % config.print_interval == 0 {
                log::info!(
                    "GMRES iteration {} (restart {}): relative residual = {:.6e}",
                    total_iterations,
                    restarts,
                    last_residual.to_f64().unwrap_or(0.0)
                );
            }

            if last_residual < config.tolerance || happy_breakdown {
                k_used = j + 1;
                converged = last_residual < config.tolerance;
                break;
            }
        }

        // x = x + M * (V y)
        let y = solve_upper_triangular(&h, &g, k_used);
        let mut update = Array1::from_elem(n, T::zero());
        for (i, &yi) in y.iter().enumerate() {
            axpy(yi, &v[i], &mut update);
        }
        let correction = precond.apply(&update)?;
        axpy(T::one(), &correction, &mut x);

        if converged {
            return Ok(GmresSolution {
                x,
                iterations: total_iterations,
                restarts,
                residual: last_residual,
                converged: true,
                history,
            });
        }

        restarts += 1;
    }

    let r: Array1<T> = b - &operator.apply(&x);
    let rel_residual = vector_norm(&r) / b_norm;
    match history.last_mut() {
        Some(last) => *last = rel_residual,
        None => history.push(rel_residual),
    }

    Ok(GmresSolution {
        x,
        iterations: total_iterations,
        restarts,
        residual: rel_residual,
        converged: rel_residual < config.tolerance,
        history,
    })
}

/// Compute Givens rotation coefficients
#[inline]
fn givens_rotation<T: ComplexField>(a: T, b: T) -> (T, T) {
    let tol = T::Real::from_f64(1e-30).unwrap_or_else(T::Real::zero);
    if b.norm() <= tol {
        return (T::one(), T::zero());
    }
    if a.norm() <= tol {
        return (T::zero(), T::one());
    }

    let r = (a.norm_sqr() + b.norm_sqr()).sqrt();
    let c = a * T::from_real(T::Real::one() / r);
    let s = b * T::from_real(T::Real::one() / r);

    (c, s)
}

/// Solve upper triangular system Hy = g
fn solve_upper_triangular<T: ComplexField>(h: &Array2<T>, g: &Array1<T>, k: usize) -> Vec<T> {
    let mut y = vec![T::zero(); k];
    let tol = T::Real::from_f64(1e-30).unwrap_or_else(T::Real::zero);

    for i in (0..k).rev() {
        let mut sum = g[i];
        for j in (i + 1)..k {
            sum -= h[[i, j]] * y[j];
        }
        if h[[i, i]].norm() > tol {
            y[i] = sum * h[[i, i]].inv();
        }
    }

    y
}
