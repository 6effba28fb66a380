//! Complex-symmetric Cholesky (LDLᵀ) factorizations
//!
//! Factor `A = L D Lᵀ` with `L` unit lower triangular and `D` diagonal. No
//! conjugation is applied anywhere, so complex *symmetric* matrices (not
//! Hermitian ones) are handled; for real SPD input this is the classic
//! square-root-free Cholesky. No pivoting is performed.
//!
//! - [`CholeskyFactorization`]: dense storage, factor once and solve many
//! - [`BandedCholesky`]: band storage, for line systems with a small
//!   half-bandwidth

use crate::traits::ComplexField;
use ndarray::{Array1, Array2};
use num_traits::{Float, FromPrimitive, ToPrimitive, Zero};
use thiserror::Error;

/// Pivots smaller than this fraction of the largest diagonal entry are
/// treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Errors that can occur during Cholesky factorization
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CholeskyError {
    /// A pivot vanished (relative to the largest diagonal entry)
    #[error("Matrix is singular: pivot {index} has magnitude {magnitude:.3e}")]
    Singular {
        /// Row of the vanishing pivot
        index: usize,
        /// Magnitude of the pivot
        magnitude: f64,
    },
    /// The matrix is not square or a vector has the wrong length
    #[error("Matrix dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Provided dimension
        got: usize,
    },
}

fn pivot_threshold<T: ComplexField>(diag_max: T::Real) -> T::Real {
    let tol = T::Real::from_f64(PIVOT_TOLERANCE).unwrap_or_else(T::Real::epsilon);
    tol * diag_max
}

fn check_pivot<T: ComplexField>(d: T, threshold: T::Real, index: usize) -> Result<T, CholeskyError> {
    let magnitude = d.norm();
    if !d.is_finite() || magnitude <= threshold || magnitude.is_zero() {
        return Err(CholeskyError::Singular {
            index,
            magnitude: magnitude.to_f64().unwrap_or(f64::NAN),
        });
    }
    Ok(d)
}

/// Dense LDLᵀ factorization
///
/// `factors` stores `L` strictly below the diagonal and `D` on the diagonal.
#[derive(Debug, Clone)]
pub struct CholeskyFactorization<T: ComplexField> {
    factors: Array2<T>,
    n: usize,
}

impl<T: ComplexField> CholeskyFactorization<T> {
    /// Factor a dense complex-symmetric matrix.
    ///
    /// Only the lower triangle of `matrix` is read.
    pub fn factor(matrix: &Array2<T>) -> Result<Self, CholeskyError> {
        let n = matrix.nrows();
        if matrix.ncols() != n {
            return Err(CholeskyError::DimensionMismatch {
                expected: n,
                got: matrix.ncols(),
            });
        }

        let diag_max = (0..n)
            .map(|i| matrix[[i, i]].norm())
            .fold(T::Real::zero(), |a, b| a.max(b));
        let threshold = pivot_threshold::<T>(diag_max);

        let mut f = Array2::from_elem((n, n), T::zero());
        // Scratch row holding L_jk * d_k for the current column j
        let mut ld = vec![T::zero(); n];

        for j in 0..n {
            let mut d = matrix[[j, j]];
            for k in 0..j {
                ld[k] = f[[j, k]] * f[[k, k]];
                d -= f[[j, k]] * ld[k];
            }
            let d = check_pivot(d, threshold, j)?;
            f[[j, j]] = d;
            let d_inv = d.inv();

            for i in (j + 1)..n {
                let mut s = matrix[[i, j]];
                for k in 0..j {
                    s -= f[[i, k]] * ld[k];
                }
                f[[i, j]] = s * d_inv;
            }
        }

        Ok(Self { factors: f, n })
    }

    /// Dimension of the factored matrix
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Solve Ax = b using the pre-computed factorization
    pub fn solve(&self, b: &Array1<T>) -> Result<Array1<T>, CholeskyError> {
        let mut x = b.to_vec();
        self.solve_in_place(&mut x)?;
        Ok(Array1::from(x))
    }

    /// Overwrite `x` (holding b) with the solution of Ax = b.
    pub fn solve_in_place(&self, x: &mut [T]) -> Result<(), CholeskyError> {
        if x.len() != self.n {
            return Err(CholeskyError::DimensionMismatch {
                expected: self.n,
                got: x.len(),
            });
        }

        let f = &self.factors;

        // L y = b
        for i in 0..self.n {
            let mut s = x[i];
            for k in 0..i {
                s -= f[[i, k]] * x[k];
            }
            x[i] = s;
        }

        // D z = y
        for (i, xi) in x.iter_mut().enumerate() {
            *xi *= f[[i, i]].inv();
        }

        // Lᵀ x = z
        for i in (0..self.n).rev() {
            let mut s = x[i];
            for k in (i + 1)..self.n {
                s -= f[[k, i]] * x[k];
            }
            x[i] = s;
        }

        Ok(())
    }
}

/// Factor and solve in one step
pub fn cholesky_solve<T: ComplexField>(
    matrix: &Array2<T>,
    b: &Array1<T>,
) -> Result<Array1<T>, CholeskyError> {
    CholeskyFactorization::factor(matrix)?.solve(b)
}

/// Banded LDLᵀ factorization
///
/// Band storage: `band[[i, d]]` holds entry `(i, i - d)` of the lower
/// triangle for `d = 0..=bandwidth`. After factoring, `d = 0` holds `D` and
/// `d > 0` holds `L`.
#[derive(Debug, Clone)]
pub struct BandedCholesky<T: ComplexField> {
    band: Array2<T>,
    n: usize,
    bandwidth: usize,
}

impl<T: ComplexField> BandedCholesky<T> {
    /// Create an empty (all zero) banded matrix of dimension `n`.
    pub fn zeros(n: usize, bandwidth: usize) -> Self {
        Self {
            band: Array2::from_elem((n, bandwidth + 1), T::zero()),
            n,
            bandwidth,
        }
    }

    /// Reset to an all-zero matrix of dimension `n`, reusing the storage when
    /// it is large enough.
    pub fn reset(&mut self, n: usize, bandwidth: usize) {
        if self.band.nrows() < n || self.bandwidth != bandwidth {
            self.band = Array2::from_elem((n, bandwidth + 1), T::zero());
        } else {
            self.band.fill(T::zero());
        }
        self.n = n;
        self.bandwidth = bandwidth;
    }

    /// Dimension of the matrix
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Half-bandwidth
    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    /// Set entry `(i, j)` (and implicitly `(j, i)`).
    ///
    /// Entries outside the band are ignored; the caller sizes the band.
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let (row, col) = if i >= j { (i, j) } else { (j, i) };
        let d = row - col;
        if d <= self.bandwidth {
            self.band[[row, d]] = value;
        }
    }

    /// Read entry `(i, j)`; zero outside the band.
    pub fn get(&self, i: usize, j: usize) -> T {
        let (row, col) = if i >= j { (i, j) } else { (j, i) };
        let d = row - col;
        if d <= self.bandwidth {
            self.band[[row, d]]
        } else {
            T::zero()
        }
    }

    /// Factor in place.
    pub fn factor(&mut self) -> Result<(), CholeskyError> {
        let n = self.n;
        let w = self.bandwidth;
        let diag_max = (0..n)
            .map(|i| self.band[[i, 0]].norm())
            .fold(T::Real::zero(), |a, b| a.max(b));
        let threshold = pivot_threshold::<T>(diag_max);

        for j in 0..n {
            // d_j = a_jj - Σ L_jk² d_k
            let k0 = j.saturating_sub(w);
            let mut d = self.band[[j, 0]];
            for k in k0..j {
                let l_jk = self.band[[j, j - k]];
                d -= l_jk * l_jk * self.band[[k, 0]];
            }
            let d = check_pivot(d, threshold, j)?;
            self.band[[j, 0]] = d;
            let d_inv = d.inv();

            // L_ij = (a_ij - Σ L_ik L_jk d_k) / d_j
            let i_end = (j + w + 1).min(n);
            for i in (j + 1)..i_end {
                let k_start = i.saturating_sub(w).max(k0);
                let mut s = self.band[[i, i - j]];
                for k in k_start..j {
                    s -= self.band[[i, i - k]] * self.band[[j, j - k]] * self.band[[k, 0]];
                }
                self.band[[i, i - j]] = s * d_inv;
            }
        }
        Ok(())
    }

    /// Solve in place with a factored band: forward, diagonal, backward.
    pub fn solve_in_place(&self, x: &mut [T]) -> Result<(), CholeskyError> {
        let n = self.n;
        if x.len() != n {
            return Err(CholeskyError::DimensionMismatch {
                expected: n,
                got: x.len(),
            });
        }
        let w = self.bandwidth;

        for i in 0..n {
            let mut s = x[i];
            for k in i.saturating_sub(w)..i {
                s -= self.band[[i, i - k]] * x[k];
            }
            x[i] = s;
        }

        for (i, xi) in x.iter_mut().enumerate() {
            *xi *= self.band[[i, 0]].inv();
        }

        for i in (0..n).rev() {
            let mut s = x[i];
            let k_end = (i + w + 1).min(n);
            for k in (i + 1)..k_end {
                s -= self.band[[k, k - i]] * x[k];
            }
            x[i] = s;
        }
        Ok(())
    }
}
