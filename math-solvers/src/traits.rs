//! Core traits for linear algebra operations
//!
//! This module defines the abstractions shared by the Krylov solvers and the
//! direct factorizations:
//! - [`ComplexField`]: scalar types (complex and real numbers)
//! - [`LinearOperator`]: matrix-like objects, including matrix-free stencils
//! - [`Preconditioner`]: fallible approximate inverses (e.g. a multigrid cycle)

use ndarray::{Array1, Array2};
use num_complex::{Complex32, Complex64};
use num_traits::{Float, FromPrimitive, NumAssign, One, ToPrimitive, Zero};
use std::error::Error;
use std::fmt::Debug;
use std::ops::Neg;
use thiserror::Error;

/// Trait for scalar types that can be used in linear algebra operations.
///
/// Abstracts over real and complex numbers. Note that the Cholesky
/// factorizations in [`crate::direct`] never conjugate: they factor complex
/// *symmetric* matrices, which is what a diffusive Maxwell operator is.
///
/// # Implementations
///
/// Provided for `Complex64`, `Complex32`, `f64` and `f32`.
pub trait ComplexField:
    NumAssign + Clone + Copy + Send + Sync + Debug + Zero + One + Neg<Output = Self> + 'static
{
    /// The real number type underlying this field
    type Real: Float + NumAssign + FromPrimitive + ToPrimitive + Send + Sync + Debug + 'static;

    /// Complex conjugate
    fn conj(&self) -> Self;

    /// Squared magnitude |z|²
    fn norm_sqr(&self) -> Self::Real;

    /// Magnitude |z|
    fn norm(&self) -> Self::Real {
        self.norm_sqr().sqrt()
    }

    /// Create from a real value
    fn from_real(r: Self::Real) -> Self;

    /// Create from real and imaginary parts
    fn from_re_im(re: Self::Real, im: Self::Real) -> Self;

    /// Real part
    fn re(&self) -> Self::Real;

    /// Imaginary part
    fn im(&self) -> Self::Real;

    /// Check if this is approximately zero
    fn is_zero_approx(&self, tol: Self::Real) -> bool {
        self.norm_sqr() < tol * tol
    }

    /// Both parts are finite (no NaN or infinity)
    fn is_finite(&self) -> bool {
        self.re().is_finite() && self.im().is_finite()
    }

    /// Multiplicative inverse (1/z)
    fn inv(&self) -> Self;

    /// Square root
    fn sqrt(&self) -> Self;
}

macro_rules! impl_complex_field {
    ($complex:ty, $real:ty) => {
        impl ComplexField for $complex {
            type Real = $real;

            #[inline]
            fn conj(&self) -> Self {
                <$complex>::conj(self)
            }

            #[inline]
            fn norm_sqr(&self) -> $real {
                self.re * self.re + self.im * self.im
            }

            #[inline]
            fn from_real(r: $real) -> Self {
                <$complex>::new(r, 0.0)
            }

            #[inline]
            fn from_re_im(re: $real, im: $real) -> Self {
                <$complex>::new(re, im)
            }

            #[inline]
            fn re(&self) -> $real {
                self.re
            }

            #[inline]
            fn im(&self) -> $real {
                self.im
            }

            #[inline]
            fn inv(&self) -> Self {
                let denom = self.norm_sqr();
                <$complex>::new(self.re / denom, -self.im / denom)
            }

            #[inline]
            fn sqrt(&self) -> Self {
                <$complex>::sqrt(*self)
            }
        }
    };
}

macro_rules! impl_real_field {
    ($real:ty) => {
        impl ComplexField for $real {
            type Real = $real;

            #[inline]
            fn conj(&self) -> Self {
                *self
            }

            #[inline]
            fn norm_sqr(&self) -> $real {
                *self * *self
            }

            #[inline]
            fn from_real(r: $real) -> Self {
                r
            }

            #[inline]
            fn from_re_im(re: $real, _im: $real) -> Self {
                re
            }

            #[inline]
            fn re(&self) -> $real {
                *self
            }

            #[inline]
            fn im(&self) -> $real {
                0.0
            }

            #[inline]
            fn inv(&self) -> Self {
                1.0 / *self
            }

            #[inline]
            fn sqrt(&self) -> Self {
                <$real>::sqrt(*self)
            }
        }
    };
}

impl_complex_field!(Complex64, f64);
impl_complex_field!(Complex32, f32);
impl_real_field!(f64);
impl_real_field!(f32);

/// Trait for linear operators (matrices) that can perform matrix-vector products.
///
/// Solvers work with dense matrices and matrix-free stencil operators
/// interchangeably through this trait.
pub trait LinearOperator<T: ComplexField>: Send + Sync {
    /// Number of rows in the operator
    fn num_rows(&self) -> usize;

    /// Number of columns in the operator
    fn num_cols(&self) -> usize;

    /// Apply the operator: y = A * x
    fn apply(&self, x: &Array1<T>) -> Array1<T>;

    /// Apply the transpose: y = A^T * x
    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T>;

    /// Apply the Hermitian (conjugate transpose): y = A^H * x
    fn apply_hermitian(&self, x: &Array1<T>) -> Array1<T> {
        let x_conj = x.mapv(|v| v.conj());
        self.apply_transpose(&x_conj).mapv(|v| v.conj())
    }

    /// Check if the operator is square
    fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }
}

impl<T: ComplexField> LinearOperator<T> for Array2<T> {
    fn num_rows(&self) -> usize {
        self.nrows()
    }

    fn num_cols(&self) -> usize {
        self.ncols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        Array1::from_shape_fn(self.nrows(), |i| {
            let mut sum = T::zero();
            for (a, xj) in self.row(i).iter().zip(x.iter()) {
                sum += *a * *xj;
            }
            sum
        })
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        Array1::from_shape_fn(self.ncols(), |j| {
            let mut sum = T::zero();
            for (a, xi) in self.column(j).iter().zip(x.iter()) {
                sum += *a * *xi;
            }
            sum
        })
    }
}

/// Failure raised while applying a preconditioner.
///
/// The originating error is kept boxed so callers can recover their own
/// error type with [`PreconditionerError::into_inner`] and a downcast.
#[derive(Debug, Error)]
#[error("preconditioner application failed: {source}")]
pub struct PreconditionerError {
    #[source]
    source: Box<dyn Error + Send + Sync + 'static>,
}

impl PreconditionerError {
    /// Wrap an error raised by a preconditioner
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(error),
        }
    }

    /// Give back the originating error
    pub fn into_inner(self) -> Box<dyn Error + Send + Sync + 'static> {
        self.source
    }
}

/// Trait for preconditioners used in iterative solvers.
///
/// A preconditioner M approximates A^(-1), so that A*M is better conditioned
/// than A alone. Applying M may fail (a multigrid cycle can hit a numerical
/// breakdown), in which case the Krylov solver stops and hands the error back.
pub trait Preconditioner<T: ComplexField>: Send + Sync {
    /// Apply the preconditioner: y = M * r
    ///
    /// This should approximate solving A * y = r
    fn apply(&self, r: &Array1<T>) -> Result<Array1<T>, PreconditionerError>;
}

/// Identity preconditioner (no preconditioning)
#[derive(Clone, Debug, Default)]
pub struct IdentityPreconditioner;

impl<T: ComplexField> Preconditioner<T> for IdentityPreconditioner {
    fn apply(&self, r: &Array1<T>) -> Result<Array1<T>, PreconditionerError> {
        Ok(r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_complex64_field() {
        let z = Complex64::new(3.0, 4.0);
        assert_relative_eq!(z.norm_sqr(), 25.0);
        assert_relative_eq!(ComplexField::norm(&z), 5.0);

        let z_conj = ComplexField::conj(&z);
        assert_relative_eq!(z_conj.re, 3.0);
        assert_relative_eq!(z_conj.im, -4.0);

        let z_inv = ComplexField::inv(&z);
        let product = z * z_inv;
        assert_relative_eq!(product.re, 1.0, epsilon = 1e-10);
        assert_relative_eq!(product.im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_f64_field() {
        let x: f64 = 3.0;
        assert_relative_eq!(x.norm_sqr(), 9.0);
        assert_relative_eq!(ComplexField::norm(&x), 3.0);
        assert_relative_eq!(ComplexField::conj(&x), 3.0);
        assert_relative_eq!(ComplexField::inv(&x), 1.0 / 3.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(ComplexField::is_finite(&Complex64::new(1.0, -2.0)));
        assert!(!ComplexField::is_finite(&Complex64::new(f64::NAN, 0.0)));
        assert!(!ComplexField::is_finite(&Complex64::new(0.0, f64::INFINITY)));
    }

    #[test]
    fn test_dense_operator() {
        let a = array![[1.0_f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let x = array![1.0_f64, -1.0];
        let y = LinearOperator::apply(&a, &x);
        assert_eq!(y, array![-1.0, -1.0, -1.0]);

        let z = a.apply_transpose(&array![1.0_f64, 0.0, 1.0]);
        assert_eq!(z, array![6.0, 8.0]);
        assert_eq!(LinearOperator::<f64>::num_rows(&a), 3);
        assert!(!LinearOperator::<f64>::is_square(&a));
    }

    #[test]
    fn test_identity_preconditioner() {
        let precond = IdentityPreconditioner;
        let r = Array1::from_vec(vec![Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)]);
        let y = precond.apply(&r).unwrap();
        assert_eq!(r, y);
    }

    #[test]
    fn test_preconditioner_error_downcast() {
        #[derive(Debug, Error)]
        #[error("cycle broke down")]
        struct Breakdown;

        let err = PreconditionerError::new(Breakdown);
        assert!(err.to_string().contains("cycle broke down"));
        assert!(err.into_inner().downcast::<Breakdown>().is_ok());
    }
}
