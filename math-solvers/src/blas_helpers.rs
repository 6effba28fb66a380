//! Vector kernels shared by the Krylov solvers
//!
//! Inner products, norms and the axpy family. With the `rayon` feature the
//! reductions over long vectors are split across threads.

use crate::traits::ComplexField;
use ndarray::Array1;
use num_traits::Float;
use num_traits::Zero;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Vectors shorter than this are always reduced sequentially.
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 16_384;

/// Compute inner product (x, y) = Σ conj(x_i) * y_i
#[inline]
pub fn inner_product<T: ComplexField>(x: &Array1<T>, y: &Array1<T>) -> T {
    assert_eq!(
        x.len(),
        y.len(),
        "Vector lengths must match for inner product"
    );

    #[cfg(feature = "rayon")]
    if x.len() >= PARALLEL_THRESHOLD {
        if let (Some(xs), Some(ys)) = (x.as_slice(), y.as_slice()) {
            return xs
                .par_iter()
                .zip(ys.par_iter())
                .map(|(xi, yi)| xi.conj() * *yi)
                .reduce(T::zero, |a, b| a + b);
        }
    }

    let mut sum = T::zero();
    for (xi, yi) in x.iter().zip(y.iter()) {
        sum += xi.conj() * *yi;
    }
    sum
}

/// Compute the unconjugated bilinear form x^T y = Σ x_i * y_i
///
/// This is the natural pairing for complex symmetric operators.
#[inline]
pub fn bilinear_product<T: ComplexField>(x: &Array1<T>, y: &Array1<T>) -> T {
    assert_eq!(x.len(), y.len(), "Vector lengths must match for x^T y");
    let mut sum = T::zero();
    for (xi, yi) in x.iter().zip(y.iter()) {
        sum += *xi * *yi;
    }
    sum
}

/// Compute vector 2-norm: ||x||_2 = sqrt(Σ |x_i|^2)
#[inline]
pub fn vector_norm<T: ComplexField>(x: &Array1<T>) -> T::Real
where
    T::Real: Float,
{
    vector_norm_sqr(x).sqrt()
}

/// Compute vector norm squared: ||x||_2^2 = Σ |x_i|^2
#[inline]
pub fn vector_norm_sqr<T: ComplexField>(x: &Array1<T>) -> T::Real {
    #[cfg(feature = "rayon")]
    if x.len() >= PARALLEL_THRESHOLD {
        if let Some(xs) = x.as_slice() {
            return xs
                .par_iter()
                .map(|xi| xi.norm_sqr())
                .reduce(T::Real::zero, |a, b| a + b);
        }
    }

    let mut sum = T::Real::zero();
    for xi in x.iter() {
        sum += xi.norm_sqr();
    }
    sum
}

/// Compute axpy: y = α * x + y
#[inline]
pub fn axpy<T: ComplexField>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    for (xi, yi) in x.iter().zip(y.iter_mut()) {
        *yi += alpha * *xi;
    }
}

/// Compute the scaled vector addition: z = α * x + β * y
#[inline]
pub fn axpby<T: ComplexField>(alpha: T, x: &Array1<T>, beta: T, y: &Array1<T>, z: &mut Array1<T>) {
    for ((xi, yi), zi) in x.iter().zip(y.iter()).zip(z.iter_mut()) {
        *zi = alpha * *xi + beta * *yi;
    }
}

/// True when every entry is finite
#[inline]
pub fn all_finite<T: ComplexField>(x: &Array1<T>) -> bool {
    x.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use num_complex::Complex64;

    #[test]
    fn test_inner_product_real() {
        let x = array![1.0_f64, 2.0, 3.0];
        let y = array![4.0_f64, 5.0, 6.0];

        let ip = inner_product(&x, &y);
        assert_relative_eq!(ip, 32.0, epsilon = 1e-10);
    }

    #[test]
    fn test_inner_product_complex() {
        let x = array![Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)];
        let y = array![Complex64::new(5.0, 6.0), Complex64::new(7.0, 8.0)];

        let ip = inner_product(&x, &y);
        assert_relative_eq!(ip.re, 70.0, epsilon = 1e-10);
        assert_relative_eq!(ip.im, -8.0, epsilon = 1e-10);
    }

    #[test]
    fn test_bilinear_product_complex() {
        let x = array![Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)];
        let y = array![Complex64::new(5.0, 6.0), Complex64::new(7.0, 8.0)];

        // (1+2i)(5+6i) + (3+4i)(7+8i) = (-7+16i) + (-11+52i)
        let bp = bilinear_product(&x, &y);
        assert_relative_eq!(bp.re, -18.0, epsilon = 1e-10);
        assert_relative_eq!(bp.im, 68.0, epsilon = 1e-10);
    }

    #[test]
    fn test_vector_norm_complex() {
        let x = array![Complex64::new(3.0, 0.0), Complex64::new(0.0, 4.0)];
        assert_relative_eq!(vector_norm(&x), 5.0, epsilon = 1e-10);
        assert_relative_eq!(vector_norm_sqr(&x), 25.0, epsilon = 1e-10);
    }

    #[test]
    fn test_vector_norm_long() {
        let x = Array1::from_elem(40_000, Complex64::new(0.0, 0.5));
        assert_relative_eq!(vector_norm_sqr(&x), 10_000.0, epsilon = 1e-8);
        assert_relative_eq!(inner_product(&x, &x).re, 10_000.0, epsilon = 1e-8);
    }

    #[test]
    fn test_axpy() {
        let x = array![1.0_f64, 2.0, 3.0];
        let mut y = array![1.0_f64, 1.0, 1.0];

        axpy(2.0, &x, &mut y);
        assert_eq!(y, array![3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_axpby() {
        let x = array![1.0_f64, 2.0, 3.0];
        let y = array![4.0_f64, 5.0, 6.0];
        let mut z = array![0.0_f64, 0.0, 0.0];

        axpby(2.0, &x, 0.5, &y, &mut z);
        assert_eq!(z, array![4.0, 6.5, 9.0]);
    }

    #[test]
    fn test_all_finite() {
        assert!(all_finite(&array![1.0_f64, -2.0]));
        assert!(!all_finite(&array![1.0_f64, f64::NAN]));
    }
}
