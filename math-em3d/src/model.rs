//! Material model and per-cell operator coefficients
//!
//! The model stores conductivities (optionally anisotropic along the axes),
//! relative permeabilities and the frequency. [`CellCoefficients`] turns these
//! into the volume-weighted quantities the discrete operator consumes:
//!
//! - `eta_d = -s * mu_0 * sigma_d * V` for each axis `d`
//! - `v_mu = V / mu_r`
//!
//! with `s = -2 pi i f` for positive frequencies and `s = f` for negative
//! ones (Laplace domain). Coarse-level coefficients are the sums over the
//! merged fine cells.

use crate::error::{Result, SolverError};
use crate::grid::{Axis, Grid};
use ndarray::Array3;
use num_complex::Complex64;
use num_traits::Zero;
use std::f64::consts::PI;

/// Vacuum permeability (H/m).
pub const MU_0: f64 = 4.0e-7 * PI;

/// Conductivity and permeability per cell, plus the frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    sigma: [Array3<f64>; 3],
    mu_r: Option<Array3<f64>>,
    frequency: f64,
}

impl Model {
    /// Isotropic model with conductivity `sigma` (S/m).
    pub fn isotropic(sigma: Array3<f64>, frequency: f64) -> Self {
        Self {
            sigma: [sigma.clone(), sigma.clone(), sigma],
            mu_r: None,
            frequency,
        }
    }

    /// Homogeneous isotropic model filling `grid`.
    pub fn homogeneous(grid: &Grid, sigma: f64, frequency: f64) -> Self {
        let [nx, ny, nz] = grid.cells();
        Self::isotropic(Array3::from_elem((nx, ny, nz), sigma), frequency)
    }

    /// Triaxial anisotropy: separate conductivities along x, y and z.
    pub fn anisotropic(
        sigma_x: Array3<f64>,
        sigma_y: Array3<f64>,
        sigma_z: Array3<f64>,
        frequency: f64,
    ) -> Self {
        Self {
            sigma: [sigma_x, sigma_y, sigma_z],
            mu_r: None,
            frequency,
        }
    }

    /// Attach relative magnetic permeabilities.
    pub fn with_mu_r(mut self, mu_r: Array3<f64>) -> Self {
        self.mu_r = Some(mu_r);
        self
    }

    pub fn sigma(&self, axis: Axis) -> &Array3<f64> {
        &self.sigma[axis.index()]
    }

    pub fn mu_r(&self) -> Option<&Array3<f64>> {
        self.mu_r.as_ref()
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Laplace parameter `s`.
    pub fn laplace_parameter(&self) -> Result<Complex64> {
        if self.frequency > 0.0 && self.frequency.is_finite() {
            Ok(Complex64::new(0.0, -2.0 * PI * self.frequency))
        } else if self.frequency < 0.0 && self.frequency.is_finite() {
            Ok(Complex64::new(self.frequency, 0.0))
        } else {
            Err(SolverError::Configuration(format!(
                "frequency must be finite and non-zero, got {}",
                self.frequency
            )))
        }
    }

    /// Check shapes and values against `grid`.
    pub fn validate(&self, grid: &Grid) -> Result<()> {
        let [nx, ny, nz] = grid.cells();
        let expected = (nx, ny, nz);
        for axis in Axis::ALL {
            let sigma = &self.sigma[axis.index()];
            if sigma.dim() != expected {
                return Err(SolverError::Configuration(format!(
                    "sigma_{} has shape {:?}, grid has {:?} cells",
                    axis,
                    sigma.dim(),
                    expected
                )));
            }
            if sigma.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(SolverError::Configuration(format!(
                    "sigma_{} must be finite and non-negative",
                    axis
                )));
            }
        }
        if let Some(mu_r) = &self.mu_r {
            if mu_r.dim() != expected {
                return Err(SolverError::Configuration(format!(
                    "mu_r has shape {:?}, grid has {:?} cells",
                    mu_r.dim(),
                    expected
                )));
            }
            if mu_r.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(SolverError::Configuration(
                    "mu_r must be finite and positive".into(),
                ));
            }
        }
        self.laplace_parameter().map(|_| ())
    }
}

/// Volume-weighted coefficients of one grid level.
#[derive(Debug, Clone, PartialEq)]
pub struct CellCoefficients {
    /// `eta_x`, `eta_y`, `eta_z` per cell
    pub eta: [Array3<Complex64>; 3],
    /// `V / mu_r` per cell
    pub v_mu: Array3<f64>,
}

impl CellCoefficients {
    /// Coefficients of the finest level.
    pub fn new(grid: &Grid, model: &Model) -> Result<Self> {
        model.validate(grid)?;
        let s = model.laplace_parameter()?;
        let [nx, ny, nz] = grid.cells();
        let shape = (nx, ny, nz);

        let eta = std::array::from_fn(|a| {
            let sigma = &model.sigma[a];
            Array3::from_shape_fn(shape, |(i, j, k)| {
                -s * MU_0 * sigma[[i, j, k]] * grid.cell_volume(i, j, k)
            })
        });
        let v_mu = Array3::from_shape_fn(shape, |(i, j, k)| {
            let mu = model.mu_r.as_ref().map_or(1.0, |m| m[[i, j, k]]);
            grid.cell_volume(i, j, k) / mu
        });
        Ok(Self { eta, v_mu })
    }

    /// Number of cells along each axis.
    pub fn cells(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.v_mu.dim();
        [nx, ny, nz]
    }

    /// Sum over pairs of cells along the flagged axes.
    pub fn coarsened(&self, coarsen: [bool; 3]) -> Self {
        let span = coarsen.map(|c| if c { 2 } else { 1 });
        Self {
            eta: std::array::from_fn(|a| sum_blocks(&self.eta[a], span)),
            v_mu: sum_blocks(&self.v_mu, span),
        }
    }
}

/// Sum `span[0] x span[1] x span[2]` blocks of cells.
fn sum_blocks<T>(src: &Array3<T>, span: [usize; 3]) -> Array3<T>
where
    T: Copy + Zero + std::ops::AddAssign,
{
    let (nx, ny, nz) = src.dim();
    let shape = (nx / span[0], ny / span[1], nz / span[2]);
    Array3::from_shape_fn(shape, |(i, j, k)| {
        let mut sum = T::zero();
        for di in 0..span[0] {
            for dj in 0..span[1] {
                for dk in 0..span[2] {
                    sum += src[[i * span[0] + di, j * span[1] + dj, k * span[2] + dk]];
                }
            }
        }
        sum
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> Grid {
        Grid::uniform([4, 2, 2], [100.0, 50.0, 20.0], [0.0; 3]).unwrap()
    }

    #[test]
    fn test_laplace_parameter() {
        let g = grid();
        let s = Model::homogeneous(&g, 1.0, 10.0).laplace_parameter().unwrap();
        assert_relative_eq!(s.im, -2.0 * PI * 10.0);
        let s = Model::homogeneous(&g, 1.0, -3.0).laplace_parameter().unwrap();
        assert_relative_eq!(s.re, -3.0);
        assert!(
            Model::homogeneous(&g, 1.0, 0.0)
                .laplace_parameter()
                .unwrap_err()
                .is_configuration()
        );
    }

    #[test]
    fn test_eta_frequency_domain() {
        let g = grid();
        let coeffs = CellCoefficients::new(&g, &Model::homogeneous(&g, 2.0, 5.0)).unwrap();
        let volume = 100.0 * 50.0 * 20.0;
        // -s mu_0 sigma V = i omega mu_0 sigma V
        let expected = 2.0 * PI * 5.0 * MU_0 * 2.0 * volume;
        let eta = coeffs.eta[0][[1, 1, 1]];
        assert_relative_eq!(eta.re, 0.0);
        assert_relative_eq!(eta.im, expected, max_relative = 1e-12);
        assert_relative_eq!(coeffs.v_mu[[0, 0, 0]], volume);
    }

    #[test]
    fn test_coarsened_sums() {
        let g = grid();
        let mu = Array3::from_elem((4, 2, 2), 2.0);
        let model = Model::homogeneous(&g, 1.0, -1.0).with_mu_r(mu);
        let fine = CellCoefficients::new(&g, &model).unwrap();
        let coarse = fine.coarsened([true, false, false]);
        assert_eq!(coarse.cells(), [2, 2, 2]);
        assert_relative_eq!(coarse.v_mu[[1, 0, 1]], 2.0 * fine.v_mu[[0, 0, 0]]);
        assert_relative_eq!(coarse.eta[2][[0, 1, 0]].re, 2.0 * fine.eta[2][[0, 0, 0]].re);

        let total: f64 = fine.v_mu.sum();
        let coarsest = coarse.coarsened([true, true, true]);
        assert_relative_eq!(coarsest.v_mu.sum(), total, max_relative = 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let g = grid();
        let mut sigma = Array3::from_elem((4, 2, 2), 1.0);
        sigma[[0, 0, 0]] = -1.0;
        assert!(Model::isotropic(sigma, 1.0).validate(&g).is_err());
        let wrong = Array3::from_elem((3, 2, 2), 1.0);
        assert!(Model::isotropic(wrong, 1.0).validate(&g).is_err());
        let mu = Array3::from_elem((4, 2, 2), 0.0);
        assert!(Model::homogeneous(&g, 1.0, 1.0).with_mu_r(mu).validate(&g).is_err());
    }
}
