//! Edge-based electric fields
//!
//! Component `x` lives on the x-directed edges of the grid, with shape
//! `(nx, ny + 1, nz + 1)`; `y` and `z` follow the same pattern. Edges lying
//! on the outer boundary and tangential to it are fixed to zero (perfect
//! electric conductor); all remaining edges are *free*.
//!
//! The free edges have a canonical ordering used whenever a field is
//! flattened into a vector: all free x edges, then y, then z, each in
//! row-major `(i, j, k)` order.

use crate::error::{Result, SolverError};
use crate::grid::{Axis, Grid};
use ndarray::{Array1, Array3, s};
use num_complex::Complex64;
use std::ops::AddAssign;

/// Shape of component `axis` on a grid with `cells` cells.
pub fn component_shape(axis: Axis, cells: [usize; 3]) -> (usize, usize, usize) {
    let [nx, ny, nz] = cells;
    match axis {
        Axis::X => (nx, ny + 1, nz + 1),
        Axis::Y => (nx + 1, ny, nz + 1),
        Axis::Z => (nx + 1, ny + 1, nz),
    }
}

/// Whether edge `index` of component `axis` is free (not on the PEC boundary).
#[inline]
pub fn is_free_edge(axis: Axis, [i, j, k]: [usize; 3], [nx, ny, nz]: [usize; 3]) -> bool {
    match axis {
        Axis::X => i < nx && j > 0 && j < ny && k > 0 && k < nz,
        Axis::Y => j < ny && i > 0 && i < nx && k > 0 && k < nz,
        Axis::Z => k < nz && i > 0 && i < nx && j > 0 && j < ny,
    }
}

/// Number of free edges on a grid with `cells` cells.
pub fn count_free_edges([nx, ny, nz]: [usize; 3]) -> usize {
    let inner = |n: usize| n.saturating_sub(1);
    nx * inner(ny) * inner(nz) + inner(nx) * ny * inner(nz) + inner(nx) * inner(ny) * nz
}

/// Electric field sampled on the edges of a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub fx: Array3<Complex64>,
    pub fy: Array3<Complex64>,
    pub fz: Array3<Complex64>,
}

impl Field {
    /// Zero field on `grid`.
    pub fn zeros(grid: &Grid) -> Self {
        Self::zeros_with_cells(grid.cells())
    }

    pub fn zeros_with_cells(cells: [usize; 3]) -> Self {
        let zero = Complex64::new(0.0, 0.0);
        Self {
            fx: Array3::from_elem(component_shape(Axis::X, cells), zero),
            fy: Array3::from_elem(component_shape(Axis::Y, cells), zero),
            fz: Array3::from_elem(component_shape(Axis::Z, cells), zero),
        }
    }

    /// Build a field from its three components, checking the shapes agree.
    pub fn from_components(
        fx: Array3<Complex64>,
        fy: Array3<Complex64>,
        fz: Array3<Complex64>,
    ) -> Result<Self> {
        let cells = [fx.dim().0, fy.dim().1, fz.dim().2];
        let field = Self { fx, fy, fz };
        for axis in Axis::ALL {
            let expected = component_shape(axis, cells);
            if field.component(axis).dim() != expected {
                return Err(SolverError::Configuration(format!(
                    "field component {} has shape {:?}, expected {:?}",
                    axis,
                    field.component(axis).dim(),
                    expected
                )));
            }
        }
        Ok(field)
    }

    /// Number of cells of the underlying grid.
    pub fn cells(&self) -> [usize; 3] {
        [self.fx.dim().0, self.fy.dim().1, self.fz.dim().2]
    }

    /// Fail unless the field fits `grid`.
    pub fn check_grid(&self, grid: &Grid, what: &str) -> Result<()> {
        self.check_cells(grid.cells(), what)
    }

    /// Configuration error unless the field lives on `cells`.
    pub fn check_cells(&self, cells: [usize; 3], what: &str) -> Result<()> {
        if self.cells() != cells {
            return Err(SolverError::Configuration(format!(
                "{} is defined on {:?} cells, grid has {:?}",
                what,
                self.cells(),
                cells
            )));
        }
        Ok(())
    }

    pub fn component(&self, axis: Axis) -> &Array3<Complex64> {
        match axis {
            Axis::X => &self.fx,
            Axis::Y => &self.fy,
            Axis::Z => &self.fz,
        }
    }

    pub fn component_mut(&mut self, axis: Axis) -> &mut Array3<Complex64> {
        match axis {
            Axis::X => &mut self.fx,
            Axis::Y => &mut self.fy,
            Axis::Z => &mut self.fz,
        }
    }

    /// Zero the tangential boundary edges.
    pub fn ensure_pec(&mut self) {
        let zero = Complex64::new(0.0, 0.0);
        let [nx, ny, nz] = self.cells();

        self.fx.slice_mut(s![.., 0, ..]).fill(zero);
        self.fx.slice_mut(s![.., ny, ..]).fill(zero);
        self.fx.slice_mut(s![.., .., 0]).fill(zero);
        self.fx.slice_mut(s![.., .., nz]).fill(zero);

        self.fy.slice_mut(s![0, .., ..]).fill(zero);
        self.fy.slice_mut(s![nx, .., ..]).fill(zero);
        self.fy.slice_mut(s![.., .., 0]).fill(zero);
        self.fy.slice_mut(s![.., .., nz]).fill(zero);

        self.fz.slice_mut(s![0, .., ..]).fill(zero);
        self.fz.slice_mut(s![nx, .., ..]).fill(zero);
        self.fz.slice_mut(s![.., 0, ..]).fill(zero);
        self.fz.slice_mut(s![.., ny, ..]).fill(zero);
    }

    pub fn fill(&mut self, value: Complex64) {
        self.fx.fill(value);
        self.fy.fill(value);
        self.fz.fill(value);
    }

    /// Copy `other` into `self` without reallocating.
    pub fn assign(&mut self, other: &Field) {
        self.fx.assign(&other.fx);
        self.fy.assign(&other.fy);
        self.fz.assign(&other.fz);
    }

    /// Euclidean norm over all edges.
    pub fn norm(&self) -> f64 {
        self.norm_sqr().sqrt()
    }

    pub fn norm_sqr(&self) -> f64 {
        Axis::ALL
            .iter()
            .map(|&a| self.component(a).iter().map(|v| v.norm_sqr()).sum::<f64>())
            .sum()
    }

    /// Unconjugated sum of products, `sum_e a_e b_e`.
    pub fn bilinear(&self, other: &Field) -> Complex64 {
        Axis::ALL
            .iter()
            .map(|&a| {
                self.component(a)
                    .iter()
                    .zip(other.component(a).iter())
                    .map(|(x, y)| x * y)
                    .sum::<Complex64>()
            })
            .sum()
    }

    pub fn is_finite(&self) -> bool {
        Axis::ALL
            .iter()
            .all(|&a| self.component(a).iter().all(|v| v.re.is_finite() && v.im.is_finite()))
    }

    /// Number of free edges.
    pub fn n_free(&self) -> usize {
        count_free_edges(self.cells())
    }

    /// Flatten the free edges in canonical order.
    pub fn to_free_vector(&self) -> Array1<Complex64> {
        let mut out = Vec::with_capacity(self.n_free());
        self.gather_free_into(&mut out);
        Array1::from(out)
    }

    /// Replace the contents of `out` with the free edges in canonical order.
    pub(crate) fn gather_free_into(&self, out: &mut Vec<Complex64>) {
        let cells = self.cells();
        out.clear();
        for axis in Axis::ALL {
            for ((i, j, k), v) in self.component(axis).indexed_iter() {
                if is_free_edge(axis, [i, j, k], cells) {
                    out.push(*v);
                }
            }
        }
    }

    /// Inverse of [`Field::to_free_vector`]; boundary edges are zero.
    pub fn from_free_vector(cells: [usize; 3], values: &Array1<Complex64>) -> Result<Self> {
        let expected = count_free_edges(cells);
        if values.len() != expected {
            return Err(SolverError::Configuration(format!(
                "vector has {} entries, grid has {} free edges",
                values.len(),
                expected
            )));
        }
        Ok(Self::scatter_free(cells, values.iter()))
    }

    /// Fill the free edges in canonical order from `values`; boundary edges
    /// and any edges left over once `values` runs out stay zero.
    pub(crate) fn scatter_free<'a, I>(cells: [usize; 3], values: I) -> Self
    where
        I: IntoIterator<Item = &'a Complex64>,
    {
        let mut field = Self::zeros_with_cells(cells);
        field.assign_free(values);
        field
    }

    /// In-place form of [`Field::scatter_free`].
    pub(crate) fn assign_free<'a, I>(&mut self, values: I)
    where
        I: IntoIterator<Item = &'a Complex64>,
    {
        let cells = self.cells();
        let zero = Complex64::new(0.0, 0.0);
        let mut next = values.into_iter();
        for axis in Axis::ALL {
            for ((i, j, k), v) in self.component_mut(axis).indexed_iter_mut() {
                *v = if is_free_edge(axis, [i, j, k], cells) {
                    next.next().copied().unwrap_or(zero)
                } else {
                    zero
                };
            }
        }
    }
}

impl AddAssign<&Field> for Field {
    fn add_assign(&mut self, rhs: &Field) {
        self.fx += &rhs.fx;
        self.fy += &rhs.fy;
        self.fz += &rhs.fz;
    }
}
