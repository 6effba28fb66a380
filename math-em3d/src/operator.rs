//! Discrete curl-curl plus mass operator on edge fields
//!
//! The operator is `A = K + diag(m)`, where
//!
//! - `K = sum_f w_f c_f c_f^T` sums over the cell faces `f`. The circulation
//!   `c_f(e)` is the discrete line integral of `e` around the face boundary
//!   (edge values times edge lengths). The weight `w_f` combines the two
//!   cells sharing the face: `sum (V / mu_r) / 2 / area^2`.
//! - `m_e` is a quarter of the summed `eta` of the (up to four) cells
//!   touching edge `e`.
//!
//! Rows and columns of PEC edges are zero, so `A` restricted to the free
//! edges is complex symmetric. A matrix-free application runs in two phases:
//! first every face circulation times its weight, then the gather onto edges.

use crate::error::{Result, SolverError};
use crate::field::{Field, component_shape, count_free_edges, is_free_edge};
use crate::grid::{Axis, Grid};
use crate::model::CellCoefficients;
use ndarray::{Array2, Array3, Zip};
use num_complex::Complex64;

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

/// A grid edge: direction plus the index of its lower node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub axis: Axis,
    pub index: [usize; 3],
}

impl Edge {
    #[inline]
    pub fn new(axis: Axis, index: [usize; 3]) -> Self {
        Self { axis, index }
    }
}

/// A cell face, identified by its normal and lower corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    pub normal: Axis,
    pub index: [usize; 3],
}

impl Face {
    #[inline]
    pub fn new(normal: Axis, index: [usize; 3]) -> Self {
        Self { normal, index }
    }
}

/// Shape of the face array with normal `axis`.
pub fn face_shape(axis: Axis, [nx, ny, nz]: [usize; 3]) -> (usize, usize, usize) {
    match axis {
        Axis::X => (nx + 1, ny, nz),
        Axis::Y => (nx, ny + 1, nz),
        Axis::Z => (nx, ny, nz + 1),
    }
}

/// Scratch buffers for matrix-free application: weighted face circulations.
#[derive(Debug, Clone)]
pub struct OperatorWorkspace {
    flux: [Array3<Complex64>; 3],
}

impl OperatorWorkspace {
    pub fn new(cells: [usize; 3]) -> Self {
        Self {
            flux: Axis::ALL.map(|a| Array3::from_elem(face_shape(a, cells), ZERO)),
        }
    }
}

/// `A = K + diag(m)` on one grid level.
#[derive(Debug, Clone)]
pub struct DiscreteOperator {
    cells: [usize; 3],
    widths: [Vec<f64>; 3],
    mass: [Array3<Complex64>; 3],
    face_weight: [Array3<f64>; 3],
}

impl DiscreteOperator {
    /// Build the operator of `grid` from its cell coefficients.
    pub fn new(grid: &Grid, coeffs: &CellCoefficients) -> Result<Self> {
        let cells = grid.cells();
        if coeffs.cells() != cells {
            return Err(SolverError::Configuration(format!(
                "coefficients cover {:?} cells, grid has {:?}",
                coeffs.cells(),
                cells
            )));
        }
        let widths = Axis::ALL.map(|a| grid.widths(a).to_vec());

        let mass = Axis::ALL.map(|axis| {
            let [b, c] = axis.others();
            let eta = &coeffs.eta[axis.index()];
            Array3::from_shape_fn(component_shape(axis, cells), |(i, j, k)| {
                let idx = [i, j, k];
                let mut sum = ZERO;
                for cb in neighbours(idx[b.index()], cells[b.index()]) {
                    for cc in neighbours(idx[c.index()], cells[c.index()]) {
                        let mut cell = idx;
                        cell[b.index()] = cb;
                        cell[c.index()] = cc;
                        sum += eta[cell];
                    }
                }
                sum * 0.25
            })
        });

        let face_weight = Axis::ALL.map(|normal| {
            let [b, c] = normal.others();
            let n = normal.index();
            Array3::from_shape_fn(face_shape(normal, cells), |(i, j, k)| {
                let idx = [i, j, k];
                let area = widths[b.index()][idx[b.index()]] * widths[c.index()][idx[c.index()]];
                let mut sum = 0.0;
                for ca in neighbours(idx[n], cells[n]) {
                    let mut cell = idx;
                    cell[n] = ca;
                    sum += coeffs.v_mu[cell] / 2.0;
                }
                sum / (area * area)
            })
        });

        Ok(Self {
            cells,
            widths,
            mass,
            face_weight,
        })
    }

    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    pub fn widths(&self, axis: Axis) -> &[f64] {
        &self.widths[axis.index()]
    }

    /// Number of free edges (unknowns).
    pub fn n_free(&self) -> usize {
        count_free_edges(self.cells)
    }

    pub fn workspace(&self) -> OperatorWorkspace {
        OperatorWorkspace::new(self.cells)
    }

    #[inline]
    pub fn is_free(&self, edge: Edge) -> bool {
        is_free_edge(edge.axis, edge.index, self.cells)
    }

    /// Diagonal mass entry `m_e`.
    #[inline]
    pub fn mass(&self, edge: Edge) -> Complex64 {
        self.mass[edge.axis.index()][edge.index]
    }

    #[inline]
    pub fn face_weight(&self, face: Face) -> f64 {
        self.face_weight[face.normal.index()][face.index]
    }

    /// The four faces containing a free edge, with the edge's coefficient in
    /// each face circulation.
    #[inline]
    pub fn edge_faces(&self, edge: Edge) -> [(Face, f64); 4] {
        debug_assert!(self.is_free(edge));
        let [i, j, k] = edge.index;
        match edge.axis {
            Axis::X => {
                let h = self.widths[0][i];
                [
                    (Face::new(Axis::Z, [i, j, k]), h),
                    (Face::new(Axis::Z, [i, j - 1, k]), -h),
                    (Face::new(Axis::Y, [i, j, k]), -h),
                    (Face::new(Axis::Y, [i, j, k - 1]), h),
                ]
            }
            Axis::Y => {
                let h = self.widths[1][j];
                [
                    (Face::new(Axis::Z, [i - 1, j, k]), h),
                    (Face::new(Axis::Z, [i, j, k]), -h),
                    (Face::new(Axis::X, [i, j, k]), h),
                    (Face::new(Axis::X, [i, j, k - 1]), -h),
                ]
            }
            Axis::Z => {
                let h = self.widths[2][k];
                [
                    (Face::new(Axis::X, [i, j - 1, k]), h),
                    (Face::new(Axis::X, [i, j, k]), -h),
                    (Face::new(Axis::Y, [i, j, k]), h),
                    (Face::new(Axis::Y, [i - 1, j, k]), -h),
                ]
            }
        }
    }

    /// The four edges bounding a face, with their circulation coefficients.
    #[inline]
    pub fn face_edges(&self, face: Face) -> [(Edge, f64); 4] {
        let [i, j, k] = face.index;
        let [hx, hy, hz] = [&self.widths[0], &self.widths[1], &self.widths[2]];
        match face.normal {
            Axis::Z => [
                (Edge::new(Axis::X, [i, j, k]), hx[i]),
                (Edge::new(Axis::X, [i, j + 1, k]), -hx[i]),
                (Edge::new(Axis::Y, [i + 1, j, k]), hy[j]),
                (Edge::new(Axis::Y, [i, j, k]), -hy[j]),
            ],
            Axis::X => [
                (Edge::new(Axis::Y, [i, j, k]), hy[j]),
                (Edge::new(Axis::Y, [i, j, k + 1]), -hy[j]),
                (Edge::new(Axis::Z, [i, j + 1, k]), hz[k]),
                (Edge::new(Axis::Z, [i, j, k]), -hz[k]),
            ],
            Axis::Y => [
                (Edge::new(Axis::Z, [i, j, k]), hz[k]),
                (Edge::new(Axis::Z, [i + 1, j, k]), -hz[k]),
                (Edge::new(Axis::X, [i, j, k + 1]), hx[i]),
                (Edge::new(Axis::X, [i, j, k]), -hx[i]),
            ],
        }
    }

    /// Circulation of `x` around `face`, PEC edges counted as zero.
    #[inline]
    fn circulation(&self, x: &Field, face: Face) -> Complex64 {
        self.face_edges(face)
            .iter()
            .filter(|(e, _)| self.is_free(*e))
            .map(|(e, c)| x.component(e.axis)[e.index] * *c)
            .sum()
    }

    /// Row `edge` of `A x`.
    pub fn edge_action(&self, x: &Field, edge: Edge) -> Complex64 {
        if !self.is_free(edge) {
            return ZERO;
        }
        let curl: Complex64 = self
            .edge_faces(edge)
            .iter()
            .map(|(f, c)| self.circulation(x, *f) * (self.face_weight(*f) * c))
            .sum();
        self.mass(edge) * x.component(edge.axis)[edge.index] + curl
    }

    /// Matrix entry `A[a, b]`.
    pub fn coupling(&self, a: Edge, b: Edge) -> Complex64 {
        if !self.is_free(a) || !self.is_free(b) {
            return ZERO;
        }
        let mut value = if a == b { self.mass(a) } else { ZERO };
        for (face, ca) in self.edge_faces(a) {
            let w = self.face_weight(face);
            for (e, cb) in self.face_edges(face) {
                if e == b {
                    value += Complex64::new(w * ca * cb, 0.0);
                }
            }
        }
        value
    }

    /// `out = A x`. Boundary entries of `x` are ignored, those of `out` zeroed.
    pub fn apply_into(&self, x: &Field, out: &mut Field, ws: &mut OperatorWorkspace) {
        debug_assert_eq!(x.cells(), self.cells);
        let cells = self.cells;
        let [hx, hy, hz] = [&self.widths[0], &self.widths[1], &self.widths[2]];
        let ex = |i: usize, j: usize, k: usize| masked(x, Axis::X, [i, j, k], cells);
        let ey = |i: usize, j: usize, k: usize| masked(x, Axis::Y, [i, j, k], cells);
        let ez = |i: usize, j: usize, k: usize| masked(x, Axis::Z, [i, j, k], cells);

        let [wx, wy, wz] = &self.face_weight;
        let [qx, qy, qz] = &mut ws.flux;
        fill_indexed(qx, |i, j, k| {
            (ey(i, j, k) - ey(i, j, k + 1)) * (hy[j] * wx[[i, j, k]])
                + (ez(i, j + 1, k) - ez(i, j, k)) * (hz[k] * wx[[i, j, k]])
        });
        fill_indexed(qy, |i, j, k| {
            (ez(i, j, k) - ez(i + 1, j, k)) * (hz[k] * wy[[i, j, k]])
                + (ex(i, j, k + 1) - ex(i, j, k)) * (hx[i] * wy[[i, j, k]])
        });
        fill_indexed(qz, |i, j, k| {
            (ex(i, j, k) - ex(i, j + 1, k)) * (hx[i] * wz[[i, j, k]])
                + (ey(i + 1, j, k) - ey(i, j, k)) * (hy[j] * wz[[i, j, k]])
        });

        let (qx, qy, qz) = (&*qx, &*qy, &*qz);
        let [mx, my, mz] = &self.mass;
        fill_indexed(&mut out.fx, |i, j, k| {
            if !is_free_edge(Axis::X, [i, j, k], cells) {
                return ZERO;
            }
            mx[[i, j, k]] * x.fx[[i, j, k]]
                + (qz[[i, j, k]] - qz[[i, j - 1, k]] - qy[[i, j, k]] + qy[[i, j, k - 1]]) * hx[i]
        });
        fill_indexed(&mut out.fy, |i, j, k| {
            if !is_free_edge(Axis::Y, [i, j, k], cells) {
                return ZERO;
            }
            my[[i, j, k]] * x.fy[[i, j, k]]
                + (qz[[i - 1, j, k]] - qz[[i, j, k]] + qx[[i, j, k]] - qx[[i, j, k - 1]]) * hy[j]
        });
        fill_indexed(&mut out.fz, |i, j, k| {
            if !is_free_edge(Axis::Z, [i, j, k], cells) {
                return ZERO;
            }
            mz[[i, j, k]] * x.fz[[i, j, k]]
                + (qx[[i, j - 1, k]] - qx[[i, j, k]] + qy[[i, j, k]] - qy[[i - 1, j, k]]) * hz[k]
        });
    }

    /// Allocating version of [`DiscreteOperator::apply_into`].
    pub fn apply(&self, x: &Field) -> Field {
        let mut out = Field::zeros_with_cells(self.cells);
        let mut ws = self.workspace();
        self.apply_into(x, &mut out, &mut ws);
        out
    }

    /// `out = rhs - A x` on the free edges, zero on the boundary.
    pub fn residual_into(
        &self,
        x: &Field,
        rhs: &Field,
        out: &mut Field,
        ws: &mut OperatorWorkspace,
    ) {
        self.apply_into(x, out, ws);
        let cells = self.cells;
        for axis in Axis::ALL {
            Zip::indexed(out.component_mut(axis))
                .and(rhs.component(axis))
                .for_each(|(i, j, k), r, &b| {
                    *r = if is_free_edge(axis, [i, j, k], cells) {
                        b - *r
                    } else {
                        ZERO
                    };
                });
        }
    }

    pub fn residual(&self, x: &Field, rhs: &Field) -> Field {
        let mut out = Field::zeros_with_cells(self.cells);
        let mut ws = self.workspace();
        self.residual_into(x, rhs, &mut out, &mut ws);
        out
    }

    /// Dense matrix over the free edges, in [`Field::to_free_vector`] order.
    pub fn assemble_dense(&self) -> Array2<Complex64> {
        let numbering = free_edge_numbering(self.cells);
        let n = self.n_free();
        let mut matrix = Array2::from_elem((n, n), ZERO);

        for axis in Axis::ALL {
            for ((i, j, k), row) in numbering[axis.index()].indexed_iter() {
                let Some(row) = *row else { continue };
                let edge = Edge::new(axis, [i, j, k]);
                matrix[[row, row]] += self.mass(edge);
                for (face, ca) in self.edge_faces(edge) {
                    let w = self.face_weight(face);
                    for (other, cb) in self.face_edges(face) {
                        if let Some(col) = numbering[other.axis.index()][other.index] {
                            matrix[[row, col]] += Complex64::new(w * ca * cb, 0.0);
                        }
                    }
                }
            }
        }
        matrix
    }
}

/// Position of each free edge in the canonical free-edge ordering.
pub fn free_edge_numbering(cells: [usize; 3]) -> [Array3<Option<usize>>; 3] {
    let mut next = 0;
    Axis::ALL.map(|axis| {
        let mut numbering = Array3::from_elem(component_shape(axis, cells), None);
        for ((i, j, k), slot) in numbering.indexed_iter_mut() {
            if is_free_edge(axis, [i, j, k], cells) {
                *slot = Some(next);
                next += 1;
            }
        }
        numbering
    })
}

/// Cells `n - 1` and `n` that exist along an axis with `len` cells.
#[inline]
fn neighbours(n: usize, len: usize) -> impl Iterator<Item = usize> {
    n.checked_sub(1).into_iter().chain((n < len).then_some(n))
}

#[inline]
fn masked(x: &Field, axis: Axis, index: [usize; 3], cells: [usize; 3]) -> Complex64 {
    if is_free_edge(axis, index, cells) {
        x.component(axis)[index]
    } else {
        ZERO
    }
}

/// `arr[i, j, k] = f(i, j, k)`, in parallel when enabled.
#[cfg(feature = "parallel")]
fn fill_indexed<F>(arr: &mut Array3<Complex64>, f: F)
where
    F: Fn(usize, usize, usize) -> Complex64 + Sync + Send,
{
    Zip::indexed(arr).par_for_each(|(i, j, k), v| *v = f(i, j, k));
}

#[cfg(not(feature = "parallel"))]
fn fill_indexed<F>(arr: &mut Array3<Complex64>, f: F)
where
    F: Fn(usize, usize, usize) -> Complex64,
{
    Zip::indexed(arr).for_each(|(i, j, k), v| *v = f(i, j, k));
}
