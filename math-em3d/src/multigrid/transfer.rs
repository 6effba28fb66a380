//! Grid transfer between a fine level and the next coarser one
//!
//! Prolongation works one axis at a time. Along the direction of an edge
//! component a coarse edge is split into its two fine halves with the same
//! value (piecewise constant). Across that direction, fine nodes take the
//! linear interpolation of the two surrounding coarse nodes using the actual
//! node coordinates. Held axes (semicoarsening) map one to one.
//!
//! Restriction is the transpose of prolongation. An averaging variant
//! divides by the column sums of `P`, which makes it reproduce constants.

use crate::error::{Result, SolverError};
use crate::field::Field;
use crate::grid::{Axis, Grid};
use ndarray::{Array3, Zip};
use num_complex::Complex64;

/// Up to two coarse indices with weights for one fine index.
type Stencil = [(usize, f64); 2];

/// Fine indices with weights feeding one coarse index.
type Gather = Vec<(usize, f64)>;

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

/// Prolongation/restriction pair between two nested grids.
#[derive(Debug, Clone)]
pub struct Transfer {
    coarsen: [bool; 3],
    fine_cells: [usize; 3],
    coarse_cells: [usize; 3],
    cell_map: [Vec<Stencil>; 3],
    node_map: [Vec<Stencil>; 3],
    cell_gather: [Vec<Gather>; 3],
    node_gather: [Vec<Gather>; 3],
    column_sums: [Array3<f64>; 3],
}

impl Transfer {
    /// Build the stencils between `fine` and `coarse`, where `coarse` keeps
    /// every second node of `fine` along the flagged axes.
    pub fn new(fine: &Grid, coarse: &Grid, coarsen: [bool; 3]) -> Result<Self> {
        let fine_cells = fine.cells();
        let coarse_cells = coarse.cells();
        for axis in Axis::ALL {
            let a = axis.index();
            let expected = if coarsen[a] {
                fine_cells[a] / 2
            } else {
                fine_cells[a]
            };
            if (coarsen[a] && fine_cells[a] % 2 != 0) || coarse_cells[a] != expected {
                return Err(SolverError::Configuration(format!(
                    "cannot transfer {} cells to {} along {}",
                    fine_cells[a], coarse_cells[a], axis
                )));
            }
        }

        let cell_map = Axis::ALL.map(|axis| {
            let a = axis.index();
            (0..fine_cells[a])
                .map(|i| {
                    let c = if coarsen[a] { i / 2 } else { i };
                    [(c, 1.0), (c, 0.0)]
                })
                .collect::<Vec<_>>()
        });
        let node_map = Axis::ALL.map(|axis| {
            let a = axis.index();
            let xf = fine.nodes(axis);
            let xc = coarse.nodes(axis);
            (0..xf.len())
                .map(|i| {
                    if !coarsen[a] {
                        [(i, 1.0), (i, 0.0)]
                    } else if i % 2 == 0 {
                        [(i / 2, 1.0), (i / 2, 0.0)]
                    } else {
                        let c = i / 2;
                        let t = (xf[i] - xc[c]) / (xc[c + 1] - xc[c]);
                        [(c, 1.0 - t), (c + 1, t)]
                    }
                })
                .collect::<Vec<_>>()
        });

        let cell_gather =
            Axis::ALL.map(|axis| transpose(&cell_map[axis.index()], coarse_cells[axis.index()]));
        let node_gather = Axis::ALL
            .map(|axis| transpose(&node_map[axis.index()], coarse_cells[axis.index()] + 1));

        let mut transfer = Self {
            coarsen,
            fine_cells,
            coarse_cells,
            cell_map,
            node_map,
            cell_gather,
            node_gather,
            column_sums: Axis::ALL.map(|_| Array3::zeros((0, 0, 0))),
        };
        let mut ones = Field::zeros_with_cells(fine_cells);
        ones.fill(Complex64::new(1.0, 0.0));
        let sums = transfer.restrict_raw(&ones);
        transfer.column_sums = Axis::ALL.map(|axis| sums.component(axis).mapv(|v| v.re));
        Ok(transfer)
    }

    /// Axes halved by this transfer.
    pub fn coarsen_flags(&self) -> [bool; 3] {
        self.coarsen
    }

    pub fn fine_cells(&self) -> [usize; 3] {
        self.fine_cells
    }

    pub fn coarse_cells(&self) -> [usize; 3] {
        self.coarse_cells
    }

    /// Per-axis stencils for edge component `component`.
    fn stencils(&self, component: Axis) -> [&[Stencil]; 3] {
        Axis::ALL.map(|axis| {
            let a = axis.index();
            if axis == component {
                self.cell_map[a].as_slice()
            } else {
                self.node_map[a].as_slice()
            }
        })
    }

    /// Per-axis transposed stencils for edge component `component`.
    fn gathers(&self, component: Axis) -> [&[Gather]; 3] {
        Axis::ALL.map(|axis| {
            let a = axis.index();
            if axis == component {
                self.cell_gather[a].as_slice()
            } else {
                self.node_gather[a].as_slice()
            }
        })
    }

    /// `P c` on every edge, boundary edges included.
    pub fn prolong(&self, coarse: &Field) -> Field {
        let mut fine = Field::zeros_with_cells(self.fine_cells);
        self.prolong_into(coarse, &mut fine);
        fine
    }

    /// Overwrite `fine` with `P coarse`.
    pub fn prolong_into(&self, coarse: &Field, fine: &mut Field) {
        for axis in Axis::ALL {
            prolong_component(
                coarse.component(axis),
                fine.component_mut(axis),
                self.stencils(axis),
            );
        }
    }

    /// `fine += P coarse`, then enforce PEC on `fine`. `scratch` is a fine
    /// level buffer and is overwritten.
    pub fn prolong_add(&self, coarse: &Field, fine: &mut Field, scratch: &mut Field) {
        self.prolong_into(coarse, scratch);
        *fine += &*scratch;
        fine.ensure_pec();
    }

    fn restrict_raw(&self, fine: &Field) -> Field {
        let mut coarse = Field::zeros_with_cells(self.coarse_cells);
        for axis in Axis::ALL {
            restrict_component(
                fine.component(axis),
                coarse.component_mut(axis),
                self.gathers(axis),
            );
        }
        coarse
    }

    /// `coarse = P^T fine`, then enforce PEC on `coarse`.
    pub fn restrict_into(&self, fine: &Field, coarse: &mut Field) {
        for axis in Axis::ALL {
            restrict_component(
                fine.component(axis),
                coarse.component_mut(axis),
                self.gathers(axis),
            );
        }
        coarse.ensure_pec();
    }

    /// Allocating version of [`Transfer::restrict_into`].
    pub fn restrict(&self, fine: &Field) -> Field {
        let mut coarse = Field::zeros_with_cells(self.coarse_cells);
        self.restrict_into(fine, &mut coarse);
        coarse
    }

    /// `D^-1 P^T fine` with `D` the column sums of `P`, on every edge.
    ///
    /// Constants are restricted to the same constant.
    pub fn restrict_average(&self, fine: &Field) -> Field {
        let mut coarse = self.restrict_raw(fine);
        for axis in Axis::ALL {
            Zip::from(coarse.component_mut(axis))
                .and(&self.column_sums[axis.index()])
                .for_each(|c, &d| {
                    if d > 0.0 {
                        *c /= d;
                    }
                });
        }
        coarse
    }
}

fn prolong_component(coarse: &Array3<Complex64>, fine: &mut Array3<Complex64>, st: [&[Stencil]; 3]) {
    let [sx, sy, sz] = st;
    let value = |i: usize, j: usize, k: usize| {
        let mut sum = ZERO;
        for &(ci, wi) in &sx[i] {
            for &(cj, wj) in &sy[j] {
                for &(ck, wk) in &sz[k] {
                    let w = wi * wj * wk;
                    if w != 0.0 {
                        sum += coarse[[ci, cj, ck]] * w;
                    }
                }
            }
        }
        sum
    };
    #[cfg(feature = "parallel")]
    Zip::indexed(fine).par_for_each(|(i, j, k), v| *v = value(i, j, k));
    #[cfg(not(feature = "parallel"))]
    Zip::indexed(fine).for_each(|(i, j, k), v| *v = value(i, j, k));
}

/// Invert a fine-to-coarse stencil map, dropping zero weights.
fn transpose(map: &[Stencil], n_coarse: usize) -> Vec<Gather> {
    let mut gather = vec![Gather::new(); n_coarse];
    for (f, stencil) in map.iter().enumerate() {
        for &(c, w) in stencil {
            if w != 0.0 {
                gather[c].push((f, w));
            }
        }
    }
    gather
}

fn restrict_component(fine: &Array3<Complex64>, coarse: &mut Array3<Complex64>, gt: [&[Gather]; 3]) {
    let [gx, gy, gz] = gt;
    let value = |ci: usize, cj: usize, ck: usize| {
        let mut sum = ZERO;
        for &(i, wi) in &gx[ci] {
            for &(j, wj) in &gy[cj] {
                for &(k, wk) in &gz[ck] {
                    sum += fine[[i, j, k]] * (wi * wj * wk);
                }
            }
        }
        sum
    };
    #[cfg(feature = "parallel")]
    Zip::indexed(coarse).par_for_each(|(i, j, k), v| *v = value(i, j, k));
    #[cfg(not(feature = "parallel"))]
    Zip::indexed(coarse).for_each(|(i, j, k), v| *v = value(i, j, k));
}
