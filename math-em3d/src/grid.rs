//! Rectilinear (tensor) grids
//!
//! A grid is given by strictly increasing node coordinates along each axis.
//! Cell widths are cached so the operator and the transfer stencils never
//! recompute differences.

use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in storage order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of the axis in `[x, y, z]` arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two other axes, in cyclic order.
    #[inline]
    pub fn others(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::Z, Axis::X],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

/// Tensor-product grid with nodes along x, y and z.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    nodes: [Vec<f64>; 3],
    widths: [Vec<f64>; 3],
}

impl Grid {
    /// Create a grid from node coordinates.
    ///
    /// Each axis needs at least two cells (three nodes) with finite, strictly
    /// increasing coordinates.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self> {
        let nodes = [x, y, z];
        for axis in Axis::ALL {
            validate_nodes(axis, &nodes[axis.index()])?;
        }
        let widths = nodes.clone().map(|n| n.windows(2).map(|w| w[1] - w[0]).collect());
        Ok(Self { nodes, widths })
    }

    /// Create a grid from cell widths and an origin.
    pub fn from_widths(hx: &[f64], hy: &[f64], hz: &[f64], origin: [f64; 3]) -> Result<Self> {
        let build = |h: &[f64], start: f64| {
            let mut nodes = Vec::with_capacity(h.len() + 1);
            nodes.push(start);
            let mut pos = start;
            for &w in h {
                pos += w;
                nodes.push(pos);
            }
            nodes
        };
        Self::new(
            build(hx, origin[0]),
            build(hy, origin[1]),
            build(hz, origin[2]),
        )
    }

    /// Uniform grid with `cells` cells of width `spacing` along each axis.
    pub fn uniform(cells: [usize; 3], spacing: [f64; 3], origin: [f64; 3]) -> Result<Self> {
        Self::from_widths(
            &vec![spacing[0]; cells[0]],
            &vec![spacing[1]; cells[1]],
            &vec![spacing[2]; cells[2]],
            origin,
        )
    }

    /// Node coordinates along `axis`.
    pub fn nodes(&self, axis: Axis) -> &[f64] {
        &self.nodes[axis.index()]
    }

    /// Cell widths along `axis`.
    pub fn widths(&self, axis: Axis) -> &[f64] {
        &self.widths[axis.index()]
    }

    pub fn hx(&self) -> &[f64] {
        &self.widths[0]
    }

    pub fn hy(&self) -> &[f64] {
        &self.widths[1]
    }

    pub fn hz(&self) -> &[f64] {
        &self.widths[2]
    }

    /// Number of cells along each axis.
    pub fn cells(&self) -> [usize; 3] {
        [
            self.widths[0].len(),
            self.widths[1].len(),
            self.widths[2].len(),
        ]
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        self.cells().iter().product()
    }

    /// Total number of edges, boundary edges included.
    pub fn n_edges(&self) -> usize {
        let [nx, ny, nz] = self.cells();
        nx * (ny + 1) * (nz + 1) + (nx + 1) * ny * (nz + 1) + (nx + 1) * (ny + 1) * nz
    }

    /// Volume of cell `(i, j, k)`.
    #[inline]
    pub fn cell_volume(&self, i: usize, j: usize, k: usize) -> f64 {
        self.widths[0][i] * self.widths[1][j] * self.widths[2][k]
    }

    /// Keep every second node along the flagged axes.
    ///
    /// Flagged axes must have an even number of cells.
    pub fn coarsened(&self, coarsen: [bool; 3]) -> Grid {
        let nodes = std::array::from_fn(|a| {
            if coarsen[a] {
                debug_assert!(self.widths[a].len() % 2 == 0);
                self.nodes[a].iter().step_by(2).copied().collect()
            } else {
                self.nodes[a].clone()
            }
        });
        let widths = std::array::from_fn(|a| {
            if coarsen[a] {
                self.widths[a].chunks(2).map(|c| c.iter().sum()).collect()
            } else {
                self.widths[a].clone()
            }
        });
        Grid { nodes, widths }
    }
}

fn validate_nodes(axis: Axis, nodes: &[f64]) -> Result<()> {
    if nodes.len() < 3 {
        return Err(SolverError::Configuration(format!(
            "grid {} has {} cells, at least 2 are required",
            axis,
            nodes.len().saturating_sub(1)
        )));
    }
    if nodes.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::Configuration(format!(
            "grid {} contains non-finite coordinates",
            axis
        )));
    }
    if let Some(pos) = nodes.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SolverError::Configuration(format!(
            "grid {} nodes are not strictly increasing at index {}",
            axis,
            pos + 1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_grid() {
        let grid = Grid::uniform([4, 2, 6], [10.0, 20.0, 5.0], [0.0, -20.0, 0.0]).unwrap();
        assert_eq!(grid.cells(), [4, 2, 6]);
        assert_eq!(grid.n_cells(), 48);
        assert_eq!(grid.nodes(Axis::Y), &[-20.0, 0.0, 20.0]);
        assert_relative_eq!(grid.cell_volume(1, 1, 1), 1000.0);
        assert_eq!(grid.n_edges(), 4 * 3 * 7 + 5 * 2 * 7 + 5 * 3 * 6);
    }

    #[test]
    fn test_rejects_bad_nodes() {
        let ok = vec![0.0, 1.0, 2.0];
        assert!(Grid::new(vec![0.0, 1.0], ok.clone(), ok.clone()).is_err());
        assert!(Grid::new(vec![0.0, 2.0, 1.0], ok.clone(), ok.clone()).is_err());
        assert!(Grid::new(ok.clone(), vec![0.0, f64::NAN, 1.0], ok.clone()).is_err());
        assert!(Grid::new(ok.clone(), ok.clone(), vec![0.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_coarsened_merges_widths() {
        let grid = Grid::from_widths(&[1.0, 2.0, 3.0, 4.0], &[1.0, 1.0], &[5.0, 5.0], [0.0; 3])
            .unwrap();
        let coarse = grid.coarsened([true, false, true]);
        assert_eq!(coarse.cells(), [2, 2, 1]);
        assert_eq!(coarse.hx(), &[3.0, 7.0]);
        assert_eq!(coarse.nodes(Axis::X), &[0.0, 3.0, 10.0]);
        assert_eq!(coarse.hz(), &[10.0]);
    }

    #[test]
    fn test_axis_helpers() {
        assert_eq!(Axis::Y.index(), 1);
        assert_eq!(Axis::Z.others(), [Axis::X, Axis::Y]);
        assert_eq!(Axis::X.to_string(), "x");
    }
}
