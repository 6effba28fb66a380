//! Block Gauss-Seidel smoothers
//!
//! Point relaxation visits every interior node and solves exactly for the
//! six edges attached to it, using the current values of all other edges.
//! Line relaxation does the same for all edges attached to a full line of
//! nodes along an axis, which gives a banded system. Lines cure the slow
//! smoothing caused by strongly stretched cells.
//!
//! Successive sweeps alternate between forward and backward ordering.

use crate::error::{Result, SolverError};
use crate::field::Field;
use crate::grid::Axis;
use crate::operator::{DiscreteOperator, Edge};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use solvers::{BandedCholesky, CholeskyError};

/// Relaxation scheme.
///
/// Line variants naming several axes run one line sweep set per axis, in
/// x, y, z order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relaxation {
    /// Node-by-node block Gauss-Seidel
    #[default]
    Point,
    LineX,
    LineY,
    LineZ,
    #[serde(rename = "line_yz")]
    LineYZ,
    #[serde(rename = "line_xz")]
    LineXZ,
    #[serde(rename = "line_xy")]
    LineXY,
    /// Lines along all three axes
    #[serde(rename = "line_xyz")]
    LineXYZ,
}

impl Relaxation {
    /// Schedule cycling through the pairwise line relaxations.
    pub fn alternating() -> Vec<Relaxation> {
        vec![Relaxation::LineYZ, Relaxation::LineXZ, Relaxation::LineXY]
    }

    /// Whether lines along `axis` are relaxed.
    pub fn uses_axis(self, axis: Axis) -> bool {
        use Relaxation::*;
        match axis {
            Axis::X => matches!(self, LineX | LineXZ | LineXY | LineXYZ),
            Axis::Y => matches!(self, LineY | LineYZ | LineXY | LineXYZ),
            Axis::Z => matches!(self, LineZ | LineYZ | LineXZ | LineXYZ),
        }
    }

    fn from_axes(x: bool, y: bool, z: bool) -> Self {
        use Relaxation::*;
        match (x, y, z) {
            (false, false, false) => Point,
            (true, false, false) => LineX,
            (false, true, false) => LineY,
            (false, false, true) => LineZ,
            (false, true, true) => LineYZ,
            (true, false, true) => LineXZ,
            (true, true, false) => LineXY,
            (true, true, true) => LineXYZ,
        }
    }

    /// Drop line directions along axes with only two cells, where a line
    /// holds a single interior node and reduces to point relaxation.
    pub fn effective(self, cells: [usize; 3]) -> Self {
        let keep = |axis: Axis| self.uses_axis(axis) && cells[axis.index()] > 2;
        Self::from_axes(keep(Axis::X), keep(Axis::Y), keep(Axis::Z))
    }
}

/// Scratch storage reused across block solves.
#[derive(Debug, Clone)]
pub struct SmootherWorkspace {
    block: Vec<Edge>,
    /// Block edges sorted, with their position in `block`
    position: Vec<(Edge, usize)>,
    rhs: Vec<Complex64>,
    entries: Vec<(usize, usize, Complex64)>,
    band: BandedCholesky<Complex64>,
}

impl Default for SmootherWorkspace {
    fn default() -> Self {
        Self {
            block: Vec::new(),
            position: Vec::new(),
            rhs: Vec::new(),
            entries: Vec::new(),
            band: BandedCholesky::zeros(0, 0),
        }
    }
}

/// Run `sweeps` relaxation sweeps on `A x = rhs`.
pub fn smooth(
    op: &DiscreteOperator,
    x: &mut Field,
    rhs: &Field,
    sweeps: usize,
    relaxation: Relaxation,
    ws: &mut SmootherWorkspace,
) -> Result<()> {
    if sweeps == 0 {
        return Ok(());
    }
    let relaxation = relaxation.effective(op.cells());
    if relaxation == Relaxation::Point {
        for sweep in 0..sweeps {
            point_sweep(op, x, rhs, sweep % 2 == 0, ws)?;
        }
        return Ok(());
    }
    for axis in Axis::ALL {
        if relaxation.uses_axis(axis) {
            for sweep in 0..sweeps {
                line_sweep(op, x, rhs, axis, sweep % 2 == 0, ws)?;
            }
        }
    }
    Ok(())
}

/// One block Gauss-Seidel pass over the interior nodes, x fastest.
pub fn point_sweep(
    op: &DiscreteOperator,
    x: &mut Field,
    rhs: &Field,
    forward: bool,
    ws: &mut SmootherWorkspace,
) -> Result<()> {
    let [nx, ny, nz] = op.cells();
    let (mx, my, mz) = (nx - 1, ny - 1, nz - 1);
    let total = mx * my * mz;
    for n in 0..total {
        let n = if forward { n } else { total - 1 - n };
        let node = [1 + n % mx, 1 + (n / mx) % my, 1 + n / (mx * my)];
        ws.block.clear();
        for axis in Axis::ALL {
            let a = axis.index();
            let mut below = node;
            below[a] -= 1;
            ws.block.push(Edge::new(axis, below));
            ws.block.push(Edge::new(axis, node));
        }
        relax_block(op, x, rhs, ws)?;
    }
    Ok(())
}

/// One pass of line relaxation along `axis` over all interior lines.
pub fn line_sweep(
    op: &DiscreteOperator,
    x: &mut Field,
    rhs: &Field,
    axis: Axis,
    forward: bool,
    ws: &mut SmootherWorkspace,
) -> Result<()> {
    let cells = op.cells();
    let a = axis.index();
    let (b, c) = {
        let [p, q] = axis.others();
        if p.index() < q.index() { (p, q) } else { (q, p) }
    };
    let (mb, mc) = (cells[b.index()] - 1, cells[c.index()] - 1);
    let total = mb * mc;
    for n in 0..total {
        let n = if forward { n } else { total - 1 - n };
        let mut node = [0; 3];
        node[b.index()] = 1 + n % mb;
        node[c.index()] = 1 + n / mb;

        ws.block.clear();
        for t in 0..=cells[a] {
            node[a] = t;
            if t > 0 && t < cells[a] {
                for across in [b, c] {
                    let mut below = node;
                    below[across.index()] -= 1;
                    ws.block.push(Edge::new(across, below));
                    ws.block.push(Edge::new(across, node));
                }
            }
            if t < cells[a] {
                ws.block.push(Edge::new(axis, node));
            }
        }
        ws.block.retain(|e| op.is_free(*e));
        relax_block(op, x, rhs, ws)?;
    }
    Ok(())
}

/// Solve exactly for the edges in `ws.block`, holding the others fixed.
fn relax_block(
    op: &DiscreteOperator,
    x: &mut Field,
    rhs: &Field,
    ws: &mut SmootherWorkspace,
) -> Result<()> {
    let n = ws.block.len();
    if n == 0 {
        return Ok(());
    }

    ws.position.clear();
    ws.rhs.clear();
    for (p, &edge) in ws.block.iter().enumerate() {
        ws.position.push((edge, p));
        ws.rhs
            .push(rhs.component(edge.axis)[edge.index] - op.edge_action(x, edge));
    }
    ws.position.sort_unstable();

    ws.entries.clear();
    let mut bandwidth = 0;
    for (p, &a) in ws.block.iter().enumerate() {
        ws.entries.push((p, p, op.mass(a)));
        for (face, ca) in op.edge_faces(a) {
            let w = op.face_weight(face);
            for (b, cb) in op.face_edges(face) {
                if let Ok(found) = ws.position.binary_search_by_key(&b, |&(e, _)| e) {
                    let q = ws.position[found].1;
                    if q <= p {
                        ws.entries.push((p, q, Complex64::new(w * ca * cb, 0.0)));
                        bandwidth = bandwidth.max(p - q);
                    }
                }
            }
        }
    }

    ws.band.reset(n, bandwidth);
    for &(p, q, value) in &ws.entries {
        let current = ws.band.get(p, q);
        ws.band.set(p, q, current + value);
    }
    let singular = |err: CholeskyError| {
        SolverError::Numerical(format!(
            "local system of {} edges around {:?}: {}",
            n, ws.block[0], err
        ))
    };
    ws.band.factor().map_err(singular)?;
    ws.band.solve_in_place(&mut ws.rhs).map_err(singular)?;

    for (edge, delta) in ws.block.iter().zip(&ws.rhs) {
        x.component_mut(edge.axis)[edge.index] += *delta;
    }
    Ok(())
}
