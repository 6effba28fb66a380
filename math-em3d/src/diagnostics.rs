//! Non-fatal warnings collected while building and running a solve

use crate::grid::Axis;
use serde::Serialize;
use std::fmt;

/// Largest coarsest-grid dimension per axis considered efficient.
pub const OPTIMAL_COARSE_AXIS: usize = 7;
/// Largest coarsest-grid cell count considered efficient.
pub const OPTIMAL_COARSE_CELLS: usize = 105;

/// A warning about the setup that does not stop the solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Diagnostic {
    /// Cell count along an axis is not a power of two, so coarsening stops
    /// early along it.
    NonPowerOfTwo { axis: Axis, cells: usize },
    /// The coarsest grid is larger than what multigrid handles efficiently.
    CoarseGridNotOptimal { cells: [usize; 3] },
    /// Coarsest grid too large for the direct solver; smoothing is used.
    CoarseSolveFallback { unknowns: usize, limit: usize },
}

impl Diagnostic {
    /// Emit the diagnostic through `log`.
    pub fn log(&self) {
        log::warn!("{}", self);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NonPowerOfTwo { axis, cells } => write!(
                f,
                "{} cells along {} is not a power of two; coarsening stops early",
                cells, axis
            ),
            Diagnostic::CoarseGridNotOptimal { cells } => write!(
                f,
                "coarsest grid {}x{}x{} is large for multigrid (at most {} per axis and {} cells in total recommended)",
                cells[0], cells[1], cells[2], OPTIMAL_COARSE_AXIS, OPTIMAL_COARSE_CELLS
            ),
            Diagnostic::CoarseSolveFallback { unknowns, limit } => write!(
                f,
                "coarsest grid has {} unknowns (direct limit {}); using smoothing instead",
                unknowns, limit
            ),
        }
    }
}

/// Warnings about the fine grid's cell counts.
pub fn check_cell_counts(cells: [usize; 3]) -> Vec<Diagnostic> {
    Axis::ALL
        .iter()
        .filter(|&&axis| !cells[axis.index()].is_power_of_two())
        .map(|&axis| Diagnostic::NonPowerOfTwo {
            axis,
            cells: cells[axis.index()],
        })
        .collect()
}

/// Warning when the coarsest grid is too large.
pub fn check_coarsest(cells: [usize; 3]) -> Option<Diagnostic> {
    let total: usize = cells.iter().product();
    if cells.iter().any(|&n| n > OPTIMAL_COARSE_AXIS) || total > OPTIMAL_COARSE_CELLS {
        Some(Diagnostic::CoarseGridNotOptimal { cells })
    } else {
        None
    }
}
