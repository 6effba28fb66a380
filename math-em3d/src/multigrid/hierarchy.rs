//! Grid hierarchy for geometric multigrid
//!
//! Levels are built by halving the cell count along every axis that still
//! has an even number of cells above the minimum. Semicoarsening holds one
//! axis fixed at every level. Coarse coefficients are sums over the merged
//! fine cells, so each level carries its own rediscretized operator.

use super::coarse::{CoarseSolver, DEFAULT_COARSE_DIRECT_LIMIT};
use super::smoother::SmootherWorkspace;
use super::transfer::Transfer;
use crate::diagnostics::{Diagnostic, check_coarsest};
use crate::error::{Result, SolverError};
use crate::field::Field;
use crate::grid::{Axis, Grid};
use crate::model::CellCoefficients;
use crate::operator::{DiscreteOperator, OperatorWorkspace};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Which axes are halved between levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coarsening {
    /// Halve every axis that can be halved
    #[default]
    All,
    HoldX,
    HoldY,
    HoldZ,
}

impl Coarsening {
    /// Axis kept at full resolution, if any.
    pub fn held(self) -> Option<Axis> {
        match self {
            Coarsening::All => None,
            Coarsening::HoldX => Some(Axis::X),
            Coarsening::HoldY => Some(Axis::Y),
            Coarsening::HoldZ => Some(Axis::Z),
        }
    }

    /// Schedule cycling through the three semicoarsening directions.
    pub fn alternating() -> Vec<Coarsening> {
        vec![Coarsening::HoldX, Coarsening::HoldY, Coarsening::HoldZ]
    }
}

/// Limits on the depth of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HierarchyOptions {
    /// Smallest cell count an axis may be coarsened to
    pub min_cells: usize,
    /// Cap on the number of levels (finest included)
    pub max_levels: Option<usize>,
    /// Largest coarsest-level system factored directly
    pub coarse_direct_limit: usize,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            min_cells: 2,
            max_levels: None,
            coarse_direct_limit: DEFAULT_COARSE_DIRECT_LIMIT,
        }
    }
}

/// Number of halvings along each axis.
pub fn coarsening_steps(
    cells: [usize; 3],
    coarsening: Coarsening,
    min_cells: usize,
    max_levels: Option<usize>,
) -> [usize; 3] {
    let cap = max_levels.map_or(usize::MAX, |m| m.saturating_sub(1));
    Axis::ALL.map(|axis| {
        if coarsening.held() == Some(axis) {
            return 0;
        }
        let mut n = cells[axis.index()];
        let mut steps = 0;
        while n % 2 == 0 && n / 2 >= min_cells && steps < cap {
            n /= 2;
            steps += 1;
        }
        steps
    })
}

/// One level: grid, operator, transfer to the next coarser level and the
/// buffers the cycle works in.
#[derive(Debug, Clone)]
pub struct GridLevel {
    pub grid: Grid,
    pub operator: DiscreteOperator,
    /// Transfer to the next coarser level, `None` on the coarsest
    pub transfer: Option<Transfer>,
    pub(crate) x: Field,
    pub(crate) rhs: Field,
    pub(crate) residual: Field,
    pub(crate) op_ws: OperatorWorkspace,
    pub(crate) smoother_ws: SmootherWorkspace,
    /// Free-edge scratch for the coarsest direct solve
    pub(crate) free: Vec<Complex64>,
}

impl GridLevel {
    fn new(grid: Grid, operator: DiscreteOperator, transfer: Option<Transfer>) -> Self {
        let cells = grid.cells();
        Self {
            x: Field::zeros_with_cells(cells),
            rhs: Field::zeros_with_cells(cells),
            residual: Field::zeros_with_cells(cells),
            op_ws: operator.workspace(),
            smoother_ws: SmootherWorkspace::default(),
            free: Vec::new(),
            grid,
            operator,
            transfer,
        }
    }

    pub fn cells(&self) -> [usize; 3] {
        self.grid.cells()
    }
}

/// Levels for one coarsening setting, finest first.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    coarsening: Coarsening,
    levels: Vec<GridLevel>,
    coarse: CoarseSolver,
    diagnostics: Vec<Diagnostic>,
}

impl Hierarchy {
    /// Build all levels and factor the coarsest operator.
    pub fn build(
        grid: &Grid,
        coeffs: &CellCoefficients,
        coarsening: Coarsening,
        options: &HierarchyOptions,
    ) -> Result<Self> {
        if options.min_cells < 2 {
            return Err(SolverError::Configuration(format!(
                "min_cells must be at least 2, got {}",
                options.min_cells
            )));
        }
        if options.max_levels == Some(0) {
            return Err(SolverError::Configuration(
                "max_levels must be at least 1".into(),
            ));
        }
        let steps = coarsening_steps(
            grid.cells(),
            coarsening,
            options.min_cells,
            options.max_levels,
        );
        let n_levels = steps.iter().max().copied().unwrap_or(0) + 1;

        let mut levels = Vec::with_capacity(n_levels);
        let mut grid = grid.clone();
        let mut coeffs = coeffs.clone();
        for l in 0..n_levels {
            let operator = DiscreteOperator::new(&grid, &coeffs)?;
            log::debug!(
                "Level {}: {:?} cells, {} unknowns",
                l,
                grid.cells(),
                operator.n_free()
            );
            if l + 1 < n_levels {
                let flags = steps.map(|s| l < s);
                let coarse_grid = grid.coarsened(flags);
                let transfer = Transfer::new(&grid, &coarse_grid, flags)?;
                let coarse_coeffs = coeffs.coarsened(flags);
                levels.push(GridLevel::new(grid, operator, Some(transfer)));
                grid = coarse_grid;
                coeffs = coarse_coeffs;
            } else {
                levels.push(GridLevel::new(grid.clone(), operator, None));
            }
        }

        let mut diagnostics = Vec::new();
        let coarsest = &levels[levels.len() - 1];
        if let Some(d) = check_coarsest(coarsest.cells()) {
            d.log();
            diagnostics.push(d);
        }
        let (coarse, fallback) =
            CoarseSolver::build(&coarsest.operator, options.coarse_direct_limit)?;
        diagnostics.extend(fallback);

        Ok(Self {
            coarsening,
            levels,
            coarse,
            diagnostics,
        })
    }

    pub fn coarsening(&self) -> Coarsening {
        self.coarsening
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    /// Cell counts per level, finest first.
    pub fn level_cells(&self) -> Vec<[usize; 3]> {
        self.levels.iter().map(GridLevel::cells).collect()
    }

    pub fn finest(&self) -> &GridLevel {
        &self.levels[0]
    }

    pub fn coarse_solver(&self) -> &CoarseSolver {
        &self.coarse
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [GridLevel], &CoarseSolver) {
        (&mut self.levels, &self.coarse)
    }

    pub(crate) fn finest_mut(&mut self) -> &mut GridLevel {
        &mut self.levels[0]
    }
}
