//! Multigrid cycles and the MG iteration driver
//!
//! Cycles are scheduled with an explicit stack of frames instead of
//! recursion. Each frame owns a level and a visit budget: a V-cycle visits
//! every coarser level once, a W-cycle twice, and an F-cycle gives the
//! first coarse visit a W budget and the second a V budget.

use super::hierarchy::{Coarsening, GridLevel, Hierarchy, HierarchyOptions};
use super::smoother::{Relaxation, smooth};
use crate::config::SolverConfig;
use crate::diagnostics::{Diagnostic, check_cell_counts};
use crate::error::{DivergenceKind, Result, SolverError};
use crate::field::Field;
use crate::grid::Grid;
use crate::model::CellCoefficients;
use crate::operator::DiscreteOperator;
use num_complex::Complex64;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Multigrid cycle type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleType {
    /// V-cycle: descend to coarsest, ascend
    VCycle,
    /// W-cycle: every coarse level is visited twice
    WCycle,
    /// F-cycle: W on the way down, V on the way back
    #[default]
    FCycle,
}

impl CycleType {
    /// Visits of the next coarser level per visit of a level.
    pub fn max_visits(self) -> usize {
        match self {
            CycleType::VCycle => 1,
            CycleType::WCycle | CycleType::FCycle => 2,
        }
    }
}

/// Smoothing counts and cycle shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleParams {
    pub cycle: CycleType,
    pub nu_pre: usize,
    pub nu_coarse: usize,
    pub nu_post: usize,
}

/// Outcome of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Converged,
    MaxIterations,
    Diverged,
    Stagnated,
}

/// Residual history of an iterative solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceState {
    /// Iterations performed (MG cycles or Krylov steps)
    pub iterations: usize,
    /// Relative tolerance
    pub tolerance: f64,
    /// Norm of the right-hand side
    pub reference_norm: f64,
    /// Residual norm of the initial guess
    pub initial_norm: f64,
    /// Residual norm after each iteration, starting with the initial one
    pub history: Vec<f64>,
    pub status: ConvergenceStatus,
}

impl ConvergenceState {
    pub(crate) fn new(tolerance: f64, reference_norm: f64) -> Self {
        Self {
            iterations: 0,
            tolerance,
            reference_norm,
            initial_norm: reference_norm,
            history: Vec::new(),
            status: ConvergenceStatus::MaxIterations,
        }
    }

    /// Last residual norm.
    pub fn final_norm(&self) -> f64 {
        self.history.last().copied().unwrap_or(self.initial_norm)
    }

    /// Last residual norm relative to the right-hand side.
    pub fn relative_residual(&self) -> f64 {
        if self.reference_norm > 0.0 {
            self.final_norm() / self.reference_norm
        } else {
            0.0
        }
    }

    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    /// Pre-smooth, restrict and descend (or finish once the budget is used)
    Descend,
    /// Back from the coarser level: prolongate and post-smooth
    Ascend,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    level: usize,
    budget: usize,
    repeats: usize,
    done: usize,
    stage: Stage,
}

/// Run one cycle on the finest level's `x` and `rhs` buffers.
pub(crate) fn run_cycle(
    hierarchy: &mut Hierarchy,
    params: &CycleParams,
    relaxation: Relaxation,
) -> Result<()> {
    let (levels, coarse) = hierarchy.parts_mut();
    let last = levels.len() - 1;
    let max_visits = params.cycle.max_visits();

    let mut stack = vec![Frame {
        level: 0,
        budget: max_visits,
        repeats: 1,
        done: 0,
        stage: Stage::Descend,
    }];

    while let Some(&frame) = stack.last() {
        let top = stack.len() - 1;
        let l = frame.level;

        if l == last {
            let level = &mut levels[l];
            coarse.solve(
                &level.operator,
                &mut level.x,
                &level.rhs,
                params.nu_coarse,
                relaxation,
                &mut level.smoother_ws,
                &mut level.free,
            )?;
            stack.pop();
            continue;
        }

        let (head, tail) = levels.split_at_mut(l + 1);
        let fine: &mut GridLevel = &mut head[l];
        let coarser: &mut GridLevel = &mut tail[0];
        let Some(transfer) = fine.transfer.as_ref() else {
            return Err(SolverError::Numerical(format!(
                "level {} has no transfer to a coarser grid",
                l
            )));
        };

        match frame.stage {
            Stage::Descend => {
                if frame.done == frame.repeats {
                    stack.pop();
                    continue;
                }
                smooth(
                    &fine.operator,
                    &mut fine.x,
                    &fine.rhs,
                    params.nu_pre,
                    relaxation,
                    &mut fine.smoother_ws,
                )?;
                fine.operator
                    .residual_into(&fine.x, &fine.rhs, &mut fine.residual, &mut fine.op_ws);
                transfer.restrict_into(&fine.residual, &mut coarser.rhs);
                coarser.x.fill(Complex64::new(0.0, 0.0));

                let child = match params.cycle {
                    CycleType::FCycle => frame.budget - frame.done,
                    _ => max_visits,
                };
                stack[top].stage = Stage::Ascend;
                stack.push(Frame {
                    level: l + 1,
                    budget: child,
                    repeats: child,
                    done: 0,
                    stage: Stage::Descend,
                });
            }
            Stage::Ascend => {
                transfer.prolong_add(&coarser.x, &mut fine.x, &mut fine.residual);
                smooth(
                    &fine.operator,
                    &mut fine.x,
                    &fine.rhs,
                    params.nu_post,
                    relaxation,
                    &mut fine.smoother_ws,
                )?;
                stack[top].done += 1;
                stack[top].stage = Stage::Descend;
            }
        }
    }
    Ok(())
}

/// Order in which levels are visited by one cycle, for inspection.
pub fn cycle_schedule(cycle: CycleType, n_levels: usize) -> Vec<usize> {
    let last = n_levels.saturating_sub(1);
    let max_visits = cycle.max_visits();
    let mut visits = Vec::new();
    let mut stack = vec![(0usize, max_visits, 1usize, 0usize)];
    visits.push(0);
    while let Some(&(level, budget, repeats, done)) = stack.last() {
        let top = stack.len() - 1;
        if level == last || done == repeats {
            stack.pop();
            if let Some(&(parent, ..)) = stack.last() {
                visits.push(parent);
            }
            continue;
        }
        let child = match cycle {
            CycleType::FCycle => budget - done,
            _ => max_visits,
        };
        stack[top].3 += 1;
        stack.push((level + 1, child, child, 0));
        visits.push(level + 1);
    }
    visits.dedup();
    visits
}

/// Geometric multigrid solver for one grid and model.
///
/// Holds one hierarchy per distinct coarsening in the schedule; relaxation
/// and coarsening schedules advance by one entry per MG iteration.
#[derive(Debug, Clone)]
pub struct Multigrid {
    hierarchies: Vec<Hierarchy>,
    coarsening_schedule: Vec<usize>,
    relaxation_schedule: Vec<Relaxation>,
    params: CycleParams,
    nu_init: usize,
    tolerance: f64,
    max_iterations: usize,
    divergence_factor: f64,
    diagnostics: Vec<Diagnostic>,
    step: usize,
}

impl Multigrid {
    /// Build the hierarchies for `grid` with the fine-level coefficients.
    pub fn new(grid: &Grid, coeffs: &CellCoefficients, config: &SolverConfig) -> Result<Self> {
        config.validate()?;
        let options = HierarchyOptions {
            min_cells: config.min_cells,
            max_levels: config.max_levels,
            coarse_direct_limit: config.coarse_direct_limit,
        };

        let mut diagnostics = check_cell_counts(grid.cells());
        for d in &diagnostics {
            d.log();
        }

        let mut settings: Vec<Coarsening> = Vec::new();
        let mut coarsening_schedule = Vec::with_capacity(config.semicoarsening.len());
        for &c in &config.semicoarsening {
            let index = match settings.iter().position(|&s| s == c) {
                Some(index) => index,
                None => {
                    settings.push(c);
                    settings.len() - 1
                }
            };
            coarsening_schedule.push(index);
        }

        // Hierarchies are independent of each other
        let build = |&coarsening: &Coarsening| Hierarchy::build(grid, coeffs, coarsening, &options);
        #[cfg(feature = "parallel")]
        let built: Vec<Result<Hierarchy>> = settings.par_iter().map(build).collect();
        #[cfg(not(feature = "parallel"))]
        let built: Vec<Result<Hierarchy>> = settings.iter().map(build).collect();

        let mut hierarchies = Vec::with_capacity(settings.len());
        for (coarsening, hierarchy) in settings.into_iter().zip(built) {
            let hierarchy = hierarchy?;
            log::info!(
                "Multigrid hierarchy ({:?}): {} levels, coarsest {:?}",
                coarsening,
                hierarchy.num_levels(),
                hierarchy.level_cells().last().copied().unwrap_or_default()
            );
            for d in hierarchy.diagnostics() {
                if !diagnostics.contains(d) {
                    diagnostics.push(d.clone());
                }
            }
            hierarchies.push(hierarchy);
        }

        Ok(Self {
            hierarchies,
            coarsening_schedule,
            relaxation_schedule: config.relaxation.clone(),
            params: CycleParams {
                cycle: config.cycle,
                nu_pre: config.nu_pre,
                nu_coarse: config.nu_coarse,
                nu_post: config.nu_post,
            },
            nu_init: config.nu_init,
            tolerance: config.tolerance,
            max_iterations: config.max_iterations,
            divergence_factor: config.divergence_factor,
            diagnostics,
            step: 0,
        })
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn hierarchies(&self) -> &[Hierarchy] {
        &self.hierarchies
    }

    /// Fine-level operator.
    pub fn operator(&self) -> &DiscreteOperator {
        &self.hierarchies[0].finest().operator
    }

    pub fn cells(&self) -> [usize; 3] {
        self.operator().cells()
    }

    /// MG iterations making up one preconditioner application, so that a
    /// full period of both schedules is used.
    pub fn schedule_period(&self) -> usize {
        self.relaxation_schedule
            .len()
            .max(self.coarsening_schedule.len())
            .max(1)
    }

    fn current(&self) -> (usize, Relaxation) {
        let h = self.coarsening_schedule[self.step % self.coarsening_schedule.len()];
        let r = self.relaxation_schedule[self.step % self.relaxation_schedule.len()];
        (h, r)
    }

    /// One MG iteration (a single cycle) on `A x = rhs`.
    pub fn iterate(&mut self, x: &mut Field, rhs: &Field) -> Result<()> {
        x.check_cells(self.cells(), "solution estimate")?;
        rhs.check_cells(self.cells(), "right-hand side")?;
        let (h, relaxation) = self.current();
        let params = self.params;
        let hierarchy = &mut self.hierarchies[h];
        {
            let finest = hierarchy.finest_mut();
            finest.x.assign(x);
            finest.rhs.assign(rhs);
        }
        run_cycle(hierarchy, &params, relaxation)?;
        x.assign(&hierarchy.finest().x);
        self.step += 1;
        Ok(())
    }

    /// Approximate `A^-1 rhs` by a schedule period of MG iterations from zero.
    pub fn precondition(&mut self, rhs: &Field) -> Result<Field> {
        rhs.check_cells(self.cells(), "right-hand side")?;
        let mut x = Field::zeros_with_cells(self.cells());
        for _ in 0..self.schedule_period() {
            self.iterate(&mut x, rhs)?;
        }
        if !x.is_finite() {
            return Err(SolverError::Numerical(
                "multigrid preconditioner produced non-finite values".into(),
            ));
        }
        Ok(x)
    }

    /// `||rhs - A x||` on the fine level.
    pub fn residual_norm(&mut self, x: &Field, rhs: &Field) -> f64 {
        let finest = self.hierarchies[0].finest_mut();
        finest
            .operator
            .residual_into(x, rhs, &mut finest.residual, &mut finest.op_ws);
        finest.residual.norm()
    }

    /// Smooth `x` on the finest level with the current relaxation.
    fn presmooth(&mut self, x: &mut Field, rhs: &Field) -> Result<()> {
        let (_, relaxation) = self.current();
        let finest = self.hierarchies[0].finest_mut();
        smooth(
            &finest.operator,
            x,
            rhs,
            self.nu_init,
            relaxation,
            &mut finest.smoother_ws,
        )
    }

    /// Iterate MG cycles until convergence, divergence, stagnation or the
    /// iteration limit.
    pub fn solve(
        &mut self,
        rhs: &Field,
        initial: Option<&Field>,
    ) -> Result<(Field, ConvergenceState)> {
        let cells = self.cells();
        rhs.check_cells(cells, "right-hand side")?;
        if let Some(guess) = initial {
            guess.check_cells(cells, "initial guess")?;
        }
        let mut rhs = rhs.clone();
        rhs.ensure_pec();
        let mut x = match initial {
            Some(guess) => guess.clone(),
            None => Field::zeros_with_cells(cells),
        };
        x.ensure_pec();

        let reference = rhs.norm();
        let mut state = ConvergenceState::new(self.tolerance, reference);
        if reference == 0.0 {
            log::info!("Source is zero; returning the zero field");
            state.initial_norm = 0.0;
            state.history.push(0.0);
            state.status = ConvergenceStatus::Converged;
            return Ok((Field::zeros_with_cells(cells), state));
        }
        let threshold = self.tolerance * reference;

        let initial_norm = self.residual_norm(&x, &rhs);
        if !initial_norm.is_finite() {
            return Err(SolverError::Numerical(
                "initial residual is not finite".into(),
            ));
        }
        state.initial_norm = initial_norm;
        state.history.push(initial_norm);
        if initial_norm < threshold {
            log::info!(
                "Initial guess already converged (relative residual {:.3e})",
                initial_norm / reference
            );
            state.status = ConvergenceStatus::Converged;
            return Ok((x, state));
        }

        let mut l2 = initial_norm;
        if self.nu_init > 0 {
            self.presmooth(&mut x, &rhs)?;
            l2 = self.residual_norm(&x, &rhs);
            log::info!(
                "Initial smoothing: relative residual {:.3e}",
                l2 / reference
            );
            if l2 < threshold {
                if let Some(last) = state.history.last_mut() {
                    *last = l2;
                }
                state.status = ConvergenceStatus::Converged;
                return Ok((x, state));
            }
        }

        let mut best = x.clone();
        let mut best_norm = l2;
        loop {
            let previous = l2;
            self.iterate(&mut x, &rhs)?;
            state.iterations += 1;
            l2 = self.residual_norm(&x, &rhs);
            if !l2.is_finite() || !x.is_finite() {
                return Err(SolverError::Numerical(format!(
                    "non-finite values after MG iteration {}",
                    state.iterations
                )));
            }
            state.history.push(l2);
            log::info!(
                "MG cycle {:3}: relative residual {:.3e} (reduction {:.3})",
                state.iterations,
                l2 / reference,
                l2 / previous
            );
            if l2 < best_norm {
                best.assign(&x);
                best_norm = l2;
            }

            if l2 < threshold {
                state.status = ConvergenceStatus::Converged;
                break;
            }
            let failure = if l2 > self.divergence_factor * initial_norm {
                Some((DivergenceKind::Diverged, ConvergenceStatus::Diverged))
            } else if state.iterations > 2 && l2 >= previous {
                Some((DivergenceKind::Stagnated, ConvergenceStatus::Stagnated))
            } else {
                None
            };
            if let Some((kind, status)) = failure {
                state.status = status;
                log::warn!(
                    "MG {} after {} iterations (relative residual {:.3e})",
                    kind,
                    state.iterations,
                    l2 / reference
                );
                return Err(SolverError::Divergence {
                    kind,
                    state: Box::new(state),
                    field: Box::new(best),
                });
            }
            if state.iterations >= self.max_iterations {
                state.status = ConvergenceStatus::MaxIterations;
                log::warn!(
                    "MG stopped at the iteration limit ({}), relative residual {:.3e}",
                    self.max_iterations,
                    l2 / reference
                );
                break;
            }
        }
        Ok((x, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    #[test]
    fn test_cycle_schedules() {
        assert_eq!(cycle_schedule(CycleType::VCycle, 3), vec![0, 1, 2, 1, 0]);
        assert_eq!(
            cycle_schedule(CycleType::WCycle, 3),
            vec![0, 1, 2, 1, 2, 1, 0]
        );
        assert_eq!(
            cycle_schedule(CycleType::FCycle, 4),
            vec![0, 1, 2, 3, 2, 3, 2, 1, 2, 3, 2, 1, 0]
        );
        assert_eq!(cycle_schedule(CycleType::WCycle, 1), vec![0]);
    }

    fn setup(config: &SolverConfig) -> (Multigrid, Field) {
        let grid = Grid::uniform([8, 8, 8], [100.0; 3], [0.0; 3]).unwrap();
        let coeffs = CellCoefficients::new(&grid, &Model::homogeneous(&grid, 1.0, 10.0)).unwrap();
        let mg = Multigrid::new(&grid, &coeffs, config).unwrap();
        let mut rhs = Field::zeros(&grid);
        rhs.fx[[4, 4, 4]] = Complex64::new(0.0, 1.0);
        rhs.fy[[3, 4, 5]] = Complex64::new(1.0, 0.0);
        (mg, rhs)
    }

    #[test]
    fn test_each_cycle_reduces_residual() {
        for cycle in [CycleType::VCycle, CycleType::WCycle, CycleType::FCycle] {
            let config = SolverConfig {
                cycle,
                ..Default::default()
            };
            let (mut mg, rhs) = setup(&config);
            let mut x = Field::zeros_with_cells(mg.cells());
            let before = mg.residual_norm(&x, &rhs);
            mg.iterate(&mut x, &rhs).unwrap();
            let after = mg.residual_norm(&x, &rhs);
            assert!(after < 0.5 * before, "{:?}: {} -> {}", cycle, before, after);
        }
    }

    #[test]
    fn test_solve_converges() {
        let config = SolverConfig {
            tolerance: 1e-8,
            ..Default::default()
        };
        let (mut mg, rhs) = setup(&config);
        let (x, state) = mg.solve(&rhs, None).unwrap();
        assert!(state.converged());
        assert!(state.relative_residual() < 1e-8);
        assert_eq!(state.history.len(), state.iterations + 1);
        assert!(mg.residual_norm(&x, &rhs) < 1e-8 * rhs.norm());
    }

    #[test]
    fn test_zero_source_and_exact_guess() {
        let (mut mg, rhs) = setup(&SolverConfig::default());
        let (x, state) = mg.solve(&Field::zeros_with_cells(mg.cells()), None).unwrap();
        assert_eq!(x.norm(), 0.0);
        assert_eq!(state.iterations, 0);
        assert!(state.converged());

        let (x, _) = mg.solve(&rhs, None).unwrap();
        let (_, state) = mg.solve(&rhs, Some(&x)).unwrap();
        assert_eq!(state.iterations, 0);
        assert!(state.converged());
    }

    #[test]
    fn test_iteration_limit_is_not_an_error() {
        let config = SolverConfig {
            tolerance: 1e-14,
            max_iterations: 2,
            ..Default::default()
        };
        let (mut mg, rhs) = setup(&config);
        let (_, state) = mg.solve(&rhs, None).unwrap();
        assert_eq!(state.status, ConvergenceStatus::MaxIterations);
        assert_eq!(state.iterations, 2);
    }

    #[test]
    fn test_stagnation_returns_best_field() {
        // An unreachable tolerance: once the residual hits rounding level it
        // stops decreasing
        let config = SolverConfig {
            tolerance: 1e-30,
            max_iterations: 80,
            ..Default::default()
        };
        let (mut mg, rhs) = setup(&config);
        match mg.solve(&rhs, None) {
            Err(SolverError::Divergence { kind, state, field }) => {
                assert_eq!(kind, DivergenceKind::Stagnated);
                assert_eq!(state.status, ConvergenceStatus::Stagnated);
                assert!(state.iterations > 2);
                assert!(state.relative_residual() < 1e-8);
                let best = mg.residual_norm(&field, &rhs);
                let min = state.history.iter().copied().fold(f64::INFINITY, f64::min);
                assert!(best <= min * (1.0 + 1e-6));
            }
            other => panic!("expected stagnation, got {:?}", other.map(|(_, s)| s)),
        }
    }

    #[test]
    fn test_fields_on_other_grids_are_rejected() {
        let (mut mg, rhs) = setup(&SolverConfig::default());
        let other = Field::zeros_with_cells([4, 8, 8]);

        let err = mg.solve(&other, None).unwrap_err();
        assert!(err.is_configuration(), "{}", err);
        let err = mg.solve(&rhs, Some(&other)).unwrap_err();
        assert!(err.is_configuration(), "{}", err);
        let mut x = other.clone();
        assert!(mg.iterate(&mut x, &rhs).unwrap_err().is_configuration());
        let mut x = Field::zeros_with_cells(mg.cells());
        assert!(mg.iterate(&mut x, &other).unwrap_err().is_configuration());
        assert!(mg.precondition(&other).unwrap_err().is_configuration());

        // Nothing was advanced by the rejected calls
        assert_eq!(mg.step, 0);
    }

    /// A single smoothing level on strongly stretched cells, where one
    /// Gauss-Seidel sweep raises the residual norm about tenfold.
    fn stretched(divergence_factor: f64, amplitude: f64) -> (Multigrid, Field) {
        let c = 3000.0;
        let grid = Grid::from_widths(&[1.0, c, 1.0, c], &[100.0; 4], &[100.0; 4], [0.0; 3]).unwrap();
        let coeffs = CellCoefficients::new(&grid, &Model::homogeneous(&grid, 1.0, 10.0)).unwrap();
        let config = SolverConfig {
            max_levels: Some(1),
            coarse_direct_limit: 0,
            divergence_factor,
            ..Default::default()
        };
        let mg = Multigrid::new(&grid, &coeffs, &config).unwrap();
        assert!(!mg.hierarchies()[0].coarse_solver().is_direct());
        let mut rhs = Field::zeros(&grid);
        rhs.fx[[2, 2, 2]] = Complex64::new(0.0, amplitude);
        (mg, rhs)
    }

    #[test]
    fn test_residual_growth_is_divergence() {
        let (mut mg, rhs) = stretched(2.0, 1.0);
        match mg.solve(&rhs, None) {
            Err(SolverError::Divergence { kind, state, field }) => {
                assert_eq!(kind, DivergenceKind::Diverged);
                assert_eq!(state.status, ConvergenceStatus::Diverged);
                assert_eq!(state.iterations, 1);
                assert_eq!(state.history.len(), 2);
                assert!(state.history[1] > 2.0 * state.initial_norm);
                // The best field is still the zero initial guess
                assert_eq!(field.norm(), 0.0);
            }
            other => panic!("expected divergence, got {:?}", other.map(|(_, s)| s)),
        }
    }

    #[test]
    fn test_overflow_during_iteration_is_numerical_error() {
        // The initial residual norm is finite; its growth overflows
        let (mut mg, rhs) = stretched(10.0, 1e154);
        assert!(rhs.norm().is_finite());
        match mg.solve(&rhs, None) {
            Err(SolverError::Numerical(msg)) => assert!(msg.contains("iteration 1"), "{}", msg),
            other => panic!("expected a numerical error, got {:?}", other.map(|(_, s)| s)),
        }
    }

    #[test]
    fn test_non_finite_input_is_numerical_error() {
        let (mut mg, rhs) = setup(&SolverConfig::default());
        let mut guess = Field::zeros_with_cells(mg.cells());
        guess.fy[[4, 4, 4]] = Complex64::new(f64::NAN, 0.0);
        let err = mg.solve(&rhs, Some(&guess)).unwrap_err();
        assert!(err.is_numerical(), "{}", err);

        let mut bad = rhs.clone();
        bad.fz[[3, 3, 3]] = Complex64::new(0.0, f64::INFINITY);
        let err = mg.solve(&bad, None).unwrap_err();
        assert!(err.is_numerical(), "{}", err);

        // Non-finite values on PEC edges are discarded
        let mut boundary = rhs.clone();
        boundary.fx[[0, 0, 0]] = Complex64::new(f64::NAN, 0.0);
        let (_, state) = mg.solve(&boundary, None).unwrap();
        assert!(state.converged());
    }

    #[test]
    fn test_precondition_runs_schedule_period() {
        let config = SolverConfig {
            relaxation: Relaxation::alternating(),
            semicoarsening: vec![Coarsening::All, Coarsening::HoldZ],
            ..Default::default()
        };
        let (mut mg, rhs) = setup(&config);
        assert_eq!(mg.schedule_period(), 3);
        assert_eq!(mg.hierarchies().len(), 2);
        let z = mg.precondition(&rhs).unwrap();
        assert!(mg.residual_norm(&z, &rhs) < rhs.norm());
    }
}
