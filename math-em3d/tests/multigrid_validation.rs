//! Validation of the multigrid solver against direct solves and the
//! structural properties of the discretization

use em3d::multigrid::{HierarchyOptions, SmootherWorkspace, Transfer, coarsening_steps, smooth};
use em3d::{
    Axis, CellCoefficients, Coarsening, ConvergenceStatus, CycleType, DiscreteOperator, Field,
    Grid, KrylovMethod, Model, Multigrid, Relaxation, SolverConfig, SolverError, SolverMode,
    solve,
};
use ndarray::Array3;
use num_complex::Complex64;
use solvers::cholesky_solve;

/// Deterministic, smooth-free test values on every edge
fn scrambled_field(cells: [usize; 3], seed: f64) -> Field {
    let mut field = Field::zeros_with_cells(cells);
    for axis in Axis::ALL {
        let a = axis.index() as f64;
        for ((i, j, k), v) in field.component_mut(axis).indexed_iter_mut() {
            let t = seed + 1.3 * i as f64 + 2.7 * j as f64 + 4.1 * k as f64 + 0.7 * a;
            *v = Complex64::new(t.sin(), (1.7 * t).cos());
        }
    }
    field
}

fn point_source(grid: &Grid) -> Field {
    let [nx, ny, nz] = grid.cells();
    let mut source = Field::zeros(grid);
    source.fx[[nx / 2, ny / 2, nz / 2]] = Complex64::new(0.0, 1.0);
    source
}

fn homogeneous(cells: [usize; 3], h: f64) -> (Grid, Model) {
    let grid = Grid::uniform(cells, [h; 3], [0.0; 3]).unwrap();
    let model = Model::homogeneous(&grid, 1.0, 10.0);
    (grid, model)
}

#[test]
fn test_hierarchy_for_powers_of_two() {
    assert_eq!(
        coarsening_steps([16, 16, 16], Coarsening::All, 2, None),
        [3, 3, 3]
    );
    let (grid, model) = homogeneous([16, 16, 16], 50.0);
    let coeffs = CellCoefficients::new(&grid, &model).unwrap();
    let mg = Multigrid::new(&grid, &coeffs, &SolverConfig::default()).unwrap();
    assert_eq!(
        mg.hierarchies()[0].level_cells(),
        vec![[16, 16, 16], [8, 8, 8], [4, 4, 4], [2, 2, 2]]
    );
    assert!(mg.diagnostics().is_empty());
}

#[test]
fn test_uneven_axes_coarsen_independently() {
    let (grid, model) = homogeneous([16, 8, 2], 50.0);
    let coeffs = CellCoefficients::new(&grid, &model).unwrap();
    let mg = Multigrid::new(&grid, &coeffs, &SolverConfig::default()).unwrap();
    let hierarchy = &mg.hierarchies()[0];
    assert_eq!(
        hierarchy.level_cells(),
        vec![[16, 8, 2], [8, 4, 2], [4, 2, 2], [2, 2, 2]]
    );
    // y is held once it reaches the minimum while x keeps coarsening
    let last = hierarchy.levels()[2].transfer.as_ref().unwrap();
    assert_eq!(last.coarsen_flags(), [true, false, false]);
}

#[test]
fn test_non_power_of_two_is_reported() {
    let (grid, model) = homogeneous([12, 8, 8], 50.0);
    let solution = solve(
        &grid,
        &model,
        &point_source(&grid),
        None,
        &SolverConfig::default(),
    )
    .unwrap();
    assert!(solution.converged());
    assert!(solution.diagnostics.iter().any(|d| matches!(
        d,
        em3d::Diagnostic::NonPowerOfTwo { axis: Axis::X, cells: 12 }
    )));
}

#[test]
fn test_restrict_then_prolong_reproduces_constants() {
    let fine = Grid::from_widths(
        &[10.0, 20.0, 30.0, 40.0, 15.0, 15.0, 25.0, 5.0],
        &[5.0, 10.0, 20.0, 40.0],
        &[100.0, 100.0],
        [0.0; 3],
    )
    .unwrap();
    for flags in [[true, true, false], [true, false, false], [false, true, false]] {
        let coarse = fine.coarsened(flags);
        let transfer = Transfer::new(&fine, &coarse, flags).unwrap();
        let c = Complex64::new(2.5, -1.0);
        let mut field = Field::zeros(&fine);
        for axis in Axis::ALL {
            field.component_mut(axis).fill(c);
        }
        let restricted = transfer.restrict_average(&field);
        for axis in Axis::ALL {
            assert!(restricted.component(axis).iter().all(|v| (v - c).norm() < 1e-12));
        }
        let back = transfer.prolong(&restricted);
        for axis in Axis::ALL {
            assert!(back.component(axis).iter().all(|v| (v - c).norm() < 1e-12));
        }
    }
}

#[test]
fn test_restriction_is_adjoint_of_prolongation() {
    let fine = Grid::from_widths(
        &[10.0, 20.0, 30.0, 40.0],
        &[5.0, 10.0, 20.0, 40.0],
        &[7.0, 9.0, 11.0, 13.0],
        [0.0; 3],
    )
    .unwrap();
    for flags in [[true, true, true], [false, true, true], [true, true, false]] {
        let coarse = fine.coarsened(flags);
        let transfer = Transfer::new(&fine, &coarse, flags).unwrap();
        let mut c = scrambled_field(coarse.cells(), 0.3);
        c.ensure_pec();
        let f = scrambled_field(fine.cells(), 1.9);
        let lhs = transfer.prolong(&c).bilinear(&f);
        let rhs = c.bilinear(&transfer.restrict(&f));
        assert!((lhs - rhs).norm() < 1e-10 * lhs.norm().max(1.0), "{:?}", flags);
    }
}

#[test]
fn test_operator_is_linear_and_symmetric() {
    let grid = Grid::from_widths(
        &[50.0, 60.0, 70.0, 80.0],
        &[40.0, 40.0, 90.0],
        &[30.0, 60.0, 30.0],
        [0.0; 3],
    )
    .unwrap();
    let mut sigma = Array3::from_elem((4, 3, 3), 0.5);
    sigma[[1, 1, 1]] = 20.0;
    let model = Model::isotropic(sigma, 5.0);
    let coeffs = CellCoefficients::new(&grid, &model).unwrap();
    let op = DiscreteOperator::new(&grid, &coeffs).unwrap();

    assert_eq!(op.apply(&Field::zeros(&grid)).norm(), 0.0);

    let mut u = scrambled_field(grid.cells(), 0.1);
    let mut v = scrambled_field(grid.cells(), 2.2);
    u.ensure_pec();
    v.ensure_pec();
    let uav = u.bilinear(&op.apply(&v));
    let vau = v.bilinear(&op.apply(&u));
    assert!((uav - vau).norm() < 1e-10 * uav.norm());
}

#[test]
fn test_line_relaxation_solves_one_dimensional_problem() {
    // With two cells across, an x-line holds every free edge of its
    // x-column, so a single sweep is exact for a source confined to it
    let (grid, model) = homogeneous([16, 2, 2], 100.0);
    let coeffs = CellCoefficients::new(&grid, &model).unwrap();
    let op = DiscreteOperator::new(&grid, &coeffs).unwrap();
    let mut rhs = Field::zeros(&grid);
    rhs.fx[[5, 1, 1]] = Complex64::new(1.0, 0.0);
    rhs.fx[[11, 1, 1]] = Complex64::new(0.0, -3.0);
    let mut x = Field::zeros(&grid);
    let mut ws = SmootherWorkspace::default();
    smooth(&op, &mut x, &rhs, 1, Relaxation::LineX, &mut ws).unwrap();
    assert!(op.residual(&x, &rhs).norm() < 1e-10 * rhs.norm());
}

#[test]
fn test_v_cycles_reduce_residual_tenfold() {
    let (grid, model) = homogeneous([16, 16, 16], 100.0);
    let coeffs = CellCoefficients::new(&grid, &model).unwrap();
    let config = SolverConfig {
        cycle: CycleType::VCycle,
        ..Default::default()
    };
    let mut mg = Multigrid::new(&grid, &coeffs, &config).unwrap();
    let rhs = point_source(&grid);
    let mut x = Field::zeros(&grid);
    let initial = mg.residual_norm(&x, &rhs);
    for _ in 0..10 {
        mg.iterate(&mut x, &rhs).unwrap();
    }
    assert!(mg.residual_norm(&x, &rhs) < 0.1 * initial);
}

#[test]
fn test_multigrid_matches_direct_solve() {
    let grid = Grid::uniform([8, 8, 8], [100.0; 3], [-400.0; 3]).unwrap();
    let mut sigma = Array3::from_elem((8, 8, 8), 1.0);
    sigma
        .slice_mut(ndarray::s![.., .., 0..4])
        .fill(0.1);
    let model = Model::isotropic(sigma, 2.0);
    let source = point_source(&grid);

    let coeffs = CellCoefficients::new(&grid, &model).unwrap();
    let op = DiscreteOperator::new(&grid, &coeffs).unwrap();
    let reference = cholesky_solve(&op.assemble_dense(), &source.to_free_vector()).unwrap();

    let config = SolverConfig {
        tolerance: 1e-9,
        max_iterations: 100,
        ..Default::default()
    };
    let solution = solve(&grid, &model, &source, None, &config).unwrap();
    assert!(solution.converged());
    let diff = &solution.field.to_free_vector() - &reference;
    let norm = |v: &ndarray::Array1<Complex64>| v.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    assert!(norm(&diff) < 1e-4 * norm(&reference));
}

#[test]
fn test_zero_conductivity_is_singular() {
    let (grid, _) = homogeneous([8, 8, 8], 100.0);
    let model = Model::homogeneous(&grid, 0.0, 10.0);
    let err = solve(
        &grid,
        &model,
        &point_source(&grid),
        None,
        &SolverConfig::default(),
    )
    .unwrap_err();
    assert!(err.is_singular_system(), "{}", err);
}

#[test]
fn test_all_modes_and_krylov_methods() {
    let (grid, model) = homogeneous([8, 8, 8], 100.0);
    let source = point_source(&grid);
    let methods = [
        KrylovMethod::BiCgstab,
        KrylovMethod::Cgs,
        KrylovMethod::Gmres { restart: 20 },
    ];
    for mode in [SolverMode::KrylovOnly, SolverMode::MgPreconditioned] {
        for krylov in methods {
            let config = SolverConfig {
                mode,
                krylov,
                max_iterations: 400,
                ..Default::default()
            };
            let solution = solve(&grid, &model, &source, None, &config).unwrap();
            assert!(solution.converged(), "{:?} {:?}", mode, krylov);
            assert_eq!(
                solution.state.history.len(),
                solution.state.iterations + 1,
                "{:?} {:?}",
                mode,
                krylov
            );
            assert!(
                solution.state.relative_residual() < 1e-5,
                "{:?} {:?}: {}",
                mode,
                krylov,
                solution.state.relative_residual()
            );
        }
    }
}

#[test]
fn test_preconditioning_needs_fewer_iterations() {
    let (grid, model) = homogeneous([16, 16, 16], 50.0);
    let source = point_source(&grid);
    let run = |mode| {
        let config = SolverConfig {
            mode,
            max_iterations: 500,
            ..Default::default()
        };
        solve(&grid, &model, &source, None, &config).unwrap()
    };
    let plain = run(SolverMode::KrylovOnly);
    let preconditioned = run(SolverMode::MgPreconditioned);
    assert!(preconditioned.converged());
    assert!(preconditioned.state.iterations < plain.state.iterations);
}

#[test]
fn test_invalid_inputs_are_configuration_errors() {
    assert!(Grid::uniform([1, 4, 4], [1.0; 3], [0.0; 3]).unwrap_err().is_configuration());
    assert!(
        Grid::new(vec![0.0, 1.0, 1.0], vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0])
            .unwrap_err()
            .is_configuration()
    );

    let (grid, _) = homogeneous([4, 4, 4], 10.0);
    let source = point_source(&grid);
    let zero_frequency = Model::homogeneous(&grid, 1.0, 0.0);
    let err = solve(&grid, &zero_frequency, &source, None, &SolverConfig::default()).unwrap_err();
    assert!(err.is_configuration());

    let wrong_shape = Model::isotropic(Array3::from_elem((4, 4, 3), 1.0), 1.0);
    let err = solve(&grid, &wrong_shape, &source, None, &SolverConfig::default()).unwrap_err();
    assert!(err.is_configuration());

    let negative = Model::homogeneous(&grid, -1.0, 1.0);
    let err = solve(&grid, &negative, &source, None, &SolverConfig::default()).unwrap_err();
    assert!(err.is_configuration());

    let config = SolverConfig {
        tolerance: -1.0,
        ..Default::default()
    };
    let err = solve(&grid, &Model::homogeneous(&grid, 1.0, 1.0), &source, None, &config)
        .unwrap_err();
    assert!(matches!(err, SolverError::Configuration(_)));
}

#[test]
fn test_non_finite_inputs_fail_in_every_mode() {
    let (grid, model) = homogeneous([8, 8, 8], 100.0);
    let source = point_source(&grid);
    let mut bad_source = source.clone();
    bad_source.fy[[4, 4, 4]] = Complex64::new(f64::NAN, 0.0);
    let mut bad_guess = Field::zeros(&grid);
    bad_guess.fz[[2, 5, 3]] = Complex64::new(0.0, f64::NEG_INFINITY);

    for mode in [SolverMode::MgOnly, SolverMode::KrylovOnly, SolverMode::MgPreconditioned] {
        let config = SolverConfig {
            mode,
            ..Default::default()
        };
        let err = solve(&grid, &model, &bad_source, None, &config).unwrap_err();
        assert!(err.is_numerical(), "{:?}: {}", mode, err);
        let err = solve(&grid, &model, &source, Some(&bad_guess), &config).unwrap_err();
        assert!(err.is_numerical(), "{:?}: {}", mode, err);
    }
}

#[test]
fn test_laplace_domain() {
    let (grid, _) = homogeneous([8, 8, 8], 100.0);
    let model = Model::homogeneous(&grid, 1.0, -20.0);
    let mut source = Field::zeros(&grid);
    source.fz[[4, 4, 4]] = Complex64::new(1.0, 0.0);
    let solution = solve(&grid, &model, &source, None, &SolverConfig::default()).unwrap();
    assert!(solution.converged());
    // Real shift and real source give a real field
    for axis in Axis::ALL {
        assert!(solution.field.component(axis).iter().all(|v| v.im.abs() < 1e-12));
    }
}

#[test]
fn test_anisotropic_model_with_permeability() {
    let grid = Grid::from_widths(
        &[120.0, 100.0, 90.0, 80.0, 80.0, 90.0, 100.0, 120.0],
        &[100.0; 8],
        &[60.0, 70.0, 80.0, 90.0, 90.0, 80.0, 70.0, 60.0],
        [-400.0, -400.0, -300.0],
    )
    .unwrap();
    let shape = (8, 8, 8);
    let model = Model::anisotropic(
        Array3::from_elem(shape, 1.0),
        Array3::from_elem(shape, 2.0),
        Array3::from_elem(shape, 0.5),
        10.0,
    )
    .with_mu_r(Array3::from_elem(shape, 1.5));
    let config = SolverConfig {
        mode: SolverMode::MgPreconditioned,
        relaxation: Relaxation::alternating(),
        semicoarsening: Coarsening::alternating(),
        tolerance: 1e-7,
        ..Default::default()
    };
    let source = point_source(&grid);
    let solution = solve(&grid, &model, &source, None, &config).unwrap();
    assert!(solution.converged());
    assert_eq!(solution.state.status, ConvergenceStatus::Converged);
    assert!(solution.state.relative_residual() < 1e-6);
}

#[test]
fn test_initial_guess_shortcuts_solve() {
    let (grid, model) = homogeneous([8, 8, 8], 100.0);
    let source = point_source(&grid);
    let first = solve(&grid, &model, &source, None, &SolverConfig::default()).unwrap();
    let second = solve(
        &grid,
        &model,
        &source,
        Some(&first.field),
        &SolverConfig::default(),
    )
    .unwrap();
    assert_eq!(second.state.iterations, 0);
    assert!(second.converged());
}

#[test]
fn test_hierarchy_options_limit_depth() {
    let options = HierarchyOptions {
        max_levels: Some(2),
        ..Default::default()
    };
    assert_eq!(
        coarsening_steps([32, 32, 32], Coarsening::HoldX, options.min_cells, options.max_levels),
        [0, 1, 1]
    );
}
