use std::path::PathBuf;

use benrs_core::options::SolverOptions;
use benrs_core::solve::{solve, solve_file, SolveError};
use benrs_core::vlp::bounds::BoundError;
use benrs_core::vlp::{BuildError, OptDirection, ProblemHandle, ValidationError, VlpProblem, VlpProblemBuilder};
use benrs_core::SolutionStatus;
use nalgebra::{dmatrix, dvector, DVector};

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(name)
}

fn ex01() -> VlpProblem {
    VlpProblemBuilder::default()
        .constraints(dmatrix![2., 1.; 1., 2.])
        .objectives(dmatrix![1., -1.; 1., 1.])
        .row_lower(vec![6., 6.])
        .col_lower(vec![0., 0.])
        .build()
        .unwrap()
}

fn contains(points: &[DVector<f64>], expected: &DVector<f64>, tol: f64) -> bool {
    points.iter().any(|p| (p - expected).amax() < tol)
}

#[test]
fn bi_objective_optimal() {
    let solution = solve(&ex01(), &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Optimal);
    assert_eq!((solution.m, solution.n, solution.q), (2, 2, 2));
    assert!(solution.num_vertices_upper > 0);
    assert!(solution.lp_count > 0);

    let eta = solution.eta.clone().unwrap();
    assert!((eta[0] - 0.25).abs() < 1e-4);
    assert!((eta[1] - 0.75).abs() < 1e-4);

    let upper = solution.primal.as_ref().unwrap();
    let vertices = upper.vertices();
    assert!(contains(&vertices, &dvector![-6., 6.], 1e-4));
    assert!(contains(&vertices, &dvector![0., 4.], 1e-4));
    // Every vertex is one of the two, (6, 6) is dominated
    assert!(vertices
        .iter()
        .all(|v| (v - dvector![-6., 6.]).amax() < 1e-4 || (v - dvector![0., 4.]).amax() < 1e-4));
    assert_eq!(upper.preimage.nrows(), upper.num_vertices());
    assert_eq!(upper.preimage.ncols(), 2);
    // Preimages map onto their vertices
    let p = dmatrix![1., -1.; 1., 1.];
    for (i, v) in vertices.iter().enumerate() {
        let x = upper.preimage.row(i).transpose();
        assert!((&p * x - v).amax() < 1e-4);
    }

    let lower = solution.dual.as_ref().unwrap();
    assert!(lower.num_vertices() > 0);
}

#[test]
fn single_constraint() {
    let builder = || {
        let mut builder = VlpProblemBuilder::default();
        builder
            .constraints(dmatrix![1., 1.])
            .objectives(dmatrix![1., 0.; 0., 1.])
            .row_upper(vec![1.]);
        builder
    };

    // Free variables leave every weighted sum unbounded
    let solution = solve(&builder().build().unwrap(), &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Unbounded);

    let problem = builder().col_lower(vec![0., 0.]).build().unwrap();
    let solution = solve(&problem, &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Optimal);
    assert!(solution.num_vertices_upper > 0);
    let vertices = solution.primal.as_ref().unwrap().vertices();
    assert!(contains(&vertices, &dvector![0., 0.], 1e-4));
}

#[test]
fn contradictory_bounds() {
    let problem = VlpProblemBuilder::default()
        .constraints(dmatrix![1., 1.])
        .objectives(dmatrix![1., 0.; 0., 1.])
        .row_lower(vec![2.])
        .row_upper(vec![1.])
        .build()
        .unwrap();
    match solve(&problem, &SolverOptions::default()) {
        Err(SolveError::Build(BuildError::Validation(ValidationError::Bounds(BoundError::Inverted { .. })))) => {}
        other => panic!("Inverted bounds not rejected: {other:?}"),
    }
}

#[test]
fn totally_unbounded() {
    let problem = VlpProblemBuilder::default()
        .constraints(dmatrix![1., 1., 1.; 1., 1., 2.])
        .objectives(dmatrix![1., 0., 0.; 0., 1., 0.])
        .row_lower(vec![1., 1.])
        .build()
        .unwrap();
    let solution = solve(&problem, &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Unbounded);
    assert!(solution.primal.is_none());
    assert!(solution.r_gen.is_none());
    assert_eq!(solution.num_vertices_upper, 0);
    assert_eq!(solution.num_vertices_lower, 0);
}

#[test]
fn infeasible() {
    let problem = VlpProblemBuilder::default()
        .constraints(dmatrix![3., 1.; 1., 2.; 1., 1.])
        .objectives(dmatrix![1., 0.; 0., 1.])
        .row_lower(vec![0., 0., 1.])
        .row_upper(vec![1., 1., 2.])
        .build()
        .unwrap();
    let solution = solve(&problem, &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Infeasible);
    assert!(solution.primal.is_none());
}

#[test]
fn no_vertex() {
    let problem = VlpProblemBuilder::default()
        .constraints(dmatrix![1., 1., 1.; 1., 1., -1.])
        .objectives(dmatrix![1., 0., 0.; 0., 1., 0.])
        .row_lower(vec![1., 1.])
        .build()
        .unwrap();
    let solution = solve(&problem, &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::NoVertex);
    assert!(solution.primal.is_none());
}

fn simplex_max() -> VlpProblem {
    VlpProblemBuilder::default()
        .constraints(dmatrix![1., 1.])
        .objectives(dmatrix![1., 0.; 0., 1.])
        .row_upper(vec![1.])
        .col_lower(vec![0., 0.])
        .direction(OptDirection::Maximize)
        .build()
        .unwrap()
}

#[test]
fn maximisation() {
    for bounded in [false, true] {
        let mut options = SolverOptions::default();
        options.bounded = bounded;
        let solution = solve(&simplex_max(), &options).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        let vertices = solution.primal.as_ref().unwrap().vertices();
        assert!(contains(&vertices, &dvector![1., 0.], 1e-4));
        assert!(contains(&vertices, &dvector![0., 1.], 1e-4));
        assert!(vertices.iter().all(|v| (v.sum() - 1.).abs() < 1e-4));
    }
}

#[test]
fn dual_variants() {
    let mut options = SolverOptions::default();
    options.alg_phase1 = benrs_core::options::AlgVariant::Dual;
    options.alg_phase2 = benrs_core::options::AlgVariant::Dual;
    let solution = solve(&ex01(), &options).unwrap();
    assert_eq!(solution.status, SolutionStatus::Optimal);
    let vertices = solution.primal.as_ref().unwrap().vertices();
    assert!(contains(&vertices, &dvector![-6., 6.], 1e-4));
    assert!(contains(&vertices, &dvector![0., 4.], 1e-4));
}

#[test]
fn solve_from_files() {
    let solution = solve_file(data_path("ex01.vlp"), &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Optimal);
    assert!(contains(
        &solution.primal.as_ref().unwrap().vertices(),
        &dvector![0., 4.],
        1e-4
    ));

    let solution = solve_file(data_path("ex04.vlp"), &SolverOptions::default()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Unbounded);

    let solution = solve_file(data_path("ex05.vlp"), &SolverOptions::default()).unwrap();
    assert_eq!(solution.q, 3);
    assert_eq!(solution.o, 4);
    assert_eq!(solution.status, SolutionStatus::Optimal);
    assert!(solution.num_vertices_upper > 0);
}

#[test]
fn file_round_trip() {
    let path = std::env::temp_dir().join(format!("benrs_round_trip_{}.vlp", std::process::id()));
    let handle = ProblemHandle::from_problem(&ex01()).unwrap();
    handle.to_file(&path).unwrap();
    let read = ProblemHandle::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(read.constraint_matrix(), handle.constraint_matrix());
    assert_eq!(read.objective_matrix(), handle.objective_matrix());
    assert_eq!(read.nz(), 4);
    assert_eq!(read.optdir(), OptDirection::Minimize);

    assert!(matches!(
        solve_file(data_path("missing.vlp"), &SolverOptions::default()),
        Err(SolveError::File(_))
    ));
}
