//! Solve a vector linear program
//!
//! A solve builds the native problem and options records, drives the engine through its
//! phases with [`Orchestrator`], and copies the solution record into a [`VlpSolution`].
//!
//! # Examples
//! ```no_run
//! use benrs_core::options::SolverOptions;
//! use benrs_core::solve::solve;
//! use benrs_core::vlp::VlpProblemBuilder;
//! use nalgebra::dmatrix;
//!
//! let problem = VlpProblemBuilder::default()
//!     .constraints(dmatrix![2., 1.; 1., 2.])
//!     .objectives(dmatrix![1., -1.; 1., 1.])
//!     .row_lower(vec![6., 6.])
//!     .col_lower(vec![0., 0.])
//!     .build()
//!     .unwrap();
//! let solution = solve(&problem, &SolverOptions::default()).unwrap();
//! println!("{}", solution.status);
//! ```
use std::path::Path;

use thiserror::Error;

use crate::benson::{Benson, EngineError};
use crate::io::vlp_file::VlpFileError;
use crate::options::{OptionsError, OptionsHandle, SolverOptions};
use crate::solution::{ExtractError, SolutionHandle, VlpSolution};
use crate::vlp::{BuildError, ProblemHandle, VlpProblem};

pub mod lock;
pub mod state;

pub use lock::{HostLock, NoHostLock};
pub use state::{Orchestrator, SolveState, SolveTrace};

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("failed to build problem: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error("solver failed: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    File(#[from] VlpFileError),
    #[error("failed to extract solution: {0}")]
    Extract(#[from] ExtractError),
    #[error("problem has not been built")]
    EmptyProblem,
    #[error("options have been released")]
    ReleasedOptions,
}

/// Solve a problem given as host data
pub fn solve(problem: &VlpProblem, options: &SolverOptions) -> Result<VlpSolution, SolveError> {
    let handle = ProblemHandle::from_problem(problem)?;
    solve_handle(&handle, options, &NoHostLock)
}

/// Solve a problem read from a file in the vlp format
pub fn solve_file<P: AsRef<Path>>(path: P, options: &SolverOptions) -> Result<VlpSolution, SolveError> {
    let handle = ProblemHandle::from_file(path)?;
    solve_handle(&handle, options, &NoHostLock)
}

/// Solve an already built problem, releasing `host` during the phases
pub fn solve_handle<H: HostLock>(
    problem: &ProblemHandle,
    options: &SolverOptions,
    host: &H,
) -> Result<VlpSolution, SolveError> {
    let options = OptionsHandle::new(options);
    let mut solution = SolutionHandle::new();
    let trace = Orchestrator::new(&Benson, host).run(problem, &options, &mut solution)?;
    log::debug!("solve passed through {:?}", trace.states);
    Ok(VlpSolution::extract(&solution, &trace)?)
}
