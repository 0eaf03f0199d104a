//! Core rust implementation of benrs, a bridge to a Benson type solver for vector linear
//! programs.
//!
//! Problems are described by a [`vlp::VlpProblem`], built into native records held by
//! [`vlp::ProblemHandle`], solved by the phases of the [`benson`] engine under the control of
//! [`solve::Orchestrator`], and copied back out as a [`solution::VlpSolution`].

pub mod benson;
pub mod configuration;
pub mod io;
pub mod native;
pub mod options;
pub mod solution;
pub mod solve;
pub mod vlp;

pub use options::SolverOptions;
pub use solution::{SolutionStatus, VlpSolution};
pub use solve::{solve, solve_file, SolveError};
pub use vlp::{VlpProblem, VlpProblemBuilder};
