//! State machine driving the engine through its phases
use std::time::{Duration, Instant};

use super::lock::{solve_lease, HostLock};
use super::SolveError;
use crate::benson::{EngineError, VlpAlgorithm, WORKING_LP};
use crate::native::records::{OptRecord, SolRecord, VlpRecord};
use crate::native::LpLease;
use crate::options::{AlgVariant, OptionsHandle};
use crate::solution::{SolutionHandle, SolutionStatus};
use crate::vlp::ProblemHandle;

/// States of a solve
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SolveState {
    Init,
    /// Recession data assumed from the ordering cone
    BoundedInit,
    Phase0,
    /// Phase 0 decided the problem
    EarlyExit,
    Phase1,
    Phase2,
    Done,
}

/// Record of a finished solve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveTrace {
    /// States in the order they were entered
    pub states: Vec<SolveState>,
    /// LPs solved by the engine
    pub lp_count: usize,
    pub elapsed: Duration,
}

type PhaseFn<E> = fn(&E, &mut SolRecord, &VlpRecord, &OptRecord) -> Result<(), EngineError>;

/// Drives an engine through the phases of a solve
pub struct Orchestrator<'a, E: VlpAlgorithm, H: HostLock> {
    engine: &'a E,
    host: &'a H,
}

impl<'a, E: VlpAlgorithm, H: HostLock> Orchestrator<'a, E, H> {
    pub fn new(engine: &'a E, host: &'a H) -> Self {
        Orchestrator { engine, host }
    }

    /// Run a phase with the host lock released
    fn phase(&self, f: PhaseFn<E>, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        let engine = self.engine;
        self.host.release(move || f(engine, sol, vlp, opt))
    }

    /// Solve the problem in `problem`, writing into `solution`
    ///
    /// Solver statuses end up in the solution record. An error is returned only when the
    /// engine itself fails, in which case the LP working structure has still been freed.
    pub fn run(
        &self,
        problem: &ProblemHandle,
        options: &OptionsHandle,
        solution: &mut SolutionHandle,
    ) -> Result<SolveTrace, SolveError> {
        let vlp = problem.record().ok_or(SolveError::EmptyProblem)?;
        let opt = options.record().ok_or(SolveError::ReleasedOptions)?;
        let _lease = solve_lease(self.host);
        let started = Instant::now();
        let mut trace = SolveTrace::default();
        let sol = solution.reset();

        if let Err(err) = self.engine.sol_init(sol, vlp, opt) {
            log::warn!("problem rejected by the solver: {err}");
            sol.status = SolutionStatus::InputError;
            trace.states = vec![SolveState::Init, SolveState::Done];
            trace.elapsed = started.elapsed();
            return Ok(trace);
        }

        let lp = LpLease::acquire(self.engine, WORKING_LP, vlp, opt)?;
        let mut state = SolveState::Init;
        loop {
            trace.states.push(state);
            state = match state {
                SolveState::Init if opt.bounded => SolveState::BoundedInit,
                SolveState::Init => SolveState::Phase0,
                SolveState::BoundedInit => {
                    self.engine.phase2_init(sol, vlp, opt)?;
                    SolveState::Phase2
                }
                SolveState::Phase0 => {
                    self.phase(E::phase0, sol, vlp, opt)?;
                    match sol.status {
                        SolutionStatus::Unbounded | SolutionStatus::NoVertex => SolveState::EarlyExit,
                        SolutionStatus::Infeasible => {
                            log::info!("problem is infeasible, continuing with phase 1");
                            SolveState::Phase1
                        }
                        _ => SolveState::Phase1,
                    }
                }
                SolveState::EarlyExit => SolveState::Done,
                SolveState::Phase1 => {
                    let f: PhaseFn<E> = match opt.alg_phase1 {
                        AlgVariant::Primal => E::phase1_primal,
                        AlgVariant::Dual => E::phase1_dual,
                    };
                    self.phase(f, sol, vlp, opt)?;
                    SolveState::Phase2
                }
                SolveState::Phase2 => {
                    let f: PhaseFn<E> = match opt.alg_phase2 {
                        AlgVariant::Primal => E::phase2_primal,
                        AlgVariant::Dual => E::phase2_dual,
                    };
                    self.phase(f, sol, vlp, opt)?;
                    SolveState::Done
                }
                SolveState::Done => break,
            };
        }
        trace.lp_count = self.engine.lp_get_num(lp.idx());
        drop(lp);
        trace.elapsed = started.elapsed();
        if opt.message_level >= 1 {
            log::info!(
                "solve finished with status {} after {} LPs in {:?}",
                sol.status,
                trace.lp_count,
                trace.elapsed
            );
        }
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benson::cone::ConeError;
    use crate::benson::LpIdx;
    use crate::options::SolverOptions;
    use crate::solve::lock::NoHostLock;
    use crate::vlp::VlpProblemBuilder;
    use nalgebra::dmatrix;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Engine replaying a fixed script
    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<&'static str>>,
        phase0_status: SolutionStatus,
        fail: Option<&'static str>,
        reject: bool,
    }

    impl Scripted {
        fn call(&self, name: &'static str) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(name);
            if self.fail == Some(name) {
                return Err(EngineError::Numerical(name.to_string()));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| **c == name).count()
        }
    }

    impl VlpAlgorithm for Scripted {
        fn sol_init(&self, _: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            if self.reject {
                return Err(EngineError::Cone(ConeError::NotSolid));
            }
            self.call("sol_init")
        }

        fn lp_init(&self, _: LpIdx, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("lp_init")
        }

        fn lp_free(&self, _: LpIdx) {
            self.calls.lock().unwrap().push("lp_free");
        }

        fn lp_get_num(&self, _: LpIdx) -> usize {
            7
        }

        fn phase0(&self, sol: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("phase0")?;
            sol.status = self.phase0_status;
            Ok(())
        }

        fn phase1_primal(&self, _: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("phase1_primal")
        }

        fn phase1_dual(&self, _: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("phase1_dual")
        }

        fn phase2_init(&self, _: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("phase2_init")
        }

        fn phase2_primal(&self, sol: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("phase2_primal")?;
            if sol.status == SolutionStatus::NoStatus {
                sol.status = SolutionStatus::Optimal;
            }
            Ok(())
        }

        fn phase2_dual(&self, sol: &mut SolRecord, _: &VlpRecord, _: &OptRecord) -> Result<(), EngineError> {
            self.call("phase2_dual")?;
            if sol.status == SolutionStatus::NoStatus {
                sol.status = SolutionStatus::Optimal;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingHost {
        releases: AtomicUsize,
    }

    impl HostLock for CountingHost {
        fn release<T, F>(&self, f: F) -> T
        where
            F: FnOnce() -> T + Send,
            T: Send,
        {
            self.releases.fetch_add(1, Ordering::SeqCst);
            f()
        }
    }

    fn problem() -> ProblemHandle {
        let problem = VlpProblemBuilder::default()
            .constraints(dmatrix![2., 1.; 1., 2.])
            .objectives(dmatrix![1., -1.; 1., 1.])
            .row_lower(vec![6., 6.])
            .build()
            .unwrap();
        ProblemHandle::from_problem(&problem).unwrap()
    }

    fn run(engine: &Scripted, options: SolverOptions) -> (Result<SolveTrace, SolveError>, SolutionStatus) {
        let mut solution = SolutionHandle::new();
        let result = Orchestrator::new(engine, &NoHostLock).run(
            &problem(),
            &OptionsHandle::new(&options),
            &mut solution,
        );
        let status = solution.record().map(|s| s.status).unwrap_or_default();
        (result, status)
    }

    #[test]
    fn full_path() {
        let engine = Scripted::default();
        let (result, status) = run(&engine, SolverOptions::default());
        let trace = result.unwrap();
        assert_eq!(
            trace.states,
            vec![
                SolveState::Init,
                SolveState::Phase0,
                SolveState::Phase1,
                SolveState::Phase2,
                SolveState::Done
            ]
        );
        assert_eq!(trace.lp_count, 7);
        assert_eq!(status, SolutionStatus::Optimal);
        assert_eq!(
            engine.calls(),
            vec!["sol_init", "lp_init", "phase0", "phase1_primal", "phase2_primal", "lp_free"]
        );
    }

    #[test]
    fn bounded_path() {
        let engine = Scripted::default();
        let mut options = SolverOptions::default();
        options.bounded = true;
        options.alg_phase2 = AlgVariant::Dual;
        let (result, _) = run(&engine, options);
        assert_eq!(
            result.unwrap().states,
            vec![
                SolveState::Init,
                SolveState::BoundedInit,
                SolveState::Phase2,
                SolveState::Done
            ]
        );
        assert_eq!(engine.count("phase0"), 0);
        assert_eq!(engine.count("phase2_init"), 1);
        assert_eq!(engine.count("phase2_dual"), 1);
        assert_eq!(engine.count("lp_free"), 1);
    }

    #[test]
    fn early_exit() {
        for phase0_status in [SolutionStatus::Unbounded, SolutionStatus::NoVertex] {
            let engine = Scripted {
                phase0_status,
                ..Default::default()
            };
            let (result, status) = run(&engine, SolverOptions::default());
            assert_eq!(
                result.unwrap().states,
                vec![
                    SolveState::Init,
                    SolveState::Phase0,
                    SolveState::EarlyExit,
                    SolveState::Done
                ]
            );
            assert_eq!(status, phase0_status);
            assert_eq!(engine.count("phase1_primal"), 0);
            assert_eq!(engine.count("phase2_primal"), 0);
            assert_eq!(engine.count("lp_free"), 1);
        }
    }

    #[test]
    fn infeasible_continues() {
        let engine = Scripted {
            phase0_status: SolutionStatus::Infeasible,
            ..Default::default()
        };
        let mut options = SolverOptions::default();
        options.alg_phase1 = AlgVariant::Dual;
        let (result, status) = run(&engine, options);
        assert_eq!(result.unwrap().states.len(), 5);
        assert_eq!(engine.count("phase1_dual"), 1);
        assert_eq!(engine.count("phase2_primal"), 1);
        assert_eq!(status, SolutionStatus::Infeasible);
    }

    #[test]
    fn engine_failure_frees_lp_once() {
        let engine = Scripted {
            fail: Some("phase1_primal"),
            ..Default::default()
        };
        let (result, _) = run(&engine, SolverOptions::default());
        match result {
            Err(SolveError::Engine(EngineError::Numerical(phase))) => assert_eq!(phase, "phase1_primal"),
            _ => panic!("Engine failure not propagated"),
        }
        assert_eq!(engine.count("lp_init"), 1);
        assert_eq!(engine.count("lp_free"), 1);
        assert_eq!(engine.count("phase2_primal"), 0);
    }

    #[test]
    fn failed_lp_init_is_freed() {
        let engine = Scripted {
            fail: Some("lp_init"),
            ..Default::default()
        };
        let (result, _) = run(&engine, SolverOptions::default());
        assert!(result.is_err());
        assert_eq!(engine.count("lp_free"), 1);
        assert_eq!(engine.count("phase0"), 0);
    }

    #[test]
    fn rejected_cone() {
        let engine = Scripted {
            reject: true,
            ..Default::default()
        };
        let (result, status) = run(&engine, SolverOptions::default());
        assert_eq!(result.unwrap().states, vec![SolveState::Init, SolveState::Done]);
        assert_eq!(status, SolutionStatus::InputError);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn host_lock_released_per_phase() {
        let engine = Scripted::default();
        let host = CountingHost::default();
        let mut solution = SolutionHandle::new();
        Orchestrator::new(&engine, &host)
            .run(
                &problem(),
                &OptionsHandle::new(&SolverOptions::default()),
                &mut solution,
            )
            .unwrap();
        // One release per phase, plus any made while waiting for the lease
        assert!(host.releases.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn empty_problem() {
        let engine = Scripted::default();
        let mut solution = SolutionHandle::new();
        let result = Orchestrator::new(&engine, &NoHostLock).run(
            &ProblemHandle::new(),
            &OptionsHandle::new(&SolverOptions::default()),
            &mut solution,
        );
        assert!(matches!(result, Err(SolveError::EmptyProblem)));
        assert!(engine.calls().is_empty());
    }
}
