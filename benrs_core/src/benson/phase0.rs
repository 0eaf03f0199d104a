//! Phase 0: feasibility and an interior weight of the dual parameter set
use nalgebra::{DMatrix, DVector};

use super::lp::{LpOutcome, LpPhase, WorkingLp};
use super::{ConeData, EngineError};
use crate::native::records::{OptRecord, SolRecord};
use crate::native::NativeBuffer;
use crate::solution::SolutionStatus;

/// Run phase 0
///
/// Sets the status to infeasible when the feasible set is empty, to unbounded when no weight
/// gives a bounded scalarisation and to no vertex when the dual parameter set is not full
/// dimensional. Otherwise `eta` is the mean of the 2q points minimising and maximising each
/// coordinate over the dual parameter set.
pub(super) fn run(sol: &mut SolRecord, opt: &OptRecord, lp: &mut WorkingLp) -> Result<(), EngineError> {
    lp.set_phase(LpPhase::Phase0);
    let cone = ConeData::from_sol(sol)?;
    let q = sol.q;

    if let LpOutcome::Infeasible = lp.feasibility()? {
        if opt.message_level >= 1 {
            log::info!("phase 0: feasible set is empty");
        }
        sol.status = SolutionStatus::Infeasible;
        return Ok(());
    }

    let mut points: Vec<DVector<f64>> = Vec::with_capacity(2 * q);
    for i in 0..q {
        for sign in [1., -1.] {
            let functional = DVector::from_fn(q, |k, _| if k == i { sign } else { 0. });
            match lp.solve_dual_set(&functional, &cone.primal, &cone.c)? {
                Ok(w) => points.push(w),
                Err(LpOutcome::Infeasible) => {
                    if opt.message_level >= 1 {
                        log::info!("phase 0: no weighted sum scalarisation is bounded");
                    }
                    sol.status = SolutionStatus::Unbounded;
                    return Ok(());
                }
                Err(other) => {
                    return Err(EngineError::Numerical(format!(
                        "dual parameter set LP ended as {other:?}"
                    )))
                }
            }
        }
    }

    let eta = points
        .iter()
        .fold(DVector::zeros(q), |acc, w| acc + w)
        / points.len() as f64;
    let spread = DMatrix::from_fn(q, points.len() - 1, |i, j| points[j + 1][i] - points[0][i]);
    let rank = spread.rank(100. * opt.eps_phase0);
    if rank + 1 < q {
        if opt.message_level >= 1 {
            log::info!("phase 0: dual parameter set has dimension {rank}, the upper image has no vertex");
        }
        sol.status = SolutionStatus::NoVertex;
        return Ok(());
    }
    if opt.message_level >= 2 {
        log::debug!("phase 0: eta = {:?}", eta.as_slice());
    }
    sol.eta = Some(NativeBuffer::try_from_slice(eta.as_slice())?);
    Ok(())
}
