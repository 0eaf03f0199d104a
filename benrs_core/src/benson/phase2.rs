//! Phase 2: the upper and lower images
use nalgebra::DVector;

use super::dd::Polyhedron;
use super::images;
use super::lp::{LpOutcome, LpPhase, WorkingLp};
use super::{columns, flatten, is_known, ConeData, EngineError};
use crate::configuration::configuration;
use crate::native::records::{OptRecord, SolRecord, VlpRecord};
use crate::native::NativeBuffer;
use crate::solution::SolutionStatus;

/// Recession data of a problem assumed bounded: the dual parameter set is spanned by the dual
/// cone generators and the recession cone of the upper image is the ordering cone
pub(super) fn init(sol: &mut SolRecord) -> Result<(), EngineError> {
    let cone = ConeData::from_sol(sol)?;
    let weights: Vec<DVector<f64>> = cone.dual.iter().map(|z| z / cone.c.dot(z)).collect();
    let eta = weights
        .iter()
        .fold(DVector::zeros(sol.q), |acc, w| acc + w)
        / weights.len().max(1) as f64;
    sol.h = weights.len();
    sol.h_gen = Some(flatten(&weights)?);
    sol.r = cone.primal.len();
    sol.r_gen = Some(flatten(&cone.primal)?);
    sol.eta = Some(NativeBuffer::try_from_slice(eta.as_slice())?);
    Ok(())
}

/// Whether phase 2 has anything to do for the current status
fn proceed(sol: &SolRecord, opt: &OptRecord) -> bool {
    if sol.status == SolutionStatus::NoStatus {
        return true;
    }
    if opt.message_level >= 1 {
        log::info!("phase 2: nothing to compute, status is {}", sol.status);
    }
    false
}

/// Set a terminal status found by a scalarisation, returning whether one was found
fn terminal(sol: &mut SolRecord, outcome: &LpOutcome) -> bool {
    match outcome {
        LpOutcome::Optimal { .. } => false,
        LpOutcome::Unbounded => {
            sol.status = SolutionStatus::Unbounded;
            true
        }
        LpOutcome::Infeasible => {
            sol.status = SolutionStatus::Infeasible;
            true
        }
    }
}

/// Cut an outer approximation of the upper image until all its vertices lie on the image
pub(super) fn primal(sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord, lp: &mut WorkingLp) -> Result<(), EngineError> {
    if !proceed(sol, opt) {
        return Ok(());
    }
    lp.set_phase(LpPhase::Phase2);
    let cone = ConeData::from_sol(sol)?;
    let q = sol.q;
    let weights = columns(&sol.h_gen, q, sol.h, "H")?;
    let eta = columns(&sol.eta, q, 1, "eta")?.remove(0);
    let (tolerance, max_iterations) = {
        let config = configuration();
        (config.vertex_tolerance, config.max_benson_iterations)
    };
    let eps = opt.eps_benson_phase2;

    let mut inequalities = Vec::with_capacity(weights.len());
    for w in &weights {
        let outcome = lp.solve_weighted_near(w, &eta)?;
        if terminal(sol, &outcome) {
            return Ok(());
        }
        if let LpOutcome::Optimal { value, .. } = outcome {
            inequalities.push((w.clone(), value));
        }
    }
    let mut outer = Polyhedron::new(q, &inequalities, tolerance)?;

    let mut accepted: Vec<DVector<f64>> = Vec::new();
    let mut iteration = 0;
    loop {
        if iteration >= max_iterations {
            log::warn!("phase 2: stopped after {iteration} iterations");
            break;
        }
        iteration += 1;
        let mut cuts = 0;
        for y in outer.vertices() {
            if is_known(&accepted, &y, 1e3 * tolerance) {
                continue;
            }
            let (z, _, w) = match lp.solve_p2(&y, &cone.dual, &cone.c)? {
                Ok(solved) => solved,
                Err(other) => {
                    if terminal(sol, &other) {
                        return Ok(());
                    }
                    continue;
                }
            };
            if z <= eps * (1. + y.amax()) {
                accepted.push(y);
                continue;
            }
            // Supporting hyperplane of the image with normal w
            let value = match lp.solve_weighted_near(&w, &eta)? {
                LpOutcome::Optimal { value, .. } => value,
                other => {
                    if terminal(sol, &other) {
                        return Ok(());
                    }
                    continue;
                }
            };
            if w.dot(&y) < value - eps * (1. + value.abs()) && outer.add_inequality(&w, value)? {
                cuts += 1;
            } else {
                accepted.push(y);
            }
        }
        if opt.message_level >= 2 {
            log::debug!("phase 2 iteration {iteration}: {cuts} cuts");
        }
        if cuts == 0 {
            break;
        }
    }

    sol.status = SolutionStatus::Optimal;
    images::store_from_upper(sol, vlp, &cone, lp, outer.vertices(), outer.directions())
}

/// Homogeneous row of w(v')^T y - v_q >= 0 in (v', v_q, t)
pub(super) fn point_row(cone: &ConeData, y: &DVector<f64>) -> DVector<f64> {
    let q = y.len();
    let coefficients = cone.weight_coefficients(y);
    DVector::from_fn(q + 1, |i, _| match i {
        i if i + 1 < q => coefficients[i],
        i if i + 1 == q => -1.,
        _ => y[q - 1],
    })
}

/// Homogeneous row of w(v')^T r >= 0 in (v', v_q, t)
pub(super) fn direction_row(cone: &ConeData, r: &DVector<f64>) -> DVector<f64> {
    let q = r.len();
    let coefficients = cone.weight_coefficients(r);
    DVector::from_fn(q + 1, |i, _| match i {
        i if i + 1 < q => coefficients[i],
        i if i + 1 == q => 0.,
        _ => r[q - 1],
    })
}

/// Cut an outer approximation of the lower image until all its vertices lie on the image
pub(super) fn dual(sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord, lp: &mut WorkingLp) -> Result<(), EngineError> {
    if !proceed(sol, opt) {
        return Ok(());
    }
    lp.set_phase(LpPhase::Phase2);
    let cone = ConeData::from_sol(sol)?;
    let q = sol.q;
    let directions = columns(&sol.r_gen, q, sol.r, "R")?;
    let eta = columns(&sol.eta, q, 1, "eta")?.remove(0);
    let (tolerance, half_width, max_iterations) = {
        let config = configuration();
        (
            config.vertex_tolerance,
            config.direction_box,
            config.max_benson_iterations,
        )
    };
    let eps = opt.eps_benson_phase2;

    let mut rows: Vec<DVector<f64>> = directions.iter().map(|r| direction_row(&cone, r)).collect();
    match lp.solve_weighted_near(&eta, &eta)? {
        LpOutcome::Optimal { x, .. } => rows.push(point_row(&cone, &lp.image(&x))),
        other => {
            terminal(sol, &other);
            return Ok(());
        }
    }
    let mut outer = Polyhedron::from_homogeneous(q, &rows, tolerance)?;

    let mut accepted: Vec<DVector<f64>> = Vec::new();
    let mut iteration = 0;
    loop {
        if iteration >= max_iterations {
            log::warn!("phase 2: stopped after {iteration} iterations");
            break;
        }
        iteration += 1;
        let mut cuts = 0;
        for v in outer.vertices() {
            if is_known(&accepted, &v, 1e3 * tolerance) {
                continue;
            }
            let w = cone.weight(&v.as_slice()[..q - 1]);
            let row = match lp.solve_weighted_near(&w, &eta)? {
                LpOutcome::Optimal { x, value, .. } => {
                    if v[q - 1] <= value + eps * (1. + value.abs()) {
                        accepted.push(v);
                        continue;
                    }
                    point_row(&cone, &lp.image(&x))
                }
                LpOutcome::Unbounded => match lp.recession_min(&w, half_width)? {
                    Some((value, d)) if value < 0. => direction_row(&cone, &lp.image(&d)),
                    _ => {
                        return Err(EngineError::Numerical(
                            "unbounded scalarisation without a descent direction".to_string(),
                        ))
                    }
                },
                LpOutcome::Infeasible => {
                    sol.status = SolutionStatus::Infeasible;
                    return Ok(());
                }
            };
            if outer.add_homogeneous(row)? {
                cuts += 1;
            } else {
                accepted.push(v);
            }
        }
        if opt.message_level >= 2 {
            log::debug!("phase 2 iteration {iteration}: {cuts} cuts");
        }
        if cuts == 0 {
            break;
        }
    }

    sol.status = SolutionStatus::Optimal;
    images::store_from_lower(sol, vlp, &cone, lp, outer.vertices())
}
