//! Phase 1: recession cone of the upper image and vertices of the dual parameter set
use nalgebra::DVector;

use super::dd::{Cone, Polyhedron};
use super::lp::{LpPhase, WorkingLp};
use super::{flatten, is_known, ConeData, EngineError};
use crate::configuration::configuration;
use crate::native::records::{OptRecord, SolRecord};

struct Limits {
    tolerance: f64,
    half_width: f64,
    max_iterations: usize,
}

fn limits() -> Limits {
    let config = configuration();
    Limits {
        tolerance: config.vertex_tolerance,
        half_width: config.direction_box,
        max_iterations: config.max_benson_iterations,
    }
}

/// Homogeneous row of w(v)^T r >= 0 in (v, t)
fn direction_row(cone: &ConeData, r: &DVector<f64>) -> DVector<f64> {
    let q = r.len();
    let coefficients = cone.weight_coefficients(r);
    DVector::from_fn(q, |i, _| if i + 1 < q { coefficients[i] } else { r[q - 1] })
}

/// Direction of steepest descent of w^T P over the recession cone, if it is negative
fn descent(lp: &mut WorkingLp, w: &DVector<f64>, eps: f64, half_width: f64) -> Result<Option<DVector<f64>>, EngineError> {
    match lp.recession_min(w, half_width)? {
        Some((value, d)) if value < -eps => {
            let r = lp.image(&d);
            let norm = r.norm();
            Ok(Some(r / norm))
        }
        Some(_) => Ok(None),
        None => Err(EngineError::Numerical(
            "recession direction LP did not reach an optimum".to_string(),
        )),
    }
}

/// Inner approximation of the recession cone, grown by directions found on its facets
pub(super) fn primal(sol: &mut SolRecord, opt: &OptRecord, lp: &mut WorkingLp) -> Result<(), EngineError> {
    lp.set_phase(LpPhase::Phase1);
    let cone = ConeData::from_sol(sol)?;
    let limits = limits();
    let q = sol.q;

    let mut generators = cone.primal.clone();
    let mut normals;
    let mut iteration = 0;
    loop {
        normals = Cone::from_rows(q, &generators, limits.tolerance)?
            .rays()
            .iter()
            .map(|w| w / cone.c.dot(w))
            .collect::<Vec<DVector<f64>>>();
        if iteration >= limits.max_iterations {
            log::warn!("phase 1: stopped after {iteration} iterations");
            break;
        }
        iteration += 1;
        let mut found = Vec::new();
        for w in &normals {
            if let Some(r) = descent(lp, w, opt.eps_benson_phase1, limits.half_width)? {
                found.push(r);
            }
        }
        if opt.message_level >= 2 {
            log::debug!("phase 1 iteration {iteration}: {} new directions", found.len());
        }
        if found.is_empty() {
            break;
        }
        generators.extend(found);
    }
    store(sol, opt, &normals, limits.tolerance)
}

/// Outer approximation of the dual parameter set, cut by directions of the recession cone
pub(super) fn dual(sol: &mut SolRecord, opt: &OptRecord, lp: &mut WorkingLp) -> Result<(), EngineError> {
    lp.set_phase(LpPhase::Phase1);
    let cone = ConeData::from_sol(sol)?;
    let limits = limits();
    let q = sol.q;

    let rows: Vec<DVector<f64>> = cone.primal.iter().map(|y| direction_row(&cone, y)).collect();
    let mut outer = Polyhedron::from_homogeneous(q - 1, &rows, limits.tolerance)?;
    let mut accepted: Vec<DVector<f64>> = Vec::new();
    let mut iteration = 0;
    loop {
        if iteration >= limits.max_iterations {
            log::warn!("phase 1: stopped after {iteration} iterations");
            break;
        }
        iteration += 1;
        let mut cuts = 0;
        for v in outer.vertices() {
            if is_known(&accepted, &v, 1e3 * limits.tolerance) {
                continue;
            }
            let w = cone.weight(v.as_slice());
            match descent(lp, &w, opt.eps_benson_phase1, limits.half_width)? {
                Some(r) if outer.add_homogeneous(direction_row(&cone, &r))? => cuts += 1,
                _ => accepted.push(v),
            }
        }
        if opt.message_level >= 2 {
            log::debug!("phase 1 iteration {iteration}: {cuts} cuts");
        }
        if cuts == 0 {
            break;
        }
    }
    let weights: Vec<DVector<f64>> = outer
        .vertices()
        .iter()
        .map(|v| cone.weight(v.as_slice()))
        .collect();
    store(sol, opt, &weights, limits.tolerance)
}

/// Store the dual parameter set vertices and the extreme directions of the cone they define
fn store(sol: &mut SolRecord, opt: &OptRecord, weights: &[DVector<f64>], tolerance: f64) -> Result<(), EngineError> {
    let q = sol.q;
    let directions = Cone::from_rows(q, weights, tolerance)?.rays().to_vec();
    let directions: Vec<DVector<f64>> = directions.into_iter().map(|r| &r / r.norm()).collect();
    if opt.message_level >= 1 {
        log::info!(
            "phase 1: {} vertices of the dual parameter set, {} extreme directions",
            weights.len(),
            directions.len()
        );
    }
    sol.h = weights.len();
    sol.h_gen = Some(flatten(weights)?);
    sol.r = directions.len();
    sol.r_gen = Some(flatten(&directions)?);
    Ok(())
}
