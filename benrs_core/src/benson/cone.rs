//! Ordering cone, its dual and the duality parameter
use nalgebra::DVector;
use thiserror::Error;

use super::dd::Cone;
use crate::native::records::{ConeKind, VlpRecord};
use crate::vlp::column;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConeError {
    #[error("at least two objectives are required, got {0}")]
    TooFewObjectives(usize),
    #[error("ordering cone is not solid")]
    NotSolid,
    #[error("ordering cone contains a line")]
    NotPointed,
    #[error("cone generator buffer is inconsistent with its dimensions")]
    MalformedGenerators,
    #[error("duality parameter does not lie in the interior of the ordering cone")]
    DualityNotInterior,
    #[error("last entry of the duality parameter must be positive")]
    DualityLastEntry,
}

/// Ordering cone C = cone(primal) = {y : z^T y >= 0 for z in dual} and duality parameter c
#[derive(Debug, Clone)]
pub(crate) struct OrderingCone {
    pub primal: Vec<DVector<f64>>,
    pub dual: Vec<DVector<f64>>,
    /// Normalised to c_q = 1
    pub c: DVector<f64>,
}

/// Derive the ordering cone of a problem
///
/// Generators of both C and its dual are reduced to extreme rays. Without a duality parameter
/// the sum of the normalised generators of C is used.
pub(crate) fn ordering_cone(vlp: &VlpRecord, tolerance: f64) -> Result<OrderingCone, ConeError> {
    let q = vlp.q;
    if q < 2 {
        return Err(ConeError::TooFewObjectives(q));
    }
    let given = || -> Result<Vec<DVector<f64>>, ConeError> {
        let gen = vlp.gen.as_ref().ok_or(ConeError::MalformedGenerators)?;
        if gen.len() != q * vlp.n_gen {
            return Err(ConeError::MalformedGenerators);
        }
        Ok((0..vlp.n_gen).map(|j| column(gen, q, j)).collect())
    };
    let (primal, dual) = match vlp.cone_gen {
        ConeKind::Default => {
            let unit: Vec<DVector<f64>> = (0..q)
                .map(|i| DVector::from_fn(q, |k, _| if k == i { 1. } else { 0. }))
                .collect();
            (unit.clone(), unit)
        }
        ConeKind::Primal => {
            let dual = Cone::from_rows(q, &given()?, tolerance)
                .map_err(|_| ConeError::NotSolid)?
                .rays()
                .to_vec();
            let primal = Cone::from_rows(q, &dual, tolerance)
                .map_err(|_| ConeError::NotPointed)?
                .rays()
                .to_vec();
            (primal, dual)
        }
        ConeKind::Dual => {
            let primal = Cone::from_rows(q, &given()?, tolerance)
                .map_err(|_| ConeError::NotPointed)?
                .rays()
                .to_vec();
            let dual = Cone::from_rows(q, &primal, tolerance)
                .map_err(|_| ConeError::NotSolid)?
                .rays()
                .to_vec();
            (primal, dual)
        }
    };

    let c = match &vlp.c {
        Some(c) if c.len() == q => DVector::from_column_slice(c),
        Some(_) => return Err(ConeError::MalformedGenerators),
        None => primal
            .iter()
            .fold(DVector::zeros(q), |acc, y| acc + y / y.norm()),
    };
    if dual.iter().any(|z| z.dot(&c) <= tolerance * z.norm() * c.norm()) {
        return Err(ConeError::DualityNotInterior);
    }
    if c[q - 1] <= tolerance {
        return Err(ConeError::DualityLastEntry);
    }
    let c = &c / c[q - 1];
    Ok(OrderingCone { primal, dual, c })
}
