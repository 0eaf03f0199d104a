//! Vertices and extreme directions of the upper and lower images
//!
//! Whichever image phase 2 approximated, the other one follows from its inequality
//! description by vertex enumeration. Values are stored in the orientation of the caller's
//! problem, so for maximisation the upper image and the last lower image coordinate are
//! negated.
use nalgebra::DVector;

use super::dd::Polyhedron;
use super::lp::WorkingLp;
use super::phase2::{direction_row, point_row};
use super::{ConeData, EngineError};
use crate::configuration::configuration;
use crate::native::records::{ImageRecord, SolRecord, VlpRecord};
use crate::native::NativeBuffer;
use crate::solution::VertexKind;

/// Vertices and extreme directions of one image
type Points = (Vec<DVector<f64>>, Vec<DVector<f64>>);

/// Store the images given the vertices and extreme directions of the upper image
pub(super) fn store_from_upper(
    sol: &mut SolRecord,
    vlp: &VlpRecord,
    cone: &ConeData,
    lp: &mut WorkingLp,
    vertices: Vec<DVector<f64>>,
    directions: Vec<DVector<f64>>,
) -> Result<(), EngineError> {
    let rows: Vec<DVector<f64>> = vertices
        .iter()
        .map(|y| point_row(cone, y))
        .chain(directions.iter().map(|r| direction_row(cone, r)))
        .collect();
    let lower = Polyhedron::from_homogeneous(sol.q, &rows, configuration().vertex_tolerance)?;
    let lower = (lower.vertices(), lower.directions());
    store(sol, vlp, cone, lp, (vertices, directions), lower)
}

/// Store the images given the vertices of the lower image
///
/// The lower image only recedes along -e_q.
pub(super) fn store_from_lower(
    sol: &mut SolRecord,
    vlp: &VlpRecord,
    cone: &ConeData,
    lp: &mut WorkingLp,
    vertices: Vec<DVector<f64>>,
) -> Result<(), EngineError> {
    let q = sol.q;
    let inequalities: Vec<(DVector<f64>, f64)> = vertices
        .iter()
        .map(|v| (cone.weight(&v.as_slice()[..q - 1]), v[q - 1]))
        .collect();
    let upper = Polyhedron::new(q, &inequalities, configuration().vertex_tolerance)?;
    let upper = (upper.vertices(), upper.directions());
    let down = DVector::from_fn(q, |i, _| if i + 1 == q { -1. } else { 0. });
    store(sol, vlp, cone, lp, upper, (vertices, vec![down]))
}

fn store(
    sol: &mut SolRecord,
    vlp: &VlpRecord,
    cone: &ConeData,
    lp: &mut WorkingLp,
    upper: Points,
    lower: Points,
) -> Result<(), EngineError> {
    let n = lp.num_vars();
    let mut preimages: Vec<f64> = Vec::with_capacity(n * upper.0.len());
    for y in &upper.0 {
        match lp.solve_p2(y, &cone.dual, &cone.c)? {
            Ok((_, x, _)) => preimages.extend(x),
            Err(outcome) => {
                return Err(EngineError::Numerical(format!(
                    "no preimage for an upper image vertex, LP ended as {outcome:?}"
                )))
            }
        }
    }

    let sign = vlp.optdir.sign();
    let q = sol.q;
    sol.pp = upper.0.len();
    sol.pp_dir = upper.1.len();
    sol.dd = lower.0.len();
    sol.dd_dir = lower.1.len();
    let mut upper_record = image_record(q, &upper, |_| sign)?;
    upper_record.preimage = Some(NativeBuffer::try_from_slice(&preimages)?);
    sol.upper = Some(upper_record);
    sol.lower = Some(image_record(q, &lower, |i| if i + 1 == q { sign } else { 1. })?);
    Ok(())
}

/// Pack points into an image record, coordinate `i` scaled by `scale(i)`
fn image_record(dim: usize, points: &Points, scale: impl Fn(usize) -> f64) -> Result<ImageRecord, EngineError> {
    let (vertices, directions) = points;
    let values = NativeBuffer::try_from_iter(
        vertices
            .iter()
            .chain(directions.iter())
            .flat_map(|p| p.iter().enumerate().map(|(i, v)| scale(i) * v))
            .collect::<Vec<f64>>(),
    )?;
    let types = NativeBuffer::try_from_iter(
        std::iter::repeat(VertexKind::Vertex)
            .take(vertices.len())
            .chain(std::iter::repeat(VertexKind::Direction).take(directions.len()))
            .collect::<Vec<VertexKind>>(),
    )?;
    Ok(ImageRecord {
        dim,
        values,
        types,
        preimage: None,
    })
}
