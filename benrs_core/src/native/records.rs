//! Records exchanged with the Benson engine
//!
//! Every member that owns storage is an `Option`, `None` standing for a member that has not
//! been allocated yet or has already been released.
use crate::native::buffer::NativeBuffer;
use crate::native::NativeRecord;
use crate::options::{AlgVariant, LpMethod};
use crate::solution::{SolutionStatus, VertexKind};
use crate::vlp::bounds::BoundEntry;
use crate::vlp::OptDirection;

/// Entry of the extended coefficient matrix, 1-based
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Which description of the ordering cone the generator buffer holds
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConeKind {
    /// Non-negative orthant, no generators stored
    #[default]
    Default,
    /// Generators of the ordering cone
    Primal,
    /// Generators of the dual of the ordering cone
    Dual,
}

// region Problem record

/// Problem record
///
/// Rows `1..=m` of `a_ext` hold the constraint matrix, rows `m+1..=m+q` the objective matrix.
#[derive(Debug, Default)]
pub struct VlpRecord {
    pub a_ext: Option<NativeBuffer<Triplet>>,
    pub rows: Option<NativeBuffer<BoundEntry>>,
    pub cols: Option<NativeBuffer<BoundEntry>>,
    /// Cone generators, column major q x n_gen
    pub gen: Option<NativeBuffer<f64>>,
    /// Duality parameter, length q
    pub c: Option<NativeBuffer<f64>>,
    pub cone_gen: ConeKind,
    pub optdir: OptDirection,
    pub m: usize,
    pub n: usize,
    pub q: usize,
    pub nz: usize,
    pub nzobj: usize,
    pub n_gen: usize,
    /// Set once every mandatory member has been stored
    pub(crate) populated: bool,
}

impl NativeRecord for VlpRecord {
    fn free_members(&mut self) {
        self.populated = false;
        self.a_ext = None;
        self.rows = None;
        self.cols = None;
        self.gen = None;
        self.c = None;
        self.cone_gen = ConeKind::Default;
        self.n_gen = 0;
        self.m = 0;
        self.n = 0;
        self.q = 0;
        self.nz = 0;
        self.nzobj = 0;
    }
}

// endregion

// region Options record

#[derive(Debug, Clone, PartialEq)]
pub struct OptRecord {
    pub bounded: bool,
    pub message_level: u8,
    pub lp_message_level: u8,
    pub alg_phase1: AlgVariant,
    pub alg_phase2: AlgVariant,
    pub lp_method_phase0: LpMethod,
    pub lp_method_phase1: LpMethod,
    pub lp_method_phase2: LpMethod,
    pub eps_phase0: f64,
    pub eps_phase1: f64,
    pub eps_benson_phase1: f64,
    pub eps_benson_phase2: f64,
}

impl Default for OptRecord {
    fn default() -> Self {
        OptRecord::from(&crate::options::SolverOptions::default())
    }
}

impl NativeRecord for OptRecord {
    // Scalars only
    fn free_members(&mut self) {}
}

// endregion

// region Solution record

/// Vertices and extreme directions of one image
#[derive(Debug)]
pub struct ImageRecord {
    /// Dimension of the points
    pub dim: usize,
    /// Points, column major dim x len, vertices first
    pub values: NativeBuffer<f64>,
    pub types: NativeBuffer<VertexKind>,
    /// Decision vectors attaining each vertex, column major n x vertices
    pub preimage: Option<NativeBuffer<f64>>,
}

impl ImageRecord {
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SolRecord {
    pub status: SolutionStatus,
    pub m: usize,
    pub n: usize,
    pub q: usize,
    /// Number of ordering cone generators
    pub o: usize,
    /// Number of dual cone generators
    pub p: usize,
    /// Number of extreme directions of the upper image
    pub r: usize,
    /// Number of vertices of the dual parameter set
    pub h: usize,
    pub eta: Option<NativeBuffer<f64>>,
    /// Ordering cone generators, column major q x o
    pub y_gen: Option<NativeBuffer<f64>>,
    /// Dual cone generators, column major q x p
    pub z_gen: Option<NativeBuffer<f64>>,
    pub c: Option<NativeBuffer<f64>>,
    /// Extreme directions of the upper image, column major q x r
    pub r_gen: Option<NativeBuffer<f64>>,
    /// Vertices of the dual parameter set, column major q x h
    pub h_gen: Option<NativeBuffer<f64>>,
    pub upper: Option<ImageRecord>,
    pub lower: Option<ImageRecord>,
    /// Upper image vertices
    pub pp: usize,
    /// Upper image extreme directions
    pub pp_dir: usize,
    /// Lower image vertices
    pub dd: usize,
    /// Lower image extreme directions
    pub dd_dir: usize,
}

impl NativeRecord for SolRecord {
    fn free_members(&mut self) {
        *self = SolRecord::default();
    }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_solution_record_is_empty() {
        let mut sol = SolRecord {
            status: SolutionStatus::Optimal,
            q: 2,
            pp: 3,
            eta: Some(NativeBuffer::try_from_slice(&[0.5f64, 0.5]).unwrap()),
            c: Some(NativeBuffer::try_from_slice(&[1f64, 1.]).unwrap()),
            ..Default::default()
        };
        sol.free_members();
        assert!(sol.eta.is_none());
        assert!(sol.c.is_none());
        assert!(sol.upper.is_none());
        assert_eq!(sol.status, SolutionStatus::NoStatus);
        assert_eq!((sol.q, sol.pp), (0, 0));
    }
}
