//! Benson type outer approximation algorithm for vector linear programs
//!
//! The engine works on the records of [`crate::native`] and is driven phase by phase through
//! the [`VlpAlgorithm`] trait:
//!
//! - `sol_init` derives the ordering cone, its dual and the duality parameter;
//! - phase 0 checks feasibility and finds an interior weight `eta` of the dual parameter set;
//! - phase 1 computes the recession cone of the upper image together with the vertices of
//!   the dual parameter set;
//! - phase 2 computes the upper and lower images, either by cutting an outer approximation of
//!   the upper image (primal) or of the lower image (dual).
//!
//! Weights w with c^T w = 1 are parametrised by their first q - 1 coordinates v,
//! w(v) = (v_1, ..., v_{q-1}, 1 - c_1 v_1 - ... - c_{q-1} v_{q-1}).
pub mod cone;
pub(crate) mod dd;
mod images;
pub mod lp;
mod phase0;
mod phase1;
mod phase2;

use nalgebra::DVector;
use thiserror::Error;

use crate::configuration::configuration;
use crate::native::records::{OptRecord, SolRecord, VlpRecord};
use crate::native::{AllocationError, NativeBuffer};
use crate::vlp::column;
use cone::ConeError;
use dd::DdError;
use lp::LpError;

pub use lp::{lp_free, lp_get_num, lp_init, LpIdx};

/// Slot of the LP working structure used by the engine
pub const WORKING_LP: LpIdx = 0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid ordering cone: {0}")]
    Cone(#[from] ConeError),
    #[error(transparent)]
    Lp(#[from] LpError),
    #[error("vertex enumeration failed: {0}")]
    Vertices(#[from] DdError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("solution record lacks {0}, the phase producing it has not run")]
    MissingMember(&'static str),
    #[error("numerical difficulties: {0}")]
    Numerical(String),
}

/// Phase level interface of a vector linear programming solver
///
/// Each phase reads the problem and options records and writes its results into the solution
/// record. Statuses such as infeasibility are written to the solution record, errors are
/// reserved for failures of the solver itself.
pub trait VlpAlgorithm: Sync {
    /// Prepare the solution record, deriving the ordering cone
    fn sol_init(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    /// Initialise the LP working structure `idx` for the problem
    fn lp_init(&self, idx: LpIdx, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    /// Free the LP working structure `idx`, doing nothing if it is not initialised
    fn lp_free(&self, idx: LpIdx);

    /// Number of LPs solved through working structure `idx`
    fn lp_get_num(&self, idx: LpIdx) -> usize;

    fn phase0(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    fn phase1_primal(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    fn phase1_dual(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    /// Initialise the recession data of a problem assumed to be bounded
    fn phase2_init(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    fn phase2_primal(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;

    fn phase2_dual(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError>;
}

/// The Benson engine over the clarabel LP backend
#[derive(Debug, Default, Copy, Clone)]
pub struct Benson;

impl VlpAlgorithm for Benson {
    fn sol_init(&self, sol: &mut SolRecord, vlp: &VlpRecord, _opt: &OptRecord) -> Result<(), EngineError> {
        let tolerance = configuration().vertex_tolerance;
        let cone = cone::ordering_cone(vlp, tolerance)?;
        sol.m = vlp.m;
        sol.n = vlp.n;
        sol.q = vlp.q;
        sol.o = cone.primal.len();
        sol.p = cone.dual.len();
        sol.y_gen = Some(flatten(&cone.primal)?);
        sol.z_gen = Some(flatten(&cone.dual)?);
        sol.c = Some(NativeBuffer::try_from_slice(cone.c.as_slice())?);
        Ok(())
    }

    fn lp_init(&self, idx: LpIdx, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        Ok(lp::lp_init(idx, vlp, opt)?)
    }

    fn lp_free(&self, idx: LpIdx) {
        lp::lp_free(idx)
    }

    fn lp_get_num(&self, idx: LpIdx) -> usize {
        lp::lp_get_num(idx)
    }

    fn phase0(&self, sol: &mut SolRecord, _vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        lp::with_lp(WORKING_LP, |lp| phase0::run(sol, opt, lp))?
    }

    fn phase1_primal(&self, sol: &mut SolRecord, _vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        lp::with_lp(WORKING_LP, |lp| phase1::primal(sol, opt, lp))?
    }

    fn phase1_dual(&self, sol: &mut SolRecord, _vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        lp::with_lp(WORKING_LP, |lp| phase1::dual(sol, opt, lp))?
    }

    fn phase2_init(&self, sol: &mut SolRecord, _vlp: &VlpRecord, _opt: &OptRecord) -> Result<(), EngineError> {
        phase2::init(sol)
    }

    fn phase2_primal(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        lp::with_lp(WORKING_LP, |lp| phase2::primal(sol, vlp, opt, lp))?
    }

    fn phase2_dual(&self, sol: &mut SolRecord, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), EngineError> {
        lp::with_lp(WORKING_LP, |lp| phase2::dual(sol, vlp, opt, lp))?
    }
}

// region Shared helpers

/// Vectors stored as the columns of a column major buffer
pub(crate) fn flatten(vectors: &[DVector<f64>]) -> Result<NativeBuffer<f64>, AllocationError> {
    let len = vectors.iter().map(|v| v.len()).sum();
    NativeBuffer::try_from_iter(ExactLen {
        inner: vectors.iter().flat_map(|v| v.iter().copied()),
        left: len,
    })
}

/// Iterator adapter reporting a known length
struct ExactLen<I> {
    inner: I,
    left: usize,
}

impl<I: Iterator<Item = f64>> Iterator for ExactLen<I> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let next = self.inner.next();
        if next.is_some() {
            self.left = self.left.saturating_sub(1);
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.left, Some(self.left))
    }
}

impl<I: Iterator<Item = f64>> ExactSizeIterator for ExactLen<I> {}

/// Columns of an optional record member
pub(crate) fn columns(
    buffer: &Option<NativeBuffer<f64>>,
    rows: usize,
    count: usize,
    name: &'static str,
) -> Result<Vec<DVector<f64>>, EngineError> {
    let buffer = buffer.as_ref().ok_or(EngineError::MissingMember(name))?;
    if buffer.len() != rows * count {
        return Err(EngineError::MissingMember(name));
    }
    Ok((0..count).map(|j| column(buffer, rows, j)).collect())
}

/// Ordering cone generators, dual generators and duality parameter of a solution record
pub(crate) struct ConeData {
    pub primal: Vec<DVector<f64>>,
    pub dual: Vec<DVector<f64>>,
    pub c: DVector<f64>,
}

impl ConeData {
    pub fn from_sol(sol: &SolRecord) -> Result<ConeData, EngineError> {
        let c = sol.c.as_ref().ok_or(EngineError::MissingMember("c"))?;
        Ok(ConeData {
            primal: columns(&sol.y_gen, sol.q, sol.o, "Y")?,
            dual: columns(&sol.z_gen, sol.q, sol.p, "Z")?,
            c: DVector::from_column_slice(c),
        })
    }

    /// Weight w(v) of the first q - 1 coordinates `v`
    pub fn weight(&self, v: &[f64]) -> DVector<f64> {
        let q = self.c.len();
        let mut w = DVector::zeros(q);
        let mut last = 1.;
        for i in 0..q - 1 {
            w[i] = v[i];
            last -= self.c[i] * v[i];
        }
        w[q - 1] = last;
        w
    }

    /// Coefficients of v in w(v)^T y, the constant term is y_q
    pub fn weight_coefficients(&self, y: &DVector<f64>) -> DVector<f64> {
        let q = self.c.len();
        DVector::from_fn(q - 1, |i, _| y[i] - self.c[i] * y[q - 1])
    }
}

/// Whether `p` lies within `tolerance` of one of `points`
pub(crate) fn is_known(points: &[DVector<f64>], p: &DVector<f64>, tolerance: f64) -> bool {
    points
        .iter()
        .any(|k| (k - p).amax() <= tolerance * (1. + p.amax()))
}

// endregion
