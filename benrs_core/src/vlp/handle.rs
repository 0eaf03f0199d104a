//! Handle owning a populated problem record
use std::path::Path;

use nalgebra::DMatrix;

use super::{BuildError, OptDirection, StagedCone, StagedProblem, VlpProblem};
use crate::io::vlp_file::{self, VlpFileError};
use crate::native::records::{ConeKind, Triplet, VlpRecord};
use crate::native::{Handle, NativeBuffer, NativeRecord};

/// Owns the problem record built from a [`VlpProblem`]
///
/// The handle can be rebuilt any number of times; every rebuild first frees the members of
/// the previous build.
#[derive(Debug, Default)]
pub struct ProblemHandle {
    inner: Handle<VlpRecord>,
}

impl ProblemHandle {
    /// Create a handle holding an empty record
    pub fn new() -> Self {
        ProblemHandle {
            inner: Handle::new(),
        }
    }

    /// Build a handle from a problem
    ///
    /// # Examples
    /// ```rust
    /// use benrs_core::vlp::{ProblemHandle, VlpProblemBuilder};
    /// use nalgebra::dmatrix;
    ///
    /// let problem = VlpProblemBuilder::default()
    ///     .constraints(dmatrix![2., 1.; 1., 2.])
    ///     .objectives(dmatrix![1., -1.; 1., 1.])
    ///     .row_lower(vec![6., 6.])
    ///     .build()
    ///     .unwrap();
    /// let handle = ProblemHandle::from_problem(&problem).unwrap();
    /// assert_eq!(handle.nz(), 4);
    /// assert_eq!(handle.constraint_matrix().unwrap(), dmatrix![2., 1.; 1., 2.]);
    /// ```
    pub fn from_problem(problem: &VlpProblem) -> Result<Self, BuildError> {
        let mut handle = ProblemHandle::new();
        handle.build(problem)?;
        Ok(handle)
    }

    /// Read a problem in the vlp text format and build a handle from it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VlpFileError> {
        let problem = vlp_file::read_problem(path)?;
        Ok(ProblemHandle::from_problem(&problem)?)
    }

    /// Write the problem held by this handle in the vlp text format
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), VlpFileError> {
        match self.record() {
            Some(record) => vlp_file::write_file(record, path),
            None => Err(VlpFileError::EmptyProblem),
        }
    }

    /// Populate the record from `problem`
    ///
    /// The problem is fully validated before the record is touched. When an allocation fails
    /// part way through, the members stored so far stay in the record and are released with
    /// the handle.
    pub fn build(&mut self, problem: &VlpProblem) -> Result<(), BuildError> {
        let staged = problem.stage()?;
        let record = self.inner.get_or_init();
        record.free_members();
        populate(record, &staged)?;
        log::debug!(
            "built problem with m={} n={} q={} nz={} nzobj={}",
            record.m,
            record.n,
            record.q,
            record.nz,
            record.nzobj
        );
        Ok(())
    }

    /// Release the record, further builds allocate a new one
    pub fn release(&mut self) {
        self.inner.release();
    }

    /// The record, if it holds a completely built problem
    pub(crate) fn record(&self) -> Option<&VlpRecord> {
        self.inner.get().filter(|r| r.populated)
    }

    pub fn is_populated(&self) -> bool {
        self.record().is_some()
    }

    /// Number of constraint rows
    pub fn m(&self) -> usize {
        self.record().map_or(0, |r| r.m)
    }

    /// Number of variables
    pub fn n(&self) -> usize {
        self.record().map_or(0, |r| r.n)
    }

    /// Number of objectives
    pub fn q(&self) -> usize {
        self.record().map_or(0, |r| r.q)
    }

    /// Stored entries of the constraint matrix
    pub fn nz(&self) -> usize {
        self.record().map_or(0, |r| r.nz)
    }

    /// Stored entries of the objective matrix
    pub fn nzobj(&self) -> usize {
        self.record().map_or(0, |r| r.nzobj)
    }

    pub fn optdir(&self) -> OptDirection {
        self.record().map_or(OptDirection::Minimize, |r| r.optdir)
    }

    /// Recover the constraint matrix B from the stored entries
    pub fn constraint_matrix(&self) -> Option<DMatrix<f64>> {
        let record = self.record()?;
        Some(dense_block(record, 1, record.m))
    }

    /// Recover the objective matrix P from the stored entries
    pub fn objective_matrix(&self) -> Option<DMatrix<f64>> {
        let record = self.record()?;
        Some(dense_block(record, record.m + 1, record.q))
    }
}

fn populate(record: &mut VlpRecord, staged: &StagedProblem) -> Result<(), BuildError> {
    record.a_ext = Some(NativeBuffer::try_from_iter(staged.extended.iter().map(
        |&(i, j, value)| Triplet {
            row: i + 1,
            col: j + 1,
            value,
        },
    ))?);
    record.rows = Some(NativeBuffer::try_from_slice(&staged.rows)?);
    record.cols = Some(NativeBuffer::try_from_slice(&staged.cols)?);
    let (kind, gen) = match &staged.cone {
        StagedCone::Default => (ConeKind::Default, None),
        StagedCone::Primal(y) => (ConeKind::Primal, Some(y)),
        StagedCone::Dual(z) => (ConeKind::Dual, Some(z)),
    };
    if let Some(gen) = gen {
        // nalgebra storage is column major already
        record.gen = Some(NativeBuffer::try_from_slice(gen.as_slice())?);
        record.n_gen = gen.ncols();
    }
    record.cone_gen = kind;
    if let Some(c) = &staged.duality {
        record.c = Some(NativeBuffer::try_from_slice(c)?);
    }
    record.m = staged.m;
    record.n = staged.n;
    record.q = staged.q;
    record.nz = staged.nz;
    record.nzobj = staged.nzobj;
    record.optdir = staged.direction;
    record.populated = true;
    Ok(())
}

/// Dense block of `rows` rows of the extended matrix starting at 1-based row `first`
fn dense_block(record: &VlpRecord, first: usize, rows: usize) -> DMatrix<f64> {
    let mut block = DMatrix::zeros(rows, record.n);
    if let Some(entries) = &record.a_ext {
        for t in entries.iter().filter(|t| t.row >= first && t.row < first + rows) {
            block[(t.row - first, t.col - 1)] += t.value;
        }
    }
    block
}
