//! Vector linear programs and their conversion into the solver's problem record
//!
//! A vector linear program is
//!
//! ```text
//! minimise (or maximise) P x  w.r.t. the ordering cone C
//! subject to             a <= B x <= b
//!                        l <=   x <= s
//! ```
//!
//! with `B` the m x n constraint matrix and `P` the q x n objective matrix. The ordering cone
//! is the non-negative orthant unless generators of `C` (primal) or of its dual (dual) are
//! supplied.
pub mod bounds;
pub mod handle;

use crate::configuration::configuration;
use crate::native::AllocationError;
use bounds::{classify, BoundEntry, BoundError};
use derive_builder::Builder;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use thiserror::Error;

pub use handle::ProblemHandle;

/// Direction of optimisation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OptDirection {
    #[default]
    Minimize,
    Maximize,
}

impl OptDirection {
    /// 1 for minimisation, -1 for maximisation
    pub fn sign(&self) -> f64 {
        match self {
            OptDirection::Minimize => 1.,
            OptDirection::Maximize => -1.,
        }
    }

    /// Integer code used by the Python interface and the solver record
    pub fn code(&self) -> i32 {
        match self {
            OptDirection::Minimize => 1,
            OptDirection::Maximize => -1,
        }
    }

    pub fn from_code(code: i32) -> Option<OptDirection> {
        match code {
            1 => Some(OptDirection::Minimize),
            -1 => Some(OptDirection::Maximize),
            _ => None,
        }
    }
}

// region Matrix input

/// Dense or sparse matrix input
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixData {
    Dense(DMatrix<f64>),
    Sparse(CsrMatrix<f64>),
}

impl MatrixData {
    pub fn nrows(&self) -> usize {
        match self {
            MatrixData::Dense(m) => m.nrows(),
            MatrixData::Sparse(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            MatrixData::Dense(m) => m.ncols(),
            MatrixData::Sparse(m) => m.ncols(),
        }
    }

    /// Sparse matrix from 0-based coordinate entries, duplicates summed
    ///
    /// # Examples
    /// ```rust
    /// use benrs_core::vlp::MatrixData;
    ///
    /// let m = MatrixData::from_entries(2, 2, [(0, 0, 1.), (1, 1, 2.), (0, 0, 1.)]).unwrap();
    /// assert_eq!(m.triplets(0.), vec![(0, 0, 2.), (1, 1, 2.)]);
    /// assert!(MatrixData::from_entries(2, 2, [(2, 0, 1.)]).is_err());
    /// ```
    pub fn from_entries<I>(nrows: usize, ncols: usize, entries: I) -> Result<MatrixData, ValidationError>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut coo = CooMatrix::new(nrows, ncols);
        for (row, col, value) in entries {
            if row >= nrows || col >= ncols {
                return Err(ValidationError::EntryOutOfRange {
                    row,
                    col,
                    nrows,
                    ncols,
                });
            }
            coo.push(row, col, value);
        }
        Ok(MatrixData::from(&coo))
    }

    /// Entries with magnitude above `tolerance` as 0-based (row, col, value), row major
    pub fn triplets(&self, tolerance: f64) -> Vec<(usize, usize, f64)> {
        match self {
            MatrixData::Dense(m) => {
                let mut entries = Vec::new();
                for i in 0..m.nrows() {
                    for j in 0..m.ncols() {
                        let v = m[(i, j)];
                        if v.abs() > tolerance {
                            entries.push((i, j, v));
                        }
                    }
                }
                entries
            }
            MatrixData::Sparse(m) => m
                .triplet_iter()
                .filter(|(_, _, v)| v.abs() > tolerance)
                .map(|(i, j, v)| (i, j, *v))
                .collect(),
        }
    }

    /// Dense copy of the matrix
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            MatrixData::Dense(m) => m.clone(),
            MatrixData::Sparse(m) => {
                let mut dense = DMatrix::zeros(m.nrows(), m.ncols());
                for (i, j, v) in m.triplet_iter() {
                    dense[(i, j)] += *v;
                }
                dense
            }
        }
    }
}

impl From<DMatrix<f64>> for MatrixData {
    fn from(value: DMatrix<f64>) -> Self {
        MatrixData::Dense(value)
    }
}

impl From<CsrMatrix<f64>> for MatrixData {
    fn from(value: CsrMatrix<f64>) -> Self {
        MatrixData::Sparse(value)
    }
}

impl From<&CscMatrix<f64>> for MatrixData {
    fn from(value: &CscMatrix<f64>) -> Self {
        MatrixData::Sparse(CsrMatrix::from(value))
    }
}

/// Duplicate entries are summed
impl From<&CooMatrix<f64>> for MatrixData {
    fn from(value: &CooMatrix<f64>) -> Self {
        MatrixData::Sparse(CsrMatrix::from(value))
    }
}

/// Rows of a dense matrix, rejected unless every row has the length of the first
impl TryFrom<Vec<Vec<f64>>> for MatrixData {
    type Error = ValidationError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(ValidationError::RaggedRows {
                row,
                found: r.len(),
                expected: ncols,
            });
        }
        Ok(MatrixData::Dense(DMatrix::from_fn(nrows, ncols, |i, j| rows[i][j])))
    }
}

// endregion

// region Problem

/// A vector linear program as supplied by the caller
#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct VlpProblem {
    /// Constraint matrix B, m x n
    pub constraints: MatrixData,
    /// Objective matrix P, q x n
    pub objectives: MatrixData,
    /// Row lower bounds a, length m
    #[builder(default = "None", setter(into, strip_option))]
    pub row_lower: Option<Vec<f64>>,
    /// Row upper bounds b, length m
    #[builder(default = "None", setter(into, strip_option))]
    pub row_upper: Option<Vec<f64>>,
    /// Column lower bounds l, length n
    #[builder(default = "None", setter(into, strip_option))]
    pub col_lower: Option<Vec<f64>>,
    /// Column upper bounds s, length n
    #[builder(default = "None", setter(into, strip_option))]
    pub col_upper: Option<Vec<f64>>,
    /// Generators of the ordering cone as columns, q x k
    #[builder(default = "None", setter(into, strip_option))]
    pub primal_generators: Option<MatrixData>,
    /// Generators of the dual ordering cone as columns, q x k
    #[builder(default = "None", setter(into, strip_option))]
    pub dual_generators: Option<MatrixData>,
    /// Duality parameter c, length q
    #[builder(default = "None", setter(into, strip_option))]
    pub duality: Option<Vec<f64>>,
    #[builder(default = "OptDirection::Minimize")]
    pub direction: OptDirection,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("constraint matrix has {constraints} columns but objective matrix has {objectives}")]
    ColumnMismatch {
        constraints: usize,
        objectives: usize,
    },
    #[error("objective matrix has no rows")]
    NoObjectives,
    #[error(transparent)]
    Bounds(#[from] BoundError),
    #[error("both primal and dual cone generators were given")]
    ConflictingCones,
    #[error("cone generators have {found} rows, expected {expected}")]
    GeneratorRows { found: usize, expected: usize },
    #[error("duality parameter has length {found}, expected {expected}")]
    DualityLength { found: usize, expected: usize },
    #[error("{0} contains a value that is not finite")]
    NotFinite(&'static str),
    #[error("entry ({row}, {col}) lies outside a {nrows} x {ncols} matrix")]
    EntryOutOfRange {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    #[error("matrix row {row} has {found} entries, expected {expected}")]
    RaggedRows {
        row: usize,
        found: usize,
        expected: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("invalid problem: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl From<BoundError> for BuildError {
    fn from(value: BoundError) -> Self {
        BuildError::Validation(ValidationError::Bounds(value))
    }
}

/// Cone description ready to be copied into the problem record
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StagedCone {
    Default,
    Primal(DMatrix<f64>),
    Dual(DMatrix<f64>),
}

/// Validated problem data, in the layout of the problem record
#[derive(Debug, Clone)]
pub(crate) struct StagedProblem {
    pub m: usize,
    pub n: usize,
    pub q: usize,
    /// 0-based (row, col, value) of B followed by P with rows offset by m
    pub extended: Vec<(usize, usize, f64)>,
    pub nz: usize,
    pub nzobj: usize,
    pub rows: Vec<BoundEntry>,
    pub cols: Vec<BoundEntry>,
    pub cone: StagedCone,
    pub duality: Option<Vec<f64>>,
    pub direction: OptDirection,
}

impl VlpProblem {
    /// Validate the problem and lay it out for the problem record
    ///
    /// Nothing here touches a record, so a failure leaves every handle as it was.
    pub(crate) fn stage(&self) -> Result<StagedProblem, ValidationError> {
        let m = self.constraints.nrows();
        let n = self.objectives.ncols();
        let q = self.objectives.nrows();
        if self.constraints.ncols() != n {
            return Err(ValidationError::ColumnMismatch {
                constraints: self.constraints.ncols(),
                objectives: n,
            });
        }
        if q == 0 {
            return Err(ValidationError::NoObjectives);
        }
        let rows = classify(self.row_lower.as_deref(), self.row_upper.as_deref(), m)?;
        let cols = classify(self.col_lower.as_deref(), self.col_upper.as_deref(), n)?;

        let non_empty = |g: &Option<MatrixData>| g.as_ref().filter(|g| g.ncols() > 0).cloned();
        let cone = match (
            non_empty(&self.primal_generators),
            non_empty(&self.dual_generators),
        ) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingCones),
            (Some(y), None) => StagedCone::Primal(generator_matrix(&y, q)?),
            (None, Some(z)) => StagedCone::Dual(generator_matrix(&z, q)?),
            (None, None) => StagedCone::Default,
        };
        if let Some(c) = &self.duality {
            if c.len() != q {
                return Err(ValidationError::DualityLength {
                    found: c.len(),
                    expected: q,
                });
            }
            if c.iter().any(|v| !v.is_finite()) {
                return Err(ValidationError::NotFinite("duality parameter"));
            }
        }

        let tolerance = configuration().zero_tolerance;
        let constraint_entries = self.constraints.triplets(tolerance);
        let objective_entries = self.objectives.triplets(tolerance);
        if constraint_entries
            .iter()
            .chain(objective_entries.iter())
            .any(|(_, _, v)| !v.is_finite())
        {
            return Err(ValidationError::NotFinite("coefficient matrix"));
        }
        let nz = constraint_entries.len();
        let nzobj = objective_entries.len();
        let mut extended = constraint_entries;
        extended.extend(objective_entries.into_iter().map(|(i, j, v)| (i + m, j, v)));

        Ok(StagedProblem {
            m,
            n,
            q,
            extended,
            nz,
            nzobj,
            rows,
            cols,
            cone,
            duality: self.duality.clone(),
            direction: self.direction,
        })
    }
}

fn generator_matrix(gen: &MatrixData, q: usize) -> Result<DMatrix<f64>, ValidationError> {
    if gen.nrows() != q {
        return Err(ValidationError::GeneratorRows {
            found: gen.nrows(),
            expected: q,
        });
    }
    let dense = gen.to_dense();
    if dense.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NotFinite("cone generators"));
    }
    Ok(dense)
}

/// Column `j` of a column major buffer with `rows` rows
pub(crate) fn column(buffer: &[f64], rows: usize, j: usize) -> DVector<f64> {
    DVector::from_column_slice(&buffer[j * rows..(j + 1) * rows])
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    fn example_problem() -> VlpProblemBuilder {
        let mut builder = VlpProblemBuilder::default();
        builder
            .constraints(dmatrix![2., 1.; 1., 2.])
            .objectives(dmatrix![1., -1.; 1., 1.])
            .row_lower(vec![6., 6.])
            .col_lower(vec![0., 0.]);
        builder
    }

    #[test]
    fn stage_extended_matrix() {
        let staged = example_problem().build().unwrap().stage().unwrap();
        assert_eq!((staged.m, staged.n, staged.q), (2, 2, 2));
        assert_eq!(staged.nz, 4);
        assert_eq!(staged.nzobj, 4);
        assert_eq!(staged.extended.len(), 8);
        assert_eq!(staged.extended[4], (2, 0, 1.));
        assert_eq!(staged.extended[5], (2, 1, -1.));
        assert_eq!(staged.rows.len(), 2);
        assert_eq!(staged.cols.len(), 2);
        assert_eq!(staged.cone, StagedCone::Default);
    }

    #[test]
    fn zeros_are_skipped() {
        let staged = example_problem()
            .constraints(dmatrix![2., 0.; 0., 2.])
            .build()
            .unwrap()
            .stage()
            .unwrap();
        assert_eq!(staged.nz, 2);
        assert_eq!(staged.extended[1], (1, 1, 2.));
    }

    #[test]
    fn sparse_duplicates_are_summed() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 1.);
        coo.push(0, 0, 1.);
        coo.push(1, 1, 3.);
        let staged = example_problem()
            .constraints(MatrixData::from(&coo))
            .build()
            .unwrap()
            .stage()
            .unwrap();
        assert_eq!(staged.nz, 2);
        assert_eq!(staged.extended[0], (0, 0, 2.));
    }

    #[test]
    fn nested_rows() {
        let matrix = MatrixData::try_from(vec![vec![1f64, 2.], vec![3., 4.]]).unwrap();
        assert_eq!(matrix.to_dense(), dmatrix![1., 2.; 3., 4.]);
        match MatrixData::try_from(vec![vec![1f64, 2.], vec![3.], vec![4., 5., 6.]]) {
            Err(ValidationError::RaggedRows { row, found, expected }) => {
                assert_eq!((row, found, expected), (1, 1, 2));
            }
            _ => panic!("Ragged rows accepted"),
        }
        assert!(MatrixData::try_from(vec![vec![1f64], vec![2., 3.]]).is_err());
    }

    #[test]
    fn coordinate_entries() {
        let matrix = MatrixData::from_entries(2, 3, vec![(0, 2, 1.5), (1, 0, -1.), (0, 2, 0.5)]).unwrap();
        assert_eq!(matrix.to_dense(), dmatrix![0., 0., 2.; -1., 0., 0.]);
        match MatrixData::from_entries(2, 3, vec![(0, 0, 1.), (1, 3, 1.)]) {
            Err(ValidationError::EntryOutOfRange { row, col, .. }) => assert_eq!((row, col), (1, 3)),
            _ => panic!("Entry outside the matrix accepted"),
        }
        let staged = example_problem()
            .constraints(MatrixData::from_entries(2, 2, vec![(0, 0, 2.), (0, 1, 1.), (1, 0, 1.), (1, 1, 2.)]).unwrap())
            .build()
            .unwrap()
            .stage()
            .unwrap();
        assert_eq!(staged.nz, 4);
    }

    #[test]
    fn column_mismatch() {
        let problem = example_problem()
            .constraints(dmatrix![1., 1., 1.])
            .build()
            .unwrap();
        match problem.stage() {
            Err(ValidationError::ColumnMismatch {
                constraints,
                objectives,
            }) => {
                assert_eq!(constraints, 3);
                assert_eq!(objectives, 2);
            }
            _ => panic!("Mismatched column counts accepted"),
        }
    }

    #[test]
    fn conflicting_cones() {
        let problem = example_problem()
            .primal_generators(dmatrix![1., 0.; 0., 1.])
            .dual_generators(dmatrix![1., 0.; 0., 1.])
            .build()
            .unwrap();
        assert_eq!(problem.stage().unwrap_err(), ValidationError::ConflictingCones);
        // An empty generator matrix counts as absent
        let problem = example_problem()
            .primal_generators(dmatrix![1., 0.; 0., 1.])
            .dual_generators(DMatrix::<f64>::zeros(2, 0))
            .build()
            .unwrap();
        match problem.stage().unwrap().cone {
            StagedCone::Primal(y) => assert_eq!(y.ncols(), 2),
            _ => panic!("Primal generators lost"),
        }
    }

    #[test]
    fn duality_length() {
        let problem = example_problem().duality(vec![1., 1., 1.]).build().unwrap();
        assert_eq!(
            problem.stage().unwrap_err(),
            ValidationError::DualityLength {
                found: 3,
                expected: 2
            }
        );
    }

    #[test]
    fn contradictory_bounds() {
        let problem = example_problem()
            .row_lower(vec![5., 0.])
            .row_upper(vec![1., 1.])
            .build()
            .unwrap();
        match problem.stage() {
            Err(ValidationError::Bounds(BoundError::Inverted { index, .. })) => assert_eq!(index, 1),
            _ => panic!("Contradictory bounds accepted"),
        }
    }

    #[test]
    fn direction_codes() {
        assert_eq!(OptDirection::from_code(-1), Some(OptDirection::Maximize));
        assert_eq!(OptDirection::from_code(0), None);
        assert!((OptDirection::Maximize.sign() + 1.).abs() < 1e-25);
        assert_eq!(OptDirection::default().code(), 1);
    }
}
