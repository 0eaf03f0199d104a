//! Scalar LPs of the Benson engine, solved with clarabel
//!
//! [`LinearProgram`] is a small row-bound LP model. [`WorkingLp`] holds the feasible set of a
//! vector linear program and builds the scalarisations the phases need from it. Working
//! structures live in a process wide slot table addressed by index.
use std::sync::{LazyLock, Mutex, PoisonError};

use clarabel::algebra::CscMatrix;
use clarabel::solver::implementations::default::DefaultSettingsBuilder;
use clarabel::solver::SupportedConeT::{self, *};
use clarabel::solver::{DefaultSolver, IPSolver, SolverStatus};
use nalgebra::DVector;
use thiserror::Error;

use crate::configuration::configuration;
use crate::native::records::{OptRecord, VlpRecord};
use crate::options::LpMethod;
use crate::vlp::bounds::BoundEntry;

/// Index of an LP working structure in the slot table
pub type LpIdx = usize;

/// Number of slots in the LP table
pub const LP_SLOTS: usize = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LpError {
    #[error("LP slot {0} does not exist")]
    InvalidSlot(LpIdx),
    #[error("LP slot {0} has not been initialised")]
    NotInitialised(LpIdx),
    #[error("problem record is incomplete")]
    IncompleteRecord,
    #[error("LP backend failed: {0}")]
    Backend(String),
}

// region Linear program

#[derive(Debug, Clone)]
struct LpRow {
    coefs: Vec<(usize, f64)>,
    lower: f64,
    upper: f64,
}

/// min c^T x  s.t.  lower <= A x <= upper, x_lower <= x <= x_upper
#[derive(Debug, Clone)]
pub(crate) struct LinearProgram {
    objective: Vec<f64>,
    var_lower: Vec<f64>,
    var_upper: Vec<f64>,
    rows: Vec<LpRow>,
}

/// Result of a single LP
#[derive(Debug, Clone)]
pub(crate) enum LpOutcome {
    Optimal {
        x: Vec<f64>,
        value: f64,
        /// Multiplier of each row: the objective equals the sum of the row multipliers times
        /// the rows, plus multipliers of the variable bounds. Non-negative for active lower
        /// bounds, non-positive for active upper bounds.
        duals: Vec<f64>,
    },
    Infeasible,
    Unbounded,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct LpSettings {
    pub tolerance: f64,
    pub verbose: bool,
}

impl LinearProgram {
    /// LP over `n` free variables with a zero objective
    pub fn new(n: usize) -> Self {
        LinearProgram {
            objective: vec![0.; n],
            var_lower: vec![f64::NEG_INFINITY; n],
            var_upper: vec![f64::INFINITY; n],
            rows: Vec::new(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn set_objective(&mut self, objective: Vec<f64>) {
        self.objective = objective;
    }

    pub fn set_bounds(&mut self, j: usize, lower: f64, upper: f64) {
        self.var_lower[j] = lower;
        self.var_upper[j] = upper;
    }

    /// Add `lower <= coefs . x <= upper`, returning the row index
    ///
    /// Repeated columns in `coefs` are summed.
    pub fn add_row(&mut self, mut coefs: Vec<(usize, f64)>, lower: f64, upper: f64) -> usize {
        coefs.sort_by_key(|(j, _)| *j);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(coefs.len());
        for (j, v) in coefs {
            match merged.last_mut() {
                Some((last, acc)) if *last == j => *acc += v,
                _ => merged.push((j, v)),
            }
        }
        merged.retain(|(_, v)| *v != 0.);
        self.rows.push(LpRow {
            coefs: merged,
            lower,
            upper,
        });
        self.rows.len() - 1
    }

    pub fn solve(&self, settings: LpSettings) -> Result<LpOutcome, LpError> {
        let n = self.num_vars();
        let mut builder = CscMatrixBuilder::new(n);
        let mut rhs = Vec::new();
        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        // (origin row, sign turning clarabel's z into the row multiplier)
        let mut origins: Vec<(Option<usize>, f64)> = Vec::new();

        let mut push = |coefs: &[(usize, f64)], scale: f64, b: f64, cone: SupportedConeT<f64>, origin| {
            builder.add_row(coefs.iter().map(|(j, v)| (*j, scale * v)));
            rhs.push(b);
            push_cone(&mut cones, cone);
            origins.push(origin);
        };
        for (k, row) in self.rows.iter().enumerate() {
            if row.lower == row.upper {
                push(&row.coefs, 1., row.upper, ZeroConeT(1), (Some(k), -1.));
                continue;
            }
            if row.upper.is_finite() {
                push(&row.coefs, 1., row.upper, NonnegativeConeT(1), (Some(k), -1.));
            }
            if row.lower.is_finite() {
                push(&row.coefs, -1., -row.lower, NonnegativeConeT(1), (Some(k), 1.));
            }
        }
        for j in 0..n {
            let unit = [(j, 1.)];
            let (lo, up) = (self.var_lower[j], self.var_upper[j]);
            if lo == up {
                push(&unit, 1., up, ZeroConeT(1), (None, 0.));
                continue;
            }
            if up.is_finite() {
                push(&unit, 1., up, NonnegativeConeT(1), (None, 0.));
            }
            if lo.is_finite() {
                push(&unit, -1., -lo, NonnegativeConeT(1), (None, 0.));
            }
        }

        if rhs.is_empty() {
            // Nothing constrains x
            return Ok(if self.objective.iter().all(|c| *c == 0.) {
                LpOutcome::Optimal {
                    x: vec![0.; n],
                    value: 0.,
                    duals: vec![0.; self.rows.len()],
                }
            } else {
                LpOutcome::Unbounded
            });
        }

        let mut clarabel_settings = DefaultSettingsBuilder::default();
        clarabel_settings
            .verbose(settings.verbose)
            .tol_feas(settings.tolerance)
            .tol_gap_abs(settings.tolerance)
            .tol_gap_rel(settings.tolerance);
        let clarabel_settings = clarabel_settings
            .build()
            .map_err(|e| LpError::Backend(e.to_string()))?;
        let quadratic_objective = CscMatrix::zeros((n, n));
        let constraints = builder.build();
        let mut solver = DefaultSolver::new(
            &quadratic_objective,
            &self.objective,
            &constraints,
            &rhs,
            &cones,
            clarabel_settings,
        )
        .map_err(|e| LpError::Backend(format!("{e:?}")))?;
        solver.solve();

        match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let x = solver.solution.x.clone();
                let value = self.objective.iter().zip(&x).map(|(c, x)| c * x).sum();
                let mut duals = vec![0.; self.rows.len()];
                for ((origin, sign), z) in origins.iter().zip(&solver.solution.z) {
                    if let Some(k) = origin {
                        duals[*k] += sign * z;
                    }
                }
                Ok(LpOutcome::Optimal { x, value, duals })
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Ok(LpOutcome::Infeasible)
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                Ok(LpOutcome::Unbounded)
            }
            other => Err(LpError::Backend(format!("{other:?}"))),
        }
    }
}

/// Append a cone, merging it into the previous one when both have the same type
fn push_cone(cones: &mut Vec<SupportedConeT<f64>>, cone: SupportedConeT<f64>) {
    match (cones.last_mut(), &cone) {
        (Some(ZeroConeT(a)), ZeroConeT(b)) => *a += b,
        (Some(NonnegativeConeT(a)), NonnegativeConeT(b)) => *a += b,
        _ => cones.push(cone),
    }
}

struct CscMatrixBuilder {
    rowval: Vec<Vec<usize>>,
    nzval: Vec<Vec<f64>>,
    n_rows: usize,
    n_cols: usize,
}

impl CscMatrixBuilder {
    fn new(n_cols: usize) -> Self {
        Self {
            rowval: vec![Vec::new(); n_cols],
            nzval: vec![Vec::new(); n_cols],
            n_rows: 0,
            n_cols,
        }
    }

    fn add_row(&mut self, row: impl Iterator<Item = (usize, f64)>) {
        for (j, value) in row {
            self.rowval[j].push(self.n_rows);
            self.nzval[j].push(value);
        }
        self.n_rows += 1;
    }

    fn build(self) -> CscMatrix<f64> {
        let mut colptr = Vec::with_capacity(self.n_cols + 1);
        let mut total = 0;
        colptr.push(total);
        for col in &self.rowval {
            total += col.len();
            colptr.push(total);
        }
        CscMatrix::new(
            self.n_rows,
            self.n_cols,
            colptr,
            self.rowval.into_iter().flatten().collect(),
            self.nzval.into_iter().flatten().collect(),
        )
    }
}

// endregion

// region Working LP

/// Phase an LP is solved for, selecting tolerance and reported method
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum LpPhase {
    Phase0,
    Phase1,
    Phase2,
}

/// Feasible set of a vector linear program together with its objective matrix
///
/// The objective matrix is stored with the sign of the optimisation direction applied, so every
/// scalarisation is a minimisation.
#[derive(Debug, Clone)]
pub struct WorkingLp {
    n: usize,
    q: usize,
    /// Rows of B, 0-based columns
    constraint_rows: Vec<Vec<(usize, f64)>>,
    /// Rows of the signed objective matrix
    objective_rows: Vec<Vec<(usize, f64)>>,
    row_bounds: Vec<(f64, f64)>,
    col_bounds: Vec<(f64, f64)>,
    tolerances: [f64; 3],
    /// Recession values below minus this are descent directions
    descent_tolerance: f64,
    methods: [LpMethod; 3],
    verbose: bool,
    phase: LpPhase,
    solved: usize,
}

fn bound_pairs(entries: &[BoundEntry], len: usize) -> Vec<(f64, f64)> {
    let mut pairs = vec![(f64::NEG_INFINITY, f64::INFINITY); len];
    for entry in entries {
        if entry.index >= 1 && entry.index <= len {
            pairs[entry.index - 1] = (entry.lower, entry.upper);
        }
    }
    pairs
}

fn dot_sparse(row: &[(usize, f64)], x: &[f64]) -> f64 {
    row.iter().map(|(j, v)| v * x[*j]).sum()
}

fn dot_dense(a: &[f64], x: &[f64]) -> f64 {
    a.iter().zip(x).map(|(a, x)| a * x).sum()
}

impl WorkingLp {
    pub(crate) fn from_record(vlp: &VlpRecord, opt: &OptRecord) -> Result<Self, LpError> {
        let (Some(a_ext), Some(rows), Some(cols)) = (&vlp.a_ext, &vlp.rows, &vlp.cols) else {
            return Err(LpError::IncompleteRecord);
        };
        let (m, n, q) = (vlp.m, vlp.n, vlp.q);
        let sign = vlp.optdir.sign();
        let mut constraint_rows = vec![Vec::new(); m];
        let mut objective_rows = vec![Vec::new(); q];
        for t in a_ext.iter() {
            if t.col == 0 || t.col > n || t.row == 0 || t.row > m + q {
                return Err(LpError::IncompleteRecord);
            }
            let (i, j) = (t.row - 1, t.col - 1);
            if i < m {
                constraint_rows[i].push((j, t.value));
            } else {
                objective_rows[i - m].push((j, sign * t.value));
            }
        }
        let lp_tolerance = configuration().lp_tolerance;
        Ok(WorkingLp {
            n,
            q,
            constraint_rows,
            objective_rows,
            row_bounds: bound_pairs(rows, m),
            col_bounds: bound_pairs(cols, n),
            tolerances: [
                opt.eps_phase0.min(lp_tolerance),
                opt.eps_phase1.min(lp_tolerance),
                lp_tolerance,
            ],
            descent_tolerance: opt.eps_benson_phase1,
            methods: [
                opt.lp_method_phase0,
                opt.lp_method_phase1,
                opt.lp_method_phase2,
            ],
            verbose: opt.lp_message_level >= 1,
            phase: LpPhase::Phase0,
            solved: 0,
        })
    }

    pub fn num_vars(&self) -> usize {
        self.n
    }

    /// Number of LPs solved since initialisation
    pub fn solved(&self) -> usize {
        self.solved
    }

    pub(crate) fn set_phase(&mut self, phase: LpPhase) {
        self.phase = phase;
        log::debug!("LP phase {phase:?} uses method {:?}", self.method());
    }

    pub(crate) fn method(&self) -> LpMethod {
        self.methods[self.phase as usize]
    }

    fn run(&mut self, lp: &LinearProgram) -> Result<LpOutcome, LpError> {
        self.solved += 1;
        lp.solve(LpSettings {
            tolerance: self.tolerances[self.phase as usize],
            verbose: self.verbose,
        })
    }

    /// Image P x of a decision vector under the signed objective matrix
    pub(crate) fn image(&self, x: &[f64]) -> DVector<f64> {
        DVector::from_iterator(self.q, self.objective_rows.iter().map(|r| dot_sparse(r, x)))
    }

    /// Coefficients of w^T P as a dense vector over the decision variables
    fn weighted_objective(&self, w: &DVector<f64>) -> Vec<f64> {
        let mut objective = vec![0.; self.n];
        for (i, row) in self.objective_rows.iter().enumerate() {
            for (j, v) in row {
                objective[*j] += w[i] * v;
            }
        }
        objective
    }

    /// LP over the feasible set with the constraint rows first
    fn feasible_set(&self, extra_vars: usize) -> LinearProgram {
        let mut lp = LinearProgram::new(self.n + extra_vars);
        for (row, (lo, up)) in self.constraint_rows.iter().zip(&self.row_bounds) {
            lp.add_row(row.clone(), *lo, *up);
        }
        for (j, (lo, up)) in self.col_bounds.iter().enumerate() {
            lp.set_bounds(j, *lo, *up);
        }
        lp
    }

    /// Feasible set with every infinite variable bound replaced by one `half_width` away from
    /// the finite bound or from zero
    fn boxed_set(&self, extra_vars: usize, half_width: f64) -> LinearProgram {
        let mut lp = self.feasible_set(extra_vars);
        for (j, (lo, up)) in self.col_bounds.iter().enumerate() {
            let lower = if lo.is_finite() { *lo } else { up.min(0.) - half_width };
            let upper = if up.is_finite() { *up } else { lo.max(0.) + half_width };
            lp.set_bounds(j, lower, upper);
        }
        lp
    }

    /// Decide whether the feasible set is empty
    pub(crate) fn feasibility(&mut self) -> Result<LpOutcome, LpError> {
        let lp = self.feasible_set(0);
        self.run(&lp)
    }

    /// min w^T P x over the feasible set
    pub(crate) fn solve_weighted(&mut self, w: &DVector<f64>) -> Result<LpOutcome, LpError> {
        let mut lp = self.feasible_set(0);
        lp.set_objective(self.weighted_objective(w));
        self.run(&lp)
    }

    /// min w^T P x for a weight `w` expected to give a bounded scalarisation
    ///
    /// Weights on the boundary of the dual parameter set have bounded scalarisations whose
    /// optimal face is unbounded, which the interior point backend reports as unbounded. Such
    /// a report is checked against the recession cone: with no descent direction the LP is
    /// solved again over a boxed feasible set with the weight moved slightly toward
    /// `interior`, and the optimal value for `w` is taken at the point found.
    pub(crate) fn solve_weighted_near(
        &mut self,
        w: &DVector<f64>,
        interior: &DVector<f64>,
    ) -> Result<LpOutcome, LpError> {
        let outcome = self.solve_weighted(w)?;
        if !matches!(outcome, LpOutcome::Unbounded) {
            return Ok(outcome);
        }
        let (direction_box, variable_box, shift) = {
            let config = configuration();
            (config.direction_box, config.variable_box, config.weight_shift)
        };
        match self.recession_min(w, direction_box)? {
            Some((value, _)) if value < -self.descent_tolerance => return Ok(LpOutcome::Unbounded),
            Some(_) => {}
            None => {
                return Err(LpError::Backend(
                    "recession direction LP did not reach an optimum".to_string(),
                ))
            }
        }
        let shifted = w * (1. - shift) + interior * shift;
        let mut lp = self.boxed_set(0, variable_box);
        lp.set_objective(self.weighted_objective(&shifted));
        match self.run(&lp)? {
            LpOutcome::Optimal { x, duals, .. } => {
                let value = dot_dense(&self.weighted_objective(w), &x);
                Ok(LpOutcome::Optimal { x, value, duals })
            }
            other => Err(LpError::Backend(format!(
                "bounded scalarisation ended as {other:?} on a boxed feasible set"
            ))),
        }
    }

    /// min w^T P d over the recession cone of the feasible set intersected with a box
    ///
    /// # Returns
    /// The optimal value and direction, or `None` if the LP could not be solved to optimality
    pub(crate) fn recession_min(
        &mut self,
        w: &DVector<f64>,
        half_width: f64,
    ) -> Result<Option<(f64, Vec<f64>)>, LpError> {
        let mut lp = LinearProgram::new(self.n);
        lp.set_objective(self.weighted_objective(w));
        for (row, (lo, up)) in self.constraint_rows.iter().zip(&self.row_bounds) {
            let lo = if lo.is_finite() { 0. } else { f64::NEG_INFINITY };
            let up = if up.is_finite() { 0. } else { f64::INFINITY };
            if lo.is_finite() || up.is_finite() {
                lp.add_row(row.clone(), lo, up);
            }
        }
        for (j, (lo, up)) in self.col_bounds.iter().enumerate() {
            let lo = if lo.is_finite() { 0. } else { -half_width };
            let up = if up.is_finite() { 0. } else { half_width };
            lp.set_bounds(j, lo, up);
        }
        match self.run(&lp)? {
            LpOutcome::Optimal { x, value, .. } => Ok(Some((value, x))),
            _ => Ok(None),
        }
    }

    /// Distance of `t` to the upper image along the duality direction
    ///
    /// Solves min z s.t. Z^T (t + z c - P x) >= 0, x feasible, where the columns of Z are the
    /// generators `dual_gens` of the dual ordering cone.
    ///
    /// # Returns
    /// `(z, x, w)` with w the dual weight normalised to c^T w = 1, or the non-optimal outcome
    pub(crate) fn solve_p2(
        &mut self,
        t: &DVector<f64>,
        dual_gens: &[DVector<f64>],
        c: &DVector<f64>,
    ) -> Result<Result<(f64, Vec<f64>, DVector<f64>), LpOutcome>, LpError> {
        let lp = self.p2_program(t, dual_gens, c, None);
        let mut outcome = self.run(&lp)?;
        if let LpOutcome::Unbounded = outcome {
            // z is bounded below once the feasible set is, an unbounded report comes from an
            // unbounded optimal face
            let lp = self.p2_program(t, dual_gens, c, Some(configuration().variable_box));
            outcome = self.run(&lp)?;
        }
        let z_var = self.n;
        let first = self.constraint_rows.len();
        match outcome {
            LpOutcome::Optimal { x, duals, .. } => {
                let z = x[z_var];
                let mut w = DVector::zeros(self.q);
                for (k, zeta) in dual_gens.iter().enumerate() {
                    w += zeta * duals[first + k].max(0.);
                }
                let scale = c.dot(&w);
                if scale > 0. {
                    w /= scale;
                }
                Ok(Ok((z, x[..self.n].to_vec(), w)))
            }
            other => Ok(Err(other)),
        }
    }

    /// min z s.t. Z^T (t + z c - P x) >= 0 over the feasible set, boxed when `half_width` is set
    fn p2_program(
        &self,
        t: &DVector<f64>,
        dual_gens: &[DVector<f64>],
        c: &DVector<f64>,
        half_width: Option<f64>,
    ) -> LinearProgram {
        let z_var = self.n;
        let mut lp = match half_width {
            Some(half_width) => self.boxed_set(1, half_width),
            None => self.feasible_set(1),
        };
        let mut objective = vec![0.; self.n + 1];
        objective[z_var] = 1.;
        lp.set_objective(objective);
        for zeta in dual_gens {
            let mut coefs: Vec<(usize, f64)> = self
                .weighted_objective(zeta)
                .into_iter()
                .enumerate()
                .filter(|(_, v)| *v != 0.)
                .map(|(j, v)| (j, -v))
                .collect();
            coefs.push((z_var, zeta.dot(c)));
            lp.add_row(coefs, -zeta.dot(t), f64::INFINITY);
        }
        lp
    }

    /// Optimise a linear functional over the dual parameter set
    ///
    /// The set consists of the weights w with c^T w = 1, w in the dual ordering cone (given by
    /// the generators `primal_gens` of the ordering cone), for which min w^T P x over the
    /// feasible set is bounded. Boundedness is expressed by dual feasibility: P^T w is a
    /// combination of the rows of B and the unit vectors with multipliers whose signs match
    /// the finite bounds.
    pub(crate) fn solve_dual_set(
        &mut self,
        functional: &DVector<f64>,
        primal_gens: &[DVector<f64>],
        c: &DVector<f64>,
    ) -> Result<Result<DVector<f64>, LpOutcome>, LpError> {
        let q = self.q;
        // multiplier variables: (coefficient column list, lower, upper)
        let mut multipliers: Vec<(Vec<(usize, f64)>, f64, f64)> = Vec::new();
        for (i, (lo, up)) in self.row_bounds.iter().enumerate() {
            let col: Vec<(usize, f64)> = self
                .constraint_rows
                .get(i)
                .map(|r| r.iter().map(|(j, v)| (*j, -v)).collect())
                .unwrap_or_default();
            push_multiplier(&mut multipliers, col, *lo, *up);
        }
        for (j, (lo, up)) in self.col_bounds.iter().enumerate() {
            push_multiplier(&mut multipliers, vec![(j, -1.)], *lo, *up);
        }
        let mut lp = LinearProgram::new(q + multipliers.len());
        let mut objective = vec![0.; q + multipliers.len()];
        objective[..q].copy_from_slice(functional.as_slice());
        lp.set_objective(objective);
        for (k, (_, lo, up)) in multipliers.iter().enumerate() {
            lp.set_bounds(q + k, *lo, *up);
        }
        // P^T w - B^T u - v = 0, one row per decision variable
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.n];
        for (i, row) in self.objective_rows.iter().enumerate() {
            for (j, v) in row {
                columns[*j].push((i, *v));
            }
        }
        for (k, (col, _, _)) in multipliers.iter().enumerate() {
            for (j, v) in col {
                columns[*j].push((q + k, *v));
            }
        }
        for coefs in columns {
            lp.add_row(coefs, 0., 0.);
        }
        lp.add_row(c.iter().copied().enumerate().collect(), 1., 1.);
        for y in primal_gens {
            lp.add_row(y.iter().copied().enumerate().collect(), 0., f64::INFINITY);
        }
        match self.run(&lp)? {
            LpOutcome::Optimal { x, .. } => Ok(Ok(DVector::from_column_slice(&x[..q]))),
            other => Ok(Err(other)),
        }
    }
}

/// Add the multipliers of a bound pair: non-negative for a finite lower bound, non-positive
/// for a finite upper bound, free for an equality
fn push_multiplier(
    multipliers: &mut Vec<(Vec<(usize, f64)>, f64, f64)>,
    col: Vec<(usize, f64)>,
    lo: f64,
    up: f64,
) {
    if lo == up {
        multipliers.push((col, f64::NEG_INFINITY, f64::INFINITY));
        return;
    }
    if lo.is_finite() {
        multipliers.push((col.clone(), 0., f64::INFINITY));
    }
    if up.is_finite() {
        multipliers.push((col, f64::NEG_INFINITY, 0.));
    }
}

// endregion

// region Slot table

struct LpSlot {
    lp: Option<WorkingLp>,
    /// LPs solved by the structure last held in this slot
    solved: usize,
}

static SLOTS: LazyLock<Mutex<Vec<LpSlot>>> = LazyLock::new(|| {
    Mutex::new(
        (0..LP_SLOTS)
            .map(|_| LpSlot {
                lp: None,
                solved: 0,
            })
            .collect(),
    )
});

fn with_slots<R>(f: impl FnOnce(&mut Vec<LpSlot>) -> R) -> R {
    let mut slots = SLOTS.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut slots)
}

/// Initialise slot `idx` with the feasible set of `vlp`, replacing what it held
pub fn lp_init(idx: LpIdx, vlp: &VlpRecord, opt: &OptRecord) -> Result<(), LpError> {
    let lp = WorkingLp::from_record(vlp, opt)?;
    with_slots(|slots| {
        let slot = slots.get_mut(idx).ok_or(LpError::InvalidSlot(idx))?;
        slot.lp = Some(lp);
        slot.solved = 0;
        Ok(())
    })
}

/// Free slot `idx`; freeing an empty slot does nothing
pub fn lp_free(idx: LpIdx) {
    with_slots(|slots| {
        if let Some(slot) = slots.get_mut(idx) {
            if let Some(lp) = slot.lp.take() {
                slot.solved = lp.solved();
            }
        }
    })
}

/// Number of LPs solved through slot `idx` since its last initialisation
pub fn lp_get_num(idx: LpIdx) -> usize {
    with_slots(|slots| {
        slots.get(idx).map_or(0, |slot| {
            slot.lp.as_ref().map_or(slot.solved, WorkingLp::solved)
        })
    })
}

/// Run `f` on the working structure in slot `idx`
pub(crate) fn with_lp<R>(idx: LpIdx, f: impl FnOnce(&mut WorkingLp) -> R) -> Result<R, LpError> {
    with_slots(|slots| {
        let slot = slots.get_mut(idx).ok_or(LpError::InvalidSlot(idx))?;
        let lp = slot.lp.as_mut().ok_or(LpError::NotInitialised(idx))?;
        Ok(f(lp))
    })
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionsHandle, SolverOptions};
    use crate::vlp::{ProblemHandle, VlpProblemBuilder};
    use nalgebra::{dmatrix, dvector};

    fn settings() -> LpSettings {
        LpSettings {
            tolerance: 1e-9,
            verbose: false,
        }
    }

    #[test]
    fn small_lp() {
        // min -x - y s.t. x + 2y <= 4, 3x + y <= 6, x, y >= 0
        let mut lp = LinearProgram::new(2);
        lp.set_objective(vec![-1., -1.]);
        lp.add_row(vec![(0, 1.), (1, 2.)], f64::NEG_INFINITY, 4.);
        lp.add_row(vec![(0, 3.), (1, 1.)], f64::NEG_INFINITY, 6.);
        lp.set_bounds(0, 0., f64::INFINITY);
        lp.set_bounds(1, 0., f64::INFINITY);
        match lp.solve(settings()).unwrap() {
            LpOutcome::Optimal { x, value, duals } => {
                assert!((x[0] - 1.6).abs() < 1e-5);
                assert!((x[1] - 1.2).abs() < 1e-5);
                assert!((value + 2.8).abs() < 1e-5);
                // c = sum of multipliers times rows
                assert!((duals[0] + 0.4).abs() < 1e-5);
                assert!((duals[1] + 0.2).abs() < 1e-5);
            }
            other => panic!("Expected an optimal LP, got {other:?}"),
        }
    }

    #[test]
    fn equality_and_lower_rows() {
        // min x s.t. x + y = 2, x - y >= 0
        let mut lp = LinearProgram::new(2);
        lp.set_objective(vec![1., 0.]);
        lp.add_row(vec![(0, 1.), (1, 1.)], 2., 2.);
        lp.add_row(vec![(0, 1.), (1, -1.)], 0., f64::INFINITY);
        match lp.solve(settings()).unwrap() {
            LpOutcome::Optimal { x, duals, .. } => {
                assert!((x[0] - 1.).abs() < 1e-5);
                assert!((duals[0] - 0.5).abs() < 1e-5);
                assert!((duals[1] - 0.5).abs() < 1e-5);
            }
            other => panic!("Expected an optimal LP, got {other:?}"),
        }
    }

    #[test]
    fn infeasible_and_unbounded() {
        let mut lp = LinearProgram::new(1);
        lp.add_row(vec![(0, 1.)], 2., f64::INFINITY);
        lp.add_row(vec![(0, 1.)], f64::NEG_INFINITY, 1.);
        assert!(matches!(lp.solve(settings()).unwrap(), LpOutcome::Infeasible));

        let mut lp = LinearProgram::new(1);
        lp.set_objective(vec![-1.]);
        lp.set_bounds(0, 0., f64::INFINITY);
        assert!(matches!(lp.solve(settings()).unwrap(), LpOutcome::Unbounded));

        let free = LinearProgram::new(2);
        assert!(matches!(free.solve(settings()).unwrap(), LpOutcome::Optimal { .. }));
    }

    /// min (x1 - x2, x1 + x2) s.t. 2 x1 + x2 >= 6, x1 + 2 x2 >= 6, x >= 0
    fn bi_objective() -> WorkingLp {
        let problem = VlpProblemBuilder::default()
            .constraints(dmatrix![2., 1.; 1., 2.])
            .objectives(dmatrix![1., -1.; 1., 1.])
            .row_lower(vec![6., 6.])
            .col_lower(vec![0., 0.])
            .build()
            .unwrap();
        let handle = ProblemHandle::from_problem(&problem).unwrap();
        let options = OptionsHandle::new(&SolverOptions::default());
        WorkingLp::from_record(handle.record().unwrap(), options.record().unwrap()).unwrap()
    }

    #[test]
    fn unbounded_optimal_face() {
        let mut lp = bi_objective();
        // min x1 is attained on the ray x1 = 0, x2 >= 6
        match lp.solve_weighted_near(&dvector![0.5, 0.5], &dvector![0.25, 0.75]).unwrap() {
            LpOutcome::Optimal { x, value, .. } => {
                assert!(value.abs() < 1e-4);
                assert!(x[0].abs() < 1e-4);
                assert!(x[1] > 6. - 1e-4);
            }
            other => panic!("Expected an optimal LP, got {other:?}"),
        }
        // x1 - x2 decreases without bound along x2
        assert!(matches!(
            lp.solve_weighted_near(&dvector![1., 0.], &dvector![0.25, 0.75]).unwrap(),
            LpOutcome::Unbounded
        ));
    }

    #[test]
    fn distance_to_image() {
        let mut lp = bi_objective();
        let units = [dvector![1., 0.], dvector![0., 1.]];
        // Closest image point along (1, 1) is the midpoint (-3, 5) of the efficient edge
        match lp.solve_p2(&dvector![-4., 4.], &units, &dvector![1., 1.]).unwrap() {
            Ok((z, x, w)) => {
                assert!((z - 1.).abs() < 1e-4);
                assert!((lp.image(&x) - dvector![-3., 5.]).amax() < 1e-3);
                assert!((w - dvector![0.25, 0.75]).amax() < 1e-3);
            }
            Err(other) => panic!("Expected an optimal LP, got {other:?}"),
        }
    }

    #[test]
    fn repeated_columns_are_merged() {
        let mut lp = LinearProgram::new(2);
        let k = lp.add_row(vec![(1, 1.), (0, 2.), (1, 1.), (0, -2.)], 0., 1.);
        assert_eq!(lp.rows[k].coefs, vec![(1, 2.)]);
    }

    #[test]
    fn empty_slots() {
        assert!(matches!(
            with_lp(LP_SLOTS, |_| ()),
            Err(LpError::InvalidSlot(_))
        ));
        lp_free(LP_SLOTS);
    }
}
