//! Solution status, the solution record handle and extraction into host containers
use std::fmt::{Display, Formatter};
use std::time::Duration;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use thiserror::Error;

use crate::native::records::{ImageRecord, SolRecord};
use crate::native::{Handle, NativeBuffer};
use crate::solve::SolveTrace;

/// Outcome of a solve
#[derive(Serialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    /// No phase has decided the problem yet
    #[default]
    NoStatus,
    /// The feasible set is empty
    Infeasible,
    /// No weighted sum scalarisation is bounded, or a scalarisation was found unbounded
    Unbounded,
    /// The upper image has no vertex
    NoVertex,
    /// Upper and lower images were computed
    Optimal,
    /// The ordering cone or duality parameter was rejected
    InputError,
}

impl SolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionStatus::NoStatus => "no_status",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::Unbounded => "unbounded",
            SolutionStatus::NoVertex => "no_vertex",
            SolutionStatus::Optimal => "optimal",
            SolutionStatus::InputError => "input_error",
        }
    }
}

impl Display for SolutionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an image point is a vertex or an extreme direction
#[derive(Serialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum VertexKind {
    Direction = 0,
    Vertex = 1,
}

/// Owns the solution record written by a solve
#[derive(Debug, Default)]
pub struct SolutionHandle {
    inner: Handle<SolRecord>,
}

impl SolutionHandle {
    pub fn new() -> Self {
        SolutionHandle {
            inner: Handle::new(),
        }
    }

    pub(crate) fn record(&self) -> Option<&SolRecord> {
        self.inner.get()
    }

    /// Empty record, allocated if it was released
    pub(crate) fn reset(&mut self) -> &mut SolRecord {
        self.inner.free_members();
        self.inner.get_or_init()
    }

    pub fn release(&mut self) {
        self.inner.release();
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("solution record has been released")]
    Released,
    #[error("solution member {member} holds {found} values, expected {expected}")]
    SizeMismatch {
        member: &'static str,
        found: usize,
        expected: usize,
    },
}

/// Vertices and extreme directions of an image
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// One point per row, vertices first
    pub vertex_value: DMatrix<f64>,
    pub vertex_type: Vec<VertexKind>,
    /// Adjacency lists of the points; not computed, always empty
    pub adjacency: Vec<Vec<usize>>,
    /// Incidence lists of the points; not computed, always empty
    pub incidence: Vec<Vec<usize>>,
    /// Decision vector attaining each vertex, one per row; empty for the lower image
    pub preimage: DMatrix<f64>,
}

impl Image {
    pub fn num_vertices(&self) -> usize {
        self.vertex_type
            .iter()
            .filter(|k| **k == VertexKind::Vertex)
            .count()
    }

    pub fn num_directions(&self) -> usize {
        self.vertex_type.len() - self.num_vertices()
    }

    /// Vertices as vectors
    pub fn vertices(&self) -> Vec<DVector<f64>> {
        self.points(VertexKind::Vertex)
    }

    /// Extreme directions as vectors
    pub fn directions(&self) -> Vec<DVector<f64>> {
        self.points(VertexKind::Direction)
    }

    fn points(&self, kind: VertexKind) -> Vec<DVector<f64>> {
        self.vertex_type
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == kind)
            .map(|(i, _)| self.vertex_value.row(i).transpose())
            .collect()
    }
}

/// Solution of a vector linear program in host containers
#[derive(Debug, Clone)]
pub struct VlpSolution {
    pub status: SolutionStatus,
    pub m: usize,
    pub n: usize,
    pub q: usize,
    pub o: usize,
    pub p: usize,
    pub r: usize,
    pub h: usize,
    /// Interior point of the dual parameter set
    pub eta: Option<DVector<f64>>,
    /// Generators of the ordering cone, q x o
    pub y: Option<DMatrix<f64>>,
    /// Generators of the dual ordering cone, q x p
    pub z: Option<DMatrix<f64>>,
    /// Duality parameter, last entry 1
    pub c: Option<DVector<f64>>,
    /// Extreme directions of the upper image, q x r
    pub r_gen: Option<DMatrix<f64>>,
    /// Vertices of the dual parameter set, q x h
    pub h_gen: Option<DMatrix<f64>>,
    pub num_vertices_upper: usize,
    pub num_directions_upper: usize,
    pub num_vertices_lower: usize,
    pub num_directions_lower: usize,
    /// Upper image
    pub primal: Option<Image>,
    /// Lower image
    pub dual: Option<Image>,
    /// Number of LPs solved
    pub lp_count: usize,
    pub elapsed: Duration,
}

fn vector(buffer: &Option<NativeBuffer<f64>>, len: usize, member: &'static str) -> Result<Option<DVector<f64>>, ExtractError> {
    match buffer {
        None => Ok(None),
        Some(b) if b.len() == len => Ok(Some(DVector::from_column_slice(b))),
        Some(b) => Err(ExtractError::SizeMismatch {
            member,
            found: b.len(),
            expected: len,
        }),
    }
}

fn matrix(
    buffer: &Option<NativeBuffer<f64>>,
    rows: usize,
    cols: usize,
    member: &'static str,
) -> Result<Option<DMatrix<f64>>, ExtractError> {
    match buffer {
        None => Ok(None),
        Some(b) if b.len() == rows * cols => Ok(Some(DMatrix::from_column_slice(rows, cols, b))),
        Some(b) => Err(ExtractError::SizeMismatch {
            member,
            found: b.len(),
            expected: rows * cols,
        }),
    }
}

fn image(record: &ImageRecord, n: usize, member: &'static str) -> Result<Image, ExtractError> {
    let count = record.len();
    if record.values.len() != record.dim * count {
        return Err(ExtractError::SizeMismatch {
            member,
            found: record.values.len(),
            expected: record.dim * count,
        });
    }
    let values = DMatrix::from_column_slice(record.dim, count, &record.values);
    let vertices = record
        .types
        .iter()
        .filter(|k| **k == VertexKind::Vertex)
        .count();
    let preimage = match &record.preimage {
        Some(p) if p.len() == n * vertices => DMatrix::from_column_slice(n, vertices, p).transpose(),
        Some(p) => {
            return Err(ExtractError::SizeMismatch {
                member: "preimage",
                found: p.len(),
                expected: n * vertices,
            })
        }
        None => DMatrix::zeros(0, n),
    };
    Ok(Image {
        vertex_value: values.transpose(),
        vertex_type: record.types.to_vec(),
        adjacency: Vec::new(),
        incidence: Vec::new(),
        preimage,
    })
}

impl VlpSolution {
    /// Copy the solution record into host containers
    ///
    /// Members that were not computed for the reached status are `None`.
    pub fn extract(handle: &SolutionHandle, trace: &SolveTrace) -> Result<VlpSolution, ExtractError> {
        let sol = handle.record().ok_or(ExtractError::Released)?;
        let q = sol.q;
        Ok(VlpSolution {
            status: sol.status,
            m: sol.m,
            n: sol.n,
            q,
            o: sol.o,
            p: sol.p,
            r: sol.r,
            h: sol.h,
            eta: vector(&sol.eta, q, "eta")?,
            y: matrix(&sol.y_gen, q, sol.o, "Y")?,
            z: matrix(&sol.z_gen, q, sol.p, "Z")?,
            c: vector(&sol.c, q, "c")?,
            r_gen: matrix(&sol.r_gen, q, sol.r, "R")?,
            h_gen: matrix(&sol.h_gen, q, sol.h, "H")?,
            num_vertices_upper: sol.pp,
            num_directions_upper: sol.pp_dir,
            num_vertices_lower: sol.dd,
            num_directions_lower: sol.dd_dir,
            primal: sol.upper.as_ref().map(|u| image(u, sol.n, "upper image")).transpose()?,
            dual: sol.lower.as_ref().map(|l| image(l, sol.n, "lower image")).transpose()?,
            lp_count: trace.lp_count,
            elapsed: trace.elapsed,
        })
    }

    /// Alias of the duality parameter
    pub fn c_vector(&self) -> Option<&DVector<f64>> {
        self.c.as_ref()
    }

    /// Compact JSON summary: status, dimensions, counts and eta
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "m": self.m,
            "n": self.n,
            "q": self.q,
            "num_vertices_upper": self.num_vertices_upper,
            "num_directions_upper": self.num_directions_upper,
            "num_vertices_lower": self.num_vertices_lower,
            "num_directions_lower": self.num_directions_lower,
            "eta": self.eta.as_ref().map(|e| e.as_slice().to_vec()),
            "lp_count": self.lp_count,
            "elapsed_ms": self.elapsed.as_millis() as u64,
        })
    }
}
