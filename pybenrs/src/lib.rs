//! Python bindings of benrs
#![allow(non_snake_case)]

use std::path::PathBuf;

use benrs_core::options::{OptionValue, SolverOptions};
use benrs_core::solution::{Image, VlpSolution};
use benrs_core::solve::{solve_handle, HostLock, SolveError};
use benrs_core::vlp::{MatrixData, OptDirection, ProblemHandle, VlpProblem, VlpProblemBuilder};
use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict};

// region Conversion

/// The GIL, released while the solver phases run
struct Gil<'py>(Python<'py>);

impl HostLock for Gil<'_> {
    fn release<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.0.allow_threads(f)
    }
}

fn to_py_err(err: SolveError) -> PyErr {
    match err {
        SolveError::Build(e) => PyValueError::new_err(e.to_string()),
        SolveError::Options(e) => PyValueError::new_err(e.to_string()),
        SolveError::File(e) => PyIOError::new_err(e.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// The object as a numpy array of floats
fn float_array<'py>(obj: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
    obj.py()
        .import("numpy")?
        .call_method1("asarray", (obj, "float64"))
}

/// Dense array, nested sequence or scipy sparse matrix
fn matrix(obj: &Bound<'_, PyAny>) -> PyResult<MatrixData> {
    if obj.hasattr("tocoo")? {
        return sparse_matrix(&obj.call_method0("tocoo")?);
    }
    let array: PyReadonlyArray2<'_, f64> = float_array(obj)?.extract()?;
    let view = array.as_array();
    Ok(MatrixData::Dense(DMatrix::from_fn(
        view.nrows(),
        view.ncols(),
        |i, j| view[[i, j]],
    )))
}

/// Entries of a scipy matrix in coordinate format, duplicates summed
fn sparse_matrix(coo: &Bound<'_, PyAny>) -> PyResult<MatrixData> {
    let (nrows, ncols): (usize, usize) = coo.getattr("shape")?.extract()?;
    let index = |name: &str| -> PyResult<Vec<i64>> {
        let array: PyReadonlyArray1<'_, i64> = coo
            .getattr(name)?
            .call_method1("astype", ("int64",))?
            .extract()?;
        Ok(array.as_array().to_vec())
    };
    let rows = index("row")?;
    let cols = index("col")?;
    let data = vector(&coo.getattr("data")?)?;
    let mut entries = Vec::with_capacity(data.len());
    for ((i, j), v) in rows.iter().zip(&cols).zip(data) {
        match (usize::try_from(*i), usize::try_from(*j)) {
            (Ok(i), Ok(j)) => entries.push((i, j, v)),
            _ => return Err(PyValueError::new_err(format!("negative sparse index ({i}, {j})"))),
        }
    }
    MatrixData::from_entries(nrows, ncols, entries).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn vector(obj: &Bound<'_, PyAny>) -> PyResult<Vec<f64>> {
    let array: PyReadonlyArray1<'_, f64> = float_array(obj)?.extract()?;
    Ok(array.as_array().to_vec())
}

fn numpy_matrix<'py>(py: Python<'py>, m: &DMatrix<f64>) -> Bound<'py, PyArray2<f64>> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)]).into_pyarray(py)
}

fn numpy_vector<'py>(py: Python<'py>, v: &DVector<f64>) -> Bound<'py, PyArray1<f64>> {
    PyArray1::from_slice(py, v.as_slice())
}

/// Options from a Python dictionary, defaults for missing keys
fn options(dict: Option<&Bound<'_, PyDict>>) -> PyResult<SolverOptions> {
    let Some(dict) = dict else {
        return Ok(SolverOptions::default());
    };
    let mut map = IndexMap::new();
    for (key, value) in dict.iter() {
        let key: String = key.extract()?;
        let value = if value.is_instance_of::<PyBool>() {
            OptionValue::Bool(value.extract()?)
        } else if let Ok(i) = value.extract::<i64>() {
            OptionValue::Int(i)
        } else if let Ok(f) = value.extract::<f64>() {
            OptionValue::Float(f)
        } else {
            OptionValue::Text(value.extract()?)
        };
        map.insert(key, value);
    }
    SolverOptions::from_map(&map).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[allow(clippy::too_many_arguments)]
fn problem(
    B: &Bound<'_, PyAny>,
    P: &Bound<'_, PyAny>,
    a: Option<&Bound<'_, PyAny>>,
    b: Option<&Bound<'_, PyAny>>,
    l: Option<&Bound<'_, PyAny>>,
    s: Option<&Bound<'_, PyAny>>,
    Y: Option<&Bound<'_, PyAny>>,
    Z: Option<&Bound<'_, PyAny>>,
    c: Option<&Bound<'_, PyAny>>,
    opt_dir: i32,
) -> PyResult<VlpProblem> {
    let direction = OptDirection::from_code(opt_dir)
        .ok_or_else(|| PyValueError::new_err("opt_dir must be 1 (minimize) or -1 (maximize)"))?;
    let mut builder = VlpProblemBuilder::default();
    builder
        .constraints(matrix(B)?)
        .objectives(matrix(P)?)
        .direction(direction);
    if let Some(a) = a {
        builder.row_lower(vector(a)?);
    }
    if let Some(b) = b {
        builder.row_upper(vector(b)?);
    }
    if let Some(l) = l {
        builder.col_lower(vector(l)?);
    }
    if let Some(s) = s {
        builder.col_upper(vector(s)?);
    }
    if let Some(Y) = Y {
        builder.primal_generators(matrix(Y)?);
    }
    if let Some(Z) = Z {
        builder.dual_generators(matrix(Z)?);
    }
    if let Some(c) = c {
        builder.duality(vector(c)?);
    }
    builder
        .build()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

// endregion

// region Classes

/// Problem built into solver records
#[pyclass(name = "_cVlpProblem")]
struct PyVlpProblem {
    inner: ProblemHandle,
}

#[pymethods]
impl PyVlpProblem {
    #[new]
    fn new() -> Self {
        PyVlpProblem {
            inner: ProblemHandle::new(),
        }
    }

    /// Build the records from arrays or scipy sparse matrices, replacing a previous build
    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (B, P, a=None, b=None, l=None, s=None, Y=None, Z=None, c=None, opt_dir=1))]
    fn from_arrays(
        &mut self,
        B: Bound<'_, PyAny>,
        P: Bound<'_, PyAny>,
        a: Option<Bound<'_, PyAny>>,
        b: Option<Bound<'_, PyAny>>,
        l: Option<Bound<'_, PyAny>>,
        s: Option<Bound<'_, PyAny>>,
        Y: Option<Bound<'_, PyAny>>,
        Z: Option<Bound<'_, PyAny>>,
        c: Option<Bound<'_, PyAny>>,
        opt_dir: i32,
    ) -> PyResult<()> {
        let problem = problem(
            &B,
            &P,
            a.as_ref(),
            b.as_ref(),
            l.as_ref(),
            s.as_ref(),
            Y.as_ref(),
            Z.as_ref(),
            c.as_ref(),
            opt_dir,
        )?;
        self.inner
            .build(&problem)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[staticmethod]
    fn from_file(path: PathBuf) -> PyResult<Self> {
        let inner = ProblemHandle::from_file(path).map_err(|e| to_py_err(e.into()))?;
        Ok(PyVlpProblem { inner })
    }

    fn to_file(&self, path: PathBuf) -> PyResult<()> {
        self.inner.to_file(path).map_err(|e| to_py_err(e.into()))
    }

    /// Solve the built problem
    #[pyo3(signature = (options=None))]
    fn solve(&self, py: Python<'_>, options: Option<&Bound<'_, PyDict>>) -> PyResult<PyVlpSolution> {
        let options = crate::options(options)?;
        let inner = solve_handle(&self.inner, &options, &Gil(py)).map_err(to_py_err)?;
        Ok(PyVlpSolution { inner })
    }

    fn release(&mut self) {
        self.inner.release();
    }

    #[getter]
    fn m(&self) -> usize {
        self.inner.m()
    }

    #[getter]
    fn n(&self) -> usize {
        self.inner.n()
    }

    #[getter]
    fn q(&self) -> usize {
        self.inner.q()
    }

    #[getter]
    fn nz(&self) -> usize {
        self.inner.nz()
    }

    #[getter]
    fn nzobj(&self) -> usize {
        self.inner.nzobj()
    }

    /// 1 for minimisation, -1 for maximisation
    #[getter]
    fn optdir(&self) -> i32 {
        self.inner.optdir().code()
    }

    #[getter]
    fn constraint_matrix<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.constraint_matrix().map(|m| numpy_matrix(py, &m))
    }

    #[getter]
    fn objective_matrix<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.objective_matrix().map(|m| numpy_matrix(py, &m))
    }
}

/// Problem data kept as plain attributes until it is written or solved
#[pyclass(name = "vlpProblem")]
struct PyProblemData {
    B: Option<PyObject>,
    a: Option<PyObject>,
    b: Option<PyObject>,
    l: Option<PyObject>,
    s: Option<PyObject>,
    P: Option<PyObject>,
    Y: Option<PyObject>,
    Z: Option<PyObject>,
    c: Option<PyObject>,
    opt_dir: i32,
}

impl PyProblemData {
    fn problem(&self, py: Python<'_>) -> PyResult<VlpProblem> {
        let bind = |o: &Option<PyObject>| o.as_ref().map(|o| o.bind(py).clone());
        let B = bind(&self.B).ok_or_else(|| PyRuntimeError::new_err("coefficient matrix B must be given"))?;
        let P = bind(&self.P).ok_or_else(|| PyRuntimeError::new_err("coefficient matrix P must be given"))?;
        problem(
            &B,
            &P,
            bind(&self.a).as_ref(),
            bind(&self.b).as_ref(),
            bind(&self.l).as_ref(),
            bind(&self.s).as_ref(),
            bind(&self.Y).as_ref(),
            bind(&self.Z).as_ref(),
            bind(&self.c).as_ref(),
            self.opt_dir,
        )
    }
}

fn clone_attr(py: Python<'_>, attr: &Option<PyObject>) -> Option<PyObject> {
    attr.as_ref().map(|o| o.clone_ref(py))
}

#[pymethods]
impl PyProblemData {
    #[new]
    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (B=None, a=None, b=None, l=None, s=None, P=None, Y=None, Z=None, c=None, opt_dir=1))]
    fn new(
        B: Option<PyObject>,
        a: Option<PyObject>,
        b: Option<PyObject>,
        l: Option<PyObject>,
        s: Option<PyObject>,
        P: Option<PyObject>,
        Y: Option<PyObject>,
        Z: Option<PyObject>,
        c: Option<PyObject>,
        opt_dir: i32,
    ) -> Self {
        PyProblemData {
            B,
            a,
            b,
            l,
            s,
            P,
            Y,
            Z,
            c,
            opt_dir,
        }
    }

    /// Write the problem in the vlp format
    fn to_file(&self, py: Python<'_>, filename: PathBuf) -> PyResult<()> {
        let handle = ProblemHandle::from_problem(&self.problem(py)?).map_err(|e| to_py_err(e.into()))?;
        handle.to_file(filename).map_err(|e| to_py_err(e.into()))
    }

    #[getter]
    fn B(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.B)
    }

    #[setter]
    fn set_B(&mut self, value: Option<PyObject>) {
        self.B = value;
    }

    #[getter]
    fn a(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.a)
    }

    #[setter]
    fn set_a(&mut self, value: Option<PyObject>) {
        self.a = value;
    }

    #[getter]
    fn b(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.b)
    }

    #[setter]
    fn set_b(&mut self, value: Option<PyObject>) {
        self.b = value;
    }

    #[getter]
    fn l(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.l)
    }

    #[setter]
    fn set_l(&mut self, value: Option<PyObject>) {
        self.l = value;
    }

    #[getter]
    fn s(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.s)
    }

    #[setter]
    fn set_s(&mut self, value: Option<PyObject>) {
        self.s = value;
    }

    #[getter]
    fn P(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.P)
    }

    #[setter]
    fn set_P(&mut self, value: Option<PyObject>) {
        self.P = value;
    }

    #[getter]
    fn Y(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.Y)
    }

    #[setter]
    fn set_Y(&mut self, value: Option<PyObject>) {
        self.Y = value;
    }

    #[getter]
    fn Z(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.Z)
    }

    #[setter]
    fn set_Z(&mut self, value: Option<PyObject>) {
        self.Z = value;
    }

    #[getter]
    fn c(&self, py: Python<'_>) -> Option<PyObject> {
        clone_attr(py, &self.c)
    }

    #[setter]
    fn set_c(&mut self, value: Option<PyObject>) {
        self.c = value;
    }

    #[getter]
    fn opt_dir(&self) -> i32 {
        self.opt_dir
    }

    #[setter]
    fn set_opt_dir(&mut self, value: i32) {
        self.opt_dir = value;
    }
}

/// Upper or lower image of a solution
#[pyclass(name = "Image")]
struct PyImage {
    inner: Image,
}

#[pymethods]
impl PyImage {
    #[getter]
    fn vertex_value<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        numpy_matrix(py, &self.inner.vertex_value)
    }

    /// 1 for a vertex, 0 for an extreme direction
    #[getter]
    fn vertex_type(&self) -> Vec<u8> {
        self.inner.vertex_type.iter().map(|k| *k as u8).collect()
    }

    #[getter]
    fn adjacency(&self) -> Vec<Vec<usize>> {
        self.inner.adjacency.clone()
    }

    #[getter]
    fn incidence(&self) -> Vec<Vec<usize>> {
        self.inner.incidence.clone()
    }

    #[getter]
    fn preimage<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        numpy_matrix(py, &self.inner.preimage)
    }

    fn __len__(&self) -> usize {
        self.inner.vertex_type.len()
    }
}

#[pyclass(name = "vlpSolution")]
struct PyVlpSolution {
    inner: VlpSolution,
}

#[pymethods]
impl PyVlpSolution {
    #[getter]
    fn status(&self) -> &'static str {
        self.inner.status.as_str()
    }

    #[getter]
    fn m(&self) -> usize {
        self.inner.m
    }

    #[getter]
    fn n(&self) -> usize {
        self.inner.n
    }

    #[getter]
    fn q(&self) -> usize {
        self.inner.q
    }

    #[getter]
    fn o(&self) -> usize {
        self.inner.o
    }

    #[getter]
    fn p(&self) -> usize {
        self.inner.p
    }

    #[getter]
    fn r(&self) -> usize {
        self.inner.r
    }

    #[getter]
    fn h(&self) -> usize {
        self.inner.h
    }

    #[getter]
    fn eta<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<f64>>> {
        self.inner.eta.as_ref().map(|v| numpy_vector(py, v))
    }

    #[getter]
    fn Y<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.y.as_ref().map(|m| numpy_matrix(py, m))
    }

    #[getter]
    fn Z<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.z.as_ref().map(|m| numpy_matrix(py, m))
    }

    #[getter]
    fn c<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<f64>>> {
        self.inner.c.as_ref().map(|v| numpy_vector(py, v))
    }

    #[getter]
    fn c_vector<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<f64>>> {
        self.inner.c_vector().map(|v| numpy_vector(py, v))
    }

    #[getter]
    fn R<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.r_gen.as_ref().map(|m| numpy_matrix(py, m))
    }

    #[getter]
    fn H<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray2<f64>>> {
        self.inner.h_gen.as_ref().map(|m| numpy_matrix(py, m))
    }

    #[getter]
    fn num_vertices_upper(&self) -> usize {
        self.inner.num_vertices_upper
    }

    #[getter]
    fn num_directions_upper(&self) -> usize {
        self.inner.num_directions_upper
    }

    #[getter]
    fn num_vertices_lower(&self) -> usize {
        self.inner.num_vertices_lower
    }

    #[getter]
    fn num_directions_lower(&self) -> usize {
        self.inner.num_directions_lower
    }

    #[getter]
    fn Primal(&self) -> Option<PyImage> {
        self.inner.primal.clone().map(|inner| PyImage { inner })
    }

    #[getter]
    fn Dual(&self) -> Option<PyImage> {
        self.inner.dual.clone().map(|inner| PyImage { inner })
    }

    #[getter]
    fn lp_count(&self) -> usize {
        self.inner.lp_count
    }

    #[getter]
    fn elapsed_ms(&self) -> f64 {
        self.inner.elapsed.as_secs_f64() * 1e3
    }

    /// JSON summary of the solution
    fn summary(&self) -> String {
        self.inner.summary_json().to_string()
    }

    fn __repr__(&self) -> String {
        format!(
            "vlpSolution(status={}, vertices_upper={}, vertices_lower={})",
            self.inner.status, self.inner.num_vertices_upper, self.inner.num_vertices_lower
        )
    }
}

// endregion

// region Functions

/// Solve a problem held by a `vlpProblem`
#[pyfunction]
#[pyo3(signature = (problem, options=None))]
fn solve(
    py: Python<'_>,
    problem: PyRef<'_, PyProblemData>,
    options: Option<&Bound<'_, PyDict>>,
) -> PyResult<PyVlpSolution> {
    let problem = problem.problem(py)?;
    let options = crate::options(options)?;
    let handle = ProblemHandle::from_problem(&problem).map_err(|e| to_py_err(e.into()))?;
    let inner = solve_handle(&handle, &options, &Gil(py)).map_err(to_py_err)?;
    log::debug!("solve returned status {}", inner.status);
    Ok(PyVlpSolution { inner })
}

/// Solve a problem given as arrays or scipy sparse matrices
#[allow(clippy::too_many_arguments)]
#[pyfunction]
#[pyo3(signature = (B, P, a=None, b=None, l=None, s=None, Y=None, Z=None, c=None, opt_dir=1, options=None))]
fn solve_direct(
    py: Python<'_>,
    B: Bound<'_, PyAny>,
    P: Bound<'_, PyAny>,
    a: Option<Bound<'_, PyAny>>,
    b: Option<Bound<'_, PyAny>>,
    l: Option<Bound<'_, PyAny>>,
    s: Option<Bound<'_, PyAny>>,
    Y: Option<Bound<'_, PyAny>>,
    Z: Option<Bound<'_, PyAny>>,
    c: Option<Bound<'_, PyAny>>,
    opt_dir: i32,
    options: Option<&Bound<'_, PyDict>>,
) -> PyResult<PyVlpSolution> {
    let problem = problem(
        &B,
        &P,
        a.as_ref(),
        b.as_ref(),
        l.as_ref(),
        s.as_ref(),
        Y.as_ref(),
        Z.as_ref(),
        c.as_ref(),
        opt_dir,
    )?;
    let options = crate::options(options)?;
    let handle = ProblemHandle::from_problem(&problem).map_err(|e| to_py_err(e.into()))?;
    let inner = solve_handle(&handle, &options, &Gil(py)).map_err(to_py_err)?;
    Ok(PyVlpSolution { inner })
}

/// Solve a problem read from a vlp file
#[pyfunction]
#[pyo3(signature = (path, options=None))]
fn solve_legacy(py: Python<'_>, path: PathBuf, options: Option<&Bound<'_, PyDict>>) -> PyResult<PyVlpSolution> {
    let options = crate::options(options)?;
    let handle = ProblemHandle::from_file(path).map_err(|e| to_py_err(e.into()))?;
    let inner = solve_handle(&handle, &options, &Gil(py)).map_err(to_py_err)?;
    Ok(PyVlpSolution { inner })
}

/// Default options as a dictionary
#[pyfunction]
fn default_options(py: Python<'_>) -> PyResult<Bound<'_, PyDict>> {
    let dict = PyDict::new(py);
    if let serde_json::Value::Object(entries) = SolverOptions::default().to_json() {
        for (key, value) in entries {
            match value {
                serde_json::Value::Bool(b) => dict.set_item(key, b)?,
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => dict.set_item(key, i)?,
                    None => dict.set_item(key, n.as_f64())?,
                },
                serde_json::Value::String(s) => dict.set_item(key, s)?,
                _ => {}
            }
        }
    }
    Ok(dict)
}

// endregion

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(solve, m)?)?;
    m.add_function(wrap_pyfunction!(solve_direct, m)?)?;
    m.add_function(wrap_pyfunction!(solve_legacy, m)?)?;
    m.add_function(wrap_pyfunction!(default_options, m)?)?;
    m.add_class::<PyVlpProblem>()?;
    m.add_class::<PyProblemData>()?;
    m.add_class::<PyVlpSolution>()?;
    m.add_class::<PyImage>()?;
    Ok(())
}
