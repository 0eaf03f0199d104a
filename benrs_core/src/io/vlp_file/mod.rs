//! Reading and writing problems in the vlp text format
//!
//! A file starts with the problem line
//! ```text
//! p vlp min|max m n nz q nzobj [cone|dualcone k nzk]
//! ```
//! followed by entry lines `a i j v` (constraint matrix), `o i j v` (objective matrix) and
//! `k i j v` (cone generators, `k i 0 v` for the duality parameter), and bound lines
//! `i`/`j` (rows/columns) of kind `f`, `l v`, `u v`, `d lo up` or `s v`. Indices are
//! 1-based, rows and columns without a bound line are free, lines starting with `c` are
//! comments and `e` ends the file.
use std::fs;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::native::records::VlpRecord;
use crate::vlp::{BuildError, VlpProblem};

mod parser;
mod writer;

pub use parser::VlpParser;
pub use writer::write_record;

#[derive(Error, Debug)]
pub enum VlpFileError {
    #[error("failed to access vlp file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("found {found} {which} entries, the problem line declares {expected}")]
    CountMismatch {
        which: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("problem has not been built")]
    EmptyProblem,
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Read a problem from a vlp file
pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<VlpProblem, VlpFileError> {
    let text = fs::read_to_string(path)?;
    parse_problem(&text)
}

/// Parse a problem from vlp text
///
/// # Examples
/// ```rust
/// use benrs_core::io::vlp_file::parse_problem;
///
/// let text = "p vlp min 1 2 2 2 2\n\
///             a 1 1 1\n\
///             a 1 2 1\n\
///             o 1 1 1\n\
///             o 2 2 1\n\
///             i 1 l 1\n\
///             e\n";
/// let problem = parse_problem(text).unwrap();
/// assert_eq!(problem.constraints.nrows(), 1);
/// assert_eq!(problem.row_lower, Some(vec![1.]));
/// ```
pub fn parse_problem(text: &str) -> Result<VlpProblem, VlpFileError> {
    VlpParser::new().parse(text)
}

/// Write a problem record to a vlp file
pub(crate) fn write_file<P: AsRef<Path>>(record: &VlpRecord, path: P) -> Result<(), VlpFileError> {
    let mut out = std::io::BufWriter::new(fs::File::create(path)?);
    write_record(record, &mut out)?;
    out.flush()?;
    Ok(())
}
