use nalgebra::DMatrix;

use super::VlpFileError;
use crate::vlp::bounds::BoundKind;
use crate::vlp::{MatrixData, OptDirection, VlpProblem};

/// Which cone the generator entries describe
#[derive(Copy, Clone, Debug, PartialEq)]
enum ConeLine {
    Primal,
    Dual,
}

/// Contents of the problem line
#[derive(Copy, Clone, Debug)]
struct Header {
    direction: OptDirection,
    m: usize,
    n: usize,
    nz: usize,
    q: usize,
    nzobj: usize,
    /// Cone kind, number of generators and number of generator entries
    cone: Option<(ConeLine, usize, usize)>,
}

/// Line oriented parser of the vlp text format
#[derive(Debug, Default)]
pub struct VlpParser {
    header: Option<Header>,
    /// 1-based number of the line being parsed
    line: usize,
    constraints: Vec<(usize, usize, f64)>,
    objectives: Vec<(usize, usize, f64)>,
    generators: Vec<(usize, usize, f64)>,
    duality: Vec<(usize, f64)>,
    rows: Vec<(usize, f64, f64)>,
    cols: Vec<(usize, f64, f64)>,
    finished: bool,
}

impl VlpParser {
    pub fn new() -> VlpParser {
        VlpParser::default()
    }

    // region Parsing Functions

    /// Parse `text` into a problem
    pub fn parse(mut self, text: &str) -> Result<VlpProblem, VlpFileError> {
        for (number, line) in text.lines().enumerate() {
            if self.finished {
                break;
            }
            self.line = number + 1;
            self.parse_line(line)?;
        }
        self.finish()
    }

    fn parse_line(&mut self, line: &str) -> Result<(), VlpFileError> {
        let mut fields = line.split_whitespace();
        let Some(tag) = fields.next() else {
            return Ok(());
        };
        let fields: Vec<&str> = fields.collect();
        if tag == "p" {
            return self.problem_line(&fields);
        }
        if matches!(tag, "c" | "e") {
            self.finished = tag == "e";
            return Ok(());
        }
        let header = self
            .header
            .ok_or_else(|| self.error("entry before the problem line"))?;
        match tag {
            "a" => {
                let entry = self.entry(&fields, header.m, header.n)?;
                self.constraints.push(entry);
            }
            "o" => {
                let entry = self.entry(&fields, header.q, header.n)?;
                self.objectives.push(entry);
            }
            "k" => self.cone_entry(&fields, &header)?,
            "i" => {
                let bound = self.bound(&fields, header.m)?;
                self.rows.push(bound);
            }
            "j" => {
                let bound = self.bound(&fields, header.n)?;
                self.cols.push(bound);
            }
            other => return Err(self.error(format!("unknown line type '{other}'"))),
        }
        Ok(())
    }

    fn problem_line(&mut self, fields: &[&str]) -> Result<(), VlpFileError> {
        if self.header.is_some() {
            return Err(self.error("second problem line"));
        }
        if fields.first() != Some(&"vlp") {
            return Err(self.error("problem line must start with 'p vlp'"));
        }
        let direction = match fields.get(1) {
            Some(&"min") => OptDirection::Minimize,
            Some(&"max") => OptDirection::Maximize,
            _ => return Err(self.error("optimisation direction must be 'min' or 'max'")),
        };
        let cone = match fields.get(7) {
            None => None,
            Some(&"cone") => Some((ConeLine::Primal, self.count(fields, 8)?, self.count(fields, 9)?)),
            Some(&"dualcone") => Some((ConeLine::Dual, self.count(fields, 8)?, self.count(fields, 9)?)),
            Some(other) => return Err(self.error(format!("unknown cone type '{other}'"))),
        };
        self.header = Some(Header {
            direction,
            m: self.count(fields, 2)?,
            n: self.count(fields, 3)?,
            nz: self.count(fields, 4)?,
            q: self.count(fields, 5)?,
            nzobj: self.count(fields, 6)?,
            cone,
        });
        Ok(())
    }

    /// Entry `i j v` of a matrix with the given dimensions
    fn entry(&self, fields: &[&str], rows: usize, cols: usize) -> Result<(usize, usize, f64), VlpFileError> {
        if fields.len() < 3 {
            return Err(self.error("entry needs a row, a column and a value"));
        }
        Ok((
            self.index(fields[0], rows)?,
            self.index(fields[1], cols)?,
            self.number(fields[2])?,
        ))
    }

    fn cone_entry(&mut self, fields: &[&str], header: &Header) -> Result<(), VlpFileError> {
        if fields.get(1) == Some(&"0") {
            let index = self.index(fields[0], header.q)?;
            let value = self.number(fields.get(2).copied().unwrap_or_default())?;
            self.duality.push((index, value));
            return Ok(());
        }
        let Some((_, k, _)) = header.cone else {
            return Err(self.error("cone entry without a cone on the problem line"));
        };
        let entry = self.entry(fields, header.q, k)?;
        self.generators.push(entry);
        Ok(())
    }

    /// Bound line `index kind [values]`, returned as `(index, lower, upper)`
    fn bound(&self, fields: &[&str], len: usize) -> Result<(usize, f64, f64), VlpFileError> {
        let index = self.index(fields.first().copied().unwrap_or_default(), len)?;
        let kind = fields
            .get(1)
            .and_then(|code| code.chars().next())
            .and_then(BoundKind::from_code)
            .ok_or_else(|| self.error("bound kind must be one of f, l, u, d, s"))?;
        let value = |i: usize| match fields.get(2 + i) {
            Some(field) => self.number(field),
            None => Err(self.error(format!("bound of kind '{}' is missing a value", kind.code()))),
        };
        Ok(match kind {
            BoundKind::Free => (index, f64::NEG_INFINITY, f64::INFINITY),
            BoundKind::Lower => (index, value(0)?, f64::INFINITY),
            BoundKind::Upper => (index, f64::NEG_INFINITY, value(0)?),
            BoundKind::Double => (index, value(0)?, value(1)?),
            BoundKind::Fixed => {
                let v = value(0)?;
                (index, v, v)
            }
        })
    }

    // endregion

    // region Helper Functions

    fn error(&self, reason: impl Into<String>) -> VlpFileError {
        VlpFileError::Parse {
            line: self.line,
            reason: reason.into(),
        }
    }

    /// Non-negative integer at position `at` of the problem line
    fn count(&self, fields: &[&str], at: usize) -> Result<usize, VlpFileError> {
        fields
            .get(at)
            .and_then(|f| f.parse::<usize>().ok())
            .ok_or_else(|| self.error(format!("problem line field {} must be a count", at + 2)))
    }

    /// 1-based index no larger than `len`, returned 0-based
    fn index(&self, field: &str, len: usize) -> Result<usize, VlpFileError> {
        match field.parse::<usize>() {
            Ok(i) if i >= 1 && i <= len => Ok(i - 1),
            _ => Err(self.error(format!("index '{field}' outside 1..={len}"))),
        }
    }

    fn number(&self, field: &str) -> Result<f64, VlpFileError> {
        field
            .parse::<f64>()
            .map_err(|_| self.error(format!("'{field}' is not a number")))
    }

    // endregion

    fn finish(self) -> Result<VlpProblem, VlpFileError> {
        let header = self.header.ok_or(VlpFileError::Parse {
            line: self.line,
            reason: "missing problem line".to_string(),
        })?;
        check_count("constraint", self.constraints.len(), header.nz)?;
        check_count("objective", self.objectives.len(), header.nzobj)?;

        let (primal_generators, dual_generators) = match header.cone {
            Some((kind, k, nzk)) => {
                check_count("cone", self.generators.len(), nzk)?;
                let generators = MatrixData::Dense(dense(header.q, k, &self.generators));
                match kind {
                    ConeLine::Primal => (Some(generators), None),
                    ConeLine::Dual => (None, Some(generators)),
                }
            }
            None => (None, None),
        };
        let duality = (!self.duality.is_empty()).then(|| {
            let mut c = vec![0.; header.q];
            for &(i, v) in &self.duality {
                c[i] = v;
            }
            c
        });
        let (row_lower, row_upper) = bound_vectors(header.m, &self.rows);
        let (col_lower, col_upper) = bound_vectors(header.n, &self.cols);

        Ok(VlpProblem {
            constraints: MatrixData::Dense(dense(header.m, header.n, &self.constraints)),
            objectives: MatrixData::Dense(dense(header.q, header.n, &self.objectives)),
            row_lower: Some(row_lower),
            row_upper: Some(row_upper),
            col_lower: Some(col_lower),
            col_upper: Some(col_upper),
            primal_generators,
            dual_generators,
            duality,
            direction: header.direction,
        })
    }
}

fn check_count(which: &'static str, found: usize, expected: usize) -> Result<(), VlpFileError> {
    if found != expected {
        return Err(VlpFileError::CountMismatch {
            which,
            found,
            expected,
        });
    }
    Ok(())
}

fn dense(rows: usize, cols: usize, entries: &[(usize, usize, f64)]) -> DMatrix<f64> {
    let mut matrix = DMatrix::zeros(rows, cols);
    for &(i, j, v) in entries {
        matrix[(i, j)] += v;
    }
    matrix
}

/// Lower and upper bound vectors, free where no line was given
fn bound_vectors(len: usize, bounds: &[(usize, f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let mut lower = vec![f64::NEG_INFINITY; len];
    let mut upper = vec![f64::INFINITY; len];
    for &(i, lo, up) in bounds {
        lower[i] = lo;
        upper[i] = up;
    }
    (lower, upper)
}
