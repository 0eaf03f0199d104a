use std::io::Write;

use crate::native::records::{ConeKind, VlpRecord};
use crate::vlp::bounds::{BoundEntry, BoundKind};
use crate::vlp::OptDirection;

/// Write a problem record in the vlp text format
///
/// Every row and column gets a bound line, free ones included.
pub fn write_record<W: Write>(record: &VlpRecord, out: &mut W) -> std::io::Result<()> {
    let m = record.m;
    let q = record.q;
    let generators: Vec<(usize, usize, f64)> = match &record.gen {
        Some(gen) => gen
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.)
            .map(|(at, v)| (at % q + 1, at / q + 1, *v))
            .collect(),
        None => Vec::new(),
    };
    let cone = match record.cone_gen {
        ConeKind::Default => String::new(),
        ConeKind::Primal => format!(" cone {} {}", record.n_gen, generators.len()),
        ConeKind::Dual => format!(" dualcone {} {}", record.n_gen, generators.len()),
    };
    let direction = match record.optdir {
        OptDirection::Minimize => "min",
        OptDirection::Maximize => "max",
    };
    writeln!(
        out,
        "p vlp {direction} {m} {} {} {q} {}{cone}",
        record.n, record.nz, record.nzobj
    )?;

    let entries = record.a_ext.as_deref().unwrap_or_default();
    for t in entries.iter().filter(|t| t.row <= m) {
        writeln!(out, "a {} {} {}", t.row, t.col, t.value)?;
    }
    for t in entries.iter().filter(|t| t.row > m) {
        writeln!(out, "o {} {} {}", t.row - m, t.col, t.value)?;
    }
    for (i, j, v) in generators {
        writeln!(out, "k {i} {j} {v}")?;
    }
    if let Some(c) = &record.c {
        for (i, v) in c.iter().enumerate() {
            writeln!(out, "k {} 0 {v}", i + 1)?;
        }
    }
    write_bounds(out, 'i', m, record.rows.as_deref().unwrap_or_default())?;
    write_bounds(out, 'j', record.n, record.cols.as_deref().unwrap_or_default())?;
    writeln!(out, "e")
}

/// One bound line per index, `f` where `entries` has none
fn write_bounds<W: Write>(out: &mut W, tag: char, len: usize, entries: &[BoundEntry]) -> std::io::Result<()> {
    let mut entries = entries.iter().peekable();
    for index in 1..=len {
        let entry = entries.next_if(|e| e.index == index);
        let kind = entry.map_or(BoundKind::Free, |e| e.kind);
        write!(out, "{tag} {index} {}", kind.code())?;
        match (kind, entry) {
            (BoundKind::Lower | BoundKind::Fixed, Some(e)) => write!(out, " {}", e.lower)?,
            (BoundKind::Upper, Some(e)) => write!(out, " {}", e.upper)?,
            (BoundKind::Double, Some(e)) => write!(out, " {} {}", e.lower, e.upper)?,
            _ => {}
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::vlp_file::parse_problem;
    use crate::vlp::{ProblemHandle, VlpProblemBuilder};
    use nalgebra::dmatrix;

    fn written(handle: &ProblemHandle) -> String {
        let mut out = Vec::new();
        write_record(handle.record().unwrap(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn write_lines() {
        let problem = VlpProblemBuilder::default()
            .constraints(dmatrix![2., 1.; 1., 2.])
            .objectives(dmatrix![1., -1.; 1., 1.])
            .row_lower(vec![6., 6.])
            .col_lower(vec![0., f64::NEG_INFINITY])
            .col_upper(vec![1., f64::INFINITY])
            .build()
            .unwrap();
        let text = written(&ProblemHandle::from_problem(&problem).unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "p vlp min 2 2 4 2 4");
        assert_eq!(lines.iter().filter(|l| l.starts_with("a ")).count(), 4);
        assert_eq!(lines.iter().filter(|l| l.starts_with("o ")).count(), 4);
        assert!(lines.contains(&"o 1 2 -1"));
        assert!(lines.contains(&"i 1 l 6"));
        assert!(lines.contains(&"j 1 d 0 1"));
        assert!(lines.contains(&"j 2 f"));
        assert_eq!(lines.last(), Some(&"e"));
    }

    #[test]
    fn written_text_parses_back() {
        let problem = VlpProblemBuilder::default()
            .constraints(dmatrix![1., 1., 0.; 0., 1., 1.])
            .objectives(dmatrix![1., 0., 0.; 0., 0., 1.])
            .row_upper(vec![4., 3.])
            .col_lower(vec![0., 0., 0.])
            .primal_generators(dmatrix![1., 0.; 1., 1.])
            .duality(vec![0.5, 0.5])
            .direction(OptDirection::Maximize)
            .build()
            .unwrap();
        let handle = ProblemHandle::from_problem(&problem).unwrap();
        let parsed = parse_problem(&written(&handle)).unwrap();
        assert_eq!(parsed.direction, OptDirection::Maximize);
        assert_eq!(parsed.constraints.to_dense(), problem.constraints.to_dense());
        assert_eq!(parsed.objectives.to_dense(), problem.objectives.to_dense());
        assert_eq!(parsed.row_upper, Some(vec![4., 3.]));
        assert_eq!(parsed.row_lower, Some(vec![f64::NEG_INFINITY; 2]));
        assert_eq!(parsed.col_lower, Some(vec![0.; 3]));
        assert_eq!(parsed.duality, Some(vec![0.5, 0.5]));
        match &parsed.primal_generators {
            Some(y) => assert_eq!(y.to_dense(), dmatrix![1., 0.; 1., 1.]),
            None => panic!("Cone generators lost"),
        }

        let rebuilt = ProblemHandle::from_problem(&parsed).unwrap();
        assert_eq!(rebuilt.nz(), handle.nz());
        assert_eq!(written(&rebuilt), written(&handle));
    }
}
