//! Classification of row and column bounds into the compact list the solver consumes
use thiserror::Error;

/// Kind of a (lower, upper) bound pair
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundKind {
    /// Both bounds infinite
    Free,
    /// Only the lower bound is finite
    Lower,
    /// Only the upper bound is finite
    Upper,
    /// Both bounds finite and lower < upper
    Double,
    /// Both bounds finite and equal
    Fixed,
}

impl BoundKind {
    /// Single character code of the bound kind in the solver's record and text format
    pub fn code(&self) -> char {
        match self {
            BoundKind::Free => 'f',
            BoundKind::Lower => 'l',
            BoundKind::Upper => 'u',
            BoundKind::Double => 'd',
            BoundKind::Fixed => 's',
        }
    }

    pub fn from_code(code: char) -> Option<BoundKind> {
        match code {
            'f' => Some(BoundKind::Free),
            'l' => Some(BoundKind::Lower),
            'u' => Some(BoundKind::Upper),
            'd' => Some(BoundKind::Double),
            's' => Some(BoundKind::Fixed),
            _ => None,
        }
    }
}

/// One non-free bound entry
///
/// `index` is 1-based. Bounds that do not apply to the kind are infinite.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundEntry {
    pub index: usize,
    pub kind: BoundKind,
    pub lower: f64,
    pub upper: f64,
}

impl BoundEntry {
    /// Create an entry from a bound pair, classifying it
    ///
    /// # Parameters
    /// - `index`: 1-based row or column index
    /// - `lower`: lower bound, `f64::NEG_INFINITY` when absent
    /// - `upper`: upper bound, `f64::INFINITY` when absent
    ///
    /// # Returns
    /// The classified entry, or a [`BoundError`] if the pair is malformed
    pub fn new(index: usize, lower: f64, upper: f64) -> Result<BoundEntry, BoundError> {
        let kind = classify_bound(index, lower, upper)?;
        Ok(BoundEntry {
            index,
            kind,
            lower,
            upper,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundError {
    #[error("lower bound {lower} exceeds upper bound {upper} at index {index}")]
    Inverted { index: usize, lower: f64, upper: f64 },
    #[error("bound at index {index} fixes the value at {value}")]
    InfiniteFixed { index: usize, value: f64 },
    #[error("bound at index {index} is not a number")]
    NotANumber { index: usize },
    #[error("{which} bound vector has length {found}, expected {expected}")]
    LengthMismatch {
        which: &'static str,
        found: usize,
        expected: usize,
    },
}

/// Classify a single bound pair
///
/// `index` is only used to label errors.
pub fn classify_bound(index: usize, lower: f64, upper: f64) -> Result<BoundKind, BoundError> {
    if lower.is_nan() || upper.is_nan() {
        return Err(BoundError::NotANumber { index });
    }
    if lower > upper {
        return Err(BoundError::Inverted {
            index,
            lower,
            upper,
        });
    }
    if lower == upper {
        return if lower.is_finite() {
            Ok(BoundKind::Fixed)
        } else {
            Err(BoundError::InfiniteFixed {
                index,
                value: lower,
            })
        };
    }
    Ok(match (lower.is_finite(), upper.is_finite()) {
        (false, false) => BoundKind::Free,
        (true, false) => BoundKind::Lower,
        (false, true) => BoundKind::Upper,
        (true, true) => BoundKind::Double,
    })
}

/// Classify a pair of optional bound vectors into the list of non-free entries
///
/// # Parameters
/// - `lower`: lower bounds, every index unbounded below when `None`
/// - `upper`: upper bounds, every index unbounded above when `None`
/// - `len`: number of rows or columns the bounds apply to
///
/// # Returns
/// Entries for every index whose bounds are not both infinite, in increasing index order
///
/// # Examples
/// ```rust
/// use benrs_core::vlp::bounds::{classify, BoundKind};
/// let entries = classify(Some(&[0., f64::NEG_INFINITY]), None, 2).unwrap();
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].index, 1);
/// assert_eq!(entries[0].kind, BoundKind::Lower);
/// ```
pub fn classify(
    lower: Option<&[f64]>,
    upper: Option<&[f64]>,
    len: usize,
) -> Result<Vec<BoundEntry>, BoundError> {
    check_length("lower", lower, len)?;
    check_length("upper", upper, len)?;
    let mut entries = Vec::new();
    for i in 0..len {
        let lo = lower.map_or(f64::NEG_INFINITY, |l| l[i]);
        let up = upper.map_or(f64::INFINITY, |u| u[i]);
        let entry = BoundEntry::new(i + 1, lo, up)?;
        if entry.kind != BoundKind::Free {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn check_length(which: &'static str, bounds: Option<&[f64]>, len: usize) -> Result<(), BoundError> {
    match bounds {
        Some(b) if b.len() != len => Err(BoundError::LengthMismatch {
            which,
            found: b.len(),
            expected: len,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INF: f64 = f64::INFINITY;

    #[test]
    fn classification_table() {
        assert_eq!(classify_bound(1, -INF, INF).unwrap(), BoundKind::Free);
        assert_eq!(classify_bound(1, 0., INF).unwrap(), BoundKind::Lower);
        assert_eq!(classify_bound(1, -INF, 3.).unwrap(), BoundKind::Upper);
        assert_eq!(classify_bound(1, -1., 3.).unwrap(), BoundKind::Double);
        assert_eq!(classify_bound(1, 2., 2.).unwrap(), BoundKind::Fixed);
    }

    #[test]
    fn malformed_bounds() {
        match classify_bound(4, 5., 1.) {
            Err(BoundError::Inverted { index, .. }) => assert_eq!(index, 4),
            _ => panic!("Inverted bounds accepted"),
        }
        match classify_bound(2, INF, INF) {
            Err(BoundError::InfiniteFixed { .. }) => {}
            _ => panic!("Bounds fixed at infinity accepted"),
        }
        assert!(classify_bound(1, -INF, -INF).is_err());
        assert!(classify_bound(1, f64::NAN, 1.).is_err());
    }

    #[test]
    fn codes() {
        let kinds = [
            BoundKind::Free,
            BoundKind::Lower,
            BoundKind::Upper,
            BoundKind::Double,
            BoundKind::Fixed,
        ];
        let codes: String = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes, "fluds");
        for kind in kinds {
            assert_eq!(BoundKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(BoundKind::from_code('x'), None);
    }

    #[test]
    fn free_entries_are_omitted() {
        let lower = [0., -INF, 1., -INF];
        let upper = [INF, INF, 1., 4.];
        let entries = classify(Some(&lower), Some(&upper), 4).unwrap();
        let summary: Vec<(usize, BoundKind)> = entries.iter().map(|e| (e.index, e.kind)).collect();
        assert_eq!(
            summary,
            vec![
                (1, BoundKind::Lower),
                (3, BoundKind::Fixed),
                (4, BoundKind::Upper)
            ]
        );
        assert!(classify(None, None, 3).unwrap().is_empty());
    }

    #[test]
    fn length_mismatch() {
        match classify(Some(&[0., 0.]), None, 3) {
            Err(BoundError::LengthMismatch {
                which,
                found,
                expected,
            }) => {
                assert_eq!(which, "lower");
                assert_eq!(found, 2);
                assert_eq!(expected, 3);
            }
            _ => panic!("Short lower bound vector accepted"),
        }
    }
}
