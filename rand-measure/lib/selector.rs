//! Resolution of user-facing subsystem requests into concrete qubit subsets.
//!
//! A subsystem is requested either as a [`Degree`] (nothing, a number of
//! trailing qubits, or a pair of possibly negative bounds) or as an explicit
//! list of qubit indices. Pair bounds where the first is negative and the
//! second positive describe a partition that wraps around the end of the
//! register, e.g. `(-2, 1)` on five qubits selects `{3, 4, 0}`.

use serde::{ Deserialize, Serialize };
use thiserror::Error;
use crate::counts::RegistersMapping;

#[derive(Debug, Error)]
pub enum SelectError {
    /// Returned when a requested size or bound falls outside the register.
    #[error("degree {degree} is out of range for {num_qubits} qubits")]
    DegreeOutOfRange { degree: String, num_qubits: usize },

    /// Returned when a degree sequence does not have exactly two entries.
    #[error("degree must be a single integer or a pair of integers, got {0} values")]
    DegreeShape(usize),

    /// Returned when an explicit qubit list repeats an index.
    #[error("qubit {0} is selected more than once")]
    DuplicateQubit(usize),

    /// Returned when an explicit qubit index falls outside the register.
    #[error("qubit {qubit} is out of range for {num_qubits} qubits")]
    QubitOutOfRange { qubit: usize, num_qubits: usize },

    /// Returned when an explicit qubit was not measured.
    #[error("qubit {0} is not among the measured qubits")]
    QubitNotMeasured(usize),

    /// Returned when measured qubits are not covered by the random unitaries.
    #[error("measured qubits {missing:?} are not covered by the random unitaries")]
    UnitaryNotCovering { missing: Vec<usize> },
}
use SelectError::*;
pub type SelectResult<T> = Result<T, SelectError>;

/// Subsystem size or bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Degree {
    /// The last `d` qubits.
    Last(isize),
    /// Half-open bounds `[a, b)`, possibly negative.
    Pair(isize, isize),
}

impl From<isize> for Degree {
    fn from(d: isize) -> Self { Self::Last(d) }
}

impl From<(isize, isize)> for Degree {
    fn from(ab: (isize, isize)) -> Self { Self::Pair(ab.0, ab.1) }
}

impl TryFrom<&[isize]> for Degree {
    type Error = SelectError;

    fn try_from(ab: &[isize]) -> SelectResult<Self> {
        match ab {
            [a, b] => Ok(Self::Pair(*a, *b)),
            _ => Err(DegreeShape(ab.len())),
        }
    }
}

/// A subsystem request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subsystem {
    /// Contiguous (or wrap-around) range of qubits; `None` is the whole
    /// register.
    Degree(Option<Degree>),
    /// Explicit qubit indices.
    Qubits(Vec<usize>),
}

impl Default for Subsystem {
    fn default() -> Self { Self::Degree(None) }
}

impl From<Degree> for Subsystem {
    fn from(degree: Degree) -> Self { Self::Degree(Some(degree)) }
}

impl From<Option<Degree>> for Subsystem {
    fn from(degree: Option<Degree>) -> Self { Self::Degree(degree) }
}

impl From<Vec<usize>> for Subsystem {
    fn from(qubits: Vec<usize>) -> Self { Self::Qubits(qubits) }
}

/// Resolved half-open bounds `[a, b)`.
///
/// `a` may be negative, in which case the range wraps around the end of the
/// register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds(pub isize, pub isize);

impl Bounds {
    /// Number of qubits covered.
    pub fn len(&self) -> usize { (self.1 - self.0) as usize }

    /// Return `true` if no qubits are covered.
    pub fn is_empty(&self) -> bool { self.1 <= self.0 }

    /// Return `true` if the range wraps around the end of the register.
    pub fn is_cycling(&self) -> bool { self.0 < 0 }

    /// List the covered qubit indices of an `n`-qubit register, wrapped
    /// indices first.
    pub fn qubits(&self, n: usize) -> Vec<usize> {
        let n = n as isize;
        (self.0..self.1).map(|k| k.rem_euclid(n) as usize).collect()
    }
}

fn out_of_range(degree: impl std::fmt::Debug, num_qubits: usize) -> SelectError {
    DegreeOutOfRange { degree: format!("{:?}", degree), num_qubits }
}

/// Resolve a [`Degree`] to bounds on an `num_qubits`-qubit register.
///
/// - `None` selects everything, `[0, n)`.
/// - `Last(d)` selects `[n - d, n)` and fails unless `0 <= d <= n`.
/// - `Pair(a, b)` with `a < 0 < b` is kept as-is and wraps around the end of
///   the register. Otherwise each bound is reduced modulo `n` (except `n`
///   itself) and the pair is ordered.
///
/// The resulting bounds are checked to lie within the register.
pub fn qubit_selector(num_qubits: usize, degree: Option<Degree>)
    -> SelectResult<Bounds>
{
    let n = num_qubits as isize;
    let bounds
        = match degree {
            None => Bounds(0, n),
            Some(Degree::Last(d)) => {
                if d < 0 || d > n { return Err(out_of_range(d, num_qubits)); }
                Bounds(n - d, n)
            },
            Some(Degree::Pair(a, b)) if a < 0 && b > 0 => Bounds(a, b),
            Some(Degree::Pair(a, b)) => {
                let wrap = |x: isize| {
                    if x == n { x } else if n == 0 { x } else { x.rem_euclid(n) }
                };
                let (a, b) = (wrap(a), wrap(b));
                Bounds(a.min(b), a.max(b))
            },
        };
    if bounds.0 < -n || bounds.1 > n || bounds.1 - bounds.0 > n {
        return Err(out_of_range(degree, num_qubits));
    }
    Ok(bounds)
}

/// A resolved subsystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subset {
    qubits: Vec<usize>,
    bounds: Option<Bounds>,
}

impl Subset {
    /// Resolve a request against an `num_qubits`-qubit register.
    pub fn resolve(num_qubits: usize, subsystem: &Subsystem)
        -> SelectResult<Self>
    {
        match subsystem {
            Subsystem::Degree(degree) => {
                let bounds = qubit_selector(num_qubits, *degree)?;
                Ok(Self { qubits: bounds.qubits(num_qubits), bounds: Some(bounds) })
            },
            Subsystem::Qubits(qubits) => {
                let mut seen = vec![false; num_qubits];
                for &q in qubits.iter() {
                    if q >= num_qubits {
                        return Err(QubitOutOfRange { qubit: q, num_qubits });
                    }
                    if seen[q] { return Err(DuplicateQubit(q)); }
                    seen[q] = true;
                }
                Ok(Self { qubits: qubits.clone(), bounds: None })
            },
        }
    }

    /// Resolve a request against the measured qubits of `mapping`.
    ///
    /// Ranges address positions among the measured qubits in ascending order,
    /// so position `k` selects the `k`-th measured qubit. Explicit lists name
    /// qubits directly and must all be measured.
    pub fn resolve_measured(mapping: &RegistersMapping, subsystem: &Subsystem)
        -> SelectResult<Self>
    {
        let measured: Vec<usize> = mapping.qubits().collect();
        match subsystem {
            Subsystem::Degree(degree) => {
                let bounds = qubit_selector(measured.len(), *degree)?;
                let qubits
                    = bounds.qubits(measured.len()).into_iter()
                    .map(|k| measured[k])
                    .collect();
                Ok(Self { qubits, bounds: Some(bounds) })
            },
            Subsystem::Qubits(qubits) => {
                for (k, &q) in qubits.iter().enumerate() {
                    if mapping.cbit(q).is_none() { return Err(QubitNotMeasured(q)); }
                    if qubits[..k].contains(&q) { return Err(DuplicateQubit(q)); }
                }
                Ok(Self { qubits: qubits.clone(), bounds: None })
            },
        }
    }

    /// Selected qubit indices, in selection order.
    pub fn qubits(&self) -> &[usize] { &self.qubits }

    /// Bounds, if the subsystem was requested as a range.
    pub fn bounds(&self) -> Option<Bounds> { self.bounds }

    /// Number of selected qubits.
    pub fn len(&self) -> usize { self.qubits.len() }

    /// Return `true` if no qubits are selected.
    pub fn is_empty(&self) -> bool { self.qubits.is_empty() }

    /// Selected qubits in descending order.
    pub fn qubits_descending(&self) -> Vec<usize> {
        let mut qubits = self.qubits.clone();
        qubits.sort_unstable_by(|a, b| b.cmp(a));
        qubits
    }
}

/// Resolve the measurement range, defaulting to the whole register.
pub fn measure_range(num_qubits: usize, measure: Option<Degree>)
    -> SelectResult<Bounds>
{
    qubit_selector(num_qubits, measure)
}

/// Check that every measured qubit is acted on by a random unitary.
pub fn check_unitary_covering(measured: &[usize], unitary_located: &[usize])
    -> SelectResult<()>
{
    let missing: Vec<usize>
        = measured.iter().copied()
        .filter(|q| !unitary_located.contains(q))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UnitaryNotCovering { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_defaults() {
        assert_eq!(qubit_selector(8, None).unwrap(), Bounds(0, 8));
        assert_eq!(qubit_selector(8, Some(Degree::Last(3))).unwrap(), Bounds(5, 8));
        assert_eq!(qubit_selector(8, Some(Degree::Last(0))).unwrap(), Bounds(8, 8));
        assert_eq!(qubit_selector(8, Some(Degree::Last(8))).unwrap(), Bounds(0, 8));
    }

    #[test]
    fn selector_pairs() {
        assert_eq!(qubit_selector(8, Some(Degree::Pair(2, 5))).unwrap(), Bounds(2, 5));
        assert_eq!(qubit_selector(8, Some(Degree::Pair(5, 2))).unwrap(), Bounds(2, 5));
        assert_eq!(qubit_selector(8, Some(Degree::Pair(-3, -1))).unwrap(), Bounds(5, 7));
        assert_eq!(qubit_selector(8, Some(Degree::Pair(3, 8))).unwrap(), Bounds(3, 8));
        let cycling = qubit_selector(5, Some(Degree::Pair(-2, 1))).unwrap();
        assert_eq!(cycling, Bounds(-2, 1));
        assert!(cycling.is_cycling());
        assert_eq!(cycling.qubits(5), vec![3, 4, 0]);
    }

    #[test]
    fn selector_rejects() {
        assert!(matches!(
            qubit_selector(8, Some(Degree::Last(9))),
            Err(DegreeOutOfRange { .. }),
        ));
        assert!(matches!(
            qubit_selector(8, Some(Degree::Last(-1))),
            Err(DegreeOutOfRange { .. }),
        ));
        assert!(matches!(
            qubit_selector(4, Some(Degree::Pair(-3, 3))),
            Err(DegreeOutOfRange { .. }),
        ));
        assert!(matches!(
            Degree::try_from([1, 2, 3].as_slice()),
            Err(DegreeShape(3)),
        ));
        assert_eq!(
            Degree::try_from([1, 2].as_slice()).unwrap(),
            Degree::Pair(1, 2),
        );
    }

    #[test]
    fn explicit_qubits() {
        let subset = Subset::resolve(5, &Subsystem::Qubits(vec![4, 0, 2])).unwrap();
        assert_eq!(subset.qubits(), &[4, 0, 2]);
        assert_eq!(subset.qubits_descending(), vec![4, 2, 0]);
        assert!(subset.bounds().is_none());
        assert!(matches!(
            Subset::resolve(5, &Subsystem::Qubits(vec![1, 1])),
            Err(DuplicateQubit(1)),
        ));
        assert!(matches!(
            Subset::resolve(5, &Subsystem::Qubits(vec![5])),
            Err(QubitOutOfRange { qubit: 5, num_qubits: 5 }),
        ));
    }

    #[test]
    fn measured_positions() {
        let mapping = RegistersMapping::from_measured([2, 3, 5]).unwrap();
        let all = Subset::resolve_measured(&mapping, &Subsystem::default()).unwrap();
        assert_eq!(all.qubits(), &[2, 3, 5]);
        assert_eq!(all.bounds(), Some(Bounds(0, 3)));
        let last = Subset::resolve_measured(&mapping, &Degree::Last(2).into()).unwrap();
        assert_eq!(last.qubits(), &[3, 5]);
        let cycling
            = Subset::resolve_measured(&mapping, &Degree::Pair(-1, 1).into()).unwrap();
        assert_eq!(cycling.qubits(), &[5, 2]);
        let explicit
            = Subset::resolve_measured(&mapping, &Subsystem::Qubits(vec![5, 2])).unwrap();
        assert_eq!(explicit.qubits(), &[5, 2]);
        assert!(matches!(
            Subset::resolve_measured(&mapping, &Subsystem::Qubits(vec![0])),
            Err(QubitNotMeasured(0)),
        ));
        assert!(matches!(
            Subset::resolve_measured(&mapping, &Subsystem::Qubits(vec![3, 3])),
            Err(DuplicateQubit(3)),
        ));
        let empty = RegistersMapping::from_measured([]).unwrap();
        assert!(Subset::resolve_measured(&empty, &Subsystem::default()).unwrap().is_empty());
    }

    #[test]
    fn unitary_covering() {
        assert!(check_unitary_covering(&[0, 1], &[0, 1, 2]).is_ok());
        assert!(matches!(
            check_unitary_covering(&[0, 3], &[0, 1, 2]),
            Err(UnitaryNotCovering { missing }) if missing == vec![3],
        ));
    }

    #[test]
    fn degree_json() {
        let d: Degree = serde_json::from_str("3").unwrap();
        assert_eq!(d, Degree::Last(3));
        let d: Degree = serde_json::from_str("[-2, 1]").unwrap();
        assert_eq!(d, Degree::Pair(-2, 1));
        let s: Subsystem = serde_json::from_str("null").unwrap();
        assert_eq!(s, Subsystem::Degree(None));
    }
}
