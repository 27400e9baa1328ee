//! Purity from a single-ancilla Hadamard (swap) test.

use std::time::Instant;
use serde::Serialize;
use crate::{
    analysis::{ AnalysisError, AnalysisResult },
    counts::{ Counts, CountsError },
    stats::entropy_from_purity,
};

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct HadamardResult {
    pub purity: f64,
    pub entropy: f64,
    #[serde(rename = "takingTime")]
    pub taking_time: f64,
}

/// Read the purity off the ancilla histogram of the first repetition.
///
/// With both outcomes present this is `(n0 - n1) / shots`; if only one outcome
/// was observed its frequency is returned.
pub fn purity_echo(shots: u64, counts: &[Counts]) -> AnalysisResult<HadamardResult> {
    let t0 = Instant::now();
    let only = counts.first().ok_or(CountsError::EmptyTable)?;
    let sample_shots: u64 = only.values().sum();
    if sample_shots != shots {
        return Err(CountsError::ShotsMismatch {
            index: 0,
            expected: shots,
            found: sample_shots,
        }.into());
    }
    let n = shots as f64;
    let purity
        = match (only.get("0"), only.get("1")) {
            (Some(&n0), Some(&n1)) => (n0 as f64 - n1 as f64) / n,
            (Some(&n0), None) => n0 as f64 / n,
            (None, Some(&n1)) => n1 as f64 / n,
            (None, None) => { return Err(AnalysisError::MissingOutcomes); },
        };
    Ok(HadamardResult {
        purity,
        entropy: entropy_from_purity(purity),
        taking_time: t0.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> Counts {
        pairs.iter().map(|(s, n)| (s.to_string(), *n)).collect()
    }

    #[test]
    fn swap_test() {
        let res = purity_echo(100, &[counts(&[("0", 75), ("1", 25)])]).unwrap();
        assert!((res.purity - 0.5).abs() < 1e-12);
        assert!((res.entropy - 1.0).abs() < 1e-12);
        let res = purity_echo(100, &[counts(&[("0", 100)])]).unwrap();
        assert_eq!(res.purity, 1.0);
    }

    #[test]
    fn swap_test_errors() {
        assert!(matches!(
            purity_echo(10, &[counts(&[("0", 4)])]),
            Err(AnalysisError::Counts(CountsError::ShotsMismatch { .. })),
        ));
        assert!(matches!(
            purity_echo(10, &[counts(&[("00", 10)])]),
            Err(AnalysisError::MissingOutcomes),
        ));
        assert!(purity_echo(10, &[]).is_err());
    }
}
