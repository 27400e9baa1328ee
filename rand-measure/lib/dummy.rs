//! Synthetic counts for testing and benchmarking.
//!
//! Product states are simulated exactly: each qubit is rotated by its random
//! unitary and measured independently, so outcome probabilities factorize.
//! Bit `k` of every bitstring belongs to the `k`-th qubit of the catalogue.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::Rng;
use crate::{
    catalogue::{ Catalogue, UnitaryChoice },
    counts::{ Counts, format_bitstring },
};

/// All bitstrings of a given width, in ascending order.
pub fn make_two_bit_str(bitlen: usize) -> Vec<String> {
    (0..1_u64 << bitlen).map(|b| format_bitstring(b, bitlen)).collect()
}

/// A histogram with every bitstring observed `shots_per_case` times.
pub fn make_dummy_case(bitlen: usize, shots_per_case: u64) -> Counts {
    make_two_bit_str(bitlen).into_iter().map(|s| (s, shots_per_case)).collect()
}

/// Outcome probabilities `[p(0), p(1)]` of measuring `state` after `u`.
pub fn outcome_probs(u: UnitaryChoice, state: &[C64; 2]) -> [f64; 2] {
    let psi = nd::arr1(state);
    let out = u.matrix().dot(&psi);
    [out[0].norm_sqr(), out[1].norm_sqr()]
}

/// Histogram with counts as close as possible to `shots` times the exact
/// probabilities of independent bits.
///
/// Rounding error is absorbed by the most likely outcome.
pub fn exact_counts(probs: &[[f64; 2]], shots: u64) -> Counts {
    let width = probs.len();
    let mut entries: Vec<(u64, u64)>
        = (0..1_u64 << width)
        .map(|b| {
            let p: f64
                = probs.iter().enumerate()
                .map(|(k, pk)| pk[((b >> k) & 1) as usize])
                .product();
            (b, (p * shots as f64).round() as u64)
        })
        .collect();
    let total: u64 = entries.iter().map(|(_, n)| *n).sum();
    if total != shots {
        if let Some(max) = entries.iter_mut().max_by_key(|(_, n)| *n) {
            max.1 = (max.1 + shots).saturating_sub(total);
        }
    }
    entries.into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(b, n)| (format_bitstring(b, width), n))
        .collect()
}

/// Histogram of `shots` samples of independent bits.
pub fn sampled_counts<R>(probs: &[[f64; 2]], shots: u64, rng: &mut R) -> Counts
where R: Rng + ?Sized
{
    let width = probs.len();
    let mut counts = Counts::new();
    for _ in 0..shots {
        let b: u64
            = probs.iter().enumerate()
            .fold(0, |acc, (k, pk)| {
                if rng.gen::<f64>() < pk[1] { acc | (1 << k) } else { acc }
            });
        *counts.entry(format_bitstring(b, width)).or_insert(0) += 1;
    }
    counts
}

/// Counts for a product state, one histogram per repetition of the
/// catalogue.
///
/// `states` holds one single-qubit state per catalogue qubit. Counts are exact
/// if `rng` is `None` and sampled otherwise.
pub fn product_state_counts<R>(
    catalogue: &Catalogue,
    states: &[[C64; 2]],
    shots: u64,
    mut rng: Option<&mut R>,
) -> Vec<Counts>
where R: Rng + ?Sized
{
    let qubits = catalogue.qubits();
    (0..catalogue.times())
        .map(|i| {
            let probs: Vec<[f64; 2]>
                = qubits.iter().zip(states)
                .map(|(&q, state)| {
                    let u = catalogue.get(i, q).unwrap_or(UnitaryChoice::Identity);
                    outcome_probs(u, state)
                })
                .collect();
            match rng.as_deref_mut() {
                Some(r) => sampled_counts(&probs, shots, r),
                None => exact_counts(&probs, shots),
            }
        })
        .collect()
}

/// Sampled counts of the maximally mixed state on `width` qubits.
pub fn maximally_mixed_counts<R>(times: usize, width: usize, shots: u64, rng: &mut R)
    -> Vec<Counts>
where R: Rng + ?Sized
{
    let probs = vec![[0.5, 0.5]; width];
    (0..times).map(|_| sampled_counts(&probs, shots, rng)).collect()
}

/// `|0⟩`
pub fn ket0() -> [C64; 2] { [C64::new(1.0, 0.0), C64::new(0.0, 0.0)] }

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{ SeedableRng, rngs::StdRng };

    #[test]
    fn dummy_case() {
        assert_eq!(make_two_bit_str(2), vec!["00", "01", "10", "11"]);
        let case = make_dummy_case(3, 5);
        assert_eq!(case.len(), 8);
        assert_eq!(case.values().sum::<u64>(), 40);
    }

    #[test]
    fn ket0_probabilities() {
        let z = outcome_probs(UnitaryChoice::Identity, &ket0());
        assert!((z[0] - 1.0).abs() < 1e-12);
        for u in [UnitaryChoice::RxHalfPi, UnitaryChoice::RyNegHalfPi] {
            let p = outcome_probs(u, &ket0());
            assert!((p[0] - 0.5).abs() < 1e-12 && (p[1] - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn exact_counts_sum() {
        let c = exact_counts(&[[0.5, 0.5], [1.0, 0.0]], 64);
        assert_eq!(c.get("00"), Some(&32));
        assert_eq!(c.get("01"), Some(&32));
        assert_eq!(c.values().sum::<u64>(), 64);
        let c = exact_counts(&[[1.0 / 3.0, 2.0 / 3.0]], 10);
        assert_eq!(c.values().sum::<u64>(), 10);
    }

    #[test]
    fn sampled_counts_sum() {
        let mut rng = StdRng::seed_from_u64(10546);
        let c = maximally_mixed_counts(3, 4, 100, &mut rng);
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|h| h.values().sum::<u64>() == 100));
    }
}
