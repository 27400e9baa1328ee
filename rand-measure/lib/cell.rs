//! Single-repetition estimators for randomized measurements.
//!
//! For one repetition with marginal histogram `c` over a subsystem `A`, the
//! purity cell is
//! ```text
//! X = 2^|A| Σ_{s, s'} (-2)^(-D(s, s')) c(s) c(s') / N^2
//! ```
//! where `D` is the Hamming distance between bitstrings and `N` the number of
//! shots. Averaging `X` over random unitaries gives `Tr(ρ_A^2)` in the limit of
//! many shots. The finite-shot bias of order `2^|A| / N` can be removed by
//! excluding the pairing of each shot with itself; see [`ShotNormalization`].

use serde::{ Deserialize, Serialize };

/// Treatment of shot self-pairings in [`purity_cell`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotNormalization {
    /// Divide the full double sum by `N^2`.
    #[default]
    Squared,
    /// Drop same-shot pairs and divide by `N (N - 1)`.
    Unbiased,
}

/// Hamming distance between two packed bitstrings.
#[inline]
pub fn hamming_distance(a: u64, b: u64) -> u32 { (a ^ b).count_ones() }

/// Precomputed weights `2^|A| (-2)^(-d)` for every possible Hamming distance
/// `d` on an `|A|`-bit subsystem.
#[derive(Clone, Debug, PartialEq)]
pub struct HammingKernel {
    weights: Vec<f64>,
}

impl HammingKernel {
    pub fn new(subsystem_size: usize) -> Self {
        let dim = 2.0_f64.powi(subsystem_size as i32);
        let weights
            = (0..=subsystem_size)
            .map(|d| dim * (-2.0_f64).powi(-(d as i32)))
            .collect();
        Self { weights }
    }

    /// Subsystem size this kernel was built for.
    pub fn subsystem_size(&self) -> usize { self.weights.len() - 1 }

    #[inline]
    pub fn weight(&self, d: u32) -> f64 { self.weights[d as usize] }
}

/// Purity cell of a single repetition from its marginal histogram.
///
/// With [`ShotNormalization::Unbiased`] and a single shot the cell is
/// undefined and `NaN` is returned.
pub fn purity_cell(
    marginal: &[(u64, u64)],
    kernel: &HammingKernel,
    shots: u64,
    norm: ShotNormalization,
) -> f64
{
    let mut acc: f64 = 0.0;
    for &(s_i, c_i) in marginal.iter() {
        for &(s_j, c_j) in marginal.iter() {
            acc += kernel.weight(hamming_distance(s_i, s_j))
                * c_i as f64 * c_j as f64;
        }
    }
    let n = shots as f64;
    match norm {
        ShotNormalization::Squared => acc / (n * n),
        ShotNormalization::Unbiased => {
            if shots < 2 { return f64::NAN; }
            let diag = kernel.weight(0) * n;
            (acc - diag) / (n * (n - 1.0))
        },
    }
}

/// Overlap cell between corresponding repetitions of two experiments.
///
/// Same kernel as [`purity_cell`], applied across the two marginals, which
/// estimates `Tr(ρ_A σ_A)`.
pub fn echo_cell(
    first: &[(u64, u64)],
    second: &[(u64, u64)],
    kernel: &HammingKernel,
    shots: u64,
) -> f64
{
    let mut acc: f64 = 0.0;
    for &(s_i, c_i) in first.iter() {
        for &(s_j, c_j) in second.iter() {
            acc += kernel.weight(hamming_distance(s_i, s_j))
                * c_i as f64 * c_j as f64;
        }
    }
    let n = shots as f64;
    acc / (n * n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_weights() {
        let k = HammingKernel::new(2);
        assert_eq!(k.weight(0), 4.0);
        assert_eq!(k.weight(1), -2.0);
        assert_eq!(k.weight(2), 1.0);
        assert_eq!(HammingKernel::new(0).weight(0), 1.0);
    }

    #[test]
    fn deterministic_outcome() {
        // a single deterministic outcome gives 2^|A|
        let k = HammingKernel::new(3);
        let cell = purity_cell(&[(0b101, 10)], &k, 10, ShotNormalization::Squared);
        assert!((cell - 8.0).abs() < 1e-12);
        let cell = purity_cell(&[(0b101, 10)], &k, 10, ShotNormalization::Unbiased);
        assert!((cell - 8.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_outcome() {
        // one qubit, 50/50: 2 * (1/2) - 1 * (1/2) = 0.5
        let k = HammingKernel::new(1);
        let cell = purity_cell(&[(0, 5), (1, 5)], &k, 10, ShotNormalization::Squared);
        assert!((cell - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_shot_unbiased() {
        let k = HammingKernel::new(1);
        assert!(purity_cell(&[(0, 1)], &k, 1, ShotNormalization::Unbiased).is_nan());
    }

    #[test]
    fn pair_terms_sum_to_cell() {
        let k = HammingKernel::new(2);
        let marginal = [(0b00, 3), (0b01, 1), (0b11, 4)];
        let total: f64
            = marginal.iter()
            .flat_map(|&(a, ca)| {
                marginal.iter().map(move |&(b, cb)| (a, ca, b, cb))
            })
            .map(|(a, ca, b, cb)| {
                k.weight(hamming_distance(a, b)) * (ca * cb) as f64 / 64.0
            })
            .sum();
        let cell = purity_cell(&marginal, &k, 8, ShotNormalization::Squared);
        assert!((total - cell).abs() < 1e-12);
        let echo = echo_cell(&marginal, &marginal, &k, 8);
        assert!((echo - cell).abs() < 1e-12);
    }
}
