//! Global depolarizing error mitigation.
//!
//! Under a global depolarizing channel of strength `p`, an ideally pure
//! `n`-qubit state has measured purity
//! ```text
//! P = (1 - p)^2 + p^2 / 2^n + 2 (p - p^2) / 2^n
//! ```
//! so `p` can be solved for from the all-system purity. The subsystem purity
//! is then corrected by inverting the same channel restricted to `|A|` qubits.

use log::warn;
use serde::Serialize;
use crate::stats::entropy_from_purity;

/// Solve the depolarizing error rate from the measured all-system purity.
///
/// Returns both roots of the quadratic; the physical one is the first.
pub fn solve_p(meas_system: f64, system_size: usize) -> (f64, f64) {
    let b = 1.0 / 2.0_f64.powi(system_size as i32 - 1) - 2.0;
    let a = 1.0 + 1.0 / 2.0_f64.powi(system_size as i32)
        - 1.0 / 2.0_f64.powi(system_size as i32 - 1);
    let c = 1.0 - meas_system;
    let disc = (b * b - 4.0 * a * c).sqrt();
    let pn = (-b - disc) / (2.0 * a);
    let pp = (-b + disc) / (2.0 * a);
    (pn, pp)
}

/// Invert a global depolarizing channel of strength `p` on the measured
/// purity of an `|A|`-qubit subsystem.
pub fn mitigation_equation(p: f64, meas_subsystem: f64, subsystem_size: usize)
    -> f64
{
    let n = subsystem_size as i32;
    (
        meas_subsystem
        - p * p / 2.0_f64.powi(n)
        - (p - p * p) / 2.0_f64.powi(n - 1)
    ) / ((1.0 - p) * (1.0 - p))
}

/// Result of [`depolarizing_error_mitigation`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Mitigated {
    #[serde(rename = "errorRate")]
    pub error_rate: f64,
    #[serde(rename = "mitigatedPurity")]
    pub mitigated_purity: f64,
    #[serde(rename = "mitigatedEntropy")]
    pub mitigated_entropy: f64,
}

/// Correct a subsystem purity given the all-system purity of the same
/// experiment.
///
/// Returns `None` with a warning when the solved error rate is unphysical
/// (not finite, or outside `[0, 1)`).
pub fn depolarizing_error_mitigation(
    meas_system: f64,
    all_system: f64,
    subsystem_size: usize,
    system_size: usize,
) -> Option<Mitigated>
{
    let (p, _) = solve_p(all_system, system_size);
    if !p.is_finite() || !(0.0..1.0).contains(&p) {
        warn!(
            "skipping error mitigation: all-system purity {all_system} gives \
            unphysical error rate {p}"
        );
        return None;
    }
    let mitigated_purity = mitigation_equation(p, meas_system, subsystem_size);
    Some(Mitigated {
        error_rate: p,
        mitigated_purity,
        mitigated_entropy: entropy_from_purity(mitigated_purity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_all_system_is_identity() {
        for n in 1..8 {
            let m = depolarizing_error_mitigation(0.4, 1.0, 2.min(n), n).unwrap();
            assert_eq!(m.error_rate, 0.0);
            assert_eq!(m.mitigated_purity, 0.4);
        }
    }

    #[test]
    fn inverts_channel() {
        // forward model for n qubits, pure state
        let n = 4;
        let p = 0.1;
        let dim = 2.0_f64.powi(n as i32);
        let all = (1.0 - p) * (1.0 - p) + p * p / dim + 2.0 * (p - p * p) / dim;
        let (pn, _) = solve_p(all, n);
        assert!((pn - p).abs() < 1e-10);
        // subsystem of a pure product state
        let a = 2;
        let dim_a = 2.0_f64.powi(a as i32);
        let sub = (1.0 - p) * (1.0 - p) + p * p / dim_a + 2.0 * (p - p * p) / dim_a;
        let m = depolarizing_error_mitigation(sub, all, a, n).unwrap();
        assert!((m.mitigated_purity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unphysical_is_skipped() {
        assert!(depolarizing_error_mitigation(0.5, f64::NAN, 1, 3).is_none());
        assert!(depolarizing_error_mitigation(0.5, -5.0, 1, 3).is_none());
    }
}
