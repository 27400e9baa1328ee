//! Aggregation of per-repetition purity cells into purity and second Rényi
//! entropy estimates.

use std::collections::BTreeMap;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Purity and entropy summarizing a set of cells.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct PurityStats {
    /// Mean of the cells.
    pub purity: f64,
    /// `-log2(purity)`; `NaN` when the purity is not positive.
    pub entropy: f64,
    /// Population standard deviation of the cells.
    #[serde(rename = "puritySD")]
    pub purity_sd: f64,
    /// Propagated uncertainty `purity_sd / (ln 2 · purity)`.
    #[serde(rename = "entropySD")]
    pub entropy_sd: f64,
    /// Number of cells combined.
    #[serde(rename = "cellsNum")]
    pub cells_num: usize,
}

/// Second Rényi entropy in bits.
pub fn entropy_from_purity(purity: f64) -> f64 {
    if purity.is_finite() && purity > 0.0 { -purity.log2() } else { f64::NAN }
}

/// Uncertainty of [`entropy_from_purity`] propagated from that of the purity.
pub fn entropy_sd_from_purity(purity: f64, purity_sd: f64) -> f64 {
    if purity.is_finite() && purity > 0.0 {
        purity_sd / std::f64::consts::LN_2 / purity
    } else {
        f64::NAN
    }
}

impl PurityStats {
    /// Aggregate cells, in iteration order.
    ///
    /// An empty set of cells gives `NaN` everywhere.
    pub fn from_cells<'a, I>(cells: I) -> Self
    where I: IntoIterator<Item = &'a f64>
    {
        let cells: Vec<f64> = cells.into_iter().copied().collect();
        let purity = cells.iter().mean();
        let purity_sd = cells.iter().population_std_dev();
        Self {
            purity,
            entropy: entropy_from_purity(purity),
            purity_sd,
            entropy_sd: entropy_sd_from_purity(purity, purity_sd),
            cells_num: cells.len(),
        }
    }
}

/// Something carrying a keyed set of purity cells.
pub trait PurityCells {
    type Key: Ord;

    /// All cells, in key order.
    fn purity_cells(&self) -> &BTreeMap<Self::Key, f64>;

    /// Aggregate the cells.
    fn stats(&self) -> PurityStats {
        PurityStats::from_cells(self.purity_cells().values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate() {
        let cells = [0.5, 0.25, 0.25, 0.0];
        let stats = PurityStats::from_cells(cells.iter());
        assert!((stats.purity - 0.25).abs() < 1e-12);
        assert!((stats.entropy - 2.0).abs() < 1e-12);
        // population sd: sqrt(mean of (0.0625, 0, 0, 0.0625))
        let sd = (0.125_f64 / 4.0).sqrt();
        assert!((stats.purity_sd - sd).abs() < 1e-12);
        let esd = sd / std::f64::consts::LN_2 / 0.25;
        assert!((stats.entropy_sd - esd).abs() < 1e-12);
        assert_eq!(stats.cells_num, 4);
    }

    #[test]
    fn entropy_identity() {
        for p in [1.0, 0.5, 0.3, 1.0 / 16.0] {
            assert!((entropy_from_purity(p) + p.log2()).abs() < 1e-12);
        }
        assert!(entropy_from_purity(0.0).is_nan());
        assert!(entropy_from_purity(-0.1).is_nan());
        assert!(entropy_from_purity(f64::NAN).is_nan());
    }

    #[test]
    fn empty_cells() {
        let stats = PurityStats::from_cells([].iter());
        assert!(stats.purity.is_nan());
        assert!(stats.entropy.is_nan());
        assert_eq!(stats.cells_num, 0);
    }
}
