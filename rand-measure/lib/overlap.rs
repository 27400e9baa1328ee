//! Overlap (echo) between two states measured with the same random unitaries.

use std::{ collections::BTreeMap, sync::Arc, time::Instant };
use log::{ debug, info };
use serde::Serialize;
use statrs::statistics::Statistics;
use crate::{
    analysis::{ AnalysisConfig, AnalysisError, AnalysisResult },
    cell::{ HammingKernel, echo_cell },
    counts::{ Counts, CountsTable, RegistersMapping },
    dispatch::{ dispatch, workers_distribution },
    selector::{ Bounds, Degree, Subset, Subsystem, measure_range },
};

/// Estimated `Tr(ρ_A σ_A)` between two experiments.
#[derive(Clone, Debug, Serialize)]
pub struct EchoResult {
    pub echo: f64,
    #[serde(rename = "echoSD")]
    pub echo_sd: f64,
    #[serde(rename = "echoCells")]
    pub echo_cells: BTreeMap<usize, f64>,
    #[serde(rename = "bitStringRange")]
    pub bit_string_range: Option<Bounds>,
    #[serde(rename = "selectedQubits")]
    pub selected_qubits: Vec<usize>,
    #[serde(rename = "measureActually")]
    pub measure_actually: Bounds,
    #[serde(rename = "countsNum")]
    pub counts_num: usize,
    #[serde(rename = "takingTime")]
    pub taking_time: f64,
}

/// Overlap between repetitions of two counts tables paired by index.
///
/// Both tables must have the same shots, width, and number of repetitions,
/// and repetition `i` of each must have used the same random unitaries.
pub fn overlap_echo_core(
    first: &CountsTable,
    second: &CountsTable,
    mapping: &RegistersMapping,
    subsystem: &Subsystem,
    measure: Option<Degree>,
    config: &AnalysisConfig,
) -> AnalysisResult<EchoResult>
{
    let t0 = Instant::now();
    if first.len() != second.len()
        || first.shots() != second.shots()
        || first.width() != second.width()
    {
        return Err(AnalysisError::CountsMismatch {
            first: (first.len(), first.shots(), first.width()),
            second: (second.len(), second.shots(), second.width()),
        });
    }
    let num_qubits = mapping.len();
    let subset = Subset::resolve_measured(mapping, subsystem)?;
    let measure = measure_range(num_qubits, measure)?;
    let cbits = Arc::new(mapping.cbits(subset.qubits())?);
    let kernel = Arc::new(HammingKernel::new(subset.len()));
    let tables = Arc::new((first.clone(), second.clone()));
    let shots = first.shots();

    config.describe("computing cells");
    let workers = workers_distribution(config.workers_num);
    debug!("overlap echo on qubits {:?}: {} cells", subset.qubits(), first.len());
    let echo_cells
        = dispatch(
            (0..first.len()).collect(),
            config.backend,
            workers,
            move |&i: &usize| {
                let a = tables.0[i].marginal(&cbits);
                let b = tables.1[i].marginal(&cbits);
                echo_cell(&a, &b, &kernel, shots)
            },
        )?;
    let echo = echo_cells.values().mean();
    let echo_sd = echo_cells.values().population_std_dev();
    let taking_time = t0.elapsed().as_secs_f64();
    info!("echo {:.6} ± {:.6} ({:.3}s)", echo, echo_sd, taking_time);
    Ok(EchoResult {
        echo,
        echo_sd,
        counts_num: echo_cells.len(),
        echo_cells,
        bit_string_range: subset.bounds(),
        selected_qubits: subset.qubits().to_vec(),
        measure_actually: measure,
        taking_time,
    })
}

/// Entry point on raw histograms; qubit `k` is read from classical bit `k`.
pub fn overlap_echo(
    shots: u64,
    first: &[Counts],
    second: &[Counts],
    subsystem: &Subsystem,
    measure: Option<Degree>,
    config: &AnalysisConfig,
) -> AnalysisResult<EchoResult>
{
    let first = CountsTable::new(shots, first)?;
    let second = CountsTable::new(shots, second)?;
    let mapping = RegistersMapping::identity(first.width());
    overlap_echo_core(&first, &second, &mapping, subsystem, measure, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::quantities;

    fn counts(pairs: &[(&str, u64)]) -> Counts {
        pairs.iter().map(|(s, n)| (s.to_string(), *n)).collect()
    }

    #[test]
    fn self_overlap_is_purity() {
        let raw = vec![
            counts(&[("00", 5), ("01", 2), ("11", 3)]),
            counts(&[("10", 6), ("11", 4)]),
        ];
        let config = AnalysisConfig::default();
        let echo = overlap_echo(10, &raw, &raw, &Subsystem::default(), None, &config)
            .unwrap();
        let purity = quantities(10, &raw, &Subsystem::default(), None, None, &config)
            .unwrap();
        assert!((echo.echo - purity.subsystem.stats.purity).abs() < 1e-12);
    }

    #[test]
    fn mismatched_tables() {
        let a = vec![counts(&[("00", 4)])];
        let b = vec![counts(&[("00", 4)]), counts(&[("01", 4)])];
        let err
            = overlap_echo(4, &a, &b, &Subsystem::default(), None, &AnalysisConfig::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::CountsMismatch { .. }));
    }
}
