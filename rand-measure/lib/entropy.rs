//! Second Rényi entropy from randomized measurements, with optional global
//! depolarizing error mitigation.

use std::{ collections::BTreeMap, sync::Arc, time::Instant };
use log::{ debug, info };
use serde::Serialize;
use crate::{
    analysis::{ AnalysisConfig, AnalysisError, AnalysisResult },
    cache::AllSystemSource,
    cell::{ HammingKernel, purity_cell },
    counts::{ Counts, CountsTable, RegistersMapping },
    dispatch::{ dispatch, workers_distribution },
    mitigation::{ Mitigated, depolarizing_error_mitigation },
    selector::{ Bounds, Degree, Subset, Subsystem, measure_range },
    stats::{ PurityCells, PurityStats },
};

/// Purity cells of one subsystem before aggregation.
#[derive(Clone, Debug)]
pub struct EntropyCore {
    pub purity_cells: BTreeMap<usize, f64>,
    pub subset: Subset,
    pub measure: Bounds,
    pub num_qubits: usize,
    pub taking_time: f64,
}

/// Aggregated randomized-measurement entropy of one subsystem.
#[derive(Clone, Debug, Serialize)]
pub struct EntropyResult {
    #[serde(flatten)]
    pub stats: PurityStats,
    #[serde(rename = "purityCells")]
    pub purity_cells: BTreeMap<usize, f64>,
    #[serde(rename = "bitStringRange")]
    pub bit_string_range: Option<Bounds>,
    pub degree: Subsystem,
    #[serde(rename = "selectedQubits")]
    pub selected_qubits: Vec<usize>,
    #[serde(rename = "measureActually")]
    pub measure_actually: Bounds,
    #[serde(rename = "numQubits")]
    pub num_qubits: usize,
    #[serde(rename = "countsNum")]
    pub counts_num: usize,
    #[serde(rename = "takingTime")]
    pub taking_time: f64,
}

impl PurityCells for EntropyResult {
    type Key = usize;

    fn purity_cells(&self) -> &BTreeMap<usize, f64> { &self.purity_cells }
}

impl EntropyResult {
    fn from_core(core: EntropyCore, degree: &Subsystem) -> Self {
        let stats = PurityStats::from_cells(core.purity_cells.values());
        Self {
            stats,
            counts_num: core.purity_cells.len(),
            purity_cells: core.purity_cells,
            bit_string_range: core.subset.bounds(),
            degree: degree.clone(),
            selected_qubits: core.subset.qubits().to_vec(),
            measure_actually: core.measure,
            num_qubits: core.num_qubits,
            taking_time: core.taking_time,
        }
    }
}

/// Entropy of a subsystem together with the all-system entropy it was
/// mitigated against.
#[derive(Clone, Debug, Serialize)]
pub struct MitigatedEntropyResult {
    #[serde(flatten)]
    pub subsystem: EntropyResult,
    #[serde(rename = "allSystemSource")]
    pub all_system_source: String,
    #[serde(rename = "purityAllSys")]
    pub purity_all_sys: f64,
    #[serde(rename = "entropyAllSys")]
    pub entropy_all_sys: f64,
    #[serde(rename = "puritySDAllSys")]
    pub purity_sd_all_sys: f64,
    #[serde(rename = "entropySDAllSys")]
    pub entropy_sd_all_sys: f64,
    #[serde(rename = "purityCellsAllSys")]
    pub purity_cells_all_sys: BTreeMap<usize, f64>,
    #[serde(rename = "bitStringRangeAllSys")]
    pub bit_string_range_all_sys: Option<Bounds>,
    #[serde(rename = "measureActuallyAllSys")]
    pub measure_actually_all_sys: Bounds,
    #[serde(rename = "takingTimeAllSys")]
    pub taking_time_all_sys: f64,
    #[serde(rename = "errorRate")]
    pub error_rate: Option<f64>,
    #[serde(rename = "mitigatedPurity")]
    pub mitigated_purity: Option<f64>,
    #[serde(rename = "mitigatedEntropy")]
    pub mitigated_entropy: Option<f64>,
}

impl PurityCells for MitigatedEntropyResult {
    type Key = usize;

    fn purity_cells(&self) -> &BTreeMap<usize, f64> {
        &self.subsystem.purity_cells
    }
}

/// Compute the purity cell of every repetition for one subsystem.
///
/// The subsystem is resolved against the measured qubits of `mapping` (see
/// [`Subset::resolve_measured`]) and read off the classical bits the
/// mapping assigns. An empty subsystem is pure by convention: every cell is 1 whatever the counts.
pub fn entangled_entropy_core(
    counts: &CountsTable,
    mapping: &RegistersMapping,
    subsystem: &Subsystem,
    measure: Option<Degree>,
    config: &AnalysisConfig,
) -> AnalysisResult<EntropyCore>
{
    let t0 = Instant::now();
    let num_qubits = mapping.len();
    let subset = Subset::resolve_measured(mapping, subsystem)?;
    let measure = measure_range(num_qubits, measure)?;
    let cbits = Arc::new(mapping.cbits(subset.qubits())?);
    let kernel = Arc::new(HammingKernel::new(subset.len()));
    let table = Arc::new(counts.clone());
    let shots = counts.shots();
    let norm = config.normalization;

    config.describe("computing cells");
    let workers = workers_distribution(config.workers_num);
    debug!(
        "randomized measure on qubits {:?} (classical bits {:?}): {} cells over \
        {} workers ({:?})",
        subset.qubits(), cbits, counts.len(), workers, config.backend,
    );
    let purity_cells
        = if subset.is_empty() {
            (0..counts.len()).map(|i| (i, 1.0)).collect()
        } else {
            dispatch(
                (0..counts.len()).collect(),
                config.backend,
                workers,
                move |&i: &usize| {
                    let marginal = table[i].marginal(&cbits);
                    purity_cell(&marginal, &kernel, shots, norm)
                },
            )?
        };
    Ok(EntropyCore {
        purity_cells,
        subset,
        measure,
        num_qubits,
        taking_time: t0.elapsed().as_secs_f64(),
    })
}

/// Randomized-measurement entropy of one subsystem.
pub fn randomized_entangled_entropy(
    counts: &CountsTable,
    mapping: &RegistersMapping,
    subsystem: &Subsystem,
    measure: Option<Degree>,
    config: &AnalysisConfig,
) -> AnalysisResult<EntropyResult>
{
    let core = entangled_entropy_core(counts, mapping, subsystem, measure, config)?;
    let result = EntropyResult::from_core(core, subsystem);
    info!(
        "purity {:.6} ± {:.6}, entropy {:.6} on qubits {:?} ({:.3}s)",
        result.stats.purity, result.stats.purity_sd, result.stats.entropy,
        result.selected_qubits, result.taking_time,
    );
    Ok(result)
}

/// Compute the all-system source, or validate and pass through an existing
/// one.
pub fn prepare_all_system(
    counts: &CountsTable,
    mapping: &RegistersMapping,
    existing: Option<&AllSystemSource>,
    config: &AnalysisConfig,
) -> AnalysisResult<AllSystemSource>
{
    match existing {
        Some(source) => {
            if source.result.num_qubits != mapping.len() {
                return Err(AnalysisError::AllSystemMismatch {
                    expected: mapping.len(),
                    found: source.result.num_qubits,
                });
            }
            debug!("reusing all-system source {:?}", source.source);
            Ok(source.clone())
        },
        None => {
            config.describe("computing all system");
            let core
                = entangled_entropy_core(
                    counts, mapping, &Subsystem::Degree(None), None, config)?;
            Ok(AllSystemSource::independent(EntropyResult::from_core(
                core, &Subsystem::Degree(None))))
        },
    }
}

/// Combine a subsystem result with an all-system source and mitigate.
pub fn mitigate(subsystem: EntropyResult, all_system: &AllSystemSource)
    -> MitigatedEntropyResult
{
    let all = &all_system.result;
    let mitigated: Option<Mitigated>
        = depolarizing_error_mitigation(
            subsystem.stats.purity,
            all.stats.purity,
            subsystem.selected_qubits.len(),
            all.num_qubits,
        );
    MitigatedEntropyResult {
        all_system_source: all_system.source.clone(),
        purity_all_sys: all.stats.purity,
        entropy_all_sys: all.stats.entropy,
        purity_sd_all_sys: all.stats.purity_sd,
        entropy_sd_all_sys: all.stats.entropy_sd,
        purity_cells_all_sys: all.purity_cells.clone(),
        bit_string_range_all_sys: all.bit_string_range,
        measure_actually_all_sys: all.measure_actually,
        taking_time_all_sys: all.taking_time,
        error_rate: mitigated.map(|m| m.error_rate),
        mitigated_purity: mitigated.map(|m| m.mitigated_purity),
        mitigated_entropy: mitigated.map(|m| m.mitigated_entropy),
        subsystem,
    }
}

/// Full pipeline on an already-validated counts table: subsystem entropy,
/// all-system entropy (computed or reused), and error mitigation.
pub fn entangled_entropy_mitigated(
    counts: &CountsTable,
    mapping: &RegistersMapping,
    subsystem: &Subsystem,
    measure: Option<Degree>,
    all_system_source: Option<&AllSystemSource>,
    config: &AnalysisConfig,
) -> AnalysisResult<MitigatedEntropyResult>
{
    let sub = randomized_entangled_entropy(counts, mapping, subsystem, measure, config)?;
    let all = prepare_all_system(counts, mapping, all_system_source, config)?;
    config.describe("mitigating");
    let result = mitigate(sub, &all);
    if let Some(purity) = result.mitigated_purity {
        info!(
            "mitigated purity {:.6} (error rate {:.6})",
            purity, result.error_rate.unwrap_or(f64::NAN),
        );
    }
    Ok(result)
}

/// Entry point on raw histograms.
///
/// Qubit `k` is read from classical bit `k`. Histograms are validated against
/// `shots` before anything else is computed.
pub fn quantities(
    shots: u64,
    counts: &[Counts],
    subsystem: &Subsystem,
    measure: Option<Degree>,
    all_system_source: Option<&AllSystemSource>,
    config: &AnalysisConfig,
) -> AnalysisResult<MitigatedEntropyResult>
{
    let table = CountsTable::new(shots, counts)?;
    let mapping = RegistersMapping::identity(table.width());
    entangled_entropy_mitigated(
        &table, &mapping, subsystem, measure, all_system_source, config)
}
