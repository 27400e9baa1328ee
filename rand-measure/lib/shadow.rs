//! Classical-shadow purity estimation.
//!
//! Each measured bitstring `b` after single-qubit rotations `U_k` defines the
//! snapshot
//! ```text
//! ρ̂ = ⊗_k (3 U_k† |b_k⟩⟨b_k| U_k - I)
//! ```
//! whose expectation over rotations is the true state. The purity is estimated
//! from the traces `Tr(ρ̂_i ρ̂_j)` between snapshots of *different* repetitions
//! `i < j`, which factorize over qubits into a small lookup table, so the dense
//! matrices are only needed when explicitly requested.

use std::{ collections::BTreeMap, fmt, sync::Arc, time::Instant };
use itertools::Itertools;
use log::{ debug, info };
use ndarray as nd;
use num_complex::Complex64 as C64;
use once_cell::sync::Lazy;
use serde::{ Serialize, Serializer };
use thiserror::Error;
use crate::{
    analysis::{ AnalysisConfig, AnalysisResult },
    catalogue::{ Catalogue, CatalogueError, UnitaryChoice },
    counts::{ CountsTable, RegistersMapping },
    dispatch::{ dispatch, workers_distribution },
    selector::{ Subset, Subsystem },
    stats::{ PurityCells, PurityStats },
};

/// Largest subsystem for which dense density matrices are reconstructed.
pub const MAX_MATRIX_QUBITS: usize = 10;

#[derive(Debug, Error)]
pub enum ShadowError {
    /// Returned when dense matrices are requested for too many qubits.
    #[error("refusing to build a dense density matrix on {0} qubits (at most {MAX_MATRIX_QUBITS})")]
    MatrixTooLarge(usize),
}

/// Single-qubit snapshot `3 U† |b⟩⟨b| U - I`.
pub fn snapshot(u: UnitaryChoice, bit: u8) -> nd::Array2<C64> {
    let m = u.matrix();
    let b = bit as usize;
    let mut out: nd::Array2<C64>
        = nd::Array2::from_shape_fn(
            (2, 2), |(i, j)| 3.0 * m[[b, i]].conj() * m[[b, j]]);
    out[[0, 0]] -= 1.0;
    out[[1, 1]] -= 1.0;
    out
}

// table[u][u'][b][b'] = Tr(ρ̂(u, b) ρ̂(u', b'))
static TRACE_KERNEL: Lazy<[[[[f64; 2]; 2]; 3]; 3]> = Lazy::new(|| {
    let mut table = [[[[0.0; 2]; 2]; 3]; 3];
    for u in UnitaryChoice::ALL {
        for v in UnitaryChoice::ALL {
            for b in 0..2_u8 {
                for bp in 0..2_u8 {
                    let tr = snapshot(u, b).dot(&snapshot(v, bp)).diag().sum();
                    table[u.id()][v.id()][b as usize][bp as usize] = tr.re;
                }
            }
        }
    }
    table
});

/// `Tr(ρ̂(u, b) ρ̂(u', b'))` for single-qubit snapshots.
#[inline]
pub fn trace_kernel(u: UnitaryChoice, b: u8, v: UnitaryChoice, bp: u8) -> f64 {
    TRACE_KERNEL[u.id()][v.id()][b as usize][bp as usize]
}

/// Estimate of `Tr(ρ̂_i ρ̂_j)` between two repetitions.
///
/// Bit `k` of the marginal bitstrings corresponds to the `k`-th entry of the
/// unitary choices.
pub fn trace_cell(
    first: &[(u64, u64)],
    first_unitaries: &[UnitaryChoice],
    second: &[(u64, u64)],
    second_unitaries: &[UnitaryChoice],
    shots: u64,
) -> f64
{
    let mut acc: f64 = 0.0;
    for &(s_i, c_i) in first.iter() {
        for &(s_j, c_j) in second.iter() {
            let prod: f64
                = first_unitaries.iter().zip(second_unitaries).enumerate()
                .map(|(k, (&u, &v))| {
                    let b = ((s_i >> k) & 1) as u8;
                    let bp = ((s_j >> k) & 1) as u8;
                    trace_kernel(u, b, v, bp)
                })
                .product();
            acc += prod * c_i as f64 * c_j as f64;
        }
    }
    let n = shots as f64;
    acc / (n * n)
}

fn kron(a: &nd::Array2<C64>, b: &nd::Array2<C64>) -> nd::Array2<C64> {
    let (ar, ac) = a.dim();
    let (br, bc) = b.dim();
    nd::Array2::from_shape_fn(
        (ar * br, ac * bc),
        |(i, j)| a[[i / br, j / bc]] * b[[i % br, j % bc]],
    )
}

/// Dense shadow of a single repetition, averaged over its shots.
///
/// The first unitary acts on the most significant tensor factor.
pub fn rho_m(marginal: &[(u64, u64)], unitaries: &[UnitaryChoice], shots: u64)
    -> nd::Array2<C64>
{
    let dim = 1_usize << unitaries.len();
    let mut rho: nd::Array2<C64> = nd::Array2::zeros((dim, dim));
    let n = shots as f64;
    for &(s, c) in marginal.iter() {
        let term: nd::Array2<C64>
            = unitaries.iter().enumerate()
            .fold(nd::Array2::eye(1), |acc, (k, &u)| {
                kron(&acc, &snapshot(u, ((s >> k) & 1) as u8))
            });
        rho.scaled_add(C64::from(c as f64 / n), &term);
    }
    rho
}

/// Unordered pair of repetitions `i < j`, serialized as `"i,j"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(pub usize, pub usize);

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}

impl Serialize for PairKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer
    {
        serializer.collect_str(self)
    }
}

/// Output of [`classical_shadow`].
#[derive(Clone, Debug, Serialize)]
pub struct ShadowResult {
    #[serde(flatten)]
    pub stats: PurityStats,
    #[serde(rename = "purityCells")]
    pub purity_cells: BTreeMap<PairKey, f64>,
    #[serde(rename = "selectedQubits")]
    pub selected_qubits: Vec<usize>,
    #[serde(rename = "selectedClassicalRegisters")]
    pub selected_classical_registers: Vec<usize>,
    #[serde(rename = "countsNum")]
    pub counts_num: usize,
    #[serde(rename = "takingTime")]
    pub taking_time: f64,
    /// Per-repetition dense shadows, if requested.
    #[serde(skip)]
    pub rho_m: Option<BTreeMap<usize, nd::Array2<C64>>>,
    /// Mean of [`Self::rho_m`], if requested.
    #[serde(skip)]
    pub expect_rho: Option<nd::Array2<C64>>,
}

impl PurityCells for ShadowResult {
    type Key = PairKey;

    fn purity_cells(&self) -> &BTreeMap<PairKey, f64> { &self.purity_cells }
}

struct ShadowData {
    marginals: Vec<Vec<(u64, u64)>>,
    unitaries: Vec<Vec<UnitaryChoice>>,
    shots: u64,
}

/// Estimate the purity of a subsystem from classical shadows.
///
/// The subsystem is resolved against the measured qubits of `mapping` (see
/// [`Subset::resolve_measured`]); the catalogue supplies the unitary on each
/// selected qubit, and its repetitions must line up with the counts. When `with_matrices` is set,
/// dense per-repetition shadows and their mean are reconstructed as well.
pub fn classical_shadow(
    counts: &CountsTable,
    catalogue: &Catalogue,
    mapping: &RegistersMapping,
    subsystem: &Subsystem,
    with_matrices: bool,
    config: &AnalysisConfig,
) -> AnalysisResult<ShadowResult>
{
    let t0 = Instant::now();
    if catalogue.times() != counts.len() {
        return Err(CatalogueError::RepetitionMismatch {
            catalogue: catalogue.times(),
            counts: counts.len(),
        }.into());
    }
    let subset = Subset::resolve_measured(mapping, subsystem)?;
    if with_matrices && subset.len() > MAX_MATRIX_QUBITS {
        return Err(ShadowError::MatrixTooLarge(subset.len()).into());
    }
    let qubits = subset.qubits_descending();
    let cbits = mapping.cbits(&qubits)?;
    let unitaries = catalogue.columns(&qubits)?;
    let marginals: Vec<Vec<(u64, u64)>>
        = counts.iter().map(|hist| hist.marginal(&cbits)).collect();
    let data = Arc::new(ShadowData { marginals, unitaries, shots: counts.shots() });

    config.describe("computing cells");
    let times = counts.len();
    let keys: Vec<PairKey>
        = (0..times).tuple_combinations()
        .map(|(i, j)| PairKey(i, j))
        .collect();
    let workers = workers_distribution(config.workers_num);
    debug!(
        "classical shadow on qubits {:?}: {} pairs over {} workers ({:?})",
        qubits, keys.len(), workers, config.backend,
    );
    let cell_data = Arc::clone(&data);
    let purity_cells
        = dispatch(keys, config.backend, workers, move |&PairKey(i, j)| {
            trace_cell(
                &cell_data.marginals[i], &cell_data.unitaries[i],
                &cell_data.marginals[j], &cell_data.unitaries[j],
                cell_data.shots,
            )
        })?;

    let (rho_m_all, expect_rho)
        = if with_matrices {
            config.describe("reconstructing density matrices");
            let rhos: BTreeMap<usize, nd::Array2<C64>>
                = (0..times)
                .map(|i| (i, rho_m(&data.marginals[i], &data.unitaries[i], data.shots)))
                .collect();
            let dim = 1_usize << qubits.len();
            let mut mean: nd::Array2<C64> = nd::Array2::zeros((dim, dim));
            rhos.values().for_each(|rho| { mean += rho; });
            mean /= C64::from(times as f64);
            (Some(rhos), Some(mean))
        } else {
            (None, None)
        };

    let stats = PurityStats::from_cells(purity_cells.values());
    let taking_time = t0.elapsed().as_secs_f64();
    info!(
        "classical shadow purity {:.6} ± {:.6} on {} qubits ({:.3}s)",
        stats.purity, stats.purity_sd, qubits.len(), taking_time,
    );
    Ok(ShadowResult {
        stats,
        purity_cells,
        selected_classical_registers: cbits,
        selected_qubits: qubits,
        counts_num: times,
        taking_time,
        rho_m: rho_m_all,
        expect_rho,
    })
}
