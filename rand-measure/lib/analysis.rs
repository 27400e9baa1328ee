//! Shared configuration, errors, and result containers for all analyses.

use std::{ collections::BTreeMap, fmt };
use log::debug;
use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use thiserror::Error;
use crate::{
    catalogue::{ CatalogueError, SeedTable },
    cell::ShotNormalization,
    counts::{ Counts, CountsError, CountsTable, RegistersMapping },
    dispatch::Backend,
    entropy::{ EntropyResult, MitigatedEntropyResult },
    hadamard::HadamardResult,
    overlap::EchoResult,
    pool::PoolError,
    selector::SelectError,
    shadow::{ ShadowError, ShadowResult },
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("counts error: {0}")]
    Counts(#[from] CountsError),

    #[error("subsystem error: {0}")]
    Select(#[from] SelectError),

    #[error("random unitary error: {0}")]
    Catalogue(#[from] CatalogueError),

    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("classical shadow error: {0}")]
    Shadow(#[from] ShadowError),

    #[error("missing shots")]
    MissingShots,

    #[error("missing counts")]
    MissingCounts,

    #[error("all-system source covers {found} qubits, but {expected} are measured")]
    AllSystemMismatch { expected: usize, found: usize },

    /// Tuples are `(repetitions, shots, width)`.
    #[error("counts tables differ in shape: {first:?} vs {second:?}")]
    CountsMismatch { first: (usize, u64, usize), second: (usize, u64, usize) },

    #[error("expected outcomes '0' or '1', but neither is present")]
    MissingOutcomes,

    #[error("experiment has no counts yet")]
    NoCounts,
}
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Receiver for coarse progress messages.
pub trait Progress {
    fn set_description(&self, desc: &str);
}

impl<F> Progress for F
where F: Fn(&str)
{
    fn set_description(&self, desc: &str) { self(desc) }
}

/// Settings shared by all analyses.
#[derive(Copy, Clone)]
pub struct AnalysisConfig<'a> {
    /// Execution backend for cell computations.
    pub backend: Backend,
    /// Number of workers; see [`crate::dispatch::workers_distribution`].
    pub workers_num: Option<usize>,
    /// Shot normalization for randomized-measurement cells.
    pub normalization: ShotNormalization,
    /// Optional progress receiver.
    pub progress: Option<&'a dyn Progress>,
}

impl<'a> Default for AnalysisConfig<'a> {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            workers_num: None,
            normalization: ShotNormalization::default(),
            progress: None,
        }
    }
}

impl<'a> fmt::Debug for AnalysisConfig<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("backend", &self.backend)
            .field("workers_num", &self.workers_num)
            .field("normalization", &self.normalization)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl<'a> AnalysisConfig<'a> {
    /// Report a milestone.
    pub fn describe(&self, desc: &str) {
        debug!("{desc}");
        if let Some(progress) = self.progress { progress.set_description(desc); }
    }
}

/// Untyped analysis input, as read from JSON.
///
/// Everything but `shots` and `counts` is optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AnalysisInput {
    pub shots: Option<u64>,
    pub counts: Option<Vec<Counts>>,
    pub num_qubits: Option<usize>,
    pub registers_mapping: Option<BTreeMap<usize, usize>>,
    pub random_unitary_seeds: Option<Value>,
    pub unitary_ids: Option<BTreeMap<usize, BTreeMap<usize, u64>>>,
}

impl AnalysisInput {
    /// Validate `shots` and `counts` into a table.
    pub fn counts_table(&self) -> AnalysisResult<CountsTable> {
        let shots = self.shots.ok_or(AnalysisError::MissingShots)?;
        let counts = self.counts.as_ref().ok_or(AnalysisError::MissingCounts)?;
        Ok(CountsTable::new(shots, counts)?)
    }

    /// Registers mapping from the input, or the identity over `num_qubits`
    /// (or else the bitstring width).
    pub fn mapping(&self, table: &CountsTable) -> AnalysisResult<RegistersMapping> {
        match &self.registers_mapping {
            Some(map) => Ok(RegistersMapping::new(map.clone(), table.width())?),
            None => {
                let n = self.num_qubits.unwrap_or(table.width()).min(table.width());
                Ok(RegistersMapping::identity(n))
            },
        }
    }

    /// Seed table from the input, validated against the mapped qubits.
    pub fn seeds(&self, times: usize, mapping: &RegistersMapping)
        -> AnalysisResult<Option<SeedTable>>
    {
        let qubits: Vec<usize> = mapping.qubits().collect();
        self.random_unitary_seeds.as_ref()
            .map(|value| SeedTable::from_json(value, times, &qubits))
            .transpose()
            .map_err(AnalysisError::from)
    }
}

/// Any analysis result.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Analysis {
    HadamardTest(HadamardResult),
    RandomizedMeasure(EntropyResult),
    Mitigated(MitigatedEntropyResult),
    ClassicalShadow(ShadowResult),
    Echo(EchoResult),
}

impl Analysis {
    /// Short name of the method that produced the result.
    pub fn method(&self) -> &'static str {
        match self {
            Self::HadamardTest(_) => "hadamard_test",
            Self::RandomizedMeasure(_) => "randomized_measure",
            Self::Mitigated(_) => "randomized_measure_mitigated",
            Self::ClassicalShadow(_) => "classical_shadow",
            Self::Echo(_) => "echo",
        }
    }

    /// Split into scalar quantities and bulky side products (per-cell values
    /// and dense matrices).
    pub fn export(&self) -> Export {
        let mut quantity
            = match serde_json::to_value(self) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
        let mut side_product = Map::new();
        for key in SIDE_PRODUCT_KEYS {
            if let Some(v) = quantity.remove(key) { side_product.insert(key.to_string(), v); }
        }
        if let Self::ClassicalShadow(res) = self {
            if let Some(rhos) = &res.rho_m {
                let dict: Map<String, Value>
                    = rhos.iter()
                    .map(|(i, rho)| (i.to_string(), matrix_to_json(rho)))
                    .collect();
                side_product.insert("rhoMDict".to_string(), Value::Object(dict));
            }
            if let Some(rho) = &res.expect_rho {
                side_product.insert("expectRho".to_string(), matrix_to_json(rho));
            }
        }
        Export { quantity, side_product }
    }
}

const SIDE_PRODUCT_KEYS: [&str; 3] = ["purityCells", "purityCellsAllSys", "echoCells"];

/// Result of [`Analysis::export`].
#[derive(Clone, Debug, Default, Serialize)]
pub struct Export {
    pub quantity: Map<String, Value>,
    #[serde(rename = "sideProduct")]
    pub side_product: Map<String, Value>,
}

/// Dense complex matrix as rows of `[re, im]` pairs.
pub fn matrix_to_json(m: &nd::Array2<C64>) -> Value {
    Value::Array(
        m.outer_iter()
            .map(|row| {
                Value::Array(
                    row.iter()
                        .map(|z| serde_json::json!([z.re, z.im]))
                        .collect()
                )
            })
            .collect()
    )
}

impl From<HadamardResult> for Analysis {
    fn from(res: HadamardResult) -> Self { Self::HadamardTest(res) }
}

impl From<EntropyResult> for Analysis {
    fn from(res: EntropyResult) -> Self { Self::RandomizedMeasure(res) }
}

impl From<MitigatedEntropyResult> for Analysis {
    fn from(res: MitigatedEntropyResult) -> Self { Self::Mitigated(res) }
}

impl From<ShadowResult> for Analysis {
    fn from(res: ShadowResult) -> Self { Self::ClassicalShadow(res) }
}

impl From<EchoResult> for Analysis {
    fn from(res: EchoResult) -> Self { Self::Echo(res) }
}
