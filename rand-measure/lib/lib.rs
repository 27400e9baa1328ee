//! Estimation of subsystem purities and second Rényi entropies of qubit
//! registers from randomized measurements.
//!
//! Each repetition of an experiment rotates every qubit by a random
//! single-qubit unitary before measuring in the computational basis. From the
//! resulting per-repetition histograms this crate computes
//! - the purity `Tr(ρ_A^2)` of any subsystem `A` and its entropy
//!   `-log2 Tr(ρ_A^2)`, via the Hamming-distance estimator ([`entropy`]);
//! - the same, corrected for global depolarizing noise using the purity of
//!   the whole register ([`mitigation`], [`cache`]);
//! - classical-shadow purities and, optionally, dense density matrices
//!   ([`shadow`]);
//! - overlaps between two states measured with the same unitaries
//!   ([`overlap`]) and swap-test purities ([`hadamard`]).
//!
//! Per-repetition cells are independent and are evaluated on a configurable
//! backend ([`dispatch`]); results are always aggregated in a fixed order, so
//! they do not depend on the backend or number of workers.

pub mod counts;
pub mod selector;
pub mod catalogue;
pub mod cell;
pub mod pool;
pub mod dispatch;
pub mod stats;
pub mod mitigation;
pub mod cache;
pub mod analysis;
pub mod entropy;
pub mod shadow;
pub mod overlap;
pub mod hadamard;
pub mod experiment;
pub mod dummy;

pub use analysis::{
    Analysis,
    AnalysisConfig,
    AnalysisError,
    AnalysisInput,
    AnalysisResult,
    Progress,
};
pub use cache::{ AllSystemCache, AllSystemSource };
pub use catalogue::{ Catalogue, SeedTable, UnitaryChoice, generate_seeds };
pub use cell::ShotNormalization;
pub use counts::{ Counts, CountsTable, RegistersMapping };
pub use dispatch::Backend;
pub use entropy::{
    EntropyResult,
    MitigatedEntropyResult,
    entangled_entropy_mitigated,
    quantities,
    randomized_entangled_entropy,
};
pub use experiment::{ Experiment, ExperimentArgs, Report };
pub use hadamard::purity_echo;
pub use overlap::overlap_echo;
pub use selector::{ Bounds, Degree, Subsystem };
pub use shadow::{ ShadowResult, classical_shadow };
pub use stats::PurityStats;
