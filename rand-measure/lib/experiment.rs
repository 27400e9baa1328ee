//! A randomized-measurement experiment: its parameters, random unitaries,
//! measured counts, and the reports analyzed from them.
//!
//! Reports are append-only and numbered in the order they were added. The
//! all-system results needed for error mitigation are computed once per set
//! of repetitions and shared between reports through an [`AllSystemCache`].

use std::sync::{ Arc, PoisonError, RwLock };
use log::{ info, warn };
use rand::Rng;
use serde::Serialize;
use crate::{
    analysis::{ Analysis, AnalysisConfig, AnalysisError, AnalysisResult },
    cache::{ AllSystemCache, AllSystemKey },
    catalogue::{ Catalogue, CatalogueError, SeedTable },
    counts::{ Counts, CountsTable, RegistersMapping },
    entropy::{ mitigate, prepare_all_system, randomized_entangled_entropy },
    overlap::overlap_echo_core,
    selector::{ Subset, Subsystem, check_unitary_covering },
    shadow::classical_shadow,
};

/// Parameters of an [`Experiment`].
#[derive(Clone, Debug, Default)]
pub struct ExperimentArgs {
    /// Number of qubits in the register.
    pub num_qubits: usize,
    /// Number of repetitions with independent random unitaries.
    pub times: usize,
    /// Measured qubits; all by default.
    pub measure: Option<Subsystem>,
    /// Qubits carrying random unitaries; all by default.
    pub unitary_loc: Option<Subsystem>,
    /// Allow measured qubits outside of `unitary_loc`.
    pub unitary_loc_not_cover_measure: bool,
    /// Seeds for the random unitaries; sampled if absent.
    pub random_unitary_seeds: Option<SeedTable>,
}

/// One analysis of an experiment.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub serial: usize,
    #[serde(rename = "countsUsed")]
    pub counts_used: Option<Vec<usize>>,
    pub method: &'static str,
    pub analysis: Analysis,
}

/// Append-only list of reports.
#[derive(Debug, Default)]
pub struct ReportCollection {
    reports: RwLock<Vec<Arc<Report>>>,
}

impl ReportCollection {
    pub fn new() -> Self { Self::default() }

    /// Append a report built from its serial number.
    pub fn push_with<F>(&self, build: F) -> Arc<Report>
    where F: FnOnce(usize) -> Report
    {
        let mut reports
            = self.reports.write().unwrap_or_else(PoisonError::into_inner);
        let report = Arc::new(build(reports.len()));
        reports.push(Arc::clone(&report));
        report
    }

    /// Get a report by serial number.
    pub fn get(&self, serial: usize) -> Option<Arc<Report>> {
        self.reports.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(serial)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.reports.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Snapshot of all reports, in serial order.
    pub fn to_vec(&self) -> Vec<Arc<Report>> {
        self.reports.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// A randomized-measurement experiment.
#[derive(Debug)]
pub struct Experiment {
    args: ExperimentArgs,
    measured: Vec<usize>,
    mapping: RegistersMapping,
    catalogue: Catalogue,
    counts: Option<CountsTable>,
    reports: ReportCollection,
    all_system: AllSystemCache,
}

impl Experiment {
    /// Validate parameters and fix the random unitaries.
    ///
    /// Measured qubit `k` (in ascending order) is read from classical bit
    /// `k`.
    pub fn new<R>(args: ExperimentArgs, rng: &mut R) -> AnalysisResult<Self>
    where R: Rng + ?Sized
    {
        let n = args.num_qubits;
        let mut measured
            = Subset::resolve(n, args.measure.as_ref().unwrap_or(&Subsystem::default()))?
            .qubits().to_vec();
        measured.sort_unstable();
        let unitary_located
            = Subset::resolve(n, args.unitary_loc.as_ref().unwrap_or(&Subsystem::default()))?
            .qubits().to_vec();
        match check_unitary_covering(&measured, &unitary_located) {
            Ok(()) => { },
            Err(err) if args.unitary_loc_not_cover_measure => {
                warn!("{err}; continuing as requested");
            },
            Err(err) => { return Err(err.into()); },
        }
        let mapping = RegistersMapping::from_measured(measured.iter().copied())?;
        info!(
            "preparing unitaries: {} repetitions on qubits {:?}",
            args.times, unitary_located,
        );
        let catalogue
            = Catalogue::generate(
                args.times,
                &unitary_located,
                args.random_unitary_seeds.as_ref(),
                rng,
            )?;
        Ok(Self {
            args,
            measured,
            mapping,
            catalogue,
            counts: None,
            reports: ReportCollection::new(),
            all_system: AllSystemCache::new(),
        })
    }

    pub fn args(&self) -> &ExperimentArgs { &self.args }

    /// Measured qubits, ascending.
    pub fn measured(&self) -> &[usize] { &self.measured }

    pub fn mapping(&self) -> &RegistersMapping { &self.mapping }

    pub fn catalogue(&self) -> &Catalogue { &self.catalogue }

    pub fn counts(&self) -> Option<&CountsTable> { self.counts.as_ref() }

    pub fn reports(&self) -> &ReportCollection { &self.reports }

    pub fn all_system_cache(&self) -> &AllSystemCache { &self.all_system }

    /// Attach measured counts, one histogram per repetition.
    pub fn set_counts(&mut self, shots: u64, counts: &[Counts]) -> AnalysisResult<()> {
        let table = CountsTable::new(shots, counts)?;
        if table.len() != self.args.times {
            return Err(CatalogueError::RepetitionMismatch {
                catalogue: self.args.times,
                counts: table.len(),
            }.into());
        }
        RegistersMapping::new(self.mapping.as_map().clone(), table.width())?;
        self.counts = Some(table);
        Ok(())
    }

    fn selected_counts(&self, counts_used: Option<&[usize]>)
        -> AnalysisResult<CountsTable>
    {
        let counts = self.counts.as_ref().ok_or(AnalysisError::NoCounts)?;
        Ok(counts.select(counts_used)?)
    }

    /// Mitigated entropy of a subsystem.
    ///
    /// Unless `independent_all_system` is set, an all-system result already
    /// computed for the same repetitions is reused.
    pub fn analyze_entropy(
        &self,
        subsystem: &Subsystem,
        counts_used: Option<&[usize]>,
        independent_all_system: bool,
        config: &AnalysisConfig,
    ) -> AnalysisResult<Arc<Report>>
    {
        let counts = self.selected_counts(counts_used)?;
        let sub
            = randomized_entangled_entropy(&counts, &self.mapping, subsystem, None, config)?;
        let key = AllSystemKey::new(counts_used, self.mapping.len());
        let existing
            = if independent_all_system { None } else { self.all_system.get(&key) };
        let (all, computed)
            = match existing {
                Some(source) => {
                    info!("reusing all-system result from report {}", source.source);
                    ((*source).clone(), false)
                },
                None => (prepare_all_system(&counts, &self.mapping, None, config)?, true),
            };
        config.describe("mitigating");
        let result = mitigate(sub, &all);
        let report
            = self.reports.push_with(|serial| Report {
                serial,
                counts_used: counts_used.map(|u| u.to_vec()),
                method: "randomized_measure_mitigated",
                analysis: result.into(),
            });
        if computed {
            self.all_system.insert(key, all.labeled(report.serial.to_string()));
        }
        Ok(report)
    }

    /// Classical-shadow purity of a subsystem.
    pub fn analyze_shadow(
        &self,
        subsystem: &Subsystem,
        counts_used: Option<&[usize]>,
        with_matrices: bool,
        config: &AnalysisConfig,
    ) -> AnalysisResult<Arc<Report>>
    {
        let counts = self.selected_counts(counts_used)?;
        let catalogue = self.catalogue.select(counts_used);
        let result
            = classical_shadow(
                &counts, &catalogue, &self.mapping, subsystem, with_matrices, config)?;
        Ok(self.reports.push_with(|serial| Report {
            serial,
            counts_used: counts_used.map(|u| u.to_vec()),
            method: "classical_shadow",
            analysis: result.into(),
        }))
    }

    /// Overlap with another experiment run with the same random unitaries.
    pub fn analyze_echo(
        &self,
        other: &Experiment,
        subsystem: &Subsystem,
        counts_used: Option<&[usize]>,
        config: &AnalysisConfig,
    ) -> AnalysisResult<Arc<Report>>
    {
        if self.catalogue != other.catalogue {
            warn!("echo between experiments with different random unitaries");
        }
        let first = self.selected_counts(counts_used)?;
        let second = other.selected_counts(counts_used)?;
        let result
            = overlap_echo_core(&first, &second, &self.mapping, subsystem, None, config)?;
        Ok(self.reports.push_with(|serial| Report {
            serial,
            counts_used: counts_used.map(|u| u.to_vec()),
            method: "echo",
            analysis: result.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{ SeedableRng, rngs::StdRng };
    use crate::selector::{ Degree, SelectError };

    fn args(n: usize, times: usize) -> ExperimentArgs {
        ExperimentArgs { num_qubits: n, times, ..Default::default() }
    }

    #[test]
    fn measure_must_be_covered() {
        let mut rng = StdRng::seed_from_u64(10546);
        let bad = ExperimentArgs {
            unitary_loc: Some(Degree::Pair(0, 2).into()),
            ..args(3, 2)
        };
        assert!(matches!(
            Experiment::new(bad.clone(), &mut rng),
            Err(AnalysisError::Select(SelectError::UnitaryNotCovering { .. })),
        ));
        let allowed = ExperimentArgs { unitary_loc_not_cover_measure: true, ..bad };
        assert!(Experiment::new(allowed, &mut rng).is_ok());
    }

    #[test]
    fn counts_must_match_times() {
        let mut rng = StdRng::seed_from_u64(10546);
        let mut exp = Experiment::new(args(1, 2), &mut rng).unwrap();
        let one: Counts = [("0".to_string(), 4)].into_iter().collect();
        assert!(exp.set_counts(4, &[one.clone()]).is_err());
        assert!(exp.set_counts(4, &[one.clone(), one]).is_ok());
        assert_eq!(exp.catalogue().times(), 2);
    }

    #[test]
    fn no_counts_no_analysis() {
        let mut rng = StdRng::seed_from_u64(10546);
        let exp = Experiment::new(args(2, 2), &mut rng).unwrap();
        assert!(matches!(
            exp.analyze_entropy(&Subsystem::default(), None, false, &AnalysisConfig::default()),
            Err(AnalysisError::NoCounts),
        ));
    }
}
