use std::collections::BTreeMap;
use rand::{ SeedableRng, rngs::StdRng };
use rand_measure::{
    Analysis,
    AnalysisConfig,
    AnalysisError,
    Catalogue,
    CountsTable,
    Degree,
    Experiment,
    ExperimentArgs,
    RegistersMapping,
    SeedTable,
    Subsystem,
    cache::INDEPENDENT,
    catalogue::CatalogueError,
    classical_shadow,
    counts::CountsError,
    dummy,
    generate_seeds,
    quantities,
    selector::SelectError,
};

fn experiment(n: usize, times: usize, seed: u64) -> Experiment {
    let mut rng = StdRng::seed_from_u64(seed);
    let seeds = generate_seeds(times, &(0..n).collect::<Vec<_>>(), Some(seed));
    let args = ExperimentArgs {
        num_qubits: n,
        times,
        random_unitary_seeds: Some(seeds),
        ..Default::default()
    };
    let mut exp = Experiment::new(args, &mut rng).unwrap();
    let states = vec![dummy::ket0(); n];
    let counts = dummy::product_state_counts(exp.catalogue(), &states, 32, Some(&mut rng));
    exp.set_counts(32, &counts).unwrap();
    exp
}

fn mitigated_source(report: &rand_measure::Report) -> String {
    match &report.analysis {
        Analysis::Mitigated(res) => res.all_system_source.clone(),
        other => panic!("unexpected analysis {}", other.method()),
    }
}

#[test]
fn seeds_reproduce_unitaries() {
    let a = experiment(3, 10, 7);
    let b = experiment(3, 10, 7);
    assert_eq!(a.catalogue(), b.catalogue());
    assert_eq!(a.counts(), b.counts());
    let c = experiment(3, 10, 8);
    assert_ne!(a.catalogue(), c.catalogue());
}

#[test]
fn all_system_is_cached() {
    let exp = experiment(3, 12, 10546);
    let config = AnalysisConfig::default();
    let first = exp.analyze_entropy(&Degree::Last(1).into(), None, false, &config).unwrap();
    assert_eq!(first.serial, 0);
    assert_eq!(mitigated_source(&first), INDEPENDENT);
    assert_eq!(exp.all_system_cache().len(), 1);

    let second = exp.analyze_entropy(&Degree::Last(2).into(), None, false, &config).unwrap();
    assert_eq!(second.serial, 1);
    assert_eq!(mitigated_source(&second), "0");

    let forced = exp.analyze_entropy(&Degree::Last(2).into(), None, true, &config).unwrap();
    assert_eq!(mitigated_source(&forced), INDEPENDENT);

    let used = [0, 2, 4];
    let subset
        = exp.analyze_entropy(&Degree::Last(2).into(), Some(&used[..]), false, &config)
        .unwrap();
    assert_eq!(mitigated_source(&subset), INDEPENDENT);
    assert_eq!(subset.counts_used, Some(vec![0, 2, 4]));
    assert_eq!(exp.all_system_cache().len(), 2);
    assert_eq!(exp.reports().len(), 4);

    let (a, b) = match (&first.analysis, &second.analysis) {
        (Analysis::Mitigated(a), Analysis::Mitigated(b)) => (a, b),
        _ => unreachable!(),
    };
    assert_eq!(a.purity_cells_all_sys, b.purity_cells_all_sys);
}

#[test]
fn counts_used_out_of_range() {
    let exp = experiment(2, 4, 10546);
    let config = AnalysisConfig::default();
    let err
        = exp.analyze_entropy(&Subsystem::default(), Some(&[1, 4][..]), false, &config)
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Counts(CountsError::CountsUsedOutOfRange { index: 4, len: 4 }),
    ));
}

#[test]
fn shadow_report() {
    let exp = experiment(2, 30, 10546);
    let config = AnalysisConfig::default();
    let report
        = exp.analyze_shadow(&Subsystem::Qubits(vec![1]), Some(&[0, 1, 2][..]), false, &config)
        .unwrap();
    match &report.analysis {
        Analysis::ClassicalShadow(res) => {
            assert_eq!(res.purity_cells.len(), 3);
            assert_eq!(res.selected_qubits, vec![1]);
            assert!(res.expect_rho.is_none());
        },
        other => panic!("unexpected analysis {}", other.method()),
    }
    let export = report.analysis.export();
    assert!(export.side_product.contains_key("purityCells"));
    assert!(export.quantity.contains_key("purity"));
}

#[test]
fn echo_with_itself() {
    let exp = experiment(2, 8, 10546);
    let config = AnalysisConfig::default();
    let report = exp.analyze_echo(&exp, &Subsystem::default(), None, &config).unwrap();
    let purity = exp.analyze_entropy(&Subsystem::default(), None, false, &config).unwrap();
    match (&report.analysis, &purity.analysis) {
        (Analysis::Echo(echo), Analysis::Mitigated(res)) => {
            assert!((echo.echo - res.subsystem.stats.purity).abs() < 1e-12);
        },
        _ => unreachable!(),
    }
}

#[test]
fn seed_table_shape_checked() {
    let mut rng = StdRng::seed_from_u64(10546);
    let seeds = generate_seeds(3, &[0, 1], Some(1));
    let args = ExperimentArgs {
        num_qubits: 2,
        times: 4,
        random_unitary_seeds: Some(seeds),
        ..Default::default()
    };
    assert!(matches!(
        Experiment::new(args, &mut rng),
        Err(AnalysisError::Catalogue(CatalogueError::SeedTableLength { .. })),
    ));
    let value = serde_json::json!({ "0": { "0": 5, "1": 6 } });
    let seeds = SeedTable::from_json(&value, 1, &[0, 1]).unwrap();
    let catalogue = Catalogue::from_seeds(&seeds, &[0, 1]).unwrap();
    assert_eq!(catalogue.times(), 1);
}

#[test]
fn partial_measurement() {
    let mut rng = StdRng::seed_from_u64(10546);
    let args = ExperimentArgs {
        num_qubits: 5,
        times: 12,
        measure: Some(Degree::Pair(2, 4).into()),
        unitary_loc: Some(Degree::Pair(2, 4).into()),
        ..Default::default()
    };
    let mut exp = Experiment::new(args, &mut rng).unwrap();
    assert_eq!(exp.measured(), &[2, 3]);
    assert_eq!(exp.catalogue().qubits(), &[2, 3]);
    let states = vec![dummy::ket0(); 2];
    let counts = dummy::product_state_counts::<StdRng>(exp.catalogue(), &states, 32, None);
    exp.set_counts(32, &counts).unwrap();
    let config = AnalysisConfig::default();

    // positions 0 and 1 of the measured qubits are bits 0 and 1
    let reference
        = quantities(32, &counts, &Subsystem::default(), None, None, &config).unwrap();
    let report = exp.analyze_entropy(&Subsystem::default(), None, false, &config).unwrap();
    let named
        = exp.analyze_entropy(&Subsystem::Qubits(vec![2, 3]), None, false, &config)
        .unwrap();
    let purity
        = match (&report.analysis, &named.analysis) {
            (Analysis::Mitigated(a), Analysis::Mitigated(b)) => {
                assert_eq!(a.subsystem.selected_qubits, vec![2, 3]);
                assert_eq!(a.subsystem.purity_cells, reference.subsystem.purity_cells);
                assert_eq!(b.subsystem.purity_cells, reference.subsystem.purity_cells);
                assert!((a.subsystem.stats.purity - 1.0).abs() < 1e-9);
                a.subsystem.stats.purity
            },
            _ => unreachable!(),
        };
    assert!(matches!(
        exp.analyze_entropy(&Subsystem::Qubits(vec![0]), None, false, &config),
        Err(AnalysisError::Select(SelectError::QubitNotMeasured(0))),
    ));

    // same unitaries moved onto qubits 0 and 1
    let ids: BTreeMap<usize, BTreeMap<usize, u64>>
        = exp.catalogue().to_ids().into_iter()
        .map(|(i, row)| (i, row.into_iter().map(|(q, u)| (q - 2, u)).collect()))
        .collect();
    let relabeled = Catalogue::from_ids(&ids).unwrap();
    let table = CountsTable::new(32, &counts).unwrap();
    let shadow_ref
        = classical_shadow(
            &table, &relabeled, &RegistersMapping::identity(2), &Subsystem::default(),
            false, &config,
        )
        .unwrap();
    let shadow = exp.analyze_shadow(&Subsystem::default(), None, false, &config).unwrap();
    match &shadow.analysis {
        Analysis::ClassicalShadow(res) => {
            assert_eq!(res.selected_qubits, vec![3, 2]);
            assert_eq!(res.purity_cells.len(), shadow_ref.purity_cells.len());
            assert!((res.stats.purity - shadow_ref.stats.purity).abs() < 1e-12);
        },
        other => panic!("unexpected analysis {}", other.method()),
    }

    let echo = exp.analyze_echo(&exp, &Subsystem::default(), None, &config).unwrap();
    match &echo.analysis {
        Analysis::Echo(res) => {
            assert_eq!(res.selected_qubits, vec![2, 3]);
            assert!((res.echo - purity).abs() < 1e-12);
        },
        other => panic!("unexpected analysis {}", other.method()),
    }
}
