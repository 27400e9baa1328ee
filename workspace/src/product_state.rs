use std::{ f64::consts::PI, path::PathBuf };
use num_complex::Complex64 as C64;
use rand::{ SeedableRng, rngs::StdRng };
use rand_measure::{
    AnalysisConfig,
    Degree,
    Experiment,
    ExperimentArgs,
    Report,
    Subsystem,
    dummy,
    generate_seeds,
};
use lib::{ DriverResult, mkdir, status_line, write_json };

// cos(θ/2)|0⟩ + e^{iφ} sin(θ/2)|1⟩
fn bloch(theta: f64, phi: f64) -> [C64; 2] {
    [
        C64::new((theta / 2.0).cos(), 0.0),
        C64::from_polar((theta / 2.0).sin(), phi),
    ]
}

fn main() -> DriverResult<()> {
    const N: usize = 4;
    const TIMES: usize = 90;
    const SHOTS: u64 = 2048;

    env_logger::init();
    let outdir = PathBuf::from("output");
    mkdir(&outdir)?;

    let mut rng = StdRng::seed_from_u64(10546);
    let qubits: Vec<usize> = (0..N).collect();
    let args = ExperimentArgs {
        num_qubits: N,
        times: TIMES,
        random_unitary_seeds: Some(generate_seeds(TIMES, &qubits, Some(10546))),
        ..Default::default()
    };
    let mut exp = Experiment::new(args, &mut rng)?;
    let states: Vec<[C64; 2]>
        = (0..N)
        .map(|k| bloch(PI * k as f64 / N as f64, PI / 3.0 * k as f64))
        .collect();
    let counts
        = dummy::product_state_counts(exp.catalogue(), &states, SHOTS, Some(&mut rng));
    exp.set_counts(SHOTS, &counts)?;
    // same data in the `quantities` input format
    let input
        = serde_json::json!({
            "shots": SHOTS,
            "counts": &counts,
            "unitary_ids": exp.catalogue().to_ids(),
        });
    write_json(Some(outdir.join("product_state_input.json")), &input)?;

    let config = AnalysisConfig {
        progress: Some(&status_line),
        ..Default::default()
    };
    for d in 1..=N {
        exp.analyze_entropy(&Degree::Last(d as isize).into(), None, false, &config)?;
    }
    exp.analyze_shadow(&Subsystem::Qubits(vec![0, 1]), None, true, &config)?;
    exp.analyze_echo(&exp, &Subsystem::default(), None, &config)?;
    eprintln!();

    let reports = exp.reports().to_vec();
    for report in reports.iter() {
        let purity
            = report.analysis.export().quantity.get("purity")
            .and_then(|v| v.as_f64());
        match purity {
            Some(p) => println!("{:2} {:<30} purity = {:.5}", report.serial, report.method, p),
            None => println!("{:2} {}", report.serial, report.method),
        }
    }
    let reports: Vec<&Report> = reports.iter().map(|r| r.as_ref()).collect();
    write_json(Some(outdir.join("product_state.json")), &reports)
}
