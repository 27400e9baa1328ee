use std::path::PathBuf;
use rand::{ SeedableRng, rngs::StdRng };
use rand_measure::{
    AnalysisConfig,
    Backend,
    ShotNormalization,
    Subsystem,
    dummy,
    quantities,
};
use rayon::prelude::*;
use serde::Serialize;
use lib::{ DriverResult, mkdir, write_json };

#[derive(Clone, Debug, Serialize)]
struct Point {
    #[serde(rename = "numQubits")]
    num_qubits: usize,
    purity: f64,
    #[serde(rename = "puritySD")]
    purity_sd: f64,
    entropy: f64,
    #[serde(rename = "purityExact")]
    purity_exact: f64,
}

fn eval_point(n: usize, times: usize, shots: u64) -> DriverResult<Point> {
    let mut rng = StdRng::seed_from_u64(10546 + n as u64);
    let counts = dummy::maximally_mixed_counts(times, n, shots, &mut rng);
    let config = AnalysisConfig {
        backend: Backend::Serial,
        normalization: ShotNormalization::Unbiased,
        ..Default::default()
    };
    let res = quantities(shots, &counts, &Subsystem::default(), None, None, &config)?;
    Ok(Point {
        num_qubits: n,
        purity: res.subsystem.stats.purity,
        purity_sd: res.subsystem.stats.purity_sd,
        entropy: res.subsystem.stats.entropy,
        purity_exact: 2.0_f64.powi(-(n as i32)),
    })
}

fn main() -> DriverResult<()> {
    const TIMES: usize = 100;
    const SHOTS: u64 = 1024;

    env_logger::init();
    let outdir = PathBuf::from("output");
    mkdir(&outdir)?;

    let points: Vec<Point>
        = (1..=8_usize).into_par_iter()
        .map(|n| eval_point(n, TIMES, SHOTS))
        .collect::<DriverResult<_>>()?;
    for p in points.iter() {
        println!(
            "n = {:2}: purity = {:.5} ± {:.5} (exact {:.5})",
            p.num_qubits, p.purity, p.purity_sd, p.purity_exact,
        );
    }
    write_json(Some(outdir.join("mixed_state.json")), &points)
}
