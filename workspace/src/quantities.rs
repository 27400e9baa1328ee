use std::{ path::PathBuf, process::ExitCode };
use clap::{ Parser, ValueEnum };
use log::error;
use rand_measure::{
    Analysis,
    AnalysisConfig,
    AnalysisError,
    Backend,
    Catalogue,
    Degree,
    ShotNormalization,
    Subsystem,
    classical_shadow,
    entangled_entropy_mitigated,
};
use lib::{ DriverError, DriverResult, read_input, status_line, write_json };

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Method {
    /// Randomized-measurement entropy with depolarizing error mitigation
    Entropy,
    /// Classical-shadow purity
    Shadow,
}

/// Estimate subsystem purity and second Rényi entropy from randomized
/// measurement counts.
#[derive(Parser, Debug)]
#[command(name = "quantities")]
struct Cli {
    /// JSON input with `shots` and `counts` (`-` for stdin)
    input: PathBuf,

    /// Write results here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "entropy")]
    method: Method,

    /// Number of trailing qubits in the subsystem
    #[arg(long, conflicts_with_all = [ "range", "qubits" ])]
    degree: Option<isize>,

    /// Subsystem bounds `a,b`; negative `a` wraps around the register
    #[arg(long, num_args = 2, value_delimiter = ',', allow_negative_numbers = true)]
    range: Option<Vec<isize>>,

    /// Explicit subsystem qubits
    #[arg(long, value_delimiter = ',', conflicts_with = "range")]
    qubits: Option<Vec<usize>>,

    #[arg(long, value_enum, default_value = "pool")]
    backend: BackendArg,

    /// Number of workers (defaults to all logical cores but two)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Exclude same-shot pairs from randomized-measurement cells
    #[arg(long)]
    unbiased: bool,

    /// Also reconstruct dense density matrices (shadow method only)
    #[arg(long)]
    matrices: bool,

    /// Split scalar quantities from per-cell side products
    #[arg(long)]
    export: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Serial,
    Pool,
    Rayon,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Serial => Backend::Serial,
            BackendArg::Pool => Backend::Pool,
            BackendArg::Rayon => Backend::Rayon,
        }
    }
}

impl Cli {
    fn subsystem(&self) -> DriverResult<Subsystem> {
        if let Some(qubits) = &self.qubits {
            return Ok(Subsystem::Qubits(qubits.clone()));
        }
        if let Some(range) = &self.range {
            let degree
                = Degree::try_from(range.as_slice()).map_err(AnalysisError::from)?;
            return Ok(degree.into());
        }
        Ok(self.degree.map(Degree::Last).into())
    }
}

fn run(cli: &Cli) -> DriverResult<()> {
    let input = read_input(&cli.input)?;
    let table = input.counts_table()?;
    let mapping = input.mapping(&table)?;
    let subsystem = cli.subsystem()?;
    let config = AnalysisConfig {
        backend: cli.backend.into(),
        workers_num: cli.workers,
        normalization:
            if cli.unbiased {
                ShotNormalization::Unbiased
            } else {
                ShotNormalization::Squared
            },
        progress: Some(&status_line),
    };
    let analysis: Analysis
        = match cli.method {
            Method::Entropy => {
                entangled_entropy_mitigated(
                    &table, &mapping, &subsystem, None, None, &config)?.into()
            },
            Method::Shadow => {
                let catalogue
                    = match (&input.unitary_ids, input.seeds(table.len(), &mapping)?) {
                        (Some(ids), _) => {
                            Catalogue::from_ids(ids).map_err(AnalysisError::from)?
                        },
                        (None, Some(seeds)) => {
                            let qubits: Vec<usize> = mapping.qubits().collect();
                            Catalogue::from_seeds(&seeds, &qubits)
                                .map_err(AnalysisError::from)?
                        },
                        (None, None) => { return Err(DriverError::MissingUnitaries); },
                    };
                classical_shadow(
                    &table, &catalogue, &mapping, &subsystem, cli.matrices, &config)?
                    .into()
            },
        };
    eprintln!();
    if cli.export {
        write_json(cli.output.as_ref(), &analysis.export())
    } else {
        write_json(cli.output.as_ref(), &analysis)
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        },
    }
}
