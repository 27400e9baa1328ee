use std::{
    fs,
    io::{ self, Write },
    path::Path,
};
use rand_measure::{ AnalysisError, AnalysisInput };
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("classical shadows need `unitary_ids` or `random_unitary_seeds`")]
    MissingUnitaries,
}
pub type DriverResult<T> = Result<T, DriverError>;

/// Create a directory and all of its parents if it doesn't exist.
pub fn mkdir<P>(path: P) -> DriverResult<()>
where P: AsRef<Path>
{
    Ok(fs::create_dir_all(path)?)
}

/// Read an analysis input from a JSON file, or from stdin if `path` is `-`.
pub fn read_input<P>(path: P) -> DriverResult<AnalysisInput>
where P: AsRef<Path>
{
    let path = path.as_ref();
    let input
        = if path == Path::new("-") {
            serde_json::from_reader(io::stdin().lock())?
        } else {
            serde_json::from_reader(io::BufReader::new(fs::File::open(path)?))?
        };
    Ok(input)
}

/// Write a value as pretty-printed JSON to a file, or to stdout if `path` is
/// `None`.
pub fn write_json<P, T>(path: Option<P>, value: &T) -> DriverResult<()>
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    match path {
        Some(path) => {
            let file = io::BufWriter::new(fs::File::create(path)?);
            serde_json::to_writer_pretty(file, value)?;
        },
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, value)?;
            writeln!(lock)?;
        },
    }
    Ok(())
}

/// Print a progress milestone to stderr on a single, rewritten line.
pub fn status_line(desc: &str) {
    let mut stderr = io::stderr();
    write!(stderr, "\r\x1b[2K {desc} ").ok();
    stderr.flush().ok();
}
