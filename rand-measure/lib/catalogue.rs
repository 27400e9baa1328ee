//! Per-repetition, per-qubit random single-qubit unitaries.
//!
//! Each qubit of each repetition is rotated into one of three measurement
//! bases before readout, drawn uniformly from [`UnitaryChoice`]. Choices are
//! either sampled from a generator or derived deterministically from a table
//! of integer seeds, so that an experiment can be reproduced exactly.

use std::collections::BTreeMap;
use ndarray as nd;
use num_complex::Complex64 as C64;
use once_cell::sync::Lazy;
use rand::{ Rng, SeedableRng, rngs::StdRng };
use serde::{ Deserialize, Serialize };
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogueError {
    /// Returned when a seed table (or one of its rows) has the wrong length.
    #[error("seed table{} has {found} entries, but {expected} were expected", .repetition.map(|i| format!(" repetition {i}")).unwrap_or_default())]
    SeedTableLength { repetition: Option<usize>, expected: usize, found: usize },

    /// Returned when a seed table entry is not an integer, or a row is not a
    /// table.
    #[error("seed table entry {at} must be {expected}, got {found}")]
    SeedTableType { at: String, expected: &'static str, found: String },

    /// Returned when a seed table is missing a repetition or qubit.
    #[error("seed table is missing repetition {repetition}{}", .qubit.map(|q| format!(", qubit {q}")).unwrap_or_default())]
    SeedTableMissing { repetition: usize, qubit: Option<usize> },

    /// Returned when a unitary id is not one of 0, 1, 2.
    #[error("invalid unitary id {0}: expected 0, 1, or 2")]
    InvalidUnitaryId(u64),

    /// Returned when the number of repetitions in the catalogue does not match
    /// the counts.
    #[error("catalogue holds {catalogue} repetitions, but there are {counts} histograms")]
    RepetitionMismatch { catalogue: usize, counts: usize },

    /// Returned when a qubit has no unitary assigned.
    #[error("no random unitary is assigned to qubit {0}")]
    MissingQubit(usize),
}
use CatalogueError::*;
pub type CatalogueResult<T> = Result<T, CatalogueError>;

const FRAC_PI_4: f64 = std::f64::consts::FRAC_PI_4;

static RX_HALF_PI: Lazy<nd::Array2<C64>> = Lazy::new(|| {
    let (c, s) = (FRAC_PI_4.cos(), FRAC_PI_4.sin());
    nd::array![
        [C64::new(c, 0.0), C64::new(0.0, -s)],
        [C64::new(0.0, -s), C64::new(c, 0.0)],
    ]
});

static RY_NEG_HALF_PI: Lazy<nd::Array2<C64>> = Lazy::new(|| {
    let (c, s) = ((-FRAC_PI_4).cos(), (-FRAC_PI_4).sin());
    nd::array![
        [C64::new(c, 0.0), C64::new(-s, 0.0)],
        [C64::new(s, 0.0), C64::new(c, 0.0)],
    ]
});

static IDENTITY: Lazy<nd::Array2<C64>> = Lazy::new(|| nd::Array2::eye(2));

/// One of the three single-qubit rotations applied before measurement.
///
/// Serialized as its integer id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UnitaryChoice {
    /// Id 0: `RX(π/2)`, measures along *y*.
    RxHalfPi = 0,
    /// Id 1: `RY(-π/2)`, measures along *x*.
    RyNegHalfPi = 1,
    /// Id 2: identity, measures along *z*.
    Identity = 2,
}

impl UnitaryChoice {
    pub const ALL: [Self; 3] = [Self::RxHalfPi, Self::RyNegHalfPi, Self::Identity];

    /// Integer id.
    pub fn id(self) -> usize { self as usize }

    /// Look up a choice by id.
    pub fn from_id(id: u64) -> CatalogueResult<Self> {
        match id {
            0 => Ok(Self::RxHalfPi),
            1 => Ok(Self::RyNegHalfPi),
            2 => Ok(Self::Identity),
            _ => Err(InvalidUnitaryId(id)),
        }
    }

    /// Sample uniformly.
    pub fn sample<R>(rng: &mut R) -> Self
    where R: Rng + ?Sized
    {
        Self::ALL[rng.gen_range(0..3)]
    }

    /// Deterministically derive a choice from an integer seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::sample(&mut StdRng::seed_from_u64(seed))
    }

    /// 2×2 matrix of the unitary.
    pub fn matrix(self) -> &'static nd::Array2<C64> {
        match self {
            Self::RxHalfPi => &RX_HALF_PI,
            Self::RyNegHalfPi => &RY_NEG_HALF_PI,
            Self::Identity => &IDENTITY,
        }
    }
}

impl From<UnitaryChoice> for u8 {
    fn from(u: UnitaryChoice) -> Self { u as u8 }
}

impl TryFrom<u8> for UnitaryChoice {
    type Error = CatalogueError;

    fn try_from(id: u8) -> CatalogueResult<Self> { Self::from_id(id as u64) }
}

/// Integer seeds indexed by repetition, then by qubit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTable(BTreeMap<usize, BTreeMap<usize, u64>>);

fn json_type(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }.to_string()
}

// Accept either `{"0": x, "1": y}` or `[x, y]`.
fn json_entries<'a>(value: &'a Value, at: &str)
    -> CatalogueResult<Vec<(usize, &'a Value)>>
{
    match value {
        Value::Array(items) => Ok(items.iter().enumerate().collect()),
        Value::Object(map) => {
            map.iter()
                .map(|(k, v)| {
                    k.trim().parse::<usize>()
                        .map(|k| (k, v))
                        .map_err(|_| SeedTableType {
                            at: format!("{at} key {k:?}"),
                            expected: "an integer key",
                            found: "a non-integer string".to_string(),
                        })
                })
                .collect()
        },
        other => Err(SeedTableType {
            at: at.to_string(),
            expected: "a table",
            found: json_type(other),
        }),
    }
}

impl SeedTable {
    /// Validate a nested seed table against the number of repetitions and the
    /// qubits that carry random unitaries.
    pub fn new(
        table: BTreeMap<usize, BTreeMap<usize, u64>>,
        times: usize,
        qubits: &[usize],
    ) -> CatalogueResult<Self>
    {
        if table.len() != times {
            return Err(SeedTableLength {
                repetition: None,
                expected: times,
                found: table.len(),
            });
        }
        for i in 0..times {
            let row
                = table.get(&i)
                .ok_or(SeedTableMissing { repetition: i, qubit: None })?;
            if row.len() != qubits.len() {
                return Err(SeedTableLength {
                    repetition: Some(i),
                    expected: qubits.len(),
                    found: row.len(),
                });
            }
            if let Some(&q) = qubits.iter().find(|q| !row.contains_key(q)) {
                return Err(SeedTableMissing { repetition: i, qubit: Some(q) });
            }
        }
        Ok(Self(table))
    }

    /// Parse and validate a seed table from untyped JSON.
    ///
    /// Both the outer and inner levels may be objects keyed by integer strings
    /// or plain arrays. Negative seeds are reinterpreted as unsigned.
    pub fn from_json(value: &Value, times: usize, qubits: &[usize])
        -> CatalogueResult<Self>
    {
        let mut table: BTreeMap<usize, BTreeMap<usize, u64>> = BTreeMap::new();
        for (i, row) in json_entries(value, "root")?.into_iter() {
            let mut parsed: BTreeMap<usize, u64> = BTreeMap::new();
            for (q, seed) in json_entries(row, &format!("repetition {i}"))? {
                let seed
                    = seed.as_u64()
                    .or_else(|| seed.as_i64().map(|s| s as u64))
                    .ok_or_else(|| SeedTableType {
                        at: format!("repetition {i}, qubit {q}"),
                        expected: "an integer",
                        found: json_type(seed),
                    })?;
                parsed.insert(q, seed);
            }
            table.insert(i, parsed);
        }
        Self::new(table, times, qubits)
    }

    /// Number of repetitions.
    pub fn times(&self) -> usize { self.0.len() }

    /// Get the seed for repetition `i`, qubit `q`.
    pub fn get(&self, i: usize, q: usize) -> Option<u64> {
        self.0.get(&i).and_then(|row| row.get(&q)).copied()
    }

    /// Borrow the underlying table.
    pub fn as_map(&self) -> &BTreeMap<usize, BTreeMap<usize, u64>> { &self.0 }
}

/// Generate a fresh seed table, optionally from a master seed.
pub fn generate_seeds(times: usize, qubits: &[usize], seed: Option<u64>)
    -> SeedTable
{
    let mut rng: StdRng
        = seed.map(StdRng::seed_from_u64)
        .unwrap_or_else(StdRng::from_entropy);
    let table
        = (0..times)
        .map(|i| {
            let row
                = qubits.iter()
                .map(|&q| (q, rng.gen::<u32>() as u64))
                .collect();
            (i, row)
        })
        .collect();
    SeedTable(table)
}

/// Random unitary assignments for every repetition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalogue {
    qubits: Vec<usize>,
    choices: Vec<Vec<UnitaryChoice>>,
}

impl Catalogue {
    /// Sample choices for `times` repetitions over `qubits`.
    pub fn sample<R>(times: usize, qubits: &[usize], rng: &mut R) -> Self
    where R: Rng + ?Sized
    {
        let choices
            = (0..times)
            .map(|_| qubits.iter().map(|_| UnitaryChoice::sample(rng)).collect())
            .collect();
        Self { qubits: qubits.to_vec(), choices }
    }

    /// Derive choices from a validated seed table.
    pub fn from_seeds(seeds: &SeedTable, qubits: &[usize])
        -> CatalogueResult<Self>
    {
        let choices
            = (0..seeds.times())
            .map(|i| {
                qubits.iter()
                    .map(|&q| {
                        seeds.get(i, q)
                            .map(UnitaryChoice::from_seed)
                            .ok_or(SeedTableMissing { repetition: i, qubit: Some(q) })
                    })
                    .collect::<CatalogueResult<Vec<_>>>()
            })
            .collect::<CatalogueResult<Vec<_>>>()?;
        Ok(Self { qubits: qubits.to_vec(), choices })
    }

    /// Use seeds if given, otherwise sample.
    pub fn generate<R>(
        times: usize,
        qubits: &[usize],
        seeds: Option<&SeedTable>,
        rng: &mut R,
    ) -> CatalogueResult<Self>
    where R: Rng + ?Sized
    {
        match seeds {
            Some(seeds) => {
                if seeds.times() != times {
                    return Err(SeedTableLength {
                        repetition: None,
                        expected: times,
                        found: seeds.times(),
                    });
                }
                Self::from_seeds(seeds, qubits)
            },
            None => Ok(Self::sample(times, qubits, rng)),
        }
    }

    /// Build from explicit unitary ids, indexed by repetition, then qubit.
    pub fn from_ids(ids: &BTreeMap<usize, BTreeMap<usize, u64>>)
        -> CatalogueResult<Self>
    {
        let qubits: Vec<usize>
            = ids.values().next()
            .map(|row| row.keys().copied().collect())
            .unwrap_or_default();
        let choices
            = (0..ids.len())
            .map(|i| {
                let row
                    = ids.get(&i)
                    .ok_or(SeedTableMissing { repetition: i, qubit: None })?;
                if row.len() != qubits.len() {
                    return Err(SeedTableLength {
                        repetition: Some(i),
                        expected: qubits.len(),
                        found: row.len(),
                    });
                }
                qubits.iter()
                    .map(|q| {
                        row.get(q)
                            .ok_or(SeedTableMissing { repetition: i, qubit: Some(*q) })
                            .and_then(|id| UnitaryChoice::from_id(*id))
                    })
                    .collect::<CatalogueResult<Vec<_>>>()
            })
            .collect::<CatalogueResult<Vec<_>>>()?;
        Ok(Self { qubits, choices })
    }

    /// Number of repetitions.
    pub fn times(&self) -> usize { self.choices.len() }

    /// Qubits carrying random unitaries, in column order.
    pub fn qubits(&self) -> &[usize] { &self.qubits }

    /// Get the choice for repetition `i`, qubit `q`.
    pub fn get(&self, i: usize, q: usize) -> Option<UnitaryChoice> {
        let col = self.qubits.iter().position(|&x| x == q)?;
        self.choices.get(i).map(|row| row[col])
    }

    /// Choices of every repetition restricted to `qubits`, in the given order.
    pub fn columns(&self, qubits: &[usize])
        -> CatalogueResult<Vec<Vec<UnitaryChoice>>>
    {
        let cols: Vec<usize>
            = qubits.iter()
            .map(|&q| {
                self.qubits.iter().position(|&x| x == q).ok_or(MissingQubit(q))
            })
            .collect::<CatalogueResult<_>>()?;
        Ok(
            self.choices.iter()
                .map(|row| cols.iter().map(|&c| row[c]).collect())
                .collect()
        )
    }

    /// Restrict to a subset of repetitions, renumbered in the order given.
    ///
    /// Indices must already have been checked against the number of
    /// repetitions; out-of-range indices are skipped.
    pub fn select(&self, counts_used: Option<&[usize]>) -> Self {
        match counts_used {
            None => self.clone(),
            Some(used) => {
                let choices
                    = used.iter()
                    .filter_map(|&i| self.choices.get(i).cloned())
                    .collect();
                Self { qubits: self.qubits.clone(), choices }
            },
        }
    }

    /// Unitary ids as a nested table, indexed by repetition, then qubit.
    ///
    /// This is the inverse of [`Catalogue::from_ids`].
    pub fn to_ids(&self) -> BTreeMap<usize, BTreeMap<usize, u64>> {
        self.choices.iter().enumerate()
            .map(|(i, row)| {
                let row
                    = self.qubits.iter().copied()
                    .zip(row.iter().map(|&u| u8::from(u) as u64))
                    .collect();
                (i, row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unitary(u: &nd::Array2<C64>) -> bool {
        let udag = u.t().mapv(|z| z.conj());
        let prod = udag.dot(u);
        prod.indexed_iter()
            .all(|((i, j), z)| {
                let target = if i == j { 1.0 } else { 0.0 };
                (*z - C64::new(target, 0.0)).norm() < 1e-12
            })
    }

    #[test]
    fn unitaries_are_unitary() {
        for u in UnitaryChoice::ALL {
            assert!(is_unitary(u.matrix()), "{u:?}");
        }
    }

    #[test]
    fn seeded_choice_is_stable() {
        for seed in [0_u64, 1, 42, 1 << 40] {
            assert_eq!(UnitaryChoice::from_seed(seed), UnitaryChoice::from_seed(seed));
        }
    }

    #[test]
    fn seeds_reproduce_catalogue() {
        let qubits = [0, 1, 2];
        let seeds = generate_seeds(10, &qubits, Some(7));
        let a = Catalogue::from_seeds(&seeds, &qubits).unwrap();
        let b = Catalogue::from_seeds(&seeds, &qubits).unwrap();
        assert_eq!(a, b);
        assert_eq!(seeds, generate_seeds(10, &qubits, Some(7)));
        assert_eq!(a.times(), 10);
    }

    #[test]
    fn seed_table_json() {
        let value = serde_json::json!({
            "0": { "0": 11, "1": 12 },
            "1": [13, 14],
        });
        let seeds = SeedTable::from_json(&value, 2, &[0, 1]).unwrap();
        assert_eq!(seeds.get(1, 1), Some(14));

        let short = serde_json::json!([[1, 2]]);
        assert!(matches!(
            SeedTable::from_json(&short, 2, &[0, 1]),
            Err(SeedTableLength { repetition: None, expected: 2, found: 1 }),
        ));
        let typed = serde_json::json!([[1, "2"]]);
        assert!(matches!(
            SeedTable::from_json(&typed, 1, &[0, 1]),
            Err(SeedTableType { .. }),
        ));
        let missing = serde_json::json!({ "0": [1, 2], "2": [3, 4] });
        assert!(matches!(
            SeedTable::from_json(&missing, 2, &[0, 1]),
            Err(SeedTableMissing { repetition: 1, qubit: None }),
        ));
        let holes = serde_json::json!([{ "0": 1, "2": 2 }]);
        assert!(matches!(
            SeedTable::from_json(&holes, 1, &[0, 1]),
            Err(SeedTableMissing { repetition: 0, qubit: Some(1) }),
        ));
    }

    #[test]
    fn columns_and_select() {
        let ids: BTreeMap<usize, BTreeMap<usize, u64>>
            = [
                (0, [(0, 0), (1, 1), (2, 2)].into_iter().collect()),
                (1, [(0, 2), (1, 2), (2, 0)].into_iter().collect()),
            ]
            .into_iter()
            .collect();
        let cat = Catalogue::from_ids(&ids).unwrap();
        assert_eq!(cat.to_ids(), ids);
        let cols = cat.columns(&[2, 0]).unwrap();
        assert_eq!(
            cols,
            vec![
                vec![UnitaryChoice::Identity, UnitaryChoice::RxHalfPi],
                vec![UnitaryChoice::RxHalfPi, UnitaryChoice::Identity],
            ],
        );
        let sel = cat.select(Some([1].as_slice()));
        assert_eq!(sel.get(0, 2), Some(UnitaryChoice::RxHalfPi));
        assert!(matches!(cat.columns(&[3]), Err(MissingQubit(3))));
    }
}
