//! Measured bitstring histograms and the classical-register bookkeeping needed
//! to read them.
//!
//! Bitstrings follow the usual little-endian convention: the right-most
//! character of a bitstring holds classical bit 0. Internally, each bitstring
//! is packed into a `u64` so that classical bit `c` sits at bit position `c`,
//! which limits the number of classical registers to [`MAX_BITS`]. Spaces
//! (register separators) are ignored.

use std::collections::{ BTreeMap, HashMap as StdHashMap };
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

/// Maximum number of classical bits per bitstring.
pub const MAX_BITS: usize = 64;

/// Raw histogram of bitstring outcomes for a single repetition.
pub type Counts = StdHashMap<String, u64>;

#[derive(Debug, Error)]
pub enum CountsError {
    /// Returned when a bitstring contains characters other than `0`, `1`, or
    /// spaces.
    #[error("invalid bitstring {0:?}: expected only '0' and '1'")]
    InvalidBitstring(String),

    /// Returned when bitstrings within one counts table have different widths.
    #[error("bitstring {bitstring:?} has {found} classical bits, but {expected} were expected")]
    InconsistentWidth { bitstring: String, expected: usize, found: usize },

    /// Returned when a bitstring is wider than [`MAX_BITS`].
    #[error("bitstrings of more than {MAX_BITS} classical bits are unsupported (got {0})")]
    TooWide(usize),

    /// Returned when declared shots are zero.
    #[error("shots must be a positive integer")]
    ZeroShots,

    /// Returned when a histogram's total does not equal the declared shots.
    #[error("shots {expected} does not match sample shots {found} in histogram {index}")]
    ShotsMismatch { index: usize, expected: u64, found: u64 },

    /// Returned when a counts table holds no histograms.
    #[error("counts table is empty")]
    EmptyTable,

    /// Returned when a `counts_used` index refers past the end of the table.
    #[error("counts_used index {index} is out of range for {len} repetitions")]
    CountsUsedOutOfRange { index: usize, len: usize },

    /// Returned when a registers mapping is not a bijection onto the available
    /// classical bits.
    #[error("invalid registers mapping: {0}")]
    InvalidMapping(String),
}
use CountsError::*;
pub type CountsResult<T> = Result<T, CountsError>;

/// Pack a bitstring into a `u64`, returning it with its width.
pub fn parse_bitstring(bitstring: &str) -> CountsResult<(u64, usize)> {
    let mut bits: u64 = 0;
    let mut width: usize = 0;
    for c in bitstring.chars().rev() {
        match c {
            ' ' => { continue; },
            '0' => { },
            '1' => {
                if width >= MAX_BITS { return Err(TooWide(width + 1)); }
                bits |= 1 << width;
            },
            _ => { return Err(InvalidBitstring(bitstring.to_string())); },
        }
        width += 1;
    }
    if width > MAX_BITS { return Err(TooWide(width)); }
    Ok((bits, width))
}

/// Render a packed bitstring of a given width, most significant bit first.
pub fn format_bitstring(bits: u64, width: usize) -> String {
    (0..width).rev()
        .map(|k| if (bits >> k) & 1 == 1 { '1' } else { '0' })
        .collect()
}

/// A validated histogram of packed bitstrings for a single repetition.
///
/// Entries are kept sorted by bitstring with duplicates merged, so that every
/// traversal of the histogram happens in the same order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    entries: Vec<(u64, u64)>,
    total: u64,
}

impl Histogram {
    fn from_merged(merged: HashMap<u64, u64>) -> Self {
        let mut entries: Vec<(u64, u64)>
            = merged.into_iter().filter(|(_, n)| *n > 0).collect();
        entries.sort_unstable();
        let total = entries.iter().map(|(_, n)| *n).sum();
        Self { entries, total }
    }

    /// Parse a raw histogram, checking that all bitstrings have width `width`
    /// if given. Returns the histogram with the width found.
    pub fn parse<'a, I>(raw: I, width: Option<usize>)
        -> CountsResult<(Self, Option<usize>)>
    where I: IntoIterator<Item = (&'a String, &'a u64)>
    {
        let mut width = width;
        let mut merged: HashMap<u64, u64> = HashMap::default();
        for (bitstring, n) in raw.into_iter() {
            let (bits, w) = parse_bitstring(bitstring)?;
            match width {
                Some(expected) if expected != w => {
                    return Err(InconsistentWidth {
                        bitstring: bitstring.clone(),
                        expected,
                        found: w,
                    });
                },
                Some(_) => { },
                None => { width = Some(w); },
            }
            *merged.entry(bits).or_insert(0) += *n;
        }
        Ok((Self::from_merged(merged), width))
    }

    /// Sorted `(bitstring, count)` pairs.
    pub fn entries(&self) -> &[(u64, u64)] { &self.entries }

    /// Sum of all counts.
    pub fn total(&self) -> u64 { self.total }

    /// Number of distinct bitstrings observed.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Return `true` if nothing was observed.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Marginalize onto a list of classical bits.
    ///
    /// The `k`-th entry of `cbits` becomes bit `k` of the returned bitstrings.
    pub fn marginal(&self, cbits: &[usize]) -> Vec<(u64, u64)> {
        let mut merged: HashMap<u64, u64> = HashMap::default();
        for (bits, n) in self.entries.iter() {
            let sub: u64
                = cbits.iter().enumerate()
                .fold(0, |acc, (k, c)| acc | (((bits >> c) & 1) << k));
            *merged.entry(sub).or_insert(0) += n;
        }
        let mut out: Vec<(u64, u64)> = merged.into_iter().collect();
        out.sort_unstable();
        out
    }
}

/// Per-repetition histograms sharing a common number of shots and classical
/// bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountsTable {
    shots: u64,
    width: usize,
    hists: Vec<Histogram>,
}

impl CountsTable {
    /// Validate and pack a sequence of raw histograms.
    ///
    /// Fails if `shots` is zero, the table is empty, bitstrings are malformed
    /// or of inconsistent width, or any histogram does not sum to `shots`.
    pub fn new(shots: u64, counts: &[Counts]) -> CountsResult<Self> {
        if shots == 0 { return Err(ZeroShots); }
        if counts.is_empty() { return Err(EmptyTable); }
        let mut width: Option<usize> = None;
        let mut hists: Vec<Histogram> = Vec::with_capacity(counts.len());
        for (index, raw) in counts.iter().enumerate() {
            let (hist, w) = Histogram::parse(raw.iter(), width)?;
            if hist.total() != shots {
                return Err(ShotsMismatch {
                    index,
                    expected: shots,
                    found: hist.total(),
                });
            }
            width = w;
            hists.push(hist);
        }
        // every histogram is non-empty because shots > 0
        let width = width.unwrap_or(0);
        Ok(Self { shots, width, hists })
    }

    /// Number of shots per repetition.
    pub fn shots(&self) -> u64 { self.shots }

    /// Number of classical bits per bitstring.
    pub fn width(&self) -> usize { self.width }

    /// Number of repetitions.
    pub fn len(&self) -> usize { self.hists.len() }

    /// Return `true` if there are no repetitions.
    pub fn is_empty(&self) -> bool { self.hists.is_empty() }

    /// Get the histogram of the `i`-th repetition.
    pub fn get(&self, i: usize) -> Option<&Histogram> { self.hists.get(i) }

    /// Iterate over all histograms in repetition order.
    pub fn iter(&self) -> std::slice::Iter<'_, Histogram> { self.hists.iter() }

    /// Restrict to a subset of repetitions, renumbered in the order given.
    ///
    /// `None` keeps all repetitions.
    pub fn select(&self, counts_used: Option<&[usize]>) -> CountsResult<Self> {
        match counts_used {
            None => Ok(self.clone()),
            Some(used) => {
                let len = self.hists.len();
                let hists: Vec<Histogram>
                    = used.iter()
                    .map(|&index| {
                        self.hists.get(index).cloned()
                            .ok_or(CountsUsedOutOfRange { index, len })
                    })
                    .collect::<CountsResult<_>>()?;
                if hists.is_empty() { return Err(EmptyTable); }
                Ok(Self { shots: self.shots, width: self.width, hists })
            },
        }
    }
}

impl std::ops::Index<usize> for CountsTable {
    type Output = Histogram;

    fn index(&self, i: usize) -> &Histogram { &self.hists[i] }
}

/// Mapping from qubit index to the classical bit its measurement lands in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistersMapping(BTreeMap<usize, usize>);

impl RegistersMapping {
    /// Map qubit `k` to classical bit `k` for `k` in `0..n`.
    pub fn identity(n: usize) -> Self { Self((0..n).map(|k| (k, k)).collect()) }

    /// Map the `k`-th listed qubit to classical bit `k`.
    pub fn from_measured<I>(qubits: I) -> CountsResult<Self>
    where I: IntoIterator<Item = usize>
    {
        let mut map: BTreeMap<usize, usize> = BTreeMap::new();
        for (c, q) in qubits.into_iter().enumerate() {
            if map.insert(q, c).is_some() {
                return Err(InvalidMapping(
                    format!("qubit {q} is measured more than once")));
            }
        }
        Ok(Self(map))
    }

    /// Validate an arbitrary mapping against a bitstring width.
    ///
    /// Every classical bit must be below `width` and used by at most one
    /// qubit.
    pub fn new(map: BTreeMap<usize, usize>, width: usize) -> CountsResult<Self> {
        let mut seen: BTreeMap<usize, usize> = BTreeMap::new();
        for (&q, &c) in map.iter() {
            if c >= width {
                return Err(InvalidMapping(
                    format!("qubit {q} maps to classical bit {c}, but only {width} exist")));
            }
            if let Some(other) = seen.insert(c, q) {
                return Err(InvalidMapping(
                    format!("qubits {other} and {q} both map to classical bit {c}")));
            }
        }
        Ok(Self(map))
    }

    /// Number of mapped qubits.
    pub fn len(&self) -> usize { self.0.len() }

    /// Return `true` if no qubits are mapped.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Get the classical bit for qubit `q`.
    pub fn cbit(&self, q: usize) -> Option<usize> { self.0.get(&q).copied() }

    /// Iterate over mapped qubits in ascending order.
    pub fn qubits(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    /// Look up the classical bits for a list of qubits, in order.
    pub fn cbits(&self, qubits: &[usize]) -> CountsResult<Vec<usize>> {
        qubits.iter()
            .map(|&q| {
                self.cbit(q)
                    .ok_or_else(|| InvalidMapping(
                        format!("qubit {q} is not measured")))
            })
            .collect()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<usize, usize> { &self.0 }
}
