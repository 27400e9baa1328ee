//! Reuse of all-system purity results between analyses.
//!
//! Error mitigation needs the purity of the full measured register, which does
//! not depend on the subsystem being analyzed. Results are keyed by the
//! repetitions used and the register size, and are only ever inserted, never
//! replaced, so every analysis sharing a key sees the same numbers.

use std::sync::{ Arc, PoisonError, RwLock };
use log::debug;
use rustc_hash::FxHashMap as HashMap;
use serde::Serialize;
use crate::entropy::EntropyResult;

/// Label for a source computed directly rather than reused.
pub const INDEPENDENT: &str = "independent";

/// An all-system entropy result, tagged with where it came from.
#[derive(Clone, Debug, Serialize)]
pub struct AllSystemSource {
    /// Provenance: [`INDEPENDENT`] or the label of the analysis that produced
    /// it.
    pub source: String,
    #[serde(flatten)]
    pub result: EntropyResult,
}

impl AllSystemSource {
    /// Tag a freshly computed all-system result.
    pub fn independent(result: EntropyResult) -> Self {
        Self { source: INDEPENDENT.to_string(), result }
    }

    /// Relabel with the analysis that produced it.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.source = label.into();
        self
    }
}

/// Key identifying interchangeable all-system results.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AllSystemKey {
    pub counts_used: Option<Vec<usize>>,
    pub num_qubits: usize,
}

impl AllSystemKey {
    pub fn new(counts_used: Option<&[usize]>, num_qubits: usize) -> Self {
        Self { counts_used: counts_used.map(|u| u.to_vec()), num_qubits }
    }
}

/// Insert-only map from [`AllSystemKey`] to results.
#[derive(Debug, Default)]
pub struct AllSystemCache {
    entries: RwLock<HashMap<AllSystemKey, Arc<AllSystemSource>>>,
}

impl AllSystemCache {
    pub fn new() -> Self { Self::default() }

    /// Look up a result.
    pub fn get(&self, key: &AllSystemKey) -> Option<Arc<AllSystemSource>> {
        self.entries.read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Insert a result unless one is already stored under `key`, returning
    /// whichever is stored afterwards.
    pub fn insert(&self, key: AllSystemKey, source: AllSystemSource)
        -> Arc<AllSystemSource>
    {
        let mut entries
            = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(existing) => {
                debug!("all-system cache already holds {:?}", key);
                Arc::clone(existing)
            },
            None => {
                let source = Arc::new(source);
                entries.insert(key, Arc::clone(&source));
                source
            },
        }
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Return `true` if nothing is stored.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::{ selector::{ Bounds, Subsystem }, stats::PurityStats };

    fn source(purity: f64) -> AllSystemSource {
        let cells: BTreeMap<usize, f64> = [(0, purity)].into_iter().collect();
        AllSystemSource::independent(EntropyResult {
            stats: PurityStats::from_cells(cells.values()),
            purity_cells: cells,
            bit_string_range: Some(Bounds(0, 2)),
            degree: Subsystem::default(),
            selected_qubits: vec![0, 1],
            measure_actually: Bounds(0, 2),
            num_qubits: 2,
            counts_num: 1,
            taking_time: 0.0,
        })
    }

    #[test]
    fn insert_if_absent() {
        let cache = AllSystemCache::new();
        let key = AllSystemKey::new(None, 2);
        assert!(cache.get(&key).is_none());
        let a = cache.insert(key.clone(), source(0.5));
        let b = cache.insert(key.clone(), source(0.9));
        assert_eq!(a.result.stats.purity, 0.5);
        assert_eq!(b.result.stats.purity, 0.5);
        assert_eq!(cache.len(), 1);
        let other = AllSystemKey::new(Some([0].as_slice()), 2);
        assert!(cache.get(&other).is_none());
        assert_eq!(source(0.5).source, INDEPENDENT);
    }
}
