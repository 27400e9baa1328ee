//! Choice of execution backend for batches of independent cells.
//!
//! All backends return results keyed in a `BTreeMap`, so downstream
//! aggregation sees the same order no matter how work was scheduled.

use std::collections::BTreeMap;
use log::warn;
use rayon::prelude::*;
use serde::{ Deserialize, Serialize };
use crate::pool::{ CellPool, PoolResult };

/// Execution backend.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Evaluate everything on the calling thread.
    Serial,
    /// Use a [`CellPool`] of dedicated worker threads.
    #[default]
    Pool,
    /// Use rayon's global thread pool.
    Rayon,
}

/// Default number of workers: all logical cores but two, and at least one.
pub fn default_workers() -> usize { num_cpus::get().saturating_sub(2).max(1) }

/// Resolve a requested number of workers.
///
/// `None` gives [`default_workers`]; zero is treated as one, and requests
/// beyond the number of logical cores are clamped with a warning.
pub fn workers_distribution(workers_num: Option<usize>) -> usize {
    let cpus = num_cpus::get();
    match workers_num {
        None => default_workers(),
        Some(0) => 1,
        Some(n) if n > cpus => {
            warn!(
                "requested {n} workers but only {cpus} logical cores are \
                available; using {cpus}"
            );
            cpus
        },
        Some(n) => n,
    }
}

/// Evaluate `f` over every key with the given backend.
pub fn dispatch<K, V, F>(
    keys: Vec<K>,
    backend: Backend,
    workers: usize,
    f: F,
) -> PoolResult<BTreeMap<K, V>>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(&K) -> V + Send + Sync + 'static,
{
    match backend {
        Backend::Serial => {
            Ok(keys.into_iter().map(|k| { let v = f(&k); (k, v) }).collect())
        },
        Backend::Pool if workers <= 1 || keys.len() <= 1 => {
            dispatch(keys, Backend::Serial, 1, f)
        },
        Backend::Pool => {
            CellPool::new(workers.min(keys.len()), f).do_cells(keys)
        },
        Backend::Rayon => {
            Ok(
                keys.into_par_iter()
                    .map(|k| { let v = f(&k); (k, v) })
                    .collect::<Vec<_>>()
                    .into_iter()
                    .collect()
            )
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_agree() {
        let f = |k: &usize| (*k as f64).sqrt();
        let keys: Vec<usize> = (0..100).collect();
        let serial = dispatch(keys.clone(), Backend::Serial, 1, f).unwrap();
        let pool = dispatch(keys.clone(), Backend::Pool, 4, f).unwrap();
        let rayon = dispatch(keys, Backend::Rayon, 4, f).unwrap();
        assert_eq!(serial, pool);
        assert_eq!(serial, rayon);
    }

    #[test]
    fn workers_clamped() {
        assert_eq!(workers_distribution(Some(0)), 1);
        assert_eq!(workers_distribution(Some(1)), 1);
        assert!(workers_distribution(Some(usize::MAX)) <= num_cpus::get());
        assert!(workers_distribution(None) >= 1);
    }
}
