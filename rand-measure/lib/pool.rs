//! Simple thread pool for processing batches of purity cells.

use std::{ collections::BTreeMap, sync::Arc, thread };
use crossbeam::channel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to enqueue cells: dead thread")]
    DeadThread,

    #[error("failed to enqueue cells: closed sender channel")]
    ClosedSenderChannel,

    #[error("failed to receive cell result: receiver error: {0}")]
    ClosedReceiverChannel(channel::RecvError),

    #[error("encountered receiver error from within a thread: receiver error: {0}")]
    WorkerReceiverError(channel::RecvError),
}
use PoolError::*;
pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Clone, Debug)]
enum ToWorker<K> {
    Stop,
    Work(K),
}

#[derive(Clone, Debug)]
enum FromWorker<K, V> {
    RecvError(channel::RecvError),
    Output(K, V),
}

/// A simple thread pool to evaluate a fixed function over many keys in
/// parallel.
///
/// Workload between threads is automatically balanced by means of a
/// single-producer, multiple-consumer channel. Results arrive in the order in
/// which they finished, but are returned keyed so that the caller never
/// observes scheduling order. The pool is meant to be reused between batches
/// and is **not** thread-safe.
#[derive(Debug)]
pub struct CellPool<K, V> {
    threads: Vec<thread::JoinHandle<()>>,
    workers_in: channel::Sender<ToWorker<K>>,
    workers_out: channel::Receiver<FromWorker<K, V>>,
}

impl<K, V> CellPool<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Create a new thread pool of `nthreads` threads, each evaluating `f`.
    pub fn new<F>(nthreads: usize, f: F) -> Self
    where F: Fn(&K) -> V + Send + Sync + 'static
    {
        let f = Arc::new(f);
        let (tx_in, rx_in) = channel::unbounded();
        let (tx_out, rx_out) = channel::unbounded();
        let mut threads = Vec::with_capacity(nthreads);
        for _ in 0..nthreads {
            let worker_receiver = rx_in.clone();
            let worker_sender = tx_out.clone();
            let f = Arc::clone(&f);
            let th = thread::spawn(move || loop {
                match worker_receiver.recv() {
                    Ok(ToWorker::Stop) => { break; },
                    Ok(ToWorker::Work(key)) => {
                        let val = f(&key);
                        match worker_sender.send(FromWorker::Output(key, val)) {
                            Ok(()) => { continue; },
                            Err(err) => { panic!("sender error: {err}"); },
                        }
                    },
                    Err(err) => {
                        match worker_sender.send(FromWorker::RecvError(err)) {
                            Ok(()) => { panic!("receiver error"); },
                            Err(_) => { panic!("sender error: {err}"); },
                        }
                    },
                }
            });
            threads.push(th);
        }
        Self { threads, workers_in: tx_in, workers_out: rx_out }
    }

    /// Number of worker threads.
    pub fn nthreads(&self) -> usize { self.threads.len() }

    /// Enqueue a batch of keys to be distributed across all threads.
    ///
    /// This method will block until all enqueued keys have been processed.
    pub fn do_cells<I>(&self, keys: I) -> PoolResult<BTreeMap<K, V>>
    where
        I: IntoIterator<Item = K>,
        K: Ord,
    {
        if self.threads.iter().any(|th| th.is_finished()) {
            return Err(DeadThread);
        }
        let mut count: usize = 0;
        for key in keys.into_iter() {
            match self.workers_in.send(ToWorker::Work(key)) {
                Ok(()) => { count += 1; },
                Err(_) => { return Err(ClosedSenderChannel); },
            }
        }
        let mut output = BTreeMap::new();
        for _ in 0..count {
            match self.workers_out.recv() {
                Ok(FromWorker::Output(key, val)) => { output.insert(key, val); },
                Ok(FromWorker::RecvError(err)) => {
                    return Err(WorkerReceiverError(err));
                },
                Err(err) => { return Err(ClosedReceiverChannel(err)); },
            }
        }
        Ok(output)
    }
}

impl<K, V> Drop for CellPool<K, V> {
    fn drop(&mut self) {
        (0..self.threads.len())
            .for_each(|_| { self.workers_in.send(ToWorker::Stop).ok(); });
        self.threads.drain(..)
            .for_each(|th| { th.join().ok(); });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_keyed() {
        let pool: CellPool<usize, usize> = CellPool::new(3, |k: &usize| k * k);
        let out = pool.do_cells(0..50).unwrap();
        assert_eq!(out.len(), 50);
        assert!(out.iter().all(|(k, v)| *v == k * k));
        // reusable between batches
        let out = pool.do_cells([7, 3]).unwrap();
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec![(3, 9), (7, 49)]);
    }

    #[test]
    fn pool_empty_batch() {
        let pool: CellPool<usize, f64> = CellPool::new(2, |k: &usize| *k as f64);
        assert!(pool.do_cells(std::iter::empty()).unwrap().is_empty());
    }
}
