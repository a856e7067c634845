use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    thread::{self, JoinHandle},
    vec,
};

use log::warn;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{dataset::TensorDataset, tensor::PoseBatch};

/// The amount of batches every prefetch worker may hold ahead of consumption.
const PREFETCH_DEPTH: usize = 2;

/// Groups the examples of a `TensorDataset` into mini-batches.
///
/// The order of the examples is drawn from a seeded rng when shuffling, so two loaders built
/// with the same seed yield the same batches epoch after epoch, regardless of the amount of
/// prefetch workers.
#[derive(Debug)]
pub struct DataLoader {
    dataset: Arc<TensorDataset>,
    batch_size: NonZeroUsize,
    shuffle: Option<StdRng>,
    workers: usize,
}

impl DataLoader {
    /// Creates a new sequential `DataLoader` without prefetch workers.
    pub fn new(dataset: Arc<TensorDataset>, batch_size: NonZeroUsize) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle: None,
            workers: 0,
        }
    }

    /// Reshuffles the examples on every epoch, starting from `seed`.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Assembles the batches in `workers` background threads, `0` assembles them inline.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn dataset(&self) -> &TensorDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Returns the amount of batches in one pass.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size.get())
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&mut self) -> Batches {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();

        if let Some(rng) = &mut self.shuffle {
            order.shuffle(rng);
        }

        let chunks: Vec<Vec<usize>> = order
            .chunks(self.batch_size.get())
            .map(<[usize]>::to_vec)
            .collect();

        let source = match self.workers {
            0 => Source::Inline {
                dataset: Arc::clone(&self.dataset),
                chunks: chunks.into_iter(),
            },
            n => Source::prefetch(Arc::clone(&self.dataset), chunks, n),
        };

        Batches { source }
    }
}

/// An iterator over the batches of one pass.
pub struct Batches {
    source: Source,
}

enum Source {
    Inline {
        dataset: Arc<TensorDataset>,
        chunks: vec::IntoIter<Vec<usize>>,
    },
    Prefetch {
        receivers: Vec<Receiver<PoseBatch>>,
        handles: Vec<JoinHandle<()>>,
        next: usize,
        remaining: usize,
    },
}

impl Source {
    /// Spawns `workers` threads, batch `k` is assembled by worker `k % workers`.
    fn prefetch(dataset: Arc<TensorDataset>, chunks: Vec<Vec<usize>>, workers: usize) -> Self {
        let remaining = chunks.len();
        let workers = workers.min(remaining).max(1);

        let mut assigned: Vec<Vec<Vec<usize>>> = vec![Vec::new(); workers];
        for (k, chunk) in chunks.iter().enumerate() {
            assigned[k % workers].push(chunk.clone());
        }

        let mut receivers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for (id, own) in assigned.into_iter().enumerate() {
            let (tx, rx) = mpsc::sync_channel(PREFETCH_DEPTH);
            let shared = Arc::clone(&dataset);

            let spawned = thread::Builder::new()
                .name(format!("dataloader-{id}"))
                .spawn(move || {
                    for chunk in own {
                        // The consumer hung up, e.g. on a dry run.
                        if tx.send(shared.batch(&chunk)).is_err() {
                            break;
                        }
                    }
                });

            match spawned {
                Ok(handle) => {
                    receivers.push(rx);
                    handles.push(handle);
                }
                Err(e) => {
                    warn!("failed to spawn dataloader worker {id}: {e}, assembling batches inline");
                    drop(receivers);
                    join_all(handles);

                    return Source::Inline {
                        dataset,
                        chunks: chunks.into_iter(),
                    };
                }
            }
        }

        Source::Prefetch {
            receivers,
            handles,
            next: 0,
            remaining,
        }
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("a dataloader worker panicked");
        }
    }
}

impl Iterator for Batches {
    type Item = PoseBatch;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Inline { dataset, chunks } => {
                let chunk = chunks.next()?;
                Some(dataset.batch(&chunk))
            }
            Source::Prefetch {
                receivers,
                next,
                remaining,
                ..
            } => {
                if *remaining == 0 {
                    return None;
                }

                let rx = &receivers[*next % receivers.len()];
                match rx.recv() {
                    Ok(batch) => {
                        *next += 1;
                        *remaining -= 1;
                        Some(batch)
                    }
                    Err(_) => {
                        warn!("dataloader worker exited with {remaining} batches left");
                        *remaining = 0;
                        None
                    }
                }
            }
        }
    }
}

impl Drop for Batches {
    fn drop(&mut self) {
        if let Source::Prefetch {
            receivers, handles, ..
        } = &mut self.source
        {
            // Hanging up first unblocks workers stuck on a full channel.
            receivers.clear();
            join_all(std::mem::take(handles));
        }
    }
}
