// DataLoader: batches samples drawn by a sampler, optionally prefetching
//
// With `workers == 0` every batch is loaded on the caller's thread when it is
// pulled. Otherwise a producer thread builds batches ahead of the consumer into
// a bounded channel, loading the samples of each batch on a rayon pool of
// `workers` threads.
//
// Every sample gets its own augmentation seed, drawn from the loader's rng in
// visiting order, so a seeded loader yields the same batches for any worker
// count.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use log::debug;
use netprune_core::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::dataset::{Dataset, Sample};
use crate::error::{DataError, DataResult};
use crate::sampler::Sampler;
use crate::transform::{Compose, Transform};

/// Configuration for a [`DataLoader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of samples per batch. The last batch of a pass may be shorter.
    pub batch_size: usize,
    /// Worker threads loading samples. 0 loads on the caller's thread.
    pub workers: usize,
    /// Batches buffered ahead per worker.
    pub prefetch_factor: usize,
    /// Request page-locked batch memory for faster device transfer.
    /// Host-only tensors ignore it.
    pub pin_memory: bool,
    /// Seeds augmentation randomness. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            workers: 0,
            prefetch_factor: 2,
            pin_memory: false,
            seed: None,
        }
    }
}

impl LoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }
    pub fn prefetch_factor(mut self, pf: usize) -> Self {
        self.prefetch_factor = pf;
        self
    }
    pub fn pin_memory(mut self, pin: bool) -> Self {
        self.pin_memory = pin;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// One mini-batch.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[B, C, H, W]` transformed images.
    pub inputs: Tensor<f32>,
    pub labels: Vec<usize>,
    /// Dataset indices the batch was drawn from, in batch order.
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Work for one batch: which samples to load and the seed for each.
struct BatchPlan {
    indices: Vec<usize>,
    seeds: Vec<u64>,
}

/// Iterates a dataset view in mini-batches. Each call to [`iter`](DataLoader::iter)
/// starts a new pass over the sampler.
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    transform: Arc<Compose>,
    sampler: Box<dyn Sampler>,
    config: LoaderConfig,
    rng: StdRng,
    pool: Option<Arc<ThreadPool>>,
}

impl DataLoader {
    pub fn new(
        dataset: Arc<dyn Dataset>,
        transform: Arc<Compose>,
        sampler: Box<dyn Sampler>,
        config: LoaderConfig,
    ) -> DataResult<Self> {
        if config.batch_size == 0 {
            return Err(DataError::InvalidConfig("batch_size must be positive".into()));
        }
        let pool = if config.workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(|i| format!("netprune-worker-{i}"))
                .build()
                .map_err(|e| DataError::Worker(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(DataLoader {
            dataset,
            transform,
            sampler,
            config,
            rng,
            pool,
        })
    }

    /// Number of batches per pass.
    pub fn len(&self) -> usize {
        self.sampler.len().div_ceil(self.config.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.sampler.is_empty()
    }

    /// Number of samples per pass.
    pub fn num_samples(&self) -> usize {
        self.sampler.len()
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn pin_memory(&self) -> bool {
        self.config.pin_memory
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.dataset
    }

    /// Start a new pass.
    pub fn iter(&mut self) -> DataResult<Batches> {
        let order = self.sampler.epoch();
        let plans: Vec<BatchPlan> = order
            .chunks(self.config.batch_size)
            .map(|chunk| BatchPlan {
                indices: chunk.to_vec(),
                seeds: chunk.iter().map(|_| self.rng.gen()).collect(),
            })
            .collect();
        debug!(
            "{}: starting pass of {} samples in {} batches",
            self.dataset.name(),
            order.len(),
            plans.len()
        );

        let remaining = plans.len();
        let inner = match &self.pool {
            None => Inner::Inline {
                dataset: self.dataset.clone(),
                transform: self.transform.clone(),
                plans: plans.into_iter(),
            },
            Some(pool) => {
                let capacity = self.config.prefetch_factor.max(1) * self.config.workers;
                let (tx, rx) = mpsc::sync_channel::<DataResult<Batch>>(capacity);
                let dataset = self.dataset.clone();
                let transform = self.transform.clone();
                let pool = pool.clone();

                let handle = thread::Builder::new()
                    .name(format!("netprune-prefetch-{}", dataset.name()))
                    .spawn(move || {
                        for plan in plans {
                            let result = pool
                                .install(|| load_batch_parallel(&*dataset, &transform, &plan));
                            // receiver dropped: the consumer stopped early
                            if tx.send(result).is_err() {
                                break;
                            }
                        }
                    })?;

                Inner::Prefetch {
                    rx: Some(rx),
                    handle: Some(handle),
                }
            }
        };

        Ok(Batches { inner, remaining })
    }
}

enum Inner {
    Inline {
        dataset: Arc<dyn Dataset>,
        transform: Arc<Compose>,
        plans: std::vec::IntoIter<BatchPlan>,
    },
    Prefetch {
        rx: Option<mpsc::Receiver<DataResult<Batch>>>,
        handle: Option<thread::JoinHandle<()>>,
    },
}

/// Batches of one pass. Dropping it early stops any prefetching.
pub struct Batches {
    inner: Inner,
    remaining: usize,
}

impl Iterator for Batches {
    type Item = DataResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = match &mut self.inner {
            Inner::Inline {
                dataset,
                transform,
                plans,
            } => plans
                .next()
                .map(|plan| load_batch(&**dataset, &**transform, &plan)),
            Inner::Prefetch { rx, .. } => rx.as_ref().and_then(|rx| rx.recv().ok()),
        };
        match item {
            Some(batch) => {
                self.remaining -= 1;
                Some(batch)
            }
            None => {
                // producer exited before finishing the pass
                self.remaining = 0;
                Some(Err(DataError::Worker("prefetch thread stopped early".into())))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl Drop for Batches {
    fn drop(&mut self) {
        if let Inner::Prefetch { rx, handle } = &mut self.inner {
            // closing the channel unblocks a producer waiting to send
            drop(rx.take());
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn load_sample(
    dataset: &dyn Dataset,
    transform: &Compose,
    index: usize,
    seed: u64,
) -> DataResult<Sample> {
    let sample = dataset.get(index)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let image = transform.apply(sample.image, &mut rng)?;
    Ok(Sample {
        image,
        label: sample.label,
    })
}

fn load_batch(dataset: &dyn Dataset, transform: &Compose, plan: &BatchPlan) -> DataResult<Batch> {
    let samples = plan
        .indices
        .iter()
        .zip(&plan.seeds)
        .map(|(&index, &seed)| load_sample(dataset, transform, index, seed))
        .collect::<DataResult<Vec<_>>>()?;
    collate(samples, plan)
}

fn load_batch_parallel(
    dataset: &dyn Dataset,
    transform: &Compose,
    plan: &BatchPlan,
) -> DataResult<Batch> {
    let samples = plan
        .indices
        .par_iter()
        .zip(plan.seeds.par_iter())
        .map(|(&index, &seed)| load_sample(dataset, transform, index, seed))
        .collect::<DataResult<Vec<_>>>()?;
    collate(samples, plan)
}

/// Stack per-sample images into `[B, C, H, W]` and gather labels.
fn collate(samples: Vec<Sample>, plan: &BatchPlan) -> DataResult<Batch> {
    let mut images = Vec::with_capacity(samples.len());
    let mut labels = Vec::with_capacity(samples.len());
    for s in samples {
        images.push(s.image);
        labels.push(s.label);
    }
    Ok(Batch {
        inputs: Tensor::stack(&images)?,
        labels,
        indices: plan.indices.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TensorDataset;
    use crate::sampler::{SequentialSampler, SubsetRandomSampler};
    use crate::transform::{RandomCrop, RandomHorizontalFlip, ToTensor};
    use std::collections::HashSet;

    fn dataset(n: usize) -> Arc<dyn Dataset> {
        let data: Vec<f32> = (0..n * 3 * 4 * 4).map(|v| (v % 256) as f32).collect();
        let images = Tensor::new(data, vec![n, 3, 4, 4]).unwrap();
        let labels = (0..n).map(|i| i % 10).collect();
        Arc::new(TensorDataset::new(images, labels).unwrap())
    }

    fn augment() -> Arc<Compose> {
        Arc::new(
            Compose::new()
                .then(RandomCrop::new(4, 1))
                .then(RandomHorizontalFlip::new(0.5))
                .then(ToTensor),
        )
    }

    fn drain(loader: &mut DataLoader) -> Vec<Batch> {
        loader
            .iter()
            .unwrap()
            .collect::<DataResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_sequential_batches() {
        let mut loader = DataLoader::new(
            dataset(10),
            Arc::new(Compose::new()),
            Box::new(SequentialSampler::new(10)),
            LoaderConfig::default().batch_size(4),
        )
        .unwrap();

        assert_eq!(loader.len(), 3);
        let batches = drain(&mut loader);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].inputs.shape_vec(), vec![4, 3, 4, 4]);
        assert_eq!(batches[2].len(), 2);
        assert_eq!(batches[2].indices, vec![8, 9]);
        assert_eq!(batches[1].labels, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_sequential_order_is_stable_across_passes() {
        let mut loader = DataLoader::new(
            dataset(9),
            Arc::new(Compose::new().then(ToTensor)),
            Box::new(SequentialSampler::new(9)),
            LoaderConfig::default().batch_size(2).workers(2),
        )
        .unwrap();

        let first = drain(&mut loader);
        let second = drain(&mut loader);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.indices, b.indices);
            assert_eq!(a.inputs, b.inputs);
        }
    }

    #[test]
    fn test_subset_sampler_only_visits_subset() {
        let subset: Vec<usize> = (0..20).filter(|i| i % 3 == 0).collect();
        let mut loader = DataLoader::new(
            dataset(20),
            augment(),
            Box::new(SubsetRandomSampler::new(subset.clone(), Some(4))),
            LoaderConfig::default().batch_size(3).workers(2).seed(Some(4)),
        )
        .unwrap();

        let seen: Vec<usize> = drain(&mut loader)
            .into_iter()
            .flat_map(|b| b.indices)
            .collect();
        assert_eq!(seen.len(), subset.len());
        let seen: HashSet<usize> = seen.into_iter().collect();
        assert_eq!(seen, subset.into_iter().collect());
    }

    #[test]
    fn test_worker_count_does_not_change_seeded_output() {
        let make = |workers| {
            DataLoader::new(
                dataset(16),
                augment(),
                Box::new(SubsetRandomSampler::new((0..16).collect(), Some(8))),
                LoaderConfig::default().batch_size(5).workers(workers).seed(Some(8)),
            )
            .unwrap()
        };
        let inline = drain(&mut make(0));
        let threaded = drain(&mut make(3));
        assert_eq!(inline.len(), threaded.len());
        for (a, b) in inline.iter().zip(&threaded) {
            assert_eq!(a.indices, b.indices);
            assert_eq!(a.inputs, b.inputs);
        }
    }

    #[test]
    fn test_dropping_mid_pass_stops_prefetch() {
        let mut loader = DataLoader::new(
            dataset(40),
            augment(),
            Box::new(SequentialSampler::new(40)),
            LoaderConfig::default().batch_size(2).workers(2).prefetch_factor(1),
        )
        .unwrap();

        let mut batches = loader.iter().unwrap();
        assert!(batches.next().unwrap().is_ok());
        drop(batches);

        // the loader is still usable afterwards
        assert_eq!(drain(&mut loader).len(), 20);
    }

    #[test]
    fn test_out_of_range_index_surfaces_as_error() {
        let mut loader = DataLoader::new(
            dataset(4),
            Arc::new(Compose::new()),
            Box::new(SubsetRandomSampler::new(vec![1, 9], None)),
            LoaderConfig::default().batch_size(2),
        )
        .unwrap();

        let results: Vec<DataResult<Batch>> = loader.iter().unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DataError::IndexOutOfRange { index: 9, .. })));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let result = DataLoader::new(
            dataset(4),
            Arc::new(Compose::new()),
            Box::new(SequentialSampler::new(4)),
            LoaderConfig::default().batch_size(0),
        );
        assert!(matches!(result, Err(DataError::InvalidConfig(_))));
    }

    #[test]
    fn test_pin_memory_flag_is_kept() {
        let loader = DataLoader::new(
            dataset(4),
            Arc::new(Compose::new()),
            Box::new(SequentialSampler::new(4)),
            LoaderConfig::default().pin_memory(true),
        )
        .unwrap();
        assert!(loader.pin_memory());
        assert_eq!(loader.num_samples(), 4);
    }
}
