//! Batch-producing iteration over a [`Sequence`]

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::cache::SlotCache;
use crate::error::{Error, Result};
use crate::pool::{PoolProvider, WorkerPool};
use crate::sequence::Sequence;
use crate::shuffle::{fisher_yates, seeded_rng};

/// Configuration for a [`BatchLoader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Permute the index order at the start of every iteration
    pub shuffle: bool,

    /// Discard the final batch when it is shorter than the batch size
    pub drop_last: bool,

    /// How many batches to resolve ahead of the consumer (0 = none)
    pub prefetch: usize,

    /// Worker count for parallel fetching (1 = in-process, no pool)
    pub parallelism: usize,

    /// Keep the worker pool open across iterations
    pub persistent: bool,

    /// Memoize fetched values per index (only effective with a transform)
    pub enable_cache: bool,

    /// Base seed for reproducible shuffling; each iteration derives its
    /// generator from `seed + epoch`. `None` shuffles non-reproducibly.
    pub seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            shuffle: true,
            drop_last: false,
            prefetch: 0,
            parallelism: 1,
            persistent: true,
            enable_cache: false,
            seed: None,
        }
    }
}

impl LoaderConfig {
    /// Starts a builder over the default configuration.
    #[must_use]
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }
}

/// Builder for [`LoaderConfig`] with method chaining.
#[derive(Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    /// Set whether the index order is permuted each iteration.
    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Set whether a short final batch is discarded.
    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.config.drop_last = drop_last;
        self
    }

    /// Set how many batches are resolved ahead of the consumer.
    #[must_use]
    pub fn prefetch(mut self, prefetch: usize) -> Self {
        self.config.prefetch = prefetch;
        self
    }

    /// Set the worker count for parallel fetching (must be at least 1).
    #[must_use]
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    /// Set whether the worker pool survives across iterations.
    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.config.persistent = persistent;
        self
    }

    /// Enable per-index memoization of fetched values.
    ///
    /// Use with care: a full cache holds every transformed element in memory.
    #[must_use]
    pub fn enable_cache(mut self, enable_cache: bool) -> Self {
        self.config.enable_cache = enable_cache;
        self
    }

    /// Set the base seed for reproducible shuffling.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the final configuration.
    #[must_use]
    pub fn build(self) -> LoaderConfig {
        self.config
    }
}

/// An iterable pipeline that yields batches of (possibly transformed)
/// elements from a [`Sequence`].
///
/// Each call to [`iter`](BatchLoader::iter) is an independent pass: the
/// loader permutes the index space (when shuffling), windows it into batches
/// of `batch_size`, and resolves each batch through the cache and/or worker
/// pool as configured. Batches come out in window order; elements within a
/// batch keep index order regardless of parallel fetch.
///
/// The `iter` receiver is `&mut self`, so two concurrent iterations over the
/// same loader cannot be expressed — the pool handle and cache are not
/// reentrant.
pub struct BatchLoader<T> {
    sequence: Sequence<T>,
    batch_size: usize,
    config: LoaderConfig,
    /// Effective worker count; forced to 1 when there is no transform to
    /// distribute.
    parallelism: usize,
    cache: Option<SlotCache<T>>,
    provider: Option<Box<dyn PoolProvider<T>>>,
    pool: Option<Box<dyn WorkerPool<T>>>,
    epoch: usize,
}

impl<T: Clone + Send + 'static> BatchLoader<T> {
    /// Creates a loader without a worker-pool capability.
    ///
    /// Requesting `parallelism > 1` here is a configuration error; use
    /// [`with_pool`](BatchLoader::with_pool) to supply the capability.
    pub fn new(sequence: Sequence<T>, batch_size: usize, config: LoaderConfig) -> Result<Self> {
        Self::build(sequence, batch_size, config, None)
    }

    /// Creates a loader with an injected worker-pool capability.
    pub fn with_pool(
        sequence: Sequence<T>,
        batch_size: usize,
        config: LoaderConfig,
        provider: impl PoolProvider<T> + 'static,
    ) -> Result<Self> {
        Self::build(sequence, batch_size, config, Some(Box::new(provider)))
    }

    fn build(
        sequence: Sequence<T>,
        batch_size: usize,
        config: LoaderConfig,
        provider: Option<Box<dyn PoolProvider<T>>>,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidArgument(
                "batch size must be greater than 0".into(),
            ));
        }
        if config.parallelism == 0 {
            return Err(Error::InvalidArgument(
                "parallelism must be at least 1".into(),
            ));
        }
        if config.parallelism > 1 && provider.is_none() {
            return Err(Error::MissingCapability(format!(
                "parallelism {} requested but no worker-pool provider was supplied; \
                 construct the loader with BatchLoader::with_pool",
                config.parallelism
            )));
        }

        // Parallel mapping is meaningless without a function to distribute.
        let parallelism = if sequence.has_transform() {
            config.parallelism
        } else {
            1
        };

        // Raw, already-resident data gains nothing from a memo table.
        let cache = (config.enable_cache && sequence.has_transform())
            .then(|| SlotCache::new(sequence.len()));

        Ok(Self {
            sequence,
            batch_size,
            config,
            parallelism,
            cache,
            provider,
            pool: None,
            epoch: 0,
        })
    }

    /// The sequence this loader draws from.
    #[must_use]
    pub fn sequence(&self) -> &Sequence<T> {
        &self.sequence
    }

    /// Elements per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches one full iteration yields.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        let len = self.sequence.len();
        let mut batches = len / self.batch_size;
        if !self.config.drop_last && len % self.batch_size != 0 {
            batches += 1;
        }
        batches
    }

    /// Begins a fresh iteration over the sequence.
    ///
    /// Opens (or keeps) the persistent worker pool when parallel fetching is
    /// configured, permutes the index order when shuffling, and windows the
    /// indices into batches. The returned iterator yields each batch as a
    /// `Result`; fetch errors from the pool pass through unmodified.
    pub fn iter(&mut self) -> Result<Batches<'_, T>> {
        let epoch = self.epoch;
        self.epoch += 1;

        if self.config.persistent && self.parallelism > 1 && self.pool.is_none() {
            let provider = self.provider.as_ref().ok_or_else(|| {
                Error::MissingCapability("parallel fetch requires a worker-pool provider".into())
            })?;
            self.pool = Some(provider.open(self.parallelism)?);
            debug!(workers = self.parallelism, "opened persistent worker pool");
        }

        let mut indices: Vec<usize> = (0..self.sequence.len()).collect();
        if self.config.shuffle {
            let seed = self.config.seed.map(|s| s.wrapping_add(epoch as u64));
            fisher_yates(&mut indices, &mut seeded_rng(seed));
        }

        let windows: VecDeque<Vec<usize>> = indices
            .chunks(self.batch_size)
            .filter(|window| window.len() == self.batch_size || !self.config.drop_last)
            .map(<[usize]>::to_vec)
            .collect();

        debug!(
            epoch,
            batches = windows.len(),
            shuffle = self.config.shuffle,
            prefetch = self.config.prefetch,
            "beginning iteration"
        );

        Ok(Batches {
            loader: self,
            windows,
            buffer: VecDeque::new(),
            finished: false,
        })
    }

    /// Resolves one batch of indices, through the cache when present.
    fn resolve_batch(&mut self, indices: &[usize]) -> Result<Vec<T>> {
        let Some(mut cache) = self.cache.take() else {
            return self.fetch_batch(indices);
        };
        let result = self.resolve_through_cache(&mut cache, indices);
        self.cache = Some(cache);
        result
    }

    fn resolve_through_cache(
        &mut self,
        cache: &mut SlotCache<T>,
        indices: &[usize],
    ) -> Result<Vec<T>> {
        let missing: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&index| cache.get(index).is_none())
            .collect();

        if !missing.is_empty() {
            let fetched = self.fetch_batch(&missing)?;
            for (&index, value) in missing.iter().zip(fetched) {
                cache.set(index, value);
            }
        }

        // Hits come back in request order, including the slots filled by
        // this very call.
        indices
            .iter()
            .map(|&index| {
                cache.get(index).cloned().ok_or(Error::IndexOutOfBounds {
                    index,
                    len: cache.capacity(),
                })
            })
            .collect()
    }

    /// Fetches the values for a batch of indices, transformed.
    fn fetch_batch(&mut self, indices: &[usize]) -> Result<Vec<T>> {
        if self.parallelism <= 1 {
            // Single-process: the transform is applied inline by `at`.
            return indices.iter().map(|&index| self.sequence.at(index)).collect();
        }

        let raw = indices
            .iter()
            .map(|&index| self.sequence.get(index))
            .collect::<Result<Vec<T>>>()?;
        let Some(func) = self.sequence.transform_fn() else {
            return Ok(raw);
        };

        trace!(len = raw.len(), "mapping batch across workers");
        if self.config.persistent {
            match &self.pool {
                Some(pool) => pool.map(&func, raw),
                None => Err(Error::MissingCapability(
                    "persistent worker pool is not open".into(),
                )),
            }
        } else {
            let provider = self.provider.as_ref().ok_or_else(|| {
                Error::MissingCapability("parallel fetch requires a worker-pool provider".into())
            })?;
            // One-shot pool: opened, used for this batch, closed.
            let pool = provider.open(self.parallelism)?;
            let mapped = pool.map(&func, raw);
            pool.close();
            mapped
        }
    }

    /// Runs once the window list is exhausted.
    ///
    /// A persistent pool is retired only when a full cache guarantees its
    /// work will never be needed again; otherwise it stays open for the next
    /// iteration.
    fn finish_iteration(&mut self) {
        if self.cache.as_ref().is_some_and(SlotCache::is_full) {
            if let Some(pool) = self.pool.take() {
                debug!("cache is full; retiring persistent worker pool");
                pool.close();
            }
        }
    }
}

/// Pull-based batch iterator for one pass over a [`BatchLoader`].
///
/// With `prefetch > 0`, up to `prefetch` batches are resolved back-to-back
/// into a buffer before the first of them is released; batches already
/// buffered when the windows run out are still delivered before
/// end-of-iteration. With `prefetch == 0`, each pull resolves exactly one
/// batch.
pub struct Batches<'a, T: Clone + Send + 'static> {
    loader: &'a mut BatchLoader<T>,
    windows: VecDeque<Vec<usize>>,
    buffer: VecDeque<Result<Vec<T>>>,
    finished: bool,
}

impl<T: Clone + Send + 'static> Iterator for Batches<'_, T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = self.buffer.pop_front() {
                return Some(batch);
            }
            if self.finished {
                return None;
            }

            if self.loader.config.prefetch > 0 {
                for _ in 0..self.loader.config.prefetch {
                    match self.windows.pop_front() {
                        Some(window) => {
                            let batch = self.loader.resolve_batch(&window);
                            self.buffer.push_back(batch);
                        }
                        None => {
                            self.finished = true;
                            self.loader.finish_iteration();
                            break;
                        }
                    }
                }
            } else {
                match self.windows.pop_front() {
                    Some(window) => return Some(self.loader.resolve_batch(&window)),
                    None => {
                        self.finished = true;
                        self.loader.finish_iteration();
                        return None;
                    }
                }
            }
        }
    }
}

/// Builds a loader from any collection convertible into a [`Sequence`].
///
/// The "one sequence + batch size" construction shape; plain ordered
/// collections (`Vec<T>`, slices, arrays) convert automatically.
pub fn make_loader<T, D>(data: D, batch_size: usize, config: LoaderConfig) -> Result<BatchLoader<T>>
where
    T: Clone + Send + 'static,
    D: Into<Sequence<T>>,
{
    BatchLoader::new(data.into(), batch_size, config)
}

/// Builds two loaders over equal-length collections with a shared config.
///
/// Fails with [`Error::LengthMismatch`] when the collections disagree in
/// length; lock-step consumption of the two loaders is only meaningful for
/// paired data.
pub fn make_loader_pair<T, U, D, E>(
    first: D,
    second: E,
    batch_size: usize,
    config: LoaderConfig,
) -> Result<(BatchLoader<T>, BatchLoader<U>)>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
    D: Into<Sequence<T>>,
    E: Into<Sequence<U>>,
{
    let first = first.into();
    let second = second.into();
    if first.len() != second.len() {
        return Err(Error::LengthMismatch {
            left: first.len(),
            right: second.len(),
        });
    }
    Ok((
        BatchLoader::new(first, batch_size, config.clone())?,
        BatchLoader::new(second, batch_size, config)?,
    ))
}
