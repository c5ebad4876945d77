//! Batch-producing loading pipeline over in-memory sequences
//!
//! This crate turns an owned, in-memory sequence of opaque elements into a
//! batch-producing pipeline suitable for feeding a downstream consumer such
//! as a training loop. A [`Sequence`] is an immutable-value wrapper that
//! supports indexed reads, a composed deferred transform, eager mapping,
//! folding, and filtering; a [`BatchLoader`] windows the sequence into
//! batches with optional shuffling, per-index caching, worker-pool
//! parallelism, and bounded prefetch.
//!
//! The loader is a cooperative pull-based producer: the consumer drives
//! iteration batch by batch, and the only true parallelism is the worker
//! pool distributing the sequence's deferred transform.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod loader;
pub mod pool;
pub mod sequence;
pub mod shuffle;

// Re-export key types for convenience
pub use cache::SlotCache;
pub use error::{Error, Result};
pub use loader::{make_loader, make_loader_pair, BatchLoader, Batches, LoaderConfig};
pub use pool::{PoolProvider, ThreadPool, ThreadPoolProvider, WorkerPool};
pub use sequence::{ElementFn, Sequence};
pub use shuffle::{permutation, shuffle, shuffle_pair};
