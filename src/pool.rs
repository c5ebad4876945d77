//! Worker-pool capability for distributing element transforms

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sequence::ElementFn;

/// An open pool of workers that can map a transform over a batch of elements.
///
/// `map` is synchronous, order-preserving, and length-preserving: the output
/// at position `i` is the transform applied to the input at position `i`,
/// whichever worker produced it.
pub trait WorkerPool<T>: Send {
    /// Maps `func` over `inputs` across the pool, preserving input order.
    fn map(&self, func: &ElementFn<T>, inputs: Vec<T>) -> Result<Vec<T>>;

    /// Shuts the pool down and releases its workers.
    fn close(self: Box<Self>);
}

/// A factory capability for opening worker pools.
///
/// A [`crate::BatchLoader`] holds one of these when parallel fetching was
/// requested; there is no process-wide pool registry.
pub trait PoolProvider<T>: Send + Sync {
    /// Opens a pool of `workers` workers.
    fn open(&self, workers: usize) -> Result<Box<dyn WorkerPool<T>>>;
}

struct Task<T> {
    position: usize,
    input: T,
    func: ElementFn<T>,
    reply: Sender<(usize, std::result::Result<T, String>)>,
}

/// A [`WorkerPool`] backed by OS threads and channels.
///
/// Workers pull tasks from a shared queue; each reply is tagged with the
/// input position so `map` can restore request order regardless of which
/// worker finished first. A transform panic is caught on the worker and
/// surfaced to the caller as [`Error::WorkerPool`]; the worker survives to
/// take the next task. Dropping the pool closes the task channel and joins
/// every worker.
pub struct ThreadPool<T> {
    task_tx: Option<Sender<Task<T>>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> ThreadPool<T> {
    /// Spawns a pool of `workers` worker threads.
    pub fn open(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidArgument(
                "a worker pool needs at least 1 worker".into(),
            ));
        }

        let (task_tx, task_rx) = unbounded::<Task<T>>();
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let task_rx = task_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("batch-worker-{worker_id}"))
                .spawn(move || worker_loop(&task_rx))
                .map_err(|e| Error::WorkerPool(format!("failed to spawn worker {worker_id}: {e}")))?;
            handles.push(handle);
        }

        debug!(workers, "opened thread pool");
        Ok(Self {
            task_tx: Some(task_tx),
            workers: handles,
        })
    }

    /// The conventional default worker count: one per available CPU.
    #[must_use]
    pub fn default_workers() -> usize {
        num_cpus::get()
    }
}

fn worker_loop<T>(tasks: &Receiver<Task<T>>) {
    for task in tasks.iter() {
        let Task {
            position,
            input,
            func,
            reply,
        } = task;
        let result = catch_unwind(AssertUnwindSafe(|| func(input)))
            .map_err(|_| format!("transform panicked while mapping element at position {position}"));
        // A send failure means the caller abandoned the batch; keep serving.
        let _ = reply.send((position, result));
    }
}

impl<T: Send + 'static> WorkerPool<T> for ThreadPool<T> {
    fn map(&self, func: &ElementFn<T>, inputs: Vec<T>) -> Result<Vec<T>> {
        let total = inputs.len();
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| Error::WorkerPool("pool is closed".into()))?;

        let (reply_tx, reply_rx) = unbounded();
        for (position, input) in inputs.into_iter().enumerate() {
            let task = Task {
                position,
                input,
                func: Arc::clone(func),
                reply: reply_tx.clone(),
            };
            task_tx.send(task).map_err(|_| {
                Error::WorkerPool("workers disconnected before the batch was submitted".into())
            })?;
        }
        drop(reply_tx);

        let mut replies: Vec<(usize, T)> = Vec::with_capacity(total);
        for _ in 0..total {
            let (position, result) = reply_rx.recv().map_err(|_| {
                Error::WorkerPool("a worker exited before completing the batch".into())
            })?;
            replies.push((position, result.map_err(Error::WorkerPool)?));
        }

        replies.sort_unstable_by_key(|&(position, _)| position);
        Ok(replies.into_iter().map(|(_, output)| output).collect())
    }

    fn close(self: Box<Self>) {
        drop(self);
    }
}

impl<T> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        // Closing the task channel lets every worker drain and exit.
        self.task_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("closed thread pool");
    }
}

/// Opens [`ThreadPool`]s on demand.
pub struct ThreadPoolProvider;

impl<T: Send + 'static> PoolProvider<T> for ThreadPoolProvider {
    fn open(&self, workers: usize) -> Result<Box<dyn WorkerPool<T>>> {
        Ok(Box::new(ThreadPool::open(workers)?))
    }
}
