//! Fixed-size thread pool with a bounded queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::error::{PoolError, PoolResult};
use super::PoolStats;

/// Default queue capacity multiplier per worker.
pub const DEFAULT_QUEUE_MULTIPLIER: usize = 100;

struct Job<Req, Res> {
    request: Req,
    reply: oneshot::Sender<PoolResult<Res>>,
    queued_at: Instant,
}

#[derive(Default)]
struct Counters {
    pending: AtomicUsize,
    busy: AtomicUsize,
    executed: AtomicU64,
    timeouts: AtomicU64,
    rejected: AtomicU64,
    panics: AtomicU64,
}

/// Runs blocking jobs on named worker threads.
///
/// Each job is handed the id of the worker running it (`0..worker_count`),
/// so per-worker state can be addressed without locking across workers.
pub struct ThreadPool<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// `None` once shut down; dropping the sender stops the workers.
    sender: Mutex<Option<mpsc::SyncSender<Job<Req, Res>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    queue_capacity: usize,
    counters: Arc<Counters>,
    shutdown: AtomicBool,
    name: String,
}

impl<Req, Res> ThreadPool<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Pool with `num_workers` threads (0 = CPU count) and a queue of
    /// `num_workers * 100`.
    pub fn new<F>(num_workers: usize, name: impl Into<String>, handler: F) -> PoolResult<Self>
    where
        F: Fn(usize, Req) -> Res + Send + Sync + 'static,
    {
        let num_workers = if num_workers == 0 {
            num_cpus::get()
        } else {
            num_workers
        };
        Self::with_capacity(
            num_workers,
            num_workers * DEFAULT_QUEUE_MULTIPLIER,
            name,
            handler,
        )
    }

    /// Pool with an explicit queue capacity.
    pub fn with_capacity<F>(
        num_workers: usize,
        queue_capacity: usize,
        name: impl Into<String>,
        handler: F,
    ) -> PoolResult<Self>
    where
        F: Fn(usize, Req) -> Res + Send + Sync + 'static,
    {
        let name = name.into();
        let num_workers = num_workers.max(1);
        let (sender, receiver) = mpsc::sync_channel::<Job<Req, Res>>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);
        let counters = Arc::new(Counters::default());

        let pool = Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Vec::with_capacity(num_workers)),
            worker_count: num_workers,
            queue_capacity,
            counters: Arc::clone(&counters),
            shutdown: AtomicBool::new(false),
            name,
        };

        for id in 0..num_workers {
            let rx = Arc::clone(&receiver);
            let handler = Arc::clone(&handler);
            let counters = Arc::clone(&counters);

            let handle = thread::Builder::new()
                .name(format!("{}-{}", pool.name, id))
                .spawn(move || worker_loop(id, rx, handler, counters))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;

            pool.lock_workers().push(handle);
        }

        tracing::info!(
            pool = %pool.name,
            workers = num_workers,
            capacity = queue_capacity,
            "thread pool created"
        );

        Ok(pool)
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a job and return the channel its result arrives on.
    fn submit(&self, request: Req) -> PoolResult<oneshot::Receiver<PoolResult<Res>>> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::Shutdown);
        }

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(PoolError::Shutdown)?;

        let (reply, rx) = oneshot::channel();
        self.counters.pending.fetch_add(1, Ordering::SeqCst);

        let job = Job {
            request,
            reply,
            queued_at: Instant::now(),
        };

        if let Err(e) = sender.try_send(job) {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            return match e {
                mpsc::TrySendError::Full(_) => {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    Err(PoolError::QueueFull {
                        capacity: self.queue_capacity,
                        pending: self.counters.pending.load(Ordering::SeqCst),
                    })
                }
                mpsc::TrySendError::Disconnected(_) => Err(PoolError::Shutdown),
            };
        }

        Ok(rx)
    }

    /// Run a job and wait for its result.
    pub async fn execute(&self, request: Req) -> PoolResult<Res> {
        let rx = self.submit(request)?;
        rx.await.unwrap_or(Err(PoolError::ChannelClosed))
    }

    /// Run a job, giving up on the result after `timeout`.
    ///
    /// A timed-out job is abandoned, not cancelled: its worker finishes it
    /// and discards the result.
    pub async fn execute_with_timeout(&self, request: Req, timeout: Duration) -> PoolResult<Res> {
        let rx = self.submit(request)?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PoolError::ChannelClosed),
            Err(_) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Jobs queued but not yet picked up by a worker.
    pub fn pending_count(&self) -> usize {
        self.counters.pending.load(Ordering::SeqCst)
    }

    /// Jobs currently running.
    pub fn busy_count(&self) -> usize {
        self.counters.busy.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.worker_count(),
            total_executed: self.counters.executed.load(Ordering::Relaxed),
            busy: self.busy_count(),
            pending: self.pending_count(),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            panics: self.counters.panics.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs. Queued jobs still run.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!(pool = %self.name, "shutting down thread pool");

        // Workers exit once the queue drains and recv() sees the closed channel
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Wait for every worker thread to exit. Call after [`shutdown`](Self::shutdown).
    pub fn join(&self) {
        let handles: Vec<_> = self.lock_workers().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl<Req, Res> Drop for ThreadPool<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<Req, Res, F>(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job<Req, Res>>>>,
    handler: Arc<F>,
    counters: Arc<Counters>,
) where
    F: Fn(usize, Req) -> Res,
{
    tracing::debug!(worker = id, "worker started");

    loop {
        let job = {
            let guard = rx.lock().unwrap_or_else(|e| e.into_inner());
            guard.recv()
        };

        let Ok(Job {
            request,
            reply,
            queued_at,
        }) = job
        else {
            break;
        };

        counters.pending.fetch_sub(1, Ordering::SeqCst);
        counters.busy.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(worker = id, queue_wait_us = queued_at.elapsed().as_micros() as u64, "job started");

        let result = panic::catch_unwind(AssertUnwindSafe(|| (*handler)(id, request)))
            .map_err(|payload| {
                counters.panics.fetch_add(1, Ordering::Relaxed);
                let msg = panic_message(payload.as_ref());
                tracing::error!(worker = id, panic = %msg, "job panicked");
                PoolError::WorkerPanic(msg)
            });

        counters.busy.fetch_sub(1, Ordering::SeqCst);
        counters.executed.fetch_add(1, Ordering::Relaxed);

        // Receiver gone means the caller timed out; the result is dropped
        let _ = reply.send(result);
    }

    tracing::debug!(worker = id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
