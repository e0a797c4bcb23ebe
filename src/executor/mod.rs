//! Script execution on a pool of worker threads.
//!
//! The server talks to a [`ScriptExecutor`]. [`EngineExecutor`] runs each
//! request on a worker of a [`ThreadPool`]: the worker builds a fresh
//! [`RequestContext`] bound to its own thread index, arms the
//! [`WorkerHost`] slot for that index, executes through the [`Engine`] and
//! destroys the context once the [`Response`](crate::sapi::Response) is out.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────────┐
//! │   Request   │────▶│ mpsc channel │────▶│ Worker N             │
//! └─────────────┘     └──────────────┘     │  RequestContext(N)   │
//!                                          │  Engine::execute     │
//!                                          └──────────────────────┘
//! ```

mod host;
pub mod pool;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use host::{HostSlot, WorkerHost};
pub use pool::{PoolError, PoolStats, ThreadPool};

use crate::sapi::{self, Engine, ExecutionMode, RequestContext};
use crate::types::{ScriptOutcome, ScriptRequest};

/// Error type for script execution.
#[derive(Debug)]
pub enum ExecutorError {
    /// The request never produced a result (queue full, timeout, shutdown...).
    Pool(PoolError),
    /// The bridge refused or failed the request.
    Bridge(sapi::Error),
}

impl ExecutorError {
    /// Returns true if this error indicates the worker queue is full.
    pub fn is_queue_full(&self) -> bool {
        matches!(self, ExecutorError::Pool(e) if e.is_queue_full())
    }

    /// Returns true if this error indicates a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutorError::Pool(e) if e.is_timeout())
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, ExecutorError::Pool(e) if e.is_shutdown())
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Pool(e) => write!(f, "{}", e),
            ExecutorError::Bridge(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Pool(e) => Some(e),
            ExecutorError::Bridge(e) => Some(e),
        }
    }
}

impl From<PoolError> for ExecutorError {
    fn from(e: PoolError) -> Self {
        ExecutorError::Pool(e)
    }
}

impl From<sapi::Error> for ExecutorError {
    fn from(e: sapi::Error) -> Self {
        ExecutorError::Bridge(e)
    }
}

/// Trait for script execution backends.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Executes a script with the given request data.
    async fn execute(&self, request: ScriptRequest) -> Result<ScriptOutcome, ExecutorError>;

    /// Returns the name of this executor for logging purposes.
    fn name(&self) -> &'static str;

    /// Whether scripts really run or the fallback page is served.
    fn mode(&self) -> ExecutionMode;

    /// Whether new requests can still be accepted.
    fn is_ready(&self) -> bool {
        true
    }

    /// Worker pool counters, for executors backed by a pool.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }

    /// Shuts down the executor, releasing any resources. May block.
    fn shutdown(&self) {}
}

/// Runs requests through an [`Engine`] on a worker pool.
pub struct EngineExecutor {
    engine: Arc<Engine>,
    host: Arc<WorkerHost>,
    pool: ThreadPool<ScriptRequest, sapi::Result<ScriptOutcome>>,
    timeout: Option<Duration>,
}

impl EngineExecutor {
    /// Start `workers` threads (0 = CPU count) with a queue of
    /// `queue_capacity` (0 = workers * 100).
    ///
    /// The engine must already be started.
    pub fn new(
        engine: Arc<Engine>,
        workers: usize,
        queue_capacity: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, PoolError> {
        let workers = if workers == 0 {
            num_cpus::get()
        } else {
            workers
        };
        let queue_capacity = if queue_capacity == 0 {
            workers * pool::DEFAULT_QUEUE_MULTIPLIER
        } else {
            queue_capacity
        };

        let host = Arc::new(WorkerHost::new(workers));

        let pool = {
            let engine = Arc::clone(&engine);
            let host = Arc::clone(&host);
            ThreadPool::with_capacity(workers, queue_capacity, "php-worker", move |worker, req| {
                run_script(&engine, &host, worker, req)
            })?
        };

        Ok(Self {
            engine,
            host,
            pool,
            timeout,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn host(&self) -> &WorkerHost {
        &self.host
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn queue_capacity(&self) -> usize {
        self.pool.queue_capacity()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Worker-side execution of one request.
fn run_script(
    engine: &Engine,
    host: &WorkerHost,
    worker: usize,
    req: ScriptRequest,
) -> sapi::Result<ScriptOutcome> {
    let started = Instant::now();
    let thread_index = i32::try_from(worker).unwrap_or(i32::MAX);

    let mut ctx = RequestContext::new()?;
    ctx.set_thread_index(thread_index);
    ctx.set_document_root(req.document_root.as_deref());
    ctx.set_script_path(req.script_path.as_deref());
    for (key, value) in &req.server_vars {
        ctx.add_server_var(key, Some(value))?;
    }
    ctx.set_post_body(req.body.as_deref());

    host.begin(thread_index, req.cookies);
    let result = engine.execute(&mut ctx, &req.script, host);
    let slot = host.finish(thread_index);
    ctx.destroy();

    let response = result?;
    Ok(ScriptOutcome {
        response,
        thread_index,
        variables: slot.variables.len(),
        log_count: slot.log_count,
        elapsed: started.elapsed(),
    })
}

#[async_trait]
impl ScriptExecutor for EngineExecutor {
    async fn execute(&self, request: ScriptRequest) -> Result<ScriptOutcome, ExecutorError> {
        let result = match self.timeout {
            Some(timeout) => self.pool.execute_with_timeout(request, timeout).await?,
            None => self.pool.execute(request).await?,
        };
        Ok(result?)
    }

    fn name(&self) -> &'static str {
        self.engine.bridge().backend_name()
    }

    fn mode(&self) -> ExecutionMode {
        self.engine.mode()
    }

    fn is_ready(&self) -> bool {
        !self.pool.is_shutdown() && self.engine.is_started()
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(self.pool.stats())
    }

    fn shutdown(&self) {
        self.pool.shutdown();
        self.pool.join();
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sapi::bridge::tests::EchoInterpreter;
    use crate::sapi::{Bridge, Interpreter, Session};
    use std::collections::HashSet;

    fn started(bridge: Bridge) -> Arc<Engine> {
        let engine = Engine::new("8.3", bridge).unwrap();
        engine.startup().unwrap();
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_fallback_executor() {
        let executor = EngineExecutor::new(started(Bridge::fallback()), 2, 0, None).unwrap();
        assert_eq!(executor.mode(), ExecutionMode::Fallback);
        assert_eq!(executor.name(), "fallback");
        assert_eq!(executor.queue_capacity(), 200);

        let outcome = executor
            .execute(ScriptRequest::new("report.script").with_server_var("A", "1"))
            .await
            .unwrap();

        assert_eq!(outcome.response.status(), 200);
        assert!(outcome.thread_index >= 0 && outcome.thread_index < 2);
        assert_eq!(outcome.variables, 1);
        let body = std::str::from_utf8(outcome.response.body()).unwrap();
        assert!(body.contains("report.script"));
        assert!(body.contains(&format!("Thread: {}", outcome.thread_index)));
    }

    #[tokio::test]
    async fn test_full_executor_round_trip() {
        let executor = EngineExecutor::new(
            started(Bridge::with_interpreter(Box::new(EchoInterpreter))),
            1,
            10,
            Some(Duration::from_secs(5)),
        )
        .unwrap();

        let outcome = executor
            .execute(
                ScriptRequest::new("index.php")
                    .with_server_var("REQUEST_METHOD", "POST")
                    .with_body(bytes::Bytes::from_static(b"x=1")),
            )
            .await
            .unwrap();

        assert_eq!(outcome.thread_index, 0);
        assert_eq!(
            outcome.response.body().as_ref(),
            b"script=index.php;thread=0;REQUEST_METHOD=POST;post=x=1"
        );
        assert_eq!(executor.stats().total_executed, 1);
    }

    #[tokio::test]
    async fn test_empty_script_is_bridge_error() {
        let executor = EngineExecutor::new(started(Bridge::fallback()), 1, 10, None).unwrap();
        let err = executor.execute(ScriptRequest::new("")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Bridge(ref e) if e.is_usage()));
        assert!(!executor.engine().bridge().is_active(0));
    }

    #[tokio::test]
    async fn test_not_started_engine() {
        let engine = Arc::new(Engine::new("8.3", Bridge::fallback()).unwrap());
        let executor = EngineExecutor::new(engine, 1, 10, None).unwrap();
        let err = executor.execute(ScriptRequest::new("index.php")).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Bridge(sapi::Error::NotStarted)));
    }

    struct SlowInterpreter;

    impl Interpreter for SlowInterpreter {
        fn startup(&self, _version_hint: &str) -> Result<(), String> {
            Ok(())
        }
        fn shutdown(&self) {}
        fn execute(&self, session: &mut Session<'_>) -> Result<(), String> {
            std::thread::sleep(Duration::from_millis(300));
            session.write(b"late");
            Ok(())
        }
        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_timeout_abandons_request() {
        let executor = EngineExecutor::new(
            started(Bridge::with_interpreter(Box::new(SlowInterpreter))),
            1,
            10,
            Some(Duration::from_millis(50)),
        )
        .unwrap();

        let err = executor.execute(ScriptRequest::new("slow.php")).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_queue_full());

        // The abandoned execution still finishes and releases its index
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(executor.engine().bridge().active_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let executor = EngineExecutor::new(
            started(Bridge::with_interpreter(Box::new(EchoInterpreter))),
            4,
            100,
            None,
        )
        .unwrap();

        let futures: Vec<_> = (0..20)
            .map(|i| {
                executor.execute(
                    ScriptRequest::new(format!("r{}.php", i)).with_server_var("N", i.to_string()),
                )
            })
            .collect();

        let mut seen = HashSet::new();
        for (i, result) in futures_util::future::join_all(futures).await.into_iter().enumerate() {
            let outcome = result.unwrap();
            let expected = format!("script=r{0}.php;thread={1};N={0}", i, outcome.thread_index);
            assert_eq!(outcome.response.body().as_ref(), expected.as_bytes());
            seen.insert(outcome.thread_index);
        }
        assert!(seen.iter().all(|idx| (0..4).contains(idx)));
    }

    #[tokio::test]
    async fn test_shutdown() {
        let executor = EngineExecutor::new(started(Bridge::fallback()), 2, 10, None).unwrap();
        assert!(executor.is_ready());
        assert_eq!(executor.pool_stats().map(|s| s.workers), Some(2));

        executor.shutdown();
        assert!(!executor.engine().is_started());
        assert!(!executor.is_ready());

        let err = executor.execute(ScriptRequest::new("index.php")).await.unwrap_err();
        assert!(err.is_shutdown());
    }
}
