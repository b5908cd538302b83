//! Bounded worker pool
//!
//! A fixed set of long-lived workers drains a bounded FIFO queue. Producers
//! never block: a full queue is reported as [`PoolError::Full`] straight
//! away and the caller decides what to do with the work instead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PoolError;
use crate::pool::metrics::{percent, PoolCounters, PoolMetrics, PoolStatus};

/// Default upper bound on waiting for workers during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Unit of work run by a pool worker.
pub type TaskFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

type TaskResult = anyhow::Result<()>;

struct Task {
    /// Only used in logs
    id: String,
    func: TaskFn,
    /// Abandons the task if it fires before a worker picks it up
    cancel: Option<CancellationToken>,
    result_tx: Option<oneshot::Sender<TaskResult>>,
}

// == Worker Pool ==
/// Fixed-size pool of workers draining a bounded task queue.
///
/// Task functions are synchronous and run on tokio's blocking thread pool,
/// one at a time per worker, so `active_tasks <= workers` always holds.
pub struct WorkerPool {
    name: Arc<str>,
    workers: usize,
    buffer_size: usize,
    /// `None` once intake is closed
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    shutdown: CancellationToken,
    counters: Arc<Mutex<PoolCounters>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    // == Constructor ==
    /// Creates a pool and starts all of its workers.
    ///
    /// Must be called from within a tokio runtime. `workers` and
    /// `buffer_size` are raised to at least 1.
    pub fn new(name: &str, workers: usize, buffer_size: usize) -> Arc<Self> {
        Self::with_shutdown_timeout(name, workers, buffer_size, DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn with_shutdown_timeout(
        name: &str,
        workers: usize,
        buffer_size: usize,
        shutdown_timeout: Duration,
    ) -> Arc<Self> {
        let workers = workers.max(1);
        let buffer_size = buffer_size.max(1);
        let name: Arc<str> = Arc::from(name);

        let (tx, rx) = mpsc::channel::<Task>(buffer_size);
        let rx = Arc::new(AsyncMutex::new(rx));
        let shutdown = CancellationToken::new();
        let counters = Arc::new(Mutex::new(PoolCounters::new()));

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&name),
                    Arc::clone(&rx),
                    shutdown.clone(),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        lock(&counters).status = PoolStatus::Running;
        info!(
            "Worker pool '{}' started with {} workers and buffer size {}",
            name, workers, buffer_size
        );

        Arc::new(Self {
            name,
            workers,
            buffer_size,
            sender: Mutex::new(Some(tx)),
            shutdown,
            counters,
            handles: Mutex::new(handles),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            shutdown_timeout,
        })
    }

    // == Submit ==
    /// Enqueues a task without waiting for it to run.
    ///
    /// Returns [`PoolError::Full`] immediately when the queue is at
    /// capacity. Failures of the task itself are logged and counted only.
    pub fn submit<F>(&self, id: impl Into<String>, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.enqueue(Task {
            id: id.into(),
            func: Box::new(f),
            cancel: None,
            result_tx: None,
        })
    }

    /// Like [`WorkerPool::submit`], but the task is dropped unstarted if
    /// `cancel` fires while it is still queued.
    pub fn submit_with_cancel<F>(
        &self,
        id: impl Into<String>,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<(), PoolError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }
        self.enqueue(Task {
            id: id.into(),
            func: Box::new(f),
            cancel: Some(cancel.clone()),
            result_tx: None,
        })
    }

    // == Submit And Wait ==
    /// Enqueues a task and waits for its outcome.
    ///
    /// Admission is the same as [`WorkerPool::submit`]. Once queued, the
    /// call resolves with the task's result, with [`PoolError::Cancelled`]
    /// when `cancel` fires, or with [`PoolError::ShuttingDown`] when the
    /// pool stops, whichever comes first. A task that already started keeps
    /// running after the caller gives up on it.
    pub async fn submit_and_wait<F>(
        &self,
        id: impl Into<String>,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<(), PoolError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }

        let (tx, rx) = oneshot::channel();
        self.enqueue(Task {
            id: id.into(),
            func: Box::new(f),
            cancel: Some(cancel.clone()),
            result_tx: Some(tx),
        })?;

        tokio::select! {
            biased;
            result = rx => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(PoolError::TaskFailed(err)),
                // Sender dropped without a result: the task was abandoned
                Err(_) if cancel.is_cancelled() => Err(PoolError::Cancelled),
                Err(_) => Err(PoolError::ShuttingDown),
            },
            _ = cancel.cancelled() => Err(PoolError::Cancelled),
            _ = self.shutdown.cancelled() => Err(PoolError::ShuttingDown),
        }
    }

    fn enqueue(&self, task: Task) -> Result<(), PoolError> {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::ShuttingDown);
        };

        match sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                debug!("Worker pool '{}' full, rejecting task {}", self.name, task.id);
                Err(PoolError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(PoolError::ShuttingDown),
        }
    }

    // == Metrics ==
    /// Point-in-time snapshot of queue, worker and task counters.
    pub fn metrics(&self) -> PoolMetrics {
        let queue_depth = self.queue_depth();
        let counters = lock(&self.counters);

        PoolMetrics {
            name: self.name.to_string(),
            workers: self.workers,
            buffer_size: self.buffer_size,
            queue_depth,
            active_tasks: counters.active_tasks,
            idle_workers: self.workers.saturating_sub(counters.active_tasks),
            total_tasks: counters.total_tasks,
            successful_tasks: counters.successful_tasks,
            failed_tasks: counters.failed_tasks,
            success_rate: percent(
                counters.successful_tasks as f64,
                counters.total_tasks as f64,
            ),
            average_task_duration_ms: counters.average_duration.as_secs_f64() * 1000.0,
            uptime_secs: self.started_at.elapsed().as_secs(),
            status: counters.status,
            started_at: self.started_at_utc,
            last_task_at: counters.last_task_at,
            stopped_at: counters.stopped_at,
        }
    }

    /// Tasks waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        lock(&self.sender)
            .as_ref()
            .map(|sender| self.buffer_size.saturating_sub(sender.capacity()))
            .unwrap_or(0)
    }

    pub fn status(&self) -> PoolStatus {
        lock(&self.counters).status
    }

    pub fn is_running(&self) -> bool {
        self.status() == PoolStatus::Running
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    // == Shutdown ==
    /// Stops intake, lets workers finish their current task and waits for
    /// them up to the shutdown timeout.
    ///
    /// Queued tasks that no worker picked up are dropped. Calling this more
    /// than once is harmless.
    pub async fn shutdown(&self) {
        {
            let mut counters = lock(&self.counters);
            if matches!(counters.status, PoolStatus::Stopping | PoolStatus::Stopped) {
                return;
            }
            counters.status = PoolStatus::Stopping;
        }
        info!("Stopping worker pool '{}'", self.name);

        lock(&self.sender).take();
        self.shutdown.cancel();

        let handles = std::mem::take(&mut *lock(&self.handles));
        let all_exited = futures::future::join_all(handles);
        if tokio::time::timeout(self.shutdown_timeout, all_exited)
            .await
            .is_err()
        {
            warn!(
                "Worker pool '{}' shutdown timed out after {:?}, some workers may not have finished cleanly",
                self.name, self.shutdown_timeout
            );
        }

        {
            let mut counters = lock(&self.counters);
            counters.status = PoolStatus::Stopped;
            counters.stopped_at = Some(Utc::now());
        }
        info!("Worker pool '{}' stopped", self.name);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("workers", &self.workers)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

// == Worker Loop ==
async fn run_worker(
    id: usize,
    pool: Arc<str>,
    rx: Arc<AsyncMutex<mpsc::Receiver<Task>>>,
    shutdown: CancellationToken,
    counters: Arc<Mutex<PoolCounters>>,
) {
    debug!("Worker {} started in pool '{}'", id, pool);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            task = async { rx.lock().await.recv().await } => task,
        };
        let Some(task) = next else {
            break;
        };

        if task.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            debug!("Task {} cancelled before start in pool '{}'", task.id, pool);
            continue;
        }

        execute(&pool, task, &counters).await;
    }

    debug!("Worker {} stopping in pool '{}'", id, pool);
}

async fn execute(pool: &str, task: Task, counters: &Mutex<PoolCounters>) {
    let Task {
        id, func, result_tx, ..
    } = task;

    lock(counters).active_tasks += 1;
    let started = Instant::now();

    let outcome = match tokio::task::spawn_blocking(func).await {
        Ok(result) => result,
        Err(join_err) => Err(anyhow!("task panicked: {}", join_err)),
    };
    let elapsed = started.elapsed();

    {
        let mut counters = lock(counters);
        counters.active_tasks -= 1;
        counters.record(outcome.is_ok(), elapsed);
    }

    if let Err(err) = &outcome {
        warn!("Task {} failed in pool '{}': {:#}", id, pool, err);
    }

    if let Some(tx) = result_tx {
        // Receiver gone means the caller stopped waiting
        let _ = tx.send(outcome);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
