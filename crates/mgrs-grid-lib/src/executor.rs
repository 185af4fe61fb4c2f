//! Background task submission for grid generation
//!
//! The render thread submits jobs through a [`TaskExecutor`] and keeps the returned
//! [`TaskHandle`] inside a [`TaskState`] slot. Each frame it polls the slot without
//! blocking; a finished result is moved into the slot and only then becomes visible to
//! the tree. Dropping a handle cancels the job, and whatever the job still produces is
//! discarded with the shared slot.

use crate::{GridError, Result};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of work handed to an executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a background task produced no value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task was cancelled")]
    Cancelled,

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was dropped before it could report a result")]
    Disconnected,
}

/// Runs jobs somewhere other than the caller's stack frame (or, for tests, inline)
pub trait TaskExecutor: Send + Sync {
    /// Schedule `job`. Jobs may run in any order and on any thread.
    fn execute(&self, job: Job);

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

impl dyn TaskExecutor {
    /// Submit a cancellable job and get a handle to its result
    ///
    /// The job receives the cancellation token and should check it between units of
    /// work. A panic inside the job is reported as [`TaskError::Panicked`].
    pub fn submit<T, F>(&self, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> std::result::Result<T, TaskError> + Send + 'static,
    {
        self.submit_then(job, || {})
    }

    /// Like [`submit`](Self::submit), calling `notify` once the result is in the slot
    ///
    /// A poll made from inside `notify` always finds the result. Cancelled jobs skip
    /// `notify`.
    pub fn submit_then<T, F, N>(&self, job: F, notify: N) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> std::result::Result<T, TaskError> + Send + 'static,
        N: FnOnce() + Send + 'static,
    {
        let shared = Arc::new(Slot::default());
        let token = CancelToken::default();

        let completion = Completion {
            slot: Some(Arc::clone(&shared)),
            notify: Some(Box::new(notify)),
        };
        let job_token = token.clone();
        self.execute(Box::new(move || {
            let result = if job_token.is_cancelled() {
                Err(TaskError::Cancelled)
            } else {
                panic::catch_unwind(AssertUnwindSafe(|| job(&job_token)))
                    .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload))))
            };
            completion.complete(result);
        }));

        TaskHandle {
            slot: shared,
            token,
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Cooperative cancellation flag shared between a handle and its job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancelled, for use with `?` inside jobs
    pub fn check(&self) -> std::result::Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}

struct Slot<T> {
    result: Mutex<Option<std::result::Result<T, TaskError>>>,
    done: AtomicBool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            result: Mutex::new(None),
            done: AtomicBool::new(false),
        }
    }
}

impl<T> Slot<T> {
    fn store(&self, result: std::result::Result<T, TaskError>) {
        let mut guard = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(result);
        self.done.store(true, Ordering::Release);
    }
}

/// Writes the job's result, then notifies; reports `Disconnected` if dropped without one
struct Completion<T> {
    slot: Option<Arc<Slot<T>>>,
    notify: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Completion<T> {
    fn complete(mut self, result: std::result::Result<T, TaskError>) {
        let cancelled = matches!(result, Err(TaskError::Cancelled));
        if let Some(slot) = self.slot.take() {
            slot.store(result);
        }
        let notify = self.notify.take();
        if !cancelled {
            if let Some(notify) = notify {
                notify();
            }
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.store(Err(TaskError::Disconnected));
            if let Some(notify) = self.notify.take() {
                notify();
            }
        }
    }
}

/// Owner's side of a submitted job
///
/// Dropping the handle cancels the job.
pub struct TaskHandle<T> {
    slot: Arc<Slot<T>>,
    token: CancelToken,
}

impl<T> TaskHandle<T> {
    /// True once a result (or error) is waiting
    pub fn is_done(&self) -> bool {
        self.slot.done.load(Ordering::Acquire)
    }

    /// Take the result if the job has finished. Never blocks.
    pub fn try_take(&mut self) -> Option<std::result::Result<T, TaskError>> {
        if !self.is_done() {
            return None;
        }
        self.slot
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("done", &self.is_done())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Single-slot lifecycle of a lazily generated value
#[derive(Debug, Default)]
pub enum TaskState<T> {
    #[default]
    Idle,
    Pending(TaskHandle<T>),
    Ready(T),
}

impl<T> TaskState<T> {
    /// Move a finished job's value into the slot
    ///
    /// Returns `Ok(true)` when the slot holds a value. On a failed job the slot goes
    /// back to `Idle` (so the next trigger retries) and the error is returned.
    pub fn poll(&mut self) -> std::result::Result<bool, TaskError> {
        if let TaskState::Pending(handle) = self {
            match handle.try_take() {
                None => return Ok(false),
                Some(Ok(value)) => *self = TaskState::Ready(value),
                Some(Err(e)) => {
                    *self = TaskState::Idle;
                    return Err(e);
                }
            }
        }
        Ok(matches!(self, TaskState::Ready(_)))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            TaskState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            TaskState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TaskState::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Pending(_))
    }

    /// Drop whatever the slot holds, cancelling a pending job
    pub fn reset(&mut self) {
        if let TaskState::Pending(handle) = self {
            handle.cancel();
        }
        *self = TaskState::Idle;
    }
}

/// Rayon thread pool executor
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Build a dedicated pool with `threads` workers (0 picks rayon's default)
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mgrs-grid-{i}"))
            .build()
            .map_err(|e| GridError::Executor(e.to_string()))?;
        tracing::debug!(threads = pool.current_num_threads(), "Grid worker pool started");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl TaskExecutor for RayonExecutor {
    fn execute(&self, job: Job) {
        self.pool.spawn(job);
    }

    fn name(&self) -> &'static str {
        "rayon"
    }
}

/// Runs every job synchronously inside `execute`
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}

/// Holds jobs until [`QueuedExecutor::run_all`] is called
///
/// Lets tests and single-threaded hosts observe the pending state deterministically.
#[derive(Default)]
pub struct QueuedExecutor {
    queue: Mutex<VecDeque<Job>>,
}

impl QueuedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run queued jobs (including ones queued while running) until the queue is empty.
    /// Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            // Lock released before the job runs so jobs may enqueue more work
            let job = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Drop every queued job without running it
    pub fn discard_all(&self) -> usize {
        let jobs: Vec<Job> = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        jobs.len()
    }
}

impl TaskExecutor for QueuedExecutor {
    fn execute(&self, job: Job) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
    }

    fn name(&self) -> &'static str {
        "queued"
    }
}

/// Tokio blocking-pool executor
#[cfg(feature = "tokio")]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running inside
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| GridError::Executor(e.to_string()))
    }
}

#[cfg(feature = "tokio")]
impl TaskExecutor for TokioExecutor {
    fn execute(&self, job: Job) {
        // Detached: the result travels through the task handle, not the join handle
        drop(self.handle.spawn_blocking(job));
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}
