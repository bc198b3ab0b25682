//! Worker pool
//!
//! Owns a fixed set of execution workers and correlates asynchronous
//! outcomes back to callers. All bookkeeping (worker records, pending
//! tasks, backlog) is owned by a single event-loop task; workers and
//! callers interact with it exclusively through messages, so there is one
//! serialized write path even though the workers run in parallel.
//!
//! Dispatch is a blocking hand-off: jobs wait in a FIFO backlog and are
//! handed to a worker the moment one frees up. Timeouts abandon the task
//! (its pending entry is removed and a late outcome is discarded) but do
//! not interrupt the worker, which runs its current job to completion.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::extract::{ExtractError, ExtractResult};

use super::worker::{spawn_worker, Job, JobRunner, WorkerHandle, WorkerJob};

/// Snapshot of pool bookkeeping, for logging and tests.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: usize,
    pub idle: usize,
    pub busy: usize,
    pub pending: usize,
}

/// Messages handled by the pool's event loop.
pub(super) enum PoolMessage {
    Execute {
        job: Job,
        timeout: Duration,
        reply: oneshot::Sender<Result<ExtractResult, ExtractError>>,
    },
    Completed {
        worker_id: usize,
        correlation_id: Uuid,
        result: Result<ExtractResult, ExtractError>,
    },
    Crashed {
        worker_id: usize,
        correlation_id: Uuid,
        message: String,
    },
    TimedOut {
        correlation_id: Uuid,
    },
    Stats {
        reply: oneshot::Sender<PoolStats>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// A registered task awaiting its outcome. Each entry is resolved or
/// rejected exactly once, then removed.
struct PendingTask {
    reply: oneshot::Sender<Result<ExtractResult, ExtractError>>,
    /// Present until the task is dispatched to a worker.
    job: Option<Job>,
    timeout_ms: u64,
}

/// Handle to a running worker pool. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<PoolMessage>,
}

impl WorkerPool {
    /// Start a pool of `size` workers running `runner`.
    pub fn new(size: usize, runner: JobRunner) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let loop_tx = tx.clone();
        tokio::spawn(async move {
            PoolLoop::new(size, runner, loop_tx, rx).run().await;
        });
        Self { tx }
    }

    /// Submit a job and wait for its outcome, up to `timeout`.
    pub async fn execute(
        &self,
        job: Job,
        timeout: Duration,
    ) -> Result<ExtractResult, ExtractError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PoolMessage::Execute {
                job,
                timeout,
                reply,
            })
            .map_err(|_| ExtractError::PoolClosed)?;
        rx.await.map_err(|_| ExtractError::PoolClosed)?
    }

    /// Stop accepting jobs and wait for every worker to terminate.
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(PoolMessage::Shutdown { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Current bookkeeping snapshot.
    pub async fn stats(&self) -> Option<PoolStats> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(PoolMessage::Stats { reply }).ok()?;
        rx.await.ok()
    }
}

/// Event-loop state. Exclusive owner of every map the pool mutates.
struct PoolLoop {
    runner: JobRunner,
    tx: mpsc::UnboundedSender<PoolMessage>,
    rx: mpsc::UnboundedReceiver<PoolMessage>,
    workers: HashMap<usize, WorkerHandle>,
    idle: VecDeque<usize>,
    backlog: VecDeque<Uuid>,
    pending: HashMap<Uuid, PendingTask>,
    next_worker_id: usize,
    shutdown: Option<oneshot::Sender<()>>,
}

impl PoolLoop {
    fn new(
        size: usize,
        runner: JobRunner,
        tx: mpsc::UnboundedSender<PoolMessage>,
        rx: mpsc::UnboundedReceiver<PoolMessage>,
    ) -> Self {
        let mut state = Self {
            runner,
            tx,
            rx,
            workers: HashMap::new(),
            idle: VecDeque::new(),
            backlog: VecDeque::new(),
            pending: HashMap::new(),
            next_worker_id: 0,
            shutdown: None,
        };
        for _ in 0..size.max(1) {
            state.add_worker();
        }
        tracing::info!(pool_size = state.workers.len(), "worker pool started");
        state
    }

    fn add_worker(&mut self) {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        let handle = spawn_worker(id, self.runner.clone(), self.tx.clone());
        self.workers.insert(id, handle);
        self.idle.push_back(id);
    }

    async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                PoolMessage::Execute {
                    job,
                    timeout,
                    reply,
                } => self.handle_execute(job, timeout, reply),
                PoolMessage::Completed {
                    worker_id,
                    correlation_id,
                    result,
                } => self.handle_completed(worker_id, correlation_id, result),
                PoolMessage::Crashed {
                    worker_id,
                    correlation_id,
                    message,
                } => self.handle_crashed(worker_id, correlation_id, message),
                PoolMessage::TimedOut { correlation_id } => self.handle_timeout(correlation_id),
                PoolMessage::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                PoolMessage::Shutdown { done } => self.begin_shutdown(done),
            }

            if self.shutdown.is_some() && self.no_worker_busy() {
                self.finish_shutdown();
                break;
            }
        }
    }

    fn handle_execute(
        &mut self,
        job: Job,
        timeout: Duration,
        reply: oneshot::Sender<Result<ExtractResult, ExtractError>>,
    ) {
        if self.shutdown.is_some() {
            let _ = reply.send(Err(ExtractError::PoolClosed));
            return;
        }

        let correlation_id = Uuid::new_v4();
        let timeout_ms = timeout.as_millis() as u64;
        self.pending.insert(
            correlation_id,
            PendingTask {
                reply,
                job: Some(job),
                timeout_ms,
            },
        );
        self.backlog.push_back(correlation_id);

        // Arm the deadline. The loop rejects the task when it fires, unless
        // an outcome got there first.
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(PoolMessage::TimedOut { correlation_id });
        });

        self.dispatch();
    }

    /// Hand backlog jobs to idle workers, FIFO on both sides.
    fn dispatch(&mut self) {
        while !self.idle.is_empty() {
            // Skip backlog entries whose task already timed out.
            let correlation_id = loop {
                match self.backlog.pop_front() {
                    Some(id) if self.pending.contains_key(&id) => break id,
                    Some(_) => continue,
                    None => return,
                }
            };

            let worker_id = match self.idle.pop_front() {
                Some(id) => id,
                None => {
                    self.backlog.push_front(correlation_id);
                    return;
                }
            };

            let task = self
                .pending
                .get_mut(&correlation_id)
                .expect("checked above");
            let job = task.job.take().expect("undispatched task holds its job");

            let handle = self
                .workers
                .get_mut(&worker_id)
                .expect("idle list only holds live workers");
            let sent = handle
                .job_tx
                .as_ref()
                .map(|tx| {
                    tx.send(WorkerJob {
                        correlation_id,
                        job,
                    })
                    .is_ok()
                })
                .unwrap_or(false);

            if sent {
                handle.current_job = Some(correlation_id);
            } else {
                // Worker thread died without reporting. Fail the job and
                // replace the worker.
                tracing::error!(worker_id, "worker channel closed unexpectedly");
                self.workers.remove(&worker_id);
                if let Some(task) = self.pending.remove(&correlation_id) {
                    let _ = task.reply.send(Err(ExtractError::WorkerCrash(
                        "worker terminated before accepting the job".to_string(),
                    )));
                }
                self.add_worker();
            }
        }
    }

    fn handle_completed(
        &mut self,
        worker_id: usize,
        correlation_id: Uuid,
        result: Result<ExtractResult, ExtractError>,
    ) {
        if let Some(handle) = self.workers.get_mut(&worker_id) {
            handle.current_job = None;
            if self.shutdown.is_none() {
                self.idle.push_back(worker_id);
            }
        }

        match self.pending.remove(&correlation_id) {
            Some(task) => {
                let _ = task.reply.send(result);
            }
            None => {
                // The task timed out and was abandoned; the worker finished
                // anyway. Drop the late result.
                tracing::debug!(%correlation_id, "discarding late result for abandoned task");
            }
        }

        self.dispatch();
    }

    fn handle_crashed(&mut self, worker_id: usize, correlation_id: Uuid, message: String) {
        self.workers.remove(&worker_id);
        self.idle.retain(|id| *id != worker_id);

        // The job is failed, never retried: the content that crashed the
        // worker may be poisoned.
        if let Some(task) = self.pending.remove(&correlation_id) {
            let _ = task.reply.send(Err(ExtractError::WorkerCrash(message)));
        }

        if self.shutdown.is_none() {
            tracing::warn!(worker_id, "replacing crashed worker");
            self.add_worker();
            self.dispatch();
        }
    }

    fn handle_timeout(&mut self, correlation_id: Uuid) {
        if let Some(task) = self.pending.remove(&correlation_id) {
            tracing::warn!(%correlation_id, timeout_ms = task.timeout_ms, "task deadline passed");
            let _ = task.reply.send(Err(ExtractError::Timeout(task.timeout_ms)));
        }
        // If the job was already dispatched the worker stays busy until it
        // reports; its late outcome is discarded in handle_completed.
    }

    fn begin_shutdown(&mut self, done: oneshot::Sender<()>) {
        tracing::info!("worker pool shutting down");
        self.shutdown = Some(done);
        self.idle.clear();

        // Closing the job channels lets each worker finish its current job
        // and exit its receive loop.
        for handle in self.workers.values_mut() {
            handle.job_tx = None;
        }

        // Undispatched tasks can no longer run.
        let waiting: Vec<Uuid> = self.backlog.drain(..).collect();
        for id in waiting {
            if let Some(task) = self.pending.remove(&id) {
                let _ = task.reply.send(Err(ExtractError::PoolClosed));
            }
        }
    }

    fn no_worker_busy(&self) -> bool {
        self.workers.values().all(|w| !w.is_busy())
    }

    fn finish_shutdown(&mut self) {
        let workers: Vec<WorkerHandle> = self.workers.drain().map(|(_, w)| w).collect();
        if let Some(done) = self.shutdown.take() {
            tokio::task::spawn_blocking(move || {
                for worker in workers {
                    let _ = worker.thread.join();
                }
                let _ = done.send(());
            });
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.workers.len(),
            idle: self.idle.len(),
            busy: self.workers.values().filter(|w| w.is_busy()).count(),
            pending: self.pending.len(),
        }
    }
}
