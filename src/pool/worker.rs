//! Execution worker
//!
//! A worker is a dedicated OS thread that shares no state with the
//! dispatcher. Jobs arrive over a private channel, one at a time; every job
//! produces exactly one tagged outcome message. A panic inside the routine
//! is an unrecoverable fault: the worker reports the crash and its thread
//! exits, leaving replacement to the pool.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::extract::{ExtractError, ExtractOptions, ExtractResult};

use super::pool::PoolMessage;

/// One extraction job. The byte buffer is owned by the pool until dispatch,
/// then by the worker for the job's duration.
#[derive(Debug)]
pub struct Job {
    pub buffer: Vec<u8>,
    pub options: ExtractOptions,
}

/// The function a worker runs for each job. Production wires this to
/// `extract::extract`; tests substitute closures.
pub type JobRunner = Arc<dyn Fn(&Job) -> Result<ExtractResult, ExtractError> + Send + Sync>;

/// A job tagged with its correlation id, as handed to a worker.
pub(super) struct WorkerJob {
    pub correlation_id: Uuid,
    pub job: Job,
}

/// Pool-side handle to a live worker.
pub(super) struct WorkerHandle {
    pub job_tx: Option<mpsc::Sender<WorkerJob>>,
    pub thread: thread::JoinHandle<()>,
    /// Correlation id of the job the worker is holding, if busy.
    pub current_job: Option<Uuid>,
}

impl WorkerHandle {
    pub fn is_busy(&self) -> bool {
        self.current_job.is_some()
    }
}

/// Spawn a worker thread and return its handle.
pub(super) fn spawn_worker(
    id: usize,
    runner: JobRunner,
    events: UnboundedSender<PoolMessage>,
) -> WorkerHandle {
    let (job_tx, job_rx) = mpsc::channel::<WorkerJob>();

    let thread = thread::Builder::new()
        .name(format!("extract-worker-{}", id))
        .spawn(move || {
            tracing::debug!(worker_id = id, "worker ready");
            while let Ok(WorkerJob {
                correlation_id,
                job,
            }) = job_rx.recv()
            {
                match catch_unwind(AssertUnwindSafe(|| runner(&job))) {
                    Ok(result) => {
                        if events
                            .send(PoolMessage::Completed {
                                worker_id: id,
                                correlation_id,
                                result,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(worker_id = id, %correlation_id, message, "worker panicked");
                        let _ = events.send(PoolMessage::Crashed {
                            worker_id: id,
                            correlation_id,
                            message,
                        });
                        return;
                    }
                }
            }
            tracing::debug!(worker_id = id, "worker stopped");
        })
        .expect("failed to spawn worker thread");

    WorkerHandle {
        job_tx: Some(job_tx),
        thread,
        current_job: None,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
