//! Extraction error taxonomy
//!
//! `PageError` stays inside the routine: render failures are logged and the
//! next page is tried. `ExtractError` is what crosses the pool boundary back
//! to the caller.

use thiserror::Error;

/// Errors surfaced to callers of the extraction service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The buffer could not be parsed as a PDF document. Client-input
    /// problem, never retried.
    #[error("Document error: {0}")]
    Document(String),

    /// The worker holding the job died. The job is failed, not retried,
    /// because the content that crashed it may be poisoned.
    #[error("Worker crashed while processing the job: {0}")]
    WorkerCrash(String),

    /// The job did not complete within the pool's per-job deadline.
    #[error("Processing timed out after {0} ms")]
    Timeout(u64),

    /// The request waited at the admission gate longer than allowed before
    /// a slot opened. Distinct from `Timeout` so operators can tell slow
    /// processing from overload.
    #[error("Queued too long waiting for a free worker ({0} ms)")]
    QueueTimeout(u64),

    /// The pool is shutting down and no longer accepts jobs.
    #[error("Extraction service is shut down")]
    PoolClosed,
}

/// Page-level failures inside the extraction routine.
#[derive(Debug, Error)]
pub enum PageError {
    /// The document has fewer usable pages than assumed. Stops iteration.
    #[error("Invalid page: {0}")]
    InvalidPage(usize),

    /// Rasterization or text access failed for one page. Recovered locally
    /// by skipping to the next page.
    #[error("Render error on page {page}: {message}")]
    Render { page: usize, message: String },
}
