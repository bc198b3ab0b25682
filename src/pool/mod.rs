//! Bounded extraction worker pool
//!
//! One isolated worker thread per slot, a single event loop owning all
//! bookkeeping, per-task deadlines, and self-healing on worker crashes.

pub mod pool;
pub mod worker;

pub use pool::{PoolStats, WorkerPool};
pub use worker::{Job, JobRunner};
