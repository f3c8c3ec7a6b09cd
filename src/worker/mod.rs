// src/worker/mod.rs

//! In-process job worker run by `serve worker`.
//!
//! - [`runtime`] owns the per-queue consumer loops and the enqueue handle.
//! - [`scheduler`] turns cron schedules into jobs, honouring `unique`.
//!
//! Each queue gets its own consumer and its own concurrency limit, so a
//! busy queue never takes slots from another one.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::queue::TaskName;

pub mod runtime;
pub mod scheduler;

pub use runtime::{run_worker, RunningWorker, Worker, WorkerHandle};
pub use scheduler::CronTrigger;

/// One unit of work waiting in, or taken from, a queue.
pub struct Job {
    pub id: u64,
    pub queue: String,
    pub task: TaskName,
    pub timeout: Duration,
    /// Held while a unique cron job is queued or running.
    pub(crate) guard: Option<UniqueGuard>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .field("task", &self.task)
            .field("timeout", &self.timeout)
            .field("unique", &self.guard.is_some())
            .finish()
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

/// Emitted after every job when the worker was built with reporting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: u64,
    pub queue: String,
    pub task: TaskName,
    pub outcome: JobOutcome,
}

/// Clears the in-flight flag of a unique cron job when dropped.
pub(crate) struct UniqueGuard(Arc<AtomicBool>);

impl UniqueGuard {
    /// Claim `flag`; `None` if an instance is already in flight.
    pub(crate) fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for UniqueGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
