// src/queue/mod.rs

//! Job queue declarations.
//!
//! - [`cron`] parses cron expressions and computes fire times.
//! - [`registry`] holds the validated queue configuration handed to the
//!   worker.
//! - [`tasks`] is the built-in task table and the default queue layout.
//!
//! "System" maintenance work and "background" user-triggered work live on
//! separate queues so that load on one cannot starve the other.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::types::BoxFuture;

pub mod cron;
pub mod registry;
pub mod tasks;

pub use cron::CronSchedule;
pub use registry::{QueueRegistry, RegisteredCron, RegisteredQueue, TaskTable};

/// Canonical task identifier type.
pub type TaskName = String;

/// Callable behind a task identifier.
pub type TaskFn = Arc<dyn Fn(JobContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// What a task function receives for one job execution.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: u64,
    pub queue: String,
    pub task: TaskName,
    pub settings: Arc<Settings>,
}

/// A recurring task on a calendar schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    /// Task to run; must be listed in the same queue's `tasks`.
    pub task: TaskName,
    /// Five-field cron expression.
    pub cron: String,
    /// At most one queued or running instance of this schedule.
    pub unique: bool,
    /// Upper bound on one execution.
    pub timeout: Duration,
}

impl CronJob {
    pub fn new(task: impl Into<TaskName>, cron: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            cron: cron.into(),
            unique: false,
            timeout: tasks::DEFAULT_JOB_TIMEOUT,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A named queue with its runnable tasks and cron schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    pub tasks: Vec<TaskName>,
    pub scheduled_tasks: Vec<CronJob>,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            scheduled_tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: impl Into<TaskName>) -> Self {
        self.tasks.push(task.into());
        self
    }

    pub fn with_cron(mut self, job: CronJob) -> Self {
        self.scheduled_tasks.push(job);
        self
    }
}

impl fmt::Display for QueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (tasks: {}, cron: {})",
            self.name,
            self.tasks.len(),
            self.scheduled_tasks.len()
        )
    }
}
