// src/queue/registry.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::errors::{Result, StackError};
use crate::queue::cron::CronSchedule;
use crate::queue::{CronJob, QueueConfig, TaskFn, TaskName};

/// Task identifier → callable.
#[derive(Clone, Default)]
pub struct TaskTable {
    tasks: BTreeMap<TaskName, TaskFn>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<TaskName>, task: TaskFn) -> Self {
        self.tasks.insert(name.into(), task);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TaskFn> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }
}

impl fmt::Debug for TaskTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tasks.keys()).finish()
    }
}

/// A cron job whose expression has been parsed.
#[derive(Debug, Clone)]
pub struct RegisteredCron {
    pub job: CronJob,
    pub schedule: CronSchedule,
}

/// A queue that passed validation.
#[derive(Debug, Clone)]
pub struct RegisteredQueue {
    pub name: String,
    pub tasks: Vec<TaskName>,
    pub cron_jobs: Vec<RegisteredCron>,
}

impl RegisteredQueue {
    pub fn has_task(&self, task: &str) -> bool {
        self.tasks.iter().any(|t| t == task)
    }
}

/// Validated queue declarations plus the task table they refer to.
///
/// Built once at startup; there is no mutation API.
#[derive(Debug, Clone)]
pub struct QueueRegistry {
    queues: Vec<RegisteredQueue>,
    table: TaskTable,
}

impl QueueRegistry {
    /// Validate `configs` against `table`.
    ///
    /// Rejects:
    /// - an empty configuration or duplicate queue names
    /// - a queue without tasks
    /// - task identifiers missing from the task table
    /// - cron jobs whose task is not in the same queue's task list
    /// - invalid cron expressions and zero timeouts
    pub fn new(configs: Vec<QueueConfig>, table: TaskTable) -> Result<Self> {
        ensure_has_queues(&configs)?;
        validate_queue_names(&configs)?;

        let mut queues = Vec::with_capacity(configs.len());
        for cfg in configs {
            validate_tasks(&cfg, &table)?;
            let cron_jobs = register_cron_jobs(&cfg)?;
            queues.push(RegisteredQueue {
                name: cfg.name,
                tasks: cfg.tasks,
                cron_jobs,
            });
        }

        Ok(Self { queues, table })
    }

    pub fn queues(&self) -> &[RegisteredQueue] {
        &self.queues
    }

    pub fn queue(&self, name: &str) -> Option<&RegisteredQueue> {
        self.queues.iter().find(|q| q.name == name)
    }

    pub fn task(&self, name: &str) -> Option<&TaskFn> {
        self.table.get(name)
    }
}

fn ensure_has_queues(configs: &[QueueConfig]) -> Result<()> {
    if configs.is_empty() {
        return Err(StackError::QueueRegistration(
            "at least one queue must be configured".to_string(),
        ));
    }
    Ok(())
}

fn validate_queue_names(configs: &[QueueConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for cfg in configs {
        if cfg.name.trim().is_empty() {
            return Err(StackError::QueueRegistration(
                "queue name must not be empty".to_string(),
            ));
        }
        if !seen.insert(cfg.name.as_str()) {
            return Err(StackError::QueueRegistration(format!(
                "duplicate queue name '{}'",
                cfg.name
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &QueueConfig, table: &TaskTable) -> Result<()> {
    if cfg.tasks.is_empty() {
        return Err(StackError::QueueRegistration(format!(
            "queue '{}' must list at least one task",
            cfg.name
        )));
    }
    for task in cfg.tasks.iter() {
        if !table.contains(task) {
            return Err(StackError::QueueRegistration(format!(
                "queue '{}' lists unknown task '{}'",
                cfg.name, task
            )));
        }
    }
    Ok(())
}

fn register_cron_jobs(cfg: &QueueConfig) -> Result<Vec<RegisteredCron>> {
    let mut registered = Vec::with_capacity(cfg.scheduled_tasks.len());

    for job in cfg.scheduled_tasks.iter() {
        if !cfg.tasks.contains(&job.task) {
            return Err(StackError::QueueRegistration(format!(
                "cron job in queue '{}' references task '{}' which is not in that queue's tasks",
                cfg.name, job.task
            )));
        }
        if job.timeout.is_zero() {
            return Err(StackError::QueueRegistration(format!(
                "cron job '{}' in queue '{}' must have a non-zero timeout",
                job.task, cfg.name
            )));
        }
        let schedule: CronSchedule = job.cron.parse().map_err(|e: String| {
            StackError::QueueRegistration(format!(
                "cron job '{}' in queue '{}': {}",
                job.task, cfg.name, e
            ))
        })?;
        registered.push(RegisteredCron {
            job: job.clone(),
            schedule,
        });
    }

    Ok(registered)
}
