// src/queue/tasks.rs

//! Built-in tasks and the default queue layout.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::queue::{CronJob, JobContext, QueueConfig, TaskFn, TaskTable};
use crate::system::{probe_system_health, HealthStatus};
use crate::types::BoxFuture;

pub const SYSTEM_TASKS_QUEUE: &str = "system-tasks";
pub const BACKGROUND_TASKS_QUEUE: &str = "background-tasks";

pub const SYSTEM_TASK: &str = "system_task";
pub const SYSTEM_UPKEEP: &str = "system_upkeep";
pub const BACKGROUND_WORKER_TASK: &str = "background_worker_task";

/// Timeout for jobs that carry none of their own (ad-hoc enqueues).
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Queue layout used by `serve worker`:
///
/// - `system-tasks`: `system_task`, `system_upkeep`; upkeep runs hourly.
/// - `background-tasks`: `background_worker_task`; runs every minute.
///
/// Both cron jobs are unique, so a slow run never stacks up behind itself.
pub fn default_queues() -> Vec<QueueConfig> {
    vec![
        QueueConfig::new(SYSTEM_TASKS_QUEUE)
            .with_task(SYSTEM_TASK)
            .with_task(SYSTEM_UPKEEP)
            .with_cron(
                CronJob::new(SYSTEM_UPKEEP, "0 * * * *")
                    .unique(true)
                    .timeout(Duration::from_secs(500)),
            ),
        QueueConfig::new(BACKGROUND_TASKS_QUEUE)
            .with_task(BACKGROUND_WORKER_TASK)
            .with_cron(
                CronJob::new(BACKGROUND_WORKER_TASK, "* * * * *")
                    .unique(true)
                    .timeout(Duration::from_secs(300)),
            ),
    ]
}

/// Task table holding every built-in task.
pub fn default_task_table() -> TaskTable {
    TaskTable::new()
        .register(SYSTEM_TASK, task_fn(system_task))
        .register(SYSTEM_UPKEEP, task_fn(system_upkeep))
        .register(BACKGROUND_WORKER_TASK, task_fn(background_worker_task))
}

/// Wrap a plain function as a [`TaskFn`].
pub fn task_fn(f: fn(JobContext) -> BoxFuture<'static, anyhow::Result<()>>) -> TaskFn {
    Arc::new(f)
}

fn system_task(ctx: JobContext) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async move {
        info!(
            event = %ctx.settings.log.worker_event,
            queue = %ctx.queue,
            job_id = ctx.job_id,
            "system task ran"
        );
        Ok(())
    })
}

fn system_upkeep(ctx: JobContext) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async move {
        let health = probe_system_health(&ctx.settings, HealthStatus::Online).await;
        info!(
            event = %ctx.settings.log.worker_event,
            job_id = ctx.job_id,
            database = %health.database_status,
            cache = %health.cache_status,
            worker = %health.worker_status,
            app = %health.app,
            version = %health.version,
            "system upkeep completed"
        );
        Ok(())
    })
}

fn background_worker_task(ctx: JobContext) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async move {
        info!(
            event = %ctx.settings.log.worker_event,
            queue = %ctx.queue,
            job_id = ctx.job_id,
            "background worker task ran"
        );
        Ok(())
    })
}
