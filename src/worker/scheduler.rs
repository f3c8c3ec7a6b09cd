// src/worker/scheduler.rs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::queue::RegisteredCron;
use crate::worker::{Job, UniqueGuard};

/// Produces jobs for one cron schedule.
///
/// For `unique` schedules at most one job is queued or running at any time;
/// fires that happen while one is in flight are skipped.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    queue: String,
    cron: RegisteredCron,
    in_flight: Arc<AtomicBool>,
    ids: Arc<AtomicU64>,
}

impl CronTrigger {
    pub fn new(queue: impl Into<String>, cron: RegisteredCron, ids: Arc<AtomicU64>) -> Self {
        Self {
            queue: queue.into(),
            cron,
            in_flight: Arc::new(AtomicBool::new(false)),
            ids,
        }
    }

    pub fn task(&self) -> &str {
        &self.cron.job.task
    }

    /// Whether a unique instance is currently queued or running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Next fire time strictly after `now`.
    pub fn next_fire(&self, now: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.schedule.next_after(now)
    }

    /// Build the job for one fire, or `None` when a unique instance is
    /// still in flight.
    pub fn fire(&self) -> Option<Job> {
        let guard = if self.cron.job.unique {
            Some(UniqueGuard::try_claim(&self.in_flight)?)
        } else {
            None
        };

        Some(Job {
            id: self.ids.fetch_add(1, Ordering::Relaxed) + 1,
            queue: self.queue.clone(),
            task: self.cron.job.task.clone(),
            timeout: self.cron.job.timeout,
            guard,
        })
    }

    /// Sleep until each fire time and push the job onto `tx`, until
    /// `shutdown` flips or the queue closes.
    pub(crate) async fn run(self, tx: mpsc::Sender<Job>, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = %self.queue,
            task = %self.task(),
            cron = %self.cron.schedule,
            unique = self.cron.job.unique,
            "cron schedule started"
        );

        loop {
            let now = Utc::now();
            let Some(next) = self.next_fire(&now) else {
                warn!(
                    queue = %self.queue,
                    task = %self.task(),
                    cron = %self.cron.schedule,
                    "cron schedule never fires; stopping"
                );
                return;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {
                    debug!(queue = %self.queue, task = %self.task(), "cron schedule stopping");
                    return;
                }
            }

            match self.fire() {
                Some(job) => {
                    debug!(queue = %self.queue, task = %self.task(), job_id = job.id, "cron fired");
                    if tx.send(job).await.is_err() {
                        debug!(queue = %self.queue, "queue closed; cron schedule stopping");
                        return;
                    }
                }
                None => {
                    info!(
                        queue = %self.queue,
                        task = %self.task(),
                        "previous unique run still in flight; skipping this fire"
                    );
                }
            }
        }
    }
}
