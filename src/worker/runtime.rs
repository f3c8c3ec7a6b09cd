// src/worker/runtime.rs

//! Per-queue consumer loops and the handle used to enqueue work.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::errors::{Result, StackError};
use crate::queue::tasks::DEFAULT_JOB_TIMEOUT;
use crate::queue::{JobContext, QueueRegistry, TaskFn};
use crate::worker::scheduler::CronTrigger;
use crate::worker::{Job, JobOutcome, JobReport};

/// Jobs buffered per queue before `enqueue` starts waiting.
const QUEUE_CAPACITY: usize = 256;

/// A worker that has not been started yet.
pub struct Worker {
    registry: Arc<QueueRegistry>,
    settings: Arc<Settings>,
    concurrency: usize,
    reports: Option<mpsc::UnboundedSender<JobReport>>,
    schedules: bool,
}

impl Worker {
    /// `concurrency` is the limit per queue; values below 1 are raised to 1.
    pub fn new(registry: Arc<QueueRegistry>, settings: Arc<Settings>, concurrency: usize) -> Self {
        Self {
            registry,
            settings,
            concurrency: concurrency.max(1),
            reports: None,
            schedules: true,
        }
    }

    /// Send a [`JobReport`] for every finished job.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<JobReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Run only enqueued jobs; cron schedules are not started.
    pub fn without_schedules(mut self) -> Self {
        self.schedules = false;
        self
    }

    /// Spawn the consumers (and cron schedules) onto the current runtime.
    pub fn start(self) -> RunningWorker {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ids = Arc::new(AtomicU64::new(0));
        let mut senders = HashMap::new();
        let mut tasks = Vec::new();

        for queue in self.registry.queues() {
            let (tx, rx) = mpsc::channel::<Job>(QUEUE_CAPACITY);

            let consumer = QueueConsumer {
                queue: queue.name.clone(),
                registry: Arc::clone(&self.registry),
                settings: Arc::clone(&self.settings),
                limit: Arc::new(Semaphore::new(self.concurrency)),
                reports: self.reports.clone(),
            };
            tasks.push(tokio::spawn(consumer.run(rx, shutdown_rx.clone())));

            if self.schedules {
                for cron in queue.cron_jobs.iter() {
                    let trigger = CronTrigger::new(&queue.name, cron.clone(), Arc::clone(&ids));
                    tasks.push(tokio::spawn(trigger.run(tx.clone(), shutdown_rx.clone())));
                }
            }

            senders.insert(queue.name.clone(), tx);
        }

        info!(
            event = %self.settings.log.worker_event,
            queues = self.registry.queues().len(),
            concurrency = self.concurrency,
            "worker started"
        );

        RunningWorker {
            handle: WorkerHandle {
                registry: self.registry,
                senders: Arc::new(senders),
                ids,
            },
            shutdown_tx,
            tasks,
        }
    }
}

/// Cloneable handle for putting ad-hoc jobs onto a running worker's queues.
#[derive(Clone)]
pub struct WorkerHandle {
    registry: Arc<QueueRegistry>,
    senders: Arc<HashMap<String, mpsc::Sender<Job>>>,
    ids: Arc<AtomicU64>,
}

impl WorkerHandle {
    /// Enqueue `task` on `queue` and return the new job id.
    ///
    /// The task must be one of the queue's declared tasks. Ad-hoc jobs run
    /// under the default job timeout.
    pub async fn enqueue(&self, queue: &str, task: &str) -> Result<u64> {
        let job = Job {
            id: self.ids.fetch_add(1, Ordering::Relaxed) + 1,
            queue: queue.to_string(),
            task: task.to_string(),
            timeout: DEFAULT_JOB_TIMEOUT,
            guard: None,
        };
        self.submit(job).await
    }

    /// Put an already built job (e.g. one fired by a [`CronTrigger`]) on
    /// its queue.
    pub async fn submit(&self, job: Job) -> Result<u64> {
        let registered = self
            .registry
            .queue(&job.queue)
            .ok_or_else(|| StackError::Enqueue(format!("unknown queue '{}'", job.queue)))?;
        if !registered.has_task(&job.task) {
            return Err(StackError::Enqueue(format!(
                "task '{}' is not registered on queue '{}'",
                job.task, job.queue
            )));
        }
        let tx = self.senders.get(&job.queue).ok_or_else(|| {
            StackError::Enqueue(format!("queue '{}' is not running", job.queue))
        })?;

        let id = job.id;
        let queue = job.queue.clone();
        let task = job.task.clone();
        tx.send(job)
            .await
            .map_err(|_| StackError::Enqueue(format!("queue '{queue}' is shut down")))?;

        debug!(queue = %queue, task = %task, job_id = id, "job enqueued");
        Ok(id)
    }
}

/// A started worker.
///
/// Dropping it without [`RunningWorker::shutdown`] also stops the consumers
/// and cron schedules, but nothing waits for jobs that are still running.
pub struct RunningWorker {
    handle: WorkerHandle,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningWorker {
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Stop cron schedules and consumers, then wait for running jobs.
    ///
    /// Jobs still waiting in a queue are discarded.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        drop(self.handle);

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        info!("worker stopped");
    }
}

/// Run the worker until `shutdown` resolves.
pub async fn run_worker<F>(
    registry: Arc<QueueRegistry>,
    settings: Arc<Settings>,
    concurrency: usize,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    if concurrency == 0 {
        return Err(StackError::Configuration(
            "worker concurrency must be at least 1".to_string(),
        ));
    }

    for queue in registry.queues() {
        info!(
            queue = %queue.name,
            tasks = ?queue.tasks,
            cron_jobs = queue.cron_jobs.len(),
            "queue registered"
        );
    }

    let running = Worker::new(registry, settings, concurrency).start();
    shutdown.await;
    info!("worker shutdown requested");
    running.shutdown().await;
    Ok(())
}

struct QueueConsumer {
    queue: String,
    registry: Arc<QueueRegistry>,
    settings: Arc<Settings>,
    limit: Arc<Semaphore>,
    reports: Option<mpsc::UnboundedSender<JobReport>>,
}

impl QueueConsumer {
    async fn run(self, mut rx: mpsc::Receiver<Job>, mut shutdown: watch::Receiver<bool>) {
        debug!(queue = %self.queue, "queue consumer started");
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                maybe_job = rx.recv() => {
                    let Some(job) = maybe_job else { break };
                    let Ok(permit) = Arc::clone(&self.limit).acquire_owned().await else { break };
                    match self.registry.task(&job.task) {
                        Some(task) => {
                            running.spawn(execute(
                                job,
                                Arc::clone(task),
                                Arc::clone(&self.settings),
                                self.reports.clone(),
                                permit,
                            ));
                        }
                        None => {
                            error!(queue = %self.queue, task = %job.task, "no callable for task; dropping job");
                        }
                    }
                }
                _ = shutdown.changed() => break,
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        warn!(queue = %self.queue, error = %e, "job task panicked");
                    }
                }
            }
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                warn!(queue = %self.queue, error = %e, "job task panicked");
            }
        }
        debug!(queue = %self.queue, "queue consumer finished");
    }
}

async fn execute(
    job: Job,
    task: TaskFn,
    settings: Arc<Settings>,
    reports: Option<mpsc::UnboundedSender<JobReport>>,
    _permit: OwnedSemaphorePermit,
) {
    let Job {
        id,
        queue,
        task: task_name,
        timeout,
        guard,
    } = job;
    let event = settings.log.worker_event.clone();

    let ctx = JobContext {
        job_id: id,
        queue: queue.clone(),
        task: task_name.clone(),
        settings,
    };

    debug!(event = %event, queue = %queue, task = %task_name, job_id = id, "job started");

    let outcome = match tokio::time::timeout(timeout, task(ctx)).await {
        Ok(Ok(())) => JobOutcome::Succeeded,
        Ok(Err(e)) => JobOutcome::Failed(format!("{e:#}")),
        Err(_) => JobOutcome::TimedOut,
    };

    match &outcome {
        JobOutcome::Succeeded => {
            info!(event = %event, queue = %queue, task = %task_name, job_id = id, "job succeeded");
        }
        JobOutcome::Failed(reason) => {
            error!(event = %event, queue = %queue, task = %task_name, job_id = id, error = %reason, "job failed");
        }
        JobOutcome::TimedOut => {
            warn!(
                event = %event,
                queue = %queue,
                task = %task_name,
                job_id = id,
                timeout_secs = timeout.as_secs_f64(),
                "job timed out"
            );
        }
    }

    // Release the unique slot before anyone hears about completion.
    drop(guard);

    if let Some(reports) = reports {
        let _ = reports.send(JobReport {
            job_id: id,
            queue,
            task: task_name,
            outcome,
        });
    }
}
