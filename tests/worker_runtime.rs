// tests/worker_runtime.rs

mod common;
use crate::common::{init_tracing, with_timeout, SettingsBuilder};

use std::error::Error;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};

use stackctl::errors::StackError;
use stackctl::queue::tasks::task_fn;
use stackctl::queue::{
    CronJob, JobContext, QueueConfig, QueueRegistry, RegisteredCron, TaskFn, TaskTable,
};
use stackctl::types::BoxFuture;
use stackctl::worker::{run_worker, CronTrigger, JobOutcome, JobReport, Worker};

type TestResult = Result<(), Box<dyn Error>>;

fn quick(_ctx: JobContext) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async { Ok(()) })
}

fn failing(_ctx: JobContext) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async { Err(anyhow::anyhow!("smtp unavailable")) })
}

fn sleepy(_ctx: JobContext) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    })
}

/// A task that blocks until `gate` is notified and counts concurrent runs.
fn gated(gate: Arc<Notify>, running: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> TaskFn {
    Arc::new(move |_ctx: JobContext| {
        let gate = Arc::clone(&gate);
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        Box::pin(async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            gate.notified().await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }) as BoxFuture<'static, anyhow::Result<()>>
    })
}

fn registry(configs: Vec<QueueConfig>, table: TaskTable) -> Arc<QueueRegistry> {
    Arc::new(QueueRegistry::new(configs, table).expect("valid queue layout"))
}

fn settings() -> Arc<stackctl::config::Settings> {
    Arc::new(SettingsBuilder::new().build())
}

async fn next_report(rx: &mut mpsc::UnboundedReceiver<JobReport>) -> JobReport {
    with_timeout(rx.recv()).await.expect("report channel open")
}

#[tokio::test]
async fn enqueued_jobs_report_their_outcome() -> TestResult {
    init_tracing();
    let reg = registry(
        vec![QueueConfig::new("mail")
            .with_task("send_email")
            .with_task("bounce")],
        TaskTable::new()
            .register("send_email", task_fn(quick))
            .register("bounce", task_fn(failing)),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = Worker::new(reg, settings(), 2)
        .with_reports(tx)
        .without_schedules()
        .start();
    let handle = worker.handle();

    let ok_id = handle.enqueue("mail", "send_email").await?;
    let report = next_report(&mut rx).await;
    assert_eq!(report.job_id, ok_id);
    assert_eq!(report.queue, "mail");
    assert_eq!(report.outcome, JobOutcome::Succeeded);

    let failed_id = handle.enqueue("mail", "bounce").await?;
    assert_ne!(failed_id, ok_id);
    let report = next_report(&mut rx).await;
    assert_eq!(report.task, "bounce");
    match report.outcome {
        JobOutcome::Failed(reason) => assert!(reason.contains("smtp unavailable")),
        other => panic!("expected failure, got {other:?}"),
    }

    worker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn enqueue_rejects_unknown_queue_and_foreign_task() {
    let reg = registry(
        vec![
            QueueConfig::new("mail").with_task("send_email"),
            QueueConfig::new("search").with_task("rebuild_index"),
        ],
        TaskTable::new()
            .register("send_email", task_fn(quick))
            .register("rebuild_index", task_fn(quick)),
    );
    let worker = Worker::new(reg, settings(), 1).without_schedules().start();
    let handle = worker.handle();

    assert!(matches!(
        handle.enqueue("sms", "send_email").await,
        Err(StackError::Enqueue(_))
    ));
    assert!(matches!(
        handle.enqueue("mail", "rebuild_index").await,
        Err(StackError::Enqueue(_))
    ));

    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cron_job_exceeding_its_timeout_is_reported_as_timed_out() {
    let reg = registry(
        vec![QueueConfig::new("slow")
            .with_task("crawl")
            .with_cron(CronJob::new("crawl", "* * * * *").timeout(Duration::from_millis(50)))],
        TaskTable::new().register("crawl", task_fn(sleepy)),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = Worker::new(reg, settings(), 1).with_reports(tx).start();

    // The paused clock auto-advances through the wait for the next minute.
    let report = rx.recv().await.expect("report channel open");
    assert_eq!(report.queue, "slow");
    assert_eq!(report.task, "crawl");
    assert_eq!(report.outcome, JobOutcome::TimedOut);

    worker.shutdown().await;
}

#[tokio::test]
async fn unique_trigger_skips_while_previous_run_is_in_flight() -> TestResult {
    let cron = RegisteredCron {
        job: CronJob::new("system_upkeep", "0 * * * *").unique(true),
        schedule: "0 * * * *".parse()?,
    };
    let trigger = CronTrigger::new("system-tasks", cron, Arc::new(AtomicU64::new(0)));

    let first = trigger.fire().expect("first fire claims the slot");
    let first_id = first.id;
    assert!(trigger.is_in_flight());
    assert!(trigger.fire().is_none(), "second fire must be skipped");

    drop(first);
    assert!(!trigger.is_in_flight());
    let third = trigger.fire().expect("slot is free again");
    assert!(third.id > first_id);
    Ok(())
}

#[tokio::test]
async fn unique_slot_is_released_after_the_job_finishes() -> TestResult {
    let reg = registry(
        vec![QueueConfig::new("system-tasks").with_task("system_upkeep")],
        TaskTable::new().register("system_upkeep", task_fn(quick)),
    );
    let cron = RegisteredCron {
        job: CronJob::new("system_upkeep", "0 * * * *").unique(true),
        schedule: "0 * * * *".parse()?,
    };
    let trigger = CronTrigger::new("system-tasks", cron, Arc::new(AtomicU64::new(0)));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = Worker::new(reg, settings(), 1)
        .with_reports(tx)
        .without_schedules()
        .start();

    let job = trigger.fire().expect("claims the slot");
    worker.handle().submit(job).await?;
    let report = next_report(&mut rx).await;
    assert_eq!(report.outcome, JobOutcome::Succeeded);
    assert!(!trigger.is_in_flight(), "slot is freed before the report is sent");

    worker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn non_unique_trigger_always_fires() -> TestResult {
    let cron = RegisteredCron {
        job: CronJob::new("background_worker_task", "* * * * *"),
        schedule: "* * * * *".parse()?,
    };
    let trigger = CronTrigger::new("background-tasks", cron, Arc::new(AtomicU64::new(0)));

    let a = trigger.fire().expect("fires");
    let b = trigger.fire().expect("fires again");
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert!(!trigger.is_in_flight());
    Ok(())
}

#[tokio::test]
async fn concurrency_limit_is_per_queue() -> TestResult {
    init_tracing();
    let gate = Arc::new(Notify::new());
    let running_a = Arc::new(AtomicUsize::new(0));
    let peak_a = Arc::new(AtomicUsize::new(0));
    let running_b = Arc::new(AtomicUsize::new(0));
    let peak_b = Arc::new(AtomicUsize::new(0));

    let reg = registry(
        vec![
            QueueConfig::new("a").with_task("task_a"),
            QueueConfig::new("b").with_task("task_b"),
        ],
        TaskTable::new()
            .register(
                "task_a",
                gated(Arc::clone(&gate), Arc::clone(&running_a), Arc::clone(&peak_a)),
            )
            .register(
                "task_b",
                gated(Arc::clone(&gate), Arc::clone(&running_b), Arc::clone(&peak_b)),
            ),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = Worker::new(reg, settings(), 2)
        .with_reports(tx)
        .without_schedules()
        .start();
    let handle = worker.handle();

    for _ in 0..4 {
        handle.enqueue("a", "task_a").await?;
    }
    handle.enqueue("b", "task_b").await?;

    // Queue "a" saturates at 2, but "b" still gets its job running.
    let started = common::wait_until(Duration::from_secs(2), || {
        running_a.load(Ordering::SeqCst) == 2 && running_b.load(Ordering::SeqCst) == 1
    })
    .await;
    assert!(
        started,
        "a={} b={}",
        running_a.load(Ordering::SeqCst),
        running_b.load(Ordering::SeqCst)
    );

    // Release jobs until all five have reported.
    with_timeout(async {
        let mut reports = 0;
        while reports < 5 {
            gate.notify_waiters();
            if let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
                reports += 1;
            }
        }
    })
    .await;

    assert_eq!(peak_a.load(Ordering::SeqCst), 2);
    assert_eq!(peak_b.load(Ordering::SeqCst), 1);
    worker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_jobs() -> TestResult {
    let finished = Arc::new(AtomicUsize::new(0));
    let done = Arc::clone(&finished);
    let task: TaskFn = Arc::new(move |_ctx: JobContext| {
        let done = Arc::clone(&done);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }) as BoxFuture<'static, anyhow::Result<()>>
    });

    let reg = registry(
        vec![QueueConfig::new("mail").with_task("send_email")],
        TaskTable::new().register("send_email", task),
    );
    let worker = Worker::new(reg, settings(), 1).without_schedules().start();
    let handle = worker.handle();
    handle.enqueue("mail", "send_email").await?;

    // Let the consumer pick the job up before shutting down.
    tokio::time::sleep(Duration::from_millis(20)).await;
    with_timeout(worker.shutdown()).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    assert!(matches!(
        handle.enqueue("mail", "send_email").await,
        Err(StackError::Enqueue(_))
    ));
    Ok(())
}

#[tokio::test]
async fn dropping_a_running_worker_stops_its_consumers() {
    let reg = registry(
        vec![QueueConfig::new("mail").with_task("send_email")],
        TaskTable::new().register("send_email", task_fn(quick)),
    );
    let running = Worker::new(reg, settings(), 1).without_schedules().start();
    let handle = running.handle();
    drop(running);

    // Once the consumer has gone the queue refuses new jobs.
    let refused = with_timeout(async {
        loop {
            match handle.enqueue("mail", "send_email").await {
                Err(err) => break err,
                Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    })
    .await;
    assert!(matches!(refused, StackError::Enqueue(_)));
}

#[tokio::test]
async fn run_worker_returns_once_shutdown_resolves() -> TestResult {
    let reg = registry(
        vec![QueueConfig::new("mail").with_task("send_email")],
        TaskTable::new().register("send_email", task_fn(quick)),
    );
    with_timeout(run_worker(
        reg,
        settings(),
        3,
        tokio::time::sleep(Duration::from_millis(20)),
    ))
    .await?;
    Ok(())
}

#[tokio::test]
async fn run_worker_rejects_zero_concurrency() {
    let reg = registry(
        vec![QueueConfig::new("mail").with_task("send_email")],
        TaskTable::new().register("send_email", task_fn(quick)),
    );
    let result = run_worker(reg, settings(), 0, std::future::ready(())).await;
    assert!(matches!(result, Err(StackError::Configuration(_))));
}

#[tokio::test]
async fn built_in_tasks_run_on_the_default_layout() -> TestResult {
    use stackctl::queue::tasks::{
        default_queues, default_task_table, BACKGROUND_TASKS_QUEUE, BACKGROUND_WORKER_TASK,
        SYSTEM_TASK, SYSTEM_TASKS_QUEUE,
    };

    let reg = Arc::new(QueueRegistry::new(default_queues(), default_task_table())?);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = Worker::new(reg, settings(), 2)
        .with_reports(tx)
        .without_schedules()
        .start();
    let handle = worker.handle();

    handle.enqueue(SYSTEM_TASKS_QUEUE, SYSTEM_TASK).await?;
    handle
        .enqueue(BACKGROUND_TASKS_QUEUE, BACKGROUND_WORKER_TASK)
        .await?;

    for _ in 0..2 {
        assert_eq!(next_report(&mut rx).await.outcome, JobOutcome::Succeeded);
    }
    worker.shutdown().await;
    Ok(())
}
