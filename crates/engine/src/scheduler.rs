use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Longest single sleep of the driver. Bounds how late a job fires after a
/// wall-clock adjustment.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// When a job fires. Times are UTC wall-clock times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every day at `hour:minute`.
    Daily { hour: u32, minute: u32 },
    /// Exactly once, at `at`.
    Once { at: DateTime<Utc> },
}

impl Trigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Trigger::Daily { hour, minute }
    }

    pub fn once(at: DateTime<Utc>) -> Self {
        Trigger::Once { at }
    }

    /// First fire time strictly after `after`, or `None` if the trigger will
    /// never fire again (or its hour/minute is out of range).
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Trigger::Daily { hour, minute } => {
                let today = after
                    .date_naive()
                    .and_hms_opt(hour, minute, 0)?
                    .and_utc();
                if today > after {
                    Some(today)
                } else {
                    Some(today + chrono::Duration::days(1))
                }
            }
            Trigger::Once { at } => (at > after).then_some(at),
        }
    }

    /// Why [`Trigger::next_fire`] returned `None` at start-up.
    fn never_fires_reason(&self) -> &'static str {
        match self {
            Trigger::Daily { .. } => "Daily trigger hour/minute out of range, job will not run",
            Trigger::Once { .. } => "Trigger time already passed, job will not run",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02} UTC"),
            Trigger::Once { at } => write!(f, "once at {at}"),
        }
    }
}

type JobTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A named unit of work bound to a trigger.
#[derive(Clone)]
pub struct Job {
    name: String,
    trigger: Trigger,
    task: JobTask,
}

impl Job {
    pub fn new<F, Fut>(name: impl Into<String>, trigger: Trigger, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            trigger,
            task: Arc::new(move || task().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }
}

/// Process-wide timer owning a fixed list of jobs.
///
/// Lifecycle: build with [`Scheduler::add_job`], call [`Scheduler::start`]
/// once, and keep the returned [`SchedulerHandle`] alive for as long as jobs
/// should run. [`SchedulerHandle::shutdown`] (or dropping the handle) stops
/// the timer; jobs already running are left to finish on their own.
///
/// Job state is not persisted, runs of the same job are not serialized, and
/// failed runs are not retried.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&mut self, job: Job) -> &mut Self {
        info!(job = %job.name, trigger = %job.trigger, "Registered job");
        self.jobs.push(job);
        self
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Spawn the driver task. Must be called from within a Tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let driver = tokio::spawn(drive(self.jobs, stop_rx));
        info!("Scheduler started");
        SchedulerHandle { stop_tx, driver }
    }
}

/// Owner of a running scheduler.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    driver: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.driver.is_finished()
    }

    /// Stop the timer and wait for the driver task to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.driver.await;
        info!("Scheduler stopped");
    }
}

async fn drive(jobs: Vec<Job>, mut stop_rx: watch::Receiver<bool>) {
    let started = Utc::now();
    let mut pending: Vec<(Job, DateTime<Utc>)> = jobs
        .into_iter()
        .filter_map(|job| match job.trigger.next_fire(started) {
            Some(at) => {
                info!(job = %job.name, next_run = %at, "Job scheduled");
                Some((job, at))
            }
            None => {
                warn!(job = %job.name, trigger = %job.trigger, "{}", job.trigger.never_fires_reason());
                None
            }
        })
        .collect();

    loop {
        let Some(next_at) = pending.iter().map(|(_, at)| *at).min() else {
            info!("No jobs left to schedule; scheduler idle");
            let _ = stop_rx.changed().await;
            return;
        };

        let wait = (next_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(MAX_SLEEP);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => {
                debug!("Scheduler stop requested");
                return;
            }
        }

        let now = Utc::now();
        let mut still_pending = Vec::with_capacity(pending.len());
        for (job, at) in pending.drain(..) {
            if at > now {
                still_pending.push((job, at));
                continue;
            }

            info!(job = %job.name, scheduled_for = %at, "Running scheduled job");
            tokio::spawn((job.task)());

            match job.trigger.next_fire(now) {
                Some(next) => {
                    debug!(job = %job.name, next_run = %next, "Job rescheduled");
                    still_pending.push((job, next));
                }
                None => debug!(job = %job.name, "One-shot job finished scheduling"),
            }
        }
        pending = still_pending;
    }
}
