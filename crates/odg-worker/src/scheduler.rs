//! Periodic in-process scheduler for reconciliation jobs.
//!
//! Every configured job ticks on its own interval. A tick that finds a run of
//! the same task still in progress is skipped. Failed runs are
//! retried with exponential backoff unless classified as `SkipRetry`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use odg_tasks::{
    DynTaskHandler, Payload, ReconcileError, RegistryError, Retry, RunReport, TaskRegistry,
};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{JobConfig, WorkerSettings};

/// Exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&WorkerSettings> for RetryPolicy {
    fn from(settings: &WorkerSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.retry_base_delay_secs),
            Duration::from_secs(settings.retry_max_delay_secs),
        )
    }
}

/// Result of one scheduled execution of a job.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded {
        report: RunReport,
        attempts: u32,
    },
    Failed {
        error: ReconcileError,
        retry: Retry,
        attempts: u32,
    },
    /// The previous run was still in progress.
    Skipped,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Runs `handler` until it succeeds, fails with `SkipRetry`, exhausts
/// `max_retry` retries or `cancel` fires.
pub async fn execute_with_retry(
    handler: &DynTaskHandler,
    payload: &Payload,
    max_retry: u32,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> JobOutcome {
    let task = handler.name();
    let mut attempt: u32 = 0;

    loop {
        let result = handler.handle(payload, cancel).await;
        let attempts = attempt + 1;

        let error = match result {
            Ok(report) => {
                info!(
                    task,
                    attempts,
                    discovered = report.discovered,
                    reported = report.reported,
                    "task succeeded"
                );
                return JobOutcome::Succeeded { report, attempts };
            }
            Err(error) => error,
        };

        let retry = error.retry();
        if retry == Retry::SkipRetry || attempt >= max_retry || cancel.is_cancelled() {
            error!(task, attempts, retry = %retry, error = %error, "task failed");
            return JobOutcome::Failed {
                error,
                retry,
                attempts,
            };
        }

        let delay = policy.delay(attempt);
        warn!(
            task,
            attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "task failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                error!(task, attempts, error = %error, "task failed, retry cancelled");
                return JobOutcome::Failed { error, retry, attempts };
            }
            _ = sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// A task bound to its payload and schedule.
pub struct Job {
    handler: DynTaskHandler,
    payload: Payload,
    interval: Duration,
    max_retry: u32,
    /// Shared by every job of the same task name.
    running: Arc<Mutex<()>>,
}

impl Job {
    pub fn new(
        handler: DynTaskHandler,
        payload: Payload,
        interval: Duration,
        max_retry: u32,
    ) -> Self {
        Self {
            handler,
            payload,
            interval,
            max_retry,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Replaces the single-flight guard with one shared with other jobs.
    #[must_use]
    pub fn with_guard(mut self, guard: Arc<Mutex<()>>) -> Self {
        self.running = guard;
        self
    }

    pub fn task(&self) -> &'static str {
        self.handler.name()
    }

    /// Executes the job unless a run of the same task is still in progress.
    pub async fn run_once(&self, policy: &RetryPolicy, cancel: &CancellationToken) -> JobOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            warn!(task = self.task(), "previous run still in progress, skipping");
            return JobOutcome::Skipped;
        };
        execute_with_retry(&self.handler, &self.payload, self.max_retry, policy, cancel).await
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("task", &self.task())
            .field("interval", &self.interval)
            .field("max_retry", &self.max_retry)
            .finish()
    }
}

#[derive(Debug)]
pub struct Scheduler {
    jobs: Vec<Arc<Job>>,
    policy: RetryPolicy,
}

impl Scheduler {
    /// Resolves every configured job against the registry. Jobs naming the
    /// same task share one single-flight guard.
    pub fn from_config(
        registry: &TaskRegistry,
        jobs: &[JobConfig],
        policy: RetryPolicy,
    ) -> Result<Self, RegistryError> {
        let mut guards: HashMap<&'static str, Arc<Mutex<()>>> = HashMap::new();
        let jobs = jobs
            .iter()
            .map(|job| {
                let handler = registry.get(&job.task)?;
                let guard = guards.entry(handler.name()).or_default().clone();
                let job = Job::new(handler, job.payload.clone(), job.interval(), job.max_retry)
                    .with_guard(guard);
                Ok(Arc::new(job))
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        Ok(Self { jobs, policy })
    }

    pub fn jobs(&self) -> &[Arc<Job>] {
        &self.jobs
    }

    /// Runs all jobs until `cancel` fires, then waits for in-flight runs.
    pub async fn run(self, cancel: CancellationToken) {
        let mut loops = JoinSet::new();
        for job in self.jobs {
            info!(task = job.task(), interval_secs = job.interval.as_secs(), "scheduling job");
            loops.spawn(job_loop(job, self.policy, cancel.clone()));
        }

        while loops.join_next().await.is_some() {}
        info!("scheduler stopped");
    }
}

async fn job_loop(job: Arc<Job>, policy: RetryPolicy, cancel: CancellationToken) {
    let mut ticker = interval(job.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut runs = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Reap finished runs so the set does not grow.
        while runs.try_join_next().is_some() {}

        let job = job.clone();
        let cancel = cancel.clone();
        runs.spawn(async move { job.run_once(&policy, &cancel).await });
    }

    debug!(task = job.task(), "waiting for in-flight runs");
    while runs.join_next().await.is_some() {}
}
