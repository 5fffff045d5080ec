//! Recurring and one-shot background jobs
//!
//! A [`JobScheduler`] owns one tokio task per recurring job, keyed by
//! [`JobId`]. Registering under an existing id aborts the old task first, so
//! a ticker never has two timers of the same kind. Once shut down the
//! scheduler refuses new work.

use crate::ticker::Ticker;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

/// Kind of per-ticker refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    News,
    Sentiment,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::News => write!(f, "news"),
            Self::Sentiment => write!(f, "sentiment"),
        }
    }
}

/// Stable job identity: one job per ticker and kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    pub ticker: Ticker,
    pub kind: JobKind,
}

impl JobId {
    pub fn new(ticker: Ticker, kind: JobKind) -> Self {
        Self { ticker, kind }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.ticker, self.kind)
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Shared scheduler; clones refer to the same job table
#[derive(Clone, Default)]
pub struct JobScheduler {
    jobs: Arc<DashMap<JobId, JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period`, first one period from now
    ///
    /// Replaces any job registered under `id`. Each run is its own task: a
    /// panicking run is logged and the next tick proceeds normally. Aborting
    /// the job also aborts a run in progress. Ignored after [`shutdown`].
    ///
    /// [`shutdown`]: JobScheduler::shutdown
    pub fn schedule_every<F, Fut>(&self, id: JobId, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            debug!(job = %id, "Scheduler shut down, not scheduling");
            return;
        }
        let period = period.max(Duration::from_millis(1));
        let name = id.to_string();

        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                debug!(job = %name, "Running scheduled job");
                let mut run = AbortOnDrop(tokio::spawn(job()));
                if let Err(e) = (&mut run.0).await {
                    if e.is_panic() {
                        error!(job = %name, "Scheduled job panicked");
                    }
                }
            }
        });

        info!(job = %id, period_secs = period.as_secs(), "Scheduled job");
        if let Some(previous) = self.jobs.insert(id, handle) {
            previous.abort();
        }
    }

    /// Run `task` once in the background; `None` after shutdown
    ///
    /// One-shot tasks are not tracked, so shutdown lets a started one finish.
    pub fn run_once<Fut>(&self, label: &str, task: Fut) -> Option<JoinHandle<()>>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            debug!(job = label, "Scheduler shut down, dropping one-shot job");
            return None;
        }
        debug!(job = label, "Spawning one-shot job");
        Some(tokio::spawn(task))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether a live job is registered under `id`
    #[cfg(test)]
    fn is_scheduled(&self, id: &JobId) -> bool {
        self.jobs.get(id).is_some_and(|handle| !handle.is_finished())
    }

    /// Registered job ids, sorted
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Stop and forget one job; returns whether it existed
    #[cfg(test)]
    fn cancel(&self, id: &JobId) -> bool {
        match self.jobs.remove(id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every recurring job and refuse new ones
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let count = self.jobs.len();
        self.jobs.retain(|_, handle| {
            handle.abort();
            false
        });
        if count > 0 {
            info!(count, "Scheduler shut down");
        }
    }
}
