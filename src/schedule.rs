//! Recurring runs
//!
//! A [`Scheduler`] fires a job on a fixed interval. Only one run is in
//! flight at a time: a tick that arrives while the previous run is still
//! going is skipped, so two runs never share a browser session or sheet.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

/// Shortest period a [`Scheduler`] accepts
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Started,
    /// The previous run hadn't finished
    Skipped,
}

pub struct Scheduler {
    period: Duration,
    run_immediately: bool,
    running: Arc<Mutex<()>>,
}

impl Scheduler {
    /// Periods below [`MIN_PERIOD`] are raised to it
    pub fn new(period: Duration) -> Self {
        let period = if period < MIN_PERIOD {
            log::warn!("Period {:?} is too short, using {:?}", period, MIN_PERIOD);
            MIN_PERIOD
        } else {
            period
        };
        Self {
            period,
            run_immediately: true,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Run on the first tick instead of waiting one full period (default: true)
    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a run is in flight
    pub fn is_busy(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Wait for the in-flight run, if any, to finish
    pub async fn wait_idle(&self) {
        let _idle = self.running.lock().await;
    }

    /// Start `job` unless a previous run still holds the guard
    pub fn try_start<F, Fut>(&self, job: &F) -> TickOutcome
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.running.clone().try_lock_owned() {
            Ok(guard) => {
                let run = job();
                tokio::spawn(async move {
                    run.await;
                    drop(guard);
                });
                TickOutcome::Started
            }
            Err(_) => {
                log::warn!("Previous run still in progress, skipping this tick");
                TickOutcome::Skipped
            }
        }
    }

    fn ticker(&self) -> tokio::time::Interval {
        let start = if self.run_immediately {
            Instant::now()
        } else {
            Instant::now() + self.period
        };
        let mut ticker = tokio::time::interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// Fire `ticks` ticks, then wait for the last run to finish
    pub async fn run_for<F, Fut>(&self, ticks: usize, job: F) -> Vec<TickOutcome>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut ticker = self.ticker();
        let mut outcomes = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            ticker.tick().await;
            outcomes.push(self.try_start(&job));
        }
        self.wait_idle().await;
        outcomes
    }

    /// Fire ticks until the process is stopped
    pub async fn run_forever<F, Fut>(&self, job: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        log::info!("Scheduling a run every {:?}", self.period);
        let mut ticker = self.ticker();
        loop {
            ticker.tick().await;
            self.try_start(&job);
        }
    }
}
