//! Periodic job runner
//!
//! Each job owns a tokio interval. The first tick fires immediately, a run
//! that overruns its period skips the missed ticks, and a job never overlaps
//! with itself. Jobs have no ordering relative to each other.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    jobs: Vec<(String, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            jobs: Vec::new(),
        }
    }

    /// Run `job` every `period` until shutdown
    pub fn spawn_periodic<F, Fut>(&mut self, name: &str, period: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let job_name = name.to_string();

        info!("Scheduling job '{}' every {:?}", job_name, period);

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        debug!("Running job '{}'", job_name);
                        job().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Job '{}' stopped", job_name);
        });

        self.jobs.push((name.to_string(), handle));
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Stop every job and wait for in-flight runs to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.jobs {
            if let Err(e) = handle.await {
                warn!("Job '{}' ended abnormally: {}", name, e);
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_job_runs_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();

        let counter = runs.clone();
        scheduler.spawn_periodic("count", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(scheduler.job_count(), 1);

        tokio::time::sleep(Duration::from_millis(55)).await;
        scheduler.shutdown().await;

        let after_shutdown = runs.load(Ordering::SeqCst);
        assert!(after_shutdown >= 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test]
    async fn test_first_tick_is_immediate() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();

        let counter = runs.clone();
        scheduler.spawn_periodic("slow-period", Duration::from_secs(3600), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.shutdown().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
