use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub interval: Duration,
    pub tick: mpsc::Sender<()>,
    /// Fire once at start instead of waiting a full interval.
    pub run_immediately: bool,
}

/// Spawn one ticker per job. Tickers stop when `stop` is cancelled or the
/// receiving side of their channel is dropped.
pub fn start(jobs: Vec<JobSpec>, stop: &CancellationToken) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|job| {
            let stop = stop.clone();
            tokio::spawn(async move {
                let start_at = if job.run_immediately {
                    Instant::now()
                } else {
                    Instant::now() + job.interval
                };
                let mut interval = tokio::time::interval_at(start_at, job.interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        () = stop.cancelled() => break,
                        _ = interval.tick() => {}
                    }
                    tracing::debug!(job = %job.name, "scheduler tick");
                    if job.tick.send(()).await.is_err() {
                        break;
                    }
                }
                tracing::debug!(job = %job.name, "scheduler stopped");
            })
        })
        .collect()
}
