use std::{error::Error, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    counter::TrafficCounters,
    error::TransferError,
    models::{RunConfig, RunSummary},
    monitor::ProgressMonitor,
    pool::{Task, WorkerPool},
    report::Reporter,
    transfer::Transfer,
    utils::error_chain,
};

/// Wires the worker pool, the monitor and interrupt handling around one
/// shared pair of counters and one cancellation token.
pub struct Engine {
    config: RunConfig,
    counters: Arc<TrafficCounters>,
    cancel: CancellationToken,
    transfer: Transfer,
}

impl Engine {
    pub fn new(config: RunConfig) -> Result<Self, TransferError> {
        let counters = Arc::new(TrafficCounters::with_threshold(config.threshold_bytes));
        let transfer = Transfer::new(
            Transfer::build_client()?,
            config.url.clone(),
            config.user_agent.clone(),
            counters.clone(),
        );

        Ok(Self {
            config,
            counters,
            cancel: CancellationToken::new(),
            transfer,
        })
    }

    pub fn counters(&self) -> Arc<TrafficCounters> {
        self.counters.clone()
    }

    /// Cancelling this token stops the run as an interrupt would.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs until the threshold is crossed or the token is cancelled.
    ///
    /// Returns as soon as the monitor has reported; transfers still in flight
    /// are left to finish or fail on their own.
    pub async fn run<R: Reporter>(self, reporter: R) -> RunSummary {
        trace!(
            workers = self.config.workers,
            url = %self.config.url,
            threshold = self.config.threshold_bytes,
            "starting transfer engine"
        );

        let monitor = ProgressMonitor::new(
            self.counters.clone(),
            self.config.threshold_bytes,
            self.config.poll_interval,
            self.cancel.clone(),
        );

        let jobs = {
            let transfer = self.transfer.clone();
            let cancel = self.cancel.clone();
            let cooldown = self.config.error_cooldown;
            move || transfer_job(transfer.clone(), cancel.clone(), cooldown)
        };
        let pool = WorkerPool::new(self.config.workers, self.cancel.clone());
        let pool = tokio::spawn(pool.run(jobs));
        let interrupt = tokio::spawn(watch_interrupt(self.cancel.clone()));

        let summary = monitor.run(reporter).await;

        self.cancel.cancel();
        interrupt.abort();
        if pool.is_finished()
            && let Err(err) = pool.await
        {
            warn!(error = %err, "worker pool failed");
        }
        summary
    }
}

fn transfer_job(transfer: Transfer, cancel: CancellationToken, cooldown: Duration) -> Task {
    let attempt = async move {
        let stats = transfer.execute().await?;
        trace!(
            status = %stats.status,
            sent = stats.sent,
            received = stats.received,
            "transfer done"
        );
        Ok::<_, TransferError>(())
    };
    with_cooldown(attempt, cancel, cooldown)
}

/// Runs one attempt. A failed attempt is logged and then holds its worker for
/// `cooldown`, unless the run is cancelled first.
fn with_cooldown<F, E>(attempt: F, cancel: CancellationToken, cooldown: Duration) -> Task
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Error + Send + 'static,
{
    Box::pin(async move {
        if let Err(err) = attempt.await {
            debug!(error = %error_chain(&err), "transfer failed");
            tokio::select! {
                _ = tokio::time::sleep(cooldown) => {}
                _ = cancel.cancelled() => {}
            }
        }
    })
}

async fn watch_interrupt(cancel: CancellationToken) {
    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                debug!("interrupt received, shutting down");
                cancel.cancel();
            }
            Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
        },
        _ = cancel.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tokio::time::Instant;

    fn failing_jobs(
        attempts: Arc<AtomicUsize>,
        cancel: CancellationToken,
        cooldown: Duration,
    ) -> impl FnMut() -> Task {
        move || {
            let attempts = attempts.clone();
            let attempt = async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))
            };
            with_cooldown(attempt, cancel.clone(), cooldown)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempts_retry_once_per_cooldown() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let jobs = failing_jobs(attempts.clone(), cancel.clone(), Duration::from_secs(1));
        let run = tokio::spawn(WorkerPool::new(1, cancel.clone()).run(jobs));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let cancelled_at = Instant::now();
        cancel.cancel();
        run.await.unwrap();
        assert!(cancelled_at.elapsed() < Duration::from_millis(100));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_attempts_do_not_wait() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        with_cooldown(async { Ok::<(), io::Error>(()) }, cancel, Duration::from_secs(1)).await;

        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
