use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    counter::TrafficCounters,
    models::{Outcome, RunSummary, Snapshot},
    report::Reporter,
    speed::SpeedEstimator,
};

/// Samples the counters on a fixed interval, reports progress and ends the
/// run once `sent + received` exceeds the threshold.
pub struct ProgressMonitor {
    counters: Arc<TrafficCounters>,
    threshold: u64,
    poll_interval: Duration,
    cancel: CancellationToken,
    started: Instant,
    upload: SpeedEstimator,
    download: SpeedEstimator,
}

impl ProgressMonitor {
    pub fn new(
        counters: Arc<TrafficCounters>,
        threshold: u64,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let started = Instant::now();
        Self {
            counters,
            threshold,
            poll_interval,
            cancel,
            started,
            upload: SpeedEstimator::new(started, 0),
            download: SpeedEstimator::new(started, 0),
        }
    }

    /// Reads both counters and the instantaneous speeds since the last sample.
    pub fn sample(&mut self) -> Snapshot {
        let now = Instant::now();
        let (sent, received) = self.counters.load();
        Snapshot {
            elapsed: now.saturating_duration_since(self.started),
            sent,
            received,
            upload_speed: self.upload.calc_at(sent, now),
            download_speed: self.download.calc_at(received, now),
        }
    }

    /// Re-rates `snapshot` against the start of the run, giving average speeds.
    fn average(&self, snapshot: &Snapshot) -> Snapshot {
        let at = self.started + snapshot.elapsed;
        Snapshot {
            upload_speed: SpeedEstimator::new(self.started, 0).calc_at(snapshot.sent, at),
            download_speed: SpeedEstimator::new(self.started, 0).calc_at(snapshot.received, at),
            ..*snapshot
        }
    }

    /// Polls until the threshold is crossed or the token is cancelled elsewhere.
    /// Besides the ticks, a sample is taken as soon as the counters report the
    /// crossing. Cancels the token itself on threshold and reports the final
    /// summary once.
    pub async fn run<R: Reporter>(mut self, mut reporter: R) -> RunSummary {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let interrupted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => true,
                _ = self.counters.threshold_crossed() => false,
                _ = ticker.tick() => false,
            };
            if interrupted {
                let snapshot = self.sample();
                return self.finish(&mut reporter, snapshot, Outcome::Interrupted);
            }

            let snapshot = self.sample();
            if let Err(err) = reporter.update(&snapshot) {
                debug!(error = %err, "failed to write status line");
            }

            if snapshot.total() > self.threshold {
                self.cancel.cancel();
                return self.finish(&mut reporter, snapshot, Outcome::ThresholdReached);
            }
        }
    }

    fn finish<R: Reporter>(
        &self,
        reporter: &mut R,
        snapshot: Snapshot,
        outcome: Outcome,
    ) -> RunSummary {
        let summary = RunSummary {
            outcome,
            snapshot: self.average(&snapshot),
        };
        if let Err(err) = reporter.finish(&summary) {
            debug!(error = %err, "failed to write summary");
        }
        trace!(
            ?outcome,
            sent = snapshot.sent,
            received = snapshot.received,
            elapsed = ?snapshot.elapsed,
            "run finished"
        );
        summary
    }
}
