use tokio::time::Instant;

/// Rate of change of a non-decreasing counter between successive samples.
///
/// Each call to [`calc`](Self::calc) measures only the delta since the previous
/// call, so the estimator is meant to be owned by a single sampler.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    last_time: Instant,
    last_value: u64,
}

impl SpeedEstimator {
    pub fn new(time: Instant, value: u64) -> Self {
        Self {
            last_time: time,
            last_value: value,
        }
    }

    /// Bytes per second since the last sample, then rebases on `value`.
    pub fn calc(&mut self, value: u64) -> f64 {
        self.calc_at(value, Instant::now())
    }

    pub fn calc_at(&mut self, value: u64, now: Instant) -> f64 {
        let delta = value.saturating_sub(self.last_value);
        let elapsed = now.saturating_duration_since(self.last_time).as_secs_f64();
        self.last_time = now;
        self.last_value = value;

        if elapsed > 0.0 {
            delta as f64 / elapsed
        } else {
            0.0
        }
    }
}
