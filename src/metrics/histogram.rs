use tracing::info;

use crate::utils::time::LatencyTimer;

/// Bucket width in nanoseconds. Percentile resolution equals this width.
pub const BUCKET_WIDTH_NS: u64 = 100;

/// Number of buckets; covers up to 1 ms, the last bucket saturates as
/// overflow.
pub const NUM_BUCKETS: usize = 10_000;

/// Fixed-bucket latency histogram for the hot path.
///
/// Storage is allocated once at construction; `record` touches only the
/// bucket array and three scalars, so sampling adds no jitter of its
/// own. `start`/`stop` pair around a code region; `record` accepts a
/// pre-measured duration in nanoseconds.
#[derive(Debug)]
pub struct LatencyHistogram {
    name: String,
    buckets: Box<[u64]>,
    count: u64,
    min: u64,
    max: u64,
    timer: Option<LatencyTimer>,
}

/// Summary of a histogram's samples; percentiles come from linear
/// accumulation over the buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramStats {
    pub count: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
    pub p50_nanos: u64,
    pub p99_nanos: u64,
    pub p999_nanos: u64,
}

impl LatencyHistogram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buckets: vec![0u64; NUM_BUCKETS].into_boxed_slice(),
            count: 0,
            min: u64::MAX,
            max: 0,
            timer: None,
        }
    }

    /// Begin a measurement. A second `start` before `stop` restarts it.
    #[inline]
    pub fn start(&mut self) {
        self.timer = Some(LatencyTimer::start());
    }

    /// End the measurement begun by `start` and record it. A `stop`
    /// without a matching `start` is ignored.
    #[inline]
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.record(timer.stop().as_nanos() as u64);
        }
    }

    /// Record a pre-measured duration in nanoseconds.
    pub fn record(&mut self, nanos: u64) {
        self.count += 1;
        self.min = self.min.min(nanos);
        self.max = self.max.max(nanos);

        let idx = ((nanos / BUCKET_WIDTH_NS) as usize).min(NUM_BUCKETS - 1);
        self.buckets[idx] += 1;
    }

    pub fn stats(&self) -> HistogramStats {
        let mut stats = HistogramStats {
            count: self.count,
            min_nanos: if self.min == u64::MAX { 0 } else { self.min },
            max_nanos: self.max,
            p50_nanos: 0,
            p99_nanos: 0,
            p999_nanos: 0,
        };
        if self.count == 0 {
            return stats;
        }

        let targets = [
            (&mut stats.p50_nanos, (self.count as f64 * 0.50) as u64),
            (&mut stats.p99_nanos, (self.count as f64 * 0.99) as u64),
            (&mut stats.p999_nanos, (self.count as f64 * 0.999) as u64),
        ];

        let mut accumulated = 0u64;
        let mut pending = targets.into_iter().peekable();
        for (idx, bucket) in self.buckets.iter().enumerate() {
            accumulated += bucket;
            let bucket_end = (idx as u64 + 1) * BUCKET_WIDTH_NS;
            while let Some((slot, _)) = pending.next_if(|(_, target)| accumulated >= *target) {
                *slot = bucket_end;
            }
            if pending.peek().is_none() {
                break;
            }
        }
        drop(pending);
        stats
    }

    /// Log a one-line summary of the distribution.
    pub fn report(&self) {
        let stats = self.stats();
        info!(
            histogram = %self.name,
            samples = stats.count,
            min_ns = stats.min_nanos,
            max_ns = stats.max_nanos,
            p50_ns = stats.p50_nanos,
            p99_ns = stats.p99_nanos,
            p999_ns = stats.p999_nanos,
            "latency report"
        );
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_are_zero() {
        let histogram = LatencyHistogram::new("empty");
        let stats = histogram.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min_nanos, 0);
        assert_eq!(stats.max_nanos, 0);
        assert_eq!(stats.p50_nanos, 0);
    }

    #[test]
    fn test_record_tracks_min_max_count() {
        let mut histogram = LatencyHistogram::new("test");
        histogram.record(250);
        histogram.record(1_500);
        histogram.record(90);

        let stats = histogram.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_nanos, 90);
        assert_eq!(stats.max_nanos, 1_500);
    }

    #[test]
    fn test_percentiles_at_bucket_resolution() {
        let mut histogram = LatencyHistogram::new("test");
        // 100 samples at 150ns, five outliers at 5_050ns.
        for _ in 0..100 {
            histogram.record(150);
        }
        for _ in 0..5 {
            histogram.record(5_050);
        }

        let stats = histogram.stats();
        // 150ns lands in bucket [100, 200); percentiles report the
        // bucket end.
        assert_eq!(stats.p50_nanos, 200);
        assert_eq!(stats.p99_nanos, 5_100);
        assert_eq!(stats.p999_nanos, 5_100);
    }

    #[test]
    fn test_overflow_saturates_last_bucket() {
        let mut histogram = LatencyHistogram::new("test");
        for _ in 0..10 {
            histogram.record(10_000_000); // 10ms, far past the last bucket
        }
        let stats = histogram.stats();
        assert_eq!(stats.max_nanos, 10_000_000);
        // Percentiles cap at the final bucket boundary.
        assert_eq!(stats.p50_nanos, NUM_BUCKETS as u64 * BUCKET_WIDTH_NS);
    }

    #[test]
    fn test_start_stop_records_one_sample() {
        let mut histogram = LatencyHistogram::new("test");
        histogram.start();
        std::thread::sleep(std::time::Duration::from_micros(10));
        histogram.stop();
        assert_eq!(histogram.count(), 1);
        assert!(histogram.stats().min_nanos >= 10_000);

        // stop without start is a no-op
        histogram.stop();
        assert_eq!(histogram.count(), 1);
    }
}
