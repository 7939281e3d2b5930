//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count completed HTTP requests
//! - Maintain a cumulative request-duration histogram
//! - Estimate latency quantiles from retained observations
//! - Render everything in Prometheus text exposition format
//!
//! # Metrics
//! - `http_requests_total` (counter): total completed requests
//! - `http_request_duration_seconds` (histogram): latency distribution,
//!   followed by `_quantile` lines for p50, p90 and p99
//!
//! # Design Decisions
//! - One mutex guards counter, buckets, sum and observation log so every
//!   render sees a consistent snapshot (`+Inf` always equals the counter)
//! - Quantiles sort the retained observations on each render and pick rank
//!   `ceil(p/100 * N) - 1`
//! - The observation log is unbounded unless a retention cap is configured;
//!   a cap only narrows the quantile window, lifetime totals are unaffected
//! - Invalid durations (negative, NaN, infinite) are recorded as zero

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::ObservabilityConfig;

/// Histogram upper bounds in seconds, ascending.
pub const BUCKET_BOUNDS_SECONDS: [f64; 7] = [0.05, 0.1, 0.3, 0.5, 1.0, 2.0, 5.0];

/// Reported quantiles as (percentile, exposition label).
pub const QUANTILES: [(f64, &str); 3] = [(50.0, "0.5"), (90.0, "0.9"), (99.0, "0.99")];

const REQUESTS_TOTAL: &str = "http_requests_total";
const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// One completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub method: String,
    pub route: String,
    pub status: u16,
    pub duration_ms: f64,
}

impl Observation {
    pub fn new(method: &str, route: &str, status: u16, duration_ms: f64) -> Self {
        Self {
            method: method.to_string(),
            route: route.to_string(),
            status,
            duration_ms: sanitize_duration(duration_ms),
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms / 1000.0
    }
}

/// A cumulative (`le`) histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBucket {
    pub upper_bound_seconds: f64,
    pub cumulative_count: u64,
}

#[derive(Debug, Default)]
struct MetricsState {
    total: u64,
    sum_ms: f64,
    buckets: [u64; BUCKET_BOUNDS_SECONDS.len()],
    observations: VecDeque<Observation>,
}

/// Process-wide request metrics accumulator.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    state: Mutex<MetricsState>,
    /// Maximum retained observations; `None` keeps all of them.
    retention: Option<usize>,
}

impl MetricsRecorder {
    /// Recorder that retains every observation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder keeping at most `cap` observations for quantiles. Zero means unbounded.
    pub fn with_retention(cap: usize) -> Self {
        Self {
            state: Mutex::new(MetricsState::default()),
            retention: (cap > 0).then_some(cap),
        }
    }

    /// Record one completed request.
    pub fn record(&self, method: &str, route: &str, status: u16, duration_ms: f64) {
        let observation = Observation::new(method, route, status, duration_ms);
        let seconds = observation.duration_seconds();

        let mut state = self.state.lock();
        state.total += 1;
        state.sum_ms += observation.duration_ms;
        for (count, bound) in state.buckets.iter_mut().zip(BUCKET_BOUNDS_SECONDS) {
            if seconds <= bound {
                *count += 1;
            }
        }
        state.observations.push_back(observation);
        if let Some(cap) = self.retention {
            while state.observations.len() > cap {
                state.observations.pop_front();
            }
        }
    }

    /// Record a request measured from `started` until now. Returns the
    /// measured duration in milliseconds.
    pub fn record_request(&self, method: &str, route: &str, status: u16, started: Instant) -> f64 {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.record(method, route, status, duration_ms);
        duration_ms
    }

    /// Clear all counts and the observation log. Test isolation only.
    pub fn reset(&self) {
        *self.state.lock() = MetricsState::default();
    }

    pub fn total_requests(&self) -> u64 {
        self.state.lock().total
    }

    pub fn buckets(&self) -> Vec<HistogramBucket> {
        let state = self.state.lock();
        BUCKET_BOUNDS_SECONDS
            .iter()
            .zip(state.buckets.iter())
            .map(|(&upper_bound_seconds, &cumulative_count)| HistogramBucket {
                upper_bound_seconds,
                cumulative_count,
            })
            .collect()
    }

    /// Retained observations, oldest first.
    pub fn observations(&self) -> Vec<Observation> {
        self.state.lock().observations.iter().cloned().collect()
    }

    /// Latency at `percentile` (0-100) in seconds over the retained observations.
    pub fn quantile(&self, percentile: f64) -> f64 {
        select_quantile(&self.sorted_durations_ms(), percentile) / 1000.0
    }

    /// Render the Prometheus text exposition.
    pub fn render(&self) -> String {
        let (total, sum_ms, buckets, mut durations) = {
            let state = self.state.lock();
            let durations: Vec<f64> = state.observations.iter().map(|o| o.duration_ms).collect();
            (state.total, state.sum_ms, state.buckets, durations)
        };
        durations.sort_by(|a, b| a.total_cmp(b));

        let mut out = String::with_capacity(1024);
        // Writing into a String cannot fail.
        let _ = writeln!(out, "# HELP {} Total number of HTTP requests", REQUESTS_TOTAL);
        let _ = writeln!(out, "# TYPE {} counter", REQUESTS_TOTAL);
        let _ = writeln!(out, "{} {}", REQUESTS_TOTAL, total);

        let _ = writeln!(out, "# HELP {} HTTP request duration in seconds", REQUEST_DURATION);
        let _ = writeln!(out, "# TYPE {} histogram", REQUEST_DURATION);
        for (bound, count) in BUCKET_BOUNDS_SECONDS.iter().zip(buckets.iter()) {
            let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", REQUEST_DURATION, bound, count);
        }
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", REQUEST_DURATION, total);
        let _ = writeln!(out, "{}_count {}", REQUEST_DURATION, total);
        let _ = writeln!(out, "{}_sum {}", REQUEST_DURATION, sum_ms / 1000.0);
        for (percentile, label) in QUANTILES {
            let seconds = select_quantile(&durations, percentile) / 1000.0;
            let _ = writeln!(
                out,
                "{}_quantile{{quantile=\"{}\"}} {}",
                REQUEST_DURATION, label, seconds
            );
        }
        out
    }

    fn sorted_durations_ms(&self) -> Vec<f64> {
        let mut durations: Vec<f64> = self
            .state
            .lock()
            .observations
            .iter()
            .map(|o| o.duration_ms)
            .collect();
        durations.sort_by(|a, b| a.total_cmp(b));
        durations
    }
}

/// Rank selection on ascending durations; zero when empty.
fn select_quantile(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (percentile * sorted.len() as f64 / 100.0).ceil() - 1.0;
    let index = (rank.max(0.0) as usize).min(sorted.len() - 1);
    sorted[index]
}

fn sanitize_duration(duration_ms: f64) -> f64 {
    if duration_ms.is_finite() && duration_ms > 0.0 {
        duration_ms
    } else {
        0.0
    }
}

static GLOBAL: OnceLock<Arc<MetricsRecorder>> = OnceLock::new();

/// Create the process-wide recorder from configuration.
///
/// Only the first call configures retention; later calls return the same recorder.
pub fn init_metrics(config: &ObservabilityConfig) -> Arc<MetricsRecorder> {
    GLOBAL
        .get_or_init(|| {
            tracing::debug!(
                max_retained_observations = config.max_retained_observations,
                "Metrics recorder initialized"
            );
            Arc::new(MetricsRecorder::with_retention(config.max_retained_observations))
        })
        .clone()
}

/// The process-wide recorder, created unbounded if `init_metrics` was never called.
pub fn global() -> Arc<MetricsRecorder> {
    GLOBAL.get_or_init(|| Arc::new(MetricsRecorder::new())).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder_with(durations: &[f64]) -> MetricsRecorder {
        let recorder = MetricsRecorder::new();
        for &d in durations {
            recorder.record("GET", "/health", 200, d);
        }
        recorder
    }

    fn counts(recorder: &MetricsRecorder) -> Vec<u64> {
        recorder.buckets().iter().map(|b| b.cumulative_count).collect()
    }

    #[test]
    fn test_buckets_are_cumulative() {
        let recorder = MetricsRecorder::new();

        recorder.record("GET", "/", 200, 200.0);
        assert_eq!(counts(&recorder), vec![0, 0, 1, 1, 1, 1, 1]);

        recorder.record("GET", "/", 200, 50.0);
        assert_eq!(counts(&recorder), vec![1, 1, 2, 2, 2, 2, 2]);

        recorder.record("GET", "/", 200, 9000.0);
        assert_eq!(counts(&recorder), vec![1, 1, 2, 2, 2, 2, 2]);
        assert_eq!(recorder.total_requests(), 3);
    }

    #[test]
    fn test_bound_is_inclusive() {
        let recorder = recorder_with(&[1000.0]);
        let one_second = recorder
            .buckets()
            .into_iter()
            .find(|b| b.upper_bound_seconds == 1.0)
            .unwrap();
        assert_eq!(one_second.cumulative_count, 1);
    }

    #[test]
    fn test_empty_render() {
        let recorder = MetricsRecorder::new();
        let body = recorder.render();
        assert!(body.contains("http_requests_total 0\n"));
        assert!(body.contains("http_request_duration_seconds_bucket{le=\"+Inf\"} 0\n"));
        assert!(body.contains("http_request_duration_seconds_sum 0\n"));
        assert!(body.contains("http_request_duration_seconds_quantile{quantile=\"0.99\"} 0\n"));
    }

    #[test]
    fn test_render_golden() {
        let recorder = recorder_with(&[10.0, 50.0, 100.0, 500.0, 1000.0]);
        let expected = "\
# HELP http_requests_total Total number of HTTP requests
# TYPE http_requests_total counter
http_requests_total 5
# HELP http_request_duration_seconds HTTP request duration in seconds
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le=\"0.05\"} 2
http_request_duration_seconds_bucket{le=\"0.1\"} 3
http_request_duration_seconds_bucket{le=\"0.3\"} 3
http_request_duration_seconds_bucket{le=\"0.5\"} 4
http_request_duration_seconds_bucket{le=\"1\"} 5
http_request_duration_seconds_bucket{le=\"2\"} 5
http_request_duration_seconds_bucket{le=\"5\"} 5
http_request_duration_seconds_bucket{le=\"+Inf\"} 5
http_request_duration_seconds_count 5
http_request_duration_seconds_sum 1.66
http_request_duration_seconds_quantile{quantile=\"0.5\"} 0.1
http_request_duration_seconds_quantile{quantile=\"0.9\"} 1
http_request_duration_seconds_quantile{quantile=\"0.99\"} 1
";
        assert_eq!(recorder.render(), expected);
    }

    #[test]
    fn test_quantile_rank_selection() {
        // Insertion order must not matter.
        let recorder = recorder_with(&[1000.0, 10.0, 500.0, 100.0, 50.0]);
        assert_eq!(recorder.quantile(50.0), 0.1);
        assert_eq!(recorder.quantile(90.0), 1.0);
        assert_eq!(recorder.quantile(0.0), 0.01);
        assert_eq!(MetricsRecorder::new().quantile(50.0), 0.0);
    }

    #[test]
    fn test_render_is_idempotent() {
        let recorder = recorder_with(&[3.0, 7.0, 250.0]);
        assert_eq!(recorder.render(), recorder.render());
    }

    #[test]
    fn test_reset_clears_everything() {
        let recorder = recorder_with(&[10.0, 2000.0]);
        recorder.reset();

        assert_eq!(recorder.total_requests(), 0);
        assert_eq!(counts(&recorder), vec![0; 7]);
        assert!(recorder.observations().is_empty());
        assert_eq!(recorder.render(), MetricsRecorder::new().render());
    }

    #[test]
    fn test_invalid_durations_clamp_to_zero() {
        let recorder = recorder_with(&[-5.0, f64::NAN, f64::INFINITY]);
        assert_eq!(recorder.total_requests(), 3);
        assert_eq!(counts(&recorder), vec![3; 7]);
        assert!(recorder.observations().iter().all(|o| o.duration_ms == 0.0));
        assert!(recorder.render().contains("http_request_duration_seconds_sum 0\n"));
    }

    #[test]
    fn test_observation_fields() {
        let recorder = MetricsRecorder::new();
        recorder.record("POST", "/events", 202, 12.5);
        assert_eq!(
            recorder.observations(),
            vec![Observation {
                method: "POST".into(),
                route: "/events".into(),
                status: 202,
                duration_ms: 12.5,
            }]
        );
    }

    #[test]
    fn test_retention_caps_quantile_window_only() {
        let recorder = MetricsRecorder::with_retention(2);
        for d in [4000.0, 10.0, 20.0] {
            recorder.record("GET", "/", 200, d);
        }

        assert_eq!(recorder.observations().len(), 2);
        assert_eq!(recorder.total_requests(), 3);
        assert_eq!(recorder.quantile(99.0), 0.02);
        assert!(recorder.render().contains("http_request_duration_seconds_sum 4.03\n"));
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let recorder = MetricsRecorder::new();
        std::thread::scope(|s| {
            for t in 0..8 {
                let recorder = &recorder;
                s.spawn(move || {
                    for i in 0..500 {
                        recorder.record("GET", "/health", 200, ((t * 500 + i) % 100) as f64);
                    }
                });
            }
        });

        assert_eq!(recorder.total_requests(), 4000);
        assert_eq!(recorder.observations().len(), 4000);
        // Durations 0..=50 ms land in the first bucket: 51 of every 100.
        assert_eq!(counts(&recorder)[0], 51 * 40);
        assert_eq!(counts(&recorder)[1], 4000);
    }

    #[test]
    fn test_record_request_measures_elapsed_time() {
        let recorder = MetricsRecorder::new();
        let started = Instant::now() - std::time::Duration::from_millis(20);
        let measured = recorder.record_request("GET", "/health", 200, started);
        assert_eq!(recorder.total_requests(), 1);
        assert!(measured >= 20.0);
        assert_eq!(recorder.observations()[0].duration_ms, measured);
    }
}
