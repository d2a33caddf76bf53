//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Loop timing reporter with a bounded jitter window."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Samples kept per histogram; older samples are evicted first.
const JITTER_WINDOW: usize = 4096;

/// Rolling window of loop jitter samples in microseconds.
#[derive(Debug, Default)]
pub struct JitterHistogram {
    samples: Mutex<VecDeque<f64>>,
}

impl JitterHistogram {
    pub fn record(&self, jitter: Duration) {
        let micros = jitter.as_secs_f64() * 1_000_000.0;
        let mut samples = self.samples.lock();
        if samples.len() == JITTER_WINDOW {
            samples.pop_front();
        }
        samples.push_back(micros);
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        let mut samples = self.samples.lock();
        let slice = samples.make_contiguous();
        if slice.is_empty() {
            return None;
        }
        let count = slice.len() as f64;
        let mean = slice.iter().sum::<f64>() / count;
        let variance = if slice.len() > 1 {
            slice
                .iter()
                .map(|value| {
                    let delta = value - mean;
                    delta * delta
                })
                .sum::<f64>()
                / (count - 1.0)
        } else {
            0.0
        };
        Some(JitterSummary {
            mean_us: mean,
            std_dev_us: variance.sqrt(),
            max_us: slice.iter().copied().fold(f64::MIN, f64::max),
            min_us: slice.iter().copied().fold(f64::MAX, f64::min),
            samples: slice.len() as u64,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JitterSummary {
    pub mean_us: f64,
    pub std_dev_us: f64,
    pub max_us: f64,
    pub min_us: f64,
    pub samples: u64,
}

/// Measures how far each loop iteration drifts from its target period.
#[derive(Debug)]
pub struct LoopTimingReporter {
    target_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
    histogram: JitterHistogram,
}

impl LoopTimingReporter {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: Mutex::new(None),
            histogram: JitterHistogram::default(),
        }
    }

    /// Record a tick at `now`; returns the jitter against the previous tick, if any.
    pub fn record_tick_at(&self, now: Instant) -> Option<Duration> {
        let mut last_tick = self.last_tick.lock();
        let jitter = last_tick.map(|previous| {
            let actual = now.saturating_duration_since(previous);
            if actual > self.target_interval {
                actual - self.target_interval
            } else {
                self.target_interval - actual
            }
        });
        if let Some(jitter) = jitter {
            self.histogram.record(jitter);
        }
        *last_tick = Some(now);
        jitter
    }

    pub fn record_tick(&self) -> Option<Duration> {
        self.record_tick_at(Instant::now())
    }

    pub fn histogram(&self) -> &JitterHistogram {
        &self.histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_jitter() {
        let reporter = LoopTimingReporter::new(Duration::from_millis(100));
        assert!(reporter.record_tick_at(Instant::now()).is_none());
        assert!(reporter.histogram().summary().is_none());
    }

    #[test]
    fn jitter_is_distance_from_target() {
        let reporter = LoopTimingReporter::new(Duration::from_millis(100));
        let start = Instant::now();
        reporter.record_tick_at(start);
        let late = reporter
            .record_tick_at(start + Duration::from_millis(130))
            .unwrap();
        assert_eq!(late, Duration::from_millis(30));
        let early = reporter
            .record_tick_at(start + Duration::from_millis(220))
            .unwrap();
        assert_eq!(early, Duration::from_millis(10));

        let summary = reporter.histogram().summary().unwrap();
        assert_eq!(summary.samples, 2);
        assert!((summary.mean_us - 20_000.0).abs() < 1.0);
        assert!((summary.max_us - 30_000.0).abs() < 1.0);
    }

    #[test]
    fn histogram_keeps_a_bounded_window() {
        let histogram = JitterHistogram::default();
        for _ in 0..JITTER_WINDOW + 10 {
            histogram.record(Duration::from_micros(5));
        }
        assert_eq!(histogram.summary().unwrap().samples, JITTER_WINDOW as u64);
    }
}
