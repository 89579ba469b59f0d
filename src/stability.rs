use std::collections::VecDeque;

use hifitime::Duration;
use log::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{angle, cfg::StabilityOpts};

/// Statistics of a full [StabilityWindow]. Headings are unwrapped around
/// the oldest sample, so a window straddling north is not mistaken for jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowStats {
    /// Circular mean, in [0, 360)
    pub mean: f64,
    /// Population variance (deg²)
    pub variance: f64,
    /// Standard deviation (deg)
    pub std_dev: f64,
    /// variance < threshold
    pub is_stable: bool,
}

/// Bounded FIFO of the latest raw headings.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    capacity: usize,
    threshold: f64,
    buffer: VecDeque<f64>,
}

impl StabilityWindow {
    /// Builds a [StabilityWindow] holding up to `capacity` headings,
    /// declaring the signal stable when its variance is below `threshold`.
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            capacity,
            threshold,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Pushes a new heading, evicting the oldest one past capacity.
    pub fn push(&mut self, heading_deg: f64) {
        self.buffer.push_back(heading_deg);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Returns [WindowStats] once the window is full.
    pub fn stats(&self) -> Option<WindowStats> {
        if !self.is_full() {
            return None;
        }

        let origin = *self.buffer.front()?;
        let n = self.buffer.len() as f64;

        let deltas = self
            .buffer
            .iter()
            .map(|h| angle::delta(origin, *h))
            .collect::<Vec<_>>();

        let mean_delta = deltas.iter().sum::<f64>() / n;
        let variance = deltas
            .iter()
            .map(|d| (d - mean_delta).powi(2))
            .sum::<f64>()
            / n;

        Some(WindowStats {
            mean: angle::normalize(origin + mean_delta),
            variance,
            std_dev: variance.sqrt(),
            is_stable: variance < self.threshold,
        })
    }
}

/// Calibration status
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CalibrationStatus {
    /// No sample received yet
    #[default]
    Idle,
    /// Gathering samples
    Calibrating,
    /// Stability achieved (or forced). Sticky until reset.
    Stable,
    /// Too few samples were received before the deadline. Sticky until reset
    /// or manual calibration.
    Failed,
}

impl std::fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Calibrating => write!(f, "calibrating"),
            Self::Stable => write!(f, "stable"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one classification step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityReport {
    pub status: CalibrationStatus,
    /// Latest statistics, None until the window has been filled once
    pub stats: Option<WindowStats>,
}

impl StabilityReport {
    /// Windowed standard deviation, or 0 when unknown
    pub fn std_dev(&self) -> f64 {
        self.stats.map(|s| s.std_dev).unwrap_or_default()
    }

    /// True if the current window is stable
    pub fn window_stable(&self) -> bool {
        self.stats.map(|s| s.is_stable).unwrap_or(false)
    }
}

/// Judges whether the heading signal is steady enough to lock a reference.
///
/// A jittery full window is discarded and resampled up to `max_retries` times,
/// after which stability is forced so the operator is never blocked. The deadline
/// is only checked when an event comes in (or on explicit [StabilityClassifier::check_deadline]).
#[derive(Debug, Clone)]
pub struct StabilityClassifier {
    opts: StabilityOpts,
    window: StabilityWindow,
    status: CalibrationStatus,
    retries: u32,
    forced: bool,
    sample_count: usize,
    started_ms: Option<u64>,
    stats: Option<WindowStats>,
}

impl StabilityClassifier {
    pub fn new(opts: &StabilityOpts) -> Self {
        Self {
            opts: *opts,
            window: StabilityWindow::new(opts.window_size, opts.variance_threshold),
            status: CalibrationStatus::Idle,
            retries: 0,
            forced: false,
            sample_count: 0,
            started_ms: None,
            stats: None,
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    /// True once calibration is complete, genuinely or forced
    pub fn is_stable(&self) -> bool {
        self.status == CalibrationStatus::Stable
    }

    /// True if stability was declared by the escape hatch
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Total samples received since calibration started
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// True once enough events came in to trust the sensor is alive
    pub fn sensor_alive(&self) -> bool {
        self.sample_count >= self.opts.ready_samples
    }

    /// Latest [WindowStats]
    pub fn stats(&self) -> Option<WindowStats> {
        self.stats
    }

    /// Time elapsed since calibration started
    pub fn elapsed(&self, now_ms: u64) -> Duration {
        match self.started_ms {
            Some(t0) => Duration::from_milliseconds(now_ms.saturating_sub(t0) as f64),
            None => Duration::ZERO,
        }
    }

    fn report(&self) -> StabilityReport {
        StabilityReport {
            status: self.status,
            stats: self.stats,
        }
    }

    fn transition(&mut self, status: CalibrationStatus) {
        if self.status != status {
            info!("calibration: {} -> {}", self.status, status);
            self.status = status;
        }
    }

    /// Starts calibrating, if not already started.
    pub fn start(&mut self, now_ms: u64) {
        if self.status == CalibrationStatus::Idle {
            self.started_ms = Some(now_ms);
            self.transition(CalibrationStatus::Calibrating);
        }
    }

    /// Classifies a new raw heading received at `timestamp_ms`.
    pub fn push(&mut self, heading_deg: f64, timestamp_ms: u64) -> StabilityReport {
        self.start(timestamp_ms);

        if self.status == CalibrationStatus::Failed {
            return self.report();
        }

        self.window.push(heading_deg);
        self.sample_count += 1;

        if let Some(stats) = self.window.stats() {
            debug!(
                "stability: mean={:.2} var={:.3} sigma={:.3} stable={}",
                stats.mean, stats.variance, stats.std_dev, stats.is_stable
            );
            self.stats = Some(stats);

            if self.status == CalibrationStatus::Calibrating {
                if stats.is_stable {
                    self.transition(CalibrationStatus::Stable);
                } else if self.retries < self.opts.max_retries {
                    self.retries += 1;
                    warn!(
                        "unstable window (var={:.2}): resampling ({}/{})",
                        stats.variance, self.retries, self.opts.max_retries
                    );
                    self.window.clear();
                } else {
                    warn!("still unstable after {} retries: forcing stability", self.retries);
                    self.force_stable();
                }
            }
        }

        self.check_deadline(timestamp_ms)
    }

    /// Verifies the calibration deadline. Past the deadline, calibration fails
    /// if too few samples came in, and stability is forced otherwise.
    pub fn check_deadline(&mut self, now_ms: u64) -> StabilityReport {
        if self.status == CalibrationStatus::Calibrating {
            let elapsed = self.elapsed(now_ms);
            if elapsed >= self.opts.calibration_timeout {
                if self.sample_count < self.opts.min_samples {
                    error!(
                        "sensor timeout: {} samples after {}",
                        self.sample_count, elapsed
                    );
                    self.transition(CalibrationStatus::Failed);
                } else {
                    warn!("calibration deadline reached ({}): forcing stability", elapsed);
                    self.force_stable();
                }
            }
        }
        self.report()
    }

    /// Declares stability, whatever the signal looks like.
    pub fn force_stable(&mut self) {
        self.forced = true;
        self.transition(CalibrationStatus::Stable);
    }

    /// Back to [CalibrationStatus::Idle], dropping all samples.
    pub fn reset(&mut self) {
        self.window.clear();
        self.status = CalibrationStatus::Idle;
        self.retries = 0;
        self.forced = false;
        self.sample_count = 0;
        self.started_ms = None;
        self.stats = None;
    }
}

#[cfg(test)]
mod test {
    use super::{CalibrationStatus, StabilityClassifier, StabilityWindow};
    use crate::cfg::StabilityOpts;

    #[test]
    fn identical_headings() {
        let mut window = StabilityWindow::new(30, 8.0);
        for _ in 0..29 {
            window.push(123.0);
            assert!(window.stats().is_none());
        }
        window.push(123.0);
        let stats = window.stats().unwrap();
        assert_eq!(stats.variance, 0.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.mean, 123.0);
        assert!(stats.is_stable);
    }

    #[test]
    fn alternating_headings() {
        let mut window = StabilityWindow::new(30, 8.0);
        for i in 0..30 {
            window.push(if i % 2 == 0 { 150.0 } else { 50.0 });
        }
        let stats = window.stats().unwrap();
        assert!((stats.variance - 2500.0).abs() < 1E-9);
        assert!((stats.std_dev - 50.0).abs() < 1E-9);
        assert!(!stats.is_stable);
    }

    #[test]
    fn window_across_north() {
        let mut window = StabilityWindow::new(4, 8.0);
        for h in [359.0, 1.0, 359.0, 1.0] {
            window.push(h);
        }
        let stats = window.stats().unwrap();
        assert!((stats.variance - 1.0).abs() < 1E-9);
        assert!(stats.mean < 1E-9 || stats.mean > 360.0 - 1E-9);
        assert!(stats.is_stable);
    }

    #[test]
    fn ring_buffer_eviction() {
        let mut window = StabilityWindow::new(3, 8.0);
        for h in [100.0, 10.0, 10.0, 10.0] {
            window.push(h);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.stats().unwrap().variance, 0.0);
    }

    #[test]
    fn stable_calibration() {
        let opts = StabilityOpts::default();
        let mut classifier = StabilityClassifier::new(&opts);
        assert_eq!(classifier.status(), CalibrationStatus::Idle);

        for i in 0..29 {
            let report = classifier.push(45.0, i * 50);
            assert_eq!(report.status, CalibrationStatus::Calibrating);
        }
        let report = classifier.push(45.0, 29 * 50);
        assert_eq!(report.status, CalibrationStatus::Stable);
        assert!(report.window_stable());
        assert!(!classifier.is_forced());
        assert!(classifier.sensor_alive());
    }

    #[test]
    fn retry_then_force() {
        let mut opts = StabilityOpts::default();
        opts.window_size = 10;
        let mut classifier = StabilityClassifier::new(&opts);

        let mut t = 0;
        for retry in 1..=3 {
            for i in 0..10 {
                t += 10;
                classifier.push(if i % 2 == 0 { 100.0 } else { 0.0 }, t);
            }
            assert_eq!(classifier.retries(), retry);
            assert_eq!(classifier.status(), CalibrationStatus::Calibrating);
        }

        for i in 0..10 {
            t += 10;
            classifier.push(if i % 2 == 0 { 100.0 } else { 0.0 }, t);
        }
        assert_eq!(classifier.status(), CalibrationStatus::Stable);
        assert!(classifier.is_forced());
        // honest statistics are still reported
        assert!(!classifier.stats().unwrap().is_stable);
    }

    #[test]
    fn timeout_with_few_samples() {
        let opts = StabilityOpts::default();
        let mut classifier = StabilityClassifier::new(&opts);
        classifier.push(10.0, 0);
        classifier.push(10.0, 1_000);
        let report = classifier.push(10.0, 10_500);
        assert_eq!(report.status, CalibrationStatus::Failed);

        // sticky
        let report = classifier.push(10.0, 10_600);
        assert_eq!(report.status, CalibrationStatus::Failed);
        assert_eq!(classifier.sample_count(), 3);

        classifier.reset();
        assert_eq!(classifier.status(), CalibrationStatus::Idle);
        assert_eq!(classifier.sample_count(), 0);
    }

    #[test]
    fn timeout_with_enough_samples() {
        let opts = StabilityOpts::default();
        let mut classifier = StabilityClassifier::new(&opts);
        for i in 0..10 {
            classifier.push((i * 20) as f64, i * 100);
        }
        assert_eq!(classifier.status(), CalibrationStatus::Calibrating);
        let report = classifier.check_deadline(12_000);
        assert_eq!(report.status, CalibrationStatus::Stable);
        assert!(classifier.is_forced());
    }

    #[test]
    fn deadline_without_events() {
        let opts = StabilityOpts::default();
        let mut classifier = StabilityClassifier::new(&opts);
        classifier.start(0);
        assert_eq!(classifier.check_deadline(5_000).status, CalibrationStatus::Calibrating);
        assert_eq!(classifier.check_deadline(10_000).status, CalibrationStatus::Failed);
    }
}
