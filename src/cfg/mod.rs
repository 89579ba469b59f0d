use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use hifitime::Duration;

mod profile;
pub use profile::Profile;

#[cfg(feature = "serde")]
mod document;

/// Configuration Error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid tuning profile")]
    InvalidProfile,
    #[error("confidence weights must sum to 1.0 (got {0})")]
    InvalidWeights(f64),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

fn default_process_noise() -> f64 {
    0.01
}

fn default_measurement_noise() -> f64 {
    0.1
}

fn default_smoothing_factor() -> f64 {
    0.1
}

fn default_window_size() -> usize {
    30
}

fn default_variance_threshold() -> f64 {
    8.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_calibration_timeout() -> Duration {
    Duration::from_seconds(10.0)
}

fn default_min_samples() -> usize {
    5
}

fn default_ready_samples() -> usize {
    10
}

fn default_target_rotation() -> f64 {
    60.0
}

fn default_stability_gain() -> f64 {
    50.0
}

fn default_gps_accuracy_limit() -> f64 {
    30.0
}

fn default_target_sample_count() -> usize {
    600
}

fn default_completion_threshold() -> u8 {
    90
}

fn default_failsafe_timeout() -> Duration {
    Duration::from_seconds(5.0)
}

fn default_max_location_accuracy() -> f64 {
    100.0
}

/// Scalar Kalman tuning, shared by all three tracked axes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KalmanOpts {
    /// Process noise (Q): how fast we let the true value wander.
    #[cfg_attr(feature = "serde", serde(default = "default_process_noise"))]
    pub process_noise: f64,
    /// Measurement noise (R): how little we trust each raw sample.
    #[cfg_attr(feature = "serde", serde(default = "default_measurement_noise"))]
    pub measurement_noise: f64,
}

impl Default for KalmanOpts {
    fn default() -> Self {
        Self::responsive()
    }
}

impl KalmanOpts {
    /// Responsive preset (Q=0.01, R=0.1), used for raw axis smoothing.
    pub fn responsive() -> Self {
        Self {
            process_noise: default_process_noise(),
            measurement_noise: default_measurement_noise(),
        }
    }

    /// Coarse preset (Q=0.05, R=2), heavier smoothing.
    pub fn coarse() -> Self {
        Self {
            process_noise: 0.05,
            measurement_noise: 2.0,
        }
    }
}

/// Stability window and calibration policy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilityOpts {
    /// Number of raw headings in the rolling window.
    #[cfg_attr(feature = "serde", serde(default = "default_window_size"))]
    pub window_size: usize,
    /// Heading variance (deg²) below which the signal is declared stable.
    #[cfg_attr(feature = "serde", serde(default = "default_variance_threshold"))]
    pub variance_threshold: f64,
    /// Number of times a full, jittery window is discarded and resampled
    /// before stability is forced.
    #[cfg_attr(feature = "serde", serde(default = "default_max_retries"))]
    pub max_retries: u32,
    /// Calibration deadline.
    #[cfg_attr(feature = "serde", serde(default = "default_calibration_timeout"))]
    pub calibration_timeout: Duration,
    /// Calibration fails if fewer samples than this were received by the deadline.
    #[cfg_attr(feature = "serde", serde(default = "default_min_samples"))]
    pub min_samples: usize,
    /// Sensor is considered alive past this many samples.
    #[cfg_attr(feature = "serde", serde(default = "default_ready_samples"))]
    pub ready_samples: usize,
}

impl Default for StabilityOpts {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            variance_threshold: default_variance_threshold(),
            max_retries: default_max_retries(),
            calibration_timeout: default_calibration_timeout(),
            min_samples: default_min_samples(),
            ready_samples: default_ready_samples(),
        }
    }
}

/// Confidence factor [Weights]. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Weights {
    pub rotation: f64,
    pub stability: f64,
    pub integrity: f64,
    pub quality: f64,
    pub smoothness: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            rotation: 0.40,
            stability: 0.25,
            integrity: 0.15,
            quality: 0.10,
            smoothness: 0.10,
        }
    }
}

impl Weights {
    /// Sum of all weights
    pub fn sum(&self) -> f64 {
        self.rotation + self.stability + self.integrity + self.quality + self.smoothness
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoringOpts {
    /// Rotation (degrees) the operator must perform around the RA axis.
    #[cfg_attr(feature = "serde", serde(default = "default_target_rotation"))]
    pub target_rotation_deg: f64,
    /// Stability score penalty per degree of windowed standard deviation.
    #[cfg_attr(feature = "serde", serde(default = "default_stability_gain"))]
    pub stability_gain: f64,
    /// Location accuracy (m) below which the location counts toward integrity.
    #[cfg_attr(feature = "serde", serde(default = "default_gps_accuracy_limit"))]
    pub gps_accuracy_limit_m: f64,
    /// Sample count granting a full quality score.
    #[cfg_attr(feature = "serde", serde(default = "default_target_sample_count"))]
    pub target_sample_count: usize,
    /// Minimal confidence (0..100) to consider the alignment done.
    #[cfg_attr(feature = "serde", serde(default = "default_completion_threshold"))]
    pub completion_threshold: u8,
    #[cfg_attr(feature = "serde", serde(default))]
    pub weights: Weights,
}

impl Default for ScoringOpts {
    fn default() -> Self {
        Self {
            target_rotation_deg: default_target_rotation(),
            stability_gain: default_stability_gain(),
            gps_accuracy_limit_m: default_gps_accuracy_limit(),
            target_sample_count: default_target_sample_count(),
            completion_threshold: default_completion_threshold(),
            weights: Weights::default(),
        }
    }
}

/// Alignment [Config].
///
/// When deserialized, the preset of the selected [Profile] is built first
/// and explicit fields are applied on top of it, so a partial document
/// only describes how it departs from its [Profile].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "document::ConfigDocument"))]
pub struct Config {
    /// [Profile] this configuration was derived from.
    pub profile: Profile,
    /// Per axis Kalman tuning
    pub kalman: KalmanOpts,
    /// Low-pass factor applied to the on-screen rotation, in ]0, 1].
    pub smoothing_factor: f64,
    /// Stability classification and calibration policy
    pub stability: StabilityOpts,
    /// Confidence scoring
    pub scoring: ScoringOpts,
    /// Past this delay, the operator may always proceed manually,
    /// whatever the sensor state.
    pub failsafe_timeout: Duration,
    /// Location fixes less accurate than this (m) are not usable.
    pub max_location_accuracy_m: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_profile(Profile::default())
    }
}

impl Config {
    /// Returns the preset [Config] for this [Profile].
    /// You can then customize [Self] as you will.
    pub fn from_profile(profile: Profile) -> Self {
        let mut s = Self {
            profile,
            kalman: KalmanOpts::responsive(),
            smoothing_factor: default_smoothing_factor(),
            stability: StabilityOpts::default(),
            scoring: ScoringOpts::default(),
            failsafe_timeout: default_failsafe_timeout(),
            max_location_accuracy_m: default_max_location_accuracy(),
        };
        if profile == Profile::Relaxed {
            s.kalman = KalmanOpts::coarse();
            s.stability.window_size = 20;
            s.stability.variance_threshold = 15.0;
            s.scoring.target_sample_count = 300;
        }
        s
    }

    /// Copies and returns [Config] with updated [KalmanOpts]
    pub fn with_kalman(&self, kalman: KalmanOpts) -> Self {
        let mut s = *self;
        s.kalman = kalman;
        s
    }

    /// Copies and returns [Config] with updated stability window size
    pub fn with_window_size(&self, window_size: usize) -> Self {
        let mut s = *self;
        s.stability.window_size = window_size;
        s
    }

    /// Copies and returns [Config] with updated failsafe timeout
    pub fn with_failsafe_timeout(&self, timeout: Duration) -> Self {
        let mut s = *self;
        s.failsafe_timeout = timeout;
        s
    }

    /// Verifies this [Config] is usable.
    pub fn validate(&self) -> Result<(), Error> {
        let sum = self.scoring.weights.sum();
        if (sum - 1.0).abs() > 1.0E-6 {
            return Err(Error::InvalidWeights(sum));
        }
        if !(self.kalman.process_noise > 0.0) {
            return Err(Error::InvalidParameter("process noise must be positive"));
        }
        if !(self.kalman.measurement_noise > 0.0) {
            return Err(Error::InvalidParameter(
                "measurement noise must be positive",
            ));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(Error::InvalidParameter(
                "smoothing factor must lie in ]0, 1]",
            ));
        }
        if self.stability.window_size < 2 {
            return Err(Error::InvalidParameter(
                "stability window needs at least 2 samples",
            ));
        }
        if !(self.stability.variance_threshold > 0.0) {
            return Err(Error::InvalidParameter(
                "variance threshold must be positive",
            ));
        }
        if !(self.scoring.target_rotation_deg > 0.0) {
            return Err(Error::InvalidParameter("target rotation must be positive"));
        }
        if self.scoring.target_sample_count == 0 {
            return Err(Error::InvalidParameter(
                "target sample count must be positive",
            ));
        }
        if self.scoring.completion_threshold > 100 {
            return Err(Error::InvalidParameter(
                "completion threshold is a 0..100 score",
            ));
        }
        Ok(())
    }
}
