use log::trace;

use crate::{
    angle,
    cfg::KalmanOpts,
    heading::OrientationSample,
};

/// State of one scalar [KalmanSmoother].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterState {
    /// x: current estimate
    pub estimate: f64,
    /// P: error covariance, strictly positive at all times
    pub error_covariance: f64,
    /// Q: process noise, fixed at construction
    pub process_noise: f64,
    /// R: measurement noise, fixed at construction
    pub measurement_noise: f64,
}

/// One dimensional Kalman filter without control input (random walk model).
///
/// Instances are not reentrant: interleaving [KalmanSmoother::filter] calls
/// from two streams on one instance corrupts the covariance sequence.
/// Each tracked axis owns its own filter.
#[derive(Debug, Clone)]
pub struct KalmanSmoother {
    state: FilterState,
}

impl KalmanSmoother {
    /// Builds a new [KalmanSmoother] with x = 0 and P = 1.
    /// Q and R must be strictly positive, which [crate::prelude::Config::validate] verifies.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            state: FilterState {
                estimate: 0.0,
                error_covariance: 1.0,
                process_noise,
                measurement_noise,
            },
        }
    }

    /// Builds a new [KalmanSmoother] from [KalmanOpts]
    pub fn from_opts(opts: &KalmanOpts) -> Self {
        Self::new(opts.process_noise, opts.measurement_noise)
    }

    /// Current [FilterState]
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Current estimate
    pub fn estimate(&self) -> f64 {
        self.state.estimate
    }

    /// Runs one predict/update cycle and returns the new estimate.
    pub fn filter(&mut self, measurement: f64) -> f64 {
        let s = &mut self.state;

        // predict
        s.error_covariance += s.process_noise;

        let gain = s.error_covariance / (s.error_covariance + s.measurement_noise);

        s.estimate += gain * (measurement - s.estimate);
        s.error_covariance *= 1.0 - gain;

        trace!(
            "kf: z={} k={:.4} x={:.4} p={:.6}",
            measurement,
            gain,
            s.estimate,
            s.error_covariance
        );

        s.estimate
    }

    /// Filters a circular quantity (degrees). The measurement is first
    /// brought within half a turn of the current estimate, so the estimate
    /// never travels the long way across 0/360. Returns a heading in [0, 360).
    pub fn filter_angle(&mut self, measurement_deg: f64) -> f64 {
        let unwrapped = self.state.estimate + angle::delta(self.state.estimate, measurement_deg);
        angle::normalize(self.filter(unwrapped))
    }
}

/// Filtered attitude, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedOrientation {
    /// Heading in [0, 360)
    pub heading_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

/// Three [KalmanSmoother]s, one per tracked axis.
#[derive(Debug, Clone)]
pub struct OrientationFilter {
    heading: KalmanSmoother,
    pitch: KalmanSmoother,
    roll: KalmanSmoother,
}

impl OrientationFilter {
    pub fn new(opts: &KalmanOpts) -> Self {
        Self {
            heading: KalmanSmoother::from_opts(opts),
            pitch: KalmanSmoother::from_opts(opts),
            roll: KalmanSmoother::from_opts(opts),
        }
    }

    /// Feeds a new [OrientationSample] through all three axes.
    pub fn update(&mut self, sample: &OrientationSample) -> SmoothedOrientation {
        SmoothedOrientation {
            heading_deg: self.heading.filter_angle(sample.heading_deg),
            pitch_deg: self.pitch.filter(sample.pitch_deg),
            roll_deg: self.roll.filter(sample.roll_deg),
        }
    }

    /// Heading axis [FilterState]
    pub fn heading_state(&self) -> &FilterState {
        self.heading.state()
    }
}
