use serde::Deserialize;

use hifitime::Duration;

use crate::cfg::{Config, KalmanOpts, Profile, ScoringOpts, StabilityOpts, Weights};

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct KalmanDocument {
    process_noise: Option<f64>,
    measurement_noise: Option<f64>,
}

impl KalmanDocument {
    fn apply_to(self, opts: &mut KalmanOpts) {
        apply(&mut opts.process_noise, self.process_noise);
        apply(&mut opts.measurement_noise, self.measurement_noise);
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct StabilityDocument {
    window_size: Option<usize>,
    variance_threshold: Option<f64>,
    max_retries: Option<u32>,
    calibration_timeout: Option<Duration>,
    min_samples: Option<usize>,
    ready_samples: Option<usize>,
}

impl StabilityDocument {
    fn apply_to(self, opts: &mut StabilityOpts) {
        apply(&mut opts.window_size, self.window_size);
        apply(&mut opts.variance_threshold, self.variance_threshold);
        apply(&mut opts.max_retries, self.max_retries);
        apply(&mut opts.calibration_timeout, self.calibration_timeout);
        apply(&mut opts.min_samples, self.min_samples);
        apply(&mut opts.ready_samples, self.ready_samples);
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ScoringDocument {
    target_rotation_deg: Option<f64>,
    stability_gain: Option<f64>,
    gps_accuracy_limit_m: Option<f64>,
    target_sample_count: Option<usize>,
    completion_threshold: Option<u8>,
    weights: Option<Weights>,
}

impl ScoringDocument {
    fn apply_to(self, opts: &mut ScoringOpts) {
        apply(&mut opts.target_rotation_deg, self.target_rotation_deg);
        apply(&mut opts.stability_gain, self.stability_gain);
        apply(&mut opts.gps_accuracy_limit_m, self.gps_accuracy_limit_m);
        apply(&mut opts.target_sample_count, self.target_sample_count);
        apply(&mut opts.completion_threshold, self.completion_threshold);
        apply(&mut opts.weights, self.weights);
    }
}

/// Serialized form of a [Config]: every field is optional
/// and overrides the preset of the selected [Profile].
#[derive(Default, Deserialize)]
#[serde(default)]
pub(crate) struct ConfigDocument {
    profile: Profile,
    kalman: KalmanDocument,
    smoothing_factor: Option<f64>,
    stability: StabilityDocument,
    scoring: ScoringDocument,
    failsafe_timeout: Option<Duration>,
    max_location_accuracy_m: Option<f64>,
}

impl From<ConfigDocument> for Config {
    fn from(doc: ConfigDocument) -> Self {
        let mut cfg = Config::from_profile(doc.profile);
        doc.kalman.apply_to(&mut cfg.kalman);
        apply(&mut cfg.smoothing_factor, doc.smoothing_factor);
        doc.stability.apply_to(&mut cfg.stability);
        doc.scoring.apply_to(&mut cfg.scoring);
        apply(&mut cfg.failsafe_timeout, doc.failsafe_timeout);
        apply(&mut cfg.max_location_accuracy_m, doc.max_location_accuracy_m);
        cfg
    }
}
