use itertools::Itertools;
use log::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    angle,
    cfg::{ScoringOpts, Weights},
    constants::MIN_SMOOTHNESS_READINGS,
    heading::OrientationSample,
};

/// Latest value of every input the [ConfidenceScorer] depends on.
/// Orientation and location inputs are not required to be simultaneous.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceInput {
    /// Rotation performed so far (degrees)
    pub rotation_deg: f64,
    /// Windowed heading standard deviation (degrees)
    pub std_dev: f64,
    /// Latest location accuracy (m), if any fix was received
    pub gps_accuracy_m: Option<f64>,
    /// Current stability state of the heading signal
    pub is_stable: bool,
    /// Number of samples gathered
    pub sample_count: usize,
    /// Motion smoothness score, when it could be evaluated
    pub smoothness: Option<f64>,
}

/// Individual confidence factors, each within [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfidenceFactors {
    pub rotation: f64,
    pub stability: f64,
    pub integrity: f64,
    pub quality: f64,
    pub smoothness: f64,
}

impl ConfidenceFactors {
    /// Weighted sum, clamped to [0, 100] and rounded.
    pub fn combine(&self, weights: &Weights) -> u8 {
        let total = self.rotation * weights.rotation
            + self.stability * weights.stability
            + self.integrity * weights.integrity
            + self.quality * weights.quality
            + self.smoothness * weights.smoothness;

        if total.is_nan() {
            return 0;
        }
        total.clamp(0.0, 100.0).round() as u8
    }
}

/// Scores how much we trust the ongoing alignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    opts: ScoringOpts,
}

impl ConfidenceScorer {
    pub fn new(opts: &ScoringOpts) -> Self {
        Self { opts: *opts }
    }

    /// Target rotation (degrees)
    pub fn target_rotation(&self) -> f64 {
        self.opts.target_rotation_deg
    }

    /// Evaluates all [ConfidenceFactors]
    pub fn factors(&self, input: &ConfidenceInput) -> ConfidenceFactors {
        let rotation = (input.rotation_deg / self.opts.target_rotation_deg * 100.0).clamp(0.0, 100.0);

        let stability = (100.0 - input.std_dev * self.opts.stability_gain).clamp(0.0, 100.0);

        let mut integrity = 0.0;
        if let Some(accuracy) = input.gps_accuracy_m {
            if accuracy < self.opts.gps_accuracy_limit_m {
                integrity += 50.0;
            }
        }
        if input.is_stable {
            integrity += 50.0;
        }

        let quality = (input.sample_count as f64 / self.opts.target_sample_count as f64 * 100.0)
            .min(100.0);

        let smoothness = input.smoothness.unwrap_or(100.0).clamp(0.0, 100.0);

        ConfidenceFactors {
            rotation,
            stability,
            integrity,
            quality,
            smoothness,
        }
    }

    /// Confidence score, within [0, 100]
    pub fn score(&self, input: &ConfidenceInput) -> u8 {
        let factors = self.factors(input);
        let score = factors.combine(&self.opts.weights);
        trace!("confidence: {:?} => {}", factors, score);
        score
    }

    /// The alignment step is complete when the target rotation is reached
    /// and the confidence is high enough. Both are required.
    pub fn is_complete(&self, rotation_deg: f64, score: u8) -> bool {
        rotation_deg >= self.opts.target_rotation_deg && score >= self.opts.completion_threshold
    }
}

/// Motion smoothness score from a reading history: the steadier the
/// angular speed, the higher the score. Returns None when too few
/// (or only simultaneous) readings are available.
pub fn smoothness_score(readings: &[OrientationSample]) -> Option<f64> {
    if readings.len() < MIN_SMOOTHNESS_READINGS {
        return None;
    }

    let speeds = readings
        .iter()
        .tuple_windows()
        .filter_map(|(prev, next)| {
            let dt_s = next.timestamp_ms.checked_sub(prev.timestamp_ms)? as f64 / 1000.0;
            if dt_s > 0.0 {
                Some(angle::delta(prev.heading_deg, next.heading_deg).abs() / dt_s)
            } else {
                None
            }
        })
        .collect::<Vec<_>>();

    if speeds.is_empty() {
        return None;
    }

    let n = speeds.len() as f64;
    let mean = speeds.iter().sum::<f64>() / n;
    let variance = speeds.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

    Some((100.0 - variance.sqrt() * 50.0).max(0.0))
}

#[cfg(test)]
mod test {
    use super::{smoothness_score, ConfidenceFactors, ConfidenceInput, ConfidenceScorer};
    use crate::{
        cfg::{ScoringOpts, Weights},
        heading::{HeadingMode, OrientationSample},
    };

    fn sample(heading_deg: f64, timestamp_ms: u64) -> OrientationSample {
        OrientationSample {
            heading_deg,
            pitch_deg: 0.0,
            roll_deg: 0.0,
            mode: HeadingMode::RelativeAlpha,
            timestamp_ms,
        }
    }

    #[test]
    fn perfect_alignment() {
        let scorer = ConfidenceScorer::new(&ScoringOpts::default());
        let input = ConfidenceInput {
            rotation_deg: 60.0,
            std_dev: 0.0,
            gps_accuracy_m: Some(0.0),
            is_stable: true,
            sample_count: 600,
            smoothness: None,
        };
        assert_eq!(scorer.score(&input), 100);
        assert!(scorer.is_complete(60.0, 100));
    }

    #[test]
    fn no_rotation() {
        let scorer = ConfidenceScorer::new(&ScoringOpts::default());
        let input = ConfidenceInput {
            rotation_deg: 0.0,
            std_dev: 0.0,
            gps_accuracy_m: Some(5.0),
            is_stable: true,
            sample_count: 600,
            smoothness: None,
        };
        let factors = scorer.factors(&input);
        assert_eq!(factors.rotation, 0.0);
        assert_eq!(scorer.score(&input), 60);
        assert!(!scorer.is_complete(0.0, 100));
    }

    #[test]
    fn factor_definitions() {
        let scorer = ConfidenceScorer::new(&ScoringOpts::default());
        let input = ConfidenceInput {
            rotation_deg: 30.0,
            std_dev: 1.0,
            gps_accuracy_m: Some(45.0),
            is_stable: true,
            sample_count: 150,
            smoothness: Some(75.0),
        };
        let factors = scorer.factors(&input);
        assert_eq!(factors.rotation, 50.0);
        assert_eq!(factors.stability, 50.0);
        assert_eq!(factors.integrity, 50.0);
        assert_eq!(factors.quality, 25.0);
        assert_eq!(factors.smoothness, 75.0);
        // 20 + 12.5 + 7.5 + 2.5 + 7.5
        assert_eq!(scorer.score(&input), 50);

        let input = ConfidenceInput {
            gps_accuracy_m: None,
            is_stable: false,
            ..input
        };
        assert_eq!(scorer.factors(&input).integrity, 0.0);
    }

    #[test]
    fn bounded_score() {
        let scorer = ConfidenceScorer::new(&ScoringOpts::default());
        for rotation in [-100.0, 0.0, 30.0, 60.0, 500.0] {
            for std_dev in [0.0, 0.5, 3.0, 1000.0] {
                for sample_count in [0, 10, 600, 100_000] {
                    let input = ConfidenceInput {
                        rotation_deg: rotation,
                        std_dev,
                        gps_accuracy_m: Some(10.0),
                        is_stable: std_dev < 1.0,
                        sample_count,
                        smoothness: Some(-20.0),
                    };
                    let score = scorer.score(&input);
                    assert!(score <= 100);
                }
            }
        }
    }

    #[test]
    fn completion_requires_both() {
        let scorer = ConfidenceScorer::new(&ScoringOpts::default());
        assert!(!scorer.is_complete(59.9, 100));
        assert!(!scorer.is_complete(75.0, 89));
        assert!(scorer.is_complete(75.0, 90));
    }

    #[test]
    fn weighted_combination() {
        let factors = ConfidenceFactors {
            rotation: 100.0,
            stability: 0.0,
            integrity: 0.0,
            quality: 0.0,
            smoothness: 0.0,
        };
        assert_eq!(factors.combine(&Weights::default()), 40);
    }

    #[test]
    fn steady_motion_is_smooth() {
        let readings = (0..20)
            .map(|i| sample((355.0 + i as f64) % 360.0, i * 100))
            .collect::<Vec<_>>();
        let score = smoothness_score(&readings).unwrap();
        assert!((score - 100.0).abs() < 1E-6, "got {}", score);
    }

    #[test]
    fn jerky_motion() {
        let readings = (0..20)
            .map(|i| sample(if i % 2 == 0 { 0.0 } else { 10.0 } + i as f64, i * 100))
            .collect::<Vec<_>>();
        let score = smoothness_score(&readings).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn smoothness_needs_readings() {
        let readings = (0..4).map(|i| sample(0.0, i * 100)).collect::<Vec<_>>();
        assert!(smoothness_score(&readings).is_none());

        let readings = (0..6).map(|_| sample(0.0, 0)).collect::<Vec<_>>();
        assert!(smoothness_score(&readings).is_none());
    }
}
