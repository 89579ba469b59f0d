//! Contract with the mission persistence service.
//!
//! Transport is not our concern: the service is reached through the
//! [MissionStore] trait. Its failures never block an alignment, the
//! locally computed [RaOffset] is authoritative.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use hifitime::Duration;

use crate::{error::Error, heading::OrientationSample, offset::RaOffset};

/// Payload sent when a mission starts
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MissionStart {
    pub initial_alpha: f64,
    pub initial_beta: f64,
    pub initial_gamma: f64,
}

impl From<&OrientationSample> for MissionStart {
    fn from(sample: &OrientationSample) -> Self {
        Self {
            initial_alpha: sample.heading_deg,
            initial_beta: sample.pitch_deg,
            initial_gamma: sample.roll_deg,
        }
    }
}

/// Payload sent when a mission completes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MissionCompletion {
    pub final_alpha: f64,
    pub final_beta: f64,
    pub final_gamma: f64,
    /// Confidence score, within [0, 100]
    pub confidence: u8,
    /// Mission duration (s)
    #[cfg_attr(feature = "serde", serde(rename = "duration"))]
    pub duration_s: f64,
}

impl MissionCompletion {
    pub fn new(final_reading: &OrientationSample, confidence: u8, duration: Duration) -> Self {
        Self {
            final_alpha: final_reading.heading_deg,
            final_beta: final_reading.pitch_deg,
            final_gamma: final_reading.roll_deg,
            confidence,
            duration_s: duration.to_seconds(),
        }
    }
}

/// Report returned by the persistence service
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MissionReport {
    /// RA offset (degrees) as computed by the service
    pub ra_offset: f64,
    pub confidence: u8,
    pub quality_score: f64,
    pub duration_seconds: f64,
}

/// Mission persistence collaborator.
/// Implementations report failures as [Error::Persistence].
pub trait MissionStore {
    /// Registers a new mission
    fn start(&mut self, start: &MissionStart) -> Result<(), Error>;
    /// Completes the mission
    fn complete(&mut self, completion: &MissionCompletion) -> Result<MissionReport, Error>;
}

/// [MissionStore] that never reaches any service:
/// every alignment completes on local computations only.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineStore;

impl MissionStore for OfflineStore {
    fn start(&mut self, _: &MissionStart) -> Result<(), Error> {
        Err(Error::Persistence("offline".to_string()))
    }

    fn complete(&mut self, _: &MissionCompletion) -> Result<MissionReport, Error> {
        Err(Error::Persistence("offline".to_string()))
    }
}

/// Result of a finished alignment
#[derive(Debug, Clone, PartialEq)]
pub struct MissionOutcome {
    /// Locally computed [RaOffset]
    pub offset: RaOffset,
    /// Final confidence score
    pub confidence: u8,
    /// Mission duration
    pub duration: Duration,
    /// Report from the persistence service, when it succeeded
    pub report: Option<MissionReport>,
    /// Informational: why the service did not answer
    pub persistence_error: Option<Error>,
}

impl MissionOutcome {
    /// True if the persistence service acknowledged this mission
    pub fn persisted(&self) -> bool {
        self.report.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::{MissionCompletion, MissionStart, MissionStore, OfflineStore};
    use crate::{
        error::Error,
        heading::{HeadingMode, OrientationSample},
    };
    use hifitime::Duration;

    #[test]
    fn payloads() {
        let sample = OrientationSample {
            heading_deg: 12.0,
            pitch_deg: 45.0,
            roll_deg: -1.0,
            mode: HeadingMode::CompassHeading,
            timestamp_ms: 0,
        };
        let start = MissionStart::from(&sample);
        assert_eq!(start.initial_alpha, 12.0);
        assert_eq!(start.initial_beta, 45.0);
        assert_eq!(start.initial_gamma, -1.0);

        let completion = MissionCompletion::new(&sample, 93, Duration::from_seconds(42.5));
        assert_eq!(completion.final_alpha, 12.0);
        assert_eq!(completion.confidence, 93);
        assert!((completion.duration_s - 42.5).abs() < 1E-9);
    }

    #[test]
    fn offline_store() {
        let mut store = OfflineStore;
        let start = MissionStart {
            initial_alpha: 0.0,
            initial_beta: 0.0,
            initial_gamma: 0.0,
        };
        assert!(matches!(store.start(&start), Err(Error::Persistence(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn completion_wire_format() {
        let completion = MissionCompletion {
            final_alpha: 60.0,
            final_beta: 2.0,
            final_gamma: 0.0,
            confidence: 95,
            duration_s: 30.0,
        };
        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(json["duration"], 30.0);
        assert_eq!(json["confidence"], 95);

        let report: super::MissionReport = serde_json::from_str(
            r#"{"ra_offset": 38.11, "confidence": 95, "quality_score": 88.0, "duration_seconds": 30.0}"#,
        )
        .unwrap();
        assert_eq!(report.confidence, 95);
    }
}
