#![doc = include_str!("../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

// private modules
mod angle;
mod cfg;
mod confidence;
mod constants;
mod error;
mod heading;
mod kalman;
mod location;
mod mission;
mod offset;
mod session;
mod stability;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::angle::{delta, normalize, to_degrees, to_radians, wrap_delta};
    pub use crate::cfg::{
        Config, Error as ConfigError, KalmanOpts, Profile, ScoringOpts, StabilityOpts, Weights,
    };
    pub use crate::confidence::{
        smoothness_score, ConfidenceFactors, ConfidenceInput, ConfidenceScorer,
    };
    pub use crate::constants::RA_MINUTES_PER_DEGREE;
    pub use crate::error::{Error, InputError};
    pub use crate::heading::{
        AggregatedHeading, HeadingAggregator, HeadingMode, OrientationSample,
        RawOrientationEvent,
    };
    pub use crate::kalman::{FilterState, KalmanSmoother, OrientationFilter, SmoothedOrientation};
    pub use crate::location::{LocationFix, LocationTracker};
    pub use crate::mission::{
        MissionCompletion, MissionOutcome, MissionReport, MissionStart, MissionStore,
        OfflineStore,
    };
    pub use crate::offset::{error_bounds, to_minutes, RaOffset, RaOffsetCalculator};
    pub use crate::session::{
        AlignmentSession, OrientationSource, SensorSubscription, SessionPhase, SessionUpdate,
    };
    pub use crate::stability::{
        CalibrationStatus, StabilityClassifier, StabilityReport, StabilityWindow, WindowStats,
    };
    // re-export
    pub use hifitime::Duration;
}

// pub export
pub use error::Error;
