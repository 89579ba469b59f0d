use thiserror::Error;

use hifitime::Duration;

/// Out of domain values rejected at the boundary of a pure computation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InputError {
    #[error("latitude {0} is not a finite angle within [-90, 90]")]
    Latitude(f64),

    #[error("heading {0} is not a finite angle")]
    Heading(f64),

    #[error("pitch {0} is not a finite angle within [-180, 180]")]
    Pitch(f64),

    #[error("sensor stability {0} must be finite and non-negative")]
    SensorStability(f64),

    #[error("location accuracy {0}m must be finite and non-negative")]
    LocationAccuracy(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The platform exposes no orientation source, or the user denied access to it.
    /// This is terminal for the session: we never retry on our own.
    #[error("orientation sensor unavailable or permission denied")]
    SensorUnavailable,

    /// Calibration did not gather enough samples before its deadline.
    /// Recoverable: the operator may calibrate manually.
    #[error("sensor timeout: only {samples} samples after {elapsed}")]
    SensorTimeout { samples: usize, elapsed: Duration },

    /// A pure computation was handed NaN or out of domain values.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// The mission persistence collaborator failed. Informational only:
    /// the locally computed result stands in.
    #[error("mission persistence failure: {0}")]
    Persistence(String),

    /// Operation attempted on a session that has been closed.
    #[error("alignment session is closed")]
    SessionClosed,

    /// Observer latitude is required to finalize an alignment.
    #[error("no location fix available")]
    LocationUnavailable,

    /// Invalid [crate::prelude::Config]
    #[error("configuration error: {0}")]
    Config(#[from] crate::cfg::Error),

    /// No orientation reading was received yet.
    #[error("no orientation reading received yet")]
    NoReading,

    /// Finalization requires a locked initial reading.
    #[error("no initial reading locked yet")]
    NotCalibrated,
}
