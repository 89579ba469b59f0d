/// Sidereal conversion used for Right Ascension offsets:
/// one degree of RA spans four minutes of time.
pub const RA_MINUTES_PER_DEGREE: f64 = 4.0;

/// Share of the sensor jitter (standard deviation, degrees)
/// propagated into the RA offset error bound.
pub const SENSOR_ERROR_FACTOR: f64 = 0.5;

/// Rough conversion of horizontal location accuracy (meters)
/// into degrees of RA offset error.
pub const LOCATION_ERROR_FACTOR: f64 = 0.0001;

/// Depth of the reading history kept by a session (for smoothness scoring).
pub const READING_HISTORY_DEPTH: usize = 100;

/// Minimal reading count for motion smoothness to be meaningful.
pub const MIN_SMOOTHNESS_READINGS: usize = 5;
