#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;

use crate::{
    angle,
    constants::{LOCATION_ERROR_FACTOR, RA_MINUTES_PER_DEGREE, SENSOR_ERROR_FACTOR},
    error::{Error, InputError},
    heading::OrientationSample,
};

/// Right Ascension axis offset, final scientific result of an alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RaOffset {
    /// Offset (degrees)
    pub degrees: f64,
    /// Offset (minutes of time)
    pub minutes: f64,
    /// Lower error bound (degrees)
    pub error_bound_lower: f64,
    /// Upper error bound (degrees)
    pub error_bound_upper: f64,
}

impl RaOffset {
    /// Copy of [RaOffset] rounded for presentation: degrees to 1E-3,
    /// minutes and error bounds to 1E-2.
    pub fn rounded(&self) -> Self {
        let round = |x: f64, decimals: i32| {
            let scale = 10.0_f64.powi(decimals);
            (x * scale).round() / scale
        };
        Self {
            degrees: round(self.degrees, 3),
            minutes: round(self.minutes, 2),
            error_bound_lower: round(self.error_bound_lower, 2),
            error_bound_upper: round(self.error_bound_upper, 2),
        }
    }
}

/// Converts an RA offset in degrees into minutes of time.
pub fn to_minutes(degrees: f64) -> f64 {
    degrees * RA_MINUTES_PER_DEGREE
}

/// Symmetric error bounds of an RA offset, from the heading jitter
/// (standard deviation, degrees) and the location accuracy (meters).
pub fn error_bounds(sensor_stability: f64, gps_accuracy_m: f64) -> Result<(f64, f64), Error> {
    if !sensor_stability.is_finite() || sensor_stability < 0.0 {
        return Err(InputError::SensorStability(sensor_stability).into());
    }
    if !gps_accuracy_m.is_finite() || gps_accuracy_m < 0.0 {
        return Err(InputError::LocationAccuracy(gps_accuracy_m).into());
    }
    let sensor_err = sensor_stability * SENSOR_ERROR_FACTOR;
    let location_err = gps_accuracy_m * LOCATION_ERROR_FACTOR;
    let total = sensor_err.hypot(location_err);
    Ok((-total, total))
}

/// Derives the RA axis offset for an observer at given latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaOffsetCalculator {
    latitude_deg: f64,
}

impl RaOffsetCalculator {
    /// Builds a [RaOffsetCalculator] for an observer located at `latitude_deg`.
    pub fn new(latitude_deg: f64) -> Result<Self, Error> {
        if !latitude_deg.is_finite() || !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(InputError::Latitude(latitude_deg).into());
        }
        Ok(Self { latitude_deg })
    }

    /// Observer latitude (degrees)
    pub fn latitude(&self) -> f64 {
        self.latitude_deg
    }

    /// RA offset (degrees) between the initial and final heading.
    /// The horizontal travel is weighted by sin(latitude), the final pitch by cos(latitude).
    pub fn offset_deg(
        &self,
        initial_heading_deg: f64,
        final_heading_deg: f64,
        final_pitch_deg: f64,
    ) -> Result<f64, Error> {
        for heading in [initial_heading_deg, final_heading_deg] {
            if !heading.is_finite() {
                return Err(InputError::Heading(heading).into());
            }
        }
        if !final_pitch_deg.is_finite() || !(-180.0..=180.0).contains(&final_pitch_deg) {
            return Err(InputError::Pitch(final_pitch_deg).into());
        }

        let delta_alpha = angle::delta(initial_heading_deg, final_heading_deg);
        let lat_rad = angle::to_radians(self.latitude_deg);

        let offset = delta_alpha * lat_rad.sin() + final_pitch_deg * lat_rad.cos();

        debug!(
            "ra offset: delta_alpha={:.3} lat={:.3} pitch={:.3} => {:.4}°",
            delta_alpha, self.latitude_deg, final_pitch_deg, offset
        );

        Ok(offset)
    }

    /// Computes the complete [RaOffset] from the locked initial reading,
    /// the final reading, the heading jitter and the location accuracy.
    pub fn calculate(
        &self,
        initial: &OrientationSample,
        final_reading: &OrientationSample,
        sensor_stability: f64,
        gps_accuracy_m: f64,
    ) -> Result<RaOffset, Error> {
        let degrees = self.offset_deg(
            initial.heading_deg,
            final_reading.heading_deg,
            final_reading.pitch_deg,
        )?;

        let (lower, upper) = error_bounds(sensor_stability, gps_accuracy_m)?;

        Ok(RaOffset {
            degrees,
            minutes: to_minutes(degrees),
            error_bound_lower: lower,
            error_bound_upper: upper,
        })
    }
}
