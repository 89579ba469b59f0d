#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::{debug, info};

use crate::error::{Error, InputError};

/// Location fix, as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationFix {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Horizontal accuracy (m)
    pub accuracy_m: f64,
}

impl LocationFix {
    pub fn new(latitude_deg: f64, longitude_deg: f64, accuracy_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            accuracy_m,
        }
    }

    /// True if this fix is accurate enough to be used (strictly below `max_accuracy_m`).
    pub fn is_usable(&self, max_accuracy_m: f64) -> bool {
        self.accuracy_m < max_accuracy_m
    }

    fn validate(&self) -> Result<(), Error> {
        if !self.latitude_deg.is_finite() || !(-90.0..=90.0).contains(&self.latitude_deg) {
            return Err(InputError::Latitude(self.latitude_deg).into());
        }
        if !self.accuracy_m.is_finite() || self.accuracy_m < 0.0 {
            return Err(InputError::LocationAccuracy(self.accuracy_m).into());
        }
        Ok(())
    }
}

/// Keeps the most recent [LocationFix]. Location and orientation streams
/// are not synchronized: consumers only ever see the latest fix.
#[derive(Debug, Clone, Default)]
pub struct LocationTracker {
    latest: Option<LocationFix>,
    max_accuracy_m: f64,
    updates: usize,
}

impl LocationTracker {
    /// Builds a [LocationTracker], fixes are usable below `max_accuracy_m`.
    pub fn new(max_accuracy_m: f64) -> Self {
        Self {
            latest: None,
            max_accuracy_m,
            updates: 0,
        }
    }

    /// Records a new [LocationFix], replacing the previous one.
    /// Invalid fixes are rejected and the previous fix is retained.
    pub fn update(&mut self, fix: LocationFix) -> Result<(), Error> {
        fix.validate()?;

        let was_usable = self.is_usable();
        self.latest = Some(fix);
        self.updates += 1;

        debug!(
            "location: lat={:.5} lon={:.5} acc={:.1}m",
            fix.latitude_deg, fix.longitude_deg, fix.accuracy_m
        );

        if !was_usable && self.is_usable() {
            info!("location fix acquired ({:.1}m)", fix.accuracy_m);
        }
        Ok(())
    }

    /// Latest [LocationFix]
    pub fn latest(&self) -> Option<&LocationFix> {
        self.latest.as_ref()
    }

    /// Latest accuracy (m)
    pub fn accuracy(&self) -> Option<f64> {
        self.latest.map(|fix| fix.accuracy_m)
    }

    /// Latest observer latitude (degrees)
    pub fn latitude(&self) -> Option<f64> {
        self.latest.map(|fix| fix.latitude_deg)
    }

    /// True if the latest fix is accurate enough
    pub fn is_usable(&self) -> bool {
        self.latest
            .map(|fix| fix.is_usable(self.max_accuracy_m))
            .unwrap_or(false)
    }

    /// Number of accepted fixes
    pub fn updates(&self) -> usize {
        self.updates
    }
}

#[cfg(test)]
mod test {
    use super::{LocationFix, LocationTracker};

    #[test]
    fn latest_value() {
        let mut tracker = LocationTracker::new(100.0);
        assert!(tracker.latest().is_none());
        assert!(!tracker.is_usable());

        tracker.update(LocationFix::new(37.5, 127.0, 150.0)).unwrap();
        assert!(!tracker.is_usable());

        tracker.update(LocationFix::new(37.6, 127.1, 12.0)).unwrap();
        assert!(tracker.is_usable());
        assert_eq!(tracker.accuracy(), Some(12.0));
        assert_eq!(tracker.latitude(), Some(37.6));
        assert_eq!(tracker.updates(), 2);
    }

    #[test]
    fn rejects_invalid_fix() {
        let mut tracker = LocationTracker::new(100.0);
        tracker.update(LocationFix::new(10.0, 0.0, 5.0)).unwrap();
        assert!(tracker.update(LocationFix::new(95.0, 0.0, 5.0)).is_err());
        assert!(tracker.update(LocationFix::new(10.0, 0.0, f64::NAN)).is_err());
        assert_eq!(tracker.latitude(), Some(10.0));
        assert_eq!(tracker.updates(), 1);
    }

    #[test]
    fn usable_threshold() {
        assert!(LocationFix::new(0.0, 0.0, 99.9).is_usable(100.0));
        assert!(!LocationFix::new(0.0, 0.0, 100.0).is_usable(100.0));
    }
}
