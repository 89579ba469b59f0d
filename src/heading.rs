use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::angle;

/// Provenance of a heading, resolved once when the raw event is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeadingMode {
    /// Magnetometer compass heading, clockwise positive.
    CompassHeading,
    /// Earth referenced alpha angle, counter-clockwise positive.
    AbsoluteAlpha,
    /// Alpha angle relative to an arbitrary device frame.
    RelativeAlpha,
}

impl HeadingMode {
    /// Sign applied to the heading to obtain the on-screen rotation that keeps north
    /// visually fixed. Compass headings grow clockwise, so the dial turns the other way.
    pub fn display_sign(&self) -> f64 {
        match self {
            Self::CompassHeading => -1.0,
            Self::AbsoluteAlpha | Self::RelativeAlpha => 1.0,
        }
    }

    /// True when the heading is referenced to north.
    pub fn is_absolute(&self) -> bool {
        !matches!(self, Self::RelativeAlpha)
    }
}

impl std::fmt::Display for HeadingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompassHeading => write!(f, "compass"),
            Self::AbsoluteAlpha => write!(f, "absolute"),
            Self::RelativeAlpha => write!(f, "relative"),
        }
    }
}

/// Raw orientation event, as delivered by the platform.
/// Platforms disagree on which fields they fill.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawOrientationEvent {
    /// Compass heading (degrees, clockwise from north), when exposed
    pub compass_heading: Option<f64>,
    /// Alpha angle (degrees)
    pub alpha: Option<f64>,
    /// Beta angle (pitch, degrees)
    pub beta: Option<f64>,
    /// Gamma angle (roll, degrees)
    pub gamma: Option<f64>,
    /// True when alpha is earth referenced
    pub absolute: bool,
    /// Arrival time (ms)
    pub timestamp_ms: u64,
}

impl RawOrientationEvent {
    /// Builds an event carrying a compass heading
    pub fn compass(heading: f64, beta: f64, gamma: f64, timestamp_ms: u64) -> Self {
        Self {
            compass_heading: Some(heading),
            alpha: None,
            beta: Some(beta),
            gamma: Some(gamma),
            absolute: false,
            timestamp_ms,
        }
    }

    /// Builds an event carrying an alpha angle
    pub fn alpha(alpha: f64, beta: f64, gamma: f64, absolute: bool, timestamp_ms: u64) -> Self {
        Self {
            compass_heading: None,
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
            absolute,
            timestamp_ms,
        }
    }
}

/// One instant of sensor truth. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrientationSample {
    /// Canonical heading in [0, 360), meaning depends on [HeadingMode]
    pub heading_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
    pub mode: HeadingMode,
    pub timestamp_ms: u64,
}

impl OrientationSample {
    /// Resolves the [HeadingMode] of a [RawOrientationEvent].
    /// Priority: compass heading, then absolute alpha, then relative alpha.
    /// Returns None when the event carries no usable heading.
    pub fn from_event(event: &RawOrientationEvent) -> Option<Self> {
        let (heading, mode) = match (event.compass_heading, event.alpha) {
            (Some(heading), _) => (heading, HeadingMode::CompassHeading),
            (None, Some(alpha)) if event.absolute => (alpha, HeadingMode::AbsoluteAlpha),
            (None, Some(alpha)) => (alpha, HeadingMode::RelativeAlpha),
            (None, None) => return None,
        };

        if !heading.is_finite() {
            return None;
        }

        let finite_or_zero = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);

        Some(Self {
            heading_deg: angle::normalize(heading),
            pitch_deg: finite_or_zero(event.beta),
            roll_deg: finite_or_zero(event.gamma),
            mode,
            timestamp_ms: event.timestamp_ms,
        })
    }
}

/// Output of the [HeadingAggregator].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedHeading {
    /// Canonical [OrientationSample], used for analysis
    pub sample: OrientationSample,
    /// Low-passed on-screen rotation (degrees). Purely visual:
    /// continuous (never re-wrapped) so that it may be fed to a renderer as is.
    pub display_rotation_deg: f64,
}

impl AggregatedHeading {
    /// Canonical heading
    pub fn heading_deg(&self) -> f64 {
        self.sample.heading_deg
    }

    /// [HeadingMode] of this heading
    pub fn mode(&self) -> HeadingMode {
        self.sample.mode
    }
}

/// Unifies the platform event shapes into one canonical heading,
/// and smooths the on-screen rotation across the 0/360 boundary.
#[derive(Debug, Clone)]
pub struct HeadingAggregator {
    smoothing_factor: f64,
    last_rotation: Option<f64>,
    last_mode: Option<HeadingMode>,
}

impl HeadingAggregator {
    /// Builds a new [HeadingAggregator] with given low-pass factor in ]0, 1].
    pub fn new(smoothing_factor: f64) -> Self {
        Self {
            smoothing_factor,
            last_rotation: None,
            last_mode: None,
        }
    }

    /// Current (smoothed) on-screen rotation
    pub fn display_rotation(&self) -> Option<f64> {
        self.last_rotation
    }

    /// Ingests a [RawOrientationEvent]. Events without heading are dropped.
    pub fn ingest(&mut self, event: &RawOrientationEvent) -> Option<AggregatedHeading> {
        let sample = OrientationSample::from_event(event)?;
        Some(self.aggregate(sample))
    }

    /// Smooths the display rotation of an already resolved [OrientationSample].
    pub fn aggregate(&mut self, sample: OrientationSample) -> AggregatedHeading {
        if self.last_mode != Some(sample.mode) {
            debug!("heading source: {}", sample.mode);
            self.last_mode = Some(sample.mode);
        }

        let target = sample.mode.display_sign() * sample.heading_deg;

        let rotation = match self.last_rotation {
            None => target,
            Some(last) => {
                // blend toward the nearest image of the target
                let diff = angle::wrap_delta(target - last);
                last + diff * self.smoothing_factor
            },
        };

        trace!(
            "heading={:.2} ({}) display={:.2}",
            sample.heading_deg,
            sample.mode,
            rotation
        );

        self.last_rotation = Some(rotation);

        AggregatedHeading {
            sample,
            display_rotation_deg: rotation,
        }
    }

    /// Forgets the smoothing history
    pub fn reset(&mut self) {
        self.last_rotation = None;
        self.last_mode = None;
    }
}
