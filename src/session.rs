use std::collections::VecDeque;

use hifitime::Duration;
use log::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    angle,
    cfg::Config,
    confidence::{smoothness_score, ConfidenceInput, ConfidenceScorer},
    constants::READING_HISTORY_DEPTH,
    error::Error,
    heading::{AggregatedHeading, HeadingAggregator, OrientationSample, RawOrientationEvent},
    kalman::{OrientationFilter, SmoothedOrientation},
    location::{LocationFix, LocationTracker},
    mission::{MissionCompletion, MissionOutcome, MissionStart, MissionStore},
    offset::RaOffsetCalculator,
    stability::{CalibrationStatus, StabilityClassifier, StabilityReport},
};

/// Handle on a live sensor subscription. Cancelling it stops the
/// delivery of events to the session that owns it.
pub trait SensorSubscription {
    fn cancel(&mut self);
}

/// Orientation event source (platform sensor API).
pub trait OrientationSource {
    /// Subscribes to orientation events. Returns [Error::SensorUnavailable]
    /// when the API is absent or the permission was denied.
    fn subscribe(&mut self) -> Result<Box<dyn SensorSubscription>, Error>;
}

/// Lifecycle of an [AlignmentSession]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SessionPhase {
    /// Waiting for a stable signal to lock the initial reading
    #[default]
    Calibrating,
    /// Initial reading locked, operator is rotating
    Tracking,
    /// Rotation target reached with enough confidence
    Aligned,
    /// Session closed: all state dropped
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calibrating => write!(f, "calibrating"),
            Self::Tracking => write!(f, "tracking"),
            Self::Aligned => write!(f, "aligned"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Everything that changed on a new orientation event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionUpdate {
    /// Canonical heading and on-screen rotation
    pub heading: AggregatedHeading,
    /// Kalman filtered attitude
    pub smoothed: SmoothedOrientation,
    /// Stability classification
    pub stability: StabilityReport,
    /// Rotation since the initial reading (degrees)
    pub rotation_deg: f64,
    /// Confidence score, within [0, 100]
    pub confidence: u8,
    pub phase: SessionPhase,
}

/// Aggregate root of one alignment attempt. Owns every piece of filter
/// state for that attempt: nothing is shared across sessions, and closing
/// the session releases the sensor subscription.
pub struct AlignmentSession {
    cfg: Config,
    phase: SessionPhase,
    aggregator: HeadingAggregator,
    filter: OrientationFilter,
    classifier: StabilityClassifier,
    scorer: ConfidenceScorer,
    location: LocationTracker,
    history: VecDeque<OrientationSample>,
    initial_reading: Option<OrientationSample>,
    latest: Option<OrientationSample>,
    smoothed: Option<SmoothedOrientation>,
    rotation_deg: f64,
    confidence: u8,
    started_ms: Option<u64>,
    subscription: Option<Box<dyn SensorSubscription>>,
}

impl std::fmt::Debug for AlignmentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentSession")
            .field("phase", &self.phase)
            .field("initial_reading", &self.initial_reading)
            .field("rotation_deg", &self.rotation_deg)
            .field("confidence", &self.confidence)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl AlignmentSession {
    /// Creates a new [AlignmentSession], validating the [Config].
    pub fn new(cfg: Config) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self {
            aggregator: HeadingAggregator::new(cfg.smoothing_factor),
            filter: OrientationFilter::new(&cfg.kalman),
            classifier: StabilityClassifier::new(&cfg.stability),
            scorer: ConfidenceScorer::new(&cfg.scoring),
            location: LocationTracker::new(cfg.max_location_accuracy_m),
            history: VecDeque::with_capacity(READING_HISTORY_DEPTH),
            phase: SessionPhase::Calibrating,
            initial_reading: None,
            latest: None,
            smoothed: None,
            rotation_deg: 0.0,
            confidence: 0,
            started_ms: None,
            subscription: None,
            cfg,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Locked initial reading
    pub fn initial_reading(&self) -> Option<&OrientationSample> {
        self.initial_reading.as_ref()
    }

    /// Latest raw reading
    pub fn latest_reading(&self) -> Option<&OrientationSample> {
        self.latest.as_ref()
    }

    /// Latest Kalman filtered attitude
    pub fn smoothed(&self) -> Option<&SmoothedOrientation> {
        self.smoothed.as_ref()
    }

    /// Rotation performed since the initial reading (degrees)
    pub fn rotation(&self) -> f64 {
        self.rotation_deg
    }

    /// Target rotation (degrees)
    pub fn target_rotation(&self) -> f64 {
        self.scorer.target_rotation()
    }

    /// Latest confidence score
    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        self.classifier.status()
    }

    /// True once enough events came in to trust the orientation sensor
    pub fn sensor_alive(&self) -> bool {
        self.classifier.sensor_alive()
    }

    /// True once a usable location fix was received
    pub fn location_ready(&self) -> bool {
        self.location.is_usable()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.phase == SessionPhase::Closed {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn mark_started(&mut self, now_ms: u64) {
        if self.started_ms.is_none() {
            self.started_ms = Some(now_ms);
        }
        self.classifier.start(now_ms);
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            info!("session: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn timeout_error(&self, now_ms: u64) -> Error {
        Error::SensorTimeout {
            samples: self.classifier.sample_count(),
            elapsed: self.classifier.elapsed(now_ms),
        }
    }

    /// Time elapsed since tracking started
    pub fn elapsed(&self, now_ms: u64) -> Duration {
        match self.started_ms {
            Some(t0) => Duration::from_milliseconds(now_ms.saturating_sub(t0) as f64),
            None => Duration::ZERO,
        }
    }

    /// Subscribes to the [OrientationSource] and starts tracking.
    /// [Error::SensorUnavailable] is terminal: the caller should not retry.
    pub fn start<S: OrientationSource + ?Sized>(
        &mut self,
        source: &mut S,
        now_ms: u64,
    ) -> Result<(), Error> {
        self.ensure_open()?;

        if self.subscription.is_none() {
            let subscription = source.subscribe().map_err(|e| {
                error!("orientation subscription failed: {}", e);
                e
            })?;
            self.subscription = Some(subscription);
        }

        info!("alignment session started");
        self.mark_started(now_ms);
        Ok(())
    }

    /// Processes a new orientation event. Events without a usable heading are
    /// dropped (returns None). Fails with [Error::SensorTimeout] when calibration
    /// could not gather enough samples in time.
    pub fn on_orientation(
        &mut self,
        event: &RawOrientationEvent,
    ) -> Result<Option<SessionUpdate>, Error> {
        self.ensure_open()?;

        let now_ms = event.timestamp_ms;
        self.mark_started(now_ms);

        let heading = match self.aggregator.ingest(event) {
            Some(heading) => heading,
            None => {
                debug!("dropped orientation event without heading");
                self.classifier.check_deadline(now_ms);
                if self.classifier.status() == CalibrationStatus::Failed {
                    return Err(self.timeout_error(now_ms));
                }
                return Ok(None);
            },
        };

        let sample = heading.sample;
        self.latest = Some(sample);

        self.history.push_back(sample);
        while self.history.len() > READING_HISTORY_DEPTH {
            self.history.pop_front();
        }

        let smoothed = self.filter.update(&sample);
        self.smoothed = Some(smoothed);

        let stability = self.classifier.push(sample.heading_deg, now_ms);

        if stability.status == CalibrationStatus::Failed {
            return Err(self.timeout_error(now_ms));
        }

        if self.initial_reading.is_none() && self.classifier.is_stable() {
            info!(
                "initial reading locked: heading={:.2} pitch={:.2} ({})",
                sample.heading_deg, sample.pitch_deg, sample.mode
            );
            if !sample.mode.is_absolute() {
                warn!("initial reading is not north referenced: offset only holds for this session");
            }
            self.initial_reading = Some(sample);
            self.set_phase(SessionPhase::Tracking);
        }

        self.evaluate(&sample, &stability);

        Ok(Some(SessionUpdate {
            heading,
            smoothed,
            stability,
            rotation_deg: self.rotation_deg,
            confidence: self.confidence,
            phase: self.phase,
        }))
    }

    fn evaluate(&mut self, sample: &OrientationSample, stability: &StabilityReport) {
        let initial = match self.initial_reading {
            Some(initial) => initial,
            None => return,
        };

        self.rotation_deg = angle::delta(initial.heading_deg, sample.heading_deg).abs();

        let history = self.history.make_contiguous();

        let input = ConfidenceInput {
            rotation_deg: self.rotation_deg,
            std_dev: stability.std_dev(),
            gps_accuracy_m: self.location.accuracy(),
            is_stable: stability.window_stable(),
            sample_count: self.classifier.sample_count(),
            smoothness: smoothness_score(history),
        };

        self.confidence = self.scorer.score(&input);

        if self.phase == SessionPhase::Tracking
            && self.scorer.is_complete(self.rotation_deg, self.confidence)
        {
            info!(
                "alignment reached: rotation={:.1}° confidence={}",
                self.rotation_deg, self.confidence
            );
            self.set_phase(SessionPhase::Aligned);
        }
    }

    /// Records the latest [LocationFix]. Location and orientation
    /// updates are independent, only the most recent fix is kept.
    pub fn on_location(&mut self, fix: LocationFix) -> Result<(), Error> {
        self.ensure_open()?;
        self.location.update(fix)
    }

    /// Deadline check outside of the orientation stream, for when the
    /// sensor went silent.
    pub fn check_deadline(&mut self, now_ms: u64) -> Result<CalibrationStatus, Error> {
        self.ensure_open()?;
        let report = self.classifier.check_deadline(now_ms);
        if report.status == CalibrationStatus::Failed {
            return Err(self.timeout_error(now_ms));
        }
        Ok(report.status)
    }

    /// Operator override: the latest reading becomes the zero reference.
    /// This is the recovery path after [Error::SensorTimeout].
    /// Fails with [Error::NoReading] if the sensor never delivered a heading.
    pub fn calibrate_manually(&mut self) -> Result<OrientationSample, Error> {
        self.ensure_open()?;

        let latest = self.latest.ok_or(Error::NoReading)?;

        warn!(
            "manual calibration: heading={:.2} is the new reference",
            latest.heading_deg
        );

        self.classifier.force_stable();
        self.initial_reading = Some(latest);
        self.rotation_deg = 0.0;
        self.confidence = 0;
        self.set_phase(SessionPhase::Tracking);
        Ok(latest)
    }

    /// True when the operator may move on: either the alignment was reached,
    /// or the failsafe delay expired (manual override is always allowed past it).
    pub fn can_proceed(&self, now_ms: u64) -> bool {
        match self.phase {
            SessionPhase::Aligned => true,
            SessionPhase::Closed => false,
            _ => self.started_ms.is_some() && self.elapsed(now_ms) >= self.cfg.failsafe_timeout,
        }
    }

    /// Registers the mission with the persistence service, using the
    /// locked initial reading. Returns true if the service acknowledged it.
    /// A failure is informational: the session keeps working offline.
    pub fn begin_mission<M: MissionStore + ?Sized>(&mut self, store: &mut M) -> Result<bool, Error> {
        self.ensure_open()?;
        let initial = self.initial_reading.ok_or(Error::NotCalibrated)?;

        match store.start(&MissionStart::from(&initial)) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("mission registration failed, continuing offline: {}", e);
                Ok(false)
            },
        }
    }

    /// Completes the alignment: computes the [crate::prelude::RaOffset] locally,
    /// reports to the persistence service and closes the session.
    /// The local result stands even if the service fails.
    pub fn finish<M: MissionStore + ?Sized>(
        &mut self,
        store: &mut M,
        now_ms: u64,
    ) -> Result<MissionOutcome, Error> {
        self.ensure_open()?;

        let initial = self.initial_reading.ok_or(Error::NotCalibrated)?;
        let final_reading = self.latest.ok_or(Error::NotCalibrated)?;
        let fix = *self.location.latest().ok_or(Error::LocationUnavailable)?;

        let sensor_stability = self
            .classifier
            .stats()
            .map(|stats| stats.std_dev)
            .unwrap_or_default();

        let offset = RaOffsetCalculator::new(fix.latitude_deg)?.calculate(
            &initial,
            &final_reading,
            sensor_stability,
            fix.accuracy_m,
        )?;

        let duration = self.elapsed(now_ms);
        let completion = MissionCompletion::new(&final_reading, self.confidence, duration);

        let (report, persistence_error) = match store.complete(&completion) {
            Ok(report) => (Some(report), None),
            Err(e) => {
                warn!("mission persistence failed, using local result: {}", e);
                (None, Some(e))
            },
        };

        info!(
            "alignment finished: ra offset {:.3}° ({:.2} min) confidence={}",
            offset.degrees, offset.minutes, self.confidence
        );

        let outcome = MissionOutcome {
            offset,
            confidence: self.confidence,
            duration,
            report,
            persistence_error,
        };

        self.close();
        Ok(outcome)
    }

    fn release_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            debug!("releasing orientation subscription");
            subscription.cancel();
        }
    }

    fn clear_state(&mut self) {
        self.aggregator.reset();
        self.filter = OrientationFilter::new(&self.cfg.kalman);
        self.classifier.reset();
        self.history.clear();
        self.initial_reading = None;
        self.latest = None;
        self.smoothed = None;
        self.rotation_deg = 0.0;
        self.confidence = 0;
        self.started_ms = None;
    }

    /// Restarts the mission from scratch, keeping the subscription
    /// and the latest location fix.
    pub fn restart(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        self.clear_state();
        self.phase = SessionPhase::Calibrating;
        info!("session restarted");
        Ok(())
    }

    /// Abandons this session: the subscription is released and
    /// all filter state dropped. Further calls fail with [Error::SessionClosed].
    pub fn close(&mut self) {
        if self.phase != SessionPhase::Closed {
            self.release_subscription();
            self.clear_state();
            self.location = LocationTracker::new(self.cfg.max_location_accuracy_m);
            self.set_phase(SessionPhase::Closed);
        }
    }
}

impl Drop for AlignmentSession {
    fn drop(&mut self) {
        self.release_subscription();
    }
}
