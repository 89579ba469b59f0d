use crate::{
    prelude::{
        AlignmentSession, CalibrationStatus, Config, Error, HeadingMode, Profile,
        RawOrientationEvent, SessionPhase,
    },
    tests::init_logger,
};

use rstest::*;

#[fixture]
fn relaxed_session() -> AlignmentSession {
    AlignmentSession::new(Config::from_profile(Profile::Relaxed)).unwrap()
}

#[rstest]
fn relaxed_window(mut relaxed_session: AlignmentSession) {
    init_logger();

    for i in 0..20 {
        let event = RawOrientationEvent::alpha(200.0, 1.0, 0.0, true, i * 50);
        relaxed_session.on_orientation(&event).unwrap();
        if i < 19 {
            assert_eq!(relaxed_session.phase(), SessionPhase::Calibrating);
        }
    }
    assert_eq!(relaxed_session.phase(), SessionPhase::Tracking);
}

#[rstest]
fn jitter_forces_stability(mut relaxed_session: AlignmentSession) {
    init_logger();

    // ±10° jitter, variance 100 deg² never passes the 15 deg² threshold.
    // Three windows are discarded, the fourth one forces stability.
    for i in 0..80 {
        let heading = if i % 2 == 0 { 10.0 } else { 30.0 };
        let event = RawOrientationEvent::alpha(heading, 0.0, 0.0, true, i * 50);
        relaxed_session.on_orientation(&event).unwrap();

        if i < 79 {
            assert_eq!(
                relaxed_session.calibration_status(),
                CalibrationStatus::Calibrating,
                "stable too early (sample #{})",
                i
            );
        }
    }

    assert_eq!(relaxed_session.calibration_status(), CalibrationStatus::Stable);
    assert_eq!(relaxed_session.phase(), SessionPhase::Tracking);
    assert_eq!(relaxed_session.initial_reading().unwrap().heading_deg, 30.0);
}

#[test]
fn slow_sensor_deadline() {
    init_logger();

    let mut session = AlignmentSession::new(Config::default()).unwrap();

    // one event every 2.5s: the window never fills,
    // but enough samples came in by the deadline
    for i in 0..4 {
        let event = RawOrientationEvent::alpha(90.0, 0.0, 0.0, true, i * 2_500);
        session.on_orientation(&event).unwrap();
        assert_eq!(session.phase(), SessionPhase::Calibrating);
    }

    let event = RawOrientationEvent::alpha(91.0, 0.0, 0.0, true, 10_000);
    session.on_orientation(&event).unwrap();

    assert_eq!(session.calibration_status(), CalibrationStatus::Stable);
    assert_eq!(session.initial_reading().unwrap().heading_deg, 91.0);
}

#[test]
fn starved_sensor() {
    init_logger();

    let mut session = AlignmentSession::new(Config::default()).unwrap();

    for t in [0, 100, 200] {
        let event = RawOrientationEvent::alpha(90.0, 0.0, 0.0, true, t);
        session.on_orientation(&event).unwrap();
    }

    let event = RawOrientationEvent::alpha(90.0, 0.0, 0.0, true, 12_000);
    match session.on_orientation(&event) {
        Err(Error::SensorTimeout { samples, elapsed }) => {
            assert_eq!(samples, 4);
            assert!(elapsed >= session.config().stability.calibration_timeout);
        },
        other => panic!("expecting a sensor timeout, got {:?}", other),
    }

    // failure is sticky
    let event = RawOrientationEvent::alpha(90.0, 0.0, 0.0, true, 12_050);
    assert!(matches!(
        session.on_orientation(&event),
        Err(Error::SensorTimeout { .. })
    ));

    // operator override
    session.calibrate_manually().unwrap();
    assert_eq!(session.phase(), SessionPhase::Tracking);

    let event = RawOrientationEvent::alpha(100.0, 0.0, 0.0, true, 12_100);
    let update = session.on_orientation(&event).unwrap().unwrap();
    assert!((update.rotation_deg - 10.0).abs() < 1E-9);
}

#[test]
fn headingless_events() {
    init_logger();

    let mut session = AlignmentSession::new(Config::default()).unwrap();

    let event = RawOrientationEvent {
        beta: Some(12.0),
        gamma: Some(1.0),
        timestamp_ms: 0,
        ..Default::default()
    };
    assert_eq!(session.on_orientation(&event), Ok(None));
    assert!(session.latest_reading().is_none());

    let event = RawOrientationEvent::alpha(f64::NAN, 0.0, 0.0, true, 50);
    assert_eq!(session.on_orientation(&event), Ok(None));
}

#[test]
fn compass_heading_priority() {
    init_logger();

    let mut session = AlignmentSession::new(Config::default()).unwrap();

    let event = RawOrientationEvent {
        compass_heading: Some(45.0),
        alpha: Some(315.0),
        beta: Some(3.0),
        gamma: Some(0.0),
        absolute: true,
        timestamp_ms: 0,
    };

    let update = session.on_orientation(&event).unwrap().unwrap();
    assert_eq!(update.heading.mode(), HeadingMode::CompassHeading);
    assert_eq!(update.heading.heading_deg(), 45.0);
    // compass headings turn the display the other way
    assert_eq!(update.heading.display_rotation_deg, -45.0);
}

#[test]
fn relative_heading_lock() {
    init_logger();

    let mut session = AlignmentSession::new(Config::default()).unwrap();
    for i in 0..30 {
        let event = RawOrientationEvent::alpha(75.0, 0.0, 0.0, false, i * 50);
        session.on_orientation(&event).unwrap();
    }

    let initial = session.initial_reading().unwrap();
    assert_eq!(initial.mode, HeadingMode::RelativeAlpha);
    assert!(!initial.mode.is_absolute());
    assert_eq!(session.phase(), SessionPhase::Tracking);
}
