//! Angle helpers shared by every stage of the pipeline.
//!
//! Headings live on a circle: subtracting two of them directly is wrong
//! as soon as the pair straddles the 0/360 boundary. Every angular
//! difference in this crate goes through [wrap_delta].

/// Wraps an angular difference (in degrees) into `(-180, 180]`.
///
/// Values already within range are returned untouched, anything else
/// is reduced modulo 360, so the output range holds for any finite input
/// and applying it twice is a no-op.
pub fn wrap_delta(delta: f64) -> f64 {
    if delta > -180.0 && delta <= 180.0 {
        return delta;
    }
    let reduced = delta.rem_euclid(360.0);
    // rem_euclid may round up to exactly 360 for tiny negative inputs
    if reduced >= 360.0 {
        0.0
    } else if reduced > 180.0 {
        reduced - 360.0
    } else {
        reduced
    }
}

/// Signed shortest travel from `from` to `to`, in degrees.
pub fn delta(from: f64, to: f64) -> f64 {
    wrap_delta(to - from)
}

/// Maps any heading into `[0, 360)`.
pub fn normalize(deg: f64) -> f64 {
    let deg = deg.rem_euclid(360.0);
    // rem_euclid may round up to exactly 360 for tiny negative inputs
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// Degrees to radians.
pub fn to_radians(deg: f64) -> f64 {
    deg.to_radians()
}

/// Radians to degrees.
pub fn to_degrees(rad: f64) -> f64 {
    rad.to_degrees()
}
