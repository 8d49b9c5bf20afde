//! Angle math for turning tracked landmarks into servo targets.
//!
//! All functions return defined fallback values on degenerate input, so NaN
//! never reaches a servo command.

use crate::types::{Point2, ANGLE_MAX, ANGLE_MIN};

/// Vectors shorter than this are treated as degenerate.
pub const MIN_NORM: f64 = 1e-6;
/// Calibration references closer than this cannot define a mapping.
pub const MIN_CALIBRATION_SPAN: f64 = 1e-3;
/// Servo angle returned for a degenerate calibration.
pub const CALIBRATION_FALLBACK: f64 = 90.0;

/// Signed angle from `v1` to `v2` in degrees, in (-180, 180].
///
/// Positive when `v2` is counterclockwise of `v1` in a y-up frame. Returns 0
/// if either vector is near zero.
pub fn signed_angle(v1: Point2, v2: Point2) -> f64 {
    let (n1, n2) = (v1.norm(), v2.norm());
    if n1 < MIN_NORM || n2 < MIN_NORM {
        return 0.0;
    }
    let a = Point2::new(v1.x / n1, v1.y / n1);
    let b = Point2::new(v2.x / n2, v2.y / n2);
    let dot = a.dot(b).clamp(-1.0, 1.0);
    let angle = a.cross(b).atan2(dot).to_degrees();
    // atan2 yields -180 for exactly antiparallel vectors with a -0.0 cross.
    if angle <= -180.0 {
        180.0
    } else {
        angle
    }
}

/// Unsigned interior angle at `b` between rays b->a and b->c, in degrees.
///
/// Returns 0 if either segment is near zero length.
pub fn joint_angle(a: Point2, b: Point2, c: Point2) -> f64 {
    let ba = a.sub(b);
    let bc = c.sub(b);
    let (n1, n2) = (ba.norm(), bc.norm());
    if n1 < MIN_NORM || n2 < MIN_NORM {
        return 0.0;
    }
    let cosine = (ba.dot(bc) / (n1 * n2)).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// Map a raw signed wrist angle onto the servo range through two references.
///
/// `inner` maps to 0 and `outer` to 180; values beyond either end are clipped.
pub fn calibrated_map(raw: f64, inner: f64, outer: f64) -> f64 {
    let span = outer - inner;
    if span.abs() < MIN_CALIBRATION_SPAN || !raw.is_finite() {
        return CALIBRATION_FALLBACK;
    }
    let t = (raw - inner) / span;
    (t * ANGLE_MAX).clamp(ANGLE_MIN, ANGLE_MAX)
}

/// Mean of the given points, or `None` for an empty slice.
pub fn centroid(points: &[Point2]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2::new(sx / n, sy / n))
}
