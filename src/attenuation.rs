//! Distance attenuation.
//!
//! A sound inside its range plays at its intended volume. Past the range the volume follows
//! `1 - 0.95 * log10(distance / range + 0.1)`, clamped so it never goes below zero.

use crate::math::Vec2;

const FALLOFF_SLOPE: f32 = 19.0 / 20.0;
const FALLOFF_BIAS: f32 = 0.1;

/// Euclidean distance between two points on the plane.
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Volume multiplier for a listener `distance` away from a sound with the given `range`.
///
/// The result is never negative. No upper clamp is applied: distances below
/// `0.9 * range` produce values above 1.0, which is why callers only consult the curve
/// once the listener has left the range.
pub fn falloff(distance: f32, range: f32) -> f32 {
    if range <= 0.0 || range.is_nan() {
        return if distance > 0.0 { 0.0 } else { 1.0 };
    }

    let multiplier = 1.0 - FALLOFF_SLOPE * (distance / range + FALLOFF_BIAS).log10();
    if multiplier.is_nan() {
        0.0
    } else {
        multiplier.max(0.0)
    }
}

/// Express `part` as a percentage of `whole`.
pub fn as_percent(whole: f32, part: f32) -> f32 {
    part / (whole / 100.0)
}

/// Take `percent` percent of `whole`.
pub fn percent_of(whole: f32, percent: f32) -> f32 {
    (whole / 100.0) * percent
}

/// Channel volume for a sound heard from `distance` away.
///
/// Returns `None` while the listener is inside the range: the intended volume stands and
/// nothing is applied. Otherwise the falloff multiplier, taken as a percentage of full
/// volume, is applied to `intended`.
pub fn attenuated_volume(intended: f32, distance: f32, range: f32) -> Option<f32> {
    if distance < range {
        return None;
    }
    let percent = as_percent(1.0, falloff(distance, range));
    Some(percent_of(intended, percent))
}
