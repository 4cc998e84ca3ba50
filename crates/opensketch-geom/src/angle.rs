//! Angle normalization and sweep arithmetic.
//!
//! All angles are radians. Sweeps are normalized positive CCW spans in
//! `[0, 2π)`.

use std::f64::consts::TAU;

/// Tolerance for sweep-membership checks.
pub const ANGLE_EPS: f64 = 1e-9;

/// Normalize an angle to `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a < 0.0 {
        a += TAU;
    }
    a
}

/// The normalized positive CCW angle from `from` to `to`, in `[0, 2π)`.
pub fn sweep_between(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// Whether `angle` lies within the CCW sweep starting at `start`.
///
/// Wraparound-correct: an angle just below `start` (mod 2π) counts as the
/// sweep start within [`ANGLE_EPS`].
pub fn angle_in_sweep(angle: f64, start: f64, sweep: f64) -> bool {
    let offset = normalize_angle(angle - start);
    offset <= sweep + ANGLE_EPS || offset >= TAU - ANGLE_EPS
}

/// Position of `angle` within the sweep as a `[0, 1]` parameter, clamped.
pub fn sweep_ratio(angle: f64, start: f64, sweep: f64) -> f64 {
    if sweep.abs() < 1e-12 {
        return 0.0;
    }
    let mut offset = normalize_angle(angle - start);
    if offset >= TAU - ANGLE_EPS {
        offset = 0.0;
    }
    (offset / sweep).clamp(0.0, 1.0)
}
