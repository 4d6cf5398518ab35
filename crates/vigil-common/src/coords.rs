//! World positions.
//!
//! Positions are continuous 2D world-space coordinates backed by
//! [`glam::Vec2`]. The helpers here are the handful of operations the
//! movement and targeting code needs.

pub use glam::Vec2;

/// Distances below this are treated as "already there".
pub const ARRIVAL_EPSILON: f32 = 0.001;

/// Returns the unit direction from `from` towards `to`, or zero when the
/// points coincide.
#[must_use]
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}

/// Moves `from` towards `to` by at most `max_step`, never overshooting.
#[must_use]
pub fn step_towards(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let delta = to - from;
    let dist = delta.length();
    if dist <= ARRIVAL_EPSILON || max_step <= 0.0 {
        return from;
    }
    if dist <= max_step {
        to
    } else {
        from + delta / dist * max_step
    }
}

/// Moves `from` directly away from `threat` by `step`.
///
/// When both points coincide there is no meaningful "away", so the
/// position is pushed along +X.
#[must_use]
pub fn step_away(from: Vec2, threat: Vec2, step: f32) -> Vec2 {
    if step <= 0.0 {
        return from;
    }
    let dir = direction_to(threat, from);
    let dir = if dir == Vec2::ZERO { Vec2::X } else { dir };
    from + dir * step
}
