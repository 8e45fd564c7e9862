use crate::dimension::MVec;

/// Drift-kick-drift leapfrog pieces. Forces are evaluated at the half
/// step of each particle's block step; completing the step kicks with
/// the midpoint acceleration.

/// Predicted position a time `tau` after the checkpoint, using the
/// acceleration of the previous force evaluation.
pub fn predict_position(pos0: MVec, vel0: MVec, accel0: MVec, tau: f64) -> MVec {
    pos0 + vel0 * tau + accel0 * (0.5 * tau * tau)
}

/// Predicted velocity a time `tau` after the checkpoint.
pub fn predict_velocity(vel0: MVec, accel0: MVec, tau: f64) -> MVec {
    vel0 + accel0 * tau
}

/// Full-step kick with the acceleration evaluated at the half step.
pub fn kick(vel0: MVec, accel_half: MVec, dt: f64) -> MVec {
    vel0 + accel_half * dt
}

/// End-of-step position, completing both drift halves.
pub fn complete_position(pos0: MVec, vel0: MVec, accel_half: MVec, dt: f64) -> MVec {
    pos0 + vel0 * dt + accel_half * (0.5 * dt * dt)
}
