use super::parameters::TimeDependentViscosity;
use crate::particle::SphParticle;

/// Morris & Monaghan style switch: α decays towards α_min on a few
/// sound crossing times of the kernel and is pumped back up by
/// compression, with the source fading out as α approaches α_max so the
/// ceiling is an equilibrium rather than a cutoff.
pub fn alpha_evolution_rate(particle: &SphParticle, switch: &TimeDependentViscosity) -> f64 {
    let sound_speed = particle.sound_speed.max(f64::MIN_POSITIVE);
    let tau = particle.h / (switch.decay_constant * sound_speed);
    let source = (-particle.div_v).max(0.0) * (switch.alpha_max - particle.alpha);
    (switch.alpha_min - particle.alpha) / tau + source
}
