pub mod leapfrog;
mod parameters;

pub use parameters::GravityParameters;

use crate::dimension::MVec;
use crate::kernel::Kernel;
use crate::particle::ParticleId;
use crate::particle::SphParticle;
use crate::particle::StarParticle;
use crate::simulation_box::SimulationBox;

/// Compact description of a mass for direct gravity sums; what the
/// workers exchange so every particle feels the whole system.
#[derive(Clone, Copy, Debug)]
pub struct GravitySource {
    pub id: ParticleId,
    pub pos: MVec,
    pub mass: f64,
    pub h: f64,
}

pub fn gather_sources(particles: &[SphParticle]) -> Vec<GravitySource> {
    particles
        .iter()
        .filter(|particle| particle.is_real())
        .map(|particle| GravitySource {
            id: particle.id,
            pos: particle.pos,
            mass: particle.mass,
            h: particle.h,
        })
        .collect()
}

/// Softened pull and potential of a unit mass at distance r, combining
/// the softening scales of both partners. Unsoftened pairs use the bare
/// inverse square law.
fn pair_pull(kernel: &Kernel, r: f64, h1: f64, h2: f64) -> (f64, f64) {
    let h_eff = 0.5 * (h1 + h2);
    if h_eff > 0.0 {
        let s = r / h_eff;
        (
            kernel.w_grav(s) / (h_eff * h_eff),
            kernel.w_pot(s) / h_eff,
        )
    } else {
        (1.0 / (r * r), 1.0 / r)
    }
}

/// Direct star–star and star–gas forces for the active stars.
pub fn compute_star_forces(
    stars: &mut [StarParticle],
    active: &[usize],
    sources: &[GravitySource],
    kernel: &Kernel,
    box_: &SimulationBox,
) {
    let snapshot: Vec<StarParticle> = stars.to_vec();
    for &index in active {
        let star = &mut stars[index];
        let mut accel = MVec::ZERO;
        let mut potential = 0.0;
        for source in sources {
            let dr = box_.periodic_distance_vec(&star.pos, &source.pos);
            let r_sqd = dr.length_squared();
            if r_sqd == 0.0 {
                continue;
            }
            let r = r_sqd.sqrt();
            let (pull, pot) = pair_pull(kernel, r, star.h, source.h);
            accel += dr / r * (-source.mass * pull);
            potential += -source.mass * pot;
        }
        for (other_index, other) in snapshot.iter().enumerate() {
            if other_index == index {
                continue;
            }
            let dr = box_.periodic_distance_vec(&star.pos, &other.pos);
            let r_sqd = dr.length_squared();
            if r_sqd == 0.0 {
                continue;
            }
            let r = r_sqd.sqrt();
            let (pull, pot) = pair_pull(kernel, r, star.h, other.h);
            accel += dr / r * (-other.mass * pull);
            potential += -other.mass * pot;
        }
        star.accel = accel;
        star.potential = potential;
    }
}
