use rayon::prelude::*;

use super::parameters::ConductivityChoice;
use super::parameters::SphParameters;
use super::viscosity::alpha_evolution_rate;
use crate::dimension::MVec;
use crate::kernel::Kernel;
use crate::nbody::GravityParameters;
use crate::nbody::GravitySource;
use crate::particle::SphParticle;
use crate::particle::StarParticle;
use crate::simulation_box::SimulationBox;

/// An active particle together with its force neighbour list (indices
/// into the particle store, gather and scatter neighbours alike).
pub struct ActiveNeighbours {
    pub index: usize,
    pub neighbours: Vec<u32>,
}

/// Per-thread force accumulators, reduced at the end of the loop. The
/// symmetric halves of a pair both land here, so no particle is written
/// from two threads.
struct Accumulator {
    accel: Vec<MVec>,
    grav_accel: Vec<MVec>,
    dudt: Vec<f64>,
    div_v: Vec<f64>,
    div_a: Vec<f64>,
    potential: Vec<f64>,
    neighbour_level: Vec<u8>,
}

impl Accumulator {
    fn zeros(len: usize) -> Self {
        Self {
            accel: vec![MVec::ZERO; len],
            grav_accel: vec![MVec::ZERO; len],
            dudt: vec![0.0; len],
            div_v: vec![0.0; len],
            div_a: vec![0.0; len],
            potential: vec![0.0; len],
            neighbour_level: vec![0; len],
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.accel.iter_mut().zip(other.accel) {
            *a += b;
        }
        for (a, b) in self.grav_accel.iter_mut().zip(other.grav_accel) {
            *a += b;
        }
        for (a, b) in self.dudt.iter_mut().zip(other.dudt) {
            *a += b;
        }
        for (a, b) in self.div_v.iter_mut().zip(other.div_v) {
            *a += b;
        }
        for (a, b) in self.div_a.iter_mut().zip(other.div_a) {
            *a += b;
        }
        for (a, b) in self.potential.iter_mut().zip(other.potential) {
            *a += b;
        }
        for (a, b) in self.neighbour_level.iter_mut().zip(other.neighbour_level) {
            *a = (*a).max(b);
        }
        self
    }
}

/// The pair force stage: pressure, dissipation, conductivity, velocity
/// divergence and (when enabled) self-gravity for all active particles.
pub struct ForceEvaluation<'a> {
    pub kernel: &'a Kernel,
    pub params: &'a SphParameters,
    pub gravity: &'a GravityParameters,
    pub box_: &'a SimulationBox,
    pub batch_size: usize,
}

impl ForceEvaluation<'_> {
    pub fn compute(
        &self,
        particles: &mut [SphParticle],
        active: &[ActiveNeighbours],
        sources: &[GravitySource],
        stars: &[StarParticle],
    ) {
        let len = particles.len();
        let accumulated = {
            let shared: &[SphParticle] = particles;
            active
                .par_chunks(self.batch_size.max(1))
                .map(|chunk| {
                    let mut accumulator = Accumulator::zeros(len);
                    for entry in chunk {
                        self.accumulate(entry, shared, sources, stars, &mut accumulator);
                    }
                    accumulator
                })
                .reduce(|| Accumulator::zeros(len), Accumulator::merge)
        };

        for entry in active {
            let index = entry.index;
            let particle = &mut particles[index];
            let div_v = accumulated.div_v[index] / particle.density;
            particle.div_v = div_v;
            particle.div_a = accumulated.div_a[index] / particle.density;
            particle.accel = accumulated.accel[index];
            particle.grav_accel = accumulated.grav_accel[index];
            if self.gravity.enabled {
                particle.potential = accumulated.potential[index];
            }
            // PdV work on top of the pairwise dissipation terms.
            particle.dudt =
                accumulated.dudt[index] - particle.pressure_factor * particle.density * div_v;
            particle.neighbour_level = accumulated.neighbour_level[index];
            if let Some(switch) = &self.params.viscosity.time_dependent {
                particle.dalpha_dt = alpha_evolution_rate(particle, switch);
            }
        }
        // Inactive particles still learn about stricter neighbours so
        // the level cap can promote them.
        for (index, particle) in particles.iter_mut().enumerate() {
            if !particle.active {
                particle.neighbour_level = particle
                    .neighbour_level
                    .max(accumulated.neighbour_level[index]);
            }
        }
    }

    fn accumulate(
        &self,
        entry: &ActiveNeighbours,
        particles: &[SphParticle],
        sources: &[GravitySource],
        stars: &[StarParticle],
        accumulator: &mut Accumulator,
    ) {
        let i = entry.index;
        let pi = &particles[i];
        let kern_range = self.kernel.range();
        let viscosity = &self.params.viscosity;

        for &j in &entry.neighbours {
            let j = j as usize;
            if j == i {
                continue;
            }
            let pj = &particles[j];
            // Each pair is visited exactly once: pairs of two active
            // real particles belong to the lower index; pairs with an
            // inactive or ghost partner are evaluated one-sidedly from
            // the active side.
            let symmetric = pj.is_real() && pj.active;
            if symmetric && j < i {
                continue;
            }

            let dr = pi.pos - pj.pos;
            let r_sqd = dr.length_squared();
            if r_sqd == 0.0 {
                continue;
            }
            let r = r_sqd.sqrt();
            let rhat = dr / r;
            let dvdr = (pi.vel - pj.vel).dot(rhat);

            let grad_i = if r < kern_range * pi.h {
                self.kernel.gradient(r, pi.h)
            } else {
                0.0
            };
            let grad_j = if r < kern_range * pj.h {
                self.kernel.gradient(r, pj.h)
            } else {
                0.0
            };
            let grad_mean = 0.5 * (grad_i + grad_j);

            let mut pair_force = pi.pressure_factor * grad_i + pj.pressure_factor * grad_j;
            let mut dudt_i = 0.0;
            let mut dudt_j = 0.0;

            if viscosity.enabled() && dvdr < 0.0 {
                let alpha_mean = match viscosity.time_dependent {
                    Some(_) => 0.5 * (pi.alpha + pj.alpha),
                    None => viscosity.alpha,
                };
                let v_signal = pi.sound_speed + pj.sound_speed - viscosity.beta * dvdr;
                let inv_rho_mean = 0.5 * (1.0 / pi.density + 1.0 / pj.density);
                pair_force += -alpha_mean * v_signal * dvdr * inv_rho_mean * grad_mean;
                let heating = -0.5 * alpha_mean * v_signal * dvdr * dvdr * inv_rho_mean * grad_mean;
                dudt_i += pj.mass * heating;
                dudt_j += pi.mass * heating;
            }

            match self.params.conductivity {
                ConductivityChoice::None => {}
                ConductivityChoice::Wadsley => {
                    let bracket = grad_i / pi.density + grad_j / pj.density;
                    dudt_i += pj.mass * dvdr * (pj.internal_energy - pi.internal_energy) * bracket;
                    dudt_j += pi.mass * dvdr * (pi.internal_energy - pj.internal_energy) * bracket;
                }
                ConductivityChoice::Price => {
                    let inv_rho_mean = 0.5 * (1.0 / pi.density + 1.0 / pj.density);
                    let v_signal = ((pi.pressure - pj.pressure).abs() * inv_rho_mean).sqrt();
                    dudt_i +=
                        pj.mass * v_signal * (pi.internal_energy - pj.internal_energy) * grad_mean;
                    dudt_j +=
                        pi.mass * v_signal * (pj.internal_energy - pi.internal_energy) * grad_mean;
                }
            }

            let dadr = (pi.total_accel() - pj.total_accel()).dot(rhat);
            accumulator.accel[i] += rhat * (-pj.mass * pair_force);
            accumulator.div_v[i] += -pj.mass * dvdr * grad_i;
            accumulator.div_a[i] += -pj.mass * dadr * grad_i;
            accumulator.dudt[i] += dudt_i;
            accumulator.neighbour_level[i] = accumulator.neighbour_level[i].max(pj.level);

            if self.gravity.enabled {
                let correction = 0.5
                    * ((pi.zeta + pi.chi) * grad_i + (pj.zeta + pj.chi) * grad_j);
                accumulator.grav_accel[i] += rhat * (-pj.mass * correction);
                if symmetric {
                    accumulator.grav_accel[j] += rhat * (pi.mass * correction);
                }
            }

            if symmetric {
                accumulator.accel[j] += rhat * (pi.mass * pair_force);
                accumulator.div_v[j] += -pi.mass * dvdr * grad_j;
                accumulator.div_a[j] += -pi.mass * dadr * grad_j;
                accumulator.dudt[j] += dudt_j;
                accumulator.neighbour_level[j] = accumulator.neighbour_level[j].max(pi.level);
            }
        }

        if self.gravity.enabled {
            self.accumulate_gravity(i, pi, sources, stars, accumulator);
        }
    }

    /// Direct summation over every mass in the run: kernel-softened
    /// inside the support, exact inverse square beyond it (the softened
    /// forms reduce to 1/r² there by construction).
    fn accumulate_gravity(
        &self,
        i: usize,
        pi: &SphParticle,
        sources: &[GravitySource],
        stars: &[StarParticle],
        accumulator: &mut Accumulator,
    ) {
        for source in sources {
            if source.id == pi.id {
                continue;
            }
            let dr = self.box_.periodic_distance_vec(&pi.pos, &source.pos);
            let r_sqd = dr.length_squared();
            if r_sqd == 0.0 {
                continue;
            }
            let r = r_sqd.sqrt();
            let pull = 0.5
                * (self.kernel.w_grav(r / pi.h) / (pi.h * pi.h)
                    + self.kernel.w_grav(r / source.h) / (source.h * source.h));
            accumulator.grav_accel[i] += dr / r * (-source.mass * pull);
            accumulator.potential[i] += -source.mass
                * 0.5
                * (self.kernel.w_pot(r / pi.h) / pi.h + self.kernel.w_pot(r / source.h) / source.h);
        }
        for star in stars {
            let h_eff = if star.h > 0.0 { 0.5 * (pi.h + star.h) } else { pi.h };
            let dr = self.box_.periodic_distance_vec(&pi.pos, &star.pos);
            let r_sqd = dr.length_squared();
            if r_sqd == 0.0 {
                continue;
            }
            let r = r_sqd.sqrt();
            let pull = star.mass * self.kernel.w_grav(r / h_eff) / (h_eff * h_eff);
            accumulator.grav_accel[i] += dr / r * (-pull);
            accumulator.potential[i] += -star.mass * self.kernel.w_pot(r / h_eff) / h_eff;
        }
    }
}
