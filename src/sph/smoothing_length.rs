use rayon::prelude::*;

use super::neighbours::NeighbourTree;
use super::parameters::SphParameters;
use crate::config::NUM_DIMENSIONS;
use crate::eos::EquationOfState;
use crate::error::Error;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::nbody::GravityParameters;
use crate::particle::SphParticle;
use crate::particle::StarParticle;
use crate::quadtree::LeafDataType;

/// Result of one smoothing length solve. `ListInsufficient` is the
/// transient signal that the candidate list has to be widened; it never
/// leaves this module.
enum HSolve {
    Converged { h: f64, density: f64 },
    ListInsufficient,
}

struct HSummary {
    h: f64,
    density: f64,
    omega_inv: f64,
    zeta: f64,
    chi: f64,
    potential_minimum: bool,
}

/// The density stage: brings every active particle's smoothing length
/// to convergence with its density sum, then derives the grad-h terms
/// and thermodynamic state.
pub struct DensityUpdate<'a> {
    pub kernel: &'a Kernel,
    pub params: &'a SphParameters,
    pub eos: &'a dyn EquationOfState,
    pub gravity: &'a GravityParameters,
    pub tree: &'a NeighbourTree,
    /// Global smoothing length ceiling; isolated particles saturate
    /// here instead of failing.
    pub h_max: f64,
    pub batch_size: usize,
}

impl DensityUpdate<'_> {
    pub fn update(
        &self,
        particles: &mut [SphParticle],
        stars: &[StarParticle],
        active: &[usize],
    ) -> Result<()> {
        let summaries: Vec<(usize, HSummary)> = {
            let shared: &[SphParticle] = particles;
            active
                .par_chunks(self.batch_size.max(1))
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|&index| Ok((index, self.solve_one(index, shared, stars)?)))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect()
        };
        for (index, summary) in summaries {
            let particle = &mut particles[index];
            particle.h = summary.h;
            particle.density = summary.density;
            particle.omega_inv = summary.omega_inv;
            particle.zeta = summary.zeta;
            particle.chi = summary.chi;
            particle.potential_minimum = summary.potential_minimum;
            if self.eos.fixes_internal_energy() {
                particle.internal_energy = self.eos.specific_internal_energy(particle);
                particle.internal_energy0 = particle.internal_energy;
            }
            particle.pressure = self.eos.pressure(particle);
            particle.sound_speed = self.eos.sound_speed(particle);
            particle.pressure_factor =
                particle.pressure * particle.omega_inv / (particle.density * particle.density);
        }
        Ok(())
    }

    fn solve_one(
        &self,
        index: usize,
        particles: &[SphParticle],
        stars: &[StarParticle],
    ) -> Result<HSummary> {
        let particle = &particles[index];
        debug_assert!(particle.h > 0.0);
        let kern_range = self.kernel.range();
        let h_lo = if particle.sink_id >= 0 {
            self.params.h_min
        } else {
            0.0
        };
        let mut h_hi = (1.2 * particle.h).min(self.h_max).max(h_lo);
        let (h, density, candidates) = loop {
            let candidates = self
                .tree
                .particles_in_radius(&particle.pos, kern_range * h_hi);
            match self.solve_with_candidates(index, particles, &candidates, h_lo, h_hi)? {
                HSolve::Converged { h, density } => break (h, density, candidates),
                HSolve::ListInsufficient => {
                    if h_hi >= self.h_max {
                        // Isolated particle: saturate at the ceiling.
                        let h = self.h_max.max(h_lo);
                        let density = self.density_sum(index, particles, &candidates, h);
                        break (h, density, candidates);
                    }
                    h_hi = (h_hi * 1.5).min(self.h_max);
                }
            }
        };
        Ok(self.summarise(index, particles, stars, &candidates, h, density))
    }

    fn density_sum(
        &self,
        index: usize,
        particles: &[SphParticle],
        candidates: &[&super::neighbours::SphLeaf],
        h: f64,
    ) -> f64 {
        let pos = particles[index].pos;
        candidates
            .iter()
            .map(|leaf| {
                let r = leaf.pos().distance(pos);
                particles[leaf.index as usize].mass * self.kernel.value(r, h)
            })
            .sum()
    }

    /// Fixed point sweep followed by bisection, per the scheme the
    /// engine advertises: h = h_fac (m/ρ(h))^(1/d).
    fn solve_with_candidates(
        &self,
        index: usize,
        particles: &[SphParticle],
        candidates: &[&super::neighbours::SphLeaf],
        h_lo: f64,
        h_hi: f64,
    ) -> Result<HSolve> {
        let particle = &particles[index];
        let mass = particle.mass;
        let inv_dim = 1.0 / NUM_DIMENSIONS as f64;
        let target = |density: f64| self.params.h_fac * (mass / density).powf(inv_dim);

        let mut h = particle.h.clamp(h_lo.max(f64::MIN_POSITIVE), h_hi);
        for _ in 0..self.params.max_fixed_point_iterations {
            let density = self.density_sum(index, particles, candidates, h);
            let h_new = target(density).max(h_lo);
            if h_new > h_hi {
                return Ok(HSolve::ListInsufficient);
            }
            if (h_new - h).abs() < self.params.h_converge * h {
                return Ok(HSolve::Converged {
                    h: h_new,
                    density: self.density_sum(index, particles, candidates, h_new),
                });
            }
            h = h_new;
        }

        // The fixed point sweep cycled; fall back to bisection on
        // f(h) = ρ(h)·h^d − (h_fac)^d·m, which is increasing in h.
        let target_mass = self.params.h_fac.powi(NUM_DIMENSIONS as i32) * mass;
        let kernel_mass = |h: f64| {
            self.density_sum(index, particles, candidates, h) * h.powi(NUM_DIMENSIONS as i32)
        };
        if kernel_mass(h_hi) < target_mass {
            // No root below the candidate radius.
            return Ok(HSolve::ListInsufficient);
        }
        let mut lo = h_lo;
        let mut hi = h_hi;
        let max_iterations = 4 * self.params.max_fixed_point_iterations;
        for _ in 0..max_iterations {
            h = 0.5 * (lo + hi);
            if kernel_mass(h) > target_mass {
                hi = h;
            } else {
                lo = h;
            }
            if hi - lo < self.params.h_converge * h {
                let h = (0.5 * (lo + hi)).max(h_lo);
                return Ok(HSolve::Converged {
                    h,
                    density: self.density_sum(index, particles, candidates, h),
                });
            }
        }
        Err(Error::SmoothingLengthDiverged {
            id: particle.id.0,
            h,
            density: self.density_sum(index, particles, candidates, h),
            mass,
            num_candidates: candidates.len(),
        })
    }

    fn summarise(
        &self,
        index: usize,
        particles: &[SphParticle],
        stars: &[StarParticle],
        candidates: &[&super::neighbours::SphLeaf],
        h: f64,
        density: f64,
    ) -> HSummary {
        let particle = &particles[index];
        let pos = particle.pos;
        let kern_range = self.kernel.range();
        let inv_dim = 1.0 / NUM_DIMENSIONS as f64;

        let mut dwdh_sum = 0.0;
        let mut zeta_sum = 0.0;
        let mut potential_minimum = true;
        for leaf in candidates {
            let other = &particles[leaf.index as usize];
            let r = leaf.pos().distance(pos);
            if r >= kern_range * h {
                continue;
            }
            dwdh_sum += other.mass * self.kernel.dwdh(r, h);
            if self.gravity.enabled {
                zeta_sum += other.mass * self.kernel.w_zeta(r / h) / (h * h);
            }
            if leaf.index as usize != index && other.potential < particle.potential {
                potential_minimum = false;
            }
        }
        // Guard against pathological neighbour geometries driving the
        // grad-h factor through zero.
        let omega_raw = (1.0 + h * inv_dim / density * dwdh_sum).max(1e-4);
        let omega_inv = 1.0 / omega_raw;
        let zeta = if self.gravity.enabled {
            -h * inv_dim / density * zeta_sum * omega_inv
        } else {
            0.0
        };

        let mut chi = 0.0;
        if self.gravity.enabled && !stars.is_empty() {
            let mut chi_sum = 0.0;
            for star in stars {
                // Single-sided softening mean; unsoftened stars reduce
                // to the particle's own h.
                let h_eff = if star.h > 0.0 {
                    0.5 * (h + star.h)
                } else {
                    h
                };
                let r = star.pos.distance(pos);
                let s = r / h_eff;
                if s < kern_range {
                    chi_sum += star.mass * self.kernel.w_zeta(s) / (h_eff * h_eff);
                }
            }
            chi = -h * inv_dim / density * chi_sum * omega_inv;
        }

        HSummary {
            h,
            density,
            omega_inv,
            zeta,
            chi,
            potential_minimum,
        }
    }
}
