use crate::communication::CollectiveCommunicator;
use crate::communication::Communicator;
use crate::dimension::MVec;
use crate::particle::SphParticle;
use crate::particle::StarParticle;

/// Population totals, gathered across workers once per coarse step and
/// used by the conservation tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Diagnostics {
    pub kinetic_energy: f64,
    pub thermal_energy: f64,
    pub potential_energy: f64,
    pub momentum: MVec,
    pub mass: f64,
    pub num_particles: u64,
}

impl Diagnostics {
    pub fn add(&mut self, other: &Diagnostics) {
        self.kinetic_energy += other.kinetic_energy;
        self.thermal_energy += other.thermal_energy;
        self.potential_energy += other.potential_energy;
        self.momentum += other.momentum;
        self.mass += other.mass;
        self.num_particles += other.num_particles;
    }

    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy + self.thermal_energy + self.potential_energy
    }
}

pub fn compute_local(particles: &[SphParticle], stars: &[StarParticle]) -> Diagnostics {
    let mut totals = Diagnostics::default();
    for particle in particles.iter().filter(|p| p.is_real()) {
        totals.kinetic_energy += 0.5 * particle.mass * particle.vel.length_squared();
        totals.thermal_energy += particle.mass * particle.internal_energy;
        // Pairwise potentials are counted once per pair.
        totals.potential_energy += 0.5 * particle.mass * particle.potential;
        totals.momentum += particle.vel * particle.mass;
        totals.mass += particle.mass;
        totals.num_particles += 1;
    }
    for star in stars {
        totals.kinetic_energy += 0.5 * star.mass * star.vel.length_squared();
        totals.potential_energy += 0.5 * star.mass * star.potential;
    }
    totals
}

/// Combine the local contributions of all workers. Star terms are
/// replicated on every worker, so only the main rank contributes them.
pub fn reduce(
    particles: &[SphParticle],
    stars: &[StarParticle],
    communicator: &mut Communicator<Diagnostics>,
) -> Diagnostics {
    use crate::communication::SizedCommunicator;
    let stars_once: &[StarParticle] = if communicator.rank() == 0 { stars } else { &[] };
    let local = compute_local(particles, stars_once);
    let mut total = Diagnostics::default();
    for contribution in communicator.all_gather(&local) {
        total.add(&contribution);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::compute_local;
    use crate::dimension::MVec;
    use crate::particle::ParticleId;
    use crate::particle::SphParticle;

    #[test]
    fn totals_sum_the_population() {
        let mut a = SphParticle::new(ParticleId(0), MVec::ZERO, MVec::ONE, 2.0, 1.5);
        a.potential = -1.0;
        let b = SphParticle::new(ParticleId(1), MVec::ONE, MVec::ZERO, 1.0, 0.5);
        let totals = compute_local(&[a, b], &[]);
        let dims = crate::config::NUM_DIMENSIONS as f64;
        assert!((totals.kinetic_energy - 0.5 * 2.0 * dims).abs() < 1e-12);
        assert!((totals.thermal_energy - (3.0 + 0.5)).abs() < 1e-12);
        assert!((totals.potential_energy - (-1.0)).abs() < 1e-12);
        assert_eq!(totals.num_particles, 2);
        assert!((totals.mass - 3.0).abs() < 1e-12);
    }
}
