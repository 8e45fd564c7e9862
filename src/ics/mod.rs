use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::config::NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::from_fn;
use crate::dimension::MVec;
use crate::particle::ParticleId;
use crate::particle::SphParticle;
use crate::simulation_box::SimulationBox;

pub const DEFAULT_SEED: u64 = 123;

fn volume(box_: &SimulationBox) -> f64 {
    let sides = box_.side_lengths();
    (0..NUM_DIMENSIONS).map(|axis| component(&sides, axis)).product()
}

fn with_initial_h(mut particle: SphParticle, spacing: f64) -> SphParticle {
    particle.h = 1.2 * spacing;
    particle
}

/// A regular lattice filling the box with `per_side`^d particles of
/// equal mass.
pub fn lattice(
    box_: &SimulationBox,
    per_side: usize,
    total_mass: f64,
    internal_energy: f64,
) -> Vec<SphParticle> {
    let num_total = per_side.pow(NUM_DIMENSIONS as u32);
    let mass = total_mass / num_total as f64;
    let sides = box_.side_lengths();
    let spacing = component(&sides, 0) / per_side as f64;
    let mut particles = Vec::with_capacity(num_total);
    let mut index = vec![0usize; NUM_DIMENSIONS];
    for id in 0..num_total {
        let pos = box_.min
            + from_fn(|axis| {
                (index[axis] as f64 + 0.5) / per_side as f64 * component(&sides, axis)
            });
        particles.push(with_initial_h(
            SphParticle::new(ParticleId(id as u64), pos, MVec::ZERO, mass, internal_energy),
            spacing,
        ));
        for axis in 0..NUM_DIMENSIONS {
            index[axis] += 1;
            if index[axis] < per_side {
                break;
            }
            index[axis] = 0;
        }
    }
    particles
}

/// Uniform random positions in the box, deterministic for a given seed.
pub fn random_box(
    box_: &SimulationBox,
    num_particles: usize,
    total_mass: f64,
    internal_energy: f64,
    seed: u64,
) -> Vec<SphParticle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mass = total_mass / num_particles as f64;
    let spacing = (volume(box_) / num_particles as f64).powf(1.0 / NUM_DIMENSIONS as f64);
    (0..num_particles)
        .map(|id| {
            let pos = box_.min
                + from_fn(|axis| {
                    rng.gen::<f64>() * component(&box_.side_lengths(), axis)
                });
            with_initial_h(
                SphParticle::new(ParticleId(id as u64), pos, MVec::ZERO, mass, internal_energy),
                spacing,
            )
        })
        .collect()
}

/// A uniform density sphere, sampled by rejection from the enclosing
/// cube.
pub fn uniform_sphere(
    center: MVec,
    radius: f64,
    num_particles: usize,
    total_mass: f64,
    internal_energy: f64,
    seed: u64,
) -> Vec<SphParticle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mass = total_mass / num_particles as f64;
    let sphere_volume = match NUM_DIMENSIONS {
        1 => 2.0 * radius,
        2 => std::f64::consts::PI * radius * radius,
        _ => 4.0 / 3.0 * std::f64::consts::PI * radius.powi(3),
    };
    let spacing = (sphere_volume / num_particles as f64).powf(1.0 / NUM_DIMENSIONS as f64);
    let mut particles = Vec::with_capacity(num_particles);
    let mut id = 0;
    while particles.len() < num_particles {
        let candidate = from_fn(|_| rng.gen::<f64>() * 2.0 - 1.0) * radius;
        if candidate.length_squared() > radius * radius {
            continue;
        }
        particles.push(with_initial_h(
            SphParticle::new(
                ParticleId(id),
                center + candidate,
                MVec::ZERO,
                mass,
                internal_energy,
            ),
            spacing,
        ));
        id += 1;
    }
    particles
}

/// Assign a velocity field, e.g. solid body rotation for collapse
/// problems.
pub fn with_velocity_profile(
    particles: &mut [SphParticle],
    profile: impl Fn(&MVec) -> MVec,
) {
    for particle in particles.iter_mut() {
        particle.vel = profile(&particle.pos);
        particle.vel0 = particle.vel;
    }
}

/// Two half-boxes of different lattice spacing meeting at the midplane:
/// the classic shock tube arrangement. Equal particle masses, so the
/// density contrast is the spacing contrast.
pub fn shock_tube(
    box_: &SimulationBox,
    num_left: usize,
    num_right: usize,
    total_mass: f64,
    internal_energy: f64,
) -> Vec<SphParticle> {
    let length = component(&box_.side_lengths(), 0);
    let mid = component(&box_.min, 0) + 0.5 * length;
    let mass = total_mass / (num_left + num_right) as f64;
    let mut particles = Vec::with_capacity(num_left + num_right);
    let spacing_left = 0.5 * length / num_left as f64;
    for i in 0..num_left {
        let x = component(&box_.min, 0) + (i as f64 + 0.5) * spacing_left;
        let pos = from_fn(|axis| {
            if axis == 0 {
                x
            } else {
                component(&box_.min, axis) + 0.5 * component(&box_.side_lengths(), axis)
            }
        });
        particles.push(with_initial_h(
            SphParticle::new(
                ParticleId(i as u64),
                pos,
                MVec::ZERO,
                mass,
                internal_energy,
            ),
            spacing_left,
        ));
    }
    let spacing_right = 0.5 * length / num_right as f64;
    for i in 0..num_right {
        let x = mid + (i as f64 + 0.5) * spacing_right;
        let pos = from_fn(|axis| {
            if axis == 0 {
                x
            } else {
                component(&box_.min, axis) + 0.5 * component(&box_.side_lengths(), axis)
            }
        });
        particles.push(with_initial_h(
            SphParticle::new(
                ParticleId((num_left + i) as u64),
                pos,
                MVec::ZERO,
                mass,
                internal_energy,
            ),
            spacing_right,
        ));
    }
    particles
}

#[cfg(test)]
mod tests {
    use super::lattice;
    use super::random_box;
    use super::shock_tube;
    use super::uniform_sphere;
    use crate::config::NUM_DIMENSIONS;
    use crate::dimension::component;
    use crate::dimension::MVec;
    use crate::simulation_box::SimulationBox;

    #[test]
    fn lattice_fills_the_box_with_equal_masses() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let particles = lattice(&box_, 4, 2.0, 1.0);
        assert_eq!(particles.len(), 4usize.pow(NUM_DIMENSIONS as u32));
        let total: f64 = particles.iter().map(|p| p.mass).sum();
        assert!((total - 2.0).abs() < 1e-12);
        for particle in &particles {
            assert!(box_.extent().contains(&particle.pos));
            assert!(particle.h > 0.0);
        }
    }

    #[test]
    fn random_box_is_deterministic_per_seed() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let a = random_box(&box_, 32, 1.0, 1.0, 7);
        let b = random_box(&box_, 32, 1.0, 1.0, 7);
        let c = random_box(&box_, 32, 1.0, 1.0, 8);
        assert_eq!(a[5].pos, b[5].pos);
        assert_ne!(a[5].pos, c[5].pos);
    }

    #[test]
    fn sphere_samples_stay_inside() {
        let sphere = uniform_sphere(MVec::ZERO, 2.0, 64, 1.0, 1.0, 3);
        assert_eq!(sphere.len(), 64);
        for particle in &sphere {
            assert!(particle.pos.length() <= 2.0);
        }
    }

    #[test]
    fn shock_tube_has_the_expected_density_contrast() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let particles = shock_tube(&box_, 80, 20, 1.0, 1.0);
        assert_eq!(particles.len(), 100);
        let mid = 0.5;
        let left: Vec<_> = particles
            .iter()
            .filter(|p| component(&p.pos, 0) < mid)
            .collect();
        let right: Vec<_> = particles
            .iter()
            .filter(|p| component(&p.pos, 0) >= mid)
            .collect();
        assert_eq!(left.len(), 80);
        assert_eq!(right.len(), 20);
        // Equal masses, four times the spacing on the right.
        assert!((right[0].h / left[0].h - 4.0).abs() < 1e-12);
    }
}
