use super::local::run_distributed;
use super::Simulation;
use crate::dimension::component;
use crate::dimension::from_fn;
use crate::dimension::MVec;
use crate::eos::EosParameters;
use crate::ics;
use crate::parameters::SimulationParameters;
use crate::particle::ParticleKind;
use crate::simulation_box::SimulationBox;

fn quiet_parameters() -> SimulationParameters {
    let mut parameters = SimulationParameters::test_defaults();
    parameters.timestep.max_timestep = 1e-3;
    parameters.eos = EosParameters::Isothermal {
        temp0: 1.0,
        mu_bar: 1.0,
        gamma: 5.0 / 3.0,
    };
    parameters
}

fn run_blocks(simulation: &mut Simulation, num_blocks: u64) {
    let ticks = num_blocks * simulation.state().ticks_per_block();
    for _ in 0..ticks {
        simulation.step().unwrap();
    }
}

/// A uniform periodic lattice is a pressure equilibrium; nothing may
/// start moving.
#[test]
fn uniform_lattice_stays_in_equilibrium() {
    let parameters = quiet_parameters();
    let particles = ics::lattice(&parameters.box_size, 5, 1.0, 1.0);
    let mut simulation = Simulation::new_single_worker(parameters, particles, vec![]).unwrap();
    run_blocks(&mut simulation, 10);
    let max_speed = simulation
        .store
        .real()
        .iter()
        .map(|p| p.vel.length())
        .fold(0.0, f64::max);
    assert!(max_speed < 1e-6, "max speed {max_speed}");
}

fn perturbed_lattice(parameters: &SimulationParameters) -> Vec<crate::particle::SphParticle> {
    let mut particles = ics::lattice(&parameters.box_size, 4, 1.0, 1.0);
    for (i, particle) in particles.iter_mut().enumerate() {
        let offset = from_fn(|axis| (0.37 * ((i + 1) * (axis + 2)) as f64).sin() * 0.02);
        particle.pos += offset;
        particle.pos0 = particle.pos;
        particle.vel = from_fn(|axis| {
            0.05 * (2.0 * std::f64::consts::PI * component(&particle.pos, axis)).sin()
        });
        particle.vel0 = particle.vel;
    }
    particles
}

/// Newton's third law through ghosts: the total momentum in a periodic
/// box stays at its initial value to round-off.
#[test]
fn hydrodynamic_momentum_is_conserved_with_ghosts() {
    let mut parameters = quiet_parameters();
    parameters.eos = EosParameters::Adiabatic {
        mu_bar: 1.0,
        gamma: 5.0 / 3.0,
    };
    let particles = perturbed_lattice(&parameters);
    let initial: MVec = particles.iter().map(|p| p.vel * p.mass).sum();
    let mut simulation = Simulation::new_single_worker(parameters, particles, vec![]).unwrap();
    run_blocks(&mut simulation, 5);
    let momentum = simulation.diagnostics().momentum;
    assert!(
        (momentum - initial).length() < 1e-10,
        "momentum drifted by {:?}",
        momentum - initial
    );
}

/// With dissipation off and an adiabatic closure, kinetic plus thermal
/// energy is conserved at the integrator's order.
#[test]
fn adiabatic_energy_is_conserved_without_dissipation() {
    let mut parameters = quiet_parameters();
    parameters.eos = EosParameters::Adiabatic {
        mu_bar: 1.0,
        gamma: 5.0 / 3.0,
    };
    parameters.sph.viscosity.alpha = 0.0;
    parameters.timestep.max_timestep = 5e-4;
    let particles = perturbed_lattice(&parameters);
    let mut simulation = Simulation::new_single_worker(parameters, particles, vec![]).unwrap();
    let initial = simulation.diagnostics().total_energy();
    run_blocks(&mut simulation, 10);
    let after = simulation.diagnostics().total_energy();
    let drift = (after - initial).abs() / initial.abs();
    assert!(drift < 1e-4, "energy drift {drift}");
}

/// Every ghost stays a shifted copy of its origin while the simulation
/// steps (and after wraps).
#[test]
fn ghost_images_track_their_origins_through_steps() {
    let parameters = quiet_parameters();
    let mut particles = ics::lattice(&parameters.box_size, 4, 1.0, 1.0);
    for (i, particle) in particles.iter_mut().enumerate() {
        particle.vel = from_fn(|axis| 0.1 * ((i + axis) as f64 * 0.61).cos());
        particle.vel0 = particle.vel;
    }
    let box_ = parameters.box_size.clone();
    let mut simulation = Simulation::new_single_worker(parameters, particles, vec![]).unwrap();
    for _ in 0..3 {
        simulation.step().unwrap();
        let store = &simulation.store;
        let mut checked = 0;
        for index in store.num_real()..store.len() {
            let ghost = store.get(index);
            let ParticleKind::Ghost { origin, .. } = ghost.kind else {
                continue;
            };
            let origin = store.get(origin as usize);
            assert!(
                box_.periodic_distance(&ghost.pos, &origin.pos) < 1e-12,
                "ghost strayed from its origin"
            );
            assert_eq!(ghost.density, origin.density);
            checked += 1;
        }
        assert!(checked > 0, "expected boundary ghosts in a periodic box");
    }
}

/// Two workers sharing a uniform sphere end up with even particle
/// counts after a few rebalance steps.
#[cfg(all(not(feature = "1d"), not(feature = "2d")))]
#[test]
fn two_workers_balance_particle_counts() {
    let mut parameters = SimulationParameters::test_defaults();
    parameters.box_size = SimulationBox::open_cube_from_side_length(10.0);
    parameters.eos = EosParameters::Isothermal {
        temp0: 0.01,
        mu_bar: 1.0,
        gamma: 5.0 / 3.0,
    };
    parameters.timestep.max_timestep = 1e-3;
    parameters.domain.rebalance_interval = 1;
    let num_particles = 256;
    let counts = run_distributed(
        parameters,
        2,
        move |rank| {
            if rank == 0 {
                let sphere = ics::uniform_sphere(
                    MVec::ONE * 5.0,
                    1.0,
                    num_particles,
                    1.0,
                    0.01,
                    ics::DEFAULT_SEED,
                );
                (sphere, vec![])
            } else {
                (vec![], vec![])
            }
        },
        |simulation| {
            for _ in 0..5 * simulation.state().ticks_per_block() {
                simulation.step().unwrap();
            }
            simulation.store.num_real()
        },
    );
    let total: usize = counts.iter().sum();
    assert_eq!(total, num_particles);
    for count in counts {
        assert!(
            count.abs_diff(num_particles / 2) <= num_particles / 20,
            "unbalanced workers: {count} of {num_particles}"
        );
    }
}

/// A cold self-gravitating sphere collapses, exceeds the sink density
/// threshold and forms an accreting sink, conserving total mass.
#[cfg(all(not(feature = "1d"), not(feature = "2d")))]
#[test]
fn cold_sphere_collapses_into_a_sink() {
    let mut parameters = SimulationParameters::test_defaults();
    parameters.box_size = SimulationBox::open_cube_from_side_length(20.0);
    parameters.eos = EosParameters::Barotropic {
        temp0: 0.005,
        rho_bary: 50.0,
        mu_bar: 1.0,
        gamma: 7.0 / 5.0,
    };
    parameters.gravity.enabled = true;
    parameters.sinks.enabled = true;
    parameters.sinks.rho_sink = 5.0;
    parameters.timestep.max_timestep = 0.02;
    parameters.timestep.num_levels = 4;
    let num_particles = 128;
    let particles = ics::uniform_sphere(
        MVec::ONE * 10.0,
        1.0,
        num_particles,
        1.0,
        0.005,
        ics::DEFAULT_SEED,
    );
    let mut simulation = Simulation::new_single_worker(parameters, particles, vec![]).unwrap();

    let mut peak_density: f64 = 0.0;
    while simulation.time < 2.5 && simulation.stars.is_empty() {
        simulation.step().unwrap();
        peak_density = peak_density.max(
            simulation
                .store
                .real()
                .iter()
                .map(|p| p.density)
                .fold(0.0, f64::max),
        );
    }
    assert!(
        !simulation.stars.is_empty(),
        "no sink formed; peak density reached {peak_density}"
    );
    assert!(peak_density > 5.0);
    // Run on a little to accrete.
    for _ in 0..2 * simulation.state().ticks_per_block() {
        simulation.step().unwrap();
    }
    let gas_mass = simulation.diagnostics().mass;
    let star_mass: f64 = simulation.stars.iter().map(|star| star.mass).sum();
    assert!(
        (gas_mass + star_mass - 1.0).abs() < 1e-9,
        "mass not conserved: gas {gas_mass} + stars {star_mass}"
    );
    assert!(star_mass > 1.0 / num_particles as f64);
}

/// The isothermal shock tube: the star region density between the
/// rarefaction and the shock has to match the exact Riemann solution,
/// and the untouched left state stays a uniform lattice.
#[cfg(feature = "1d")]
#[test]
fn isothermal_shock_tube_matches_the_riemann_solution() {
    let density_left = 1.0;
    let density_right = 0.25;
    let mut parameters = SimulationParameters::test_defaults();
    parameters.eos = EosParameters::Isothermal {
        temp0: 1.0,
        mu_bar: 1.0,
        gamma: 5.0 / 3.0,
    };
    parameters.timestep.max_timestep = 1e-4;
    parameters.simulation.final_time = 0.1;
    // 400 particles, four times the spacing on the right.
    let particles = ics::shock_tube(
        &parameters.box_size,
        320,
        80,
        0.5 * (density_left + density_right),
        1.0,
    );
    let mut simulation = Simulation::new_single_worker(parameters, particles, vec![]).unwrap();
    simulation.run().unwrap();

    // Exact star-region density: sound speed 1, left rarefaction
    // against right-moving shock.
    let sound_speed = 1.0f64;
    let star_density = {
        let f = |rho: f64| {
            sound_speed * (density_left / rho).ln()
                - sound_speed * (rho - density_right) / (rho * density_right).sqrt()
        };
        let mut lo = density_right;
        let mut hi = density_left;
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if f(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    };

    let density_near = |x0: f64, window: f64| -> f64 {
        let mut total = 0.0;
        let mut count = 0;
        for particle in simulation.store.real() {
            if (component(&particle.pos, 0) - x0).abs() < window {
                total += particle.density;
                count += 1;
            }
        }
        assert!(count > 0, "no particles near x = {x0}");
        total / count as f64
    };
    let measured = density_near(0.5, 0.03);
    assert!(
        (measured - star_density).abs() / star_density < 0.1,
        "density at the contact: {measured}, expected {star_density}"
    );

    // The region untouched by both the central waves and the periodic
    // seam stays uniformly spaced.
    let mut untouched: Vec<f64> = simulation
        .store
        .real()
        .iter()
        .map(|p| component(&p.pos, 0))
        .filter(|x| (0.15..0.3).contains(x))
        .collect();
    untouched.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let spacings: Vec<f64> = untouched.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = spacings.iter().sum::<f64>() / spacings.len() as f64;
    for spacing in &spacings {
        assert!(
            (spacing - mean).abs() / mean < 0.05,
            "lattice disturbed: spacing {spacing} vs mean {mean}"
        );
    }
}
