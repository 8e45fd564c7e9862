pub mod local;
mod parameters;

#[cfg(test)]
mod tests;

pub use parameters::ControlParameters;

use log::debug;
use log::info;

use crate::boundary::GhostBuilder;
use crate::communication::build_local_communicators;
use crate::communication::CollectiveCommunicator;
use crate::communication::Communicator;
use crate::communication::ExchangeCommunicator;
use crate::communication::Rank;
use crate::communication::SizedCommunicator;
use crate::diagnostics;
use crate::diagnostics::Diagnostics;
use crate::domain::DomainDecomposition;
use crate::domain::GhostExchange;
use crate::domain::NodeLoad;
use crate::domain::PartitionNode;
use crate::domain::WorkerVolumes;
use crate::error::Error;
use crate::error::Result;
use crate::io::build_format;
use crate::io::SnapshotData;
use crate::kernel::Kernel;
use crate::nbody;
use crate::nbody::leapfrog;
use crate::nbody::GravitySource;
use crate::parameters::SimulationParameters;
use crate::particle::ParticleStore;
use crate::particle::SphParticle;
use crate::particle::StarParticle;
use crate::sinks;
use crate::sinks::SinkDelta;
use crate::sph::build_neighbour_tree;
use crate::sph::force_neighbours;
use crate::sph::ActiveNeighbours;
use crate::sph::DensityUpdate;
use crate::sph::ForceEvaluation;
use crate::timestep;
use crate::timestep::TimestepState;

/// One communicator mesh per logical exchange phase, so messages of
/// different phases can never be confused.
pub struct WorkerComms {
    pub nodes: Communicator<PartitionNode>,
    pub migration: Communicator<SphParticle>,
    pub volumes: Communicator<WorkerVolumes>,
    pub ghost_counts: ExchangeCommunicator<u64>,
    pub ghost_payload: ExchangeCommunicator<SphParticle>,
    pub loads: Communicator<NodeLoad>,
    pub sources: Communicator<GravitySource>,
    pub candidates: Communicator<SphParticle>,
    pub sink_deltas: Communicator<SinkDelta>,
    pub diagnostics: Communicator<Diagnostics>,
    pub stars: Communicator<StarParticle>,
}

impl WorkerComms {
    /// The communicator sets of all workers of a run, index = rank.
    pub fn build(num_workers: usize) -> Vec<Self> {
        let mut nodes = build_local_communicators(num_workers, 0);
        let mut migration = build_local_communicators(num_workers, 1);
        let mut volumes = build_local_communicators(num_workers, 2);
        let mut ghost_counts = build_local_communicators(num_workers, 3);
        let mut ghost_payload = build_local_communicators(num_workers, 4);
        let mut loads = build_local_communicators(num_workers, 5);
        let mut sources = build_local_communicators(num_workers, 6);
        let mut candidates = build_local_communicators(num_workers, 7);
        let mut sink_deltas = build_local_communicators(num_workers, 8);
        let mut diagnostics = build_local_communicators(num_workers, 9);
        let mut stars = build_local_communicators(num_workers, 10);
        (0..num_workers)
            .map(|_| Self {
                nodes: nodes.remove(0),
                migration: migration.remove(0),
                volumes: volumes.remove(0),
                ghost_counts: ExchangeCommunicator::new(ghost_counts.remove(0)),
                ghost_payload: ExchangeCommunicator::new(ghost_payload.remove(0)),
                loads: loads.remove(0),
                sources: sources.remove(0),
                candidates: candidates.remove(0),
                sink_deltas: sink_deltas.remove(0),
                diagnostics: diagnostics.remove(0),
                stars: stars.remove(0),
            })
            .collect()
    }

    pub fn single() -> Self {
        Self::build(1).remove(0)
    }

    pub fn rank(&self) -> Rank {
        self.nodes.rank()
    }

    pub fn size(&self) -> usize {
        self.nodes.size()
    }
}

fn ghost_builder<'a>(parameters: &'a SimulationParameters, kern_range: f64) -> GhostBuilder<'a> {
    GhostBuilder {
        box_: &parameters.box_size,
        kern_range,
        ghost_range: parameters.domain.ghost_range,
        ghost_lifetime: parameters.timestep.max_timestep,
    }
}

/// One worker's view of a running simulation, driving the phases of
/// every tick: wrap, rebalance, ghosts, neighbour search, density,
/// forces, integration and sink accretion.
pub struct Simulation {
    pub parameters: SimulationParameters,
    pub store: ParticleStore,
    pub stars: Vec<StarParticle>,
    pub time: f64,
    kernel: Kernel,
    eos: Box<dyn crate::eos::EquationOfState>,
    domain: DomainDecomposition,
    ghost_exchange: GhostExchange,
    state: TimestepState,
    comms: WorkerComms,
    h_max: f64,
    next_star_id: u64,
    coarse_steps: u64,
    snapshots_written: usize,
}

impl Simulation {
    pub fn new(
        parameters: SimulationParameters,
        particles: Vec<SphParticle>,
        stars: Vec<StarParticle>,
        mut comms: WorkerComms,
    ) -> Result<Self> {
        parameters.validate()?;
        // Stars are replicated on every worker and advanced identically
        // everywhere; combine whatever the workers were given.
        let stars: Vec<StarParticle> = if comms.size() > 1 {
            comms.stars.all_gather_vec(&stars).concat()
        } else {
            stars
        };
        if !comms.size().is_power_of_two() {
            return Err(Error::config(format!(
                "worker count {} is not a power of two",
                comms.size()
            )));
        }
        let kernel = Kernel::new(parameters.sph.kernel, parameters.sph.tabulated_kernel);
        let eos = parameters.eos.build();
        let h_max = parameters
            .sph
            .h_max
            .unwrap_or_else(|| 0.5 * parameters.box_size.extent().max_side_length());
        let ghost_capacity = parameters.domain.ghost_capacity_for(particles.len());
        let mut store = ParticleStore::new(particles, ghost_capacity);
        let domain = DomainDecomposition::build_initial(
            &mut store,
            &parameters.box_size,
            &mut comms.nodes,
            &mut comms.migration,
        )?;
        let state = TimestepState::new(parameters.timestep.num_levels);
        let next_star_id = 1_000_000_000 + stars.len() as u64;
        let ghost_exchange = GhostExchange::empty(comms.size(), comms.rank());
        let mut simulation = Self {
            parameters,
            store,
            stars,
            time: 0.0,
            kernel,
            eos,
            domain,
            ghost_exchange,
            state,
            comms,
            h_max,
            next_star_id,
            coarse_steps: 0,
            snapshots_written: 0,
        };
        simulation.prepare()?;
        Ok(simulation)
    }

    pub fn new_single_worker(
        parameters: SimulationParameters,
        particles: Vec<SphParticle>,
        stars: Vec<StarParticle>,
    ) -> Result<Self> {
        Self::new(parameters, particles, stars, WorkerComms::single())
    }

    /// The t = 0 bootstrap: everything is active once, then every
    /// particle gets its first checkpoint and block step level.
    fn prepare(&mut self) -> Result<()> {
        let initial_alpha = self.parameters.sph.viscosity.initial_alpha();
        for particle in self.store.real_mut() {
            particle.alpha = initial_alpha;
        }
        self.rebuild_ghosts()?;
        let active: Vec<usize> = (0..self.store.num_real()).collect();
        for &index in &active {
            self.store.get_mut(index).active = true;
        }
        self.density_and_forces(&active)?;
        let star_indices: Vec<usize> = (0..self.stars.len()).collect();
        self.star_forces(&star_indices);
        for particle in self.store.real_mut() {
            particle.pos0 = particle.pos;
            particle.vel0 = particle.vel;
            particle.accel0 = particle.total_accel();
            particle.internal_energy0 = particle.internal_energy;
            particle.last_tick = 0;
            particle.active = false;
        }
        self.assign_initial_levels();
        for star in self.stars.iter_mut() {
            star.pos0 = star.pos;
            star.vel0 = star.vel;
            star.accel0 = star.accel;
            star.last_tick = 0;
        }
        info!(
            "worker {}: initialised with {} particles, {} stars",
            self.comms.rank(),
            self.store.num_real(),
            self.stars.len()
        );
        Ok(())
    }

    fn assign_initial_levels(&mut self) {
        let viscosity_switch = self.parameters.sph.viscosity.time_dependent;
        let timestep_parameters = self.parameters.timestep.clone();
        let state = self.state;
        for particle in self.store.real_mut() {
            let desired = timestep::fluid_timestep(
                particle,
                &timestep_parameters,
                viscosity_switch.as_ref(),
            );
            particle.level = state.level_for(desired, &timestep_parameters);
        }
        for star in self.stars.iter_mut() {
            let desired = timestep::star_timestep(star, &timestep_parameters);
            star.level = state.level_for(desired, &timestep_parameters);
        }
    }

    /// Clear all ghosts and re-establish them: remote copies first,
    /// then the periodic/mirror images. Remote copies participate in
    /// the image pass, so corners across worker boundaries are covered.
    fn rebuild_ghosts(&mut self) -> Result<()> {
        self.store.clear_ghosts();
        ghost_builder(&self.parameters, self.kernel.range()).apply_wrap(&mut self.store);
        if self.comms.size() > 1 {
            self.ghost_exchange = GhostExchange::build(
                &mut self.store,
                &self.parameters.box_size,
                self.kernel.range(),
                self.parameters.domain.ghost_range,
                &mut self.comms.volumes,
                &mut self.comms.ghost_counts,
                &mut self.comms.ghost_payload,
            )?;
        }
        ghost_builder(&self.parameters, self.kernel.range()).create_ghosts(&mut self.store)?;
        Ok(())
    }

    /// Refresh pass: remote copies from their owners, local images from
    /// their (possibly just refreshed) origins.
    fn refresh_ghosts(&mut self) -> Result<()> {
        if self.comms.size() > 1 {
            self.ghost_exchange
                .update(&mut self.store, &mut self.comms.ghost_payload)?;
        }
        ghost_builder(&self.parameters, self.kernel.range()).refresh_ghosts(&mut self.store);
        Ok(())
    }

    fn gather_sources(&mut self) -> Vec<GravitySource> {
        let local = nbody::gather_sources(self.store.all());
        if self.comms.size() == 1 {
            return local;
        }
        self.comms
            .sources
            .all_gather_vec(&local)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Density summation (including the smoothing length solve), the
    /// ghost refresh making the new densities visible, then the force
    /// pass.
    fn density_and_forces(&mut self, active: &[usize]) -> Result<()> {
        let batch_size = self.parameters.performance.batch_size;
        {
            let tree = build_neighbour_tree(self.store.all(), &self.parameters.tree);
            let update = DensityUpdate {
                kernel: &self.kernel,
                params: &self.parameters.sph,
                eos: &*self.eos,
                gravity: &self.parameters.gravity,
                tree: &tree,
                h_max: self.h_max,
                batch_size,
            };
            update.update(self.store.all_mut(), &self.stars, active)?;
        }
        self.refresh_ghosts()?;

        let sources = if self.parameters.gravity.enabled {
            self.gather_sources()
        } else {
            vec![]
        };
        let tree = build_neighbour_tree(self.store.all(), &self.parameters.tree);
        let kern_range = self.kernel.range();
        let entries: Vec<ActiveNeighbours> = active
            .iter()
            .map(|&index| {
                let particle = self.store.get(index);
                ActiveNeighbours {
                    index,
                    neighbours: force_neighbours(&tree, &particle.pos, particle.h, kern_range),
                }
            })
            .collect();
        let evaluation = ForceEvaluation {
            kernel: &self.kernel,
            params: &self.parameters.sph,
            gravity: &self.parameters.gravity,
            box_: &self.parameters.box_size,
            batch_size,
        };
        evaluation.compute(self.store.all_mut(), &entries, &sources, &self.stars);
        Ok(())
    }

    fn star_forces(&mut self, active: &[usize]) {
        if active.is_empty() {
            return;
        }
        let sources = if self.parameters.gravity.enabled {
            self.gather_sources()
        } else {
            vec![]
        };
        nbody::compute_star_forces(
            &mut self.stars,
            active,
            &sources,
            &self.kernel,
            &self.parameters.box_size,
        );
    }

    /// Advance the run by one tick of the block step clock.
    pub fn step(&mut self) -> Result<()> {
        self.state.advance();
        let state = self.state;
        let tick = state.tick();
        let tick_duration = state.tick_duration(&self.parameters.timestep);
        self.time += tick_duration;
        let viscosity_switch = self.parameters.sph.viscosity.time_dependent;
        let fixes_energy = self.eos.fixes_internal_energy();
        let timestep_parameters = self.parameters.timestep.clone();

        // Drift everything to the current tick.
        for particle in self.store.real_mut() {
            let tau = (tick - particle.last_tick) as f64 * tick_duration;
            particle.pos =
                leapfrog::predict_position(particle.pos0, particle.vel0, particle.accel0, tau);
            particle.vel = leapfrog::predict_velocity(particle.vel0, particle.accel0, tau);
            if !fixes_energy {
                particle.internal_energy =
                    (particle.internal_energy0 + particle.dudt * tau).max(f64::MIN_POSITIVE);
            }
            if let Some(switch) = &viscosity_switch {
                particle.alpha = (particle.alpha + particle.dalpha_dt * tick_duration)
                    .clamp(switch.alpha_min, switch.alpha_max);
            }
            particle.active = false;
        }
        for star in self.stars.iter_mut() {
            let tau = (tick - star.last_tick) as f64 * tick_duration;
            star.pos = leapfrog::predict_position(star.pos0, star.vel0, star.accel0, tau);
            star.vel = leapfrog::predict_velocity(star.vel0, star.accel0, tau);
        }

        // Complete the block step of every particle arriving at its
        // full step: midpoint kick, new checkpoint, new level.
        for particle in self.store.real_mut() {
            if !state.at_full_step(particle.last_tick, particle.level) {
                continue;
            }
            let dt = state.step_ticks(particle.level) as f64 * tick_duration;
            let accel_half = particle.total_accel();
            particle.pos =
                leapfrog::complete_position(particle.pos0, particle.vel0, accel_half, dt);
            particle.vel = leapfrog::kick(particle.vel0, accel_half, dt);
            if !fixes_energy {
                particle.internal_energy =
                    (particle.internal_energy0 + particle.dudt * dt).max(f64::MIN_POSITIVE);
            }
            particle.pos0 = particle.pos;
            particle.vel0 = particle.vel;
            particle.accel0 = accel_half;
            particle.internal_energy0 = particle.internal_energy;
            particle.last_tick = tick;
            let desired = state.level_for(
                timestep::fluid_timestep(
                    particle,
                    &timestep_parameters,
                    viscosity_switch.as_ref(),
                ),
                &timestep_parameters,
            );
            let capped =
                timestep::capped_level(desired, particle.neighbour_level, &timestep_parameters);
            particle.level = state.admissible_level(particle.level, capped);
        }
        // Mid-block promotion: a particle whose neighbours run on much
        // finer steps is pulled to a stricter level as soon as the
        // schedule admits it.
        for particle in self.store.real_mut() {
            let capped = timestep::capped_level(
                particle.level,
                particle.neighbour_level,
                &timestep_parameters,
            );
            if capped > particle.level && tick % state.step_ticks(capped) == 0 {
                particle.pos0 = particle.pos;
                particle.vel0 = particle.vel;
                particle.accel0 = particle.total_accel();
                particle.internal_energy0 = particle.internal_energy;
                particle.last_tick = tick;
                particle.level = capped;
            }
        }
        for star in self.stars.iter_mut() {
            if !state.at_full_step(star.last_tick, star.level) {
                continue;
            }
            let dt = state.step_ticks(star.level) as f64 * tick_duration;
            star.pos = leapfrog::complete_position(star.pos0, star.vel0, star.accel, dt);
            star.vel = leapfrog::kick(star.vel0, star.accel, dt);
            star.pos0 = star.pos;
            star.vel0 = star.vel;
            star.accel0 = star.accel;
            star.last_tick = tick;
            let desired = timestep::star_timestep(star, &timestep_parameters);
            star.level = state.level_for(desired, &timestep_parameters);
        }

        if state.on_synchronization_step() {
            self.coarse_steps += 1;
            self.synchronization_pass()?;
        } else {
            ghost_builder(&self.parameters, self.kernel.range()).apply_wrap(&mut self.store);
            self.refresh_ghosts()?;
        }

        // Half-step particles receive a fresh force evaluation.
        let mut active: Vec<usize> = vec![];
        for index in 0..self.store.num_real() {
            let particle = self.store.get_mut(index);
            if state.at_half_step(particle.last_tick, particle.level) {
                particle.active = true;
                active.push(index);
            }
        }
        // Runs even with an empty active set: the ghost refresh and
        // gravity gather inside are collectives all workers must join.
        self.density_and_forces(&active)?;
        let active_stars: Vec<usize> = self
            .stars
            .iter()
            .enumerate()
            .filter(|(_, star)| state.at_half_step(star.last_tick, star.level))
            .map(|(index, _)| index)
            .collect();
        self.star_forces(&active_stars);
        Ok(())
    }

    /// Block boundary housekeeping: sinks, rebalancing, ghost rebuild,
    /// diagnostics and output.
    fn synchronization_pass(&mut self) -> Result<()> {
        self.store.clear_ghosts();
        ghost_builder(&self.parameters, self.kernel.range()).apply_wrap(&mut self.store);

        if self.parameters.sinks.enabled {
            self.sink_pass()?;
        }

        if self.comms.size() > 1
            && self.coarse_steps % self.parameters.domain.rebalance_interval == 0
        {
            let moved = self.domain.rebalance(
                &mut self.store,
                &mut self.comms.loads,
                &mut self.comms.migration,
            )?;
            debug!(
                "worker {}: rebalanced, {} particles migrated",
                self.comms.rank(),
                moved
            );
        }

        self.rebuild_ghosts()?;

        let totals = diagnostics::reduce(
            self.store.all(),
            &self.stars,
            &mut self.comms.diagnostics,
        );
        info!(
            "t = {:.6}: N = {}, E_kin = {:.6e}, E_therm = {:.6e}, E_grav = {:.6e}",
            self.time,
            totals.num_particles,
            totals.kinetic_energy,
            totals.thermal_energy,
            totals.potential_energy
        );

        self.write_snapshot_if_due()?;
        Ok(())
    }

    /// Sink formation, accretion and merging. Stars are replicated, so
    /// every worker applies the identical globally gathered updates.
    fn sink_pass(&mut self) -> Result<()> {
        let sink_parameters = self.parameters.sinks.clone();

        if self.stars.iter().any(|star| star.is_sink()) {
            let deltas = sinks::accrete_local(
                &mut self.store,
                &self.stars,
                &sink_parameters,
                &self.state,
                &self.parameters.timestep,
            );
            let deltas: Vec<SinkDelta> = if self.comms.size() > 1 {
                self.comms
                    .sink_deltas
                    .all_gather_vec(&deltas)
                    .into_iter()
                    .flatten()
                    .collect()
            } else {
                deltas
            };
            sinks::apply_deltas(&mut self.stars, &deltas);
        }

        let local_candidates: Vec<SphParticle> =
            sinks::find_candidates(&self.store, &sink_parameters)
                .into_iter()
                .map(|index| *self.store.get(index))
                .collect();
        let candidates: Vec<SphParticle> = if self.comms.size() > 1 {
            self.comms
                .candidates
                .all_gather_vec(&local_candidates)
                .into_iter()
                .flatten()
                .collect()
        } else {
            local_candidates
        };
        if !candidates.is_empty() {
            let created = sinks::create_sinks(
                &candidates,
                &mut self.stars,
                &sink_parameters,
                &mut self.next_star_id,
            );
            if created > 0 {
                info!("t = {:.6}: formed {created} sink(s)", self.time);
            }
            let promoted: Vec<u64> = candidates.iter().map(|candidate| candidate.id.0).collect();
            let mut removals: Vec<usize> = self
                .store
                .real()
                .iter()
                .enumerate()
                .filter(|(_, particle)| promoted.contains(&particle.id.0))
                .map(|(index, _)| index)
                .collect();
            self.store.remove_reals(&mut removals);
        }

        sinks::merge_sinks(&mut self.stars);
        // The pass runs on a synchronization tick, where every star sits
        // at a block boundary; re-anchor them (including fresh sinks).
        let tick = self.state.tick();
        for star in self.stars.iter_mut() {
            star.last_tick = tick;
        }
        Ok(())
    }

    fn write_snapshot_if_due(&mut self) -> Result<()> {
        let Some(every) = self.parameters.output.snapshot_every else {
            return Ok(());
        };
        if self.time + 1e-12 < every * (self.snapshots_written as f64 + 1.0) {
            return Ok(());
        }
        let format = build_format(self.parameters.output.format);
        let name = if self.comms.size() == 1 {
            format!("snap_{:05}.{}", self.snapshots_written, format.extension())
        } else {
            format!(
                "snap_{:05}.rank{}.{}",
                self.snapshots_written,
                self.comms.rank(),
                format.extension()
            )
        };
        let path = self.parameters.output.directory.join(name);
        let data = SnapshotData::from_particles(self.time, self.store.real());
        format.write(&path, &data)?;
        self.snapshots_written += 1;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        while self.time + 1e-12 < self.parameters.simulation.final_time {
            self.step()?;
        }
        Ok(())
    }

    pub fn state(&self) -> &TimestepState {
        &self.state
    }

    pub fn rank(&self) -> Rank {
        self.comms.rank()
    }

    pub fn diagnostics(&mut self) -> Diagnostics {
        diagnostics::reduce(self.store.all(), &self.stars, &mut self.comms.diagnostics)
    }
}
