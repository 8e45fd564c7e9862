mod parameters;

pub use parameters::TimestepParameters;

use crate::particle::SphParticle;
use crate::particle::StarParticle;
use crate::sph::TimeDependentViscosity;

/// The integer clock of the block step hierarchy. A particle on level i
/// has a block step of 2^(num_levels − i) ticks, so even the finest
/// level has an even tick count and a representable half step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimestepState {
    tick: u64,
    num_levels: usize,
}

impl TimestepState {
    pub fn new(num_levels: usize) -> Self {
        Self {
            tick: 0,
            num_levels,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn ticks_per_block(&self) -> u64 {
        1 << self.num_levels
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// All levels are synchronised at block boundaries; this is where
    /// rebalancing and ghost rebuilds happen.
    pub fn on_synchronization_step(&self) -> bool {
        self.tick % self.ticks_per_block() == 0
    }

    pub fn step_ticks(&self, level: u8) -> u64 {
        1 << (self.num_levels - level as usize)
    }

    /// Physical duration of one tick.
    pub fn tick_duration(&self, parameters: &TimestepParameters) -> f64 {
        parameters.max_timestep / self.ticks_per_block() as f64
    }

    /// The level whose step is the largest power-of-two fraction of the
    /// block step not exceeding the desired timestep.
    pub fn level_for(&self, desired: f64, parameters: &TimestepParameters) -> u8 {
        let ratio = parameters.max_timestep / desired.max(f64::MIN_POSITIVE);
        let level = ratio.log2().ceil().max(0.0) as usize;
        level.min(self.num_levels - 1) as u8
    }

    /// Whether a particle checkpointed at `last_tick` reaches the half
    /// point of its block step now (force evaluation time).
    pub fn at_half_step(&self, last_tick: u64, level: u8) -> bool {
        self.tick == last_tick + self.step_ticks(level) / 2
    }

    pub fn at_full_step(&self, last_tick: u64, level: u8) -> bool {
        self.tick == last_tick + self.step_ticks(level)
    }

    /// A level change must keep the particle aligned with the global
    /// block schedule: refining is always allowed, coarsening only by
    /// one level and only when the longer step starts here.
    pub fn admissible_level(&self, current: u8, desired: u8) -> u8 {
        if desired >= current {
            return desired;
        }
        let coarser = current - 1;
        if self.tick % self.step_ticks(coarser) == 0 {
            coarser
        } else {
            current
        }
    }
}

/// The stricter of the desired level and the neighbour cap.
pub fn capped_level(desired: u8, neighbour_level: u8, parameters: &TimestepParameters) -> u8 {
    desired.max(neighbour_level.saturating_sub(parameters.level_diff_max))
}

/// Per-particle timestep: the minimum of the Courant, acceleration,
/// energy and viscous-decay criteria.
pub fn fluid_timestep(
    particle: &SphParticle,
    parameters: &TimestepParameters,
    viscosity_switch: Option<&TimeDependentViscosity>,
) -> f64 {
    let mut dt = f64::INFINITY;

    let signal = particle.sound_speed + particle.h * particle.div_v.abs();
    if signal > 0.0 {
        dt = dt.min(parameters.courant_factor * particle.h / signal);
    }

    let accel = particle.total_accel().length();
    if accel > 0.0 {
        dt = dt.min(parameters.accel_factor * (particle.h / accel).sqrt());
    }

    if particle.dudt.abs() > 0.0 && particle.internal_energy > 0.0 {
        dt = dt.min(parameters.energy_factor * particle.internal_energy / particle.dudt.abs());
    }

    if let Some(switch) = viscosity_switch {
        if particle.sound_speed > 0.0 {
            dt = dt.min(particle.h / (switch.decay_constant * particle.sound_speed));
        }
    }

    dt.min(parameters.max_timestep)
}

pub fn star_timestep(star: &StarParticle, parameters: &TimestepParameters) -> f64 {
    let accel = star.accel.length();
    let scale = if star.h > 0.0 {
        star.h
    } else {
        // Unsoftened stars fall back to a velocity based scale.
        let speed = star.vel.length();
        if speed > 0.0 && accel > 0.0 {
            speed * speed / accel
        } else {
            return parameters.max_timestep;
        }
    };
    if accel > 0.0 {
        (parameters.accel_factor * (scale / accel).sqrt()).min(parameters.max_timestep)
    } else {
        parameters.max_timestep
    }
}

#[cfg(test)]
mod tests {
    use super::TimestepParameters;
    use super::TimestepState;

    #[test]
    fn levels_halve_the_step() {
        let parameters = TimestepParameters {
            num_levels: 4,
            max_timestep: 1.0,
            ..Default::default()
        };
        let state = TimestepState::new(parameters.num_levels);
        assert_eq!(state.ticks_per_block(), 16);
        assert_eq!(state.step_ticks(0), 16);
        assert_eq!(state.step_ticks(3), 2);
        // A level 0 step lasts max_timestep.
        assert_eq!(
            state.step_ticks(0) as f64 * state.tick_duration(&parameters),
            1.0
        );
    }

    #[test]
    fn desired_timesteps_map_to_the_next_stricter_level() {
        let parameters = TimestepParameters {
            num_levels: 4,
            max_timestep: 1.0,
            ..Default::default()
        };
        let state = TimestepState::new(parameters.num_levels);
        assert_eq!(state.level_for(2.0, &parameters), 0);
        assert_eq!(state.level_for(1.0, &parameters), 0);
        assert_eq!(state.level_for(0.6, &parameters), 1);
        assert_eq!(state.level_for(0.25, &parameters), 2);
        assert_eq!(state.level_for(1e-9, &parameters), 3);
    }

    #[test]
    fn half_and_full_steps_fire_at_the_right_ticks() {
        let mut state = TimestepState::new(3);
        // Level 1: eight ticks per block step of four.
        let level = 1;
        let mut half_steps = vec![];
        let mut full_steps = vec![];
        for _ in 0..9 {
            state.advance();
            if state.at_half_step(0, level) {
                half_steps.push(state.tick());
            }
            if state.at_full_step(0, level) {
                full_steps.push(state.tick());
            }
        }
        assert_eq!(half_steps, vec![2]);
        assert_eq!(full_steps, vec![4]);
    }

    #[test]
    fn coarsening_waits_for_an_aligned_tick() {
        let mut state = TimestepState::new(3);
        // A particle on level 2 wants level 0.
        for _ in 0..2 {
            state.advance();
        }
        // tick 2: a level 1 step (4 ticks) does not start here.
        assert_eq!(state.admissible_level(2, 0), 2);
        for _ in 0..2 {
            state.advance();
        }
        // tick 4: it does.
        assert_eq!(state.admissible_level(2, 0), 1);
        // Refining is always allowed.
        assert_eq!(state.admissible_level(0, 2), 2);
    }

    #[test]
    fn synchronization_at_block_boundaries() {
        let mut state = TimestepState::new(2);
        assert!(state.on_synchronization_step());
        for tick in 1..=4 {
            state.advance();
            assert_eq!(state.on_synchronization_step(), tick == 4);
        }
    }
}
