use derive_more::Display;
use derive_more::From;

use crate::communication::Rank;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::simulation_box::BoundarySide;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Default)]
pub struct ParticleId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostBoundary {
    Periodic,
    Mirror,
}

/// Which face produced a ghost. Set at creation and immutable; the
/// refresh pass replays exactly this transformation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhostFace {
    pub axis: u8,
    pub side: BoundarySide,
    pub boundary: GhostBoundary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleKind {
    Real,
    /// Image of a particle (possibly itself a ghost, for corner images)
    /// across a closed box face. `origin` indexes the particle store.
    Ghost { origin: u32, face: GhostFace },
    /// Read-only copy of a particle owned by another worker.
    RemoteGhost { rank: Rank },
}

/// A fluid particle. Plain `Copy` data so whole particles can be shipped
/// between workers bytewise; anything referring to other particles does
/// so by index into the store.
#[derive(Clone, Copy, Debug)]
pub struct SphParticle {
    pub id: ParticleId,
    pub kind: ParticleKind,

    pub pos: MVec,
    pub vel: MVec,
    /// Hydrodynamic acceleration from the latest force evaluation.
    pub accel: MVec,
    pub grav_accel: MVec,

    /// Checkpoint state at the start of the current block step.
    pub pos0: MVec,
    pub vel0: MVec,
    pub accel0: MVec,
    pub internal_energy0: f64,

    pub mass: f64,
    pub h: f64,
    pub density: f64,
    pub internal_energy: f64,
    pub dudt: f64,
    pub pressure: f64,
    pub sound_speed: f64,

    /// P/(ρ²Ω), the conservative pressure prefactor.
    pub pressure_factor: f64,
    pub omega_inv: f64,
    pub zeta: f64,
    pub chi: f64,
    pub potential: f64,
    pub div_v: f64,
    /// Smoothed divergence of the acceleration field; negative where
    /// the flow converges onto a point.
    pub div_a: f64,
    pub alpha: f64,
    pub dalpha_dt: f64,

    /// Integer time (in finest ticks) of the last block step checkpoint.
    pub last_tick: u64,
    pub level: u8,
    /// Highest block step level among the interacting neighbours.
    pub neighbour_level: u8,

    pub active: bool,
    pub potential_minimum: bool,
    /// Index of the sink whose interior contains this particle, -1 if
    /// none.
    pub sink_id: i32,
}

impl SphParticle {
    pub fn new(id: ParticleId, pos: MVec, vel: MVec, mass: f64, internal_energy: f64) -> Self {
        Self {
            id,
            kind: ParticleKind::Real,
            pos,
            vel,
            accel: MVec::ZERO,
            grav_accel: MVec::ZERO,
            pos0: pos,
            vel0: vel,
            accel0: MVec::ZERO,
            internal_energy0: internal_energy,
            mass,
            h: 0.0,
            density: 0.0,
            internal_energy,
            dudt: 0.0,
            pressure: 0.0,
            sound_speed: 0.0,
            pressure_factor: 0.0,
            omega_inv: 1.0,
            zeta: 0.0,
            chi: 0.0,
            potential: 0.0,
            div_v: 0.0,
            div_a: 0.0,
            alpha: 0.0,
            dalpha_dt: 0.0,
            last_tick: 0,
            level: 0,
            neighbour_level: 0,
            active: true,
            potential_minimum: false,
            sink_id: -1,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, ParticleKind::Real)
    }

    pub fn is_local_ghost(&self) -> bool {
        matches!(self.kind, ParticleKind::Ghost { .. })
    }

    pub fn total_accel(&self) -> MVec {
        self.accel + self.grav_accel
    }
}

/// A star (or sink) particle advanced by the N-body integrator.
#[derive(Clone, Copy, Debug)]
pub struct StarParticle {
    pub id: ParticleId,
    pub pos: MVec,
    pub vel: MVec,
    pub accel: MVec,
    pub pos0: MVec,
    pub vel0: MVec,
    pub accel0: MVec,
    pub mass: f64,
    /// Softening length; zero means unsoftened.
    pub h: f64,
    pub potential: f64,
    pub last_tick: u64,
    pub level: u8,
    /// Index into an optional binary sub-system, -1 if single.
    pub binary_id: i32,
    /// Accretion radius; zero for ordinary stars.
    pub sink_radius: f64,
}

impl StarParticle {
    pub fn new(id: ParticleId, pos: MVec, vel: MVec, mass: f64) -> Self {
        Self {
            id,
            pos,
            vel,
            accel: MVec::ZERO,
            pos0: pos,
            vel0: vel,
            accel0: MVec::ZERO,
            mass,
            h: 0.0,
            potential: 0.0,
            last_tick: 0,
            level: 0,
            binary_id: -1,
            sink_radius: 0.0,
        }
    }

    pub fn is_sink(&self) -> bool {
        self.sink_radius > 0.0
    }
}

/// The fluid particles owned by one worker, with ghosts appended behind
/// the real section. Ghost slots are preallocated; running out of them
/// is fatal rather than silently regrowing.
#[derive(Debug)]
pub struct ParticleStore {
    particles: Vec<SphParticle>,
    num_real: usize,
    ghost_capacity: usize,
}

impl ParticleStore {
    pub fn new(real: Vec<SphParticle>, ghost_capacity: usize) -> Self {
        let num_real = real.len();
        let mut particles = real;
        particles.reserve(ghost_capacity);
        Self {
            particles,
            num_real,
            ghost_capacity,
        }
    }

    pub fn num_real(&self) -> usize {
        self.num_real
    }

    pub fn num_ghosts(&self) -> usize {
        self.particles.len() - self.num_real
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn all(&self) -> &[SphParticle] {
        &self.particles
    }

    pub fn all_mut(&mut self) -> &mut [SphParticle] {
        &mut self.particles
    }

    pub fn real(&self) -> &[SphParticle] {
        &self.particles[..self.num_real]
    }

    pub fn real_mut(&mut self) -> &mut [SphParticle] {
        &mut self.particles[..self.num_real]
    }

    pub fn get(&self, index: usize) -> &SphParticle {
        &self.particles[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut SphParticle {
        &mut self.particles[index]
    }

    pub fn clear_ghosts(&mut self) {
        self.particles.truncate(self.num_real);
    }

    pub fn push_ghost(&mut self, ghost: SphParticle) -> Result<usize> {
        if self.num_ghosts() >= self.ghost_capacity {
            return Err(Error::CapacityExhausted {
                what: "ghost particle",
                capacity: self.ghost_capacity,
            });
        }
        self.particles.push(ghost);
        Ok(self.particles.len() - 1)
    }

    /// Insert newly owned real particles. Only valid while no ghosts are
    /// present, so real indices stay dense.
    pub fn push_real(&mut self, particle: SphParticle) {
        assert_eq!(self.num_ghosts(), 0);
        self.particles.insert(self.num_real, particle);
        self.num_real += 1;
    }

    /// Remove the real particles at the given indices (any order).
    /// Only valid while no ghosts are present.
    pub fn remove_reals(&mut self, indices: &mut Vec<usize>) -> Vec<SphParticle> {
        assert_eq!(self.num_ghosts(), 0);
        indices.sort_unstable();
        indices.dedup();
        let mut removed = Vec::with_capacity(indices.len());
        for index in indices.iter().rev() {
            removed.push(self.particles.remove(*index));
        }
        self.num_real = self.particles.len();
        removed.reverse();
        removed
    }
}
