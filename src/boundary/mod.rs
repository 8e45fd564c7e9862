use crate::config::NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::component_mut;
use crate::error::Result;
use crate::particle::GhostBoundary;
use crate::particle::GhostFace;
use crate::particle::ParticleKind;
use crate::particle::ParticleStore;
use crate::particle::SphParticle;
use crate::simulation_box::BoundaryKind;
use crate::simulation_box::BoundarySide;
use crate::simulation_box::SimulationBox;

/// Creates and maintains the ghost images that realise periodic and
/// mirror boundaries within one worker.
pub struct GhostBuilder<'a> {
    pub box_: &'a SimulationBox,
    pub kern_range: f64,
    /// Safety factor on the kernel reach of a particle.
    pub ghost_range: f64,
    /// How long the ghosts have to stay valid: the particle's motion
    /// over this time is added to its reach.
    pub ghost_lifetime: f64,
}

impl GhostBuilder<'_> {
    /// Wrap all real particles back into the box along periodic axes,
    /// shifting their integrator checkpoints along.
    pub fn apply_wrap(&self, store: &mut ParticleStore) {
        for particle in store.real_mut() {
            let mut pos = particle.pos;
            let mut pos0 = particle.pos0;
            self.box_.wrap_with_checkpoint(&mut pos, &mut pos0);
            particle.pos = pos;
            particle.pos0 = pos0;
        }
    }

    fn reaches_face(&self, particle: &SphParticle, axis: usize, side: BoundarySide) -> bool {
        let reach = self.ghost_range * self.kern_range * particle.h;
        let x = component(&particle.pos, axis);
        let v = component(&particle.vel, axis);
        match side {
            BoundarySide::Lower => {
                x + (v * self.ghost_lifetime).min(0.0) < component(&self.box_.min, axis) + reach
            }
            BoundarySide::Upper => {
                x + (v * self.ghost_lifetime).max(0.0) > component(&self.box_.max, axis) - reach
            }
        }
    }

    fn make_ghost(
        &self,
        origin_index: usize,
        origin: &SphParticle,
        axis: usize,
        side: BoundarySide,
        boundary: GhostBoundary,
    ) -> SphParticle {
        let mut ghost = *origin;
        ghost.kind = ParticleKind::Ghost {
            origin: origin_index as u32,
            face: GhostFace {
                axis: axis as u8,
                side,
                boundary,
            },
        };
        ghost.active = false;
        self.apply_face_transform(&mut ghost);
        ghost
    }

    /// Reapply the positional shift or reflection a ghost was created
    /// with. The state is assumed to be a fresh copy of the origin.
    fn apply_face_transform(&self, ghost: &mut SphParticle) {
        let ParticleKind::Ghost { face, .. } = ghost.kind else {
            return;
        };
        let axis = face.axis as usize;
        match face.boundary {
            GhostBoundary::Periodic => {
                let length = component(&self.box_.side_lengths(), axis);
                // A particle near the lower face appears beyond the
                // upper face and vice versa.
                let shift = match face.side {
                    BoundarySide::Lower => length,
                    BoundarySide::Upper => -length,
                };
                *component_mut(&mut ghost.pos, axis) += shift;
                *component_mut(&mut ghost.pos0, axis) += shift;
            }
            GhostBoundary::Mirror => {
                ghost.pos = self.box_.mirrored(ghost.pos, axis, face.side);
                ghost.pos0 = self.box_.mirrored(ghost.pos0, axis, face.side);
                *component_mut(&mut ghost.vel, axis) *= -1.0;
                *component_mut(&mut ghost.vel0, axis) *= -1.0;
                *component_mut(&mut ghost.accel, axis) *= -1.0;
                *component_mut(&mut ghost.accel0, axis) *= -1.0;
                *component_mut(&mut ghost.grav_accel, axis) *= -1.0;
            }
        }
    }

    /// Generate all boundary ghosts, dimension by dimension so that
    /// ghosts of ghosts cover the corners. Overflowing the preallocated
    /// ghost capacity is fatal.
    pub fn create_ghosts(&self, store: &mut ParticleStore) -> Result<()> {
        if !self.box_.has_closed_faces() {
            return Ok(());
        }
        for axis in 0..NUM_DIMENSIONS {
            let candidates = store.len();
            for index in 0..candidates {
                for side in BoundarySide::BOTH {
                    let boundary = match self.box_.kind(axis, side) {
                        BoundaryKind::Open => continue,
                        BoundaryKind::Periodic => GhostBoundary::Periodic,
                        BoundaryKind::Mirror => GhostBoundary::Mirror,
                    };
                    let particle = *store.get(index);
                    if self.reaches_face(&particle, axis, side) {
                        let ghost = self.make_ghost(index, &particle, axis, side, boundary);
                        store.push_ghost(ghost)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Refresh every ghost from its origin: full state copy, then the
    /// stored face transformation. Ghosts of ghosts resolve correctly
    /// because ghosts are refreshed in creation order.
    pub fn refresh_ghosts(&self, store: &mut ParticleStore) {
        for index in store.num_real()..store.len() {
            let ParticleKind::Ghost { origin, face } = store.get(index).kind else {
                continue;
            };
            let mut refreshed = *store.get(origin as usize);
            refreshed.kind = ParticleKind::Ghost {
                origin,
                face,
            };
            refreshed.active = false;
            self.apply_face_transform(&mut refreshed);
            *store.get_mut(index) = refreshed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GhostBuilder;
    use crate::config::NUM_DIMENSIONS;
    use crate::dimension::component;
    use crate::dimension::component_mut;
    use crate::dimension::MVec;
    use crate::particle::GhostBoundary;
    use crate::particle::ParticleId;
    use crate::particle::ParticleKind;
    use crate::particle::ParticleStore;
    use crate::particle::SphParticle;
    use crate::simulation_box::BoundaryKind;
    use crate::simulation_box::SimulationBox;
    use crate::test_utils::assert_vec_is_close;

    fn builder(box_: &SimulationBox) -> GhostBuilder {
        GhostBuilder {
            box_,
            kern_range: 2.0,
            ghost_range: 1.1,
            ghost_lifetime: 0.0,
        }
    }

    fn corner_particle(h: f64) -> SphParticle {
        let mut particle = SphParticle::new(
            ParticleId(7),
            MVec::ONE * 0.05,
            MVec::ZERO,
            1.0,
            1.0,
        );
        particle.h = h;
        particle
    }

    #[test]
    fn periodic_corner_particle_spawns_ghosts_on_every_closed_face_combination() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let builder = builder(&box_);
        let mut store = ParticleStore::new(vec![corner_particle(0.1)], 1024);
        builder.create_ghosts(&mut store).unwrap();
        // One image per non-empty subset of the axes.
        assert_eq!(store.num_ghosts(), 2usize.pow(NUM_DIMENSIONS as u32) - 1);
        for index in store.num_real()..store.len() {
            let ghost = store.get(index);
            let wrapped = box_.periodic_wrap(ghost.pos);
            assert_vec_is_close(wrapped, store.get(0).pos);
        }
    }

    #[test]
    fn interior_particle_spawns_no_ghosts() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let builder = builder(&box_);
        let mut particle = corner_particle(0.1);
        particle.pos = MVec::ONE * 0.5;
        let mut store = ParticleStore::new(vec![particle], 16);
        builder.create_ghosts(&mut store).unwrap();
        assert_eq!(store.num_ghosts(), 0);
    }

    #[test]
    fn mirror_ghost_reflects_position_and_velocity() {
        let mut box_ = SimulationBox::cube_from_side_length(1.0);
        for axis in 0..NUM_DIMENSIONS {
            box_.boundaries[axis].lower = BoundaryKind::Mirror;
            box_.boundaries[axis].upper = BoundaryKind::Mirror;
        }
        let builder = builder(&box_);
        let mut particle = corner_particle(0.1);
        particle.pos = MVec::ONE * 0.5;
        *component_mut(&mut particle.pos, 0) = 0.05;
        particle.vel = MVec::ONE;
        let mut store = ParticleStore::new(vec![particle], 64);
        builder.create_ghosts(&mut store).unwrap();
        let ghost = store
            .all()
            .iter()
            .find(|p| p.is_local_ghost())
            .copied()
            .unwrap();
        assert!((component(&ghost.pos, 0) + 0.05).abs() < 1e-12);
        assert!((component(&ghost.vel, 0) + 1.0).abs() < 1e-12);
        // Tangential components are untouched.
        if NUM_DIMENSIONS > 1 {
            assert!((component(&ghost.vel, 1) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn refresh_reproduces_creation_state() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let builder = builder(&box_);
        let mut store = ParticleStore::new(vec![corner_particle(0.1)], 1024);
        builder.create_ghosts(&mut store).unwrap();
        let before: Vec<_> = store.all().to_vec();
        // Scramble ghost state, then refresh.
        for index in store.num_real()..store.len() {
            store.get_mut(index).pos = MVec::ONE * 123.0;
            store.get_mut(index).density = -1.0;
        }
        builder.refresh_ghosts(&mut store);
        for (a, b) in before.iter().zip(store.all()) {
            assert_vec_is_close(a.pos, b.pos);
            assert_eq!(a.density, b.density);
        }
    }

    #[test]
    fn refresh_follows_the_moved_origin() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let builder = builder(&box_);
        let mut store = ParticleStore::new(vec![corner_particle(0.1)], 1024);
        builder.create_ghosts(&mut store).unwrap();
        let shift = MVec::ONE * 0.01;
        store.get_mut(0).pos += shift;
        builder.refresh_ghosts(&mut store);
        for index in store.num_real()..store.len() {
            let ghost = *store.get(index);
            let ParticleKind::Ghost { face, .. } = ghost.kind else {
                panic!("not a ghost")
            };
            assert_eq!(face.boundary, GhostBoundary::Periodic);
            let wrapped = box_.periodic_wrap(ghost.pos);
            assert_vec_is_close(wrapped, store.get(0).pos);
        }
    }

    #[test]
    fn ghost_overflow_is_fatal() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let builder = builder(&box_);
        let mut store = ParticleStore::new(vec![corner_particle(0.1)], 1);
        assert!(builder.create_ghosts(&mut store).is_err());
    }
}
