use crate::communication::CollectiveCommunicator;
use crate::communication::Communicator;
use crate::communication::DataByRank;
use crate::communication::ExchangeCommunicator;
use crate::communication::Rank;
use crate::communication::SizedCommunicator;
use crate::config::NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::component_mut;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::extent::Extent;
use crate::particle::ParticleKind;
use crate::particle::ParticleStore;
use crate::particle::SphParticle;
use crate::quadtree::distance_sqd_to_extent;
use crate::simulation_box::SimulationBox;

/// The three boxes a worker publishes: the tight particle box, the
/// neighbour-reach box (r-box) and the gravity/kernel box (h-box).
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerVolumes {
    pub occupied: bool,
    pub bbox: Extent,
    pub rbox: Extent,
    pub hbox: Extent,
}

pub fn compute_volumes(
    particles: &[SphParticle],
    kern_range: f64,
    ghost_range: f64,
) -> WorkerVolumes {
    let mut h_max = 0.0f64;
    let bbox = Extent::from_positions(
        particles
            .iter()
            .filter(|p| p.is_real())
            .map(|p| &p.pos),
    );
    let Some(bbox) = bbox else {
        return WorkerVolumes::default();
    };
    for particle in particles.iter().filter(|p| p.is_real()) {
        h_max = h_max.max(particle.h);
    }
    WorkerVolumes {
        occupied: true,
        bbox,
        rbox: bbox.grown(ghost_range * kern_range * h_max),
        hbox: bbox.grown(kern_range * h_max),
    }
}

/// All box images under the periodic shifts of the simulation box.
fn periodic_shifts(box_: &SimulationBox) -> Vec<MVec> {
    let mut shifts = vec![MVec::ZERO];
    for axis in 0..NUM_DIMENSIONS {
        if !box_.is_periodic(axis) {
            continue;
        }
        let length = component(&box_.side_lengths(), axis);
        let mut extended = Vec::with_capacity(shifts.len() * 3);
        for shift in &shifts {
            for factor in [-1.0, 0.0, 1.0] {
                let mut image = *shift;
                *component_mut(&mut image, axis) += factor * length;
                extended.push(image);
            }
        }
        shifts = extended;
    }
    shifts
}

fn min_distance_sqd_to_extent(shifts: &[MVec], pos: &MVec, extent: &Extent) -> f64 {
    shifts
        .iter()
        .map(|shift| distance_sqd_to_extent(extent, &(*pos + *shift)))
        .fold(f64::INFINITY, f64::min)
}

fn extents_overlap(shifts: &[MVec], a: &Extent, b: &Extent) -> bool {
    shifts.iter().any(|shift| a.shifted(*shift).overlaps(b))
}

/// One established ghost-exchange pattern: which owned particles go to
/// which peer, and where the received copies sit in the local store.
/// The update pass reuses both without re-deriving them.
pub struct GhostExchange {
    exports: DataByRank<Vec<u32>>,
    incoming: Vec<(Rank, usize, usize)>,
}

impl GhostExchange {
    pub fn empty(size: usize, rank: Rank) -> Self {
        Self {
            exports: DataByRank::from_size_and_rank(size, rank),
            incoming: vec![],
        }
    }

    /// Derive the export sets from the gathered worker volumes, then
    /// run the count and payload collectives and spawn the received
    /// copies as remote ghosts.
    pub fn build(
        store: &mut ParticleStore,
        box_: &SimulationBox,
        kern_range: f64,
        ghost_range: f64,
        volume_comm: &mut Communicator<WorkerVolumes>,
        count_comm: &mut ExchangeCommunicator<u64>,
        payload_comm: &mut ExchangeCommunicator<SphParticle>,
    ) -> Result<Self> {
        let rank = volume_comm.rank();
        let size = volume_comm.size();
        let shifts = periodic_shifts(box_);
        let volumes = compute_volumes(store.all(), kern_range, ghost_range);
        let all_volumes = volume_comm.all_gather(&volumes);

        let mut exports: DataByRank<Vec<u32>> = DataByRank::from_size_and_rank(size, rank);
        for peer in volume_comm.other_ranks() {
            let peer_volumes = &all_volumes[peer as usize];
            if !volumes.occupied || !peer_volumes.occupied {
                continue;
            }
            if !extents_overlap(&shifts, &volumes.rbox, &peer_volumes.hbox) {
                continue;
            }
            for (index, particle) in store.real().iter().enumerate() {
                let reach = ghost_range * kern_range * particle.h;
                if min_distance_sqd_to_extent(&shifts, &particle.pos, &peer_volumes.bbox)
                    <= reach * reach
                {
                    exports.push(peer, index as u32);
                }
            }
        }

        let mut counts: DataByRank<Vec<u64>> = DataByRank::from_size_and_rank(size, rank);
        for peer in count_comm.other_ranks() {
            let count = exports.get(&peer).map(|list| list.len()).unwrap_or(0);
            counts.insert(peer, vec![count as u64]);
        }
        let expected = count_comm.exchange_all(counts);

        let mut payload: DataByRank<Vec<SphParticle>> = DataByRank::from_size_and_rank(size, rank);
        for peer in payload_comm.other_ranks() {
            let particles = exports
                .get(&peer)
                .map(|list| {
                    list.iter()
                        .map(|&index| *store.get(index as usize))
                        .collect()
                })
                .unwrap_or_default();
            payload.insert(peer, particles);
        }
        let mut received = payload_comm.exchange_all(payload);

        let mut incoming = vec![];
        let mut peers: Vec<Rank> = payload_comm.other_ranks();
        peers.sort_unstable();
        for peer in peers {
            let particles = received.remove(&peer).unwrap_or_default();
            let expected_count = expected
                .get(&peer)
                .and_then(|counts| counts.first().copied())
                .unwrap_or(0) as usize;
            if particles.len() != expected_count {
                return Err(Error::CommunicationMismatch(format!(
                    "ghost exchange with rank {peer}: announced {expected_count}, got {}",
                    particles.len()
                )));
            }
            if particles.is_empty() {
                continue;
            }
            let start = store.len();
            for mut particle in particles {
                particle.kind = ParticleKind::RemoteGhost { rank: peer };
                particle.active = false;
                store.push_ghost(particle)?;
            }
            incoming.push((peer, start, store.len() - start));
        }
        Ok(Self { exports, incoming })
    }

    /// Refresh the previously established ghosts with current state.
    /// Same pairs, same buffers, no re-derivation.
    pub fn update(
        &self,
        store: &mut ParticleStore,
        payload_comm: &mut ExchangeCommunicator<SphParticle>,
    ) -> Result<()> {
        let rank = payload_comm.rank();
        let size = payload_comm.size();
        let mut payload: DataByRank<Vec<SphParticle>> = DataByRank::from_size_and_rank(size, rank);
        for peer in payload_comm.other_ranks() {
            let particles = self
                .exports
                .get(&peer)
                .map(|list| {
                    list.iter()
                        .map(|&index| *store.get(index as usize))
                        .collect()
                })
                .unwrap_or_default();
            payload.insert(peer, particles);
        }
        let mut received = payload_comm.exchange_all(payload);
        for &(peer, start, count) in &self.incoming {
            let particles = received.remove(&peer).unwrap_or_default();
            if particles.len() != count {
                return Err(Error::CommunicationMismatch(format!(
                    "ghost update with rank {peer}: expected {count}, got {}",
                    particles.len()
                )));
            }
            for (offset, mut particle) in particles.into_iter().enumerate() {
                particle.kind = ParticleKind::RemoteGhost { rank: peer };
                particle.active = false;
                *store.get_mut(start + offset) = particle;
            }
        }
        Ok(())
    }
}
