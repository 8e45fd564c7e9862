use super::partition::PartitionTree;
use crate::communication::DataByRank;
use crate::communication::Rank;
use crate::communication::SizedCommunicator;
use crate::communication::WorldCommunicator;
use crate::particle::ParticleStore;
use crate::particle::SphParticle;

/// Partner of `rank` in round `round` of the migration tournament.
/// With a power-of-two worker count the XOR pairing visits every pair
/// exactly once and no two exchanges contend for the same worker in the
/// same round.
pub fn tournament_partner(rank: Rank, round: usize) -> Rank {
    rank ^ round as Rank
}

/// Ship every real particle that left this worker's domain box to its
/// new owner. Must run while no ghosts are present.
pub fn exchange_particles<C>(
    store: &mut ParticleStore,
    tree: &PartitionTree,
    communicator: &mut C,
) -> usize
where
    C: WorldCommunicator<SphParticle> + SizedCommunicator,
{
    assert_eq!(store.num_ghosts(), 0);
    let rank = communicator.rank();
    let size = communicator.size();

    let mut leaving_indices: Vec<usize> = vec![];
    for (index, particle) in store.real().iter().enumerate() {
        if tree.rank_of(&particle.pos) != rank {
            leaving_indices.push(index);
        }
    }
    let leavers = store.remove_reals(&mut leaving_indices);
    let num_sent = leavers.len();
    let mut outgoing: DataByRank<Vec<SphParticle>> = DataByRank::from_size_and_rank(size, rank);
    for particle in leavers {
        outgoing.push(tree.rank_of(&particle.pos), particle);
    }

    let mut num_received = 0;
    for round in 1..size {
        let partner = tournament_partner(rank, round);
        debug_assert!((partner as usize) < size);
        let data = outgoing.remove(&partner).unwrap_or_default();
        communicator.send_vec(partner, data);
        for particle in communicator.receive_vec(partner) {
            debug_assert_eq!(tree.rank_of(&particle.pos), rank);
            store.push_real(particle);
            num_received += 1;
        }
    }
    num_sent + num_received
}
