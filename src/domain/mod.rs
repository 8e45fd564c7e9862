mod balance;
mod ghost_exchange;
mod migration;
mod parameters;
mod partition;

pub use balance::particle_work;
pub use balance::LoadBalancer;
pub use balance::NodeLoad;
pub use ghost_exchange::compute_volumes;
pub use ghost_exchange::GhostExchange;
pub use ghost_exchange::WorkerVolumes;
pub use migration::exchange_particles;
pub use migration::tournament_partner;
pub use parameters::DomainParameters;
pub use partition::root_extent;
pub use partition::PartitionNode;
pub use partition::PartitionTree;

use crate::communication::CollectiveCommunicator;
use crate::communication::Communicator;
use crate::communication::SizedCommunicator;
use crate::error::Result;
use crate::particle::ParticleStore;
use crate::particle::SphParticle;
use crate::simulation_box::SimulationBox;

/// The replicated decomposition state of one worker: the shared
/// partition tree plus the cyclic load balancing schedule.
pub struct DomainDecomposition {
    pub tree: PartitionTree,
    balancer: LoadBalancer,
}

impl DomainDecomposition {
    /// Initial decomposition: the main rank builds the tree over all
    /// particles with equal weight, every worker receives the identical
    /// array of nodes, and the particles are shipped to their owners.
    pub fn build_initial(
        store: &mut ParticleStore,
        box_: &SimulationBox,
        node_comm: &mut Communicator<PartitionNode>,
        particle_comm: &mut Communicator<SphParticle>,
    ) -> Result<Self> {
        let num_workers = node_comm.size();
        let nodes = if node_comm.rank() == 0 {
            let positions: Vec<_> = store.real().iter().map(|p| p.pos).collect();
            PartitionTree::build(num_workers, root_extent(box_), &positions)?.nodes
        } else {
            vec![]
        };
        let gathered = node_comm.all_gather_vec(&nodes);
        let tree = PartitionTree {
            nodes: gathered[0].clone(),
            num_workers,
        };
        exchange_particles(store, &tree, particle_comm);
        Ok(Self {
            tree,
            balancer: LoadBalancer::new(),
        })
    }

    /// One load balancing step followed by the migration of every
    /// particle that changed sides.
    pub fn rebalance(
        &mut self,
        store: &mut ParticleStore,
        load_comm: &mut Communicator<NodeLoad>,
        particle_comm: &mut Communicator<SphParticle>,
    ) -> Result<usize> {
        self.balancer
            .rebalance(&mut self.tree, store.real(), load_comm)?;
        Ok(exchange_particles(store, &self.tree, particle_comm))
    }
}
