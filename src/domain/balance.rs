use super::partition::PartitionTree;
use crate::communication::CollectiveCommunicator;
use crate::dimension::component;
use crate::error::Error;
use crate::error::Result;
use crate::particle::SphParticle;

/// Computational weight of a particle: proportional to the inverse of
/// its integer step, so frequently updated particles count more.
pub fn particle_work(particle: &SphParticle) -> f64 {
    2f64.powi(particle.level as i32)
}

/// Per-child partial load of one interior node, as communicated between
/// workers: total work and the work-weighted coordinate along the
/// node's split axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeLoad {
    pub work: f64,
    pub weighted_pos: f64,
}

/// Moves the split planes of the partition tree towards work balance.
/// Levels are visited cyclically, bottom up and wrapping to the root,
/// one level per invocation.
pub struct LoadBalancer {
    next_level: Option<usize>,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self { next_level: None }
    }

    fn advance_level(&mut self, depth: usize) -> usize {
        let level = match self.next_level {
            Some(level) if level < depth => level,
            _ => depth - 1,
        };
        self.next_level = Some(if level == 0 { depth - 1 } else { level - 1 });
        level
    }

    pub fn rebalance(
        &mut self,
        tree: &mut PartitionTree,
        particles: &[SphParticle],
        communicator: &mut impl CollectiveCommunicator<NodeLoad>,
    ) -> Result<()> {
        let depth = tree.depth();
        if depth == 0 {
            return Ok(());
        }
        let level = self.advance_level(depth);
        let nodes = tree.interior_nodes_at_level(level);

        // Local partial loads: two entries (lower/upper child) per node.
        let mut partial = vec![NodeLoad::default(); nodes.len() * 2];
        for particle in particles {
            if !particle.is_real() {
                continue;
            }
            let (slot, node) = locate(tree, &particle.pos, level, &nodes);
            let axis = tree.nodes[node].split_axis;
            let entry = &mut partial[slot];
            let work = particle_work(particle);
            entry.work += work;
            entry.weighted_pos += work * component(&particle.pos, axis);
        }

        let gathered = communicator.all_gather_vec(&partial);
        let mut total = vec![NodeLoad::default(); partial.len()];
        for contribution in &gathered {
            if contribution.len() != total.len() {
                return Err(Error::CommunicationMismatch(format!(
                    "load balance counts differ: {} vs {}",
                    contribution.len(),
                    total.len()
                )));
            }
            for (sum, load) in total.iter_mut().zip(contribution) {
                sum.work += load.work;
                sum.weighted_pos += load.weighted_pos;
            }
        }

        for (index, &node) in nodes.iter().enumerate() {
            let lower = total[2 * index];
            let upper = total[2 * index + 1];
            if lower.work == 0.0 || upper.work == 0.0 {
                continue;
            }
            let plane = tree.nodes[node].split_pos;
            let centroid_lower = lower.weighted_pos / lower.work;
            let centroid_upper = upper.weighted_pos / upper.work;
            let spread_lower = plane - centroid_lower;
            let spread_upper = centroid_upper - plane;
            if spread_lower <= 0.0 || spread_upper <= 0.0 {
                continue;
            }
            let gradient = 0.5 * lower.work / spread_lower + 0.5 * upper.work / spread_upper;
            let transfer = 0.5 * (lower.work - upper.work).abs();
            let delta = transfer / gradient;
            let new_plane = if lower.work > upper.work {
                plane - delta
            } else {
                plane + delta
            };
            tree.move_split_plane(node, new_plane);
        }
        Ok(())
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the interior node at `level` above the particle and whether it
/// falls into the lower (even slot) or upper (odd slot) child.
fn locate(
    tree: &PartitionTree,
    pos: &crate::dimension::MVec,
    level: usize,
    nodes: &[usize],
) -> (usize, usize) {
    let mut current = 0usize;
    for _ in 0..level {
        let node = &tree.nodes[current];
        debug_assert!(!node.is_leaf());
        let side = if component(pos, node.split_axis) < node.split_pos {
            0
        } else {
            1
        };
        current = node.children[side] as usize;
    }
    let position = nodes
        .iter()
        .position(|&node| node == current)
        .expect("interior node not found at its level");
    let node = &tree.nodes[current];
    let side = if component(pos, node.split_axis) < node.split_pos {
        0
    } else {
        1
    };
    (2 * position + side, current)
}

#[cfg(test)]
mod tests {
    use super::super::partition::root_extent;
    use super::super::partition::PartitionTree;
    use super::LoadBalancer;
    use crate::communication::build_local_communicators;
    use crate::dimension::MVec;
    use crate::particle::ParticleId;
    use crate::particle::SphParticle;
    use crate::simulation_box::SimulationBox;
    use crate::test_utils::grid_positions;

    fn particles_with_extra_low_side() -> Vec<SphParticle> {
        let mut particles: Vec<_> = grid_positions(8, 8)
            .into_iter()
            .enumerate()
            .map(|(i, pos)| SphParticle::new(ParticleId(i as u64), pos, MVec::ZERO, 1.0, 1.0))
            .collect();
        // Load one corner of the box with finely stepped particles.
        let num = particles.len();
        for (i, particle) in particles.iter_mut().enumerate() {
            if i < num / 4 {
                particle.level = 3;
            }
        }
        particles
    }

    fn imbalance(tree: &PartitionTree, particles: &[SphParticle]) -> f64 {
        let mut work = vec![0.0; tree.num_workers];
        for particle in particles {
            work[tree.rank_of(&particle.pos) as usize] += super::particle_work(particle);
        }
        let max = work.iter().cloned().fold(f64::MIN, f64::max);
        let min = work.iter().cloned().fold(f64::MAX, f64::min);
        max - min
    }

    #[test]
    fn one_rebalance_step_does_not_increase_the_imbalance() {
        let particles = particles_with_extra_low_side();
        let box_ = SimulationBox::cube_from_side_length(10.0);
        let positions: Vec<_> = particles.iter().map(|p| p.pos).collect();
        let mut tree = PartitionTree::build(2, root_extent(&box_), &positions).unwrap();
        let mut communicator = build_local_communicators(1, 0).remove(0);
        let mut balancer = LoadBalancer::new();
        let mut previous = imbalance(&tree, &particles);
        for _ in 0..4 {
            balancer
                .rebalance(&mut tree, &particles, &mut communicator)
                .unwrap();
            let current = imbalance(&tree, &particles);
            assert!(
                current <= previous + 1e-9,
                "imbalance grew from {previous} to {current}"
            );
            previous = current;
        }
    }

    #[test]
    fn balanced_distribution_stays_put() {
        let positions = grid_positions(8, 8);
        let particles: Vec<_> = positions
            .iter()
            .enumerate()
            .map(|(i, pos)| SphParticle::new(ParticleId(i as u64), *pos, MVec::ZERO, 1.0, 1.0))
            .collect();
        let box_ = SimulationBox::cube_from_side_length(10.0);
        let mut tree = PartitionTree::build(2, root_extent(&box_), &positions).unwrap();
        let plane_before = tree.nodes[0].split_pos;
        let mut communicator = build_local_communicators(1, 0).remove(0);
        LoadBalancer::new()
            .rebalance(&mut tree, &particles, &mut communicator)
            .unwrap();
        assert!((tree.nodes[0].split_pos - plane_before).abs() < 1e-9);
    }
}
