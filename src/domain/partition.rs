use crate::communication::Rank;
use crate::config::NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::component_mut;
use crate::dimension::widest_axis;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::extent::Extent;
use crate::simulation_box::SimulationBox;

/// Plain node record; the whole tree is broadcast as an array of these.
#[derive(Clone, Copy, Debug)]
pub struct PartitionNode {
    pub extent: Extent,
    pub split_axis: usize,
    pub split_pos: f64,
    /// Indices of the lower/upper children, -1 for leaves.
    pub children: [i32; 2],
    /// Worker owning this leaf, -1 for interior nodes.
    pub leaf_rank: Rank,
}

impl PartitionNode {
    fn leaf(extent: Extent) -> Self {
        Self {
            extent,
            split_axis: 0,
            split_pos: 0.0,
            children: [-1, -1],
            leaf_rank: -1,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children[0] < 0
    }
}

/// The binary partition of space onto workers: a complete binary tree
/// of depth log2(N_worker), replicated identically on every worker.
/// Boxes along open boundaries extend to infinity.
#[derive(Clone, Debug, Default)]
pub struct PartitionTree {
    pub nodes: Vec<PartitionNode>,
    pub num_workers: usize,
}

/// The root box: the simulation box on closed axes, unbounded on open
/// axes.
pub fn root_extent(box_: &SimulationBox) -> Extent {
    let mut extent = box_.extent();
    for axis in 0..NUM_DIMENSIONS {
        if box_.kind(axis, crate::simulation_box::BoundarySide::Lower)
            == crate::simulation_box::BoundaryKind::Open
        {
            *component_mut(&mut extent.min, axis) = f64::NEG_INFINITY;
        }
        if box_.kind(axis, crate::simulation_box::BoundarySide::Upper)
            == crate::simulation_box::BoundaryKind::Open
        {
            *component_mut(&mut extent.max, axis) = f64::INFINITY;
        }
    }
    extent
}

impl PartitionTree {
    /// Build the tree over the given positions with equal weights,
    /// splitting at the median along the axis of widest spread. A
    /// non-finite position is rejected up front: the median sort has no
    /// meaningful order for it, and letting it through would hand every
    /// worker a corrupted replica of the tree.
    pub fn build(num_workers: usize, root: Extent, positions: &[MVec]) -> Result<Self> {
        assert!(num_workers.is_power_of_two());
        if !positions.iter().all(|pos| pos.is_finite()) {
            return Err(Error::NonFinitePosition {
                stage: "domain decomposition",
            });
        }
        let mut tree = Self {
            nodes: vec![PartitionNode::leaf(root)],
            num_workers,
        };
        let mut positions: Vec<MVec> = positions.to_vec();
        let mut next_rank = 0;
        tree.split_node(0, &mut positions, num_workers, &mut next_rank);
        debug_assert_eq!(next_rank as usize, num_workers);
        Ok(tree)
    }

    fn split_node(
        &mut self,
        node: usize,
        positions: &mut [MVec],
        workers: usize,
        next_rank: &mut Rank,
    ) {
        if workers == 1 {
            self.nodes[node].leaf_rank = *next_rank;
            *next_rank += 1;
            return;
        }
        let extent = self.nodes[node].extent;
        let spread = Extent::from_positions(positions.iter())
            .map(|e| e.side_lengths())
            .unwrap_or(MVec::ZERO);
        let axis = widest_axis(&spread);
        let mid = positions.len() / 2;
        if !positions.is_empty() {
            positions
                .sort_unstable_by(|a, b| component(a, axis).total_cmp(&component(b, axis)));
        }
        let split_pos = if positions.is_empty() {
            0.5 * (component(&extent.min, axis) + component(&extent.max, axis))
        } else if mid == 0 {
            component(&positions[0], axis)
        } else {
            0.5 * (component(&positions[mid - 1], axis) + component(&positions[mid], axis))
        };

        let mut lower_extent = extent;
        *component_mut(&mut lower_extent.max, axis) = split_pos;
        let mut upper_extent = extent;
        *component_mut(&mut upper_extent.min, axis) = split_pos;

        let lower = self.nodes.len();
        self.nodes.push(PartitionNode::leaf(lower_extent));
        let upper = self.nodes.len();
        self.nodes.push(PartitionNode::leaf(upper_extent));
        {
            let parent = &mut self.nodes[node];
            parent.split_axis = axis;
            parent.split_pos = split_pos;
            parent.children = [lower as i32, upper as i32];
        }
        let (lower_positions, upper_positions) = positions.split_at_mut(mid);
        self.split_node(lower, lower_positions, workers / 2, next_rank);
        self.split_node(upper, upper_positions, workers / 2, next_rank);
    }

    pub fn rank_of(&self, pos: &MVec) -> Rank {
        let mut node = &self.nodes[0];
        loop {
            if node.is_leaf() {
                return node.leaf_rank;
            }
            let side = if component(pos, node.split_axis) < node.split_pos {
                0
            } else {
                1
            };
            node = &self.nodes[node.children[side] as usize];
        }
    }

    pub fn extent_of(&self, rank: Rank) -> Extent {
        self.nodes
            .iter()
            .find(|node| node.leaf_rank == rank)
            .map(|node| node.extent)
            .expect("rank not present in partition tree")
    }

    /// Interior node indices at a given depth (root = 0).
    pub fn interior_nodes_at_level(&self, level: usize) -> Vec<usize> {
        let mut result = vec![];
        self.collect_at_level(0, 0, level, &mut result);
        result
    }

    fn collect_at_level(
        &self,
        node: usize,
        depth: usize,
        target: usize,
        result: &mut Vec<usize>,
    ) {
        if self.nodes[node].is_leaf() {
            return;
        }
        if depth == target {
            result.push(node);
            return;
        }
        for child in self.nodes[node].children {
            self.collect_at_level(child as usize, depth + 1, target, result);
        }
    }

    pub fn depth(&self) -> usize {
        (self.num_workers as f64).log2().round() as usize
    }

    /// Subtree membership test used when accumulating work sums.
    pub fn subtree_contains(&self, node: usize, pos: &MVec) -> bool {
        let mut current = 0;
        loop {
            if current == node {
                return true;
            }
            let n = &self.nodes[current];
            if n.is_leaf() {
                return false;
            }
            let side = if component(pos, n.split_axis) < n.split_pos {
                0
            } else {
                1
            };
            current = n.children[side] as usize;
        }
    }

    /// Move a split plane and push the new boundary down to the leaves.
    pub fn move_split_plane(&mut self, node: usize, new_pos: f64) {
        let axis = self.nodes[node].split_axis;
        let extent = self.nodes[node].extent;
        let min = component(&extent.min, axis);
        let max = component(&extent.max, axis);
        // Keep a sliver of either child alive.
        let margin = 1e-10 * (max - min).min(f64::MAX);
        let new_pos = if min.is_finite() && max.is_finite() {
            new_pos.clamp(min + margin, max - margin)
        } else {
            new_pos
        };
        self.nodes[node].split_pos = new_pos;
        let [lower, upper] = self.nodes[node].children;
        self.clip_subtree(lower as usize, axis, new_pos, false);
        self.clip_subtree(upper as usize, axis, new_pos, true);
    }

    fn clip_subtree(&mut self, node: usize, axis: usize, plane: f64, is_lower_bound: bool) {
        {
            let extent = &mut self.nodes[node].extent;
            if is_lower_bound {
                *component_mut(&mut extent.min, axis) = plane;
            } else {
                *component_mut(&mut extent.max, axis) = plane;
            }
        }
        if self.nodes[node].is_leaf() {
            return;
        }
        // A descendant split along the same axis may now lie outside
        // its shrunken box; pull it back inside.
        if self.nodes[node].split_axis == axis {
            let min = component(&self.nodes[node].extent.min, axis);
            let max = component(&self.nodes[node].extent.max, axis);
            if min.is_finite() && max.is_finite() {
                self.nodes[node].split_pos = self.nodes[node].split_pos.clamp(min, max);
            }
        }
        let [lower, upper] = self.nodes[node].children;
        self.clip_subtree(lower as usize, axis, plane, is_lower_bound);
        self.clip_subtree(upper as usize, axis, plane, is_lower_bound);
    }
}

#[cfg(test)]
mod tests {
    use super::root_extent;
    use super::PartitionTree;
    use crate::dimension::component_mut;
    use crate::simulation_box::BoundaryKind;
    use crate::simulation_box::SimulationBox;
    use crate::test_utils::grid_positions;

    #[test]
    fn leaves_match_worker_count_and_split_particles_evenly() {
        let positions = grid_positions(8, 8);
        let box_ = SimulationBox::cube_from_side_length(10.0);
        for num_workers in [1, 2, 4, 8] {
            let tree = PartitionTree::build(num_workers, root_extent(&box_), &positions).unwrap();
            let mut counts = vec![0usize; num_workers];
            for pos in &positions {
                counts[tree.rank_of(pos) as usize] += 1;
            }
            let expected = positions.len() / num_workers;
            for count in counts {
                assert!(
                    count.abs_diff(expected) <= num_workers,
                    "count {count} vs expected {expected}"
                );
            }
        }
    }

    #[test]
    fn open_boundaries_use_infinite_sentinels() {
        let mut box_ = SimulationBox::cube_from_side_length(1.0);
        box_.boundaries[0].lower = BoundaryKind::Open;
        box_.boundaries[0].upper = BoundaryKind::Open;
        let root = root_extent(&box_);
        assert!(crate::dimension::component(&root.min, 0).is_infinite());
        assert!(crate::dimension::component(&root.max, 0).is_infinite());
        // Positions far outside the box still map to some worker.
        let positions = grid_positions(4, 4);
        let tree = PartitionTree::build(4, root, &positions).unwrap();
        let mut far = positions[0];
        *component_mut(&mut far, 0) = -1e12;
        let rank = tree.rank_of(&far);
        assert!(rank >= 0 && rank < 4);
    }

    #[test]
    fn moving_a_split_plane_moves_particles_between_workers() {
        let positions = grid_positions(8, 8);
        let box_ = SimulationBox::cube_from_side_length(10.0);
        let tree = PartitionTree::build(2, root_extent(&box_), &positions).unwrap();
        let count = |tree: &PartitionTree| {
            let mut counts = vec![0usize; 2];
            for pos in &positions {
                counts[tree.rank_of(pos) as usize] += 1;
            }
            counts
        };
        let before = count(&tree);
        let mut moved = tree.clone();
        moved.move_split_plane(0, moved.nodes[0].split_pos + 1.0);
        let after = count(&moved);
        assert!(after[0] > before[0]);
        assert_eq!(after[0] + after[1], before[0] + before[1]);
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let mut positions = grid_positions(4, 4);
        *component_mut(&mut positions[3], 0) = f64::NAN;
        let box_ = SimulationBox::cube_from_side_length(10.0);
        assert!(PartitionTree::build(2, root_extent(&box_), &positions).is_err());
    }

    #[test]
    fn subtree_contains_agrees_with_rank_of() {
        let positions = grid_positions(6, 6);
        let box_ = SimulationBox::cube_from_side_length(10.0);
        let tree = PartitionTree::build(4, root_extent(&box_), &positions).unwrap();
        for pos in &positions {
            let rank = tree.rank_of(pos);
            let leaf = tree
                .nodes
                .iter()
                .position(|node| node.leaf_rank == rank)
                .unwrap();
            assert!(tree.subtree_contains(leaf, pos));
        }
    }
}
