use crate::dimension::MVec;
use crate::extent::Extent;
use crate::particle::SphParticle;
use crate::quadtree::LeafDataType;
use crate::quadtree::NodeAggregate;
use crate::quadtree::QuadTree;
use crate::quadtree::QuadTreeConfig;
use crate::quadtree::SearchCriterion;

/// Leaf payload of the neighbour tree: the particle's slot in the store
/// (real and ghost sections alike) plus the state the searches need.
#[derive(Clone, Debug)]
pub struct SphLeaf {
    pub index: u32,
    pub pos: MVec,
    pub h: f64,
}

impl LeafDataType for SphLeaf {
    fn pos(&self) -> &MVec {
        &self.pos
    }
}

/// Largest smoothing length below a node, so scatter neighbours are
/// found even when their kernels are much larger than the query radius.
#[derive(Debug, Default)]
pub struct HMaxData {
    pub h_max: f64,
}

impl NodeAggregate<SphLeaf> for HMaxData {
    fn update_with(&mut self, leaf: &SphLeaf) {
        self.h_max = self.h_max.max(leaf.h);
    }
}

pub type NeighbourTree = QuadTree<HMaxData, SphLeaf>;

pub fn build_neighbour_tree(particles: &[SphParticle], config: &QuadTreeConfig) -> NeighbourTree {
    let leaves: Vec<_> = particles
        .iter()
        .enumerate()
        .map(|(index, particle)| SphLeaf {
            index: index as u32,
            pos: particle.pos,
            h: particle.h,
        })
        .collect();
    let extent = Extent::from_positions(leaves.iter().map(|leaf| &leaf.pos))
        .unwrap_or_else(|| Extent::cube_from_side_length(1.0));
    QuadTree::new(config, leaves, &extent)
}

/// Force neighbours: everything within R_k·h_i of the position (gather)
/// plus everything whose own kernel reaches it (scatter).
pub struct ScatterGatherSearch {
    pub pos: MVec,
    pub h: f64,
    pub kern_range: f64,
}

impl SearchCriterion<HMaxData, SphLeaf> for ScatterGatherSearch {
    fn should_visit_node(&self, tree: &NeighbourTree) -> bool {
        let reach = (self.kern_range * self.h).max(self.kern_range * tree.data.h_max);
        crate::quadtree::distance_sqd_to_extent(&tree.extent, &self.pos) <= reach * reach
    }

    fn should_include_leaf(&self, leaf: &SphLeaf) -> bool {
        let reach = (self.kern_range * self.h).max(self.kern_range * leaf.h);
        leaf.pos.distance_squared(self.pos) < reach * reach
    }
}

pub fn force_neighbours(tree: &NeighbourTree, pos: &MVec, h: f64, kern_range: f64) -> Vec<u32> {
    tree.search(&ScatterGatherSearch {
        pos: *pos,
        h,
        kern_range,
    })
    .into_iter()
    .map(|leaf| leaf.index)
    .collect()
}
