use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuadTreeConfig {
    #[serde(default = "default_min_depth")]
    pub min_depth: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_num_particles_per_leaf")]
    pub max_num_particles_per_leaf: usize,
}

fn default_min_depth() -> usize {
    0
}

fn default_max_depth() -> usize {
    20
}

fn default_max_num_particles_per_leaf() -> usize {
    8
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            min_depth: default_min_depth(),
            max_depth: default_max_depth(),
            max_num_particles_per_leaf: default_max_num_particles_per_leaf(),
        }
    }
}
