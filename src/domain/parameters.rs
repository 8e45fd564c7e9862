use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// The `domain:` parameter section, covering decomposition, migration
/// and ghost handling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainParameters {
    /// How many coarse steps pass between load balancing passes.
    #[serde(default = "default_rebalance_interval")]
    pub rebalance_interval: u64,
    /// Preallocated ghost slots per worker; default scales with the
    /// local particle count.
    #[serde(default)]
    pub ghost_capacity: Option<usize>,
    /// Safety factor on the kernel reach used for ghost creation and
    /// export decisions.
    #[serde(default = "default_ghost_range")]
    pub ghost_range: f64,
}

fn default_rebalance_interval() -> u64 {
    8
}

fn default_ghost_range() -> f64 {
    1.1
}

impl Default for DomainParameters {
    fn default() -> Self {
        Self {
            rebalance_interval: default_rebalance_interval(),
            ghost_capacity: None,
            ghost_range: default_ghost_range(),
        }
    }
}

impl DomainParameters {
    pub fn validate(&self) -> Result<()> {
        if self.rebalance_interval == 0 {
            return Err(Error::config("domain.rebalance_interval must be positive"));
        }
        if self.ghost_range < 1.0 {
            return Err(Error::config("domain.ghost_range must be at least 1"));
        }
        Ok(())
    }

    pub fn ghost_capacity_for(&self, num_local: usize) -> usize {
        self.ghost_capacity.unwrap_or(8 * num_local + 4096)
    }
}
