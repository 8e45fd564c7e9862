use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

/// The `timestep:` parameter section: the global block step and the
/// per-criterion safety factors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimestepParameters {
    #[serde(default = "default_max_timestep")]
    pub max_timestep: f64,
    /// Number of block step levels; level i runs at max_timestep/2^i.
    #[serde(default = "default_num_levels")]
    pub num_levels: usize,
    #[serde(default = "default_courant_factor")]
    pub courant_factor: f64,
    #[serde(default = "default_accel_factor")]
    pub accel_factor: f64,
    #[serde(default = "default_energy_factor")]
    pub energy_factor: f64,
    /// Maximum allowed level difference between interacting particles.
    #[serde(default = "default_level_diff_max")]
    pub level_diff_max: u8,
}

fn default_max_timestep() -> f64 {
    0.01
}

fn default_num_levels() -> usize {
    1
}

fn default_courant_factor() -> f64 {
    0.2
}

fn default_accel_factor() -> f64 {
    0.4
}

fn default_energy_factor() -> f64 {
    0.5
}

fn default_level_diff_max() -> u8 {
    1
}

impl Default for TimestepParameters {
    fn default() -> Self {
        Self {
            max_timestep: default_max_timestep(),
            num_levels: default_num_levels(),
            courant_factor: default_courant_factor(),
            accel_factor: default_accel_factor(),
            energy_factor: default_energy_factor(),
            level_diff_max: default_level_diff_max(),
        }
    }
}

impl TimestepParameters {
    pub fn validate(&self) -> Result<()> {
        if self.max_timestep <= 0.0 {
            return Err(Error::config("timestep.max_timestep must be positive"));
        }
        if self.num_levels == 0 || self.num_levels > 20 {
            return Err(Error::config("timestep.num_levels must lie in 1..=20"));
        }
        if self.courant_factor <= 0.0 || self.accel_factor <= 0.0 || self.energy_factor <= 0.0 {
            return Err(Error::config("timestep safety factors must be positive"));
        }
        Ok(())
    }
}
