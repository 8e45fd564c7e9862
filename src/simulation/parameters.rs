use serde::Deserialize;
use serde::Serialize;

/// The `simulation:` parameter section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlParameters {
    #[serde(default = "default_final_time")]
    pub final_time: f64,
    /// Seed for initial condition sampling in the driver binary.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_final_time() -> f64 {
    1.0
}

fn default_seed() -> u64 {
    crate::ics::DEFAULT_SEED
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            final_time: default_final_time(),
            seed: default_seed(),
        }
    }
}
