use serde::Deserialize;
use serde::Serialize;

/// Tuning knobs without influence on the results.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerformanceParameters {
    /// Minimum number of particles handed to one rayon work item.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    256
}

impl Default for PerformanceParameters {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}
