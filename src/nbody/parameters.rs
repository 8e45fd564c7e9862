use serde::Deserialize;
use serde::Serialize;

/// The `gravity:` parameter section. Gravity works in code units with
/// G = 1.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GravityParameters {
    /// Self-gravity of the gas and gas–star coupling.
    #[serde(default)]
    pub enabled: bool,
    /// Softening length assigned to newly created star particles;
    /// zero leaves them unsoftened.
    #[serde(default)]
    pub star_softening: f64,
}
