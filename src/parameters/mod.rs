use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::DomainParameters;
use crate::eos::EosParameters;
use crate::error::Error;
use crate::error::Result;
use crate::io::OutputParameters;
use crate::nbody::GravityParameters;
use crate::performance_parameters::PerformanceParameters;
use crate::quadtree::QuadTreeConfig;
use crate::simulation::ControlParameters;
use crate::simulation_box::SimulationBox;
use crate::sinks::SinkParameters;
use crate::sph::SphParameters;
use crate::timestep::TimestepParameters;

/// The full configuration of a run, one YAML section per concern.
/// Sections with sensible defaults may be omitted from the file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationParameters {
    #[serde(default)]
    pub simulation: ControlParameters,
    #[serde(default)]
    pub sph: SphParameters,
    #[serde(default)]
    pub eos: EosParameters,
    pub box_size: SimulationBox,
    #[serde(default)]
    pub timestep: TimestepParameters,
    #[serde(default)]
    pub gravity: GravityParameters,
    #[serde(default)]
    pub sinks: SinkParameters,
    #[serde(default)]
    pub domain: DomainParameters,
    #[serde(default)]
    pub tree: QuadTreeConfig,
    #[serde(default)]
    pub performance: PerformanceParameters,
    #[serde(default)]
    pub output: OutputParameters,
}

impl SimulationParameters {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read parameter file {path:?}: {e}"))
        })?;
        Self::from_str(&contents)
    }

    pub fn from_str(contents: &str) -> Result<Self> {
        let parameters: Self = serde_yaml::from_str(contents)
            .map_err(|e| Error::config(format!("failed to parse parameter file: {e}")))?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<()> {
        self.box_size.validate()?;
        self.sph.validate()?;
        self.timestep.validate()?;
        self.domain.validate()?;
        Ok(())
    }

    /// A minimal configuration for tests: a unit periodic box and an
    /// isothermal closure.
    pub fn test_defaults() -> Self {
        Self {
            simulation: ControlParameters::default(),
            sph: SphParameters::default(),
            eos: EosParameters::default(),
            box_size: SimulationBox::cube_from_side_length(1.0),
            timestep: TimestepParameters::default(),
            gravity: GravityParameters::default(),
            sinks: SinkParameters::default(),
            domain: DomainParameters::default(),
            tree: QuadTreeConfig::default(),
            performance: PerformanceParameters::default(),
            output: OutputParameters::default(),
        }
    }
}
