use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::kernel::KernelChoice;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConductivityChoice {
    #[default]
    None,
    Wadsley,
    Price,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimeDependentViscosity {
    #[serde(default = "default_alpha_min")]
    pub alpha_min: f64,
    #[serde(default = "default_alpha_max")]
    pub alpha_max: f64,
    /// Decay timescale factor: τ = h / (decay_constant · c_s).
    #[serde(default = "default_decay_constant")]
    pub decay_constant: f64,
}

fn default_alpha_min() -> f64 {
    0.1
}

fn default_alpha_max() -> f64 {
    2.0
}

fn default_decay_constant() -> f64 {
    0.2
}

impl Default for TimeDependentViscosity {
    fn default() -> Self {
        Self {
            alpha_min: default_alpha_min(),
            alpha_max: default_alpha_max(),
            decay_constant: default_decay_constant(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ViscosityParameters {
    /// Fixed viscosity coefficient; zero disables the dissipation terms
    /// entirely.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Evolve α per particle instead of keeping it fixed.
    #[serde(default)]
    pub time_dependent: Option<TimeDependentViscosity>,
}

fn default_alpha() -> f64 {
    1.0
}

fn default_beta() -> f64 {
    2.0
}

impl Default for ViscosityParameters {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            time_dependent: None,
        }
    }
}

impl ViscosityParameters {
    pub fn enabled(&self) -> bool {
        self.alpha > 0.0 || self.time_dependent.is_some()
    }

    pub fn initial_alpha(&self) -> f64 {
        match &self.time_dependent {
            Some(time_dependent) => time_dependent.alpha_min,
            None => self.alpha,
        }
    }
}

/// The `sph:` parameter section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SphParameters {
    #[serde(default = "default_kernel")]
    pub kernel: KernelChoice,
    #[serde(default)]
    pub tabulated_kernel: bool,
    /// η in h = η (m/ρ)^(1/d).
    #[serde(default = "default_h_fac")]
    pub h_fac: f64,
    /// Relative tolerance of the smoothing length iteration.
    #[serde(default = "default_h_converge")]
    pub h_converge: f64,
    #[serde(default = "default_max_fixed_point_iterations")]
    pub max_fixed_point_iterations: usize,
    /// Lower bound applied to particles inside a sink.
    #[serde(default)]
    pub h_min: f64,
    /// Global ceiling; defaults to half the largest box side.
    #[serde(default)]
    pub h_max: Option<f64>,
    #[serde(default)]
    pub viscosity: ViscosityParameters,
    #[serde(default)]
    pub conductivity: ConductivityChoice,
}

fn default_kernel() -> KernelChoice {
    KernelChoice::M4
}

fn default_h_fac() -> f64 {
    1.2
}

fn default_h_converge() -> f64 {
    1e-3
}

fn default_max_fixed_point_iterations() -> usize {
    30
}

impl Default for SphParameters {
    fn default() -> Self {
        Self {
            kernel: default_kernel(),
            tabulated_kernel: false,
            h_fac: default_h_fac(),
            h_converge: default_h_converge(),
            max_fixed_point_iterations: default_max_fixed_point_iterations(),
            h_min: 0.0,
            h_max: None,
            viscosity: ViscosityParameters::default(),
            conductivity: ConductivityChoice::None,
        }
    }
}

impl SphParameters {
    pub fn validate(&self) -> Result<()> {
        if self.h_fac <= 0.0 {
            return Err(Error::config("sph.h_fac must be positive"));
        }
        if self.h_converge <= 0.0 || self.h_converge >= 1.0 {
            return Err(Error::config("sph.h_converge must lie in (0, 1)"));
        }
        if self.viscosity.alpha < 0.0 || self.viscosity.beta < 0.0 {
            return Err(Error::config("viscosity coefficients must be non-negative"));
        }
        if let Some(time_dependent) = &self.viscosity.time_dependent {
            if time_dependent.alpha_min <= 0.0
                || time_dependent.alpha_max < time_dependent.alpha_min
            {
                return Err(Error::config(
                    "time dependent viscosity requires 0 < alpha_min <= alpha_max",
                ));
            }
        }
        Ok(())
    }
}
