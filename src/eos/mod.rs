use serde::Deserialize;
use serde::Serialize;

use crate::particle::SphParticle;

/// Thermodynamic closure queried by the SPH engine after every density
/// update. Works in code units with k_B/m_H = 1, so temperatures and
/// specific energies differ only by the molecular weight factor.
pub trait EquationOfState: Send + Sync {
    fn gamma(&self) -> f64;
    fn pressure(&self, particle: &SphParticle) -> f64;
    fn sound_speed(&self, particle: &SphParticle) -> f64;
    fn specific_internal_energy(&self, particle: &SphParticle) -> f64;
    fn temperature(&self, particle: &SphParticle) -> f64;

    fn entropic_function(&self, particle: &SphParticle) -> f64 {
        self.pressure(particle) / particle.density.powf(self.gamma())
    }

    /// Whether the closure determines u from ρ (so the energy equation
    /// is not integrated).
    fn fixes_internal_energy(&self) -> bool {
        true
    }
}

fn default_gamma() -> f64 {
    5.0 / 3.0
}

fn default_mu_bar() -> f64 {
    1.0
}

/// The `eos:` parameter section. Builds the closure object consumed by
/// the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EosParameters {
    Isothermal {
        temp0: f64,
        #[serde(default = "default_mu_bar")]
        mu_bar: f64,
        #[serde(default = "default_gamma")]
        gamma: f64,
    },
    Barotropic {
        temp0: f64,
        rho_bary: f64,
        #[serde(default = "default_mu_bar")]
        mu_bar: f64,
        #[serde(default = "default_gamma")]
        gamma: f64,
    },
    Adiabatic {
        #[serde(default = "default_mu_bar")]
        mu_bar: f64,
        #[serde(default = "default_gamma")]
        gamma: f64,
    },
}

impl Default for EosParameters {
    fn default() -> Self {
        Self::Isothermal {
            temp0: 1.0,
            mu_bar: 1.0,
            gamma: default_gamma(),
        }
    }
}

impl EosParameters {
    pub fn build(&self) -> Box<dyn EquationOfState> {
        match *self {
            Self::Isothermal {
                temp0,
                mu_bar,
                gamma,
            } => Box::new(Isothermal {
                temp0,
                mu_bar,
                gamma,
            }),
            Self::Barotropic {
                temp0,
                rho_bary,
                mu_bar,
                gamma,
            } => Box::new(Barotropic {
                temp0,
                rho_bary,
                mu_bar,
                gamma,
            }),
            Self::Adiabatic { mu_bar, gamma } => Box::new(Adiabatic { mu_bar, gamma }),
        }
    }
}

/// P = (γ−1)ρu with u pinned to the reference temperature.
pub struct Isothermal {
    pub temp0: f64,
    pub mu_bar: f64,
    pub gamma: f64,
}

impl EquationOfState for Isothermal {
    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn pressure(&self, particle: &SphParticle) -> f64 {
        (self.gamma - 1.0) * particle.density * self.specific_internal_energy(particle)
    }

    fn sound_speed(&self, _particle: &SphParticle) -> f64 {
        (self.temp0 / self.mu_bar).sqrt()
    }

    fn specific_internal_energy(&self, _particle: &SphParticle) -> f64 {
        self.temp0 / ((self.gamma - 1.0) * self.mu_bar)
    }

    fn temperature(&self, _particle: &SphParticle) -> f64 {
        self.temp0
    }
}

/// Isothermal at low density, stiffening towards adiabatic above
/// ρ_bary: T(ρ) = T₀·(1 + (ρ/ρ_bary)^(γ−1)).
pub struct Barotropic {
    pub temp0: f64,
    pub rho_bary: f64,
    pub mu_bar: f64,
    pub gamma: f64,
}

impl Barotropic {
    fn stiffening(&self, density: f64) -> f64 {
        1.0 + (density / self.rho_bary).powf(self.gamma - 1.0)
    }
}

impl EquationOfState for Barotropic {
    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn pressure(&self, particle: &SphParticle) -> f64 {
        (self.gamma - 1.0) * particle.density * self.specific_internal_energy(particle)
    }

    fn sound_speed(&self, particle: &SphParticle) -> f64 {
        (self.temperature(particle) / self.mu_bar).sqrt()
    }

    fn specific_internal_energy(&self, particle: &SphParticle) -> f64 {
        self.temperature(particle) / ((self.gamma - 1.0) * self.mu_bar)
    }

    fn temperature(&self, particle: &SphParticle) -> f64 {
        self.temp0 * self.stiffening(particle.density)
    }
}

/// P = (γ−1)ρu with u integrated by the energy equation.
pub struct Adiabatic {
    pub mu_bar: f64,
    pub gamma: f64,
}

impl EquationOfState for Adiabatic {
    fn gamma(&self) -> f64 {
        self.gamma
    }

    fn pressure(&self, particle: &SphParticle) -> f64 {
        (self.gamma - 1.0) * particle.density * particle.internal_energy
    }

    fn sound_speed(&self, particle: &SphParticle) -> f64 {
        (self.gamma * (self.gamma - 1.0) * particle.internal_energy).sqrt()
    }

    fn specific_internal_energy(&self, particle: &SphParticle) -> f64 {
        particle.internal_energy
    }

    fn temperature(&self, particle: &SphParticle) -> f64 {
        (self.gamma - 1.0) * self.mu_bar * particle.internal_energy
    }

    fn fixes_internal_energy(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::EosParameters;
    use crate::dimension::MVec;
    use crate::particle::ParticleId;
    use crate::particle::SphParticle;
    use crate::test_utils::assert_float_is_close;

    fn particle_with_density(density: f64) -> SphParticle {
        let mut p = SphParticle::new(ParticleId(0), MVec::ZERO, MVec::ZERO, 1.0, 1.5);
        p.density = density;
        p
    }

    #[test]
    fn isothermal_pressure_is_linear_in_density() {
        let eos = EosParameters::Isothermal {
            temp0: 2.0,
            mu_bar: 1.0,
            gamma: 5.0 / 3.0,
        }
        .build();
        let p1 = eos.pressure(&particle_with_density(1.0));
        let p2 = eos.pressure(&particle_with_density(2.0));
        assert_float_is_close(p2, 2.0 * p1);
        assert_float_is_close(p1, 2.0);
    }

    #[test]
    fn barotropic_limits() {
        let eos = EosParameters::Barotropic {
            temp0: 1.0,
            rho_bary: 1e3,
            mu_bar: 1.0,
            gamma: 7.0 / 5.0,
        }
        .build();
        // Far below the transition the closure is isothermal.
        let low = particle_with_density(1e-3);
        assert!((eos.temperature(&low) - 1.0).abs() < 1e-2);
        // Far above, T grows as ρ^(γ−1).
        let high1 = particle_with_density(1e6);
        let high2 = particle_with_density(2e6);
        let ratio = eos.temperature(&high2) / eos.temperature(&high1);
        assert!((ratio - 2f64.powf(0.4)).abs() < 1e-3);
    }

    #[test]
    fn adiabatic_uses_the_particle_energy() {
        let eos = EosParameters::Adiabatic {
            mu_bar: 1.0,
            gamma: 5.0 / 3.0,
        }
        .build();
        let p = particle_with_density(2.0);
        assert_float_is_close(eos.pressure(&p), (5.0 / 3.0 - 1.0) * 2.0 * 1.5);
        assert!(!eos.fixes_internal_energy());
    }

    #[test]
    fn entropic_function_is_pressure_over_density_to_gamma() {
        let eos = EosParameters::Adiabatic {
            mu_bar: 1.0,
            gamma: 5.0 / 3.0,
        }
        .build();
        let p = particle_with_density(2.0);
        assert_float_is_close(
            eos.entropic_function(&p),
            eos.pressure(&p) / 2f64.powf(5.0 / 3.0),
        );
    }
}
