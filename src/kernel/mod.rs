mod cubic_spline;
mod gaussian;
mod quintic;
mod tabulated;

pub use cubic_spline::CubicSpline;
pub use gaussian::Gaussian;
pub use quintic::QuinticSpline;
use serde::Deserialize;
use serde::Serialize;
pub use tabulated::GravityTable;
pub use tabulated::Tabulated;

use crate::config::NUM_DIMENSIONS;

/// The dimensionless shape of a smoothing kernel as a function of
/// s = r/h.
///
/// `w0` must vanish for s ≥ `range` and be monotone non-increasing;
/// `w1` is its derivative with respect to s. The normalisation depends
/// on the compiled dimension and is kept separate from the shape so
/// that tables and gravity integrals can share it.
pub trait KernelShape {
    fn range(&self) -> f64;
    fn norm(&self) -> f64;
    fn w0(&self, s: f64) -> f64;
    fn w1(&self, s: f64) -> f64;

    fn range_sqd(&self) -> f64 {
        self.range() * self.range()
    }

    /// The h-derivative factor: ∂W/∂h = norm/h^(d+1) · w_omega(s).
    fn w_omega(&self, s: f64) -> f64 {
        -(NUM_DIMENSIONS as f64) * self.w0(s) - s * self.w1(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelChoice {
    M4,
    Quintic,
    Gaussian,
}

/// The kernel catalogue. All evaluations dispatch through this enum so
/// the hot loops stay free of virtual calls.
///
/// Gravitational softening profiles (`w_grav`, `w_pot`, `w_zeta`) are
/// analytic for the M4 spline and produced by numerically integrated
/// tables for the other shapes.
#[derive(Clone, Debug)]
pub enum Kernel {
    CubicSpline(CubicSpline),
    QuinticSpline(QuinticSpline),
    Gaussian(Gaussian),
    Tabulated(Tabulated),
}

impl Kernel {
    pub fn new(choice: KernelChoice, tabulated: bool) -> Self {
        if tabulated {
            return Self::Tabulated(match choice {
                KernelChoice::M4 => Tabulated::from_shape(CubicSpline),
                KernelChoice::Quintic => Tabulated::from_shape(QuinticSpline::new()),
                KernelChoice::Gaussian => Tabulated::from_shape(Gaussian::new()),
            });
        }
        match choice {
            KernelChoice::M4 => Self::CubicSpline(CubicSpline),
            KernelChoice::Quintic => Self::QuinticSpline(QuinticSpline::new()),
            KernelChoice::Gaussian => Self::Gaussian(Gaussian::new()),
        }
    }

    pub fn range(&self) -> f64 {
        match self {
            Self::CubicSpline(k) => k.range(),
            Self::QuinticSpline(k) => k.range(),
            Self::Gaussian(k) => k.range(),
            Self::Tabulated(k) => k.range(),
        }
    }

    pub fn range_sqd(&self) -> f64 {
        self.range() * self.range()
    }

    pub fn norm(&self) -> f64 {
        match self {
            Self::CubicSpline(k) => k.norm(),
            Self::QuinticSpline(k) => k.norm(),
            Self::Gaussian(k) => k.norm(),
            Self::Tabulated(k) => k.norm(),
        }
    }

    pub fn w0(&self, s: f64) -> f64 {
        match self {
            Self::CubicSpline(k) => k.w0(s),
            Self::QuinticSpline(k) => k.w0(s),
            Self::Gaussian(k) => k.w0(s),
            Self::Tabulated(k) => k.w0_s2(s * s),
        }
    }

    pub fn w0_s2(&self, s2: f64) -> f64 {
        match self {
            Self::Tabulated(k) => k.w0_s2(s2),
            _ => self.w0(s2.sqrt()),
        }
    }

    pub fn w1(&self, s: f64) -> f64 {
        match self {
            Self::CubicSpline(k) => k.w1(s),
            Self::QuinticSpline(k) => k.w1(s),
            Self::Gaussian(k) => k.w1(s),
            Self::Tabulated(k) => k.w1(s),
        }
    }

    pub fn w_omega(&self, s: f64) -> f64 {
        match self {
            Self::CubicSpline(k) => k.w_omega(s),
            Self::QuinticSpline(k) => k.w_omega(s),
            Self::Gaussian(k) => k.w_omega(s),
            Self::Tabulated(k) => k.w_omega(s),
        }
    }

    pub fn w_omega_s2(&self, s2: f64) -> f64 {
        self.w_omega(s2.sqrt())
    }

    /// Softened radial acceleration factor: the pull of a unit mass at
    /// kernel-scaled distance s is w_grav(s)/h². Reduces to 1/s² beyond
    /// the kernel range.
    pub fn w_grav(&self, s: f64) -> f64 {
        match self {
            Self::CubicSpline(k) => k.w_grav(s),
            Self::QuinticSpline(k) => k.gravity().w_grav(s),
            Self::Gaussian(k) => k.gravity().w_grav(s),
            Self::Tabulated(k) => k.gravity().w_grav(s),
        }
    }

    /// Softened potential factor: φ of a unit mass is −w_pot(s)/h.
    /// Reduces to 1/s beyond the kernel range.
    pub fn w_pot(&self, s: f64) -> f64 {
        match self {
            Self::CubicSpline(k) => k.w_pot(s),
            Self::QuinticSpline(k) => k.gravity().w_pot(s),
            Self::Gaussian(k) => k.gravity().w_pot(s),
            Self::Tabulated(k) => k.gravity().w_pot(s),
        }
    }

    /// h-derivative of the softened potential: ∂φ/∂h = w_zeta(s)/h².
    /// Identically w_pot − s·w_grav, which vanishes beyond the range.
    pub fn w_zeta(&self, s: f64) -> f64 {
        self.w_pot(s) - s * self.w_grav(s)
    }

    pub fn w_zeta_s2(&self, s2: f64) -> f64 {
        self.w_zeta(s2.sqrt())
    }

    /// W(r, h) = norm/h^d · w0(r/h)
    pub fn value(&self, r: f64, h: f64) -> f64 {
        self.norm() / h.powi(NUM_DIMENSIONS as i32) * self.w0(r / h)
    }

    /// dW/dr(r, h) = norm/h^(d+1) · w1(r/h); non-positive.
    pub fn gradient(&self, r: f64, h: f64) -> f64 {
        self.norm() / h.powi(NUM_DIMENSIONS as i32 + 1) * self.w1(r / h)
    }

    /// ∂W/∂h(r, h) = norm/h^(d+1) · w_omega(r/h)
    pub fn dwdh(&self, r: f64, h: f64) -> f64 {
        self.norm() / h.powi(NUM_DIMENSIONS as i32 + 1) * self.w_omega(r / h)
    }
}

#[cfg(test)]
mod tests {
    use super::Kernel;
    use super::KernelChoice;
    use crate::test_utils::assert_float_is_close_high_error;

    fn all_kernels() -> Vec<Kernel> {
        vec![
            Kernel::new(KernelChoice::M4, false),
            Kernel::new(KernelChoice::Quintic, false),
            Kernel::new(KernelChoice::Gaussian, false),
            Kernel::new(KernelChoice::M4, true),
            Kernel::new(KernelChoice::Quintic, true),
        ]
    }

    #[test]
    fn kernels_vanish_beyond_their_range() {
        for kernel in all_kernels() {
            assert_eq!(kernel.w0(kernel.range()), 0.0);
            assert_eq!(kernel.w0(kernel.range() * 2.0), 0.0);
            assert_eq!(kernel.w1(kernel.range() * 2.0), 0.0);
        }
    }

    #[test]
    fn kernels_are_monotone_non_increasing() {
        for kernel in all_kernels() {
            let num_samples = 400;
            let mut previous = kernel.w0(0.0);
            for i in 1..=num_samples {
                let s = kernel.range() * i as f64 / num_samples as f64;
                let value = kernel.w0(s);
                assert!(
                    value <= previous + 1e-10,
                    "{:?} increases at s = {}",
                    kernel.range(),
                    s
                );
                previous = value;
            }
        }
    }

    #[test]
    fn kernels_integrate_to_unity() {
        // Radial quadrature of norm · w0 over the kernel support.
        for kernel in all_kernels() {
            let num_samples = 20000;
            let ds = kernel.range() / num_samples as f64;
            let mut total = 0.0;
            for i in 0..num_samples {
                let s = (i as f64 + 0.5) * ds;
                let shell = match crate::config::NUM_DIMENSIONS {
                    1 => 2.0,
                    2 => 2.0 * std::f64::consts::PI * s,
                    _ => 4.0 * std::f64::consts::PI * s * s,
                };
                total += kernel.norm() * kernel.w0(s) * shell * ds;
            }
            // The truncated Gaussian carries a percent-level deficit.
            assert!((total - 1.0).abs() < 2e-2, "norm integral = {}", total);
        }
    }

    #[test]
    fn gradient_matches_finite_differences() {
        // Analytic kernels only; differencing a piecewise linear table
        // cannot resolve this.
        let analytic = vec![
            Kernel::new(KernelChoice::M4, false),
            Kernel::new(KernelChoice::Quintic, false),
            Kernel::new(KernelChoice::Gaussian, false),
        ];
        for kernel in analytic {
            let ds = 1e-6;
            for s in [0.3, 0.7, 1.2, 1.7] {
                let numeric = (kernel.w0(s + ds) - kernel.w0(s - ds)) / (2.0 * ds);
                let analytic = kernel.w1(s);
                assert!(
                    (numeric - analytic).abs() < 1e-5 * (1.0 + analytic.abs()),
                    "w1 mismatch at s = {s}: {numeric} vs {analytic}"
                );
            }
        }
    }

    #[test]
    fn gravity_reduces_to_inverse_square_beyond_the_range() {
        for kernel in all_kernels() {
            let s = kernel.range() + 0.5;
            assert_float_is_close_high_error(kernel.w_grav(s), 1.0 / (s * s));
            assert_float_is_close_high_error(kernel.w_pot(s), 1.0 / s);
            assert!(kernel.w_zeta(s).abs() < 1e-10);
        }
    }

    #[cfg(all(not(feature = "1d"), not(feature = "2d")))]
    #[test]
    fn tabulated_gravity_matches_the_analytic_spline() {
        let analytic = Kernel::new(KernelChoice::M4, false);
        let tabulated = Kernel::new(KernelChoice::M4, true);
        for i in 1..40 {
            let s = 0.05 * i as f64;
            assert!(
                (analytic.w_grav(s) - tabulated.w_grav(s)).abs() < 1e-3,
                "w_grav mismatch at s = {s}"
            );
            assert!(
                (analytic.w_pot(s) - tabulated.w_pot(s)).abs() < 1e-3,
                "w_pot mismatch at s = {s}"
            );
        }
    }
}
