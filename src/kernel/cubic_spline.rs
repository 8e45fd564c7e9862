use std::f64::consts::PI;

use super::KernelShape;

/// M4 cubic spline, Monaghan & Lattanzio 1985. Compact support of two
/// smoothing lengths; the gravitational softening forms are the
/// analytic piecewise polynomials of Price & Monaghan 2007.
#[derive(Clone, Copy, Debug, Default)]
pub struct CubicSpline;

impl KernelShape for CubicSpline {
    fn range(&self) -> f64 {
        2.0
    }

    fn norm(&self) -> f64 {
        #[cfg(feature = "1d")]
        return 2.0 / 3.0;
        #[cfg(feature = "2d")]
        return 10.0 / (7.0 * PI);
        #[cfg(all(not(feature = "1d"), not(feature = "2d")))]
        return 1.0 / PI;
    }

    fn w0(&self, s: f64) -> f64 {
        if s < 1.0 {
            1.0 - 1.5 * s.powi(2) + 0.75 * s.powi(3)
        } else if s < 2.0 {
            0.25 * (2.0 - s).powi(3)
        } else {
            0.0
        }
    }

    fn w1(&self, s: f64) -> f64 {
        if s < 1.0 {
            -3.0 * s + 2.25 * s.powi(2)
        } else if s < 2.0 {
            -0.75 * (2.0 - s).powi(2)
        } else {
            0.0
        }
    }
}

impl CubicSpline {
    pub fn w_grav(&self, s: f64) -> f64 {
        if s < 1.0 {
            4.0 / 3.0 * s - 6.0 / 5.0 * s.powi(3) + 0.5 * s.powi(4)
        } else if s < 2.0 {
            8.0 / 3.0 * s - 3.0 * s.powi(2) + 6.0 / 5.0 * s.powi(3) - 1.0 / 6.0 * s.powi(4)
                - 1.0 / (15.0 * s.powi(2))
        } else {
            1.0 / (s * s)
        }
    }

    pub fn w_pot(&self, s: f64) -> f64 {
        if s < 1.0 {
            7.0 / 5.0 - 2.0 / 3.0 * s.powi(2) + 3.0 / 10.0 * s.powi(4) - 1.0 / 10.0 * s.powi(5)
        } else if s < 2.0 {
            -1.0 / (15.0 * s) + 8.0 / 5.0 - 4.0 / 3.0 * s.powi(2) + s.powi(3)
                - 3.0 / 10.0 * s.powi(4)
                + 1.0 / 30.0 * s.powi(5)
        } else {
            1.0 / s
        }
    }
}
