use std::f64::consts::PI;

use once_cell::sync::OnceCell;

use super::tabulated::GravityTable;
use super::KernelShape;

/// Quintic spline with compact support of three smoothing lengths.
/// The softening profile has no convenient closed form and is served
/// from a numerically integrated table, built on first use.
#[derive(Clone, Debug, Default)]
pub struct QuinticSpline {
    gravity: OnceCell<GravityTable>,
}

impl QuinticSpline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gravity(&self) -> &GravityTable {
        self.gravity.get_or_init(|| GravityTable::from_shape(&Self::new()))
    }
}

impl KernelShape for QuinticSpline {
    fn range(&self) -> f64 {
        3.0
    }

    fn norm(&self) -> f64 {
        #[cfg(feature = "1d")]
        return 1.0 / 120.0;
        #[cfg(feature = "2d")]
        return 7.0 / (478.0 * PI);
        #[cfg(all(not(feature = "1d"), not(feature = "2d")))]
        return 1.0 / (120.0 * PI);
    }

    fn w0(&self, s: f64) -> f64 {
        if s < 1.0 {
            (3.0 - s).powi(5) - 6.0 * (2.0 - s).powi(5) + 15.0 * (1.0 - s).powi(5)
        } else if s < 2.0 {
            (3.0 - s).powi(5) - 6.0 * (2.0 - s).powi(5)
        } else if s < 3.0 {
            (3.0 - s).powi(5)
        } else {
            0.0
        }
    }

    fn w1(&self, s: f64) -> f64 {
        if s < 1.0 {
            -5.0 * (3.0 - s).powi(4) + 30.0 * (2.0 - s).powi(4) - 75.0 * (1.0 - s).powi(4)
        } else if s < 2.0 {
            -5.0 * (3.0 - s).powi(4) + 30.0 * (2.0 - s).powi(4)
        } else if s < 3.0 {
            -5.0 * (3.0 - s).powi(4)
        } else {
            0.0
        }
    }
}
