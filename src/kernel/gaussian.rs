use std::f64::consts::PI;

use once_cell::sync::OnceCell;

use super::tabulated::GravityTable;
use super::KernelShape;

/// Gaussian kernel, truncated at three smoothing lengths. The truncation
/// drops a sub-percent mass fraction of the wings.
#[derive(Clone, Debug, Default)]
pub struct Gaussian {
    gravity: OnceCell<GravityTable>,
}

impl Gaussian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gravity(&self) -> &GravityTable {
        self.gravity.get_or_init(|| GravityTable::from_shape(&Self::new()))
    }
}

impl KernelShape for Gaussian {
    fn range(&self) -> f64 {
        3.0
    }

    fn norm(&self) -> f64 {
        #[cfg(feature = "1d")]
        return 1.0 / PI.sqrt();
        #[cfg(feature = "2d")]
        return 1.0 / PI;
        #[cfg(all(not(feature = "1d"), not(feature = "2d")))]
        return 1.0 / (PI * PI.sqrt());
    }

    fn w0(&self, s: f64) -> f64 {
        if s < self.range() {
            (-s * s).exp()
        } else {
            0.0
        }
    }

    fn w1(&self, s: f64) -> f64 {
        if s < self.range() {
            -2.0 * s * (-s * s).exp()
        } else {
            0.0
        }
    }
}
