use std::f64::consts::PI;

use super::KernelShape;

const NUM_TABLE_ENTRIES: usize = 4096;

fn interpolate(table: &[f64], x: f64, max: f64) -> f64 {
    if x >= max {
        return table[table.len() - 1];
    }
    let t = (x / max).max(0.0) * (table.len() - 1) as f64;
    let index = t as usize;
    let frac = t - index as f64;
    if index + 1 >= table.len() {
        table[table.len() - 1]
    } else {
        table[index] * (1.0 - frac) + table[index + 1] * frac
    }
}

/// Softened-gravity profile of a kernel, obtained by integrating the
/// enclosed kernel mass numerically. The enclosed mass is rescaled to
/// unity at the kernel edge so the profile joins the exact far field
/// continuously even for truncated kernels.
#[derive(Clone, Debug)]
pub struct GravityTable {
    range: f64,
    w_grav: Vec<f64>,
    w_pot: Vec<f64>,
}

impl GravityTable {
    pub fn from_shape(shape: &impl KernelShape) -> Self {
        let range = shape.range();
        let n = NUM_TABLE_ENTRIES;
        let ds = range / (n - 1) as f64;
        let shell = |s: f64| 4.0 * PI * shape.norm() * shape.w0(s) * s * s;
        let ring = |s: f64| 4.0 * PI * shape.norm() * shape.w0(s) * s;

        // Cumulative enclosed mass μ(s) and the potential of the shells
        // outside s.
        let mut enclosed = vec![0.0; n];
        for i in 1..n {
            let s0 = (i - 1) as f64 * ds;
            let s1 = i as f64 * ds;
            enclosed[i] = enclosed[i - 1] + 0.5 * (shell(s0) + shell(s1)) * ds;
        }
        let mut exterior = vec![0.0; n];
        for i in (0..n - 1).rev() {
            let s0 = i as f64 * ds;
            let s1 = (i + 1) as f64 * ds;
            exterior[i] = exterior[i + 1] + 0.5 * (ring(s0) + ring(s1)) * ds;
        }
        let scale = 1.0 / enclosed[n - 1];

        let mut w_grav = vec![0.0; n];
        let mut w_pot = vec![0.0; n];
        for i in 0..n {
            let s = i as f64 * ds;
            if i == 0 {
                w_grav[i] = 0.0;
                w_pot[i] = exterior[i] * scale;
            } else {
                w_grav[i] = enclosed[i] * scale / (s * s);
                w_pot[i] = enclosed[i] * scale / s + exterior[i] * scale;
            }
        }
        Self {
            range,
            w_grav,
            w_pot,
        }
    }

    pub fn w_grav(&self, s: f64) -> f64 {
        if s >= self.range {
            1.0 / (s * s)
        } else {
            interpolate(&self.w_grav, s, self.range)
        }
    }

    pub fn w_pot(&self, s: f64) -> f64 {
        if s >= self.range {
            1.0 / s
        } else {
            interpolate(&self.w_pot, s, self.range)
        }
    }
}

/// Any kernel shape, precomputed on a uniform s² grid for the value and
/// uniform s grids for the derivative terms.
#[derive(Clone, Debug)]
pub struct Tabulated {
    range: f64,
    norm: f64,
    w0_s2: Vec<f64>,
    w1: Vec<f64>,
    w_omega: Vec<f64>,
    gravity: GravityTable,
}

impl Tabulated {
    pub fn from_shape(shape: impl KernelShape) -> Self {
        let range = shape.range();
        let range_sqd = range * range;
        let n = NUM_TABLE_ENTRIES;
        let w0_s2 = (0..n)
            .map(|i| {
                let s2 = range_sqd * i as f64 / (n - 1) as f64;
                shape.w0(s2.sqrt())
            })
            .collect();
        let at_s = |f: &dyn Fn(f64) -> f64| -> Vec<f64> {
            (0..n)
                .map(|i| f(range * i as f64 / (n - 1) as f64))
                .collect()
        };
        let w1 = at_s(&|s| shape.w1(s));
        let w_omega = at_s(&|s| shape.w_omega(s));
        let gravity = GravityTable::from_shape(&shape);
        Self {
            range,
            norm: shape.norm(),
            w0_s2,
            w1,
            w_omega,
            gravity,
        }
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn w0_s2(&self, s2: f64) -> f64 {
        if s2 >= self.range * self.range {
            0.0
        } else {
            interpolate(&self.w0_s2, s2, self.range * self.range)
        }
    }

    pub fn w1(&self, s: f64) -> f64 {
        if s >= self.range {
            0.0
        } else {
            interpolate(&self.w1, s, self.range)
        }
    }

    pub fn w_omega(&self, s: f64) -> f64 {
        if s >= self.range {
            0.0
        } else {
            interpolate(&self.w_omega, s, self.range)
        }
    }

    pub fn gravity(&self) -> &GravityTable {
        &self.gravity
    }
}
