use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;
use std::ops::Div;
use std::ops::DivAssign;
use std::ops::Mul;
use std::ops::MulAssign;
use std::ops::Neg;
use std::ops::Sub;
use std::ops::SubAssign;

use serde::Deserialize;
use serde::Serialize;

/// One-dimensional counterpart to the glam vector types, covering the
/// part of their surface the engine uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DVec1 {
    pub x: f64,
}

impl DVec1 {
    pub const ZERO: Self = Self { x: 0.0 };
    pub const ONE: Self = Self { x: 1.0 };

    pub const fn new(x: f64) -> Self {
        Self { x }
    }

    pub const fn splat(x: f64) -> Self {
        Self { x }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x
    }

    pub fn length(self) -> f64 {
        self.x.abs()
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x
    }

    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).abs()
    }

    pub fn distance_squared(self, other: Self) -> f64 {
        (self.x - other.x) * (self.x - other.x)
    }

    pub fn abs(self) -> Self {
        Self { x: self.x.abs() }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite()
    }

    pub fn min(self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
        }
    }

    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
        }
    }

    pub fn min_element(self) -> f64 {
        self.x
    }

    pub fn max_element(self) -> f64 {
        self.x
    }
}

impl Add for DVec1 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x }
    }
}

impl AddAssign for DVec1 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
    }
}

impl Sub for DVec1 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x }
    }
}

impl SubAssign for DVec1 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
    }
}

impl Mul<f64> for DVec1 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self { x: self.x * rhs }
    }
}

impl Mul<DVec1> for f64 {
    type Output = DVec1;

    fn mul(self, rhs: DVec1) -> DVec1 {
        DVec1 { x: self * rhs.x }
    }
}

impl MulAssign<f64> for DVec1 {
    fn mul_assign(&mut self, rhs: f64) {
        self.x *= rhs;
    }
}

impl Div<f64> for DVec1 {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self { x: self.x / rhs }
    }
}

impl DivAssign<f64> for DVec1 {
    fn div_assign(&mut self, rhs: f64) {
        self.x /= rhs;
    }
}

impl Neg for DVec1 {
    type Output = Self;

    fn neg(self) -> Self {
        Self { x: -self.x }
    }
}

impl Sum for DVec1 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |a, b| a + b)
    }
}
