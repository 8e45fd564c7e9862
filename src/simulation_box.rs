use serde::Deserialize;
use serde::Serialize;

use crate::config::NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::component_mut;
use crate::dimension::MVec;
use crate::error::Error;
use crate::error::Result;
use crate::extent::Extent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Open,
    Periodic,
    Mirror,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundarySide {
    Lower,
    Upper,
}

impl BoundarySide {
    pub const BOTH: [BoundarySide; 2] = [BoundarySide::Lower, BoundarySide::Upper];
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AxisBoundary {
    pub lower: BoundaryKind,
    pub upper: BoundaryKind,
}

impl Default for AxisBoundary {
    fn default() -> Self {
        Self {
            lower: BoundaryKind::Periodic,
            upper: BoundaryKind::Periodic,
        }
    }
}

/// The simulation volume together with the boundary condition of each
/// of its faces. Positions of particles beyond a periodic face are
/// wrapped back into the box.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationBox {
    pub min: MVec,
    pub max: MVec,
    #[serde(default)]
    pub boundaries: [AxisBoundary; NUM_DIMENSIONS],
}

fn periodic_wrap_component(v: f64, min: f64, max: f64) -> f64 {
    (v - min).rem_euclid(max - min) + min
}

fn minimize_component(v: f64, length: f64) -> f64 {
    if v < 0.0 {
        if v.abs() < (v + length).abs() {
            v
        } else {
            v + length
        }
    } else if v.abs() < (v - length).abs() {
        v
    } else {
        v - length
    }
}

impl SimulationBox {
    pub fn new(extent: Extent) -> Self {
        Self {
            min: extent.min,
            max: extent.max,
            boundaries: [AxisBoundary::default(); NUM_DIMENSIONS],
        }
    }

    pub fn cube_from_side_length(side_length: f64) -> Self {
        Self::new(Extent::cube_from_side_length(side_length))
    }

    pub fn open_cube_from_side_length(side_length: f64) -> Self {
        let mut box_ = Self::cube_from_side_length(side_length);
        for axis in 0..NUM_DIMENSIONS {
            box_.boundaries[axis] = AxisBoundary {
                lower: BoundaryKind::Open,
                upper: BoundaryKind::Open,
            };
        }
        box_
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.min, self.max)
    }

    pub fn side_lengths(&self) -> MVec {
        self.max - self.min
    }

    pub fn kind(&self, axis: usize, side: BoundarySide) -> BoundaryKind {
        match side {
            BoundarySide::Lower => self.boundaries[axis].lower,
            BoundarySide::Upper => self.boundaries[axis].upper,
        }
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.boundaries[axis].lower == BoundaryKind::Periodic
    }

    pub fn has_closed_faces(&self) -> bool {
        (0..NUM_DIMENSIONS).any(|axis| {
            BoundarySide::BOTH
                .iter()
                .any(|side| self.kind(axis, *side) != BoundaryKind::Open)
        })
    }

    /// Periodic faces only make sense in pairs.
    pub fn validate(&self) -> Result<()> {
        for axis in 0..NUM_DIMENSIONS {
            let b = &self.boundaries[axis];
            if (b.lower == BoundaryKind::Periodic) != (b.upper == BoundaryKind::Periodic) {
                return Err(Error::config(format!(
                    "axis {axis} pairs a periodic face with a non-periodic one"
                )));
            }
            if component(&self.max, axis) <= component(&self.min, axis) {
                return Err(Error::config(format!("box is empty along axis {axis}")));
            }
        }
        Ok(())
    }

    /// Wrap a position back into the box along all periodic axes.
    pub fn periodic_wrap(&self, mut pos: MVec) -> MVec {
        for axis in 0..NUM_DIMENSIONS {
            if self.is_periodic(axis) {
                let min = component(&self.min, axis);
                let max = component(&self.max, axis);
                let v = component_mut(&mut pos, axis);
                *v = periodic_wrap_component(*v, min, max);
            }
        }
        pos
    }

    /// Wrap a position and apply the same shift to the integrator
    /// checkpoint position so that drifts relative to it stay valid.
    pub fn wrap_with_checkpoint(&self, pos: &mut MVec, checkpoint: &mut MVec) {
        for axis in 0..NUM_DIMENSIONS {
            if !self.is_periodic(axis) {
                continue;
            }
            let min = component(&self.min, axis);
            let max = component(&self.max, axis);
            let length = max - min;
            let v = component_mut(pos, axis);
            let mut shift = 0.0;
            while *v < min {
                *v += length;
                shift += length;
            }
            while *v >= max {
                *v -= length;
                shift -= length;
            }
            *component_mut(checkpoint, axis) += shift;
        }
    }

    /// Minimum-image separation, minimised along periodic axes only.
    pub fn periodic_distance_vec(&self, p1: &MVec, p2: &MVec) -> MVec {
        let mut dist = *p1 - *p2;
        let side_lengths = self.side_lengths();
        for axis in 0..NUM_DIMENSIONS {
            if self.is_periodic(axis) {
                let v = component_mut(&mut dist, axis);
                *v = minimize_component(*v, component(&side_lengths, axis));
            }
        }
        dist
    }

    pub fn periodic_distance(&self, p1: &MVec, p2: &MVec) -> f64 {
        self.periodic_distance_vec(p1, p2).length()
    }

    /// Reflect a position about one of the box faces.
    pub fn mirrored(&self, mut pos: MVec, axis: usize, side: BoundarySide) -> MVec {
        let face = match side {
            BoundarySide::Lower => component(&self.min, axis),
            BoundarySide::Upper => component(&self.max, axis),
        };
        let v = component_mut(&mut pos, axis);
        *v = 2.0 * face - *v;
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::BoundaryKind;
    use super::BoundarySide;
    use super::SimulationBox;
    use crate::config::NUM_DIMENSIONS;
    use crate::dimension::component;
    use crate::dimension::component_mut;
    use crate::dimension::MVec;
    use crate::test_utils::assert_float_is_close;
    use crate::test_utils::assert_vec_is_close;

    fn offset_on_axis(base: MVec, axis: usize, value: f64) -> MVec {
        let mut v = base;
        *component_mut(&mut v, axis) = value;
        v
    }

    #[test]
    fn periodic_wrap() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let inside = MVec::ONE * 0.5;
        assert_vec_is_close(box_.periodic_wrap(inside), inside);
        for axis in 0..NUM_DIMENSIONS {
            let outside = offset_on_axis(inside, axis, 1.5);
            assert_vec_is_close(box_.periodic_wrap(outside), inside);
            let outside = offset_on_axis(inside, axis, -0.5);
            assert_vec_is_close(box_.periodic_wrap(outside), inside);
        }
    }

    #[test]
    fn wrap_is_idempotent() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let pos = offset_on_axis(MVec::ONE * 0.25, 0, -3.7);
        let once = box_.periodic_wrap(pos);
        let twice = box_.periodic_wrap(once);
        assert_vec_is_close(once, twice);
    }

    #[test]
    fn wrap_shifts_checkpoint_by_the_same_amount() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let mut pos = offset_on_axis(MVec::ONE * 0.5, 0, 1.25);
        let mut checkpoint = offset_on_axis(MVec::ONE * 0.5, 0, 0.75);
        let drift = pos - checkpoint;
        box_.wrap_with_checkpoint(&mut pos, &mut checkpoint);
        assert_float_is_close(component(&pos, 0), 0.25);
        assert_vec_is_close(pos - checkpoint, drift);
    }

    #[test]
    fn periodic_distance_uses_the_nearest_image() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let p1 = MVec::ONE * 0.05;
        let p2 = offset_on_axis(MVec::ONE * 0.05, 0, 0.95);
        assert_float_is_close(box_.periodic_distance(&p1, &p2), 0.1);
    }

    #[test]
    fn open_axes_are_not_minimised() {
        let mut box_ = SimulationBox::cube_from_side_length(1.0);
        box_.boundaries[0].lower = BoundaryKind::Open;
        box_.boundaries[0].upper = BoundaryKind::Open;
        let p1 = MVec::ZERO;
        let p2 = offset_on_axis(MVec::ZERO, 0, 0.9);
        assert_float_is_close(
            component(&box_.periodic_distance_vec(&p1, &p2), 0).abs(),
            0.9,
        );
    }

    #[test]
    fn mirrored_reflects_about_the_face() {
        let box_ = SimulationBox::cube_from_side_length(1.0);
        let pos = MVec::ONE * 0.1;
        let reflected = box_.mirrored(pos, 0, BoundarySide::Lower);
        assert_float_is_close(component(&reflected, 0), -0.1);
        let reflected = box_.mirrored(pos, 0, BoundarySide::Upper);
        assert_float_is_close(component(&reflected, 0), 1.9);
    }

    #[test]
    fn unpaired_periodic_face_is_rejected() {
        let mut box_ = SimulationBox::cube_from_side_length(1.0);
        box_.boundaries[0].upper = BoundaryKind::Mirror;
        assert!(box_.validate().is_err());
        box_.boundaries[0].lower = BoundaryKind::Mirror;
        assert!(box_.validate().is_ok());
    }
}
