use serde::Deserialize;
use serde::Serialize;

use crate::config::NUM_DIMENSIONS;
use crate::config::TWO_TO_NUM_DIMENSIONS;
use crate::dimension::component;
use crate::dimension::component_mut;
use crate::dimension::MVec;

/// An axis-aligned box given by its minimum and maximum corner.
/// Domain boxes along open boundaries use infinite sentinels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: MVec,
    pub max: MVec,
}

impl Extent {
    pub fn new(min: MVec, max: MVec) -> Self {
        Self { min, max }
    }

    pub fn cube_from_side_length(side_length: f64) -> Self {
        Self {
            min: MVec::ZERO,
            max: MVec::ONE * side_length,
        }
    }

    pub fn from_positions<'a>(positions: impl Iterator<Item = &'a MVec>) -> Option<Self> {
        let mut positions = positions;
        let first = *positions.next()?;
        let mut result = Self {
            min: first,
            max: first,
        };
        for pos in positions {
            result.min = result.min.min(*pos);
            result.max = result.max.max(*pos);
        }
        Some(result)
    }

    pub fn center(&self) -> MVec {
        (self.min + self.max) * 0.5
    }

    pub fn side_lengths(&self) -> MVec {
        self.max - self.min
    }

    pub fn max_side_length(&self) -> f64 {
        self.side_lengths().max_element()
    }

    /// Half-open containment, so adjacent domain boxes never claim the
    /// same position twice.
    pub fn contains(&self, pos: &MVec) -> bool {
        for axis in 0..NUM_DIMENSIONS {
            let x = component(pos, axis);
            if x < component(&self.min, axis) || x >= component(&self.max, axis) {
                return false;
            }
        }
        true
    }

    pub fn overlaps(&self, other: &Extent) -> bool {
        for axis in 0..NUM_DIMENSIONS {
            if component(&self.max, axis) < component(&other.min, axis)
                || component(&other.max, axis) < component(&self.min, axis)
            {
                return false;
            }
        }
        true
    }

    /// The box grown by `padding` on every side.
    pub fn grown(&self, padding: f64) -> Self {
        Self {
            min: self.min - MVec::ONE * padding,
            max: self.max + MVec::ONE * padding,
        }
    }

    pub fn shifted(&self, offset: MVec) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn union(&self, other: &Extent) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Index of the child box a position falls into; bit `k` is set iff
    /// the position lies in the upper half along axis `k`. Consistent
    /// with the ordering of [`Extent::subdivided`].
    pub fn child_index(&self, pos: &MVec) -> usize {
        let center = self.center();
        let mut index = 0;
        for axis in 0..NUM_DIMENSIONS {
            if component(pos, axis) >= component(&center, axis) {
                index |= 1 << axis;
            }
        }
        index
    }

    /// The 2^d equally sized child boxes.
    pub fn subdivided(&self) -> [Extent; TWO_TO_NUM_DIMENSIONS] {
        let center = self.center();
        let mut children = [*self; TWO_TO_NUM_DIMENSIONS];
        for (index, child) in children.iter_mut().enumerate() {
            for axis in 0..NUM_DIMENSIONS {
                if index & (1 << axis) == 0 {
                    *component_mut(&mut child.max, axis) = component(&center, axis);
                } else {
                    *component_mut(&mut child.min, axis) = component(&center, axis);
                }
            }
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::Extent;
    use crate::config::NUM_DIMENSIONS;
    use crate::config::TWO_TO_NUM_DIMENSIONS;
    use crate::dimension::MVec;

    #[test]
    fn from_positions() {
        let positions = [MVec::ZERO, MVec::ONE * 2.0, MVec::ONE * 0.5];
        let extent = Extent::from_positions(positions.iter()).unwrap();
        assert_eq!(extent.min, MVec::ZERO);
        assert_eq!(extent.max, MVec::ONE * 2.0);
        assert!(Extent::from_positions([].iter()).is_none());
    }

    #[test]
    fn subdivided_children_tile_the_parent() {
        let extent = Extent::cube_from_side_length(2.0);
        let children = extent.subdivided();
        assert_eq!(children.len(), TWO_TO_NUM_DIMENSIONS);
        let volume = |e: &Extent| -> f64 {
            let mut v = 1.0;
            for axis in 0..NUM_DIMENSIONS {
                v *= crate::dimension::component(&e.side_lengths(), axis);
            }
            v
        };
        let total: f64 = children.iter().map(volume).sum();
        assert!((total - volume(&extent)).abs() < 1e-12);
    }

    #[test]
    fn child_index_matches_subdivided() {
        let extent = Extent::cube_from_side_length(1.0);
        for (index, child) in extent.subdivided().iter().enumerate() {
            assert_eq!(extent.child_index(&child.center()), index);
            assert!(child.contains(&child.center()));
        }
    }

    #[test]
    fn contains_is_half_open() {
        let extent = Extent::cube_from_side_length(1.0);
        assert!(extent.contains(&MVec::ZERO));
        assert!(!extent.contains(&MVec::ONE));
    }
}
