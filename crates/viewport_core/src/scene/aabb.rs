//! Axis-aligned bounding boxes

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Axis-aligned bounding box
///
/// The identity box (`min = +inf`, `max = -inf`) is the empty set: it is the
/// neutral element of [`Aabb::union`] and transforms to itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new box from two corners, in any order
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self { min: a.inf(&b), max: a.sup(&b) }
    }

    /// Create a box centered at a point with given half-size
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self::new(center - extents, center + extents)
    }

    /// The empty box
    pub fn identity() -> Self {
        Self {
            min: Vec3::repeat(f64::INFINITY),
            max: Vec3::repeat(f64::NEG_INFINITY),
        }
    }

    /// Whether this is the empty box
    pub fn is_identity(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Smallest box containing both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self { min: self.min.inf(&other.min), max: self.max.sup(&other.max) }
    }

    /// Grow to include a point
    #[must_use]
    pub fn union_point(&self, point: &Vec3) -> Self {
        Self { min: self.min.inf(point), max: self.max.sup(point) }
    }

    /// Get the center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners, min corner first
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    /// Bounds of the eight transformed corners. The empty box stays empty.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_identity() {
            return *self;
        }
        self.corners().iter().fold(Self::identity(), |acc, corner| {
            let p = matrix * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            acc.union_point(&p.xyz())
        })
    }

    /// Check if this box intersects another
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::identity()
    }
}
