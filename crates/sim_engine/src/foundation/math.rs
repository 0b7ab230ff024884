//! Math utilities and types
//!
//! Provides the fundamental math types used by the simulation core.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Check that every component of a vector is a finite number
pub fn is_finite(v: Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Axis-aligned world bounds used for out-of-bounds culling
///
/// Entities that drift outside these bounds are destroyed by their
/// lifecycle manager rather than simulated forever.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Minimum corner of the playfield
    pub min: Vec3,
    /// Maximum corner of the playfield
    pub max: Vec3,
}

impl WorldBounds {
    /// Create bounds from two corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create bounds symmetric around the origin
    pub fn centered(half_extent: f32) -> Self {
        Self {
            min: Vec3::new(-half_extent, -half_extent, -half_extent),
            max: Vec3::new(half_extent, half_extent, half_extent),
        }
    }

    /// Test whether a point lies inside the bounds (inclusive)
    pub fn contains(&self, p: Vec3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::centered(1000.0)
    }
}
