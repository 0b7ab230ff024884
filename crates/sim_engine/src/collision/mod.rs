//! Broad-phase collision detection
//!
//! Based on Game Engine Architecture 3rd Edition, Section 13.3: categories
//! take the role of collision layers, and which categories are tested
//! against which is pure data (the [`CollisionMatrix`]) rather than logic
//! baked into the scan.

mod matrix;
mod registry;

pub use matrix::CollisionMatrix;
pub use registry::{contact_point, CollisionRegistry};
