//! # engine_math
//!
//! Spatial components built on [`glam`]. Re-exports the glam types they use
//! so collaborators need only one math dependency.

pub mod motion;
pub mod transform;

pub use glam::{Quat, Vec3};

pub use motion::{Position, Velocity};
pub use transform::Transform3D;
