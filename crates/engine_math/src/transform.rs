//! Full 3D transform component.
//!
//! [`Transform3D`] carries position, rotation, and scale for entities that
//! render or collide. Entities that only move use [`Position`](crate::Position).

use engine_component::{Column, Component};
use glam::{Quat, Vec3};

/// Headings shorter than this leave the rotation unchanged.
const MIN_HEADING: f32 = 1e-6;

/// Position, rotation, and per-axis scale in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    /// World-space position.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform3D {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// A transform at `position` with no rotation and unit scale.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Local −Z in world space.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Move to `position` and yaw so [`forward`](Self::forward) points along
    /// the horizontal part of `heading`.
    pub fn follow(&mut self, position: Vec3, heading: Vec3) {
        self.position = position;
        let flat = Vec3::new(heading.x, 0.0, heading.z);
        if flat.length_squared() > MIN_HEADING {
            self.rotation = Quat::from_rotation_y((-flat.x).atan2(-flat.z));
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform3D {
    type Store = Column<Self>;

    fn type_name() -> &'static str {
        "Transform3D"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn test_default_is_identity() {
        let t = Transform3D::default();
        assert_eq!(t, Transform3D::IDENTITY);
        assert!(close(t.forward(), Vec3::NEG_Z));
    }

    #[test]
    fn test_follow_faces_horizontal_heading() {
        let mut t = Transform3D::from_position(Vec3::ONE);
        t.follow(Vec3::new(4.0, 5.0, 6.0), Vec3::new(3.0, 10.0, 0.0));

        assert_eq!(t.position, Vec3::new(4.0, 5.0, 6.0));
        assert!(close(t.forward(), Vec3::X));

        t.follow(t.position, Vec3::new(0.0, 0.0, 2.0));
        assert!(close(t.forward(), Vec3::Z));
    }

    #[test]
    fn test_follow_keeps_rotation_for_vertical_heading() {
        let mut t = Transform3D::IDENTITY;
        t.follow(Vec3::ZERO, Vec3::NEG_X);
        let facing = t.rotation;

        t.follow(Vec3::Y, Vec3::new(0.0, -9.8, 0.0));
        assert_eq!(t.rotation, facing);
        assert!(close(t.forward(), Vec3::NEG_X));
    }
}
