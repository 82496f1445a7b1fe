//! Point-mass motion components.

use std::ops::{Deref, DerefMut};

use engine_component::{Column, Component};
use glam::Vec3;

/// World-space position of a point mass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position(pub Vec3);

/// Linear velocity in units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec3);

impl Position {
    /// Advance by `velocity` over `dt` seconds.
    pub fn integrate(&mut self, velocity: &Velocity, dt: f32) {
        self.0 += velocity.0 * dt;
    }
}

impl Velocity {
    /// Reflect the component along any axis where `position` has left the
    /// axis-aligned box `[-half_extent, half_extent]`.
    pub fn bounce(&mut self, position: &Position, half_extent: Vec3) {
        let outside = position.0.abs().cmpgt(half_extent);
        let heading_out = (position.0 * self.0).cmpgt(Vec3::ZERO);
        self.0 = Vec3::select(outside & heading_out, -self.0, self.0);
    }
}

/// Integrate a batch of positions in place.
///
/// Slices are zipped; extra elements in the longer one are left alone.
pub fn integrate_all(positions: &mut [Position], velocities: &[Velocity], dt: f32) {
    for (position, velocity) in positions.iter_mut().zip(velocities) {
        position.integrate(velocity, dt);
    }
}

macro_rules! vec3_component {
    ($ty:ident) => {
        impl Component for $ty {
            type Store = Column<Self>;

            fn type_name() -> &'static str {
                stringify!($ty)
            }
        }

        impl Deref for $ty {
            type Target = Vec3;

            fn deref(&self) -> &Vec3 {
                &self.0
            }
        }

        impl DerefMut for $ty {
            fn deref_mut(&mut self) -> &mut Vec3 {
                &mut self.0
            }
        }

        impl From<Vec3> for $ty {
            fn from(v: Vec3) -> Self {
                Self(v)
            }
        }
    };
}

vec3_component!(Position);
vec3_component!(Velocity);
