// Core ECS components for the crowd scene.
// The scene graph is a plain bevy_ecs World: one entity per agent, one per
// ground proxy, components attached the way a scene node carries them.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec2, Vec3};
use serde::Deserialize;

/// Position, orientation and scale of an entity in world space.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }
}

/// Human-readable entity name ("Mutant 1", ...).
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct EntityName(pub String);

/// Velocity of an entity in 3D space (units per second).
/// Mirrored from the steering simulation every step; never written by gameplay.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec3,
}

/// RGB color for debug drawing.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const RED: Color = Color { r: 1.0, g: 0.0, b: 0.0 };
    pub const GREEN: Color = Color { r: 0.0, g: 1.0, b: 0.0 };
    pub const CYAN: Color = Color { r: 0.0, g: 0.86, b: 1.0 };
    pub const YELLOW: Color = Color { r: 1.0, g: 0.86, b: 0.0 };
    pub const GREY: Color = Color { r: 0.5, g: 0.5, b: 0.5 };
}

/// How much path-following effort the steering simulation spends on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NavigationQuality {
    /// Steer straight at the target.
    Low,
    /// Follow the flowfield.
    Medium,
    /// Steer straight when the target is visible, otherwise follow the flowfield.
    High,
}

/// How readily an agent holds its course when avoiding others.
/// Pushier agents take a smaller share of the avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum NavigationPushiness {
    Low,
    Medium,
    High,
}

/// Simulation parameters attached to every crowd agent at spawn.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct CrowdAgentParams {
    pub height: f32,
    /// Collision radius in world units.
    pub radius: f32,
    /// Maximum speed in world units/sec.
    pub max_speed: f32,
    /// Maximum change of velocity in world units/sec².
    pub max_accel: f32,
    pub quality: NavigationQuality,
    pub pushiness: NavigationPushiness,
}

/// Renderable model reference. Asset loading happens elsewhere; the scene
/// only records which model and material the entity shows.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub model: String,
    pub material: String,
    pub cast_shadows: bool,
}

/// Flat, axis-aligned ground geometry used both to build the navmesh and as a
/// raycast target.
///
/// `center` is the top surface center; `size` the X/Z extents.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct GroundPlane {
    pub center: Vec3,
    pub size: Vec2,
}

impl GroundPlane {
    pub fn min_xz(&self) -> Vec2 {
        Vec2::new(self.center.x, self.center.z) - self.size * 0.5
    }

    pub fn max_xz(&self) -> Vec2 {
        Vec2::new(self.center.x, self.center.z) + self.size * 0.5
    }

    pub fn contains_xz(&self, p: Vec2) -> bool {
        let (min, max) = (self.min_xz(), self.max_xz());
        p.x >= min.x && p.y >= min.y && p.x <= max.x && p.y <= max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_plane_bounds_are_centered() {
        let plane = GroundPlane {
            center: Vec3::new(0.0, -1.0, 2.0),
            size: Vec2::splat(20.0),
        };
        assert_eq!(plane.min_xz(), Vec2::new(-10.0, -8.0));
        assert_eq!(plane.max_xz(), Vec2::new(10.0, 12.0));
        assert!(plane.contains_xz(Vec2::new(9.9, 11.9)));
        assert!(!plane.contains_xz(Vec2::new(10.1, 0.0)));
    }

    #[test]
    fn pushiness_orders_low_to_high() {
        assert!(NavigationPushiness::Low < NavigationPushiness::Medium);
        assert!(NavigationPushiness::Medium < NavigationPushiness::High);
    }
}
