// Scene raycasts from the camera into placement geometry.

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::camera::{ArCamera, Ray};
use super::components::GroundPlane;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: Entity,
    pub position: Vec3,
    pub distance: f32,
}

/// Finds the scene point under the middle of the screen.
pub trait Raycaster {
    fn cast_from_screen_center(&mut self, world: &mut World, camera: &ArCamera) -> Option<Vec3>;
}

/// Casts against every `GroundPlane` entity in the world.
pub struct SceneRaycaster {
    pub max_distance: f32,
}

impl SceneRaycaster {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }
}

impl Raycaster for SceneRaycaster {
    fn cast_from_screen_center(&mut self, world: &mut World, camera: &ArCamera) -> Option<Vec3> {
        let ray = camera.screen_ray(0.5, 0.5);
        raycast_single(world, &ray, self.max_distance).map(|hit| hit.position)
    }
}

/// Nearest ground hit along `ray` within `max_distance`.
pub fn raycast_single(world: &mut World, ray: &Ray, max_distance: f32) -> Option<RayHit> {
    let mut query = world.query::<(Entity, &GroundPlane)>();
    query
        .iter(world)
        .filter_map(|(entity, plane)| {
            intersect_ground(ray, plane)
                .filter(|&t| t <= max_distance)
                .map(|t| RayHit {
                    entity,
                    position: ray.at(t),
                    distance: t,
                })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Distance along `ray` to the plane's top surface, if the ray hits it.
pub fn intersect_ground(ray: &Ray, plane: &GroundPlane) -> Option<f32> {
    if ray.direction.y.abs() < 1e-6 {
        return None;
    }
    let t = (plane.center.y - ray.origin.y) / ray.direction.y;
    if t < 0.0 {
        return None;
    }
    let hit = ray.at(t);
    plane.contains_xz(glam::Vec2::new(hit.x, hit.z)).then_some(t)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;

    fn plane(y: f32, size: f32) -> GroundPlane {
        GroundPlane {
            center: Vec3::new(0.0, y, 2.0),
            size: Vec2::splat(size),
        }
    }

    #[test]
    fn empty_scene_misses() {
        let mut world = World::new();
        let mut raycaster = SceneRaycaster::new(100.0);
        assert!(raycaster.cast_from_screen_center(&mut world, &ArCamera::default()).is_none());
    }

    #[test]
    fn center_ray_hits_ground_at_anchor() {
        let mut world = World::new();
        world.spawn(plane(-1.0, 20.0));
        let mut raycaster = SceneRaycaster::new(100.0);
        let hit = raycaster
            .cast_from_screen_center(&mut world, &ArCamera::default())
            .unwrap();
        assert!(hit.distance(Vec3::new(0.0, -1.0, 2.0)) < 1e-4);
    }

    #[test]
    fn nearest_plane_wins_and_max_distance_applies() {
        let mut world = World::new();
        world.spawn(plane(-1.0, 20.0));
        let upper = world.spawn(plane(-0.5, 20.0)).id();
        let ray = ArCamera::default().screen_ray(0.5, 0.5);

        let hit = raycast_single(&mut world, &ray, 100.0).unwrap();
        assert_eq!(hit.entity, upper);

        assert!(raycast_single(&mut world, &ray, 0.5).is_none());
    }

    #[test]
    fn rays_pointing_away_miss() {
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::Y,
        };
        assert!(intersect_ground(&ray, &plane(-1.0, 20.0)).is_none());
        let outside = Ray {
            origin: Vec3::new(50.0, 0.0, 0.0),
            direction: Vec3::NEG_Y,
        };
        assert!(intersect_ground(&outside, &plane(-1.0, 20.0)).is_none());
    }
}
