// AR viewpoint camera
//
// Camera model:
//   - A free eye position; in AR the device pose drives it, on desktop WASD
//   - Yaw around +Y (0 = looking along +Z) and pitch (positive = looking down)
//   - Screen rays are built from normalized coordinates, (0.5, 0.5) = center
//   - Q/E move the eye down/up, arrow keys turn it

use glam::{Vec2, Vec3};
use winit::keyboard::KeyCode;

use super::input::InputState;

/// A ray in world space; `direction` is unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

pub struct ArCamera {
    pub position: Vec3,

    /// Horizontal rotation in radians (0 = looking along +Z)
    pub yaw: f32,

    /// Elevation in radians (positive = looking down), clamped to ±85°
    pub pitch: f32,

    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,

    /// WASD/QE speed in world units per second
    pub move_speed: f32,

    /// Arrow-key turn speed in radians per second
    pub turn_speed: f32,
}

impl Default for ArCamera {
    /// Device at the origin, looking down at the default placement anchor.
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.5_f32.atan(),
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            move_speed: 1.0,
            turn_speed: 1.0,
        }
    }
}

impl ArCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit look direction.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            -self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        )
    }

    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let forward = self.forward();
        let right = forward.cross(Vec3::Y).normalize_or(Vec3::NEG_X);
        let up = right.cross(forward);
        (forward, right, up)
    }

    /// Ray through normalized screen coordinates: (0, 0) top-left, (1, 1)
    /// bottom-right.
    pub fn screen_ray(&self, x: f32, y: f32) -> Ray {
        let (forward, right, up) = self.basis();
        let ndc = Vec2::new(2.0 * x - 1.0, 1.0 - 2.0 * y);
        let tan_half = (self.fov * 0.5).tan();
        let direction =
            forward + right * (ndc.x * tan_half * self.aspect) + up * (ndc.y * tan_half);
        Ray {
            origin: self.position,
            direction: direction.normalize(),
        }
    }

    /// Turn to look at `target` from the current position.
    pub fn look_at(&mut self, target: Vec3) {
        let d = target - self.position;
        let flat = Vec2::new(d.x, d.z).length();
        if flat <= f32::EPSILON && d.y.abs() <= f32::EPSILON {
            return;
        }
        self.yaw = d.x.atan2(d.z);
        self.pitch = (-d.y).atan2(flat);
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Update the viewpoint from keyboard input. Call once per frame.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        let flat_forward = Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos());
        let flat_right = flat_forward.cross(Vec3::Y);

        let mut move_dir = Vec3::ZERO;
        if input.is_key_held(KeyCode::KeyW) { move_dir += flat_forward; }
        if input.is_key_held(KeyCode::KeyS) { move_dir -= flat_forward; }
        if input.is_key_held(KeyCode::KeyD) { move_dir += flat_right; }
        if input.is_key_held(KeyCode::KeyA) { move_dir -= flat_right; }
        if input.is_key_held(KeyCode::KeyE) { move_dir += Vec3::Y; }
        if input.is_key_held(KeyCode::KeyQ) { move_dir -= Vec3::Y; }
        if move_dir != Vec3::ZERO {
            self.position += move_dir.normalize() * self.move_speed * dt;
        }

        let turn = self.turn_speed * dt;
        if input.is_key_held(KeyCode::ArrowLeft) { self.yaw += turn; }
        if input.is_key_held(KeyCode::ArrowRight) { self.yaw -= turn; }
        if input.is_key_held(KeyCode::ArrowDown) { self.pitch += turn; }
        if input.is_key_held(KeyCode::ArrowUp) { self.pitch -= turn; }
        let limit = 85.0_f32.to_radians();
        self.pitch = self.pitch.clamp(-limit, limit);
    }
}
