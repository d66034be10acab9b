// Debug geometry: world-space line segments collected after each frame's
// render when debug drawing is on. The host decides how to draw them.

use glam::Vec3;

use super::components::Color;

/// One world-space line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    pub from: Vec3,
    pub to: Vec3,
    pub color: Color,
}

#[derive(Debug, Default)]
pub struct DebugGeometry {
    lines: Vec<DebugLine>,
}

impl DebugGeometry {
    pub fn add_line(&mut self, from: Vec3, to: Vec3, color: Color) {
        self.lines.push(DebugLine { from, to, color });
    }

    /// Horizontal circle approximated by `segments` lines.
    pub fn add_circle(&mut self, center: Vec3, radius: f32, segments: u32, color: Color) {
        let segments = segments.max(3);
        let point = |i: u32| {
            let a = i as f32 / segments as f32 * std::f32::consts::TAU;
            center + Vec3::new(a.cos() * radius, 0.0, a.sin() * radius)
        };
        for i in 0..segments {
            self.add_line(point(i), point(i + 1), color);
        }
    }

    /// Axis-aligned cross marker on the XZ plane.
    pub fn add_cross(&mut self, center: Vec3, half_size: f32, color: Color) {
        self.add_line(center - Vec3::X * half_size, center + Vec3::X * half_size, color);
        self.add_line(center - Vec3::Z * half_size, center + Vec3::Z * half_size, color);
    }

    pub fn lines(&self) -> &[DebugLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Call once per frame before collecting.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
