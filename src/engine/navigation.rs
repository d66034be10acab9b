// Navigable surface: a cell-based navmesh built from ground geometry, plus
// flowfield pathfinding toward a single shared goal.
//
// Layer 1: NavMesh, walkability and surface height per cell, grouped into tiles.
// Layer 2: FlowField, breadth-first step counts plus per-cell headings.

use std::collections::VecDeque;

use glam::{IVec2, UVec2, Vec2, Vec3};
use serde::Deserialize;

use super::components::{Color, GroundPlane};
use super::debug_draw::DebugGeometry;
use crate::error::{CrowdError, Result};

/// Fraction of a cell that snapped points keep clear of the cell edge.
const SNAP_INSET: f32 = 1e-4;

/// Upper bound on cells per navmesh; protects against a tiny cell size over
/// huge geometry.
const MAX_CELLS: usize = 4_000_000;

// ============================================================================
// BUILD PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavMeshParams {
    /// World units per cell on X/Z.
    pub cell_size: f32,
    /// Vertical quantization of surface heights.
    pub cell_height: f32,
    /// Cells per tile side.
    pub tile_size: u32,
    /// Walkable area is shrunk by this much away from edges.
    pub agent_radius: f32,
}

impl Default for NavMeshParams {
    fn default() -> Self {
        Self {
            cell_size: 0.2,
            cell_height: 0.02,
            tile_size: 2,
            agent_radius: 0.05,
        }
    }
}

impl NavMeshParams {
    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(CrowdError::InvalidNavMesh {
                reason: reason.to_string(),
            })
        };
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return invalid("cell_size must be positive");
        }
        if !(self.cell_height.is_finite() && self.cell_height > 0.0) {
            return invalid("cell_height must be positive");
        }
        if self.tile_size == 0 {
            return invalid("tile_size must be at least one cell");
        }
        if !(self.agent_radius.is_finite() && self.agent_radius >= 0.0) {
            return invalid("agent_radius must not be negative");
        }
        Ok(())
    }
}

// ============================================================================
// NAVMESH
// ============================================================================

/// Walkability and surface height per cell. Built once per placement and
/// shared read-only by the steering simulation and gesture handling.
#[derive(Debug, Clone)]
pub struct NavMesh {
    params: NavMeshParams,
    /// World XZ of the grid's minimum corner.
    origin: Vec2,
    width: u32,
    height: u32,
    walkable: Vec<bool>,
    surface_y: Vec<f32>,
}

impl NavMesh {
    /// Rasterize `geometry` into cells, then erode the walkable area by the
    /// agent radius (rounded up to whole cells), the way a Recast build does.
    pub fn build(geometry: &[GroundPlane], params: NavMeshParams) -> Result<Self> {
        params.validate()?;
        let Some(first) = geometry.first() else {
            return Err(CrowdError::InvalidNavMesh {
                reason: "no geometry to build from".to_string(),
            });
        };

        let mut min = first.min_xz();
        let mut max = first.max_xz();
        for plane in &geometry[1..] {
            min = min.min(plane.min_xz());
            max = max.max(plane.max_xz());
        }
        let span = max - min;
        if !(span.x > 0.0 && span.y > 0.0) || !span.is_finite() {
            return Err(CrowdError::InvalidNavMesh {
                reason: format!("empty bounds {min} .. {max}"),
            });
        }

        let width = (span.x / params.cell_size).ceil() as u32;
        let height = (span.y / params.cell_size).ceil() as u32;
        let size = width as usize * height as usize;
        if size > MAX_CELLS {
            return Err(CrowdError::InvalidNavMesh {
                reason: format!("{width}x{height} cells exceeds the {MAX_CELLS} cell limit"),
            });
        }

        let mut mesh = Self {
            params,
            origin: min,
            width,
            height,
            walkable: vec![false; size],
            surface_y: vec![0.0; size],
        };

        // Rasterize: a cell is covered when its center lies on a plane.
        // Overlapping planes keep the highest surface.
        for cz in 0..height {
            for cx in 0..width {
                let idx = mesh.idx(UVec2::new(cx, cz));
                let c = mesh.cell_center_xz(UVec2::new(cx, cz));
                for plane in geometry.iter().filter(|p| p.contains_xz(c)) {
                    let y = quantize(plane.center.y, params.cell_height);
                    if !mesh.walkable[idx] || y > mesh.surface_y[idx] {
                        mesh.surface_y[idx] = y;
                    }
                    mesh.walkable[idx] = true;
                }
            }
        }

        mesh.erode((params.agent_radius / params.cell_size).ceil() as i32);
        Ok(mesh)
    }

    /// Clear every walkable cell within `cells` (Chebyshev) of a blocked cell
    /// or the grid edge.
    fn erode(&mut self, cells: i32) {
        if cells <= 0 {
            return;
        }
        let source = self.walkable.clone();
        let (w, h) = (self.width as i32, self.height as i32);
        for cz in 0..h {
            for cx in 0..w {
                let idx = (cz * w + cx) as usize;
                if !source[idx] {
                    continue;
                }
                let blocked = (-cells..=cells).any(|dz| {
                    (-cells..=cells).any(|dx| {
                        let (nx, nz) = (cx + dx, cz + dz);
                        nx < 0 || nz < 0 || nx >= w || nz >= h || !source[(nz * w + nx) as usize]
                    })
                });
                if blocked {
                    self.walkable[idx] = false;
                }
            }
        }
    }

    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds_min(&self) -> Vec2 {
        self.origin
    }

    pub fn bounds_max(&self) -> Vec2 {
        self.origin + Vec2::new(self.width as f32, self.height as f32) * self.params.cell_size
    }

    /// Tile counts along X and Z.
    pub fn tile_count(&self) -> UVec2 {
        let t = self.params.tile_size;
        UVec2::new(self.width.div_ceil(t), self.height.div_ceil(t))
    }

    pub fn walkable_cell_count(&self) -> usize {
        self.walkable.iter().filter(|w| **w).count()
    }

    /// Convert a world-space position (XZ plane) to the cell that contains it.
    /// Returns `None` if the position is outside the grid.
    pub fn world_to_cell(&self, pos: Vec3) -> Option<UVec2> {
        let x = (pos.x - self.origin.x) / self.params.cell_size;
        let z = (pos.z - self.origin.y) / self.params.cell_size;
        if x < 0.0 || z < 0.0 {
            return None;
        }
        let (cx, cz) = (x as u32, z as u32);
        if cx >= self.width || cz >= self.height {
            return None;
        }
        Some(UVec2::new(cx, cz))
    }

    /// Like `world_to_cell` but clamps to grid bounds instead of returning None.
    pub fn world_to_cell_clamped(&self, pos: Vec3) -> UVec2 {
        let cx = ((pos.x - self.origin.x) / self.params.cell_size).max(0.0) as u32;
        let cz = ((pos.z - self.origin.y) / self.params.cell_size).max(0.0) as u32;
        UVec2::new(cx.min(self.width - 1), cz.min(self.height - 1))
    }

    /// World-space center of a cell, on its surface.
    pub fn cell_center(&self, cell: UVec2) -> Vec3 {
        let c = self.cell_center_xz(cell);
        Vec3::new(c.x, self.surface_y[self.idx(cell)], c.y)
    }

    fn cell_center_xz(&self, cell: UVec2) -> Vec2 {
        self.origin + (cell.as_vec2() + Vec2::splat(0.5)) * self.params.cell_size
    }

    #[inline]
    fn idx(&self, cell: UVec2) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    pub fn is_walkable(&self, cell: UVec2) -> bool {
        self.walkable[self.idx(cell)]
    }

    pub fn is_walkable_at(&self, pos: Vec3) -> bool {
        self.world_to_cell(pos).is_some_and(|c| self.is_walkable(c))
    }

    /// Nearest point on a walkable cell whose footprint overlaps the box
    /// `point ± extents` and whose surface lies within `extents.y` vertically.
    pub fn try_nearest_point(&self, point: Vec3, extents: Vec3) -> Option<Vec3> {
        self.nearest_walkable(point, extents).map(|(_, p)| p)
    }

    /// Cell and point behind `try_nearest_point`. The point is kept a hair
    /// inside the cell so it maps back onto that cell and not a blocked
    /// neighbour sharing the edge.
    fn nearest_walkable(&self, point: Vec3, extents: Vec3) -> Option<(UVec2, Vec3)> {
        let cs = self.params.cell_size;
        let lo = (Vec2::new(point.x - extents.x, point.z - extents.z) - self.origin) / cs;
        let hi = (Vec2::new(point.x + extents.x, point.z + extents.z) - self.origin) / cs;
        if hi.x < 0.0 || hi.y < 0.0 || lo.x >= self.width as f32 || lo.y >= self.height as f32 {
            return None;
        }
        let x0 = lo.x.floor().max(0.0) as u32;
        let z0 = lo.y.floor().max(0.0) as u32;
        let x1 = (hi.x.floor() as u32).min(self.width - 1);
        let z1 = (hi.y.floor() as u32).min(self.height - 1);
        let inset = Vec2::splat(cs * SNAP_INSET);

        let mut best: Option<(f32, UVec2, Vec3)> = None;
        for cz in z0..=z1 {
            for cx in x0..=x1 {
                let cell = UVec2::new(cx, cz);
                let idx = self.idx(cell);
                if !self.walkable[idx] {
                    continue;
                }
                let y = self.surface_y[idx];
                if (y - point.y).abs() > extents.y {
                    continue;
                }
                let cell_min = self.origin + cell.as_vec2() * cs;
                let cell_max = cell_min + Vec2::splat(cs);
                let q = Vec2::new(point.x, point.z).clamp(cell_min + inset, cell_max - inset);
                let candidate = Vec3::new(q.x, y, q.y);
                let d2 = candidate.distance_squared(point);
                match best {
                    Some((best_d2, ..)) if best_d2 <= d2 => {}
                    _ => best = Some((d2, cell, candidate)),
                }
            }
        }
        best.map(|(_, cell, p)| (cell, p))
    }

    /// Like `try_nearest_point`, but hands back the query point unchanged when
    /// nothing navigable is in range.
    pub fn find_nearest_point(&self, point: Vec3, extents: Vec3) -> Vec3 {
        self.try_nearest_point(point, extents).unwrap_or(point)
    }

    /// True if every sample along the XZ segment `a -> b` is walkable.
    /// Samples every half cell.
    pub fn has_line_of_sight(&self, a: Vec3, b: Vec3) -> bool {
        let delta = Vec2::new(b.x - a.x, b.z - a.z);
        let steps = (delta.length() / (self.params.cell_size * 0.5)).ceil().max(1.0) as u32;
        (0..=steps).all(|i| {
            let t = i as f32 / steps as f32;
            self.is_walkable_at(a + Vec3::new(delta.x, 0.0, delta.y) * t)
        })
    }

    /// Compute a flowfield toward `goal`. A goal on a blocked cell is moved to
    /// the closest walkable cell first.
    pub fn flow_field(&self, goal: Vec3) -> FlowField {
        let mut goal_cell = self.world_to_cell_clamped(goal);
        if !self.is_walkable(goal_cell) {
            let reach = self.bounds_max() - self.bounds_min();
            let search = Vec3::new(reach.x, f32::INFINITY, reach.y);
            if let Some((cell, _)) = self.nearest_walkable(goal, search) {
                goal_cell = cell;
            }
        }
        compute_flowfield(self, goal_cell)
    }

    /// Walkable-area outline in green, tile grid in grey.
    pub fn draw_debug_geometry(&self, out: &mut DebugGeometry) {
        let cs = self.params.cell_size;
        let (w, h) = (self.width as i32, self.height as i32);
        for cz in 0..h {
            for cx in 0..w {
                let cell = UVec2::new(cx as u32, cz as u32);
                if !self.is_walkable(cell) {
                    continue;
                }
                let y = self.surface_y[self.idx(cell)];
                let min = self.origin + cell.as_vec2() * cs;
                let max = min + Vec2::splat(cs);
                let open = |nx: i32, nz: i32| {
                    nx >= 0
                        && nz >= 0
                        && nx < w
                        && nz < h
                        && self.is_walkable(UVec2::new(nx as u32, nz as u32))
                };
                let corner = |x: f32, z: f32| Vec3::new(x, y, z);
                if !open(cx - 1, cz) {
                    out.add_line(corner(min.x, min.y), corner(min.x, max.y), Color::GREEN);
                }
                if !open(cx + 1, cz) {
                    out.add_line(corner(max.x, min.y), corner(max.x, max.y), Color::GREEN);
                }
                if !open(cx, cz - 1) {
                    out.add_line(corner(min.x, min.y), corner(max.x, min.y), Color::GREEN);
                }
                if !open(cx, cz + 1) {
                    out.add_line(corner(min.x, max.y), corner(max.x, max.y), Color::GREEN);
                }
            }
        }

        let tiles = self.tile_count();
        let tile_span = cs * self.params.tile_size as f32;
        let (lo, hi) = (self.bounds_min(), self.bounds_max());
        let y = self.surface_y.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        for tx in 0..=tiles.x {
            let x = (lo.x + tx as f32 * tile_span).min(hi.x);
            out.add_line(Vec3::new(x, y, lo.y), Vec3::new(x, y, hi.y), Color::GREY);
        }
        for tz in 0..=tiles.y {
            let z = (lo.y + tz as f32 * tile_span).min(hi.y);
            out.add_line(Vec3::new(lo.x, y, z), Vec3::new(hi.x, y, z), Color::GREY);
        }
    }
}

fn quantize(y: f32, step: f32) -> f32 {
    (y / step).round() * step
}

// ============================================================================
// FLOW FIELD
// ============================================================================

const UNREACHED: u32 = u32::MAX;

const CARDINAL: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

#[rustfmt::skip]
const KING: [(i32, i32); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1,  0),          (1,  0),
    (-1,  1), (0,  1), (1,  1),
];

/// Per-cell headings toward one goal cell, shared by every agent heading
/// there. Rebuilt when the crowd is retargeted.
#[derive(Debug, Clone)]
pub struct FlowField {
    width: u32,
    height: u32,
    goal_cell: UVec2,
    /// Unit XZ heading per cell; zero at the goal and on unreachable cells.
    headings: Vec<Vec2>,
    /// 4-connected step count to the goal, `UNREACHED` if there is no path.
    steps: Vec<u32>,
}

impl FlowField {
    pub fn goal_cell(&self) -> UVec2 {
        self.goal_cell
    }

    fn steps_at(&self, cell: UVec2) -> u32 {
        if cell.x >= self.width || cell.y >= self.height {
            return UNREACHED;
        }
        self.steps[(cell.y * self.width + cell.x) as usize]
    }

    /// Heading to follow from `cell`; zero when there is nothing to follow.
    pub fn sample_cell(&self, cell: UVec2) -> Vec2 {
        if cell.x >= self.width || cell.y >= self.height {
            return Vec2::ZERO;
        }
        self.headings[(cell.y * self.width + cell.x) as usize]
    }

    /// The goal cell or one of its direct neighbours.
    pub fn near_goal(&self, cell: UVec2) -> bool {
        self.steps_at(cell) <= 1
    }

    pub fn is_reachable(&self, cell: UVec2) -> bool {
        self.steps_at(cell) != UNREACHED
    }
}

/// Breadth-first step counts out from the goal, then each cell points at its
/// lowest-count neighbour (diagonals included).
fn compute_flowfield(mesh: &NavMesh, goal_cell: UVec2) -> FlowField {
    let mut steps = vec![UNREACHED; mesh.walkable.len()];
    let mut frontier = VecDeque::new();
    if mesh.is_walkable(goal_cell) {
        steps[mesh.idx(goal_cell)] = 0;
        frontier.push_back(goal_cell);
    }
    while let Some(cell) = frontier.pop_front() {
        let next = steps[mesh.idx(cell)] + 1;
        for n in offset_cells(cell, mesh.width, mesh.height, &CARDINAL) {
            let i = mesh.idx(n);
            if mesh.walkable[i] && steps[i] == UNREACHED {
                steps[i] = next;
                frontier.push_back(n);
            }
        }
    }

    let headings = (0..mesh.height)
        .flat_map(|z| (0..mesh.width).map(move |x| UVec2::new(x, z)))
        .map(|cell| {
            let own = steps[mesh.idx(cell)];
            if own == 0 || own == UNREACHED {
                return Vec2::ZERO;
            }
            offset_cells(cell, mesh.width, mesh.height, &KING)
                .fold((own, Vec2::ZERO), |best, n| {
                    let s = steps[mesh.idx(n)];
                    if s < best.0 {
                        (s, (n.as_vec2() - cell.as_vec2()).normalize())
                    } else {
                        best
                    }
                })
                .1
        })
        .collect();

    FlowField {
        width: mesh.width,
        height: mesh.height,
        goal_cell,
        headings,
        steps,
    }
}

/// Cells at the given offsets from `cell` that fall inside a `w` x `h` grid.
fn offset_cells(
    cell: UVec2,
    w: u32,
    h: u32,
    offsets: &'static [(i32, i32)],
) -> impl Iterator<Item = UVec2> {
    let base = cell.as_ivec2();
    offsets.iter().filter_map(move |&(dx, dz)| {
        let n = base + IVec2::new(dx, dz);
        (n.x >= 0 && n.y >= 0 && (n.x as u32) < w && (n.y as u32) < h).then(|| n.as_uvec2())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground(center: Vec3, size: f32) -> GroundPlane {
        GroundPlane {
            center,
            size: Vec2::splat(size),
        }
    }

    fn demo_mesh() -> NavMesh {
        NavMesh::build(&[ground(Vec3::new(0.0, -1.0, 2.0), 20.0)], NavMeshParams::default())
            .unwrap()
    }

    #[test]
    fn build_covers_plane_and_erodes_one_cell() {
        let mesh = demo_mesh();
        assert_eq!((mesh.width(), mesh.height()), (100, 100));
        assert_eq!(mesh.tile_count(), UVec2::new(50, 50));
        // 100x100 minus a one-cell border.
        assert_eq!(mesh.walkable_cell_count(), 98 * 98);
        assert!(!mesh.is_walkable(UVec2::new(0, 50)));
        assert!(mesh.is_walkable(UVec2::new(1, 50)));
        assert!((mesh.cell_center(UVec2::new(1, 1)).y - -1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_radius_keeps_border_cells() {
        let params = NavMeshParams {
            agent_radius: 0.0,
            ..NavMeshParams::default()
        };
        let mesh = NavMesh::build(&[ground(Vec3::ZERO, 2.0)], params).unwrap();
        assert_eq!(mesh.walkable_cell_count(), 100);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let plane = [ground(Vec3::ZERO, 2.0)];
        let bad_cell = NavMeshParams {
            cell_size: 0.0,
            ..NavMeshParams::default()
        };
        assert!(matches!(
            NavMesh::build(&plane, bad_cell),
            Err(CrowdError::InvalidNavMesh { .. })
        ));
        let bad_tile = NavMeshParams {
            tile_size: 0,
            ..NavMeshParams::default()
        };
        assert!(NavMesh::build(&plane, bad_tile).is_err());
        assert!(NavMesh::build(&[], NavMeshParams::default()).is_err());
        assert!(NavMesh::build(&[ground(Vec3::ZERO, 0.0)], NavMeshParams::default()).is_err());
    }

    #[test]
    fn nearest_point_on_walkable_surface_is_the_point_itself() {
        let mesh = demo_mesh();
        let p = Vec3::new(1.03, -1.0, 3.07);
        let q = mesh.find_nearest_point(p, Vec3::splat(0.1));
        assert!(q.distance(p) < 1e-5);
    }

    #[test]
    fn nearest_point_snaps_height_onto_surface() {
        let mesh = demo_mesh();
        let q = mesh.find_nearest_point(Vec3::new(0.5, -0.95, 2.5), Vec3::splat(0.1));
        assert!((q.y - -1.0).abs() < 1e-5);
        assert!((q.x - 0.5).abs() < 1e-5 && (q.z - 2.5).abs() < 1e-5);
    }

    #[test]
    fn nearest_point_outside_walkable_area_snaps_to_edge() {
        let mesh = demo_mesh();
        // Walkable x range ends at 9.8 after erosion.
        let p = Vec3::new(9.85, -1.0, 2.0);
        let q = mesh.find_nearest_point(p, Vec3::splat(0.1));
        assert!((q.x - 9.8).abs() < 1e-4, "snapped to {q}");
        assert!((q.z - 2.0).abs() < 1e-5);
        assert!(mesh.try_nearest_point(p, Vec3::splat(0.1)).is_some());
    }

    #[test]
    fn nearest_point_out_of_range_returns_query() {
        let mesh = demo_mesh();
        let far = Vec3::new(50.0, -1.0, 50.0);
        assert_eq!(mesh.try_nearest_point(far, Vec3::splat(0.1)), None);
        assert_eq!(mesh.find_nearest_point(far, Vec3::splat(0.1)), far);

        let above = Vec3::new(0.0, 0.0, 2.0);
        assert_eq!(mesh.try_nearest_point(above, Vec3::splat(0.1)), None);
    }

    #[test]
    fn line_of_sight_stops_at_gaps() {
        let params = NavMeshParams {
            agent_radius: 0.0,
            ..NavMeshParams::default()
        };
        let mesh = NavMesh::build(
            &[ground(Vec3::new(-2.0, 0.0, 0.0), 2.0), ground(Vec3::new(2.0, 0.0, 0.0), 2.0)],
            params,
        )
        .unwrap();
        assert!(mesh.has_line_of_sight(Vec3::new(-2.5, 0.0, 0.0), Vec3::new(-1.5, 0.0, 0.5)));
        assert!(!mesh.has_line_of_sight(Vec3::new(-2.5, 0.0, 0.0), Vec3::new(2.5, 0.0, 0.0)));
    }

    #[test]
    fn flowfield_points_toward_goal() {
        let mesh = demo_mesh();
        let goal = Vec3::new(5.0, -1.0, 2.0);
        let field = mesh.flow_field(goal);
        assert_eq!(field.goal_cell(), mesh.world_to_cell(goal).unwrap());

        let west = mesh.world_to_cell(Vec3::new(0.0, -1.0, 2.0)).unwrap();
        assert!(field.sample_cell(west).x > 0.9);
        let east = mesh.world_to_cell(Vec3::new(8.0, -1.0, 2.0)).unwrap();
        assert!(field.sample_cell(east).x < -0.9);
        assert!(field.near_goal(field.goal_cell()));
        assert_eq!(field.sample_cell(field.goal_cell()), Vec2::ZERO);
    }

    #[test]
    fn flowfield_goal_on_blocked_cell_moves_inside() {
        let mesh = demo_mesh();
        let field = mesh.flow_field(Vec3::new(-9.95, -1.0, 2.0));
        assert!(mesh.is_walkable(field.goal_cell()));
        assert!(field.is_reachable(UVec2::new(50, 50)));
    }

    #[test]
    fn border_snaps_land_on_walkable_cells() {
        let mesh = demo_mesh();
        let extents = Vec3::splat(0.1);
        let center = Vec3::new(0.0, -1.0, 2.0);
        for offset in [
            Vec3::new(-9.85, 0.0, 0.0),
            Vec3::new(9.85, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -9.85),
            Vec3::new(0.0, 0.0, 9.85),
            Vec3::new(-9.85, 0.0, -9.85),
        ] {
            let hit = center + offset;
            let snapped = mesh.find_nearest_point(hit, extents);
            assert!(mesh.is_walkable_at(snapped), "{hit} snapped to unwalkable {snapped}");
            assert!(snapped.distance(hit) < 0.1, "{hit} snapped too far to {snapped}");
        }
    }

    #[test]
    fn flowfield_toward_snapped_border_goal_covers_the_mesh() {
        let mesh = demo_mesh();
        let goal = mesh.find_nearest_point(Vec3::new(-9.85, -1.0, 2.0), Vec3::splat(0.1));
        let field = mesh.flow_field(goal);
        assert_eq!(Some(field.goal_cell()), mesh.world_to_cell(goal));
        assert!(field.is_reachable(UVec2::new(50, 50)));
        assert!(field.sample_cell(UVec2::new(50, 50)).x < -0.9);
        assert!(mesh.has_line_of_sight(Vec3::new(0.0, -1.0, 2.0), goal));
    }

    #[test]
    fn debug_geometry_outlines_walkable_area() {
        let mesh = NavMesh::build(&[ground(Vec3::ZERO, 2.0)], NavMeshParams::default()).unwrap();
        let mut out = DebugGeometry::default();
        mesh.draw_debug_geometry(&mut out);
        // 8x8 walkable block → 32 outline edges, plus 6 + 6 tile lines.
        assert_eq!(out.len(), 32 + 12);
    }
}
