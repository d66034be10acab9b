// ORCA: optimal reciprocal collision avoidance.
//
// Based on van den Berg, Guy, Lin and Manocha, "Reciprocal n-Body Collision
// Avoidance" (2011). Each neighbour contributes one halfplane of permitted
// velocities; a small incremental 2-D linear program then picks the permitted
// velocity closest to the desired one.
//
// How the avoidance is split between two agents comes from the velocity bias
// and their pushiness.

use std::cmp::Ordering;
use std::collections::HashMap;

use glam::Vec2;

use super::components::NavigationPushiness;

const EPSILON: f32 = 1e-5;

// ============================================================================
// NEIGHBOUR GRID
// ============================================================================

/// Sparse bucket grid over the XZ plane, keyed by cell coordinate.
///
/// Holds indices into the caller's snapshot slice. Rebuilt every step.
pub struct NeighborGrid {
    cell_size: f32,
    buckets: HashMap<(i32, i32), Vec<usize>>,
}

impl NeighborGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(EPSILON),
            buckets: HashMap::new(),
        }
    }

    /// Empties every bucket but keeps their allocations.
    pub fn clear(&mut self) {
        self.buckets.values_mut().for_each(Vec::clear);
    }

    fn key(&self, pos: Vec2) -> (i32, i32) {
        let cell = (pos / self.cell_size).floor();
        (cell.x as i32, cell.y as i32)
    }

    pub fn insert(&mut self, pos: Vec2, idx: usize) {
        let key = self.key(pos);
        self.buckets.entry(key).or_default().push(idx);
    }

    /// Appends every index stored in a cell touching the square of half-size
    /// `radius` around `pos`. Callers filter by distance themselves.
    pub fn query_radius(&self, pos: Vec2, radius: f32, out: &mut Vec<usize>) {
        let (lo_x, lo_y) = self.key(pos - Vec2::splat(radius));
        let (hi_x, hi_y) = self.key(pos + Vec2::splat(radius));
        for y in lo_y..=hi_y {
            for x in lo_x..=hi_x {
                if let Some(bucket) = self.buckets.get(&(x, y)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }
}

// ============================================================================
// AGENT SNAPSHOT
// ============================================================================

/// Read-only data for one agent, collected before ORCA runs.
#[derive(Debug, Clone, Copy)]
pub struct AgentSnapshot {
    /// XZ position.
    pub pos: Vec2,
    /// XZ velocity from the previous step.
    pub vel: Vec2,
    /// Velocity the agent would take with nobody around.
    pub desired_vel: Vec2,
    pub radius: f32,
    pub max_speed: f32,
    pub pushiness: NavigationPushiness,
}

/// Per-step solver settings.
#[derive(Debug, Clone, Copy)]
pub struct OrcaParams {
    /// Look-ahead window for avoidance (seconds).
    pub time_horizon: f32,
    /// 1 / step dt, used only when agents already overlap.
    pub inv_dt: f32,
    /// Share of the avoidance an agent takes against an equally pushy neighbour.
    pub vel_bias: f32,
    /// Closest neighbours considered per agent.
    pub max_neighbors: usize,
}

/// Fraction of the required velocity change agent `a` takes against `b`.
pub fn responsibility(a: NavigationPushiness, b: NavigationPushiness, vel_bias: f32) -> f32 {
    let bias = vel_bias.clamp(0.0, 1.0);
    match a.cmp(&b) {
        Ordering::Equal => bias,
        // a holds course, b takes the larger share.
        Ordering::Greater => bias * 0.4,
        Ordering::Less => 1.0 - (1.0 - bias) * 0.4,
    }
}

// ============================================================================
// VELOCITY CONSTRAINTS
// ============================================================================

#[inline]
fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Halfplane of permitted velocities: everything to the left of the directed
/// line through `origin` along unit `heading`.
#[derive(Debug, Clone, Copy)]
struct Constraint {
    origin: Vec2,
    heading: Vec2,
}

impl Constraint {
    /// How far `v` lies outside the halfplane; positive means violated.
    fn violation(&self, v: Vec2) -> f32 {
        cross(self.heading, self.origin - v)
    }

    fn point_at(&self, t: f32) -> Vec2 {
        self.origin + self.heading * t
    }
}

/// One side of a reciprocal avoidance pair.
struct Mover {
    pos: Vec2,
    vel: Vec2,
    radius: f32,
}

/// Builds the constraint `me` must respect to stay clear of `other`, taking
/// `share` of the required correction.
fn avoidance_constraint(
    me: &Mover,
    other: &Mover,
    horizon: f32,
    inv_dt: f32,
    share: f32,
) -> Constraint {
    let offset = other.pos - me.pos;
    let closing = me.vel - other.vel;
    let dist_sq = offset.length_squared();
    let reach = me.radius + other.radius;
    let reach_sq = reach * reach;

    // Smallest change `u` that moves `closing` onto the velocity-obstacle
    // boundary, and the boundary direction there.
    let (u, heading) = if dist_sq > reach_sq {
        let from_cap = closing - offset / horizon;
        let from_cap_sq = from_cap.length_squared();
        let along = from_cap.dot(offset);

        if along < 0.0 && along * along > reach_sq * from_cap_sq {
            // Nearest boundary is the rounded cap of the truncated cone.
            let len = from_cap_sq.sqrt();
            let normal = if len > EPSILON { from_cap / len } else { Vec2::X };
            (normal * (reach / horizon - len), -normal.perp())
        } else {
            // Nearest boundary is a leg of the cone.
            let leg = (dist_sq - reach_sq).max(0.0).sqrt();
            let left_leg = Vec2::new(
                offset.x * leg - offset.y * reach,
                offset.x * reach + offset.y * leg,
            );
            let right_leg = Vec2::new(
                offset.x * leg + offset.y * reach,
                -offset.x * reach + offset.y * leg,
            );
            let heading = if cross(offset, from_cap) > 0.0 {
                left_leg / dist_sq
            } else {
                -right_leg / dist_sq
            };
            (heading * closing.dot(heading) - closing, heading)
        }
    } else {
        // Overlapping: separate within a single step.
        let from_cap = closing - offset * inv_dt;
        let len = from_cap.length();
        let normal = if len > EPSILON {
            from_cap / len
        } else if dist_sq > EPSILON * EPSILON {
            -offset.normalize()
        } else {
            Vec2::X
        };
        (normal * (reach * inv_dt - len), -normal.perp())
    };

    Constraint {
        origin: me.vel + u * share,
        heading,
    }
}

// ============================================================================
// 2-D LINEAR PROGRAM
// ============================================================================

/// What the program optimises for.
#[derive(Clone, Copy)]
enum Goal {
    /// Closest permitted point to this velocity.
    Nearest(Vec2),
    /// Permitted point furthest along this (unit) direction.
    Furthest(Vec2),
}

/// Incremental 2-D linear program over a speed disc and a list of halfplanes.
struct VelocityProgram<'a> {
    constraints: &'a [Constraint],
    max_speed: f32,
}

impl<'a> VelocityProgram<'a> {
    fn new(constraints: &'a [Constraint], max_speed: f32) -> Self {
        Self { constraints, max_speed }
    }

    /// Best point on the boundary of constraint `k` that also satisfies
    /// constraints `0..k` and the speed disc. `None` when that set is empty.
    fn best_on_boundary(&self, k: usize, goal: Goal) -> Option<Vec2> {
        let line = self.constraints[k];
        let b = line.origin.dot(line.heading);
        let disc = b * b + self.max_speed * self.max_speed - line.origin.length_squared();
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        let (mut lo, mut hi) = (-b - root, -b + root);

        for earlier in &self.constraints[..k] {
            let denom = cross(line.heading, earlier.heading);
            let numer = cross(earlier.heading, line.origin - earlier.origin);
            if denom.abs() <= EPSILON {
                // Parallel: either the whole line is excluded or none of it.
                if numer < 0.0 {
                    return None;
                }
                continue;
            }
            let t = numer / denom;
            if denom < 0.0 {
                hi = hi.min(t);
            } else {
                lo = lo.max(t);
            }
            if lo > hi {
                return None;
            }
        }

        let t = match goal {
            Goal::Furthest(dir) => {
                if line.heading.dot(dir) > 0.0 { hi } else { lo }
            }
            Goal::Nearest(target) => line.heading.dot(target - line.origin).clamp(lo, hi),
        };
        Some(line.point_at(t))
    }

    /// Adds constraints one by one, moving `v` onto each violated boundary.
    /// Returns `Err(k)` with the first constraint that cannot be satisfied;
    /// `v` then holds the best answer for `0..k`.
    fn solve(&self, goal: Goal, v: &mut Vec2) -> Result<(), usize> {
        match goal {
            Goal::Furthest(dir) => *v = dir * self.max_speed,
            Goal::Nearest(target) => *v = target.clamp_length_max(self.max_speed),
        }
        for (k, line) in self.constraints.iter().enumerate() {
            if line.violation(*v) > 0.0 {
                *v = self.best_on_boundary(k, goal).ok_or(k)?;
            }
        }
        Ok(())
    }

    /// Infeasible from `first_failed` on: settle for the velocity whose worst
    /// violation is smallest.
    fn minimize_violation(&self, first_failed: usize, v: &mut Vec2) {
        let mut worst = 0.0f32;
        for (k, line) in self.constraints.iter().enumerate().skip(first_failed) {
            if line.violation(*v) <= worst {
                continue;
            }
            // Earlier constraints, re-expressed as halfplanes of equal
            // violation relative to constraint k.
            let relative: Vec<Constraint> = self.constraints[..k]
                .iter()
                .filter_map(|earlier| {
                    let denom = cross(line.heading, earlier.heading);
                    let origin = if denom.abs() <= EPSILON {
                        if line.heading.dot(earlier.heading) > 0.0 {
                            return None;
                        }
                        (line.origin + earlier.origin) * 0.5
                    } else {
                        line.point_at(cross(earlier.heading, line.origin - earlier.origin) / denom)
                    };
                    Some(Constraint {
                        origin,
                        heading: (earlier.heading - line.heading).normalize_or_zero(),
                    })
                })
                .collect();

            let fallback = *v;
            let inward = line.heading.perp();
            if VelocityProgram::new(&relative, self.max_speed)
                .solve(Goal::Furthest(inward), v)
                .is_err()
            {
                // Only reachable through rounding; keep the previous answer.
                *v = fallback;
            }
            worst = line.violation(*v);
        }
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Compute the ORCA-adjusted velocity for agent `a_idx`.
///
/// `neighbor_vel[i]` is the velocity agent `i` is expected to take this step
/// (its desired velocity on the first pass, the previous pass's answer on
/// refinement passes). The result stays within `max_speed` and as close as
/// possible to the agent's desired velocity.
pub fn compute_orca_velocity(
    agents: &[AgentSnapshot],
    neighbor_vel: &[Vec2],
    a_idx: usize,
    grid: &NeighborGrid,
    params: &OrcaParams,
) -> Vec2 {
    let a = &agents[a_idx];
    let reach_base = a.radius + a.max_speed * params.time_horizon;

    let mut candidates: Vec<usize> = Vec::new();
    grid.query_radius(a.pos, reach_base + a.radius, &mut candidates);
    candidates.sort_unstable();
    candidates.dedup();

    // Closest first so the neighbour cap keeps the most pressing collisions.
    let mut neighbors: Vec<(f32, usize)> = candidates
        .into_iter()
        .filter_map(|b_idx| {
            if b_idx == a_idx {
                return None;
            }
            let b = &agents[b_idx];
            let reach = reach_base + b.radius;
            let dist_sq = (b.pos - a.pos).length_squared();
            (dist_sq <= reach * reach).then_some((dist_sq, b_idx))
        })
        .collect();
    neighbors.sort_unstable_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
    neighbors.truncate(params.max_neighbors);

    let me = Mover {
        pos: a.pos,
        vel: a.vel,
        radius: a.radius,
    };
    let constraints: Vec<Constraint> = neighbors
        .iter()
        .map(|&(_, b_idx)| {
            let b = &agents[b_idx];
            let other = Mover {
                pos: b.pos,
                vel: neighbor_vel[b_idx],
                radius: b.radius,
            };
            let share = responsibility(a.pushiness, b.pushiness, params.vel_bias);
            avoidance_constraint(&me, &other, params.time_horizon, params.inv_dt, share)
        })
        .collect();

    let program = VelocityProgram::new(&constraints, a.max_speed);
    let mut v = a.desired_vel;
    if let Err(first_failed) = program.solve(Goal::Nearest(a.desired_vel), &mut v) {
        program.minimize_violation(first_failed, &mut v);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pos: Vec2, desired: Vec2) -> AgentSnapshot {
        AgentSnapshot {
            pos,
            vel: desired,
            desired_vel: desired,
            radius: 0.5,
            max_speed: 2.0,
            pushiness: NavigationPushiness::Medium,
        }
    }

    fn params() -> OrcaParams {
        OrcaParams {
            time_horizon: 2.0,
            inv_dt: 60.0,
            vel_bias: 0.5,
            max_neighbors: 10,
        }
    }

    fn grid_with(agents: &[AgentSnapshot]) -> NeighborGrid {
        let mut grid = NeighborGrid::new(1.0);
        for (i, a) in agents.iter().enumerate() {
            grid.insert(a.pos, i);
        }
        grid
    }

    #[test]
    fn lone_agent_keeps_desired_velocity() {
        let agents = [snapshot(Vec2::ZERO, Vec2::new(1.0, 0.0))];
        let grid = grid_with(&agents);
        let desired: Vec<Vec2> = agents.iter().map(|a| a.desired_vel).collect();
        let v = compute_orca_velocity(&agents, &desired, 0, &grid, &params());
        assert!((v - Vec2::new(1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn desired_velocity_is_capped_at_max_speed() {
        let agents = [snapshot(Vec2::ZERO, Vec2::new(5.0, 0.0))];
        let grid = grid_with(&agents);
        let desired = [agents[0].desired_vel];
        let v = compute_orca_velocity(&agents, &desired, 0, &grid, &params());
        assert!(v.length() <= 2.0 + 1e-4);
    }

    #[test]
    fn head_on_agents_sidestep() {
        let agents = [
            snapshot(Vec2::new(-2.0, 0.0), Vec2::new(1.0, 0.0)),
            snapshot(Vec2::new(2.0, 0.0), Vec2::new(-1.0, 0.0)),
        ];
        let grid = grid_with(&agents);
        let desired: Vec<Vec2> = agents.iter().map(|a| a.desired_vel).collect();
        let va = compute_orca_velocity(&agents, &desired, 0, &grid, &params());
        let vb = compute_orca_velocity(&agents, &desired, 1, &grid, &params());
        assert!(va.y.abs() > 1e-3, "a did not deflect: {va}");
        assert!(vb.y.abs() > 1e-3, "b did not deflect: {vb}");
        // Reciprocal: they pass on opposite sides in world space.
        assert!(va.y * vb.y < 0.0);
    }

    #[test]
    fn neighbor_cap_of_zero_ignores_everyone() {
        let agents = [
            snapshot(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)),
            snapshot(Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)),
        ];
        let grid = grid_with(&agents);
        let desired: Vec<Vec2> = agents.iter().map(|a| a.desired_vel).collect();
        let capped = OrcaParams {
            max_neighbors: 0,
            ..params()
        };
        let v = compute_orca_velocity(&agents, &desired, 0, &grid, &capped);
        assert!((v - Vec2::new(1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn pushier_agent_takes_smaller_share() {
        use NavigationPushiness::*;
        assert_eq!(responsibility(Medium, Medium, 0.5), 0.5);
        assert!((responsibility(High, Low, 0.5) - 0.2).abs() < 1e-6);
        assert!((responsibility(Low, High, 0.5) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn grid_query_finds_nearby_indices() {
        let mut grid = NeighborGrid::new(1.0);
        grid.insert(Vec2::new(1.5, 1.5), 0);
        grid.insert(Vec2::new(8.5, 8.5), 1);
        let mut out = Vec::new();
        grid.query_radius(Vec2::new(1.0, 1.0), 1.0, &mut out);
        assert!(out.contains(&0));
        assert!(!out.contains(&1));
        grid.clear();
        out.clear();
        grid.query_radius(Vec2::new(1.0, 1.0), 1.0, &mut out);
        assert!(out.is_empty());
    }
}
