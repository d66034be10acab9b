// Crowd steering simulation.
//
// `SteeringSimulation` is the seam the crowd core talks to; `CrowdSimulation`
// is the in-crate backend: desired velocity from the navmesh (straight line
// or flowfield), ORCA avoidance between agents, acceleration limit, navmesh
// clamp. After every step it reports each agent's new velocity and position
// through a synchronous callback.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use log::{debug, trace};
use serde::Deserialize;

use super::components::{Color, CrowdAgentParams, NavigationQuality};
use super::debug_draw::DebugGeometry;
use super::navigation::{FlowField, NavMesh};
use super::orca::{AgentSnapshot, NeighborGrid, OrcaParams, compute_orca_velocity};
use crate::error::{CrowdError, Result};

/// Search box used to put a new agent onto the navmesh.
pub const AGENT_PLACEMENT_EXTENTS: Vec3 = Vec3::new(1.0, 1.0, 1.0);
/// Side of the neighbour-lookup grid cells, in world units.
const NEIGHBOR_CELL_SIZE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentHandle(pub u32);

/// Obstacle-avoidance tuning, fixed when the simulation is created.
///
/// The ORCA backend reads `vel_bias` as the avoidance share between equally
/// pushy agents, `adaptive_divs * adaptive_rings` as the neighbour cap and
/// `adaptive_depth` as the number of solver passes per step.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObstacleAvoidanceParams {
    pub vel_bias: f32,
    pub adaptive_divs: u32,
    pub adaptive_rings: u32,
    pub adaptive_depth: u32,
    /// Look-ahead window in seconds.
    pub time_horizon: f32,
}

impl Default for ObstacleAvoidanceParams {
    fn default() -> Self {
        Self {
            vel_bias: 0.5,
            adaptive_divs: 7,
            adaptive_rings: 3,
            adaptive_depth: 3,
            time_horizon: 2.5,
        }
    }
}

/// One agent's result for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentStep {
    pub agent: AgentHandle,
    pub velocity: Vec3,
    pub position: Vec3,
}

/// Read-only view of an agent inside the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimAgentState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub params: CrowdAgentParams,
}

/// Steering simulation as seen by the crowd core.
///
/// The simulation is the only writer of agent positions and velocities.
/// `step` invokes `on_step` synchronously, once per live agent, in handle
/// order, before returning.
pub trait SteeringSimulation {
    fn add_agent(&mut self, position: Vec3, params: CrowdAgentParams) -> Result<AgentHandle>;

    /// Detach an agent; it receives no further updates. False if unknown.
    fn remove_agent(&mut self, agent: AgentHandle) -> bool;

    /// Send every agent toward the same point.
    fn set_shared_target(&mut self, target: Vec3);

    fn shared_target(&self) -> Option<Vec3>;

    fn step(&mut self, dt: f32, on_step: &mut dyn FnMut(&AgentStep));

    fn agent_count(&self) -> usize;

    fn agent(&self, agent: AgentHandle) -> Option<SimAgentState>;

    fn draw_debug_geometry(&self, _out: &mut DebugGeometry) {}
}

// ============================================================================
// CROWD SIMULATION
// ============================================================================

pub struct CrowdSimulation {
    nav_mesh: Arc<NavMesh>,
    avoidance: ObstacleAvoidanceParams,
    agents: BTreeMap<AgentHandle, SimAgentState>,
    next_handle: u32,
    target: Option<Vec3>,
    flow: Option<FlowField>,
    grid: NeighborGrid,
    // Per-step scratch, reused across steps.
    snapshots: Vec<AgentSnapshot>,
    expected: Vec<Vec2>,
    solved: Vec<Vec2>,
    events: Vec<AgentStep>,
}

impl CrowdSimulation {
    pub fn new(nav_mesh: Arc<NavMesh>, avoidance: ObstacleAvoidanceParams) -> Self {
        debug!(
            "crowd simulation created: vel_bias {} divs {} rings {} depth {}",
            avoidance.vel_bias,
            avoidance.adaptive_divs,
            avoidance.adaptive_rings,
            avoidance.adaptive_depth
        );
        Self {
            nav_mesh,
            avoidance,
            agents: BTreeMap::new(),
            next_handle: 0,
            target: None,
            flow: None,
            grid: NeighborGrid::new(NEIGHBOR_CELL_SIZE),
            snapshots: Vec::new(),
            expected: Vec::new(),
            solved: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn nav_mesh(&self) -> &Arc<NavMesh> {
        &self.nav_mesh
    }

    pub fn avoidance(&self) -> &ObstacleAvoidanceParams {
        &self.avoidance
    }

    fn orca_params(&self, dt: f32) -> OrcaParams {
        OrcaParams {
            time_horizon: self.avoidance.time_horizon.max(1e-3),
            inv_dt: 1.0 / dt,
            vel_bias: self.avoidance.vel_bias,
            max_neighbors: (self.avoidance.adaptive_divs * self.avoidance.adaptive_rings) as usize,
        }
    }
}

/// Velocity an agent would take with nobody around: toward the shared target
/// at max speed, slowing down inside two radii of it or inside its braking
/// distance, whichever is larger.
fn desired_velocity(
    nav: &NavMesh,
    flow: Option<&FlowField>,
    target: Option<Vec3>,
    agent: &SimAgentState,
) -> Vec2 {
    let Some(target) = target else {
        return Vec2::ZERO;
    };
    let to_target = xz(target - agent.position);
    let dist = to_target.length();
    if dist < 1e-4 {
        return Vec2::ZERO;
    }
    let direct = to_target / dist;
    let along_flow = || flow_direction(nav, flow, agent.position).unwrap_or(direct);
    let dir = match agent.params.quality {
        NavigationQuality::Low => direct,
        NavigationQuality::Medium => along_flow(),
        NavigationQuality::High => {
            if nav.has_line_of_sight(agent.position, target) {
                direct
            } else {
                along_flow()
            }
        }
    };
    let braking = if agent.params.max_accel > 0.0 {
        agent.params.max_speed * agent.params.max_speed / (2.0 * agent.params.max_accel)
    } else {
        0.0
    };
    let slow_down_radius = (agent.params.radius * 2.0).max(braking).max(1e-4);
    let speed_scale = (dist / slow_down_radius).min(1.0);
    dir * agent.params.max_speed * speed_scale
}

/// Flowfield heading at `pos`; None at the goal or off the field.
fn flow_direction(nav: &NavMesh, flow: Option<&FlowField>, pos: Vec3) -> Option<Vec2> {
    let flow = flow?;
    let cell = nav.world_to_cell(pos)?;
    if flow.near_goal(cell) {
        return None;
    }
    let dir = flow.sample_cell(cell);
    (dir != Vec2::ZERO).then_some(dir)
}

impl SteeringSimulation for CrowdSimulation {
    fn add_agent(&mut self, position: Vec3, params: CrowdAgentParams) -> Result<AgentHandle> {
        let Some(on_mesh) = self
            .nav_mesh
            .try_nearest_point(position, AGENT_PLACEMENT_EXTENTS)
        else {
            return Err(CrowdError::AgentOffMesh { position });
        };
        let handle = AgentHandle(self.next_handle);
        self.next_handle += 1;
        self.agents.insert(
            handle,
            SimAgentState {
                position: on_mesh,
                velocity: Vec3::ZERO,
                params,
            },
        );
        trace!("agent {handle:?} added at {on_mesh}");
        Ok(handle)
    }

    fn remove_agent(&mut self, agent: AgentHandle) -> bool {
        self.agents.remove(&agent).is_some()
    }

    fn set_shared_target(&mut self, target: Vec3) {
        self.flow = Some(self.nav_mesh.flow_field(target));
        self.target = Some(target);
        debug!("crowd target set to {target} for {} agents", self.agents.len());
    }

    fn shared_target(&self) -> Option<Vec3> {
        self.target
    }

    fn step(&mut self, dt: f32, on_step: &mut dyn FnMut(&AgentStep)) {
        if dt <= 0.0 || self.agents.is_empty() {
            return;
        }
        let params = self.orca_params(dt);

        self.snapshots.clear();
        self.grid.clear();
        for (i, agent) in self.agents.values().enumerate() {
            let desired = desired_velocity(&self.nav_mesh, self.flow.as_ref(), self.target, agent);
            let snapshot = AgentSnapshot {
                pos: xz(agent.position),
                vel: xz(agent.velocity),
                desired_vel: desired,
                radius: agent.params.radius,
                max_speed: agent.params.max_speed,
                pushiness: agent.params.pushiness,
            };
            self.grid.insert(snapshot.pos, i);
            self.snapshots.push(snapshot);
        }

        // First pass predicts neighbours at their desired velocity; later
        // passes feed back the previous pass's answer.
        self.expected.clear();
        self.expected.extend(self.snapshots.iter().map(|s| s.desired_vel));
        for _ in 0..self.avoidance.adaptive_depth.max(1) {
            self.solved.clear();
            for i in 0..self.snapshots.len() {
                let v =
                    compute_orca_velocity(&self.snapshots, &self.expected, i, &self.grid, &params);
                self.solved.push(v);
            }
            std::mem::swap(&mut self.expected, &mut self.solved);
        }

        let cs = self.nav_mesh.params().cell_size;
        let clamp_extents = Vec3::new(cs, AGENT_PLACEMENT_EXTENTS.y, cs);
        self.events.clear();
        for (i, (handle, agent)) in self.agents.iter_mut().enumerate() {
            let current = xz(agent.velocity);
            let mut v = clamp_accel(current, self.expected[i], agent.params.max_accel, dt);
            v = clamp_length(v, agent.params.max_speed);

            let candidate = agent.position + Vec3::new(v.x, 0.0, v.y) * dt;
            let next = self
                .nav_mesh
                .try_nearest_point(candidate, clamp_extents)
                .unwrap_or(agent.position);
            let moved = next - agent.position;
            agent.velocity = Vec3::new(moved.x, 0.0, moved.z) / dt;
            agent.position = next;
            self.events.push(AgentStep {
                agent: *handle,
                velocity: agent.velocity,
                position: agent.position,
            });
        }

        for event in &self.events {
            on_step(event);
        }
    }

    fn agent_count(&self) -> usize {
        self.agents.len()
    }

    fn agent(&self, agent: AgentHandle) -> Option<SimAgentState> {
        self.agents.get(&agent).copied()
    }

    /// Agent radii in yellow, velocities in cyan, target in red.
    fn draw_debug_geometry(&self, out: &mut DebugGeometry) {
        for agent in self.agents.values() {
            let base = agent.position;
            out.add_circle(base, agent.params.radius, 12, Color::YELLOW);
            let head = base + Vec3::Y * agent.params.height;
            out.add_line(base, head, Color::YELLOW);
            out.add_line(head, head + agent.velocity, Color::CYAN);
        }
        if let Some(target) = self.target {
            out.add_cross(target, 0.1, Color::RED);
        }
    }
}

#[inline]
fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

fn clamp_length(v: Vec2, max_len: f32) -> Vec2 {
    let max_len = max_len.max(0.0);
    let len = v.length();
    if len <= max_len || len <= f32::EPSILON {
        v
    } else {
        v * (max_len / len)
    }
}

fn clamp_accel(current: Vec2, desired: Vec2, max_accel: f32, dt: f32) -> Vec2 {
    if !max_accel.is_finite() || max_accel <= 0.0 || dt <= 0.0 {
        return desired;
    }
    current + clamp_length(desired - current, max_accel * dt)
}

// ============================================================================
// TEST SUPPORT
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::components::{GroundPlane, NavigationPushiness};
    use crate::engine::navigation::NavMeshParams;

    fn nav() -> Arc<NavMesh> {
        let plane = GroundPlane {
            center: Vec3::new(0.0, -1.0, 2.0),
            size: Vec2::splat(20.0),
        };
        Arc::new(NavMesh::build(&[plane], NavMeshParams::default()).unwrap())
    }

    fn params(quality: NavigationQuality) -> CrowdAgentParams {
        CrowdAgentParams {
            height: 0.2,
            radius: 0.03,
            max_speed: 0.4,
            max_accel: 0.4,
            quality,
            pushiness: NavigationPushiness::Medium,
        }
    }

    fn run(sim: &mut CrowdSimulation, steps: usize) -> Vec<AgentStep> {
        let mut last = Vec::new();
        for _ in 0..steps {
            last.clear();
            sim.step(1.0 / 30.0, &mut |s: &AgentStep| last.push(*s));
        }
        last
    }

    #[test]
    fn agents_are_placed_on_the_surface() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        let h = sim.add_agent(Vec3::new(0.0, -1.1, 2.0), params(NavigationQuality::High)).unwrap();
        let state = sim.agent(h).unwrap();
        assert!((state.position.y - -1.0).abs() < 1e-5);
        assert_eq!(sim.agent_count(), 1);
    }

    #[test]
    fn off_mesh_agent_is_rejected() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        let err = sim
            .add_agent(Vec3::new(40.0, -1.0, 40.0), params(NavigationQuality::High))
            .unwrap_err();
        assert!(matches!(err, CrowdError::AgentOffMesh { .. }));
    }

    #[test]
    fn no_target_means_no_motion() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        sim.add_agent(Vec3::new(0.0, -1.0, 2.0), params(NavigationQuality::High)).unwrap();
        let steps = run(&mut sim, 5);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].velocity, Vec3::ZERO);
    }

    #[test]
    fn agent_accelerates_toward_target_then_arrives() {
        for quality in [
            NavigationQuality::Low,
            NavigationQuality::Medium,
            NavigationQuality::High,
        ] {
            let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
            let h = sim.add_agent(Vec3::new(0.0, -1.0, 2.0), params(quality)).unwrap();
            sim.set_shared_target(Vec3::new(1.0, -1.0, 2.0));

            let first = run(&mut sim, 1);
            // Acceleration-limited: 0.4 u/s² over one 1/30 s step.
            assert!(first[0].velocity.length() <= 0.4 / 30.0 + 1e-4);
            assert!(first[0].velocity.x > 0.0);

            let moving = run(&mut sim, 60);
            assert!(moving[0].velocity.length() > 0.3, "{quality:?}: {:?}", moving[0]);
            assert!(moving[0].velocity.length() <= 0.4 + 1e-4);

            run(&mut sim, 300);
            let state = sim.agent(h).unwrap();
            assert!(state.position.distance(Vec3::new(1.0, -1.0, 2.0)) < 0.06, "{quality:?}");
            assert!(state.velocity.length() < 0.03);
        }
    }

    #[test]
    fn removed_agents_get_no_callbacks() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        let a = sim.add_agent(Vec3::new(0.0, -1.0, 2.0), params(NavigationQuality::High)).unwrap();
        let b = sim.add_agent(Vec3::new(0.5, -1.0, 2.0), params(NavigationQuality::High)).unwrap();
        assert!(sim.remove_agent(a));
        assert!(!sim.remove_agent(a));
        let steps = run(&mut sim, 1);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].agent, b);
    }

    #[test]
    fn agents_stay_on_the_navmesh() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        let h = sim.add_agent(Vec3::new(9.0, -1.0, 2.0), params(NavigationQuality::Low)).unwrap();
        sim.set_shared_target(Vec3::new(30.0, -1.0, 2.0));
        run(&mut sim, 600);
        let state = sim.agent(h).unwrap();
        assert!(state.position.x <= 9.8 + 1e-4, "left the mesh: {}", state.position);
    }

    #[test]
    fn flow_guided_agents_reach_a_snapped_border_target() {
        for quality in [NavigationQuality::Medium, NavigationQuality::High] {
            let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
            let h = sim.add_agent(Vec3::new(-8.0, -1.0, 2.0), params(quality)).unwrap();
            let target = sim
                .nav_mesh()
                .find_nearest_point(Vec3::new(-9.85, -1.0, 2.0), Vec3::splat(0.1));
            assert!(sim.nav_mesh().is_walkable_at(target), "{target}");
            sim.set_shared_target(target);

            let start = sim.agent(h).unwrap().position;
            let heading = flow_direction(sim.nav_mesh(), sim.flow.as_ref(), start)
                .expect("flow field should cover the agent");
            assert!(heading.x < -0.9, "{quality:?}: {heading}");

            run(&mut sim, 300);
            let state = sim.agent(h).unwrap();
            assert!(state.position.distance(target) < 0.06, "{quality:?}: {}", state.position);
        }
    }

    #[test]
    fn crowd_keeps_agents_apart() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        let handles: Vec<AgentHandle> = (0..4)
            .map(|i| {
                sim.add_agent(Vec3::new(i as f32 * 0.1, -1.0, 2.0), params(NavigationQuality::High))
                    .unwrap()
            })
            .collect();
        sim.set_shared_target(Vec3::new(0.15, -1.0, 3.0));
        run(&mut sim, 400);
        for (i, a) in handles.iter().enumerate() {
            for b in &handles[i + 1..] {
                let pa = sim.agent(*a).unwrap().position;
                let pb = sim.agent(*b).unwrap().position;
                assert!(pa.distance(pb) > 0.03, "agents overlap: {pa} {pb}");
            }
        }
    }

    #[test]
    fn debug_geometry_draws_agents_and_target() {
        let mut sim = CrowdSimulation::new(nav(), ObstacleAvoidanceParams::default());
        sim.add_agent(Vec3::new(0.0, -1.0, 2.0), params(NavigationQuality::High)).unwrap();
        sim.set_shared_target(Vec3::new(1.0, -1.0, 2.0));
        let mut out = DebugGeometry::default();
        sim.draw_debug_geometry(&mut out);
        assert_eq!(out.len(), 12 + 2 + 2);
    }
}
