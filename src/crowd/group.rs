// Crowd group: every live agent on one navmesh, the steering simulation they
// share, and their common destination. The manager owns the group-level
// operations and the fan-out of simulation steps to agents.

use std::collections::HashMap;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, info, warn};
use serde::Deserialize;

use super::agent::{AgentTemplate, CrowdAgentController};
use super::locomotion::{LocomotionState, LocomotionStateMachine};
use crate::engine::animation::ClipLibrary;
use crate::engine::debug_draw::DebugGeometry;
use crate::engine::navigation::NavMesh;
use crate::engine::steering::{AgentHandle, AgentStep, SteeringSimulation};
use crate::error::Result;

/// Spawn grid: `rows * cols` agents at `origin + (i * spacing_x, y_offset,
/// j * spacing_z)`, named `"{name_prefix} {i * cols + j + 1}"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
    pub spacing_x: f32,
    pub spacing_z: f32,
    pub y_offset: f32,
    pub name_prefix: String,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            spacing_x: 0.15,
            spacing_z: 0.13,
            y_offset: -0.1,
            name_prefix: "Mutant".to_string(),
        }
    }
}

impl GridLayout {
    pub fn agent_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Names and positions in row-major order.
    pub fn slots(&self, origin: Vec3) -> Vec<(String, Vec3)> {
        let mut slots = Vec::with_capacity(self.agent_count());
        for i in 0..self.rows {
            for j in 0..self.cols {
                let offset =
                    Vec3::new(i as f32 * self.spacing_x, self.y_offset, j as f32 * self.spacing_z);
                let name = format!("{} {}", self.name_prefix, i * self.cols + j + 1);
                slots.push((name, origin + offset));
            }
        }
        slots
    }
}

/// Counts of agents per locomotion state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupCensus {
    pub idle: usize,
    pub walking: usize,
    pub dead: usize,
}

pub struct CrowdGroup {
    nav_mesh: Arc<NavMesh>,
    simulation: Box<dyn SteeringSimulation>,
    /// Spawn order.
    agents: Vec<CrowdAgentController>,
    by_handle: HashMap<AgentHandle, usize>,
    destination: Option<Vec3>,
}

impl CrowdGroup {
    pub fn nav_mesh(&self) -> &Arc<NavMesh> {
        &self.nav_mesh
    }

    pub fn simulation(&self) -> &dyn SteeringSimulation {
        self.simulation.as_ref()
    }

    pub fn agents(&self) -> &[CrowdAgentController] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn agent_by_handle(&self, handle: AgentHandle) -> Option<&CrowdAgentController> {
        self.by_handle.get(&handle).map(|&i| &self.agents[i])
    }

    pub fn census(&self) -> GroupCensus {
        let mut census = GroupCensus::default();
        for agent in &self.agents {
            match agent.state() {
                LocomotionState::Idle => census.idle += 1,
                LocomotionState::Walking => census.walking += 1,
                LocomotionState::Dead => census.dead += 1,
            }
        }
        census
    }

    pub fn draw_debug_geometry(&self, out: &mut DebugGeometry) {
        self.nav_mesh.draw_debug_geometry(out);
        self.simulation.draw_debug_geometry(out);
    }
}

pub struct CrowdGroupManager {
    template: AgentTemplate,
    layout: GridLayout,
    locomotion: LocomotionStateMachine,
    library: Arc<ClipLibrary>,
}

impl CrowdGroupManager {
    pub fn new(
        template: AgentTemplate,
        layout: GridLayout,
        locomotion: LocomotionStateMachine,
        library: Arc<ClipLibrary>,
    ) -> Self {
        Self {
            template,
            layout,
            locomotion,
            library,
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn locomotion(&self) -> &LocomotionStateMachine {
        &self.locomotion
    }

    /// Spawn the agent grid around `origin` into a new group. On failure every
    /// agent spawned so far is despawned and detached again.
    pub fn spawn_grid(
        &self,
        world: &mut World,
        nav_mesh: Arc<NavMesh>,
        mut simulation: Box<dyn SteeringSimulation>,
        origin: Vec3,
    ) -> Result<CrowdGroup> {
        let slots = self.layout.slots(origin);
        let mut agents = Vec::with_capacity(slots.len());
        for (name, position) in slots {
            match CrowdAgentController::spawn(
                world,
                simulation.as_mut(),
                &self.template,
                &self.locomotion,
                &self.library,
                position,
                &name,
            ) {
                Ok(agent) => agents.push(agent),
                Err(err) => {
                    warn!("could not spawn {name}: {err}");
                    for agent in &agents {
                        simulation.remove_agent(agent.handle());
                        world.despawn(agent.entity());
                    }
                    return Err(err);
                }
            }
        }

        let by_handle = agents.iter().enumerate().map(|(i, a)| (a.handle(), i)).collect();
        info!("spawned {} agents around {origin}", agents.len());
        Ok(CrowdGroup {
            nav_mesh,
            simulation,
            agents,
            by_handle,
            destination: None,
        })
    }

    /// Send every agent of the group to `destination` in one call.
    pub fn retarget(&self, group: &mut CrowdGroup, destination: Vec3) {
        group.simulation.set_shared_target(destination);
        group.destination = Some(destination);
        info!("crowd retargeted to {destination}");
    }

    /// Kill every agent, iterating a snapshot of the membership. Returns how
    /// many were alive.
    pub fn kill_all(&self, group: &mut CrowdGroup, world: &mut World) -> usize {
        let members: Vec<AgentHandle> = group.agents.iter().map(|a| a.handle()).collect();
        let mut killed = 0;
        for handle in members {
            let Some(&index) = group.by_handle.get(&handle) else {
                continue;
            };
            if group.agents[index].kill(world, group.simulation.as_mut(), &self.locomotion) {
                killed += 1;
            }
        }
        if killed > 0 {
            info!("killed {killed} agents");
        }
        killed
    }

    /// Route one simulation result to its agent.
    pub fn on_simulation_step(&self, group: &mut CrowdGroup, world: &mut World, step: &AgentStep) {
        dispatch_step(&mut group.agents, &group.by_handle, &self.locomotion, world, step);
    }

    /// Advance the group's simulation by `dt`; every agent result is applied
    /// before this returns.
    pub fn step(&self, group: &mut CrowdGroup, world: &mut World, dt: f32) {
        let CrowdGroup {
            simulation,
            agents,
            by_handle,
            ..
        } = group;
        simulation.step(dt, &mut |step: &AgentStep| {
            dispatch_step(agents, by_handle, &self.locomotion, world, step);
        });
    }
}

fn dispatch_step(
    agents: &mut [CrowdAgentController],
    by_handle: &HashMap<AgentHandle, usize>,
    locomotion: &LocomotionStateMachine,
    world: &mut World,
    step: &AgentStep,
) {
    match by_handle.get(&step.agent) {
        Some(&index) => agents[index].on_simulation_step(world, locomotion, step),
        None => debug!("step for unknown agent {:?}", step.agent),
    }
}
