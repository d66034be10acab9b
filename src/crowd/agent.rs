// One crowd agent: its scene entity, its handle in the steering simulation,
// and its locomotion state.

use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, trace};
use serde::Deserialize;

use super::locomotion::{AnimationCommand, LocomotionState, LocomotionStateMachine};
use crate::engine::animation::{AnimationController, ClipLibrary};
use crate::engine::components::{
    CrowdAgentParams, EntityName, ModelRef, NavigationPushiness, NavigationQuality, Transform,
    Velocity,
};
use crate::engine::steering::{AgentHandle, AgentStep, SteeringSimulation};
use crate::error::Result;

/// Per-spawn constants shared by every agent of a group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentTemplate {
    pub height: f32,
    pub radius: f32,
    pub max_speed: f32,
    pub max_accel: f32,
    pub quality: NavigationQuality,
    pub pushiness: NavigationPushiness,
    /// Uniform visual scale of the model.
    pub scale: f32,
    pub model: String,
    pub material: String,
    pub cast_shadows: bool,
}

impl Default for AgentTemplate {
    fn default() -> Self {
        Self {
            height: 0.2,
            radius: 0.03,
            max_speed: 0.4,
            max_accel: 0.4,
            quality: NavigationQuality::High,
            pushiness: NavigationPushiness::Medium,
            scale: 0.12,
            model: "Models/Mutant.mdl".to_string(),
            material: "Materials/mutant_M.xml".to_string(),
            cast_shadows: true,
        }
    }
}

impl AgentTemplate {
    pub fn params(&self) -> CrowdAgentParams {
        CrowdAgentParams {
            height: self.height,
            radius: self.radius,
            max_speed: self.max_speed,
            max_accel: self.max_accel,
            quality: self.quality,
            pushiness: self.pushiness,
        }
    }
}

#[derive(Debug)]
pub struct CrowdAgentController {
    entity: Entity,
    handle: AgentHandle,
    name: String,
    params: CrowdAgentParams,
    state: LocomotionState,
}

impl CrowdAgentController {
    /// Spawn the agent entity idling at `position` and register it with the
    /// simulation. If the simulation rejects the agent the entity is despawned.
    pub fn spawn(
        world: &mut World,
        simulation: &mut dyn SteeringSimulation,
        template: &AgentTemplate,
        locomotion: &LocomotionStateMachine,
        library: &Arc<ClipLibrary>,
        position: Vec3,
        name: &str,
    ) -> Result<Self> {
        let params = template.params();
        let mut animation = AnimationController::new(Arc::clone(library));
        locomotion.idle_command().apply_to_animation(&mut animation);

        let entity = world
            .spawn((
                EntityName(name.to_string()),
                Transform::from_position(position).with_uniform_scale(template.scale),
                Velocity::default(),
                ModelRef {
                    model: template.model.clone(),
                    material: template.material.clone(),
                    cast_shadows: template.cast_shadows,
                },
                animation,
                params,
            ))
            .id();

        let handle = match simulation.add_agent(position, params) {
            Ok(handle) => handle,
            Err(err) => {
                world.despawn(entity);
                return Err(err);
            }
        };
        // The simulation may have snapped the agent onto the surface.
        if let (Some(state), Some(mut transform)) =
            (simulation.agent(handle), world.get_mut::<Transform>(entity))
        {
            transform.position = state.position;
        }
        debug!("spawned {name} as {entity:?} / {handle:?}");

        Ok(Self {
            entity,
            handle,
            name: name.to_string(),
            params,
            state: LocomotionState::Idle,
        })
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &CrowdAgentParams {
        &self.params
    }

    pub fn state(&self) -> LocomotionState {
        self.state
    }

    pub fn is_dead(&self) -> bool {
        self.state == LocomotionState::Dead
    }

    /// Mirror the simulation's result onto the entity and apply the
    /// locomotion commands before returning.
    pub fn on_simulation_step(
        &mut self,
        world: &mut World,
        locomotion: &LocomotionStateMachine,
        step: &AgentStep,
    ) {
        if self.is_dead() {
            return;
        }
        if let Some(mut transform) = world.get_mut::<Transform>(self.entity) {
            transform.position = step.position;
        }
        if let Some(mut velocity) = world.get_mut::<Velocity>(self.entity) {
            velocity.linear = step.velocity;
        }

        let walk_playing = world
            .get::<AnimationController>(self.entity)
            .map(|animation| animation.is_playing(&locomotion.clips().walk));
        let (next, commands) = locomotion.evaluate(
            self.state,
            step.velocity,
            self.params.radius,
            self.params.max_speed,
            walk_playing,
        );
        if next != self.state {
            trace!("{}: {:?} -> {:?}", self.name, self.state, next);
        }
        self.state = next;
        self.apply(world, &commands);
    }

    fn apply(&self, world: &mut World, commands: &[AnimationCommand]) {
        for command in commands {
            match command {
                AnimationCommand::Face { .. } => {
                    if let Some(mut transform) = world.get_mut::<Transform>(self.entity) {
                        command.apply_to_transform(&mut transform);
                    }
                }
                _ => {
                    if let Some(mut animation) = world.get_mut::<AnimationController>(self.entity) {
                        command.apply_to_animation(&mut animation);
                    }
                }
            }
        }
    }

    /// Detach from the simulation and play the death clip. The entity stays
    /// so the clip can play out. Returns false if the agent was already dead.
    pub fn kill(
        &mut self,
        world: &mut World,
        simulation: &mut dyn SteeringSimulation,
        locomotion: &LocomotionStateMachine,
    ) -> bool {
        if self.is_dead() {
            return false;
        }
        simulation.remove_agent(self.handle);
        self.apply(world, &[locomotion.death_command()]);
        if let Some(mut velocity) = world.get_mut::<Velocity>(self.entity) {
            velocity.linear = Vec3::ZERO;
        }
        self.state = LocomotionState::Dead;
        debug!("{} killed", self.name);
        true
    }
}
