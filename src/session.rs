// Crowd session: the single owner of the scene world, the viewpoint, and the
// gesture controller (and through it, the crowd). Hosts drive it with one
// `update` per frame, `post_render` after drawing, and input callbacks.

use std::sync::Arc;

use bevy_ecs::prelude::*;
use log::{info, warn};

use crate::config::Settings;
use crate::crowd::group::{CrowdGroup, GroupCensus};
use crate::engine::camera::ArCamera;
use crate::engine::debug_draw::DebugGeometry;
use crate::engine::navigation::NavMesh;
use crate::engine::raycast::{Raycaster, SceneRaycaster};
use crate::engine::steering::{CrowdSimulation, ObstacleAvoidanceParams, SteeringSimulation};
use crate::engine::systems::{FrameTime, frame_schedule};
use crate::gesture::{
    FixedAnchor, GestureController, GesturePhase, PlacementAnchor, SimulationFactory, TapOutcome,
};

/// Snapshot for status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: GesturePhase,
    pub census: GroupCensus,
    pub pending_retargets: usize,
}

pub struct CrowdSession {
    world: World,
    schedule: Schedule,
    camera: ArCamera,
    gesture: GestureController,
    debug_draw: bool,
    debug_geometry: DebugGeometry,
}

impl CrowdSession {
    /// Session with the stock collaborators: fixed placement anchor, scene
    /// raycaster, and the in-crate crowd simulation.
    pub fn new(settings: &Settings) -> Self {
        let factory: SimulationFactory =
            Box::new(|nav_mesh: Arc<NavMesh>, avoidance: ObstacleAvoidanceParams| {
                Box::new(CrowdSimulation::new(nav_mesh, avoidance)) as Box<dyn SteeringSimulation>
            });
        Self::with_collaborators(
            settings,
            Box::new(FixedAnchor(settings.placement.anchor)),
            Box::new(SceneRaycaster::new(settings.gesture.raycast_max_distance)),
            factory,
        )
    }

    pub fn with_collaborators(
        settings: &Settings,
        anchor: Box<dyn PlacementAnchor>,
        raycaster: Box<dyn Raycaster>,
        make_simulation: SimulationFactory,
    ) -> Self {
        let mut world = World::new();
        world.insert_resource(FrameTime::default());
        Self {
            world,
            schedule: frame_schedule(),
            camera: ArCamera::default(),
            gesture: GestureController::new(settings, anchor, raycaster, make_simulation),
            debug_draw: settings.debug_draw,
            debug_geometry: DebugGeometry::default(),
        }
    }

    /// One frame: due retargets, the simulation step with its animation
    /// commands, then animation playback.
    pub fn update(&mut self, dt: f32) {
        self.gesture.update(&mut self.world, dt);
        self.world.resource_mut::<FrameTime>().delta = dt;
        self.schedule.run(&mut self.world);
    }

    /// Collect debug geometry for the frame just rendered; empty when debug
    /// drawing is off.
    pub fn post_render(&mut self) -> &DebugGeometry {
        self.debug_geometry.clear();
        if self.debug_draw {
            self.gesture.draw_debug_geometry(&mut self.debug_geometry);
        }
        &self.debug_geometry
    }

    /// Tap at screen center. Placement errors are logged and leave the
    /// session unplaced.
    pub fn on_tap(&mut self) -> Option<TapOutcome> {
        match self.gesture.on_tap(&mut self.world, &self.camera) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!("tap ignored: {err}");
                None
            }
        }
    }

    pub fn kill_all(&mut self) -> usize {
        self.gesture.kill_all(&mut self.world)
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.debug_draw = !self.debug_draw;
        info!("debug drawing {}", if self.debug_draw { "on" } else { "off" });
        self.debug_draw
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.gesture.phase(),
            census: self.group().map(CrowdGroup::census).unwrap_or_default(),
            pending_retargets: self.gesture.pending_retargets(),
        }
    }

    pub fn phase(&self) -> GesturePhase {
        self.gesture.phase()
    }

    pub fn group(&self) -> Option<&CrowdGroup> {
        self.gesture.group()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn camera(&self) -> &ArCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut ArCamera {
        &mut self.camera
    }
}
