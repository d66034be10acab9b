// Gesture controller: the first tap places the crowd, every later tap aims a
// screen-center raycast and, after a short delay, sends the crowd there.
//
// The placed crowd lives inside the `AwaitingRetarget` phase, so a navmesh
// and a group exist exactly when the controller is past placement.

use std::collections::VecDeque;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::{PlacementSettings, Settings};
use crate::crowd::group::{CrowdGroup, CrowdGroupManager};
use crate::crowd::locomotion::LocomotionStateMachine;
use crate::engine::camera::ArCamera;
use crate::engine::components::{EntityName, GroundPlane, Transform};
use crate::engine::debug_draw::DebugGeometry;
use crate::engine::navigation::{NavMesh, NavMeshParams};
use crate::engine::raycast::Raycaster;
use crate::engine::steering::{ObstacleAvoidanceParams, SteeringSimulation};
use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    /// Pause between a retarget tap and the retarget itself, in seconds.
    pub retarget_delay_secs: f32,
    /// Search box for snapping a tapped point onto the navmesh.
    pub nearest_point_extents: Vec3,
    pub raycast_max_distance: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            retarget_delay_secs: 1.0,
            nearest_point_extents: Vec3::splat(0.1),
            raycast_max_distance: 100.0,
        }
    }
}

// ============================================================================
// PLACEMENT ANCHOR
// ============================================================================

/// Decides where the crowd is placed on the first tap.
pub trait PlacementAnchor {
    fn resolve(&mut self, world: &mut World, camera: &ArCamera) -> Vec3;
}

/// Always the same point.
pub struct FixedAnchor(pub Vec3);

impl PlacementAnchor for FixedAnchor {
    fn resolve(&mut self, _world: &mut World, _camera: &ArCamera) -> Vec3 {
        self.0
    }
}

/// Screen-center raycast against detected surfaces, falling back to a fixed
/// point on a miss.
pub struct RaycastAnchor<R> {
    raycaster: R,
    fallback: Vec3,
}

impl<R: Raycaster> RaycastAnchor<R> {
    pub fn new(raycaster: R, fallback: Vec3) -> Self {
        Self { raycaster, fallback }
    }
}

impl<R: Raycaster> PlacementAnchor for RaycastAnchor<R> {
    fn resolve(&mut self, world: &mut World, camera: &ArCamera) -> Vec3 {
        self.raycaster
            .cast_from_screen_center(world, camera)
            .unwrap_or_else(|| {
                debug!("no surface under screen center, placing at {}", self.fallback);
                self.fallback
            })
    }
}

// ============================================================================
// GESTURE CONTROLLER
// ============================================================================

/// Builds the steering simulation over a freshly built navmesh.
pub type SimulationFactory =
    Box<dyn Fn(Arc<NavMesh>, ObstacleAvoidanceParams) -> Box<dyn SteeringSimulation>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    AwaitingPlacement,
    AwaitingRetarget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    Placed { agents: usize },
    /// Raycast hit; the retarget runs once the delay has passed.
    RetargetScheduled { hit: Vec3 },
    /// Zero delay: the crowd was sent to `destination` straight away.
    Retargeted { destination: Vec3 },
    Missed,
}

enum Phase {
    AwaitingPlacement,
    AwaitingRetarget(CrowdGroup),
}

struct PendingRetarget {
    hit: Vec3,
    remaining: f32,
}

pub struct GestureController {
    phase: Phase,
    settings: GestureSettings,
    placement: PlacementSettings,
    nav_params: NavMeshParams,
    avoidance: ObstacleAvoidanceParams,
    anchor: Box<dyn PlacementAnchor>,
    raycaster: Box<dyn Raycaster>,
    make_simulation: SimulationFactory,
    manager: CrowdGroupManager,
    pending: VecDeque<PendingRetarget>,
}

impl GestureController {
    pub fn new(
        settings: &Settings,
        anchor: Box<dyn PlacementAnchor>,
        raycaster: Box<dyn Raycaster>,
        make_simulation: SimulationFactory,
    ) -> Self {
        let manager = CrowdGroupManager::new(
            settings.agent.clone(),
            settings.grid.clone(),
            LocomotionStateMachine::new(settings.animation.clips(), settings.animation.tuning()),
            Arc::new(settings.animation.library()),
        );
        Self {
            phase: Phase::AwaitingPlacement,
            settings: settings.gesture.clone(),
            placement: settings.placement.clone(),
            nav_params: settings.nav_mesh,
            avoidance: settings.avoidance,
            anchor,
            raycaster,
            make_simulation,
            manager,
            pending: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> GesturePhase {
        match self.phase {
            Phase::AwaitingPlacement => GesturePhase::AwaitingPlacement,
            Phase::AwaitingRetarget(_) => GesturePhase::AwaitingRetarget,
        }
    }

    pub fn group(&self) -> Option<&CrowdGroup> {
        match &self.phase {
            Phase::AwaitingPlacement => None,
            Phase::AwaitingRetarget(group) => Some(group),
        }
    }

    pub fn manager(&self) -> &CrowdGroupManager {
        &self.manager
    }

    pub fn pending_retargets(&self) -> usize {
        self.pending.len()
    }

    /// Handle one tap. A failed placement leaves the controller waiting for
    /// another placement tap, with nothing left behind in the world.
    pub fn on_tap(&mut self, world: &mut World, camera: &ArCamera) -> Result<TapOutcome> {
        if let Phase::AwaitingPlacement = self.phase {
            let group = self.place(world, camera)?;
            let agents = group.len();
            self.phase = Phase::AwaitingRetarget(group);
            return Ok(TapOutcome::Placed { agents });
        }

        let Some(hit) = self.raycaster.cast_from_screen_center(world, camera) else {
            debug!("retarget tap missed");
            return Ok(TapOutcome::Missed);
        };
        if self.settings.retarget_delay_secs <= 0.0 {
            let destination = self.retarget(hit);
            return Ok(TapOutcome::Retargeted { destination });
        }
        debug!("retarget to {hit} in {}s", self.settings.retarget_delay_secs);
        self.pending.push_back(PendingRetarget {
            hit,
            remaining: self.settings.retarget_delay_secs,
        });
        Ok(TapOutcome::RetargetScheduled { hit })
    }

    fn place(&mut self, world: &mut World, camera: &ArCamera) -> Result<CrowdGroup> {
        let anchor = self.anchor.resolve(world, camera);
        let size = self.placement.ground_size;
        let plane = GroundPlane {
            center: anchor,
            size: Vec2::splat(size),
        };
        let mut transform = Transform::from_position(anchor);
        transform.scale = Vec3::new(size, self.placement.ground_thickness, size);
        let ground = world
            .spawn((EntityName("Ground".to_string()), plane, transform))
            .id();

        let placed = NavMesh::build(&[plane], self.nav_params).and_then(|nav_mesh| {
            let nav_mesh = Arc::new(nav_mesh);
            info!(
                "navmesh built: {}x{} cells, {} walkable, {} tiles",
                nav_mesh.width(),
                nav_mesh.height(),
                nav_mesh.walkable_cell_count(),
                nav_mesh.tile_count()
            );
            let simulation = (self.make_simulation)(Arc::clone(&nav_mesh), self.avoidance);
            self.manager.spawn_grid(world, nav_mesh, simulation, anchor)
        });
        match placed {
            Ok(group) => {
                info!("crowd placed at {anchor}");
                Ok(group)
            }
            Err(err) => {
                warn!("placement at {anchor} failed: {err}");
                world.despawn(ground);
                Err(err)
            }
        }
    }

    /// Snap `point` onto the navmesh and send the whole crowd there.
    ///
    /// # Panics
    /// If no crowd has been placed yet.
    pub fn retarget(&mut self, point: Vec3) -> Vec3 {
        let Phase::AwaitingRetarget(group) = &mut self.phase else {
            panic!("retarget before the crowd was placed");
        };
        let destination = group
            .nav_mesh()
            .find_nearest_point(point, self.settings.nearest_point_extents);
        self.manager.retarget(group, destination);
        destination
    }

    /// Resume due retargets, then step the crowd.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        for pending in &mut self.pending {
            pending.remaining -= dt;
        }
        while self.pending.front().is_some_and(|p| p.remaining <= 0.0) {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            if self.group().is_none() {
                debug!("dropping retarget to {}: no crowd", pending.hit);
                continue;
            }
            self.retarget(pending.hit);
        }

        if let Phase::AwaitingRetarget(group) = &mut self.phase {
            self.manager.step(group, world, dt);
        }
    }

    /// Kill every agent; zero before placement.
    pub fn kill_all(&mut self, world: &mut World) -> usize {
        match &mut self.phase {
            Phase::AwaitingPlacement => 0,
            Phase::AwaitingRetarget(group) => self.manager.kill_all(group, world),
        }
    }

    pub fn draw_debug_geometry(&self, out: &mut DebugGeometry) {
        if let Some(group) = self.group() {
            group.draw_debug_geometry(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::crowd::locomotion::LocomotionState;
    use crate::engine::steering::testing::{RecordingSimulation, SimCall};

    /// Hands out scripted hits in order; None once exhausted.
    struct ScriptedRaycaster {
        hits: Rc<RefCell<VecDeque<Option<Vec3>>>>,
    }

    impl Raycaster for ScriptedRaycaster {
        fn cast_from_screen_center(
            &mut self,
            _world: &mut World,
            _camera: &ArCamera,
        ) -> Option<Vec3> {
            self.hits.borrow_mut().pop_front().flatten()
        }
    }

    struct Harness {
        world: World,
        camera: ArCamera,
        gesture: GestureController,
        log: Rc<RefCell<Vec<SimCall>>>,
        hits: Rc<RefCell<VecDeque<Option<Vec3>>>>,
    }

    fn harness(settings: Settings) -> Harness {
        let log = Rc::new(RefCell::new(Vec::new()));
        let hits = Rc::new(RefCell::new(VecDeque::new()));
        let factory_log = Rc::clone(&log);
        let gesture = GestureController::new(
            &settings,
            Box::new(FixedAnchor(settings.placement.anchor)),
            Box::new(ScriptedRaycaster { hits: Rc::clone(&hits) }),
            Box::new(move |_nav: Arc<NavMesh>, _avoidance: ObstacleAvoidanceParams| {
                let sim = RecordingSimulation::with_log(Rc::clone(&factory_log));
                Box::new(sim) as Box<dyn SteeringSimulation>
            }),
        );
        Harness {
            world: World::new(),
            camera: ArCamera::default(),
            gesture,
            log,
            hits,
        }
    }

    fn frames(h: &mut Harness, n: usize) {
        for _ in 0..n {
            h.gesture.update(&mut h.world, 1.0 / 30.0);
        }
    }

    fn non_step_calls(log: &Rc<RefCell<Vec<SimCall>>>) -> Vec<SimCall> {
        log.borrow().iter().filter(|c| **c != SimCall::Step).cloned().collect()
    }

    #[test]
    fn place_retarget_miss_scenario() {
        let mut h = harness(Settings::default());

        // Frame 0: place.
        assert_eq!(h.gesture.phase(), GesturePhase::AwaitingPlacement);
        let outcome = h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        assert_eq!(outcome, TapOutcome::Placed { agents: 16 });
        assert_eq!(h.gesture.phase(), GesturePhase::AwaitingRetarget);
        let group = h.gesture.group().unwrap();
        assert_eq!(group.len(), 16);
        assert_eq!(group.nav_mesh().width(), 100);
        frames(&mut h, 10);

        // Frame 10: tap hits P just off the walkable area.
        let p = Vec3::new(9.85, -1.0, 2.0);
        h.hits.borrow_mut().push_back(Some(p));
        h.log.borrow_mut().clear();
        let outcome = h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        assert_eq!(outcome, TapOutcome::RetargetScheduled { hit: p });
        assert!(non_step_calls(&h.log).is_empty());

        // Retarget lands after the one second delay.
        frames(&mut h, 31);
        let expected = h
            .gesture
            .group()
            .unwrap()
            .nav_mesh()
            .find_nearest_point(p, Vec3::splat(0.1));
        assert!((expected.x - 9.8).abs() < 1e-4);
        assert_eq!(non_step_calls(&h.log), vec![SimCall::SetTarget(expected)]);
        assert_eq!(h.gesture.pending_retargets(), 0);

        // Frame 20: miss.
        h.log.borrow_mut().clear();
        h.hits.borrow_mut().push_back(None);
        let outcome = h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        assert_eq!(outcome, TapOutcome::Missed);
        assert_eq!(h.gesture.phase(), GesturePhase::AwaitingRetarget);
        assert!(h.log.borrow().is_empty());
        assert_eq!(h.gesture.pending_retargets(), 0);
    }

    #[test]
    fn retarget_waits_for_the_delay() {
        let mut h = harness(Settings::default());
        h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        h.hits.borrow_mut().push_back(Some(Vec3::new(1.0, -1.0, 3.0)));
        h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        h.log.borrow_mut().clear();

        frames(&mut h, 20);
        assert!(non_step_calls(&h.log).is_empty());
        // Steps keep running during the delay.
        assert_eq!(h.log.borrow().len(), 20);

        frames(&mut h, 15);
        assert_eq!(non_step_calls(&h.log).len(), 1);
    }

    #[test]
    fn zero_delay_retargets_immediately() {
        let mut settings = Settings::default();
        settings.gesture.retarget_delay_secs = 0.0;
        let mut h = harness(settings);
        h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        h.log.borrow_mut().clear();

        let p = Vec3::new(1.0, -1.0, 3.0);
        h.hits.borrow_mut().push_back(Some(p));
        let outcome = h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        let TapOutcome::Retargeted { destination } = outcome else {
            panic!("expected an immediate retarget, got {outcome:?}");
        };
        assert!(destination.distance(p) < 1e-5);
        assert_eq!(*h.log.borrow(), vec![SimCall::SetTarget(destination)]);
        assert_eq!(h.gesture.group().unwrap().destination(), Some(destination));
    }

    #[test]
    #[should_panic(expected = "retarget before the crowd was placed")]
    fn retarget_before_placement_panics() {
        let mut h = harness(Settings::default());
        h.gesture.retarget(Vec3::ZERO);
    }

    #[test]
    fn failed_placement_stays_unplaced() {
        let mut settings = Settings::default();
        settings.nav_mesh.cell_size = 0.0;
        let mut h = harness(settings);
        assert!(h.gesture.on_tap(&mut h.world, &h.camera).is_err());
        assert_eq!(h.gesture.phase(), GesturePhase::AwaitingPlacement);
        assert_eq!(h.world.entities().len(), 0);
    }

    #[test]
    fn kill_all_before_placement_is_zero() {
        let mut h = harness(Settings::default());
        assert_eq!(h.gesture.kill_all(&mut h.world), 0);
        h.gesture.on_tap(&mut h.world, &h.camera).unwrap();
        assert_eq!(h.gesture.kill_all(&mut h.world), 16);
        assert_eq!(h.gesture.kill_all(&mut h.world), 0);
        let group = h.gesture.group().unwrap();
        assert!(group.agents().iter().all(|a| a.state() == LocomotionState::Dead));
    }

    #[test]
    fn raycast_anchor_falls_back_on_miss() {
        let hits = Rc::new(RefCell::new(VecDeque::from([Some(Vec3::ONE), None])));
        let mut anchor = RaycastAnchor::new(ScriptedRaycaster { hits }, Vec3::new(0.0, -1.0, 2.0));
        let mut world = World::new();
        let camera = ArCamera::default();
        assert_eq!(anchor.resolve(&mut world, &camera), Vec3::ONE);
        assert_eq!(anchor.resolve(&mut world, &camera), Vec3::new(0.0, -1.0, 2.0));
    }
}
