// ECS systems for per-frame scene updates.
// Systems operate on entities with specific component combinations.

use bevy_ecs::prelude::*;

use super::animation::AnimationController;

/// Seconds elapsed since the previous frame.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct FrameTime {
    pub delta: f32,
}

/// Advance clip playback and cross-fades on every animated entity.
pub fn animation_system(time: Res<FrameTime>, mut query: Query<&mut AnimationController>) {
    for mut controller in query.iter_mut() {
        controller.advance(time.delta);
    }
}

/// Systems run once per frame after the steering step.
pub fn frame_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(animation_system);
    schedule
}
