// Locomotion state machine: turns one simulation step's velocity into the
// animation commands that keep an agent's clips in sync with its motion.

use glam::{Quat, Vec3};

use crate::engine::animation::{AnimationController, ClipName};
use crate::engine::components::Transform;

/// Speeds at or below this never produce a facing update.
const FACE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocomotionState {
    #[default]
    Idle,
    Walking,
    /// Terminal; set only by a kill.
    Dead,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocomotionClips {
    pub walk: ClipName,
    pub idle: ClipName,
    pub death: ClipName,
}

/// Speed below which a walking agent drops back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StopSpeed {
    /// The agent's own collision radius, read as a speed.
    #[default]
    AgentRadius,
    Fixed(f32),
}

impl StopSpeed {
    pub fn threshold(self, agent_radius: f32) -> f32 {
        match self {
            StopSpeed::AgentRadius => agent_radius,
            StopSpeed::Fixed(speed) => speed,
        }
    }
}

/// Cross-fade times in seconds plus the stop threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocomotionTuning {
    pub walk_fade_in: f32,
    pub walk_fade_out: f32,
    pub idle_fade_in: f32,
    pub death_fade_in: f32,
    pub stop_speed: StopSpeed,
}

impl Default for LocomotionTuning {
    fn default() -> Self {
        Self {
            walk_fade_in: 0.1,
            walk_fade_out: 0.8,
            idle_fade_in: 0.2,
            death_fade_in: 0.4,
            stop_speed: StopSpeed::AgentRadius,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationCommand {
    Play {
        clip: ClipName,
        start_time: f32,
        looped: bool,
        fade_in: f32,
    },
    Stop {
        clip: ClipName,
        fade_out: f32,
    },
    /// Change a playing clip's rate without restarting it.
    SetSpeed { clip: ClipName, speed: f32 },
    /// Turn the model to face a unit direction.
    Face { direction: Vec3 },
}

impl AnimationCommand {
    /// Apply a clip command; `Face` is ignored here.
    pub fn apply_to_animation(&self, controller: &mut AnimationController) {
        match self {
            AnimationCommand::Play {
                clip,
                start_time,
                looped,
                fade_in,
            } => {
                controller.play(clip, *start_time, *looped, *fade_in);
            }
            AnimationCommand::Stop { clip, fade_out } => {
                controller.stop(clip, *fade_out);
            }
            AnimationCommand::SetSpeed { clip, speed } => {
                controller.set_speed(clip, *speed);
            }
            AnimationCommand::Face { .. } => {}
        }
    }

    /// Apply a `Face` command; clip commands are ignored here.
    pub fn apply_to_transform(&self, transform: &mut Transform) {
        if let AnimationCommand::Face { direction } = self {
            transform.rotation = facing_rotation(*direction);
        }
    }
}

/// Yaw that turns the model's forward axis (-Z) onto `direction`'s XZ heading.
pub fn facing_rotation(direction: Vec3) -> Quat {
    Quat::from_rotation_y((-direction.x).atan2(-direction.z))
}

#[derive(Debug, Clone)]
pub struct LocomotionStateMachine {
    clips: LocomotionClips,
    tuning: LocomotionTuning,
}

impl LocomotionStateMachine {
    pub fn new(clips: LocomotionClips, tuning: LocomotionTuning) -> Self {
        Self { clips, tuning }
    }

    pub fn clips(&self) -> &LocomotionClips {
        &self.clips
    }

    pub fn tuning(&self) -> &LocomotionTuning {
        &self.tuning
    }

    /// Decide the next locomotion state and the commands that get there.
    ///
    /// `walk_playing` is None when the agent has no animation controller; the
    /// agent then keeps its state and gets no commands. A playing walk clip
    /// always has its rate retargeted to `speed / max_speed`, and the agent
    /// turns toward any horizontal velocity. Above the stop speed a walk clip
    /// that is not playing gets started. Below it a walking agent stops walking and fades to idle,
    /// once. Dead agents never get commands.
    pub fn evaluate(
        &self,
        state: LocomotionState,
        velocity: Vec3,
        agent_radius: f32,
        agent_max_speed: f32,
        walk_playing: Option<bool>,
    ) -> (LocomotionState, Vec<AnimationCommand>) {
        let Some(walk_playing) = walk_playing else {
            return (state, Vec::new());
        };
        if state == LocomotionState::Dead {
            return (state, Vec::new());
        }

        let speed = velocity.length();
        let mut commands = Vec::new();
        if walk_playing {
            let ratio = if agent_max_speed > 0.0 {
                (speed / agent_max_speed).max(0.0)
            } else {
                0.0
            };
            commands.push(AnimationCommand::SetSpeed {
                clip: self.clips.walk.clone(),
                speed: ratio,
            });
            let heading = Vec3::new(velocity.x, 0.0, velocity.z);
            if heading.length() > FACE_EPSILON {
                commands.push(AnimationCommand::Face {
                    direction: heading.normalize(),
                });
            }
        }

        if speed < self.tuning.stop_speed.threshold(agent_radius) {
            if state == LocomotionState::Walking || walk_playing {
                commands.push(AnimationCommand::Stop {
                    clip: self.clips.walk.clone(),
                    fade_out: self.tuning.walk_fade_out,
                });
                commands.push(self.idle_command());
            }
            return (LocomotionState::Idle, commands);
        }

        if !walk_playing {
            commands.push(AnimationCommand::Play {
                clip: self.clips.walk.clone(),
                start_time: 0.0,
                looped: true,
                fade_in: self.tuning.walk_fade_in,
            });
        }
        (LocomotionState::Walking, commands)
    }

    /// Idle clip, looped, faded in; also what a freshly spawned agent plays.
    pub fn idle_command(&self) -> AnimationCommand {
        AnimationCommand::Play {
            clip: self.clips.idle.clone(),
            start_time: 0.0,
            looped: true,
            fade_in: self.tuning.idle_fade_in,
        }
    }

    pub fn death_command(&self) -> AnimationCommand {
        AnimationCommand::Play {
            clip: self.clips.death.clone(),
            start_time: 0.0,
            looped: false,
            fade_in: self.tuning.death_fade_in,
        }
    }
}
