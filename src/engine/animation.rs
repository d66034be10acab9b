// Animation control: per-entity clip playback with linear cross-fades.
//
// Clips stack in the order they were first started. The blend is evaluated
// top-down: a clip at full weight hides everything started before it, so
// fading one clip out reveals the one underneath.

use std::collections::HashMap;
use std::sync::Arc;

use bevy_ecs::prelude::*;
use log::warn;

/// Shared clip identifier; cheap to clone into per-step commands.
pub type ClipName = Arc<str>;

/// Known clips and their lengths in seconds.
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    lengths: HashMap<ClipName, f32>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, length: f32) {
        self.lengths.insert(Arc::from(name), length.max(0.0));
    }

    pub fn length(&self, name: &str) -> Option<f32> {
        self.lengths.get(name).copied()
    }
}

#[derive(Debug, Clone)]
struct ClipState {
    clip: ClipName,
    length: f32,
    time: f32,
    speed: f32,
    weight: f32,
    target_weight: f32,
    fade_time: f32,
    looped: bool,
}

/// Animation-control handle attached to an animated entity.
#[derive(Component, Debug, Clone)]
pub struct AnimationController {
    library: Arc<ClipLibrary>,
    /// Bottom of the blend stack first.
    states: Vec<ClipState>,
}

impl AnimationController {
    pub fn new(library: Arc<ClipLibrary>) -> Self {
        Self {
            library,
            states: Vec::new(),
        }
    }

    fn state(&self, clip: &str) -> Option<&ClipState> {
        self.states.iter().find(|s| &*s.clip == clip)
    }

    fn state_mut(&mut self, clip: &str) -> Option<&mut ClipState> {
        self.states.iter_mut().find(|s| &*s.clip == clip)
    }

    /// Fade `clip` in to full weight over `fade_in` seconds.
    ///
    /// A clip that is already present keeps its playback time and place in the
    /// stack; only a newly started clip begins at `start_time`. Returns false
    /// for clips the library does not know.
    pub fn play(&mut self, clip: &ClipName, start_time: f32, looped: bool, fade_in: f32) -> bool {
        if let Some(state) = self.state_mut(clip) {
            state.target_weight = 1.0;
            state.fade_time = fade_in.max(0.0);
            state.looped = looped;
            return true;
        }
        let Some(length) = self.library.length(clip) else {
            warn!("cannot play unknown animation clip {clip}");
            return false;
        };
        let fade_time = fade_in.max(0.0);
        self.states.push(ClipState {
            clip: clip.clone(),
            length,
            time: start_time.clamp(0.0, length),
            speed: 1.0,
            weight: if fade_time > 0.0 { 0.0 } else { 1.0 },
            target_weight: 1.0,
            fade_time,
            looped,
        });
        true
    }

    /// Fade `clip` out over `fade_out` seconds; it is dropped once silent.
    pub fn stop(&mut self, clip: &str, fade_out: f32) -> bool {
        let Some(state) = self.state_mut(clip) else {
            return false;
        };
        state.target_weight = 0.0;
        state.fade_time = fade_out.max(0.0);
        if state.fade_time == 0.0 {
            self.states.retain(|s| &*s.clip != clip);
        }
        true
    }

    /// Playback rate multiplier; does not restart the clip.
    pub fn set_speed(&mut self, clip: &str, speed: f32) -> bool {
        match self.state_mut(clip) {
            Some(state) => {
                state.speed = speed;
                true
            }
            None => false,
        }
    }

    /// True while the clip is present and not on its way out.
    pub fn is_playing(&self, clip: &str) -> bool {
        self.state(clip).is_some_and(|s| s.target_weight > 0.0)
    }

    pub fn weight(&self, clip: &str) -> f32 {
        self.state(clip).map_or(0.0, |s| s.weight)
    }

    pub fn speed(&self, clip: &str) -> Option<f32> {
        self.state(clip).map(|s| s.speed)
    }

    pub fn time(&self, clip: &str) -> Option<f32> {
        self.state(clip).map(|s| s.time)
    }

    /// One-shot clip that reached its end.
    pub fn is_finished(&self, clip: &str) -> bool {
        self.state(clip)
            .is_some_and(|s| !s.looped && s.time >= s.length)
    }

    pub fn clip_count(&self) -> usize {
        self.states.len()
    }

    /// Advance playback time and fades by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        for s in &mut self.states {
            s.time += dt * s.speed;
            if s.looped && s.length > 0.0 {
                s.time = s.time.rem_euclid(s.length);
            } else {
                s.time = s.time.clamp(0.0, s.length);
            }

            if s.fade_time <= 0.0 {
                s.weight = s.target_weight;
            } else {
                let step = dt / s.fade_time;
                s.weight = if s.weight < s.target_weight {
                    (s.weight + step).min(s.target_weight)
                } else {
                    (s.weight - step).max(s.target_weight)
                };
            }
        }
        self.states.retain(|s| s.target_weight > 0.0 || s.weight > 0.0);
    }

    /// Effective contribution of every clip, bottom of the stack first.
    /// Weights sum to at most 1.
    pub fn blend_weights(&self) -> Vec<(ClipName, f32)> {
        let mut remaining = 1.0f32;
        let mut out: Vec<(ClipName, f32)> = self
            .states
            .iter()
            .rev()
            .map(|s| {
                let w = s.weight * remaining;
                remaining *= 1.0 - s.weight;
                (s.clip.clone(), w)
            })
            .collect();
        out.reverse();
        out
    }
}
