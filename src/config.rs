// Runtime settings, loaded from TOML.
// Every section falls back to its defaults, so a file only needs to name the
// values it overrides. The defaults reproduce the stock mutant crowd demo.

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use serde::Deserialize;

use crate::crowd::agent::AgentTemplate;
use crate::crowd::group::GridLayout;
use crate::crowd::locomotion::{LocomotionClips, LocomotionTuning, StopSpeed};
use crate::engine::animation::ClipLibrary;
use crate::engine::navigation::NavMeshParams;
use crate::engine::steering::ObstacleAvoidanceParams;
use crate::error::SettingsError;
use crate::gesture::GestureSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub placement: PlacementSettings,
    pub nav_mesh: NavMeshParams,
    pub avoidance: ObstacleAvoidanceParams,
    pub agent: AgentTemplate,
    pub grid: GridLayout,
    pub animation: AnimationSettings,
    pub gesture: GestureSettings,
    pub debug_draw: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            placement: PlacementSettings::default(),
            nav_mesh: NavMeshParams::default(),
            avoidance: ObstacleAvoidanceParams::default(),
            agent: AgentTemplate::default(),
            grid: GridLayout::default(),
            animation: AnimationSettings::default(),
            gesture: GestureSettings::default(),
            debug_draw: true,
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }
}

/// Where and how large the ground proxy is generated on the first tap.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    /// Anchor used by the fixed placement strategy.
    pub anchor: Vec3,
    /// Side length of the square ground proxy, in world units.
    pub ground_size: f32,
    pub ground_thickness: f32,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            anchor: Vec3::new(0.0, -1.0, 2.0),
            ground_size: 20.0,
            ground_thickness: 0.1,
        }
    }
}

/// Clip names, clip lengths and cross-fade timings for the locomotion clips.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    pub walk_clip: String,
    pub idle_clip: String,
    pub death_clip: String,
    /// Clip lengths in seconds. Clip assets are not loaded here, so the
    /// lengths have to be supplied alongside the names.
    pub walk_length: f32,
    pub idle_length: f32,
    pub death_length: f32,
    pub walk_fade_in: f32,
    pub walk_fade_out: f32,
    pub idle_fade_in: f32,
    pub death_fade_in: f32,
    /// Fixed stop speed. When unset the agent's own radius is used.
    pub stop_speed: Option<f32>,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            walk_clip: "Animations/Mutant_Run.ani".to_string(),
            idle_clip: "Animations/Mutant_Idle0.ani".to_string(),
            death_clip: "Animations/Mutant_Death.ani".to_string(),
            walk_length: 0.73,
            idle_length: 2.1,
            death_length: 2.5,
            walk_fade_in: 0.1,
            walk_fade_out: 0.8,
            idle_fade_in: 0.2,
            death_fade_in: 0.4,
            stop_speed: None,
        }
    }
}

impl AnimationSettings {
    pub fn clips(&self) -> LocomotionClips {
        LocomotionClips {
            walk: Arc::from(self.walk_clip.as_str()),
            idle: Arc::from(self.idle_clip.as_str()),
            death: Arc::from(self.death_clip.as_str()),
        }
    }

    pub fn tuning(&self) -> LocomotionTuning {
        LocomotionTuning {
            walk_fade_in: self.walk_fade_in,
            walk_fade_out: self.walk_fade_out,
            idle_fade_in: self.idle_fade_in,
            death_fade_in: self.death_fade_in,
            stop_speed: match self.stop_speed {
                Some(speed) => StopSpeed::Fixed(speed),
                None => StopSpeed::AgentRadius,
            },
        }
    }

    pub fn library(&self) -> ClipLibrary {
        let mut library = ClipLibrary::new();
        library.insert(&self.walk_clip, self.walk_length);
        library.insert(&self.idle_clip, self.idle_length);
        library.insert(&self.death_clip, self.death_length);
        library
    }
}
