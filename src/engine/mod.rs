// Engine module - scene, navigation, steering, and animation services the
// crowd core runs on

pub mod animation;
pub mod camera;
pub mod components;
pub mod debug_draw;
pub mod input;
pub mod navigation;
pub mod orca;
pub mod raycast;
pub mod steering;
pub mod systems;

// Re-export commonly used items
pub use components::*;
