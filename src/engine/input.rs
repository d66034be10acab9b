// Input state tracking for keyboard, mouse, and touch
// Abstracts winit events into a queryable per-frame snapshot

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Default)]
pub struct InputState {
    // Keyboard
    keys_held: HashSet<KeyCode>,
    // Keys that went down this frame, reset in end_frame()
    keys_pressed: HashSet<KeyCode>,

    // Pointer position in pixels
    pub cursor_position: Vec2,

    // Touch ends and left-button releases this frame, in pixels
    taps: Vec<Vec2>,

    pub window_size: (u32, u32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a winit WindowEvent into the input state.
    /// Call this once per event before the app's own event handling.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed if !event.repeat => self.press_key(key),
                        ElementState::Pressed => {}
                        ElementState::Released => self.release_key(key),
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_position = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => self.tap(self.cursor_position),
            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Ended => {
                self.tap(Vec2::new(touch.location.x as f32, touch.location.y as f32));
            }
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
            }
            _ => {}
        }
    }

    pub fn press_key(&mut self, key: KeyCode) {
        if self.keys_held.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
    }

    pub fn tap(&mut self, position: Vec2) {
        self.taps.push(position);
    }

    /// Taps since the last call, oldest first.
    pub fn take_taps(&mut self) -> Vec<Vec2> {
        std::mem::take(&mut self.taps)
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Call once per frame after update() has consumed input.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.taps.clear();
    }
}
