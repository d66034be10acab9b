// Crowd march: a crowd of agents placed on a navigable surface, steered
// toward a shared destination, with each agent's locomotion animation kept in
// step with its simulated velocity.

pub mod config;
pub mod crowd;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod session;

pub use config::Settings;
pub use error::{CrowdError, Result, SettingsError};
pub use session::{CrowdSession, SessionStatus};
