// Crowd core: locomotion decisions per agent, agent lifecycle, and the group
// that ties agents to one steering simulation.

pub mod agent;
pub mod group;
pub mod locomotion;

pub use agent::{AgentTemplate, CrowdAgentController};
pub use group::{CrowdGroup, CrowdGroupManager, GridLayout, GroupCensus};
pub use locomotion::{AnimationCommand, LocomotionState, LocomotionStateMachine};
