// Error types shared by the engine and the crowd core.
// Expected runtime outcomes (raycast miss, missing animation controller,
// repeated kill) are not errors and never show up here.

use std::path::PathBuf;

use glam::Vec3;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrowdError {
    #[error("invalid navmesh parameters: {reason}")]
    InvalidNavMesh { reason: String },

    #[error("no navigable point near agent spawn position {position}")]
    AgentOffMesh { position: Vec3 },

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CrowdError>;
