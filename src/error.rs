//! Error types.

use thiserror::Error;

/// An error raised while building the lane network or attaching spawners to it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("a road path needs at least 3 points, got {0}")]
    PathTooShort(usize),
    #[error("a road needs at least one lane")]
    NoLanes,
    #[error("path points {0} and {1} coincide, the road normal is undefined")]
    DegeneratePath(usize, usize),
    #[error("lane index {index} is out of range for a road with {count} lanes")]
    LaneIndex { index: usize, count: usize },
    #[error("lanes need at least 2 nodes to be connected")]
    LaneTooShort,
    #[error("the junction between two connected lanes is degenerate")]
    DegenerateJunction,
    #[error("connecting these lanes would create a cycle in the lane graph")]
    Cycle,
    #[error("spawn node {node} has no successor on a lane with {len} nodes")]
    SpawnNode { node: usize, len: usize },
}

/// An error raised while loading a [SimulationConfig](crate::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
