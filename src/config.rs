//! Tunable simulation parameters.

use crate::error::ConfigError;
use crate::util::Interval;
use crate::vehicle::DriverParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The parameters of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// The width of a lane in m.
    pub lane_width: f64,
    /// The fixed time step in s, or 0 to step by the measured frame time.
    pub time_step: f64,
    /// The minimum bumper distance to other vehicles needed to spawn a vehicle, in m.
    /// Should be at least the largest `min_spacing` of any driver.
    pub min_spawn_space: f64,
    /// Parameters of lane change execution.
    pub lane_change: LaneChangeConfig,
    /// The seed of the world's random number generator. Chosen randomly if absent.
    pub seed: Option<u64>,
    /// The driver parameters of vehicles created with default attributes.
    pub driver: DriverParams,
}

/// Parameters of lane change execution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneChangeConfig {
    /// The base distance along the new lane to the lane change waypoint, in m.
    pub lookahead: f64,
    /// The additional distance to the waypoint per unit of velocity, in s.
    pub speed_factor: f64,
    /// The range of time a vehicle signals before it may change lanes, in s.
    pub signal_delay: Interval<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            lane_width: 4.0,
            time_step: 0.0,
            min_spawn_space: 20.0,
            lane_change: Default::default(),
            seed: None,
            driver: Default::default(),
        }
    }
}

impl Default for LaneChangeConfig {
    fn default() -> Self {
        Self {
            lookahead: 10.0,
            speed_factor: 0.5,
            signal_delay: Interval::new(0.5, 1.5),
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a config from a TOML string.
    /// Missing fields take their default values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The fixed time step, if there is one.
    pub fn fixed_time_step(&self) -> Option<f64> {
        (self.time_step > 0.0).then_some(self.time_step)
    }

    /// Checks that the parameters are within their valid ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.lane_width <= 0.0 {
            return invalid("lane width must be positive");
        }
        if self.time_step < 0.0 {
            return invalid("time step must not be negative");
        }
        if self.min_spawn_space <= 0.0 {
            return invalid("minimum spawn space must be positive");
        }

        let lc = &self.lane_change;
        if lc.lookahead <= 0.0 || lc.speed_factor < 0.0 {
            return invalid("lane change lookahead must be positive");
        }
        if !lc.signal_delay.is_valid() || lc.signal_delay.min < 0.0 {
            return invalid("signal delay must be a non-negative, non-empty interval");
        }

        let d = &self.driver;
        if d.min_spacing <= 0.0 || d.time_headway < 0.0 || d.comf_brake <= 0.0 || d.delta <= 0.0 {
            return invalid("driver parameters must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fixed_time_step(), None);
        assert_eq!(config.driver.min_spacing, 12.0);
    }

    #[test]
    fn partial_toml() {
        let config = SimulationConfig::from_toml_str(
            r#"
            time_step = 0.05
            seed = 7

            [driver]
            politeness = 0.2

            [lane_change.signal_delay]
            min = 1.0
            max = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.fixed_time_step(), Some(0.05));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.lane_width, 4.0);
        assert_eq!(config.driver.politeness, 0.2);
        assert_eq!(config.driver.b_safe, 3.0);
        assert_eq!(config.lane_change.signal_delay, Interval::new(1.0, 2.0));
        assert_eq!(config.lane_change.lookahead, 10.0);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = SimulationConfig::from_toml_str("lane_width = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SimulationConfig::from_toml_str("lane_width = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
