use std::path::Path;

use ::config::{self as planner_config, ConfigError};
use serde::Deserialize;

use prelude::*;

pub static CONFIG_FILE: &str = "simulator.toml";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Simulated time in seconds.
    pub duration: float,
    /// Sleep out the remainder of every control period.
    pub real_time: bool,
    pub planner_config: String,
    /// RK4 steps per control period.
    pub integration_steps: u32,
    pub agent: Body,
    pub adversary: Body,
    /// Flattened `(slope, intercept)` pairs supplied to the planner every tick.
    pub risk: Vec<float>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Body {
    pub position: [float; 2],
    pub velocity: [float; 2],
}

impl Default for SimulatorConfig {
    fn default() -> SimulatorConfig {
        SimulatorConfig {
            duration: 5.0,
            real_time: false,
            planner_config: planner_config::CONFIG_FILE.to_owned(),
            integration_steps: 10,
            agent: Body {
                position: [-0.5, 0.0],
                velocity: [0.0, 0.0],
            },
            adversary: Body {
                position: [0.6, 0.1],
                velocity: [-0.15, 0.0],
            },
            risk: vec![
                -2.0, 0.4, -1.0, 0.2, -0.5, 0.1, -0.25, 0.05, -0.1, 0.02, -0.05, 0.01, 0.0, 0.0,
            ],
        }
    }
}

impl SimulatorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SimulatorConfig, ConfigError> {
        let config: SimulatorConfig = planner_config::load_toml(path)?;
        if !(config.duration.is_finite() && config.duration > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "duration",
                message: format!("{} must be finite and positive", config.duration),
            });
        }
        if config.integration_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "integration_steps",
                message: "must be non-zero".to_owned(),
            });
        }
        Ok(config)
    }
}
