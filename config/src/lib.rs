extern crate prelude;
extern crate serde;
extern crate thiserror;
extern crate toml;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use prelude::*;

pub static CONFIG_FILE: &str = "planner.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("unable to deserialise config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Reads and deserialises a TOML file.
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut config_str = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut config_str))
        .map_err(io_err)?;
    Ok(toml::from_str(&config_str)?)
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    pub horizon: Horizon,
    pub model: Model,
    pub bounds: Bounds,
    pub objective: Objective,
    pub risk: Risk,
    pub solver: Solver,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Horizon {
    /// Number of nodes, including the initial node.
    pub nodes: usize,
    /// Horizon length in seconds.
    pub time_horizon: float,
    /// Node times are `time_horizon * (i / (nodes - 1)) ^ spacing_exponent`.
    pub spacing_exponent: float,
    /// Re-planning rate in Hz.
    pub rate: float,
}

impl Default for Horizon {
    fn default() -> Horizon {
        Horizon {
            nodes: 21,
            time_horizon: 1.0,
            spacing_exponent: E,
            rate: 50.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Model {
    pub mass: float,
    /// Linear drag coefficient.
    pub friction: float,
}

impl Default for Model {
    fn default() -> Model {
        Model {
            mass: 0.027,
            friction: 0.01,
        }
    }
}

/// Symmetric bounds. `position`, `velocity` and `control` are hard box bounds on every node,
/// `workspace` is the soft area limit enforced through the position slack.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Bounds {
    pub position: float,
    pub velocity: float,
    pub control: float,
    pub workspace: float,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds {
            position: 2.0,
            velocity: 2.0,
            control: 0.075,
            workspace: 0.75,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Objective {
    pub position_slack: float,
    pub control: float,
    pub velocity: float,
    /// Linear reward for consuming risk budget.
    pub risk_reward: float,
}

impl Default for Objective {
    fn default() -> Objective {
        Objective {
            position_slack: 100.0,
            control: 1.0,
            velocity: 0.01,
            risk_reward: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Risk {
    /// Number of (slope, intercept) pairs supplied each tick.
    pub spline_resolution: usize,
}

impl Default for Risk {
    fn default() -> Risk {
        Risk {
            spline_resolution: 7,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Solver {
    /// Constraint coefficients smaller than this are zeroed after every update.
    pub prune_tolerance: float,
    pub eps_abs: float,
    pub eps_rel: float,
    pub max_iter: u32,
    pub polish: bool,
    /// Solve time limit in seconds.
    pub time_limit: Option<float>,
    pub verbose: bool,
}

impl Default for Solver {
    fn default() -> Solver {
        Solver {
            prune_tolerance: 1e-6,
            eps_abs: 1e-7,
            eps_rel: 1e-7,
            max_iter: 20000,
            polish: true,
            time_limit: None,
            verbose: false,
        }
    }
}

impl PlannerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PlannerConfig, ConfigError> {
        let config: PlannerConfig = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<PlannerConfig, ConfigError> {
        let config: PlannerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon.nodes < 2 {
            return Err(invalid("horizon.nodes", "at least two nodes are required"));
        }
        positive("horizon.time_horizon", self.horizon.time_horizon)?;
        positive("horizon.spacing_exponent", self.horizon.spacing_exponent)?;
        positive("horizon.rate", self.horizon.rate)?;
        positive("model.mass", self.model.mass)?;
        non_negative("model.friction", self.model.friction)?;
        positive("bounds.position", self.bounds.position)?;
        positive("bounds.velocity", self.bounds.velocity)?;
        positive("bounds.control", self.bounds.control)?;
        positive("bounds.workspace", self.bounds.workspace)?;
        non_negative("objective.position_slack", self.objective.position_slack)?;
        non_negative("objective.control", self.objective.control)?;
        non_negative("objective.velocity", self.objective.velocity)?;
        non_negative("objective.risk_reward", self.objective.risk_reward)?;
        if self.risk.spline_resolution == 0 {
            return Err(invalid(
                "risk.spline_resolution",
                "at least one risk constraint is required",
            ));
        }
        non_negative("solver.prune_tolerance", self.solver.prune_tolerance)?;
        positive("solver.eps_abs", self.solver.eps_abs)?;
        positive("solver.eps_rel", self.solver.eps_rel)?;
        if self.solver.max_iter == 0 {
            return Err(invalid("solver.max_iter", "must be non-zero"));
        }
        if let Some(time_limit) = self.solver.time_limit {
            positive("solver.time_limit", time_limit)?;
        }
        Ok(())
    }

    /// Control period in seconds.
    pub fn period(&self) -> float {
        1.0 / self.horizon.rate
    }
}

fn invalid(field: &'static str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.to_owned(),
    }
}

fn positive(field: &'static str, v: float) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            message: format!("{} must be finite and positive", v),
        })
    }
}

fn non_negative(field: &'static str, v: float) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            message: format!("{} must be finite and non-negative", v),
        })
    }
}
