use config::{Bounds, Model};
use prelude::*;

use crate::error::InputError;

pub const INITIAL_CONDITION_LEN: usize = 9;
pub const OBSTACLE_STATE_LEN: usize = 6;

/// Raw per-tick inputs.
#[derive(Clone, Copy, Debug)]
pub struct TickInputs<'a> {
    /// `(x, y, z, dx, dy, dz, ddx, ddy, ddz)` of the agent.
    pub initial_condition: &'a [float],
    /// `(x, y, z, dx, dy, dz)` of the adversary.
    pub obstacle: &'a [float],
    /// Flattened `(slope, intercept)` pairs, one pair per spline segment.
    pub risk: &'a [float],
}

/// Planar initial condition with accelerations already converted to control.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InitialCondition {
    pub position: [float; 2],
    pub velocity: [float; 2],
    pub control: [float; 2],
}

impl InitialCondition {
    /// `[x, y, dx, dy, ux, uy]`, the order of the initial condition equality rows.
    pub fn to_array(&self) -> [float; 6] {
        [
            self.position[0],
            self.position[1],
            self.velocity[0],
            self.velocity[1],
            self.control[0],
            self.control[1],
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleState {
    pub position: [float; 2],
    pub velocity: [float; 2],
}

/// Lines `(slope, intercept)` bounding the risk slack from above at every node.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskParameters {
    pub slopes: Vec<float>,
    pub intercepts: Vec<float>,
}

impl RiskParameters {
    pub fn len(&self) -> usize {
        self.slopes.len()
    }

    /// Lower envelope of all lines at linearised distance `d`.
    pub fn bound(&self, d: float) -> float {
        self.slopes
            .iter()
            .zip(&self.intercepts)
            .map(|(&m, &b)| m * d + b)
            .fold(INFINITY, float::min)
    }
}

/// Validated inputs for a single tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Conditioned {
    pub initial: InitialCondition,
    pub obstacle: ObstacleState,
    pub risk: RiskParameters,
}

impl Conditioned {
    pub fn new(
        inputs: &TickInputs,
        model: &Model,
        bounds: &Bounds,
        spline_resolution: usize,
    ) -> Result<Conditioned, InputError> {
        let ic = inputs.initial_condition;
        check_len("initial_condition", ic, INITIAL_CONDITION_LEN)?;
        check_finite("initial_condition", ic, |_| true)?;

        let obstacle = inputs.obstacle;
        check_len("obstacle", obstacle, OBSTACLE_STATE_LEN)?;
        check_finite("obstacle", obstacle, |_| true)?;

        let risk = inputs.risk;
        check_len("risk", risk, 2 * spline_resolution)?;
        // Intercepts may be infinite to disable a line, but never NaN
        if let Some(index) = risk.iter().position(|v| v.is_nan()) {
            return Err(InputError::NotFinite {
                input: "risk",
                index,
                value: risk[index],
            });
        }
        check_finite("risk", risk, |i| i % 2 == 0)?;

        let initial = InitialCondition {
            position: [ic[0], ic[1]],
            velocity: [ic[3], ic[4]],
            control: [
                compute_control(model, ic[6], ic[3], bounds.control),
                compute_control(model, ic[7], ic[4], bounds.control),
            ],
        };

        let obstacle = ObstacleState {
            position: [obstacle[0], obstacle[1]],
            velocity: [obstacle[3], obstacle[4]],
        };

        let risk = RiskParameters {
            slopes: risk.iter().step_by(2).cloned().collect(),
            intercepts: risk.iter().skip(1).step_by(2).cloned().collect(),
        };

        Ok(Conditioned {
            initial,
            obstacle,
            risk,
        })
    }
}

/// Control producing acceleration `ddq` at velocity `dq` under the drag model, clamped to the
/// control bound.
pub fn compute_control(model: &Model, ddq: float, dq: float, limit: float) -> float {
    clamp_abs(ddq * model.mass + model.friction * dq, limit)
}

/// Acceleration produced by control `u` at velocity `dq`.
pub fn compute_acceleration(model: &Model, u: float, dq: float) -> float {
    (u - model.friction * dq) / model.mass
}

fn check_len(input: &'static str, v: &[float], expected: usize) -> Result<(), InputError> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(InputError::Length {
            input,
            expected,
            got: v.len(),
        })
    }
}

fn check_finite<F>(input: &'static str, v: &[float], checked: F) -> Result<(), InputError>
where
    F: Fn(usize) -> bool,
{
    match v
        .iter()
        .enumerate()
        .find(|&(i, x)| checked(i) && !x.is_finite())
    {
        Some((index, &value)) => Err(InputError::NotFinite {
            input,
            index,
            value,
        }),
        None => Ok(()),
    }
}
