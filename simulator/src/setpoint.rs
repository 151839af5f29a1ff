use prelude::*;

use planner::{compute_control, HorizonGrid, Trajectory};

/// Control to hold at time `t` into the plan. Controls are piecewise constant between nodes and
/// the last node's control is held past the end of the horizon.
pub fn control_at(
    trajectory: &Trajectory,
    grid: &HorizonGrid,
    model: &config::Model,
    limit: float,
    t: float,
) -> [float; 2] {
    let times = grid.times();
    let i = times.iter().rposition(|&ti| ti <= t).unwrap_or(0);
    let a = trajectory.acceleration(i);
    let v = trajectory.velocity(i);
    [
        compute_control(model, a[0], v[0], limit),
        compute_control(model, a[1], v[1], limit),
    ]
}
