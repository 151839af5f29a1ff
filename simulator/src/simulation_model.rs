use prelude::nalgebra::SVector;
use prelude::*;

use planner::compute_acceleration;

pub fn rk4<const D: usize, F>(
    dt: float,
    num_steps: u32,
    y_0: &SVector<float, D>,
    mut f: F,
) -> SVector<float, D>
where
    F: FnMut(&SVector<float, D>) -> SVector<float, D>,
{
    let h = dt / float::from(num_steps);
    let mut y = *y_0;
    for _ in 0..num_steps {
        let k1 = f(&y) * h;
        let k2 = f(&(y + k1 * 0.5)) * h;
        let k3 = f(&(y + k2 * 0.5)) * h;
        let k4 = f(&(y + k3)) * h;
        y += (k1 + (k2 + k3) * 2.0 + k4) / 6.0;
    }
    y
}

/// `[x, y, dx, dy]`
pub type PlantState = SVector<float, 4>;

/// Planar point mass with linear drag, driven by a force held constant over each step.
pub struct PointMass {
    model: config::Model,
    integration_steps: u32,
    state: PlantState,
    acceleration: [float; 2],
}

impl PointMass {
    pub fn new(
        model: &config::Model,
        integration_steps: u32,
        position: [float; 2],
        velocity: [float; 2],
    ) -> PointMass {
        PointMass {
            model: model.clone(),
            integration_steps,
            state: PlantState::new(position[0], position[1], velocity[0], velocity[1]),
            acceleration: [0.0; 2],
        }
    }

    pub fn step(&mut self, dt: float, control: [float; 2]) {
        let model = &self.model;
        self.state = rk4(dt, self.integration_steps, &self.state, |s| {
            PlantState::new(
                s[2],
                s[3],
                compute_acceleration(model, control[0], s[2]),
                compute_acceleration(model, control[1], s[3]),
            )
        });
        self.acceleration = [
            compute_acceleration(model, control[0], self.state[2]),
            compute_acceleration(model, control[1], self.state[3]),
        ];
    }

    pub fn position(&self) -> [float; 2] {
        [self.state[0], self.state[1]]
    }

    pub fn velocity(&self) -> [float; 2] {
        [self.state[2], self.state[3]]
    }

    /// Initial condition `(x, y, z, dx, dy, dz, ddx, ddy, ddz)` as measured by the planner.
    pub fn measurement(&self) -> [float; 9] {
        let s = &self.state;
        let a = self.acceleration;
        [s[0], s[1], 0.0, s[2], s[3], 0.0, a[0], a[1], 0.0]
    }
}

/// Adversary moving at constant velocity.
pub struct Adversary {
    position: [float; 2],
    velocity: [float; 2],
}

impl Adversary {
    pub fn new(position: [float; 2], velocity: [float; 2]) -> Adversary {
        Adversary { position, velocity }
    }

    pub fn step(&mut self, dt: float) {
        self.position[0] += self.velocity[0] * dt;
        self.position[1] += self.velocity[1] * dt;
    }

    pub fn position(&self) -> [float; 2] {
        self.position
    }

    /// Obstacle state `(x, y, z, dx, dy, dz)`.
    pub fn measurement(&self) -> [float; 6] {
        let (p, v) = (self.position, self.velocity);
        [p[0], p[1], 0.0, v[0], v[1], 0.0]
    }
}
