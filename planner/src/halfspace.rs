use prelude::*;

use crate::grid::HorizonGrid;
use crate::inputs::ObstacleState;
use crate::layout::{Channel, Layout};

/// Halfspace vectors shorter than this have no usable direction.
pub const DEGENERATE_NORM: float = 1e-9;

/// Separating geometry between the projected obstacle and the previous plan.
///
/// The obstacle is projected at constant velocity over the horizon and the halfspace vector at
/// each node points from the previously planned position to the projected obstacle.
#[derive(Clone, Debug, PartialEq)]
pub struct Halfspace {
    obstacle: Vec<[float; 2]>,
    normal: Vec<[float; 2]>,
}

impl Halfspace {
    pub fn project(
        grid: &HorizonGrid,
        layout: &Layout,
        obstacle: &ObstacleState,
        previous: &[float],
    ) -> Halfspace {
        assert_eq!(previous.len(), layout.len());
        let xs = layout.channel(previous, Channel::X);
        let ys = layout.channel(previous, Channel::Y);

        let obstacle: Vec<[float; 2]> = grid
            .times()
            .iter()
            .map(|&t| {
                [
                    obstacle.position[0] + obstacle.velocity[0] * t,
                    obstacle.position[1] + obstacle.velocity[1] * t,
                ]
            })
            .collect();

        let normal = obstacle
            .iter()
            .zip(xs.iter().zip(ys))
            .map(|(o, (&x, &y))| {
                let h = [o[0] - x, o[1] - y];
                let norm = h[0].hypot(h[1]);
                if norm < DEGENERATE_NORM {
                    [0.0, 0.0]
                } else {
                    [h[0] / norm, h[1] / norm]
                }
            })
            .collect();

        Halfspace { obstacle, normal }
    }

    pub fn nodes(&self) -> usize {
        self.obstacle.len()
    }

    /// Projected obstacle position at node `j`.
    pub fn obstacle(&self, j: usize) -> [float; 2] {
        self.obstacle[j]
    }

    /// Unit halfspace normal at node `j`, zero when the vector is degenerate.
    pub fn normal(&self, j: usize) -> [float; 2] {
        self.normal[j]
    }

    /// Signed distance from `position` to the obstacle along the halfspace normal at node `j`.
    pub fn distance(&self, j: usize, position: [float; 2]) -> float {
        let o = self.obstacle[j];
        let n = self.normal[j];
        (o[0] - position[0]) * n[0] + (o[1] - position[1]) * n[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn setup() -> (HorizonGrid, Layout) {
        let grid = HorizonGrid::uniform(3, 1.0);
        let layout = Layout::new(3);
        (grid, layout)
    }

    #[test]
    fn projects_constant_velocity() {
        let (grid, layout) = setup();
        let obstacle = ObstacleState {
            position: [1.0, 0.0],
            velocity: [0.0, 2.0],
        };
        let h = Halfspace::project(&grid, &layout, &obstacle, &vec![0.0; layout.len()]);

        assert_eq!(h.obstacle(0), [1.0, 0.0]);
        assert_eq!(h.obstacle(1), [1.0, 1.0]);
        assert_eq!(h.obstacle(2), [1.0, 2.0]);
        let n = h.normal(2);
        assert_relative_eq!(n[0], 1.0 / 5.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(n[1], 2.0 / 5.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn anchored_on_previous_plan() {
        let (grid, layout) = setup();
        let obstacle = ObstacleState {
            position: [2.0, 0.0],
            velocity: [0.0, 0.0],
        };
        let mut previous = vec![0.0; layout.len()];
        previous[layout.index(Channel::X, 1)] = 1.0;
        previous[layout.index(Channel::Y, 1)] = 1.0;
        let h = Halfspace::project(&grid, &layout, &obstacle, &previous);

        assert_eq!(h.normal(0), [1.0, 0.0]);
        assert_relative_eq!(h.normal(1)[0], 0.5_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(h.normal(1)[1], -(0.5_f64.sqrt()), epsilon = 1e-12);
        // Distance of the previous plan itself is the halfspace vector length
        assert_relative_eq!(h.distance(1, [1.0, 1.0]), 2.0_f64.sqrt(), epsilon = 1e-12);
        // Motion along the halfspace boundary leaves the distance unchanged
        assert_relative_eq!(h.distance(1, [2.0, 2.0]), 2.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_vector_has_zero_normal() {
        let (grid, layout) = setup();
        let obstacle = ObstacleState {
            position: [0.0, 0.0],
            velocity: [0.0, 0.0],
        };
        let h = Halfspace::project(&grid, &layout, &obstacle, &vec![0.0; layout.len()]);
        assert_eq!(h.normal(0), [0.0, 0.0]);
        assert_eq!(h.distance(0, [5.0, -3.0]), 0.0);
    }
}
