use config;
use prelude::*;

/// Node times of the planning horizon.
///
/// Times follow a power law `t_i = T * (i / (N - 1)) ^ p`. An exponent above one packs nodes
/// towards the start of the horizon where the plan is actually executed.
#[derive(Clone, Debug, PartialEq)]
pub struct HorizonGrid {
    times: Vec<float>,
    dt: Vec<float>,
}

impl HorizonGrid {
    pub fn new(nodes: usize, time_horizon: float, exponent: float) -> HorizonGrid {
        assert!(nodes >= 2, "a horizon needs at least two nodes");
        assert!(time_horizon > 0.0 && exponent > 0.0);

        let last = (nodes - 1) as float;
        let times: Vec<float> = (0..nodes)
            .map(|i| time_horizon * (i as float / last).powf(exponent))
            .collect();
        let dt = times.windows(2).map(|w| w[1] - w[0]).collect();

        HorizonGrid { times, dt }
    }

    pub fn uniform(nodes: usize, time_horizon: float) -> HorizonGrid {
        HorizonGrid::new(nodes, time_horizon, 1.0)
    }

    pub fn from_config(horizon: &config::Horizon) -> HorizonGrid {
        HorizonGrid::new(
            horizon.nodes,
            horizon.time_horizon,
            horizon.spacing_exponent,
        )
    }

    pub fn nodes(&self) -> usize {
        self.times.len()
    }

    pub fn time_horizon(&self) -> float {
        self.times[self.times.len() - 1]
    }

    pub fn times(&self) -> &[float] {
        &self.times
    }

    /// Step sizes, `dt()[i] = times()[i + 1] - times()[i]`.
    pub fn dt(&self) -> &[float] {
        &self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_grid() {
        let grid = HorizonGrid::uniform(5, 1.0);
        assert_eq!(grid.nodes(), 5);
        assert_eq!(grid.dt().len(), 4);
        for &dt in grid.dt() {
            assert_relative_eq!(dt, 0.25, epsilon = 1e-12);
        }
        assert_relative_eq!(grid.time_horizon(), 1.0);
    }

    #[test]
    fn warped_grid_front_loads_nodes() {
        let grid = HorizonGrid::new(21, 2.0, E);
        assert_eq!(grid.times()[0], 0.0);
        assert_relative_eq!(grid.time_horizon(), 2.0, epsilon = 1e-12);
        assert!(grid.dt().windows(2).all(|w| w[0] < w[1]));
        assert_relative_eq!(grid.dt().iter().sum::<float>(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn from_config_defaults() {
        let grid = HorizonGrid::from_config(&config::Horizon::default());
        assert_eq!(grid.nodes(), 21);
        assert_relative_eq!(grid.times()[1], (1.0 / 20.0 as float).powf(E));
    }
}
