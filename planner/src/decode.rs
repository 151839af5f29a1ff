use config;
use prelude::*;

use crate::halfspace::Halfspace;
use crate::inputs::{compute_acceleration, RiskParameters};
use crate::layout::{Channel, Layout};

pub const TRAJECTORY_CHANNELS: usize = 6;

/// Published trajectory, channel-major `[x, y, dx, dy, ddx, ddy]` over the horizon nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    nodes: usize,
    data: Vec<float>,
}

impl Trajectory {
    pub fn zeros(nodes: usize) -> Trajectory {
        Trajectory {
            nodes,
            data: vec![0.0; TRAJECTORY_CHANNELS * nodes],
        }
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn as_slice(&self) -> &[float] {
        &self.data
    }

    pub fn position(&self, j: usize) -> [float; 2] {
        self.pair(0, j)
    }

    pub fn velocity(&self, j: usize) -> [float; 2] {
        self.pair(2, j)
    }

    pub fn acceleration(&self, j: usize) -> [float; 2] {
        self.pair(4, j)
    }

    fn pair(&self, channel: usize, j: usize) -> [float; 2] {
        assert!(j < self.nodes);
        let n = self.nodes;
        [self.data[channel * n + j], self.data[(channel + 1) * n + j]]
    }
}

/// Per-node linearised distance to the obstacle and consumed risk budget of a solution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskDiagnostics {
    pub distance: Vec<float>,
    pub slack: Vec<float>,
    /// Lower envelope of the risk lines at `distance`. `slack` never exceeds it.
    pub bound: Vec<float>,
}

pub struct Decoded {
    pub trajectory: Trajectory,
    pub warm_start: Vec<float>,
    pub diagnostics: RiskDiagnostics,
}

pub fn decode(
    layout: &Layout,
    model: &config::Model,
    halfspace: &Halfspace,
    risk: &RiskParameters,
    x: &[float],
) -> Decoded {
    assert_eq!(x.len(), layout.len());
    let n = layout.nodes();

    let mut data = Vec::with_capacity(TRAJECTORY_CHANNELS * n);
    for &c in &[Channel::X, Channel::Y, Channel::Dx, Channel::Dy] {
        data.extend_from_slice(layout.channel(x, c));
    }
    for &(u, v) in &[(Channel::Ux, Channel::Dx), (Channel::Uy, Channel::Dy)] {
        data.extend(
            layout
                .channel(x, u)
                .iter()
                .zip(layout.channel(x, v))
                .map(|(&u, &v)| compute_acceleration(model, u, v)),
        );
    }

    let xs = layout.channel(x, Channel::X);
    let ys = layout.channel(x, Channel::Y);
    let distance: Vec<float> = (0..n)
        .map(|j| halfspace.distance(j, [xs[j], ys[j]]))
        .collect();
    let diagnostics = RiskDiagnostics {
        bound: distance.iter().map(|&d| risk.bound(d)).collect(),
        distance,
        slack: layout.channel(x, Channel::S).to_vec(),
    };

    Decoded {
        trajectory: Trajectory { nodes: n, data },
        warm_start: x.to_vec(),
        diagnostics,
    }
}
