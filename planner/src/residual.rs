use num_dual::DualNum;

use config;
use prelude::*;

use crate::halfspace::Halfspace;
use crate::inputs::RiskParameters;
use crate::layout::{Channel, Layout};

/// Scalar types residuals and costs are evaluated with: `f64` and the dual numbers used to
/// differentiate them.
pub trait Scalar: DualNum<float> + Copy {}

impl<D: DualNum<float> + Copy> Scalar for D {}

/// A vector valued function of the design vector.
pub trait Residual {
    fn rows(&self) -> usize;

    /// `rows() x q.len()` mask of the entries of the Jacobian that can be non-zero.
    fn sparsity(&self) -> Mask<Dy, Dy>;

    fn eval<D: Scalar>(&self, q: &[D]) -> Vec<D>;
}

/// A scalar function of the design vector.
pub trait Cost {
    /// Diagonal entries of the Hessian that can be non-zero.
    fn hessian_sparsity(&self) -> Vec<bool>;

    fn eval<D: Scalar>(&self, q: &[D]) -> D;
}

/// Initial condition rows followed by the collocation defects of the point mass dynamics.
pub struct EqualityResidual<'a> {
    layout: Layout,
    dt: &'a [float],
    model: &'a config::Model,
    initial: [float; 6],
}

impl<'a> EqualityResidual<'a> {
    pub fn new(
        layout: Layout,
        dt: &'a [float],
        model: &'a config::Model,
        initial: [float; 6],
    ) -> EqualityResidual<'a> {
        assert_eq!(dt.len() + 1, layout.nodes());
        EqualityResidual {
            layout,
            dt,
            model,
            initial,
        }
    }
}

const INITIAL_CHANNELS: [Channel; 6] = [
    Channel::X,
    Channel::Y,
    Channel::Dx,
    Channel::Dy,
    Channel::Ux,
    Channel::Uy,
];

/// `(state, derivative)` pairs of the collocation defects in row block order.
const DEFECTS: [(Channel, Channel); 4] = [
    (Channel::X, Channel::Dx),
    (Channel::Y, Channel::Dy),
    (Channel::Dx, Channel::Ux),
    (Channel::Dy, Channel::Uy),
];

impl<'a> Residual for EqualityResidual<'a> {
    fn rows(&self) -> usize {
        self.layout.n_eq()
    }

    fn sparsity(&self) -> Mask<Dy, Dy> {
        let l = &self.layout;
        let mut mask = Mask::<Dy, Dy>::from_element(self.rows(), l.len(), false);

        for (r, &c) in INITIAL_CHANNELS.iter().enumerate() {
            mask[(r, l.index(c, 0))] = true;
        }

        let transitions = l.nodes() - 1;
        for (b, &(state, derivative)) in DEFECTS.iter().enumerate() {
            for i in 0..transitions {
                let r = INITIAL_CHANNELS.len() + b * transitions + i;
                mask[(r, l.index(state, i + 1))] = true;
                mask[(r, l.index(state, i))] = true;
                mask[(r, l.index(derivative, i))] = true;
            }
        }
        mask
    }

    fn eval<D: Scalar>(&self, q: &[D]) -> Vec<D> {
        let l = &self.layout;
        assert_eq!(q.len(), l.len());
        let at = |c, i| q[l.index(c, i)];
        let transitions = l.nodes() - 1;

        let mut r = Vec::with_capacity(self.rows());
        r.extend(
            INITIAL_CHANNELS
                .iter()
                .zip(&self.initial)
                .map(|(&c, &v)| at(c, 0) - v),
        );

        for &(state, derivative) in &DEFECTS[..2] {
            r.extend((0..transitions).map(|i| {
                at(state, i + 1) - at(state, i) - at(derivative, i) * self.dt[i]
            }));
        }

        let (mass, friction) = (self.model.mass, self.model.friction);
        for &(velocity, control) in &DEFECTS[2..] {
            r.extend((0..transitions).map(|i| {
                let v = at(velocity, i);
                let acceleration = (at(control, i) - v * friction) * (1.0 / mass);
                at(velocity, i + 1) - v - acceleration * self.dt[i]
            }));
        }

        debug_assert_eq!(r.len(), self.rows());
        r
    }
}

/// Workspace and risk inequalities, `g(q) <= 0`.
pub struct InequalityResidual<'a> {
    layout: Layout,
    workspace: float,
    halfspace: &'a Halfspace,
    risk: &'a RiskParameters,
}

impl<'a> InequalityResidual<'a> {
    pub fn new(
        layout: Layout,
        workspace: float,
        halfspace: &'a Halfspace,
        risk: &'a RiskParameters,
    ) -> InequalityResidual<'a> {
        assert_eq!(halfspace.nodes(), layout.nodes());
        InequalityResidual {
            layout,
            workspace,
            halfspace,
            risk,
        }
    }
}

/// `(position, slack, sign)` of the workspace row blocks.
const WORKSPACE: [(Channel, Channel, float); 4] = [
    (Channel::X, Channel::Sx, -1.0),
    (Channel::Y, Channel::Sy, -1.0),
    (Channel::X, Channel::Sx, 1.0),
    (Channel::Y, Channel::Sy, 1.0),
];

impl<'a> Residual for InequalityResidual<'a> {
    fn rows(&self) -> usize {
        self.layout.n_workspace() + self.layout.n_risk(self.risk.len())
    }

    fn sparsity(&self) -> Mask<Dy, Dy> {
        let l = &self.layout;
        let n = l.nodes();
        let mut mask = Mask::<Dy, Dy>::from_element(self.rows(), l.len(), false);

        for (b, &(position, slack, _)) in WORKSPACE.iter().enumerate() {
            for j in 0..n {
                mask[(b * n + j, l.index(position, j))] = true;
                mask[(b * n + j, l.index(slack, j))] = true;
            }
        }

        // The pattern includes both position channels even when a normal or a slope is zero so
        // that it does not change between ticks
        let offset = l.n_workspace();
        for k in 0..self.risk.len() {
            for j in 0..n {
                let r = offset + k * n + j;
                for &c in &[Channel::X, Channel::Y, Channel::S] {
                    mask[(r, l.index(c, j))] = true;
                }
            }
        }
        mask
    }

    fn eval<D: Scalar>(&self, q: &[D]) -> Vec<D> {
        let l = &self.layout;
        assert_eq!(q.len(), l.len());
        let at = |c, j| q[l.index(c, j)];
        let n = l.nodes();

        let mut r = Vec::with_capacity(self.rows());
        for &(position, slack, sign) in &WORKSPACE {
            r.extend((0..n).map(|j| at(position, j) * sign - at(slack, j) - self.workspace));
        }

        let distance: Vec<D> = (0..n)
            .map(|j| {
                let o = self.halfspace.obstacle(j);
                let normal = self.halfspace.normal(j);
                (-at(Channel::X, j) + o[0]) * normal[0] + (-at(Channel::Y, j) + o[1]) * normal[1]
            })
            .collect();

        for (&m, &b) in self.risk.slopes.iter().zip(&self.risk.intercepts) {
            r.extend((0..n).map(|j| at(Channel::S, j) - (distance[j] * m + b)));
        }

        debug_assert_eq!(r.len(), self.rows());
        r
    }
}

/// Quadratic penalties on workspace slack, control and velocity with a linear reward for
/// consuming risk budget.
pub struct Objective<'a> {
    layout: Layout,
    weights: &'a config::Objective,
}

impl<'a> Objective<'a> {
    pub fn new(layout: Layout, weights: &'a config::Objective) -> Objective<'a> {
        Objective { layout, weights }
    }

    fn squared_terms(&self) -> [(Channel, float); 6] {
        let w = self.weights;
        [
            (Channel::Sx, w.position_slack),
            (Channel::Sy, w.position_slack),
            (Channel::Ux, w.control),
            (Channel::Uy, w.control),
            (Channel::Dx, w.velocity),
            (Channel::Dy, w.velocity),
        ]
    }
}

impl<'a> Cost for Objective<'a> {
    fn hessian_sparsity(&self) -> Vec<bool> {
        let mut diagonal = vec![false; self.layout.len()];
        for &(c, _) in &self.squared_terms() {
            for i in self.layout.range(c) {
                diagonal[i] = true;
            }
        }
        diagonal
    }

    fn eval<D: Scalar>(&self, q: &[D]) -> D {
        let l = &self.layout;
        assert_eq!(q.len(), l.len());

        let quadratic: D = self
            .squared_terms()
            .iter()
            .flat_map(|&(c, w)| l.channel(q, c).iter().map(move |&v| v * v * w))
            .sum();
        let risk: D = l.channel(q, Channel::S).iter().cloned().sum();

        quadratic - risk * self.weights.risk_reward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::HorizonGrid;
    use crate::inputs::ObstacleState;
    use approx::assert_relative_eq;

    fn layout() -> Layout {
        Layout::new(3)
    }

    fn point_mass() -> config::Model {
        config::Model {
            mass: 2.0,
            friction: 0.5,
        }
    }

    #[test]
    fn equality_residual_vanishes_on_consistent_trajectory() {
        let l = layout();
        let model = point_mass();
        let dt = [0.5, 0.5];
        let initial = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let residual = EqualityResidual::new(l, &dt, &model, initial);

        // Forward Euler rollout from the initial condition with constant control
        let mut q = vec![0.0; l.len()];
        q[l.index(Channel::Y, 0)] = 1.0;
        q[l.index(Channel::Dx, 0)] = 1.0;
        for i in 0..3 {
            q[l.index(Channel::Ux, i)] = 1.0;
            q[l.index(Channel::Y, i)] = 1.0;
        }
        for i in 0..2 {
            let (x, v, u) = (
                q[l.index(Channel::X, i)],
                q[l.index(Channel::Dx, i)],
                q[l.index(Channel::Ux, i)],
            );
            q[l.index(Channel::X, i + 1)] = x + v * dt[i];
            q[l.index(Channel::Dx, i + 1)] = v + (u - model.friction * v) / model.mass * dt[i];
        }

        let r = residual.eval(&q);
        assert_eq!(r.len(), l.n_eq());
        for v in r {
            assert_relative_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn equality_rows_in_order() {
        let l = layout();
        let model = point_mass();
        let dt = [0.5, 0.5];
        let initial = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let residual = EqualityResidual::new(l, &dt, &model, initial);

        let r = residual.eval(&vec![0.0; l.len()]);
        assert_eq!(&r[..6], &[-1.0, -2.0, -3.0, -4.0, -5.0, -6.0]);
        assert!(r[6..].iter().all(|&v| v == 0.0));

        let mut q = vec![0.0; l.len()];
        q[l.index(Channel::Dy, 1)] = 1.0;
        let r = residual.eval(&q);
        // y position defect of transition 1 and dy velocity defects of both transitions
        assert_eq!(r[6 + 2 + 1], -0.5);
        assert_eq!(r[6 + 6 + 0], 1.0);
        assert_relative_eq!(r[6 + 6 + 1], -1.0 + 0.5 * 0.5 / 2.0 * 1.0);
    }

    #[test]
    fn equality_sparsity_counts() {
        let l = layout();
        let model = point_mass();
        let dt = [0.5, 0.5];
        let residual = EqualityResidual::new(l, &dt, &model, [0.0; 6]);
        let mask = residual.sparsity();
        assert_eq!(mask.shape(), (l.n_eq(), l.len()));
        assert_eq!(mask.iter().filter(|&&b| b).count(), 6 + 3 * 4 * 2);
    }

    #[test]
    fn inequality_rows() {
        let l = layout();
        let grid = HorizonGrid::uniform(3, 1.0);
        let obstacle = ObstacleState {
            position: [1.0, 0.0],
            velocity: [0.0, 0.0],
        };
        let halfspace = Halfspace::project(&grid, &l, &obstacle, &vec![0.0; l.len()]);
        let risk = RiskParameters {
            slopes: vec![-1.0, 0.0],
            intercepts: vec![0.5, INFINITY],
        };
        let residual = InequalityResidual::new(l, 0.75, &halfspace, &risk);
        assert_eq!(residual.rows(), 4 * 3 + 2 * 3);

        let mut q = vec![0.0; l.len()];
        q[l.index(Channel::X, 0)] = 1.0;
        q[l.index(Channel::Sx, 0)] = 0.25;
        q[l.index(Channel::S, 0)] = -0.1;
        let r = residual.eval(&q);

        assert_eq!(r[0], -1.0 - 0.25 - 0.75);
        assert_eq!(r[3], -0.75);
        assert_eq!(r[6], 1.0 - 0.25 - 0.75);
        // Node 0 sits on the obstacle so d = 0
        assert_relative_eq!(r[12], -0.1 - 0.5);
        // Node 1 is at distance 1 from the obstacle
        assert_relative_eq!(r[13], 0.0 - (-1.0 + 0.5));
        assert_eq!(r[15], NEG_INFINITY);
    }

    #[test]
    fn objective_value() {
        let l = layout();
        let weights = config::Objective {
            position_slack: 100.0,
            control: 1.0,
            velocity: 0.01,
            risk_reward: 2.0,
        };
        let objective = Objective::new(l, &weights);

        let mut q = vec![0.0; l.len()];
        q[l.index(Channel::Sx, 1)] = 0.1;
        q[l.index(Channel::Uy, 2)] = 0.5;
        q[l.index(Channel::Dx, 0)] = 1.0;
        q[l.index(Channel::S, 0)] = -0.5;
        q[l.index(Channel::X, 0)] = 10.0;

        assert_relative_eq!(objective.eval(&q), 100.0 * 0.01 + 0.25 + 0.01 + 1.0);

        let diagonal = objective.hessian_sparsity();
        assert!(!diagonal[l.index(Channel::X, 0)]);
        assert!(!diagonal[l.index(Channel::S, 0)]);
        assert!(diagonal[l.index(Channel::Sy, 2)]);
        assert_eq!(diagonal.iter().filter(|&&b| b).count(), 6 * 3);
    }
}
