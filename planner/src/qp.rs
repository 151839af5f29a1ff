use config::{self, PlannerConfig};
use prelude::nalgebra::DVector;
use prelude::*;

use crate::grid::HorizonGrid;
use crate::halfspace::Halfspace;
use crate::inputs::{Conditioned, InitialCondition, ObstacleState, RiskParameters};
use crate::jacobian::{Differentiate, Linearisation};
use crate::layout::{Channel, Layout};
use crate::residual::{Cost, EqualityResidual, InequalityResidual, Objective, Residual};

/// Parts of the QP fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct QpStructure {
    pub n_vars: usize,
    pub eq_sparsity: Mask<Dy, Dy>,
    pub ineq_sparsity: Mask<Dy, Dy>,
    /// Structurally non-zero entries of the (diagonal) Hessian.
    pub hessian_sparsity: Vec<bool>,
    /// Box bounds on the design vector.
    pub lower: Vec<float>,
    pub upper: Vec<float>,
}

/// Coefficients of
///
/// ```text
/// minimise    1/2 q' diag(H) q + f' q
/// subject to  A_eq q = b_eq
///             l_ineq <= A_ineq q <= u_ineq
/// ```
///
/// recomputed every tick around the current operating point.
#[derive(Clone, Debug, PartialEq)]
pub struct QpCoefficients {
    pub A_eq: Matrix<Dy, Dy>,
    pub b_eq: Vec<float>,
    pub A_ineq: Matrix<Dy, Dy>,
    pub l_ineq: Vec<float>,
    pub u_ineq: Vec<float>,
    /// Hessian diagonal.
    pub H: Vec<float>,
    pub f: Vec<float>,
}

impl QpCoefficients {
    pub fn is_convex(&self) -> bool {
        self.H.iter().all(|&h| h >= 0.0)
    }
}

/// Builds the QP structure and per-tick coefficients from the residuals.
pub struct Assembler<J: Differentiate> {
    layout: Layout,
    grid: HorizonGrid,
    model: config::Model,
    bounds: config::Bounds,
    weights: config::Objective,
    spline_resolution: usize,
    diff: J,
}

impl<J: Differentiate> Assembler<J> {
    pub fn new(config: &PlannerConfig, diff: J) -> Assembler<J> {
        Assembler {
            layout: Layout::new(config.horizon.nodes),
            grid: HorizonGrid::from_config(&config.horizon),
            model: config.model.clone(),
            bounds: config.bounds.clone(),
            weights: config.objective.clone(),
            spline_resolution: config.risk.spline_resolution,
            diff,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn grid(&self) -> &HorizonGrid {
        &self.grid
    }

    pub fn structure(&self) -> QpStructure {
        let l = self.layout;
        let neutral = self.neutral();
        let halfspace = Halfspace::project(&self.grid, &l, &neutral.obstacle, &vec![0.0; l.len()]);
        let (lower, upper) = self.box_bounds();

        QpStructure {
            n_vars: l.len(),
            eq_sparsity: self.equality(&neutral.initial).sparsity(),
            ineq_sparsity: self.inequality(&halfspace, &neutral.risk).sparsity(),
            hessian_sparsity: Objective::new(l, &self.weights).hessian_sparsity(),
            lower,
            upper,
        }
    }

    /// Inputs with every quantity zero, used to set up a backend before the first tick.
    pub fn neutral(&self) -> Conditioned {
        Conditioned {
            initial: InitialCondition {
                position: [0.0; 2],
                velocity: [0.0; 2],
                control: [0.0; 2],
            },
            obstacle: ObstacleState {
                position: [0.0; 2],
                velocity: [0.0; 2],
            },
            risk: RiskParameters {
                slopes: vec![0.0; self.spline_resolution],
                intercepts: vec![0.0; self.spline_resolution],
            },
        }
    }

    pub fn box_bounds(&self) -> (Vec<float>, Vec<float>) {
        let l = self.layout;
        let mut lower = vec![0.0; l.len()];
        let mut upper = vec![0.0; l.len()];
        let b = &self.bounds;

        for &c in &Channel::ALL {
            let (lo, hi) = match c {
                Channel::X | Channel::Y => (-b.position, b.position),
                Channel::Dx | Channel::Dy => (-b.velocity, b.velocity),
                Channel::Ux | Channel::Uy => (-b.control, b.control),
                Channel::Sx | Channel::Sy => (0.0, INFINITY),
                Channel::S => (NEG_INFINITY, 0.0),
            };
            for i in l.range(c) {
                lower[i] = lo;
                upper[i] = hi;
            }
        }
        (lower, upper)
    }

    /// Linearises the constraints and quadratises the objective around `q0`.
    pub fn assemble(
        &self,
        inputs: &Conditioned,
        halfspace: &Halfspace,
        q0: &[float],
    ) -> QpCoefficients {
        assert_eq!(q0.len(), self.layout.len());

        let eq = flame::span_of("linearise equality", || {
            self.diff.linearise(&self.equality(&inputs.initial), q0)
        });
        let ineq = flame::span_of("linearise inequality", || {
            self.diff
                .linearise(&self.inequality(halfspace, &inputs.risk), q0)
        });
        let objective = flame::span_of("quadratise objective", || {
            self.diff
                .quadratise(&Objective::new(self.layout, &self.weights), q0)
        });

        let b_eq = affine_bound(&eq, q0);
        let u_ineq = affine_bound(&ineq, q0);
        let l_ineq = vec![NEG_INFINITY; u_ineq.len()];

        let H = objective.hessian_diagonal;
        let f = objective
            .gradient
            .iter()
            .zip(&H)
            .zip(q0)
            .map(|((&g, &h), &q)| g - h * q)
            .collect();

        QpCoefficients {
            A_eq: eq.jacobian,
            b_eq,
            A_ineq: ineq.jacobian,
            l_ineq,
            u_ineq,
            H,
            f,
        }
    }

    fn equality<'a>(&'a self, initial: &InitialCondition) -> EqualityResidual<'a> {
        EqualityResidual::new(self.layout, self.grid.dt(), &self.model, initial.to_array())
    }

    fn inequality<'a>(
        &self,
        halfspace: &'a Halfspace,
        risk: &'a RiskParameters,
    ) -> InequalityResidual<'a> {
        InequalityResidual::new(self.layout, self.bounds.workspace, halfspace, risk)
    }
}

/// Right hand side `J q0 - g(q0)` of the linearised rows `J q (=|<=) J q0 - g(q0)`.
fn affine_bound(linearisation: &Linearisation, q0: &[float]) -> Vec<float> {
    let jq = &linearisation.jacobian * DVector::from_column_slice(q0);
    jq.iter()
        .zip(&linearisation.value)
        .map(|(&a, &g)| a - g)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jacobian::ForwardDiff;
    use approx::assert_relative_eq;

    fn small_config() -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.horizon.nodes = 4;
        config.risk.spline_resolution = 2;
        config
    }

    fn conditioned(assembler: &Assembler<ForwardDiff>) -> Conditioned {
        let mut c = assembler.neutral();
        c.initial.position = [0.2, -0.1];
        c.initial.velocity = [0.3, 0.0];
        c.obstacle.position = [1.0, 1.0];
        c.obstacle.velocity = [-0.5, 0.0];
        c.risk.slopes = vec![-0.2, 0.0];
        c.risk.intercepts = vec![0.05, INFINITY];
        c
    }

    #[test]
    fn structure_shapes() {
        let config = small_config();
        let assembler = Assembler::new(&config, ForwardDiff);
        let s = assembler.structure();
        let l = assembler.layout();

        assert_eq!(s.n_vars, 36);
        assert_eq!(s.eq_sparsity.shape(), (l.n_eq(), 36));
        assert_eq!(s.ineq_sparsity.shape(), (4 * 4 + 2 * 4, 36));
        assert_eq!(s.hessian_sparsity.len(), 36);
        assert_eq!(s.lower[l.index(Channel::Ux, 0)], -config.bounds.control);
        assert_eq!(s.upper[l.index(Channel::Sx, 3)], INFINITY);
        assert_eq!(s.lower[l.index(Channel::Sy, 3)], 0.0);
        assert_eq!(s.lower[l.index(Channel::S, 0)], NEG_INFINITY);
        assert_eq!(s.upper[l.index(Channel::S, 0)], 0.0);
    }

    #[test]
    fn affine_expansion_is_independent_of_operating_point() {
        let config = small_config();
        let assembler = Assembler::new(&config, ForwardDiff);
        let l = assembler.layout();
        let inputs = conditioned(&assembler);
        let zero = vec![0.0; l.len()];
        let halfspace = Halfspace::project(assembler.grid(), &l, &inputs.obstacle, &zero);

        let q0: Vec<float> = (0..l.len()).map(|i| (i as float).sin() * 0.1).collect();
        let a = assembler.assemble(&inputs, &halfspace, &zero);
        let b = assembler.assemble(&inputs, &halfspace, &q0);

        assert_eq!(a.A_eq, b.A_eq);
        for (x, y) in a.b_eq.iter().zip(&b.b_eq) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
        for (x, y) in a.u_ineq.iter().zip(&b.u_ineq) {
            if x.is_finite() {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            } else {
                assert_eq!(x, y);
            }
        }
        for (x, y) in a.f.iter().zip(&b.f) {
            assert_relative_eq!(x, y, epsilon = 1e-12);
        }
        assert_eq!(a.H, b.H);
        assert!(a.l_ineq.iter().all(|&v| v == NEG_INFINITY));
    }

    #[test]
    fn initial_condition_rows() {
        let config = small_config();
        let assembler = Assembler::new(&config, ForwardDiff);
        let l = assembler.layout();
        let inputs = conditioned(&assembler);
        let zero = vec![0.0; l.len()];
        let halfspace = Halfspace::project(assembler.grid(), &l, &inputs.obstacle, &zero);
        let c = assembler.assemble(&inputs, &halfspace, &zero);

        assert_eq!(&c.b_eq[..6], &inputs.initial.to_array());
        assert_eq!(c.A_eq[(0, l.index(Channel::X, 0))], 1.0);
        assert_eq!(c.A_eq[(5, l.index(Channel::Uy, 0))], 1.0);
        assert!(c.b_eq[6..].iter().all(|&v| v == 0.0));

        // Disabled risk lines have no upper bound
        let disabled = l.n_workspace() + l.nodes();
        assert!(c.u_ineq[disabled..].iter().all(|&v| v == INFINITY));
        assert!(c.is_convex());
    }

    #[test]
    fn linear_cost_rewards_risk() {
        let config = small_config();
        let assembler = Assembler::new(&config, ForwardDiff);
        let l = assembler.layout();
        let inputs = conditioned(&assembler);
        let zero = vec![0.0; l.len()];
        let halfspace = Halfspace::project(assembler.grid(), &l, &inputs.obstacle, &zero);
        let c = assembler.assemble(&inputs, &halfspace, &zero);

        for i in l.range(Channel::S) {
            assert_eq!(c.f[i], -config.objective.risk_reward);
            assert_eq!(c.H[i], 0.0);
        }
        for i in l.range(Channel::Sx) {
            assert_relative_eq!(c.H[i], 2.0 * config.objective.position_slack);
        }
    }

    #[test]
    fn non_convex_detection() {
        let config = small_config();
        let assembler = Assembler::new(&config, ForwardDiff);
        let neutral = assembler.neutral();
        let zero = vec![0.0; assembler.layout().len()];
        let halfspace =
            Halfspace::project(assembler.grid(), &assembler.layout(), &neutral.obstacle, &zero);
        let mut c = assembler.assemble(&neutral, &halfspace, &zero);
        assert!(c.is_convex());
        c.H[0] = -1.0;
        assert!(!c.is_convex());
        c.H[0] = std::f64::NAN;
        assert!(!c.is_convex());
    }
}
