use num_dual::{Dual2_64, Dual64};

use prelude::nalgebra::DMatrix;
use prelude::*;

use crate::residual::{Cost, Residual};

/// First order expansion of a residual around an operating point.
#[derive(Clone, Debug, PartialEq)]
pub struct Linearisation {
    pub jacobian: Matrix<Dy, Dy>,
    pub value: Vec<float>,
}

/// Second order expansion of a separable cost around an operating point.
#[derive(Clone, Debug, PartialEq)]
pub struct Quadratic {
    pub hessian_diagonal: Vec<float>,
    pub gradient: Vec<float>,
    pub value: float,
}

/// Computes derivatives of residuals and costs.
///
/// Jacobian entries outside the residual's sparsity are always zero.
pub trait Differentiate {
    fn linearise<R: Residual>(&self, residual: &R, q0: &[float]) -> Linearisation;

    fn quadratise<C: Cost>(&self, cost: &C, q0: &[float]) -> Quadratic;
}

/// Forward mode automatic differentiation, one seeded evaluation per design variable.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardDiff;

impl Differentiate for ForwardDiff {
    fn linearise<R: Residual>(&self, residual: &R, q0: &[float]) -> Linearisation {
        let mask = residual.sparsity();
        let rows = residual.rows();
        assert_eq!(mask.shape(), (rows, q0.len()));

        let mut q: Vec<Dual64> = q0.iter().map(|&v| Dual64::from(v)).collect();
        let mut jacobian = DMatrix::zeros(rows, q0.len());

        for c in 0..q0.len() {
            if !mask.column(c).iter().any(|&b| b) {
                continue;
            }
            q[c].eps = 1.0;
            let r = residual.eval(&q);
            q[c].eps = 0.0;

            for (row, v) in r.iter().enumerate() {
                if mask[(row, c)] {
                    jacobian[(row, c)] = v.eps;
                }
            }
        }

        Linearisation {
            jacobian,
            value: residual.eval(q0),
        }
    }

    fn quadratise<C: Cost>(&self, cost: &C, q0: &[float]) -> Quadratic {
        let diagonal = cost.hessian_sparsity();
        assert_eq!(diagonal.len(), q0.len());

        let mut q: Vec<Dual2_64> = q0.iter().map(|&v| Dual2_64::from(v)).collect();
        let mut hessian_diagonal = vec![0.0; q0.len()];
        let mut gradient = vec![0.0; q0.len()];

        for i in 0..q0.len() {
            q[i].v1 = 1.0;
            let c = cost.eval(&q);
            q[i].v1 = 0.0;

            gradient[i] = c.v1;
            if diagonal[i] {
                hessian_diagonal[i] = c.v2;
            }
        }

        Quadratic {
            hessian_diagonal,
            gradient,
            value: cost.eval(q0),
        }
    }
}

/// Central finite differences of the `f64` evaluation.
#[derive(Clone, Copy, Debug)]
pub struct FiniteDifference {
    pub step: float,
}

impl Default for FiniteDifference {
    fn default() -> FiniteDifference {
        // Central differences are exact for the affine and quadratic functions they are used on,
        // so the step only has to be large enough to keep cancellation small
        FiniteDifference { step: 1e-4 }
    }
}

impl FiniteDifference {
    fn central(&self, plus: float, minus: float) -> float {
        // Rows with an infinite value (disabled risk lines) have no usable difference
        if plus == minus {
            0.0
        } else {
            (plus - minus) / (2.0 * self.step)
        }
    }
}

impl Differentiate for FiniteDifference {
    fn linearise<R: Residual>(&self, residual: &R, q0: &[float]) -> Linearisation {
        let mask = residual.sparsity();
        let rows = residual.rows();
        assert_eq!(mask.shape(), (rows, q0.len()));

        let mut q = q0.to_vec();
        let mut jacobian = DMatrix::zeros(rows, q0.len());

        for c in 0..q0.len() {
            if !mask.column(c).iter().any(|&b| b) {
                continue;
            }
            q[c] = q0[c] + self.step;
            let plus = residual.eval(&q);
            q[c] = q0[c] - self.step;
            let minus = residual.eval(&q);
            q[c] = q0[c];

            for row in (0..rows).filter(|&row| mask[(row, c)]) {
                jacobian[(row, c)] = self.central(plus[row], minus[row]);
            }
        }

        Linearisation {
            jacobian,
            value: residual.eval(q0),
        }
    }

    fn quadratise<C: Cost>(&self, cost: &C, q0: &[float]) -> Quadratic {
        let diagonal = cost.hessian_sparsity();
        assert_eq!(diagonal.len(), q0.len());

        let value = cost.eval(q0);
        let mut q = q0.to_vec();
        let mut hessian_diagonal = vec![0.0; q0.len()];
        let mut gradient = vec![0.0; q0.len()];

        for i in 0..q0.len() {
            q[i] = q0[i] + self.step;
            let plus = cost.eval(&q);
            q[i] = q0[i] - self.step;
            let minus = cost.eval(&q);
            q[i] = q0[i];

            gradient[i] = self.central(plus, minus);
            if diagonal[i] {
                hessian_diagonal[i] = (plus - 2.0 * value + minus) / (self.step * self.step);
            }
        }

        Quadratic {
            hessian_diagonal,
            gradient,
            value,
        }
    }
}
