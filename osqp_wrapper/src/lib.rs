extern crate osqp as osqp_inner;
extern crate prelude;
extern crate sparse;

use self::osqp_inner::Problem as InnerProblem;
pub use self::osqp_inner::*;

use prelude::*;

/// OSQP treats bounds beyond this magnitude as infinite.
pub const OSQP_INFTY: float = 1e30;

pub struct Problem {
    inner: InnerProblem,
}

impl Problem {
    #[allow(non_snake_case)]
    pub fn new(
        P: &sparse::CscMatrix,
        q: &[float],
        A: &sparse::CscMatrix,
        l: &[float],
        u: &[float],
        settings: &Settings,
    ) -> Result<Problem, SetupError> {
        let _guard = flame::start_guard("osqp setup");
        let inner = InnerProblem::new(
            convert_sparse(P),
            q,
            convert_sparse(A),
            &clamp_bounds(l),
            &clamp_bounds(u),
            settings,
        )?;
        Ok(Problem { inner })
    }

    pub fn update_lin_cost(&mut self, q: &[float]) {
        let _guard = flame::start_guard("osqp update_lin_cost");
        self.inner.update_lin_cost(q)
    }

    pub fn update_bounds(&mut self, l: &[float], u: &[float]) {
        let _guard = flame::start_guard("osqp update_bounds");
        self.inner.update_bounds(&clamp_bounds(l), &clamp_bounds(u))
    }

    #[allow(non_snake_case)]
    pub fn update_P(&mut self, P: &sparse::CscMatrix) {
        let _guard = flame::start_guard("osqp update_P");
        self.inner.update_P(convert_sparse(P))
    }

    #[allow(non_snake_case)]
    pub fn update_A(&mut self, A: &sparse::CscMatrix) {
        let _guard = flame::start_guard("osqp update_A");
        self.inner.update_A(convert_sparse(A))
    }

    pub fn warm_start_x(&mut self, x: &[float]) {
        let _guard = flame::start_guard("osqp warm_start");
        self.inner.warm_start_x(x)
    }

    pub fn solve(&mut self) -> Status {
        let _guard = flame::start_guard("osqp solve");
        self.inner.solve()
    }
}

pub fn convert_sparse(this: &sparse::CscMatrix) -> CscMatrix {
    let (nrows, ncols) = this.shape();
    CscMatrix {
        nrows,
        ncols,
        indptr: (this.indptr()).into(),
        indices: (this.indices()).into(),
        data: (this.data()).into(),
    }
}

fn clamp_bounds(bounds: &[float]) -> Vec<float> {
    bounds
        .iter()
        .map(|&b| b.max(-OSQP_INFTY).min(OSQP_INFTY))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prelude::nalgebra::DMatrix;

    #[test]
    fn bounds_are_clamped() {
        assert_eq!(
            clamp_bounds(&[INFINITY, NEG_INFINITY, 1.0]),
            vec![OSQP_INFTY, -OSQP_INFTY, 1.0]
        );
    }

    #[test]
    fn converted_matrix_shares_layout() {
        let a = sparse::vstack(&[
            sparse::block(&DMatrix::from_row_slice(1, 2, &[1.0, 2.0])),
            sparse::eye(2),
        ])
        .build_csc();
        let converted = convert_sparse(&a);
        assert_eq!((converted.nrows, converted.ncols), (3, 2));
        assert_eq!(&converted.indptr[..], a.indptr());
        assert_eq!(&converted.indices[..], a.indices());
        assert_eq!(&converted.data[..], a.data());
    }

    #[test]
    fn solves_small_box_qp() {
        // minimise 1/2 x^2 - x subject to 0 <= x <= 0.5
        let (p, p_block) = sparse::block_mut(&DMatrix::from_element(1, 1, true));
        let mut p = sparse::vstack(&[p]).build_csc();
        p.set_block(&p_block, &DMatrix::from_element(1, 1, 1.0));
        let a = sparse::eye(1).build_csc();

        let settings = Settings::default().verbose(false).eps_abs(1e-8).eps_rel(1e-8);
        let mut problem = Problem::new(&p, &[-1.0], &a, &[0.0], &[0.5], &settings)
            .expect("setup failed");

        match problem.solve() {
            Status::Solved(solution) => assert!((solution.x()[0] - 0.5).abs() < 1e-6),
            _ => panic!("expected solved status"),
        }
    }
}
