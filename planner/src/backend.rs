use std::time::{Duration, Instant};

use osqp_wrapper::{self as osqp, Settings, Status};
use prelude::nalgebra::{DMatrix, DVector};
use prelude::*;
use sparse::{self, BlockRef};

use crate::error::{PlannerError, SolveFailure, SolveStatus};
use crate::qp::{QpCoefficients, QpStructure};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub status: SolveStatus,
    pub objective: float,
    pub iterations: u32,
    pub solve_time: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QpSolution {
    pub x: Vec<float>,
    pub stats: SolveStats,
}

/// A QP solver whose problem structure is fixed by `setup` and whose coefficients are replaced
/// by `update` before each solve.
pub trait QpBackend {
    fn setup(
        &mut self,
        structure: &QpStructure,
        coefficients: &QpCoefficients,
    ) -> Result<(), PlannerError>;

    /// Must only be called after a successful `setup`.
    fn update(&mut self, coefficients: &QpCoefficients);

    fn solve(&mut self, warm_start: &[float]) -> Result<QpSolution, SolveFailure>;
}

struct OsqpState {
    problem: osqp::Problem,
    // Objective
    P: sparse::CscMatrix,
    P_block: BlockRef,
    // Constraints: equality rows, inequality rows then one identity row per variable for the
    // box bounds
    A: sparse::CscMatrix,
    A_eq_block: BlockRef,
    A_ineq_block: BlockRef,
    l: Vec<float>,
    u: Vec<float>,
    n_eq: usize,
    n_ineq: usize,
}

/// OSQP backed QP solver.
pub struct OsqpBackend {
    settings: Settings,
    prune_tolerance: float,
    state: Option<OsqpState>,
}

impl OsqpBackend {
    pub fn new(config: &config::Solver) -> OsqpBackend {
        let settings = Settings::default()
            .verbose(config.verbose)
            .eps_abs(config.eps_abs)
            .eps_rel(config.eps_rel)
            .max_iter(config.max_iter)
            .polish(config.polish)
            .warm_start(true)
            .time_limit(config.time_limit.map(Duration::from_secs_f64));

        OsqpBackend {
            settings,
            prune_tolerance: config.prune_tolerance,
            state: None,
        }
    }
}

impl QpBackend for OsqpBackend {
    fn setup(
        &mut self,
        structure: &QpStructure,
        coefficients: &QpCoefficients,
    ) -> Result<(), PlannerError> {
        let n = structure.n_vars;
        let n_eq = structure.eq_sparsity.nrows();
        let n_ineq = structure.ineq_sparsity.nrows();

        let P_sparsity = DMatrix::from_fn(n, n, |r, c| r == c && structure.hessian_sparsity[r]);
        let (P, P_block) = sparse::block_mut(&P_sparsity);
        let P = sparse::vstack(&[P]).build_csc();
        debug_assert!(P.is_upper_triangular());

        let (A_eq, A_eq_block) = sparse::block_mut(&structure.eq_sparsity);
        let (A_ineq, A_ineq_block) = sparse::block_mut(&structure.ineq_sparsity);
        let A = sparse::vstack(&[A_eq, A_ineq, sparse::eye(n)]).build_csc();

        let mut l = vec![0.0; n_eq + n_ineq + n];
        let mut u = vec![0.0; n_eq + n_ineq + n];
        l[n_eq + n_ineq..].copy_from_slice(&structure.lower);
        u[n_eq + n_ineq..].copy_from_slice(&structure.upper);

        info!(
            "osqp problem with {} variables, {} constraints, A nnz {}, P nnz {}",
            n,
            n_eq + n_ineq + n,
            A.nnz(),
            P.nnz()
        );

        let mut state = OsqpState {
            problem: osqp::Problem::new(&P, &coefficients.f, &A, &l, &u, &self.settings)
                .map_err(|e| PlannerError::Setup(e.to_string()))?,
            P,
            P_block,
            A,
            A_eq_block,
            A_ineq_block,
            l,
            u,
            n_eq,
            n_ineq,
        };
        state.update(coefficients, self.prune_tolerance);
        self.state = Some(state);
        Ok(())
    }

    fn update(&mut self, coefficients: &QpCoefficients) {
        let prune_tolerance = self.prune_tolerance;
        self.state
            .as_mut()
            .expect("osqp backend used before setup")
            .update(coefficients, prune_tolerance);
    }

    fn solve(&mut self, warm_start: &[float]) -> Result<QpSolution, SolveFailure> {
        let state = self.state.as_mut().expect("osqp backend used before setup");
        state.problem.warm_start_x(warm_start);

        let start = Instant::now();
        let status = state.problem.solve();
        let solve_time = start.elapsed();
        let iterations = status.iter();

        let (status, solution) = match status {
            Status::Solved(s) => (SolveStatus::Solved, Some(s)),
            Status::SolvedInaccurate(s) => (SolveStatus::SolvedInaccurate, Some(s)),
            Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                (SolveStatus::PrimalInfeasible, None)
            }
            Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                (SolveStatus::DualInfeasible, None)
            }
            Status::MaxIterationsReached(_) => (SolveStatus::MaxIterations, None),
            Status::TimeLimitReached(_) => (SolveStatus::TimeLimit, None),
            Status::NonConvex(_) => (SolveStatus::NonConvex, None),
            _ => (SolveStatus::Other, None),
        };

        match solution {
            Some(solution) => Ok(QpSolution {
                x: solution.x().to_vec(),
                stats: SolveStats {
                    status,
                    objective: solution.obj_val(),
                    iterations,
                    solve_time,
                },
            }),
            None => Err(SolveFailure { status, iterations }),
        }
    }
}

impl OsqpState {
    fn update(&mut self, c: &QpCoefficients, prune_tolerance: float) {
        let (n_eq, n_ineq) = (self.n_eq, self.n_ineq);

        let _guard = flame::start_guard("osqp coefficients");
        self.P
            .set_block(&self.P_block, &DMatrix::from_diagonal(&DVector::from_column_slice(&c.H)));
        self.A.set_block(&self.A_eq_block, &c.A_eq);
        self.A.set_block(&self.A_ineq_block, &c.A_ineq);
        let pruned = self.A.prune(prune_tolerance);
        if pruned > 0 {
            debug!("pruned {} constraint coefficients", pruned);
        }

        self.l[..n_eq].copy_from_slice(&c.b_eq);
        self.u[..n_eq].copy_from_slice(&c.b_eq);
        self.l[n_eq..n_eq + n_ineq].copy_from_slice(&c.l_ineq);
        self.u[n_eq..n_eq + n_ineq].copy_from_slice(&c.u_ineq);

        self.problem.update_P(&self.P);
        self.problem.update_lin_cost(&c.f);
        self.problem.update_A(&self.A);
        self.problem.update_bounds(&self.l, &self.u);
    }
}
