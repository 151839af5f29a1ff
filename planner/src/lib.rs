#![allow(non_snake_case)]

extern crate config;
#[macro_use]
extern crate log;
extern crate num_dual;
extern crate osqp_wrapper;
extern crate prelude;
extern crate sparse;
extern crate thiserror;

#[cfg(test)]
extern crate approx;
#[cfg(test)]
extern crate rand;

mod backend;
mod decode;
mod error;
mod grid;
mod halfspace;
mod inputs;
mod jacobian;
mod layout;
mod qp;
mod residual;

pub use self::backend::{OsqpBackend, QpBackend, QpSolution, SolveStats};
pub use self::decode::{RiskDiagnostics, Trajectory};
pub use self::error::{InputError, PlannerError, SolveFailure, SolveStatus};
pub use self::grid::HorizonGrid;
pub use self::halfspace::Halfspace;
pub use self::inputs::{
    compute_acceleration, compute_control, Conditioned, InitialCondition, ObstacleState,
    RiskParameters, TickInputs, INITIAL_CONDITION_LEN, OBSTACLE_STATE_LEN,
};
pub use self::jacobian::{Differentiate, FiniteDifference, ForwardDiff, Linearisation, Quadratic};
pub use self::layout::{Channel, Layout};
pub use self::qp::{Assembler, QpCoefficients, QpStructure};
pub use self::residual::{Cost, EqualityResidual, InequalityResidual, Objective, Residual, Scalar};

use config::PlannerConfig;
use prelude::*;

/// Result of a successful tick.
pub struct Solution<'a> {
    pub trajectory: &'a Trajectory,
    pub diagnostics: &'a RiskDiagnostics,
    pub stats: SolveStats,
}

/// Receding horizon planner. Each tick re-linearises around the previous solution, updates the
/// QP in place and solves it warm started from that solution.
pub struct Planner<B: QpBackend = OsqpBackend, J: Differentiate = ForwardDiff> {
    config: PlannerConfig,
    assembler: Assembler<J>,
    backend: B,
    warm_start: Vec<float>,
    trajectory: Trajectory,
    diagnostics: RiskDiagnostics,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Result<Planner, PlannerError> {
        let backend = OsqpBackend::new(&config.solver);
        Planner::with_backend(config, backend, ForwardDiff)
    }
}

impl<B: QpBackend, J: Differentiate> Planner<B, J> {
    pub fn with_backend(
        config: PlannerConfig,
        mut backend: B,
        diff: J,
    ) -> Result<Planner<B, J>, PlannerError> {
        config.validate()?;

        let assembler = Assembler::new(&config, diff);
        let layout = assembler.layout();
        let warm_start = vec![0.0; layout.len()];

        flame::span_of("qp setup", || -> Result<(), PlannerError> {
            let structure = assembler.structure();
            let neutral = assembler.neutral();
            let halfspace =
                Halfspace::project(assembler.grid(), &layout, &neutral.obstacle, &warm_start);
            let coefficients = assembler.assemble(&neutral, &halfspace, &warm_start);
            backend.setup(&structure, &coefficients)
        })?;

        info!(
            "planner with {} nodes over {}s, {} variables, {} risk constraints per node",
            layout.nodes(),
            assembler.grid().time_horizon(),
            layout.len(),
            config.risk.spline_resolution
        );

        Ok(Planner {
            trajectory: Trajectory::zeros(layout.nodes()),
            diagnostics: RiskDiagnostics::default(),
            config,
            assembler,
            backend,
            warm_start,
        })
    }

    /// Plans a trajectory from the tick's initial condition.
    ///
    /// On failure the warm start and the published trajectory are left as they were.
    pub fn tick(&mut self, inputs: &TickInputs) -> Result<Solution<'_>, PlannerError> {
        let _guard = flame::start_guard("planner tick");

        let conditioned = self.condition(inputs)?;
        let halfspace = self.halfspace(&conditioned);
        let coefficients = self
            .assembler
            .assemble(&conditioned, &halfspace, &self.warm_start);

        if !coefficients.is_convex() {
            warn!("rejecting qp with a negative hessian entry");
            return Err(SolveFailure {
                status: SolveStatus::NonConvex,
                iterations: 0,
            }
            .into());
        }

        flame::span_of("qp update", || self.backend.update(&coefficients));

        let solution = match flame::span_of("qp solve", || self.backend.solve(&self.warm_start)) {
            Ok(solution) => solution,
            Err(failure) => {
                warn!("{}", failure);
                return Err(failure.into());
            }
        };

        if solution.stats.status == SolveStatus::SolvedInaccurate {
            warn!(
                "qp solved inaccurately after {} iterations",
                solution.stats.iterations
            );
        }
        debug!(
            "qp solved in {:?} after {} iterations, objective {}",
            solution.stats.solve_time, solution.stats.iterations, solution.stats.objective
        );

        let decoded = decode::decode(
            &self.assembler.layout(),
            &self.config.model,
            &halfspace,
            &conditioned.risk,
            &solution.x,
        );
        self.trajectory = decoded.trajectory;
        self.warm_start = decoded.warm_start;
        self.diagnostics = decoded.diagnostics;

        Ok(Solution {
            trajectory: &self.trajectory,
            diagnostics: &self.diagnostics,
            stats: solution.stats,
        })
    }

    /// The QP coefficients the next tick would solve for these inputs.
    pub fn coefficients(&self, inputs: &TickInputs) -> Result<QpCoefficients, PlannerError> {
        let conditioned = self.condition(inputs)?;
        let halfspace = self.halfspace(&conditioned);
        Ok(self
            .assembler
            .assemble(&conditioned, &halfspace, &self.warm_start))
    }

    fn condition(&self, inputs: &TickInputs) -> Result<Conditioned, PlannerError> {
        Conditioned::new(
            inputs,
            &self.config.model,
            &self.config.bounds,
            self.config.risk.spline_resolution,
        )
        .map_err(|e| {
            warn!("rejecting tick inputs: {}", e);
            e.into()
        })
    }

    fn halfspace(&self, conditioned: &Conditioned) -> Halfspace {
        flame::span_of("halfspace", || {
            Halfspace::project(
                self.assembler.grid(),
                &self.assembler.layout(),
                &conditioned.obstacle,
                &self.warm_start,
            )
        })
    }

    pub fn warm_start(&self) -> &[float] {
        &self.warm_start
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn diagnostics(&self) -> &RiskDiagnostics {
        &self.diagnostics
    }

    pub fn grid(&self) -> &HorizonGrid {
        self.assembler.grid()
    }

    pub fn layout(&self) -> Layout {
        self.assembler.layout()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }
}
